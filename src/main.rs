use clap::{Args as ClapArgs, Parser, Subcommand};
use std::error::Error;
use std::path::PathBuf;
use tracing::{info, warn};

use bdd_evidence::config;
use bdd_evidence::evidence::{EvidenceStore, read_aggregate};
use bdd_evidence::gherkin::{FeatureIndex, find_scenario};
use bdd_evidence::pipeline::{EvidencePipeline, PipelineMode, RunReport, parse_event_lines};
use bdd_evidence::report::{ReportOptions, WrittenReport, render_to_file};
use bdd_evidence::session::ReportSession;

/// BDD Evidence - PDF evidence reports for BDD test runs
#[derive(Parser, Debug)]
#[command(
    name = "bdd-evidence",
    about = "Index Gherkin scenarios, collect test evidence and render PDF evidence reports",
    after_help = "ENVIRONMENT VARIABLES:\n\
        BDD_EVIDENCE_FEATURE_DIRS  Comma-separated feature file roots\n\
        BDD_EVIDENCE_LOGS_DIR      Directory for per-test evidence logs\n\
        BDD_EVIDENCE_OUTPUT_DIR    Directory for reports\n\
        BDD_EVIDENCE_COMPANY       Organization name in the report header\n\
        BDD_EVIDENCE_MODE          consolidated, per-test or deferred\n\
        RUST_LOG                   Log filter (default: info)"
)]
struct Args {
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Feature file roots shared by every command that matches scenarios
#[derive(ClapArgs, Debug)]
struct FeatureArgs {
    /// Feature file roots, scanned recursively (comma-separated)
    #[arg(long, env = "BDD_EVIDENCE_FEATURE_DIRS", value_delimiter = ',')]
    feature_dirs: Option<Vec<PathBuf>>,
}

impl FeatureArgs {
    fn dirs(&self) -> Vec<PathBuf> {
        self.feature_dirs.clone().unwrap_or_else(config::feature_dirs)
    }
}

/// Report header overrides
#[derive(ClapArgs, Debug)]
struct HeaderArgs {
    /// Organization name in the report header
    #[arg(long)]
    company: Option<String>,

    /// Second header line
    #[arg(long)]
    subtitle: Option<String>,

    /// Environment shown in the header
    #[arg(long)]
    environment: Option<String>,

    /// Device shown in the header
    #[arg(long)]
    device: Option<String>,

    /// Logo image drawn in the header
    #[arg(long)]
    logo: Option<PathBuf>,

    /// Leave the logo out
    #[arg(long)]
    no_logo: bool,
}

impl HeaderArgs {
    fn options(&self) -> ReportOptions {
        let mut options = ReportOptions::new();
        if let Some(company) = &self.company {
            options = options.company_name(company.clone());
        }
        if let Some(subtitle) = &self.subtitle {
            options = options.subtitle(subtitle.clone());
        }
        if let Some(environment) = &self.environment {
            options = options.environment(environment.clone());
        }
        if let Some(device) = &self.device {
            options = options.device(device.clone());
        }
        if self.no_logo {
            options = options.logo(None);
        } else if let Some(logo) = &self.logo {
            options = options.logo(Some(logo.clone()));
        }
        options
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Render a report from persisted evidence
    Render {
        /// Directory of per-test evidence logs
        #[arg(long, env = "BDD_EVIDENCE_LOGS_DIR", conflicts_with = "input")]
        logs: Option<PathBuf>,

        /// Aggregate evidence JSON file instead of per-test logs
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Report path (default: timestamped file in the output directory)
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        features: FeatureArgs,

        #[command(flatten)]
        header: HeaderArgs,

        /// Print the render summary as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the scenario index
    Index {
        #[command(flatten)]
        features: FeatureArgs,

        /// Output the index as JSON
        #[arg(long)]
        json: bool,
    },

    /// Resolve a test title to its scenario
    Match {
        /// Test title as reported by the runner
        title: String,

        #[command(flatten)]
        features: FeatureArgs,
    },

    /// Feed a JSON-lines lifecycle event file through the evidence pipeline
    Replay {
        /// Event file, one JSON object per line
        #[arg(short, long)]
        events: PathBuf,

        /// consolidated, per-test or deferred
        #[arg(short, long, env = "BDD_EVIDENCE_MODE", default_value = config::DEFAULT_MODE)]
        mode: String,

        /// Directory for per-test evidence logs
        #[arg(long, env = "BDD_EVIDENCE_LOGS_DIR")]
        logs: Option<PathBuf>,

        /// Directory for reports
        #[arg(short, long, env = "BDD_EVIDENCE_OUTPUT_DIR")]
        output: Option<PathBuf>,

        #[command(flatten)]
        features: FeatureArgs,

        #[command(flatten)]
        header: HeaderArgs,

        /// Print the run report as JSON
        #[arg(long)]
        json: bool,
    },

    /// List persisted evidence logs
    Logs {
        /// Directory of per-test evidence logs
        #[arg(long, env = "BDD_EVIDENCE_LOGS_DIR")]
        logs: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn print_written(report: &WrittenReport) {
    println!("Report written: {}", report.path.display());
    println!(
        "  Pages: {}  Tests: {}  Images: {}",
        report.summary.pages, report.summary.tests, report.summary.images
    );
    if report.summary.missing_images > 0 || report.summary.image_errors > 0 {
        println!(
            "  Missing screenshots: {}  Unreadable screenshots: {}",
            report.summary.missing_images, report.summary.image_errors
        );
    }
}

fn print_run(run: &RunReport) {
    println!(
        "Run finished: {} tests ({} passed, {} failed)",
        run.tests, run.passed, run.failed
    );
    for report in &run.reports {
        print_written(report);
    }
    if let Some(aggregate) = &run.aggregate {
        println!("Evidence saved: {}", aggregate.display());
    }
    for error in &run.errors {
        eprintln!("Warning: {}", error);
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    match args.command {
        Some(Commands::Render {
            logs,
            input,
            output,
            features,
            header,
            json,
        }) => {
            let results = match &input {
                Some(path) => read_aggregate(path)?,
                None => {
                    let dir = logs.unwrap_or_else(config::logs_dir);
                    EvidenceStore::new(dir).load_results()?
                }
            };
            if results.is_empty() {
                warn!("no finished tests found, report will contain the header only");
            }

            let session = ReportSession::with_dirs(features.dirs(), config::logs_dir(), config::output_dir())
                .options(header.options());
            let path = output.unwrap_or_else(|| session.report_path());
            let written = render_to_file(&results, session.index(), &session.options, &path).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&written)?);
            } else {
                print_written(&written);
            }
        }

        Some(Commands::Index { features, json }) => {
            let index = FeatureIndex::build(&features.dirs());
            if json {
                let records: Vec<_> = index.iter().collect();
                println!("{}", serde_json::to_string_pretty(&records)?);
            } else {
                for record in index.iter() {
                    let source = record
                        .source
                        .as_ref()
                        .map(|p| format!(" ({})", p.display()))
                        .unwrap_or_default();
                    println!("{}{}", record.title, source);
                    for step in &record.steps {
                        println!("    {}", step);
                    }
                }
                println!("\n{} scenarios", index.len());
            }
        }

        Some(Commands::Match { title, features }) => {
            let index = FeatureIndex::build(&features.dirs());
            let found = find_scenario(&index, &title)
                .ok_or_else(|| format!("No scenario matches '{}'", title))?;
            println!("{:?} match: {}", found.kind, found.scenario.title);
            for step in &found.scenario.steps {
                println!("    {}", step);
            }
        }

        Some(Commands::Replay {
            events,
            mode,
            logs,
            output,
            features,
            header,
            json,
        }) => {
            let mode: PipelineMode = mode.parse()?;
            let text = std::fs::read_to_string(&events)?;
            let events = parse_event_lines(&text)?;
            info!(events = events.len(), ?mode, "replaying lifecycle events");

            let session = ReportSession::with_dirs(
                features.dirs(),
                logs.unwrap_or_else(config::logs_dir),
                output.unwrap_or_else(config::output_dir),
            )
            .persist_logs(true)
            .options(header.options());
            session.init()?;

            let mut pipeline = EvidencePipeline::new(session, mode);
            let run = pipeline.replay(events).await;

            if json {
                println!("{}", serde_json::to_string_pretty(&run)?);
            } else {
                print_run(&run);
            }
        }

        Some(Commands::Logs { logs, json }) => {
            let store = EvidenceStore::new(logs.unwrap_or_else(config::logs_dir));
            let files = store.list_logs()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&files)?);
            } else {
                for file in &files {
                    println!("{}", file.display());
                }
                println!("\n{} logs", files.len());
            }
        }

        None => {
            println!("BDD Evidence - PDF evidence reports for BDD test runs");
            println!();
            println!("Usage: bdd-evidence <COMMAND>");
            println!();
            println!("Commands:");
            println!("  render  Render a report from persisted evidence");
            println!("  index   Print the scenario index");
            println!("  match   Resolve a test title to its scenario");
            println!("  replay  Feed lifecycle events through the evidence pipeline");
            println!("  logs    List persisted evidence logs");
            println!();
            println!("Run with --help for more information.");
        }
    }

    Ok(())
}
