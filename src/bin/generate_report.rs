//! Render the consolidated evidence report from the aggregate evidence file
//! left behind by a deferred run.
//!
//! Exits with status 1 when the evidence file does not exist.

use bdd_evidence::evidence::read_aggregate;
use bdd_evidence::report::render_to_file;
use bdd_evidence::session::ReportSession;
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let session = ReportSession::new();
    let evidence = session.aggregate_path();

    if !evidence.exists() {
        eprintln!("Evidence file not found: {}", evidence.display());
        eprintln!("Run the tests in deferred mode first.");
        return ExitCode::FAILURE;
    }

    let results = match read_aggregate(&evidence) {
        Ok(results) => results,
        Err(e) => {
            eprintln!("Could not read {}: {}", evidence.display(), e);
            return ExitCode::FAILURE;
        }
    };

    if results.is_empty() {
        println!("No evidence recorded, nothing to render.");
        return ExitCode::SUCCESS;
    }

    let path = session.report_path();
    match render_to_file(&results, session.index(), &session.options, &path).await {
        Ok(written) => {
            println!("Report written: {}", written.path.display());
            println!("  Tests: {}  Pages: {}", written.summary.tests, written.summary.pages);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Failed to write report: {}", e);
            ExitCode::FAILURE
        }
    }
}
