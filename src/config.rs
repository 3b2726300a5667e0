//! Configuration management with environment variable support.
//!
//! This module provides centralized configuration for bdd-evidence, supporting:
//! - Environment variables for all configurable values
//! - Defaults matching the conventional test-suite layout
//! - Builder pattern for programmatic configuration (see `ReportOptions`)
//!
//! # Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `BDD_EVIDENCE_FEATURE_DIRS` | Comma-separated feature file roots | `cypress/e2e,cypress/web/features` |
//! | `BDD_EVIDENCE_LOGS_DIR` | Directory for persisted per-test logs | `cypress/results/logs` |
//! | `BDD_EVIDENCE_OUTPUT_DIR` | Directory for PDF reports | `cypress/evidence` |
//! | `BDD_EVIDENCE_COMPANY` | Organization name in the report header | `Evidence Report` |
//! | `BDD_EVIDENCE_SUBTITLE` | Second header line | `QA Automation` |
//! | `BDD_EVIDENCE_ENVIRONMENT` | Environment shown in the header | `QA` |
//! | `BDD_EVIDENCE_DEVICE` | Device shown in the header | `Web` |
//! | `BDD_EVIDENCE_LOGO` | Logo image drawn in the header | `cypress/fixtures/logo.png` |
//! | `BDD_EVIDENCE_MODE` | `consolidated`, `per-test` or `deferred` | `consolidated` |
//!
//! # Example
//!
//! ```bash
//! export BDD_EVIDENCE_FEATURE_DIRS="tests/features,tests/legacy"
//! export BDD_EVIDENCE_MODE="deferred"
//! ```

use std::env;
use std::path::PathBuf;
use std::sync::OnceLock;

// ============================================================================
// Default Values
// ============================================================================

/// Default feature file roots, scanned recursively
pub const DEFAULT_FEATURE_DIRS: &[&str] = &["cypress/e2e", "cypress/web/features"];

/// Default directory for persisted per-test evidence logs
pub const DEFAULT_LOGS_DIR: &str = "cypress/results/logs";

/// Default directory for generated reports
pub const DEFAULT_OUTPUT_DIR: &str = "cypress/evidence";

/// Default organization name
pub const DEFAULT_COMPANY_NAME: &str = "Evidence Report";

/// Default header subtitle
pub const DEFAULT_SUBTITLE: &str = "QA Automation";

/// Default environment label
pub const DEFAULT_ENVIRONMENT: &str = "QA";

/// Default device label
pub const DEFAULT_DEVICE: &str = "Web";

/// Default logo location
pub const DEFAULT_LOGO_PATH: &str = "cypress/fixtures/logo.png";

/// Default pipeline mode
pub const DEFAULT_MODE: &str = "consolidated";

// ============================================================================
// Environment Variable Names
// ============================================================================

/// Environment variable for feature directories
pub const ENV_FEATURE_DIRS: &str = "BDD_EVIDENCE_FEATURE_DIRS";

/// Environment variable for the logs directory
pub const ENV_LOGS_DIR: &str = "BDD_EVIDENCE_LOGS_DIR";

/// Environment variable for the output directory
pub const ENV_OUTPUT_DIR: &str = "BDD_EVIDENCE_OUTPUT_DIR";

/// Environment variable for the organization name
pub const ENV_COMPANY_NAME: &str = "BDD_EVIDENCE_COMPANY";

/// Environment variable for the header subtitle
pub const ENV_SUBTITLE: &str = "BDD_EVIDENCE_SUBTITLE";

/// Environment variable for the environment label
pub const ENV_ENVIRONMENT: &str = "BDD_EVIDENCE_ENVIRONMENT";

/// Environment variable for the device label
pub const ENV_DEVICE: &str = "BDD_EVIDENCE_DEVICE";

/// Environment variable for the logo path
pub const ENV_LOGO_PATH: &str = "BDD_EVIDENCE_LOGO";

/// Environment variable for the pipeline mode
pub const ENV_MODE: &str = "BDD_EVIDENCE_MODE";

/// Legacy switch from the runner config: any non-empty value other than
/// `false`/`0` selects per-test reports when no mode is set.
pub const ENV_GENERATE_PDF_LEGACY: &str = "GENERATE_PDF";

// ============================================================================
// Configuration Getters (with caching)
// ============================================================================

static CONFIG: OnceLock<Config> = OnceLock::new();

/// Get the global configuration (initialized from environment on first access)
pub fn get() -> &'static Config {
    CONFIG.get_or_init(Config::from_env)
}

/// Centralized configuration for bdd-evidence
#[derive(Debug, Clone)]
pub struct Config {
    /// Input/output locations
    pub paths: PathSettings,
    /// Report header content
    pub report: ReportSettings,
    /// Pipeline mode name (parsed into a `PipelineMode`)
    pub mode: String,
}

/// Filesystem locations
#[derive(Debug, Clone)]
pub struct PathSettings {
    /// Roots scanned for `.feature` files
    pub feature_dirs: Vec<PathBuf>,
    /// Per-test JSON logs
    pub logs_dir: PathBuf,
    /// Generated PDFs and the aggregate evidence file
    pub output_dir: PathBuf,
}

/// Report header settings
#[derive(Debug, Clone)]
pub struct ReportSettings {
    pub company_name: String,
    pub subtitle: String,
    pub environment: String,
    pub device: String,
    pub logo_path: PathBuf,
}

impl Config {
    /// Create configuration from environment variables, falling back to defaults
    pub fn from_env() -> Self {
        let mode = env::var(ENV_MODE).unwrap_or_else(|_| {
            match env::var(ENV_GENERATE_PDF_LEGACY) {
                Ok(v) if legacy_flag_enabled(&v) => "per-test".to_string(),
                _ => DEFAULT_MODE.to_string(),
            }
        });

        Self {
            paths: PathSettings::from_env(),
            report: ReportSettings::from_env(),
            mode,
        }
    }

    /// Create configuration with all defaults (ignoring environment)
    pub fn defaults() -> Self {
        Self {
            paths: PathSettings::defaults(),
            report: ReportSettings::defaults(),
            mode: DEFAULT_MODE.to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

impl PathSettings {
    /// Create path settings from environment variables
    pub fn from_env() -> Self {
        let feature_dirs = env::var(ENV_FEATURE_DIRS)
            .ok()
            .map(|s| parse_dir_list(&s))
            .filter(|dirs| !dirs.is_empty())
            .unwrap_or_else(default_feature_dirs);

        Self {
            feature_dirs,
            logs_dir: env::var(ENV_LOGS_DIR)
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_LOGS_DIR)),
            output_dir: env::var(ENV_OUTPUT_DIR)
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_OUTPUT_DIR)),
        }
    }

    /// Create path settings with defaults
    pub fn defaults() -> Self {
        Self {
            feature_dirs: default_feature_dirs(),
            logs_dir: PathBuf::from(DEFAULT_LOGS_DIR),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
        }
    }
}

impl ReportSettings {
    /// Create report settings from environment variables
    pub fn from_env() -> Self {
        Self {
            company_name: env::var(ENV_COMPANY_NAME)
                .unwrap_or_else(|_| DEFAULT_COMPANY_NAME.to_string()),
            subtitle: env::var(ENV_SUBTITLE).unwrap_or_else(|_| DEFAULT_SUBTITLE.to_string()),
            environment: env::var(ENV_ENVIRONMENT)
                .unwrap_or_else(|_| DEFAULT_ENVIRONMENT.to_string()),
            device: env::var(ENV_DEVICE).unwrap_or_else(|_| DEFAULT_DEVICE.to_string()),
            logo_path: env::var(ENV_LOGO_PATH)
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_LOGO_PATH)),
        }
    }

    /// Create report settings with defaults
    pub fn defaults() -> Self {
        Self {
            company_name: DEFAULT_COMPANY_NAME.to_string(),
            subtitle: DEFAULT_SUBTITLE.to_string(),
            environment: DEFAULT_ENVIRONMENT.to_string(),
            device: DEFAULT_DEVICE.to_string(),
            logo_path: PathBuf::from(DEFAULT_LOGO_PATH),
        }
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

fn default_feature_dirs() -> Vec<PathBuf> {
    DEFAULT_FEATURE_DIRS.iter().map(PathBuf::from).collect()
}

/// Split a comma-separated directory list, dropping empty entries
pub fn parse_dir_list(list: &str) -> Vec<PathBuf> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(PathBuf::from)
        .collect()
}

fn legacy_flag_enabled(value: &str) -> bool {
    let v = value.trim().to_lowercase();
    !v.is_empty() && v != "false" && v != "0"
}

/// Get configured feature directories (convenience function)
pub fn feature_dirs() -> Vec<PathBuf> {
    get().paths.feature_dirs.clone()
}

/// Get the logs directory (convenience function)
pub fn logs_dir() -> PathBuf {
    get().paths.logs_dir.clone()
}

/// Get the output directory (convenience function)
pub fn output_dir() -> PathBuf {
    get().paths.output_dir.clone()
}
