//! Scenario index built from plain-text feature files.
//!
//! Feature files are read line by line and each line is classified as a
//! Feature, Background, Scenario or Step line (English and Portuguese
//! keywords). Background steps are prepended to every scenario that follows
//! them in the same file.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{debug, warn};
use walkdir::WalkDir;

/// A scenario and its resolved steps (background steps first)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioRecord {
    /// Scenario title with the keyword stripped
    pub title: String,
    /// Keyword-prefixed step lines in execution order
    pub steps: Vec<String>,
    /// Name of the enclosing feature, if declared
    pub feature: Option<String>,
    /// File the scenario was read from
    pub source: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineKind {
    Feature,
    Background,
    Scenario,
    Step,
    Other,
}

struct Patterns {
    feature: Regex,
    background: Regex,
    scenario: Regex,
    step: Regex,
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| Patterns {
        feature: Regex::new(r"(?i)^(Feature|Funcionalidade|Característica|Caracteristica):")
            .expect("valid feature pattern"),
        background: Regex::new(r"(?i)^(Background|Contexto|Fundo):")
            .expect("valid background pattern"),
        scenario: Regex::new(
            r"(?i)^(Scenario Outline|Scenario Template|Scenario|Example|Esquema do Cenário|Esquema do Cenario|Cenário|Cenario|Cénario|Exemplo):",
        )
        .expect("valid scenario pattern"),
        step: Regex::new(
            r"^(?:\*\s|(?:Given|When|Then|And|But|Dado|Dada|Dados|Dadas|Quando|Então|Entao|E|Mas)\b)",
        )
        .expect("valid step pattern"),
    })
}

fn classify(line: &str) -> LineKind {
    let p = patterns();
    if p.background.is_match(line) {
        LineKind::Background
    } else if p.scenario.is_match(line) {
        LineKind::Scenario
    } else if p.step.is_match(line) {
        LineKind::Step
    } else if p.feature.is_match(line) {
        LineKind::Feature
    } else {
        LineKind::Other
    }
}

/// Text after the first `:` of a keyword line
fn strip_keyword(line: &str) -> String {
    line.split_once(':')
        .map(|(_, rest)| rest.trim().to_string())
        .unwrap_or_default()
}

/// Mapping of scenario title to steps, in first-insertion order.
///
/// A title seen twice keeps its original position but takes the later steps.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeatureIndex {
    records: Vec<ScenarioRecord>,
    positions: HashMap<String, usize>,
}

impl FeatureIndex {
    /// Create an empty index
    pub fn new() -> Self {
        Self::default()
    }

    /// Scan every directory recursively and index all `.feature` files.
    ///
    /// Directories that do not exist and files that cannot be read are skipped.
    pub fn build<P: AsRef<Path>>(dirs: &[P]) -> Self {
        let mut index = Self::new();
        for dir in dirs {
            index.scan_dir(dir.as_ref());
        }
        debug!(scenarios = index.len(), "feature index built");
        index
    }

    /// Index all `.feature` files under `dir`
    pub fn scan_dir(&mut self, dir: &Path) {
        if !dir.is_dir() {
            debug!(dir = %dir.display(), "feature directory missing, skipping");
            return;
        }
        debug!(dir = %dir.display(), "scanning feature directory");

        let mut files: Vec<PathBuf> = WalkDir::new(dir)
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!(error = %e, "skipping unreadable directory entry");
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| entry.into_path())
            .filter(|path| path.extension().map(|e| e == "feature").unwrap_or(false))
            .collect();
        files.sort();

        for file in files {
            self.parse_file(&file);
        }
    }

    /// Parse one feature file into the index. Unreadable files are skipped.
    pub fn parse_file(&mut self, path: &Path) {
        match fs::read_to_string(path) {
            Ok(content) => self.parse_str(&content, Some(path)),
            Err(e) => warn!(file = %path.display(), error = %e, "skipping unreadable feature file"),
        }
    }

    /// Parse feature file content into the index
    pub fn parse_str(&mut self, content: &str, source: Option<&Path>) {
        let mut feature: Option<String> = None;
        let mut background: Vec<String> = Vec::new();
        let mut current: Option<(String, Vec<String>)> = None;

        for line in content.lines() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            match classify(trimmed) {
                LineKind::Feature => {
                    let name = strip_keyword(trimmed);
                    feature = (!name.is_empty()).then_some(name);
                }
                LineKind::Background => {
                    background.clear();
                    current = None;
                }
                LineKind::Scenario => {
                    if let Some((title, steps)) = current.take() {
                        self.store(title, steps, feature.clone(), source);
                    }
                    current = Some((strip_keyword(trimmed), background.clone()));
                }
                LineKind::Step => match current.as_mut() {
                    Some((_, steps)) => steps.push(trimmed.to_string()),
                    None => background.push(trimmed.to_string()),
                },
                LineKind::Other => {}
            }
        }

        if let Some((title, steps)) = current {
            self.store(title, steps, feature, source);
        }
    }

    fn store(&mut self, title: String, steps: Vec<String>, feature: Option<String>, source: Option<&Path>) {
        if title.is_empty() || steps.is_empty() {
            return;
        }
        let record = ScenarioRecord {
            title: title.clone(),
            steps,
            feature,
            source: source.map(Path::to_path_buf),
        };
        match self.positions.get(&title) {
            Some(&pos) => self.records[pos] = record,
            None => {
                self.positions.insert(title, self.records.len());
                self.records.push(record);
            }
        }
    }

    /// Steps for an exact title
    pub fn get(&self, title: &str) -> Option<&ScenarioRecord> {
        self.positions.get(title).map(|&pos| &self.records[pos])
    }

    /// Scenarios in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &ScenarioRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn index_of(content: &str) -> FeatureIndex {
        let mut index = FeatureIndex::new();
        index.parse_str(content, None);
        index
    }

    #[test]
    fn scenarios_without_background_keep_their_own_steps() {
        let index = index_of(
            "Feature: Login\n\
             Scenario: First\n  Given a\n  When b\n\
             Scenario: Second\n  Then c\n",
        );
        assert_eq!(index.len(), 2);
        assert_eq!(index.get("First").unwrap().steps, vec!["Given a", "When b"]);
        assert_eq!(index.get("Second").unwrap().steps, vec!["Then c"]);
        assert_eq!(index.get("First").unwrap().feature.as_deref(), Some("Login"));
    }

    #[test]
    fn background_steps_are_prepended() {
        let index = index_of(
            "Background:\n  Given B1\n  And B2\nScenario: S1\n  When S1a\n",
        );
        assert_eq!(index.get("S1").unwrap().steps, vec!["Given B1", "And B2", "When S1a"]);
    }

    #[test]
    fn portuguese_keywords_are_recognized() {
        let index = index_of(
            "Funcionalidade: Extrato\n\
             Contexto:\n  Dado que estou logado\n\
             Cenário: Nova solicitação\n  Quando clico em nova\n  Então vejo o formulário\n  E salvo\n",
        );
        assert_eq!(
            index.get("Nova solicitação").unwrap().steps,
            vec![
                "Dado que estou logado",
                "Quando clico em nova",
                "Então vejo o formulário",
                "E salvo"
            ]
        );
    }

    #[test]
    fn scenarios_without_steps_are_not_stored() {
        let index = index_of("Scenario: Empty\nScenario: Full\n  Given x\n");
        assert!(index.get("Empty").is_none());
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn duplicate_titles_overwrite_in_place() {
        let index = index_of(
            "Scenario: A\n  Given one\nScenario: B\n  Given two\nScenario: A\n  Given three\n",
        );
        let titles: Vec<&str> = index.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["A", "B"]);
        assert_eq!(index.get("A").unwrap().steps, vec!["Given three"]);
    }

    #[test]
    fn background_marker_discards_open_scenario() {
        let index = index_of(
            "Scenario: Lost\n  Given x\nBackground:\n  Given bg\nScenario: Kept\n  When y\n",
        );
        assert!(index.get("Lost").is_none());
        assert_eq!(index.get("Kept").unwrap().steps, vec!["Given bg", "When y"]);
    }

    #[test]
    fn irrelevant_lines_are_ignored() {
        let index = index_of(
            "@tag\n# comment\nScenario Outline: Outline\n  Given <a>\n  | a |\n  | 1 |\nExamples:\n",
        );
        assert_eq!(index.get("Outline").unwrap().steps, vec!["Given <a>"]);
    }

    #[test]
    fn bullet_steps_are_recognized() {
        let index = index_of("Scenario: Bullets\n  * first\n  *second\n");
        assert_eq!(index.get("Bullets").unwrap().steps, vec!["* first"]);
    }

    #[test]
    fn build_skips_missing_directories() {
        let index = FeatureIndex::build(&[PathBuf::from("/definitely/not/here")]);
        assert!(index.is_empty());
    }
}
