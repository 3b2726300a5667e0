//! Resolve a runtime test title to an indexed scenario.
//!
//! Precedence: exact title, then normalized equality, then substring
//! containment in either direction. The substring pass walks scenarios once,
//! and a scenario hits when its lowercase title or its normalized title
//! contains (or is contained in) the test title in the same form. Hits are
//! taken in index insertion order, so two scenarios whose titles overlap
//! resolve to whichever was indexed first.

use serde::Serialize;
use tracing::debug;
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

use super::index::{FeatureIndex, ScenarioRecord};

/// Which rule produced a match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchKind {
    Exact,
    Normalized,
    Substring,
}

/// A resolved scenario
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScenarioMatch<'a> {
    pub kind: MatchKind,
    pub scenario: &'a ScenarioRecord,
}

/// Source of BDD steps for a test title.
///
/// The report renderer only needs this; `FeatureIndex` is the real
/// implementation and tests can supply fixed maps.
pub trait ScenarioLookup {
    /// Steps for the scenario matching `title`, if any
    fn steps_for(&self, title: &str) -> Option<&[String]>;
}

impl ScenarioLookup for FeatureIndex {
    fn steps_for(&self, title: &str) -> Option<&[String]> {
        find_scenario(self, title).map(|m| m.scenario.steps.as_slice())
    }
}

/// Lookup that never matches, for reports without feature files
#[derive(Debug, Clone, Copy, Default)]
pub struct NoScenarios;

impl ScenarioLookup for NoScenarios {
    fn steps_for(&self, _title: &str) -> Option<&[String]> {
        None
    }
}

/// Lowercase, strip diacritics and drop everything but `[a-z0-9]`
pub fn normalize_title(title: &str) -> String {
    title
        .to_lowercase()
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        .collect()
}

fn contains_either(a: &str, b: &str) -> bool {
    !a.is_empty() && !b.is_empty() && (a.contains(b) || b.contains(a))
}

/// Find the best scenario for a test title
pub fn find_scenario<'a>(index: &'a FeatureIndex, title: &str) -> Option<ScenarioMatch<'a>> {
    if let Some(scenario) = index.get(title) {
        debug!(title, "exact scenario match");
        return Some(ScenarioMatch {
            kind: MatchKind::Exact,
            scenario,
        });
    }

    let normalized_test = normalize_title(title);
    let raw_test = title.trim().to_lowercase();

    if !normalized_test.is_empty() {
        if let Some(scenario) = index
            .iter()
            .find(|s| normalize_title(&s.title) == normalized_test)
        {
            debug!(title, scenario = %scenario.title, "normalized scenario match");
            return Some(ScenarioMatch {
                kind: MatchKind::Normalized,
                scenario,
            });
        }
    }

    let hit = index.iter().find(|s| {
        let raw_scenario = s.title.trim().to_lowercase();
        contains_either(&raw_scenario, &raw_test)
            || contains_either(&normalize_title(&s.title), &normalized_test)
    });

    match hit {
        Some(scenario) => {
            debug!(title, scenario = %scenario.title, "partial scenario match");
            Some(ScenarioMatch {
                kind: MatchKind::Substring,
                scenario,
            })
        }
        None => {
            debug!(title, "no scenario match");
            None
        }
    }
}
