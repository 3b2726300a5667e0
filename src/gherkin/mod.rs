pub mod index;
pub mod matcher;

pub use index::{FeatureIndex, ScenarioRecord};
pub use matcher::{MatchKind, NoScenarios, ScenarioLookup, ScenarioMatch, find_scenario, normalize_title};
