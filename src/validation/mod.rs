//! Rule catalog, scenario handling and the orchestrating validator.
pub mod context;
pub mod engine;
pub mod finding;
pub mod rules;
pub mod scenario;
pub mod selectors;
pub mod validator;

pub use finding::{Category, Finding, FindingKind, Severity};
pub use scenario::{Scenario, ScenarioSet};
pub use selectors::{Metric, Selector};
pub use validator::{CancellationToken, Validator};
