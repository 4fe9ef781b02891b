pub mod harness;
pub mod reports;
pub mod scenarios;
pub mod tester;

pub use scenarios::{get_scenario, list_scenarios, scenario_names};
pub use tester::{LogicTester, ScenarioResult};
