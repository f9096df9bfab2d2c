mod events;
mod hooks;
mod resources;
mod runner;
mod state;
mod suite;

pub use events::{EngineEvent, EventSender};
pub use resources::EngineHandles;
pub use runner::{ScenarioJob, run_scenario};
pub use state::{
    ExecutorState, FeatureOutcome, HookRecord, ScenarioOutcome, ScenarioRef, StepResult,
    StepStatus, SuiteOutcome,
};
pub use suite::{run_suite, validate_suites};
