//! 컨텍스트 그래프 기반 BDD 시나리오 실행 엔진.
//!
//! 등록소([`registry`])에 컨텍스트 클래스와 Step/Hook을 등록한 뒤
//! [`engine::run_suite`]로 스위트를 실행한다. 시나리오마다 새 컨텍스트 그래프가
//! 구성되며 결과는 이벤트와 결과 레코드로 전달된다.

pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod matcher;
pub mod registry;
pub mod scenario;

pub use config::{AmbiguityPolicy, FailurePolicy, RunnerConfig, UndefinedPolicy};
pub use context::{ContextGraph, NodeId, Scope};
pub use engine::{
    EngineEvent, ScenarioOutcome, StepStatus, SuiteOutcome, run_scenario, run_suite,
    validate_suites,
};
pub use error::{ArgError, EngineError, GraphError, MatchError, RegistryError};
pub use matcher::{ArgKind, StepArgs};
pub use registry::{CapabilityRegistry, ContextClass, Hook, HookPhase, HookSubject, StepDefinition};
pub use scenario::{Feature, Scenario, Step, Suite};
