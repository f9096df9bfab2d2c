use crate::config::RunnerConfig;
use crate::context::{CompositionPlan, ContextParameters};
use crate::error::EngineError;
use crate::registry::CapabilityRegistry;
use crate::scenario::Suite;
use std::sync::Arc;

/// 시나리오 실행 중 필요한 공용 리소스를 캡슐화한다.
///
/// 모두 읽기 전용이며 병렬 시나리오 사이에서 공유된다.
#[derive(Debug, Clone)]
pub struct EngineHandles {
    /// 실행 전 구성이 끝난 등록소.
    pub registry: Arc<CapabilityRegistry>,
    /// 실행 설정.
    pub config: Arc<RunnerConfig>,
    /// 시나리오마다 구성할 루트 클래스 ID.
    pub root_context: String,
    /// 검증된 구성 계획.
    pub plan: Arc<CompositionPlan>,
    /// 클래스별 생성자 파라미터.
    pub parameters: Arc<ContextParameters>,
}

impl EngineHandles {
    /// 루트 클래스 구성을 검증하고 핸들을 만든다.
    ///
    /// 구성이 불가능하면 어떤 시나리오도 실행하기 전에 실패한다.
    pub fn prepare(
        registry: Arc<CapabilityRegistry>,
        config: Arc<RunnerConfig>,
        root_context: impl Into<String>,
        parameters: ContextParameters,
    ) -> Result<Self, EngineError> {
        let root_context = root_context.into();
        let plan = registry.validate_blueprint(&root_context)?;
        Ok(Self {
            registry,
            config,
            root_context,
            plan: Arc::new(plan),
            parameters: Arc::new(parameters),
        })
    }

    /// 스위트 선언으로부터 핸들을 만든다.
    pub fn for_suite(
        suite: &Suite,
        registry: Arc<CapabilityRegistry>,
        config: Arc<RunnerConfig>,
    ) -> Result<Self, EngineError> {
        Self::prepare(
            registry,
            config,
            suite.root_context.clone(),
            suite.parameters.clone(),
        )
    }
}
