use super::state::{ExecutorState, HookRecord, ScenarioOutcome, ScenarioRef, StepResult, StepStatus};
use tokio::sync::mpsc::UnboundedSender;

/// 엔진에서 보고 협력자로 실시간 전달되는 이벤트 모델이다.
#[derive(Debug, Clone)]
pub enum EngineEvent {
    /// 스위트 시작.
    SuiteStarted { suite: String },
    /// 피처 시작.
    FeatureStarted { feature: String },
    /// 시나리오 시작.
    ScenarioStarted { scenario: ScenarioRef },
    /// 실행기 상태 전이.
    StateChanged {
        scenario: ScenarioRef,
        state: ExecutorState,
    },
    /// Hook 종료. 스위트/피처 Hook은 `scenario`가 없다.
    HookFinished {
        scenario: Option<ScenarioRef>,
        record: HookRecord,
    },
    /// Step 시작.
    StepStarted {
        scenario: ScenarioRef,
        index: usize,
        text: String,
    },
    /// Step 종료.
    StepFinished {
        scenario: ScenarioRef,
        result: StepResult,
    },
    /// 시나리오 종료.
    ScenarioFinished { outcome: ScenarioOutcome },
    /// 피처 종료.
    FeatureFinished { feature: String, status: StepStatus },
    /// 스위트 종료.
    SuiteFinished { suite: String, status: StepStatus },
}

/// 이벤트 송신 채널이다.
pub type EventSender = UnboundedSender<EngineEvent>;

/// 이벤트를 송신한다. 수신 측이 닫혀 있어도 실행에는 영향이 없다.
pub(crate) fn emit(sender: &EventSender, event: EngineEvent) {
    let _ = sender.send(event);
}
