use crate::registry::HookPhase;
use std::fmt;
use std::time::Duration;

/// Step 및 시나리오 결과 상태이다. 선언 순서가 심각도 오름차순이다.
///
/// `Failed > Pending > Skipped > Passed`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StepStatus {
    /// 정상 종료.
    Passed,
    /// 실행하지 않음.
    Skipped,
    /// 정의되지 않았거나 구현이 보류됨.
    Pending,
    /// 실패.
    Failed,
}

impl StepStatus {
    /// 상태 목록 중 가장 심각한 상태. 비어 있으면 Passed이다.
    pub fn worst(statuses: impl IntoIterator<Item = StepStatus>) -> StepStatus {
        statuses.into_iter().max().unwrap_or(StepStatus::Passed)
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StepStatus::Passed => "passed",
            StepStatus::Skipped => "skipped",
            StepStatus::Pending => "pending",
            StepStatus::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// 실행기 상태 머신의 상태이다.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutorState {
    Initializing,
    RunningHooks(HookPhase),
    RunningStep(usize),
    Finalized,
    Aborted,
}

impl ExecutorState {
    /// 더 이상 전이하지 않는 상태인지 여부.
    pub fn is_terminal(self) -> bool {
        matches!(self, ExecutorState::Finalized | ExecutorState::Aborted)
    }
}

/// 결과 보고에 쓰이는 시나리오 식별 정보이다.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ScenarioRef {
    pub feature: String,
    pub name: String,
    pub line: u32,
}

impl fmt::Display for ScenarioRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} / {} (line {})", self.feature, self.name, self.line)
    }
}

/// Step 하나의 실행 결과이다.
#[derive(Debug, Clone, PartialEq)]
pub struct StepResult {
    /// 시나리오 안 위치(0부터).
    pub index: usize,
    /// Step 문장.
    pub text: String,
    /// 원본 줄 번호.
    pub line: u32,
    /// 결과 상태.
    pub status: StepStatus,
    /// 일치한 정의의 `클래스::패턴` 표기.
    pub definition: Option<String>,
    /// 일치하는 정의가 없었는지 여부.
    pub undefined: bool,
    /// 실패 원인.
    pub error: Option<String>,
    /// 호출 소요 시간. 실행하지 않은 Step은 0이다.
    pub duration: Duration,
}

impl StepResult {
    pub(crate) fn new(index: usize, text: &str, line: u32, status: StepStatus) -> Self {
        Self {
            index,
            text: text.to_string(),
            line,
            status,
            definition: None,
            undefined: false,
            error: None,
            duration: Duration::ZERO,
        }
    }
}

/// Hook 한 번의 실행 기록이다.
#[derive(Debug, Clone, PartialEq)]
pub struct HookRecord {
    pub phase: HookPhase,
    pub class: String,
    /// Passed 또는 Failed.
    pub status: StepStatus,
    pub error: Option<String>,
    /// before/after-step Hook이 감싼 Step 위치.
    pub step: Option<usize>,
}

/// 시나리오 하나의 최종 결과이다.
#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioOutcome {
    pub scenario: ScenarioRef,
    /// Hook, Step을 통틀어 가장 심각한 상태.
    pub status: StepStatus,
    /// Finalized 또는 Aborted.
    pub final_state: ExecutorState,
    pub steps: Vec<StepResult>,
    pub hooks: Vec<HookRecord>,
    /// 컨텍스트 구성 실패 원인.
    pub setup_error: Option<String>,
}

impl ScenarioOutcome {
    /// 결과 상태를 Hook과 Step 기록으로부터 계산한다.
    pub(crate) fn compute_status(steps: &[StepResult], hooks: &[HookRecord], setup_failed: bool) -> StepStatus {
        let base = if setup_failed {
            StepStatus::Failed
        } else {
            StepStatus::Passed
        };
        StepStatus::worst(
            std::iter::once(base)
                .chain(steps.iter().map(|step| step.status))
                .chain(hooks.iter().map(|hook| hook.status)),
        )
    }

    /// 보고할 대표 실패 원인. 구성 실패, before Hook, Step, after Hook 순으로 먼저 발생한 것이다.
    pub fn cause(&self) -> Option<&str> {
        if let Some(err) = &self.setup_error {
            return Some(err);
        }
        let before_hook = self
            .hooks
            .iter()
            .filter(|hook| hook.phase == HookPhase::BeforeScenario)
            .find_map(|hook| hook.error.as_deref());
        before_hook
            .or_else(|| self.steps.iter().find_map(|step| step.error.as_deref()))
            .or_else(|| self.hooks.iter().find_map(|hook| hook.error.as_deref()))
    }

    /// 특정 단계 Hook 실행 횟수.
    pub fn hook_runs(&self, phase: HookPhase) -> usize {
        self.hooks.iter().filter(|hook| hook.phase == phase).count()
    }
}

/// 피처 하나의 결과이다.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureOutcome {
    pub name: String,
    pub scenarios: Vec<ScenarioOutcome>,
    pub hooks: Vec<HookRecord>,
}

impl FeatureOutcome {
    /// 시나리오와 피처 Hook을 통틀어 가장 심각한 상태.
    pub fn status(&self) -> StepStatus {
        StepStatus::worst(
            self.scenarios
                .iter()
                .map(|scenario| scenario.status)
                .chain(self.hooks.iter().map(|hook| hook.status)),
        )
    }
}

/// 스위트 전체 결과이다.
#[derive(Debug, Clone, PartialEq)]
pub struct SuiteOutcome {
    pub name: String,
    pub features: Vec<FeatureOutcome>,
    pub hooks: Vec<HookRecord>,
    /// 중단 요청으로 일부가 실행되지 않았는지 여부.
    pub cancelled: bool,
}

impl SuiteOutcome {
    /// 전체에서 가장 심각한 상태.
    pub fn status(&self) -> StepStatus {
        StepStatus::worst(
            self.features
                .iter()
                .map(FeatureOutcome::status)
                .chain(self.hooks.iter().map(|hook| hook.status)),
        )
    }

    /// 모든 시나리오 결과를 순서대로 순회한다.
    pub fn scenarios(&self) -> impl Iterator<Item = &ScenarioOutcome> {
        self.features.iter().flat_map(|feature| feature.scenarios.iter())
    }

    /// 프로세스 종료 코드. Failed/Pending이거나 중단되었으면 1이다.
    pub fn exit_code(&self) -> i32 {
        if self.cancelled {
            return 1;
        }
        match self.status() {
            StepStatus::Passed | StepStatus::Skipped => 0,
            StepStatus::Pending | StepStatus::Failed => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hook(phase: HookPhase, error: Option<&str>) -> HookRecord {
        HookRecord {
            phase,
            class: "Ctx".into(),
            status: if error.is_some() {
                StepStatus::Failed
            } else {
                StepStatus::Passed
            },
            error: error.map(str::to_string),
            step: None,
        }
    }

    #[test]
    fn severity_order_is_failed_pending_skipped_passed() {
        use StepStatus::*;
        assert_eq!(StepStatus::worst([Passed, Skipped]), Skipped);
        assert_eq!(StepStatus::worst([Skipped, Pending, Passed]), Pending);
        assert_eq!(StepStatus::worst([Pending, Failed, Skipped]), Failed);
        assert_eq!(StepStatus::worst([]), Passed);
    }

    #[test]
    fn after_hook_failure_does_not_replace_step_cause() {
        let mut failing = StepResult::new(1, "event occurs", 2, StepStatus::Failed);
        failing.error = Some("boom".into());
        let steps = vec![
            StepResult::new(0, "we have some context", 1, StepStatus::Passed),
            failing,
        ];
        let hooks = vec![
            hook(HookPhase::BeforeScenario, None),
            hook(HookPhase::AfterScenario, Some("cleanup failed")),
        ];
        let outcome = ScenarioOutcome {
            scenario: ScenarioRef {
                feature: "f".into(),
                name: "s".into(),
                line: 1,
            },
            status: ScenarioOutcome::compute_status(&steps, &hooks, false),
            final_state: ExecutorState::Finalized,
            steps,
            hooks,
            setup_error: None,
        };
        assert_eq!(outcome.status, StepStatus::Failed);
        assert_eq!(outcome.cause(), Some("boom"));
        assert_eq!(outcome.hook_runs(HookPhase::AfterScenario), 1);
    }

    #[test]
    fn exit_code_reflects_worst_scenario() {
        let feature = |status| FeatureOutcome {
            name: "f".into(),
            scenarios: vec![ScenarioOutcome {
                scenario: ScenarioRef {
                    feature: "f".into(),
                    name: "s".into(),
                    line: 0,
                },
                status,
                final_state: ExecutorState::Finalized,
                steps: Vec::new(),
                hooks: Vec::new(),
                setup_error: None,
            }],
            hooks: Vec::new(),
        };
        let passing = SuiteOutcome {
            name: "suite".into(),
            features: vec![feature(StepStatus::Passed), feature(StepStatus::Skipped)],
            hooks: Vec::new(),
            cancelled: false,
        };
        assert_eq!(passing.exit_code(), 0);
        let pending = SuiteOutcome {
            features: vec![feature(StepStatus::Passed), feature(StepStatus::Pending)],
            ..passing.clone()
        };
        assert_eq!(pending.status(), StepStatus::Pending);
        assert_eq!(pending.exit_code(), 1);
    }

    #[test]
    fn cancelled_suite_never_exits_successfully() {
        let interrupted = SuiteOutcome {
            name: "suite".into(),
            features: Vec::new(),
            hooks: Vec::new(),
            cancelled: true,
        };
        assert_eq!(interrupted.status(), StepStatus::Passed);
        assert_eq!(interrupted.exit_code(), 1);
    }
}
