use super::events::{EngineEvent, EventSender, emit};
use super::hooks::{any_failed, run_scoped_hooks, settle};
use super::resources::EngineHandles;
use super::state::{ExecutorState, HookRecord, ScenarioOutcome, ScenarioRef, StepResult, StepStatus};
use crate::config::{FailurePolicy, UndefinedPolicy};
use crate::context::{ContextGraph, Scope};
use crate::error::{ArgError, EngineError};
use crate::matcher::{MatchOutcome, StepArgs, match_step};
use crate::registry::{HookPhase, HookSubject, StepBinding, TagSet};
use crate::scenario::{Scenario, Step};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// 실행기에 넘기는 시나리오 하나와 상속된 태그이다.
#[derive(Debug, Clone)]
pub struct ScenarioJob {
    /// 소속 피처 이름.
    pub feature: String,
    /// 피처 태그를 상속한 시나리오 태그.
    pub tags: TagSet,
    pub scenario: Scenario,
}

impl ScenarioJob {
    /// 보고용 식별 정보.
    pub fn scenario_ref(&self) -> ScenarioRef {
        ScenarioRef {
            feature: self.feature.clone(),
            name: self.scenario.name.clone(),
            line: self.scenario.line,
        }
    }
}

/// 이후 Step을 실행하지 않는 이유.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Halt {
    Failure,
    Undefined,
    Cancelled,
}

/// Scenario 하나를 새 컨텍스트 그래프 위에서 실행하고 결과를 반환한다.
///
/// 시나리오 안에서 발생한 오류는 모두 결과에 기록되며 호출자에게 전파되지 않는다.
pub async fn run_scenario(
    job: ScenarioJob,
    handles: Arc<EngineHandles>,
    sender: EventSender,
    cancel: CancellationToken,
) -> ScenarioOutcome {
    let executor = ScenarioExecutor {
        handles: &handles,
        sender: &sender,
        scenario: job.scenario_ref(),
        tags: &job.tags,
    };
    executor.run(&job.scenario.steps, &cancel).await
}

struct ScenarioExecutor<'h> {
    handles: &'h EngineHandles,
    sender: &'h EventSender,
    scenario: ScenarioRef,
    tags: &'h TagSet,
}

impl<'h> ScenarioExecutor<'h> {
    /// 상태 전이를 기록하고 이벤트로 알린다.
    fn transition(&self, state: ExecutorState) {
        debug!(scenario = %self.scenario, ?state, "상태 전이");
        emit(
            self.sender,
            EngineEvent::StateChanged {
                scenario: self.scenario.clone(),
                state,
            },
        );
    }

    /// Step 종료 이벤트를 송신하고 결과를 그대로 돌려준다.
    fn finish_step(&self, result: StepResult) -> StepResult {
        emit(
            self.sender,
            EngineEvent::StepFinished {
                scenario: self.scenario.clone(),
                result: result.clone(),
            },
        );
        result
    }

    /// 실행하지 않은 Step 결과.
    fn skipped(&self, index: usize, step: &Step) -> StepResult {
        self.finish_step(StepResult::new(index, &step.text, step.line, StepStatus::Skipped))
    }

    /// 일치하는 정의가 없는 Step 결과. strict이면 Failed이다.
    fn undefined(&self, mut result: StepResult) -> StepResult {
        result.status = if self.handles.config.strict {
            StepStatus::Failed
        } else {
            StepStatus::Pending
        };
        result.undefined = true;
        result.error = Some(format!("정의되지 않은 Step입니다: '{}'", result.text));
        result
    }

    /// 최종 상태로 전이하고 시나리오 결과를 만든다.
    fn finish(
        &self,
        steps: Vec<StepResult>,
        hooks: Vec<HookRecord>,
        final_state: ExecutorState,
        setup_error: Option<String>,
    ) -> ScenarioOutcome {
        self.transition(final_state);
        let outcome = ScenarioOutcome {
            scenario: self.scenario.clone(),
            status: ScenarioOutcome::compute_status(&steps, &hooks, setup_error.is_some()),
            final_state,
            steps,
            hooks,
            setup_error,
        };
        info!(scenario = %self.scenario, status = %outcome.status, "시나리오 종료");
        emit(
            self.sender,
            EngineEvent::ScenarioFinished {
                outcome: outcome.clone(),
            },
        );
        outcome
    }

    /// 구성, Hook, Step, 정리 순서로 상태 머신을 끝까지 진행한다.
    async fn run(self, steps: &[Step], cancel: &CancellationToken) -> ScenarioOutcome {
        emit(
            self.sender,
            EngineEvent::ScenarioStarted {
                scenario: self.scenario.clone(),
            },
        );
        self.transition(ExecutorState::Initializing);

        if cancel.is_cancelled() {
            let results = self.skip_all(steps);
            return self.finish(results, Vec::new(), ExecutorState::Aborted, None);
        }

        let handles = self.handles;
        let graph = match ContextGraph::from_plan(&handles.registry, &handles.plan, &handles.parameters).await {
            Ok(graph) => graph,
            Err(err) => {
                let err = EngineError::Setup(err);
                warn!(scenario = %self.scenario, error = %err, "컨텍스트 구성 실패");
                let results = self.skip_all(steps);
                return self.finish(results, Vec::new(), ExecutorState::Aborted, Some(err.to_string()));
            }
        };
        let classes = graph.classes();
        let table = handles.registry.dispatch_table(&classes);
        let mut scope = Scope::new(graph);
        let mut hooks = Vec::new();
        let subject = HookSubject::Scenario {
            scenario: self.scenario.clone(),
            tags: self.tags.clone(),
        };

        self.transition(ExecutorState::RunningHooks(HookPhase::BeforeScenario));
        let before = handles
            .registry
            .lookup_for(HookPhase::BeforeScenario, self.tags, &classes);
        let records = run_scoped_hooks(&before, &mut scope, &subject, &self.scenario, None, self.sender).await;
        let mut halt = any_failed(&records).then_some(Halt::Failure);
        hooks.extend(records);

        let mut results = Vec::with_capacity(steps.len());
        for (index, step) in steps.iter().enumerate() {
            if halt.is_none() && cancel.is_cancelled() {
                info!(scenario = %self.scenario, step = index, "중단 요청으로 남은 Step을 건너뜁니다");
                halt = Some(Halt::Cancelled);
            }
            let result = match halt {
                Some(Halt::Undefined)
                    if handles.config.undefined == UndefinedPolicy::ContinueMatching =>
                {
                    self.finish_step(self.match_only(index, step, &table))
                }
                Some(_) => self.skipped(index, step),
                None => {
                    self.transition(ExecutorState::RunningStep(index));
                    let (result, hook_failed) = self
                        .execute_step(index, step, &table, &classes, &mut scope, &mut hooks)
                        .await;
                    if result.undefined {
                        halt = Some(Halt::Undefined);
                    } else if (result.status == StepStatus::Failed || hook_failed)
                        && handles.config.failure == FailurePolicy::SkipRest
                    {
                        halt = Some(Halt::Failure);
                    }
                    self.finish_step(result)
                }
            };
            results.push(result);
        }

        self.transition(ExecutorState::RunningHooks(HookPhase::AfterScenario));
        let after = handles
            .registry
            .lookup_for(HookPhase::AfterScenario, self.tags, &classes);
        let records = run_scoped_hooks(&after, &mut scope, &subject, &self.scenario, None, self.sender).await;
        hooks.extend(records);
        drop(scope);

        let final_state = if halt == Some(Halt::Cancelled) {
            ExecutorState::Aborted
        } else {
            ExecutorState::Finalized
        };
        self.finish(results, hooks, final_state, None)
    }

    /// 모든 Step을 Skipped로 처리한다.
    fn skip_all(&self, steps: &[Step]) -> Vec<StepResult> {
        steps
            .iter()
            .enumerate()
            .map(|(index, step)| self.skipped(index, step))
            .collect()
    }

    /// Undefined 이후 Step을 실행 없이 매칭만 해 본다.
    fn match_only(&self, index: usize, step: &Step, table: &[&StepBinding]) -> StepResult {
        let mut result = StepResult::new(index, &step.text, step.line, StepStatus::Skipped);
        match match_step(&step.text, table, self.handles.config.ambiguity) {
            Ok(MatchOutcome::Matched(found)) => {
                result.definition = Some(found.definition.describe());
                result
            }
            Ok(MatchOutcome::NoMatch) => self.undefined(result),
            Err(err) => {
                result.status = StepStatus::Failed;
                result.error = Some(err.to_string());
                result
            }
        }
    }

    /// Step 하나를 매칭하고 before/after-step Hook으로 감싸 실행한다.
    ///
    /// 두 번째 값은 Step Hook 실패 여부이다.
    async fn execute_step(
        &self,
        index: usize,
        step: &Step,
        table: &[&StepBinding],
        classes: &BTreeSet<String>,
        scope: &mut Scope,
        hooks: &mut Vec<HookRecord>,
    ) -> (StepResult, bool) {
        emit(
            self.sender,
            EngineEvent::StepStarted {
                scenario: self.scenario.clone(),
                index,
                text: step.text.clone(),
            },
        );
        let mut result = StepResult::new(index, &step.text, step.line, StepStatus::Passed);
        let found = match match_step(&step.text, table, self.handles.config.ambiguity) {
            Ok(MatchOutcome::Matched(found)) => found,
            Ok(MatchOutcome::NoMatch) => {
                debug!(scenario = %self.scenario, step = %step.text, "정의되지 않은 Step");
                return (self.undefined(result), false);
            }
            Err(err) => {
                result.status = StepStatus::Failed;
                result.error = Some(err.to_string());
                return (result, false);
            }
        };
        let definition = found.definition;
        result.definition = Some(definition.describe());

        let registry = &self.handles.registry;
        let before_subject = HookSubject::Step {
            scenario: self.scenario.clone(),
            index,
            text: step.text.clone(),
            status: None,
        };
        let before = registry.lookup_for(HookPhase::BeforeStep, self.tags, classes);
        let records =
            run_scoped_hooks(&before, scope, &before_subject, &self.scenario, Some(index), self.sender).await;
        let mut hook_failed = any_failed(&records);
        hooks.extend(records);

        if hook_failed {
            result.status = StepStatus::Skipped;
        } else {
            self.invoke(definition, found.arguments(), scope, &mut result).await;
        }

        let after_subject = HookSubject::Step {
            scenario: self.scenario.clone(),
            index,
            text: step.text.clone(),
            status: Some(result.status),
        };
        let after = registry.lookup_for(HookPhase::AfterStep, self.tags, classes);
        let records =
            run_scoped_hooks(&after, scope, &after_subject, &self.scenario, Some(index), self.sender).await;
        hook_failed |= any_failed(&records);
        hooks.extend(records);
        (result, hook_failed)
    }

    /// 인자를 준비하고 선언 클래스 노드에서 Step을 호출한다.
    async fn invoke(
        &self,
        definition: &StepBinding,
        arguments: Result<StepArgs, ArgError>,
        scope: &mut Scope,
        result: &mut StepResult,
    ) {
        let args = match arguments {
            Ok(args) => args,
            Err(err) => {
                result.status = StepStatus::Failed;
                result.error = Some(err.to_string());
                return;
            }
        };
        // 디스패치 테이블은 그래프에 있는 클래스만 담는다.
        let Some(node) = scope.graph().first_of_class(definition.class()) else {
            result.status = StepStatus::Failed;
            result.error = Some(format!("'{}' 노드를 찾을 수 없습니다.", definition.class()));
            return;
        };
        scope.enter(node);
        let started = Instant::now();
        let outcome = settle((definition.callable)(scope, args)).await;
        result.duration = started.elapsed();
        if let Err(message) = outcome {
            debug!(scenario = %self.scenario, step = %result.text, error = %message, "Step 실패");
            result.status = StepStatus::Failed;
            result.error = Some(message);
        }
    }
}
