use super::events::{EngineEvent, EventSender, emit};
use super::state::{HookRecord, ScenarioRef, StepStatus};
use crate::context::Scope;
use crate::registry::{CallableFuture, HookBinding, HookFn, HookSubject};
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use tracing::{debug, warn};

/// 사용자 호출을 끝까지 기다리고 오류나 panic을 메시지로 변환한다.
pub(super) async fn settle(future: CallableFuture<'_>) -> Result<(), String> {
    match AssertUnwindSafe(future).catch_unwind().await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(err)) => Err(format!("{err:#}")),
        Err(payload) => Err(panic_message(payload.as_ref())),
    }
}

/// panic payload에서 메시지를 꺼낸다.
fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("panic: {message}")
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("panic: {message}")
    } else {
        "panic: 알 수 없는 payload".to_string()
    }
}

/// Hook 실행 결과를 기록으로 변환한다. 실패는 경고로 남긴다.
fn record(hook: &HookBinding, step: Option<usize>, result: Result<(), String>) -> HookRecord {
    let (status, error) = match result {
        Ok(()) => (StepStatus::Passed, None),
        Err(message) => {
            warn!(class = %hook.class(), phase = %hook.phase(), error = %message, "Hook 실패");
            (StepStatus::Failed, Some(message))
        }
    };
    HookRecord {
        phase: hook.phase(),
        class: hook.class().to_string(),
        status,
        error,
        step,
    }
}

/// 시나리오/Step 단계 Hook을 등록 순서대로 실행한다.
///
/// 앞선 Hook이 실패해도 나머지를 모두 실행한다.
pub(super) async fn run_scoped_hooks(
    hooks: &[&HookBinding],
    scope: &mut Scope,
    subject: &HookSubject,
    scenario: &ScenarioRef,
    step: Option<usize>,
    sender: &EventSender,
) -> Vec<HookRecord> {
    let mut records = Vec::with_capacity(hooks.len());
    for hook in hooks {
        let HookFn::Scoped(callable) = &hook.callable else {
            continue;
        };
        let Some(node) = scope.graph().first_of_class(hook.class()) else {
            continue;
        };
        debug!(class = %hook.class(), phase = %hook.phase(), "Hook 실행");
        scope.enter(node);
        let result = settle(callable(scope, subject.clone())).await;
        let record = record(hook, step, result);
        emit(
            sender,
            EngineEvent::HookFinished {
                scenario: Some(scenario.clone()),
                record: record.clone(),
            },
        );
        records.push(record);
    }
    records
}

/// 스위트/피처 단계 Hook을 등록 순서대로 실행한다.
pub(super) async fn run_static_hooks(
    hooks: &[&HookBinding],
    subject: &HookSubject,
    sender: &EventSender,
) -> Vec<HookRecord> {
    let mut records = Vec::with_capacity(hooks.len());
    for hook in hooks {
        let HookFn::Static(callable) = &hook.callable else {
            continue;
        };
        debug!(class = %hook.class(), phase = %hook.phase(), "Hook 실행");
        let result = settle(callable(subject.clone())).await;
        let record = record(hook, None, result);
        emit(
            sender,
            EngineEvent::HookFinished {
                scenario: None,
                record: record.clone(),
            },
        );
        records.push(record);
    }
    records
}

/// 기록 중 실패가 있는지 여부.
pub(super) fn any_failed(records: &[HookRecord]) -> bool {
    records
        .iter()
        .any(|record| record.status == StepStatus::Failed)
}
