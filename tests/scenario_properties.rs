use rust_behat::config::{AmbiguityPolicy, RunnerConfig};
use rust_behat::context::{ContextGraph, ContextParameters};
use rust_behat::engine::{
    EngineEvent, EngineHandles, ExecutorState, ScenarioJob, StepStatus, run_scenario, run_suite,
};
use rust_behat::matcher::{MatchOutcome, match_step};
use rust_behat::registry::TagSet;
use rust_behat::scenario::{Feature, Scenario, Suite, load_suite_from_reader};
use rust_behat::{CapabilityRegistry, ContextClass, Hook, HookPhase, RegistryError, StepDefinition};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

#[derive(Default)]
struct World {
    seen: Vec<String>,
    happened: bool,
}

fn base_registry() -> CapabilityRegistry {
    let mut registry = CapabilityRegistry::new();
    registry
        .register_class(ContextClass::of_default::<World>("World"))
        .expect("클래스 등록 실패");
    registry
}

fn end_to_end_registry(after_runs: Arc<AtomicUsize>) -> Arc<CapabilityRegistry> {
    let mut registry = base_registry();
    registry
        .register(StepDefinition::new("World", "we have some context", |_scope, _args| {
            Box::pin(async { Ok(()) })
        }))
        .expect("등록");
    registry
        .register(StepDefinition::new("World", "event occurs", |scope, _args| {
            Box::pin(async move {
                scope.context::<World>()?.happened = true;
                Ok(())
            })
        }))
        .expect("등록");
    registry
        .register(StepDefinition::new("World", "event explodes", |_scope, _args| {
            Box::pin(async { Err::<(), _>(anyhow::anyhow!("event handler raised")) })
        }))
        .expect("등록");
    registry
        .register(StepDefinition::new("World", "something should be done", |scope, _args| {
            Box::pin(async move {
                anyhow::ensure!(scope.context::<World>()?.happened, "nothing happened");
                Ok(())
            })
        }))
        .expect("등록");
    registry
        .register(Hook::scoped("World", HookPhase::AfterScenario, move |_scope, _subject| {
            let after_runs = after_runs.clone();
            Box::pin(async move {
                after_runs.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
        }))
        .expect("등록");
    Arc::new(registry)
}

async fn run_single(registry: Arc<CapabilityRegistry>, texts: &[&str]) -> rust_behat::ScenarioOutcome {
    let handles = EngineHandles::prepare(
        registry,
        Arc::new(RunnerConfig::default()),
        "World",
        ContextParameters::new(),
    )
    .expect("구성 검증 실패");
    let (tx, _rx) = mpsc::unbounded_channel();
    let job = ScenarioJob {
        feature: "events".into(),
        tags: TagSet::new(),
        scenario: Scenario::from_texts("handles an event", texts),
    };
    run_scenario(job, Arc::new(handles), tx, CancellationToken::new()).await
}

#[tokio::test]
async fn passing_scenario_reports_every_step_in_order() {
    let after_runs = Arc::new(AtomicUsize::new(0));
    let outcome = run_single(
        end_to_end_registry(after_runs.clone()),
        &["we have some context", "event occurs", "something should be done"],
    )
    .await;
    assert_eq!(outcome.status, StepStatus::Passed);
    assert_eq!(outcome.final_state, ExecutorState::Finalized);
    let texts: Vec<_> = outcome.steps.iter().map(|s| (s.text.as_str(), s.status)).collect();
    assert_eq!(
        texts,
        vec![
            ("we have some context", StepStatus::Passed),
            ("event occurs", StepStatus::Passed),
            ("something should be done", StepStatus::Passed),
        ]
    );
    assert_eq!(after_runs.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn failing_step_skips_the_rest_and_still_cleans_up_once() {
    let after_runs = Arc::new(AtomicUsize::new(0));
    let outcome = run_single(
        end_to_end_registry(after_runs.clone()),
        &["we have some context", "event explodes", "something should be done"],
    )
    .await;
    let statuses: Vec<_> = outcome.steps.iter().map(|s| s.status).collect();
    assert_eq!(
        statuses,
        vec![StepStatus::Passed, StepStatus::Failed, StepStatus::Skipped]
    );
    assert_eq!(outcome.status, StepStatus::Failed);
    assert_eq!(outcome.cause(), Some("event handler raised"));
    assert_eq!(outcome.hook_runs(HookPhase::AfterScenario), 1);
    assert_eq!(after_runs.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn concurrent_scenarios_never_observe_each_other() {
    let mut registry = base_registry();
    registry
        .register(StepDefinition::new("World", "I record :value", |scope, args| {
            Box::pin(async move {
                let value = args.text(0)?;
                tokio::time::sleep(Duration::from_millis(5)).await;
                scope.context::<World>()?.seen.push(value);
                Ok(())
            })
        }))
        .expect("등록");
    registry
        .register(StepDefinition::new("World", "only :value is recorded", |scope, args| {
            Box::pin(async move {
                let value = args.text(0)?;
                tokio::time::sleep(Duration::from_millis(5)).await;
                let seen = &scope.context::<World>()?.seen;
                anyhow::ensure!(seen.iter().all(|v| *v == value), "다른 시나리오 값이 보입니다: {seen:?}");
                Ok(())
            })
        }))
        .expect("등록");

    let scenarios = (0..8)
        .map(|n| {
            let value = format!("s{n}");
            Scenario::from_texts(
                value.clone(),
                &[
                    format!("I record {value}"),
                    format!("I record {value}"),
                    format!("only {value} is recorded"),
                ],
            )
        })
        .collect();
    let suite = Suite::new("isolation", "World", vec![Feature::new("parallel", scenarios)]);
    let config = RunnerConfig {
        concurrency: 8,
        ..RunnerConfig::default()
    };
    let (tx, mut rx) = mpsc::unbounded_channel();
    let outcome = run_suite(&suite, Arc::new(registry), Arc::new(config), tx, CancellationToken::new())
        .await
        .expect("실행");
    assert_eq!(outcome.status(), StepStatus::Passed);
    assert_eq!(outcome.scenarios().count(), 8);

    let mut finished = 0;
    while let Ok(event) = rx.try_recv() {
        if matches!(event, EngineEvent::ScenarioFinished { .. }) {
            finished += 1;
        }
    }
    assert_eq!(finished, 8);
}

#[test]
fn single_match_is_deterministic() {
    let mut registry = base_registry();
    for pattern in ["I add :n", "I subtract :n", "/^I add (\\d+) twice$/"] {
        registry
            .register(StepDefinition::new("World", pattern, |_scope, _args| {
                Box::pin(async { Ok(()) })
            }))
            .expect("등록");
    }
    let classes: BTreeSet<String> = ["World".to_string()].into_iter().collect();
    let table = registry.dispatch_table(&classes);
    for _ in 0..5 {
        let outcome = match_step("I add 3", &table, AmbiguityPolicy::Fatal).expect("매칭");
        let MatchOutcome::Matched(found) = outcome else {
            panic!("일치해야 합니다");
        };
        assert_eq!(found.definition.pattern().source(), "I add :n");
        assert_eq!(found.captures, vec![Some("3".to_string())]);
    }
}

#[tokio::test]
async fn aliases_round_trip_from_any_node() {
    let mut registry = CapabilityRegistry::new();
    registry
        .register_class(
            ContextClass::of_default::<World>("Root")
                .with_subcontext("aliasA", "A")
                .with_subcontext("aliasB", "B"),
        )
        .expect("등록");
    registry
        .register_class(ContextClass::of_default::<World>("A"))
        .expect("등록");
    registry
        .register_class(ContextClass::of_default::<World>("B"))
        .expect("등록");

    let graph = ContextGraph::compose(&registry, "Root", &ContextParameters::new())
        .await
        .expect("구성");
    let root = graph.root();
    let a = graph.resolve(root, "aliasA").expect("aliasA");
    let b = graph.resolve(root, "aliasB").expect("aliasB");
    assert_ne!(a, b);
    assert_eq!(graph.resolve(a, "aliasB").expect("A에서 aliasB"), b);
    assert_eq!(graph.resolve(b, "aliasA").expect("B에서 aliasA"), a);
}

#[test]
fn duplicate_pattern_is_rejected_before_running() {
    let mut registry = base_registry();
    registry
        .register_class(ContextClass::of_default::<World>("Other"))
        .expect("등록");
    registry
        .register(StepDefinition::new("World", "event occurs", |_scope, _args| {
            Box::pin(async { Ok(()) })
        }))
        .expect("첫 등록");
    let err = registry
        .register(StepDefinition::new("Other", "event occurs", |_scope, _args| {
            Box::pin(async { Ok(()) })
        }))
        .expect_err("중복 패턴");
    assert!(matches!(err, RegistryError::DuplicatePattern { arity: 0, .. }));
}

#[tokio::test]
async fn yaml_suite_runs_against_nested_contexts() {
    #[derive(Debug)]
    struct Counter {
        value: i64,
    }

    let mut registry = CapabilityRegistry::new();
    registry
        .register_class(ContextClass::of_default::<World>("World").with_subcontext("counter", "Counter"))
        .expect("등록");
    registry
        .register_class(ContextClass::new("Counter", |params| {
            let value = params.get("start").and_then(serde_yaml::Value::as_i64).unwrap_or(0);
            Ok(Counter { value })
        }))
        .expect("등록");
    registry
        .register(StepDefinition::new("Counter", "I add :n", |scope, args| {
            Box::pin(async move {
                scope.context::<Counter>()?.value += args.int(0)?;
                Ok(())
            })
        }))
        .expect("등록");
    registry
        .register(StepDefinition::new("World", "the counter shows :n", |scope, args| {
            Box::pin(async move {
                let expected = args.int(0)?;
                let actual = scope.subcontext::<Counter>("counter")?.value;
                anyhow::ensure!(actual == expected, "{actual} != {expected}");
                Ok(())
            })
        }))
        .expect("등록");

    let yaml = r#"
name: counting
root_context: World
parameters:
  Counter:
    start: 5
features:
  - name: Counting
    scenarios:
      - name: adds to the seeded value
        steps:
          - I add 2
          - the counter shows 7
      - name: undefined steps are pending
        steps:
          - I add 1
          - I multiply by 2
          - the counter shows 12
"#;
    let suite = load_suite_from_reader(&mut yaml.as_bytes()).expect("파싱");
    let (tx, _rx) = mpsc::unbounded_channel();
    let outcome = run_suite(
        &suite,
        Arc::new(registry),
        Arc::new(RunnerConfig::default()),
        tx,
        CancellationToken::new(),
    )
    .await
    .expect("실행");
    let statuses: Vec<_> = outcome.scenarios().map(|s| s.status).collect();
    assert_eq!(statuses, vec![StepStatus::Passed, StepStatus::Pending]);
    assert_eq!(outcome.exit_code(), 1);
}
