use super::events::{EngineEvent, EventSender, emit};
use super::hooks::{any_failed, run_static_hooks};
use super::resources::EngineHandles;
use super::runner::{ScenarioJob, run_scenario};
use super::state::{ExecutorState, FeatureOutcome, ScenarioOutcome, StepResult, StepStatus, SuiteOutcome};
use crate::config::RunnerConfig;
use crate::error::EngineError;
use crate::registry::{CapabilityRegistry, HookPhase, HookSubject, TagFilter, TagSet};
use crate::scenario::{Feature, Suite};
use futures::{FutureExt, StreamExt};
use futures::stream::FuturesUnordered;
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// 스위트 전체를 실행한다.
///
/// 구성 오류(루트 구성 불가, 잘못된 태그 필터)는 어떤 Hook이나 시나리오도 실행하기 전에 반환한다.
/// 그 외 오류는 모두 결과에 기록된다.
pub async fn run_suite(
    suite: &Suite,
    registry: Arc<CapabilityRegistry>,
    config: Arc<RunnerConfig>,
    sender: EventSender,
    cancel: CancellationToken,
) -> Result<SuiteOutcome, EngineError> {
    let filter = config.tags.as_deref().map(TagFilter::parse).transpose()?;
    let handles = Arc::new(EngineHandles::for_suite(suite, registry, config)?);
    let classes = handles.plan.classes();
    info!(
        suite = %suite.name,
        features = suite.features.len(),
        scenarios = suite.scenario_count(),
        "스위트 시작"
    );
    emit(
        &sender,
        EngineEvent::SuiteStarted {
            suite: suite.name.clone(),
        },
    );

    let no_tags = TagSet::new();
    let subject = HookSubject::Suite {
        name: suite.name.clone(),
    };
    let before = handles
        .registry
        .lookup_for(HookPhase::BeforeSuite, &no_tags, &classes);
    let mut hooks = run_static_hooks(&before, &subject, &sender).await;

    let mut features = Vec::with_capacity(suite.features.len());
    let mut cancelled = false;
    if !any_failed(&hooks) {
        for feature in &suite.features {
            if cancel.is_cancelled() {
                cancelled = true;
                break;
            }
            let runner = FeatureRunner {
                handles: &handles,
                filter: filter.as_ref(),
                classes: &classes,
                sender: &sender,
                cancel: &cancel,
            };
            features.push(runner.run(feature).await);
        }
        cancelled |= cancel.is_cancelled();
    }

    let after = handles
        .registry
        .lookup_for(HookPhase::AfterSuite, &no_tags, &classes);
    hooks.extend(run_static_hooks(&after, &subject, &sender).await);

    let outcome = SuiteOutcome {
        name: suite.name.clone(),
        features,
        hooks,
        cancelled,
    };
    let status = outcome.status();
    info!(suite = %suite.name, %status, cancelled, "스위트 종료");
    emit(
        &sender,
        EngineEvent::SuiteFinished {
            suite: suite.name.clone(),
            status,
        },
    );
    Ok(outcome)
}

/// 여러 스위트의 구성과 태그 필터를 실행 전에 한꺼번에 검증한다.
///
/// 하나라도 실패하면 첫 오류를 반환하므로 호출자는 어떤 스위트도 실행하지 않아야 한다.
pub fn validate_suites<'a>(
    suites: impl IntoIterator<Item = &'a Suite>,
    registry: &CapabilityRegistry,
    config: &RunnerConfig,
) -> Result<(), EngineError> {
    config.tags.as_deref().map(TagFilter::parse).transpose()?;
    for suite in suites {
        registry
            .validate_blueprint(&suite.root_context)
            .inspect_err(|err| error!(suite = %suite.name, error = %err, "스위트 구성 검증 실패"))?;
    }
    Ok(())
}

struct FeatureRunner<'s> {
    handles: &'s Arc<EngineHandles>,
    filter: Option<&'s TagFilter>,
    classes: &'s BTreeSet<String>,
    sender: &'s EventSender,
    cancel: &'s CancellationToken,
}

impl FeatureRunner<'_> {
    async fn run(&self, feature: &Feature) -> FeatureOutcome {
        info!(feature = %feature.name, "피처 시작");
        emit(
            self.sender,
            EngineEvent::FeatureStarted {
                feature: feature.name.clone(),
            },
        );
        let tags = feature.tag_set();
        let subject = HookSubject::Feature {
            name: feature.name.clone(),
            tags: tags.clone(),
        };
        let registry = &self.handles.registry;
        let before = registry.lookup_for(HookPhase::BeforeFeature, &tags, self.classes);
        let mut hooks = run_static_hooks(&before, &subject, self.sender).await;

        let scenarios = if any_failed(&hooks) {
            Vec::new()
        } else {
            self.run_scenarios(feature).await
        };

        let after = registry.lookup_for(HookPhase::AfterFeature, &tags, self.classes);
        hooks.extend(run_static_hooks(&after, &subject, self.sender).await);

        let outcome = FeatureOutcome {
            name: feature.name.clone(),
            scenarios,
            hooks,
        };
        emit(
            self.sender,
            EngineEvent::FeatureFinished {
                feature: feature.name.clone(),
                status: outcome.status(),
            },
        );
        outcome
    }

    /// 태그 필터를 통과한 시나리오를 동시 실행 한도 안에서 실행한다.
    ///
    /// 결과는 완료 순서와 관계없이 선언 순서로 반환한다.
    async fn run_scenarios(&self, feature: &Feature) -> Vec<ScenarioOutcome> {
        let jobs: Vec<ScenarioJob> = feature
            .scenarios
            .iter()
            .map(|scenario| ScenarioJob {
                feature: feature.name.clone(),
                tags: feature.scenario_tags(scenario),
                scenario: scenario.clone(),
            })
            .filter(|job| self.filter.is_none_or(|filter| filter.matches(&job.tags)))
            .collect();
        let limit = self.handles.config.effective_concurrency();

        let mut running = FuturesUnordered::new();
        let mut slots: Vec<Option<ScenarioOutcome>> = vec![None; jobs.len()];
        let mut pending = jobs.iter().cloned().enumerate();

        loop {
            while running.len() < limit {
                let Some((index, job)) = pending.next() else {
                    break;
                };
                let handle: JoinHandle<ScenarioOutcome> = tokio::spawn(run_scenario(
                    job,
                    self.handles.clone(),
                    self.sender.clone(),
                    self.cancel.clone(),
                ));
                running.push(handle.map(move |joined| (index, joined)));
            }
            let Some((index, joined)) = running.next().await else {
                break;
            };
            let outcome = joined.unwrap_or_else(|err| {
                error!(feature = %feature.name, error = %err, "시나리오 작업 실패");
                aborted_outcome(&jobs[index], format!("시나리오 작업 실패: {err}"))
            });
            slots[index] = Some(outcome);
        }
        slots.into_iter().flatten().collect()
    }
}

/// 작업 자체가 중단된 시나리오의 결과. 모든 Step은 Skipped이다.
fn aborted_outcome(job: &ScenarioJob, error: String) -> ScenarioOutcome {
    let steps: Vec<StepResult> = job
        .scenario
        .steps
        .iter()
        .enumerate()
        .map(|(index, step)| StepResult::new(index, &step.text, step.line, StepStatus::Skipped))
        .collect();
    ScenarioOutcome {
        scenario: job.scenario_ref(),
        status: ScenarioOutcome::compute_status(&steps, &[], true),
        final_state: ExecutorState::Aborted,
        steps,
        hooks: Vec::new(),
        setup_error: Some(error),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{ContextClass, Hook, StepDefinition};
    use crate::scenario::Scenario;
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::sync::mpsc;

    #[derive(Default)]
    struct Gauge;

    type Trace = Arc<Mutex<Vec<String>>>;

    fn fixture(trace: &Trace, phase: HookPhase, label: &'static str) -> Hook {
        let trace = trace.clone();
        Hook::fixture("Gauge", phase, move |_subject| {
            let trace = trace.clone();
            Box::pin(async move {
                trace.lock().expect("lock").push(label.to_string());
                Ok(())
            })
        })
    }

    fn registry(configure: impl FnOnce(&mut CapabilityRegistry)) -> Arc<CapabilityRegistry> {
        let mut registry = CapabilityRegistry::new();
        registry
            .register_class(ContextClass::of_default::<Gauge>("Gauge"))
            .expect("클래스 등록 실패");
        registry
            .register(StepDefinition::new("Gauge", "wait :ms", |_scope, args| {
                Box::pin(async move {
                    let ms = args.int(0)?;
                    tokio::time::sleep(Duration::from_millis(ms as u64)).await;
                    Ok(())
                })
            }))
            .expect("등록");
        configure(&mut registry);
        Arc::new(registry)
    }

    fn suite(features: Vec<Feature>) -> Suite {
        Suite::new("suite", "Gauge", features)
    }

    async fn run(
        suite: &Suite,
        registry: Arc<CapabilityRegistry>,
        config: RunnerConfig,
    ) -> Result<SuiteOutcome, EngineError> {
        let (tx, _rx) = mpsc::unbounded_channel();
        run_suite(suite, registry, Arc::new(config), tx, CancellationToken::new()).await
    }

    #[tokio::test]
    async fn hook_phases_nest_around_features() {
        let trace: Trace = Arc::default();
        let registry = registry(|registry| {
            registry.register(fixture(&trace, HookPhase::BeforeSuite, "before-suite")).expect("등록");
            registry.register(fixture(&trace, HookPhase::BeforeFeature, "before-feature")).expect("등록");
            registry.register(fixture(&trace, HookPhase::AfterFeature, "after-feature")).expect("등록");
            registry.register(fixture(&trace, HookPhase::AfterSuite, "after-suite")).expect("등록");
        });
        let suite = suite(vec![
            Feature::new("one", vec![Scenario::from_texts("a", &["wait 0"])]),
            Feature::new("two", vec![Scenario::from_texts("b", &["wait 0"])]),
        ]);
        let outcome = run(&suite, registry, RunnerConfig::default()).await.expect("실행");
        assert_eq!(outcome.status(), StepStatus::Passed);
        assert_eq!(
            trace.lock().expect("lock").as_slice(),
            [
                "before-suite",
                "before-feature",
                "after-feature",
                "before-feature",
                "after-feature",
                "after-suite"
            ]
        );
    }

    #[tokio::test]
    async fn parallel_results_keep_declaration_order() {
        let registry = registry(|_| {});
        let scenarios = vec![
            Scenario::from_texts("slow", &["wait 40"]),
            Scenario::from_texts("fast", &["wait 1"]),
            Scenario::from_texts("medium", &["wait 15"]),
        ];
        let suite = suite(vec![Feature::new("timing", scenarios)]);
        let config = RunnerConfig {
            concurrency: 3,
            ..RunnerConfig::default()
        };
        let outcome = run(&suite, registry, config).await.expect("실행");
        let names: Vec<_> = outcome.scenarios().map(|s| s.scenario.name.as_str()).collect();
        assert_eq!(names, vec!["slow", "fast", "medium"]);
        assert_eq!(outcome.exit_code(), 0);
    }

    #[tokio::test]
    async fn tag_filter_selects_scenarios_with_inherited_tags() {
        let registry = registry(|_| {});
        let mut feature = Feature::new(
            "tagged",
            vec![
                Scenario::from_texts("fast", &["wait 0"]).with_tags(&["@fast"]),
                Scenario::from_texts("slow", &["wait 0"]).with_tags(&["@slow"]),
            ],
        );
        feature.tags.push("@api".into());
        let config = RunnerConfig {
            tags: Some("@api && ~@slow".into()),
            ..RunnerConfig::default()
        };
        let outcome = run(&suite(vec![feature]), registry, config).await.expect("실행");
        let names: Vec<_> = outcome.scenarios().map(|s| s.scenario.name.as_str()).collect();
        assert_eq!(names, vec!["fast"]);
    }

    #[tokio::test]
    async fn failing_before_suite_skips_features_but_runs_after_suite() {
        let trace: Trace = Arc::default();
        let registry = registry(|registry| {
            registry
                .register(Hook::fixture("Gauge", HookPhase::BeforeSuite, |_subject| {
                    Box::pin(async { Err::<(), _>(anyhow::anyhow!("DB 준비 실패")) })
                }))
                .expect("등록");
            registry.register(fixture(&trace, HookPhase::AfterSuite, "after-suite")).expect("등록");
        });
        let suite = suite(vec![Feature::new("one", vec![Scenario::from_texts("a", &["wait 0"])])]);
        let outcome = run(&suite, registry, RunnerConfig::default()).await.expect("실행");
        assert!(outcome.features.is_empty());
        assert_eq!(outcome.status(), StepStatus::Failed);
        assert_eq!(outcome.exit_code(), 1);
        assert_eq!(trace.lock().expect("lock").as_slice(), ["after-suite"]);
    }

    #[tokio::test]
    async fn configuration_errors_surface_before_anything_runs() {
        let registry = registry(|_| {});
        let (tx, mut rx) = mpsc::unbounded_channel();
        let missing_root = Suite::new("suite", "Missing", Vec::new());
        let result = run_suite(
            &missing_root,
            registry.clone(),
            Arc::new(RunnerConfig::default()),
            tx.clone(),
            CancellationToken::new(),
        )
        .await;
        assert!(matches!(result, Err(EngineError::Graph(_))));

        let config = RunnerConfig {
            tags: Some("fast".into()),
            ..RunnerConfig::default()
        };
        let result = run_suite(&suite(Vec::new()), registry, Arc::new(config), tx, CancellationToken::new()).await;
        assert!(matches!(result, Err(EngineError::Registry(_))));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn every_suite_is_validated_before_any_runs() {
        let registry = registry(|_| {});
        let valid = suite(vec![Feature::new("one", vec![Scenario::from_texts("a", &["wait 0"])])]);
        let broken = Suite::new("broken", "Nope", Vec::new());
        let config = RunnerConfig::default();

        validate_suites([&valid, &valid], &registry, &config).expect("모두 유효함");
        assert!(matches!(
            validate_suites([&valid, &broken], &registry, &config),
            Err(EngineError::Graph(_))
        ));

        let bad_filter = RunnerConfig {
            tags: Some("fast".into()),
            ..RunnerConfig::default()
        };
        assert!(matches!(
            validate_suites([&valid], &registry, &bad_filter),
            Err(EngineError::Registry(_))
        ));
    }

    #[tokio::test]
    async fn cancelled_suite_reports_cancellation() {
        let trace: Trace = Arc::default();
        let registry = registry(|registry| {
            registry.register(fixture(&trace, HookPhase::AfterSuite, "after-suite")).expect("등록");
        });
        let suite = suite(vec![Feature::new("one", vec![Scenario::from_texts("a", &["wait 0"])])]);
        let (tx, _rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let outcome = run_suite(&suite, registry, Arc::new(RunnerConfig::default()), tx, cancel)
            .await
            .expect("실행");
        assert!(outcome.cancelled);
        assert!(outcome.features.is_empty());
        assert_eq!(outcome.exit_code(), 1);
        assert_eq!(trace.lock().expect("lock").as_slice(), ["after-suite"]);
    }
}
