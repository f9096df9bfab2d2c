use anyhow::ensure;
use rust_behat::{
    ArgKind, CapabilityRegistry, ContextClass, Hook, HookPhase, HookSubject, RegistryError,
    StepDefinition,
};
use serde_yaml::Value;
use tracing::{debug, info};

/// 루트 컨텍스트. 이벤트 발생 여부를 기록한다.
#[derive(Debug, Default)]
struct FeatureContext {
    prepared: bool,
    events: u32,
}

/// `math` 별칭으로 붙는 계산 서브컨텍스트.
#[derive(Debug)]
struct ArithmeticContext {
    value: i64,
}

impl ArithmeticContext {
    fn from_params(params: &Value) -> anyhow::Result<Self> {
        let value = match params.get("start") {
            Some(start) => start
                .as_i64()
                .ok_or_else(|| anyhow::anyhow!("start는 정수여야 합니다: {start:?}"))?,
            None => 0,
        };
        Ok(Self { value })
    }
}

/// 예제 스위트(`demos/suites/*.yaml`)가 사용하는 등록소를 구성한다.
pub fn registry() -> Result<CapabilityRegistry, RegistryError> {
    let mut registry = CapabilityRegistry::new();
    registry.register_class(
        ContextClass::of_default::<FeatureContext>("FeatureContext")
            .with_subcontext("math", "ArithmeticContext"),
    )?;
    registry.register_class(
        ContextClass::new("ArithmeticContext", ArithmeticContext::from_params)
            .with_capability("calculator"),
    )?;

    registry.register(Hook::fixture("FeatureContext", HookPhase::BeforeSuite, |subject| {
        Box::pin(async move {
            if let HookSubject::Suite { name } = subject {
                info!(suite = %name, "예제 스위트 준비");
            }
            Ok(())
        })
    }))?;
    registry.register(Hook::scoped("FeatureContext", HookPhase::BeforeScenario, |scope, _subject| {
        Box::pin(async move {
            scope.context::<FeatureContext>()?.prepared = true;
            Ok(())
        })
    }))?;
    registry.register(Hook::scoped("ArithmeticContext", HookPhase::AfterScenario, |scope, subject| {
        Box::pin(async move {
            let value = scope.context::<ArithmeticContext>()?.value;
            if let HookSubject::Scenario { scenario, .. } = subject {
                debug!(%scenario, value, "계산 컨텍스트 정리");
            }
            Ok(())
        })
    }))?;

    registry.register(StepDefinition::new("FeatureContext", "we have some context", |scope, _args| {
        Box::pin(async move {
            ensure!(scope.context::<FeatureContext>()?.prepared, "before-scenario Hook이 실행되지 않았습니다.");
            Ok(())
        })
    }))?;
    registry.register(StepDefinition::new("FeatureContext", "event occurs", |scope, _args| {
        Box::pin(async move {
            scope.context::<FeatureContext>()?.events += 1;
            Ok(())
        })
    }))?;
    registry.register(StepDefinition::new(
        "FeatureContext",
        "something should be done",
        |scope, _args| {
            Box::pin(async move {
                let events = scope.context::<FeatureContext>()?.events;
                ensure!(events > 0, "발생한 이벤트가 없습니다.");
                Ok(())
            })
        },
    ))?;

    registry.register(
        StepDefinition::new("ArithmeticContext", "I have the number :n", |scope, args| {
            Box::pin(async move {
                scope.context::<ArithmeticContext>()?.value = args.int(0)?;
                Ok(())
            })
        })
        .with_coercions([ArgKind::Int]),
    )?;
    registry.register(
        StepDefinition::new("ArithmeticContext", "I add :n", |scope, args| {
            Box::pin(async move {
                scope.context::<ArithmeticContext>()?.value += args.int(0)?;
                Ok(())
            })
        })
        .with_coercions([ArgKind::Int]),
    )?;
    registry.register(
        StepDefinition::new("ArithmeticContext", r"/^I divide by (-?\d+)$/", |scope, args| {
            Box::pin(async move {
                let divisor = args.int(0)?;
                ensure!(divisor != 0, "0으로 나눌 수 없습니다.");
                scope.context::<ArithmeticContext>()?.value /= divisor;
                Ok(())
            })
        })
        .with_coercions([ArgKind::Int]),
    )?;
    registry.register(StepDefinition::new(
        "ArithmeticContext",
        "the result should be :n",
        |scope, args| {
            Box::pin(async move {
                let expected = args.int(0)?;
                let actual = scope.context::<ArithmeticContext>()?.value;
                ensure!(actual == expected, "결과가 {actual}이지만 {expected}을(를) 기대했습니다.");
                Ok(())
            })
        },
    ))?;
    // 루트에서 별칭으로 서브컨텍스트에 접근한다.
    registry.register(StepDefinition::new(
        "FeatureContext",
        "the calculator is ready/available",
        |scope, _args| {
            Box::pin(async move {
                let node = scope.resolve_by_capability("calculator")?;
                ensure!(node == scope.resolve("math")?, "별칭과 capability가 다른 노드를 가리킵니다.");
                Ok(())
            })
        },
    ))?;
    Ok(registry)
}
