use crate::context::Scope;
use crate::engine::{ScenarioRef, StepStatus};
use crate::matcher::{ArgKind, StepArgs, StepPattern};
use crate::registry::tags::{TagFilter, TagSet};
use futures::future::BoxFuture;
use std::fmt;
use std::sync::Arc;

/// 사용자 Step/Hook 호출이 반환하는 Future이다.
pub type CallableFuture<'a> = BoxFuture<'a, anyhow::Result<()>>;

/// Step 정의 호출 형식. 시나리오 그래프가 선언 클래스 노드에 맞춰진 상태로 전달된다.
pub type StepFn = Arc<dyn for<'a> Fn(&'a mut Scope, StepArgs) -> CallableFuture<'a> + Send + Sync>;

/// 시나리오/Step 단계 Hook 호출 형식.
pub type ScopedHookFn =
    Arc<dyn for<'a> Fn(&'a mut Scope, HookSubject) -> CallableFuture<'a> + Send + Sync>;

/// 스위트/피처 단계 Hook 호출 형식. 해당 단계에는 컨텍스트 그래프가 없다.
pub type StaticHookFn =
    Arc<dyn Fn(HookSubject) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

/// Hook이 실행되는 생명주기 단계이다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookPhase {
    BeforeSuite,
    BeforeFeature,
    BeforeScenario,
    BeforeStep,
    AfterStep,
    AfterScenario,
    AfterFeature,
    AfterSuite,
}

impl HookPhase {
    /// 컨텍스트 그래프가 존재하는 단계인지 여부.
    pub fn is_scoped(self) -> bool {
        matches!(
            self,
            HookPhase::BeforeScenario
                | HookPhase::BeforeStep
                | HookPhase::AfterStep
                | HookPhase::AfterScenario
        )
    }

    /// 정리(after) 단계인지 여부.
    pub fn is_after(self) -> bool {
        matches!(
            self,
            HookPhase::AfterStep
                | HookPhase::AfterScenario
                | HookPhase::AfterFeature
                | HookPhase::AfterSuite
        )
    }
}

impl fmt::Display for HookPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HookPhase::BeforeSuite => "before-suite",
            HookPhase::BeforeFeature => "before-feature",
            HookPhase::BeforeScenario => "before-scenario",
            HookPhase::BeforeStep => "before-step",
            HookPhase::AfterStep => "after-step",
            HookPhase::AfterScenario => "after-scenario",
            HookPhase::AfterFeature => "after-feature",
            HookPhase::AfterSuite => "after-suite",
        };
        f.write_str(name)
    }
}

/// Hook 호출 시 전달되는 실행 대상 정보이다.
#[derive(Debug, Clone, PartialEq)]
pub enum HookSubject {
    Suite {
        name: String,
    },
    Feature {
        name: String,
        tags: TagSet,
    },
    Scenario {
        scenario: ScenarioRef,
        tags: TagSet,
    },
    Step {
        scenario: ScenarioRef,
        index: usize,
        text: String,
        /// after-step 단계에서만 채워진다.
        status: Option<StepStatus>,
    },
}

/// Step 정의 선언이다. 등록 시 패턴이 컴파일된다.
#[derive(Clone)]
pub struct StepDefinition {
    pub(crate) class: String,
    pub(crate) pattern: String,
    pub(crate) priority: i32,
    pub(crate) coercions: Vec<ArgKind>,
    pub(crate) callable: StepFn,
}

impl StepDefinition {
    /// `class`가 선언한 `pattern` Step을 생성한다.
    ///
    /// ```ignore
    /// StepDefinition::new("FeatureContext", "I add :n", |scope, args| {
    ///     Box::pin(async move {
    ///         scope.context::<Calculator>()?.total += args.int(0)?;
    ///         Ok(())
    ///     })
    /// });
    /// ```
    pub fn new<F>(class: impl Into<String>, pattern: impl Into<String>, callable: F) -> Self
    where
        F: for<'a> Fn(&'a mut Scope, StepArgs) -> CallableFuture<'a> + Send + Sync + 'static,
    {
        Self {
            class: class.into(),
            pattern: pattern.into(),
            priority: 0,
            coercions: Vec::new(),
            callable: Arc::new(callable),
        }
    }

    /// 여러 정의가 일치할 때 높은 값이 우선한다.
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// 캡처 위치별 변환 규칙을 선언한다.
    pub fn with_coercions(mut self, kinds: impl IntoIterator<Item = ArgKind>) -> Self {
        self.coercions = kinds.into_iter().collect();
        self
    }
}

impl fmt::Debug for StepDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepDefinition")
            .field("class", &self.class)
            .field("pattern", &self.pattern)
            .field("priority", &self.priority)
            .field("coercions", &self.coercions)
            .finish_non_exhaustive()
    }
}

/// 등록이 끝난 불변 Step 정의이다.
#[derive(Clone)]
pub struct StepBinding {
    pub(crate) class: String,
    pub(crate) pattern: StepPattern,
    pub(crate) priority: i32,
    pub(crate) coercions: Vec<ArgKind>,
    pub(crate) callable: StepFn,
    pub(crate) sequence: usize,
}

impl StepBinding {
    /// 선언 클래스 ID.
    pub fn class(&self) -> &str {
        &self.class
    }

    /// 컴파일된 패턴.
    pub fn pattern(&self) -> &StepPattern {
        &self.pattern
    }

    /// 캡처 그룹 수.
    pub fn arity(&self) -> usize {
        self.pattern.arity()
    }

    /// 우선순위.
    pub fn priority(&self) -> i32 {
        self.priority
    }

    /// 등록 순서 번호.
    pub fn sequence(&self) -> usize {
        self.sequence
    }

    /// 위치별 변환 규칙.
    pub fn coercions(&self) -> &[ArgKind] {
        &self.coercions
    }

    /// 보고용 `클래스::패턴` 표기.
    pub fn describe(&self) -> String {
        format!("{}::{}", self.class, self.pattern.source())
    }
}

impl fmt::Debug for StepBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepBinding")
            .field("class", &self.class)
            .field("pattern", &self.pattern.source())
            .field("priority", &self.priority)
            .field("sequence", &self.sequence)
            .finish_non_exhaustive()
    }
}

/// Hook 호출 형식이다.
#[derive(Clone)]
pub enum HookFn {
    /// 스위트/피처 단계용.
    Static(StaticHookFn),
    /// 시나리오/Step 단계용.
    Scoped(ScopedHookFn),
}

/// Hook 선언이다.
#[derive(Clone)]
pub struct Hook {
    pub(crate) class: String,
    pub(crate) phase: HookPhase,
    pub(crate) filter: Option<String>,
    pub(crate) callable: HookFn,
}

impl Hook {
    /// 시나리오/Step 단계에서 선언 클래스의 노드를 대상으로 실행되는 Hook을 만든다.
    pub fn scoped<F>(class: impl Into<String>, phase: HookPhase, callable: F) -> Self
    where
        F: for<'a> Fn(&'a mut Scope, HookSubject) -> CallableFuture<'a> + Send + Sync + 'static,
    {
        Self {
            class: class.into(),
            phase,
            filter: None,
            callable: HookFn::Scoped(Arc::new(callable)),
        }
    }

    /// 스위트/피처 단계에서 실행되는 정적 Hook을 만든다.
    pub fn fixture<F>(class: impl Into<String>, phase: HookPhase, callable: F) -> Self
    where
        F: Fn(HookSubject) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync + 'static,
    {
        Self {
            class: class.into(),
            phase,
            filter: None,
            callable: HookFn::Static(Arc::new(callable)),
        }
    }

    /// 태그 필터 표현식을 지정한다. 등록 시 해석된다.
    pub fn tagged(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }
}

impl fmt::Debug for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hook")
            .field("class", &self.class)
            .field("phase", &self.phase)
            .field("filter", &self.filter)
            .finish_non_exhaustive()
    }
}

/// 등록이 끝난 불변 Hook이다.
#[derive(Clone)]
pub struct HookBinding {
    pub(crate) class: String,
    pub(crate) phase: HookPhase,
    pub(crate) filter: Option<TagFilter>,
    pub(crate) callable: HookFn,
    pub(crate) sequence: usize,
}

impl HookBinding {
    /// 선언 클래스 ID.
    pub fn class(&self) -> &str {
        &self.class
    }

    /// 실행 단계.
    pub fn phase(&self) -> HookPhase {
        self.phase
    }

    /// 등록 순서 번호.
    pub fn sequence(&self) -> usize {
        self.sequence
    }

    /// 태그 집합에 대해 실행 대상인지 확인한다. 필터가 없으면 항상 실행한다.
    pub fn applies_to(&self, tags: &TagSet) -> bool {
        self.filter.as_ref().is_none_or(|filter| filter.matches(tags))
    }
}

impl fmt::Debug for HookBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookBinding")
            .field("class", &self.class)
            .field("phase", &self.phase)
            .field("filter", &self.filter.as_ref().map(TagFilter::as_str))
            .field("sequence", &self.sequence)
            .finish_non_exhaustive()
    }
}
