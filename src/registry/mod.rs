mod class;
mod definition;
pub mod tags;

pub use class::{ContextClass, ContextFactory, ContextState, FnFactory};
pub use definition::{
    CallableFuture, Hook, HookBinding, HookFn, HookPhase, HookSubject, ScopedHookFn, StaticHookFn,
    StepBinding, StepDefinition, StepFn,
};
pub use tags::{TagFilter, TagSet};

use crate::context::{CompositionPlan, plan_composition};
use crate::error::{GraphError, RegistryError};
use crate::matcher::StepPattern;
use std::collections::{BTreeSet, HashMap};
use tracing::debug;

/// 등록 가능한 항목이다.
#[derive(Debug, Clone)]
pub enum Capability {
    Step(StepDefinition),
    Hook(Hook),
}

impl From<StepDefinition> for Capability {
    fn from(definition: StepDefinition) -> Self {
        Capability::Step(definition)
    }
}

impl From<Hook> for Capability {
    fn from(hook: Hook) -> Self {
        Capability::Hook(hook)
    }
}

/// 컨텍스트 클래스, Step 정의, Hook을 보관하는 등록소이다.
///
/// 실행 전 한 번 구성한 뒤 `Arc`로 감싸 공유한다. 실행 중에는 읽기 전용이다.
#[derive(Debug, Default)]
pub struct CapabilityRegistry {
    classes: Vec<ContextClass>,
    class_index: HashMap<String, usize>,
    steps: Vec<StepBinding>,
    hooks: Vec<HookBinding>,
    next_sequence: usize,
}

impl CapabilityRegistry {
    /// 빈 등록소를 생성한다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 컨텍스트 클래스를 등록한다.
    pub fn register_class(&mut self, class: ContextClass) -> Result<(), RegistryError> {
        if self.class_index.contains_key(&class.id) {
            return Err(RegistryError::DuplicateClass(class.id));
        }
        debug!(class = %class.id, subcontexts = class.subcontexts.len(), "컨텍스트 클래스 등록");
        self.class_index.insert(class.id.clone(), self.classes.len());
        self.classes.push(class);
        Ok(())
    }

    /// Step 정의 또는 Hook을 등록한다.
    pub fn register(&mut self, capability: impl Into<Capability>) -> Result<(), RegistryError> {
        match capability.into() {
            Capability::Step(definition) => self.register_step(definition),
            Capability::Hook(hook) => self.register_hook(hook),
        }
    }

    /// 패턴을 컴파일하고 중복과 변환 규칙 수를 검사해 Step을 등록한다.
    fn register_step(&mut self, definition: StepDefinition) -> Result<(), RegistryError> {
        self.ensure_class(&definition.class)?;
        let pattern = StepPattern::parse(&definition.pattern)?;
        let arity = pattern.arity();
        if definition.coercions.len() > arity {
            return Err(RegistryError::CoercionArity {
                pattern: definition.pattern,
                arity,
                declared: definition.coercions.len(),
            });
        }
        if let Some(existing) = self.steps.iter().find(|step| {
            step.pattern.source() == pattern.source()
                && step.arity() == arity
                && step.priority == definition.priority
        }) {
            return Err(RegistryError::DuplicatePattern {
                pattern: definition.pattern,
                arity,
                priority: definition.priority,
                existing_class: existing.class.clone(),
                class: definition.class,
            });
        }
        let sequence = self.take_sequence();
        debug!(
            class = %definition.class,
            pattern = %definition.pattern,
            arity,
            priority = definition.priority,
            sequence,
            "Step 정의 등록"
        );
        self.steps.push(StepBinding {
            class: definition.class,
            pattern,
            priority: definition.priority,
            coercions: definition.coercions,
            callable: definition.callable,
            sequence,
        });
        Ok(())
    }

    /// 호출 형식과 태그 필터를 검사해 Hook을 등록한다.
    fn register_hook(&mut self, hook: Hook) -> Result<(), RegistryError> {
        self.ensure_class(&hook.class)?;
        match (&hook.callable, hook.phase.is_scoped()) {
            (HookFn::Static(_), true) => {
                return Err(RegistryError::HookScopeMismatch {
                    phase: hook.phase,
                    expected: "스코프",
                });
            }
            (HookFn::Scoped(_), false) => {
                return Err(RegistryError::HookScopeMismatch {
                    phase: hook.phase,
                    expected: "정적",
                });
            }
            _ => {}
        }
        let filter = hook.filter.as_deref().map(TagFilter::parse).transpose()?;
        let sequence = self.take_sequence();
        debug!(class = %hook.class, phase = %hook.phase, sequence, "Hook 등록");
        self.hooks.push(HookBinding {
            class: hook.class,
            phase: hook.phase,
            filter,
            callable: hook.callable,
            sequence,
        });
        Ok(())
    }

    /// 선언 클래스가 등록되어 있는지 확인한다.
    fn ensure_class(&self, class: &str) -> Result<(), RegistryError> {
        if self.class_index.contains_key(class) {
            Ok(())
        } else {
            Err(RegistryError::UnknownClass(class.to_string()))
        }
    }

    /// 다음 등록 순서 번호를 발급한다.
    fn take_sequence(&mut self) -> usize {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        sequence
    }

    /// 클래스 선언을 조회한다.
    pub fn class(&self, id: &str) -> Option<&ContextClass> {
        self.class_index.get(id).map(|&index| &self.classes[index])
    }

    /// 등록된 모든 Step 정의(등록 순서).
    pub fn steps(&self) -> &[StepBinding] {
        &self.steps
    }

    /// 단계에 해당하는 Hook을 등록 순서대로 반환한다. 태그 필터를 적용한다.
    pub fn lookup(&self, phase: HookPhase, tags: &TagSet) -> Vec<&HookBinding> {
        self.hooks
            .iter()
            .filter(|hook| hook.phase == phase && hook.applies_to(tags))
            .collect()
    }

    /// [`lookup`](Self::lookup)과 같되 주어진 클래스가 선언한 Hook만 반환한다.
    pub fn lookup_for(
        &self,
        phase: HookPhase,
        tags: &TagSet,
        classes: &BTreeSet<String>,
    ) -> Vec<&HookBinding> {
        self.lookup(phase, tags)
            .into_iter()
            .filter(|hook| classes.contains(&hook.class))
            .collect()
    }

    /// 주어진 클래스들이 선언한 Step 정의를 등록 순서대로 모은 디스패치 테이블이다.
    pub fn dispatch_table(&self, classes: &BTreeSet<String>) -> Vec<&StepBinding> {
        self.steps
            .iter()
            .filter(|step| classes.contains(&step.class))
            .collect()
    }

    /// 루트 클래스 기준 구성을 인스턴스 생성 없이 검증한다.
    pub fn validate_blueprint(&self, root_class: &str) -> Result<CompositionPlan, GraphError> {
        plan_composition(self, root_class)
    }
}
