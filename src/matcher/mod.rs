mod args;
mod pattern;

pub use args::{ArgKind, StepArg, StepArgs, coerce_all};
pub use pattern::{PatternDialect, StepPattern};

use crate::config::AmbiguityPolicy;
use crate::error::{ArgError, MatchError};
use crate::registry::StepBinding;
use tracing::warn;

/// 일치한 정의와 캡처 원본 값이다.
#[derive(Debug, Clone)]
pub struct StepMatch<'d> {
    pub definition: &'d StepBinding,
    pub captures: Vec<Option<String>>,
}

impl StepMatch<'_> {
    /// 정의의 변환 규칙을 적용해 호출 인자를 만든다.
    pub fn arguments(&self) -> Result<StepArgs, ArgError> {
        coerce_all(&self.captures, self.definition.coercions())
    }
}

/// 매칭 결과이다. 불일치는 오류가 아니며 실행기에서 Undefined로 처리한다.
#[derive(Debug, Clone)]
pub enum MatchOutcome<'d> {
    Matched(StepMatch<'d>),
    NoMatch,
}

/// Step 문장을 디스패치 테이블에서 찾는다.
///
/// 여러 정의가 일치하면 우선순위가 가장 높은 정의를 고른다. 최고 우선순위가
/// 여러 개면 `policy`에 따라 오류를 내거나 가장 먼저 등록된 정의를 고른다.
pub fn match_step<'d>(
    text: &str,
    table: &[&'d StepBinding],
    policy: AmbiguityPolicy,
) -> Result<MatchOutcome<'d>, MatchError> {
    let mut candidates: Vec<StepMatch<'d>> = table
        .iter()
        .filter_map(|definition| {
            definition.pattern().captures(text).map(|captures| StepMatch {
                definition: *definition,
                captures,
            })
        })
        .collect();
    if candidates.len() <= 1 {
        return Ok(candidates
            .pop()
            .map_or(MatchOutcome::NoMatch, MatchOutcome::Matched));
    }
    candidates.sort_by(|a, b| {
        b.definition
            .priority()
            .cmp(&a.definition.priority())
            .then(a.definition.sequence().cmp(&b.definition.sequence()))
    });
    let top = candidates[0].definition.priority();
    let tied = candidates
        .iter()
        .take_while(|candidate| candidate.definition.priority() == top)
        .count();
    if tied > 1 {
        let described: Vec<String> = candidates[..tied]
            .iter()
            .map(|candidate| candidate.definition.describe())
            .collect();
        match policy {
            AmbiguityPolicy::Fatal => {
                return Err(MatchError::AmbiguousMatch {
                    text: text.to_string(),
                    candidates: described,
                });
            }
            AmbiguityPolicy::FirstRegistered => {
                warn!(step = text, candidates = ?described, "모호한 Step, 먼저 등록된 정의를 사용합니다");
            }
        }
    }
    Ok(MatchOutcome::Matched(candidates.swap_remove(0)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{CapabilityRegistry, ContextClass, StepDefinition};
    use std::collections::BTreeSet;

    #[derive(Default)]
    struct Ctx;

    fn registry(definitions: Vec<StepDefinition>) -> CapabilityRegistry {
        let mut registry = CapabilityRegistry::new();
        registry
            .register_class(ContextClass::of_default::<Ctx>("Ctx"))
            .expect("클래스 등록 실패");
        for definition in definitions {
            registry.register(definition).expect("등록 실패");
        }
        registry
    }

    fn def(pattern: &str) -> StepDefinition {
        StepDefinition::new("Ctx", pattern, |_scope, _args| Box::pin(async { Ok(()) }))
    }

    fn table(registry: &CapabilityRegistry) -> Vec<&StepBinding> {
        let classes: BTreeSet<String> = ["Ctx".to_string()].into_iter().collect();
        registry.dispatch_table(&classes)
    }

    fn matched_pattern(outcome: MatchOutcome<'_>) -> Option<String> {
        match outcome {
            MatchOutcome::Matched(found) => Some(found.definition.pattern().source().to_string()),
            MatchOutcome::NoMatch => None,
        }
    }

    #[test]
    fn single_match_is_deterministic() {
        let registry = registry(vec![def("we have some context"), def("event occurs")]);
        let table = table(&registry);
        for _ in 0..5 {
            let outcome =
                match_step("event occurs", &table, AmbiguityPolicy::Fatal).expect("매칭 실패");
            assert_eq!(matched_pattern(outcome).as_deref(), Some("event occurs"));
        }
    }

    #[test]
    fn unmatched_text_is_not_an_error() {
        let registry = registry(vec![def("event occurs")]);
        let outcome = match_step("nothing happens", &table(&registry), AmbiguityPolicy::Fatal)
            .expect("불일치는 오류가 아님");
        assert!(matches!(outcome, MatchOutcome::NoMatch));
    }

    #[test]
    fn higher_priority_wins_over_registration_order() {
        let registry = registry(vec![
            def("I pay :amount"),
            def(r"/^I pay (\d+)$/").with_priority(5),
        ]);
        let outcome =
            match_step("I pay 10", &table(&registry), AmbiguityPolicy::Fatal).expect("매칭 실패");
        assert_eq!(matched_pattern(outcome).as_deref(), Some(r"/^I pay (\d+)$/"));
    }

    #[test]
    fn equal_priority_follows_policy() {
        let registry = registry(vec![def("I pay :amount"), def(r"/^I pay (\d+)$/")]);
        let table = table(&registry);
        let err = match_step("I pay 10", &table, AmbiguityPolicy::Fatal).expect_err("모호함");
        assert!(matches!(
            err,
            MatchError::AmbiguousMatch { ref candidates, .. } if candidates.len() == 2
        ));
        let outcome = match_step("I pay 10", &table, AmbiguityPolicy::FirstRegistered)
            .expect("먼저 등록된 정의 선택");
        assert_eq!(matched_pattern(outcome).as_deref(), Some("I pay :amount"));
    }

    #[test]
    fn captured_arguments_follow_coercion_table() {
        let registry = registry(vec![
            def("I transfer :amount to :account").with_coercions([ArgKind::Float]),
        ]);
        let table = table(&registry);
        let outcome = match_step(
            r#"I transfer 20 to "savings""#,
            &table,
            AmbiguityPolicy::Fatal,
        )
        .expect("매칭 실패");
        let MatchOutcome::Matched(found) = outcome else {
            panic!("일치해야 합니다");
        };
        let args = found.arguments().expect("변환 실패");
        assert_eq!(args.get(0), Some(&StepArg::Float(20.0)));
        assert_eq!(args.text(1).as_deref(), Ok("savings"));
    }
}
