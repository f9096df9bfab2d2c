use crate::error::RegistryError;
use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};

/// 플레이스홀더 패턴에서 특수 토큰을 찾는 정규식이다.
///
/// 1: `:name` 플레이스홀더, 2/3: `word(suffix)` 선택 접미사, 4: `word/other` 대안.
static TURNIP_TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r":([A-Za-z_][A-Za-z0-9_]*)|(\w+)\((\w+)\)|(\w+(?:/\w+)+)")
        .expect("플레이스홀더 토큰 정규식 컴파일 실패")
});

/// 플레이스홀더 하나가 캡처하는 값: 큰따옴표, 작은따옴표 문자열 또는 공백 없는 토큰.
const PLACEHOLDER_CAPTURE: &str = r#"("[^"]*"|'[^']*'|[^\s"']+)"#;

/// 패턴 작성 방식이다.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternDialect {
    /// `/.../` 또는 `^`로 시작하는 정규식.
    Regex,
    /// `:name` 플레이스홀더 기반 패턴.
    Placeholder,
}

/// 컴파일된 Step 패턴이다.
#[derive(Debug, Clone)]
pub struct StepPattern {
    source: String,
    regex: Regex,
    dialect: PatternDialect,
}

impl StepPattern {
    /// 패턴 문자열을 해석해 정규식으로 컴파일한다.
    pub fn parse(source: &str) -> Result<Self, RegistryError> {
        let (expr, dialect, case_insensitive) = translate(source);
        let regex = RegexBuilder::new(&expr)
            .case_insensitive(case_insensitive)
            .build()
            .map_err(|err| RegistryError::InvalidPattern {
                pattern: source.to_string(),
                reason: err.to_string(),
            })?;
        Ok(Self {
            source: source.to_string(),
            regex,
            dialect,
        })
    }

    /// 선언된 원본 패턴.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// 패턴 방식.
    pub fn dialect(&self) -> PatternDialect {
        self.dialect
    }

    /// 캡처 그룹 수.
    pub fn arity(&self) -> usize {
        self.regex.captures_len().saturating_sub(1)
    }

    /// Step 문장과 일치하면 캡처 값을 위치 순서대로 반환한다.
    pub fn captures(&self, text: &str) -> Option<Vec<Option<String>>> {
        let caps = self.regex.captures(text)?;
        Some(
            caps.iter()
                .skip(1)
                .map(|group| group.map(|m| m.as_str().to_string()))
                .collect(),
        )
    }
}

/// 원본 패턴을 (정규식, 방식, 대소문자 무시 여부)로 변환한다.
fn translate(source: &str) -> (String, PatternDialect, bool) {
    if let Some(body) = source.strip_prefix('/') {
        if let Some(inner) = body.strip_suffix("/i") {
            return (inner.to_string(), PatternDialect::Regex, true);
        }
        if let Some(inner) = body.strip_suffix('/') {
            return (inner.to_string(), PatternDialect::Regex, false);
        }
    }
    if source.starts_with('^') {
        return (source.to_string(), PatternDialect::Regex, false);
    }
    (
        translate_placeholders(source),
        PatternDialect::Placeholder,
        false,
    )
}

/// 플레이스홀더 패턴을 고정된 정규식으로 변환한다.
fn translate_placeholders(source: &str) -> String {
    let mut expr = String::from("^");
    let mut last = 0;
    for caps in TURNIP_TOKEN.captures_iter(source) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        expr.push_str(&regex::escape(&source[last..whole.start()]));
        if caps.get(1).is_some() {
            expr.push_str(PLACEHOLDER_CAPTURE);
        } else if let (Some(word), Some(suffix)) = (caps.get(2), caps.get(3)) {
            expr.push_str(&regex::escape(word.as_str()));
            expr.push_str(&format!("(?:{})?", regex::escape(suffix.as_str())));
        } else if let Some(alternatives) = caps.get(4) {
            let joined = alternatives
                .as_str()
                .split('/')
                .map(regex::escape)
                .collect::<Vec<_>>()
                .join("|");
            expr.push_str(&format!("(?:{joined})"));
        }
        last = whole.end();
    }
    expr.push_str(&regex::escape(&source[last..]));
    expr.push('$');
    expr
}
