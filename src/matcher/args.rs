use crate::error::ArgError;
use serde::{Deserialize, Serialize};

/// 캡처 인자 하나에 적용할 변환 규칙이다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArgKind {
    /// 따옴표 문자열은 텍스트, 정수/실수 형태는 숫자로 추론한다.
    #[default]
    Auto,
    /// 정수로 변환한다.
    Int,
    /// 실수로 변환한다.
    Float,
    /// 따옴표만 제거한 텍스트로 유지한다.
    Text,
}

/// 변환이 끝난 Step 인자이다.
#[derive(Debug, Clone, PartialEq)]
pub enum StepArg {
    Int(i64),
    Float(f64),
    Text(String),
    /// 선택 캡처 그룹이 일치하지 않았다.
    Absent,
}

/// Step 호출에 전달되는 위치 기반 인자 목록이다.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepArgs {
    values: Vec<StepArg>,
}

impl StepArgs {
    /// 변환된 값 목록으로 생성한다.
    pub fn new(values: Vec<StepArg>) -> Self {
        Self { values }
    }

    /// 인자 수.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// 인자가 없는지 여부.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// 위치의 원본 인자를 반환한다.
    pub fn get(&self, index: usize) -> Option<&StepArg> {
        self.values.get(index)
    }

    /// 정수 인자를 꺼낸다.
    pub fn int(&self, index: usize) -> Result<i64, ArgError> {
        match self.values.get(index) {
            Some(StepArg::Int(value)) => Ok(*value),
            Some(StepArg::Text(text)) => text.trim().parse().map_err(|_| ArgError::Coercion {
                index,
                expected: "정수",
                value: text.clone(),
            }),
            Some(StepArg::Float(value)) => Err(ArgError::Coercion {
                index,
                expected: "정수",
                value: value.to_string(),
            }),
            Some(StepArg::Absent) | None => Err(ArgError::Missing(index)),
        }
    }

    /// 실수 인자를 꺼낸다. 정수 인자도 허용한다.
    pub fn float(&self, index: usize) -> Result<f64, ArgError> {
        match self.values.get(index) {
            Some(StepArg::Float(value)) => Ok(*value),
            Some(StepArg::Int(value)) => Ok(*value as f64),
            Some(StepArg::Text(text)) => text.trim().parse().map_err(|_| ArgError::Coercion {
                index,
                expected: "실수",
                value: text.clone(),
            }),
            Some(StepArg::Absent) | None => Err(ArgError::Missing(index)),
        }
    }

    /// 텍스트 인자를 꺼낸다. 숫자 인자는 문자열로 돌려준다.
    pub fn text(&self, index: usize) -> Result<String, ArgError> {
        match self.values.get(index) {
            Some(StepArg::Text(text)) => Ok(text.clone()),
            Some(StepArg::Int(value)) => Ok(value.to_string()),
            Some(StepArg::Float(value)) => Ok(value.to_string()),
            Some(StepArg::Absent) | None => Err(ArgError::Missing(index)),
        }
    }

    /// 선택 캡처 그룹의 텍스트를 꺼낸다.
    pub fn opt_text(&self, index: usize) -> Option<String> {
        self.text(index).ok()
    }
}

/// 캡처 원본 값 목록에 변환 규칙을 위치 순서대로 적용한다.
///
/// 규칙이 캡처 수보다 적으면 나머지는 [`ArgKind::Auto`]로 처리한다.
pub fn coerce_all(raw: &[Option<String>], kinds: &[ArgKind]) -> Result<StepArgs, ArgError> {
    let mut values = Vec::with_capacity(raw.len());
    for (index, capture) in raw.iter().enumerate() {
        let kind = kinds.get(index).copied().unwrap_or_default();
        let value = match capture {
            Some(text) => coerce(index, text, kind)?,
            None => StepArg::Absent,
        };
        values.push(value);
    }
    Ok(StepArgs::new(values))
}

/// 캡처 값 하나를 선언된 종류로 변환한다.
fn coerce(index: usize, raw: &str, kind: ArgKind) -> Result<StepArg, ArgError> {
    let (text, quoted) = unquote(raw);
    let fail = |expected| ArgError::Coercion {
        index,
        expected,
        value: raw.to_string(),
    };
    match kind {
        ArgKind::Text => Ok(StepArg::Text(text.to_string())),
        ArgKind::Int => text.trim().parse().map(StepArg::Int).map_err(|_| fail("정수")),
        ArgKind::Float => text
            .trim()
            .parse()
            .map(StepArg::Float)
            .map_err(|_| fail("실수")),
        ArgKind::Auto if quoted => Ok(StepArg::Text(text.to_string())),
        ArgKind::Auto => {
            if let Ok(value) = text.parse::<i64>() {
                return Ok(StepArg::Int(value));
            }
            if looks_like_float(text) {
                if let Ok(value) = text.parse::<f64>() {
                    return Ok(StepArg::Float(value));
                }
            }
            Ok(StepArg::Text(text.to_string()))
        }
    }
}

/// `inf`, `NaN` 같은 단어가 실수로 추론되지 않도록 숫자 형태만 허용한다.
fn looks_like_float(text: &str) -> bool {
    let body = text.strip_prefix(['-', '+']).unwrap_or(text);
    body.contains('.')
        && body.chars().all(|c| c.is_ascii_digit() || c == '.')
        && body.chars().any(|c| c.is_ascii_digit())
}

/// 양끝이 같은 따옴표로 감싸져 있으면 벗겨낸다.
fn unquote(raw: &str) -> (&str, bool) {
    for quote in ['"', '\''] {
        if raw.len() >= 2 && raw.starts_with(quote) && raw.ends_with(quote) {
            return (&raw[1..raw.len() - 1], true);
        }
    }
    (raw, false)
}
