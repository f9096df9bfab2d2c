use crate::error::RegistryError;
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// 정규화된(앞의 `@`가 제거된) 태그 집합이다.
pub type TagSet = BTreeSet<String>;

/// 태그 문자열에서 공백과 선행 `@`를 제거한다.
pub fn normalize_tag(tag: &str) -> String {
    tag.trim().trim_start_matches('@').to_string()
}

/// 여러 태그 목록을 하나의 정규화된 집합으로 합친다.
pub fn merge_tags<'a>(lists: impl IntoIterator<Item = &'a [String]>) -> TagSet {
    lists
        .into_iter()
        .flatten()
        .map(|tag| normalize_tag(tag))
        .filter(|tag| !tag.is_empty())
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct TagTerm {
    tag: String,
    negated: bool,
}

impl TagTerm {
    /// 태그 하나(부정 포함)가 집합에 대해 참인지 확인한다.
    fn matches(&self, tags: &TagSet) -> bool {
        tags.contains(&self.tag) != self.negated
    }
}

/// Hook 및 시나리오 선택에 쓰이는 태그 필터 표현식이다.
///
/// `&&`로 AND 그룹을, 그룹 안에서는 `,`로 OR 후보를 구분한다.
/// `~`로 시작하는 항목은 부정이다. 예: `@db,@api&&~@slow`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagFilter {
    source: String,
    groups: Vec<Vec<TagTerm>>,
}

impl TagFilter {
    /// 표현식을 해석한다.
    pub fn parse(expr: &str) -> Result<Self, RegistryError> {
        let invalid = |reason: &str| RegistryError::InvalidTagFilter {
            expr: expr.to_string(),
            reason: reason.to_string(),
        };
        if expr.trim().is_empty() {
            return Err(invalid("빈 표현식"));
        }
        let mut groups = Vec::new();
        for group in expr.split("&&") {
            let mut terms = Vec::new();
            for raw in group.split(',') {
                let raw = raw.trim();
                let (negated, body) = match raw.strip_prefix('~') {
                    Some(rest) => (true, rest.trim()),
                    None => (false, raw),
                };
                if !body.starts_with('@') {
                    return Err(invalid("태그는 '@'로 시작해야 합니다"));
                }
                let tag = normalize_tag(body);
                if tag.is_empty() || tag.chars().any(char::is_whitespace) {
                    return Err(invalid("태그 이름이 올바르지 않습니다"));
                }
                terms.push(TagTerm { tag, negated });
            }
            groups.push(terms);
        }
        Ok(Self {
            source: expr.trim().to_string(),
            groups,
        })
    }

    /// 태그 집합이 필터를 만족하는지 평가한다.
    pub fn matches(&self, tags: &TagSet) -> bool {
        self.groups
            .iter()
            .all(|group| group.iter().any(|term| term.matches(tags)))
    }

    /// 원본 표현식.
    pub fn as_str(&self) -> &str {
        &self.source
    }
}

impl FromStr for TagFilter {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for TagFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}
