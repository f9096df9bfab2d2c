use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Undefined Step 이후 나머지 Step 처리 방식이다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UndefinedPolicy {
    /// 나머지 Step을 조회 없이 Skipped로 처리한다.
    #[default]
    SkipRemaining,
    /// 나머지 Step도 매칭만 수행해 추가 Undefined를 보고하되 실행하지 않는다.
    ContinueMatching,
}

/// 실패한 Step 이후 처리 방식이다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// 첫 실패 이후 Step은 모두 Skipped이다.
    #[default]
    SkipRest,
    /// 실패와 관계없이 나머지 Step을 계속 실행한다.
    Continue,
}

/// 같은 우선순위의 정의가 여러 개 일치할 때의 처리 방식이다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AmbiguityPolicy {
    /// Step을 AmbiguousMatch 오류로 실패 처리한다.
    #[default]
    Fatal,
    /// 경고를 남기고 가장 먼저 등록된 정의를 사용한다.
    FirstRegistered,
}

/// 실행기 동작을 조정하는 설정이다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Undefined Step을 Pending 대신 Failed로 처리한다.
    pub strict: bool,
    /// Undefined Step 이후 처리.
    pub undefined: UndefinedPolicy,
    /// 실패 Step 이후 처리.
    pub failure: FailurePolicy,
    /// 모호한 매칭 처리.
    pub ambiguity: AmbiguityPolicy,
    /// 피처 안에서 동시에 실행할 최대 시나리오 수.
    pub concurrency: usize,
    /// 실행할 시나리오를 고르는 태그 필터 표현식.
    pub tags: Option<String>,
}

impl Default for RunnerConfig {
    /// 기본값은 직렬 실행, 첫 실패 이후 건너뛰기, 모호함은 오류이다.
    fn default() -> Self {
        Self {
            strict: false,
            undefined: UndefinedPolicy::default(),
            failure: FailurePolicy::default(),
            ambiguity: AmbiguityPolicy::default(),
            concurrency: 1,
            tags: None,
        }
    }
}

impl RunnerConfig {
    /// 0은 1로 취급한 동시 실행 수.
    pub fn effective_concurrency(&self) -> usize {
        self.concurrency.max(1)
    }
}

/// YAML 파일을 읽어 RunnerConfig로 역직렬화한다.
pub fn load_config_from_file(path: &Path) -> anyhow::Result<RunnerConfig> {
    let mut file = File::open(path)?;
    load_config_from_reader(&mut file)
}

/// Reader에서 YAML을 읽어 RunnerConfig로 파싱한다. 빈 문서는 기본값이다.
pub fn load_config_from_reader<R: Read>(reader: &mut R) -> anyhow::Result<RunnerConfig> {
    let mut buf = String::new();
    reader.read_to_string(&mut buf)?;
    if buf.trim().is_empty() {
        return Ok(RunnerConfig::default());
    }
    let config: RunnerConfig = serde_yaml::from_str(&buf)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_yaml_keeps_defaults() {
        let yaml = "strict: true\nambiguity: first_registered\nconcurrency: 4\n";
        let config = load_config_from_reader(&mut yaml.as_bytes()).expect("설정 파싱 실패");
        assert!(config.strict);
        assert_eq!(config.ambiguity, AmbiguityPolicy::FirstRegistered);
        assert_eq!(config.failure, FailurePolicy::SkipRest);
        assert_eq!(config.undefined, UndefinedPolicy::SkipRemaining);
        assert_eq!(config.effective_concurrency(), 4);
    }

    #[test]
    fn empty_document_yields_default_config() {
        let config = load_config_from_reader(&mut "  \n".as_bytes()).expect("설정 파싱 실패");
        assert_eq!(config, RunnerConfig::default());
    }

    #[test]
    fn unknown_policy_value_is_rejected() {
        let yaml = "failure: explode\n";
        assert!(load_config_from_reader(&mut yaml.as_bytes()).is_err());
    }
}
