use crate::context::ContextParameters;
use crate::registry::tags::{TagSet, merge_tags};
use anyhow::Context;
use glob::glob;
use serde::de::Deserializer;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

/// Step은 Scenario 안의 문장 하나와 원본 위치를 표현한다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Step {
    /// 매칭에 쓰이는 문장.
    pub text: String,
    /// 원본 문서의 줄 번호(알 수 없으면 0).
    pub line: u32,
}

impl Step {
    /// 문장과 줄 번호로 Step을 만든다.
    pub fn new(text: impl Into<String>, line: u32) -> Self {
        Self {
            text: text.into(),
            line,
        }
    }
}

impl<'de> Deserialize<'de> for Step {
    /// 문자열 또는 `{ text, line }` 구조체 형태를 모두 지원하도록 역직렬화한다.
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Helper {
            Simple(String),
            Detailed {
                text: String,
                #[serde(default)]
                line: u32,
            },
        }

        Ok(match Helper::deserialize(deserializer)? {
            Helper::Simple(text) => Step { text, line: 0 },
            Helper::Detailed { text, line } => Step { text, line },
        })
    }
}

/// Scenario는 하나의 새 컨텍스트 그래프 위에서 순서대로 실행되는 Step 목록이다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scenario {
    /// 시나리오 이름.
    pub name: String,
    /// 원본 문서의 줄 번호.
    #[serde(default)]
    pub line: u32,
    /// 시나리오 태그.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Step 목록.
    pub steps: Vec<Step>,
}

impl Scenario {
    /// 이름과 문장 목록으로 시나리오를 만든다. 줄 번호는 순번으로 채운다.
    pub fn from_texts<S: AsRef<str>>(name: impl Into<String>, texts: &[S]) -> Self {
        Self {
            name: name.into(),
            line: 0,
            tags: Vec::new(),
            steps: texts
                .iter()
                .enumerate()
                .map(|(index, text)| Step::new(text.as_ref(), index as u32 + 1))
                .collect(),
        }
    }

    /// 태그를 추가한다.
    pub fn with_tags<S: AsRef<str>>(mut self, tags: &[S]) -> Self {
        self.tags
            .extend(tags.iter().map(|tag| tag.as_ref().to_string()));
        self
    }

    /// 전체 Step 수를 반환한다.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Step 수가 비었는지 여부를 확인한다.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// Feature는 태그를 공유하는 시나리오 묶음이다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feature {
    /// 피처 이름.
    pub name: String,
    /// 피처 태그. 소속 시나리오에 상속된다.
    #[serde(default)]
    pub tags: Vec<String>,
    /// 시나리오 목록.
    #[serde(default)]
    pub scenarios: Vec<Scenario>,
}

impl Feature {
    /// 이름과 시나리오 목록으로 피처를 만든다.
    pub fn new(name: impl Into<String>, scenarios: Vec<Scenario>) -> Self {
        Self {
            name: name.into(),
            tags: Vec::new(),
            scenarios,
        }
    }

    /// 피처 태그만의 정규화 집합.
    pub fn tag_set(&self) -> TagSet {
        merge_tags([self.tags.as_slice()])
    }

    /// 피처 태그를 상속한 시나리오 태그 집합.
    pub fn scenario_tags(&self, scenario: &Scenario) -> TagSet {
        merge_tags([self.tags.as_slice(), scenario.tags.as_slice()])
    }
}

/// Suite는 루트 컨텍스트 하나와 피처 목록으로 구성된 실행 단위이다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suite {
    /// 스위트 이름.
    pub name: String,
    /// 시나리오마다 구성할 루트 컨텍스트 클래스 ID.
    pub root_context: String,
    /// 클래스 ID별 생성자 파라미터.
    #[serde(default)]
    pub parameters: ContextParameters,
    /// 피처 목록.
    #[serde(default)]
    pub features: Vec<Feature>,
}

impl Suite {
    /// 파라미터 없는 스위트를 만든다.
    pub fn new(
        name: impl Into<String>,
        root_context: impl Into<String>,
        features: Vec<Feature>,
    ) -> Self {
        Self {
            name: name.into(),
            root_context: root_context.into(),
            parameters: ContextParameters::new(),
            features,
        }
    }

    /// 전체 시나리오 수.
    pub fn scenario_count(&self) -> usize {
        self.features.iter().map(|f| f.scenarios.len()).sum()
    }
}

/// YAML 파일을 읽어 Suite로 역직렬화한다.
pub fn load_suite_from_file(path: &Path) -> anyhow::Result<Suite> {
    let mut file =
        File::open(path).with_context(|| format!("스위트 파일을 열 수 없습니다: {}", path.display()))?;
    load_suite_from_reader(&mut file)
        .with_context(|| format!("스위트 파일 파싱 실패: {}", path.display()))
}

/// Reader에서 YAML을 읽어 Suite 구조체로 파싱한다.
pub fn load_suite_from_reader<R: Read>(reader: &mut R) -> anyhow::Result<Suite> {
    let mut buf = String::new();
    reader.read_to_string(&mut buf)?;
    let suite: Suite = serde_yaml::from_str(&buf)?;
    Ok(suite)
}

/// glob 패턴에 해당하는 스위트 파일을 경로 순으로 모두 읽는다.
pub fn load_suites_from_glob(pattern: &str) -> anyhow::Result<Vec<(PathBuf, Suite)>> {
    let mut paths: Vec<PathBuf> = Vec::new();
    for entry in glob(pattern).context("glob 패턴 파싱 실패")? {
        paths.push(entry?);
    }
    if paths.is_empty() {
        anyhow::bail!("패턴에 해당하는 스위트 파일이 없습니다: {pattern}");
    }
    paths.sort();
    paths
        .into_iter()
        .map(|path| {
            let suite = load_suite_from_file(&path)?;
            Ok((path, suite))
        })
        .collect()
}
