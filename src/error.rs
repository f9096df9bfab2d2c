use crate::context::NodeId;
use crate::registry::HookPhase;

/// Capability 등록 단계에서 발생하는 오류를 표현한다.
///
/// 모든 변형은 구성 오류이며 어떤 시나리오도 실행되기 전에 보고된다.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// 동일한 패턴, 인자 수, 우선순위를 가진 Step 정의가 이미 등록되어 있다.
    #[error(
        "중복된 Step 패턴입니다: '{pattern}' (인자 {arity}개, 우선순위 {priority}, 기존 선언: {existing_class}, 신규 선언: {class})"
    )]
    DuplicatePattern {
        pattern: String,
        arity: usize,
        priority: i32,
        existing_class: String,
        class: String,
    },
    /// 패턴을 정규식으로 컴파일할 수 없다.
    #[error("잘못된 Step 패턴입니다: '{pattern}' ({reason})")]
    InvalidPattern { pattern: String, reason: String },
    /// 선언된 인자 변환 개수가 캡처 그룹 수보다 많다.
    #[error("'{pattern}' 패턴의 캡처 그룹은 {arity}개이지만 변환 규칙이 {declared}개 선언되었습니다.")]
    CoercionArity {
        pattern: String,
        arity: usize,
        declared: usize,
    },
    /// 같은 ID의 컨텍스트 클래스가 두 번 등록되었다.
    #[error("중복된 컨텍스트 클래스입니다: {0}")]
    DuplicateClass(String),
    /// 선언 클래스가 등록되지 않았다.
    #[error("등록되지 않은 컨텍스트 클래스입니다: {0}")]
    UnknownClass(String),
    /// Hook 단계와 호출 형식(정적/스코프)이 맞지 않는다.
    #[error("{phase} 단계에는 {expected} Hook만 등록할 수 있습니다.")]
    HookScopeMismatch {
        phase: HookPhase,
        expected: &'static str,
    },
    /// 태그 필터 표현식을 해석할 수 없다.
    #[error("잘못된 태그 필터입니다: '{expr}' ({reason})")]
    InvalidTagFilter { expr: String, reason: String },
}

/// 컨텍스트 그래프 구성 및 조회 오류를 표현한다.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    /// 별칭 충돌, 순환 선언, 미등록 클래스 등 구성 자체가 불가능하다.
    #[error("컨텍스트 구성 실패: {0}")]
    Composition(String),
    /// 컨텍스트 생성자가 오류를 반환했다.
    #[error("컨텍스트 '{class}' 생성 실패: {message}")]
    Construction { class: String, message: String },
    /// 그래프에 존재하지 않는 서브컨텍스트 별칭이다.
    #[error("알 수 없는 서브컨텍스트 별칭입니다: {0}")]
    UnknownSubcontext(String),
    /// 요청한 capability와 일치하는 노드가 둘 이상이다.
    #[error("capability '{capability}'에 해당하는 컨텍스트가 여러 개입니다: {}", .matches.join(", "))]
    AmbiguousCapability {
        capability: String,
        matches: Vec<String>,
    },
    /// 요청한 capability와 일치하는 노드가 없다.
    #[error("capability '{0}'에 해당하는 컨텍스트가 없습니다.")]
    NotFound(String),
    /// 이 그래프에 속하지 않는 노드 ID이다.
    #[error("그래프에 존재하지 않는 노드입니다: {0}")]
    UnknownNode(NodeId),
    /// 노드 상태를 요청한 타입으로 꺼낼 수 없다.
    #[error("컨텍스트 '{class}'는 요청한 타입 {expected}이(가) 아닙니다.")]
    TypeMismatch {
        class: String,
        expected: &'static str,
    },
}

/// Step 매칭 단계의 오류이다.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MatchError {
    /// 같은 우선순위의 정의가 여러 개 일치했고 정책상 치명적 오류로 취급한다.
    #[error("Step '{text}'이(가) 여러 정의와 일치합니다: {}", .candidates.join(" | "))]
    AmbiguousMatch {
        text: String,
        candidates: Vec<String>,
    },
}

/// 캡처 인자 변환 및 조회 오류이다.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ArgError {
    /// 해당 위치에 인자가 없다.
    #[error("{0}번째 인자가 없습니다.")]
    Missing(usize),
    /// 인자를 기대한 타입으로 변환할 수 없다.
    #[error("{index}번째 인자 '{value}'을(를) {expected}(으)로 변환할 수 없습니다.")]
    Coercion {
        index: usize,
        expected: &'static str,
        value: String,
    },
}

/// 엔진 실행 전체를 중단시키는 오류를 모아 표현한다.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// 등록 단계 오류.
    #[error(transparent)]
    Registry(#[from] RegistryError),
    /// 구성 검증 단계의 그래프 오류.
    #[error(transparent)]
    Graph(#[from] GraphError),
    /// 시나리오 단위 컨텍스트 준비 실패.
    #[error("시나리오 준비 실패: {0}")]
    Setup(GraphError),
}
