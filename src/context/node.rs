use crate::registry::ContextState;
use std::fmt;

/// 시나리오 그래프 아레나 안의 노드 ID이다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    /// 아레나 인덱스.
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// 시나리오 한 번 동안만 존재하는 컨텍스트 인스턴스이다.
///
/// 루트로의 역참조는 그래프가 가진 루트 ID로 대신한다.
pub struct ContextNode {
    pub(crate) id: NodeId,
    pub(crate) class: String,
    pub(crate) alias: Option<String>,
    pub(crate) parent: Option<NodeId>,
    pub(crate) capabilities: Vec<String>,
    pub(crate) state: ContextState,
}

impl ContextNode {
    /// 노드 ID.
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// 클래스 ID.
    pub fn class(&self) -> &str {
        &self.class
    }

    /// 서브컨텍스트 별칭. 루트는 `None`이다.
    pub fn alias(&self) -> Option<&str> {
        self.alias.as_deref()
    }

    /// 이 노드를 선언한 부모 노드.
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// 클래스 ID 또는 capability 태그와 일치하는지 확인한다.
    pub fn provides(&self, capability: &str) -> bool {
        self.class == capability || self.capabilities.iter().any(|c| c == capability)
    }
}

impl fmt::Debug for ContextNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextNode")
            .field("id", &self.id)
            .field("class", &self.class)
            .field("alias", &self.alias)
            .field("parent", &self.parent)
            .field("capabilities", &self.capabilities)
            .finish_non_exhaustive()
    }
}
