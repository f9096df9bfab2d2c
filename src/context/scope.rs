use super::graph::ContextGraph;
use super::node::NodeId;
use crate::error::GraphError;
use std::any::Any;

/// 사용자 Step/Hook 호출에 노출되는 시나리오 그래프 핸들이다.
///
/// 호출 동안 `current`는 정의를 선언한 클래스의 노드를 가리킨다.
/// 그래프 내부 구조는 별칭/capability 조회와 타입 대여로만 접근할 수 있다.
#[derive(Debug)]
pub struct Scope {
    graph: ContextGraph,
    current: NodeId,
}

impl Scope {
    pub(crate) fn new(graph: ContextGraph) -> Self {
        let current = graph.root();
        Self { graph, current }
    }

    pub(crate) fn enter(&mut self, node: NodeId) {
        self.current = node;
    }

    pub(crate) fn graph(&self) -> &ContextGraph {
        &self.graph
    }

    /// 현재 호출의 대상 노드.
    pub fn current(&self) -> NodeId {
        self.current
    }

    /// 루트 노드.
    pub fn root(&self) -> NodeId {
        self.graph.root()
    }

    /// 노드의 클래스 ID.
    pub fn class_of(&self, node: NodeId) -> Result<&str, GraphError> {
        self.graph.node(node).map(|node| node.class())
    }

    /// 별칭으로 서브컨텍스트 노드를 찾는다.
    pub fn resolve(&self, alias: &str) -> Result<NodeId, GraphError> {
        self.graph.resolve(self.current, alias)
    }

    /// capability 태그(또는 클래스 ID)로 유일한 노드를 찾는다.
    pub fn resolve_by_capability(&self, capability: &str) -> Result<NodeId, GraphError> {
        self.graph.resolve_by_capability(self.current, capability)
    }

    /// 현재 노드의 상태를 가변 대여한다.
    pub fn context<T: Any>(&mut self) -> Result<&mut T, GraphError> {
        let current = self.current;
        self.graph.state_mut(current)
    }

    /// 루트 노드의 상태를 가변 대여한다.
    pub fn main_context<T: Any>(&mut self) -> Result<&mut T, GraphError> {
        let root = self.graph.root();
        self.graph.state_mut(root)
    }

    /// 별칭의 서브컨텍스트 상태를 가변 대여한다.
    pub fn subcontext<T: Any>(&mut self, alias: &str) -> Result<&mut T, GraphError> {
        let node = self.resolve(alias)?;
        self.graph.state_mut(node)
    }

    /// 노드 상태를 빌려온다.
    pub fn get<T: Any>(&self, node: NodeId) -> Result<&T, GraphError> {
        self.graph.state(node)
    }

    /// 노드 상태를 가변 대여한다.
    pub fn get_mut<T: Any>(&mut self, node: NodeId) -> Result<&mut T, GraphError> {
        self.graph.state_mut(node)
    }
}
