use super::node::{ContextNode, NodeId};
use crate::error::GraphError;
use crate::registry::{CapabilityRegistry, ContextClass};
use serde_yaml::Value;
use std::any::{Any, type_name};
use std::collections::{BTreeSet, HashMap, HashSet};
use tracing::debug;

/// 클래스 ID별 생성자 파라미터이다. 엔진은 내용을 해석하지 않는다.
pub type ContextParameters = HashMap<String, Value>;

static NO_PARAMS: Value = Value::Null;

/// 구성 계획의 노드 하나이다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedNode {
    pub class: String,
    pub alias: Option<String>,
    pub parent: Option<usize>,
}

/// 인스턴스 생성 없이 검증된 구성 계획이다. 노드는 깊이 우선 선언 순서로 정렬된다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompositionPlan {
    nodes: Vec<PlannedNode>,
}

impl CompositionPlan {
    /// 계획된 노드 목록. 첫 항목이 루트이다.
    pub fn nodes(&self) -> &[PlannedNode] {
        &self.nodes
    }

    /// 구성에 참여하는 클래스 ID 집합.
    pub fn classes(&self) -> BTreeSet<String> {
        self.nodes.iter().map(|node| node.class.clone()).collect()
    }
}

/// 루트 클래스에서 시작해 서브컨텍스트 선언을 펼친 구성 계획을 만든다.
///
/// 미등록 클래스, 별칭 충돌, 순환 선언은 [`GraphError::Composition`]이다.
pub fn plan_composition(
    registry: &CapabilityRegistry,
    root_class: &str,
) -> Result<CompositionPlan, GraphError> {
    let root = registry.class(root_class).ok_or_else(|| {
        GraphError::Composition(format!("등록되지 않은 루트 클래스입니다: {root_class}"))
    })?;
    let mut nodes = vec![PlannedNode {
        class: root_class.to_string(),
        alias: None,
        parent: None,
    }];
    let mut aliases = HashSet::new();
    let mut ancestry = vec![root_class.to_string()];
    expand(registry, root, 0, &mut ancestry, &mut aliases, &mut nodes)?;
    Ok(CompositionPlan { nodes })
}

/// 클래스의 서브컨텍스트를 선언 순서대로 깊이 우선 전개한다.
fn expand(
    registry: &CapabilityRegistry,
    class: &ContextClass,
    index: usize,
    ancestry: &mut Vec<String>,
    aliases: &mut HashSet<String>,
    nodes: &mut Vec<PlannedNode>,
) -> Result<(), GraphError> {
    for (alias, child_id) in class.subcontexts() {
        if alias.trim().is_empty() {
            return Err(GraphError::Composition(format!(
                "'{}'의 서브컨텍스트 별칭이 비어 있습니다.",
                class.id()
            )));
        }
        if !aliases.insert(alias.clone()) {
            return Err(GraphError::Composition(format!(
                "서브컨텍스트 별칭 '{alias}'이(가) 중복되었습니다."
            )));
        }
        let child = registry.class(child_id).ok_or_else(|| {
            GraphError::Composition(format!(
                "'{alias}' 별칭이 등록되지 않은 클래스 '{child_id}'를 참조합니다."
            ))
        })?;
        if ancestry.iter().any(|ancestor| ancestor == child_id) {
            return Err(GraphError::Composition(format!(
                "순환 서브컨텍스트 선언이 감지되었습니다: {} -> {child_id}",
                ancestry.join(" -> ")
            )));
        }
        let child_index = nodes.len();
        nodes.push(PlannedNode {
            class: child_id.clone(),
            alias: Some(alias.clone()),
            parent: Some(index),
        });
        ancestry.push(child_id.clone());
        expand(registry, child, child_index, ancestry, aliases, nodes)?;
        ancestry.pop();
    }
    Ok(())
}

/// 시나리오 하나가 소유하는 컨텍스트 아레나이다.
///
/// 모든 노드는 인덱스로 참조되며 첫 노드가 루트이다.
#[derive(Debug)]
pub struct ContextGraph {
    nodes: Vec<ContextNode>,
    aliases: HashMap<String, NodeId>,
}

impl ContextGraph {
    /// 루트 클래스 기준으로 새 그래프를 구성한다.
    pub async fn compose(
        registry: &CapabilityRegistry,
        root_class: &str,
        params: &ContextParameters,
    ) -> Result<Self, GraphError> {
        let plan = plan_composition(registry, root_class)?;
        Self::from_plan(registry, &plan, params).await
    }

    /// 검증된 계획대로 각 노드를 정확히 한 번씩 생성한다.
    pub async fn from_plan(
        registry: &CapabilityRegistry,
        plan: &CompositionPlan,
        params: &ContextParameters,
    ) -> Result<Self, GraphError> {
        let mut nodes = Vec::with_capacity(plan.nodes.len());
        let mut aliases = HashMap::new();
        for (index, planned) in plan.nodes.iter().enumerate() {
            let class = registry.class(&planned.class).ok_or_else(|| {
                GraphError::Composition(format!(
                    "등록되지 않은 클래스입니다: {}",
                    planned.class
                ))
            })?;
            let blob = params.get(&planned.class).unwrap_or(&NO_PARAMS);
            let state = class.factory.construct(blob).await.map_err(|err| {
                GraphError::Construction {
                    class: planned.class.clone(),
                    message: format!("{err:#}"),
                }
            })?;
            let id = NodeId(index);
            if let Some(alias) = &planned.alias {
                aliases.insert(alias.clone(), id);
            }
            nodes.push(ContextNode {
                id,
                class: planned.class.clone(),
                alias: planned.alias.clone(),
                parent: planned.parent.map(NodeId),
                capabilities: class.capabilities().to_vec(),
                state,
            });
        }
        debug!(nodes = nodes.len(), "컨텍스트 그래프 구성 완료");
        Ok(Self { nodes, aliases })
    }

    /// 루트 노드 ID.
    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// 노드 수.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// 노드가 없는지 여부. 구성된 그래프는 항상 루트를 가진다.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// 노드를 조회한다.
    pub fn node(&self, id: NodeId) -> Result<&ContextNode, GraphError> {
        self.nodes.get(id.0).ok_or(GraphError::UnknownNode(id))
    }

    /// 전체 노드를 생성 순서대로 순회한다.
    pub fn nodes(&self) -> impl Iterator<Item = &ContextNode> {
        self.nodes.iter()
    }

    /// 그래프에 포함된 클래스 ID 집합.
    pub fn classes(&self) -> BTreeSet<String> {
        self.nodes.iter().map(|node| node.class.clone()).collect()
    }

    /// 해당 클래스의 첫 노드(생성 순서 기준).
    pub fn first_of_class(&self, class: &str) -> Option<NodeId> {
        self.nodes
            .iter()
            .find(|node| node.class == class)
            .map(|node| node.id)
    }

    /// 별칭으로 서브컨텍스트를 찾는다. 그래프 안 어느 노드에서 시작해도 결과가 같다.
    pub fn resolve(&self, from: NodeId, alias: &str) -> Result<NodeId, GraphError> {
        self.node(from)?;
        self.aliases
            .get(alias)
            .copied()
            .ok_or_else(|| GraphError::UnknownSubcontext(alias.to_string()))
    }

    /// 클래스 ID 또는 capability 태그로 유일한 노드를 찾는다.
    pub fn resolve_by_capability(
        &self,
        from: NodeId,
        capability: &str,
    ) -> Result<NodeId, GraphError> {
        self.node(from)?;
        let matches: Vec<&ContextNode> = self
            .nodes
            .iter()
            .filter(|node| node.provides(capability))
            .collect();
        match matches.as_slice() {
            [] => Err(GraphError::NotFound(capability.to_string())),
            [only] => Ok(only.id),
            many => Err(GraphError::AmbiguousCapability {
                capability: capability.to_string(),
                matches: many.iter().map(|node| describe(node)).collect(),
            }),
        }
    }

    /// 노드 상태를 타입으로 빌려온다.
    pub fn state<T: Any>(&self, id: NodeId) -> Result<&T, GraphError> {
        let node = self.node(id)?;
        node.state
            .downcast_ref::<T>()
            .ok_or_else(|| GraphError::TypeMismatch {
                class: node.class.clone(),
                expected: type_name::<T>(),
            })
    }

    /// 노드 상태를 타입으로 가변 대여한다.
    pub fn state_mut<T: Any>(&mut self, id: NodeId) -> Result<&mut T, GraphError> {
        let node = self.nodes.get_mut(id.0).ok_or(GraphError::UnknownNode(id))?;
        let class = node.class.clone();
        node.state
            .downcast_mut::<T>()
            .ok_or(GraphError::TypeMismatch {
                class,
                expected: type_name::<T>(),
            })
    }
}

/// 오류 메시지용 `클래스(별칭)` 표기.
fn describe(node: &ContextNode) -> String {
    match &node.alias {
        Some(alias) => format!("{}({alias})", node.class),
        None => format!("{}(root)", node.class),
    }
}
