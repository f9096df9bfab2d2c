mod graph;
mod node;
mod scope;

pub use graph::{CompositionPlan, ContextGraph, ContextParameters, PlannedNode, plan_composition};
pub use node::{ContextNode, NodeId};
pub use scope::Scope;
