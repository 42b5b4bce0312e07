//! Shared models

mod cfg;
mod edge;
mod error;
mod finding;
mod ids;
mod ir_document;
mod node;
mod occurrence;
mod semantic;
mod span;

pub use cfg::{CfgBlock, CfgBlockKind, CfgEdge, CfgEdgeKind};
pub use edge::{Edge, EdgeKind};
pub use error::{CodeatlasError, ErrorKind, Result};
pub use finding::{compare_findings, Finding, FindingsDiff, FlowStep, Severity};
pub use ids::{edge_id, node_id, ContentHash, EdgeIdGenerator, NodeId};
pub use ir_document::{is_external_id, IRDocument};
pub use node::{KindGroup, Node, NodeKind};
pub use occurrence::{sort_occurrences, Occurrence, OccurrenceRole};
pub use semantic::{
    DfgEdge, DfgEdgeKind, DfgVariable, Expression, ExpressionKind, ParameterInfo,
    SignatureEntity, TypeEntity,
};
pub use span::{Span, SpanId, SpanPool};
