//! Control-flow graph records, stored per function on the IR document.

use super::span::Span;
use serde::{Deserialize, Serialize};

/// Block kind in a function-level CFG.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CfgBlockKind {
    Entry,
    Block,
    Condition,
    Loop,
    Exit,
}

impl CfgBlockKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CfgBlockKind::Entry => "ENTRY",
            CfgBlockKind::Block => "BLOCK",
            CfgBlockKind::Condition => "CONDITION",
            CfgBlockKind::Loop => "LOOP",
            CfgBlockKind::Exit => "EXIT",
        }
    }
}

/// Basic block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CfgBlock {
    pub id: String,
    pub function_node_id: String,
    pub kind: CfgBlockKind,
    pub span: Span,
    /// Statement spans grouped into this block, in source order.
    pub statements: Vec<Span>,
    /// Retained-but-unreachable blocks (code after a terminator) keep their
    /// diagnostics value without participating in flow.
    #[serde(default)]
    pub unreachable: bool,
}

/// Edge kind between CFG blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CfgEdgeKind {
    Seq,
    True,
    False,
    Back,
}

impl CfgEdgeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CfgEdgeKind::Seq => "seq",
            CfgEdgeKind::True => "true",
            CfgEdgeKind::False => "false",
            CfgEdgeKind::Back => "back",
        }
    }
}

/// Edge between two CFG blocks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CfgEdge {
    pub source_block_id: String,
    pub target_block_id: String,
    pub kind: CfgEdgeKind,
}
