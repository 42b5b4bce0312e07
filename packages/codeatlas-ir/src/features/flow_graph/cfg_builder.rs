//! Control-flow construction: recursive descent over statement lists into a
//! block graph with ENTRY/EXIT sentinels.
//!
//! `if`/`while`/`for`/`try` insert CONDITION/LOOP blocks with
//! true/false/back edges. Code after a terminator lands in an unreachable
//! block that is retained for diagnostics but never linked.

use crate::features::parsing::domain::{SyntaxKind, SyntaxNode};
use crate::shared::models::{CfgBlock, CfgBlockKind, CfgEdge, CfgEdgeKind, Span};

pub struct CfgBuilder {
    function_id: String,
    blocks: Vec<CfgBlock>,
    edges: Vec<CfgEdge>,
    counter: u32,
    exit_id: String,
}

/// Where control goes after a statement sequence.
enum FlowEnd {
    /// Open block, flow continues from it.
    Open(String),
    /// Sequence ended on a terminator; nothing to chain.
    Terminated,
}

impl CfgBuilder {
    /// Build the CFG for one function body.
    pub fn build(function_id: &str, body: &SyntaxNode) -> (Vec<CfgBlock>, Vec<CfgEdge>) {
        let mut builder = CfgBuilder {
            function_id: function_id.to_string(),
            blocks: Vec::new(),
            edges: Vec::new(),
            counter: 0,
            exit_id: String::new(),
        };

        let entry_id = builder.new_block(CfgBlockKind::Entry, body.span);
        builder.exit_id = builder.new_block(CfgBlockKind::Exit, body.span);

        let first = builder.new_block(CfgBlockKind::Block, body.span);
        builder.link(&entry_id, &first, CfgEdgeKind::Seq);

        let exit_id = builder.exit_id.clone();
        match builder.process_statements(&body.children, first, None) {
            FlowEnd::Open(last) => builder.link(&last, &exit_id, CfgEdgeKind::Seq),
            FlowEnd::Terminated => {}
        }

        (builder.blocks, builder.edges)
    }

    fn new_block(&mut self, kind: CfgBlockKind, span: Span) -> String {
        self.counter += 1;
        let id = format!("cfg:{}:{}", self.function_id, self.counter);
        self.blocks.push(CfgBlock {
            id: id.clone(),
            function_node_id: self.function_id.clone(),
            kind,
            span,
            statements: Vec::new(),
            unreachable: false,
        });
        id
    }

    fn link(&mut self, source: &str, target: &str, kind: CfgEdgeKind) {
        self.edges.push(CfgEdge {
            source_block_id: source.to_string(),
            target_block_id: target.to_string(),
            kind,
        });
    }

    fn append_statement(&mut self, block_id: &str, span: Span) {
        if let Some(block) = self.blocks.iter_mut().find(|b| b.id == block_id) {
            block.statements.push(span);
        }
    }

    fn mark_unreachable(&mut self, block_id: &str) {
        if let Some(block) = self.blocks.iter_mut().find(|b| b.id == block_id) {
            block.unreachable = true;
        }
    }

    /// Process a statement list flowing out of `current`.
    ///
    /// `loop_header` is the innermost LOOP block, target for back edges from
    /// `continue` (and fall-through at loop-body end).
    fn process_statements(
        &mut self,
        statements: &[SyntaxNode],
        mut current: String,
        loop_header: Option<&str>,
    ) -> FlowEnd {
        let mut terminated = false;

        for stmt in statements {
            if terminated {
                // Dead code after a terminator: retained, unlinked.
                let dead = self.new_block(CfgBlockKind::Block, stmt.span);
                self.mark_unreachable(&dead);
                self.append_statement(&dead, stmt.span);
                continue;
            }

            match &stmt.kind {
                SyntaxKind::IfStmt => {
                    current = match self.process_if(stmt, current.clone(), loop_header) {
                        FlowEnd::Open(id) => id,
                        FlowEnd::Terminated => {
                            terminated = true;
                            continue;
                        }
                    };
                }
                SyntaxKind::WhileStmt | SyntaxKind::ForStmt => {
                    current = self.process_loop(stmt, current, loop_header);
                }
                SyntaxKind::TryStmt => {
                    current = match self.process_try(stmt, current.clone(), loop_header) {
                        FlowEnd::Open(id) => id,
                        FlowEnd::Terminated => {
                            terminated = true;
                            continue;
                        }
                    };
                }
                SyntaxKind::ReturnStmt | SyntaxKind::RaiseStmt => {
                    self.append_statement(&current, stmt.span);
                    let exit = self.exit_id.clone();
                    self.link(&current, &exit, CfgEdgeKind::Seq);
                    terminated = true;
                }
                SyntaxKind::BreakStmt => {
                    self.append_statement(&current, stmt.span);
                    // The loop join edge is added by the enclosing loop via
                    // the False edge; break simply terminates this chain.
                    terminated = true;
                }
                SyntaxKind::ContinueStmt => {
                    self.append_statement(&current, stmt.span);
                    if let Some(header) = loop_header {
                        let header = header.to_string();
                        self.link(&current, &header, CfgEdgeKind::Back);
                    }
                    terminated = true;
                }
                _ => {
                    self.append_statement(&current, stmt.span);
                }
            }
        }

        if terminated {
            FlowEnd::Terminated
        } else {
            FlowEnd::Open(current)
        }
    }

    /// `if` / `elif` / `else` chain.
    fn process_if(
        &mut self,
        stmt: &SyntaxNode,
        current: String,
        loop_header: Option<&str>,
    ) -> FlowEnd {
        let cond_span = stmt
            .child_by_field("condition")
            .map(|c| c.span)
            .unwrap_or(stmt.span);
        let cond = self.condition_subgraph(stmt.child_by_field("condition"), cond_span, &current);

        let join = self.new_block(CfgBlockKind::Block, stmt.span);
        let mut any_open = false;

        // True branch
        if let Some(body) = stmt.child_by_field("consequence") {
            let then_block = self.new_block(CfgBlockKind::Block, body.span);
            self.link(&cond, &then_block, CfgEdgeKind::True);
            if let FlowEnd::Open(end) = self.process_statements(&body.children, then_block, loop_header)
            {
                self.link(&end, &join, CfgEdgeKind::Seq);
                any_open = true;
            }
        } else {
            self.link(&cond, &join, CfgEdgeKind::True);
            any_open = true;
        }

        // elif/else chain under the `alternative` field
        let alternatives: Vec<&SyntaxNode> = stmt
            .children
            .iter()
            .filter(|c| matches!(c.kind, SyntaxKind::ElifClause | SyntaxKind::ElseClause))
            .collect();

        let mut false_source = cond;
        let mut has_else = false;
        for alt in alternatives {
            match alt.kind {
                SyntaxKind::ElifClause => {
                    let elif_span = alt
                        .child_by_field("condition")
                        .map(|c| c.span)
                        .unwrap_or(alt.span);
                    let elif_cond = self.new_block(CfgBlockKind::Condition, elif_span);
                    self.link(&false_source, &elif_cond, CfgEdgeKind::False);

                    if let Some(body) = alt.child_by_field("consequence") {
                        let block = self.new_block(CfgBlockKind::Block, body.span);
                        self.link(&elif_cond, &block, CfgEdgeKind::True);
                        if let FlowEnd::Open(end) =
                            self.process_statements(&body.children, block, loop_header)
                        {
                            self.link(&end, &join, CfgEdgeKind::Seq);
                            any_open = true;
                        }
                    }
                    false_source = elif_cond;
                }
                SyntaxKind::ElseClause => {
                    has_else = true;
                    if let Some(body) = alt.child_by_field("body") {
                        let block = self.new_block(CfgBlockKind::Block, body.span);
                        self.link(&false_source, &block, CfgEdgeKind::False);
                        if let FlowEnd::Open(end) =
                            self.process_statements(&body.children, block, loop_header)
                        {
                            self.link(&end, &join, CfgEdgeKind::Seq);
                            any_open = true;
                        }
                    }
                }
                _ => {}
            }
        }

        if !has_else {
            self.link(&false_source, &join, CfgEdgeKind::False);
            any_open = true;
        }

        if any_open {
            FlowEnd::Open(join)
        } else {
            self.mark_unreachable(&join);
            FlowEnd::Terminated
        }
    }

    /// Short-circuit booleans expand into one CONDITION block per operand.
    fn condition_subgraph(
        &mut self,
        condition: Option<&SyntaxNode>,
        span: Span,
        current: &str,
    ) -> String {
        let Some(cond_node) = condition else {
            let cond = self.new_block(CfgBlockKind::Condition, span);
            self.link(current, &cond, CfgEdgeKind::Seq);
            return cond;
        };

        if cond_node.kind == SyntaxKind::BoolOpExpr {
            // a and b / a or b: evaluate left, then right.
            let mut prev: Option<String> = None;
            for operand in &cond_node.children {
                let block = self.new_block(CfgBlockKind::Condition, operand.span);
                match prev {
                    None => self.link(current, &block, CfgEdgeKind::Seq),
                    Some(p) => self.link(&p, &block, CfgEdgeKind::True),
                }
                prev = Some(block);
            }
            prev.unwrap_or_else(|| {
                let cond = self.new_block(CfgBlockKind::Condition, span);
                self.link(current, &cond, CfgEdgeKind::Seq);
                cond
            })
        } else {
            let cond = self.new_block(CfgBlockKind::Condition, span);
            self.link(current, &cond, CfgEdgeKind::Seq);
            cond
        }
    }

    /// `while`/`for`: LOOP header, True into the body, Back from the body
    /// end, False out to the join.
    fn process_loop(
        &mut self,
        stmt: &SyntaxNode,
        current: String,
        _outer_loop: Option<&str>,
    ) -> String {
        let header_span = stmt
            .child_by_field("condition")
            .or_else(|| stmt.child_by_field("right"))
            .map(|c| c.span)
            .unwrap_or(stmt.span);
        let header = self.new_block(CfgBlockKind::Loop, header_span);
        self.link(&current, &header, CfgEdgeKind::Seq);

        if let Some(body) = stmt.child_by_field("body") {
            let body_block = self.new_block(CfgBlockKind::Block, body.span);
            self.link(&header, &body_block, CfgEdgeKind::True);
            if let FlowEnd::Open(end) =
                self.process_statements(&body.children, body_block, Some(header.as_str()))
            {
                self.link(&end, &header, CfgEdgeKind::Back);
            }
        }

        let join = self.new_block(CfgBlockKind::Block, stmt.span);
        self.link(&header, &join, CfgEdgeKind::False);
        join
    }

    /// `try`: body first, every handler reachable from the try head, all
    /// open ends meeting at a join. `finally` runs on the join path.
    fn process_try(
        &mut self,
        stmt: &SyntaxNode,
        current: String,
        loop_header: Option<&str>,
    ) -> FlowEnd {
        let join = self.new_block(CfgBlockKind::Block, stmt.span);
        let mut any_open = false;

        let body_block = self.new_block(CfgBlockKind::Block, stmt.span);
        self.link(&current, &body_block, CfgEdgeKind::Seq);
        if let Some(body) = stmt.child_by_field("body") {
            if let FlowEnd::Open(end) = self.process_statements(&body.children, body_block.clone(), loop_header) {
                self.link(&end, &join, CfgEdgeKind::Seq);
                any_open = true;
            }
        } else {
            self.link(&body_block, &join, CfgEdgeKind::Seq);
            any_open = true;
        }

        for handler in stmt.children_of_kind(&SyntaxKind::ExceptClause) {
            let handler_block = self.new_block(CfgBlockKind::Condition, handler.span);
            // An exception may surface anywhere in the body.
            self.link(&body_block, &handler_block, CfgEdgeKind::False);
            let inner = handler
                .first_child_of_kind(&SyntaxKind::Block)
                .map(|b| b.children.as_slice())
                .unwrap_or(&[]);
            let handler_body = self.new_block(CfgBlockKind::Block, handler.span);
            self.link(&handler_block, &handler_body, CfgEdgeKind::True);
            if let FlowEnd::Open(end) = self.process_statements(inner, handler_body, loop_header) {
                self.link(&end, &join, CfgEdgeKind::Seq);
                any_open = true;
            }
        }

        if let Some(finally) = stmt.first_child_of_kind(&SyntaxKind::FinallyClause) {
            let inner = finally
                .first_child_of_kind(&SyntaxKind::Block)
                .map(|b| b.children.as_slice())
                .unwrap_or(&[]);
            let finally_block = self.new_block(CfgBlockKind::Block, finally.span);
            self.link(&join, &finally_block, CfgEdgeKind::Seq);
            return match self.process_statements(inner, finally_block, loop_header) {
                FlowEnd::Open(end) => FlowEnd::Open(end),
                FlowEnd::Terminated => FlowEnd::Terminated,
            };
        }

        if any_open {
            FlowEnd::Open(join)
        } else {
            self.mark_unreachable(&join);
            FlowEnd::Terminated
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::parsing::{Parser, PythonParser};

    fn cfg_for(source: &str) -> (Vec<CfgBlock>, Vec<CfgEdge>) {
        let parsed = PythonParser::new().parse("t.py", source).unwrap();
        let root = parsed.root.unwrap();
        let func = root
            .first_child_of_kind(&SyntaxKind::FunctionDef)
            .expect("function");
        let body = func.child_by_field("body").expect("body");
        CfgBuilder::build("fn:test", body)
    }

    fn kind_count(blocks: &[CfgBlock], kind: CfgBlockKind) -> usize {
        blocks.iter().filter(|b| b.kind == kind).count()
    }

    #[test]
    fn test_straight_line_has_entry_and_exit() {
        let (blocks, edges) = cfg_for("def f():\n    a = 1\n    b = 2\n");
        assert_eq!(kind_count(&blocks, CfgBlockKind::Entry), 1);
        assert_eq!(kind_count(&blocks, CfgBlockKind::Exit), 1);
        // entry → body → exit
        assert!(edges.len() >= 2);
        let body = blocks.iter().find(|b| b.kind == CfgBlockKind::Block).unwrap();
        assert_eq!(body.statements.len(), 2);
    }

    #[test]
    fn test_if_produces_condition_and_branches() {
        let (blocks, edges) = cfg_for("def f(x):\n    if x:\n        a = 1\n    b = 2\n");
        assert_eq!(kind_count(&blocks, CfgBlockKind::Condition), 1);
        assert!(edges.iter().any(|e| e.kind == CfgEdgeKind::True));
        assert!(edges.iter().any(|e| e.kind == CfgEdgeKind::False));
    }

    #[test]
    fn test_while_produces_loop_and_back_edge() {
        let (blocks, edges) = cfg_for("def f(x):\n    while x:\n        x = x - 1\n    return x\n");
        assert_eq!(kind_count(&blocks, CfgBlockKind::Loop), 1);
        assert!(edges.iter().any(|e| e.kind == CfgEdgeKind::Back));
        assert!(edges.iter().any(|e| e.kind == CfgEdgeKind::False));
    }

    #[test]
    fn test_dead_code_after_return_is_unreachable() {
        let (blocks, _) = cfg_for("def f():\n    return 1\n    x = 2\n");
        assert!(blocks.iter().any(|b| b.unreachable));
    }

    #[test]
    fn test_short_circuit_expands_conditions() {
        let (blocks, _) = cfg_for("def f(a, b):\n    if a and b:\n        return 1\n    return 2\n");
        assert_eq!(kind_count(&blocks, CfgBlockKind::Condition), 2);
    }

    #[test]
    fn test_try_except_subgraph() {
        let (blocks, edges) =
            cfg_for("def f():\n    try:\n        a = 1\n    except ValueError:\n        a = 2\n    return a\n");
        // handler head is a condition block
        assert!(kind_count(&blocks, CfgBlockKind::Condition) >= 1);
        assert!(edges.iter().any(|e| e.kind == CfgEdgeKind::True));
    }

    #[test]
    fn test_continue_links_back_to_header() {
        let (blocks, edges) =
            cfg_for("def f(xs):\n    for x in xs:\n        if x:\n            continue\n        y = x\n    return 0\n");
        let header = blocks.iter().find(|b| b.kind == CfgBlockKind::Loop).unwrap();
        assert!(edges
            .iter()
            .any(|e| e.kind == CfgEdgeKind::Back && e.target_block_id == header.id));
    }
}
