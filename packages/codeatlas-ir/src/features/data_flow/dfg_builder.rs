//! Data-flow construction: one variable entity per lexical definition,
//! assign/alias/arg/return edges, and expression records per function.
//!
//! No SSA. A redefinition mints a new entity; branch merges are approximated
//! by keeping every predecessor edge and letting the query engine walk them.

use crate::features::parsing::domain::{ParsedFile, SyntaxKind, SyntaxNode};
use crate::shared::models::{
    DfgEdge, DfgEdgeKind, DfgVariable, Expression, ExpressionKind, IRDocument, NodeId, NodeKind,
};
use rustc_hash::FxHashMap;
use serde_json::json;

/// A value source feeding an assignment or argument.
#[derive(Debug, Clone)]
enum SourceRef {
    Variable(String),
    Expr(String),
}

pub struct DfgBuilder<'a> {
    doc: &'a IRDocument,
    variables: Vec<DfgVariable>,
    edges: Vec<DfgEdge>,
    expressions: Vec<Expression>,
    /// function node id → parameter entity ids, in declaration order.
    param_entities: FxHashMap<NodeId, Vec<String>>,
    /// call span → resolved callee node id (from structural CALLS edges).
    call_targets: FxHashMap<(u32, u32), NodeId>,
    var_counter: u32,
    expr_counter: u32,
}

pub struct DfgOutput {
    pub variables: Vec<DfgVariable>,
    pub edges: Vec<DfgEdge>,
    pub expressions: Vec<Expression>,
}

impl<'a> DfgBuilder<'a> {
    pub fn new(doc: &'a IRDocument) -> Self {
        let call_targets = doc
            .edges
            .iter()
            .filter(|e| e.kind == crate::shared::models::EdgeKind::Calls)
            .filter_map(|e| {
                e.span
                    .map(|s| ((s.start_line, s.start_col), e.target_id.clone()))
            })
            .collect();

        Self {
            doc,
            variables: Vec::new(),
            edges: Vec::new(),
            expressions: Vec::new(),
            param_entities: FxHashMap::default(),
            call_targets,
            var_counter: 0,
            expr_counter: 0,
        }
    }

    /// Build data flow for every function in the document.
    pub fn build(mut self, parsed: &ParsedFile) -> DfgOutput {
        let Some(root) = parsed.root.as_ref() else {
            return DfgOutput {
                variables: self.variables,
                edges: self.edges,
                expressions: self.expressions,
            };
        };

        // CST function definitions by position.
        let mut defs: FxHashMap<(u32, u32), &SyntaxNode> = FxHashMap::default();
        collect_function_defs(root, &mut defs);

        let functions: Vec<(NodeId, (u32, u32))> = self
            .doc
            .nodes
            .iter()
            .filter(|n| matches!(n.kind, NodeKind::Function | NodeKind::Method))
            .map(|n| (n.id.clone(), (n.span.start_line, n.span.start_col)))
            .collect();

        // Parameters first so arg edges can target callee parameters no
        // matter the processing order.
        for (function_id, pos) in &functions {
            if let Some(def) = defs.get(pos) {
                self.declare_parameters(function_id, def);
            }
        }

        for (function_id, pos) in &functions {
            if let Some(def) = defs.get(pos) {
                if let Some(body) = def.child_by_field("body") {
                    let mut env: FxHashMap<String, String> = FxHashMap::default();
                    // Seed with parameters
                    if let Some(params) = self.param_entities.get(function_id) {
                        let names: Vec<(String, String)> = params
                            .iter()
                            .filter_map(|id| {
                                self.variables
                                    .iter()
                                    .find(|v| &v.id == id)
                                    .map(|v| (v.name.clone(), v.id.clone()))
                            })
                            .collect();
                        env.extend(names);
                    }
                    self.process_block(function_id, &body.children, &mut env);
                }
            }
        }

        // Module scope is a pseudo-function anchored on the FILE node, so
        // top-level assignment chains and calls flow like any other.
        let file_node_id = self
            .doc
            .nodes
            .iter()
            .find(|n| n.kind == NodeKind::File)
            .map(|n| n.id.clone());
        if let Some(file_id) = file_node_id {
            let mut env: FxHashMap<String, String> = FxHashMap::default();
            self.process_block(&file_id, &root.children, &mut env);
        }

        DfgOutput {
            variables: self.variables,
            edges: self.edges,
            expressions: self.expressions,
        }
    }

    fn new_variable(
        &mut self,
        function_id: &str,
        name: &str,
        span: crate::shared::models::Span,
        is_parameter: bool,
        is_return: bool,
    ) -> String {
        self.var_counter += 1;
        let id = format!("dfgvar:{}:{}:{}", function_id, name, self.var_counter);
        self.variables.push(DfgVariable {
            id: id.clone(),
            name: name.to_string(),
            function_node_id: function_id.to_string(),
            span,
            is_parameter,
            is_return,
        });
        id
    }

    fn new_expression(
        &mut self,
        kind: ExpressionKind,
        function_id: &str,
        span: crate::shared::models::Span,
    ) -> usize {
        self.expr_counter += 1;
        let id = format!("expr:{}:{}", self.doc.file_path, self.expr_counter);
        self.expressions.push(Expression {
            id,
            kind,
            function_node_id: function_id.to_string(),
            span,
            attrs: Default::default(),
        });
        self.expressions.len() - 1
    }

    fn declare_parameters(&mut self, function_id: &str, def: &SyntaxNode) {
        let Some(params) = def.child_by_field("parameters") else {
            return;
        };
        let mut entities = Vec::new();
        for param in &params.children {
            let name_node = match param.kind {
                SyntaxKind::NameExpr => Some(param),
                _ => param
                    .child_by_field("name")
                    .or_else(|| param.first_child_of_kind(&SyntaxKind::NameExpr)),
            };
            let Some(name_node) = name_node else { continue };
            let name = name_node.text();
            if name.is_empty() {
                continue;
            }
            let id = self.new_variable(function_id, name, name_node.span, true, false);
            entities.push(id);
        }
        self.param_entities.insert(function_id.to_string(), entities);
    }

    fn process_block(
        &mut self,
        function_id: &str,
        statements: &[SyntaxNode],
        env: &mut FxHashMap<String, String>,
    ) {
        for stmt in statements {
            match &stmt.kind {
                // Definitions own their bodies; handled by their own pass.
                SyntaxKind::FunctionDef | SyntaxKind::ClassDef | SyntaxKind::Decorated => {}
                SyntaxKind::ExpressionStmt => {
                    for child in &stmt.children {
                        if child.kind == SyntaxKind::AssignmentStmt {
                            self.process_assignment(function_id, child, env);
                        } else {
                            self.process_expr(function_id, child, env);
                        }
                    }
                }
                SyntaxKind::AssignmentStmt => {
                    self.process_assignment(function_id, stmt, env);
                }
                SyntaxKind::ReturnStmt => {
                    let sources: Vec<SourceRef> = stmt
                        .children
                        .iter()
                        .flat_map(|c| self.process_expr(function_id, c, env))
                        .collect();
                    if !sources.is_empty() {
                        let ret = self.return_entity(function_id, stmt.span);
                        for source in sources {
                            self.push_flow_edge(DfgEdgeKind::Return, &source, &ret, stmt.span);
                        }
                    }
                }
                SyntaxKind::IfStmt
                | SyntaxKind::ElifClause
                | SyntaxKind::ElseClause
                | SyntaxKind::ForStmt
                | SyntaxKind::WhileStmt
                | SyntaxKind::TryStmt
                | SyntaxKind::ExceptClause
                | SyntaxKind::FinallyClause
                | SyntaxKind::WithStmt
                | SyntaxKind::Block => {
                    // Conditions feed no bindings; nested blocks share the
                    // lexical environment (phi-by-multiple-edges).
                    for child in &stmt.children {
                        if child.kind == SyntaxKind::Block {
                            self.process_block(function_id, &child.children, env);
                        } else if matches!(
                            child.kind,
                            SyntaxKind::ElifClause | SyntaxKind::ElseClause | SyntaxKind::ExceptClause | SyntaxKind::FinallyClause
                        ) {
                            self.process_block(
                                function_id,
                                std::slice::from_ref(child),
                                env,
                            );
                        } else {
                            self.process_expr(function_id, child, env);
                        }
                    }
                }
                _ => {
                    for child in &stmt.children {
                        self.process_expr(function_id, child, env);
                    }
                }
            }
        }
    }

    fn return_entity(&mut self, function_id: &str, span: crate::shared::models::Span) -> SourceRef {
        let existing = self
            .variables
            .iter()
            .find(|v| v.function_node_id == function_id && v.is_return)
            .map(|v| v.id.clone());
        let id = match existing {
            Some(id) => id,
            None => self.new_variable(function_id, "<return>", span, false, true),
        };
        SourceRef::Variable(id)
    }

    fn process_assignment(
        &mut self,
        function_id: &str,
        stmt: &SyntaxNode,
        env: &mut FxHashMap<String, String>,
    ) {
        let sources: Vec<SourceRef> = stmt
            .child_by_field("right")
            .map(|rhs| self.process_expr(function_id, rhs, env))
            .unwrap_or_default();

        let direct_alias = stmt
            .child_by_field("right")
            .map(|rhs| rhs.kind == SyntaxKind::NameExpr)
            .unwrap_or(false);

        let Some(left) = stmt.child_by_field("left") else {
            return;
        };
        for target in name_targets(left) {
            let entity = self.new_variable(function_id, target.text(), target.span, false, false);
            for source in &sources {
                let kind = if direct_alias && matches!(source, SourceRef::Variable(_)) {
                    DfgEdgeKind::Alias
                } else {
                    DfgEdgeKind::Assign
                };
                self.push_flow_edge(kind, source, &SourceRef::Variable(entity.clone()), target.span);
            }
            env.insert(target.text().to_string(), entity);
        }
    }

    fn push_flow_edge(
        &mut self,
        kind: DfgEdgeKind,
        source: &SourceRef,
        target: &SourceRef,
        span: crate::shared::models::Span,
    ) {
        let source_id = match source {
            SourceRef::Variable(id) | SourceRef::Expr(id) => id.clone(),
        };
        let target_id = match target {
            SourceRef::Variable(id) | SourceRef::Expr(id) => id.clone(),
        };
        self.edges.push(DfgEdge {
            kind,
            source_id,
            target_id,
            span: Some(span),
        });
    }

    /// Walk an expression, returning the value sources it contributes.
    fn process_expr(
        &mut self,
        function_id: &str,
        expr: &SyntaxNode,
        env: &mut FxHashMap<String, String>,
    ) -> Vec<SourceRef> {
        match &expr.kind {
            SyntaxKind::NameExpr => env
                .get(expr.text())
                .map(|id| vec![SourceRef::Variable(id.clone())])
                .unwrap_or_default(),
            SyntaxKind::CallExpr => {
                let expr_id = self.process_call(function_id, expr, env);
                vec![SourceRef::Expr(expr_id)]
            }
            SyntaxKind::AwaitExpr | SyntaxKind::YieldExpr => expr
                .children
                .iter()
                .flat_map(|c| self.process_expr(function_id, c, env))
                .collect(),
            SyntaxKind::BinaryExpr
            | SyntaxKind::BoolOpExpr
            | SyntaxKind::CompareExpr
            | SyntaxKind::ConditionalExpr
            | SyntaxKind::AttributeExpr
            | SyntaxKind::SubscriptExpr => expr
                .children
                .iter()
                .flat_map(|c| self.process_expr(function_id, c, env))
                .collect(),
            SyntaxKind::Literal | SyntaxKind::StringLiteral => Vec::new(),
            _ => expr
                .children
                .iter()
                .flat_map(|c| self.process_expr(function_id, c, env))
                .collect(),
        }
    }

    /// Record a call expression; wire arg edges where the callee's
    /// parameters are known (same-file resolved targets).
    fn process_call(
        &mut self,
        function_id: &str,
        call: &SyntaxNode,
        env: &mut FxHashMap<String, String>,
    ) -> String {
        let callee_text = call
            .child_by_field("function")
            .map(|f| f.text().to_string())
            .unwrap_or_default();
        let callee_name = callee_text
            .rsplit('.')
            .next()
            .unwrap_or(&callee_text)
            .to_string();
        let base = callee_text
            .rsplit_once('.')
            .map(|(prefix, _)| prefix.to_string());

        let mut arg_sources: Vec<Vec<SourceRef>> = Vec::new();
        if let Some(args) = call.child_by_field("arguments") {
            for arg in &args.children {
                let value = match arg.raw_kind.as_str() {
                    // keyword_argument: name = value
                    "keyword_argument" => arg.child_by_field("value").unwrap_or(arg),
                    _ => arg,
                };
                arg_sources.push(self.process_expr(function_id, value, env));
            }
        }

        let idx = self.new_expression(ExpressionKind::Call, function_id, call.span);
        let expr_id = self.expressions[idx].id.clone();

        let callee_node_id = self
            .call_targets
            .get(&(call.span.start_line, call.span.start_col))
            .cloned();

        // Arg edges into known callee parameters
        if let Some(callee_id) = &callee_node_id {
            if let Some(params) = self.param_entities.get(callee_id).cloned() {
                // Skip an implicit `self` receiver slot for methods.
                let offset = usize::from(
                    self.variables
                        .iter()
                        .any(|v| params.first() == Some(&v.id) && v.name == "self"),
                );
                for (i, sources) in arg_sources.iter().enumerate() {
                    if let Some(param_id) = params.get(i + offset) {
                        for source in sources {
                            self.push_flow_edge(
                                DfgEdgeKind::Arg,
                                source,
                                &SourceRef::Variable(param_id.clone()),
                                call.span,
                            );
                        }
                    }
                }
            }
        }

        let arg_entities: Vec<Vec<String>> = arg_sources
            .iter()
            .map(|sources| {
                sources
                    .iter()
                    .map(|s| match s {
                        SourceRef::Variable(id) | SourceRef::Expr(id) => id.clone(),
                    })
                    .collect()
            })
            .collect();

        let expr = &mut self.expressions[idx];
        expr.attrs.insert("callee".to_string(), json!(callee_text));
        expr.attrs
            .insert("callee_name".to_string(), json!(callee_name));
        if let Some(base) = base {
            expr.attrs.insert("base".to_string(), json!(base));
        }
        if let Some(id) = callee_node_id {
            expr.attrs.insert("callee_id".to_string(), json!(id));
        }
        expr.attrs
            .insert("arg_entities".to_string(), json!(arg_entities));

        expr_id
    }
}

/// Name-pattern targets of an assignment left-hand side.
fn name_targets(left: &SyntaxNode) -> Vec<&SyntaxNode> {
    match &left.kind {
        SyntaxKind::NameExpr => vec![left],
        SyntaxKind::Other(raw)
            if raw == "pattern_list" || raw == "tuple_pattern" || raw == "list_pattern" =>
        {
            left.children.iter().flat_map(name_targets).collect()
        }
        _ => Vec::new(),
    }
}

fn collect_function_defs<'t>(
    node: &'t SyntaxNode,
    out: &mut FxHashMap<(u32, u32), &'t SyntaxNode>,
) {
    if node.kind == SyntaxKind::FunctionDef {
        out.insert((node.span.start_line, node.span.start_col), node);
    }
    for child in &node.children {
        collect_function_defs(child, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::ir_generation::StructuralIrBuilder;
    use crate::features::parsing::{Parser, PythonParser};

    fn dfg_for(source: &str) -> (IRDocument, DfgOutput) {
        let parsed = PythonParser::new().parse("m.py", source).unwrap();
        let doc = StructuralIrBuilder::new("r", &parsed).build(&parsed).unwrap();
        let out = DfgBuilder::new(&doc).build(&parsed);
        (doc, out)
    }

    #[test]
    fn test_parameters_become_entities() {
        let (_, out) = dfg_for("def f(a, b):\n    return a\n");
        let params: Vec<_> = out.variables.iter().filter(|v| v.is_parameter).collect();
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn test_alias_edge_for_direct_copy() {
        let (_, out) = dfg_for("def f(x):\n    y = x\n");
        assert!(out
            .edges
            .iter()
            .any(|e| e.kind == DfgEdgeKind::Alias));
    }

    #[test]
    fn test_assign_edge_from_call() {
        let (_, out) = dfg_for("def f():\n    q = get()\n");
        let assign = out
            .edges
            .iter()
            .find(|e| e.kind == DfgEdgeKind::Assign)
            .unwrap();
        assert!(assign.source_id.starts_with("expr:"));
        assert!(assign.target_id.starts_with("dfgvar:"));
        assert_eq!(out.expressions.len(), 1);
        assert_eq!(out.expressions[0].attr_str("callee_name"), Some("get"));
    }

    #[test]
    fn test_return_edge_targets_synthetic_entity() {
        let (_, out) = dfg_for("def f(x):\n    return x\n");
        let ret_var = out.variables.iter().find(|v| v.is_return).unwrap();
        assert!(out
            .edges
            .iter()
            .any(|e| e.kind == DfgEdgeKind::Return && e.target_id == ret_var.id));
    }

    #[test]
    fn test_arg_edge_into_same_file_callee() {
        let source = "def callee(v):\n    return v\n\ndef caller(x):\n    callee(x)\n";
        let (_, out) = dfg_for(source);
        let arg = out.edges.iter().find(|e| e.kind == DfgEdgeKind::Arg).unwrap();
        let target = out.variables.iter().find(|v| v.id == arg.target_id).unwrap();
        assert!(target.is_parameter);
        assert_eq!(target.name, "v");
    }

    #[test]
    fn test_redefinition_mints_new_entity() {
        let (_, out) = dfg_for("def f():\n    x = 1\n    x = 2\n");
        let xs: Vec<_> = out.variables.iter().filter(|v| v.name == "x").collect();
        assert_eq!(xs.len(), 2);
        assert_ne!(xs[0].id, xs[1].id);
    }

    #[test]
    fn test_call_records_arg_entities() {
        let (_, out) = dfg_for("def f(q):\n    execute(q)\n");
        let call = &out.expressions[0];
        let args = call.attrs.get("arg_entities").unwrap().as_array().unwrap();
        assert_eq!(args.len(), 1);
        assert!(args[0].as_array().unwrap()[0]
            .as_str()
            .unwrap()
            .starts_with("dfgvar:"));
    }
}
