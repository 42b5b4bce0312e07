//! Structural IR builder: neutral CST → per-file nodes and edges.
//!
//! Depth-first traversal with an explicit scope stack (module → class →
//! function). Cross-file identifiers are NOT resolved here; unresolved
//! references point at deduped external placeholder nodes and carry the raw
//! reference text in attrs for the cross-file layer.

use crate::features::parsing::domain::{ParsedFile, SyntaxKind, SyntaxNode};
use crate::shared::constants::EXTERNAL_FILE;
use crate::shared::models::{
    CodeatlasError, ContentHash, Edge, EdgeIdGenerator, EdgeKind, IRDocument, Node, NodeId,
    NodeKind, ParameterInfo, Result, SignatureEntity, Span, TypeEntity,
};
use serde_json::json;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScopeKind {
    Module,
    Class,
    Function,
}

#[derive(Debug, Clone)]
struct ScopeFrame {
    kind: ScopeKind,
    name: String,
    node_id: NodeId,
}

/// One import-table entry: local binding name → (module path, imported name).
#[derive(Debug, Clone)]
pub struct ImportEntry {
    pub module_path: String,
    pub imported_name: Option<String>,
    pub alias: Option<String>,
}

/// Derive the module fqn from a repo-relative path:
/// `src/app/main.py` → `src.app.main`, `pkg/__init__.py` → `pkg`.
pub fn module_path_for(file_path: &str) -> String {
    let trimmed = file_path
        .trim_start_matches("./")
        .trim_end_matches(".py")
        .trim_end_matches(".pyi");
    let trimmed = trimmed.strip_suffix("/__init__").unwrap_or(trimmed);
    trimmed.replace('/', ".")
}

pub struct StructuralIrBuilder {
    repo_id: String,
    file_path: String,
    language: String,
    module_path: String,

    scope_stack: Vec<ScopeFrame>,
    symbol_table: HashMap<String, NodeId>,
    import_table: HashMap<String, ImportEntry>,
    external_nodes: HashMap<String, NodeId>,
    duplicate_counter: HashMap<String, u32>,

    doc: IRDocument,
    edge_ids: EdgeIdGenerator,
    sig_counter: u32,
    type_counter: u32,
}

impl StructuralIrBuilder {
    pub fn new(repo_id: impl Into<String>, parsed: &ParsedFile) -> Self {
        let repo_id = repo_id.into();
        let module_path = module_path_for(&parsed.file_path);
        let mut doc = IRDocument::new(
            repo_id.clone(),
            parsed.file_path.clone(),
            parsed.language.as_str(),
        );
        doc.line_count = parsed.line_count;
        doc.content_hash = Some(ContentHash::of_file(parsed.source.as_bytes()));

        Self {
            repo_id,
            file_path: parsed.file_path.clone(),
            language: parsed.language.as_str().to_string(),
            module_path,
            scope_stack: Vec::new(),
            symbol_table: HashMap::new(),
            import_table: HashMap::new(),
            external_nodes: HashMap::new(),
            duplicate_counter: HashMap::new(),
            doc,
            edge_ids: EdgeIdGenerator::new(),
            sig_counter: 0,
            type_counter: 0,
        }
    }

    /// Build the structural IR for one parsed file. A `None` tree is the
    /// caller's problem (skip with warning); passing one here is an error.
    pub fn build(mut self, parsed: &ParsedFile) -> Result<IRDocument> {
        let root = parsed
            .root
            .as_ref()
            .ok_or_else(|| {
                CodeatlasError::ir_generation("no syntax tree").with_file(self.file_path.clone())
            })?;

        let file_span = if parsed.source.is_empty() {
            Span::new(1, 0, 1, 0)
        } else {
            root.span
        };

        let file_id = self.make_node_id(NodeKind::File, &self.module_path.clone());
        let file_node = Node::new(
            file_id.clone(),
            NodeKind::File,
            self.module_path.clone(),
            self.file_path.clone(),
            file_span,
        )
        .with_language(self.language.clone())
        .with_name(
            self.file_path
                .rsplit('/')
                .next()
                .unwrap_or(&self.file_path)
                .to_string(),
        )
        .with_module_path(self.module_path.clone());
        self.doc.push_node(file_node);

        self.scope_stack.push(ScopeFrame {
            kind: ScopeKind::Module,
            name: self.module_path.clone(),
            node_id: file_id,
        });

        self.visit_statements(&root.children);

        self.scope_stack.pop();
        Ok(self.doc)
    }

    // ── scope helpers ──────────────────────────────────────────────

    fn current_scope_id(&self) -> NodeId {
        self.scope_stack
            .last()
            .map(|f| f.node_id.clone())
            .unwrap_or_default()
    }

    fn in_class_scope(&self) -> bool {
        self.scope_stack
            .last()
            .map(|f| f.kind == ScopeKind::Class)
            .unwrap_or(false)
    }

    fn build_fqn(&self, name: &str) -> String {
        let mut parts: Vec<&str> = self.scope_stack.iter().map(|f| f.name.as_str()).collect();
        parts.push(name);
        parts.join(".")
    }

    fn make_node_id(&self, kind: NodeKind, fqn: &str) -> NodeId {
        crate::shared::models::node_id(kind.as_str(), &self.repo_id, &self.file_path, fqn)
    }

    // ── edge helpers ───────────────────────────────────────────────

    fn add_edge(&mut self, kind: EdgeKind, source: NodeId, target: NodeId, span: Option<Span>) -> usize {
        let id = self.edge_ids.next(kind.as_str(), &source, &target);
        let mut edge = Edge::new(id, kind, source, target);
        edge.span = span;
        self.doc.edges.push(edge);
        self.doc.edges.len() - 1
    }

    /// Materialize (or reuse) an external placeholder node for an
    /// unresolvable reference. Deduped per file by fqn.
    fn external_node(&mut self, kind: NodeKind, fqn: &str) -> NodeId {
        if let Some(id) = self.external_nodes.get(fqn) {
            return id.clone();
        }
        let id = crate::shared::models::node_id(kind.as_str(), &self.repo_id, EXTERNAL_FILE, fqn);
        let node = Node::new(
            id.clone(),
            kind,
            fqn.to_string(),
            EXTERNAL_FILE.to_string(),
            Span::zero(),
        )
        .with_language(self.language.clone())
        .with_name(fqn.rsplit('.').next().unwrap_or(fqn).to_string());
        self.doc.push_node(node);
        self.external_nodes.insert(fqn.to_string(), id.clone());
        id
    }

    // ── statement traversal ────────────────────────────────────────

    fn visit_statements(&mut self, statements: &[SyntaxNode]) {
        for stmt in statements {
            self.visit_statement(stmt, &[]);
        }
    }

    fn visit_statement(&mut self, stmt: &SyntaxNode, decorators: &[String]) {
        match &stmt.kind {
            SyntaxKind::Decorated => {
                let decos: Vec<String> = stmt
                    .children
                    .iter()
                    .filter(|c| c.raw_kind == "decorator")
                    .map(|c| c.text().trim_start_matches('@').to_string())
                    .collect();
                if let Some(inner) = stmt
                    .children
                    .iter()
                    .find(|c| c.kind.is_definition())
                {
                    self.visit_statement(inner, &decos);
                }
            }
            SyntaxKind::FunctionDef => self.declare_function(stmt, decorators),
            SyntaxKind::ClassDef => self.declare_class(stmt, decorators),
            SyntaxKind::ImportDecl => self.declare_plain_import(stmt),
            SyntaxKind::ImportFromDecl => self.declare_from_import(stmt),
            SyntaxKind::ExpressionStmt => {
                for child in &stmt.children {
                    if child.kind == SyntaxKind::AssignmentStmt {
                        self.declare_assignment(child);
                    } else {
                        self.visit_expression(child);
                    }
                }
            }
            SyntaxKind::AssignmentStmt => self.declare_assignment(stmt),
            SyntaxKind::ReturnStmt
            | SyntaxKind::RaiseStmt
            | SyntaxKind::AssertStmt
            | SyntaxKind::YieldExpr => {
                for child in &stmt.children {
                    self.visit_expression(child);
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
            | SyntaxKind::WithStmt => {
                for child in &stmt.children {
                    if child.kind == SyntaxKind::Block {
                        self.visit_statements(&child.children);
                    } else {
                        self.visit_statement(child, &[]);
                    }
                }
            }
            SyntaxKind::Block => self.visit_statements(&stmt.children),
            // Expression-position nodes reached through statement recursion
            SyntaxKind::CallExpr
            | SyntaxKind::AttributeExpr
            | SyntaxKind::BinaryExpr
            | SyntaxKind::BoolOpExpr
            | SyntaxKind::CompareExpr
            | SyntaxKind::ConditionalExpr
            | SyntaxKind::AwaitExpr
            | SyntaxKind::NameExpr => self.visit_expression(stmt),
            _ => {
                for child in &stmt.children {
                    self.visit_statement(child, &[]);
                }
            }
        }
    }

    // ── declarations ───────────────────────────────────────────────

    /// Allocate the node id for a (possibly re-declared) fqn. A later
    /// declaration replaces the earlier one in the symbol table; both nodes
    /// stay in the IR under distinct ids.
    fn allocate_declaration_id(&mut self, kind: NodeKind, fqn: &str) -> NodeId {
        let base = self.make_node_id(kind, fqn);
        let count = self.duplicate_counter.entry(base.clone()).or_insert(0);
        *count += 1;
        if *count == 1 {
            base
        } else {
            format!("{}#{}", base, *count - 1)
        }
    }

    fn declare_function(&mut self, stmt: &SyntaxNode, decorators: &[String]) {
        // A declaration without a name node is skipped, not fatal.
        let name = match stmt.child_by_field("name") {
            Some(n) if !n.text().is_empty() => n.text().to_string(),
            _ => return,
        };

        let fqn = self.build_fqn(&name);
        let kind = if self.in_class_scope() {
            NodeKind::Method
        } else {
            NodeKind::Function
        };
        let node_id = self.allocate_declaration_id(kind, &fqn);

        let body = stmt.child_by_field("body");
        let body_span = body.map(|b| b.span);
        let docstring = body.and_then(extract_docstring);

        let mut node = Node::new(
            node_id.clone(),
            kind,
            fqn.clone(),
            self.file_path.clone(),
            stmt.span,
        )
        .with_language(self.language.clone())
        .with_name(name.clone())
        .with_module_path(self.module_path.clone())
        .with_parent(self.current_scope_id());
        node.body_span = body_span;
        node.docstring = docstring;
        node.content_hash = Some(ContentHash::of_str(stmt.text.as_deref().unwrap_or(&fqn)).to_hex());
        if !decorators.is_empty() {
            node.decorators = Some(decorators.to_vec());
        }
        // Signature from the parameter list
        let signature = self.build_signature(stmt, &node_id);
        if let Some(sig) = signature {
            node.signature_id = Some(sig.id.clone());
            self.doc.signatures.push(sig);
        }

        let parent_id = self.current_scope_id();
        self.doc.push_node(node);
        self.add_edge(EdgeKind::Contains, parent_id, node_id.clone(), Some(stmt.span));
        self.symbol_table.insert(fqn.clone(), node_id.clone());

        // Parameter nodes
        self.declare_parameters(stmt, &node_id, &fqn);

        self.scope_stack.push(ScopeFrame {
            kind: ScopeKind::Function,
            name,
            node_id,
        });
        if let Some(body) = body {
            self.visit_statements(&body.children);
        }
        self.scope_stack.pop();
    }

    fn build_signature(&mut self, stmt: &SyntaxNode, function_node_id: &str) -> Option<SignatureEntity> {
        let params = stmt.child_by_field("parameters")?;
        let mut infos = Vec::new();
        for param in &params.children {
            let (name, type_text, has_default) = match param.kind {
                SyntaxKind::NameExpr => (param.text().to_string(), None, false),
                _ => {
                    let name = param
                        .child_by_field("name")
                        .map(|n| n.text().to_string())
                        .or_else(|| {
                            param
                                .first_child_of_kind(&SyntaxKind::NameExpr)
                                .map(|n| n.text().to_string())
                        })
                        .unwrap_or_default();
                    let type_text = param
                        .child_by_field("type")
                        .map(|t| t.text().to_string())
                        .filter(|t| !t.is_empty());
                    let has_default = param.child_by_field("value").is_some();
                    (name, type_text, has_default)
                }
            };
            if name.is_empty() {
                continue;
            }
            let type_id = type_text.map(|t| self.intern_type(&t));
            infos.push(ParameterInfo {
                name,
                type_id,
                has_default,
            });
        }

        let return_type_id = stmt
            .child_by_field("return_type")
            .map(|t| self.intern_type(t.text()));

        self.sig_counter += 1;
        Some(SignatureEntity {
            id: format!("sig:{}:{}", self.file_path, self.sig_counter),
            function_node_id: function_node_id.to_string(),
            parameters: infos,
            return_type_id,
        })
    }

    fn intern_type(&mut self, repr: &str) -> String {
        if let Some(existing) = self.doc.types.iter().find(|t| t.repr == repr) {
            return existing.id.clone();
        }
        self.type_counter += 1;
        let entity = TypeEntity::nominal(format!("type:{}:{}", self.file_path, self.type_counter), repr);
        let id = entity.id.clone();
        self.doc.types.push(entity);
        id
    }

    fn declare_parameters(&mut self, stmt: &SyntaxNode, function_id: &str, function_fqn: &str) {
        let Some(params) = stmt.child_by_field("parameters") else {
            return;
        };
        for param in &params.children {
            let (name_text, span) = match param.kind {
                SyntaxKind::NameExpr => (param.text().to_string(), param.span),
                _ => match param
                    .child_by_field("name")
                    .or_else(|| param.first_child_of_kind(&SyntaxKind::NameExpr))
                {
                    Some(n) => (n.text().to_string(), n.span),
                    None => continue,
                },
            };
            if name_text.is_empty() {
                continue;
            }
            let fqn = format!("{}.{}", function_fqn, name_text);
            let node_id = self.allocate_declaration_id(NodeKind::Parameter, &fqn);
            let node = Node::new(
                node_id.clone(),
                NodeKind::Parameter,
                fqn.clone(),
                self.file_path.clone(),
                span,
            )
            .with_language(self.language.clone())
            .with_name(name_text)
            .with_module_path(self.module_path.clone())
            .with_parent(function_id.to_string());
            self.doc.push_node(node);
            self.add_edge(
                EdgeKind::Contains,
                function_id.to_string(),
                node_id.clone(),
                Some(span),
            );
            self.symbol_table.insert(fqn, node_id);
        }
    }

    fn declare_class(&mut self, stmt: &SyntaxNode, decorators: &[String]) {
        let name = match stmt.child_by_field("name") {
            Some(n) if !n.text().is_empty() => n.text().to_string(),
            _ => return,
        };

        let fqn = self.build_fqn(&name);
        let node_id = self.allocate_declaration_id(NodeKind::Class, &fqn);

        let body = stmt.child_by_field("body");
        let body_span = body.map(|b| b.span);
        let docstring = body.and_then(extract_docstring);

        let bases: Vec<(String, Span)> = stmt
            .child_by_field("superclasses")
            .map(|args| {
                args.children
                    .iter()
                    .filter(|c| {
                        matches!(c.kind, SyntaxKind::NameExpr | SyntaxKind::AttributeExpr)
                    })
                    .map(|c| (c.text().to_string(), c.span))
                    .collect()
            })
            .unwrap_or_default();

        let mut node = Node::new(
            node_id.clone(),
            NodeKind::Class,
            fqn.clone(),
            self.file_path.clone(),
            stmt.span,
        )
        .with_language(self.language.clone())
        .with_name(name.clone())
        .with_module_path(self.module_path.clone())
        .with_parent(self.current_scope_id());
        node.body_span = body_span;
        node.docstring = docstring;
        node.content_hash = Some(ContentHash::of_str(stmt.text.as_deref().unwrap_or(&fqn)).to_hex());
        if !decorators.is_empty() {
            node.decorators = Some(decorators.to_vec());
        }
        if !bases.is_empty() {
            node.base_classes = Some(bases.iter().map(|(b, _)| b.clone()).collect());
        }

        let parent_id = self.current_scope_id();
        self.doc.push_node(node);
        self.add_edge(EdgeKind::Contains, parent_id, node_id.clone(), Some(stmt.span));
        self.symbol_table.insert(fqn.clone(), node_id.clone());

        // Inheritance: local symbol → concrete target; imported or unknown →
        // external placeholder, rewritten (maybe) by the cross-file layer.
        for (base, span) in bases {
            let target = self.resolve_reference(&base, NodeKind::ExternalClass);
            let edge_idx = self.add_edge(EdgeKind::Inherits, node_id.clone(), target.id, Some(span));
            if let Some(raw) = target.unresolved {
                self.doc.edges[edge_idx]
                    .attrs
                    .insert("unresolved_ref".to_string(), json!(raw));
            }
        }

        self.scope_stack.push(ScopeFrame {
            kind: ScopeKind::Class,
            name,
            node_id,
        });
        if let Some(body) = body {
            self.visit_statements(&body.children);
        }
        self.scope_stack.pop();
    }

    fn declare_plain_import(&mut self, stmt: &SyntaxNode) {
        // `import a.b` / `import a.b as c`
        for child in &stmt.children {
            let (module, alias) = if child.raw_kind == "aliased_import" {
                let module = child
                    .child_by_field("name")
                    .map(|n| n.text().to_string())
                    .unwrap_or_default();
                let alias = child.child_by_field("alias").map(|a| a.text().to_string());
                (module, alias)
            } else if child.raw_kind == "dotted_name" || child.kind == SyntaxKind::NameExpr {
                (child.text().to_string(), None)
            } else {
                continue;
            };
            if module.is_empty() {
                continue;
            }
            self.record_import(module.clone(), None, alias, stmt.span);
        }
    }

    fn declare_from_import(&mut self, stmt: &SyntaxNode) {
        // `from a.b import x, y as z`
        let module = match stmt.child_by_field("module_name") {
            Some(m) => m.text().to_string(),
            None => return,
        };
        let names: Vec<&SyntaxNode> = stmt
            .children
            .iter()
            .filter(|c| c.field.as_deref() == Some("name"))
            .collect();
        for name_node in names {
            let (imported, alias) = if name_node.raw_kind == "aliased_import" {
                let n = name_node
                    .child_by_field("name")
                    .map(|x| x.text().to_string())
                    .unwrap_or_default();
                let a = name_node.child_by_field("alias").map(|x| x.text().to_string());
                (n, a)
            } else {
                (name_node.text().to_string(), None)
            };
            if imported.is_empty() {
                continue;
            }
            self.record_import(module.clone(), Some(imported), alias, stmt.span);
        }
    }

    fn record_import(
        &mut self,
        module: String,
        imported_name: Option<String>,
        alias: Option<String>,
        span: Span,
    ) {
        let fqn = match &imported_name {
            Some(n) => format!("{}.{}", module, n),
            None => module.clone(),
        };
        let local_name = alias.clone().unwrap_or_else(|| {
            imported_name
                .clone()
                .unwrap_or_else(|| module.split('.').next().unwrap_or(&module).to_string())
        });

        let node_id = self.allocate_declaration_id(NodeKind::Import, &fqn);
        let mut node = Node::new(
            node_id.clone(),
            NodeKind::Import,
            fqn.clone(),
            self.file_path.clone(),
            span,
        )
        .with_language(self.language.clone())
        .with_name(local_name.clone())
        .with_module_path(self.module_path.clone())
        .with_parent(self.current_scope_id());
        node.attrs.insert("module".to_string(), json!(module));
        if let Some(n) = &imported_name {
            node.attrs.insert("imported_name".to_string(), json!(n));
        }
        if let Some(a) = &alias {
            node.attrs.insert("alias".to_string(), json!(a));
        }
        let parent_id = self.current_scope_id();
        self.doc.push_node(node);
        self.add_edge(EdgeKind::Contains, parent_id.clone(), node_id.clone(), Some(span));

        // IMPORTS edge targets the external module/symbol placeholder until
        // the cross-file layer rewrites it.
        let target_kind = if imported_name.is_some() {
            NodeKind::ExternalFunction
        } else {
            NodeKind::ExternalModule
        };
        let target = self.external_node(target_kind, &fqn);
        let edge_idx = self.add_edge(EdgeKind::Imports, parent_id, target, Some(span));
        self.doc.edges[edge_idx]
            .attrs
            .insert("unresolved_ref".to_string(), json!(fqn));

        self.import_table.insert(
            local_name,
            ImportEntry {
                module_path: module,
                imported_name,
                alias,
            },
        );
    }

    fn declare_assignment(&mut self, stmt: &SyntaxNode) {
        let scope_id = self.current_scope_id();

        if let Some(left) = stmt.child_by_field("left") {
            let in_function = self
                .scope_stack
                .last()
                .map(|f| f.kind == ScopeKind::Function)
                .unwrap_or(false);

            for target in assignment_targets(left) {
                if in_function {
                    // Detailed def-use tracking belongs to the data-flow
                    // layer; the structural IR records the write against the
                    // (parameter or variable) symbol node.
                    self.ensure_variable_node(target, NodeKind::Variable);
                    let fqn = self.build_fqn(target.text());
                    let target_id = match self.symbol_table.get(&fqn) {
                        Some(id) => id.clone(),
                        None => continue,
                    };
                    let edge_idx =
                        self.add_edge(EdgeKind::Writes, scope_id.clone(), target_id, Some(target.span));
                    self.doc.edges[edge_idx]
                        .attrs
                        .insert("target_fqn".to_string(), json!(fqn));
                } else {
                    let kind = if self.in_class_scope() {
                        NodeKind::Field
                    } else {
                        NodeKind::Variable
                    };
                    self.ensure_variable_node(target, kind);
                }
            }
        }

        if let Some(right) = stmt.child_by_field("right") {
            self.visit_expression(right);
        }
        if let Some(type_node) = stmt.child_by_field("type") {
            let type_id = self.intern_type(type_node.text());
            // Attach the declared type to the (single) target when present.
            if let Some(left) = stmt.child_by_field("left") {
                if let Some(target) = assignment_targets(left).into_iter().next() {
                    let fqn = self.build_fqn(target.text());
                    if let Some(node_id) = self.symbol_table.get(&fqn).cloned() {
                        if let Some(node) = self.doc.nodes.iter_mut().find(|n| n.id == node_id) {
                            node.declared_type_id = Some(type_id);
                        }
                    }
                }
            }
        }
    }

    fn ensure_variable_node(&mut self, target: &SyntaxNode, kind: NodeKind) {
        let name = target.text().to_string();
        if name.is_empty() || name.contains('.') {
            return;
        }
        let fqn = self.build_fqn(&name);
        if self.symbol_table.contains_key(&fqn) {
            return;
        }
        let node_id = self.allocate_declaration_id(kind, &fqn);
        let node = Node::new(
            node_id.clone(),
            kind,
            fqn.clone(),
            self.file_path.clone(),
            target.span,
        )
        .with_language(self.language.clone())
        .with_name(name)
        .with_module_path(self.module_path.clone())
        .with_parent(self.current_scope_id());
        let parent_id = self.current_scope_id();
        self.doc.push_node(node);
        self.add_edge(EdgeKind::Contains, parent_id, node_id.clone(), Some(target.span));
        self.symbol_table.insert(fqn, node_id);
    }

    // ── expressions ────────────────────────────────────────────────

    fn visit_expression(&mut self, expr: &SyntaxNode) {
        match &expr.kind {
            SyntaxKind::CallExpr => self.visit_call(expr),
            SyntaxKind::NameExpr => {
                // Load of a locally-known symbol becomes a READS edge.
                let fqn_candidates = self.fqn_candidates(expr.text());
                for fqn in fqn_candidates {
                    if let Some(target) = self.symbol_table.get(&fqn).cloned() {
                        let scope = self.current_scope_id();
                        self.add_edge(EdgeKind::Reads, scope, target, Some(expr.span));
                        break;
                    }
                }
            }
            _ => {
                for child in &expr.children {
                    self.visit_expression(child);
                }
            }
        }
    }

    fn visit_call(&mut self, call: &SyntaxNode) {
        let callee = call.child_by_field("function");
        if let Some(callee) = callee {
            let callee_text = callee.text().to_string();
            if !callee_text.is_empty() {
                let target = self.resolve_reference(&callee_text, NodeKind::ExternalFunction);
                let scope = self.current_scope_id();
                let edge_idx = self.add_edge(EdgeKind::Calls, scope, target.id.clone(), Some(call.span));
                self.doc.edges[edge_idx]
                    .attrs
                    .insert("callee".to_string(), json!(callee_text));
                if let Some(raw) = target.unresolved {
                    self.doc.edges[edge_idx]
                        .attrs
                        .insert("unresolved_ref".to_string(), json!(raw));
                }
            }
            // `obj.method(...)`: the object side may itself be a call chain.
            for child in &callee.children {
                self.visit_expression(child);
            }
        }
        if let Some(args) = call.child_by_field("arguments") {
            for arg in &args.children {
                self.visit_expression(arg);
            }
        }
    }

    /// Candidate fqns for a bare name, innermost scope first.
    fn fqn_candidates(&self, name: &str) -> Vec<String> {
        let mut out = Vec::new();
        for depth in (1..=self.scope_stack.len()).rev() {
            let mut parts: Vec<&str> = self.scope_stack[..depth]
                .iter()
                .map(|f| f.name.as_str())
                .collect();
            parts.push(name);
            out.push(parts.join("."));
        }
        out
    }

    fn resolve_reference(&mut self, reference: &str, external_kind: NodeKind) -> ResolvedRef {
        let head = reference.split('.').next().unwrap_or(reference);

        // 1. Local scope chain
        for fqn in self.fqn_candidates(reference) {
            if let Some(id) = self.symbol_table.get(&fqn) {
                return ResolvedRef {
                    id: id.clone(),
                    unresolved: None,
                };
            }
        }

        // 2. Import table: the head segment is an imported binding
        if let Some(entry) = self.import_table.get(head).cloned() {
            let resolved_fqn = match &entry.imported_name {
                Some(name) if head == entry.alias.as_deref().unwrap_or(name) => {
                    let rest = reference.strip_prefix(head).unwrap_or("");
                    format!("{}.{}{}", entry.module_path, name, rest)
                }
                _ => {
                    let rest = reference.strip_prefix(head).unwrap_or("");
                    format!("{}{}", entry.module_path, rest)
                }
            };
            let id = self.external_node(external_kind, &resolved_fqn);
            return ResolvedRef {
                id,
                unresolved: Some(reference.to_string()),
            };
        }

        // 3. Unknown: external placeholder under the raw reference
        let id = self.external_node(external_kind, reference);
        ResolvedRef {
            id,
            unresolved: Some(reference.to_string()),
        }
    }
}

struct ResolvedRef {
    id: NodeId,
    unresolved: Option<String>,
}

/// Flatten assignment target patterns (`a`, `a, b`, `(a, b)`) into name
/// nodes. Attribute and subscript targets (`self.x`, `d[k]`) are not local
/// bindings and yield nothing.
fn assignment_targets(left: &SyntaxNode) -> Vec<&SyntaxNode> {
    match &left.kind {
        SyntaxKind::NameExpr => vec![left],
        SyntaxKind::Other(raw)
            if raw == "pattern_list" || raw == "tuple_pattern" || raw == "list_pattern" =>
        {
            left.children.iter().flat_map(assignment_targets).collect()
        }
        _ if left.raw_kind == "tuple" || left.raw_kind == "list" => {
            left.children.iter().flat_map(assignment_targets).collect()
        }
        _ => Vec::new(),
    }
}

/// First string literal in a body block is the docstring.
fn extract_docstring(body: &SyntaxNode) -> Option<String> {
    let first = body.children.first()?;
    if first.kind != SyntaxKind::ExpressionStmt {
        return None;
    }
    let string = first.first_child_of_kind(&SyntaxKind::StringLiteral)?;
    let text = string.text();
    Some(
        text.trim_matches(|c| c == '"' || c == '\'')
            .trim()
            .to_string(),
    )
}
