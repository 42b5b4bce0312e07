//! Taint rule sets: YAML-declared atoms compiled into a method-name index.
//!
//! Atom matching is type-aware: a `base_type` constraint is checked against
//! enriched type evidence when present. Without any type evidence the method
//! name alone matches (over-approximation); contradicting evidence rejects.

use crate::shared::models::{CodeatlasError, Result, Severity};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AtomCategory {
    Source,
    Sink,
    Sanitizer,
    Barrier,
    Propagator,
}

impl AtomCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            AtomCategory::Source => "source",
            AtomCategory::Sink => "sink",
            AtomCategory::Sanitizer => "sanitizer",
            AtomCategory::Barrier => "barrier",
            AtomCategory::Propagator => "propagator",
        }
    }
}

/// One rule atom. Unknown fields in the YAML are ignored for forward
/// compatibility.
#[derive(Debug, Clone, Deserialize)]
pub struct Atom {
    pub id: String,
    #[serde(default)]
    pub language: Option<String>,
    pub method: String,
    #[serde(default)]
    pub base_type: Option<String>,
    #[serde(default)]
    pub arg_roles: Vec<String>,
    #[serde(default)]
    pub cwe: Option<String>,
    /// Vulnerability kind stamped on findings from this sink
    /// (defaults to the uppercased atom id).
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub severity: Option<String>,
}

impl Atom {
    pub fn finding_kind(&self) -> String {
        self.kind
            .clone()
            .unwrap_or_else(|| self.id.to_uppercase().replace('-', "_"))
    }

    pub fn finding_severity(&self) -> Severity {
        match self.severity.as_deref() {
            Some("low") => Severity::Low,
            Some("medium") => Severity::Medium,
            Some("critical") => Severity::Critical,
            _ => Severity::High,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AtomDecls {
    #[serde(default)]
    pub sources: Vec<Atom>,
    #[serde(default)]
    pub sinks: Vec<Atom>,
    #[serde(default)]
    pub sanitizers: Vec<Atom>,
    #[serde(default)]
    pub barriers: Vec<Atom>,
    #[serde(default)]
    pub propagators: Vec<Atom>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct RuleFlags {
    /// When set, `eval`-style sinks with empty `arg_roles` fire without
    /// data-flow evidence (heuristic mode). Default off (precise mode).
    #[serde(default)]
    pub heuristic_eval_sinks: bool,
}

/// One rule file. Unknown top-level keys are rejected.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleFile {
    #[serde(default)]
    pub version: Option<u32>,
    pub atoms: AtomDecls,
    #[serde(default)]
    pub flags: Option<RuleFlags>,
}

#[derive(Debug, Clone)]
struct CompiledAtom {
    category: AtomCategory,
    atom: Atom,
}

/// Compiled rule set: atoms indexed by method name.
#[derive(Debug, Default)]
pub struct RuleSet {
    by_method: HashMap<String, Vec<CompiledAtom>>,
    pub flags: RuleFlags,
}

/// A classified call site.
#[derive(Debug, Clone)]
pub struct AtomMatch<'r> {
    pub category: AtomCategory,
    pub atom: &'r Atom,
}

impl RuleSet {
    pub fn from_yaml(text: &str) -> Result<Self> {
        let file: RuleFile = serde_yaml::from_str(text)
            .map_err(|e| CodeatlasError::config(format!("bad rule file: {}", e)).with_source(e))?;
        let mut set = RuleSet::default();
        set.merge(file);
        Ok(set)
    }

    /// Load every `*.yaml`/`*.yml` under a rules directory.
    pub fn load_dir(dir: &Path) -> Result<Self> {
        let mut set = RuleSet::default();
        let mut entries: Vec<_> = std::fs::read_dir(dir)
            .map_err(|e| {
                CodeatlasError::validation(format!("unreadable rules dir {}: {}", dir.display(), e))
            })?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| {
                matches!(
                    p.extension().and_then(|x| x.to_str()),
                    Some("yaml") | Some("yml")
                )
            })
            .collect();
        entries.sort();

        for path in entries {
            let text = std::fs::read_to_string(&path)?;
            let file: RuleFile = serde_yaml::from_str(&text).map_err(|e| {
                CodeatlasError::config(format!("bad rule file {}: {}", path.display(), e))
            })?;
            set.merge(file);
        }
        Ok(set)
    }

    fn merge(&mut self, file: RuleFile) {
        if let Some(flags) = file.flags {
            self.flags.heuristic_eval_sinks |= flags.heuristic_eval_sinks;
        }
        let decls = file.atoms;
        for (category, atoms) in [
            (AtomCategory::Source, decls.sources),
            (AtomCategory::Sink, decls.sinks),
            (AtomCategory::Sanitizer, decls.sanitizers),
            (AtomCategory::Barrier, decls.barriers),
            (AtomCategory::Propagator, decls.propagators),
        ] {
            for atom in atoms {
                self.by_method
                    .entry(atom.method.clone())
                    .or_default()
                    .push(CompiledAtom { category, atom });
            }
        }
    }

    pub fn atom_count(&self) -> usize {
        self.by_method.values().map(Vec::len).sum()
    }

    /// Classify a call by `(method_name)`, then filter by base type.
    ///
    /// `base_text` is the receiver expression text (`cursor`, `request.args`);
    /// `type_evidence` is the enriched type of the receiver when known.
    pub fn classify(
        &self,
        method_name: &str,
        base_text: Option<&str>,
        type_evidence: Option<&str>,
    ) -> Option<AtomMatch<'_>> {
        let candidates = self.by_method.get(method_name)?;

        for compiled in candidates {
            let Some(required) = &compiled.atom.base_type else {
                return Some(AtomMatch {
                    category: compiled.category,
                    atom: &compiled.atom,
                });
            };

            // Receiver text match (e.g. `request.args` against `request.args`).
            if let Some(base) = base_text {
                if dotted_suffix_match(required, base) {
                    return Some(AtomMatch {
                        category: compiled.category,
                        atom: &compiled.atom,
                    });
                }
            }

            match type_evidence {
                Some(t) if dotted_suffix_match(required, t) => {
                    return Some(AtomMatch {
                        category: compiled.category,
                        atom: &compiled.atom,
                    });
                }
                // Evidence present but contradicting: reject this atom.
                Some(_) => continue,
                // No type evidence: method-name match suffices.
                None => {
                    return Some(AtomMatch {
                        category: compiled.category,
                        atom: &compiled.atom,
                    });
                }
            }
        }
        None
    }
}

/// True when one dotted name is the other or a dotted suffix of it.
fn dotted_suffix_match(a: &str, b: &str) -> bool {
    a == b || a.ends_with(&format!(".{}", b)) || b.ends_with(&format!(".{}", a))
}
