//! Query intent classification.
//!
//! Rule-based keyword features over three axes (symbol / flow / concept),
//! optionally augmented with identifier-decomposition expansions.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Per-axis weights describing what a query asks for. Always normalized to
/// sum 1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IntentProbability {
    pub symbol: f32,
    pub flow: f32,
    pub concept: f32,
}

impl IntentProbability {
    pub fn new(symbol: f32, flow: f32, concept: f32) -> Self {
        let mut p = Self {
            symbol,
            flow,
            concept,
        };
        p.normalize();
        p
    }

    pub fn normalize(&mut self) {
        let sum = self.symbol + self.flow + self.concept;
        if sum > 0.0 {
            self.symbol /= sum;
            self.flow /= sum;
            self.concept /= sum;
        } else {
            self.symbol = 1.0 / 3.0;
            self.flow = 1.0 / 3.0;
            self.concept = 1.0 / 3.0;
        }
    }

    pub fn dominant(&self) -> Intent {
        if self.flow >= self.symbol && self.flow >= self.concept {
            Intent::Flow
        } else if self.symbol >= self.concept {
            Intent::Symbol
        } else {
            Intent::Concept
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Intent {
    Symbol,
    Flow,
    Concept,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::Symbol => "symbol",
            Intent::Flow => "flow",
            Intent::Concept => "concept",
        }
    }
}

static IDENTIFIER_SHAPE: Lazy<Regex> = Lazy::new(|| {
    // snake_case, camelCase or dotted path
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)+$|_|[a-z][A-Z]").unwrap()
});

const FLOW_KEYWORDS: &[&str] = &[
    "call", "calls", "called", "caller", "callers", "callee", "invokes", "reaches", "flow",
    "flows", "path", "taint", "tainted", "propagate", "sink", "source", "dataflow",
];

const SYMBOL_KEYWORDS: &[&str] = &[
    "definition", "defined", "declaration", "class", "function", "method", "signature",
    "symbol", "rename", "def",
];

const CONCEPT_KEYWORDS: &[&str] = &[
    "how", "why", "what", "where", "explain", "logic", "works", "handle", "handles",
    "implement", "implemented", "purpose", "architecture",
];

#[derive(Debug, Clone)]
pub struct IntentClassifier {
    pub enable_expansion: bool,
}

impl Default for IntentClassifier {
    fn default() -> Self {
        Self {
            enable_expansion: true,
        }
    }
}

impl IntentClassifier {
    pub fn new(enable_expansion: bool) -> Self {
        Self { enable_expansion }
    }

    pub fn classify(&self, query: &str) -> IntentProbability {
        let lowered = query.to_lowercase();
        let tokens: Vec<&str> = lowered
            .split(|c: char| !c.is_alphanumeric() && c != '_' && c != '.')
            .filter(|t| !t.is_empty())
            .collect();

        // Smoothing keeps every axis alive so weight blending never zeroes a
        // strategy entirely.
        let mut symbol = 0.1f32;
        let mut flow = 0.1f32;
        let mut concept = 0.1f32;

        for token in &tokens {
            if FLOW_KEYWORDS.contains(token) {
                flow += 1.0;
            }
            if SYMBOL_KEYWORDS.contains(token) {
                symbol += 1.0;
            }
            if CONCEPT_KEYWORDS.contains(token) {
                concept += 1.0;
            }
            if IDENTIFIER_SHAPE.is_match(token) {
                symbol += 0.5;
            }
        }

        IntentProbability::new(symbol, flow, concept)
    }

    /// Classify plus query expansions (identifier decomposition).
    pub fn classify_with_expansion(&self, query: &str) -> (IntentProbability, Vec<String>) {
        let intent = self.classify(query);
        if !self.enable_expansion {
            return (intent, Vec::new());
        }

        let mut expansions: Vec<String> = Vec::new();
        for token in query.split_whitespace() {
            for part in decompose_identifier(token) {
                if part.len() > 2 && !expansions.contains(&part) {
                    expansions.push(part);
                }
            }
        }
        (intent, expansions)
    }
}

/// Split `snake_case`, `camelCase` and dotted identifiers into words.
pub fn decompose_identifier(token: &str) -> Vec<String> {
    let mut words = Vec::new();
    for segment in token.split(['_', '.']) {
        let mut current = String::new();
        for c in segment.chars() {
            if !c.is_alphanumeric() {
                continue;
            }
            if c.is_uppercase() && !current.is_empty() {
                words.push(current.to_lowercase());
                current = String::new();
            }
            current.push(c);
        }
        if !current.is_empty() {
            words.push(current.to_lowercase());
        }
    }
    // Single plain word: no decomposition happened.
    if words.len() <= 1 && !token.contains(['_', '.']) {
        return Vec::new();
    }
    words
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flow_query() {
        let classifier = IntentClassifier::default();
        let intent = classifier.classify("where is this api called from, show the call path");
        assert_eq!(intent.dominant(), Intent::Flow);
    }

    #[test]
    fn test_symbol_query() {
        let classifier = IntentClassifier::default();
        let intent = classifier.classify("definition of UserService.get_user");
        assert_eq!(intent.dominant(), Intent::Symbol);
    }

    #[test]
    fn test_concept_query() {
        let classifier = IntentClassifier::default();
        let intent = classifier.classify("how does the retry logic work and why");
        assert_eq!(intent.dominant(), Intent::Concept);
    }

    #[test]
    fn test_probabilities_normalized() {
        let intent = IntentClassifier::default().classify("anything at all");
        let sum = intent.symbol + intent.flow + intent.concept;
        assert!((sum - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_identifier_decomposition() {
        assert_eq!(decompose_identifier("getUserName"), vec!["get", "user", "name"]);
        assert_eq!(decompose_identifier("user_name"), vec!["user", "name"]);
        assert_eq!(decompose_identifier("os.path"), vec!["os", "path"]);
        assert!(decompose_identifier("plain").is_empty());
    }

    #[test]
    fn test_expansions_deduped() {
        let classifier = IntentClassifier::default();
        let (_, expansions) = classifier.classify_with_expansion("getUserName get_user_name");
        let users = expansions.iter().filter(|w| w.as_str() == "user").count();
        assert_eq!(users, 1);
    }
}
