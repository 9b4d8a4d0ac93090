use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A bound value inside a solution.
///
/// Wire encoding matches the protocol: numbers and bare words are plain JSON
/// scalars, string-typed terms travel as the tagged wrapper `{"str": ...}`
/// so consumers can tell them apart from words and normalize.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Term {
    Number(f64),
    Text(StrTerm),
    Word(String),
}

/// Tagged wrapper for string-typed terms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrTerm {
    pub str: String,
}

impl Term {
    pub fn number(n: f64) -> Self {
        Term::Number(n)
    }

    pub fn word(w: impl Into<String>) -> Self {
        Term::Word(w.into())
    }

    pub fn text(s: impl Into<String>) -> Self {
        Term::Text(StrTerm { str: s.into() })
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Term::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Normalized string view: unwraps string-typed terms and returns bare
    /// words as-is.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Term::Word(w) => Some(w),
            Term::Text(t) => Some(&t.str),
            Term::Number(_) => None,
        }
    }
}

/// A mapping from variable name to bound value, produced by evaluating one
/// query against the current facts.
pub type Solution = BTreeMap<String, Term>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn number_and_word_serialize_as_plain_scalars() {
        assert_eq!(serde_json::to_string(&Term::number(7.0)).unwrap(), "7.0");
        assert_eq!(
            serde_json::to_string(&Term::word("green")).unwrap(),
            "\"green\""
        );
    }

    #[test]
    fn string_typed_term_uses_str_wrapper() {
        let json = serde_json::to_string(&Term::text("hello")).unwrap();
        assert_eq!(json, "{\"str\":\"hello\"}");

        let back: Term = serde_json::from_str(&json).unwrap();
        assert_eq!(back.as_str(), Some("hello"));
    }

    #[test]
    fn deserializes_scalars_into_expected_variants() {
        let n: Term = serde_json::from_str("42").unwrap();
        assert_eq!(n, Term::number(42.0));

        let w: Term = serde_json::from_str("\"circle\"").unwrap();
        assert_eq!(w, Term::word("circle"));
    }

    #[test]
    fn solution_round_trips_mixed_terms() {
        let mut sol = Solution::new();
        sol.insert("x".to_string(), Term::number(1.0));
        sol.insert("label".to_string(), Term::text("a b"));

        let json = serde_json::to_string(&sol).unwrap();
        let back: Solution = serde_json::from_str(&json).unwrap();
        assert_eq!(back, sol);
    }
}
