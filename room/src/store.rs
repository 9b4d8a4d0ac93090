//! Minimal in-process fact store.
//!
//! Backs the Local transport, the gateway, and the test suite. Facts are
//! opaque statement strings; the store tokenizes them into words, numbers,
//! quoted strings, and punctuation, and matches patterns whose `$name`
//! variables bind one value token each. This is intentionally a small
//! matcher, not a unification engine: it covers exactly the fact language
//! the Room passes through.

use crate::term::{Solution, Term};

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Word(String),
    Number(f64),
    Text(String),
    Punct(char),
    Var(String),
    Wildcard,
}

fn is_punct(c: char) -> bool {
    matches!(c, '(' | ')' | ',' | '@')
}

fn tokenize(input: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();

    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
        } else if is_punct(c) {
            chars.next();
            tokens.push(Token::Punct(c));
        } else if c == '"' {
            chars.next();
            let mut text = String::new();
            for ch in chars.by_ref() {
                if ch == '"' {
                    break;
                }
                text.push(ch);
            }
            tokens.push(Token::Text(text));
        } else {
            let mut chunk = String::new();
            while let Some(&ch) = chars.peek() {
                if ch.is_whitespace() || is_punct(ch) || ch == '"' {
                    break;
                }
                chunk.push(ch);
                chars.next();
            }
            tokens.push(classify(chunk));
        }
    }

    tokens
}

fn classify(chunk: String) -> Token {
    if chunk == "_" {
        Token::Wildcard
    } else if let Some(name) = chunk.strip_prefix('$') {
        Token::Var(name.to_string())
    } else if let Ok(n) = chunk.parse::<f64>() {
        Token::Number(n)
    } else {
        Token::Word(chunk)
    }
}

/// A value token viewed as a solution term. Punctuation, variables, and
/// wildcards have no term form.
fn token_term(token: &Token) -> Option<Term> {
    match token {
        Token::Word(w) => Some(Term::word(w.clone())),
        Token::Number(n) => Some(Term::number(*n)),
        Token::Text(t) => Some(Term::text(t.clone())),
        _ => None,
    }
}

fn match_tokens(pattern: &[Token], fact: &[Token]) -> Option<Solution> {
    if pattern.len() != fact.len() {
        return None;
    }

    let mut bindings = Solution::new();
    for (p, f) in pattern.iter().zip(fact.iter()) {
        match p {
            Token::Var(name) => {
                let term = token_term(f)?;
                match bindings.get(name) {
                    Some(bound) if bound != &term => return None,
                    Some(_) => {}
                    None => {
                        bindings.insert(name.clone(), term);
                    }
                }
            }
            Token::Wildcard => {
                token_term(f)?;
            }
            literal => {
                if literal != f {
                    return None;
                }
            }
        }
    }

    Some(bindings)
}

#[derive(Debug, Clone)]
struct StoredFact {
    text: String,
    tokens: Vec<Token>,
}

/// The process-wide fact pool: an ordered set of fact strings plus their
/// token forms.
#[derive(Debug, Default)]
pub struct FactStore {
    facts: Vec<StoredFact>,
}

impl FactStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a fact. Re-asserting an identical fact is a no-op.
    pub fn assert(&mut self, fact: &str) {
        if self.facts.iter().any(|f| f.text == fact) {
            return;
        }
        self.facts.push(StoredFact {
            text: fact.to_string(),
            tokens: tokenize(fact),
        });
    }

    /// Remove every fact matching the pattern. A pattern with no variables
    /// retracts exactly the identical fact.
    pub fn retract(&mut self, pattern: &str) {
        let pattern = tokenize(pattern);
        self.facts
            .retain(|f| match_tokens(&pattern, &f.tokens).is_none());
    }

    /// Snapshot of all stored fact strings, in assertion order.
    pub fn facts(&self) -> Vec<String> {
        self.facts.iter().map(|f| f.text.clone()).collect()
    }

    /// Evaluate each query independently and concatenate the solutions.
    /// An empty query list yields no solutions.
    pub fn select(&self, queries: &[String]) -> Vec<Solution> {
        let mut solutions = Vec::new();
        for query in queries {
            let pattern = tokenize(query);
            for fact in &self.facts {
                if let Some(bindings) = match_tokens(&pattern, &fact.tokens) {
                    solutions.push(bindings);
                }
            }
        }
        solutions
    }
}
