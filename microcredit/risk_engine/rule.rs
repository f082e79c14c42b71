use std::{
    fmt,
    iter::Peekable,
    ops::{BitAnd, BitOr},
    str::{CharIndices, FromStr},
};

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

/// Reference to one term of one variable, written `variable is term`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TermRef {
    /// Variable name.
    pub variable: String,
    /// Term name on that variable.
    pub term: String,
}

impl TermRef {
    /// Creates a reference.
    #[must_use]
    pub fn new(variable: impl Into<String>, term: impl Into<String>) -> Self {
        Self {
            variable: variable.into(),
            term: term.into(),
        }
    }
}

impl fmt::Display for TermRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} is {}", self.variable, self.term)
    }
}

impl FromStr for TermRef {
    type Err = EngineError;

    fn from_str(raw: &str) -> EngineResult<Self> {
        let mut parser = Parser::new(raw);
        let term = parser.term_ref()?;
        parser.finish()?;
        Ok(term)
    }
}

impl TryFrom<String> for TermRef {
    type Error = EngineError;

    fn try_from(raw: String) -> EngineResult<Self> {
        raw.parse()
    }
}

impl From<TermRef> for String {
    fn from(term: TermRef) -> Self {
        term.to_string()
    }
}

/// Antecedent expression: term leaves combined with AND (min) and OR (max).
///
/// Textual form: `a is x and (b is y or c is z)`, with `and` binding tighter
/// than `or`. `&` and `|` build the same trees in code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Antecedent {
    /// Degree of a single term.
    Is(TermRef),
    /// Minimum over the children.
    And(Vec<Antecedent>),
    /// Maximum over the children.
    Or(Vec<Antecedent>),
}

impl Antecedent {
    /// Leaf `variable is term`.
    #[must_use]
    pub fn is(variable: impl Into<String>, term: impl Into<String>) -> Self {
        Self::Is(TermRef::new(variable, term))
    }

    /// Every leaf reference, left to right.
    #[must_use]
    pub fn term_refs(&self) -> Vec<&TermRef> {
        let mut refs = Vec::new();
        self.collect_refs(&mut refs);
        refs
    }

    fn collect_refs<'a>(&'a self, refs: &mut Vec<&'a TermRef>) {
        match self {
            Self::Is(term) => refs.push(term),
            Self::And(children) | Self::Or(children) => {
                for child in children {
                    child.collect_refs(refs);
                }
            }
        }
    }

    /// Evaluates the tree with `degree` supplying leaf values.
    pub fn evaluate<F>(&self, degree: &F) -> f64
    where
        F: Fn(&TermRef) -> f64,
    {
        match self {
            Self::Is(term) => degree(term),
            Self::And(children) => children
                .iter()
                .map(|child| child.evaluate(degree))
                .fold(1.0, f64::min),
            Self::Or(children) => children
                .iter()
                .map(|child| child.evaluate(degree))
                .fold(0.0, f64::max),
        }
    }

    fn fmt_nested(&self, f: &mut fmt::Formatter<'_>, inside_and: bool) -> fmt::Result {
        match self {
            Self::Is(term) => write!(f, "{term}"),
            Self::And(children) => join(f, children, " and ", true),
            Self::Or(children) if inside_and => {
                f.write_str("(")?;
                join(f, children, " or ", false)?;
                f.write_str(")")
            }
            Self::Or(children) => join(f, children, " or ", false),
        }
    }
}

fn join(
    f: &mut fmt::Formatter<'_>,
    children: &[Antecedent],
    separator: &str,
    inside_and: bool,
) -> fmt::Result {
    for (idx, child) in children.iter().enumerate() {
        if idx > 0 {
            f.write_str(separator)?;
        }
        child.fmt_nested(f, inside_and)?;
    }
    Ok(())
}

impl fmt::Display for Antecedent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_nested(f, false)
    }
}

impl BitAnd for Antecedent {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self {
        match (self, rhs) {
            (Self::And(mut left), Self::And(right)) => {
                left.extend(right);
                Self::And(left)
            }
            (Self::And(mut left), rhs) => {
                left.push(rhs);
                Self::And(left)
            }
            (lhs, Self::And(mut right)) => {
                right.insert(0, lhs);
                Self::And(right)
            }
            (lhs, rhs) => Self::And(vec![lhs, rhs]),
        }
    }
}

impl BitOr for Antecedent {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        match (self, rhs) {
            (Self::Or(mut left), Self::Or(right)) => {
                left.extend(right);
                Self::Or(left)
            }
            (Self::Or(mut left), rhs) => {
                left.push(rhs);
                Self::Or(left)
            }
            (lhs, Self::Or(mut right)) => {
                right.insert(0, lhs);
                Self::Or(right)
            }
            (lhs, rhs) => Self::Or(vec![lhs, rhs]),
        }
    }
}

impl FromStr for Antecedent {
    type Err = EngineError;

    fn from_str(raw: &str) -> EngineResult<Self> {
        let mut parser = Parser::new(raw);
        let expr = parser.disjunction()?;
        parser.finish()?;
        Ok(expr)
    }
}

impl TryFrom<String> for Antecedent {
    type Error = EngineError;

    fn try_from(raw: String) -> EngineResult<Self> {
        raw.parse()
    }
}

impl From<Antecedent> for String {
    fn from(expr: Antecedent) -> Self {
        expr.to_string()
    }
}

/// Fuzzy rule: antecedent, consequent term on the output, implication weight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    /// Condition over input terms.
    #[serde(rename = "when")]
    pub antecedent: Antecedent,
    /// Output term receiving the firing strength.
    #[serde(rename = "then")]
    pub consequent: TermRef,
    /// Multiplier in `[0, 1]` applied to the firing strength.
    #[serde(default = "default_weight")]
    pub weight: f64,
}

const fn default_weight() -> f64 {
    1.0
}

impl Rule {
    /// Creates a rule with weight `1.0`.
    #[must_use]
    pub fn new(antecedent: Antecedent, consequent: TermRef) -> Self {
        Self {
            antecedent,
            consequent,
            weight: 1.0,
        }
    }

    /// Overrides the implication weight.
    #[must_use]
    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "if {} then {}", self.antecedent, self.consequent)?;
        if (self.weight - 1.0).abs() > f64::EPSILON {
            write!(f, " (weight {})", self.weight)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token<'a> {
    Word(&'a str),
    Open,
    Close,
}

/// Recursive-descent parser over the antecedent grammar:
/// `or := and ("or" and)*`, `and := atom ("and" atom)*`,
/// `atom := "(" or ")" | ident "is" ident`.
struct Parser<'a> {
    source: &'a str,
    chars: Peekable<CharIndices<'a>>,
    lookahead: Option<Token<'a>>,
}

impl<'a> Parser<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.char_indices().peekable(),
            lookahead: None,
        }
    }

    fn error(&self, message: impl fmt::Display) -> EngineError {
        EngineError::config(format!("invalid rule expression `{}`: {message}", self.source))
    }

    fn lex(&mut self) -> EngineResult<Option<Token<'a>>> {
        while self.chars.next_if(|(_, ch)| ch.is_whitespace()).is_some() {}
        let Some((start, ch)) = self.chars.next() else {
            return Ok(None);
        };
        match ch {
            '(' => Ok(Some(Token::Open)),
            ')' => Ok(Some(Token::Close)),
            ch if is_ident(ch) => {
                let mut end = start + ch.len_utf8();
                while let Some((idx, next)) = self.chars.next_if(|(_, next)| is_ident(*next)) {
                    end = idx + next.len_utf8();
                }
                Ok(Some(Token::Word(&self.source[start..end])))
            }
            other => Err(self.error(format!("unexpected character `{other}`"))),
        }
    }

    fn peek(&mut self) -> EngineResult<Option<&Token<'a>>> {
        if self.lookahead.is_none() {
            self.lookahead = self.lex()?;
        }
        Ok(self.lookahead.as_ref())
    }

    fn bump(&mut self) -> EngineResult<Option<Token<'a>>> {
        match self.lookahead.take() {
            Some(token) => Ok(Some(token)),
            None => self.lex(),
        }
    }

    fn keyword(&mut self, keyword: &str) -> EngineResult<bool> {
        let matched = matches!(
            self.peek()?,
            Some(Token::Word(word)) if word.eq_ignore_ascii_case(keyword)
        );
        if matched {
            self.bump()?;
        }
        Ok(matched)
    }

    fn ident(&mut self, what: &str) -> EngineResult<&'a str> {
        match self.bump()? {
            Some(Token::Word(word)) if !is_keyword(word) => Ok(word),
            Some(other) => Err(self.error(format!("expected {what}, found {other:?}"))),
            None => Err(self.error(format!("expected {what}, found end of input"))),
        }
    }

    fn term_ref(&mut self) -> EngineResult<TermRef> {
        let variable = self.ident("variable name")?;
        if !self.keyword("is")? {
            return Err(self.error(format!("expected `is` after `{variable}`")));
        }
        let term = self.ident("term name")?;
        Ok(TermRef::new(variable, term))
    }

    fn disjunction(&mut self) -> EngineResult<Antecedent> {
        let mut expr = self.conjunction()?;
        while self.keyword("or")? {
            expr = expr | self.conjunction()?;
        }
        Ok(expr)
    }

    fn conjunction(&mut self) -> EngineResult<Antecedent> {
        let mut expr = self.atom()?;
        while self.keyword("and")? {
            expr = expr & self.atom()?;
        }
        Ok(expr)
    }

    fn atom(&mut self) -> EngineResult<Antecedent> {
        if matches!(self.peek()?, Some(Token::Open)) {
            self.bump()?;
            let inner = self.disjunction()?;
            return match self.bump()? {
                Some(Token::Close) => Ok(inner),
                _ => Err(self.error("missing `)`")),
            };
        }
        Ok(Antecedent::Is(self.term_ref()?))
    }

    fn finish(&mut self) -> EngineResult<()> {
        match self.bump()? {
            None => Ok(()),
            Some(token) => Err(self.error(format!("trailing input at {token:?}"))),
        }
    }
}

fn is_ident(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '_' || ch == '-'
}

fn is_keyword(word: &str) -> bool {
    ["is", "and", "or"]
        .iter()
        .any(|keyword| word.eq_ignore_ascii_case(keyword))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operators_flatten_chains() {
        let expr = Antecedent::is("a", "x") & Antecedent::is("b", "y") & Antecedent::is("c", "z");
        match &expr {
            Antecedent::And(children) => assert_eq!(children.len(), 3),
            other => panic!("expected conjunction, got {other:?}"),
        }
        let either = Antecedent::is("a", "x") | (Antecedent::is("b", "y") | Antecedent::is("c", "z"));
        assert!(matches!(either, Antecedent::Or(ref c) if c.len() == 3));
    }

    #[test]
    fn parser_respects_precedence() {
        let expr: Antecedent = "a is x or b is y and c is z".parse().unwrap();
        let expected = Antecedent::is("a", "x") | (Antecedent::is("b", "y") & Antecedent::is("c", "z"));
        assert_eq!(expr, expected);

        let grouped: Antecedent = "(a is x OR b is y) and c is z".parse().unwrap();
        let expected = (Antecedent::is("a", "x") | Antecedent::is("b", "y")) & Antecedent::is("c", "z");
        assert_eq!(grouped, expected);
    }

    #[test]
    fn display_round_trips_through_parser() {
        let source = "(a is x or b is y) and c is z";
        let expr: Antecedent = source.parse().unwrap();
        assert_eq!(expr.to_string(), source);
        assert_eq!(expr.to_string().parse::<Antecedent>().unwrap(), expr);
    }

    #[test]
    fn malformed_expressions_are_configuration_errors() {
        for bad in [
            "",
            "a is",
            "a x",
            "a is x and",
            "(a is x",
            "a is x)",
            "a is x & b is y",
            "is is x",
        ] {
            let err = bad.parse::<Antecedent>().unwrap_err();
            assert!(err.is_configuration(), "{bad}: {err}");
        }
    }

    #[test]
    fn evaluate_uses_min_and_max() {
        let expr: Antecedent = "a is x and (b is y or c is z)".parse().unwrap();
        let degrees = |term: &TermRef| match term.variable.as_str() {
            "a" => 0.7,
            "b" => 0.2,
            _ => 0.4,
        };
        assert!((expr.evaluate(&degrees) - 0.4).abs() < 1e-12);
        assert_eq!(expr.term_refs().len(), 3);
    }

    #[test]
    fn rule_serde_uses_text_form() {
        let rule: Rule = serde_json::from_str(
            r#"{ "when": "history is good and income is reasonable", "then": "risk is low" }"#,
        )
        .unwrap();
        assert_eq!(rule.weight, 1.0);
        assert_eq!(rule.consequent, TermRef::new("risk", "low"));
        assert_eq!(
            rule.to_string(),
            "if history is good and income is reasonable then risk is low"
        );
        let weighted = rule.with_weight(0.5);
        assert!(weighted.to_string().ends_with("(weight 0.5)"));
    }
}
