//! Query parsing: a Lucene-classic subset with `+`/`-`/`NOT` modifiers,
//! `AND`/`OR` conjunctions, `field:` prefixes and parenthesized groups.

use crate::error::ParseError;
use crate::tokenizer::Analyzer;
use crate::Field;
use std::collections::HashSet;
use std::fmt;

const MAX_DEPTH: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Query {
    Term { field: Field, term: String },
    And(Vec<Query>),
    Or(Vec<Query>),
    Not(Box<Query>),
    /// Child of an `And` that never filters: it only adds score to documents
    /// the other children already matched.
    Optional(Box<Query>),
}

impl Query {
    pub fn term(field: Field, term: impl Into<String>) -> Self {
        Query::Term { field, term: term.into() }
    }

    /// The query produced when every clause analyzed away.
    pub fn match_none() -> Self {
        Query::Or(Vec::new())
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn join(f: &mut fmt::Formatter<'_>, children: &[Query], sep: &str) -> fmt::Result {
            if children.len() == 1 {
                return write!(f, "{}", children[0]);
            }
            f.write_str("(")?;
            for (i, child) in children.iter().enumerate() {
                if i > 0 { f.write_str(sep)?; }
                write!(f, "{child}")?;
            }
            f.write_str(")")
        }
        match self {
            Query::Term { field, term } => write!(f, "{field}:{term}"),
            Query::And(children) => join(f, children, " AND "),
            Query::Or(children) => join(f, children, " OR "),
            Query::Not(child) => write!(f, "NOT {child}"),
            Query::Optional(child) => write!(f, "OPTIONAL {child}"),
        }
    }
}

/// Parses `query` against the default analyzer. `default_field` must name an
/// indexed field.
pub fn parse(query: &str, default_field: &str) -> Result<Query, ParseError> {
    let field = default_field.parse::<Field>()?;
    QueryParser::new(field, Analyzer::default()).parse(query)
}

#[derive(Debug, Clone)]
pub struct QueryParser {
    default_field: Field,
    analyzer: Analyzer,
}

impl QueryParser {
    pub fn new(default_field: Field, analyzer: Analyzer) -> Self {
        Self { default_field, analyzer }
    }

    pub fn parse(&self, query: &str) -> Result<Query, ParseError> {
        if query.trim().is_empty() {
            return Err(ParseError::Empty);
        }
        let mut p = Parser { analyzer: &self.analyzer, tokens: lex(query), pos: 0 };
        let clauses = p.parse_group(self.default_field, None, 0)?;
        Ok(combine(clauses).unwrap_or_else(Query::match_none))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token<'a> {
    Open,
    Close,
    Word(&'a str),
}

#[derive(Debug, Clone, Copy)]
struct Lexeme<'a> {
    token: Token<'a>,
    offset: usize,
}

fn lex(input: &str) -> Vec<Lexeme<'_>> {
    let mut out = Vec::new();
    let mut start: Option<usize> = None;
    for (i, c) in input.char_indices() {
        if c.is_whitespace() || c == '(' || c == ')' {
            if let Some(s) = start.take() {
                out.push(Lexeme { token: Token::Word(&input[s..i]), offset: s });
            }
            match c {
                '(' => out.push(Lexeme { token: Token::Open, offset: i }),
                ')' => out.push(Lexeme { token: Token::Close, offset: i }),
                _ => {}
            }
        } else if start.is_none() {
            start = Some(i);
        }
    }
    if let Some(s) = start {
        out.push(Lexeme { token: Token::Word(&input[s..]), offset: s });
    }
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Conjunction {
    And,
    Or,
}

impl Conjunction {
    fn from_word(word: &str) -> Option<Self> {
        match word {
            "AND" | "&&" => Some(Conjunction::And),
            "OR" | "||" => Some(Conjunction::Or),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Occur {
    Should,
    Must,
    MustNot,
}

#[derive(Debug)]
struct Clause {
    occur: Occur,
    query: Option<Query>,
}

struct Parser<'p, 'a> {
    analyzer: &'p Analyzer,
    tokens: Vec<Lexeme<'a>>,
    pos: usize,
}

impl<'p, 'a> Parser<'p, 'a> {
    fn peek(&self) -> Option<Lexeme<'a>> {
        self.tokens.get(self.pos).copied()
    }

    fn advance(&mut self) -> Option<Lexeme<'a>> {
        let lex = self.peek();
        if lex.is_some() { self.pos += 1; }
        lex
    }

    /// Parses clauses up to the end of input, or up to the `)` matching the
    /// `(` at `open`.
    fn parse_group(&mut self, field: Field, open: Option<usize>, depth: usize) -> Result<Vec<Clause>, ParseError> {
        let mut clauses: Vec<Clause> = Vec::new();
        loop {
            let Some(lex) = self.peek() else {
                return match open {
                    Some(offset) => Err(ParseError::UnbalancedGroup { offset }),
                    None => Ok(clauses),
                };
            };

            if lex.token == Token::Close {
                let Some(open_offset) = open else {
                    return Err(ParseError::UnbalancedGroup { offset: lex.offset });
                };
                self.pos += 1;
                if clauses.is_empty() {
                    return Err(ParseError::EmptyGroup { offset: open_offset });
                }
                return Ok(clauses);
            }

            let mut conj = None;
            if let Token::Word(word) = lex.token {
                if let Some(c) = Conjunction::from_word(word) {
                    if clauses.is_empty() {
                        return Err(ParseError::MisplacedConjunction { operator: word.to_string(), offset: lex.offset });
                    }
                    self.pos += 1;
                    match self.peek() {
                        None | Some(Lexeme { token: Token::Close, .. }) => {
                            return Err(ParseError::DanglingOperator { operator: word.to_string(), offset: lex.offset });
                        }
                        Some(Lexeme { token: Token::Word(w), offset }) if Conjunction::from_word(w).is_some() => {
                            return Err(ParseError::MisplacedConjunction { operator: w.to_string(), offset });
                        }
                        _ => {}
                    }
                    conj = Some(c);
                }
            }

            let (occur, query) = self.parse_clause(field, depth)?;
            add_clause(&mut clauses, conj, occur, query);
        }
    }

    /// One clause: modifiers, an optional field prefix, then a term or a group.
    fn parse_clause(&mut self, default_field: Field, depth: usize) -> Result<(Occur, Option<Query>), ParseError> {
        let mut occur = Occur::Should;
        let mut field = default_field;
        let mut pending: Option<(String, usize)> = None;
        loop {
            let Some(lex) = self.advance() else {
                return Err(dangling(pending));
            };
            let word = match lex.token {
                Token::Open => {
                    if depth + 1 >= MAX_DEPTH {
                        return Err(ParseError::NestingTooDeep { offset: lex.offset, max: MAX_DEPTH });
                    }
                    let inner = self.parse_group(field, Some(lex.offset), depth + 1)?;
                    return Ok((occur, combine(inner)));
                }
                Token::Close => return Err(dangling(pending)),
                Token::Word(word) => word,
            };

            if word == "NOT" {
                occur = Occur::MustNot;
                pending = Some((word.to_string(), lex.offset));
                continue;
            }
            if Conjunction::from_word(word).is_some() {
                return Err(ParseError::MisplacedConjunction { operator: word.to_string(), offset: lex.offset });
            }

            // the last prefix operator before the term wins
            let rest = word.trim_start_matches(['+', '-', '!']);
            for c in word[..word.len() - rest.len()].chars() {
                occur = if c == '+' { Occur::Must } else { Occur::MustNot };
            }
            if rest.is_empty() {
                pending = Some((word.to_string(), lex.offset));
                continue;
            }

            let term = match rest.split_once(':') {
                Some((name, _)) if name.starts_with('\\') => rest,
                Some((name, term)) if !name.is_empty() => {
                    field = name.parse()?;
                    if term.is_empty() {
                        // `field:(...)`
                        if matches!(self.peek(), Some(Lexeme { token: Token::Open, .. })) {
                            pending = Some((rest.to_string(), lex.offset));
                            continue;
                        }
                        return Err(ParseError::DanglingOperator { operator: rest.to_string(), offset: lex.offset });
                    }
                    term
                }
                _ => rest,
            };
            // `\-draft` matches a term that starts with an operator character
            let term = match term.strip_prefix('\\') {
                Some("") => return Err(ParseError::DanglingOperator { operator: word.to_string(), offset: lex.offset }),
                Some(escaped) => escaped,
                None => term,
            };
            return Ok((occur, self.term_query(field, term)));
        }
    }

    fn term_query(&self, field: Field, text: &str) -> Option<Query> {
        if !field.is_analyzed() {
            return Some(Query::term(field, text));
        }
        let mut seen = HashSet::new();
        let mut terms: Vec<Query> = self
            .analyzer
            .analyze(text)
            .into_iter()
            .filter(|t| seen.insert(t.clone()))
            .map(|t| Query::term(field, t))
            .collect();
        match terms.len() {
            0 => None,
            1 => terms.pop(),
            _ => Some(Query::Or(terms)),
        }
    }
}

fn dangling(pending: Option<(String, usize)>) -> ParseError {
    let (operator, offset) = pending.unwrap_or_default();
    ParseError::DanglingOperator { operator, offset }
}

fn add_clause(clauses: &mut Vec<Clause>, conj: Option<Conjunction>, mut occur: Occur, query: Option<Query>) {
    // `a AND b` makes a required unless excluded; `OR` leaves a as it was
    if let (Some(Conjunction::And), Some(prev)) = (conj, clauses.last_mut()) {
        if prev.occur != Occur::MustNot {
            prev.occur = Occur::Must;
        }
    }
    if conj == Some(Conjunction::And) && occur == Occur::Should {
        occur = Occur::Must;
    }
    clauses.push(Clause { occur, query });
}

/// Required clauses form the conjunction and should clauses only add score
/// to its matches. Without required clauses at least one should clause must
/// match. Excluded clauses become `Not` children of the conjunction.
fn combine(clauses: Vec<Clause>) -> Option<Query> {
    let mut must = Vec::new();
    let mut should = Vec::new();
    let mut must_not = Vec::new();
    for clause in clauses {
        let Some(query) = clause.query else { continue };
        match clause.occur {
            Occur::Must => must.push(query),
            Occur::Should => should.push(query),
            Occur::MustNot => must_not.push(Query::Not(Box::new(query))),
        }
    }

    let mut conjunction = if must.is_empty() {
        if should.is_empty() { Vec::new() } else { vec![collapse(should, Query::Or)] }
    } else {
        let mut conjunction = must;
        conjunction.extend(should.into_iter().map(|q| Query::Optional(Box::new(q))));
        conjunction
    };
    conjunction.extend(must_not);
    match conjunction.len() {
        0 => None,
        _ => Some(collapse(conjunction, Query::And)),
    }
}

fn collapse(mut children: Vec<Query>, make: fn(Vec<Query>) -> Query) -> Query {
    if children.len() == 1 {
        children.pop().unwrap_or_else(Query::match_none)
    } else {
        make(children)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::AnalyzerConfig;

    fn t(term: &str) -> Query {
        Query::term(Field::Content, term)
    }

    fn p(q: &str) -> Result<Query, ParseError> {
        parse(q, "content")
    }

    fn not(q: Query) -> Query {
        Query::Not(Box::new(q))
    }

    fn opt(q: Query) -> Query {
        Query::Optional(Box::new(q))
    }

    #[test]
    fn single_term() {
        assert_eq!(p("Brutus").unwrap(), t("brutus"));
    }

    #[test]
    fn should_clauses_are_or() {
        assert_eq!(p("caesar brutus").unwrap(), Query::Or(vec![t("caesar"), t("brutus")]));
        assert_eq!(p("caesar OR brutus").unwrap(), Query::Or(vec![t("caesar"), t("brutus")]));
    }

    #[test]
    fn and_keyword_makes_both_required() {
        assert_eq!(p("caesar AND calpurnia").unwrap(), Query::And(vec![t("caesar"), t("calpurnia")]));
        assert_eq!(p("caesar && calpurnia").unwrap(), Query::And(vec![t("caesar"), t("calpurnia")]));
    }

    #[test]
    fn and_not() {
        assert_eq!(p("x AND NOT y").unwrap(), Query::And(vec![t("x"), not(t("y"))]));
        assert_eq!(p("+x -y").unwrap(), Query::And(vec![t("x"), not(t("y"))]));
    }

    #[test]
    fn required_and_should_mix() {
        assert_eq!(
            p("+a b c -d").unwrap(),
            Query::And(vec![t("a"), opt(t("b")), opt(t("c")), not(t("d"))])
        );
        assert_eq!(p("+alpha beta").unwrap(), Query::And(vec![t("alpha"), opt(t("beta"))]));
    }

    #[test]
    fn or_keeps_required_previous() {
        assert_eq!(p("+a OR b").unwrap(), Query::And(vec![t("a"), opt(t("b"))]));
        assert_eq!(p("-a OR b").unwrap(), Query::And(vec![t("b"), not(t("a"))]));
    }

    #[test]
    fn and_binds_only_its_neighbours() {
        assert_eq!(
            p("alpha OR beta AND gamma").unwrap(),
            Query::And(vec![t("beta"), t("gamma"), opt(t("alpha"))])
        );
    }

    #[test]
    fn last_prefix_operator_wins() {
        assert_eq!(p("+-a").unwrap(), not(t("a")));
        assert_eq!(p("-+a").unwrap(), t("a"));
        assert_eq!(p("NOT +a b").unwrap(), Query::And(vec![t("a"), opt(t("b"))]));
    }

    #[test]
    fn pure_exclusion() {
        assert_eq!(p("-a").unwrap(), not(t("a")));
        assert_eq!(p("NOT a -b").unwrap(), Query::And(vec![not(t("a")), not(t("b"))]));
    }

    #[test]
    fn field_prefixes() {
        assert_eq!(p("filename:Doc1.txt").unwrap(), Query::term(Field::Filename, "Doc1.txt"));
        assert_eq!(
            p("id:7 content:Rome").unwrap(),
            Query::Or(vec![Query::term(Field::Id, "7"), t("rome")])
        );
    }

    #[test]
    fn escaped_operator_characters_are_literal() {
        assert_eq!(p("id:-draft").unwrap(), Query::term(Field::Id, "-draft"));
        assert_eq!(p("id:\\-draft").unwrap(), Query::term(Field::Id, "-draft"));
        let ids = QueryParser::new(Field::Id, Analyzer::default());
        assert_eq!(ids.parse("\\-draft").unwrap(), Query::term(Field::Id, "-draft"));
        assert_eq!(ids.parse("-\\+draft").unwrap(), not(Query::term(Field::Id, "+draft")));
        assert_eq!(ids.parse("-draft").unwrap(), not(Query::term(Field::Id, "draft")));
        assert!(matches!(ids.parse("\\"), Err(ParseError::DanglingOperator { .. })));
    }

    #[test]
    fn unknown_field_fails_fast() {
        assert_eq!(p("title:rome").unwrap_err(), ParseError::UnknownField { name: "title".into() });
        assert!(parse("rome", "body").is_err());
    }

    #[test]
    fn groups() {
        assert_eq!(
            p("+(a b) -c").unwrap(),
            Query::And(vec![Query::Or(vec![t("a"), t("b")]), not(t("c"))])
        );
        assert_eq!(
            p("filename:(a.txt b.txt)").unwrap(),
            Query::Or(vec![Query::term(Field::Filename, "a.txt"), Query::term(Field::Filename, "b.txt")])
        );
        assert_eq!(p("((a))").unwrap(), t("a"));
    }

    #[test]
    fn grouping_errors() {
        assert_eq!(p("(a b").unwrap_err(), ParseError::UnbalancedGroup { offset: 0 });
        assert_eq!(p("a b)").unwrap_err(), ParseError::UnbalancedGroup { offset: 3 });
        assert_eq!(p("a ()").unwrap_err(), ParseError::EmptyGroup { offset: 2 });
        let deep = "(".repeat(40) + "a" + &")".repeat(40);
        assert!(matches!(p(&deep), Err(ParseError::NestingTooDeep { .. })));
    }

    #[test]
    fn operator_errors() {
        assert_eq!(p("   ").unwrap_err(), ParseError::Empty);
        assert!(matches!(p("a AND"), Err(ParseError::DanglingOperator { .. })));
        assert!(matches!(p("a +"), Err(ParseError::DanglingOperator { .. })));
        assert!(matches!(p("NOT"), Err(ParseError::DanglingOperator { .. })));
        assert!(matches!(p("content:"), Err(ParseError::DanglingOperator { .. })));
        assert!(matches!(p("AND a"), Err(ParseError::MisplacedConjunction { .. })));
        assert!(matches!(p("a AND OR b"), Err(ParseError::MisplacedConjunction { .. })));
    }

    #[test]
    fn analyzed_terms() {
        assert_eq!(p("don't").unwrap(), Query::Or(vec![t("don"), t("t")]));
        assert_eq!(p("...").unwrap(), Query::match_none());
        let parser = QueryParser::new(Field::Content, Analyzer::new(AnalyzerConfig { stopwords: true, ..Default::default() }));
        assert_eq!(parser.parse("the AND rome").unwrap(), t("rome"));
    }

    #[test]
    fn display() {
        let q = p("+a b c -d").unwrap();
        assert_eq!(q.to_string(), "(content:a AND OPTIONAL content:b AND OPTIONAL content:c AND NOT content:d)");
    }
}
