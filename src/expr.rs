//! The expression tree (spec.md §3 "Expression", §4.2 "Expression
//! evaluation"). A tagged enum over the eleven PEG combinators, grounded on
//! `original_source/parser/expression.go`'s `Sequence`/`Options`/`Optional`/
//! `Repeated`/`Required`/`CharClass`/`Literal`/`Any`/`Reference`/
//! `PositiveLookahead`/`NegativeLookahead` types — collapsed here into one
//! enum per spec.md §9's "tagged variants, not polymorphic objects" note, so
//! `eval` dispatches by `match` instead of a vtable call.

use std::fmt;
use std::rc::Rc;

use regex::Regex;
use unicode_segmentation::UnicodeSegmentation;

use crate::context::ParseContext;
use crate::error::ParseError;
use crate::value::Value;

/// One `(rule-name, value)` pair per reference matched while evaluating a
/// rule body (spec.md §3 "ParseResult").
pub type ResultSeq = Vec<(String, Value)>;

#[derive(Clone)]
pub enum Expression {
    Literal(String),
    CharClass { pattern: String, regex: Rc<Regex> },
    Any,
    Reference(String),
    Sequence(Vec<Expression>),
    Choice(Vec<Expression>),
    Optional(Box<Expression>),
    ZeroOrMore(Box<Expression>),
    OneOrMore(Box<Expression>),
    PositiveLookahead(Box<Expression>),
    NegativeLookahead(Box<Expression>),
}

impl Expression {
    pub fn literal(s: impl Into<String>) -> Expression {
        Expression::Literal(s.into())
    }

    pub fn char_class(pattern: impl Into<String>) -> Result<Expression, ParseError> {
        let pattern = pattern.into();
        let regex = Regex::new(&pattern)
            .map_err(|e| ParseError::new(format!("invalid char class [{pattern}]: {e}")))?;
        Ok(Expression::CharClass {
            pattern,
            regex: Rc::new(regex),
        })
    }

    pub fn reference(name: impl Into<String>) -> Expression {
        Expression::Reference(name.into())
    }

    /// `Seq(...)` — a single child collapses to itself, per the Go original.
    pub fn sequence(mut children: Vec<Expression>) -> Expression {
        if children.len() == 1 {
            children.pop().unwrap()
        } else {
            Expression::Sequence(children)
        }
    }

    /// `Alt(...)` — same single-child collapse as `sequence`.
    pub fn choice(mut children: Vec<Expression>) -> Expression {
        if children.len() == 1 {
            children.pop().unwrap()
        } else {
            Expression::Choice(children)
        }
    }

    pub fn eval(&self, ctx: &mut ParseContext<'_>) -> Result<ResultSeq, ParseError> {
        match self {
            Expression::Literal(text) => {
                let mark = ctx.mark();
                for cluster in text.graphemes(true) {
                    if ctx.current_token() != cluster {
                        ctx.reset(mark);
                        return Err(ctx.error(cluster));
                    }
                    ctx.advance()?;
                }
                Ok(Vec::new())
            }
            Expression::CharClass { regex, pattern } => {
                if !regex.is_match(ctx.current_token()) {
                    return Err(ctx.error(pattern));
                }
                ctx.advance()?;
                Ok(Vec::new())
            }
            Expression::Any => {
                if ctx.at_eof() {
                    return Err(ctx.error("anything"));
                }
                ctx.advance()?;
                Ok(Vec::new())
            }
            Expression::Reference(name) => {
                let value = ctx.dispatch(name)?;
                Ok(vec![(name.clone(), value)])
            }
            Expression::Sequence(children) => {
                let mut result = Vec::new();
                for child in children {
                    result.extend(child.eval(ctx)?);
                }
                Ok(result)
            }
            Expression::Choice(children) => {
                let mark = ctx.mark();
                let mut errors = Vec::new();
                for child in children {
                    match child.eval(ctx) {
                        Ok(result) => return Ok(result),
                        Err(e) => {
                            errors.push(e);
                            ctx.reset(mark.clone());
                        }
                    }
                }
                Err(ParseError::aggregate(errors))
            }
            Expression::Optional(child) => {
                let mark = ctx.mark();
                match child.eval(ctx) {
                    Ok(result) => Ok(result),
                    Err(_) => {
                        ctx.reset(mark);
                        Ok(Vec::new())
                    }
                }
            }
            Expression::ZeroOrMore(child) => Ok(eval_zero_or_more(child, ctx)),
            Expression::OneOrMore(child) => {
                let mut result = child.eval(ctx)?;
                result.extend(eval_zero_or_more(child, ctx));
                Ok(result)
            }
            Expression::PositiveLookahead(child) => {
                let mark = ctx.mark();
                let outcome = child.eval(ctx);
                ctx.reset(mark);
                outcome.map(|_| Vec::new())
            }
            Expression::NegativeLookahead(child) => {
                let mark = ctx.mark();
                let outcome = child.eval(ctx);
                ctx.reset(mark.clone());
                match outcome {
                    Ok(_) => Err(ParseError::new(mark.error("not something"))),
                    Err(_) => Ok(Vec::new()),
                }
            }
        }
    }
}

/// Shared by `ZeroOrMore` and the trailing loop of `OneOrMore`: stop on
/// failure or on a successful, non-advancing attempt (spec.md §4.2's
/// infinite-loop guard).
fn eval_zero_or_more(child: &Expression, ctx: &mut ParseContext<'_>) -> ResultSeq {
    let mut result = Vec::new();
    loop {
        let mark = ctx.mark();
        match child.eval(ctx) {
            Ok(_) if ctx.pos() == mark.pos => {
                ctx.reset(mark);
                break;
            }
            Ok(r) => result.extend(r),
            Err(_) => {
                ctx.reset(mark);
                break;
            }
        }
    }
    result
}

fn needs_parens(e: &Expression) -> bool {
    matches!(e, Expression::Sequence(_) | Expression::Choice(_))
}

fn fmt_child(e: &Expression, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if needs_parens(e) {
        write!(f, "({e})")
    } else {
        write!(f, "{e}")
    }
}

fn escape_literal(s: &str) -> String {
    let mut out = String::new();
    for ch in s.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            other => out.push(other),
        }
    }
    out
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Literal(s) => write!(f, "'{}'", escape_literal(s)),
            Expression::CharClass { pattern, .. } => write!(f, "[{pattern}]"),
            Expression::Any => write!(f, "."),
            Expression::Reference(name) => write!(f, "{name}"),
            Expression::Sequence(children) => {
                let parts: Vec<String> = children
                    .iter()
                    .map(|c| {
                        if needs_parens(c) {
                            format!("({c})")
                        } else {
                            format!("{c}")
                        }
                    })
                    .collect();
                write!(f, "{}", parts.join(" "))
            }
            Expression::Choice(children) => {
                let parts: Vec<String> = children.iter().map(|c| format!("{c}")).collect();
                write!(f, "{}", parts.join(" / "))
            }
            Expression::Optional(child) => {
                fmt_child(child, f)?;
                write!(f, "?")
            }
            Expression::ZeroOrMore(child) => {
                fmt_child(child, f)?;
                write!(f, "*")
            }
            Expression::OneOrMore(child) => {
                fmt_child(child, f)?;
                write!(f, "+")
            }
            Expression::PositiveLookahead(child) => {
                write!(f, "&")?;
                fmt_child(child, f)
            }
            Expression::NegativeLookahead(child) => {
                write!(f, "!")?;
                fmt_child(child, f)
            }
        }
    }
}

impl fmt::Debug for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::{Grammar, Rule};
    use crate::handler::HandlerRegistry;

    fn run(expr: &Expression, input: &str) -> Result<(ResultSeq, crate::grapheme::Grapheme), ParseError> {
        let grammar = Grammar::new();
        let handlers = HandlerRegistry::new();
        let mut ctx = ParseContext::new(input, &grammar, &handlers);
        let result = expr.eval(&mut ctx)?;
        Ok((result, ctx.current().clone()))
    }

    #[test]
    fn literal_matches_and_advances() {
        let e = Expression::literal("ab");
        let (_, end) = run(&e, "ab").unwrap();
        assert_eq!(end.pos, 2);
    }

    #[test]
    fn literal_rewinds_on_partial_mismatch() {
        let e = Expression::literal("ab");
        let grammar = Grammar::new();
        let handlers = HandlerRegistry::new();
        let mut ctx = ParseContext::new("ac", &grammar, &handlers);
        let err = e.eval(&mut ctx);
        assert!(err.is_err());
        assert_eq!(ctx.pos(), 0);
    }

    #[test]
    fn choice_tries_in_order_and_rewinds_between() {
        let e = Expression::choice(vec![Expression::literal("ab"), Expression::literal("ac")]);
        let (_, end) = run(&e, "ac").unwrap();
        assert_eq!(end.pos, 2);
    }

    #[test]
    fn zero_or_more_stops_on_non_advancing_success() {
        // optional empty match looped forever would hang; guard must break it.
        let e = Expression::ZeroOrMore(Box::new(Expression::Optional(Box::new(
            Expression::literal("x"),
        ))));
        let (_, end) = run(&e, "").unwrap();
        assert_eq!(end.pos, 0);
    }

    #[test]
    fn one_or_more_requires_first_match() {
        let e = Expression::OneOrMore(Box::new(Expression::literal("a")));
        assert!(run(&e, "").is_err());
        let (_, end) = run(&e, "aaab").unwrap();
        assert_eq!(end.pos, 3);
    }

    #[test]
    fn positive_lookahead_never_consumes() {
        let e = Expression::PositiveLookahead(Box::new(Expression::literal("a")));
        let (_, end) = run(&e, "a").unwrap();
        assert_eq!(end.pos, 0);
    }

    #[test]
    fn negative_lookahead_fails_on_match_succeeds_on_eof() {
        let e = Expression::NegativeLookahead(Box::new(Expression::Any));
        let (_, end) = run(&e, "").unwrap();
        assert_eq!(end.pos, 0);
        let err = {
            let grammar = Grammar::new();
            let handlers = HandlerRegistry::new();
            let mut ctx = ParseContext::new("a", &grammar, &handlers);
            e.eval(&mut ctx)
        };
        assert!(err.is_err());
    }

    #[test]
    fn display_round_trips_through_parsing_structure() {
        let e = Expression::sequence(vec![
            Expression::literal("a"),
            Expression::choice(vec![Expression::literal("b"), Expression::literal("c")]),
        ]);
        assert_eq!(format!("{e}"), "'a' ('b' / 'c')");
    }

    #[test]
    fn reference_dispatch_uses_grammar_rule() {
        let mut grammar = Grammar::new();
        grammar.add(Rule::new("Start", Expression::literal("hi")));
        let handlers = HandlerRegistry::new();
        let mut ctx = ParseContext::new("hi", &grammar, &handlers);
        let e = Expression::reference("Start");
        let result = e.eval(&mut ctx).unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].0, "Start");
        assert_eq!(result[0].1, Value::string("hi"));
    }
}
