//! The grammar-of-grammars: a PEG grammar for the textual PEG meta-syntax
//! (spec.md §6), hand-wired directly from [`Expression`] constructors rather
//! than self-parsed (a self-hosting bootstrap has no earlier parser to build
//! it with). Grounded on `original_source/parser/bootstrap.go`, which
//! assembles the same grammar from Go closures; this module keeps the same
//! rule shape but expresses it with this crate's combinators.
//!
//! The grammar is built once per thread, behind a [`once_cell::unsync::Lazy`]
//! in a `thread_local!`, per spec.md §5's "the construction is memoised with
//! a once-initialiser" note.

use std::rc::Rc;

use once_cell::unsync::Lazy;

use crate::error::{HandlerError, ParseError};
use crate::expr::{Expression, ResultSeq};
use crate::grammar::{Grammar, Rule};
use crate::handler::HandlerRegistry;
use crate::value::Value;

fn lit(s: &str) -> Expression {
    Expression::literal(s)
}

fn class(pattern: &str) -> Expression {
    Expression::char_class(pattern).expect("bootstrap char classes are known-valid")
}

fn reference(name: &str) -> Expression {
    Expression::reference(name)
}

fn seq(parts: Vec<Expression>) -> Expression {
    Expression::sequence(parts)
}

fn choice(parts: Vec<Expression>) -> Expression {
    Expression::choice(parts)
}

fn opt(e: Expression) -> Expression {
    Expression::Optional(Box::new(e))
}

fn star(e: Expression) -> Expression {
    Expression::ZeroOrMore(Box::new(e))
}

fn plus(e: Expression) -> Expression {
    Expression::OneOrMore(Box::new(e))
}

fn not(e: Expression) -> Expression {
    Expression::NegativeLookahead(Box::new(e))
}

fn first_named<'a>(results: &'a ResultSeq, name: &str) -> Option<&'a Value> {
    results.iter().find(|(n, _)| n == name).map(|(_, v)| v)
}

fn all_named<'a>(results: &'a ResultSeq, name: &str) -> Vec<&'a Value> {
    results
        .iter()
        .filter(|(n, _)| n == name)
        .map(|(_, v)| v)
        .collect()
}

fn has_named(results: &ResultSeq, name: &str) -> bool {
    results.iter().any(|(n, _)| n == name)
}

fn expr_named(results: &ResultSeq, name: &str) -> Result<Rc<Expression>, HandlerError> {
    first_named(results, name)
        .and_then(Value::as_expression)
        .ok_or_else(|| HandlerError::new(format!("expected {name} to hold an expression")))
}

/// Resolves `\n \r \t \\ \' \"`; any other escaped character passes through
/// literally (spec.md §6's literal-escape table).
fn unescape(raw: &str) -> String {
    let mut out = String::new();
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => out.push('\n'),
                Some('r') => out.push('\r'),
                Some('t') => out.push('\t'),
                Some('\\') => out.push('\\'),
                Some('\'') => out.push('\''),
                Some('"') => out.push('"'),
                Some(other) => out.push(other),
                None => out.push('\\'),
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// A (possibly empty) run of whitespace or `#`-comments.
fn grammar_spacing() -> Expression {
    star(choice(vec![
        lit(" "),
        lit("\t"),
        lit("\r"),
        lit("\n"),
        reference("Comment"),
    ]))
}

fn build_grammar() -> Grammar {
    let mut g = Grammar::new();

    g.add(Rule::new(
        "Comment",
        seq(vec![
            lit("#"),
            star(seq(vec![not(lit("\n")), Expression::Any])),
            opt(lit("\n")),
        ]),
    ));
    g.add(Rule::new("Spacing", grammar_spacing()));

    g.add(Rule::new(
        "Ident",
        seq(vec![
            class("[A-Za-z_]"),
            star(class("[A-Za-z0-9_]")),
        ]),
    ));
    g.add(Rule::new(
        "Name",
        seq(vec![reference("Ident"), reference("Spacing")]),
    ));

    g.add(Rule::new(
        "ArrowMark",
        seq(vec![lit("<-"), reference("Spacing")]),
    ));
    g.add(Rule::new(
        "SlashMark",
        seq(vec![lit("/"), reference("Spacing")]),
    ));
    g.add(Rule::new(
        "QuestMark",
        seq(vec![lit("?"), reference("Spacing")]),
    ));
    g.add(Rule::new(
        "StarMark",
        seq(vec![lit("*"), reference("Spacing")]),
    ));
    g.add(Rule::new(
        "PlusMark",
        seq(vec![lit("+"), reference("Spacing")]),
    ));
    g.add(Rule::new(
        "AmpMark",
        seq(vec![lit("&"), reference("Spacing")]),
    ));
    g.add(Rule::new(
        "BangMark",
        seq(vec![lit("!"), reference("Spacing")]),
    ));

    let escaped_or_any_but = |quote: &'static str| {
        star(choice(vec![
            seq(vec![lit("\\"), Expression::Any]),
            seq(vec![not(lit(quote)), Expression::Any]),
        ]))
    };
    g.add(Rule::new("SQBody", escaped_or_any_but("'")));
    g.add(Rule::new("DQBody", escaped_or_any_but("\"")));
    g.add(Rule::new(
        "Literal",
        choice(vec![
            seq(vec![
                lit("'"),
                reference("SQBody"),
                lit("'"),
                reference("Spacing"),
            ]),
            seq(vec![
                lit("\""),
                reference("DQBody"),
                lit("\""),
                reference("Spacing"),
            ]),
        ]),
    ));

    g.add(Rule::new(
        "ClassBody",
        star(choice(vec![
            seq(vec![lit("\\"), Expression::Any]),
            seq(vec![not(lit("]")), Expression::Any]),
        ])),
    ));
    g.add(Rule::new(
        "CharClass",
        seq(vec![
            lit("["),
            reference("ClassBody"),
            lit("]"),
            reference("Spacing"),
        ]),
    ));

    g.add(Rule::new(
        "Primary",
        choice(vec![
            seq(vec![reference("Name"), not(reference("ArrowMark"))]),
            seq(vec![
                lit("("),
                reference("Spacing"),
                reference("Expr"),
                lit(")"),
                reference("Spacing"),
            ]),
            reference("Literal"),
            reference("CharClass"),
            seq(vec![lit("."), reference("Spacing")]),
        ]),
    ));

    g.add(Rule::new(
        "Suffix",
        seq(vec![
            reference("Primary"),
            opt(choice(vec![
                reference("QuestMark"),
                reference("StarMark"),
                reference("PlusMark"),
            ])),
        ]),
    ));

    g.add(Rule::new(
        "Prefix",
        choice(vec![
            seq(vec![reference("AmpMark"), reference("Suffix")]),
            seq(vec![reference("BangMark"), reference("Suffix")]),
            reference("Suffix"),
        ]),
    ));

    g.add(Rule::new("Seq", star(reference("Prefix"))));
    g.add(Rule::new(
        "Expr",
        seq(vec![
            reference("Seq"),
            star(seq(vec![reference("SlashMark"), reference("Seq")])),
        ]),
    ));

    g.add(Rule::new(
        "Rule",
        seq(vec![
            reference("Name"),
            reference("ArrowMark"),
            reference("Expr"),
        ]),
    ));

    g.add(Rule::new(
        "Grammar",
        seq(vec![
            reference("Spacing"),
            plus(reference("Rule")),
            not(Expression::Any),
        ]),
    ));

    g
}

fn build_handlers() -> HandlerRegistry {
    HandlerRegistry::builder()
        .register("Name", |results: &ResultSeq| {
            first_named(results, "Ident")
                .cloned()
                .ok_or_else(|| HandlerError::new("Name missing Ident"))
        })
        .register("Literal", |results: &ResultSeq| {
            let raw = first_named(results, "SQBody")
                .or_else(|| first_named(results, "DQBody"))
                .and_then(Value::as_str)
                .ok_or_else(|| HandlerError::new("Literal missing body"))?;
            Ok(Value::Expression(Rc::new(Expression::literal(unescape(
                raw,
            )))))
        })
        .register("CharClass", |results: &ResultSeq| {
            let body = first_named(results, "ClassBody")
                .and_then(Value::as_str)
                .ok_or_else(|| HandlerError::new("CharClass missing body"))?;
            let expr = Expression::char_class(format!("[{body}]"))
                .map_err(|e| HandlerError::new(e.0))?;
            Ok(Value::Expression(Rc::new(expr)))
        })
        .register("Primary", |results: &ResultSeq| {
            if let Some(name) = first_named(results, "Name").and_then(Value::as_str) {
                return Ok(Value::Expression(Rc::new(Expression::reference(name))));
            }
            for key in ["Expr", "Literal", "CharClass"] {
                if let Some(v) = first_named(results, key) {
                    return Ok(v.clone());
                }
            }
            Ok(Value::Expression(Rc::new(Expression::Any)))
        })
        .register("Suffix", |results: &ResultSeq| {
            let primary = expr_named(results, "Primary")?;
            let wrapped = if has_named(results, "QuestMark") {
                Expression::Optional(Box::new((*primary).clone()))
            } else if has_named(results, "StarMark") {
                Expression::ZeroOrMore(Box::new((*primary).clone()))
            } else if has_named(results, "PlusMark") {
                Expression::OneOrMore(Box::new((*primary).clone()))
            } else {
                (*primary).clone()
            };
            Ok(Value::Expression(Rc::new(wrapped)))
        })
        .register("Prefix", |results: &ResultSeq| {
            let suffix = expr_named(results, "Suffix")?;
            let wrapped = if has_named(results, "AmpMark") {
                Expression::PositiveLookahead(Box::new((*suffix).clone()))
            } else if has_named(results, "BangMark") {
                Expression::NegativeLookahead(Box::new((*suffix).clone()))
            } else {
                (*suffix).clone()
            };
            Ok(Value::Expression(Rc::new(wrapped)))
        })
        .register("Seq", |results: &ResultSeq| {
            let parts: Vec<Expression> = all_named(results, "Prefix")
                .into_iter()
                .filter_map(Value::as_expression)
                .map(|rc| (*rc).clone())
                .collect();
            Ok(Value::Expression(Rc::new(Expression::sequence(parts))))
        })
        .register("Expr", |results: &ResultSeq| {
            let parts: Vec<Expression> = all_named(results, "Seq")
                .into_iter()
                .filter_map(Value::as_expression)
                .map(|rc| (*rc).clone())
                .collect();
            Ok(Value::Expression(Rc::new(Expression::choice(parts))))
        })
        .register("Rule", |results: &ResultSeq| {
            let name = first_named(results, "Name")
                .and_then(Value::as_str)
                .ok_or_else(|| HandlerError::new("Rule missing Name"))?
                .to_string();
            let expr = expr_named(results, "Expr")?;
            Ok(Value::Rule(Rc::new(Rule::new(name, (*expr).clone()))))
        })
        .register("Grammar", |results: &ResultSeq| {
            let mut grammar = Grammar::new();
            for rule in all_named(results, "Rule") {
                let rule = rule
                    .as_rule()
                    .ok_or_else(|| HandlerError::new("Grammar expected a Rule value"))?;
                grammar.add((*rule).clone());
            }
            Ok(Value::Grammar(Rc::new(grammar)))
        })
        .build()
}

thread_local! {
    static PEG_GRAMMAR: Lazy<Grammar> = Lazy::new(build_grammar);
    static PEG_HANDLERS: Lazy<HandlerRegistry> = Lazy::new(build_handlers);
}

/// Parses PEG meta-syntax source text into a [`Grammar`].
pub fn bootstrap_parse(source: &str) -> Result<Grammar, ParseError> {
    let value = PEG_GRAMMAR.with(|grammar| {
        PEG_HANDLERS.with(|handlers| grammar.parse_from("Grammar", source, handlers))
    })?;
    value
        .as_grammar()
        .map(|g| (*g).clone())
        .ok_or_else(|| ParseError::new("bootstrap grammar did not produce a Grammar value"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_single_literal_rule() {
        let grammar = bootstrap_parse("Greeting <- 'hi'\n").unwrap();
        let handlers = HandlerRegistry::new();
        let value = grammar.parse("hi", &handlers).unwrap();
        assert_eq!(value, Value::string("hi"));
    }

    #[test]
    fn parses_choice_and_sequence_and_char_class() {
        let source = "Digit <- [0-9]\nNumber <- Digit+\n";
        let grammar = bootstrap_parse(source).unwrap();
        let handlers = HandlerRegistry::new();
        let value = grammar.parse_from("Number", "123", &handlers).unwrap();
        assert_eq!(value, Value::string("123"));
    }

    #[test]
    fn parses_comments_and_whitespace() {
        let source = "# a comment\nA <- 'x' # trailing\n";
        let grammar = bootstrap_parse(source).unwrap();
        let handlers = HandlerRegistry::new();
        assert!(grammar.parse_from("A", "x", &handlers).is_ok());
    }

    #[test]
    fn rejects_trailing_garbage_after_last_rule() {
        let source = "A <- 'x' $$$\n";
        assert!(bootstrap_parse(source).is_err());
    }

    #[test]
    fn pretty_printed_grammar_reparses_to_an_equivalent_tree() {
        use pretty_assertions::assert_eq;

        let source = "A <- 'a' ('b' / 'c')*\n";
        let grammar = bootstrap_parse(source).unwrap();
        let printed = format!("{grammar}");
        let reparsed = bootstrap_parse(&printed).unwrap();
        assert_eq!(format!("{reparsed}"), printed);
    }
}
