//! A grammar: an ordered collection of named rules (spec.md §3 "Grammar",
//! "Rule"). Ordering is preserved the way [`crate::value::OrderedMap`] keeps
//! template partials ordered, because pretty-printing (§8's round-trip
//! property) must reproduce the rules in their declared sequence.

use std::collections::HashMap;
use std::fmt;

use crate::context::ParseContext;
use crate::error::ParseError;
use crate::expr::Expression;
use crate::grapheme::Grapheme;
use crate::handler::HandlerRegistry;
use crate::value::Value;

#[derive(Clone)]
pub struct Rule {
    pub name: String,
    pub expression: Expression,
}

impl Rule {
    pub fn new(name: impl Into<String>, expression: Expression) -> Rule {
        Rule {
            name: name.into(),
            expression,
        }
    }

    /// Evaluates this rule's body starting at the context's current
    /// position. On success, converts the matched [`crate::expr::ResultSeq`]
    /// through the registered handler, falling back to the raw matched
    /// substring when no handler is registered for this rule (spec.md §4.4).
    pub fn evaluate(&self, ctx: &mut ParseContext<'_>) -> Result<(Value, Grapheme), ParseError> {
        let start = ctx.current().clone();
        match self.expression.eval(ctx) {
            Ok(result) => {
                let end = ctx.current().clone();
                let value = match ctx.handlers().get(&self.name) {
                    Some(convert) => convert(&result)?,
                    None => Value::String(start.substring_to(&end)),
                };
                Ok((value, end))
            }
            Err(e) => Err(e.in_rule(&self.name)),
        }
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} <- {}", self.name, self.expression)
    }
}

#[derive(Clone, Default)]
pub struct Grammar {
    rules: HashMap<String, Rule>,
    order: Vec<String>,
}

impl Grammar {
    pub fn new() -> Grammar {
        Grammar::default()
    }

    pub fn add(&mut self, rule: Rule) {
        if !self.rules.contains_key(&rule.name) {
            self.order.push(rule.name.clone());
        }
        self.rules.insert(rule.name.clone(), rule);
    }

    pub fn get(&self, name: &str) -> Option<&Rule> {
        self.rules.get(name)
    }

    pub fn root(&self) -> Option<&str> {
        self.order.first().map(String::as_str)
    }

    /// Parses `input` against this grammar's first declared rule.
    pub fn parse(&self, input: &str, handlers: &HandlerRegistry) -> Result<Value, ParseError> {
        let root = self
            .root()
            .ok_or_else(|| ParseError::new("grammar has no rules"))?;
        self.parse_from(root, input, handlers)
    }

    /// Parses `input` against an explicitly named start rule (spec.md §9's
    /// `ParseFrom` equivalent), requiring the whole input be consumed.
    pub fn parse_from(
        &self,
        root: &str,
        input: &str,
        handlers: &HandlerRegistry,
    ) -> Result<Value, ParseError> {
        let mut ctx = ParseContext::new(input, self, handlers);
        let value = ctx.dispatch(root)?;
        if !ctx.at_eof() {
            return Err(ParseError::new(ctx.current().error("end of input")));
        }
        Ok(value)
    }
}

impl fmt::Display for Grammar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for name in &self.order {
            writeln!(f, "{}", self.rules[name])?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::HandlerRegistry;

    #[test]
    fn parse_dispatches_to_first_rule_by_default() {
        let mut grammar = Grammar::new();
        grammar.add(Rule::new("Greeting", Expression::literal("hi")));
        let handlers = HandlerRegistry::new();
        let value = grammar.parse("hi", &handlers).unwrap();
        assert_eq!(value, Value::string("hi"));
    }

    #[test]
    fn parse_from_honors_explicit_root() {
        let mut grammar = Grammar::new();
        grammar.add(Rule::new("A", Expression::literal("a")));
        grammar.add(Rule::new("B", Expression::literal("b")));
        let handlers = HandlerRegistry::new();
        let value = grammar.parse_from("B", "b", &handlers).unwrap();
        assert_eq!(value, Value::string("b"));
    }

    #[test]
    fn parse_fails_on_trailing_input() {
        let mut grammar = Grammar::new();
        grammar.add(Rule::new("A", Expression::literal("a")));
        let handlers = HandlerRegistry::new();
        assert!(grammar.parse("ab", &handlers).is_err());
    }

    #[test]
    fn display_preserves_declaration_order() {
        let mut grammar = Grammar::new();
        grammar.add(Rule::new("A", Expression::literal("a")));
        grammar.add(Rule::new("B", Expression::literal("b")));
        let text = format!("{grammar}");
        assert!(text.find("A <-").unwrap() < text.find("B <-").unwrap());
    }
}
