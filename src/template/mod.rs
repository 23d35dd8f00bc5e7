//! The logic-less template interpreter (spec.md §4.5). The `(^ ... ^)` tag
//! grammar is expressed as PEG source text and parsed through the bootstrap
//! engine — unlike the bootstrap grammar itself, this one is not hand-wired,
//! matching spec.md §9's guidance that only the grammar-of-grammars needs a
//! hand-built base case. Grounded on `original_source/happy/happy.go` and
//! `original_source/happy/context.go`.

pub mod ast;
pub mod render;

use std::rc::Rc;

use once_cell::unsync::Lazy;

use crate::bootstrap::bootstrap_parse;
use crate::error::{HandlerError, TemplateError};
use crate::expr::ResultSeq;
use crate::grammar::Grammar;
use crate::handler::HandlerRegistry;
use crate::value::Value;

use ast::{Key, TemplateNode};

/// An immutable, Rc-linked stack of `{index, data}` frames (spec.md §3
/// "ContextStack"). Pushing returns a new stack sharing the old one's tail,
/// so sibling sections never see each other's pushed frames.
#[derive(Clone, Debug)]
pub struct ContextStack(Rc<Frame>);

#[derive(Debug)]
struct Frame {
    index: Value,
    data: Value,
    parent: Option<Rc<Frame>>,
}

impl ContextStack {
    pub fn root(data: Value) -> ContextStack {
        ContextStack(Rc::new(Frame {
            index: Value::Nil,
            data,
            parent: None,
        }))
    }

    pub fn push(&self, index: Value, data: Value) -> ContextStack {
        ContextStack(Rc::new(Frame {
            index,
            data,
            parent: Some(self.0.clone()),
        }))
    }

    pub fn current(&self) -> Value {
        self.0.data.clone()
    }

    pub fn index(&self) -> Value {
        self.0.index.clone()
    }

    /// Searches every frame, nearest first, for a value keyed by `name`.
    pub fn get(&self, name: &str) -> Option<Value> {
        let mut frame = Some(self.0.clone());
        while let Some(f) = frame {
            if let Some(v) = crate::value::get(&f.data, name) {
                return Some(v);
            }
            frame = f.parent.clone();
        }
        None
    }
}

const TEMPLATE_GRAMMAR_SOURCE: &str = r##"
Template <- Node*
Node <- CommentTag / IncludeTag / Section / Inverted / PartialDef / RefTag / Plain
Plain <- (!"(^" .)+
CommentTag <- "(^" WS "#" (!"^)" .)* WS "^)"
IncludeTag <- "(^" WS ">" WS DottedKey WS "^)"
Section <- "(^" WS "*" WS DottedKey WS "^)" Template "(^" WS "/" WS "^)"
Inverted <- "(^" WS "!" WS DottedKey WS "^)" Template "(^" WS "/" WS "^)"
PartialDef <- "(^" WS "=" WS DottedKey WS "^)" Template "(^" WS "/" WS "^)"
RefTag <- "(^" WS DottedKey WS "^)"
WS <- [ \t\r\n]*
DottedKey <- BracketKey ("." BracketKey)*
BracketKey <- AtomKey ("[" DottedKey "]")?
AtomKey <- SelfMark / IndexMark / Ident
SelfMark <- "."
IndexMark <- "@"
Ident <- [A-Za-z_][A-Za-z0-9_]*
"##;

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

fn key_named(results: &ResultSeq, name: &str) -> Result<Rc<Key>, HandlerError> {
    first_named(results, name)
        .and_then(Value::as_key)
        .ok_or_else(|| HandlerError::new(format!("expected {name} to hold a key")))
}

fn node_named(results: &ResultSeq, name: &str) -> Result<Rc<TemplateNode>, HandlerError> {
    first_named(results, name)
        .and_then(Value::as_template_node)
        .ok_or_else(|| HandlerError::new(format!("expected {name} to hold a template node")))
}

fn build_handlers() -> HandlerRegistry {
    HandlerRegistry::builder()
        .register("AtomKey", |results: &ResultSeq| {
            if has_named(results, "SelfMark") {
                return Ok(Value::Key(Rc::new(Key::SelfKey)));
            }
            if has_named(results, "IndexMark") {
                return Ok(Value::Key(Rc::new(Key::Index)));
            }
            let name = first_named(results, "Ident")
                .and_then(Value::as_str)
                .ok_or_else(|| HandlerError::new("AtomKey missing Ident"))?;
            Ok(Value::Key(Rc::new(Key::Literal(name.to_string()))))
        })
        .register("BracketKey", |results: &ResultSeq| {
            let atom = key_named(results, "AtomKey")?;
            if let Some(inner) = first_named(results, "DottedKey").and_then(Value::as_key) {
                let name = match atom.as_ref() {
                    Key::Literal(n) => n.clone(),
                    other => format!("{other}"),
                };
                return Ok(Value::Key(Rc::new(Key::Bracket(name, Box::new((*inner).clone())))));
            }
            Ok(Value::Key(atom))
        })
        .register("DottedKey", |results: &ResultSeq| {
            let mut parts: Vec<Key> = all_named(results, "BracketKey")
                .into_iter()
                .filter_map(Value::as_key)
                .map(|k| (*k).clone())
                .collect();
            if parts.len() == 1 {
                Ok(Value::Key(Rc::new(parts.pop().unwrap())))
            } else {
                Ok(Value::Key(Rc::new(Key::Dotted(parts))))
            }
        })
        .register("CommentTag", |_: &ResultSeq| {
            Ok(Value::TemplateNode(Rc::new(TemplateNode::Plaintext(
                String::new(),
            ))))
        })
        .register("IncludeTag", |results: &ResultSeq| {
            let key = key_named(results, "DottedKey")?;
            Ok(Value::TemplateNode(Rc::new(TemplateNode::Include(
                (*key).clone(),
            ))))
        })
        .register("RefTag", |results: &ResultSeq| {
            let key = key_named(results, "DottedKey")?;
            Ok(Value::TemplateNode(Rc::new(TemplateNode::Reference(
                (*key).clone(),
            ))))
        })
        .register("Section", |results: &ResultSeq| {
            let key = key_named(results, "DottedKey")?;
            let body = node_named(results, "Template")?;
            Ok(Value::TemplateNode(Rc::new(TemplateNode::Section(
                (*key).clone(),
                body,
            ))))
        })
        .register("Inverted", |results: &ResultSeq| {
            let key = key_named(results, "DottedKey")?;
            let body = node_named(results, "Template")?;
            Ok(Value::TemplateNode(Rc::new(TemplateNode::Inverted(
                (*key).clone(),
                body,
            ))))
        })
        .register("PartialDef", |results: &ResultSeq| {
            let key = key_named(results, "DottedKey")?;
            let body = node_named(results, "Template")?;
            Ok(Value::TemplateNode(Rc::new(TemplateNode::PartialDef(
                (*key).clone(),
                body,
            ))))
        })
        .register("Node", |results: &ResultSeq| {
            if let Some(text) = first_named(results, "Plain").and_then(Value::as_str) {
                return Ok(Value::TemplateNode(Rc::new(TemplateNode::Plaintext(
                    text.to_string(),
                ))));
            }
            for key in [
                "CommentTag",
                "IncludeTag",
                "Section",
                "Inverted",
                "PartialDef",
                "RefTag",
            ] {
                if let Some(v) = first_named(results, key) {
                    return Ok(v.clone());
                }
            }
            Err(HandlerError::new("Node matched nothing recognizable"))
        })
        .register("Template", |results: &ResultSeq| {
            let nodes: Vec<TemplateNode> = all_named(results, "Node")
                .into_iter()
                .filter_map(Value::as_template_node)
                .map(|n| (*n).clone())
                .collect();
            Ok(Value::TemplateNode(Rc::new(TemplateNode::Content(nodes))))
        })
        .build()
}

thread_local! {
    static TEMPLATE_GRAMMAR: Lazy<Grammar> = Lazy::new(|| {
        bootstrap_parse(TEMPLATE_GRAMMAR_SOURCE)
            .expect("the template tag grammar source is valid PEG")
    });
    static TEMPLATE_HANDLERS: Lazy<HandlerRegistry> = Lazy::new(build_handlers);
}

/// Parses template source text (containing `(^ ... ^)` tags) into a render
/// tree.
pub fn parse_template(source: &str) -> Result<Rc<TemplateNode>, TemplateError> {
    let value = TEMPLATE_GRAMMAR.with(|grammar| {
        TEMPLATE_HANDLERS.with(|handlers| grammar.parse_from("Template", source, handlers))
    })?;
    value
        .as_template_node()
        .ok_or_else(|| TemplateError::Parse(crate::error::ParseError::new(
            "template grammar did not produce a template node",
        )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::OrderedMap;

    fn data(pairs: &[(&str, Value)]) -> Value {
        let mut m = OrderedMap::new();
        for (k, v) in pairs {
            m.insert(*k, v.clone());
        }
        Value::Map(m)
    }

    #[test]
    fn parses_plain_reference() {
        let tree = parse_template("This is (^name^) text!").unwrap();
        let ctx = ContextStack::root(data(&[("name", Value::string("Bob"))]));
        let mut partials = std::collections::HashMap::new();
        let rendered = render::render(&tree, &ctx, &mut partials).unwrap();
        assert_eq!(rendered, "This is Bob text!");
    }

    #[test]
    fn strips_whitespace_inside_tag_delimiters() {
        let tree = parse_template("Hi (^  name  ^)!").unwrap();
        let ctx = ContextStack::root(data(&[("name", Value::string("Sam"))]));
        let mut partials = std::collections::HashMap::new();
        let rendered = render::render(&tree, &ctx, &mut partials).unwrap();
        assert_eq!(rendered, "Hi Sam!");
    }

    #[test]
    fn dotted_key_resolves_nested_maps() {
        let tree = parse_template("(^person.name^)").unwrap();
        let ctx = ContextStack::root(data(&[(
            "person",
            data(&[("name", Value::string("Ann"))]),
        )]));
        let mut partials = std::collections::HashMap::new();
        let rendered = render::render(&tree, &ctx, &mut partials).unwrap();
        assert_eq!(rendered, "Ann");
    }

    #[test]
    fn self_key_renders_current_frame() {
        let tree = parse_template("(^*items^)[(^.^)](^/^)").unwrap();
        let ctx = ContextStack::root(data(&[(
            "items",
            Value::Array(vec![Value::string("a"), Value::string("b")]),
        )]));
        let mut partials = std::collections::HashMap::new();
        let rendered = render::render(&tree, &ctx, &mut partials).unwrap();
        assert_eq!(rendered, "[a][b]");
    }
}
