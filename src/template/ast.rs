//! The template render tree and key grammar (spec.md §3 "Key", §4.5).
//! Grounded on `original_source/happy/key,.go` (`Key` resolution) and
//! `original_source/happy/happy.go` (the render-tree node kinds).

use std::fmt;
use std::rc::Rc;

use crate::template::ContextStack;
use crate::value::{get, Value};

/// A path into the current context stack (spec.md §4.5 "Key resolution").
#[derive(Clone, Debug, PartialEq)]
pub enum Key {
    /// A bare name, looked up across the whole context stack head-first.
    Literal(String),
    /// `.` — the current frame's data, unchanged.
    SelfKey,
    /// `@` — the current frame's loop index.
    Index,
    /// `name[inner]` — resolve `inner` first, then search the stack for the
    /// resulting name.
    Bracket(String, Box<Key>),
    /// `a.b.c` — fold left, pushing one `{index: Nil, data}` frame per step.
    Dotted(Vec<Key>),
}

impl Key {
    /// Resolves this key against `ctx`, returning `None` if any step in a
    /// dotted or bracketed path fails to find a value.
    pub fn resolve(&self, ctx: &ContextStack) -> Option<Value> {
        match self {
            Key::Literal(name) => ctx.get(name),
            Key::SelfKey => Some(ctx.current()),
            Key::Index => Some(ctx.index()),
            Key::Bracket(name, inner) => {
                let resolved_inner = inner.resolve(ctx)?;
                let lookup_name = crate::value::to_display_string(&resolved_inner);
                get(&ctx.current(), &lookup_name).or_else(|| ctx.get(&lookup_name))
            }
            Key::Dotted(parts) => {
                let mut stack = ctx.clone();
                for part in parts {
                    let value = part.resolve(&stack)?;
                    stack = stack.push(Value::Nil, value);
                }
                Some(stack.current())
            }
        }
    }

}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Literal(name) => write!(f, "{name}"),
            Key::SelfKey => write!(f, "."),
            Key::Index => write!(f, "@"),
            Key::Bracket(name, inner) => write!(f, "{name}[{inner}]"),
            Key::Dotted(parts) => {
                let rendered: Vec<String> = parts.iter().map(|p| format!("{p}")).collect();
                write!(f, "{}", rendered.join("."))
            }
        }
    }
}

/// One node of a parsed template (spec.md §3 "Render tree").
#[derive(Clone, Debug)]
pub enum TemplateNode {
    Plaintext(String),
    Reference(Key),
    Section(Key, Rc<TemplateNode>),
    Inverted(Key, Rc<TemplateNode>),
    Include(Key),
    PartialDef(Key, Rc<TemplateNode>),
    Content(Vec<TemplateNode>),
}
