//! Renders a parsed template tree against a context stack (spec.md §4.5
//! "Rendering"). Grounded on `original_source/happy/happy.go`'s `Render`
//! switch over render-tree node kinds.

use std::collections::HashMap;
use std::rc::Rc;

use log::trace;

use crate::error::TemplateError;
use crate::template::ast::TemplateNode;
use crate::template::ContextStack;
use crate::value::{iter, truthy, Value};

pub type Partials = HashMap<String, Rc<TemplateNode>>;

pub fn render(
    node: &TemplateNode,
    ctx: &ContextStack,
    partials: &mut Partials,
) -> Result<String, TemplateError> {
    match node {
        TemplateNode::Plaintext(text) => Ok(text.clone()),
        TemplateNode::Reference(key) => Ok(match key.resolve(ctx) {
            Some(Value::Nil) | None => String::new(),
            Some(v) => crate::value::to_display_string(&v),
        }),
        TemplateNode::Section(key, body) => {
            let value = key.resolve(ctx).unwrap_or(Value::Nil);
            if !truthy(&value) {
                return Ok(String::new());
            }
            if let Some(pairs) = iter(&value) {
                let mut out = String::new();
                for (index, item) in pairs {
                    out.push_str(&render(body, &ctx.push(index, item), partials)?);
                }
                Ok(out)
            } else {
                render(body, &ctx.push(Value::Nil, value), partials)
            }
        }
        TemplateNode::Inverted(key, body) => {
            let value = key.resolve(ctx).unwrap_or(Value::Nil);
            if truthy(&value) {
                Ok(String::new())
            } else {
                render(body, ctx, partials)
            }
        }
        TemplateNode::Include(key) => {
            let name = format!("{key}");
            if name.is_empty() {
                return Err(TemplateError::EmptyPartialName);
            }
            trace!("resolving partial include {name}");
            let partial = partials
                .get(&name)
                .cloned()
                .ok_or_else(|| TemplateError::NoSuchPartial(name.clone()))?;
            render(&partial, ctx, partials)
        }
        TemplateNode::PartialDef(key, body) => {
            let name = format!("{key}");
            if name.is_empty() {
                return Err(TemplateError::EmptyPartialName);
            }
            trace!("defining partial {name}");
            partials.insert(name, body.clone());
            Ok(String::new())
        }
        TemplateNode::Content(nodes) => {
            // Partials defined inside this block are visible to siblings
            // but must not leak back out once the block finishes.
            let mut local_partials = partials.clone();
            let mut out = String::new();
            for child in nodes {
                out.push_str(&render(child, ctx, &mut local_partials)?);
            }
            Ok(out)
        }
    }
}

/// Entry point: renders `node` against fresh top-level data and an empty
/// partial registry (spec.md §6's external interface).
pub fn render_template(node: &TemplateNode, data: Value) -> Result<String, TemplateError> {
    let ctx = ContextStack::root(data);
    let mut partials = Partials::new();
    render(node, &ctx, &mut partials)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::ast::Key;
    use crate::value::OrderedMap;

    #[test]
    fn inverted_section_renders_only_when_falsy() {
        let node = TemplateNode::Content(vec![TemplateNode::Inverted(
            Key::Literal("flag".into()),
            Rc::new(TemplateNode::Plaintext("shown".into())),
        )]);
        let mut m = OrderedMap::new();
        m.insert("flag", Value::Bool(false));
        assert_eq!(render_template(&node, Value::Map(m)).unwrap(), "shown");

        let mut m2 = OrderedMap::new();
        m2.insert("flag", Value::Bool(true));
        assert_eq!(render_template(&node, Value::Map(m2)).unwrap(), "");
    }

    #[test]
    fn include_before_definition_fails_within_its_own_block() {
        let node = TemplateNode::Content(vec![TemplateNode::Include(Key::Literal(
            "missing".into(),
        ))]);
        let err = render_template(&node, Value::Nil).unwrap_err();
        assert!(matches!(err, TemplateError::NoSuchPartial(_)));
    }

    #[test]
    fn partial_defined_and_included_in_same_block() {
        let node = TemplateNode::Content(vec![
            TemplateNode::PartialDef(
                Key::Literal("greet".into()),
                Rc::new(TemplateNode::Plaintext("hi".into())),
            ),
            TemplateNode::Include(Key::Literal("greet".into())),
        ]);
        assert_eq!(render_template(&node, Value::Nil).unwrap(), "hi");
    }

    #[test]
    fn partial_scope_does_not_leak_to_sibling_block() {
        let inner = TemplateNode::Content(vec![TemplateNode::PartialDef(
            Key::Literal("greet".into()),
            Rc::new(TemplateNode::Plaintext("hi".into())),
        )]);
        let outer_include = TemplateNode::Content(vec![TemplateNode::Include(Key::Literal(
            "greet".into(),
        ))]);
        let node = TemplateNode::Content(vec![inner, outer_include]);
        let err = render_template(&node, Value::Nil).unwrap_err();
        assert!(matches!(err, TemplateError::NoSuchPartial(_)));
    }
}
