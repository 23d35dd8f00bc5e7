//! The dynamic `any` type threaded through handlers, rule results, and the
//! template interpreter (spec.md §3 "Dynamic value access", §4.6).
//!
//! The Go original lets every one of these roles share `any` and recovers
//! structure with `reflect`. Rust has no safe universal `any`-with-fields, so
//! `Value` is the tagged union spec.md §9 recommends, and Go's
//! struct-field/method reflection becomes the [`Record`] trait (field +
//! bound-method lookup implemented per concrete host type), grounded on
//! `original_source/happy/indirect.go`'s `getStruct`/`getPointerOrInterface`.

use std::fmt;
use std::rc::Rc;

use crate::expr::Expression;
use crate::grammar::{Grammar, Rule};
use crate::template::ast::{Key, TemplateNode};

/// An insertion-ordered string-keyed map, mirroring the
/// `HashMap<name,Rule> + Vec<name>` pattern already used by
/// [`crate::grammar::Grammar`] rather than pulling in a new ordered-map
/// dependency for the same need.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct OrderedMap {
    order: Vec<String>,
    entries: std::collections::HashMap<String, Value>,
}

impl OrderedMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        let key = key.into();
        if !self.entries.contains_key(&key) {
            self.order.push(key.clone());
        }
        self.entries.insert(key, value);
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.order.iter().map(move |k| (k.as_str(), &self.entries[k]))
    }
}

impl FromIterator<(String, Value)> for OrderedMap {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        let mut m = OrderedMap::new();
        for (k, v) in iter {
            m.insert(k, v);
        }
        m
    }
}

/// A host type exposing named fields and bound methods, standing in for Go
/// struct reflection (spec.md §4.6 step 3).
pub trait Record: fmt::Debug {
    fn type_name(&self) -> &str;
    fn field(&self, name: &str) -> Option<Value>;
    fn method(&self, name: &str) -> Option<Callable>;
}

/// A callable value: a native function, or a [`Record`]'s bound method.
/// Spec.md §4.6's arity-1/arity-2-with-error/arity-2-with-bool collapses
/// naturally onto `Result`.
pub type Callable = Rc<dyn Fn(&[Value]) -> Result<Value, String>>;

#[derive(Clone)]
pub enum Value {
    Nil,
    Bool(bool),
    Number(f64),
    String(String),
    Array(Vec<Value>),
    Map(OrderedMap),
    Record(Rc<dyn Record>),
    Callable(Callable),
    /// A once-receiver, modeling the Go original's channel-receive case.
    Receiver(Rc<std::cell::RefCell<Option<Value>>>),
    Ref(Rc<Value>),

    // Internal AST carriers produced by the bootstrap and template-grammar
    // handlers (see SPEC_FULL.md [MODULE] value) — these never appear in
    // template-rendered data, only as intermediate results while a
    // `Converter` builds up `Expression`/`Rule`/`Grammar`/`TemplateNode`/`Key`
    // values out of a rule's `ResultSeq`.
    Expression(Rc<Expression>),
    Rule(Rc<Rule>),
    Grammar(Rc<Grammar>),
    TemplateNode(Rc<TemplateNode>),
    Key(Rc<Key>),
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "Nil"),
            Value::Bool(b) => write!(f, "Bool({b})"),
            Value::Number(n) => write!(f, "Number({n})"),
            Value::String(s) => write!(f, "String({s:?})"),
            Value::Array(a) => write!(f, "Array({a:?})"),
            Value::Map(m) => write!(f, "Map({:?})", m.iter().collect::<Vec<_>>()),
            Value::Record(r) => write!(f, "Record({})", r.type_name()),
            Value::Callable(_) => write!(f, "Callable"),
            Value::Receiver(_) => write!(f, "Receiver"),
            Value::Ref(v) => write!(f, "Ref({v:?})"),
            Value::Expression(e) => write!(f, "Expression({e:?})"),
            Value::Rule(r) => write!(f, "Rule({})", r.name),
            Value::Grammar(_) => write!(f, "Grammar"),
            Value::TemplateNode(t) => write!(f, "TemplateNode({t:?})"),
            Value::Key(k) => write!(f, "Key({k:?})"),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            (Value::Ref(a), Value::Ref(b)) => a == b,
            _ => false,
        }
    }
}

impl Value {
    pub fn string(s: impl Into<String>) -> Value {
        Value::String(s.into())
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_expression(&self) -> Option<Rc<Expression>> {
        match self {
            Value::Expression(e) => Some(e.clone()),
            _ => None,
        }
    }

    pub fn as_rule(&self) -> Option<Rc<Rule>> {
        match self {
            Value::Rule(r) => Some(r.clone()),
            _ => None,
        }
    }

    pub fn as_key(&self) -> Option<Rc<Key>> {
        match self {
            Value::Key(k) => Some(k.clone()),
            _ => None,
        }
    }

    pub fn as_template_node(&self) -> Option<Rc<TemplateNode>> {
        match self {
            Value::TemplateNode(t) => Some(t.clone()),
            _ => None,
        }
    }

    pub fn as_grammar(&self) -> Option<Rc<Grammar>> {
        match self {
            Value::Grammar(g) => Some(g.clone()),
            _ => None,
        }
    }
}

/// `get(data, name)` — spec.md §4.6 step-by-step lookup.
pub fn get(data: &Value, name: &str) -> Option<Value> {
    match data {
        Value::Map(m) => m.get(name).cloned(),
        Value::Array(a) => name.parse::<usize>().ok().and_then(|i| a.get(i).cloned()),
        Value::Record(r) => r
            .field(name)
            .or_else(|| r.method(name).map(Value::Callable)),
        Value::Ref(inner) => get(inner, name),
        _ => None,
    }
}

/// `truthy(data)` — spec.md §4.5 "Truthiness".
pub fn truthy(data: &Value) -> bool {
    match data {
        Value::Nil => false,
        Value::Bool(b) => *b,
        Value::Number(n) => *n != 0.0,
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Map(m) => !m.is_empty(),
        Value::Ref(inner) => truthy(inner),
        _ => true,
    }
}

fn stringify_for_call(data: &Value) -> Option<String> {
    match data {
        Value::Nil => None,
        Value::String(s) => Some(s.clone()),
        other => Some(to_display_string(other)),
    }
}

/// `call(data, args)` — spec.md §4.6.
pub fn call(data: &Value, args: &[Value]) -> Option<Value> {
    if let Value::Callable(f) = data {
        return f(args).ok();
    }
    if args.is_empty() {
        if let Value::Receiver(cell) = data {
            return cell.borrow_mut().take();
        }
        return Some(data.clone());
    }
    let name = stringify_for_call(&args[0])?;
    if name.is_empty() {
        return None;
    }
    let next = get(data, &name)?;
    call(&next, &args[1..])
}

/// `iter(data)` — spec.md §4.6. Structured records are explicitly not
/// iterable (sections must see whole records as single items).
pub fn iter(data: &Value) -> Option<Vec<(Value, Value)>> {
    match data {
        Value::Map(m) => Some(
            m.iter()
                .map(|(k, v)| (Value::String(k.to_string()), v.clone()))
                .collect(),
        ),
        Value::Array(a) => Some(
            a.iter()
                .enumerate()
                .map(|(i, v)| (Value::Number(i as f64), v.clone()))
                .collect(),
        ),
        Value::Ref(inner) => iter(inner),
        _ => None,
    }
}

/// The language's default value-to-string conversion (spec.md §4.5
/// "Reference"), used whenever a resolved value isn't already a string.
pub fn to_display_string(value: &Value) -> String {
    match value {
        Value::Nil => "nil".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => {
            if n.fract() == 0.0 && n.abs() < 1e15 {
                format!("{}", *n as i64)
            } else {
                n.to_string()
            }
        }
        Value::String(s) => s.clone(),
        Value::Array(a) => {
            let items: Vec<String> = a.iter().map(to_display_string).collect();
            format!("[{}]", items.join(" "))
        }
        Value::Map(m) => {
            let items: Vec<String> = m
                .iter()
                .map(|(k, v)| format!("{}:{}", k, to_display_string(v)))
                .collect();
            format!("map[{}]", items.join(" "))
        }
        Value::Record(r) => format!("<{}>", r.type_name()),
        Value::Callable(_) => "<callable>".to_string(),
        Value::Receiver(_) => "<receiver>".to_string(),
        Value::Ref(v) => to_display_string(v),
        Value::Expression(e) => format!("{e}"),
        Value::Rule(r) => format!("{r}"),
        Value::Grammar(g) => format!("{g}"),
        Value::TemplateNode(_) => "<template>".to_string(),
        Value::Key(k) => format!("{k}"),
    }
}
