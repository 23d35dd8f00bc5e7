//! Converters from a matched rule's [`ResultSeq`] into the [`Value`] that
//! rule produces, registered by rule name (spec.md §9: "a static name→handler
//! table, not reflection"). Mirrors the Go original's `WrapHandler`/
//! `Map2Func` in `original_source/parser/bootstrap.go`, minus the reflective
//! argument-shuffling those two functions exist to paper over — here a
//! handler just takes the `ResultSeq` directly.

use std::collections::HashMap;
use std::rc::Rc;

use crate::error::HandlerError;
use crate::expr::ResultSeq;
use crate::value::Value;

pub type Converter = Rc<dyn Fn(&ResultSeq) -> Result<Value, HandlerError>>;

#[derive(Default, Clone)]
pub struct HandlerRegistry {
    converters: HashMap<String, Converter>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        HandlerRegistry::default()
    }

    pub fn builder() -> HandlerRegistryBuilder {
        HandlerRegistryBuilder::default()
    }

    pub fn get(&self, name: &str) -> Option<&Converter> {
        self.converters.get(name)
    }
}

#[derive(Default)]
pub struct HandlerRegistryBuilder {
    converters: HashMap<String, Converter>,
}

impl HandlerRegistryBuilder {
    pub fn register<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&ResultSeq) -> Result<Value, HandlerError> + 'static,
    {
        self.converters.insert(name.into(), Rc::new(f));
        self
    }

    pub fn build(self) -> HandlerRegistry {
        HandlerRegistry {
            converters: self.converters,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registered_converter_is_found_by_rule_name() {
        let registry = HandlerRegistry::builder()
            .register("Digit", |_: &ResultSeq| Ok(Value::Number(1.0)))
            .build();
        assert!(registry.get("Digit").is_some());
        assert!(registry.get("Missing").is_none());
    }
}
