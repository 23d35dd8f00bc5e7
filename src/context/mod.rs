//! The parse context: cursor, memo table, and left-recursion dispatch
//! (spec.md §4.3). Grounded on `original_source/parser/parser.go`'s
//! `ParseContext.Parse` / `applyRule`, which implements Warth et al.'s
//! "growing the seed" algorithm for direct and indirect left recursion.
//! The Go original keys its memo by the `*Grapheme` node pointer itself
//! (each node owns its cache); here the cache is a single flat map keyed by
//! `(Grapheme::pos, rule name)`, since `Grapheme` carries no identity beyond
//! its position (SPEC_FULL.md's Design Decision note for this module).

use std::collections::HashMap;

use log::{debug, trace};

use crate::error::ParseError;
use crate::grammar::Grammar;
use crate::grapheme::Grapheme;
use crate::handler::HandlerRegistry;
use crate::value::Value;

#[derive(Clone)]
struct MemoEntry {
    value: Result<Value, ParseError>,
    end: Option<Grapheme>,
    pending: bool,
    left_recursion_detected: bool,
    /// Rules (keyed by `(position, name)`, as they appear in `rule_stack`)
    /// that re-entered this entry while it was pending (spec.md §3 "Memo
    /// entry"). Every time this entry's seed grows, each of these is evicted
    /// from the memo so it re-evaluates against the new seed.
    pending_path: Vec<(usize, String)>,
}

pub struct ParseContext<'g> {
    current: Grapheme,
    memo: HashMap<(usize, String), MemoEntry>,
    rule_stack: Vec<(usize, String)>,
    grammar: &'g Grammar,
    handlers: &'g HandlerRegistry,
}

impl<'g> ParseContext<'g> {
    pub fn new(input: &str, grammar: &'g Grammar, handlers: &'g HandlerRegistry) -> Self {
        ParseContext {
            current: Grapheme::start(input.to_string()),
            memo: HashMap::new(),
            rule_stack: Vec::new(),
            grammar,
            handlers,
        }
    }

    pub fn current(&self) -> &Grapheme {
        &self.current
    }

    pub fn handlers(&self) -> &HandlerRegistry {
        self.handlers
    }

    pub fn pos(&self) -> usize {
        self.current.pos
    }

    pub fn at_eof(&self) -> bool {
        self.current.is_eof()
    }

    pub fn current_token(&self) -> &str {
        &self.current.token
    }

    /// Saves the cursor; pair with [`Self::reset`] around any combinator
    /// attempt that might need to backtrack.
    pub fn mark(&self) -> Grapheme {
        self.current.clone()
    }

    pub fn reset(&mut self, mark: Grapheme) {
        self.current = mark;
    }

    pub fn advance(&mut self) -> Result<(), ParseError> {
        self.current = self.current.next();
        Ok(())
    }

    pub fn error(&self, expected: &str) -> ParseError {
        ParseError::new(self.current.error(expected))
    }

    /// Collects every frame on `rule_stack` that is nested inside `target`
    /// (i.e. was dispatched after it and hasn't returned yet) — the set that
    /// re-entered `target`'s pending seed and must be reseeded alongside it
    /// (spec.md §3 "Memo entry", §4.3 steps 4-5).
    fn collect_pending_path(&self, target: &(usize, String)) -> Vec<(usize, String)> {
        let mut path = Vec::new();
        for frame in self.rule_stack.iter().rev() {
            if frame == target {
                break;
            }
            path.push(frame.clone());
        }
        path
    }

    /// Resolves a rule reference, growing a left-recursive seed if `name` is
    /// re-entered at the same position while its own evaluation is still in
    /// flight (spec.md §4.3).
    pub fn dispatch(&mut self, name: &str) -> Result<Value, ParseError> {
        let start = self.current.clone();
        let key = (start.pos, name.to_string());

        if let Some(entry) = self.memo.get(&key).cloned() {
            if entry.pending {
                trace!("left recursion detected for {name} at {}", start.pos);
                let path = self.collect_pending_path(&key);
                if let Some(parent_entry) = self.memo.get_mut(&key) {
                    parent_entry.left_recursion_detected = true;
                    for frame in path {
                        if !parent_entry.pending_path.contains(&frame) {
                            parent_entry.pending_path.push(frame);
                        }
                    }
                }
                return match entry.value {
                    Ok(v) => {
                        self.current = entry.end.expect("pending seed carries an end cursor");
                        Ok(v)
                    }
                    Err(e) => Err(e),
                };
            }
            trace!("memo hit for {name} at {}", start.pos);
            self.current = entry.end.expect("completed memo entry carries an end cursor");
            return entry.value;
        }

        trace!("memo miss for {name} at {}, evaluating", start.pos);
        self.memo.insert(
            key.clone(),
            MemoEntry {
                value: Err(ParseError::new(format!(
                    "left recursive rule {name} has no base case"
                ))),
                end: Some(start.clone()),
                pending: true,
                left_recursion_detected: false,
                pending_path: Vec::new(),
            },
        );

        let rule = self
            .grammar
            .get(name)
            .ok_or_else(|| ParseError::new(format!("no such rule: {name}")))?
            .clone();

        self.rule_stack.push(key.clone());
        loop {
            self.current = start.clone();
            let outcome = rule.evaluate(self);
            let detected = self
                .memo
                .get(&key)
                .map(|e| e.left_recursion_detected)
                .unwrap_or(false);

            if !detected {
                self.rule_stack.pop();
                self.memo.remove(&key);
                let result = match &outcome {
                    Ok((value, end)) => {
                        self.current = end.clone();
                        Ok(value.clone())
                    }
                    Err(e) => {
                        self.current = start.clone();
                        Err(e.clone())
                    }
                };
                self.memo.insert(
                    key,
                    MemoEntry {
                        value: result.clone(),
                        end: Some(self.current.clone()),
                        pending: false,
                        left_recursion_detected: false,
                        pending_path: Vec::new(),
                    },
                );
                return result;
            }

            let previous_end = self.memo.get(&key).and_then(|e| e.end.clone());
            let advanced = match (&outcome, &previous_end) {
                (Ok((_, end)), Some(prev)) => end.pos > prev.pos,
                (Ok(_), None) => true,
                (Err(_), _) => false,
            };

            if advanced {
                if let Ok((value, end)) = &outcome {
                    debug!("growing left-recursive seed for {name} to pos {}", end.pos);
                    let pending_path = self
                        .memo
                        .get(&key)
                        .map(|e| e.pending_path.clone())
                        .unwrap_or_default();
                    for frame in &pending_path {
                        trace!("invalidating {} at {} to reseed against grown {name}", frame.1, frame.0);
                        self.memo.remove(frame);
                    }
                    self.memo.insert(
                        key.clone(),
                        MemoEntry {
                            value: Ok(value.clone()),
                            end: Some(end.clone()),
                            pending: true,
                            left_recursion_detected: false,
                            pending_path: Vec::new(),
                        },
                    );
                }
                continue;
            }

            self.rule_stack.pop();
            let finished = self.memo.remove(&key).expect("seed entry was inserted above");
            self.current = finished.end.clone().unwrap_or(start.clone());
            self.memo.insert(
                key,
                MemoEntry {
                    value: finished.value.clone(),
                    end: finished.end.clone(),
                    pending: false,
                    left_recursion_detected: false,
                    pending_path: Vec::new(),
                },
            );
            return finished.value;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::Expression;
    use crate::grammar::{Grammar, Rule};

    #[test]
    fn direct_left_recursion_grows_to_longest_match() {
        // S <- S 'a' / 'a'   on "aaa" should consume all three.
        let mut grammar = Grammar::new();
        grammar.add(Rule::new(
            "S",
            Expression::choice(vec![
                Expression::sequence(vec![Expression::reference("S"), Expression::literal("a")]),
                Expression::literal("a"),
            ]),
        ));
        let handlers = HandlerRegistry::new();
        let mut ctx = ParseContext::new("aaa", &grammar, &handlers);
        ctx.dispatch("S").unwrap();
        assert_eq!(ctx.pos(), 3);
    }

    #[test]
    fn indirect_left_recursion_terminates() {
        // S <- T 'b' / 'a' ;  T <- S 'a' / 'c'   on "aaba" should yield "aab".
        let mut grammar = Grammar::new();
        grammar.add(Rule::new(
            "S",
            Expression::choice(vec![
                Expression::sequence(vec![Expression::reference("T"), Expression::literal("b")]),
                Expression::literal("a"),
            ]),
        ));
        grammar.add(Rule::new(
            "T",
            Expression::choice(vec![
                Expression::sequence(vec![Expression::reference("S"), Expression::literal("a")]),
                Expression::literal("c"),
            ]),
        ));
        let handlers = HandlerRegistry::new();
        let mut ctx = ParseContext::new("aaba", &grammar, &handlers);
        let result = ctx.dispatch("S").unwrap();
        assert_eq!(result, Value::string("aab"));
        assert_eq!(ctx.pos(), 4);
    }

    #[test]
    fn non_left_recursive_rule_memoizes_result() {
        let mut grammar = Grammar::new();
        grammar.add(Rule::new("A", Expression::literal("a")));
        let handlers = HandlerRegistry::new();
        let mut ctx = ParseContext::new("a", &grammar, &handlers);
        let first = ctx.dispatch("A").unwrap();
        ctx.reset(Grapheme::start("a".to_string()));
        let second = ctx.dispatch("A").unwrap();
        assert_eq!(first, second);
    }
}
