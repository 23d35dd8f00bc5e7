//! Grapheme-cluster-aware input cursor.
//!
//! A [`Grapheme`] is an immutable value: the user-perceived character at one
//! point in the input, plus the line/column/byte-offset bookkeeping needed to
//! report diagnostics. Unlike the Go original (`parser/grapheme.go`), which
//! chains `*Grapheme` nodes through a `next` pointer because each node also
//! carries a memo cache, this type carries no cache and is plain `Clone`
//! data — the memo cache lives once, in [`crate::context::ParseContext`],
//! keyed by `Grapheme::pos`. See SPEC_FULL.md's Design Decision note.

use std::rc::Rc;

use unicode_segmentation::UnicodeSegmentation;

/// A mandatory line break under UAX #14, restricted to the clusters that can
/// occur as a single grapheme cluster under UAX #29 (CRLF included).
fn is_mandatory_break(token: &str) -> bool {
    matches!(
        token,
        "\n" | "\r\n" | "\r" | "\u{0B}" | "\u{0C}" | "\u{85}" | "\u{2028}" | "\u{2029}"
    )
}

/// One user-perceived character in the input, or the empty-token sentinel at
/// EOF. `source` is shared (cheap clone) across every grapheme derived from
/// the same input string.
#[derive(Clone, Debug)]
pub struct Grapheme {
    source: Rc<str>,
    /// Byte offset into `source` where the *next* grapheme's token begins.
    offset: usize,
    pub token: String,
    pub line: usize,
    pub column: usize,
    pub pos: usize,
}

impl Grapheme {
    /// Builds the first grapheme of `source`. Mirrors `NewGrapheme` in the
    /// Go original: construct the pre-state sentinel, then advance once.
    pub fn start(source: impl Into<Rc<str>>) -> Grapheme {
        let source = source.into();
        let sentinel = Grapheme {
            source,
            offset: 0,
            token: String::new(),
            line: 1,
            column: 0,
            pos: 0,
        };
        sentinel.next()
    }

    /// Advances to the next grapheme. Idempotent once EOF is reached.
    pub fn next(&self) -> Grapheme {
        let remaining = &self.source[self.offset..];
        if remaining.is_empty() {
            if self.token.is_empty() {
                // Already at EOF (or the empty-input sentinel) — stay put.
                return self.clone();
            }
            return Grapheme {
                source: self.source.clone(),
                offset: self.offset,
                token: String::new(),
                line: self.line,
                column: self.column + 1,
                pos: self.pos + 1,
            };
        }
        let was_eol = self.is_eol();
        let cluster = remaining
            .graphemes(true)
            .next()
            .expect("non-empty remainder yields at least one grapheme cluster");
        let new_offset = self.offset + cluster.len();
        let (line, column) = if was_eol {
            (self.line + 1, 1)
        } else {
            (self.line, self.column + 1)
        };
        Grapheme {
            source: self.source.clone(),
            offset: new_offset,
            token: cluster.to_string(),
            line,
            column,
            pos: self.pos + 1,
        }
    }

    pub fn is_eof(&self) -> bool {
        self.token.is_empty()
    }

    pub fn is_eol(&self) -> bool {
        is_mandatory_break(&self.token)
    }

    /// Byte offset in `source` where this grapheme's own token starts.
    fn start_byte(&self) -> usize {
        self.offset - self.token.len()
    }

    /// The substring of the shared source between two graphemes produced
    /// from it, `self` inclusive and `end` exclusive.
    pub fn substring_to(&self, end: &Grapheme) -> String {
        debug_assert!(Rc::ptr_eq(&self.source, &end.source));
        self.source[self.start_byte()..end.start_byte()].to_string()
    }

    fn token_repr(&self) -> String {
        if self.is_eof() {
            "EOF".to_string()
        } else {
            format!("'{}'", self.token)
        }
    }

    pub fn error(&self, expected: &str) -> String {
        format!(
            "at {} {}:{} ({}) expected {}",
            self.token_repr(),
            self.line,
            self.column,
            self.pos,
            expected
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn pos_never_decreases_over_any_input(s in "[a-zA-Z0-9 \n]{0,64}") {
            let bound = s.chars().count() + 3;
            let mut g = Grapheme::start(s);
            for _ in 0..bound {
                let next = g.next();
                prop_assert!(next.pos >= g.pos);
                g = next;
            }
        }
    }

    #[test]
    fn empty_input_is_immediate_eof() {
        let g = Grapheme::start("");
        assert!(g.is_eof());
        assert_eq!(g.pos, 0);
        assert_eq!(g.line, 1);
        assert_eq!(g.column, 0);
        // idempotent
        let g2 = g.next();
        assert_eq!(g2.pos, g.pos);
    }

    #[test]
    fn advances_pos_and_column() {
        let g0 = Grapheme::start("ab");
        assert_eq!(g0.token, "a");
        assert_eq!((g0.line, g0.column, g0.pos), (1, 1, 1));
        let g1 = g0.next();
        assert_eq!(g1.token, "b");
        assert_eq!((g1.line, g1.column, g1.pos), (1, 2, 2));
        let g2 = g1.next();
        assert!(g2.is_eof());
        assert_eq!(g2.pos, 3);
    }

    #[test]
    fn eol_resets_column_and_bumps_line() {
        let g0 = Grapheme::start("a\nb");
        let g1 = g0.next();
        assert_eq!(g1.token, "\n");
        assert!(g1.is_eol());
        let g2 = g1.next();
        assert_eq!(g2.token, "b");
        assert_eq!((g2.line, g2.column), (2, 1));
    }

    #[test]
    fn eof_next_is_idempotent_past_last_char() {
        let mut g = Grapheme::start("a");
        g = g.next(); // EOF, pos=1 -> advances to pos 2 first time
        let first_eof_pos = g.pos;
        let again = g.next();
        assert_eq!(again.pos, first_eof_pos);
    }

    #[test]
    fn grapheme_cluster_counts_as_one_token() {
        // "e\u{0301}" (e + combining acute) is a single grapheme cluster.
        let g0 = Grapheme::start("e\u{0301}x");
        assert_eq!(g0.token, "e\u{0301}");
        let g1 = g0.next();
        assert_eq!(g1.token, "x");
    }

    #[test]
    fn substring_to_matches_consumed_text() {
        let g0 = Grapheme::start("hello");
        let g1 = g0.next().next().next();
        assert_eq!(g0.substring_to(&g1), "he");
    }

    #[test]
    fn error_format_matches_contract() {
        let g = Grapheme::start("x");
        assert_eq!(g.error("digit"), "at 'x' 1:1 (1) expected digit");
        let eof = Grapheme::start("");
        assert_eq!(eof.error("anything"), "at EOF 1:0 (0) expected anything");
    }
}
