//! Anchor-based line tokenizer
//!
//! A [`Pattern`] is an ordered list of [`Anchor`] tokens. Extraction walks the
//! line left to right; each anchor contributes two captures (the text before
//! it, then the anchor itself) and the tail after the last anchor is the final
//! capture. `N` anchors therefore always yield `2N + 1` captures.
//!
//! ```text
//! "CAP_LOG : P=12 T=3"  with  ["CAP_LOG : ", "P=", " T="]
//!
//!   ""  "CAP_LOG : "  ""  "P="  "12"  " T="  "3"
//! ```

/// One token to find in a line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Anchor {
    pub token: &'static str,
    /// Must appear exactly at the current position
    pub must_be_at_start: bool,
    /// A miss yields two empty captures instead of failing
    pub optional: bool,
}

impl Anchor {
    #[must_use]
    pub const fn new(token: &'static str) -> Self {
        Self { token, must_be_at_start: false, optional: false }
    }

    #[must_use]
    pub const fn at_start(token: &'static str) -> Self {
        Self { token, must_be_at_start: true, optional: false }
    }

    #[must_use]
    pub const fn optional(self) -> Self {
        Self { optional: true, ..self }
    }
}

/// Ordered anchors describing one line shape
#[derive(Debug, Clone, Copy)]
pub struct Pattern {
    anchors: &'static [Anchor],
}

impl Pattern {
    #[must_use]
    pub const fn new(anchors: &'static [Anchor]) -> Self {
        Self { anchors }
    }

    #[must_use]
    pub fn anchor_count(&self) -> usize {
        self.anchors.len()
    }

    /// Split `input` on this pattern's anchors.
    ///
    /// Returns `None` when a required anchor is missing.
    #[must_use]
    pub fn extract<'t>(&self, input: &'t str) -> Option<Captures<'t>> {
        let mut parts = Vec::with_capacity(self.anchors.len() * 2 + 1);
        let mut pos = 0;

        for anchor in self.anchors {
            let rest = &input[pos..];
            let found = if anchor.must_be_at_start {
                rest.starts_with(anchor.token).then_some(0)
            } else {
                rest.find(anchor.token)
            };

            match found {
                Some(at) => {
                    let token_end = at + anchor.token.len();
                    parts.push(&rest[..at]);
                    parts.push(&rest[at..token_end]);
                    pos += token_end;
                }
                None if anchor.optional => {
                    parts.push("");
                    parts.push("");
                }
                None => return None,
            }
        }

        parts.push(&input[pos..]);
        Some(Captures { parts })
    }
}

/// Result of [`Pattern::extract`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Captures<'t> {
    parts: Vec<&'t str>,
}

impl<'t> Captures<'t> {
    /// Raw capture by position (`0..2N+1`)
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&'t str> {
        self.parts.get(index).copied()
    }

    /// Text immediately before anchor `anchor`
    #[must_use]
    pub fn before(&self, anchor: usize) -> &'t str {
        self.parts.get(anchor * 2).copied().unwrap_or_default()
    }

    /// Whether anchor `anchor` was found (optional anchors may be empty)
    #[must_use]
    pub fn matched(&self, anchor: usize) -> bool {
        self.parts.get(anchor * 2 + 1).is_some_and(|s| !s.is_empty())
    }

    /// Text after the last anchor
    #[must_use]
    pub fn tail(&self) -> &'t str {
        self.parts.last().copied().unwrap_or_default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.parts.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }
}
