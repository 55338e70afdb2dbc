//! Structured message payloads
//!
//! `ObjectClass | id: [0x1] | class: [Foo]` parses into the label
//! `ObjectClass` and the pairs `(id, 0x1)`, `(class, Foo)`. Separators inside
//! `[...]` belong to the value.

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanLine {
    label: String,
    pairs: Vec<(String, String)>,
}

impl ScanLine {
    /// Parse a message; `None` when it has no label.
    #[must_use]
    pub fn parse(message: &str) -> Option<Self> {
        let mut segments = split_segments(message).into_iter();
        let label = segments.next()?.trim();
        if label.is_empty() {
            return None;
        }
        let pairs = segments.map(parse_pair).collect();
        Some(Self { label: label.to_string(), pairs })
    }

    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    #[must_use]
    pub fn key(&self, index: usize) -> Option<&str> {
        self.pairs.get(index).map(|(k, _)| k.as_str())
    }

    #[must_use]
    pub fn value(&self, index: usize) -> Option<&str> {
        self.pairs.get(index).map(|(_, v)| v.as_str())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

fn split_segments(message: &str) -> Vec<&str> {
    let mut segments = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in message.char_indices() {
        match c {
            '[' => depth += 1,
            ']' => depth = depth.saturating_sub(1),
            '|' if depth == 0 => {
                segments.push(&message[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    segments.push(&message[start..]);
    segments
}

fn parse_pair(segment: &str) -> (String, String) {
    let Some((key, value)) = segment.split_once(':') else {
        return (segment.trim().to_string(), String::new());
    };
    let value = value.trim();
    let value = match (value.find('['), value.rfind(']')) {
        (Some(open), Some(close)) if open < close => &value[open + 1..close],
        _ => value,
    };
    (key.trim().to_string(), value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_and_pairs() {
        let scan = ScanLine::parse("ObjectClass | id: [0x1] | class: [Foo]").unwrap();
        assert_eq!(scan.label(), "ObjectClass");
        assert_eq!(scan.len(), 2);
        assert_eq!(scan.key(0), Some("id"));
        assert_eq!(scan.value(0), Some("0x1"));
        assert_eq!(scan.value(1), Some("Foo"));
        assert_eq!(scan.value(2), None);
    }

    #[test]
    fn test_separator_inside_brackets() {
        let scan = ScanLine::parse("Check | expr: [a | b] | n: 3").unwrap();
        assert_eq!(scan.value(0), Some("a | b"));
        assert_eq!(scan.value(1), Some("3"));
    }

    #[test]
    fn test_plain_message_is_label_only() {
        let scan = ScanLine::parse("hello world").unwrap();
        assert_eq!(scan.label(), "hello world");
        assert!(scan.is_empty());
        assert!(ScanLine::parse("  | x: [1]").is_none());
    }
}
