//! Replacement template parsing and expansion.

use regex::Captures;

/// A replacement template parsed into literal runs and capture references.
///
/// `$N` (one or more decimal digits, 1-indexed) expands to capture group `N`
/// of the current occurrence. A group that did not participate in the match
/// expands to the empty string. Everything else is copied through verbatim,
/// including a `$` not followed by a digit and the non-reference `$0`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplacementTemplate {
    segments: Vec<Segment>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Group(usize),
}

impl ReplacementTemplate {
    /// Parse template text. Parsing never fails: unrecognized `$` sequences
    /// stay literal, and a group index beyond the pattern's group count
    /// simply expands to nothing.
    pub fn parse(text: &str) -> Self {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut rest = text;

        while let Some(dollar) = rest.find('$') {
            literal.push_str(&rest[..dollar]);
            let after = &rest[dollar + 1..];
            let digits = after.len() - after.trim_start_matches(|c: char| c.is_ascii_digit()).len();
            if digits == 0 {
                literal.push('$');
                rest = after;
            } else {
                // References are 1-indexed, so an all-zero index is literal
                // text. An index too large to represent can never participate
                // in a match; it expands to the empty string like any absent
                // group.
                let group: usize = after[..digits].parse().unwrap_or(usize::MAX);
                if group == 0 {
                    literal.push('$');
                    literal.push_str(&after[..digits]);
                } else {
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Segment::Group(group));
                }
                rest = &after[digits..];
            }
        }
        literal.push_str(rest);
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Self { segments }
    }

    /// Expand the template against the capture groups of one occurrence.
    pub fn expand(&self, caps: &Captures<'_>) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Group(index) => {
                    if let Some(m) = caps.get(*index) {
                        out.push_str(m.as_str());
                    }
                }
            }
        }
        out
    }
}
