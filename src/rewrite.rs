//! Compiled rewrite rule: pattern matching plus replacement expansion.

use std::borrow::Cow;

use regex::{Captures, Regex};

use crate::config::{ConfigError, RewriteConfig};
use crate::template::ReplacementTemplate;

/// The runtime form of a [`RewriteConfig`].
///
/// Compiled once per filter instance and then only ever borrowed immutably,
/// so any number of concurrent sessions can apply it without coordination.
#[derive(Debug)]
pub struct RewriteRule {
    pattern: Regex,
    template: ReplacementTemplate,
}

impl RewriteRule {
    /// Compile the pattern and parse the replacement template.
    pub fn compile(config: &RewriteConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            pattern: Regex::new(&config.pattern)?,
            template: ReplacementTemplate::parse(&config.replacement),
        })
    }

    /// Rewrite every non-overlapping occurrence of the pattern in `input`,
    /// scanning left to right. Returns the input unchanged when the pattern
    /// matches nowhere.
    pub fn apply<'a>(&self, input: &'a str) -> Cow<'a, str> {
        self.pattern
            .replace_all(input, |caps: &Captures<'_>| self.template.expand(caps))
    }

    /// Source text of the compiled pattern, for diagnostics.
    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }
}
