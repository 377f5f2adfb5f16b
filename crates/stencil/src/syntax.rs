//! Configurable template syntax.
//!
//! Three recognizers drive the lexer: a directive-line regex (two capture
//! groups: name, remainder), a comment-line regex, and the start/end
//! markers that delimit embedded expressions inside content. Any subset can
//! be overridden per compile; the process-wide default is built once and
//! never mutated.

use once_cell::sync::Lazy;
use regex::Regex;

static DEFAULT_COMMAND: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*@(\w+)(.*)$").expect("default command pattern"));
static DEFAULT_COMMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*##").expect("default comment pattern"));

/// The syntax configuration for one compilation.
///
/// # Example
///
/// ```rust
/// use stencil::Syntax;
///
/// // `%if` directives, `//` comments, `{{ }}` expressions:
/// let syntax = Syntax::new()
///     .command(r"^\s*%(\w+)(.*)").unwrap()
///     .comment(r"^\s*//").unwrap()
///     .markers("{{", "}}");
/// ```
#[derive(Debug, Clone)]
pub struct Syntax {
    command: Regex,
    comment: Regex,
    start: String,
    end: String,
}

impl Syntax {
    /// The default syntax: `@name` directives, `##` comments, `{` `}`
    /// expression markers.
    pub fn new() -> Self {
        Syntax {
            command: DEFAULT_COMMAND.clone(),
            comment: DEFAULT_COMMENT.clone(),
            start: "{".to_string(),
            end: "}".to_string(),
        }
    }

    /// Replaces the directive-line pattern. The regex must expose the
    /// directive name as capture group 1 and the raw argument text as
    /// capture group 2.
    pub fn command(mut self, pattern: &str) -> Result<Self, regex::Error> {
        self.command = Regex::new(pattern)?;
        Ok(self)
    }

    /// Replaces the comment-line pattern. Matching lines are dropped
    /// entirely: no output, no code.
    pub fn comment(mut self, pattern: &str) -> Result<Self, regex::Error> {
        self.comment = Regex::new(pattern)?;
        Ok(self)
    }

    /// Replaces the expression start/end markers.
    pub fn markers(mut self, start: &str, end: &str) -> Self {
        self.start = start.to_string();
        self.end = end.to_string();
        self
    }

    pub(crate) fn expr_start(&self) -> &str {
        &self.start
    }

    pub(crate) fn expr_end(&self) -> &str {
        &self.end
    }

    pub(crate) fn is_comment(&self, line: &str) -> bool {
        self.comment.is_match(line)
    }

    /// Matches a directive line, returning the directive name and its raw
    /// argument string.
    pub(crate) fn match_directive<'l>(&self, line: &'l str) -> Option<(&'l str, &'l str)> {
        let caps = self.command.captures(line)?;
        let name = caps.get(1)?.as_str();
        let rest = caps.get(2).map(|m| m.as_str()).unwrap_or("");
        Some((name, rest))
    }
}

impl Default for Syntax {
    fn default() -> Self {
        Self::new()
    }
}
