//! Line splitter and classifier.
//!
//! Splits raw template text into numbered physical lines and classifies
//! each one against the active [`Syntax`]: comment lines are dropped,
//! directive lines carry a name plus raw argument text, everything else is
//! content. Indentation of a directive line has no meaning — nesting is
//! driven purely by open/`end` pairs — while content-line whitespace is
//! preserved verbatim unless strip mode is on.

use crate::syntax::Syntax;

/// One physical line of a template.
#[derive(Debug, Clone)]
pub(crate) struct LineRecord {
    /// 1-based line number within its source file.
    pub line: u32,
    pub kind: LineKind,
    /// The original line text, kept for raw capture (`quote`, `code`).
    pub raw: String,
    /// Whether the line was terminated by a newline in the source. The last
    /// line of a file may not be, and literal passthrough must respect that.
    pub newline: bool,
}

#[derive(Debug, Clone)]
pub(crate) enum LineKind {
    Content,
    Directive { name: String, arg: String },
    Comment,
}

/// Splits and classifies an entire source. The trailing empty string a
/// final newline produces is not a line.
pub(crate) fn split_lines(source: &str, syntax: &Syntax) -> Vec<LineRecord> {
    let mut records = Vec::new();
    let mut rest = source;
    let mut line_no: u32 = 1;

    while !rest.is_empty() {
        let (text, newline, remainder) = match rest.find('\n') {
            Some(pos) => (&rest[..pos], true, &rest[pos + 1..]),
            None => (rest, false, ""),
        };
        records.push(classify(text, line_no, newline, syntax));
        rest = remainder;
        line_no += 1;
    }

    records
}

fn classify(text: &str, line: u32, newline: bool, syntax: &Syntax) -> LineRecord {
    let kind = if syntax.is_comment(text) {
        LineKind::Comment
    } else if let Some((name, arg)) = syntax.match_directive(text) {
        LineKind::Directive {
            name: name.to_string(),
            arg: arg.to_string(),
        }
    } else {
        LineKind::Content
    };
    LineRecord {
        line,
        kind,
        raw: text.to_string(),
        newline,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification_order() {
        let syntax = Syntax::new();
        let records = split_lines("plain\n  @if aa\n## note\n", &syntax);
        assert_eq!(records.len(), 3);
        assert!(matches!(records[0].kind, LineKind::Content));
        assert_eq!(records[1].raw, "  @if aa");
        assert!(matches!(
            &records[1].kind,
            LineKind::Directive { name, .. } if name == "if"
        ));
        assert!(matches!(records[2].kind, LineKind::Comment));
    }

    #[test]
    fn test_line_numbers_are_one_based() {
        let syntax = Syntax::new();
        let records = split_lines("a\nb\nc", &syntax);
        assert_eq!(records[0].line, 1);
        assert_eq!(records[2].line, 3);
        assert!(!records[2].newline);
        assert!(records[0].newline);
    }

    #[test]
    fn test_empty_source() {
        let syntax = Syntax::new();
        assert!(split_lines("", &syntax).is_empty());
    }
}
