//! Logical line reader.
//!
//! Physical lines ending in `\` continue onto the next one. The joined text
//! keeps a newline at each join so multi-line instructions and inline schemas
//! keep their shape. Full-line `#` comments and blank lines are skipped, also
//! in the middle of a continuation.

use std::iter::Enumerate;
use std::str::Lines;

/// One instruction, possibly spanning several physical lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogicalLine {
    /// 1-based number of the first physical line.
    pub number: usize,
    pub text: String,
}

impl LogicalLine {
    /// Split into the leading keyword and the remaining argument text.
    pub fn split_keyword(&self) -> (&str, &str) {
        match self.text.find(char::is_whitespace) {
            Some(idx) => (&self.text[..idx], self.text[idx..].trim()),
            None => (self.text.as_str(), ""),
        }
    }
}

/// Lazy iterator over the logical lines of a document.
pub struct LogicalLines<'a> {
    inner: Enumerate<Lines<'a>>,
}

impl<'a> LogicalLines<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            inner: source.lines().enumerate(),
        }
    }
}

impl Iterator for LogicalLines<'_> {
    type Item = LogicalLine;

    fn next(&mut self) -> Option<LogicalLine> {
        let mut pending: Option<(usize, String)> = None;
        for (idx, raw) in self.inner.by_ref() {
            let trimmed = raw.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let (body, continues) = match raw.trim_end().strip_suffix('\\') {
                Some(body) => (body, true),
                None => (raw, false),
            };
            let (_, text) = pending.get_or_insert_with(|| (idx + 1, String::new()));
            if !text.is_empty() {
                text.push('\n');
            }
            text.push_str(body);
            if continues {
                continue;
            }
            if let Some(line) = pending.take().and_then(finish) {
                return Some(line);
            }
        }
        // A trailing continuation marker at end of input closes the line.
        pending.and_then(finish)
    }
}

fn finish((number, text): (usize, String)) -> Option<LogicalLine> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    Some(LogicalLine {
        number,
        text: text.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(src: &str) -> Vec<(usize, String)> {
        LogicalLines::new(src).map(|l| (l.number, l.text)).collect()
    }

    #[test]
    fn skips_comments_and_blank_lines() {
        let src = "# header\n\nFROM base\n   # indented comment\nMODEL gpt-4.1\n";
        assert_eq!(
            collect(src),
            vec![(3, "FROM base".to_string()), (5, "MODEL gpt-4.1".to_string())]
        );
    }

    #[test]
    fn joins_continuations_with_newlines() {
        let src = "INSTRUCTION first \\\n  second \\\n# dropped\n  third\nEND\n";
        assert_eq!(
            collect(src),
            vec![
                (1, "INSTRUCTION first \n  second \n  third".to_string()),
                (5, "END".to_string()),
            ]
        );
    }

    #[test]
    fn dangling_continuation_at_eof() {
        assert_eq!(collect("RUN echo \\"), vec![(1, "RUN echo".to_string())]);
        assert!(collect("\\\n").is_empty());
    }

    #[test]
    fn keyword_split() {
        let line = LogicalLine {
            number: 1,
            text: "AGENT\thelper  ".trim().to_string(),
        };
        assert_eq!(line.split_keyword(), ("AGENT", "helper"));
        let bare = LogicalLine {
            number: 2,
            text: "END".to_string(),
        };
        assert_eq!(bare.split_keyword(), ("END", ""));
    }

    #[test]
    fn restartable_by_reparsing() {
        let src = "FROM a\nFROM b\n";
        assert_eq!(collect(src), collect(src));
    }
}
