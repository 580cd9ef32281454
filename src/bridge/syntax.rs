//! Lexical Python syntax check
//!
//! Catches the structural errors that make a script fail before any line of
//! it runs: unterminated strings, unbalanced brackets and broken
//! indentation. Grammar-level errors (`x = = 1`) are left to the host.

use std::fmt;

/// First structural problem found in a script
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxIssue {
    /// 1-based line number
    pub line: usize,
    pub message: String,
}

impl SyntaxIssue {
    fn new(line: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            message: message.into(),
        }
    }
}

impl fmt::Display for SyntaxIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (line {})", self.message, self.line)
    }
}

/// Check a script, returning the first issue found
pub fn check(source: &str) -> Result<(), SyntaxIssue> {
    Lexer::new(source).run()
}

const TAB_WIDTH: usize = 8;

struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    /// Open brackets with the line they were opened on
    brackets: Vec<(char, usize)>,
    /// Indentation columns of enclosing blocks, never empty
    indents: Vec<usize>,
    /// Line of a block header still waiting for its indented body
    expect_block: Option<usize>,
    /// Last significant character of the current logical line
    last_token: Option<char>,
    /// Previous physical line ended with a backslash
    continued: bool,
}

impl Lexer {
    fn new(source: &str) -> Self {
        Self {
            chars: source.chars().collect(),
            pos: 0,
            line: 1,
            brackets: Vec::new(),
            indents: vec![0],
            expect_block: None,
            last_token: None,
            continued: false,
        }
    }

    fn peek(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn run(mut self) -> Result<(), SyntaxIssue> {
        let mut at_line_start = true;

        while self.pos < self.chars.len() {
            if at_line_start {
                at_line_start = false;
                if self.continued {
                    self.continued = false;
                } else if self.brackets.is_empty() {
                    self.indentation()?;
                    continue;
                }
            }

            let c = self.chars[self.pos];
            match c {
                '\n' => {
                    self.pos += 1;
                    self.end_physical_line();
                    at_line_start = true;
                }
                '#' => {
                    while self.peek(0).map_or(false, |c| c != '\n') {
                        self.pos += 1;
                    }
                }
                '\\' => match (self.peek(1), self.peek(2)) {
                    (Some('\n'), _) => {
                        self.pos += 2;
                        self.line += 1;
                        self.continued = true;
                        at_line_start = true;
                    }
                    (Some('\r'), Some('\n')) => {
                        self.pos += 3;
                        self.line += 1;
                        self.continued = true;
                        at_line_start = true;
                    }
                    (None, _) => {
                        return Err(SyntaxIssue::new(self.line, "unexpected EOF after line continuation"));
                    }
                    _ => {
                        return Err(SyntaxIssue::new(
                            self.line,
                            "unexpected character after line continuation character",
                        ));
                    }
                },
                '\'' | '"' => self.string(c)?,
                '(' | '[' | '{' => {
                    self.brackets.push((c, self.line));
                    self.last_token = Some(c);
                    self.pos += 1;
                }
                ')' | ']' | '}' => {
                    self.close_bracket(c)?;
                    self.last_token = Some(c);
                    self.pos += 1;
                }
                c if c.is_alphabetic() || c == '_' => self.identifier()?,
                c if c.is_whitespace() => self.pos += 1,
                c => {
                    self.last_token = Some(c);
                    self.pos += 1;
                }
            }
        }

        self.finish()
    }

    /// Measure leading whitespace and apply block rules. Blank and
    /// comment-only lines do not take part in indentation.
    fn indentation(&mut self) -> Result<(), SyntaxIssue> {
        let mut column = 0;
        while let Some(c) = self.peek(0) {
            match c {
                ' ' => column += 1,
                '\t' => column = (column / TAB_WIDTH + 1) * TAB_WIDTH,
                '\x0c' | '\r' => {}
                _ => break,
            }
            self.pos += 1;
        }

        match self.peek(0) {
            None | Some('\n') | Some('#') => return Ok(()),
            _ => {}
        }

        let top = self.indents.last().copied().unwrap_or(0);

        if let Some(header) = self.expect_block.take() {
            if column <= top {
                return Err(SyntaxIssue::new(
                    self.line,
                    format!("expected an indented block after line {}", header),
                ));
            }
            self.indents.push(column);
        } else if column > top {
            return Err(SyntaxIssue::new(self.line, "unexpected indent"));
        } else if column < top {
            while self.indents.last().map_or(false, |&level| level > column) {
                self.indents.pop();
            }
            if self.indents.last().copied().unwrap_or(0) != column {
                return Err(SyntaxIssue::new(
                    self.line,
                    "unindent does not match any outer indentation level",
                ));
            }
        }

        Ok(())
    }

    fn end_physical_line(&mut self) {
        if self.brackets.is_empty() {
            if self.last_token == Some(':') {
                self.expect_block = Some(self.line);
            }
            self.last_token = None;
        }
        self.line += 1;
    }

    fn close_bracket(&mut self, close: char) -> Result<(), SyntaxIssue> {
        let expected_open = match close {
            ')' => '(',
            ']' => '[',
            _ => '{',
        };

        match self.brackets.pop() {
            None => Err(SyntaxIssue::new(self.line, format!("unmatched '{}'", close))),
            Some((open, _)) if open == expected_open => Ok(()),
            Some((open, opened_at)) => Err(SyntaxIssue::new(
                self.line,
                format!(
                    "closing parenthesis '{}' does not match opening parenthesis '{}' on line {}",
                    close, open, opened_at
                ),
            )),
        }
    }

    /// Consume an identifier; a short run of prefix letters directly
    /// followed by a quote starts a string literal.
    fn identifier(&mut self) -> Result<(), SyntaxIssue> {
        let start = self.pos;
        while self
            .peek(0)
            .map_or(false, |c| c.is_alphanumeric() || c == '_')
        {
            self.pos += 1;
        }

        let word: String = self.chars[start..self.pos].iter().collect();
        let is_prefix = word.len() <= 2
            && word
                .chars()
                .all(|c| matches!(c.to_ascii_lowercase(), 'r' | 'b' | 'u' | 'f'));

        match self.peek(0) {
            Some(q @ ('\'' | '"')) if is_prefix => self.string(q),
            _ => {
                self.last_token = Some('a');
                Ok(())
            }
        }
    }

    /// Consume a string literal starting at the opening quote
    fn string(&mut self, quote: char) -> Result<(), SyntaxIssue> {
        let opened_at = self.line;
        let triple = self.peek(1) == Some(quote) && self.peek(2) == Some(quote);
        self.pos += if triple { 3 } else { 1 };

        loop {
            let Some(c) = self.peek(0) else {
                let message = if triple {
                    "unterminated triple-quoted string literal"
                } else {
                    "unterminated string literal"
                };
                return Err(SyntaxIssue::new(opened_at, message));
            };

            match c {
                // A backslash keeps the next character inside the literal,
                // raw strings included.
                '\\' => {
                    if self.peek(1) == Some('\n') {
                        self.line += 1;
                    }
                    self.pos += 2;
                }
                '\n' if !triple => {
                    return Err(SyntaxIssue::new(opened_at, "unterminated string literal"));
                }
                '\n' => {
                    self.line += 1;
                    self.pos += 1;
                }
                c if c == quote => {
                    if !triple {
                        self.pos += 1;
                        break;
                    }
                    if self.peek(1) == Some(quote) && self.peek(2) == Some(quote) {
                        self.pos += 3;
                        break;
                    }
                    self.pos += 1;
                }
                _ => self.pos += 1,
            }
        }

        self.last_token = Some(quote);
        Ok(())
    }

    fn finish(self) -> Result<(), SyntaxIssue> {
        if let Some(&(open, opened_at)) = self.brackets.first() {
            return Err(SyntaxIssue::new(opened_at, format!("'{}' was never closed", open)));
        }
        if self.continued {
            return Err(SyntaxIssue::new(self.line, "unexpected EOF after line continuation"));
        }
        let header = self
            .expect_block
            .or_else(|| (self.last_token == Some(':')).then_some(self.line));
        if let Some(header) = header {
            return Err(SyntaxIssue::new(
                self.line,
                format!("expected an indented block after line {}", header),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issue(source: &str) -> String {
        check(source).unwrap_err().message
    }

    #[test]
    fn test_accepts_nested_blocks() {
        let source = "\
import clr
def walls(doc):
    for w in collect(doc):
        if w.Name:
            print(w.Name)
        else:
            pass
    return 1

class A:
\tx = 1
";
        assert!(check(source).is_ok());
    }

    #[test]
    fn test_strings_hide_structure() {
        assert!(check("s = '# not a comment ('\nprint(s)").is_ok());
        assert!(check("s = \"it's\"").is_ok());
        assert!(check("s = 'a\\'b'").is_ok());
        assert!(check("s = r'C:\\temp\\new'\nt = 1").is_ok());
        assert!(check("s = b'x' + f\"{y}\"").is_ok());
        assert!(check("doc = \"\"\"\nline ( one\n  line two\n\"\"\"\nx = 1").is_ok());
    }

    #[test]
    fn test_brackets_span_lines() {
        let source = "x = foo(1,\n        2,\n  3)\ny = [\n]\n";
        assert!(check(source).is_ok());
    }

    #[test]
    fn test_backslash_continuation() {
        assert!(check("x = 1 + \\\n        2\ny = 3").is_ok());
        assert!(check("x = 1 \\ 2").is_err());
    }

    #[test]
    fn test_comment_lines_ignore_indentation() {
        assert!(check("if x:\n        # deep comment\n    y = 1\n  \n").is_ok());
    }

    #[test]
    fn test_unterminated_strings() {
        assert_eq!(issue("print('hi)"), "unterminated string literal");
        assert_eq!(issue("x = \"abc\ny = 1"), "unterminated string literal");
        assert_eq!(issue("x = '''abc\n"), "unterminated triple-quoted string literal");
    }

    #[test]
    fn test_bracket_errors() {
        assert_eq!(issue("print('hi'"), "'(' was never closed");
        assert_eq!(issue("x = 1)"), "unmatched ')'");
        assert!(issue("x = [1, 2)").starts_with("closing parenthesis ')'"));
    }

    #[test]
    fn test_indentation_errors() {
        assert_eq!(issue("x = 1\n    y = 2"), "unexpected indent");
        assert_eq!(
            issue("if x:\n        y = 1\n    z = 2"),
            "unindent does not match any outer indentation level"
        );
        assert_eq!(issue("if x:\ny = 1"), "expected an indented block after line 1");
        assert_eq!(issue("for i in xs:"), "expected an indented block after line 1");
        assert_eq!(
            issue("for i in xs:\n    # only a comment\n"),
            "expected an indented block after line 1"
        );
    }

    #[test]
    fn test_issue_reports_line() {
        let err = check("a = 1\nb = 2\nc = (\n").unwrap_err();
        assert_eq!(err.line, 3);
        assert_eq!(err.to_string(), "'(' was never closed (line 3)");
    }
}
