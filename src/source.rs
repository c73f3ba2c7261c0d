use std::fmt;
use std::ops::Range;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)] // Default for values with no source location
pub struct Span {
    pub start: usize, // Byte offset
    pub end: usize,   // Byte offset (exclusive)
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Span { start, end }
    }

    // Helper to merge two spans (e.g., for lists)
    pub fn merge(self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    pub fn to_range(self) -> Range<usize> {
        self.start..self.end
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// How far a chunk of source text is from being a complete set of expressions.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Balance {
    Complete,
    /// More input is needed: an open list or string literal is still pending.
    Incomplete,
    /// A `)` with no matching `(`, at this byte offset.
    Unmatched(usize),
}

fn is_boundary(c: char) -> bool {
    c.is_whitespace() || matches!(c, '(' | ')' | '\'')
}

/// Scans `input` for parenthesis balance, ignoring parens inside string
/// literals and `;` comments. Strings and comments start only at the start
/// of a token, and a string ends at the next `"` that ends a token, the
/// same way the parser reads them.
pub fn balance(input: &str) -> Balance {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut in_comment = false;
    let mut prev: Option<char> = None;
    let mut chars = input.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        let token_start = prev.is_none_or(is_boundary);
        prev = Some(c);
        if in_comment {
            if c == '\n' {
                in_comment = false;
            }
            continue;
        }
        if in_string {
            let token_end = chars.peek().is_none_or(|&(_, next)| is_boundary(next));
            if c == '"' && token_end {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' if token_start => in_string = true,
            ';' if token_start => in_comment = true,
            '(' => depth += 1,
            ')' => {
                if depth == 0 {
                    return Balance::Unmatched(i);
                }
                depth -= 1;
            }
            _ => {}
        }
    }

    if in_string || depth > 0 {
        Balance::Incomplete
    } else {
        Balance::Complete
    }
}

/// Splits a program into chunks of whole lines whose parentheses balance,
/// skipping blank lines between them. A chunk with an unmatched `)` ends at
/// that line; a chunk still open at the end of input is returned as is.
pub fn chunks(input: &str) -> Vec<&str> {
    let mut chunks = Vec::new();
    let mut start: Option<usize> = None;
    let mut offset = 0;

    for line in input.split_inclusive('\n') {
        let line_start = offset;
        offset += line.len();
        let chunk_start = match start {
            Some(chunk_start) => chunk_start,
            None if line.trim().is_empty() => continue,
            None => line_start,
        };
        match balance(&input[chunk_start..offset]) {
            Balance::Incomplete => start = Some(chunk_start),
            Balance::Complete | Balance::Unmatched(_) => {
                chunks.push(input[chunk_start..offset].trim_end());
                start = None;
            }
        }
    }
    if let Some(chunk_start) = start {
        chunks.push(input[chunk_start..].trim_end());
    }
    chunks
}
