use logos::Logos;
use std::fmt;

use crate::Span;

// Boundaries fall around every paren and quote mark; everything else is split
// on whitespace. Every non-whitespace character matches some rule, so lexing
// never fails.
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"\s+")]
pub enum TokenKind {
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("'")]
    Quote,
    #[regex(r";[^\s()']*", |lex| lex.slice().to_string())]
    Comment(String),
    // Numbers, symbols and string-literal fragments: the parser decides which.
    #[regex(r"[^\s()';][^\s()']*", |lex| lex.slice().to_string())]
    Bareword(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
    /// True when a line break separates this token from the previous one.
    /// Line comments run until the next such token.
    pub newline_before: bool,
}

impl Token {
    /// The source text of the token.
    pub fn text(&self) -> &str {
        match &self.kind {
            TokenKind::LParen => "(",
            TokenKind::RParen => ")",
            TokenKind::Quote => "'",
            TokenKind::Comment(s) | TokenKind::Bareword(s) => s,
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::LParen => write!(f, "("),
            TokenKind::RParen => write!(f, ")"),
            TokenKind::Quote => write!(f, "'"),
            TokenKind::Comment(s) => write!(f, "{}", s),
            TokenKind::Bareword(s) => write!(f, "{}", s),
        }
    }
}

// Helper function to tokenize a string directly (useful for tests and parser)
pub fn tokenize(input: &str) -> Vec<Token> {
    let mut previous_end = 0;
    TokenKind::lexer(input)
        .spanned()
        .map(|(result, range)| {
            let newline_before = input[previous_end..range.start].contains('\n');
            previous_end = range.end;
            // The rules cover every non-whitespace character; keep the raw
            // slice as a bareword should logos ever disagree.
            let kind = result.unwrap_or_else(|()| TokenKind::Bareword(input[range.clone()].to_string()));
            Token {
                kind,
                span: Span {
                    start: range.start,
                    end: range.end,
                },
                newline_before,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    // Helper to simplify testing token sequences
    fn assert_tokens(input: &str, expected: Vec<TokenKind>) {
        let kinds: Vec<TokenKind> = tokenize(input).into_iter().map(|t| t.kind).collect();
        assert_eq!(kinds, expected, "Input: '{}'", input);
    }

    fn word(s: &str) -> TokenKind {
        TokenKind::Bareword(s.to_string())
    }

    fn comment(s: &str) -> TokenKind {
        TokenKind::Comment(s.to_string())
    }

    #[test]
    fn test_empty_input() {
        assert_tokens("", vec![]);
        assert_tokens("  \n\t ", vec![]);
    }

    #[test]
    fn test_parentheses_and_quote() {
        assert_tokens("()", vec![TokenKind::LParen, TokenKind::RParen]);
        assert_tokens("( )", vec![TokenKind::LParen, TokenKind::RParen]);
        assert_tokens(" ' ", vec![TokenKind::Quote]);
        assert_tokens(
            "(')",
            vec![TokenKind::LParen, TokenKind::Quote, TokenKind::RParen],
        );
        assert_tokens(
            "'(a b)",
            vec![
                TokenKind::Quote,
                TokenKind::LParen,
                word("a"),
                word("b"),
                TokenKind::RParen,
            ],
        );
    }

    #[test]
    fn test_boundaries_without_whitespace() {
        assert_tokens(
            "(f(g))",
            vec![
                TokenKind::LParen,
                word("f"),
                TokenKind::LParen,
                word("g"),
                TokenKind::RParen,
                TokenKind::RParen,
            ],
        );
        assert_tokens("don't", vec![word("don"), TokenKind::Quote, word("t")]);
    }

    #[test]
    fn test_barewords() {
        assert_tokens("123", vec![word("123")]);
        assert_tokens("-4.5", vec![word("-4.5")]);
        assert_tokens("set!", vec![word("set!")]);
        assert_tokens("<=", vec![word("<=")]);
        assert_tokens("make-adder", vec![word("make-adder")]);
        assert_tokens("🍕+☕", vec![word("🍕+☕")]);
        assert_tokens("#t", vec![word("#t")]);
    }

    #[test]
    fn test_string_fragments() {
        // String literals are re-assembled by the parser.
        assert_tokens(
            r#"(display "hello world")"#,
            vec![
                TokenKind::LParen,
                word("display"),
                word("\"hello"),
                word("world\""),
                TokenKind::RParen,
            ],
        );
    }

    #[test]
    fn test_comments() {
        assert_tokens(
            "(define x 10) ; Define x",
            vec![
                TokenKind::LParen,
                word("define"),
                word("x"),
                word("10"),
                TokenKind::RParen,
                comment(";"),
                word("Define"),
                word("x"),
            ],
        );
        assert_tokens(";note", vec![comment(";note")]);
        assert_tokens("a;b", vec![word("a;b")]);
    }

    #[test]
    fn test_newline_before() {
        let tokens = tokenize("; comment here\n(+ 1\n 2)");
        let flags: Vec<bool> = tokens.iter().map(|t| t.newline_before).collect();
        assert_eq!(
            flags,
            vec![false, false, false, true, false, false, true, false]
        );
    }

    #[test]
    fn test_token_text() {
        let texts: Vec<String> = tokenize("('x ;c)")
            .iter()
            .map(|t| t.text().to_string())
            .collect();
        assert_eq!(texts, vec!["(", "'", "x", ";c", ")"]);
    }

    #[test]
    fn test_tokenize_spans() {
        let input = "(+ 1)";
        let tokens = tokenize(input);

        assert_eq!(tokens.len(), 4);
        assert_eq!(tokens[0].span, Span { start: 0, end: 1 });
        assert_eq!(tokens[1].span, Span { start: 1, end: 2 });
        assert_eq!(tokens[2].span, Span { start: 3, end: 4 });
        assert_eq!(tokens[3].span, Span { start: 4, end: 5 });
    }
}
