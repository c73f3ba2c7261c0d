use crate::Span;
use crate::lexer::{Token, TokenKind, tokenize};
use crate::types::{Node, Number, Sexpr};
use std::fmt;
use std::iter::Peekable;
use std::vec::IntoIter; // To iterate over Vec<Token>
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("Unexpected end of input, expected {expected}")]
    UnexpectedEof { expected: String, span: Span },
    #[error("Unexpected ')' with no matching '('")]
    UnexpectedCloseParen(Span),
    #[error("Unterminated string literal")]
    UnterminatedString(Span),
    #[error("Unexpected token '{found}', expected {expected}")]
    UnexpectedToken { found: Token, expected: String },
    #[error("Invalid lambda: {message}")]
    InvalidLambda { message: String, span: Span },
}

impl ParseError {
    /// Source location the error points at.
    pub fn span(&self) -> Span {
        match self {
            ParseError::UnexpectedEof { span, .. }
            | ParseError::UnexpectedCloseParen(span)
            | ParseError::UnterminatedString(span)
            | ParseError::InvalidLambda { span, .. } => *span,
            ParseError::UnexpectedToken { found, .. } => found.span,
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)
    }
}

// Result type alias for convenience
pub type ParseResult<T> = Result<T, ParseError>;

pub struct Parser {
    // We iterate over owned Tokens, consuming them.
    tokens: Peekable<IntoIter<Token>>,
    // Byte offset just past the last token, for end-of-input errors.
    end: usize,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        let end = tokens.last().map_or(0, |token| token.span.end);
        Parser {
            tokens: tokens.into_iter().peekable(),
            end,
        }
    }

    // Consumes the next token if available.
    fn next_token(&mut self) -> Option<Token> {
        self.tokens.next()
    }

    pub fn is_at_end(&mut self) -> bool {
        self.tokens.peek().is_none()
    }

    fn eof_error(&self, expected: &str) -> ParseError {
        ParseError::UnexpectedEof {
            expected: expected.to_string(),
            span: Span::new(self.end, self.end),
        }
    }

    /// Parses a single S-expression from the token stream.
    /// Returns `None` when the next tokens form a comment.
    pub fn parse_expr(&mut self) -> ParseResult<Option<Node>> {
        match self.next_token() {
            Some(token) => self.parse_expr_with_token(token),
            None => Err(self.eof_error("an expression")),
        }
    }

    fn parse_expr_with_token(&mut self, token: Token) -> ParseResult<Option<Node>> {
        let opens_string =
            matches!(&token.kind, TokenKind::Bareword(text) if text.starts_with('"'));
        if opens_string {
            return self.parse_string(token).map(Some);
        }
        match token.kind {
            TokenKind::LParen => self.parse_list(token.span).map(Some),
            TokenKind::RParen => Err(ParseError::UnexpectedCloseParen(token.span)),
            TokenKind::Quote => self.parse_quoted_expr(token.span).map(Some),
            TokenKind::Comment(_) => {
                self.skip_comment();
                Ok(None)
            }
            TokenKind::Bareword(text) => Ok(Some(parse_atom(text, token.span))),
        }
    }

    /// Parses the next expression, stepping over any comments in the way.
    fn parse_datum(&mut self, expected: &str) -> ParseResult<Node> {
        loop {
            let token = self.next_token().ok_or_else(|| self.eof_error(expected))?;
            if let Some(node) = self.parse_expr_with_token(token)? {
                return Ok(node);
            }
        }
    }

    // A comment runs until the first token on a later line.
    fn skip_comment(&mut self) {
        while self.tokens.next_if(|token| !token.newline_before).is_some() {}
    }

    /// Parses a list expression `(...)`; the `(` is already consumed.
    fn parse_list(&mut self, open_span: Span) -> ParseResult<Node> {
        let mut elements = Vec::new();
        loop {
            match self.next_token() {
                Some(Token {
                    kind: TokenKind::RParen,
                    span: rparen_span,
                    ..
                }) => {
                    let list = Node::new_list(elements, open_span.merge(rparen_span));
                    return check_lambda(list);
                }
                Some(token) => {
                    if let Some(node) = self.parse_expr_with_token(token)? {
                        elements.push(node);
                    }
                }
                None => {
                    // Reached EOF before finding ')'; point at the opening paren
                    return Err(ParseError::UnexpectedEof {
                        expected: "')'".to_string(),
                        span: open_span,
                    });
                }
            }
        }
    }

    /// Parses a quoted expression `'expr`.
    fn parse_quoted_expr(&mut self, quote_span: Span) -> ParseResult<Node> {
        let quoted_expr = self.parse_datum("an expression after '")?;
        Ok(Node::new_quote(quoted_expr, quote_span))
    }

    /// Re-joins tokens with single spaces until one closes the literal, and
    /// produces `(quote "text")`.
    fn parse_string(&mut self, first: Token) -> ParseResult<Node> {
        let mut text = first.text().to_string();
        let mut span = first.span;
        while text.len() < 2 || !text.ends_with('"') {
            let token = self
                .next_token()
                .ok_or(ParseError::UnterminatedString(span))?;
            text.push(' ');
            text.push_str(token.text());
            span = span.merge(token.span);
        }
        let literal = Node::new_string(&text[1..text.len() - 1], span);
        Ok(Node::new_quote(literal, first.span))
    }

    /// Parses exactly one top-level expression. Comments may surround it;
    /// comment-only input gives `None`.
    pub fn parse(mut self) -> ParseResult<Option<Node>> {
        if self.is_at_end() {
            return Err(self.eof_error("an expression"));
        }
        let mut expr = None;
        while let Some(token) = self.next_token() {
            match token.kind {
                // Comments are skipped and a stray ')' reports itself below
                TokenKind::Comment(_) | TokenKind::RParen => {}
                _ if expr.is_some() => {
                    return Err(ParseError::UnexpectedToken {
                        found: token,
                        expected: "end of input".to_string(),
                    });
                }
                _ => {}
            }
            expr = expr.or(self.parse_expr_with_token(token)?);
        }
        Ok(expr)
    }

    /// Parses every top-level expression in order.
    pub fn parse_program(mut self) -> ParseResult<Vec<Node>> {
        let mut expressions = Vec::new();
        while let Some(token) = self.next_token() {
            if let Some(node) = self.parse_expr_with_token(token)? {
                expressions.push(node);
            }
        }
        Ok(expressions)
    }
}

/// Integer first, then float, otherwise a symbol.
fn parse_atom(text: String, span: Span) -> Node {
    match Number::parse(&text) {
        Some(number) => Node::new(Sexpr::Number(number), span),
        None => Node::new_symbol(text, span),
    }
}

/// A list headed by `lambda` must be `(lambda (symbol...) body)`.
fn check_lambda(list: Node) -> ParseResult<Node> {
    if let Sexpr::List(elements) = &list.kind {
        if let [head, rest @ ..] = elements.as_slice() {
            if matches!(&head.kind, Sexpr::Symbol(name) if name == "lambda") {
                match rest {
                    [params, _body] => check_parameters(params)?,
                    _ => {
                        return Err(ParseError::InvalidLambda {
                            message: "expected a parameter list and a single body expression"
                                .to_string(),
                            span: list.span,
                        });
                    }
                }
            }
        }
    }
    Ok(list)
}

fn check_parameters(params: &Node) -> ParseResult<()> {
    match &params.kind {
        Sexpr::List(names) => match names
            .iter()
            .find(|name| !matches!(name.kind, Sexpr::Symbol(_)))
        {
            Some(bad) => Err(ParseError::InvalidLambda {
                message: format!("parameter must be a symbol, found {}", bad),
                span: bad.span,
            }),
            None => Ok(()),
        },
        _ => Err(ParseError::InvalidLambda {
            message: format!("expected a parameter list, found {}", params),
            span: params.span,
        }),
    }
}

// Helper function to lex and parse a string directly (useful for tests and REPL)
pub fn parse_str(input: &str) -> ParseResult<Option<Node>> {
    Parser::new(tokenize(input)).parse()
}

pub fn parse_program(input: &str) -> ParseResult<Vec<Node>> {
    Parser::new(tokenize(input)).parse_program()
}

#[cfg(test)]
mod tests {
    use super::*;

    // Helper for asserting successful parsing
    fn assert_parse(input: &str, expected: Node) {
        match parse_str(input) {
            Ok(Some(result)) => assert_eq!(result, expected, "Input: '{}'", input),
            Ok(None) => panic!("Parsing produced nothing for input '{}'", input),
            Err(e) => panic!("Parsing failed for input '{}': {}", input, e),
        }
    }

    // Helper for asserting parse errors
    fn assert_parse_error(input: &str, expected_error_variant: ParseError) {
        match parse_str(input) {
            Ok(result) => panic!(
                "Expected parsing to fail for input '{}', but got: {:?}",
                input, result
            ),
            Err(e) => {
                // Compare enum variants, ignoring specific content for simplicity
                assert_eq!(
                    std::mem::discriminant(&e),
                    std::mem::discriminant(&expected_error_variant),
                    "Input: '{}', Expected error variant like {:?}, got: {:?}",
                    input,
                    expected_error_variant,
                    e
                );
            }
        }
    }

    // Parses a single expression and compares its printed form.
    fn assert_parsed_sexpr_string(input: &str, expected_output: &str) {
        let node = match parse_str(input) {
            Ok(Some(result)) => result,
            Ok(None) => panic!("Parsing produced nothing for input '{}'", input),
            Err(e) => panic!("Parsing failed for input '{}': {}", input, e),
        };
        assert_eq!(node.to_string(), expected_output, "Input: '{}'", input);
    }

    fn eof() -> ParseError {
        ParseError::UnexpectedEof {
            expected: String::new(),
            span: Span::default(),
        }
    }

    fn invalid_lambda() -> ParseError {
        ParseError::InvalidLambda {
            message: String::new(),
            span: Span::default(),
        }
    }

    #[test]
    fn test_parse_atoms() {
        assert_parse("123", Node::new_int(123, Span::new(0, 3)));
        assert_parse("-4.5", Node::new_float(-4.5, Span::new(0, 4)));
        assert_parse("symbol", Node::new_symbol("symbol", Span::new(0, 6)));
        assert_parse("+", Node::new_symbol("+", Span::new(0, 1)));
        assert_parse("1-2", Node::new_symbol("1-2", Span::new(0, 3)));
        assert_parse("#t", Node::new_symbol("#t", Span::new(0, 2)));
    }

    #[test]
    fn test_integer_before_float() {
        let node = parse_str("10").unwrap().unwrap();
        assert!(matches!(node.kind, Sexpr::Number(Number::Int(10))));
        let node = parse_str("10.0").unwrap().unwrap();
        assert!(matches!(node.kind, Sexpr::Number(Number::Float(_))));
        let node = parse_str("2e3").unwrap().unwrap();
        assert!(matches!(node.kind, Sexpr::Number(Number::Float(f)) if f == 2000.0));
    }

    #[test]
    fn test_parse_string_literals() {
        assert_parse(
            r#""hello""#,
            Node::new_quote(
                Node::new_string("hello", Span::new(0, 7)),
                Span::new(0, 7),
            ),
        );
        assert_parsed_sexpr_string(r#""hello world""#, r#"(quote "hello world")"#);
        // Fragments are re-joined with a single space
        assert_parsed_sexpr_string(r#""a    b""#, r#"(quote "a b")"#);
        assert_parsed_sexpr_string(r#""a(b""#, r#"(quote "a ( b")"#);
        assert_parsed_sexpr_string(r#""""#, r#"(quote "")"#);
        assert_parsed_sexpr_string(r#"" x""#, r#"(quote " x")"#);
        assert_parsed_sexpr_string(
            r#"(display "n =" n)"#,
            r#"(display (quote "n =") n)"#,
        );
    }

    #[test]
    fn test_parse_empty_list() {
        assert_parse("()", Node::new_list(vec![], Span::new(0, 2)));
        assert_parse("( )", Node::new_list(vec![], Span::new(0, 3))); // With space
    }

    #[test]
    fn test_parse_simple_list() {
        assert_parse(
            "(+ 10 20)",
            Node::new_list(
                vec![
                    Node::new_symbol("+", Span::new(1, 2)),
                    Node::new_int(10, Span::new(3, 5)),
                    Node::new_int(20, Span::new(6, 8)),
                ],
                Span::new(0, 9),
            ),
        );
    }

    #[test]
    fn test_parse_nested_list() {
        assert_parsed_sexpr_string("(a (b c) d)", "(a (b c) d)");
        assert_parsed_sexpr_string("(()())", "(() ())");
        assert_parsed_sexpr_string("(define (f x) (g (h x)))", "(define (f x) (g (h x)))");
    }

    #[test]
    fn test_parse_quote_sugar() {
        assert_parse(
            "'a",
            Node::new_quote(Node::new_symbol("a", Span::new(1, 2)), Span::new(0, 1)),
        );
        assert_parsed_sexpr_string("'123", "(quote 123)");
        assert_parsed_sexpr_string("'()", "(quote ())");
        assert_parsed_sexpr_string("'(1 2)", "(quote (1 2))");
        assert_parsed_sexpr_string("(list 'a 'b)", "(list (quote a) (quote b))");
        assert_parsed_sexpr_string("''a", "(quote (quote a))");
        assert_eq!(
            parse_str("'(a b)").unwrap().unwrap().to_string(),
            parse_str("(quote (a b))").unwrap().unwrap().to_string()
        );
    }

    #[test]
    fn test_comments() {
        assert_eq!(parse_str("; only a comment"), Ok(None));
        assert_parsed_sexpr_string("(f) ; trailing comment", "(f)");
        assert_parsed_sexpr_string("; leading\n(f)", "(f)");
        assert_parsed_sexpr_string("(+ 1 ; inner (comment\n 2)", "(+ 1 2)");
        assert_parsed_sexpr_string("' ; between\n x", "(quote x)");
    }

    #[test]
    fn test_comment_swallows_rest_of_line() {
        // The closing paren shares the comment's line.
        assert_parse_error("(+ 1 ; 2)", eof());
    }

    #[test]
    fn test_parse_lambda() {
        assert_parsed_sexpr_string("(lambda (x y) (+ x y))", "(lambda (x y) (+ x y))");
        assert_parsed_sexpr_string("(lambda () 1)", "(lambda () 1)");
        assert_parse_error("(lambda (1) x)", invalid_lambda());
        assert_parse_error("(lambda ((x)) x)", invalid_lambda());
        assert_parse_error("(lambda (\"x\") x)", invalid_lambda());
        assert_parse_error("(lambda x x)", invalid_lambda());
        assert_parse_error("(lambda (x) a b)", invalid_lambda());
        assert_parse_error("(lambda (x))", invalid_lambda());
        // Nested lambdas are checked too
        assert_parse_error("(f (lambda (2) x))", invalid_lambda());
    }

    #[test]
    fn test_parse_errors() {
        assert_parse_error("(1 2", eof());
        assert_parse_error("(((", eof());
        assert_parse_error("", eof());
        assert_parse_error("   ", eof());
        assert_parse_error("'", eof());
        assert_parse_error(")", ParseError::UnexpectedCloseParen(Span::default()));
        assert_parse_error("(a))", ParseError::UnexpectedCloseParen(Span::default()));
        assert_parse_error(
            "(1) 2",
            ParseError::UnexpectedToken {
                found: tokenize("2").remove(0),
                expected: String::new(),
            },
        );
        assert_parse_error(
            r#""abc"#,
            ParseError::UnterminatedString(Span::default()),
        );
        assert_parse_error(
            r#"(display "abc)"#,
            ParseError::UnterminatedString(Span::default()),
        );
    }

    #[test]
    fn test_error_spans() {
        assert_eq!(parse_str("  (1 2").unwrap_err().span(), Span::new(2, 3));
        assert_eq!(parse_str("(a))").unwrap_err().span(), Span::new(3, 4));
        assert_eq!(parse_str("(lambda (x 1) x)").unwrap_err().span(), Span::new(11, 12));
    }

    #[test]
    fn test_parse_program() {
        let program = parse_program("(define x 1)\n; comment\n(+ x 1) x").unwrap();
        let printed: Vec<String> = program.iter().map(|n| n.to_string()).collect();
        assert_eq!(printed, vec!["(define x 1)", "(+ x 1)", "x"]);
        assert_eq!(parse_program(""), Ok(vec![]));
        assert!(parse_program("(f) (g").is_err());
    }

    #[test]
    fn test_parse_expr_one_at_a_time() {
        let mut parser = Parser::new(tokenize("; c\n(a) b"));
        assert_eq!(parser.parse_expr(), Ok(None));
        assert_eq!(parser.parse_expr().unwrap().unwrap().to_string(), "(a)");
        assert_eq!(parser.parse_expr().unwrap().unwrap().to_string(), "b");
        assert!(parser.is_at_end());
        assert!(parser.parse_expr().is_err());
    }
}
