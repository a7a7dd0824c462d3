//! The scanner that produces tokens from source text.

use super::{Span, Token, TokenKind};

/// A scanner that tokenizes source code.
pub struct Scanner<'a> {
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
    current_pos: usize,
    saw_newline: bool,
}

impl<'a> Scanner<'a> {
    /// Creates a new scanner for the given source code.
    pub fn new(source: &'a str) -> Self {
        Self {
            chars: source.char_indices().peekable(),
            current_pos: 0,
            saw_newline: false,
        }
    }

    /// Returns the next token from the source.
    pub fn next_token(&mut self) -> Token {
        self.saw_newline = false;
        self.skip_whitespace_and_comments();

        let start = self.current_pos;
        let newline_before = self.saw_newline;

        let Some((_pos, ch)) = self.advance() else {
            let mut token = Token::new(TokenKind::Eof, Span::new(start, start));
            token.newline_before = newline_before;
            return token;
        };

        let kind = match ch {
            // Single-character tokens
            '{' => TokenKind::LeftBrace,
            '}' => TokenKind::RightBrace,
            '(' => TokenKind::LeftParen,
            ')' => TokenKind::RightParen,
            '[' => TokenKind::LeftBracket,
            ']' => TokenKind::RightBracket,
            ';' => TokenKind::Semicolon,
            ',' => TokenKind::Comma,
            ':' => TokenKind::Colon,
            '~' => TokenKind::Tilde,
            '?' => TokenKind::Question,

            // Multi-character tokens
            '.' => self.scan_dot(),
            '+' => self.scan_plus(),
            '-' => self.scan_minus(),
            '*' => self.with_equal(TokenKind::Star, TokenKind::StarEqual),
            '/' => self.with_equal(TokenKind::Slash, TokenKind::SlashEqual),
            '%' => self.with_equal(TokenKind::Percent, TokenKind::PercentEqual),
            '^' => self.with_equal(TokenKind::Caret, TokenKind::CaretEqual),
            '<' => self.scan_less_than(),
            '>' => self.scan_greater_than(),
            '=' => self.scan_equal(),
            '!' => self.scan_bang(),
            '&' => self.scan_ampersand(),
            '|' => self.scan_pipe(),

            // String literals
            '"' | '\'' => self.scan_string(ch),

            // Numbers
            '0'..='9' => self.scan_number(ch),

            // Identifiers and keywords
            _ if is_id_start(ch) => self.scan_identifier(ch),

            _ => TokenKind::Invalid(ch.to_string()),
        };

        Token {
            kind,
            span: Span::new(start, self.current_pos),
            newline_before,
        }
    }

    fn advance(&mut self) -> Option<(usize, char)> {
        let result = self.chars.next();
        if let Some((pos, ch)) = result {
            self.current_pos = pos + ch.len_utf8();
        }
        result
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().map(|(_, ch)| *ch)
    }

    fn peek_next(&self) -> Option<char> {
        let mut iter = self.chars.clone();
        iter.next();
        iter.next().map(|(_, ch)| ch)
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            match self.peek() {
                Some('\n' | '\r' | '\u{2028}' | '\u{2029}') => {
                    self.saw_newline = true;
                    self.advance();
                }
                Some(ch) if ch.is_whitespace() => {
                    self.advance();
                }
                Some('/') => {
                    match self.peek_next() {
                        Some('/') => {
                            // Single-line comment: skip until end of line
                            self.advance();
                            self.advance();
                            while let Some(ch) = self.peek() {
                                if ch == '\n' || ch == '\r' {
                                    break;
                                }
                                self.advance();
                            }
                        }
                        Some('*') => {
                            // Multi-line comment: skip until */
                            self.advance();
                            self.advance();
                            let mut prev = ' ';
                            while let Some((_, ch)) = self.advance() {
                                if ch == '\n' || ch == '\r' {
                                    self.saw_newline = true;
                                }
                                if prev == '*' && ch == '/' {
                                    break;
                                }
                                prev = ch;
                            }
                        }
                        _ => break, // Not a comment, it's a division operator
                    }
                }
                _ => break,
            }
        }
    }

    fn with_equal(&mut self, plain: TokenKind, assign: TokenKind) -> TokenKind {
        if self.eat('=') { assign } else { plain }
    }

    fn scan_dot(&mut self) -> TokenKind {
        match self.peek() {
            Some(ch) if ch.is_ascii_digit() => self.scan_decimal(String::from("0.")),
            _ => TokenKind::Dot,
        }
    }

    fn scan_plus(&mut self) -> TokenKind {
        if self.eat('+') {
            TokenKind::PlusPlus
        } else {
            self.with_equal(TokenKind::Plus, TokenKind::PlusEqual)
        }
    }

    fn scan_minus(&mut self) -> TokenKind {
        if self.eat('-') {
            TokenKind::MinusMinus
        } else {
            self.with_equal(TokenKind::Minus, TokenKind::MinusEqual)
        }
    }

    fn scan_less_than(&mut self) -> TokenKind {
        if self.eat('<') {
            self.with_equal(TokenKind::LeftShift, TokenKind::LeftShiftEqual)
        } else {
            self.with_equal(TokenKind::LessThan, TokenKind::LessThanEqual)
        }
    }

    fn scan_greater_than(&mut self) -> TokenKind {
        if self.eat('>') {
            if self.eat('>') {
                self.with_equal(
                    TokenKind::UnsignedRightShift,
                    TokenKind::UnsignedRightShiftEqual,
                )
            } else {
                self.with_equal(TokenKind::RightShift, TokenKind::RightShiftEqual)
            }
        } else {
            self.with_equal(TokenKind::GreaterThan, TokenKind::GreaterThanEqual)
        }
    }

    fn scan_equal(&mut self) -> TokenKind {
        if self.eat('=') {
            self.with_equal(TokenKind::EqualEqual, TokenKind::StrictEqual)
        } else {
            TokenKind::Equal
        }
    }

    fn scan_bang(&mut self) -> TokenKind {
        if self.eat('=') {
            self.with_equal(TokenKind::NotEqual, TokenKind::StrictNotEqual)
        } else {
            TokenKind::Bang
        }
    }

    fn scan_ampersand(&mut self) -> TokenKind {
        if self.eat('&') {
            TokenKind::AmpersandAmpersand
        } else {
            self.with_equal(TokenKind::Ampersand, TokenKind::AmpersandEqual)
        }
    }

    fn scan_pipe(&mut self) -> TokenKind {
        if self.eat('|') {
            TokenKind::PipePipe
        } else {
            self.with_equal(TokenKind::Pipe, TokenKind::PipeEqual)
        }
    }

    fn scan_string(&mut self, quote: char) -> TokenKind {
        let mut value = String::new();

        loop {
            match self.advance() {
                None | Some((_, '\n')) => {
                    return TokenKind::Invalid("unterminated string".to_string());
                }
                Some((_, ch)) if ch == quote => break,
                Some((_, '\\')) => {
                    let Some((_, escaped)) = self.advance() else {
                        return TokenKind::Invalid("unterminated string".to_string());
                    };
                    match escaped {
                        'n' => value.push('\n'),
                        'r' => value.push('\r'),
                        't' => value.push('\t'),
                        'b' => value.push('\u{8}'),
                        'f' => value.push('\u{c}'),
                        'v' => value.push('\u{b}'),
                        '0' => value.push('\0'),
                        'x' => match self.scan_code_unit(2) {
                            Some(ch) => value.push(ch),
                            None => return TokenKind::Invalid("bad \\x escape".to_string()),
                        },
                        'u' => match self.scan_code_unit(4) {
                            Some(ch) => value.push(ch),
                            None => return TokenKind::Invalid("bad \\u escape".to_string()),
                        },
                        // Line continuation
                        '\n' => {}
                        _ => value.push(escaped),
                    }
                }
                Some((_, ch)) => value.push(ch),
            }
        }

        TokenKind::String(value)
    }

    fn scan_code_unit(&mut self, digits: usize) -> Option<char> {
        let mut code = 0u32;
        for _ in 0..digits {
            let digit = self.peek()?.to_digit(16)?;
            self.advance();
            code = code * 16 + digit;
        }
        char::from_u32(code)
    }

    fn scan_number(&mut self, first: char) -> TokenKind {
        if first == '0' {
            match self.peek() {
                Some('x' | 'X') => return self.scan_radix_number(16),
                Some('o' | 'O') => return self.scan_radix_number(8),
                Some('b' | 'B') => return self.scan_radix_number(2),
                _ => {}
            }
        }

        let mut value = String::from(first);
        self.push_digits(&mut value);

        // Fractional part
        if self.peek() == Some('.') {
            value.push('.');
            self.advance();
        }
        self.scan_decimal(value)
    }

    /// Scans the digits after the decimal point and an optional exponent.
    fn scan_decimal(&mut self, mut value: String) -> TokenKind {
        self.push_digits(&mut value);

        if matches!(self.peek(), Some('e' | 'E')) {
            value.push('e');
            self.advance();
            if let Some(sign @ ('+' | '-')) = self.peek() {
                value.push(sign);
                self.advance();
            }
            self.push_digits(&mut value);
        }

        match value.parse::<f64>() {
            Ok(n) => TokenKind::Number(n),
            Err(_) => TokenKind::Invalid(value),
        }
    }

    fn push_digits(&mut self, value: &mut String) {
        while let Some(ch) = self.peek() {
            if ch.is_ascii_digit() {
                value.push(ch);
                self.advance();
            } else if ch == '_' {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn scan_radix_number(&mut self, radix: u32) -> TokenKind {
        self.advance(); // consume the radix marker
        let mut value = String::new();

        while let Some(ch) = self.peek() {
            if ch.is_digit(radix) || ch == '_' {
                if ch != '_' {
                    value.push(ch);
                }
                self.advance();
            } else {
                break;
            }
        }

        match u64::from_str_radix(&value, radix) {
            Ok(n) => TokenKind::Number(n as f64),
            Err(_) => TokenKind::Invalid(value),
        }
    }

    fn scan_identifier(&mut self, first: char) -> TokenKind {
        let mut name = String::from(first);

        while let Some(ch) = self.peek() {
            if is_id_continue(ch) {
                name.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        TokenKind::keyword(&name).unwrap_or(TokenKind::Identifier(name))
    }
}

/// Checks if a character can start an identifier.
fn is_id_start(ch: char) -> bool {
    ch == '_' || ch == '$' || unicode_xid::UnicodeXID::is_xid_start(ch)
}

/// Checks if a character can continue an identifier.
fn is_id_continue(ch: char) -> bool {
    ch == '_' || ch == '$' || unicode_xid::UnicodeXID::is_xid_continue(ch)
}

impl<'a> Iterator for Scanner<'a> {
    type Item = Token;

    fn next(&mut self) -> Option<Self::Item> {
        let token = self.next_token();
        if token.kind == TokenKind::Eof {
            None
        } else {
            Some(token)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        Scanner::new(source).map(|t| t.kind).collect()
    }

    #[test]
    fn test_simple_tokens() {
        assert_eq!(
            kinds("{ } ( )"),
            vec![
                TokenKind::LeftBrace,
                TokenKind::RightBrace,
                TokenKind::LeftParen,
                TokenKind::RightParen
            ]
        );
    }

    #[test]
    fn test_numbers() {
        assert_eq!(
            kinds("42 3.14 .5 0xff 0b1010 0o17 1e3 1_000"),
            vec![
                TokenKind::Number(42.0),
                TokenKind::Number(3.14),
                TokenKind::Number(0.5),
                TokenKind::Number(255.0),
                TokenKind::Number(10.0),
                TokenKind::Number(15.0),
                TokenKind::Number(1000.0),
                TokenKind::Number(1000.0),
            ]
        );
    }

    #[test]
    fn test_strings_and_escapes() {
        assert_eq!(
            kinds(r#""hello" 'world' "a\tb" "\x41B""#),
            vec![
                TokenKind::String("hello".into()),
                TokenKind::String("world".into()),
                TokenKind::String("a\tb".into()),
                TokenKind::String("AB".into()),
            ]
        );
    }

    #[test]
    fn test_unterminated_string_is_invalid() {
        assert!(matches!(kinds("\"abc")[0], TokenKind::Invalid(_)));
    }

    #[test]
    fn test_keywords_and_identifiers() {
        assert_eq!(
            kinds("function var foo _bar $baz undefined"),
            vec![
                TokenKind::Function,
                TokenKind::Var,
                TokenKind::Identifier("foo".into()),
                TokenKind::Identifier("_bar".into()),
                TokenKind::Identifier("$baz".into()),
                TokenKind::Identifier("undefined".into()),
            ]
        );
    }

    #[test]
    fn test_compound_operators() {
        assert_eq!(
            kinds(">>>= >>> >>= === !== <<= &&"),
            vec![
                TokenKind::UnsignedRightShiftEqual,
                TokenKind::UnsignedRightShift,
                TokenKind::RightShiftEqual,
                TokenKind::StrictEqual,
                TokenKind::StrictNotEqual,
                TokenKind::LeftShiftEqual,
                TokenKind::AmpersandAmpersand,
            ]
        );
    }

    #[test]
    fn test_comments_are_skipped() {
        assert_eq!(
            kinds("1 /* comment */ 2 // tail\n3"),
            vec![
                TokenKind::Number(1.0),
                TokenKind::Number(2.0),
                TokenKind::Number(3.0)
            ]
        );
    }

    #[test]
    fn test_newline_tracking() {
        let mut scanner = Scanner::new("a\nb /* x\n */ c d");
        assert!(!scanner.next_token().newline_before);
        assert!(scanner.next_token().newline_before);
        assert!(scanner.next_token().newline_before);
        assert!(!scanner.next_token().newline_before);
    }

    #[test]
    fn test_division_vs_comment() {
        assert_eq!(
            kinds("6 / 2"),
            vec![
                TokenKind::Number(6.0),
                TokenKind::Slash,
                TokenKind::Number(2.0)
            ]
        );
    }
}
