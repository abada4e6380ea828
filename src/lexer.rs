use std::fmt;

use crate::{
    ast::{Token, TokenKind},
    error::LexError,
};

/// Character offset into the source string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Position {
    pub offset: usize,
}

impl Position {
    pub fn new(offset: usize) -> Self {
        Position { offset }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "offset {}", self.offset)
    }
}

/// What the lexer is currently reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    /// Literal text. `quoted` templates end at `'`, the top level at end of input.
    Template { quoted: bool, start: usize },
    /// Tokens inside an `@{ ... }` span.
    Expression { start: usize },
}

pub struct Lexer {
    input: Vec<char>,
    position: usize,
    modes: Vec<Mode>,
    started: bool,
}

/// Tokenizes a complete source string, ending with [`TokenKind::Eof`].
pub fn tokenize(source: &str) -> Result<Vec<Token>, LexError> {
    let mut lexer = Lexer::new(source);
    let mut tokens = Vec::new();
    loop {
        let token = lexer.next_token()?;
        let done = token.kind == TokenKind::Eof;
        tokens.push(token);
        if done {
            return Ok(tokens);
        }
    }
}

impl Lexer {
    pub fn new(input: &str) -> Self {
        Lexer {
            input: input.chars().collect(),
            position: 0,
            modes: vec![Mode::Template {
                quoted: false,
                start: 0,
            }],
            started: false,
        }
    }

    fn current_char(&self) -> Option<char> {
        self.input.get(self.position).copied()
    }

    fn peek_char(&self, offset: usize) -> Option<char> {
        self.input.get(self.position + offset).copied()
    }

    fn advance(&mut self) {
        self.position += 1;
    }

    fn here(&self) -> Position {
        Position::new(self.position)
    }

    fn token(&self, kind: TokenKind, start: usize) -> Token {
        Token::new(kind, Position::new(start))
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.current_char() {
            if ch.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn at_interpolation(&self) -> bool {
        self.current_char() == Some('@') && self.peek_char(1) == Some('{')
    }

    pub fn next_token(&mut self) -> Result<Token, LexError> {
        if !self.started {
            self.started = true;
            return Ok(self.token(TokenKind::TemplateStart, 0));
        }

        match self.modes.last().copied() {
            None => Ok(self.token(TokenKind::Eof, self.position)),
            Some(Mode::Template { quoted, start }) => self.template_token(quoted, start),
            Some(Mode::Expression { start }) => self.expression_token(start),
        }
    }

    fn template_token(&mut self, quoted: bool, start: usize) -> Result<Token, LexError> {
        let begin = self.position;

        match self.current_char() {
            None if quoted => Err(LexError::UnterminatedString(Position::new(start))),
            None => {
                self.modes.pop();
                Ok(self.token(TokenKind::TemplateEnd, begin))
            }
            Some('\'') if quoted => {
                self.advance();
                self.modes.pop();
                Ok(self.token(TokenKind::TemplateEnd, begin))
            }
            Some(_) if self.at_interpolation() => {
                self.advance();
                self.advance();
                self.modes.push(Mode::Expression { start: begin });
                Ok(self.token(TokenKind::InterpolationStart, begin))
            }
            Some(_) => {
                let text = self.read_text(quoted, start)?;
                Ok(self.token(TokenKind::Text(text), begin))
            }
        }
    }

    /// Reads literal text up to the next span, closing quote or end of input.
    fn read_text(&mut self, quoted: bool, start: usize) -> Result<String, LexError> {
        let mut result = String::new();

        while let Some(ch) = self.current_char() {
            if self.at_interpolation() || (quoted && ch == '\'') {
                break;
            }

            if ch != '\\' {
                result.push(ch);
                self.advance();
                continue;
            }

            let escape_at = self.here();
            self.advance(); // Consume backslash
            match (quoted, self.current_char()) {
                (_, Some('\\')) => result.push('\\'),
                (_, Some('@')) => result.push('@'),
                (true, Some('\'')) => result.push('\''),
                (true, Some('"')) => result.push('"'),
                (true, Some('n')) => result.push('\n'),
                (true, Some('t')) => result.push('\t'),
                (true, Some('r')) => result.push('\r'),
                (true, Some(ch)) => {
                    return Err(LexError::InvalidEscape {
                        ch,
                        position: escape_at,
                    });
                }
                (true, None) => return Err(LexError::UnterminatedString(Position::new(start))),
                // Outside quotes a lone backslash is ordinary text
                (false, _) => {
                    result.push('\\');
                    continue;
                }
            }
            self.advance();
        }

        Ok(result)
    }

    fn expression_token(&mut self, start: usize) -> Result<Token, LexError> {
        self.skip_whitespace();
        let begin = self.position;

        let single = |lexer: &mut Lexer, kind: TokenKind| -> Result<Token, LexError> {
            lexer.advance();
            Ok(lexer.token(kind, begin))
        };
        let double = |lexer: &mut Lexer, kind: TokenKind| -> Result<Token, LexError> {
            lexer.advance();
            lexer.advance();
            Ok(lexer.token(kind, begin))
        };

        match self.current_char() {
            None => Err(LexError::UnterminatedExpression(Position::new(start))),
            Some('}') => {
                self.advance();
                self.modes.pop();
                Ok(self.token(TokenKind::InterpolationEnd, begin))
            }
            Some('\'') => {
                self.advance();
                self.modes.push(Mode::Template {
                    quoted: true,
                    start: begin,
                });
                Ok(self.token(TokenKind::TemplateStart, begin))
            }
            Some('+') => single(self, TokenKind::Plus),
            Some('-') => single(self, TokenKind::Minus),
            Some('*') => single(self, TokenKind::Star),
            Some('/') => single(self, TokenKind::Slash),
            Some('%') => single(self, TokenKind::Percent),
            Some('?') => single(self, TokenKind::Question),
            Some(':') => single(self, TokenKind::Colon),
            Some('.') => single(self, TokenKind::Dot),
            Some(',') => single(self, TokenKind::Comma),
            Some('(') => single(self, TokenKind::LParen),
            Some(')') => single(self, TokenKind::RParen),
            Some('[') => single(self, TokenKind::LBracket),
            Some(']') => single(self, TokenKind::RBracket),
            Some('!') => match self.peek_char(1) {
                Some('=') => double(self, TokenKind::NotEq),
                Some(':') => double(self, TokenKind::Elvis),
                _ => single(self, TokenKind::Bang),
            },
            Some('<') => match self.peek_char(1) {
                Some('=') => double(self, TokenKind::LtEq),
                _ => single(self, TokenKind::Lt),
            },
            Some('>') => match self.peek_char(1) {
                Some('=') => double(self, TokenKind::GtEq),
                _ => single(self, TokenKind::Gt),
            },
            Some('=') if self.peek_char(1) == Some('=') => double(self, TokenKind::EqEq),
            Some('&') if self.peek_char(1) == Some('&') => double(self, TokenKind::AndAnd),
            Some('|') if self.peek_char(1) == Some('|') => double(self, TokenKind::OrOr),
            Some(ch) if ch.is_ascii_digit() => self.read_number(),
            Some(ch) if ch.is_ascii_alphabetic() || ch == '_' => {
                let ident = self.read_identifier();
                let kind = match ident.as_str() {
                    "true" => TokenKind::Boolean(true),
                    "false" => TokenKind::Boolean(false),
                    _ => TokenKind::Identifier(ident),
                };
                Ok(self.token(kind, begin))
            }
            Some(ch) => Err(LexError::UnexpectedCharacter {
                ch,
                position: self.here(),
            }),
        }
    }

    fn read_identifier(&mut self) -> String {
        let mut result = String::new();
        while let Some(ch) = self.current_char() {
            if ch.is_ascii_alphanumeric() || ch == '_' {
                result.push(ch);
                self.advance();
            } else {
                break;
            }
        }
        result
    }

    fn read_digits(&mut self, number: &mut String) {
        while let Some(ch) = self.current_char() {
            if ch.is_ascii_digit() {
                number.push(ch);
                self.advance();
            } else {
                break;
            }
        }
    }

    fn read_number(&mut self) -> Result<Token, LexError> {
        let begin = self.position;
        let mut number = String::new();
        let mut is_float = false;

        self.read_digits(&mut number);

        // `1.toString()` is a method call, not a fraction
        if self.current_char() == Some('.') && self.peek_char(1).is_some_and(|c| c.is_ascii_digit())
        {
            is_float = true;
            number.push('.');
            self.advance();
            self.read_digits(&mut number);
        }

        let mut malformed = false;
        if matches!(self.current_char(), Some('e' | 'E')) {
            is_float = true;
            number.push('e');
            self.advance();
            if let Some(sign @ ('+' | '-')) = self.current_char() {
                number.push(sign);
                self.advance();
            }
            let before = number.len();
            self.read_digits(&mut number);
            malformed = number.len() == before;
        }

        // Digits glued to letters (`12abc`) are not a number
        while let Some(ch) = self.current_char() {
            if ch.is_ascii_alphanumeric() || ch == '_' {
                malformed = true;
                number.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        let invalid = || LexError::InvalidNumber {
            literal: number.clone(),
            position: Position::new(begin),
        };

        if malformed {
            return Err(invalid());
        }

        let kind = if is_float {
            TokenKind::Number(number.parse::<f64>().map_err(|_| invalid())?)
        } else {
            TokenKind::Integer(number.parse::<i64>().map_err(|_| invalid())?)
        };
        Ok(self.token(kind, begin))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source)
            .unwrap()
            .into_iter()
            .map(|token| token.kind)
            .collect()
    }

    #[test]
    fn test_keywords() {
        assert_eq!(
            kinds("@{true false}"),
            vec![
                TokenKind::TemplateStart,
                TokenKind::InterpolationStart,
                TokenKind::Boolean(true),
                TokenKind::Boolean(false),
                TokenKind::InterpolationEnd,
                TokenKind::TemplateEnd,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_elvis_and_not_equal() {
        assert_eq!(
            kinds("@{a !: b != c}")[2..7],
            [
                TokenKind::Identifier("a".into()),
                TokenKind::Elvis,
                TokenKind::Identifier("b".into()),
                TokenKind::NotEq,
                TokenKind::Identifier("c".into()),
            ]
        );
    }

    #[test]
    fn test_positions_are_character_offsets() {
        let tokens = tokenize("ä @{x}").unwrap();
        assert_eq!(tokens[2].kind, TokenKind::InterpolationStart);
        assert_eq!(tokens[2].position, Position::new(2));
        assert_eq!(tokens[3].position, Position::new(4));
    }
}
