use std::mem;

use crate::{
    ast::{BinOp, Expr, TemplatePart, Token, TokenKind, UnaryOp},
    error::{ExpressionError, ParseError},
    lexer::{Position, tokenize},
    stack::ensure_sufficient_stack,
};

/// Tokenizes and parses a complete source string.
pub fn parse(source: &str) -> Result<Expr, ExpressionError> {
    let tokens = tokenize(source)?;
    Ok(Parser::new(tokens).parse()?)
}

pub struct Parser {
    tokens: Vec<Token>,
    index: usize,
    current_token: Token,
}

impl Parser {
    pub fn new(mut tokens: Vec<Token>) -> Self {
        let end = tokens.last().map(|t| t.position).unwrap_or_default();
        if tokens.last().is_none_or(|t| t.kind != TokenKind::Eof) {
            tokens.push(Token::new(TokenKind::Eof, end));
        }
        let current_token = tokens[0].clone();
        Parser {
            tokens,
            index: 0,
            current_token,
        }
    }

    fn advance(&mut self) {
        if self.index + 1 < self.tokens.len() {
            self.index += 1;
        }
        self.current_token = self.tokens[self.index].clone();
    }

    /// Takes the current token's kind, leaving a placeholder, and advances.
    fn take(&mut self) -> TokenKind {
        let kind = mem::replace(&mut self.current_token.kind, TokenKind::Eof);
        self.advance();
        kind
    }

    fn check(&self, kind: &TokenKind) -> bool {
        mem::discriminant(&self.current_token.kind) == mem::discriminant(kind)
    }

    fn position(&self) -> Position {
        self.current_token.position
    }

    fn error(&self, expected: &str) -> ParseError {
        ParseError {
            position: self.position(),
            expected: expected.to_string(),
            found: self.current_token.kind.to_string(),
        }
    }

    fn expect(&mut self, kind: TokenKind, expected: &str) -> Result<(), ParseError> {
        if !self.check(&kind) {
            return Err(self.error(expected));
        }
        self.advance();
        Ok(())
    }

    /// Parses a whole source string: a top-level template followed by end of input.
    pub fn parse(&mut self) -> Result<Expr, ParseError> {
        let expr = self.parse_template(false)?;
        self.expect(TokenKind::Eof, "end of input")?;
        Ok(expr)
    }

    /// Parses `TemplateStart (Text | '@{' expr '}')* TemplateEnd`.
    ///
    /// At the top level a single span with no text is the span's own
    /// expression; everywhere else templates produce strings.
    fn parse_template(&mut self, quoted: bool) -> Result<Expr, ParseError> {
        self.expect(TokenKind::TemplateStart, "start of string")?;
        let mut parts = Vec::new();

        loop {
            match &self.current_token.kind {
                TokenKind::Text(_) => {
                    if let TokenKind::Text(text) = self.take() {
                        parts.push(TemplatePart::Text(text));
                    }
                }
                TokenKind::InterpolationStart => {
                    self.advance();
                    if self.check(&TokenKind::InterpolationEnd) {
                        return Err(self.error("expression"));
                    }
                    let expr = self.parse_expression()?;
                    self.expect(TokenKind::InterpolationEnd, "'}'")?;
                    parts.push(TemplatePart::Expr(expr));
                }
                TokenKind::TemplateEnd => {
                    self.advance();
                    break;
                }
                _ => {
                    let expected = if quoted {
                        "text, '@{' or closing quote"
                    } else {
                        "text or '@{'"
                    };
                    return Err(self.error(expected));
                }
            }
        }

        Ok(match parts.len() {
            0 => Expr::String(String::new()),
            1 => match parts.pop() {
                Some(TemplatePart::Text(text)) => Expr::String(text),
                Some(TemplatePart::Expr(expr)) if !quoted => expr,
                Some(part) => Expr::Template(vec![part]),
                None => Expr::String(String::new()),
            },
            _ => Expr::Template(parts),
        })
    }

    pub fn parse_expression(&mut self) -> Result<Expr, ParseError> {
        ensure_sufficient_stack(|| self.parse_ternary())
    }

    fn parse_ternary(&mut self) -> Result<Expr, ParseError> {
        let condition = self.parse_try()?;

        if !self.check(&TokenKind::Question) {
            return Ok(condition);
        }
        self.advance();

        let then_branch = self.parse_ternary()?;
        self.expect(TokenKind::Colon, "':' in ternary expression")?;
        let else_branch = self.parse_ternary()?;

        Ok(Expr::Ternary {
            condition: Box::new(condition),
            then_branch: Box::new(then_branch),
            else_branch: Box::new(else_branch),
        })
    }

    fn parse_try(&mut self) -> Result<Expr, ParseError> {
        let expr = self.parse_or()?;

        if !self.check(&TokenKind::Elvis) {
            return Ok(expr);
        }
        self.advance();

        let fallback = self.parse_try()?;
        Ok(Expr::Try {
            expr: Box::new(expr),
            fallback: Box::new(fallback),
        })
    }

    fn parse_or(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_and()?;

        while self.check(&TokenKind::OrOr) {
            self.advance();
            let right = self.parse_and()?;

            left = Expr::BinaryOp {
                op: BinOp::Or,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_equality()?;

        while self.check(&TokenKind::AndAnd) {
            self.advance();
            let right = self.parse_equality()?;

            left = Expr::BinaryOp {
                op: BinOp::And,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_equality(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_comparison()?;

        loop {
            let op = match &self.current_token.kind {
                TokenKind::EqEq => BinOp::Equal,
                TokenKind::NotEq => BinOp::NotEqual,
                _ => break,
            };

            self.advance();
            let right = self.parse_comparison()?;

            left = Expr::BinaryOp {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_comparison(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_additive()?;

        loop {
            let op = match &self.current_token.kind {
                TokenKind::Lt => BinOp::LessThan,
                TokenKind::Gt => BinOp::GreaterThan,
                TokenKind::LtEq => BinOp::LessEqual,
                TokenKind::GtEq => BinOp::GreaterEqual,
                _ => break,
            };

            self.advance();
            let right = self.parse_additive()?;

            left = Expr::BinaryOp {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_additive(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_multiplicative()?;

        loop {
            let op = match &self.current_token.kind {
                TokenKind::Plus => BinOp::Add,
                TokenKind::Minus => BinOp::Subtract,
                _ => break,
            };

            self.advance();
            let right = self.parse_multiplicative()?;

            left = Expr::BinaryOp {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_unary()?;

        loop {
            let op = match &self.current_token.kind {
                TokenKind::Star => BinOp::Multiply,
                TokenKind::Slash => BinOp::Divide,
                TokenKind::Percent => BinOp::Modulo,
                _ => break,
            };

            self.advance();
            let right = self.parse_unary()?;

            left = Expr::BinaryOp {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        let op = match &self.current_token.kind {
            TokenKind::Bang => UnaryOp::Not,
            TokenKind::Minus => UnaryOp::Negate,
            TokenKind::Plus => UnaryOp::Plus,
            _ => return self.parse_postfix(),
        };

        self.advance();
        let operand = ensure_sufficient_stack(|| self.parse_unary())?; // Right-associative
        Ok(Expr::Unary {
            op,
            operand: Box::new(operand),
        })
    }

    /// Parses calls on a receiver and index access, left to right.
    fn parse_postfix(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_primary()?;

        loop {
            if self.check(&TokenKind::Dot) {
                self.advance(); // consume '.'

                let method = match self.take() {
                    TokenKind::Identifier(name) => name,
                    _ => return Err(self.previous_error("method name after '.'")),
                };

                self.expect(TokenKind::LParen, "'(' after method name")?;
                let args = self.parse_arguments()?;

                expr = Expr::MethodCall {
                    object: Box::new(expr),
                    method,
                    args,
                };
            } else if self.check(&TokenKind::LBracket) {
                self.advance(); // consume '['
                let index = self.parse_expression()?;
                self.expect(TokenKind::RBracket, "']'")?;

                expr = Expr::Index {
                    object: Box::new(expr),
                    index: Box::new(index),
                };
            } else {
                break;
            }
        }
        Ok(expr)
    }

    /// Parse primary expressions (atoms): literals, strings, names, calls, '(' expr ')'
    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        match &self.current_token.kind {
            TokenKind::Integer(_) | TokenKind::Number(_) | TokenKind::Boolean(_) => {
                Ok(match self.take() {
                    TokenKind::Integer(n) => Expr::Integer(n),
                    TokenKind::Number(n) => Expr::Number(n),
                    TokenKind::Boolean(b) => Expr::Boolean(b),
                    _ => return Err(self.previous_error("literal")),
                })
            }
            TokenKind::TemplateStart => self.parse_template(true),
            TokenKind::Identifier(_) => {
                let name = match self.take() {
                    TokenKind::Identifier(name) => name,
                    _ => return Err(self.previous_error("identifier")),
                };

                if self.check(&TokenKind::LParen) {
                    self.advance();
                    let args = self.parse_arguments()?;
                    Ok(Expr::FunctionCall { name, args })
                } else {
                    Ok(Expr::Variable(name))
                }
            }
            TokenKind::LParen => {
                self.advance();
                let expr = self.parse_expression()?;
                self.expect(TokenKind::RParen, "')'")?;
                Ok(expr)
            }
            _ => Err(self.error("expression")),
        }
    }

    /// Parses `arg (',' arg)* ')'` after an opening parenthesis.
    fn parse_arguments(&mut self) -> Result<Vec<Expr>, ParseError> {
        let mut args = vec![];

        if self.check(&TokenKind::RParen) {
            self.advance();
            return Ok(args);
        }

        loop {
            args.push(self.parse_expression()?);

            if self.check(&TokenKind::Comma) {
                self.advance();
            } else {
                self.expect(TokenKind::RParen, "',' or ')'")?;
                return Ok(args);
            }
        }
    }

    /// Error for a token that was already consumed by [`Parser::take`].
    fn previous_error(&self, expected: &str) -> ParseError {
        let token = &self.tokens[self.index.saturating_sub(1)];
        ParseError {
            position: token.position,
            expected: expected.to_string(),
            found: token.kind.to_string(),
        }
    }
}
