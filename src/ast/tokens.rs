use std::fmt;

use crate::lexer::Position;

/// A token together with the offset of its first character.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub position: Position,
}

impl Token {
    pub fn new(kind: TokenKind, position: Position) -> Self {
        Token { kind, position }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // Literals
    /// Integer literal
    ///
    /// # Examples
    /// ```text
    /// 42
    /// 0
    /// ```
    Integer(i64),

    /// Floating point literal
    ///
    /// # Examples
    /// ```text
    /// 3.14
    /// 2e3
    /// 1.5e-2
    /// ```
    Number(f64),

    /// Boolean values
    ///
    /// # Examples
    /// ```text
    /// true
    /// false
    /// ```
    Boolean(bool),

    /// Variable or function name
    ///
    /// Must start with a letter or underscore, followed by letters, digits,
    /// or underscores.
    ///
    /// # Examples
    /// ```text
    /// counter
    /// getIntegerValue
    /// _hidden
    /// ```
    Identifier(String),

    // Templates
    /// Start of a template: the beginning of the source string, or an opening
    /// `'` inside an expression.
    TemplateStart,

    /// End of a template: the end of the source string, or a closing `'`.
    TemplateEnd,

    /// Literal text inside a template, with escapes already resolved.
    Text(String),

    /// `@{`
    InterpolationStart,

    /// `}` closing an interpolation
    InterpolationEnd,

    // Operators
    /// Addition or string concatenation
    Plus,

    /// Subtraction or negation
    Minus,

    /// Multiplication
    Star,

    /// Division
    Slash,

    /// Remainder
    Percent,

    /// Logical negation
    Bang,

    /// Equality
    EqEq,

    /// Inequality
    NotEq,

    /// Less than
    Lt,

    /// Less than or equal
    LtEq,

    /// Greater than
    Gt,

    /// Greater than or equal
    GtEq,

    /// Logical AND
    AndAnd,

    /// Logical OR
    OrOr,

    /// Ternary condition separator
    Question,

    /// Ternary branch separator
    Colon,

    /// Try operator (`!:`)
    ///
    /// # Examples
    /// ```text
    /// @{ getDictString(config, 'title') !: 'Untitled' }
    /// ```
    Elvis,

    // Delimiters
    /// Method call on a receiver
    Dot,

    /// Argument separator
    Comma,

    /// Left parenthesis for grouping or calls
    LParen,

    /// Right parenthesis
    RParen,

    /// Left bracket for index access
    LBracket,

    /// Right bracket
    RBracket,

    /// End of input
    Eof,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Integer(n) => write!(f, "integer {}", n),
            TokenKind::Number(n) => write!(f, "number {}", n),
            TokenKind::Boolean(b) => write!(f, "'{}'", b),
            TokenKind::Identifier(name) => write!(f, "identifier '{}'", name),
            TokenKind::TemplateStart => f.write_str("start of string"),
            TokenKind::TemplateEnd => f.write_str("end of string"),
            TokenKind::Text(text) => write!(f, "text {:?}", text),
            TokenKind::InterpolationStart => f.write_str("'@{'"),
            TokenKind::InterpolationEnd => f.write_str("'}'"),
            TokenKind::Plus => f.write_str("'+'"),
            TokenKind::Minus => f.write_str("'-'"),
            TokenKind::Star => f.write_str("'*'"),
            TokenKind::Slash => f.write_str("'/'"),
            TokenKind::Percent => f.write_str("'%'"),
            TokenKind::Bang => f.write_str("'!'"),
            TokenKind::EqEq => f.write_str("'=='"),
            TokenKind::NotEq => f.write_str("'!='"),
            TokenKind::Lt => f.write_str("'<'"),
            TokenKind::LtEq => f.write_str("'<='"),
            TokenKind::Gt => f.write_str("'>'"),
            TokenKind::GtEq => f.write_str("'>='"),
            TokenKind::AndAnd => f.write_str("'&&'"),
            TokenKind::OrOr => f.write_str("'||'"),
            TokenKind::Question => f.write_str("'?'"),
            TokenKind::Colon => f.write_str("':'"),
            TokenKind::Elvis => f.write_str("'!:'"),
            TokenKind::Dot => f.write_str("'.'"),
            TokenKind::Comma => f.write_str("','"),
            TokenKind::LParen => f.write_str("'('"),
            TokenKind::RParen => f.write_str("')'"),
            TokenKind::LBracket => f.write_str("'['"),
            TokenKind::RBracket => f.write_str("']'"),
            TokenKind::Eof => f.write_str("end of input"),
        }
    }
}
