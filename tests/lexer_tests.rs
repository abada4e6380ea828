// tests/lexer_tests.rs

use divkit_expr::ast::TokenKind;
use divkit_expr::error::LexError;
use divkit_expr::lexer::{Lexer, Position, tokenize};

fn kinds(source: &str) -> Vec<TokenKind> {
    tokenize(source)
        .unwrap()
        .into_iter()
        .map(|token| token.kind)
        .collect()
}

/// Kinds of the tokens inside a single `@{...}` span.
fn span_kinds(body: &str) -> Vec<TokenKind> {
    let all = kinds(&format!("@{{{}}}", body));
    // TemplateStart, InterpolationStart ... InterpolationEnd, TemplateEnd, Eof
    all[2..all.len() - 3].to_vec()
}

// ============================================================================
// Template Structure
// ============================================================================

#[test]
fn test_plain_text() {
    assert_eq!(
        kinds("Hello, world"),
        vec![
            TokenKind::TemplateStart,
            TokenKind::Text("Hello, world".into()),
            TokenKind::TemplateEnd,
            TokenKind::Eof,
        ]
    );
}

#[test]
fn test_empty_source() {
    assert_eq!(
        kinds(""),
        vec![TokenKind::TemplateStart, TokenKind::TemplateEnd, TokenKind::Eof]
    );
}

#[test]
fn test_text_around_span() {
    assert_eq!(
        kinds("a @{x} b"),
        vec![
            TokenKind::TemplateStart,
            TokenKind::Text("a ".into()),
            TokenKind::InterpolationStart,
            TokenKind::Identifier("x".into()),
            TokenKind::InterpolationEnd,
            TokenKind::Text(" b".into()),
            TokenKind::TemplateEnd,
            TokenKind::Eof,
        ]
    );
}

#[test]
fn test_lone_at_sign_is_text() {
    assert_eq!(
        kinds("mail@example.com"),
        vec![
            TokenKind::TemplateStart,
            TokenKind::Text("mail@example.com".into()),
            TokenKind::TemplateEnd,
            TokenKind::Eof,
        ]
    );
}

#[test]
fn test_escaped_interpolation_at_top_level() {
    assert_eq!(
        kinds(r"\@{x}"),
        vec![
            TokenKind::TemplateStart,
            TokenKind::Text("@{x}".into()),
            TokenKind::TemplateEnd,
            TokenKind::Eof,
        ]
    );
}

#[test]
fn test_backslash_is_text_outside_quotes() {
    assert_eq!(
        kinds(r"C:\path"),
        vec![
            TokenKind::TemplateStart,
            TokenKind::Text(r"C:\path".into()),
            TokenKind::TemplateEnd,
            TokenKind::Eof,
        ]
    );
}

// ============================================================================
// Quoted Strings
// ============================================================================

#[test]
fn test_quoted_string() {
    assert_eq!(
        span_kinds("'hi'"),
        vec![
            TokenKind::TemplateStart,
            TokenKind::Text("hi".into()),
            TokenKind::TemplateEnd,
        ]
    );
}

#[test]
fn test_nested_template_in_string() {
    assert_eq!(
        span_kinds("'n=@{n}'"),
        vec![
            TokenKind::TemplateStart,
            TokenKind::Text("n=".into()),
            TokenKind::InterpolationStart,
            TokenKind::Identifier("n".into()),
            TokenKind::InterpolationEnd,
            TokenKind::TemplateEnd,
        ]
    );
}

#[test]
fn test_string_escapes() {
    let test_cases = vec![
        (r"'\''", "'"),
        (r"'\\'", "\\"),
        (r"'\@{'", "@{"),
        (r"'a\nb'", "a\nb"),
        (r"'\t'", "\t"),
    ];

    for (input, expected) in test_cases {
        assert_eq!(
            span_kinds(input)[1],
            TokenKind::Text(expected.into()),
            "Failed for input: {}",
            input
        );
    }
}

#[test]
fn test_invalid_escape() {
    assert_eq!(
        tokenize(r"@{'\q'}"),
        Err(LexError::InvalidEscape {
            ch: 'q',
            position: Position::new(3)
        })
    );
}

#[test]
fn test_unterminated_string() {
    assert_eq!(
        tokenize("@{'abc}"),
        Err(LexError::UnterminatedString(Position::new(2)))
    );
}

#[test]
fn test_unterminated_expression() {
    assert_eq!(
        tokenize("total: @{a + b"),
        Err(LexError::UnterminatedExpression(Position::new(7)))
    );
}

// ============================================================================
// Operators
// ============================================================================

#[test]
fn test_single_char_tokens() {
    let test_cases = vec![
        ("+", TokenKind::Plus),
        ("-", TokenKind::Minus),
        ("*", TokenKind::Star),
        ("/", TokenKind::Slash),
        ("%", TokenKind::Percent),
        ("!", TokenKind::Bang),
        ("<", TokenKind::Lt),
        (">", TokenKind::Gt),
        ("?", TokenKind::Question),
        (":", TokenKind::Colon),
        (".", TokenKind::Dot),
        (",", TokenKind::Comma),
        ("(", TokenKind::LParen),
        (")", TokenKind::RParen),
        ("[", TokenKind::LBracket),
        ("]", TokenKind::RBracket),
    ];

    for (input, expected) in test_cases {
        assert_eq!(span_kinds(input), vec![expected], "Failed for input: {}", input);
    }
}

#[test]
fn test_two_char_tokens() {
    let test_cases = vec![
        ("==", TokenKind::EqEq),
        ("!=", TokenKind::NotEq),
        ("<=", TokenKind::LtEq),
        (">=", TokenKind::GtEq),
        ("&&", TokenKind::AndAnd),
        ("||", TokenKind::OrOr),
        ("!:", TokenKind::Elvis),
    ];

    for (input, expected) in test_cases {
        assert_eq!(span_kinds(input), vec![expected], "Failed for input: {}", input);
    }
}

#[test]
fn test_single_ampersand_is_rejected() {
    assert!(matches!(
        tokenize("@{a & b}"),
        Err(LexError::UnexpectedCharacter { ch: '&', .. })
    ));
}

// ============================================================================
// Literals
// ============================================================================

#[test]
fn test_numbers() {
    let test_cases = vec![
        ("0", TokenKind::Integer(0)),
        ("42", TokenKind::Integer(42)),
        ("3.14", TokenKind::Number(3.14)),
        ("2e3", TokenKind::Number(2000.0)),
        ("1.5e-2", TokenKind::Number(0.015)),
    ];

    for (input, expected) in test_cases {
        assert_eq!(span_kinds(input), vec![expected], "Failed for input: {}", input);
    }
}

#[test]
fn test_integer_followed_by_method_call() {
    assert_eq!(
        span_kinds("1.toString()"),
        vec![
            TokenKind::Integer(1),
            TokenKind::Dot,
            TokenKind::Identifier("toString".into()),
            TokenKind::LParen,
            TokenKind::RParen,
        ]
    );
}

#[test]
fn test_integer_out_of_range() {
    assert!(matches!(
        tokenize("@{9223372036854775808}"),
        Err(LexError::InvalidNumber { .. })
    ));
}

#[test]
fn test_digits_glued_to_letters() {
    assert_eq!(
        tokenize("@{12abc}"),
        Err(LexError::InvalidNumber {
            literal: "12abc".into(),
            position: Position::new(2)
        })
    );
}

#[test]
fn test_identifiers() {
    assert_eq!(
        span_kinds("_hidden getIntegerValue x1"),
        vec![
            TokenKind::Identifier("_hidden".into()),
            TokenKind::Identifier("getIntegerValue".into()),
            TokenKind::Identifier("x1".into()),
        ]
    );
}

#[test]
fn test_identifiers_are_ascii() {
    assert!(matches!(
        tokenize("@{été}"),
        Err(LexError::UnexpectedCharacter { ch: 'é', .. })
    ));
    assert!(matches!(
        tokenize("@{café + 1}"),
        Err(LexError::UnexpectedCharacter { ch: 'é', .. })
    ));
    // Non-ASCII text outside expressions is fine
    assert!(tokenize("café @{x}").is_ok());
}

// ============================================================================
// Positions
// ============================================================================

#[test]
fn test_token_positions() {
    let mut lexer = Lexer::new("@{ab + 1}");
    let positions: Vec<usize> = std::iter::from_fn(|| {
        let token = lexer.next_token().unwrap();
        (token.kind != TokenKind::Eof).then_some(token.position.offset)
    })
    .collect();

    // TemplateStart, @{, ab, +, 1, }, TemplateEnd
    assert_eq!(positions, vec![0, 0, 2, 5, 7, 8, 9]);
}
