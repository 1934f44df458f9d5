use lox::error::LoxError;
use lox::scanner::Scanner;
use lox::token::{Token, TokenType};

fn assert_token_sequence(source: &str, expected: &[(TokenType, &str)]) {
    let scanner = Scanner::new(source.as_bytes());
    let tokens: Vec<_> = scanner.filter_map(Result::ok).collect();

    assert_eq!(
        tokens.len(),
        expected.len(),
        "token count mismatch for {:?}: {:?}",
        source,
        tokens
    );

    for (actual, (expected_type, expected_lexeme)) in tokens.iter().zip(expected.iter()) {
        assert_eq!(actual.token_type, *expected_type);
        assert_eq!(actual.lexeme, *expected_lexeme);
    }
}

fn scan_all(source: &str) -> Vec<Result<Token, LoxError>> {
    Scanner::new(source.as_bytes()).collect()
}

#[test]
fn symbols() {
    assert_token_sequence(
        "({*.,+*})",
        &[
            (TokenType::LEFT_PAREN, "("),
            (TokenType::LEFT_BRACE, "{"),
            (TokenType::STAR, "*"),
            (TokenType::DOT, "."),
            (TokenType::COMMA, ","),
            (TokenType::PLUS, "+"),
            (TokenType::STAR, "*"),
            (TokenType::RIGHT_BRACE, "}"),
            (TokenType::RIGHT_PAREN, ")"),
            (TokenType::EOF, ""),
        ],
    );
}

#[test]
fn one_or_two_char_operators() {
    assert_token_sequence(
        "! != = == < <= > >= / - ;",
        &[
            (TokenType::BANG, "!"),
            (TokenType::BANG_EQUAL, "!="),
            (TokenType::EQUAL, "="),
            (TokenType::EQUAL_EQUAL, "=="),
            (TokenType::LESS, "<"),
            (TokenType::LESS_EQUAL, "<="),
            (TokenType::GREATER, ">"),
            (TokenType::GREATER_EQUAL, ">="),
            (TokenType::SLASH, "/"),
            (TokenType::MINUS, "-"),
            (TokenType::SEMICOLON, ";"),
            (TokenType::EOF, ""),
        ],
    );
}

#[test]
fn comments_produce_no_tokens() {
    assert_token_sequence(
        "// nothing to see here\n+ // trailing\n",
        &[(TokenType::PLUS, "+"), (TokenType::EOF, "")],
    );
}

#[test]
fn keywords_and_identifiers() {
    assert_token_sequence(
        "var foo = nil; while _bar or classy",
        &[
            (TokenType::VAR, "var"),
            (TokenType::IDENTIFIER, "foo"),
            (TokenType::EQUAL, "="),
            (TokenType::NIL, "nil"),
            (TokenType::SEMICOLON, ";"),
            (TokenType::WHILE, "while"),
            (TokenType::IDENTIFIER, "_bar"),
            (TokenType::OR, "or"),
            (TokenType::IDENTIFIER, "classy"),
            (TokenType::EOF, ""),
        ],
    );
}

#[test]
fn number_literals_carry_their_value() {
    let tokens: Vec<Token> = Scanner::new(b"123 45.67")
        .collect::<Result<Vec<_>, _>>()
        .expect("scan failed");

    match tokens[0].token_type {
        TokenType::NUMBER(n) => assert_eq!(n, 123.0),
        ref other => panic!("expected NUMBER, got {:?}", other),
    }

    match tokens[1].token_type {
        TokenType::NUMBER(n) => assert_eq!(n, 45.67),
        ref other => panic!("expected NUMBER, got {:?}", other),
    }
}

#[test]
fn trailing_dot_is_not_a_fraction() {
    assert_token_sequence(
        "123.",
        &[
            (TokenType::NUMBER(123.0), "123"),
            (TokenType::DOT, "."),
            (TokenType::EOF, ""),
        ],
    );
}

#[test]
fn string_literal_contents() {
    let tokens: Vec<Token> = Scanner::new(b"\"hello world\"")
        .collect::<Result<Vec<_>, _>>()
        .expect("scan failed");

    match &tokens[0].token_type {
        TokenType::STRING(s) => assert_eq!(s, "hello world"),
        other => panic!("expected STRING, got {:?}", other),
    }

    // The lexeme keeps the quotes; the literal does not.
    assert_eq!(tokens[0].lexeme, "\"hello world\"");
}

#[test]
fn multiline_string_counts_lines() {
    let tokens: Vec<Token> = Scanner::new(b"\"a\nb\"\nfoo")
        .collect::<Result<Vec<_>, _>>()
        .expect("scan failed");

    match &tokens[0].token_type {
        TokenType::STRING(s) => assert_eq!(s, "a\nb"),
        other => panic!("expected STRING, got {:?}", other),
    }

    // The identifier after the string sits on line 3.
    assert_eq!(tokens[1].lexeme, "foo");
    assert_eq!(tokens[1].line, 3);
}

#[test]
fn unterminated_string_is_an_error() {
    let results = scan_all("\"oops");

    let error = results
        .iter()
        .find_map(|r| r.as_ref().err())
        .expect("expected a scan error");

    assert_eq!(error.to_string(), "[line 1] Error: Unterminated string.");
}

#[test]
fn unexpected_characters_do_not_stop_the_scan() {
    let results = scan_all(",.$(#");

    let error_count = results.iter().filter(|r| r.is_err()).count();
    assert_eq!(error_count, 2, "expected 2 error items: {:?}", results);

    for err in results.iter().filter_map(|r| r.as_ref().err()) {
        assert!(
            err.to_string().contains("Unexpected character"),
            "unexpected message: {}",
            err
        );
    }

    // Valid tokens around the bad bytes are still produced, EOF included.
    let kinds: Vec<_> = results
        .iter()
        .filter_map(|r| r.as_ref().ok())
        .map(|t| t.token_type.clone())
        .collect();

    assert_eq!(
        kinds,
        vec![
            TokenType::COMMA,
            TokenType::DOT,
            TokenType::LEFT_PAREN,
            TokenType::EOF,
        ]
    );
}

#[test]
fn exactly_one_eof_with_empty_lexeme() {
    let tokens: Vec<Token> = Scanner::new(b"var x = 1;\nprint x;\n")
        .collect::<Result<Vec<_>, _>>()
        .expect("scan failed");

    let eof_count = tokens
        .iter()
        .filter(|t| t.token_type == TokenType::EOF)
        .count();

    assert_eq!(eof_count, 1);

    let last = tokens.last().expect("no tokens");
    assert_eq!(last.token_type, TokenType::EOF);
    assert_eq!(last.lexeme, "");
    assert_eq!(last.line, 3);

    // Every non-EOF token carries a non-empty lexeme.
    for token in &tokens[..tokens.len() - 1] {
        assert!(!token.lexeme.is_empty(), "empty lexeme: {:?}", token);
    }
}

#[test]
fn lexemes_round_trip_modulo_whitespace() {
    let source = "var answer=6*7;\nif (answer >= 42) print \"yes\";";

    let tokens: Vec<Token> = Scanner::new(source.as_bytes())
        .collect::<Result<Vec<_>, _>>()
        .expect("scan failed");

    // Re-scanning the space-joined lexemes yields the same token sequence.
    let rejoined = tokens
        .iter()
        .map(|t| t.lexeme.as_str())
        .collect::<Vec<_>>()
        .join(" ");

    let rescanned: Vec<Token> = Scanner::new(rejoined.as_bytes())
        .collect::<Result<Vec<_>, _>>()
        .expect("rescan failed");

    let kinds = |ts: &[Token]| {
        ts.iter()
            .map(|t| (t.token_type.clone(), t.lexeme.clone()))
            .collect::<Vec<_>>()
    };

    assert_eq!(kinds(&tokens), kinds(&rescanned));
}
