use proptest::prelude::*;
use sms::script::lexer::tokenize;
use sms::script::parser::parse_program;
use sms::script::{ErrorKind, ScriptEngine, Value};

fn run(src: &str) -> Value {
    ScriptEngine::new()
        .execute(src)
        .unwrap_or_else(|e| panic!("{src:?} failed: {e}"))
}

proptest! {
    /// The lexer and parser return Ok or Err on any input; they never panic.
    #[test]
    fn parser_does_not_panic(s in "\\PC*") {
        let _ = tokenize(&s);
        let _ = parse_program(&s);
    }

    /// Same, over inputs built from the language's own vocabulary.
    #[test]
    fn parser_does_not_panic_on_tokens(
        words in prop::collection::vec(
            prop::sample::select(vec![
                "var", "fun", "on", "if", "else", "when", "for", "in", "while", "return",
                "break", "data", "class", "get", "set", "x", "a.b", "1", "\"s\"", "\"$x\"",
                "\"${x}\"", "(", ")", "{", "}", "[", "]", ",", ".", ";", "\n", "=", "==",
                "+", "-", "*", "/", "!", "&&", "||", "++", "--", "->",
            ]),
            0..40,
        )
    ) {
        let src = words.join(" ");
        let _ = parse_program(&src);
    }

    /// Appending an unmatched opener to a valid program always gives a
    /// lex or parse error.
    #[test]
    fn unbalanced_delimiters_are_rejected(
        n in 0i64..1000,
        opener in prop::sample::select(vec!["{", "(", "[", "\"", "\"${", "/*"]),
    ) {
        let src = format!("var x = {n}\nprint(x) {opener}");
        let err = ScriptEngine::new().validate_syntax(&src).unwrap_err();
        prop_assert!(matches!(err.kind(), ErrorKind::Lex | ErrorKind::Parse));
    }

    /// Runs of unmatched openers of any length fail cleanly instead of
    /// exhausting the stack.
    #[test]
    fn deep_unmatched_openers_are_rejected(
        depth in 1usize..5_000,
        opener in prop::sample::select(vec!["(", "[", "f(", "if (x) {\n"]),
    ) {
        let src = format!("var y = 1\n{}", opener.repeat(depth));
        let err = ScriptEngine::new().validate_syntax(&src).unwrap_err();
        prop_assert!(matches!(err.kind(), ErrorKind::Lex | ErrorKind::Parse));
    }

    /// Integer arithmetic matches Rust's, including truncating division.
    #[test]
    fn integer_arithmetic(a in -10_000i64..10_000, b in -10_000i64..10_000) {
        prop_assert_eq!(run(&format!("{a} + {b}")), Value::Number((a + b) as f64));
        prop_assert_eq!(run(&format!("{a} - {b}")), Value::Number((a - b) as f64));
        prop_assert_eq!(run(&format!("{a} * {b}")), Value::Number((a * b) as f64));
        if b != 0 {
            prop_assert_eq!(run(&format!("{a} / {b}")), Value::Number((a / b) as f64));
        }
        prop_assert_eq!(run(&format!("{a} < {b}")), Value::Bool(a < b));
    }

    /// `+` with a string operand concatenates display strings.
    #[test]
    fn string_concatenation(s in "[a-z ]{0,12}", n in 0u32..100_000) {
        prop_assert_eq!(run(&format!("\"{s}\" + {n}")), Value::Str(format!("{s}{n}")));
        prop_assert_eq!(run(&format!("{n} + \"{s}\"")), Value::Str(format!("{n}{s}")));
    }

    /// An interpolated string equals the concatenation of its parts.
    #[test]
    fn interpolation_matches_concatenation(pre in "[a-z]{0,8}", n in 0u32..1000, post in "[a-z]{0,8}") {
        let interpolated = run(&format!("var n = {n}\n\"{pre}${{n}}{post}\""));
        let concatenated = run(&format!("var n = {n}\n\"{pre}\" + n + \"{post}\""));
        prop_assert_eq!(interpolated, concatenated);
    }

    /// Arrays are shared: a mutation through one alias is visible in the other.
    #[test]
    fn array_aliasing(items in prop::collection::vec(0i64..100, 0..8), extra in 0i64..100) {
        let list = items.iter().map(i64::to_string).collect::<Vec<_>>().join(", ");
        let src = format!("var a = [{list}]\nvar b = a\nb.add({extra})\na.size");
        prop_assert_eq!(run(&src), Value::Number((items.len() + 1) as f64));
    }
}

#[test]
fn hundred_thousand_parens_is_a_parse_error() {
    let src = "(".repeat(100_000);
    let err = ScriptEngine::new().validate_syntax(&src).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Parse);
}
