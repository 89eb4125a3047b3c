use super::api::JsParser;
use super::api::Rule;
use super::ast::*;
use super::util::{parse_numeric_literal, unescape};

use pest::consumes_to;
use pest::parses_to;
use pest::Parser;

fn parse(code: &str) -> ProgramData {
    match JsParser::parse_to_ast_from_str(code) {
        Ok(p) => p,
        Err(e) => panic!("{} did not parse: {}", code, e),
    }
}

fn only_expression(program: &ProgramData) -> &ExpressionType {
    match program.body.as_slice() {
        [StatementType::ExpressionStatement { expression, .. }] => expression,
        other => panic!("expected one expression statement, got {:?}", other),
    }
}

#[test]
fn test_numeric_literal_tokens() {
    parses_to! {
        parser: JsParser,
        input: "10.5e3",
        rule: Rule::numeric_literal,
        tokens: [numeric_literal(0, 6)]
    };
    parses_to! {
        parser: JsParser,
        input: "0x1F",
        rule: Rule::numeric_literal,
        tokens: [numeric_literal(0, 4)]
    };
}

#[test]
fn test_string_literal_tokens() {
    parses_to! {
        parser: JsParser,
        input: "'it\\'s'",
        rule: Rule::string_literal,
        tokens: [string_literal(0, 7)]
    };
}

#[test]
fn test_reserved_words_are_not_identifiers() {
    assert!(JsParser::parse(Rule::identifier, "await").is_err());
    assert!(JsParser::parse(Rule::identifier, "awaitable").is_ok());
    assert!(JsParser::parse(Rule::identifier, "$faker_1").is_ok());
}

#[test]
fn test_numeric_values() {
    assert_eq!(parse_numeric_literal("1_000"), Some(1000.0));
    assert_eq!(parse_numeric_literal("0b101"), Some(5.0));
    assert_eq!(parse_numeric_literal("0o17"), Some(15.0));
    assert_eq!(parse_numeric_literal(".5"), Some(0.5));
}

#[test]
fn test_unescape() {
    assert_eq!(unescape("a\\nb").unwrap(), "a\nb");
    assert_eq!(unescape("\\u0041\\u{1F600}").unwrap(), "A\u{1F600}");
}

#[test]
fn test_operator_precedence() {
    let program = parse("1 + 2 * 3");
    match only_expression(&program) {
        ExpressionType::BinaryExpression { operator: BinaryOperator::Add, right, .. } => {
            assert!(matches!(
                **right,
                ExpressionType::BinaryExpression { operator: BinaryOperator::Multiply, .. }
            ));
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_exponent_is_right_associative() {
    let program = parse("2 ** 3 ** 2");
    match only_expression(&program) {
        ExpressionType::BinaryExpression { operator: BinaryOperator::Exponent, left, right, .. } => {
            assert!(matches!(**left, ExpressionType::Literal(_)));
            assert!(matches!(**right, ExpressionType::BinaryExpression { .. }));
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_optional_chain() {
    let program = parse("a?.b.c");
    assert!(matches!(only_expression(&program), ExpressionType::ChainExpression { .. }));
}

#[test]
fn test_nullish_coalescing() {
    let program = parse("a ?? b");
    assert!(matches!(
        only_expression(&program),
        ExpressionType::LogicalExpression { operator: LogicalOperator::Coalesce, .. }
    ));
}

#[test]
fn test_statements_without_semicolons() {
    let program = parse("let a = 1\nconst b = a + 1\nb");
    assert_eq!(program.body.len(), 3);
    assert!(!program.is_module);
}

#[test]
fn test_async_arrow_with_await() {
    let program = parse("const f = async (x) => await x");
    assert_eq!(program.body.len(), 1);
}

#[test]
fn test_template_literal() {
    let program = parse("`a${1}b`");
    match only_expression(&program) {
        ExpressionType::TemplateLiteral { quasis, expressions, .. } => {
            assert_eq!(quasis, &vec!["a".to_string(), "b".to_string()]);
            assert_eq!(expressions.len(), 1);
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_imports() {
    let program = parse("import def, { a as b, c } from './lib'\nimport * as ns from 'mokapi'");
    assert!(program.is_module);
    match &program.body[0] {
        StatementType::ImportDeclaration(import) => {
            assert_eq!(import.source, "./lib");
            assert_eq!(import.default.as_deref(), Some("def"));
            assert_eq!(
                import.named,
                vec![("a".to_string(), "b".to_string()), ("c".to_string(), "c".to_string())]
            );
        }
        other => panic!("unexpected {:?}", other),
    }
    match &program.body[1] {
        StatementType::ImportDeclaration(import) => assert_eq!(import.namespace.as_deref(), Some("ns")),
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_exports() {
    let program = parse(
        "export default function () {}\nexport const x = 1\nexport { x as y }\nexport * from './other'",
    );
    assert!(program.is_module);
    assert!(matches!(program.body[0], StatementType::ExportDeclaration(ExportData::Default(_))));
    assert!(matches!(program.body[1], StatementType::ExportDeclaration(ExportData::Declaration(_))));
    match &program.body[2] {
        StatementType::ExportDeclaration(ExportData::Named { specifiers, source }) => {
            assert_eq!(specifiers, &vec![("x".to_string(), "y".to_string())]);
            assert!(source.is_none());
        }
        other => panic!("unexpected {:?}", other),
    }
    assert!(matches!(
        &program.body[3],
        StatementType::ExportDeclaration(ExportData::All { source, alias: None }) if source == "./other"
    ));
}

#[test]
fn test_syntax_error_position() {
    let err = JsParser::parse_to_ast_with_name("let x = ;", "bad.js").unwrap_err();
    assert_eq!(err.file, "bad.js");
    assert_eq!(err.line, 1);
    assert!(err.to_string().starts_with("SyntaxError: "));
}
