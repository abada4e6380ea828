// tests/evaluator_tests.rs

use divkit_expr::{
    EvalContext, EvalError, Evaluation, EvaluatorConfig, Expression, FunctionRegistry, Value,
    ValueType, Variable, VariableStore, evaluate,
};
use std::collections::BTreeMap;

fn eval_with_config(source: &str, vars: &[(&str, Value)], config: &EvaluatorConfig) -> Evaluation {
    let variables: BTreeMap<String, Value> = vars
        .iter()
        .map(|(name, value)| (name.to_string(), value.clone()))
        .collect();
    let functions = FunctionRegistry::builtins();
    let expression = Expression::parse(source).unwrap();
    evaluate(&expression, EvalContext::new(&variables, &functions, config))
}

fn eval_with(source: &str, vars: &[(&str, Value)]) -> Evaluation {
    eval_with_config(source, vars, &EvaluatorConfig::default())
}

fn eval(source: &str) -> Result<Value, EvalError> {
    eval_with(source, &[]).result.map_err(|e| e.cause)
}

fn string(s: &str) -> Value {
    Value::String(s.to_string())
}

fn read_names(evaluation: &Evaluation) -> Vec<String> {
    evaluation.read_set.names().into_iter().collect()
}

// ============================================================================
// Arithmetic
// ============================================================================

#[test]
fn test_integer_arithmetic() {
    let test_cases = vec![
        ("@{1 + 2 * 3}", Value::Integer(7)),
        ("@{10 - 4 - 3}", Value::Integer(3)),
        ("@{7 % 3}", Value::Integer(1)),
        ("@{-7 % 3}", Value::Integer(-1)),
        ("@{-(2 + 3)}", Value::Integer(-5)),
        ("@{+4}", Value::Integer(4)),
    ];

    for (input, expected) in test_cases {
        assert_eq!(eval(input), Ok(expected), "Failed for input: {}", input);
    }
}

#[test]
fn test_division_always_produces_number() {
    assert_eq!(eval("@{7 / 2}"), Ok(Value::Number(3.5)));
    assert_eq!(eval("@{4 / 2}"), Ok(Value::Number(2.0)));
}

#[test]
fn test_mixed_arithmetic_widens() {
    assert_eq!(eval("@{1 + 2.5}"), Ok(Value::Number(3.5)));
    assert_eq!(eval("@{2 * 0.5}"), Ok(Value::Number(1.0)));
    assert_eq!(eval("@{5.5 % 2}"), Ok(Value::Number(1.5)));
}

#[test]
fn test_division_by_zero() {
    assert_eq!(eval("@{1 / 0}"), Err(EvalError::DivisionByZero));
    assert_eq!(eval("@{1 % 0}"), Err(EvalError::DivisionByZero));
    assert_eq!(eval("@{1.5 / 0.0}"), Err(EvalError::DivisionByZero));
}

#[test]
fn test_integer_overflow() {
    assert_eq!(
        eval("@{9223372036854775807 + 1}"),
        Err(EvalError::IntegerOverflow { operator: "+" })
    );
    assert_eq!(
        eval("@{-9223372036854775807 - 2}"),
        Err(EvalError::IntegerOverflow { operator: "-" })
    );
}

#[test]
fn test_string_concatenation() {
    assert_eq!(eval("@{'ab' + 'cd'}"), Ok(string("abcd")));
}

#[test]
fn test_invalid_operands() {
    assert_eq!(
        eval("@{'a' + 1}"),
        Err(EvalError::InvalidOperands {
            operator: "+",
            left: ValueType::String,
            right: ValueType::Integer,
        })
    );
    assert_eq!(
        eval("@{true * 2}"),
        Err(EvalError::InvalidOperands {
            operator: "*",
            left: ValueType::Boolean,
            right: ValueType::Integer,
        })
    );
    assert_eq!(
        eval("@{-'a'}"),
        Err(EvalError::InvalidOperand {
            operator: "-",
            operand: ValueType::String,
        })
    );
}

// ============================================================================
// Comparison and Equality
// ============================================================================

#[test]
fn test_comparisons() {
    let test_cases = vec![
        ("@{1 < 2}", true),
        ("@{2 <= 2}", true),
        ("@{3 > 2.5}", true),
        ("@{2.5 >= 3}", false),
        ("@{1 == 1.0}", true),
        ("@{'a' == 'a'}", true),
        ("@{'a' != 'b'}", true),
        ("@{true == false}", false),
    ];

    for (input, expected) in test_cases {
        assert_eq!(
            eval(input),
            Ok(Value::Boolean(expected)),
            "Failed for input: {}",
            input
        );
    }
}

#[test]
fn test_datetime_comparison() {
    assert_eq!(
        eval("@{parseUnixTime(1) > parseUnixTime(0)}"),
        Ok(Value::Boolean(true))
    );
}

#[test]
fn test_strings_are_not_ordered() {
    assert!(matches!(
        eval("@{'a' < 'b'}"),
        Err(EvalError::InvalidOperands { operator: "<", .. })
    ));
}

#[test]
fn test_equality_of_different_types_fails() {
    assert_eq!(
        eval("@{1 == '1'}"),
        Err(EvalError::InvalidOperands {
            operator: "==",
            left: ValueType::Integer,
            right: ValueType::String,
        })
    );
}

// ============================================================================
// Logic and Control Flow
// ============================================================================

#[test]
fn test_logical_operators() {
    assert_eq!(eval("@{true && !false}"), Ok(Value::Boolean(true)));
    assert_eq!(eval("@{false || false}"), Ok(Value::Boolean(false)));
}

#[test]
fn test_logical_operators_require_booleans() {
    assert_eq!(
        eval("@{1 && true}"),
        Err(EvalError::NonBooleanCondition {
            operator: "&&",
            actual: ValueType::Integer,
        })
    );
    assert_eq!(
        eval("@{!1}"),
        Err(EvalError::NonBooleanCondition {
            operator: "!",
            actual: ValueType::Integer,
        })
    );
    assert_eq!(
        eval("@{'yes' ? 1 : 2}"),
        Err(EvalError::NonBooleanCondition {
            operator: "?:",
            actual: ValueType::String,
        })
    );
}

#[test]
fn test_short_circuit_skips_right_operand() {
    let evaluation = eval_with("@{false && missing}", &[]);
    assert_eq!(evaluation.result, Ok(Value::Boolean(false)));
    assert!(evaluation.read_set.is_empty());

    let evaluation = eval_with("@{true || missing}", &[]);
    assert_eq!(evaluation.result, Ok(Value::Boolean(true)));
    assert!(evaluation.read_set.is_empty());
}

#[test]
fn test_ternary_reads_only_taken_branch() {
    let vars = [
        ("flag", Value::Boolean(true)),
        ("a", Value::Integer(1)),
        ("b", Value::Integer(2)),
    ];
    let evaluation = eval_with("@{flag ? a : b}", &vars);
    assert_eq!(evaluation.result, Ok(Value::Integer(1)));
    assert_eq!(read_names(&evaluation), vec!["a", "flag"]);
}

#[test]
fn test_try_recovers_from_errors() {
    assert_eq!(eval("@{missing !: 5}"), Ok(Value::Integer(5)));
    assert_eq!(eval("@{1 / 0 !: -1}"), Ok(Value::Integer(-1)));
    assert_eq!(eval("@{toInteger('x') !: 0}"), Ok(Value::Integer(0)));
    assert_eq!(eval("@{3 !: 0}"), Ok(Value::Integer(3)));
}

#[test]
fn test_try_records_failed_read() {
    let evaluation = eval_with("@{missing !: 5}", &[]);
    assert!(evaluation.read_set.contains("missing"));
}

// ============================================================================
// Variables, Templates and Access
// ============================================================================

#[test]
fn test_template_stringifies_values() {
    let vars = [
        ("count", Value::Integer(3)),
        ("ratio", Value::Number(1.5)),
        ("on", Value::Boolean(true)),
    ];
    let evaluation = eval_with("@{count} items, x@{ratio * 2}, @{on}", &vars);
    assert_eq!(evaluation.result, Ok(string("3 items, x3.0, true")));
}

#[test]
fn test_single_span_keeps_its_type() {
    assert_eq!(eval("@{1.0}"), Ok(Value::Number(1.0)));
    assert_eq!(eval("@{true}"), Ok(Value::Boolean(true)));
}

#[test]
fn test_nested_string_template() {
    let evaluation = eval_with("@{'Hello, @{name}!'}", &[("name", string("Bob"))]);
    assert_eq!(evaluation.result, Ok(string("Hello, Bob!")));
}

#[test]
fn test_undefined_variable_keeps_read_set() {
    let evaluation = eval_with("@{a + missing}", &[("a", Value::Integer(1))]);
    let error = evaluation.result.clone().unwrap_err();
    assert_eq!(error.cause, EvalError::UndefinedVariable("missing".into()));
    assert_eq!(error.expression, "@{a + missing}");
    assert_eq!(read_names(&evaluation), vec!["a", "missing"]);
}

#[test]
fn test_constant_has_no_reads() {
    let evaluation = eval_with("just text", &[]);
    assert_eq!(evaluation.result, Ok(string("just text")));
    assert!(evaluation.read_set.is_empty());
}

#[test]
fn test_index_access() {
    let items = Value::Array(vec![Value::Integer(10), Value::Integer(20)]);
    let mut map = BTreeMap::new();
    map.insert("title".to_string(), string("Inbox"));
    let vars = [("items", items), ("settings", Value::Dict(map))];

    assert_eq!(eval_with("@{items[1]}", &vars).result, Ok(Value::Integer(20)));
    assert_eq!(
        eval_with("@{settings['title']}", &vars).result,
        Ok(string("Inbox"))
    );
    assert_eq!(
        eval_with("@{items[2]}", &vars).result.map_err(|e| e.cause),
        Err(EvalError::IndexOutOfBounds { index: 2, len: 2 })
    );
    assert_eq!(
        eval_with("@{settings['x']}", &vars).result.map_err(|e| e.cause),
        Err(EvalError::MissingKey("x".into()))
    );
}

#[test]
fn test_method_call_passes_receiver_first() {
    assert_eq!(eval("@{'héllo'.len()}"), Ok(Value::Integer(5)));
    assert_eq!(eval("@{12.toString()}"), Ok(string("12")));
}

#[test]
fn test_reads_through_store_carry_scope() {
    let store = VariableStore::new();
    store
        .declare(Variable::new("x", ValueType::Integer, Value::Integer(2)).unwrap())
        .unwrap();
    let functions = FunctionRegistry::builtins();
    let config = EvaluatorConfig::default();

    let expression = Expression::parse("@{x * x}").unwrap();
    let evaluation = evaluate(&expression, EvalContext::new(&store, &functions, &config));

    assert_eq!(evaluation.result, Ok(Value::Integer(4)));
    let reads: Vec<_> = evaluation.read_set.iter().collect();
    assert_eq!(reads.len(), 1);
    assert_eq!(reads[0].scope, Some(store.id()));
}

#[test]
fn test_repeated_evaluation_is_deterministic() {
    let store = VariableStore::new();
    store
        .declare_all(vec![
            Variable::new("name", ValueType::String, string("alice")).unwrap(),
            Variable::new("count", ValueType::Integer, Value::Integer(3)).unwrap(),
            Variable::new("unused", ValueType::Integer, Value::Integer(0)).unwrap(),
        ])
        .unwrap();
    let functions = FunctionRegistry::builtins();
    let config = EvaluatorConfig::default();
    let expression =
        Expression::parse("@{name.len() > 3 ? toUpperCase(name) : name} has @{count} items").unwrap();

    let first = evaluate(&expression, EvalContext::new(&store, &functions, &config));
    let second = evaluate(&expression, EvalContext::new(&store, &functions, &config));

    assert_eq!(first.result, Ok(string("ALICE has 3 items")));
    assert_eq!(first.result, second.result);
    assert_eq!(first.read_set, second.read_set);
    assert_eq!(first.warnings, second.warnings);
    assert_eq!(read_names(&first), vec!["count", "name"]);
}

// ============================================================================
// Limits
// ============================================================================

fn long_sum(terms: usize) -> String {
    format!("@{{{}}}", vec!["1"; terms].join(" + "))
}

#[test]
fn test_depth_limit() {
    let config = EvaluatorConfig {
        max_depth: 8,
        ..EvaluatorConfig::default()
    };
    let evaluation = eval_with_config(&long_sum(20), &[], &config);
    assert_eq!(
        evaluation.result.map_err(|e| e.cause),
        Err(EvalError::DepthLimitExceeded(8))
    );
}

#[test]
fn test_try_does_not_catch_depth_limit() {
    let config = EvaluatorConfig {
        max_depth: 8,
        ..EvaluatorConfig::default()
    };
    let source = format!("@{{({}) !: 0}}", vec!["1"; 20].join(" + "));
    let evaluation = eval_with_config(&source, &[], &config);
    assert_eq!(
        evaluation.result.map_err(|e| e.cause),
        Err(EvalError::DepthLimitExceeded(8))
    );
}

#[test]
fn test_default_depth_allows_ordinary_expressions() {
    assert_eq!(eval(&long_sum(100)), Ok(Value::Integer(100)));
}
