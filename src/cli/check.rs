//! Syntax check without evaluation

use std::collections::BTreeSet;

use crate::{config::EvaluatorConfig, expression::Expression};

use super::CliError;

/// Options for the check command
#[derive(Debug, Clone, Default)]
pub struct CheckOptions {
    pub expression: String,
    pub config: EvaluatorConfig,
}

/// Result of a successful check
#[derive(Debug, Clone, PartialEq)]
pub struct CheckResult {
    /// The source has no `@{...}` span.
    pub constant: bool,
    /// Names referenced anywhere in the expression.
    pub variables: BTreeSet<String>,
}

pub fn execute_check(options: &CheckOptions) -> Result<CheckResult, CliError> {
    let expression = Expression::parse_with(&options.expression, &options.config)?;
    Ok(CheckResult {
        constant: expression.is_constant(),
        variables: expression.variables(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check(source: &str) -> Result<CheckResult, CliError> {
        execute_check(&CheckOptions {
            expression: source.to_string(),
            ..CheckOptions::default()
        })
    }

    #[test]
    fn test_reports_variables() {
        let result = check("@{a ? b : c + 1}").unwrap();
        assert!(!result.constant);
        assert_eq!(
            result.variables.into_iter().collect::<Vec<_>>(),
            vec!["a", "b", "c"]
        );
    }

    #[test]
    fn test_syntax_error() {
        assert!(matches!(check("@{1 +}"), Err(CliError::Expression(_))));
    }
}
