//! Variable input for the CLI: declaration files and `NAME=VALUE` pairs.

use crate::{
    declaration::{CardDeclarations, VariableDeclaration},
    value::Value,
};

use super::CliError;

/// Reads a variables file.
///
/// Two shapes are accepted: card declarations
/// (`{"variables": [...], "functions": [...]}`) and a flat object mapping
/// names to values, whose types are inferred.
pub fn declarations_from_json(text: &str) -> Result<CardDeclarations, CliError> {
    let json: serde_json::Value = serde_json::from_str(text)?;

    let serde_json::Value::Object(map) = json else {
        return Err(CliError::Json(serde::de::Error::custom(
            "expected an object of variables",
        )));
    };

    if is_card_shape(&map) {
        return Ok(serde_json::from_value(serde_json::Value::Object(map))?);
    }

    let variables = map
        .into_iter()
        .map(|(name, value)| {
            let ty = Value::from_json(value.clone())?.value_type();
            Ok(VariableDeclaration { name, ty, value })
        })
        .collect::<Result<Vec<_>, CliError>>()?;

    Ok(CardDeclarations {
        variables,
        functions: Vec::new(),
    })
}

fn is_card_shape(map: &serde_json::Map<String, serde_json::Value>) -> bool {
    !map.is_empty()
        && map
            .iter()
            .all(|(key, value)| matches!(key.as_str(), "variables" | "functions") && value.is_array())
}

/// Splits `NAME=VALUE`. The value is read as JSON when it parses, otherwise
/// as a bare string, so `n=3` is an integer and `title=hello` a string.
pub fn parse_assignment(text: &str) -> Result<(String, serde_json::Value), CliError> {
    let (name, raw) = text
        .split_once('=')
        .ok_or_else(|| CliError::InvalidAssignment(text.to_string()))?;

    let name = name.trim();
    if name.is_empty() {
        return Err(CliError::InvalidAssignment(text.to_string()));
    }

    let value = serde_json::from_str(raw).unwrap_or_else(|_| serde_json::Value::String(raw.to_string()));
    Ok((name.to_string(), value))
}
