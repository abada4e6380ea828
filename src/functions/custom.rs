use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::{ArgType, Signature};
use crate::{error::RegistryError, expression::Expression, value::ValueType};

/// A function as declared in card JSON.
///
/// ```json
/// {"name": "inc", "arguments": [{"name": "a", "type": "integer"}],
///  "return_type": "integer", "body": "@{a + 1}"}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDeclaration {
    pub name: String,
    #[serde(default)]
    pub arguments: Vec<ArgumentDeclaration>,
    pub return_type: ValueType,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArgumentDeclaration {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: ValueType,
}

/// A checked, parsed custom function.
///
/// The body sees its arguments and nothing else: card variables are not in
/// scope, so the function is a pure mapping from arguments to result.
#[derive(Debug, Clone)]
pub struct CustomFunction {
    pub name: String,
    pub arguments: Vec<ArgumentDeclaration>,
    pub return_type: ValueType,
    pub body: Expression,
}

impl CustomFunction {
    pub fn compile(declaration: &FunctionDeclaration) -> Result<Self, RegistryError> {
        let mut names = BTreeSet::new();
        for argument in &declaration.arguments {
            if !names.insert(argument.name.as_str()) {
                return Err(RegistryError::DuplicateArgument {
                    function: declaration.name.clone(),
                    argument: argument.name.clone(),
                });
            }
        }

        let body = Expression::parse(&declaration.body).map_err(|source| RegistryError::InvalidBody {
            function: declaration.name.clone(),
            source,
        })?;

        if let Some(variable) = body
            .variables()
            .into_iter()
            .find(|variable| !names.contains(variable.as_str()))
        {
            return Err(RegistryError::UnknownArgument {
                function: declaration.name.clone(),
                variable,
            });
        }

        Ok(CustomFunction {
            name: declaration.name.clone(),
            arguments: declaration.arguments.clone(),
            return_type: declaration.return_type,
            body,
        })
    }

    pub fn signature(&self) -> Signature {
        let args: Vec<ArgType> = self.arguments.iter().map(|a| ArgType::Of(a.ty)).collect();
        Signature::new(args, self.return_type)
    }
}
