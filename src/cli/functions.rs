//! Built-in function listing

use crate::{error::CallKind, functions::FunctionRegistry};

/// One line of the `functions` command output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionListing {
    pub kind: CallKind,
    pub signature: String,
}

/// Signatures of every built-in whose name contains `filter`
/// (case-insensitive).
pub fn list_functions(filter: Option<&str>) -> Vec<FunctionListing> {
    let filter = filter.map(str::to_lowercase);
    let registry = FunctionRegistry::builtins();

    registry
        .signatures()
        .into_iter()
        .filter(|(_, function)| {
            filter
                .as_deref()
                .is_none_or(|f| function.name.to_lowercase().contains(f))
        })
        .map(|(kind, function)| FunctionListing {
            kind,
            signature: function.to_string(),
        })
        .collect()
}
