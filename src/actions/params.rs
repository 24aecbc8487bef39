use crate::error::ActionError;
use serde_json::{Map, Value};

/// Action parameters as supplied by the host
pub type ActionParams = Map<String, Value>;

/// Read an optional boolean parameter, defaulting to false
pub fn bool_param(action: &str, params: &ActionParams, name: &'static str) -> Result<bool, ActionError> {
    match params.get(name) {
        None | Some(Value::Null) => Ok(false),
        Some(Value::Bool(value)) => Ok(*value),
        Some(_) => Err(ActionError::ParameterType {
            action: action.to_string(),
            param: name,
            expected: "a boolean",
        }),
    }
}

/// Read the hash `length` parameter; 0 means the full hash
pub fn length_param(action: &str, params: &ActionParams) -> Result<usize, ActionError> {
    let invalid = || ActionError::ParameterType {
        action: action.to_string(),
        param: "length",
        expected: "a non-negative integer",
    };

    match params.get("length") {
        None | Some(Value::Null) => Ok(0),
        Some(Value::Number(n)) => n
            .as_u64()
            .and_then(|n| usize::try_from(n).ok())
            .ok_or_else(invalid),
        Some(_) => Err(invalid()),
    }
}

/// Apply a `length` value to a hash
pub fn format_hash(hash: &str, length: usize) -> &str {
    if length == 0 {
        hash
    } else {
        crate::git::parser::truncate(hash, length)
    }
}
