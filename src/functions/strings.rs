use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};
use regex::Regex;

use super::{ArgType, Args, CallContext, FunctionRegistry, Signature};
use crate::{
    error::EvalError,
    value::{Value, ValueType},
};

const STRING: ArgType = ArgType::Of(ValueType::String);
const INTEGER: ArgType = ArgType::Of(ValueType::Integer);
const PADDABLE: ArgType = ArgType::OneOf(&[ValueType::String, ValueType::Integer]);

/// Characters left as-is by `encodeUri`, matching `encodeURIComponent`.
const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

pub(super) fn register(registry: &mut FunctionRegistry) {
    registry.add_function("len", Signature::new([STRING], ValueType::Integer), len);
    registry.add_function(
        "concat",
        Signature::new([STRING], ValueType::String).variadic(STRING),
        concat,
    );
    registry.add_function(
        "substring",
        Signature::new([STRING, INTEGER, INTEGER], ValueType::String),
        substring,
    );
    registry.add_function("toLowerCase", Signature::new([STRING], ValueType::String), to_lower_case);
    registry.add_function("toUpperCase", Signature::new([STRING], ValueType::String), to_upper_case);
    registry.add_function("trim", Signature::new([STRING], ValueType::String), trim);
    registry.add_function("trimLeft", Signature::new([STRING], ValueType::String), trim_left);
    registry.add_function("trimRight", Signature::new([STRING], ValueType::String), trim_right);
    registry.add_function(
        "contains",
        Signature::new([STRING, STRING], ValueType::Boolean),
        contains,
    );
    registry.add_function("index", Signature::new([STRING, STRING], ValueType::Integer), index);
    registry.add_function(
        "lastIndex",
        Signature::new([STRING, STRING], ValueType::Integer),
        last_index,
    );
    registry.add_function(
        "replaceAll",
        Signature::new([STRING, STRING, STRING], ValueType::String),
        replace_all,
    );
    registry.add_function(
        "padStart",
        Signature::new([PADDABLE, INTEGER, STRING], ValueType::String),
        pad_start,
    );
    registry.add_function(
        "padEnd",
        Signature::new([PADDABLE, INTEGER, STRING], ValueType::String),
        pad_end,
    );
    registry.add_function("encodeUri", Signature::new([STRING], ValueType::String), encode_uri);
    registry.add_function("decodeUri", Signature::new([STRING], ValueType::String), decode_uri);
    registry.add_function(
        "testRegex",
        Signature::new([STRING, STRING], ValueType::Boolean),
        test_regex,
    );
    registry.add_function("encodeRegex", Signature::new([STRING], ValueType::String), encode_regex);
    registry.add_function("isEmpty", Signature::new([STRING], ValueType::Boolean), is_empty);

    // Methods on strings
    registry.add_method("len", Signature::new([STRING], ValueType::Integer), len);
    registry.add_method(
        "contains",
        Signature::new([STRING, STRING], ValueType::Boolean),
        contains,
    );
    registry.add_method("isEmpty", Signature::new([STRING], ValueType::Boolean), is_empty);
}

fn len(_: &mut CallContext<'_>, args: &Args) -> Result<Value, EvalError> {
    Ok(Value::Integer(args.string(0)?.chars().count() as i64))
}

fn concat(_: &mut CallContext<'_>, args: &Args) -> Result<Value, EvalError> {
    let mut result = String::new();
    for value in args.values() {
        result.push_str(&value.to_string());
    }
    Ok(Value::String(result))
}

/// `substring(s, start, end)`: characters in `start..end`.
fn substring(ctx: &mut CallContext<'_>, args: &Args) -> Result<Value, EvalError> {
    let text = args.string(0)?;
    let start = args.integer(1)?;
    let end = args.integer(2)?;
    let len = text.chars().count() as i64;

    if start < 0 || end > len {
        return Err(ctx.fail("indexes are out of bounds"));
    }
    if start > end {
        return Err(ctx.fail("indexes should be in ascending order"));
    }
    let result: String = text
        .chars()
        .skip(start as usize)
        .take((end - start) as usize)
        .collect();
    Ok(Value::String(result))
}

fn to_lower_case(_: &mut CallContext<'_>, args: &Args) -> Result<Value, EvalError> {
    Ok(Value::String(args.string(0)?.to_lowercase()))
}

fn to_upper_case(_: &mut CallContext<'_>, args: &Args) -> Result<Value, EvalError> {
    Ok(Value::String(args.string(0)?.to_uppercase()))
}

fn trim(_: &mut CallContext<'_>, args: &Args) -> Result<Value, EvalError> {
    Ok(Value::String(args.string(0)?.trim().to_string()))
}

fn trim_left(_: &mut CallContext<'_>, args: &Args) -> Result<Value, EvalError> {
    Ok(Value::String(args.string(0)?.trim_start().to_string()))
}

fn trim_right(_: &mut CallContext<'_>, args: &Args) -> Result<Value, EvalError> {
    Ok(Value::String(args.string(0)?.trim_end().to_string()))
}

fn contains(_: &mut CallContext<'_>, args: &Args) -> Result<Value, EvalError> {
    Ok(Value::Boolean(args.string(0)?.contains(args.string(1)?)))
}

fn is_empty(_: &mut CallContext<'_>, args: &Args) -> Result<Value, EvalError> {
    Ok(Value::Boolean(args.string(0)?.is_empty()))
}

/// Converts a byte offset into `text` to a character index.
fn char_index(text: &str, byte_offset: Option<usize>) -> i64 {
    match byte_offset {
        Some(offset) => text[..offset].chars().count() as i64,
        None => -1,
    }
}

fn index(_: &mut CallContext<'_>, args: &Args) -> Result<Value, EvalError> {
    let text = args.string(0)?;
    Ok(Value::Integer(char_index(text, text.find(args.string(1)?))))
}

fn last_index(_: &mut CallContext<'_>, args: &Args) -> Result<Value, EvalError> {
    let text = args.string(0)?;
    Ok(Value::Integer(char_index(text, text.rfind(args.string(1)?))))
}

fn replace_all(_: &mut CallContext<'_>, args: &Args) -> Result<Value, EvalError> {
    let text = args.string(0)?;
    let from = args.string(1)?;
    let to = args.string(2)?;
    if from.is_empty() {
        return Ok(Value::String(text.to_string()));
    }
    Ok(Value::String(text.replace(from, to)))
}

/// The padding that brings `text` up to `length` characters, repeating `pad`.
fn padding(ctx: &mut CallContext<'_>, text: &str, length: i64, pad: &str) -> String {
    let missing = length - text.chars().count() as i64;
    if missing <= 0 {
        return String::new();
    }
    if pad.is_empty() {
        ctx.warn("padding string is empty, the value is left as is");
        return String::new();
    }
    pad.chars().cycle().take(missing as usize).collect()
}

fn pad_start(ctx: &mut CallContext<'_>, args: &Args) -> Result<Value, EvalError> {
    let text = args.get(0)?.to_string();
    let pad = padding(ctx, &text, args.integer(1)?, args.string(2)?);
    Ok(Value::String(pad + &text))
}

fn pad_end(ctx: &mut CallContext<'_>, args: &Args) -> Result<Value, EvalError> {
    let text = args.get(0)?.to_string();
    let pad = padding(ctx, &text, args.integer(1)?, args.string(2)?);
    Ok(Value::String(text + &pad))
}

fn encode_uri(_: &mut CallContext<'_>, args: &Args) -> Result<Value, EvalError> {
    Ok(Value::String(
        utf8_percent_encode(args.string(0)?, URI_COMPONENT).to_string(),
    ))
}

fn decode_uri(ctx: &mut CallContext<'_>, args: &Args) -> Result<Value, EvalError> {
    percent_decode_str(args.string(0)?)
        .decode_utf8()
        .map(|decoded| Value::String(decoded.into_owned()))
        .map_err(|e| ctx.fail(format!("invalid percent-encoded text: {}", e)))
}

fn test_regex(ctx: &mut CallContext<'_>, args: &Args) -> Result<Value, EvalError> {
    let pattern = Regex::new(args.string(1)?)
        .map_err(|e| ctx.fail(format!("invalid regular expression: {}", e)))?;
    Ok(Value::Boolean(pattern.is_match(args.string(0)?)))
}

fn encode_regex(_: &mut CallContext<'_>, args: &Args) -> Result<Value, EvalError> {
    Ok(Value::String(regex::escape(args.string(0)?)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_char_index_counts_characters() {
        let text = "héllo";
        assert_eq!(char_index(text, text.find('l')), 2);
        assert_eq!(char_index(text, None), -1);
    }

    #[test]
    fn test_uri_component_set() {
        let encoded = utf8_percent_encode("a b/c?d=é!", URI_COMPONENT).to_string();
        assert_eq!(encoded, "a%20b%2Fc%3Fd%3D%C3%A9!");
    }
}
