use super::{ArgType, Args, CallContext, FunctionRegistry, Signature};
use crate::{
    color::Color,
    error::EvalError,
    value::{Value, ValueType},
};

const STRING: ArgType = ArgType::Of(ValueType::String);

pub(super) fn register(registry: &mut FunctionRegistry) {
    registry.add_function("toString", Signature::new([ArgType::Any], ValueType::String), to_string);
    registry.add_method("toString", Signature::new([ArgType::Any], ValueType::String), to_string);

    registry.add_function(
        "toInteger",
        Signature::new(
            [ArgType::OneOf(&[ValueType::Number, ValueType::String, ValueType::Boolean])],
            ValueType::Integer,
        ),
        to_integer,
    );
    registry.add_function(
        "toNumber",
        Signature::new(
            [ArgType::OneOf(&[ValueType::Integer, ValueType::String])],
            ValueType::Number,
        ),
        to_number,
    );
    registry.add_function(
        "toBoolean",
        Signature::new(
            [ArgType::OneOf(&[ValueType::Integer, ValueType::String])],
            ValueType::Boolean,
        ),
        to_boolean,
    );
    registry.add_function("toColor", Signature::new([STRING], ValueType::Color), to_color);
    registry.add_function("toUrl", Signature::new([STRING], ValueType::Url), to_url);
}

fn to_string(_: &mut CallContext<'_>, args: &Args) -> Result<Value, EvalError> {
    Ok(Value::String(args.get(0)?.to_string()))
}

fn to_integer(ctx: &mut CallContext<'_>, args: &Args) -> Result<Value, EvalError> {
    match args.get(0)? {
        Value::Number(n) => {
            let truncated = n.trunc();
            if !truncated.is_finite() || truncated < i64::MIN as f64 || truncated >= i64::MAX as f64 {
                return Err(ctx.fail(format!("{} does not fit into an integer", n)));
            }
            Ok(Value::Integer(truncated as i64))
        }
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .map(Value::Integer)
            .map_err(|_| ctx.fail(format!("unable to convert '{}' to integer", s))),
        Value::Boolean(b) => Ok(Value::Integer(i64::from(*b))),
        other => Err(ctx.fail(format!("unable to convert {} to integer", other.value_type()))),
    }
}

fn to_number(ctx: &mut CallContext<'_>, args: &Args) -> Result<Value, EvalError> {
    match args.get(0)? {
        Value::Integer(n) => Ok(Value::Number(*n as f64)),
        Value::String(s) => match s.trim().parse::<f64>() {
            Ok(n) if n.is_finite() => Ok(Value::Number(n)),
            _ => Err(ctx.fail(format!("unable to convert '{}' to number", s))),
        },
        other => Err(ctx.fail(format!("unable to convert {} to number", other.value_type()))),
    }
}

fn to_boolean(ctx: &mut CallContext<'_>, args: &Args) -> Result<Value, EvalError> {
    match args.get(0)? {
        Value::Integer(0) => Ok(Value::Boolean(false)),
        Value::Integer(1) => Ok(Value::Boolean(true)),
        Value::String(s) if s == "true" => Ok(Value::Boolean(true)),
        Value::String(s) if s == "false" => Ok(Value::Boolean(false)),
        other => Err(ctx.fail(format!("unable to convert '{}' to boolean", other))),
    }
}

fn to_color(ctx: &mut CallContext<'_>, args: &Args) -> Result<Value, EvalError> {
    Color::parse(args.string(0)?)
        .map(Value::Color)
        .map_err(|e| ctx.fail(e.to_string()))
}

fn to_url(ctx: &mut CallContext<'_>, args: &Args) -> Result<Value, EvalError> {
    let text = args.string(0)?;
    if has_scheme(text) {
        Ok(Value::Url(text.to_string()))
    } else {
        Err(ctx.fail(format!("'{}' is not a valid url", text)))
    }
}

/// `scheme ":" rest`, where the scheme is a letter followed by letters,
/// digits, `+`, `-` or `.`.
fn has_scheme(text: &str) -> bool {
    let Some((scheme, rest)) = text.split_once(':') else {
        return false;
    };
    let mut chars = scheme.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        && !rest.is_empty()
        && !text.chars().any(char::is_whitespace)
}
