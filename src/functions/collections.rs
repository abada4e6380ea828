//! Array and dict lookups.
//!
//! Every typed lookup exists once per element type: `getArrayInteger`,
//! `getArrayString` and so on.

use super::{
    ArgType, Args, ArrayElement, BooleanElement, CallContext, ColorElement, DictElement, Element,
    FunctionRegistry, IntegerElement, NumberElement, Signature, StringElement, UrlElement,
    fallback_arg, read_as,
};
use crate::{
    error::EvalError,
    value::{Value, ValueType},
};

const ARRAY: ArgType = ArgType::Of(ValueType::Array);
const DICT: ArgType = ArgType::Of(ValueType::Dict);
const INTEGER: ArgType = ArgType::Of(ValueType::Integer);
const STRING: ArgType = ArgType::Of(ValueType::String);

pub(super) fn register(registry: &mut FunctionRegistry) {
    register_typed::<IntegerElement>(registry);
    register_typed::<NumberElement>(registry);
    register_typed::<StringElement>(registry);
    register_typed::<BooleanElement>(registry);
    register_typed::<ColorElement>(registry);
    register_typed::<UrlElement>(registry);
    register_typed::<ArrayElement>(registry);
    register_typed::<DictElement>(registry);

    registry.add_function("len", Signature::new([ARRAY], ValueType::Integer), array_len);
    registry.add_method("len", Signature::new([ARRAY], ValueType::Integer), array_len);

    for signature in [
        Signature::new([ARRAY], ValueType::Boolean),
        Signature::new([DICT], ValueType::Boolean),
    ] {
        registry.add_function("isEmpty", signature.clone(), is_empty);
        registry.add_method("isEmpty", signature, is_empty);
    }

    registry.add_function(
        "containsKey",
        Signature::new([DICT, STRING], ValueType::Boolean),
        contains_key,
    );
    registry.add_method(
        "containsKey",
        Signature::new([DICT, STRING], ValueType::Boolean),
        contains_key,
    );
    registry.add_function("getDictKeys", Signature::new([DICT], ValueType::Array), dict_keys);
    registry.add_function("getDictValues", Signature::new([DICT], ValueType::Array), dict_values);
    registry.add_method("getKeys", Signature::new([DICT], ValueType::Array), dict_keys);
    registry.add_method("getValues", Signature::new([DICT], ValueType::Array), dict_values);
}

fn register_typed<T: Element>(registry: &mut FunctionRegistry) {
    let returns = T::TYPE;
    let fallback = fallback_arg(T::TYPE);

    registry.add_function(
        &format!("getArray{}", T::SUFFIX),
        Signature::new([ARRAY, INTEGER], returns),
        get_array::<T>,
    );
    registry.add_function(
        &format!("getArrayOpt{}", T::SUFFIX),
        Signature::new([ARRAY, INTEGER, fallback], returns),
        get_array_opt::<T>,
    );
    registry.add_function(
        &format!("getDict{}", T::SUFFIX),
        Signature::new([DICT, STRING], returns).variadic(STRING),
        get_dict::<T>,
    );
    registry.add_function(
        &format!("getDictOpt{}", T::SUFFIX),
        Signature::new([fallback, DICT, STRING], returns).variadic(STRING),
        get_dict_opt::<T>,
    );

    // `array.getInteger(0)`, `dict.getString('key')`
    let method = format!("get{}", T::SUFFIX);
    registry.add_method(&method, Signature::new([ARRAY, INTEGER], returns), get_array::<T>);
    registry.add_method(&method, Signature::new([DICT, STRING], returns), get_dict::<T>);
    let method = format!("getOpt{}", T::SUFFIX);
    registry.add_method(
        &method,
        Signature::new([ARRAY, INTEGER, fallback], returns),
        get_array_opt::<T>,
    );
}

fn element_at<'v>(items: &'v [Value], index: i64) -> Result<&'v Value, EvalError> {
    usize::try_from(index)
        .ok()
        .and_then(|i| items.get(i))
        .ok_or(EvalError::IndexOutOfBounds {
            index,
            len: items.len(),
        })
}

/// Follows `path` through nested dicts.
fn lookup_path<'v>(root: &'v Value, path: &[Value]) -> Result<&'v Value, EvalError> {
    path.iter().try_fold(root, |current, key| {
        let key = match key {
            Value::String(key) => key,
            other => {
                return Err(EvalError::NotIndexable {
                    target: current.value_type(),
                    key: other.value_type(),
                });
            }
        };
        match current {
            Value::Dict(map) => map.get(key).ok_or_else(|| EvalError::MissingKey(key.clone())),
            other => Err(EvalError::NotIndexable {
                target: other.value_type(),
                key: ValueType::String,
            }),
        }
    })
}

fn typed<T: Element>(ctx: &CallContext<'_>, value: &Value) -> Result<Value, EvalError> {
    read_as(value, T::TYPE).ok_or_else(|| {
        ctx.fail(format!(
            "expected {} value, got {}",
            T::TYPE,
            value.value_type()
        ))
    })
}

fn get_array<T: Element>(ctx: &mut CallContext<'_>, args: &Args) -> Result<Value, EvalError> {
    let item = element_at(args.array(0)?, args.integer(1)?)?;
    typed::<T>(ctx, item)
}

fn get_array_opt<T: Element>(_: &mut CallContext<'_>, args: &Args) -> Result<Value, EvalError> {
    let found = element_at(args.array(0)?, args.integer(1)?)
        .ok()
        .and_then(|item| read_as(item, T::TYPE));
    match found {
        Some(value) => Ok(value),
        None => fallback::<T>(args.get(2)?),
    }
}

fn get_dict<T: Element>(ctx: &mut CallContext<'_>, args: &Args) -> Result<Value, EvalError> {
    let value = lookup_path(args.get(0)?, args.rest(1))?;
    typed::<T>(ctx, value)
}

fn get_dict_opt<T: Element>(_: &mut CallContext<'_>, args: &Args) -> Result<Value, EvalError> {
    let found = lookup_path(args.get(1)?, args.rest(2))
        .ok()
        .and_then(|value| read_as(value, T::TYPE));
    match found {
        Some(value) => Ok(value),
        None => fallback::<T>(args.get(0)?),
    }
}

fn fallback<T: Element>(value: &Value) -> Result<Value, EvalError> {
    read_as(value, T::TYPE).ok_or(EvalError::ReturnType {
        function: format!("fallback of get{}", T::SUFFIX),
        expected: T::TYPE,
        actual: value.value_type(),
    })
}

fn array_len(_: &mut CallContext<'_>, args: &Args) -> Result<Value, EvalError> {
    Ok(Value::Integer(args.array(0)?.len() as i64))
}

fn is_empty(_: &mut CallContext<'_>, args: &Args) -> Result<Value, EvalError> {
    match args.get(0)? {
        Value::Dict(map) => Ok(Value::Boolean(map.is_empty())),
        _ => Ok(Value::Boolean(args.array(0)?.is_empty())),
    }
}

fn contains_key(_: &mut CallContext<'_>, args: &Args) -> Result<Value, EvalError> {
    Ok(Value::Boolean(args.dict(0)?.contains_key(args.string(1)?)))
}

fn dict_keys(_: &mut CallContext<'_>, args: &Args) -> Result<Value, EvalError> {
    let keys = args.dict(0)?.keys().cloned().map(Value::String).collect();
    Ok(Value::Array(keys))
}

fn dict_values(_: &mut CallContext<'_>, args: &Args) -> Result<Value, EvalError> {
    Ok(Value::Array(args.dict(0)?.values().cloned().collect()))
}
