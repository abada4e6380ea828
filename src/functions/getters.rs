//! `getIntegerValue('name', fallback)` and friends.
//!
//! These read a variable by a name computed at runtime. The name is recorded
//! as read even when the variable is missing, so that declaring it later
//! re-evaluates the expression.

use super::{
    ArgType, Args, ArrayElement, BooleanElement, CallContext, ColorElement, DictElement, Element,
    FunctionRegistry, IntegerElement, NumberElement, Signature, StringElement, UrlElement,
    fallback_arg, read_as,
};
use crate::{
    error::EvalError,
    value::{Value, ValueType},
};

pub(super) fn register(registry: &mut FunctionRegistry) {
    register_getter::<IntegerElement>(registry);
    register_getter::<NumberElement>(registry);
    register_getter::<StringElement>(registry);
    register_getter::<BooleanElement>(registry);
    register_getter::<ColorElement>(registry);
    register_getter::<UrlElement>(registry);
    register_getter::<ArrayElement>(registry);
    register_getter::<DictElement>(registry);
}

fn register_getter<T: Element>(registry: &mut FunctionRegistry) {
    registry.add_function(
        &format!("get{}Value", T::SUFFIX),
        Signature::new(
            [ArgType::Of(ValueType::String), fallback_arg(T::TYPE)],
            T::TYPE,
        ),
        get_value::<T>,
    );
}

fn get_value<T: Element>(ctx: &mut CallContext<'_>, args: &Args) -> Result<Value, EvalError> {
    let name = args.string(0)?;

    let found = ctx.read_variable(name);
    if let Some(value) = found.as_ref().and_then(|v| read_as(v, T::TYPE)) {
        return Ok(value);
    }

    let fallback = args.get(1)?;
    let fallback = read_as(fallback, T::TYPE).ok_or_else(|| {
        ctx.fail(format!(
            "fallback must be {}, got {}",
            T::TYPE,
            fallback.value_type()
        ))
    })?;

    if ctx.config().warn_on_fallback {
        let reason = match found {
            Some(value) => format!("has type {}", value.value_type()),
            None => "is not defined".to_string(),
        };
        ctx.warn(format!(
            "variable '{}' {}, using fallback {}",
            name, reason, fallback
        ));
    }
    Ok(fallback)
}
