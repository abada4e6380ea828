use super::{ArgType, Args, CallContext, FunctionRegistry, Signature, add_overloads};
use crate::{
    error::EvalError,
    value::{Value, ValueType},
};

const INTEGER: ArgType = ArgType::Of(ValueType::Integer);
const NUMBER: ArgType = ArgType::Of(ValueType::Number);

/// Integer overload first so that integer arguments stay integers.
fn unary() -> [Signature; 2] {
    [
        Signature::new([INTEGER], ValueType::Integer),
        Signature::new([NUMBER], ValueType::Number),
    ]
}

fn binary() -> [Signature; 2] {
    [
        Signature::new([INTEGER, INTEGER], ValueType::Integer),
        Signature::new([NUMBER, NUMBER], ValueType::Number),
    ]
}

fn variadic() -> [Signature; 2] {
    [
        Signature::new([INTEGER], ValueType::Integer).variadic(INTEGER),
        Signature::new([NUMBER], ValueType::Number).variadic(NUMBER),
    ]
}

pub(super) fn register(registry: &mut FunctionRegistry) {
    add_overloads(registry, "div", binary(), div);
    add_overloads(registry, "mod", binary(), modulo);
    add_overloads(registry, "mul", variadic(), mul);
    add_overloads(registry, "sub", variadic(), sub);
    add_overloads(registry, "sum", variadic(), sum);
    add_overloads(registry, "max", variadic(), max);
    add_overloads(registry, "min", variadic(), min);
    add_overloads(registry, "abs", unary(), abs);
    add_overloads(registry, "signum", unary(), signum);

    registry.add_function("round", Signature::new([NUMBER], ValueType::Number), round);
    registry.add_function("floor", Signature::new([NUMBER], ValueType::Number), floor);
    registry.add_function("ceil", Signature::new([NUMBER], ValueType::Number), ceil);
    registry.add_function(
        "copySign",
        Signature::new([NUMBER, NUMBER], ValueType::Number),
        copy_sign,
    );

    registry.add_function("maxInteger", Signature::new([], ValueType::Integer), |_, _| {
        Ok(Value::Integer(i64::MAX))
    });
    registry.add_function("minInteger", Signature::new([], ValueType::Integer), |_, _| {
        Ok(Value::Integer(i64::MIN))
    });
    registry.add_function("maxNumber", Signature::new([], ValueType::Number), |_, _| {
        Ok(Value::Number(f64::MAX))
    });
    // Smallest positive number, not the most negative one
    registry.add_function("minNumber", Signature::new([], ValueType::Number), |_, _| {
        Ok(Value::Number(f64::from_bits(1)))
    });
}

/// Folds all arguments with a checked integer operation or a float one,
/// depending on which overload matched.
fn fold(
    args: &Args,
    operator: &'static str,
    int_op: fn(i64, i64) -> Option<i64>,
    float_op: fn(f64, f64) -> f64,
) -> Result<Value, EvalError> {
    let mut values = args.values().iter();
    let first = match values.next() {
        Some(value) => value.clone(),
        None => return args.get(0).cloned(),
    };

    values.try_fold(first, |acc, value| match (acc, value) {
        (Value::Integer(a), Value::Integer(b)) => int_op(a, *b)
            .map(Value::Integer)
            .ok_or(EvalError::IntegerOverflow { operator }),
        (acc, value) => match (acc.as_number(), value.as_number()) {
            (Some(a), Some(b)) => Ok(Value::Number(float_op(a, b))),
            _ => Err(EvalError::InvalidOperands {
                operator,
                left: acc.value_type(),
                right: value.value_type(),
            }),
        },
    })
}

fn div(_: &mut CallContext<'_>, args: &Args) -> Result<Value, EvalError> {
    match (args.get(0)?, args.get(1)?) {
        (Value::Integer(_), Value::Integer(0)) => Err(EvalError::DivisionByZero),
        (Value::Integer(a), Value::Integer(b)) => a
            .checked_div(*b)
            .map(Value::Integer)
            .ok_or(EvalError::IntegerOverflow { operator: "div" }),
        _ => {
            let (a, b) = (args.number(0)?, args.number(1)?);
            if b == 0.0 {
                return Err(EvalError::DivisionByZero);
            }
            Ok(Value::Number(a / b))
        }
    }
}

fn modulo(_: &mut CallContext<'_>, args: &Args) -> Result<Value, EvalError> {
    match (args.get(0)?, args.get(1)?) {
        (Value::Integer(_), Value::Integer(0)) => Err(EvalError::DivisionByZero),
        (Value::Integer(a), Value::Integer(b)) => a
            .checked_rem(*b)
            .map(Value::Integer)
            .ok_or(EvalError::IntegerOverflow { operator: "mod" }),
        _ => {
            let (a, b) = (args.number(0)?, args.number(1)?);
            if b == 0.0 {
                return Err(EvalError::DivisionByZero);
            }
            Ok(Value::Number(a % b))
        }
    }
}

fn mul(_: &mut CallContext<'_>, args: &Args) -> Result<Value, EvalError> {
    fold(args, "mul", i64::checked_mul, |a, b| a * b)
}

fn sub(_: &mut CallContext<'_>, args: &Args) -> Result<Value, EvalError> {
    fold(args, "sub", i64::checked_sub, |a, b| a - b)
}

fn sum(_: &mut CallContext<'_>, args: &Args) -> Result<Value, EvalError> {
    fold(args, "sum", i64::checked_add, |a, b| a + b)
}

fn max(_: &mut CallContext<'_>, args: &Args) -> Result<Value, EvalError> {
    fold(args, "max", |a, b| Some(a.max(b)), f64::max)
}

fn min(_: &mut CallContext<'_>, args: &Args) -> Result<Value, EvalError> {
    fold(args, "min", |a, b| Some(a.min(b)), f64::min)
}

fn abs(_: &mut CallContext<'_>, args: &Args) -> Result<Value, EvalError> {
    match args.get(0)? {
        Value::Integer(n) => n
            .checked_abs()
            .map(Value::Integer)
            .ok_or(EvalError::IntegerOverflow { operator: "abs" }),
        _ => Ok(Value::Number(args.number(0)?.abs())),
    }
}

fn signum(_: &mut CallContext<'_>, args: &Args) -> Result<Value, EvalError> {
    match args.get(0)? {
        Value::Integer(n) => Ok(Value::Integer(n.signum())),
        _ => {
            let n = args.number(0)?;
            // f64::signum maps 0.0 to 1.0
            let sign = if n == 0.0 || n.is_nan() { n } else { n.signum() };
            Ok(Value::Number(sign))
        }
    }
}

fn round(_: &mut CallContext<'_>, args: &Args) -> Result<Value, EvalError> {
    Ok(Value::Number(args.number(0)?.round()))
}

fn floor(_: &mut CallContext<'_>, args: &Args) -> Result<Value, EvalError> {
    Ok(Value::Number(args.number(0)?.floor()))
}

fn ceil(_: &mut CallContext<'_>, args: &Args) -> Result<Value, EvalError> {
    Ok(Value::Number(args.number(0)?.ceil()))
}

fn copy_sign(_: &mut CallContext<'_>, args: &Args) -> Result<Value, EvalError> {
    Ok(Value::Number(args.number(0)?.copysign(args.number(1)?)))
}
