use super::{ArgType, Args, CallContext, FunctionRegistry, NativeFn, Signature};
use crate::{
    color::{Channel, Color},
    error::EvalError,
    value::{Value, ValueType},
};

const NUMBER: ArgType = ArgType::Of(ValueType::Number);
/// Colors may also be passed as `#AARRGGBB` strings.
const COLOR: ArgType = ArgType::OneOf(&[ValueType::Color, ValueType::String]);

pub(super) fn register(registry: &mut FunctionRegistry) {
    registry.add_function(
        "argb",
        Signature::new([NUMBER, NUMBER, NUMBER, NUMBER], ValueType::Color),
        argb,
    );
    registry.add_function("rgb", Signature::new([NUMBER, NUMBER, NUMBER], ValueType::Color), rgb);

    let channels: [(&str, NativeFn, NativeFn); 4] = [
        ("Alpha", get_alpha, set_alpha),
        ("Red", get_red, set_red),
        ("Green", get_green, set_green),
        ("Blue", get_blue, set_blue),
    ];
    for (channel, get, set) in channels {
        registry.add_function(
            &format!("getColor{}", channel),
            Signature::new([COLOR], ValueType::Number),
            get,
        );
        registry.add_function(
            &format!("setColor{}", channel),
            Signature::new([COLOR, NUMBER], ValueType::Color),
            set,
        );
    }
}

/// Converts a channel intensity in `0.0..=1.0` to its 8-bit value.
fn component(ctx: &CallContext<'_>, value: f64) -> Result<u8, EvalError> {
    if !(0.0..=1.0).contains(&value) {
        return Err(ctx.fail(format!("color component {} is out of range 0..1", value)));
    }
    Ok((value * 255.0).round() as u8)
}

fn argb(ctx: &mut CallContext<'_>, args: &Args) -> Result<Value, EvalError> {
    Ok(Value::Color(Color::from_argb(
        component(ctx, args.number(0)?)?,
        component(ctx, args.number(1)?)?,
        component(ctx, args.number(2)?)?,
        component(ctx, args.number(3)?)?,
    )))
}

fn rgb(ctx: &mut CallContext<'_>, args: &Args) -> Result<Value, EvalError> {
    Ok(Value::Color(Color::from_argb(
        0xFF,
        component(ctx, args.number(0)?)?,
        component(ctx, args.number(1)?)?,
        component(ctx, args.number(2)?)?,
    )))
}

fn get_channel(args: &Args, channel: Channel) -> Result<Value, EvalError> {
    let color = args.color(0)?;
    Ok(Value::Number(f64::from(color.channel(channel)) / 255.0))
}

fn set_channel(ctx: &mut CallContext<'_>, args: &Args, channel: Channel) -> Result<Value, EvalError> {
    let color = args.color(0)?;
    let value = component(ctx, args.number(1)?)?;
    Ok(Value::Color(color.with_channel(channel, value)))
}

fn get_alpha(_: &mut CallContext<'_>, args: &Args) -> Result<Value, EvalError> {
    get_channel(args, Channel::Alpha)
}

fn get_red(_: &mut CallContext<'_>, args: &Args) -> Result<Value, EvalError> {
    get_channel(args, Channel::Red)
}

fn get_green(_: &mut CallContext<'_>, args: &Args) -> Result<Value, EvalError> {
    get_channel(args, Channel::Green)
}

fn get_blue(_: &mut CallContext<'_>, args: &Args) -> Result<Value, EvalError> {
    get_channel(args, Channel::Blue)
}

fn set_alpha(ctx: &mut CallContext<'_>, args: &Args) -> Result<Value, EvalError> {
    set_channel(ctx, args, Channel::Alpha)
}

fn set_red(ctx: &mut CallContext<'_>, args: &Args) -> Result<Value, EvalError> {
    set_channel(ctx, args, Channel::Red)
}

fn set_green(ctx: &mut CallContext<'_>, args: &Args) -> Result<Value, EvalError> {
    set_channel(ctx, args, Channel::Green)
}

fn set_blue(ctx: &mut CallContext<'_>, args: &Args) -> Result<Value, EvalError> {
    set_channel(ctx, args, Channel::Blue)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_intensity_round_trips_through_bytes() {
        let color = Color::from_argb(0xFF, 0x80, 0x00, 0x33);
        assert_eq!(f64::from(color.channel(Channel::Alpha)) / 255.0, 1.0);
        assert_eq!((0.2 * 255.0f64).round() as u8, 0x33);
    }
}
