use chrono::{DateTime, Datelike, TimeDelta, Timelike, Utc};

use super::{ArgType, Args, CallContext, FunctionRegistry, NativeFn, Signature};
use crate::{
    error::EvalError,
    value::{Value, ValueType, parse_datetime},
};

const DATETIME: ArgType = ArgType::Of(ValueType::DateTime);
const INTEGER: ArgType = ArgType::Of(ValueType::Integer);
const STRING: ArgType = ArgType::Of(ValueType::String);

pub(super) fn register(registry: &mut FunctionRegistry) {
    registry.add_function(
        "parseUnixTime",
        Signature::new([INTEGER], ValueType::DateTime),
        parse_unix_time,
    );
    registry.add_function("nowLocal", Signature::new([], ValueType::DateTime), |_, _| {
        Ok(Value::DateTime(Utc::now()))
    });
    registry.add_function(
        "addMillis",
        Signature::new([DATETIME, INTEGER], ValueType::DateTime),
        add_millis,
    );
    registry.add_function(
        "parseDateTime",
        Signature::new([STRING], ValueType::DateTime),
        parse_date_time,
    );
    registry.add_function(
        "formatDateAsUTC",
        Signature::new([DATETIME, STRING], ValueType::String),
        format_date_as_utc,
    );

    let setters: [(&str, NativeFn); 7] = [
        ("setYear", set_year),
        ("setMonth", set_month),
        ("setDay", set_day),
        ("setHours", set_hours),
        ("setMinutes", set_minutes),
        ("setSeconds", set_seconds),
        ("setMillis", set_millis),
    ];
    for (name, body) in setters {
        registry.add_function(name, Signature::new([DATETIME, INTEGER], ValueType::DateTime), body);
    }

    let getters: [(&str, NativeFn); 8] = [
        ("getYear", get_year),
        ("getMonth", get_month),
        ("getDay", get_day),
        ("getDayOfWeek", get_day_of_week),
        ("getHours", get_hours),
        ("getMinutes", get_minutes),
        ("getSeconds", get_seconds),
        ("getMillis", get_millis),
    ];
    for (name, body) in getters {
        registry.add_function(name, Signature::new([DATETIME], ValueType::Integer), body);
    }
}

fn parse_unix_time(ctx: &mut CallContext<'_>, args: &Args) -> Result<Value, EvalError> {
    let seconds = args.integer(0)?;
    DateTime::from_timestamp(seconds, 0)
        .map(Value::DateTime)
        .ok_or_else(|| ctx.fail(format!("timestamp {} is out of range", seconds)))
}

fn add_millis(ctx: &mut CallContext<'_>, args: &Args) -> Result<Value, EvalError> {
    let millis = args.integer(1)?;
    TimeDelta::try_milliseconds(millis)
        .and_then(|delta| args.datetime(0).ok()?.checked_add_signed(delta))
        .map(Value::DateTime)
        .ok_or_else(|| ctx.fail("resulting datetime is out of range"))
}

fn parse_date_time(ctx: &mut CallContext<'_>, args: &Args) -> Result<Value, EvalError> {
    let text = args.string(0)?;
    parse_datetime(text)
        .map(Value::DateTime)
        .ok_or_else(|| ctx.fail(format!("'{}' does not match yyyy-MM-dd HH:mm:ss", text)))
}

/// Replaces one field of a datetime, failing when the result does not exist
/// (e.g. February 30th).
fn set_field(
    ctx: &mut CallContext<'_>,
    args: &Args,
    field: &str,
    apply: impl FnOnce(DateTime<Utc>, u32) -> Option<DateTime<Utc>>,
) -> Result<Value, EvalError> {
    let datetime = args.datetime(0)?;
    let value = args.integer(1)?;
    u32::try_from(value)
        .ok()
        .and_then(|value| apply(datetime, value))
        .map(Value::DateTime)
        .ok_or_else(|| ctx.fail(format!("{} {} is out of range", field, value)))
}

fn set_year(ctx: &mut CallContext<'_>, args: &Args) -> Result<Value, EvalError> {
    let datetime = args.datetime(0)?;
    let year = args.integer(1)?;
    i32::try_from(year)
        .ok()
        .and_then(|year| datetime.with_year(year))
        .map(Value::DateTime)
        .ok_or_else(|| ctx.fail(format!("year {} is out of range", year)))
}

fn set_month(ctx: &mut CallContext<'_>, args: &Args) -> Result<Value, EvalError> {
    set_field(ctx, args, "month", |dt, month| dt.with_month(month))
}

fn set_day(ctx: &mut CallContext<'_>, args: &Args) -> Result<Value, EvalError> {
    set_field(ctx, args, "day", |dt, day| dt.with_day(day))
}

fn set_hours(ctx: &mut CallContext<'_>, args: &Args) -> Result<Value, EvalError> {
    set_field(ctx, args, "hour", |dt, hour| dt.with_hour(hour))
}

fn set_minutes(ctx: &mut CallContext<'_>, args: &Args) -> Result<Value, EvalError> {
    set_field(ctx, args, "minute", |dt, minute| dt.with_minute(minute))
}

fn set_seconds(ctx: &mut CallContext<'_>, args: &Args) -> Result<Value, EvalError> {
    set_field(ctx, args, "second", |dt, second| dt.with_second(second))
}

fn set_millis(ctx: &mut CallContext<'_>, args: &Args) -> Result<Value, EvalError> {
    set_field(ctx, args, "millisecond", |dt, millis| {
        if millis > 999 {
            return None;
        }
        dt.with_nanosecond(millis * 1_000_000)
    })
}

fn get_year(_: &mut CallContext<'_>, args: &Args) -> Result<Value, EvalError> {
    Ok(Value::Integer(i64::from(args.datetime(0)?.year())))
}

/// 1 for January.
fn get_month(_: &mut CallContext<'_>, args: &Args) -> Result<Value, EvalError> {
    Ok(Value::Integer(i64::from(args.datetime(0)?.month())))
}

fn get_day(_: &mut CallContext<'_>, args: &Args) -> Result<Value, EvalError> {
    Ok(Value::Integer(i64::from(args.datetime(0)?.day())))
}

/// 1 for Monday through 7 for Sunday.
fn get_day_of_week(_: &mut CallContext<'_>, args: &Args) -> Result<Value, EvalError> {
    let weekday = args.datetime(0)?.weekday();
    Ok(Value::Integer(i64::from(weekday.number_from_monday())))
}

fn get_hours(_: &mut CallContext<'_>, args: &Args) -> Result<Value, EvalError> {
    Ok(Value::Integer(i64::from(args.datetime(0)?.hour())))
}

fn get_minutes(_: &mut CallContext<'_>, args: &Args) -> Result<Value, EvalError> {
    Ok(Value::Integer(i64::from(args.datetime(0)?.minute())))
}

fn get_seconds(_: &mut CallContext<'_>, args: &Args) -> Result<Value, EvalError> {
    Ok(Value::Integer(i64::from(args.datetime(0)?.second())))
}

fn get_millis(_: &mut CallContext<'_>, args: &Args) -> Result<Value, EvalError> {
    Ok(Value::Integer(i64::from(args.datetime(0)?.timestamp_subsec_millis())))
}

fn format_date_as_utc(ctx: &mut CallContext<'_>, args: &Args) -> Result<Value, EvalError> {
    let datetime = args.datetime(0)?;
    let pattern = translate_pattern(args.string(1)?).map_err(|e| ctx.fail(e))?;
    Ok(Value::String(datetime.format(&pattern).to_string()))
}

/// Translates a `yyyy-MM-dd HH:mm:ss`-style pattern to a chrono format
/// string. Text between single quotes is copied literally, `''` is a quote.
fn translate_pattern(pattern: &str) -> Result<String, String> {
    let chars: Vec<char> = pattern.chars().collect();
    let mut out = String::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        if c == '\'' {
            if chars.get(i + 1) == Some(&'\'') {
                out.push('\'');
                i += 2;
                continue;
            }
            let close = chars[i + 1..]
                .iter()
                .position(|&ch| ch == '\'')
                .ok_or_else(|| "unterminated quote in date pattern".to_string())?;
            for &ch in &chars[i + 1..i + 1 + close] {
                push_literal(&mut out, ch);
            }
            i += close + 2;
            continue;
        }

        if !c.is_ascii_alphabetic() {
            push_literal(&mut out, c);
            i += 1;
            continue;
        }

        let run = chars[i..].iter().take_while(|&&ch| ch == c).count();
        let spec = match (c, run) {
            ('y', 2) => "%y",
            ('y', _) => "%Y",
            ('M', 1) => "%-m",
            ('M', 2) => "%m",
            ('M', 3) => "%b",
            ('M', _) => "%B",
            ('d', 1) => "%-d",
            ('d', _) => "%d",
            ('H', 1) => "%-H",
            ('H', _) => "%H",
            ('h', 1) => "%-I",
            ('h', _) => "%I",
            ('m', 1) => "%-M",
            ('m', _) => "%M",
            ('s', 1) => "%-S",
            ('s', _) => "%S",
            ('S', _) => "%3f",
            ('a', _) => "%p",
            ('E', 1..=3) => "%a",
            ('E', _) => "%A",
            ('z', _) => "%Z",
            ('Z', _) => "%z",
            _ => return Err(format!("unsupported date pattern letter '{}'", c)),
        };
        out.push_str(spec);
        i += run;
    }

    Ok(out)
}

fn push_literal(out: &mut String, c: char) {
    if c == '%' {
        out.push_str("%%");
    } else {
        out.push(c);
    }
}
