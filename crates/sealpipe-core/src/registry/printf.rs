//! The restricted format language of `sprintf`/`vsprintf`.
//!
//! Supported directives: `%%`, `%s`, `%d`, `%N$s` and `%N$d` (positions are
//! 1-based). Widths, flags and other conversions are rejected instead of
//! ignored.

use serde_json::Value;

use crate::{ProcedureError, Result, datum::value_kind};

/// Render `template` with `args`.
pub(crate) fn render(operation: &'static str, template: &str, args: &[Value]) -> Result<String> {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();
    let mut sequential = 0usize;

    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }

        let mut digits = String::new();
        while let Some(digit) = chars.peek().copied().filter(char::is_ascii_digit) {
            digits.push(digit);
            chars.next();
        }

        let position = if digits.is_empty() {
            None
        } else {
            if chars.next() != Some('$') {
                return Err(unsupported(operation));
            }
            match digits.parse::<usize>() {
                Ok(position) if position > 0 => Some(position - 1),
                _ => return Err(unsupported(operation)),
            }
        };

        let conversion = chars.next();
        if conversion == Some('%') && position.is_none() {
            out.push('%');
            continue;
        }

        let index = match position {
            Some(index) => index,
            None => {
                sequential += 1;
                sequential - 1
            },
        };
        let arg = args.get(index).ok_or(ProcedureError::ArityMismatch {
            operation,
            expected: index + 1,
            got: args.len(),
        })?;

        match conversion {
            Some('s') => out.push_str(&as_string(operation, arg)?),
            Some('d') => out.push_str(&as_integer(operation, arg)?),
            _ => return Err(unsupported(operation)),
        }
    }

    Ok(out)
}

fn unsupported(operation: &'static str) -> ProcedureError {
    ProcedureError::TypeMismatch {
        operation,
        expected: "one of %%, %s, %d, %N$s, %N$d",
        found: "unsupported directive",
    }
}

fn as_string(operation: &'static str, value: &Value) -> Result<String> {
    match value {
        Value::String(text) => Ok(text.clone()),
        Value::Number(number) => Ok(number.to_string()),
        Value::Bool(flag) => Ok(flag.to_string()),
        Value::Null => Ok(String::new()),
        other => Err(ProcedureError::TypeMismatch {
            operation,
            expected: "scalar for %s",
            found: value_kind(other),
        }),
    }
}

fn as_integer(operation: &'static str, value: &Value) -> Result<String> {
    let mismatch = |found| ProcedureError::TypeMismatch { operation, expected: "integer for %d", found };

    match value {
        Value::Number(number) => {
            if let Some(n) = number.as_i64() {
                Ok(n.to_string())
            } else if let Some(n) = number.as_u64() {
                Ok(n.to_string())
            } else {
                match number.as_f64() {
                    Some(f) if f.is_finite() => Ok((f.trunc() as i64).to_string()),
                    _ => Err(mismatch("non-finite number")),
                }
            }
        },
        Value::String(text) => {
            text.trim().parse::<i64>().map(|n| n.to_string()).map_err(|_| mismatch("string"))
        },
        Value::Bool(flag) => Ok(u8::from(*flag).to_string()),
        Value::Null => Ok("0".to_string()),
        other => Err(mismatch(value_kind(other))),
    }
}
