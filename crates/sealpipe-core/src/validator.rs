//! Checks decrypted payloads against their declared format.
//!
//! Scalars reproduced by a remote pipeline are sealed as text, so the
//! scalar formats accept both the JSON scalar and its canonical text form.

use quick_xml::{Reader, events::Event};
use sealpipe_proto::MessageFormat;
use serde_json::Value;
use url::Url;

use crate::{ProcedureError, Result, datum::value_kind};

/// CSV field delimiter.
const CSV_DELIMITER: char = ',';

/// Format checks for payloads and submission arguments.
#[derive(Debug, Clone, Copy, Default)]
pub struct TypeValidator;

impl TypeValidator {
    /// True if `value` has the shape `format` declares.
    pub fn matches(value: &Value, format: MessageFormat) -> bool {
        match format {
            MessageFormat::Raw => true,
            MessageFormat::String => value.is_string(),
            MessageFormat::Boolean => match value {
                Value::Bool(_) => true,
                Value::String(text) => matches!(text.as_str(), "true" | "false" | "1" | "0"),
                _ => false,
            },
            MessageFormat::Integer => match value {
                Value::Number(number) => number.is_i64() || number.is_u64(),
                Value::String(text) => text.parse::<i64>().is_ok(),
                _ => false,
            },
            MessageFormat::Number => match value {
                Value::Number(_) => true,
                Value::String(text) => text.parse::<f64>().is_ok_and(f64::is_finite),
                _ => false,
            },
            MessageFormat::Array => value.is_array(),
            MessageFormat::Object => value.is_object(),
            MessageFormat::Csv => value.as_str().is_some_and(is_csv),
            MessageFormat::Json => {
                value.as_str().is_some_and(|text| serde_json::from_str::<Value>(text).is_ok())
            },
            MessageFormat::Url => value.as_str().is_some_and(is_http_url),
            MessageFormat::Xml => value.as_str().is_some_and(is_well_formed_xml),
        }
    }

    /// Fail with `PayloadTypeMismatch` unless `value` matches `format`.
    pub fn validate(field: &str, value: &Value, format: MessageFormat) -> Result<()> {
        if Self::matches(value, format) {
            Ok(())
        } else {
            Err(ProcedureError::PayloadTypeMismatch {
                field: field.to_string(),
                expected: format,
                found: value_kind(value),
            })
        }
    }
}

fn is_csv(text: &str) -> bool {
    text.split(CSV_DELIMITER).any(|field| !field.trim().is_empty())
}

fn is_http_url(text: &str) -> bool {
    if text.trim() != text {
        return false;
    }

    Url::parse(text).is_ok_and(|url| {
        matches!(url.scheme(), "http" | "https") && url.host_str().is_some_and(|host| !host.is_empty())
    })
}

fn is_well_formed_xml(text: &str) -> bool {
    let mut reader = Reader::from_str(text);
    let mut depth = 0usize;
    let mut roots = 0usize;

    loop {
        match reader.read_event() {
            Ok(Event::Start(_)) => {
                if depth == 0 {
                    roots += 1;
                }
                depth += 1;
            },
            Ok(Event::End(_)) => {
                if depth == 0 {
                    return false;
                }
                depth -= 1;
            },
            Ok(Event::Empty(_)) => {
                if depth == 0 {
                    roots += 1;
                }
            },
            Ok(Event::Text(text)) => {
                if depth == 0 && !text.iter().all(u8::is_ascii_whitespace) {
                    return false;
                }
            },
            Ok(Event::CData(_)) if depth == 0 => return false,
            Ok(Event::Eof) => return depth == 0 && roots == 1,
            Ok(_) => {},
            Err(_) => return false,
        }
    }
}
