//! Pipeline steps and their textual encoding.
//!
//! A step attaches one whitelisted operation to one argument slot of the
//! function a pipeline invokes:
//!
//! ```text
//! pv1a2b3c4d5e6f7a8b[input:sodium_crypto_box_seal.1],base64_decode,20,1
//! └──── channel ───┘ └role┘ └──── function ────┘ │  └─operation─┘ │  └ arity
//!                                     argument index ┘      priority ┘
//! ```
//!
//! # Grammar
//!
//! ```text
//! step     = channel "[" role ":" ident "." index "]" "," ident "," priority "," arity
//! channel  = 1*64( ALPHA / DIGIT / "_" / "-" )
//! role     = "input" / "output"
//! ident    = ( ALPHA / "_" ) *63( ALPHA / DIGIT / "_" )
//! index    = "0" / ( %x31-39 *2DIGIT )          ; 0..=255
//! priority = [ "-" ] ( "0" / %x31-39 *9DIGIT )  ; fits i32, no "-0"
//! arity    = %x31-38                             ; 1..=8
//! ```
//!
//! # Invariants
//!
//! - `parse(step.to_string()) == step` for every constructible step
//! - Whitespace, leading zeros, and trailing input are always rejected

use std::{fmt, str::FromStr};

use crate::{ProtocolError, Result};

/// Maximum channel length in bytes.
pub const MAX_CHANNEL_LEN: usize = 64;

/// Maximum identifier length in bytes.
pub const MAX_IDENT_LEN: usize = 64;

/// Maximum step arity.
pub const MAX_ARITY: u8 = 8;

/// Which side of the invoked function a step transforms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Role {
    /// An argument, before the function runs
    Input,
    /// The return value, after the function runs
    Output,
}

impl Role {
    /// Wire spelling.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Input => "input",
            Self::Output => "output",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Slot a step writes to: (role, function, argument index).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetSelector {
    /// Input argument or output value
    pub role: Role,
    /// Canonical name of the invoked function
    pub function: String,
    /// Positional argument index (0 for outputs)
    pub argument_index: u8,
}

impl TargetSelector {
    /// Selector for input argument `index` of `function`.
    pub fn input(function: impl Into<String>, index: u8) -> Self {
        Self { role: Role::Input, function: function.into(), argument_index: index }
    }

    /// Selector for output `index` of `function`.
    pub fn output(function: impl Into<String>, index: u8) -> Self {
        Self { role: Role::Output, function: function.into(), argument_index: index }
    }
}

impl fmt::Display for TargetSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}.{}", self.role, self.function, self.argument_index)
    }
}

/// One step of a pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PipelineStep {
    /// Namespace shared by all steps of one descriptor
    pub channel: String,
    /// Slot this step transforms
    pub target: TargetSelector,
    /// Whitelisted operation name
    pub operation: String,
    /// Lower runs first; ties keep insertion order
    pub priority: i32,
    /// Number of positional arguments the operation receives
    pub arity: u8,
}

impl PipelineStep {
    /// Build a step, enforcing the same rules as the parser.
    pub fn new(
        channel: impl Into<String>,
        target: TargetSelector,
        operation: impl Into<String>,
        priority: i32,
        arity: u8,
    ) -> Result<Self> {
        let step =
            Self { channel: channel.into(), target, operation: operation.into(), priority, arity };
        step.validate()?;
        Ok(step)
    }

    fn validate(&self) -> Result<()> {
        if !is_channel(&self.channel) {
            return Err(malformed(0, "channel must be 1-64 of [A-Za-z0-9_-]"));
        }
        if !is_ident(&self.target.function) {
            return Err(malformed(0, "function must be an identifier"));
        }
        if !is_ident(&self.operation) {
            return Err(malformed(0, "operation must be an identifier"));
        }
        if !(1..=MAX_ARITY).contains(&self.arity) {
            return Err(malformed(0, "arity must be 1-8"));
        }
        Ok(())
    }
}

impl fmt::Display for PipelineStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}[{}],{},{},{}",
            self.channel, self.target, self.operation, self.priority, self.arity
        )
    }
}

impl FromStr for PipelineStep {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self> {
        let mut cursor = Cursor { input: s.as_bytes(), pos: 0 };

        let channel = cursor.take_while(is_channel_byte);
        if channel.is_empty() || channel.len() > MAX_CHANNEL_LEN {
            return Err(malformed(cursor.pos, "channel must be 1-64 of [A-Za-z0-9_-]"));
        }
        cursor.expect(b'[', "expected '[' after channel")?;

        let role_start = cursor.pos;
        let role = match cursor.take_while(|b| b.is_ascii_lowercase()) {
            "input" => Role::Input,
            "output" => Role::Output,
            _ => return Err(malformed(role_start, "role must be 'input' or 'output'")),
        };
        cursor.expect(b':', "expected ':' after role")?;

        let function = cursor.ident()?;
        cursor.expect(b'.', "expected '.' after function")?;

        let index_start = cursor.pos;
        let index = cursor.unsigned()?;
        let argument_index =
            u8::try_from(index).map_err(|_| malformed(index_start, "argument index exceeds 255"))?;
        cursor.expect(b']', "expected ']' after argument index")?;
        cursor.expect(b',', "expected ',' after selector")?;

        let operation = cursor.ident()?;
        cursor.expect(b',', "expected ',' after operation")?;

        let priority = cursor.priority()?;
        cursor.expect(b',', "expected ',' after priority")?;

        let arity_start = cursor.pos;
        let arity = match cursor.bump() {
            Some(b @ b'1'..=b'8') => b - b'0',
            _ => return Err(malformed(arity_start, "arity must be a single digit 1-8")),
        };

        if cursor.pos != cursor.input.len() {
            return Err(malformed(cursor.pos, "unexpected trailing input"));
        }

        Ok(Self {
            channel: channel.to_string(),
            target: TargetSelector { role, function: function.to_string(), argument_index },
            operation: operation.to_string(),
            priority,
            arity,
        })
    }
}

fn malformed(position: usize, reason: &'static str) -> ProtocolError {
    ProtocolError::MalformedStep { position, reason }
}

fn is_channel_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'-'
}

/// True if `s` is a valid channel.
pub fn is_channel(s: &str) -> bool {
    !s.is_empty() && s.len() <= MAX_CHANNEL_LEN && s.bytes().all(is_channel_byte)
}

/// True if `s` is a valid function or operation identifier.
pub fn is_ident(s: &str) -> bool {
    let bytes = s.as_bytes();
    match bytes.first() {
        Some(first) if first.is_ascii_alphabetic() || *first == b'_' => {
            bytes.len() <= MAX_IDENT_LEN
                && bytes.iter().all(|b| b.is_ascii_alphanumeric() || *b == b'_')
        },
        _ => false,
    }
}

/// Byte cursor over an ASCII step string.
struct Cursor<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let b = self.peek()?;
        self.pos += 1;
        Some(b)
    }

    fn expect(&mut self, wanted: u8, reason: &'static str) -> Result<()> {
        match self.peek() {
            Some(b) if b == wanted => {
                self.pos += 1;
                Ok(())
            },
            _ => Err(malformed(self.pos, reason)),
        }
    }

    /// Consume the longest run of bytes matching `pred`.
    ///
    /// Every predicate used here only accepts ASCII, so the run is valid
    /// UTF-8 on its own.
    fn take_while(&mut self, pred: impl Fn(u8) -> bool) -> &'a str {
        let input = self.input;
        let start = self.pos;
        while self.peek().is_some_and(&pred) {
            self.pos += 1;
        }
        std::str::from_utf8(&input[start..self.pos]).unwrap_or_default()
    }

    fn ident(&mut self) -> Result<&'a str> {
        let start = self.pos;
        let ident = self.take_while(|b| b.is_ascii_alphanumeric() || b == b'_');
        if is_ident(ident) {
            Ok(ident)
        } else {
            Err(malformed(start, "expected identifier [A-Za-z_][A-Za-z0-9_]{0,63}"))
        }
    }

    /// Decimal without sign or leading zeros, at most 10 digits.
    fn unsigned(&mut self) -> Result<u64> {
        let start = self.pos;
        let digits = self.take_while(|b| b.is_ascii_digit());
        if digits.is_empty() {
            return Err(malformed(start, "expected digits"));
        }
        if digits.len() > 1 && digits.starts_with('0') {
            return Err(malformed(start, "leading zeros are not allowed"));
        }
        if digits.len() > 10 {
            return Err(malformed(start, "number too long"));
        }
        digits.parse().map_err(|_| malformed(start, "expected digits"))
    }

    fn priority(&mut self) -> Result<i32> {
        let start = self.pos;
        let negative = self.peek() == Some(b'-');
        if negative {
            self.pos += 1;
        }

        let magnitude = i64::try_from(self.unsigned()?)
            .map_err(|_| malformed(start, "priority out of range"))?;
        if negative && magnitude == 0 {
            return Err(malformed(start, "negative zero priority"));
        }

        let value = if negative { -magnitude } else { magnitude };
        i32::try_from(value).map_err(|_| malformed(start, "priority out of range"))
    }
}
