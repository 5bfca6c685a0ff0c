// src/msgproto.rs
// Message formats exchanged with the MCU.
//
// A message format is described textually, e.g. `oams_cmd_follower
// enable=%c direction=%c`. Binary framing belongs to the transport; this
// module only knows field names, field widths and their order.

use std::collections::HashMap;
use std::fmt;

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MsgProtoError {
    #[error("malformed message format '{0}'")]
    MalformedFormat(String),
    #[error("unknown field type '{field_type}' in message format '{format}'")]
    UnknownFieldType { format: String, field_type: String },
    #[error("command '{name}' expects {expected} parameters, got {got}")]
    ParamCount { name: String, expected: usize, got: usize },
    #[error("value {value} out of range for field '{field}' ({field_type}) of '{name}'")]
    OutOfRange { name: String, field: String, field_type: FieldType, value: u32 },
    #[error("message '{name}' is missing field '{field}'")]
    MissingField { name: String, field: String },
    #[error("field '{field}' of '{name}' is not an integer that fits {field_type}")]
    BadField { name: String, field: String, field_type: FieldType },
}

/// Width of a wire field. Only the integer types used by the OAMS protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    U32, // %u
    U8,  // %c
}

impl FieldType {
    fn from_conversion(conv: &str) -> Option<Self> {
        match conv {
            "%u" => Some(FieldType::U32),
            "%c" => Some(FieldType::U8),
            _ => None,
        }
    }

    pub fn max_value(self) -> u32 {
        match self {
            FieldType::U32 => u32::MAX,
            FieldType::U8 => u8::MAX as u32,
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::U32 => write!(f, "%u"),
            FieldType::U8 => write!(f, "%c"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageFormat {
    name: String,
    fields: Vec<(String, FieldType)>,
}

impl MessageFormat {
    pub fn parse(msgformat: &str) -> Result<Self, MsgProtoError> {
        let mut parts = msgformat.split_whitespace();
        let name = parts
            .next()
            .ok_or_else(|| MsgProtoError::MalformedFormat(msgformat.to_string()))?
            .to_string();
        let mut fields = Vec::new();
        for part in parts {
            let (field, conv) = part
                .split_once('=')
                .filter(|(field, _)| !field.is_empty())
                .ok_or_else(|| MsgProtoError::MalformedFormat(msgformat.to_string()))?;
            let field_type = FieldType::from_conversion(conv).ok_or_else(|| MsgProtoError::UnknownFieldType {
                format: msgformat.to_string(),
                field_type: conv.to_string(),
            })?;
            fields.push((field.to_string(), field_type));
        }
        Ok(MessageFormat { name, fields })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(n, _)| n.as_str())
    }

    /// Builds a command from positional values, checking count and width.
    pub fn encode(&self, values: &[u32]) -> Result<Command, MsgProtoError> {
        if values.len() != self.fields.len() {
            return Err(MsgProtoError::ParamCount {
                name: self.name.clone(),
                expected: self.fields.len(),
                got: values.len(),
            });
        }
        let mut params = Vec::with_capacity(values.len());
        for ((field, field_type), &value) in self.fields.iter().zip(values) {
            if value > field_type.max_value() {
                return Err(MsgProtoError::OutOfRange {
                    name: self.name.clone(),
                    field: field.clone(),
                    field_type: *field_type,
                    value,
                });
            }
            params.push((field.clone(), value));
        }
        Ok(Command { name: self.name.clone(), params })
    }
}

/// An encoded host->device message, ready for the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    name: String,
    params: Vec<(String, u32)>,
}

impl Command {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn params(&self) -> &[(String, u32)] {
        &self.params
    }

    pub fn get(&self, field: &str) -> Option<u32> {
        self.params.iter().find(|(n, _)| n == field).map(|(_, v)| *v)
    }
}

// Text form as accepted by `add_config_cmd`: `name a=1 b=2`.
impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        for (field, value) in &self.params {
            write!(f, " {}={}", field, value)?;
        }
        Ok(())
    }
}

/// Field value of a decoded incoming message.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Float(f64),
    Int(i64),
    String(String),
}

/// Decoded device->host message, keyed by field name. The transport may add
/// bookkeeping entries such as `#receive_time`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MessageParams {
    name: String,
    fields: HashMap<String, ParamValue>,
}

impl MessageParams {
    pub fn new(name: impl Into<String>) -> Self {
        MessageParams { name: name.into(), fields: HashMap::new() }
    }

    pub fn with(mut self, field: impl Into<String>, value: ParamValue) -> Self {
        self.fields.insert(field.into(), value);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get_u8(&self, field: &str) -> Result<u8, MsgProtoError> {
        match self.fields.get(field) {
            None => Err(MsgProtoError::MissingField { name: self.name.clone(), field: field.to_string() }),
            Some(ParamValue::Int(v)) => u8::try_from(*v).map_err(|_| MsgProtoError::BadField {
                name: self.name.clone(),
                field: field.to_string(),
                field_type: FieldType::U8,
            }),
            Some(_) => Err(MsgProtoError::BadField {
                name: self.name.clone(),
                field: field.to_string(),
                field_type: FieldType::U8,
            }),
        }
    }
}
