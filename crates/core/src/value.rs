//! Registry values and their payload codec
//!
//! A [`Value`] carries its raw payload exactly as the server returned it.
//! [`ValueData`] is the decoded form; conversion in both directions is keyed
//! by [`ValueType`].
//!
//! ## Wire encodings
//!
//! | Type | Payload |
//! |------|---------|
//! | `REG_SZ`, `REG_EXPAND_SZ` | UTF-16LE, NUL terminated |
//! | `REG_MULTI_SZ` | UTF-16LE strings, each NUL terminated, then one more NUL |
//! | `REG_DWORD` | 4 bytes little-endian |
//! | `REG_DWORD_BIG_ENDIAN` | 4 bytes big-endian |
//! | `REG_QWORD` | 8 bytes little-endian |
//! | `REG_BINARY`, `REG_NONE` | opaque bytes |
//!
//! ## Default value
//!
//! The value stored under the empty name is shown as [`DEFAULT_VALUE_NAME`].
//! Whether a [`Value`] is that default is tracked apart from its display
//! name, so a server value literally named `(Default)` stays an ordinary
//! value. Listing a key always yields exactly one default, see
//! [`normalize_default_value`].

use byteorder::{BigEndian, ByteOrder, LittleEndian};
use std::fmt;

use crate::error::DecodeError;
use crate::key::{KeyRef, PATH_SEPARATOR};

/// Display name of the value stored under the empty name
pub const DEFAULT_VALUE_NAME: &str = "(Default)";

/// Whether two registry names refer to the same entry. The service folds
/// case when it looks names up.
pub fn same_name(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}

// ============================================================================
// Value types
// ============================================================================

/// Registry value type tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    /// REG_NONE (0)
    None,
    /// REG_SZ (1)
    String,
    /// REG_EXPAND_SZ (2)
    ExpandString,
    /// REG_BINARY (3)
    Binary,
    /// REG_DWORD (4)
    Dword,
    /// REG_DWORD_BIG_ENDIAN (5)
    DwordBigEndian,
    /// REG_MULTI_SZ (7)
    MultiString,
    /// REG_QWORD (11)
    Qword,
    /// Any other tag (links, resource lists, ...); kept but never decoded
    Unsupported(u32),
}

impl ValueType {
    /// Numeric tag on the wire
    pub const fn code(self) -> u32 {
        match self {
            ValueType::None => 0,
            ValueType::String => 1,
            ValueType::ExpandString => 2,
            ValueType::Binary => 3,
            ValueType::Dword => 4,
            ValueType::DwordBigEndian => 5,
            ValueType::MultiString => 7,
            ValueType::Qword => 11,
            ValueType::Unsupported(code) => code,
        }
    }

    /// Parse a numeric tag
    pub const fn from_code(code: u32) -> Self {
        match code {
            0 => ValueType::None,
            1 => ValueType::String,
            2 => ValueType::ExpandString,
            3 => ValueType::Binary,
            4 => ValueType::Dword,
            5 => ValueType::DwordBigEndian,
            7 => ValueType::MultiString,
            11 => ValueType::Qword,
            other => ValueType::Unsupported(other),
        }
    }

    /// Whether the payload can be decoded
    pub const fn is_supported(self) -> bool {
        !matches!(self, ValueType::Unsupported(_))
    }

    /// Conventional name, e.g. `REG_SZ`
    pub const fn label(self) -> &'static str {
        match self {
            ValueType::None => "REG_NONE",
            ValueType::String => "REG_SZ",
            ValueType::ExpandString => "REG_EXPAND_SZ",
            ValueType::Binary => "REG_BINARY",
            ValueType::Dword => "REG_DWORD",
            ValueType::DwordBigEndian => "REG_DWORD_BIG_ENDIAN",
            ValueType::MultiString => "REG_MULTI_SZ",
            ValueType::Qword => "REG_QWORD",
            ValueType::Unsupported(_) => "REG_UNKNOWN",
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueType::Unsupported(code) => write!(f, "REG_UNKNOWN({})", code),
            other => f.write_str(other.label()),
        }
    }
}

// ============================================================================
// Decoded payloads
// ============================================================================

/// Decoded value payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueData {
    /// REG_NONE, opaque bytes
    None(Vec<u8>),
    /// REG_SZ
    String(String),
    /// REG_EXPAND_SZ, unexpanded
    ExpandString(String),
    /// REG_BINARY
    Binary(Vec<u8>),
    /// REG_DWORD
    Dword(u32),
    /// REG_DWORD_BIG_ENDIAN
    DwordBigEndian(u32),
    /// REG_MULTI_SZ
    MultiString(Vec<String>),
    /// REG_QWORD
    Qword(u64),
}

impl ValueData {
    /// Type tag this payload is encoded under
    pub fn value_type(&self) -> ValueType {
        match self {
            ValueData::None(_) => ValueType::None,
            ValueData::String(_) => ValueType::String,
            ValueData::ExpandString(_) => ValueType::ExpandString,
            ValueData::Binary(_) => ValueType::Binary,
            ValueData::Dword(_) => ValueType::Dword,
            ValueData::DwordBigEndian(_) => ValueType::DwordBigEndian,
            ValueData::MultiString(_) => ValueType::MultiString,
            ValueData::Qword(_) => ValueType::Qword,
        }
    }

    /// Decode `raw` according to `kind`
    pub fn decode(kind: ValueType, raw: &[u8]) -> Result<Self, DecodeError> {
        match kind {
            ValueType::None => Ok(ValueData::None(raw.to_vec())),
            ValueType::Binary => Ok(ValueData::Binary(raw.to_vec())),
            ValueType::String => Ok(ValueData::String(decode_sz(kind, raw)?)),
            ValueType::ExpandString => Ok(ValueData::ExpandString(decode_sz(kind, raw)?)),
            ValueType::MultiString => Ok(ValueData::MultiString(decode_multi_sz(kind, raw)?)),
            ValueType::Dword => {
                check_len(kind, raw, 4)?;
                Ok(ValueData::Dword(LittleEndian::read_u32(raw)))
            }
            ValueType::DwordBigEndian => {
                check_len(kind, raw, 4)?;
                Ok(ValueData::DwordBigEndian(BigEndian::read_u32(raw)))
            }
            ValueType::Qword => {
                check_len(kind, raw, 8)?;
                Ok(ValueData::Qword(LittleEndian::read_u64(raw)))
            }
            ValueType::Unsupported(_) => Err(DecodeError::UnsupportedType(kind)),
        }
    }

    /// Encode into the wire payload
    pub fn encode(&self) -> Vec<u8> {
        match self {
            ValueData::None(bytes) | ValueData::Binary(bytes) => bytes.clone(),
            ValueData::String(s) | ValueData::ExpandString(s) => encode_sz(s),
            ValueData::MultiString(items) => {
                let mut out = Vec::new();
                for item in items {
                    out.extend(encode_sz(item));
                }
                out.extend_from_slice(&[0, 0]);
                out
            }
            ValueData::Dword(v) => {
                let mut buf = [0u8; 4];
                LittleEndian::write_u32(&mut buf, *v);
                buf.to_vec()
            }
            ValueData::DwordBigEndian(v) => {
                let mut buf = [0u8; 4];
                BigEndian::write_u32(&mut buf, *v);
                buf.to_vec()
            }
            ValueData::Qword(v) => {
                let mut buf = [0u8; 8];
                LittleEndian::write_u64(&mut buf, *v);
                buf.to_vec()
            }
        }
    }
}

impl fmt::Display for ValueData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueData::String(s) | ValueData::ExpandString(s) => f.write_str(s),
            ValueData::MultiString(items) => f.write_str(&items.join(" ")),
            ValueData::Dword(v) | ValueData::DwordBigEndian(v) => write!(f, "0x{:08x} ({})", v, v),
            ValueData::Qword(v) => write!(f, "0x{:016x} ({})", v, v),
            ValueData::None(bytes) | ValueData::Binary(bytes) => {
                let hex: Vec<String> = bytes.iter().map(|b| format!("{:02x}", b)).collect();
                f.write_str(&hex.join(" "))
            }
        }
    }
}

fn check_len(kind: ValueType, raw: &[u8], expected: usize) -> Result<(), DecodeError> {
    if raw.len() != expected {
        return Err(DecodeError::Length {
            kind,
            expected,
            actual: raw.len(),
        });
    }
    Ok(())
}

fn utf16_units(kind: ValueType, raw: &[u8]) -> Result<Vec<u16>, DecodeError> {
    if raw.len() % 2 != 0 {
        return Err(DecodeError::OddLength {
            kind,
            len: raw.len(),
        });
    }
    let mut units = vec![0u16; raw.len() / 2];
    LittleEndian::read_u16_into(raw, &mut units);
    Ok(units)
}

fn decode_sz(kind: ValueType, raw: &[u8]) -> Result<String, DecodeError> {
    let units = utf16_units(kind, raw)?;
    let end = units.iter().position(|&u| u == 0).unwrap_or(units.len());
    String::from_utf16(&units[..end]).map_err(|_| DecodeError::InvalidUtf16 { kind })
}

fn decode_multi_sz(kind: ValueType, raw: &[u8]) -> Result<Vec<String>, DecodeError> {
    let units = utf16_units(kind, raw)?;
    let mut items = Vec::new();
    // An empty string terminates the list
    for chunk in units.split(|&u| u == 0) {
        if chunk.is_empty() {
            break;
        }
        items.push(String::from_utf16(chunk).map_err(|_| DecodeError::InvalidUtf16 { kind })?);
    }
    Ok(items)
}

fn encode_sz(s: &str) -> Vec<u8> {
    let mut units: Vec<u16> = s.encode_utf16().collect();
    units.push(0);
    let mut out = vec![0u8; units.len() * 2];
    LittleEndian::write_u16_into(&units, &mut out);
    out
}

// ============================================================================
// Values
// ============================================================================

/// A named, typed value stored under a key
#[derive(Clone)]
pub struct Value {
    name: String,
    default: bool,
    kind: ValueType,
    data: Vec<u8>,
    parent: KeyRef,
}

impl Value {
    /// Value with a raw payload, as listed from the server
    pub fn new(parent: &KeyRef, name: impl Into<String>, kind: ValueType, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            default: false,
            kind,
            data,
            parent: KeyRef::clone(parent),
        }
    }

    /// Value built from decoded data
    pub fn from_data(parent: &KeyRef, name: impl Into<String>, data: &ValueData) -> Self {
        Self::new(parent, name, data.value_type(), data.encode())
    }

    /// The default value of `parent`, stored under the empty name
    pub fn key_default(parent: &KeyRef, data: &ValueData) -> Self {
        let mut value = Self::from_data(parent, DEFAULT_VALUE_NAME, data);
        value.default = true;
        value
    }

    /// Empty string-typed default value, used when the server reports none
    pub fn synthesized_default(parent: &KeyRef) -> Self {
        let mut value = Self::new(parent, DEFAULT_VALUE_NAME, ValueType::String, Vec::new());
        value.default = true;
        value
    }

    /// Display name (the default value shows as [`DEFAULT_VALUE_NAME`])
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Give the value an ordinary name. A renamed default is no longer the
    /// default.
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
        self.default = false;
    }

    /// Name sent to the server
    pub fn wire_name(&self) -> &str {
        if self.default {
            ""
        } else {
            &self.name
        }
    }

    /// Whether this is the key's default value
    pub fn is_default(&self) -> bool {
        self.default
    }

    /// Type tag
    pub fn kind(&self) -> ValueType {
        self.kind
    }

    /// Raw payload
    pub fn raw_data(&self) -> &[u8] {
        &self.data
    }

    /// Replace the payload and type
    pub fn set_data(&mut self, data: &ValueData) {
        self.kind = data.value_type();
        self.data = data.encode();
    }

    /// Key this value lives under
    pub fn parent(&self) -> &KeyRef {
        &self.parent
    }

    /// Decode the payload
    pub fn decode(&self) -> Result<ValueData, DecodeError> {
        ValueData::decode(self.kind, &self.data)
    }

    /// Payload rendered as text, also the haystack for data searches
    pub fn data_string(&self) -> Result<String, DecodeError> {
        self.decode().map(|data| data.to_string())
    }

    /// Key path followed by the display name
    pub fn absolute_path(&self) -> String {
        format!("{}{}{}", self.parent.absolute_path(), PATH_SEPARATOR, self.name)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Value")
            .field("path", &self.absolute_path())
            .field("default", &self.default)
            .field("kind", &self.kind)
            .field("len", &self.data.len())
            .finish()
    }
}

/// Make sure `values` holds exactly one default value.
///
/// The first server-reported value with the empty name is renamed to
/// [`DEFAULT_VALUE_NAME`]; if there is none, an empty `REG_SZ` default is
/// appended.
pub fn normalize_default_value(parent: &KeyRef, values: &mut Vec<Value>) {
    match values.iter_mut().find(|v| !v.default && v.name.is_empty()) {
        Some(value) => {
            value.name = DEFAULT_VALUE_NAME.to_string();
            value.default = true;
        }
        None => values.push(Value::synthesized_default(parent)),
    }
}
