//! Error types for the wire, schema, and runtime layers.

use core::fmt;

use crate::runtime::DynamicMessage;
use crate::wire::WireType;

/// Failures raised while reading or framing the protobuf wire format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireError {
    InvalidWireType { value: u8 },
    InvalidKey { reason: &'static str },
    InvalidVarint,
    Truncated,
    InvalidUtf8,
    LengthOverflow { value: u64 },
    TypeMismatch { expected: WireType, actual: WireType },
    GroupEndMismatch { expected: u32, actual: u32 },
    UnexpectedGroupEnd { id: u32 },
    UnterminatedGroup { id: u32 },
    InvalidTextEncoding { encoding: &'static str },
}

impl WireError {
    pub(crate) fn invalid_wire_type(value: u8) -> Self {
        WireError::InvalidWireType { value }
    }

    pub(crate) fn invalid_key(reason: &'static str) -> Self {
        WireError::InvalidKey { reason }
    }

    pub(crate) fn length_overflow(value: u64) -> Self {
        WireError::LengthOverflow { value }
    }
}

impl fmt::Display for WireError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WireError::InvalidWireType { value } => {
                write!(f, "invalid 'wire type' value: {value}")
            }
            WireError::InvalidKey { reason } => {
                write!(f, "invalid key: '{reason}'")
            }
            WireError::InvalidVarint => {
                write!(f, "invalid leb128 varint")
            }
            WireError::Truncated => {
                write!(f, "unexpected end of buffer")
            }
            WireError::InvalidUtf8 => {
                write!(f, "invalid UTF-8 in string field")
            }
            WireError::LengthOverflow { value } => {
                write!(
                    f,
                    "length prefix {value} exceeds platform addressable memory"
                )
            }
            WireError::TypeMismatch { expected, actual } => {
                write!(
                    f,
                    "wire type mismatch: expected {expected:?}, got {actual:?}"
                )
            }
            WireError::GroupEndMismatch { expected, actual } => {
                write!(f, "group end id {actual} does not match group id {expected}")
            }
            WireError::UnexpectedGroupEnd { id } => {
                write!(f, "unexpected group end with id {id}")
            }
            WireError::UnterminatedGroup { id } => {
                write!(f, "group {id} not terminated before end of buffer")
            }
            WireError::InvalidTextEncoding { encoding } => {
                write!(f, "input is not valid {encoding}")
            }
        }
    }
}

impl std::error::Error for WireError {}

/// Failures raised by the reflection tree and the runtime value layer.
///
/// Required-field failures carry the best-effort progress: the partially
/// encoded buffer under `encoded`, or the partially decoded message under
/// `decoded`, so callers may still inspect what was produced.
#[derive(Debug, Clone)]
pub enum Error {
    DuplicateName {
        name: String,
        namespace: String,
    },
    NameResolution {
        reference: String,
        context: String,
    },
    IllegalValue {
        field: String,
        detail: String,
    },
    IllegalEnumValue {
        field: String,
        value: String,
    },
    RequiredFieldMissing {
        missing: Vec<String>,
        encoded: Option<Vec<u8>>,
        decoded: Option<Box<DynamicMessage>>,
    },
    UnresolvedType {
        field: String,
    },
    Rpc {
        method: String,
        detail: String,
    },
    Wire {
        context: Option<String>,
        source: WireError,
    },
}

impl Error {
    pub(crate) fn illegal_value(field: impl Into<String>, detail: impl Into<String>) -> Self {
        Error::IllegalValue {
            field: field.into(),
            detail: detail.into(),
        }
    }

    pub(crate) fn wire(source: WireError) -> Self {
        Error::Wire {
            context: None,
            source,
        }
    }

    /// Rewrap a buffer-level error with the name of the field being coded.
    pub(crate) fn wire_in(context: impl Into<String>, source: WireError) -> Self {
        Error::Wire {
            context: Some(context.into()),
            source,
        }
    }

    /// The partially encoded buffer attached to a required-field failure.
    pub fn encoded(&self) -> Option<&[u8]> {
        match self {
            Error::RequiredFieldMissing { encoded, .. } => encoded.as_deref(),
            _ => None,
        }
    }

    /// The partially decoded message attached to a required-field failure.
    pub fn decoded(&self) -> Option<&DynamicMessage> {
        match self {
            Error::RequiredFieldMissing { decoded, .. } => decoded.as_deref(),
            _ => None,
        }
    }
}

impl From<WireError> for Error {
    fn from(source: WireError) -> Self {
        Error::wire(source)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::DuplicateName { name, namespace } => {
                write!(f, "duplicate name '{name}' in namespace '{namespace}'")
            }
            Error::NameResolution { reference, context } => {
                write!(f, "unresolvable reference '{reference}' from '{context}'")
            }
            Error::IllegalValue { field, detail } => {
                write!(f, "illegal value for {field}: {detail}")
            }
            Error::IllegalEnumValue { field, value } => {
                write!(f, "illegal enum value {value} for {field}")
            }
            Error::RequiredFieldMissing { missing, .. } => {
                write!(f, "missing required field(s): {}", missing.join(", "))
            }
            Error::UnresolvedType { field } => {
                write!(f, "type of {field} was never resolved")
            }
            Error::Rpc { method, detail } => {
                write!(f, "rpc {method} failed: {detail}")
            }
            Error::Wire {
                context: Some(ctx),
                source,
            } => {
                write!(f, "in {ctx}: {source}")
            }
            Error::Wire {
                context: None,
                source,
            } => source.fmt(f),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Wire { source, .. } => Some(source),
            _ => None,
        }
    }
}
