//! CQL frame opcodes, server error codes, and frame payload types.
//!
//! A frame body is carried as opaque [`bytes::Bytes`]; only the ERROR body
//! is parsed here (`[int code][string message]`), because that is the one
//! payload the connection layer must look inside to apply retry policy.

use bytes::{Buf, Bytes};

use crate::error::ProtocolError;

/// Frame opcode identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Opcode {
    /// Server-reported error (ERROR).
    Error = 0x00,
    /// Initialize the connection (STARTUP).
    Startup = 0x01,
    /// Server is ready for queries (READY).
    Ready = 0x02,
    /// Server requires authentication (AUTHENTICATE).
    Authenticate = 0x03,
    /// Ask for supported options (OPTIONS).
    Options = 0x05,
    /// Supported options response (SUPPORTED).
    Supported = 0x06,
    /// Execute a CQL query (QUERY).
    Query = 0x07,
    /// Query result (RESULT).
    Result = 0x08,
    /// Prepare a statement (PREPARE).
    Prepare = 0x09,
    /// Execute a prepared statement (EXECUTE).
    Execute = 0x0A,
    /// Register for server events (REGISTER).
    Register = 0x0B,
    /// Server push event (EVENT).
    Event = 0x0C,
}

impl Opcode {
    /// Create an opcode from a raw byte.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x00 => Some(Self::Error),
            0x01 => Some(Self::Startup),
            0x02 => Some(Self::Ready),
            0x03 => Some(Self::Authenticate),
            0x05 => Some(Self::Options),
            0x06 => Some(Self::Supported),
            0x07 => Some(Self::Query),
            0x08 => Some(Self::Result),
            0x09 => Some(Self::Prepare),
            0x0A => Some(Self::Execute),
            0x0B => Some(Self::Register),
            0x0C => Some(Self::Event),
            _ => None,
        }
    }
}

impl TryFrom<u8> for Opcode {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, ProtocolError> {
        Self::from_u8(value).ok_or(ProtocolError::InvalidOpcode(value))
    }
}

impl std::fmt::Display for Opcode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Error => "ERROR",
            Self::Startup => "STARTUP",
            Self::Ready => "READY",
            Self::Authenticate => "AUTHENTICATE",
            Self::Options => "OPTIONS",
            Self::Supported => "SUPPORTED",
            Self::Query => "QUERY",
            Self::Result => "RESULT",
            Self::Prepare => "PREPARE",
            Self::Execute => "EXECUTE",
            Self::Register => "REGISTER",
            Self::Event => "EVENT",
        };
        f.write_str(name)
    }
}

/// Server error code carried in an ERROR frame body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum ErrorCode {
    /// Unexpected server-side failure.
    ServerError = 0x0000,
    /// Client message violated the protocol.
    ProtocolError = 0x000A,
    /// Not enough replicas alive for the requested consistency.
    Unavailable = 0x1000,
    /// Coordinator is overloaded.
    Overloaded = 0x1001,
    /// Coordinator is still bootstrapping.
    IsBootstrapping = 0x1002,
    /// Truncation failed.
    TruncateError = 0x1003,
    /// Write timed out waiting for replicas.
    WriteTimeout = 0x1100,
    /// Read timed out waiting for replicas.
    ReadTimeout = 0x1200,
    /// Query has a syntax error.
    SyntaxError = 0x2000,
    /// User is not authorized for the operation.
    Unauthorized = 0x2100,
    /// Query is syntactically correct but invalid.
    Invalid = 0x2200,
    /// Query is invalid due to a configuration issue.
    ConfigError = 0x2300,
    /// Entity being created already exists.
    AlreadyExists = 0x2400,
    /// Prepared statement id is unknown to the coordinator.
    Unprepared = 0x2500,
}

impl ErrorCode {
    /// Create an error code from a raw value.
    ///
    /// Unknown codes map to `None`; callers treat them like
    /// [`ErrorCode::ServerError`] for routing purposes.
    pub fn from_i32(value: i32) -> Option<Self> {
        match value {
            0x0000 => Some(Self::ServerError),
            0x000A => Some(Self::ProtocolError),
            0x1000 => Some(Self::Unavailable),
            0x1001 => Some(Self::Overloaded),
            0x1002 => Some(Self::IsBootstrapping),
            0x1003 => Some(Self::TruncateError),
            0x1100 => Some(Self::WriteTimeout),
            0x1200 => Some(Self::ReadTimeout),
            0x2000 => Some(Self::SyntaxError),
            0x2100 => Some(Self::Unauthorized),
            0x2200 => Some(Self::Invalid),
            0x2300 => Some(Self::ConfigError),
            0x2400 => Some(Self::AlreadyExists),
            0x2500 => Some(Self::Unprepared),
            _ => None,
        }
    }
}

/// An outbound request frame payload.
///
/// The body is opaque to this crate; framing and stream assignment happen
/// in the transport layer.
#[derive(Debug, Clone)]
pub struct Request {
    /// Frame opcode.
    pub opcode: Opcode,
    /// Opaque frame body.
    pub body: Bytes,
}

impl Request {
    /// Create a QUERY request with the given body.
    #[must_use]
    pub fn query(body: Bytes) -> Self {
        Self {
            opcode: Opcode::Query,
            body,
        }
    }

    /// Create an EXECUTE request with the given body.
    #[must_use]
    pub fn execute(body: Bytes) -> Self {
        Self {
            opcode: Opcode::Execute,
            body,
        }
    }

    /// Create a PREPARE request with the given body.
    #[must_use]
    pub fn prepare(body: Bytes) -> Self {
        Self {
            opcode: Opcode::Prepare,
            body,
        }
    }
}

/// An inbound response frame payload.
#[derive(Debug, Clone)]
pub struct Response {
    /// Frame opcode.
    pub opcode: Opcode,
    /// Opaque frame body.
    pub body: Bytes,
}

impl Response {
    /// Create a response from an opcode and body.
    #[must_use]
    pub fn new(opcode: Opcode, body: Bytes) -> Self {
        Self { opcode, body }
    }

    /// Parse the ERROR body of this frame.
    ///
    /// Returns [`ProtocolError::NotAnError`] if this frame is not an ERROR
    /// frame.
    pub fn error_body(&self) -> Result<ErrorBody, ProtocolError> {
        if self.opcode != Opcode::Error {
            return Err(ProtocolError::NotAnError(self.opcode));
        }
        ErrorBody::parse(self.body.clone())
    }
}

/// Parsed body of an ERROR frame: `[int code][string message]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorBody {
    /// Raw server error code.
    pub code: i32,
    /// Human-readable message.
    pub message: String,
}

impl ErrorBody {
    /// Parse an ERROR frame body.
    pub fn parse(mut body: Bytes) -> Result<Self, ProtocolError> {
        if body.remaining() < 4 {
            return Err(ProtocolError::IncompleteBody {
                expected: 4,
                actual: body.remaining(),
            });
        }
        let code = body.get_i32();

        if body.remaining() < 2 {
            return Err(ProtocolError::IncompleteBody {
                expected: 2,
                actual: body.remaining(),
            });
        }
        let len = body.get_u16() as usize;
        if body.remaining() < len {
            return Err(ProtocolError::IncompleteBody {
                expected: len,
                actual: body.remaining(),
            });
        }
        let message = std::str::from_utf8(&body.chunk()[..len])
            .map_err(|_| ProtocolError::InvalidString)?
            .to_string();

        Ok(Self { code, message })
    }

    /// Encode this body back into wire form.
    ///
    /// Used by tests and by transports that synthesize local errors.
    #[must_use]
    pub fn encode(&self) -> Bytes {
        use bytes::BufMut;
        let mut buf = bytes::BytesMut::with_capacity(6 + self.message.len());
        buf.put_i32(self.code);
        buf.put_u16(self.message.len() as u16);
        buf.put_slice(self.message.as_bytes());
        buf.freeze()
    }

    /// Typed error code, if recognized.
    #[must_use]
    pub fn error_code(&self) -> Option<ErrorCode> {
        ErrorCode::from_i32(self.code)
    }

    /// Whether this error means the statement must be re-prepared.
    #[must_use]
    pub fn is_unprepared(&self) -> bool {
        self.error_code() == Some(ErrorCode::Unprepared)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opcode_roundtrip() {
        for raw in 0x00u8..=0x0C {
            if raw == 0x04 {
                continue; // CREDENTIALS was removed in protocol v2
            }
            let opcode = Opcode::from_u8(raw).unwrap();
            assert_eq!(opcode as u8, raw);
        }
    }

    #[test]
    fn test_opcode_invalid() {
        assert!(Opcode::from_u8(0x04).is_none());
        assert!(Opcode::from_u8(0xFF).is_none());
        assert!(matches!(
            Opcode::try_from(0xFF),
            Err(ProtocolError::InvalidOpcode(0xFF))
        ));
    }

    #[test]
    fn test_error_body_roundtrip() {
        let body = ErrorBody {
            code: ErrorCode::Unprepared as i32,
            message: "unknown prepared statement".to_string(),
        };
        let parsed = ErrorBody::parse(body.encode()).unwrap();
        assert_eq!(parsed, body);
        assert!(parsed.is_unprepared());
    }

    #[test]
    fn test_error_body_truncated() {
        let body = ErrorBody {
            code: 0x2200,
            message: "bad query".to_string(),
        };
        let encoded = body.encode();
        let truncated = encoded.slice(..encoded.len() - 3);
        assert!(matches!(
            ErrorBody::parse(truncated),
            Err(ProtocolError::IncompleteBody { .. })
        ));
    }

    #[test]
    fn test_error_body_on_result_frame() {
        let response = Response::new(Opcode::Result, Bytes::new());
        assert!(matches!(
            response.error_body(),
            Err(ProtocolError::NotAnError(Opcode::Result))
        ));
    }

    #[test]
    fn test_unknown_error_code() {
        let body = ErrorBody {
            code: 0x7777,
            message: String::new(),
        };
        assert_eq!(body.error_code(), None);
        assert!(!body.is_unprepared());
    }
}
