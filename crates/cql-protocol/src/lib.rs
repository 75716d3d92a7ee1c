//! # cql-protocol
//!
//! Thin surface of the CQL binary protocol needed by the connection layer.
//!
//! This crate deliberately does not implement full frame encoding or result
//! decoding. It covers the parts a connection pool must inspect to route
//! responses: frame opcodes, server error codes, opaque request/response
//! payloads, and parsing of the ERROR frame body.

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod error;
pub mod frame;

pub use error::ProtocolError;
pub use frame::{ErrorBody, ErrorCode, Opcode, Request, Response};
