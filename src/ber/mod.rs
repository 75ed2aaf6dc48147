//! BER (Basic Encoding Rules) codec for SNMP messages.
//!
//! Follows X.690 with the permissive parsing net-snmp applies in practice:
//! non-minimal integer and length encodings are accepted, oversized
//! integers are truncated with a warning, indefinite lengths are rejected.

mod decode;
mod encode;
mod length;
pub mod tag;

pub use decode::Decoder;
pub use encode::EncodeBuf;
pub use length::{MAX_LENGTH, decode_length, encode_length};
