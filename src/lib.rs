// Allow large error types - the Error enum carries OIDs and addresses
// inline so failures are diagnosable without chasing context.
#![allow(clippy::result_large_err)]

//! # rsnmp
//!
//! Async SNMP client engine for Rust.
//!
//! ## Features
//!
//! - SNMPv1, v2c, and v3 (USM with authentication and privacy)
//! - Async API built on Tokio
//! - Zero-copy BER encoding/decoding
//! - GET, SET, GETNEXT, GETBULK, and streaming walks
//! - Transparent v3 engine discovery and time synchronization
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use rsnmp::{Session, oid};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), rsnmp::Error> {
//!     let session = Session::v2c("192.168.1.1:161")
//!         .community("public")
//!         .timeout(Duration::from_secs(5))
//!         .connect()
//!         .await?;
//!
//!     let vb = session.get_one(&oid!(1, 3, 6, 1, 2, 1, 1, 1, 0)).await?;
//!     println!("sysDescr: {:?}", vb.value);
//!
//!     Ok(())
//! }
//! ```
//!
//! ## SNMPv3 Example
//!
//! ```rust,no_run
//! use rsnmp::{Session, oid};
//! use rsnmp::usm::{AuthProtocol, PrivProtocol};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), rsnmp::Error> {
//!     let session = Session::v3("192.168.1.1:161", "admin")
//!         .auth(AuthProtocol::Sha256, "authpass123")
//!         .privacy(PrivProtocol::Aes128, "privpass123")
//!         .connect()
//!         .await?;
//!
//!     let vb = session.get_one(&oid!(1, 3, 6, 1, 2, 1, 1, 1, 0)).await?;
//!     println!("sysDescr: {:?}", vb.value);
//!
//!     Ok(())
//! }
//! ```

pub mod ber;
pub mod error;
pub mod message;
pub mod oid;
pub mod pdu;
pub mod prelude;
pub mod session;
pub mod transport;
pub mod usm;
pub mod value;
pub mod varbind;
pub mod version;

// Re-exports for convenience
pub use error::{
    AuthErrorKind, CryptoErrorKind, DecodeErrorKind, EncodeErrorKind, Error, ErrorStatus,
    OidErrorKind, ProtocolErrorKind, Result,
};
pub use message::SecurityLevel;
pub use oid::Oid;
pub use pdu::{Pdu, PduType};
pub use session::{
    Backoff, BulkWalk, CommunitySessionBuilder, Retry, Session, SessionConfig, V3SecurityConfig,
    V3SessionBuilder, Walk,
};
pub use transport::{MockTransport, Transport, UdpTransport};
pub use usm::{AuthProtocol, EngineCache, PrivProtocol};
pub use value::Value;
pub use varbind::VarBind;
pub use version::Version;

/// Type alias for a session over a dedicated UDP socket, the default
/// transport.
pub type UdpSession = Session<UdpTransport>;
