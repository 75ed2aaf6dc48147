//! Prelude module for convenient imports.
//!
//! # Usage
//!
//! ```rust,no_run
//! use rsnmp::prelude::*;
//! ```
//!
//! This imports:
//! - Core types: [`Session`], [`Oid`], [`Value`], [`VarBind`]
//! - Error handling: [`Error`], [`Result`]
//! - V3 protocols: [`AuthProtocol`], [`PrivProtocol`]
//! - The [`oid!`] macro for OID construction

pub use crate::error::{Error, Result};
pub use crate::oid::Oid;
pub use crate::session::Session;
pub use crate::usm::{AuthProtocol, PrivProtocol};
pub use crate::value::Value;
pub use crate::varbind::VarBind;
pub use crate::version::Version;

#[doc(no_inline)]
pub use crate::oid;
