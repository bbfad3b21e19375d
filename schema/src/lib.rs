//! Schema definitions for sonde
//!
//! This crate contains the request-scoped data structures shared by the
//! probe engine and the HTTP front end. All types here implement JSON Schema
//! generation for external consumption.

pub mod probe;

pub use probe::*;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// Text written in place of any credential value
pub const SECRET_MASK: &str = "********";

/// A credential passed through to a remote endpoint
///
/// The clear value is only reachable through [`Secret::expose`]. Formatting
/// and serialization always produce [`SECRET_MASK`].
#[derive(Clone, Default, PartialEq, Eq, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    /// Wrap a credential value
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Borrow the clear value. Only drivers should call this.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Whether no credential was supplied
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(SECRET_MASK)
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(SECRET_MASK)
    }
}

impl Serialize for Secret {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(SECRET_MASK)
    }
}

impl From<&str> for Secret {
    fn from(s: &str) -> Self {
        Secret::new(s)
    }
}

impl From<String> for Secret {
    fn from(s: String) -> Self {
        Secret(s)
    }
}
