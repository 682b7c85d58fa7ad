//! Typed views of the remote objects.
//!
//! Every model is decoded from a [`Value`] at the client boundary. Models
//! that the tool resubmits keep the record they were decoded from, so
//! fields this crate doesn't model survive an update round trip.

mod agent;
mod disksafe;
mod legacy;
mod policy;
mod task;
mod user;

pub use agent::*;
pub use disksafe::*;
pub use legacy::*;
pub use policy::*;
pub use task::*;
pub use user::*;

use cdp_domain::error::Result;

use crate::value::Value;

/// Decode a model from a remote value.
pub trait FromValue: Sized {
    fn from_value(value: Value) -> Result<Self>;

    /// Decode a sequence, accepting the single-element and empty shapes.
    fn list_from_value(value: Value) -> Result<Vec<Self>> {
        value.into_list().into_iter().map(Self::from_value).collect()
    }
}

/// Encode a model for submission.
pub trait ToValue {
    fn to_value(&self) -> Value;
}
