//! The detail contract: an immutable wrapper around a preset payload.
//!
//! A preset collection never inspects payloads directly. Every decision it
//! makes about payloads goes through four capabilities:
//!
//! - **equals**: strict value equality, symmetric.
//! - **satisfies**: partial match, weaker than equality. `a.satisfies(b)`
//!   means `a` is a match candidate for `b`; it need not be symmetric.
//! - **merge**: combine `self` with an overlay whose fields win on conflict,
//!   producing a complete new detail.
//! - **copy**: an independent clone, used to snapshot a detail owned by a
//!   live preset.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Capability set every preset payload implements.
pub trait Detail: Clone + fmt::Debug {
    /// The raw payload this detail wraps.
    type Data: Clone + fmt::Debug;

    /// Wrap a payload.
    fn from_data(data: Self::Data) -> Self;

    /// Borrow the wrapped payload.
    fn data(&self) -> &Self::Data;

    /// Unwrap the payload.
    fn into_data(self) -> Self::Data;

    /// Strict value equality.
    fn equals(&self, other: &Self) -> bool;

    /// Whether `self` is a match candidate for `other`.
    fn satisfies(&self, other: &Self) -> bool;

    /// Combine `self` with `overlay`; overlay fields win.
    #[must_use]
    fn merge(&self, overlay: &Self) -> Self;

    /// An independent clone with identical data.
    #[must_use]
    fn copy(&self) -> Self {
        Self::from_data(self.data().clone())
    }
}

/// Detail used when no domain detail type is supplied.
///
/// Always equal to and satisfying every other instance; merging returns
/// `self` unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NoopDetail<T> {
    data: T,
}

impl<T> NoopDetail<T> {
    pub const fn new(data: T) -> Self {
        Self { data }
    }
}

impl<T: Clone + fmt::Debug> Detail for NoopDetail<T> {
    type Data = T;

    fn from_data(data: T) -> Self {
        Self::new(data)
    }

    fn data(&self) -> &T {
        &self.data
    }

    fn into_data(self) -> T {
        self.data
    }

    fn equals(&self, _other: &Self) -> bool {
        true
    }

    fn satisfies(&self, _other: &Self) -> bool {
        true
    }

    fn merge(&self, _overlay: &Self) -> Self {
        self.clone()
    }
}
