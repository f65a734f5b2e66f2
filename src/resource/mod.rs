//! Resource pools, the broker that owns them, and joint acquisition.
//!
//! A pool is the only mutable state shared between processes. It is
//! mutated exclusively through request/release calls, which run inside
//! a single process step and therefore never span a suspension point.
//!
//! # Module structure
//!
//! | Sub-module | Contents |
//! |---|---|
//! | [`pool`] | [`ResourcePool`], [`PendingRequest`] |
//! | [`joint`] | [`JointRequest`] |
//! | [`broker`] | [`Broker`]: pool registry, request routing, joints |

pub mod broker;
pub mod joint;
pub mod pool;

pub use broker::Broker;
pub use joint::{JointMember, JointRequest};
pub use pool::{PendingRequest, ResourcePool};

/// Ordering key for queued requests. Lower values are served first.
pub type Priority = i32;

/// Identifies a registered pool. Assigned in registration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct PoolId(usize);

impl PoolId {
    /// Wrap a raw index.
    #[inline]
    pub fn new(index: usize) -> Self {
        PoolId(index)
    }

    /// Return the raw index.
    #[inline]
    pub fn index(self) -> usize {
        self.0
    }
}

impl std::fmt::Display for PoolId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "R{}", self.0)
    }
}

/// Identifies one request against one pool, for its whole lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct RequestId(u64);

impl RequestId {
    /// Wrap a raw integer.
    #[inline]
    pub fn new(raw: u64) -> Self {
        RequestId(raw)
    }

    /// Return the underlying integer.
    #[inline]
    pub fn raw(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Q#{}", self.0)
    }
}

/// Identifies a joint acquisition spanning several pools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct JointId(u64);

impl JointId {
    /// Wrap a raw integer.
    #[inline]
    pub fn new(raw: u64) -> Self {
        JointId(raw)
    }

    /// Return the underlying integer.
    #[inline]
    pub fn raw(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for JointId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "J#{}", self.0)
    }
}
