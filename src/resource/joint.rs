//! `JointRequest`: one logical step that needs several pools at once.

use crate::process::ProcessId;

use super::{JointId, PoolId, Priority, RequestId};

/// A bundle of per-pool requests that count as granted only together.
///
/// Each member is an ordinary request queued by its own pool's priority
/// order; there is no cross-pool lock ordering. Members can therefore be
/// granted at different instants, but the owner is resumed once, when
/// the last member is granted, and [`Broker::joint_granted`] stays
/// `false` until then.
///
/// [`Broker::joint_granted`]: super::Broker::joint_granted
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct JointRequest {
    /// Joint identity.
    pub id: JointId,
    /// Process that owns every member.
    pub owner: ProcessId,
    /// Member requests, one per pool, in the order the pools were named.
    pub members: Vec<JointMember>,
}

/// One pool's share of a joint request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct JointMember {
    pub pool: PoolId,
    pub request: RequestId,
    pub priority: Priority,
}

impl JointRequest {
    /// IDs of the member requests.
    pub fn request_ids(&self) -> impl Iterator<Item = RequestId> + '_ {
        self.members.iter().map(|m| m.request)
    }

    /// Returns `true` if `request` is one of the members.
    pub fn contains(&self, request: RequestId) -> bool {
        self.members.iter().any(|m| m.request == request)
    }
}
