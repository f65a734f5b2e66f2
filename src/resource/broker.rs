//! `Broker`: owns every pool and routes request IDs to them.

use std::collections::BTreeMap;

use tracing::debug;

use crate::error::{KernelError, KernelResult};
use crate::process::ProcessId;

use super::joint::{JointMember, JointRequest};
use super::pool::{PendingRequest, ResourcePool};
use super::{JointId, PoolId, Priority, RequestId};

/// Where a live request lives and who owns it.
#[derive(Debug, Clone, Copy)]
struct Route {
    pool: PoolId,
    owner: ProcessId,
}

/// Registry of pools plus the bookkeeping that spans them.
///
/// Request and joint IDs are issued here from monotonic counters, so a
/// released ID is never reused. That is what lets the broker tell
/// [`KernelError::AlreadyReleased`] apart from
/// [`KernelError::UnknownRequest`] without keeping released requests
/// around.
///
/// Every mutating call returns the requests it promoted to granted, so
/// the caller can wake their owners.
#[derive(Debug, Clone, Default)]
pub struct Broker {
    pools: Vec<ResourcePool>,
    by_name: BTreeMap<String, PoolId>,
    live: BTreeMap<RequestId, Route>,
    next_request: u64,
    joints: BTreeMap<JointId, JointRequest>,
    joint_of: BTreeMap<RequestId, JointId>,
    next_joint: u64,
}

impl Broker {
    /// Create a broker with no pools.
    pub fn new() -> Self {
        Self::default()
    }

    // ── Pools ─────────────────────────────────────────────

    /// Register a pool.
    pub fn add_pool(&mut self, name: impl Into<String>, capacity: usize) -> KernelResult<PoolId> {
        let name = name.into();
        if self.by_name.contains_key(&name) {
            return Err(KernelError::DuplicatePool(name));
        }
        let id = PoolId::new(self.pools.len());
        let pool = ResourcePool::new(id, name.clone(), capacity)?;
        debug!(pool = %name, id = %id, capacity, "pool registered");
        self.pools.push(pool);
        self.by_name.insert(name, id);
        Ok(id)
    }

    /// Look up a pool by ID.
    pub fn pool(&self, id: PoolId) -> KernelResult<&ResourcePool> {
        self.pools
            .get(id.index())
            .ok_or_else(|| KernelError::UnknownPool(id.to_string()))
    }

    fn pool_mut(&mut self, id: PoolId) -> KernelResult<&mut ResourcePool> {
        self.pools
            .get_mut(id.index())
            .ok_or_else(|| KernelError::UnknownPool(id.to_string()))
    }

    /// Look up a pool ID by name.
    pub fn pool_id(&self, name: &str) -> KernelResult<PoolId> {
        self.by_name
            .get(name)
            .copied()
            .ok_or_else(|| KernelError::UnknownPool(name.to_string()))
    }

    /// All pools in registration order.
    pub fn pools(&self) -> impl Iterator<Item = &ResourcePool> {
        self.pools.iter()
    }

    /// Number of registered pools.
    pub fn pool_count(&self) -> usize {
        self.pools.len()
    }

    // ── Single requests ───────────────────────────────────

    /// Issue a request against `pool` on behalf of `owner`.
    pub fn request(
        &mut self,
        pool: PoolId,
        owner: ProcessId,
        priority: Priority,
    ) -> KernelResult<PendingRequest> {
        let id = RequestId::new(self.next_request);
        let request = self.pool_mut(pool)?.request(id, owner, priority);
        self.next_request += 1;
        self.live.insert(id, Route { pool, owner });
        Ok(request)
    }

    fn route(&self, id: RequestId) -> KernelResult<Route> {
        match self.live.get(&id) {
            Some(route) => Ok(*route),
            None if id.raw() < self.next_request => Err(KernelError::AlreadyReleased(id)),
            None => Err(KernelError::UnknownRequest(id)),
        }
    }

    /// Returns `true` if `id` has been issued and not yet released.
    pub fn is_live(&self, id: RequestId) -> bool {
        self.live.contains_key(&id)
    }

    /// Owner of a live request.
    pub fn owner_of(&self, id: RequestId) -> KernelResult<ProcessId> {
        self.route(id).map(|r| r.owner)
    }

    /// Pool of a live request.
    pub fn pool_of(&self, id: RequestId) -> KernelResult<PoolId> {
        self.route(id).map(|r| r.pool)
    }

    /// Whether a live request currently holds capacity.
    pub fn is_granted(&self, id: RequestId) -> KernelResult<bool> {
        let route = self.route(id)?;
        Ok(self.pool(route.pool)?.is_granted(id))
    }

    /// Release a granted request, or withdraw a waiting one.
    ///
    /// Fails with [`KernelError::AlreadyReleased`] on a second release,
    /// leaving occupancy untouched, and with [`KernelError::JointMember`]
    /// for members of a joint, which are released through
    /// [`release_joint`](Self::release_joint).
    pub fn release(&mut self, id: RequestId) -> KernelResult<Vec<PendingRequest>> {
        self.route(id)?;
        if self.joint_of.contains_key(&id) {
            return Err(KernelError::JointMember(id));
        }
        self.withdraw_member(id)
    }

    fn withdraw_member(&mut self, id: RequestId) -> KernelResult<Vec<PendingRequest>> {
        let route = self.route(id)?;
        let granted = self.pool_mut(route.pool)?.withdraw(id)?;
        self.live.remove(&id);
        Ok(granted)
    }

    // ── Joint requests ────────────────────────────────────

    /// Issue one request per named pool as a single joint acquisition.
    ///
    /// Everything is validated before the first request is issued, so a
    /// rejected call leaves every pool untouched.
    pub fn acquire_joint(
        &mut self,
        owner: ProcessId,
        wants: &[(PoolId, Priority)],
    ) -> KernelResult<JointId> {
        if wants.is_empty() {
            return Err(KernelError::EmptyJoint);
        }
        for (i, (pool, _)) in wants.iter().enumerate() {
            self.pool(*pool)?;
            if wants[..i].iter().any(|(p, _)| p == pool) {
                return Err(KernelError::RepeatedPool(*pool));
            }
        }

        let id = JointId::new(self.next_joint);
        self.next_joint += 1;

        let mut members = Vec::with_capacity(wants.len());
        for &(pool, priority) in wants {
            let request = self.request(pool, owner, priority)?;
            self.joint_of.insert(request.id, id);
            members.push(JointMember {
                pool,
                request: request.id,
                priority,
            });
        }
        debug!(joint = %id, owner = %owner, members = members.len(), "joint issued");
        self.joints.insert(id, JointRequest { id, owner, members });
        Ok(id)
    }

    /// Look up a live joint.
    pub fn joint(&self, id: JointId) -> KernelResult<&JointRequest> {
        self.joints.get(&id).ok_or(KernelError::UnknownJoint(id))
    }

    /// The joint a request belongs to, if any.
    pub fn joint_of(&self, request: RequestId) -> Option<JointId> {
        self.joint_of.get(&request).copied()
    }

    /// `true` only once every member holds capacity.
    pub fn joint_granted(&self, id: JointId) -> KernelResult<bool> {
        let joint = self.joint(id)?;
        for member in &joint.members {
            if !self.pool(member.pool)?.is_granted(member.request) {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Release every granted member and withdraw every waiting one.
    pub fn release_joint(&mut self, id: JointId) -> KernelResult<Vec<PendingRequest>> {
        let joint = self.joints.remove(&id).ok_or(KernelError::UnknownJoint(id))?;
        let mut granted = Vec::new();
        for request in joint.request_ids() {
            self.joint_of.remove(&request);
            granted.extend(self.withdraw_member(request)?);
        }
        debug!(joint = %id, owner = %joint.owner, "joint released");
        Ok(self.still_live(granted))
    }

    // ── Per-owner cleanup ─────────────────────────────────

    /// Live requests owned by `owner` that are not joint members.
    pub fn requests_of(&self, owner: ProcessId) -> Vec<RequestId> {
        self.live
            .iter()
            .filter(|(id, route)| route.owner == owner && !self.joint_of.contains_key(id))
            .map(|(id, _)| *id)
            .collect()
    }

    /// Live joints owned by `owner`.
    pub fn joints_of(&self, owner: ProcessId) -> Vec<JointId> {
        self.joints
            .values()
            .filter(|j| j.owner == owner)
            .map(|j| j.id)
            .collect()
    }

    /// Drop everything `owner` holds or waits for.
    ///
    /// Returns the other owners' requests promoted along the way.
    pub fn release_all_of(&mut self, owner: ProcessId) -> KernelResult<Vec<PendingRequest>> {
        let mut granted = Vec::new();
        for joint in self.joints_of(owner) {
            granted.extend(self.release_joint(joint)?);
        }
        for request in self.requests_of(owner) {
            granted.extend(self.withdraw_member(request)?);
        }
        Ok(self.still_live(granted))
    }

    /// A grant can be undone within the same call (for instance when an
    /// owner's own later request is promoted and then withdrawn), so only
    /// report requests that are still live.
    fn still_live(&self, granted: Vec<PendingRequest>) -> Vec<PendingRequest> {
        granted
            .into_iter()
            .filter(|r| self.live.contains_key(&r.id))
            .collect()
    }
}
