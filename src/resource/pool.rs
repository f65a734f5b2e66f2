//! `ResourcePool`: a fixed-capacity resource with a priority-ordered
//! wait queue.

use std::collections::{BTreeMap, VecDeque};

use tracing::debug;

use crate::error::{KernelError, KernelResult};
use crate::process::ProcessId;

use super::{PoolId, Priority, RequestId};

/// One request against one pool.
///
/// Handed back by [`ResourcePool::request`] and by the re-evaluation
/// pass of [`ResourcePool::release`], which reports every request it
/// promoted to granted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct PendingRequest {
    /// Request identity.
    pub id: RequestId,
    /// Pool the request was issued against.
    pub pool: PoolId,
    /// Process that owns the request.
    pub owner: ProcessId,
    /// Queue priority (lower first).
    pub priority: Priority,
    /// Per-pool arrival counter; breaks ties between equal priorities.
    pub arrival_sequence: u64,
    /// Whether capacity has been granted.
    pub granted: bool,
}

impl PendingRequest {
    #[inline]
    fn queue_key(&self) -> (Priority, u64) {
        (self.priority, self.arrival_sequence)
    }
}

/// A resource pool with strict priority queuing.
///
/// Invariants:
/// - `0 <= occupancy() <= capacity()`
/// - the wait queue is sorted by `(priority, arrival_sequence)`
/// - the wait queue is non-empty only while the pool is full
///
/// Starvation is possible by construction: a low-priority request waits
/// as long as higher-priority requests keep arriving.
#[derive(Debug, Clone)]
pub struct ResourcePool {
    id: PoolId,
    name: String,
    capacity: usize,
    wait_queue: VecDeque<PendingRequest>,
    holders: BTreeMap<RequestId, PendingRequest>,
    next_sequence: u64,
}

impl ResourcePool {
    /// Create an empty pool.
    ///
    /// Fails with [`KernelError::InvalidCapacity`] if `capacity < 1`.
    pub fn new(id: PoolId, name: impl Into<String>, capacity: usize) -> KernelResult<Self> {
        let name = name.into();
        if capacity < 1 {
            return Err(KernelError::InvalidCapacity {
                pool: name,
                capacity,
            });
        }
        Ok(ResourcePool {
            id,
            name,
            capacity,
            wait_queue: VecDeque::new(),
            holders: BTreeMap::new(),
            next_sequence: 0,
        })
    }

    /// Pool identity.
    pub fn id(&self) -> PoolId {
        self.id
    }

    /// Pool name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Maximum number of simultaneous grants.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of granted, not yet released requests.
    pub fn occupancy(&self) -> usize {
        self.holders.len()
    }

    /// Number of requests waiting for capacity.
    pub fn queue_depth(&self) -> usize {
        self.wait_queue.len()
    }

    /// Returns `true` if `id` currently holds capacity in this pool.
    pub fn is_granted(&self, id: RequestId) -> bool {
        self.holders.contains_key(&id)
    }

    /// Returns `true` if `id` is waiting in this pool's queue.
    pub fn is_waiting(&self, id: RequestId) -> bool {
        self.wait_queue.iter().any(|r| r.id == id)
    }

    /// Waiting requests in grant order.
    pub fn waiting(&self) -> impl Iterator<Item = &PendingRequest> {
        self.wait_queue.iter()
    }

    /// Granted requests in request-ID order.
    pub fn holders(&self) -> impl Iterator<Item = &PendingRequest> {
        self.holders.values()
    }

    /// Issue a request. Granted on the spot if capacity is free,
    /// otherwise inserted into the wait queue at its sorted position.
    pub fn request(&mut self, id: RequestId, owner: ProcessId, priority: Priority) -> PendingRequest {
        let arrival_sequence = self.next_sequence;
        self.next_sequence += 1;

        let mut request = PendingRequest {
            id,
            pool: self.id,
            owner,
            priority,
            arrival_sequence,
            granted: false,
        };

        if self.holders.len() < self.capacity {
            request.granted = true;
            self.holders.insert(id, request);
            debug!(pool = %self.name, request = %id, owner = %owner, priority, "granted on request");
        } else {
            let key = request.queue_key();
            let at = self.wait_queue.partition_point(|r| r.queue_key() <= key);
            self.wait_queue.insert(at, request);
            debug!(
                pool = %self.name,
                request = %id,
                owner = %owner,
                priority,
                position = at,
                "queued"
            );
        }
        request
    }

    /// Give back a granted request's capacity and hand it on.
    ///
    /// Returns the requests promoted from the wait queue, in grant
    /// order. Releasing one unit promotes at most one waiter.
    pub fn release(&mut self, id: RequestId) -> KernelResult<Vec<PendingRequest>> {
        if self.holders.remove(&id).is_none() {
            return Err(KernelError::UnknownRequest(id));
        }
        debug!(pool = %self.name, request = %id, in_use = self.holders.len(), "released");
        Ok(self.regrant())
    }

    /// Cancel a request whatever its state: a waiting request leaves the
    /// queue without disturbing the order of the others, a granted one is
    /// released.
    pub fn withdraw(&mut self, id: RequestId) -> KernelResult<Vec<PendingRequest>> {
        if self.holders.contains_key(&id) {
            return self.release(id);
        }
        match self.wait_queue.iter().position(|r| r.id == id) {
            Some(at) => {
                self.wait_queue.remove(at);
                debug!(pool = %self.name, request = %id, "withdrawn from queue");
                Ok(self.regrant())
            }
            None => Err(KernelError::UnknownRequest(id)),
        }
    }

    /// Promote waiters while there is free capacity.
    fn regrant(&mut self) -> Vec<PendingRequest> {
        let mut granted = Vec::new();
        while self.holders.len() < self.capacity {
            let Some(mut head) = self.wait_queue.pop_front() else {
                break;
            };
            head.granted = true;
            self.holders.insert(head.id, head);
            debug!(pool = %self.name, request = %head.id, owner = %head.owner, "granted from queue");
            granted.push(head);
        }
        granted
    }
}
