/// Handle-keyed resource pool with live-memory accounting
///
/// Backends store their per-resource records (buffer + allocation, image +
/// view, ...) in a `ResourcePool`. Handles are generation-checked slotmap
/// keys, so removing a freed handle again finds nothing and leaves the
/// accounting untouched.

use slotmap::{Key, SlotMap};
use crate::error::{Error, Result};

/// A pooled resource that occupies device memory
pub trait PooledResource {
    /// Bytes of device memory held by this resource
    fn size_bytes(&self) -> u64;
}

/// Device memory accounting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MemoryStats {
    /// Bytes currently allocated
    pub live_bytes: u64,
    /// Resources currently allocated
    pub live_count: usize,
    /// Highest `live_bytes` seen
    pub peak_bytes: u64,
    /// Allocations since creation
    pub total_allocations: u64,
    /// Frees since creation
    pub total_frees: u64,
}

impl MemoryStats {
    /// Sum of two pools' accounting
    ///
    /// Peaks are added, which over-approximates the true combined peak.
    pub fn combined(&self, other: &MemoryStats) -> MemoryStats {
        MemoryStats {
            live_bytes: self.live_bytes + other.live_bytes,
            live_count: self.live_count + other.live_count,
            peak_bytes: self.peak_bytes + other.peak_bytes,
            total_allocations: self.total_allocations + other.total_allocations,
            total_frees: self.total_frees + other.total_frees,
        }
    }
}

/// Check an allocation request against the size rules and a memory budget
///
/// # Errors
///
/// * `InvalidResource` for a zero-sized request
/// * `OutOfDeviceMemory` when `live_bytes + size` would exceed `budget`
pub fn check_request(size: u64, live_bytes: u64, budget: Option<u64>) -> Result<()> {
    if size == 0 {
        return Err(Error::InvalidResource("zero-sized allocation".to_string()));
    }
    if let Some(budget) = budget {
        match live_bytes.checked_add(size) {
            Some(total) if total <= budget => {}
            _ => return Err(Error::OutOfDeviceMemory),
        }
    }
    Ok(())
}

/// Slot arena of resources with memory accounting
pub struct ResourcePool<K: Key, T: PooledResource> {
    slots: SlotMap<K, T>,
    stats: MemoryStats,
}

impl<K: Key, T: PooledResource> ResourcePool<K, T> {
    pub fn new() -> Self {
        Self {
            slots: SlotMap::with_key(),
            stats: MemoryStats::default(),
        }
    }

    /// Store a created resource and account for its memory
    pub fn insert(&mut self, resource: T) -> K {
        let size = resource.size_bytes();
        let handle = self.slots.insert(resource);

        self.stats.live_bytes += size;
        self.stats.live_count += 1;
        self.stats.total_allocations += 1;
        self.stats.peak_bytes = self.stats.peak_bytes.max(self.stats.live_bytes);

        handle
    }

    /// Remove a resource, returning it for destruction
    ///
    /// Returns `None` for a stale or already removed handle.
    pub fn remove(&mut self, handle: K) -> Option<T> {
        let resource = self.slots.remove(handle)?;

        self.stats.live_bytes -= resource.size_bytes();
        self.stats.live_count -= 1;
        self.stats.total_frees += 1;

        Some(resource)
    }

    pub fn get(&self, handle: K) -> Option<&T> {
        self.slots.get(handle)
    }

    pub fn get_mut(&mut self, handle: K) -> Option<&mut T> {
        self.slots.get_mut(handle)
    }

    pub fn contains(&self, handle: K) -> bool {
        self.slots.contains_key(handle)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn stats(&self) -> MemoryStats {
        self.stats
    }

    /// Remove every resource (device teardown)
    pub fn drain(&mut self) -> Vec<T> {
        let handles: Vec<K> = self.slots.keys().collect();
        handles.into_iter().filter_map(|handle| self.remove(handle)).collect()
    }
}

impl<K: Key, T: PooledResource> Default for ResourcePool<K, T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "resource_pool_tests.rs"]
mod tests;
