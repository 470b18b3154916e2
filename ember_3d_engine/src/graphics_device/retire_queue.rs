//! Deferred destruction of GPU resources
//!
//! A buffer freed while frames are in flight may still be read by their
//! command buffers. Every frame submission takes a serial; a retired
//! resource is held until each submission made before it was retired has
//! been observed complete, either through its slot's fence or a device
//! wait-idle.

pub struct RetireQueue<T> {
    /// Serial of each slot's submission whose fence was not yet observed
    in_flight: Vec<Option<u64>>,
    next_serial: u64,
    /// Retired resources tagged with the first serial that cannot reference them
    pending: Vec<(u64, T)>,
}

impl<T> RetireQueue<T> {
    /// Queue for a frame ring of `depth` slots
    pub fn new(depth: usize) -> Self {
        Self {
            in_flight: vec![None; depth],
            next_serial: 0,
            pending: Vec::new(),
        }
    }

    /// Record a frame submission on `slot`
    pub fn submitted(&mut self, slot: usize) {
        if let Some(entry) = self.in_flight.get_mut(slot) {
            *entry = Some(self.next_serial);
            self.next_serial += 1;
        }
    }

    /// Retire `resource`
    ///
    /// Returns it straight back when no frame is in flight, meaning it can
    /// be destroyed now. Otherwise it is held until a later `signaled` or
    /// `idle` hands it out.
    pub fn retire(&mut self, resource: T) -> Option<T> {
        if self.in_flight.iter().all(Option::is_none) {
            return Some(resource);
        }
        self.pending.push((self.next_serial, resource));
        None
    }

    /// `slot`'s fence was observed signaled. Returns the resources no
    /// in-flight submission can reference anymore.
    pub fn signaled(&mut self, slot: usize) -> Vec<T> {
        if let Some(entry) = self.in_flight.get_mut(slot) {
            *entry = None;
        }

        let oldest = self.in_flight.iter().flatten().min().copied();
        let (ready, waiting): (Vec<_>, Vec<_>) = std::mem::take(&mut self.pending)
            .into_iter()
            .partition(|(serial, _)| oldest.map_or(true, |oldest| *serial <= oldest));
        self.pending = waiting;
        ready.into_iter().map(|(_, resource)| resource).collect()
    }

    /// The device is idle. Returns every retired resource.
    pub fn idle(&mut self) -> Vec<T> {
        for entry in &mut self.in_flight {
            *entry = None;
        }
        self.pending.drain(..).map(|(_, resource)| resource).collect()
    }

    /// Whether any frame submission is still unobserved
    pub fn frames_in_flight(&self) -> bool {
        self.in_flight.iter().any(Option::is_some)
    }

    /// Resources waiting for their frames to complete
    pub fn pending(&self) -> impl Iterator<Item = &T> {
        self.pending.iter().map(|(_, resource)| resource)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
#[path = "retire_queue_tests.rs"]
mod tests;
