//! Host port allocation

use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard};

use log::debug;
use rand::Rng;

use crate::errors::{Result, SandboxError};

/// Hands out host ports from `base + 1 ..= base + span`.
///
/// Candidates are drawn at random and retried until a free one turns up, so
/// collisions get more frequent as the reserved set grows. Check and insert
/// happen under one lock.
#[derive(Debug)]
pub struct PortAllocator {
    base: u16,
    span: u16,
    reserved: Mutex<HashSet<u16>>,
}

impl PortAllocator {
    /// Create new allocator. Fails if the range is empty or runs past 65535.
    pub fn new(base: u16, span: u16) -> Result<Self> {
        if span == 0 || base.checked_add(span).is_none() {
            return Err(SandboxError::InvalidConfig(format!(
                "Port range {}+{} must hold at least one port and end at or below 65535",
                base, span
            )));
        }

        Ok(Self {
            base,
            span,
            reserved: Mutex::new(HashSet::new()),
        })
    }

    /// Lowest and highest port this allocator can issue
    pub fn range(&self) -> (u16, u16) {
        (self.base + 1, self.base + self.span)
    }

    fn lock(&self) -> MutexGuard<'_, HashSet<u16>> {
        self.reserved
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
    }

    /// Reserve and return a free port
    pub fn allocate(&self) -> Result<u16> {
        let mut reserved = self.lock();

        if reserved.len() >= usize::from(self.span) {
            let (low, high) = self.range();
            return Err(SandboxError::PortsExhausted { low, high });
        }

        let mut rng = rand::thread_rng();
        loop {
            let candidate = self.base + rng.gen_range(1..=self.span);
            if reserved.insert(candidate) {
                debug!("Reserved host port {}", candidate);
                return Ok(candidate);
            }
        }
    }

    /// Return a port to the free pool. Returns false if it was not reserved.
    pub fn release(&self, port: u16) -> bool {
        let released = self.lock().remove(&port);
        if released {
            debug!("Released host port {}", port);
        }
        released
    }

    pub fn is_reserved(&self, port: u16) -> bool {
        self.lock().contains(&port)
    }

    pub fn reserved_count(&self) -> usize {
        self.lock().len()
    }
}
