//! Instance name generation

use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard};

use log::debug;
use rand::Rng;

use crate::errors::{Result, SandboxError};

/// Produces `<group>_vm<n>` names with `n` drawn from `1..=span`
#[derive(Debug, Clone)]
pub struct NameGenerator {
    group: String,
    span: u32,
}

impl NameGenerator {
    pub fn new(group: impl Into<String>, span: u32) -> Self {
        Self {
            group: group.into(),
            span: span.max(1),
        }
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    /// Generate a new instance name. Not reserved: repeats are possible.
    pub fn generate(&self) -> String {
        let n = rand::thread_rng().gen_range(1..=self.span);
        format!("{}_vm{}", self.group, n)
    }
}

/// Names with a creation in flight in this process
#[derive(Debug, Default)]
pub struct NameClaims {
    inflight: Mutex<HashSet<String>>,
}

impl NameClaims {
    fn lock(&self) -> MutexGuard<'_, HashSet<String>> {
        self.inflight
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
    }

    /// Claim `name` until the returned guard drops.
    ///
    /// Fails with [`SandboxError::NameInUse`] while another claim on the same
    /// name is held.
    pub fn claim(&self, name: &str) -> Result<NameClaim<'_>> {
        if !self.lock().insert(name.to_string()) {
            return Err(SandboxError::NameInUse(name.to_string()));
        }
        debug!("Claimed name {}", name);
        Ok(NameClaim {
            claims: self,
            name: name.to_string(),
        })
    }

    pub fn is_claimed(&self, name: &str) -> bool {
        self.lock().contains(name)
    }
}

/// Held for the whole of one creation attempt, rollback included
#[derive(Debug)]
pub struct NameClaim<'a> {
    claims: &'a NameClaims,
    name: String,
}

impl NameClaim<'_> {
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for NameClaim<'_> {
    fn drop(&mut self) {
        self.claims.lock().remove(&self.name);
    }
}

/// Image tag derived from an instance name
pub fn image_tag(name: &str) -> String {
    format!("{}_image", name)
}
