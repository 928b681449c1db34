//! Group-scoped container listing

use std::sync::Arc;

use log::debug;

use crate::engine::{ContainerEngine, ContainerRecord};
use crate::errors::Result;

/// Lists the containers belonging to one group namespace.
///
/// Membership is purely a name match: a container belongs to the group when
/// its name contains the group prefix.
#[derive(Clone)]
pub struct GroupRegistry {
    engine: Arc<dyn ContainerEngine>,
    group: String,
}

impl GroupRegistry {
    pub fn new(engine: Arc<dyn ContainerEngine>, group: impl Into<String>) -> Self {
        Self {
            engine,
            group: group.into(),
        }
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    pub fn contains(&self, name: &str) -> bool {
        name.contains(&self.group)
    }

    /// All group containers, stopped ones included, in engine order
    pub async fn list(&self) -> Result<Vec<ContainerRecord>> {
        let all = self.engine.list_containers().await?;
        let total = all.len();
        let members: Vec<ContainerRecord> =
            all.into_iter().filter(|c| self.contains(&c.name)).collect();
        debug!(
            "{} of {} containers belong to group {}",
            members.len(),
            total,
            self.group
        );
        Ok(members)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::fake::FakeEngine;
    use crate::engine::SandboxStatus;

    #[tokio::test]
    async fn test_list_filters_by_group() {
        let engine = Arc::new(FakeEngine::default());
        engine.add_container("grupo_vms_vm1", SandboxStatus::Running);
        engine.add_container("postgres", SandboxStatus::Running);
        engine.add_container("grupo_vms_vm2", SandboxStatus::Exited);
        engine.add_container("other_vm3", SandboxStatus::Running);

        let registry = GroupRegistry::new(engine, "grupo_vms");
        let names: Vec<String> = registry
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();

        assert_eq!(names, vec!["grupo_vms_vm1", "grupo_vms_vm2"]);
    }

    #[tokio::test]
    async fn test_list_includes_stopped() {
        let engine = Arc::new(FakeEngine::default());
        engine.add_container("grupo_vms_vm5", SandboxStatus::Exited);

        let registry = GroupRegistry::new(engine, "grupo_vms");
        let listed = registry.list().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].status, SandboxStatus::Exited);
    }

    #[tokio::test]
    async fn test_empty_engine() {
        let registry = GroupRegistry::new(Arc::new(FakeEngine::default()), "grupo_vms");
        assert!(registry.list().await.unwrap().is_empty());
    }
}
