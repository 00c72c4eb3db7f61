//! In-memory material revision resolver.

use conveyor_core::Result;
use conveyor_core::material::{MaterialConfig, MaterialRevision, Modification};
use conveyor_core::ports::MaterialRevisionResolver;
use dashmap::DashMap;

/// Latest modifications per material fingerprint, newest first.
#[derive(Default)]
pub struct InMemoryMaterialResolver {
    latest: DashMap<String, MaterialRevision>,
}

impl InMemoryMaterialResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record new modifications for a material. They are placed in front of
    /// the modifications already known.
    pub fn publish(&self, revision: MaterialRevision) {
        let mut entry = self
            .latest
            .entry(revision.fingerprint())
            .or_insert_with(|| MaterialRevision::new(revision.material.clone(), vec![]));
        let known: Vec<Modification> = std::mem::take(&mut entry.modifications);
        entry.material = revision.material;
        entry.modifications = revision
            .modifications
            .into_iter()
            .chain(known)
            .collect();
    }
}

impl MaterialRevisionResolver for InMemoryMaterialResolver {
    fn latest_revision(&self, material: &MaterialConfig) -> Result<Option<MaterialRevision>> {
        Ok(self
            .latest
            .get(&material.fingerprint())
            .map(|revision| MaterialRevision::new(material.clone(), revision.modifications.clone())))
    }
}
