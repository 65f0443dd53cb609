//! Artifact cache keyed by attachment id.
//!
//! Artifacts are immutable once written. Two callers racing on the same
//! miss both write, and because chunking is deterministic the values are
//! identical, so last-write-wins needs no lock.

use std::sync::Arc;

use crate::error::Result;
use crate::models::Artifact;
use crate::storage::{KeyValueBackend, get_typed, keys, put_typed};

#[derive(Clone)]
pub struct ArtifactCache {
    backend: Arc<dyn KeyValueBackend>,
}

impl ArtifactCache {
    pub fn new(backend: Arc<dyn KeyValueBackend>) -> Self {
        Self { backend }
    }

    pub async fn get(&self, attachment_id: &str) -> Result<Option<Artifact>> {
        get_typed(self.backend.as_ref(), &keys::artifact(attachment_id)).await
    }

    pub async fn put(&self, artifact: &Artifact) -> Result<()> {
        put_typed(
            self.backend.as_ref(),
            &keys::artifact(&artifact.attachment_id),
            artifact,
        )
        .await
    }
}
