//! Local snapshot resolution.
//!
//! Wraps an engine loader and makes sure the weights for a model are present
//! on disk before the engine is asked to construct it.

use async_trait::async_trait;
use cantor_abstraction::{LoadTarget, ModelError, ModelLoader, SpeechModel};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Loader decorator that resolves `repo_id` to a directory under `root`.
///
/// For `Qwen/Qwen3-TTS-12Hz-0.6B-CustomVoice` these locations are tried, in
/// order:
///
/// - `<root>/Qwen3-TTS-12Hz-0.6B-CustomVoice`
/// - `<root>/Qwen/Qwen3-TTS-12Hz-0.6B-CustomVoice`
/// - `<root>/models--Qwen--Qwen3-TTS-12Hz-0.6B-CustomVoice` (hub cache layout)
#[derive(Debug)]
pub struct SnapshotLoader<L> {
    root: PathBuf,
    inner: L,
}

impl<L: ModelLoader> SnapshotLoader<L> {
    /// Wrap `inner`, resolving snapshots under `root`.
    pub fn new(root: impl Into<PathBuf>, inner: L) -> Self {
        Self { root: root.into(), inner }
    }

    /// The snapshot root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Candidate directories for `repo_id`, in lookup order.
    pub fn candidates(&self, repo_id: &str) -> Vec<PathBuf> {
        let (org, name) = repo_id.split_once('/').unwrap_or(("", repo_id));
        let mut dirs = vec![self.root.join(name)];
        if !org.is_empty() {
            dirs.push(self.root.join(org).join(name));
            dirs.push(self.root.join(format!("models--{org}--{name}")));
        }
        dirs
    }

    /// First existing snapshot directory for `repo_id`.
    pub fn resolve(&self, repo_id: &str) -> Option<PathBuf> {
        self.candidates(repo_id).into_iter().find(|dir| dir.is_dir())
    }
}

#[async_trait]
impl<L: ModelLoader> ModelLoader for SnapshotLoader<L> {
    async fn load(&self, target: &LoadTarget) -> Result<Arc<dyn SpeechModel>, ModelError> {
        let dir = self.resolve(&target.repo_id).ok_or_else(|| {
            ModelError::LoadError(format!(
                "no local snapshot of {} under {}",
                target.repo_id,
                self.root.display()
            ))
        })?;
        debug!(model_id = %target.model_id, dir = %dir.display(), "Resolved snapshot");

        let resolved = LoadTarget { weights_dir: Some(dir), ..target.clone() };
        self.inner.load(&resolved).await
    }

    fn reclaim(&self) {
        self.inner.reclaim();
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{ModelFamily, ModelKey};
    use crate::MockLoader;
    use cantor_abstraction::LoadOptions;
    use tempfile::TempDir;

    #[test]
    fn test_candidates_order() {
        let loader = SnapshotLoader::new("/models", MockLoader::new());
        let dirs = loader.candidates("Qwen/Qwen3-TTS-12Hz-0.6B-Base");
        assert_eq!(
            dirs,
            vec![
                PathBuf::from("/models/Qwen3-TTS-12Hz-0.6B-Base"),
                PathBuf::from("/models/Qwen/Qwen3-TTS-12Hz-0.6B-Base"),
                PathBuf::from("/models/models--Qwen--Qwen3-TTS-12Hz-0.6B-Base"),
            ]
        );
    }

    #[tokio::test]
    async fn test_missing_snapshot_fails_without_calling_engine() {
        let dir = TempDir::new().unwrap();
        let loader = SnapshotLoader::new(dir.path(), MockLoader::new());
        let target = ModelKey::default_for(ModelFamily::Turbo).load_target(LoadOptions::default());

        let err = loader.load(&target).await.err().unwrap();

        assert!(matches!(err, ModelError::LoadError(ref msg) if msg.contains("chatterbox-turbo")));
        assert_eq!(loader.inner.load_count(), 0);
    }

    #[tokio::test]
    async fn test_present_snapshot_delegates() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("ResembleAI").join("chatterbox")).unwrap();
        let loader = SnapshotLoader::new(dir.path(), MockLoader::new());
        let target =
            ModelKey::default_for(ModelFamily::Standard).load_target(LoadOptions::default());

        let model = loader.load(&target).await.unwrap();

        assert_eq!(model.model_id(), "Standard_500M");
        assert_eq!(loader.inner.load_count(), 1);
    }
}
