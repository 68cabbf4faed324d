//! Remote resource bootstrap: the dataset file and the assistant.
//!
//! Both are created at most once. Their identifiers are recorded in a TOML
//! manifest so later runs reuse them instead of creating duplicates.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use relay_ai::{AssistantConfig, AssistantId, AssistantsApi, FileId};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Name of the assistant created when none is configured
pub const DEFAULT_ASSISTANT_NAME: &str = "Data Creator";

/// Model used when none is configured
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Description given to the assistant when none is configured
pub const DEFAULT_DESCRIPTION: &str = "You are great at creating beautiful data visualizations. \
You analyze data present in .csv files, understand trends, and come up with data \
visualizations relevant to those trends. You also share a brief text summary of the \
trends observed.";

/// Uploaded dataset file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    pub id: FileId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uploaded_at: Option<DateTime<Utc>>,
}

/// Created assistant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssistantRecord {
    pub id: AssistantId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// File the assistant's code interpreter was given
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_id: Option<FileId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

/// Persisted record of remote resources
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceManifest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<FileRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assistant: Option<AssistantRecord>,
}

impl ResourceManifest {
    /// Load a manifest, or an empty one if the file does not exist
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Manifest(format!("{}: {}", path.display(), e)))?;
        toml::from_str(&content).map_err(|e| Error::Manifest(format!("{}: {}", path.display(), e)))
    }

    /// Write the manifest atomically (temp file + rename)
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| Error::Manifest(e.to_string()))?;
        let tmp = path.with_extension("toml.tmp");
        std::fs::write(&tmp, content)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }

    /// Fill empty slots with externally known identifiers.
    ///
    /// Returns true if anything was recorded.
    pub fn seed(&mut self, file_id: Option<FileId>, assistant_id: Option<AssistantId>) -> bool {
        let mut changed = false;
        if self.file.is_none() {
            if let Some(id) = file_id {
                self.file = Some(FileRecord {
                    id,
                    source: None,
                    uploaded_at: None,
                });
                changed = true;
            }
        }
        if self.assistant.is_none() {
            if let Some(id) = assistant_id {
                self.assistant = Some(AssistantRecord {
                    id,
                    name: None,
                    model: None,
                    file_id: None,
                    created_at: None,
                });
                changed = true;
            }
        }
        changed
    }
}

/// Outcome of an idempotent ensure operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ensured<T> {
    /// The resource did not exist and was created now
    Created(T),
    /// A previously recorded resource was reused
    Existing(T),
}

impl<T> Ensured<T> {
    pub fn was_created(&self) -> bool {
        matches!(self, Ensured::Created(_))
    }

    pub fn get(&self) -> &T {
        match self {
            Ensured::Created(v) | Ensured::Existing(v) => v,
        }
    }
}

/// How the assistant should be created
#[derive(Debug, Clone)]
pub struct AssistantSpec {
    pub name: String,
    pub model: String,
    pub description: String,
    pub instructions: Option<String>,
}

impl Default for AssistantSpec {
    fn default() -> Self {
        Self {
            name: DEFAULT_ASSISTANT_NAME.to_string(),
            model: DEFAULT_MODEL.to_string(),
            description: DEFAULT_DESCRIPTION.to_string(),
            instructions: None,
        }
    }
}

impl AssistantSpec {
    /// Creation request with the code interpreter bound to `file`
    pub fn to_config(&self, file: &FileId) -> AssistantConfig {
        let mut config = AssistantConfig::new(&self.name, &self.model)
            .with_description(&self.description)
            .with_code_interpreter(vec![file.clone()]);
        if let Some(ref instructions) = self.instructions {
            config = config.with_instructions(instructions);
        }
        config
    }
}

/// Identifiers produced by [`Bootstrapper::ensure_all`]
#[derive(Debug, Clone)]
pub struct Resources {
    pub file: Ensured<FileId>,
    pub assistant: Ensured<AssistantId>,
}

impl Resources {
    pub fn file_id(&self) -> &FileId {
        self.file.get()
    }

    pub fn assistant_id(&self) -> &AssistantId {
        self.assistant.get()
    }
}

/// Creates the remote file and assistant once and remembers them
pub struct Bootstrapper {
    api: Arc<dyn AssistantsApi>,
    manifest: ResourceManifest,
    manifest_path: Option<PathBuf>,
}

impl Bootstrapper {
    /// Bootstrap against a manifest stored at `path`
    pub fn open(api: Arc<dyn AssistantsApi>, path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let manifest = ResourceManifest::load(&path)?;
        Ok(Self {
            api,
            manifest,
            manifest_path: Some(path),
        })
    }

    /// Bootstrap against a manifest that is never written to disk
    pub fn in_memory(api: Arc<dyn AssistantsApi>, manifest: ResourceManifest) -> Self {
        Self {
            api,
            manifest,
            manifest_path: None,
        }
    }

    pub fn manifest(&self) -> &ResourceManifest {
        &self.manifest
    }

    /// Record identifiers known from elsewhere (e.g. the environment)
    pub fn seed(&mut self, file_id: Option<FileId>, assistant_id: Option<AssistantId>) -> Result<()> {
        if self.manifest.seed(file_id, assistant_id) {
            tracing::info!("seeded resource manifest from environment");
            self.persist()?;
        }
        Ok(())
    }

    /// Upload the dataset unless a file is already recorded
    pub async fn ensure_file(&mut self, dataset: &Path) -> Result<Ensured<FileId>> {
        if let Some(ref record) = self.manifest.file {
            return Ok(Ensured::Existing(record.id.clone()));
        }

        let bytes = tokio::fs::read(dataset).await.map_err(|e| {
            Error::Bootstrap(format!("cannot read dataset {}: {}", dataset.display(), e))
        })?;
        let file_name = dataset
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "dataset.csv".to_string());

        let id = self
            .api
            .upload_file(&file_name, bytes, relay_ai::providers::ASSISTANTS_PURPOSE)
            .await?;
        tracing::info!(file = %id, source = %dataset.display(), "uploaded dataset");

        self.manifest.file = Some(FileRecord {
            id: id.clone(),
            source: Some(dataset.to_path_buf()),
            uploaded_at: Some(Utc::now()),
        });
        self.persist()?;
        Ok(Ensured::Created(id))
    }

    /// Create the assistant unless one bound to `file` is already recorded
    pub async fn ensure_assistant(
        &mut self,
        spec: &AssistantSpec,
        file: &FileId,
    ) -> Result<Ensured<AssistantId>> {
        if let Some(ref record) = self.manifest.assistant {
            match record.file_id {
                Some(ref bound) if bound != file => {
                    tracing::info!(
                        assistant = %record.id,
                        bound = %bound,
                        current = %file,
                        "recorded assistant uses a different file, re-creating"
                    );
                }
                _ => return Ok(Ensured::Existing(record.id.clone())),
            }
        }

        let id = self.api.create_assistant(&spec.to_config(file)).await?;
        tracing::info!(assistant = %id, name = %spec.name, model = %spec.model, "created assistant");

        self.manifest.assistant = Some(AssistantRecord {
            id: id.clone(),
            name: Some(spec.name.clone()),
            model: Some(spec.model.clone()),
            file_id: Some(file.clone()),
            created_at: Some(Utc::now()),
        });
        self.persist()?;
        Ok(Ensured::Created(id))
    }

    /// Ensure the file, then an assistant bound to it
    pub async fn ensure_all(&mut self, dataset: &Path, spec: &AssistantSpec) -> Result<Resources> {
        let file = self.ensure_file(dataset).await?;
        let assistant = self.ensure_assistant(spec, file.get()).await?;
        Ok(Resources { file, assistant })
    }

    fn persist(&self) -> Result<()> {
        match self.manifest_path {
            Some(ref path) => self.manifest.save(path),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockApi;
    use relay_ai::ToolSpec;
    use tempfile::TempDir;

    fn dataset(dir: &TempDir) -> PathBuf {
        let path = dir.path().join("data.csv");
        std::fs::write(&path, "year,sales\n2023,10\n2024,12\n").unwrap();
        path
    }

    #[tokio::test]
    async fn test_ensure_all_creates_then_reuses() {
        let dir = TempDir::new().unwrap();
        let data = dataset(&dir);
        let manifest_path = dir.path().join("resources.toml");
        let api = Arc::new(MockApi::new());

        let mut boot = Bootstrapper::open(api.clone(), &manifest_path).unwrap();
        let first = boot.ensure_all(&data, &AssistantSpec::default()).await.unwrap();
        assert!(first.file.was_created());
        assert!(first.assistant.was_created());

        let mut reopened = Bootstrapper::open(api.clone(), &manifest_path).unwrap();
        let second = reopened
            .ensure_all(&data, &AssistantSpec::default())
            .await
            .unwrap();
        assert_eq!(second.file, Ensured::Existing(first.file_id().clone()));
        assert_eq!(
            second.assistant,
            Ensured::Existing(first.assistant_id().clone())
        );

        assert_eq!(api.uploads(), vec!["data.csv".to_string()]);
        assert_eq!(api.assistants().len(), 1);
    }

    #[tokio::test]
    async fn test_assistant_gets_code_interpreter_with_file() {
        let dir = TempDir::new().unwrap();
        let data = dataset(&dir);
        let api = Arc::new(MockApi::new());

        let mut boot = Bootstrapper::in_memory(api.clone(), ResourceManifest::default());
        let resources = boot.ensure_all(&data, &AssistantSpec::default()).await.unwrap();

        let config = &api.assistants()[0];
        assert_eq!(config.name, DEFAULT_ASSISTANT_NAME);
        assert_eq!(config.model, DEFAULT_MODEL);
        assert_eq!(config.description.as_deref(), Some(DEFAULT_DESCRIPTION));
        assert!(config.tools.contains(&ToolSpec::CodeInterpreter));
        assert_eq!(config.code_interpreter_files, vec![resources.file_id().clone()]);
    }

    #[tokio::test]
    async fn test_stale_assistant_is_recreated() {
        let dir = TempDir::new().unwrap();
        let data = dataset(&dir);
        let api = Arc::new(MockApi::new());
        let manifest = ResourceManifest {
            file: Some(FileRecord {
                id: FileId::new("file_new"),
                source: None,
                uploaded_at: None,
            }),
            assistant: Some(AssistantRecord {
                id: AssistantId::new("asst_old"),
                name: None,
                model: None,
                file_id: Some(FileId::new("file_old")),
                created_at: None,
            }),
        };

        let mut boot = Bootstrapper::in_memory(api.clone(), manifest);
        let resources = boot.ensure_all(&data, &AssistantSpec::default()).await.unwrap();

        assert!(!resources.file.was_created());
        assert!(resources.assistant.was_created());
        assert_ne!(resources.assistant_id(), &AssistantId::new("asst_old"));
        let record = boot.manifest().assistant.as_ref().unwrap();
        assert_eq!(record.file_id, Some(FileId::new("file_new")));
    }

    #[tokio::test]
    async fn test_seeded_ids_create_nothing() {
        let dir = TempDir::new().unwrap();
        let manifest_path = dir.path().join("resources.toml");
        let api = Arc::new(MockApi::new());

        let mut boot = Bootstrapper::open(api.clone(), &manifest_path).unwrap();
        boot.seed(Some(FileId::new("file_env")), Some(AssistantId::new("asst_env")))
            .unwrap();
        // The dataset does not need to exist when the file is already known
        let resources = boot
            .ensure_all(&dir.path().join("missing.csv"), &AssistantSpec::default())
            .await
            .unwrap();

        assert_eq!(resources.file, Ensured::Existing(FileId::new("file_env")));
        assert_eq!(
            resources.assistant,
            Ensured::Existing(AssistantId::new("asst_env"))
        );
        assert!(api.uploads().is_empty());
        assert!(api.assistants().is_empty());

        let saved = ResourceManifest::load(&manifest_path).unwrap();
        assert_eq!(saved.file.unwrap().id, FileId::new("file_env"));
    }

    #[test]
    fn test_seed_keeps_recorded_ids() {
        let mut manifest = ResourceManifest::default();
        assert!(manifest.seed(Some(FileId::new("file_a")), None));
        assert!(!manifest.seed(Some(FileId::new("file_b")), None));
        assert_eq!(manifest.file.unwrap().id, FileId::new("file_a"));
    }

    #[tokio::test]
    async fn test_missing_dataset_is_bootstrap_error() {
        let dir = TempDir::new().unwrap();
        let api = Arc::new(MockApi::new());
        let mut boot = Bootstrapper::in_memory(api, ResourceManifest::default());

        let err = boot
            .ensure_file(&dir.path().join("missing.csv"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Bootstrap(_)));
    }

    #[test]
    fn test_manifest_roundtrips_through_toml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("resources.toml");
        let mut manifest = ResourceManifest::default();
        manifest.seed(Some(FileId::new("file_1")), Some(AssistantId::new("asst_1")));

        manifest.save(&path).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("[file]"));
        assert!(content.contains("id = \"asst_1\""));
        assert_eq!(ResourceManifest::load(&path).unwrap(), manifest);
    }

    #[test]
    fn test_load_missing_manifest_is_empty() {
        let dir = TempDir::new().unwrap();
        let manifest = ResourceManifest::load(&dir.path().join("none.toml")).unwrap();
        assert_eq!(manifest, ResourceManifest::default());
    }

    #[test]
    fn test_invalid_manifest_is_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("resources.toml");
        std::fs::write(&path, "file = [not toml").unwrap();
        assert!(matches!(
            ResourceManifest::load(&path),
            Err(Error::Manifest(_))
        ));
    }
}
