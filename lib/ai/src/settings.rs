//! Backend registry and its persistence.
//!
//! [`OrchestratorSettings`] holds per-backend configuration and the active
//! backend. It is loaded once through a [`SettingsStore`], mutated in place
//! by user edits or by a successful failover, and saved explicitly after
//! every mutation.

use crate::backend::{BackendConfig, BackendKind, DEFAULT_NATIVE_MODEL};
use crate::error::{GenerationError, SettingsError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Configuration of every backend plus the active one.
///
/// Invariant: the active backend always has a configuration entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "SettingsBlob", into = "SettingsBlob")]
pub struct OrchestratorSettings {
    active_backend: BackendKind,
    per_backend: BTreeMap<BackendKind, BackendConfig>,
    failover_enabled: bool,
}

/// Persisted shape of [`OrchestratorSettings`].
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SettingsBlob {
    active_backend: BackendKind,
    #[serde(default)]
    per_backend: BTreeMap<BackendKind, BackendConfig>,
    #[serde(default = "default_failover_enabled")]
    failover_enabled: bool,
}

fn default_failover_enabled() -> bool {
    true
}

impl TryFrom<SettingsBlob> for OrchestratorSettings {
    type Error = SettingsError;

    fn try_from(blob: SettingsBlob) -> Result<Self, Self::Error> {
        Self::new(blob.active_backend, blob.per_backend, blob.failover_enabled)
    }
}

impl From<OrchestratorSettings> for SettingsBlob {
    fn from(settings: OrchestratorSettings) -> Self {
        Self {
            active_backend: settings.active_backend,
            per_backend: settings.per_backend,
            failover_enabled: settings.failover_enabled,
        }
    }
}

impl OrchestratorSettings {
    /// Creates settings, checking that `active` is configured.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::UnknownBackend`] if `per_backend` has no
    /// entry for `active`.
    pub fn new(
        active: BackendKind,
        per_backend: BTreeMap<BackendKind, BackendConfig>,
        failover_enabled: bool,
    ) -> Result<Self, SettingsError> {
        if !per_backend.contains_key(&active) {
            return Err(SettingsError::UnknownBackend { backend: active });
        }
        Ok(Self {
            active_backend: active,
            per_backend,
            failover_enabled,
        })
    }

    /// The active backend.
    #[must_use]
    pub fn active_backend(&self) -> BackendKind {
        self.active_backend
    }

    /// Configuration of the active backend.
    #[must_use]
    pub fn active_config(&self) -> &BackendConfig {
        // The constructor and every mutator keep the active key present.
        &self.per_backend[&self.active_backend]
    }

    /// Configuration of `kind`, if any.
    #[must_use]
    pub fn backend(&self, kind: BackendKind) -> Option<&BackendConfig> {
        self.per_backend.get(&kind)
    }

    /// All configured backends, in failover order.
    pub fn backends(&self) -> impl Iterator<Item = (BackendKind, &BackendConfig)> {
        self.per_backend.iter().map(|(kind, config)| (*kind, config))
    }

    /// Whether failover to other backends is enabled.
    #[must_use]
    pub fn failover_enabled(&self) -> bool {
        self.failover_enabled
    }

    /// Makes `kind` the active backend.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::UnknownBackend`] if `kind` is not configured.
    pub fn set_active(&mut self, kind: BackendKind) -> Result<(), SettingsError> {
        if !self.per_backend.contains_key(&kind) {
            return Err(SettingsError::UnknownBackend { backend: kind });
        }
        self.active_backend = kind;
        Ok(())
    }

    /// Inserts or replaces the configuration of `kind`.
    pub fn update_backend(&mut self, kind: BackendKind, config: BackendConfig) {
        self.per_backend.insert(kind, config);
    }

    /// Enables or disables failover.
    pub fn set_failover_enabled(&mut self, enabled: bool) {
        self.failover_enabled = enabled;
    }

    /// Records the models offered by `kind`, selecting the first one when
    /// no model is selected yet.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::UnknownBackend`] if `kind` is not configured.
    pub fn set_available_models(
        &mut self,
        kind: BackendKind,
        models: Vec<String>,
    ) -> Result<(), SettingsError> {
        let config = self
            .per_backend
            .get_mut(&kind)
            .ok_or(SettingsError::UnknownBackend { backend: kind })?;
        if config.model.trim().is_empty()
            && let Some(first) = models.first()
        {
            config.model = first.clone();
        }
        config.available_models = models;
        Ok(())
    }

    /// Checks whether `kind` is configured well enough to be called.
    ///
    /// This is the offline connection check offered to users; it makes no
    /// network call.
    ///
    /// # Errors
    ///
    /// Returns [`GenerationError::Configuration`] describing what is missing.
    pub fn check_backend(&self, kind: BackendKind) -> Result<(), GenerationError> {
        self.per_backend
            .get(&kind)
            .ok_or_else(|| GenerationError::configuration(kind, "backend has no configuration"))?
            .validate(kind)
    }

    /// Viable backends other than `failed`, in failover order.
    #[must_use]
    pub fn failover_candidates(&self, failed: BackendKind) -> Vec<BackendKind> {
        self.per_backend
            .iter()
            .filter(|(kind, config)| **kind != failed && config.is_viable(**kind))
            .map(|(kind, _)| *kind)
            .collect()
    }

    /// Records a successful failover to `kind`.
    pub(crate) fn promote(&mut self, kind: BackendKind) {
        debug_assert!(self.per_backend.contains_key(&kind));
        if self.per_backend.contains_key(&kind) {
            self.active_backend = kind;
        }
    }
}

impl Default for OrchestratorSettings {
    /// The first-run configuration: native backend active, well-known
    /// endpoints filled in, credentials empty, failover on.
    fn default() -> Self {
        let per_backend = BTreeMap::from([
            (
                BackendKind::NativeStructured,
                BackendConfig::new("", "", DEFAULT_NATIVE_MODEL).with_available_models(vec![
                    DEFAULT_NATIVE_MODEL.to_string(),
                    "gemini-2.5-pro".to_string(),
                ]),
            ),
            (
                BackendKind::ChatCompletionsJson,
                BackendConfig::new("https://api.openai.com/v1", "", ""),
            ),
            (
                BackendKind::LocalGenerateJson,
                BackendConfig::new("http://localhost:11434", "", ""),
            ),
            (BackendKind::EdgeInferenceJson, BackendConfig::default()),
        ]);
        Self {
            active_backend: BackendKind::NativeStructured,
            per_backend,
            failover_enabled: true,
        }
    }
}

/// Persistent storage for a single settings blob.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Loads stored settings, or `None` when nothing has been saved yet.
    async fn load(&self) -> Result<Option<OrchestratorSettings>, SettingsError>;

    /// Replaces the stored settings.
    async fn save(&self, settings: &OrchestratorSettings) -> Result<(), SettingsError>;

    /// Loads stored settings, falling back to the defaults.
    async fn load_or_default(&self) -> Result<OrchestratorSettings, SettingsError> {
        Ok(self.load().await?.unwrap_or_default())
    }
}

#[async_trait]
impl<S: SettingsStore + ?Sized> SettingsStore for Arc<S> {
    async fn load(&self) -> Result<Option<OrchestratorSettings>, SettingsError> {
        (**self).load().await
    }

    async fn save(&self, settings: &OrchestratorSettings) -> Result<(), SettingsError> {
        (**self).save(settings).await
    }
}

/// Stores settings as a JSON file.
///
/// Saves write a sibling temporary file and rename it over the target, so
/// a crash never leaves a half-written blob behind.
#[derive(Debug, Clone)]
pub struct FileSettingsStore {
    path: PathBuf,
}

impl FileSettingsStore {
    /// Creates a store backed by `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The file this store reads and writes.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl SettingsStore for FileSettingsStore {
    async fn load(&self) -> Result<Option<OrchestratorSettings>, SettingsError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(SettingsError::LoadFailed {
                    reason: format!("{}: {e}", self.path.display()),
                });
            }
        };
        let settings = serde_json::from_slice(&bytes).map_err(|e| SettingsError::Corrupt {
            reason: format!("{}: {e}", self.path.display()),
        })?;
        debug!(path = %self.path.display(), "loaded settings");
        Ok(Some(settings))
    }

    async fn save(&self, settings: &OrchestratorSettings) -> Result<(), SettingsError> {
        let save_failed = |e: std::io::Error| SettingsError::SaveFailed {
            reason: format!("{}: {e}", self.path.display()),
        };
        let json = serde_json::to_vec_pretty(settings).map_err(|e| SettingsError::SaveFailed {
            reason: e.to_string(),
        })?;
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await.map_err(save_failed)?;
        }
        let temp = self.temp_path();
        tokio::fs::write(&temp, json).await.map_err(save_failed)?;
        tokio::fs::rename(&temp, &self.path).await.map_err(save_failed)?;
        debug!(path = %self.path.display(), "saved settings");
        Ok(())
    }
}

/// Keeps settings in memory. Counts saves, which makes persistence
/// observable in tests.
#[derive(Debug, Clone, Default)]
pub struct MemorySettingsStore {
    inner: Arc<Mutex<MemoryState>>,
}

#[derive(Debug, Default)]
struct MemoryState {
    saved: Option<OrchestratorSettings>,
    saves: usize,
    fail_saves: bool,
}

impl MemorySettingsStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent save fail.
    pub fn fail_saves(&self) {
        self.lock().fail_saves = true;
    }

    /// The most recently saved settings.
    #[must_use]
    pub fn saved(&self) -> Option<OrchestratorSettings> {
        self.lock().saved.clone()
    }

    /// Number of successful saves.
    #[must_use]
    pub fn save_count(&self) -> usize {
        self.lock().saves
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[async_trait]
impl SettingsStore for MemorySettingsStore {
    async fn load(&self) -> Result<Option<OrchestratorSettings>, SettingsError> {
        Ok(self.saved())
    }

    async fn save(&self, settings: &OrchestratorSettings) -> Result<(), SettingsError> {
        let mut state = self.lock();
        if state.fail_saves {
            return Err(SettingsError::SaveFailed {
                reason: "store is read-only".to_string(),
            });
        }
        state.saved = Some(settings.clone());
        state.saves += 1;
        Ok(())
    }
}
