use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::plugin_system::error::{PluginSystemError, Result};
use crate::plugin_system::manifest::PluginDescriptor;
use crate::plugin_system::state::PluginState;

/// Persisted record for one plugin.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RegistryEntry {
    pub state: PluginState,
    pub version: String,
    pub path: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_loaded: Option<u64>,
}

/// On-disk entry shape. Current files store a state name; files written by
/// older releases stored an `{enabled, loaded}` boolean pair instead. Both
/// deserialize, and the next sync rewrites in the current shape.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum StoredEntry {
    Current {
        state: PluginState,
        version: String,
        path: PathBuf,
        #[serde(default)]
        last_loaded: Option<u64>,
    },
    Legacy {
        enabled: bool,
        loaded: bool,
        version: String,
        path: PathBuf,
    },
}

impl From<StoredEntry> for RegistryEntry {
    fn from(stored: StoredEntry) -> Self {
        match stored {
            StoredEntry::Current {
                state,
                version,
                path,
                last_loaded,
            } => RegistryEntry {
                state,
                version,
                path,
                last_loaded,
            },
            StoredEntry::Legacy {
                enabled,
                loaded,
                version,
                path,
            } => RegistryEntry {
                state: PluginState::from_enabled_loaded(enabled, loaded),
                version,
                path,
                last_loaded: None,
            },
        }
    }
}

/// Durable record of plugin states, persisted as a JSON map keyed by
/// plugin id. Writes are buffered behind a dirty flag and flushed by
/// [`PluginRegistry::sync`].
#[derive(Debug)]
pub struct PluginRegistry {
    path: PathBuf,
    entries: HashMap<String, RegistryEntry>,
    dirty: bool,
    loaded_once: bool,
}

impl PluginRegistry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            entries: HashMap::new(),
            dirty: false,
            loaded_once: false,
        }
    }

    /// Load entries from disk. The in-memory cache is authoritative while
    /// clean; the file is only re-read if the cache has never been filled
    /// or unsynced changes were discarded. A missing file is an empty
    /// registry, not an error.
    pub async fn load(&mut self) -> Result<()> {
        if self.loaded_once && !self.dirty {
            return Ok(());
        }

        match fs::read_to_string(&self.path).await {
            Ok(contents) => {
                let stored: HashMap<String, StoredEntry> = serde_json::from_str(&contents)?;
                self.entries = stored
                    .into_iter()
                    .map(|(id, entry)| (id, entry.into()))
                    .collect();
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                self.entries.clear();
            }
            Err(e) => {
                return Err(PluginSystemError::RegistryIo {
                    operation: "read".to_string(),
                    path: self.path.clone(),
                    source: e,
                });
            }
        }

        self.loaded_once = true;
        self.dirty = false;
        Ok(())
    }

    /// Reconcile persisted entries against what discovery actually found.
    ///
    /// Entries for vanished plugins are pruned, a persisted `Loaded` state
    /// is demoted to `Enabled` (no instance survives a restart), a
    /// persisted `Error` state resets to `Discovered` (rediscovery is the
    /// recovery path), version and path are refreshed, and plugins seen
    /// for the first time start as `Discovered`.
    pub fn reconcile(&mut self, discovered: &[PluginDescriptor]) {
        let known: HashMap<&str, &PluginDescriptor> =
            discovered.iter().map(|d| (d.id.as_str(), d)).collect();

        let before = self.entries.len();
        self.entries.retain(|id, _| {
            let keep = known.contains_key(id.as_str());
            if !keep {
                log::info!("Pruning registry entry for vanished plugin '{id}'");
            }
            keep
        });
        if self.entries.len() != before {
            self.dirty = true;
        }

        for descriptor in discovered {
            match self.entries.get_mut(&descriptor.id) {
                Some(entry) => {
                    if entry.state == PluginState::Loaded {
                        entry.state = PluginState::Enabled;
                        self.dirty = true;
                    }
                    if entry.state == PluginState::Error {
                        entry.state = PluginState::Discovered;
                        self.dirty = true;
                    }
                    if entry.version != descriptor.version
                        || entry.path != descriptor.install_path
                    {
                        entry.version = descriptor.version.clone();
                        entry.path = descriptor.install_path.clone();
                        self.dirty = true;
                    }
                }
                None => {
                    self.entries.insert(
                        descriptor.id.clone(),
                        RegistryEntry {
                            state: PluginState::Discovered,
                            version: descriptor.version.clone(),
                            path: descriptor.install_path.clone(),
                            last_loaded: None,
                        },
                    );
                    self.dirty = true;
                }
            }
        }
    }

    /// Record a state change for a known plugin. Unknown ids are logged and
    /// ignored; the registry only tracks what discovery registered.
    pub fn record(&mut self, plugin_id: &str, state: PluginState) {
        match self.entries.get_mut(plugin_id) {
            Some(entry) => {
                entry.state = state;
                if state == PluginState::Loaded {
                    entry.last_loaded = SystemTime::now()
                        .duration_since(UNIX_EPOCH)
                        .ok()
                        .map(|d| d.as_secs());
                }
                self.dirty = true;
            }
            None => {
                log::warn!("Ignoring state record for unregistered plugin '{plugin_id}'");
            }
        }
    }

    /// Flush pending changes to disk. A no-op when nothing changed.
    pub async fn sync(&mut self) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| PluginSystemError::RegistryIo {
                    operation: "create directory".to_string(),
                    path: parent.to_path_buf(),
                    source: e,
                })?;
        }

        let serialized = serde_json::to_string_pretty(&self.entries)?;
        fs::write(&self.path, serialized)
            .await
            .map_err(|e| PluginSystemError::RegistryIo {
                operation: "write".to_string(),
                path: self.path.clone(),
                source: e,
            })?;

        self.dirty = false;
        log::debug!("Registry synced to {}", self.path.display());
        Ok(())
    }

    pub fn get(&self, plugin_id: &str) -> Option<&RegistryEntry> {
        self.entries.get(plugin_id)
    }

    /// Snapshot of all persisted states.
    pub fn states(&self) -> HashMap<String, PluginState> {
        self.entries
            .iter()
            .map(|(id, entry)| (id.clone(), entry.state))
            .collect()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
