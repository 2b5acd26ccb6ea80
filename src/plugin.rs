//! Plugin discovery and lifecycle.
//!
//! Plugins are compiled into the binary and listed in a `PluginRegistry` under
//! an entry-point name. Which of them actually run is decided by the plugin
//! directory: every `*.toml` manifest there names one entry point to
//! instantiate.
//!
//! ```toml
//! # plugins/webp.toml
//! name = "webp"
//! entry_point = "webp_to_png"
//! description = "Convert the current .webp file to PNG"
//! ```
//!
//! A manifest that cannot be read, has no entry point, or names one that is not
//! registered is skipped with a warning. So is a plugin whose `init` fails. One
//! broken plugin never stops the others from loading.

use crate::assignment::AssignmentError;
use crate::session::{HostContext, SessionEvent};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Default plugin directory, relative to the working directory.
pub const DEFAULT_PLUGIN_DIR: &str = "plugins";

/// Errors reported by the plugin host or by plugins themselves.
#[derive(Debug, Error)]
pub enum PluginError {
    #[error("Failed to read plugin manifest {}: {source}", path.display())]
    ManifestRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid plugin manifest {}: {reason}", path.display())]
    ManifestInvalid { path: PathBuf, reason: String },

    #[error("Unknown plugin '{0}'")]
    UnknownPlugin(String),

    #[error("Plugin '{plugin}' has no action '{action}'")]
    UnknownAction { plugin: String, action: String },

    #[error("Plugin '{0}' is not initialized")]
    NotInitialized(String),

    /// A plugin action failed.
    #[error("{0}")]
    Action(String),

    /// A host capability called by a plugin failed.
    #[error(transparent)]
    Host(#[from] AssignmentError),
}

/// Result type for plugin operations.
pub type PluginResult<T> = Result<T, PluginError>;

/// Human-readable plugin metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginInfo {
    pub name: String,
    pub description: String,
}

/// An extension loaded by the host.
///
/// Every hook receives the host context for the duration of the call only.
pub trait Plugin {
    fn info(&self) -> PluginInfo;

    /// Called once after instantiation. Typically registers panels.
    fn init(&mut self, ctx: &mut dyn HostContext) -> PluginResult<()>;

    /// Called once at shutdown.
    fn unload(&mut self, _ctx: &mut dyn HostContext) -> PluginResult<()> {
        Ok(())
    }

    /// Called for every event fired by the session.
    fn on_event(&mut self, _event: SessionEvent, _ctx: &mut dyn HostContext) {}

    /// Runs a named action, usually one offered on the plugin's panel.
    fn invoke(&mut self, action: &str, _ctx: &mut dyn HostContext) -> PluginResult<()> {
        Err(PluginError::UnknownAction {
            plugin: self.info().name,
            action: action.to_string(),
        })
    }
}

/// Constructor for a plugin.
pub type PluginFactory = fn() -> Box<dyn Plugin>;

/// Entry points the host knows how to instantiate.
#[derive(Default, Clone)]
pub struct PluginRegistry {
    factories: BTreeMap<String, PluginFactory>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with every plugin shipped in this crate.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register(
            crate::plugins::webp_to_png::ENTRY_POINT,
            crate::plugins::webp_to_png::create,
        );
        registry
    }

    pub fn register(&mut self, entry_point: &str, factory: PluginFactory) {
        self.factories.insert(entry_point.to_string(), factory);
    }

    /// Looks up an entry point; `None` if it is not registered.
    pub fn resolve(&self, entry_point: &str) -> Option<PluginFactory> {
        self.factories.get(entry_point).copied()
    }

    pub fn entry_points(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }
}

/// Contents of a plugin manifest file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PluginManifest {
    /// Registration name; defaults to the manifest's file stem.
    #[serde(default)]
    pub name: Option<String>,
    /// Registry entry point to instantiate.
    #[serde(default)]
    pub entry_point: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// A manifest found in the plugin directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredPlugin {
    pub name: String,
    pub path: PathBuf,
    pub manifest: PluginManifest,
}

/// Lifecycle of a registered plugin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PluginState {
    Discovered,
    Initialized,
    Unloaded,
}

struct Registration {
    name: String,
    state: PluginState,
    plugin: Box<dyn Plugin>,
}

/// Loads plugins from a directory and drives their lifecycle.
pub struct PluginHost {
    plugin_dir: PathBuf,
    registry: PluginRegistry,
    loaded: Vec<Registration>,
}

impl PluginHost {
    pub fn new(plugin_dir: impl Into<PathBuf>, registry: PluginRegistry) -> Self {
        Self {
            plugin_dir: plugin_dir.into(),
            registry,
            loaded: Vec::new(),
        }
    }

    pub fn plugin_dir(&self) -> &Path {
        &self.plugin_dir
    }

    /// Lists the manifests in the plugin directory in file name order.
    ///
    /// A missing directory yields nothing. Unreadable or malformed manifests
    /// are logged and left out.
    pub fn discover(&self) -> Vec<DiscoveredPlugin> {
        if !self.plugin_dir.is_dir() {
            debug!(dir = %self.plugin_dir.display(), "plugin directory not found");
            return Vec::new();
        }

        let pattern = self.plugin_dir.join("*.toml");
        let paths = match glob::glob(&pattern.to_string_lossy()) {
            Ok(paths) => paths,
            Err(e) => {
                warn!(dir = %self.plugin_dir.display(), error = %e, "cannot scan plugin directory");
                return Vec::new();
            }
        };

        let mut found = Vec::new();
        for path in paths.flatten() {
            match Self::read_manifest(&path) {
                Ok(manifest) => {
                    let name = manifest.name.clone().unwrap_or_else(|| {
                        path.file_stem()
                            .map(|s| s.to_string_lossy().to_string())
                            .unwrap_or_default()
                    });
                    found.push(DiscoveredPlugin {
                        name,
                        path,
                        manifest,
                    });
                }
                Err(e) => warn!(error = %e, "skipping plugin"),
            }
        }
        found
    }

    fn read_manifest(path: &Path) -> PluginResult<PluginManifest> {
        let content = fs::read_to_string(path).map_err(|e| PluginError::ManifestRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| PluginError::ManifestInvalid {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Instantiates and initializes every discovered plugin.
    ///
    /// Returns the names of the plugins that were loaded by this call.
    pub fn load_all(&mut self, ctx: &mut dyn HostContext) -> Vec<String> {
        let mut loaded_now = Vec::new();

        for discovered in self.discover() {
            if self.loaded.iter().any(|r| r.name == discovered.name) {
                debug!(plugin = %discovered.name, "plugin already loaded");
                continue;
            }

            let Some(entry_point) = discovered.manifest.entry_point.as_deref() else {
                warn!(plugin = %discovered.name, "plugin is missing its entry point");
                continue;
            };
            let Some(factory) = self.registry.resolve(entry_point) else {
                warn!(plugin = %discovered.name, entry_point, "plugin entry point is not registered");
                continue;
            };

            let mut registration = Registration {
                name: discovered.name,
                state: PluginState::Discovered,
                plugin: factory(),
            };

            if let Err(e) = registration.plugin.init(ctx) {
                warn!(plugin = %registration.name, error = %e, "plugin failed to initialize");
                continue;
            }
            registration.state = PluginState::Initialized;

            info!(plugin = %registration.name, title = %registration.plugin.info().name, "loaded plugin");
            loaded_now.push(registration.name.clone());
            self.loaded.push(registration);
        }

        loaded_now
    }

    /// Calls `unload` on every initialized plugin, in load order.
    pub fn unload_all(&mut self, ctx: &mut dyn HostContext) {
        for registration in &mut self.loaded {
            if registration.state != PluginState::Initialized {
                continue;
            }
            if let Err(e) = registration.plugin.unload(ctx) {
                warn!(plugin = %registration.name, error = %e, "plugin failed to unload");
            }
            registration.state = PluginState::Unloaded;
            debug!(plugin = %registration.name, "unloaded plugin");
        }
    }

    /// Forwards session events to every initialized plugin.
    pub fn notify(&mut self, events: &[SessionEvent], ctx: &mut dyn HostContext) {
        for registration in &mut self.loaded {
            if registration.state != PluginState::Initialized {
                continue;
            }
            for event in events {
                registration.plugin.on_event(*event, ctx);
            }
        }
    }

    /// Runs `action` on the plugin registered as `name`.
    pub fn invoke(
        &mut self,
        name: &str,
        action: &str,
        ctx: &mut dyn HostContext,
    ) -> PluginResult<()> {
        let registration = self
            .loaded
            .iter_mut()
            .find(|r| r.name == name)
            .ok_or_else(|| PluginError::UnknownPlugin(name.to_string()))?;

        if registration.state != PluginState::Initialized {
            return Err(PluginError::NotInitialized(name.to_string()));
        }
        registration.plugin.invoke(action, ctx)
    }

    /// Registered plugins with their lifecycle state and metadata, in load order.
    pub fn plugins(&self) -> Vec<(String, PluginState, PluginInfo)> {
        self.loaded
            .iter()
            .map(|r| (r.name.clone(), r.state, r.plugin.info()))
            .collect()
    }

    pub fn state(&self, name: &str) -> Option<PluginState> {
        self.loaded.iter().find(|r| r.name == name).map(|r| r.state)
    }
}
