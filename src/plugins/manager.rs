use std::fs;
use std::path::{Path, PathBuf};
#[cfg(feature = "scripting")]
use std::rc::Rc;
use tracing::{debug, info, warn};

use super::api::Plugin;
use super::error::PluginError;
use super::loader::NativePlugin;
use super::paths::{absolute, PluginPaths};
#[cfg(feature = "scripting")]
use super::script::ScriptHost;

/// Subdirectory of a plugin root holding shared libraries
pub const NATIVE_DIR: &str = "native";

/// Subdirectory of a plugin root holding Lua modules
#[cfg(feature = "scripting")]
pub const SCRIPT_DIR: &str = "lua";

/// Entry of the Lua plugin directory that is never treated as a module
#[cfg(feature = "scripting")]
pub const SCRIPT_CACHE_DIR: &str = "__cache__";

#[cfg(feature = "scripting")]
const SCRIPT_SUFFIX: &str = ".lua";

/// Owns every loaded plugin for the lifetime of the application.
///
/// Plugins are kept in load order and terminated in that same order by
/// [`PluginManager::destroy_plugins`] or when the manager is dropped.
pub struct PluginManager {
    paths: PluginPaths,
    plugins: Vec<Box<dyn Plugin>>,
    #[cfg(feature = "scripting")]
    script_host: Option<Rc<ScriptHost>>,
}

impl PluginManager {
    /// Create a manager that searches `paths`
    #[must_use]
    pub fn new(paths: PluginPaths) -> Self {
        Self {
            paths,
            plugins: Vec::new(),
            #[cfg(feature = "scripting")]
            script_host: None,
        }
    }

    /// Load every plugin from the user directory and then from the other
    /// plugin directories.
    ///
    /// With `enable_plugins == false` nothing is loaded.
    ///
    /// # Panics
    /// Panics if plugins are already loaded.
    pub fn load_plugins(&mut self, enable_plugins: bool) {
        assert!(
            self.plugins.is_empty(),
            "load_plugins() called with {} plugin(s) already loaded",
            self.plugins.len()
        );

        if !enable_plugins {
            info!("Plugin loading is disabled");
            return;
        }

        let user_dir = self.user_plugins_directory();
        if let Some(user_dir) = &user_dir {
            self.load_plugins_from_dir(user_dir, true);
        }

        for dir in self.plugin_directories() {
            if user_dir.as_deref() == Some(absolute(&dir).as_path()) {
                continue;
            }
            self.load_plugins_from_dir(&dir, false);
        }
    }

    /// Load the native and Lua plugins found under one plugin root.
    ///
    /// A writable root gets its missing plugin subdirectories created.
    pub fn load_plugins_from_dir(&mut self, dir: &Path, writable: bool) {
        info!("Plugins are loaded from {}", dir.display());
        let before = self.plugins.len();
        if !dir.is_dir() {
            return;
        }

        let native_dir = dir.join(NATIVE_DIR);
        if writable {
            create_subdir(&native_dir);
        }
        if native_dir.is_dir() {
            self.load_native_plugins(&native_dir);
        }

        #[cfg(feature = "scripting")]
        {
            let script_dir = dir.join(SCRIPT_DIR);
            if writable {
                create_subdir(&script_dir);
            }
            if script_dir.is_dir() {
                self.load_script_plugins(&script_dir);
            }
        }

        info!("Loaded {} plugin(s).", self.plugins.len() - before);
    }

    /// See [`PluginPaths::plugin_directories`]
    #[must_use]
    pub fn plugin_directories(&self) -> Vec<PathBuf> {
        self.paths.plugin_directories()
    }

    /// See [`PluginPaths::user_plugins_directory`]
    #[must_use]
    pub fn user_plugins_directory(&self) -> Option<PathBuf> {
        self.paths.user_plugins_directory()
    }

    /// Load every regular file in `dir` as a native plugin library.
    ///
    /// Files that fail to load are logged and skipped. Libraries that load
    /// but are not Iaito plugins are skipped quietly.
    pub fn load_native_plugins(&mut self, dir: &Path) {
        let files = match sorted_entries(dir) {
            Ok(entries) => entries.into_iter().filter(|path| path.is_file()),
            Err(err) => {
                warn!("Cannot list native plugins in {}: {}", dir.display(), err);
                return;
            }
        };

        for path in files {
            match NativePlugin::load(&path) {
                Ok(plugin) => self.adopt(Box::new(plugin)),
                Err(err @ PluginError::MissingCapability { .. }) => debug!("Skipping {}", err),
                Err(err) => warn!(
                    "Load Error for plugin {}: {}",
                    file_name(&path),
                    err
                ),
            }
        }
    }

    /// Load every Lua module in `dir` as a plugin.
    ///
    /// `dir` is put on the module search path first. Entries may be
    /// `<name>.lua` files or `<name>/init.lua` packages.
    #[cfg(feature = "scripting")]
    pub fn load_script_plugins(&mut self, dir: &Path) {
        let host = Rc::clone(self.script_host.get_or_insert_with(Default::default));
        if let Err(err) = host.add_module_path(&absolute(dir)) {
            super::script::print_script_error("package.path", &err);
            return;
        }

        let entries = match sorted_entries(dir) {
            Ok(entries) => entries,
            Err(err) => {
                warn!("Cannot list Lua plugins in {}: {}", dir.display(), err);
                return;
            }
        };

        for path in entries {
            let file_name = file_name(&path);
            if file_name == SCRIPT_CACHE_DIR {
                continue;
            }
            let module = file_name
                .strip_suffix(SCRIPT_SUFFIX)
                .unwrap_or(&file_name)
                .to_string();
            if let Some(plugin) = self.load_script_plugin(&module) {
                self.adopt(plugin);
            }
        }
    }

    /// Import one Lua module and instantiate its plugin.
    ///
    /// Every failure is logged and yields `None`; interpreter errors never
    /// reach the caller.
    #[cfg(feature = "scripting")]
    pub fn load_script_plugin(&mut self, module: &str) -> Option<Box<dyn Plugin>> {
        let host = self.script_host.get_or_insert_with(Default::default);
        match host.load_plugin(module) {
            Ok(plugin) => Some(Box::new(plugin)),
            Err(PluginError::Script { module, source }) => {
                warn!("Couldn't load module for plugin: {}", module);
                super::script::print_script_error(&module, &source);
                None
            }
            Err(err) => {
                warn!("{}", err);
                None
            }
        }
    }

    /// Set up a plugin that was created by the host itself and take
    /// ownership of it.
    pub fn adopt(&mut self, mut plugin: Box<dyn Plugin>) {
        plugin.setup_plugin();
        debug!("Plugin {} is set up", plugin.name());
        self.plugins.push(plugin);
    }

    /// Terminate and drop every plugin, in load order
    pub fn destroy_plugins(&mut self) {
        for mut plugin in self.plugins.drain(..) {
            debug!("Terminating plugin {}", plugin.name());
            plugin.terminate();
        }
    }

    /// Loaded plugins in load order
    #[must_use]
    pub fn plugins(&self) -> &[Box<dyn Plugin>] {
        &self.plugins
    }

    #[must_use]
    pub fn plugin_names(&self) -> Vec<&str> {
        self.plugins.iter().map(|plugin| plugin.name()).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }
}

impl Default for PluginManager {
    fn default() -> Self {
        Self::new(PluginPaths::from_environment(&[]))
    }
}

impl Drop for PluginManager {
    fn drop(&mut self) {
        self.destroy_plugins();
    }
}

fn create_subdir(dir: &Path) {
    if let Err(err) = fs::create_dir_all(dir) {
        debug!("Cannot create {}: {}", dir.display(), err);
    }
}

/// Entries of `dir` sorted by file name, hidden (`.`-prefixed) ones left out
fn sorted_entries(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut entries = fs::read_dir(dir)?
        .map(|entry| entry.map(|entry| entry.path()))
        .filter(|path| !matches!(path, Ok(path) if file_name(path).starts_with('.')))
        .collect::<std::io::Result<Vec<_>>>()?;
    entries.sort();
    Ok(entries)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}
