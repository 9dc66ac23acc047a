use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Organisation and application names used for data locations
pub const ORGANIZATION: &str = "RadareOrg";
pub const APPLICATION: &str = "Iaito";

/// Subdirectory of every data location that holds plugins
pub const PLUGINS_DIR: &str = "plugins";

/// Plugin roots baked in at build time, separated like `PATH`
pub const EXTRA_PLUGIN_DIRS: Option<&str> = option_env!("IAITO_EXTRA_PLUGIN_DIRS");

/// Where plugin roots come from, in search order.
///
/// [`PluginPaths::from_environment`] fills this from the platform; tests
/// and embedders can build it by hand.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PluginPaths {
    /// Writable per-user application data location
    pub user_data_dir: Option<PathBuf>,
    /// Read-only, system-wide application data locations
    pub system_data_dirs: Vec<PathBuf>,
    /// Plugins shipped inside a relocatable bundle
    pub bundle_dir: Option<PathBuf>,
    /// Build-time and configured extra plugin roots
    pub extra_dirs: Vec<PathBuf>,
}

impl PluginPaths {
    /// Resolve the standard locations for this platform.
    ///
    /// `configured` are runtime extra roots; they come after the build-time
    /// ones.
    #[must_use]
    pub fn from_environment(configured: &[PathBuf]) -> Self {
        let mut extra_dirs = parse_dir_list(EXTRA_PLUGIN_DIRS.unwrap_or_default());
        extra_dirs.extend(configured.iter().cloned());

        Self {
            user_data_dir: dirs::data_dir().map(app_data_dir),
            system_data_dirs: system_data_dirs(),
            bundle_dir: bundle_plugins_dir(),
            extra_dirs,
        }
    }

    /// Every plugin root in load order: user location, system locations,
    /// bundle, then extra roots.
    #[must_use]
    pub fn plugin_directories(&self) -> Vec<PathBuf> {
        let mut result: Vec<PathBuf> = self
            .user_data_dir
            .iter()
            .chain(&self.system_data_dirs)
            .map(|location| location.join(PLUGINS_DIR))
            .collect();
        result.extend(self.bundle_dir.iter().cloned());
        result.extend(self.extra_dirs.iter().cloned());
        result
    }

    /// The writable plugin root, created if missing.
    ///
    /// Returns `None` when the platform has no writable data location or
    /// the directory cannot be created.
    #[must_use]
    pub fn user_plugins_directory(&self) -> Option<PathBuf> {
        let location = self.user_data_dir.as_ref()?;
        let plugins_dir = location.join(PLUGINS_DIR);
        if let Err(err) = fs::create_dir_all(&plugins_dir) {
            debug!("Cannot create {}: {}", plugins_dir.display(), err);
            return None;
        }
        Some(absolute(&plugins_dir))
    }
}

/// Split a `PATH`-style list, dropping empty entries
#[must_use]
pub fn parse_dir_list(list: &str) -> Vec<PathBuf> {
    std::env::split_paths(list)
        .filter(|path| !path.as_os_str().is_empty())
        .collect()
}

/// Absolute form of `path`, resolving symlinks when it exists
pub(crate) fn absolute(path: &Path) -> PathBuf {
    fs::canonicalize(path)
        .or_else(|_| std::path::absolute(path))
        .unwrap_or_else(|_| path.to_path_buf())
}

fn app_data_dir(base: PathBuf) -> PathBuf {
    base.join(ORGANIZATION).join(APPLICATION)
}

#[cfg(all(unix, not(target_os = "macos")))]
fn system_data_dirs() -> Vec<PathBuf> {
    let dirs = std::env::var("XDG_DATA_DIRS")
        .ok()
        .map(|value| parse_dir_list(&value))
        .filter(|dirs| !dirs.is_empty())
        .unwrap_or_else(|| vec![PathBuf::from("/usr/local/share"), PathBuf::from("/usr/share")]);
    dirs.into_iter().map(app_data_dir).collect()
}

#[cfg(target_os = "macos")]
fn system_data_dirs() -> Vec<PathBuf> {
    vec![app_data_dir(PathBuf::from("/Library/Application Support"))]
}

#[cfg(windows)]
fn system_data_dirs() -> Vec<PathBuf> {
    let mut dirs: Vec<PathBuf> = std::env::var_os("PROGRAMDATA")
        .map(|value| app_data_dir(PathBuf::from(value)))
        .into_iter()
        .collect();
    if let Some(exe_dir) = executable_dir() {
        dirs.push(exe_dir.join("data"));
        dirs.push(exe_dir);
    }
    dirs
}

#[cfg(not(any(unix, windows)))]
fn system_data_dirs() -> Vec<PathBuf> {
    Vec::new()
}

#[allow(dead_code)] // Unused on some platform/feature combinations
fn executable_dir() -> Option<PathBuf> {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
}

/// `<appdir>/bin/iaito` -> `<appdir>/share/RadareOrg/Iaito/plugins`
#[cfg(feature = "appimage")]
fn bundle_plugins_dir() -> Option<PathBuf> {
    let bin_dir = executable_dir()?;
    let dir = bin_dir
        .parent()?
        .join("share")
        .join(ORGANIZATION)
        .join(APPLICATION)
        .join(PLUGINS_DIR);
    dir.is_dir().then_some(dir)
}

#[cfg(not(feature = "appimage"))]
fn bundle_plugins_dir() -> Option<PathBuf> {
    None
}
