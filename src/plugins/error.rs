use std::path::PathBuf;
use thiserror::Error;

/// Reasons a single plugin candidate could not be loaded.
///
/// None of these abort a batch load; the manager logs them and moves on to
/// the next candidate.
#[derive(Debug, Error)]
pub enum PluginError {
    #[error("failed to load library {path}: {source}")]
    Library {
        path: PathBuf,
        #[source]
        source: libloading::Error,
    },

    /// The library opened fine but is not an Iaito plugin.
    #[error("{path} does not provide the plugin capability ({reason})")]
    MissingCapability { path: PathBuf, reason: String },

    #[cfg(feature = "scripting")]
    #[error("script error in module {module}: {source}")]
    Script {
        module: String,
        #[source]
        source: mlua::Error,
    },

    #[error("module {module} does not contain a callable {factory}() function")]
    MissingFactory { module: String, factory: &'static str },

    #[error("{factory}() in module {module} did not return a plugin: {reason}")]
    NotAPlugin {
        module: String,
        factory: &'static str,
        reason: String,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type PluginResult<T> = std::result::Result<T, PluginError>;
