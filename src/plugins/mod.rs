//! Plugin discovery, loading and lifetime management
//!
//! - Native plugins are shared libraries in `<root>/native` exporting the
//!   C ABI described in [`api::symbols`]
//! - Lua plugins (feature `scripting`) are modules in `<root>/lua`
//! - [`PluginManager`] owns everything that loaded and terminates it in
//!   load order

pub mod api;
pub mod error;
pub mod loader;
pub mod manager;
pub mod paths;
#[cfg(feature = "scripting")]
pub mod script;

pub use api::Plugin;
pub use error::{PluginError, PluginResult};
pub use manager::PluginManager;
pub use paths::PluginPaths;
