/// Plugin API definitions
use std::ffi::{c_char, c_void};

/// Lifecycle capability every Iaito plugin provides, whatever loaded it.
///
/// The manager calls `setup_plugin` once right after loading and
/// `terminate` once right before dropping the plugin. Neither hook can
/// report failure to the manager; implementations log their own errors.
pub trait Plugin {
    /// Name used in logs and listings
    fn name(&self) -> &str;

    /// Set up the plugin after it has been loaded
    fn setup_plugin(&mut self);

    /// Release plugin resources before the plugin is dropped
    fn terminate(&mut self);
}

impl std::fmt::Debug for dyn Plugin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Plugin").field("name", &self.name()).finish()
    }
}

/// Symbols a native plugin library must export.
///
/// A library that lacks any of the required ones is not a plugin and is
/// skipped by the loader.
pub mod symbols {
    pub const CREATE: &[u8] = b"iaito_plugin_create\0";
    pub const SETUP: &[u8] = b"iaito_plugin_setup\0";
    pub const TERMINATE: &[u8] = b"iaito_plugin_terminate\0";
    pub const DESTROY: &[u8] = b"iaito_plugin_destroy\0";
    /// Optional; the file stem is used when absent
    pub const NAME: &[u8] = b"iaito_plugin_name\0";
}

/// `iaito_plugin_create`: returns an opaque, non-null plugin handle
pub type PluginCreate = unsafe extern "C" fn() -> *mut c_void;

/// `iaito_plugin_setup` and `iaito_plugin_terminate`
pub type PluginHook = unsafe extern "C" fn(*mut c_void);

/// `iaito_plugin_destroy`: frees the handle returned by `iaito_plugin_create`
pub type PluginDestroy = unsafe extern "C" fn(*mut c_void);

/// `iaito_plugin_name`: NUL-terminated name owned by the plugin
pub type PluginName = unsafe extern "C" fn(*mut c_void) -> *const c_char;

/// Name of the factory a Lua plugin module must define
pub const SCRIPT_FACTORY: &str = "create_iaito_plugin";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbols_are_nul_terminated() {
        for symbol in [
            symbols::CREATE,
            symbols::SETUP,
            symbols::TERMINATE,
            symbols::DESTROY,
            symbols::NAME,
        ] {
            assert_eq!(symbol.last(), Some(&0));
            assert!(symbol.starts_with(b"iaito_plugin_"));
        }
    }
}
