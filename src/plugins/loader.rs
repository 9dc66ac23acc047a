use libloading::Library;
use std::ffi::{c_void, CStr};
use std::path::Path;
use tracing::debug;

use super::api::{symbols, Plugin, PluginCreate, PluginDestroy, PluginHook, PluginName};
use super::error::{PluginError, PluginResult};

/// A plugin living in a dynamically loaded library.
///
/// The hooks are plain function pointers copied out of `library`, so the
/// library must outlive every call through them. `library` is declared
/// last and is therefore dropped after `Drop::drop` has freed the handle.
pub struct NativePlugin {
    name: String,
    handle: *mut c_void,
    setup: PluginHook,
    terminate: PluginHook,
    destroy: PluginDestroy,
    #[allow(dead_code)] // Keeps the code behind the hooks mapped
    library: Library,
}

impl NativePlugin {
    /// Open `path` and instantiate the plugin it exports.
    ///
    /// # Errors
    /// - [`PluginError::Library`] if the file cannot be loaded as a library
    /// - [`PluginError::MissingCapability`] if it loads but is not a plugin
    pub fn load(path: &Path) -> PluginResult<Self> {
        // Safety: loading a library runs its initialisers. Plugin
        // directories are trusted locations, as they are for any host that
        // loads native extensions.
        let library = unsafe { Library::new(path) }.map_err(|source| PluginError::Library {
            path: path.to_path_buf(),
            source,
        })?;

        let missing = |symbol: &[u8]| PluginError::MissingCapability {
            path: path.to_path_buf(),
            reason: format!(
                "missing symbol {}",
                String::from_utf8_lossy(&symbol[..symbol.len() - 1])
            ),
        };

        // Safety: the symbol types are the plugin C ABI declared in `api`.
        let (create, setup, terminate, destroy, name_fn) = unsafe {
            let create = *library
                .get::<PluginCreate>(symbols::CREATE)
                .map_err(|_| missing(symbols::CREATE))?;
            let setup = *library
                .get::<PluginHook>(symbols::SETUP)
                .map_err(|_| missing(symbols::SETUP))?;
            let terminate = *library
                .get::<PluginHook>(symbols::TERMINATE)
                .map_err(|_| missing(symbols::TERMINATE))?;
            let destroy = *library
                .get::<PluginDestroy>(symbols::DESTROY)
                .map_err(|_| missing(symbols::DESTROY))?;
            let name_fn = library.get::<PluginName>(symbols::NAME).ok().map(|f| *f);
            (create, setup, terminate, destroy, name_fn)
        };

        // Safety: `create` comes from the library we still hold.
        let handle = unsafe { create() };
        if handle.is_null() {
            return Err(PluginError::MissingCapability {
                path: path.to_path_buf(),
                reason: "plugin constructor returned null".to_string(),
            });
        }

        let name = name_fn
            .and_then(|name_fn| {
                // Safety: the handle is live and the name is NUL-terminated
                // per the ABI; null means "no name".
                unsafe {
                    let raw = name_fn(handle);
                    (!raw.is_null()).then(|| CStr::from_ptr(raw).to_string_lossy().into_owned())
                }
            })
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| file_stem(path));

        debug!("Native plugin {} created from {}", name, path.display());

        Ok(Self {
            name,
            handle,
            setup,
            terminate,
            destroy,
            library,
        })
    }
}

impl Plugin for NativePlugin {
    fn name(&self) -> &str {
        &self.name
    }

    fn setup_plugin(&mut self) {
        // Safety: handle is non-null and not yet destroyed
        unsafe { (self.setup)(self.handle) }
    }

    fn terminate(&mut self) {
        // Safety: as above
        unsafe { (self.terminate)(self.handle) }
    }
}

impl Drop for NativePlugin {
    fn drop(&mut self) {
        if !self.handle.is_null() {
            // Safety: the handle came from this library's constructor and is
            // freed exactly once here.
            unsafe { (self.destroy)(self.handle) };
            self.handle = std::ptr::null_mut();
        }
    }
}

fn file_stem(path: &Path) -> String {
    let stem = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    // libfoo.so -> foo
    match stem.strip_prefix("lib") {
        Some(rest) if !rest.is_empty() && cfg!(unix) => rest.to_string(),
        _ => stem,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_load_non_library_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("README.txt");
        fs::write(&path, "not a shared object").unwrap();

        match NativePlugin::load(&path) {
            Err(PluginError::Library { path: failed, .. }) => assert_eq!(failed, path),
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("a text file must not load as a plugin"),
        }
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempdir().unwrap();
        assert!(NativePlugin::load(&dir.path().join("absent.so")).is_err());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_library_without_capability() {
        let Some(libm) = [
            "/lib/x86_64-linux-gnu/libm.so.6",
            "/usr/lib/x86_64-linux-gnu/libm.so.6",
            "/lib/aarch64-linux-gnu/libm.so.6",
            "/usr/lib/aarch64-linux-gnu/libm.so.6",
            "/lib64/libm.so.6",
            "/usr/lib64/libm.so.6",
            "/usr/lib/libm.so.6",
        ]
        .into_iter()
        .map(Path::new)
        .find(|path| path.is_file()) else {
            return;
        };

        let dir = tempdir().unwrap();
        let path = dir.path().join("libm.so");
        fs::copy(libm, &path).unwrap();

        match NativePlugin::load(&path) {
            Err(PluginError::MissingCapability { path: failed, .. }) => assert_eq!(failed, path),
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("libm exports no plugin entry points"),
        }
    }

    #[test]
    fn test_file_stem() {
        assert_eq!(file_stem(Path::new("/p/native/hello.dll")), "hello");
        if cfg!(unix) {
            assert_eq!(file_stem(Path::new("/p/native/libhello.so")), "hello");
            assert_eq!(file_stem(Path::new("/p/native/lib.so")), "lib");
        }
    }
}
