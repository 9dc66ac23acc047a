//! Lua-hosted plugins
//!
//! A Lua plugin is a module found on the interpreter search path. Loading
//! it `require`s the module, calls its `create_iaito_plugin()` factory and
//! keeps the returned table alive in the Lua registry. The table's
//! `setup_plugin` and `terminate` functions are then called method-style.
//!
//! All access to the interpreter goes through [`ScriptHost::acquire`], which
//! hands out an [`InterpreterGuard`]. The guard is held for the whole
//! require/call sequence and released when it goes out of scope, including
//! on `?` early returns.

use mlua::{Function, Lua, RegistryKey, Table, Value};
use std::ops::Deref;
use std::path::Path;
use std::rc::Rc;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, trace, warn};

use super::api::{Plugin, SCRIPT_FACTORY};
use super::error::{PluginError, PluginResult};

/// Owner of the embedded Lua state
pub struct ScriptHost {
    lua: Mutex<Lua>,
}

/// Scoped ownership of the interpreter
pub struct InterpreterGuard<'a> {
    lua: MutexGuard<'a, Lua>,
}

impl Deref for InterpreterGuard<'_> {
    type Target = Lua;

    fn deref(&self) -> &Lua {
        &self.lua
    }
}

impl Drop for InterpreterGuard<'_> {
    fn drop(&mut self) {
        trace!("Released interpreter");
    }
}

impl ScriptHost {
    /// Create a host with the safe Lua standard library loaded
    #[must_use]
    pub fn new() -> Self {
        Self {
            lua: Mutex::new(Lua::new()),
        }
    }

    /// Take ownership of the interpreter until the guard is dropped.
    ///
    /// A plugin that panicked while holding the guard poisons the mutex;
    /// the Lua state itself is still consistent, so the poison is ignored.
    pub fn acquire(&self) -> InterpreterGuard<'_> {
        trace!("Acquired interpreter");
        InterpreterGuard {
            lua: self.lua.lock().unwrap_or_else(PoisonError::into_inner),
        }
    }

    /// Append `dir` to the module search path (`package.path`).
    ///
    /// # Errors
    /// Returns an error if the `package` library is not available
    pub fn add_module_path(&self, dir: &Path) -> mlua::Result<()> {
        let lua = self.acquire();
        let package: Table = lua.globals().get("package")?;
        let current: String = package.get("path")?;

        let sep = std::path::MAIN_SEPARATOR;
        let dir = dir.to_string_lossy();
        let patterns = format!("{dir}{sep}?.lua;{dir}{sep}?{sep}init.lua");
        if current.split(';').any(|entry| entry == format!("{dir}{sep}?.lua")) {
            return Ok(());
        }

        let path = if current.is_empty() {
            patterns
        } else {
            format!("{current};{patterns}")
        };
        debug!("Lua package.path is now {}", path);
        package.set("path", path)
    }

    /// Import `module` and build a plugin from its factory.
    ///
    /// # Errors
    /// - [`PluginError::Script`] if the import or the factory call raises
    /// - [`PluginError::MissingFactory`] if the module has no callable factory
    /// - [`PluginError::NotAPlugin`] if the factory result has no lifecycle hooks
    pub fn load_plugin(self: &Rc<Self>, module: &str) -> PluginResult<ScriptPlugin> {
        let lua = self.acquire();
        let script_error = |source| PluginError::Script {
            module: module.to_string(),
            source,
        };

        let require: Function = lua.globals().get("require").map_err(script_error)?;
        let exports: Value = require.call(module).map_err(script_error)?;

        let factory = match &exports {
            Value::Table(exports) => match exports.get::<_, Value>(SCRIPT_FACTORY) {
                Ok(Value::Function(factory)) => Some(factory),
                _ => None,
            },
            _ => None,
        };
        let Some(factory) = factory else {
            return Err(PluginError::MissingFactory {
                module: module.to_string(),
                factory: SCRIPT_FACTORY,
            });
        };

        let object: Value = factory.call(()).map_err(script_error)?;
        let not_a_plugin = |reason: String| PluginError::NotAPlugin {
            module: module.to_string(),
            factory: SCRIPT_FACTORY,
            reason,
        };

        let object = match object {
            Value::Table(object) => object,
            other => {
                return Err(not_a_plugin(format!(
                    "expected a table, got {}",
                    other.type_name()
                )))
            }
        };
        for hook in ["setup_plugin", "terminate"] {
            if !matches!(object.get::<_, Value>(hook), Ok(Value::Function(_))) {
                return Err(not_a_plugin(format!("missing {hook}() method")));
            }
        }

        let name = object
            .get::<_, Option<String>>("name")
            .ok()
            .flatten()
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| module.to_string());
        let key = lua.create_registry_value(object).map_err(script_error)?;

        Ok(ScriptPlugin {
            host: Rc::clone(self),
            name,
            object: Some(key),
        })
    }
}

impl Default for ScriptHost {
    fn default() -> Self {
        Self::new()
    }
}

/// A plugin object created by a Lua factory
pub struct ScriptPlugin {
    host: Rc<ScriptHost>,
    name: String,
    object: Option<RegistryKey>,
}

impl ScriptPlugin {
    /// Call `object:<hook>()`. Errors raised by the hook are printed and
    /// dropped; the plugin stays loaded.
    fn call_hook(&self, hook: &str) {
        let Some(key) = &self.object else {
            return;
        };
        let lua = self.host.acquire();
        let result = lua.registry_value::<Table>(key).and_then(|object| {
            let method: Function = object.get(hook)?;
            method.call::<_, ()>(object)
        });
        if let Err(err) = result {
            print_script_error(&format!("{}:{}()", self.name, hook), &err);
        }
    }
}

impl Plugin for ScriptPlugin {
    fn name(&self) -> &str {
        &self.name
    }

    fn setup_plugin(&mut self) {
        self.call_hook("setup_plugin");
    }

    fn terminate(&mut self) {
        self.call_hook("terminate");
    }
}

impl Drop for ScriptPlugin {
    fn drop(&mut self) {
        if let Some(key) = self.object.take() {
            let lua = self.host.acquire();
            if let Err(err) = lua.remove_registry_value(key) {
                debug!("Failed to release plugin {}: {}", self.name, err);
            }
        }
    }
}

/// Log an interpreter error with its Lua traceback
pub fn print_script_error(context: &str, err: &mlua::Error) {
    warn!("Lua error in {}:\n{}", context, err);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn host_with(files: &[(&str, &str)]) -> (tempfile::TempDir, Rc<ScriptHost>) {
        let dir = tempdir().unwrap();
        for (name, source) in files {
            fs::write(dir.path().join(name), source).unwrap();
        }
        let host = Rc::new(ScriptHost::new());
        host.add_module_path(dir.path()).unwrap();
        (dir, host)
    }

    const GOOD: &str = r#"
local M = {}
function M.create_iaito_plugin()
    return {
        name = "good",
        setup_plugin = function(self) calls = (calls or "") .. "setup;" end,
        terminate = function(self) calls = (calls or "") .. "terminate;" end,
    }
end
return M
"#;

    #[test]
    fn test_load_and_run_hooks() {
        let (_dir, host) = host_with(&[("good_plugin.lua", GOOD)]);
        let mut plugin = host.load_plugin("good_plugin").unwrap();
        assert_eq!(plugin.name(), "good");

        plugin.setup_plugin();
        plugin.terminate();

        let calls: String = host.acquire().globals().get("calls").unwrap();
        assert_eq!(calls, "setup;terminate;");
    }

    #[test]
    fn test_missing_module() {
        let (_dir, host) = host_with(&[]);
        assert!(matches!(
            host.load_plugin("does_not_exist"),
            Err(PluginError::Script { .. })
        ));
    }

    #[test]
    fn test_missing_factory() {
        let (_dir, host) = host_with(&[("empty.lua", "return { version = 1 }")]);
        assert!(matches!(
            host.load_plugin("empty"),
            Err(PluginError::MissingFactory { .. })
        ));
    }

    #[test]
    fn test_factory_raises() {
        let source = r#"return { create_iaito_plugin = function() error("boom") end }"#;
        let (_dir, host) = host_with(&[("raises.lua", source)]);
        match host.load_plugin("raises") {
            Err(PluginError::Script { source, .. }) => {
                assert!(source.to_string().contains("boom"));
            }
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("factory error must fail the load"),
        }
    }

    #[test]
    fn test_factory_returns_non_plugin() {
        let source = r#"return { create_iaito_plugin = function() return { setup_plugin = 1 } end }"#;
        let (_dir, host) = host_with(&[("wrong.lua", source)]);
        assert!(matches!(
            host.load_plugin("wrong"),
            Err(PluginError::NotAPlugin { .. })
        ));
    }

    #[test]
    fn test_name_defaults_to_module() {
        let source = r#"
return { create_iaito_plugin = function()
    return { setup_plugin = function() end, terminate = function() end }
end }
"#;
        let (_dir, host) = host_with(&[("unnamed.lua", source)]);
        let plugin = host.load_plugin("unnamed").unwrap();
        assert_eq!(plugin.name(), "unnamed");
    }

    #[test]
    fn test_hook_error_is_swallowed() {
        let source = r#"
return { create_iaito_plugin = function()
    return { setup_plugin = function() error("setup failed") end, terminate = function() end }
end }
"#;
        let (_dir, host) = host_with(&[("faulty.lua", source)]);
        let mut plugin = host.load_plugin("faulty").unwrap();
        plugin.setup_plugin();
        plugin.terminate();
    }

    #[test]
    fn test_add_module_path_once() {
        let dir = tempdir().unwrap();
        let host = ScriptHost::new();
        host.add_module_path(dir.path()).unwrap();
        host.add_module_path(dir.path()).unwrap();

        let lua = host.acquire();
        let package: Table = lua.globals().get("package").unwrap();
        let path: String = package.get("path").unwrap();
        let needle = format!("{}{}?.lua", dir.path().display(), std::path::MAIN_SEPARATOR);
        assert_eq!(path.matches(&needle).count(), 1);
    }
}
