//! Minimal native Iaito plugin.
//!
//! Build with `cargo build --release` and copy the resulting shared library
//! into `<plugins>/native/`. When `IAITO_HELLO_NATIVE_LOG` names a file,
//! every lifecycle call is appended to it.

use std::ffi::{c_char, c_void};
use std::io::Write;

/// Hello Native Plugin - state behind the opaque handle
pub struct HelloNativePlugin {
    set_up: bool,
}

impl HelloNativePlugin {
    fn setup(&mut self) {
        self.set_up = true;
        record("setup;");
        eprintln!("[Hello Native Plugin] Set up!");
    }

    fn terminate(&mut self) {
        if self.set_up {
            eprintln!("[Hello Native Plugin] Terminated!");
        }
        record("terminate;");
        self.set_up = false;
    }
}

fn record(event: &str) {
    let Some(path) = std::env::var_os("IAITO_HELLO_NATIVE_LOG") else {
        return;
    };
    if let Ok(mut log) = std::fs::OpenOptions::new().create(true).append(true).open(path) {
        let _ = log.write_all(event.as_bytes());
    }
}

/// Plugin entry point
#[no_mangle]
pub extern "C" fn iaito_plugin_create() -> *mut c_void {
    Box::into_raw(Box::new(HelloNativePlugin { set_up: false })).cast()
}

#[no_mangle]
pub extern "C" fn iaito_plugin_setup(plugin: *mut c_void) {
    if let Some(plugin) = unsafe { plugin.cast::<HelloNativePlugin>().as_mut() } {
        plugin.setup();
    }
}

#[no_mangle]
pub extern "C" fn iaito_plugin_terminate(plugin: *mut c_void) {
    if let Some(plugin) = unsafe { plugin.cast::<HelloNativePlugin>().as_mut() } {
        plugin.terminate();
    }
}

/// Destroy plugin instance
#[no_mangle]
pub extern "C" fn iaito_plugin_destroy(plugin: *mut c_void) {
    if !plugin.is_null() {
        unsafe { drop(Box::from_raw(plugin.cast::<HelloNativePlugin>())) };
        record("destroy;");
    }
}

/// Get plugin name
#[no_mangle]
pub extern "C" fn iaito_plugin_name(_plugin: *mut c_void) -> *const c_char {
    c"Hello Native".as_ptr()
}
