//! Iaito - plugin and decompiler plumbing for the radare2 front-end
//!
//! This library holds the parts of Iaito that do not depend on the GUI:
//! loading and owning plugins, and turning radare2 decompiler output into
//! annotated code.
//!
//! # Modules
//!
//! - [`plugins`]: plugin discovery, native and Lua loaders, [`plugins::PluginManager`]
//! - [`decompiler`]: annotated code and the `pdc` decompiler adapter
//! - [`engine`]: running commands on the radare2 analysis engine
//! - [`config`]: configuration file handling

pub mod config;
pub mod decompiler;
pub mod engine;
pub mod plugins;
