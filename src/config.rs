//! Typed persisted records built on [`ConfigRepository`](crate::store::ConfigRepository).
//!
//! [`CoreConfig`] holds the CLI session (endpoints, tokens, plugin repositories, feature
//! flags); [`PluginConfig`] holds one free-form JSON object per plugin. [`ConfigPaths`]
//! derives both locations from an explicit root directory.

pub mod core_config;
pub mod paths;
pub mod plugin_config;

pub use core_config::*;
pub use paths::*;
pub use plugin_config::*;
