//! Token maintenance flows built on the backend clients and the core configuration.

pub mod compute_resource;
pub mod refresh;

pub use compute_resource::*;
pub use refresh::*;
