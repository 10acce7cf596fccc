//! Token request models, issued tokens, and JWT claim helpers.

pub mod claims;
pub mod request;
pub mod token;

pub use claims::*;
pub use request::*;
pub use token::{record::*, secret::*};
