//! Auth-domain identifiers, credentials, caching, and the strategies that issue them.

pub mod cache;
pub mod id;
pub mod pending;
pub mod strategy;
pub mod token;

pub use cache::*;
pub use id::*;
pub use pending::*;
pub use strategy::*;
pub use token::{credential::*, secret::*};
