//! User identities and their cache-aside resolution.

pub mod model;
pub mod resolver;
pub mod store;

pub use model::{Identity, Role, UserId};
pub use resolver::{IdentityResolver, Resolution, ResolutionSource};
pub use store::{IdentityStore, InMemoryIdentityStore};
