//! Cart store, its actor and the per-session registry
pub mod actor;
pub mod registry;
pub mod store;

#[cfg(test)]
pub(crate) mod test_support;

pub use actor::{CartCommand, CartHandle};
pub use registry::CartRegistry;
pub use store::{AuthContext, Backing, CartMode, CartStore, CartView, LineRef};
