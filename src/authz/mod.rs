pub mod errors;
pub mod loader;
pub mod policy;
pub mod store;
pub mod types;
pub mod web;

pub use errors::AuthzError;
pub use store::PolicyStore;
pub use types::{Action, Membership, Permission};
