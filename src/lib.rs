//! fieldgate - field-level authorization for GraphQL
//!
//! Every top-level field of every query and mutation in a request is checked
//! against a role-based policy store before the request reaches the GraphQL
//! engine. This library exposes all modules for testing purposes.

pub mod authz;
pub mod errors;
pub mod gate;
pub mod graphql;
pub mod inspect;
pub mod middleware;
pub mod settings;
pub mod web;
