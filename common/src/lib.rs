//! Shared contracts for the Materialize TAIL data source.
//!
//! Both the backend service and the front-end plugin adapter depend on this
//! crate for the query model, settings, data frames, the API envelope and the
//! error type.

pub mod config;
pub mod errors;
pub mod middleware;
pub mod models;
pub mod response;
