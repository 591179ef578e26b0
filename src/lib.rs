//! GitCode forge adapter for CI servers.
//!
//! The [`forge::Forge`] trait is the contract the CI host programs against;
//! [`forge::gitcode::GitCode`] implements it for GitCode's REST API v5 and
//! webhook payloads.

pub mod auth;
pub mod config;
pub mod error;
pub mod forge;
pub mod model;
pub mod paginate;
