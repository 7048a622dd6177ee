//! Core business logic for LiveNest.
//!
//! Services take a [`Viewer`] and validated input, talk to the repositories
//! in `livenest-db` and to external collaborators through the traits defined
//! here, and return [`livenest_common::AppResult`].

pub mod services;

pub use services::*;
