#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    missing_docs,
    dead_code
)]

//! `prefbind` keeps observable preference bindings attached to whichever
//! preference store is current for an application, including while a cloud
//! provider swaps the store out at runtime.
//!
//! The crate is split into:
//! - [`preferences`]: the store contract, the default backend-backed store and change listeners
//! - [`binding`]: the identity-keyed registry of per-store bindings and the typed bindings themselves
//! - [`app`]: the application object owning the current store, settings and provider transitions

/// Introduces low level primitives: backend storage, logging and configuration.
pub mod primitives;

/// Preference store contract and the default implementation.
pub mod preferences;

/// Observable bindings over preference keys and the registry that migrates them.
pub mod binding;

/// Application object, cloud providers and provider transitions.
pub mod app;

/// Error handling utilities shared by every error type in the crate.
pub mod prefbind_error;

pub use prefbind_error::prefbind_error;
pub use prefbind_macros::prefbind_export;

#[cfg(test)]
mod test_utils;

uniffi::setup_scaffolding!("prefbind");
