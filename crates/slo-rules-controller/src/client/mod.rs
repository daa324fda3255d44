//! HTTP clients for external services
//!
//! Remote rule storage is reached over HTTP only; the client implements
//! [`crate::store::ObjectStore`] so the reconciler treats it like any other
//! artifact store.

pub mod ruler;

pub use ruler::{RulerClient, RulerClientBuilder, RulerClientConfig};
