//! Encrier -- image converter for multi-color e-paper displays.
//!
//! This library exposes the loader and preview collaborators for
//! integration testing; the conversion core lives in `encre-core`.

pub mod loader;
pub mod preview;
