//! Caller identity extractors.
//!
//! - [`caller::Caller`] -- identity asserted by the authentication proxy.
//! - [`caller::RequireCoordinator`] -- requires the coordinator role.

pub mod caller;
