//! Storage traits for authorization data.
//!
//! This module defines storage interfaces for:
//!
//! - Authorization codes
//! - Bearer tokens (access and refresh)
//! - Pending authorizations awaiting the user's decision
//!
//! # Implementations
//!
//! - [`MemoryStore`] - process-local maps, suitable for a single instance

pub mod code;
pub mod memory;
pub mod pending;
pub mod token;

pub use code::CodeStorage;
pub use memory::MemoryStore;
pub use pending::PendingAuthorizationStorage;
pub use token::TokenStorage;
