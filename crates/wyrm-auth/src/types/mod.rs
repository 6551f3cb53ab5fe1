//! Domain types shared across the authorization server.

pub mod client;

pub use client::Client;
