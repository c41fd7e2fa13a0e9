//! # ideas-relay
//!
//! A caching relay in front of a paginated "ideas" listing API, built on a
//! from-scratch async HTTP/1.1 server.
//!
//! `GET /api/ideas?page=&size=&sort=` is validated, answered from an
//! in-memory TTL cache when fresh, and otherwise fetched from the upstream,
//! reshaped into a stable JSON contract with absolute image URLs, and cached.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use clap::Parser;
//! use ideas_relay::app::{self, AppState};
//! use ideas_relay::config::Config;
//! use ideas_relay::server::Server;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::parse();
//!     let state = Arc::new(AppState::from_config(&config)?);
//!     let server = Server::bind(config.listen_addr()).await?;
//!     server.run(app::stack(&config, &state).into_handler()).await?;
//!     Ok(())
//! }
//! ```

// ── HTTP plumbing ─────────────────────────────────────────────────────────────
pub mod context;
pub mod http;
pub mod middleware;
pub mod router;
pub mod security;
pub mod server;

// ── Relay ─────────────────────────────────────────────────────────────────────
pub mod app;
pub mod cache;
pub mod config;
pub mod error;
pub mod ideas;

// ── Convenience re-exports ────────────────────────────────────────────────────
pub use error::RelayError;
pub use http::{Headers, Method, Request, Response, StatusCode};
pub use router::Router;
pub use server::{Server, ServerError};
