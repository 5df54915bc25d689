//! # mailbridge-transport
//!
//! Shared HTTP client for the mailbridge backend API.
//!
//! One [`ApiClient`] is created per process. It is bound to a fixed base
//! address and keeps a cookie store, so the backend session cookie set during
//! the OAuth popup flow is attached to every later request.
//!
//! ## Example
//!
//! ```ignore
//! use mailbridge_transport::ApiClient;
//!
//! #[derive(serde::Deserialize)]
//! struct LoginUrl {
//!     authorization_url: String,
//! }
//!
//! let client = ApiClient::new("http://localhost:5000/api")?;
//! let reply: LoginUrl = client.get("/auth/google/login").await?;
//! println!("Visit: {}", reply.authorization_url);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod client;
mod error;

pub use client::{ApiClient, DEFAULT_BASE_URL};
pub use error::{Result, TransportError};
