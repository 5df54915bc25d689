//! # mailbridge-core
//!
//! Client-side login and session handling for the mailbridge backend.
//!
//! This crate provides:
//! - **Session Store** - per-provider login state, the single authority for it
//! - **Popup Handshake** - opens the provider popup and validates its result
//!   message before touching session state
//! - **Navigation Guard** - gates protected views on the session store
//! - **Mail API** - authenticated send calls through the backend
//! - **Configuration** - persisted client settings
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use mailbridge_core::{
//!     ClientConfig, HandshakeController, MessageChannel, Provider, SessionMarker, SessionStore,
//! };
//! use mailbridge_transport::ApiClient;
//!
//! let config = ClientConfig::load().await?;
//! let store = SessionStore::new(
//!     ApiClient::new(&config.api_base_url)?,
//!     SessionMarker::default_location().await,
//! );
//!
//! let channel = MessageChannel::new();
//! let (google, mut events) =
//!     HandshakeController::new(Provider::Google, store.clone(), host, config.popup_size());
//! let _active = google.activate(&channel)?;
//!
//! google.login().await?;
//! // ... the host posts the popup's message on `channel` ...
//! if let Some(event) = events.recv().await {
//!     println!("{event:?}");
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod config;
mod error;
pub mod guard;
pub mod handshake;
pub mod mail;
mod provider;
pub mod session;

pub use config::ClientConfig;
pub use error::{Error, Result};
pub use guard::{Navigation, NavigationGuard, Route};
pub use handshake::{
    Activation, HandshakeController, HandshakeError, HandshakeEvent, HandshakePhase,
    MessageChannel, PopupFeatures, PopupSize, PopupWindow, Screen, WindowHost, WindowId,
    WindowMessage,
};
pub use mail::{MailApi, MailError, OutgoingMail, SendReceipt};
pub use provider::Provider;
pub use session::{AuthSession, SessionMarker, SessionSnapshot, SessionStore, UserInfo};
