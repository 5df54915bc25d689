//! Cross-window login handshake.
//!
//! A [`HandshakeController`] owns at most one popup. It asks the
//! [`SessionStore`](crate::session::SessionStore) for an authorization URL,
//! opens the popup through a [`WindowHost`], and waits on a
//! [`MessageChannel`] for the popup to post its result. Only a message from
//! the popup it opened, naming its own provider, can change state.
//!
//! ```text
//! Idle --login()--> AwaitingUrl --url--> PopupOpen --trusted message--> Idle
//!                        |                   |
//!                        +--no url--> Idle   +--popup closed (reaped)--> Idle
//! any --logout()--> Idle
//! ```

mod channel;
mod controller;
pub mod message;
mod window;

pub use channel::{ListenerGuard, MessageChannel, WindowMessage};
pub use controller::{
    Activation, HandshakeController, HandshakeEvent, HandshakePhase, MIN_POLL_INTERVAL,
    POPUP_NAME,
};
pub use message::{InboundAuthMessage, LoginOutcomeFailure, ValidationFailure, Verdict};
pub use window::{PopupFeatures, PopupSize, PopupWindow, Screen, WindowHost, WindowId};

use crate::provider::Provider;

/// Errors returned by controller operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HandshakeError {
    /// A login is already in progress.
    #[error("{0} login already in progress")]
    Busy(Provider),

    /// The controller is already listening for messages.
    #[error("{0} handshake listener already registered")]
    AlreadyActive(Provider),
}
