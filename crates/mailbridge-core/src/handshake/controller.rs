//! Popup handshake controller.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, trace, warn};

use super::HandshakeError;
use super::channel::{ListenerGuard, MessageChannel, WindowMessage};
use super::message::{LoginOutcomeFailure, Verdict, accept};
use super::window::{PopupFeatures, PopupSize, PopupWindow, WindowHost, WindowId};
use crate::provider::Provider;
use crate::session::{SessionStore, UserInfo};

/// Window name passed to the host when opening the popup.
pub const POPUP_NAME: &str = "Auth";

/// Shortest interval [`HandshakeController::watch_popup`] polls at.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Notification delivered to the hosting context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandshakeEvent {
    /// Login succeeded; the session store has already been updated.
    LoggedIn(UserInfo),
    /// The popup reported a failed or incomplete login.
    LoginFailed(LoginOutcomeFailure),
    /// No authorization URL could be obtained; no popup was opened.
    UrlUnavailable,
    /// The host refused to open the popup.
    PopupBlocked,
    /// The popup was closed without reporting a result.
    PopupAbandoned,
    /// The provider was logged out.
    LoggedOut,
}

/// Observable controller phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakePhase {
    /// Ready for a new login.
    Idle,
    /// Waiting for the backend to issue an authorization URL.
    AwaitingUrl,
    /// A popup is open and the controller is waiting for its message.
    PopupOpen,
}

enum State {
    Idle,
    AwaitingUrl { attempt: u64 },
    PopupOpen { popup: Box<dyn PopupWindow> },
}

impl State {
    const fn phase(&self) -> HandshakePhase {
        match self {
            Self::Idle => HandshakePhase::Idle,
            Self::AwaitingUrl { .. } => HandshakePhase::AwaitingUrl,
            Self::PopupOpen { .. } => HandshakePhase::PopupOpen,
        }
    }

    fn popup_id(&self) -> Option<WindowId> {
        match self {
            Self::PopupOpen { popup } => Some(popup.id()),
            _ => None,
        }
    }
}

struct Shared {
    state: State,
    attempts: u64,
    listening: bool,
}

struct ControllerInner {
    provider: Provider,
    store: SessionStore,
    host: Arc<dyn WindowHost>,
    popup_size: PopupSize,
    events: mpsc::UnboundedSender<HandshakeEvent>,
    shared: Mutex<Shared>,
}

/// Drives the popup login for one provider.
///
/// Create one per provider per hosting context. Clones share state.
/// Outcomes are delivered on the event receiver returned by
/// [`new`](Self::new): exactly one [`HandshakeEvent::LoggedIn`] per
/// successful handshake, and nothing for messages that are ignored.
#[derive(Clone)]
pub struct HandshakeController {
    inner: Arc<ControllerInner>,
}

impl fmt::Debug for HandshakeController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let shared = self.lock();
        f.debug_struct("HandshakeController")
            .field("provider", &self.inner.provider)
            .field("phase", &shared.state.phase())
            .field("popup", &shared.state.popup_id())
            .field("listening", &shared.listening)
            .finish_non_exhaustive()
    }
}

impl HandshakeController {
    /// Creates an idle controller and the receiver for its events.
    #[must_use]
    pub fn new(
        provider: Provider,
        store: SessionStore,
        host: Arc<dyn WindowHost>,
        popup_size: PopupSize,
    ) -> (Self, mpsc::UnboundedReceiver<HandshakeEvent>) {
        let (events, receiver) = mpsc::unbounded_channel();
        let controller = Self {
            inner: Arc::new(ControllerInner {
                provider,
                store,
                host,
                popup_size,
                events,
                shared: Mutex::new(Shared {
                    state: State::Idle,
                    attempts: 0,
                    listening: false,
                }),
            }),
        };
        (controller, receiver)
    }

    /// Provider this controller logs in with.
    #[must_use]
    pub fn provider(&self) -> Provider {
        self.inner.provider
    }

    /// Current phase.
    #[must_use]
    pub fn phase(&self) -> HandshakePhase {
        self.lock().state.phase()
    }

    /// Returns true while a login is in progress.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.phase() != HandshakePhase::Idle
    }

    /// Identity of the popup currently owned, if any.
    #[must_use]
    pub fn popup(&self) -> Option<WindowId> {
        self.lock().state.popup_id()
    }

    /// Starts listening on `channel`.
    ///
    /// The listener stays registered until the returned [`Activation`] is
    /// dropped.
    ///
    /// # Errors
    ///
    /// Returns [`HandshakeError::AlreadyActive`] if this controller already
    /// has a live activation.
    pub fn activate(&self, channel: &MessageChannel) -> Result<Activation, HandshakeError> {
        {
            let mut shared = self.lock();
            if shared.listening {
                return Err(HandshakeError::AlreadyActive(self.inner.provider));
            }
            shared.listening = true;
        }

        let weak = Arc::downgrade(&self.inner);
        let listener = channel.listen(move |message| {
            if let Some(inner) = weak.upgrade() {
                Self { inner }.handle_message(message);
            }
        });
        debug!(provider = %self.inner.provider, "Handshake listener registered");

        Ok(Activation {
            controller: Arc::downgrade(&self.inner),
            listener: Some(listener),
        })
    }

    /// Starts a login: fetches the authorization URL and opens the popup.
    ///
    /// Returns the phase the controller ended up in: `PopupOpen` when the
    /// popup is waiting for its result, `Idle` when the login could not start
    /// (an event says why), or whatever a concurrent [`logout`](Self::logout)
    /// left behind.
    ///
    /// # Errors
    ///
    /// Returns [`HandshakeError::Busy`] if a login is already in progress.
    pub async fn login(&self) -> Result<HandshakePhase, HandshakeError> {
        let provider = self.inner.provider;
        let attempt = {
            let mut shared = self.lock();
            if !matches!(shared.state, State::Idle) {
                return Err(HandshakeError::Busy(provider));
            }
            shared.attempts += 1;
            let attempt = shared.attempts;
            shared.state = State::AwaitingUrl { attempt };
            attempt
        };

        debug!(%provider, attempt, "Requesting authorization URL");
        let url = self.inner.store.request_login_url(provider).await;

        let mut shared = self.lock();
        if !matches!(shared.state, State::AwaitingUrl { attempt: current } if current == attempt) {
            debug!(%provider, attempt, "Login attempt superseded, discarding URL");
            return Ok(shared.state.phase());
        }

        let Some(url) = url else {
            shared.state = State::Idle;
            drop(shared);
            error!(%provider, "Could not get authorization URL");
            self.emit(HandshakeEvent::UrlUnavailable);
            return Ok(HandshakePhase::Idle);
        };

        let features = PopupFeatures::centered(self.inner.popup_size, self.inner.host.screen());
        if let Some(popup) = self.inner.host.open(&url, POPUP_NAME, &features) {
            info!(%provider, window = popup.id().as_raw(), %features, "Opened auth window");
            shared.state = State::PopupOpen { popup };
            Ok(HandshakePhase::PopupOpen)
        } else {
            shared.state = State::Idle;
            drop(shared);
            warn!(%provider, "Auth window could not be opened");
            self.emit(HandshakeEvent::PopupBlocked);
            Ok(HandshakePhase::Idle)
        }
    }

    /// Inspects one channel message.
    ///
    /// Messages not from the tracked popup or not for this provider are
    /// ignored without any state change. Anything else ends the handshake.
    pub fn handle_message(&self, message: &WindowMessage) {
        let provider = self.inner.provider;
        let mut shared = self.lock();

        let outcome = match accept(message, shared.state.popup_id(), provider) {
            Verdict::Ignored(reason) => {
                trace!(%provider, ?reason, "Ignoring window message");
                return;
            }
            Verdict::Success(user_info) => Ok(user_info),
            Verdict::Failed(failure) => Err(failure),
        };
        let previous = std::mem::replace(&mut shared.state, State::Idle);
        drop(shared);

        match outcome {
            Ok(user_info) => {
                self.inner.store.apply_login(provider, user_info.clone());
                self.emit(HandshakeEvent::LoggedIn(user_info));
            }
            Err(failure) => {
                warn!(%provider, %failure, "Authentication failed or data is missing");
                self.emit(HandshakeEvent::LoginFailed(failure));
            }
        }

        close_popup(previous);
    }

    /// Logs out from any phase.
    ///
    /// Closes an owned popup, which aborts an in-flight handshake: later
    /// messages from it no longer match.
    pub async fn logout(&self) {
        let provider = self.inner.provider;
        let previous = std::mem::replace(&mut self.lock().state, State::Idle);
        close_popup(previous);

        self.inner.store.logout(provider).await;
        self.emit(HandshakeEvent::LoggedOut);
    }

    /// Resets the controller if its popup was closed without a result.
    ///
    /// Returns true if a popup was reaped.
    pub fn reap_abandoned_popup(&self) -> bool {
        let mut shared = self.lock();
        let abandoned = matches!(&shared.state, State::PopupOpen { popup } if popup.is_closed());
        if !abandoned {
            return false;
        }

        shared.state = State::Idle;
        drop(shared);
        info!(provider = %self.inner.provider, "Auth window closed without a result");
        self.emit(HandshakeEvent::PopupAbandoned);
        true
    }

    /// Polls for an abandoned popup every `every` until the controller
    /// leaves [`HandshakePhase::PopupOpen`].
    ///
    /// Intervals below [`MIN_POLL_INTERVAL`] are raised to it.
    pub async fn watch_popup(&self, every: Duration) {
        let mut ticker = tokio::time::interval(every.max(MIN_POLL_INTERVAL));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            if self.phase() != HandshakePhase::PopupOpen || self.reap_abandoned_popup() {
                return;
            }
        }
    }

    fn emit(&self, event: HandshakeEvent) {
        if self.inner.events.send(event).is_err() {
            debug!(provider = %self.inner.provider, "Handshake event receiver dropped");
        }
    }

    fn lock(&self) -> MutexGuard<'_, Shared> {
        self.inner
            .shared
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

fn close_popup(state: State) {
    if let State::PopupOpen { popup } = state
        && !popup.is_closed()
    {
        popup.close();
    }
}

/// Live listener registration for a [`HandshakeController`].
///
/// Dropping it deregisters the listener and allows the controller to be
/// activated again.
pub struct Activation {
    controller: Weak<ControllerInner>,
    listener: Option<ListenerGuard>,
}

impl fmt::Debug for Activation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Activation").finish_non_exhaustive()
    }
}

impl Drop for Activation {
    fn drop(&mut self) {
        // Deregister before allowing a new activation.
        drop(self.listener.take());
        if let Some(inner) = self.controller.upgrade() {
            inner
                .shared
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .listening = false;
            debug!(provider = %inner.provider, "Handshake listener removed");
        }
    }
}
