//! System browser as the popup host.
//!
//! A terminal has no popup windows, so the authorization URL is opened in
//! the default browser instead. The resulting "window" cannot be closed from
//! here; closing only stops the controller from trusting it.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use mailbridge_core::{PopupFeatures, PopupWindow, Screen, WindowHost, WindowId};
use tracing::{debug, warn};
use url::Url;

/// Nominal screen used for popup geometry; the browser ignores it.
const NOMINAL_SCREEN: Screen = Screen::new(1920, 1080);

/// Browser tab standing in for a popup.
#[derive(Debug, Clone)]
pub struct BrowserWindow {
    id: WindowId,
    closed: Arc<AtomicBool>,
}

impl PopupWindow for BrowserWindow {
    fn id(&self) -> WindowId {
        self.id
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// Opens popups in the default system browser.
#[derive(Debug, Default)]
pub struct SystemBrowser {
    last: std::sync::Mutex<Option<BrowserWindow>>,
}

impl SystemBrowser {
    /// Identity of the most recently opened window.
    pub fn last_window(&self) -> Option<WindowId> {
        self.last
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .as_ref()
            .map(|window| window.id)
    }

    /// Treats the most recently opened window as closed by the user.
    pub fn abandon_last(&self) {
        if let Some(window) = self
            .last
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .as_ref()
        {
            debug!(window = window.id.as_raw(), "Browser window abandoned");
            window.closed.store(true, Ordering::SeqCst);
        }
    }
}

impl WindowHost for SystemBrowser {
    fn screen(&self) -> Screen {
        NOMINAL_SCREEN
    }

    fn open(&self, url: &Url, name: &str, features: &PopupFeatures) -> Option<Box<dyn PopupWindow>> {
        debug!(name, %features, "Opening browser for authorization");
        if let Err(e) = opener::open(url.as_str()) {
            warn!("Failed to open browser: {e}");
            return None;
        }

        let window = BrowserWindow {
            id: WindowId::next(),
            closed: Arc::new(AtomicBool::new(false)),
        };
        *self
            .last
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = Some(window.clone());
        Some(Box::new(window))
    }
}
