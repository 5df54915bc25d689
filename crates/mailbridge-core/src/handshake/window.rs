//! Window host seam.
//!
//! The controller never touches a real browser. It asks a [`WindowHost`] to
//! open popups and keeps the returned [`PopupWindow`] as its handle.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use url::Url;

/// Identity of a browsing context.
///
/// Message envelopes carry the identity of the window that posted them;
/// comparing it to the controller's handle is the trust check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WindowId(u64);

impl WindowId {
    /// Allocates a process-unique identity.
    #[must_use]
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    /// Wraps a host-assigned identity.
    #[must_use]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw identity value.
    #[must_use]
    pub const fn as_raw(self) -> u64 {
        self.0
    }
}

/// A popup window opened on behalf of a controller.
pub trait PopupWindow: Send + Sync + fmt::Debug {
    /// Identity messages from this window are tagged with.
    fn id(&self) -> WindowId;

    /// Asks the window to close. Best-effort; may complete asynchronously.
    fn close(&self);

    /// Returns true once the window is gone, whoever closed it.
    fn is_closed(&self) -> bool;
}

/// Opens popups and reports the screen they are centred on.
pub trait WindowHost: Send + Sync {
    /// Dimensions of the screen the host window lives on.
    fn screen(&self) -> Screen;

    /// Opens `url` in a new popup named `name`.
    ///
    /// Returns `None` if the popup could not be opened (e.g. blocked).
    fn open(&self, url: &Url, name: &str, features: &PopupFeatures) -> Option<Box<dyn PopupWindow>>;
}

/// Screen dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Screen {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Screen {
    /// Creates a screen size.
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Popup dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PopupSize {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Default for PopupSize {
    fn default() -> Self {
        Self {
            width: 600,
            height: 700,
        }
    }
}

/// Geometry passed to [`WindowHost::open`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PopupFeatures {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Distance from the top edge of the screen.
    pub top: i64,
    /// Distance from the left edge of the screen.
    pub left: i64,
}

impl PopupFeatures {
    /// Geometry for a popup of `size` centred on `screen`.
    ///
    /// Offsets go negative when the popup is larger than the screen.
    #[must_use]
    pub fn centered(size: PopupSize, screen: Screen) -> Self {
        let half = |v: u32| i64::from(v) / 2;
        Self {
            width: size.width,
            height: size.height,
            top: half(screen.height) - half(size.height),
            left: half(screen.width) - half(size.width),
        }
    }
}

impl fmt::Display for PopupFeatures {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "width={},height={},top={},left={}",
            self.width, self.height, self.top, self.left
        )
    }
}
