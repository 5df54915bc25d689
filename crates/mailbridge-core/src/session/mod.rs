//! Client-held authentication state.

mod marker;
mod model;
mod store;

pub use marker::{MarkerState, SessionMarker};
pub use model::{AuthSession, SessionSnapshot, UserInfo};
pub use store::{CURRENT_USER_PATH, LOGOUT_PATH, SessionStore};
