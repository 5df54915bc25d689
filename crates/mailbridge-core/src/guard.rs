//! Navigation guard for protected views.

use tracing::debug;

use crate::session::SessionStore;

/// Route every redirect lands on.
pub const HOME_ROUTE: &str = "home";

/// A navigable view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    /// Route name.
    pub name: String,
    /// Whether a logged-in provider is required.
    pub requires_auth: bool,
}

impl Route {
    /// A route anyone may visit.
    #[must_use]
    pub fn public(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            requires_auth: false,
        }
    }

    /// A route that requires a login.
    #[must_use]
    pub fn protected(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            requires_auth: true,
        }
    }
}

/// Decision for a navigation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Navigation {
    /// Continue to the requested route.
    Proceed,
    /// Go to the named route instead.
    Redirect(&'static str),
}

/// Gates protected routes on the session store.
#[derive(Debug, Clone)]
pub struct NavigationGuard {
    store: SessionStore,
}

impl NavigationGuard {
    /// Creates a guard reading from `store`.
    #[must_use]
    pub const fn new(store: SessionStore) -> Self {
        Self { store }
    }

    /// Decides whether navigation to `to` may proceed.
    ///
    /// If nothing is logged in but the previous run ended logged in, the
    /// backend session is restored first.
    pub async fn before_each(&self, to: &Route) -> Navigation {
        if !self.store.is_authenticated() && self.store.marker().is_set() {
            debug!(route = %to.name, "Restoring session before navigation");
            self.store.restore_last().await;
        }

        if to.requires_auth && !self.store.is_authenticated() {
            debug!(route = %to.name, "Not authenticated, redirecting");
            return Navigation::Redirect(HOME_ROUTE);
        }

        Navigation::Proceed
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::provider::Provider;
    use crate::session::{SessionMarker, UserInfo};
    use mailbridge_transport::ApiClient;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn offline_guard() -> (NavigationGuard, SessionStore) {
        let client = ApiClient::new("http://127.0.0.1:9/api").unwrap();
        let store = SessionStore::new(client, SessionMarker::in_memory());
        (NavigationGuard::new(store.clone()), store)
    }

    #[tokio::test]
    async fn test_public_route_always_proceeds() {
        let (guard, _) = offline_guard();
        assert_eq!(
            guard.before_each(&Route::public("home")).await,
            Navigation::Proceed
        );
    }

    #[tokio::test]
    async fn test_protected_route_redirects_when_logged_out() {
        let (guard, _) = offline_guard();
        assert_eq!(
            guard.before_each(&Route::protected("compose")).await,
            Navigation::Redirect(HOME_ROUTE)
        );
    }

    #[tokio::test]
    async fn test_protected_route_proceeds_with_any_provider() {
        let (guard, store) = offline_guard();
        store.apply_login(Provider::Microsoft, UserInfo::new(json!({"name": "Bo"})));
        assert_eq!(
            guard.before_each(&Route::protected("compose")).await,
            Navigation::Proceed
        );
    }

    #[tokio::test]
    async fn test_marker_triggers_restore() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/auth/me"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "success",
                "data": {"email": "ann@example.com"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = ApiClient::new(server.uri()).unwrap();
        let marker = SessionMarker::in_memory();
        marker.mark_logged_in(Provider::Google);
        let store = SessionStore::new(client, marker);
        let guard = NavigationGuard::new(store.clone());

        assert_eq!(
            guard.before_each(&Route::protected("compose")).await,
            Navigation::Proceed
        );
        assert!(store.is_logged_in(Provider::Google));

        // Already authenticated: no second restore call.
        guard.before_each(&Route::protected("compose")).await;
    }
}
