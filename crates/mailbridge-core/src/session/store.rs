//! Per-provider session store.

use std::sync::Arc;

use mailbridge_transport::ApiClient;
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};
use url::Url;

use super::marker::SessionMarker;
use super::model::{AuthSession, SessionSnapshot, UserInfo};
use crate::provider::Provider;

/// Backend path that invalidates the server session.
pub const LOGOUT_PATH: &str = "/auth/logout";

/// Backend path that returns the current user's identity.
pub const CURRENT_USER_PATH: &str = "/auth/me";

#[derive(Debug, Deserialize)]
struct LoginUrlReply {
    authorization_url: String,
}

#[derive(Debug, Deserialize)]
struct CurrentUserReply {
    status: String,
    #[serde(default)]
    data: Option<Value>,
}

/// Single authority for per-provider authentication state.
///
/// Construct one per process and hand clones to consumers; clones share
/// state. Sessions only change through [`apply_login`](Self::apply_login),
/// [`logout`](Self::logout) and [`restore`](Self::restore).
#[derive(Debug, Clone)]
pub struct SessionStore {
    inner: Arc<StoreInner>,
}

#[derive(Debug)]
struct StoreInner {
    client: ApiClient,
    marker: SessionMarker,
    sessions: watch::Sender<SessionSnapshot>,
}

impl SessionStore {
    /// Creates a store with both providers logged out.
    #[must_use]
    pub fn new(client: ApiClient, marker: SessionMarker) -> Self {
        let (sessions, _) = watch::channel(SessionSnapshot::default());
        Self {
            inner: Arc::new(StoreInner {
                client,
                marker,
                sessions,
            }),
        }
    }

    /// Backend client used by the store.
    #[must_use]
    pub fn client(&self) -> &ApiClient {
        &self.inner.client
    }

    /// Persisted login marker.
    #[must_use]
    pub fn marker(&self) -> &SessionMarker {
        &self.inner.marker
    }

    /// Asks the backend for an authorization URL for `provider`.
    ///
    /// Failures are logged and reported as `None`; callers treat that as
    /// "cannot proceed".
    pub async fn request_login_url(&self, provider: Provider) -> Option<Url> {
        let reply: LoginUrlReply = match self.inner.client.get(&provider.login_path()).await {
            Ok(reply) => reply,
            Err(e) => {
                error!(%provider, "Error during login: {e}");
                return None;
            }
        };

        match Url::parse(&reply.authorization_url) {
            Ok(url) => {
                debug!(%provider, host = url.host_str(), "Received authorization URL");
                Some(url)
            }
            Err(e) => {
                error!(%provider, "Backend returned an invalid authorization URL: {e}");
                None
            }
        }
    }

    /// Marks `provider` as logged in with `user_info`.
    ///
    /// Performs no validation; the caller has already checked the message
    /// this came from. Applying the same login twice is a no-op.
    pub fn apply_login(&self, provider: Provider, user_info: UserInfo) {
        let next = AuthSession::logged_in(user_info);
        let changed = self.inner.sessions.send_if_modified(|sessions| {
            let slot = sessions.get_mut(provider);
            if *slot == next {
                return false;
            }
            *slot = next;
            true
        });

        self.inner.marker.mark_logged_in(provider);
        info!(%provider, changed, "Login applied");
    }

    /// Logs `provider` out locally, then tells the backend.
    ///
    /// The local reset always happens. The backend call is best-effort: a
    /// failure is logged and otherwise ignored.
    pub async fn logout(&self, provider: Provider) {
        self.reset(provider);
        info!(%provider, "Logged out");

        if let Err(e) = self
            .inner
            .client
            .post_discard(LOGOUT_PATH, &serde_json::json!({}))
            .await
        {
            error!(%provider, "Logout failed: {e}");
        }
    }

    /// Restores `provider` from the backend session after a restart.
    ///
    /// Returns true if the backend still recognised the user. On failure the
    /// persisted marker is cleared, unless another provider is still logged
    /// in, so the next start does not retry.
    pub async fn restore(&self, provider: Provider) -> bool {
        let reply: CurrentUserReply = match self.inner.client.get(CURRENT_USER_PATH).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!(%provider, "Session restore failed: {e}");
                self.sync_marker();
                return false;
            }
        };

        match reply.data {
            Some(data) if reply.status == "success" && !data.is_null() => {
                self.apply_login(provider, UserInfo::new(data));
                true
            }
            _ => {
                warn!(%provider, status = %reply.status, "Backend did not return a user");
                self.sync_marker();
                false
            }
        }
    }

    /// Restores the provider recorded by the marker, if it is set.
    pub async fn restore_last(&self) -> bool {
        match self.inner.marker.last_provider() {
            Some(provider) => self.restore(provider).await,
            None => {
                self.sync_marker();
                false
            }
        }
    }

    /// Session for `provider`.
    #[must_use]
    pub fn session(&self, provider: Provider) -> AuthSession {
        self.inner.sessions.borrow().get(provider).clone()
    }

    /// Returns true if `provider` is logged in.
    #[must_use]
    pub fn is_logged_in(&self, provider: Provider) -> bool {
        self.inner.sessions.borrow().get(provider).is_logged_in()
    }

    /// User info for `provider`, present iff logged in.
    #[must_use]
    pub fn user_info(&self, provider: Provider) -> Option<UserInfo> {
        self.inner.sessions.borrow().get(provider).user_info().cloned()
    }

    /// Returns true if any provider is logged in.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.inner.sessions.borrow().any_logged_in()
    }

    /// Both sessions at this moment.
    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        self.inner.sessions.borrow().clone()
    }

    /// Subscribes to session changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.inner.sessions.subscribe()
    }

    fn reset(&self, provider: Provider) {
        self.inner.sessions.send_if_modified(|sessions| {
            let slot = sessions.get_mut(provider);
            let was_logged_in = slot.is_logged_in();
            *slot = AuthSession::logged_out();
            was_logged_in
        });
        self.sync_marker();
    }

    /// Points the marker at a provider that is still logged in, or clears it.
    fn sync_marker(&self) {
        let snapshot = self.snapshot();
        let Some(remaining) = Provider::ALL
            .into_iter()
            .find(|p| snapshot.get(*p).is_logged_in())
        else {
            self.inner.marker.clear();
            return;
        };

        let recorded = self.inner.marker.last_provider();
        if !recorded.is_some_and(|p| snapshot.get(p).is_logged_in()) {
            debug!(provider = %remaining, "Session marker now points at remaining login");
            self.inner.marker.mark_logged_in(remaining);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn store_for(server: &MockServer) -> SessionStore {
        let client = ApiClient::new(format!("{}/api", server.uri())).unwrap();
        SessionStore::new(client, SessionMarker::in_memory())
    }

    /// Store pointed at a closed port, so every call fails.
    fn offline_store() -> SessionStore {
        let client = ApiClient::new("http://127.0.0.1:9/api").unwrap();
        SessionStore::new(client, SessionMarker::in_memory())
    }

    fn ann() -> UserInfo {
        UserInfo::new(json!({"name": "Ann"}))
    }

    #[tokio::test]
    async fn test_request_login_url() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/auth/google/login"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "authorization_url": "https://accounts.google.com/o/oauth2/auth?state=xyz"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let url = store_for(&server)
            .request_login_url(Provider::Google)
            .await
            .unwrap();
        assert_eq!(url.host_str(), Some("accounts.google.com"));
    }

    #[tokio::test]
    async fn test_request_login_url_failure_is_none() {
        let store = offline_store();
        assert!(store.request_login_url(Provider::Microsoft).await.is_none());
        assert!(!store.is_authenticated());
    }

    #[tokio::test]
    async fn test_request_login_url_server_error_is_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        assert!(
            store_for(&server)
                .request_login_url(Provider::Google)
                .await
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_request_login_url_rejects_garbage_url() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"authorization_url": "not a url"})),
            )
            .mount(&server)
            .await;

        assert!(
            store_for(&server)
                .request_login_url(Provider::Google)
                .await
                .is_none()
        );
    }

    #[test]
    fn test_apply_login_sets_state() {
        let store = offline_store();
        store.apply_login(Provider::Google, ann());

        assert!(store.is_logged_in(Provider::Google));
        assert_eq!(store.user_info(Provider::Google), Some(ann()));
        assert!(!store.is_logged_in(Provider::Microsoft));
        assert!(store.marker().is_set());
    }

    #[test]
    fn test_apply_login_is_idempotent() {
        let store = offline_store();
        let mut changes = store.subscribe();

        store.apply_login(Provider::Google, ann());
        let first = store.snapshot();
        assert!(changes.has_changed().unwrap());
        changes.mark_unchanged();

        store.apply_login(Provider::Google, ann());
        assert_eq!(store.snapshot(), first);
        assert!(!changes.has_changed().unwrap());
    }

    #[tokio::test]
    async fn test_logout_succeeds_even_if_backend_fails() {
        let store = offline_store();
        store.apply_login(Provider::Google, ann());
        store.apply_login(Provider::Microsoft, UserInfo::new(json!({"name": "Bo"})));

        store.logout(Provider::Google).await;

        assert!(!store.is_logged_in(Provider::Google));
        assert_eq!(store.user_info(Provider::Google), None);
        assert!(store.is_logged_in(Provider::Microsoft));
        assert!(store.marker().is_set());

        store.logout(Provider::Microsoft).await;
        assert!(!store.is_authenticated());
        assert!(!store.marker().is_set());
    }

    #[tokio::test]
    async fn test_logout_repoints_marker_at_remaining_provider() {
        let store = offline_store();
        store.apply_login(Provider::Google, ann());
        store.apply_login(Provider::Microsoft, UserInfo::new(json!({"name": "Bo"})));
        assert_eq!(store.marker().last_provider(), Some(Provider::Microsoft));

        store.logout(Provider::Microsoft).await;

        assert!(store.is_logged_in(Provider::Google));
        assert_eq!(store.marker().last_provider(), Some(Provider::Google));
    }

    #[tokio::test]
    async fn test_logout_of_other_provider_keeps_marker() {
        let store = offline_store();
        store.apply_login(Provider::Microsoft, ann());
        store.apply_login(Provider::Google, ann());

        store.logout(Provider::Microsoft).await;
        assert_eq!(store.marker().last_provider(), Some(Provider::Google));
    }

    #[tokio::test]
    async fn test_logout_from_logged_out_state() {
        let store = offline_store();
        store.logout(Provider::Microsoft).await;
        assert_eq!(store.session(Provider::Microsoft), AuthSession::logged_out());
    }

    #[tokio::test]
    async fn test_logout_calls_backend() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/auth/logout"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "success"})))
            .expect(1)
            .mount(&server)
            .await;

        let store = store_for(&server);
        store.apply_login(Provider::Microsoft, ann());
        store.logout(Provider::Microsoft).await;
        assert!(!store.is_logged_in(Provider::Microsoft));
    }

    #[tokio::test]
    async fn test_restore_applies_backend_identity() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/auth/me"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "success",
                "data": {"email": "ann@example.com"}
            })))
            .mount(&server)
            .await;

        let store = store_for(&server);
        store.marker().mark_logged_in(Provider::Google);

        assert!(store.restore_last().await);
        assert_eq!(
            store.user_info(Provider::Google).unwrap().email(),
            Some("ann@example.com")
        );
    }

    #[tokio::test]
    async fn test_restore_failure_clears_marker() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/auth/me"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let store = store_for(&server);
        store.marker().mark_logged_in(Provider::Microsoft);

        assert!(!store.restore_last().await);
        assert!(!store.is_authenticated());
        assert!(!store.marker().is_set());
    }
}
