//! Backend API client.

use reqwest::{Client, Method, Response};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::error::{Result, TransportError};

/// Base address used when no configuration overrides it.
pub const DEFAULT_BASE_URL: &str = "http://localhost:5000/api";

/// JSON client bound to the backend base address.
///
/// Cloning is cheap and clones share the same connection pool and cookie
/// store.
#[derive(Debug, Clone)]
pub struct ApiClient {
    /// Base address every request path is appended to.
    base_url: Url,
    /// HTTP client with a cookie store.
    http_client: Client,
}

impl ApiClient {
    /// Creates a client for the given base address.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid or the HTTP client cannot be
    /// built.
    pub fn new(base_url: impl AsRef<str>) -> Result<Self> {
        let base_url = Url::parse(base_url.as_ref())?;
        if base_url.cannot_be_a_base() {
            return Err(TransportError::InvalidBase(base_url.to_string()));
        }

        let http_client = Client::builder().cookie_store(true).build()?;

        Ok(Self {
            base_url,
            http_client,
        })
    }

    /// Returns the configured base address.
    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Resolves a request path against the base address.
    ///
    /// Unlike [`Url::join`], a leading `/` does not discard the base path:
    /// `/auth/me` on `http://host/api` resolves to `http://host/api/auth/me`.
    ///
    /// # Errors
    ///
    /// Returns an error if the base address cannot carry path segments.
    pub fn endpoint(&self, path: &str) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| TransportError::InvalidBase(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(path.split('/').filter(|segment| !segment.is_empty()));
        Ok(url)
    }

    /// Sends a `GET` request and decodes the JSON reply.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails, the backend answers with a
    /// non-success status, or the body is not valid JSON for `T`.
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self.send(Method::GET, path, None::<&()>).await?;
        decode(response).await
    }

    /// Sends a `POST` request with a JSON body and decodes the JSON reply.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails, the backend answers with a
    /// non-success status, or the body is not valid JSON for `T`.
    pub async fn post<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self.send(Method::POST, path, Some(body)).await?;
        decode(response).await
    }

    /// Sends a `POST` request and ignores the reply body.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the backend answers with a
    /// non-success status.
    pub async fn post_discard<B>(&self, path: &str, body: &B) -> Result<()>
    where
        B: Serialize + ?Sized,
    {
        self.send(Method::POST, path, Some(body)).await?;
        Ok(())
    }

    async fn send<B>(&self, method: Method, path: &str, body: Option<&B>) -> Result<Response>
    where
        B: Serialize + ?Sized,
    {
        let url = self.endpoint(path)?;
        debug!(%method, path, "Sending backend request");

        let mut request = self.http_client.request(method.clone(), url);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Status {
                method,
                path: path.to_string(),
                status,
                body,
            });
        }

        Ok(response)
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
    let bytes = response.bytes().await?;
    Ok(serde_json::from_slice(&bytes)?)
}
