use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{AUTHORIZATION, HeaderValue};
use reqwest::{Method, RequestBuilder, Response, Url};
use serde::Serialize;
use serde::de::DeserializeOwned;
use shelfmark_core::config::ApiConfig;
use shelfmark_core::{SessionStore, ShelfmarkError};
use tracing::{debug, warn};

use crate::error::{ClientError, Result};

// ─── ApiClient ────────────────────────────────────────────────────────────────

/// Authenticated JSON client for the library API.
///
/// Every request carries `Authorization: Bearer <token>` while a session
/// exists. A 401 response tears the session down before the error is returned.
#[derive(Debug)]
pub struct ApiClient {
    client: reqwest::Client,
    base_url: Url,
    session: Arc<SessionStore>,
}

impl ApiClient {
    pub fn new(config: &ApiConfig, session: Arc<SessionStore>) -> Result<Self> {
        Self::with_params(
            &config.base_url,
            Duration::from_secs(config.timeout_secs),
            &config.user_agent,
            session,
        )
    }

    pub fn with_params(
        base_url: &str,
        timeout: Duration,
        user_agent: &str,
        session: Arc<SessionStore>,
    ) -> Result<Self> {
        let base_url = Url::parse(base_url).map_err(|e| {
            ShelfmarkError::ConfigError(format!("invalid API base URL {base_url}: {e}"))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(ShelfmarkError::ConfigError(format!(
                "API base URL cannot carry paths: {base_url}"
            ))
            .into());
        }
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .gzip(true)
            .timeout(timeout)
            .build()
            .map_err(|e| ShelfmarkError::ConfigError(format!("HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url,
            session,
        })
    }

    pub fn session(&self) -> &Arc<SessionStore> {
        &self.session
    }

    /// `base_url` with `segments` appended as escaped path segments.
    pub fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segs) = url.path_segments_mut() {
            segs.pop_if_empty();
            segs.extend(segments);
        }
        url
    }

    fn request(&self, method: Method, segments: &[&str]) -> RequestBuilder {
        let url = self.url(segments);
        debug!(%method, %url, "api request");
        let builder = self.client.request(method, url);
        match self.session.access_token() {
            Some(token) => match HeaderValue::from_str(&format!("Bearer {token}")) {
                Ok(value) => builder.header(AUTHORIZATION, value),
                Err(_) => {
                    warn!("session token is not a valid header value; sending anonymously");
                    builder
                }
            },
            None => builder,
        }
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Response> {
        let resp = builder.send().await.map_err(ClientError::Network)?;
        let status = resp.status();
        debug!(status = status.as_u16(), url = %resp.url(), "api response");
        if status.is_success() {
            return Ok(resp);
        }

        let body = resp.text().await.unwrap_or_default();
        let err = ClientError::from_response(status, &body);
        if err.requires_sign_in() && self.session.is_authenticated() {
            warn!("authentication rejected by server; signing out");
            if let Err(e) = self.session.clear() {
                warn!(error = %e, "failed to clear session");
            }
        }
        Err(err)
    }

    async fn read_json<T: DeserializeOwned>(resp: Response) -> Result<T> {
        let text = resp.text().await.map_err(ClientError::Network)?;
        serde_json::from_str(&text).map_err(|e| ClientError::Parse(e.to_string()))
    }

    pub async fn get_json<T: DeserializeOwned>(&self, segments: &[&str]) -> Result<T> {
        let resp = self.send(self.request(Method::GET, segments)).await?;
        Self::read_json(resp).await
    }

    pub async fn get_json_with_query<Q: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        segments: &[&str],
        query: &Q,
    ) -> Result<T> {
        let builder = self.request(Method::GET, segments).query(query);
        let resp = self.send(builder).await?;
        Self::read_json(resp).await
    }

    pub async fn post_json<B: Serialize + ?Sized, R: DeserializeOwned>(
        &self,
        segments: &[&str],
        body: &B,
    ) -> Result<R> {
        let resp = self
            .send(self.request(Method::POST, segments).json(body))
            .await?;
        Self::read_json(resp).await
    }

    /// POST whose response body, if any, is ignored.
    pub async fn post_unit<B: Serialize + ?Sized>(&self, segments: &[&str], body: &B) -> Result<()> {
        self.send(self.request(Method::POST, segments).json(body))
            .await?;
        Ok(())
    }

    pub async fn put_json<B: Serialize + ?Sized, R: DeserializeOwned>(
        &self,
        segments: &[&str],
        body: &B,
    ) -> Result<R> {
        let resp = self
            .send(self.request(Method::PUT, segments).json(body))
            .await?;
        Self::read_json(resp).await
    }

    pub async fn delete(&self, segments: &[&str]) -> Result<()> {
        self.send(self.request(Method::DELETE, segments)).await?;
        Ok(())
    }
}
