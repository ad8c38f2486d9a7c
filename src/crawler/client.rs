//! Transport adapter for the platform's mobile API
//!
//! This module handles every outbound request, including:
//! - Building the HTTP client from platform settings
//! - Attaching the current session headers to each request
//! - Decoding the `{ok, data}` envelope into a payload or an attempt error
//! - Routing each logical request through the retry controller
//! - Session recovery after undecodable responses
//! - Endpoint-specific parameter shapes (timeline, comments, search, profile)

use crate::config::{PlatformConfig, SearchType};
use crate::crawler::decode::{decode_envelope, ProviderOutcome};
use crate::crawler::markup::extract_note_detail;
use crate::crawler::retry::{AttemptError, Retrier};
use crate::model::Mblog;
use crate::state::{Session, SessionState, StaticCookieProvider};
use crate::{HarvestError, Result};
use reqwest::{redirect::Policy, Client, Response, StatusCode};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Cookie the profile page sets with the creator's container ids
const CONTAINER_COOKIE: &str = "M_WEIBOCN_PARAMS";

/// Container id prefix for creator profile cards
const PROFILE_CONTAINER_PREFIX: &str = "100505";

/// Container id prefix for keyword search results
const SEARCH_CONTAINER_PREFIX: &str = "100103";

/// Builds an HTTP client with proper configuration
///
/// Redirects are not followed: the profile page hands out its container
/// cookie on a redirect response.
pub fn build_http_client(config: &PlatformConfig) -> std::result::Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.user_agent.as_str())
        .timeout(Duration::from_secs(config.timeout_secs))
        .connect_timeout(Duration::from_secs(10))
        .redirect(Policy::none())
        .gzip(true)
        .brotli(true)
        .build()
}

/// Rewrites a picture URL to its full-size variant behind the image proxy
///
/// `https://wx1.sinaimg.cn/orj360/abc.jpg` becomes
/// `{proxy}/wx1.sinaimg.cn/large/abc.jpg`.
pub fn proxied_image_url(proxy_host: &str, image_url: &str) -> Option<String> {
    let stripped = image_url
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(image_url);

    let mut segments: Vec<&str> = stripped.split('/').collect();
    if segments.len() < 3 || segments.iter().any(|s| s.is_empty()) {
        return None;
    }
    segments[1] = "large";

    Some(format!(
        "{}/{}",
        proxy_host.trim_end_matches('/'),
        segments.join("/")
    ))
}

/// Container ids discovered from a creator's profile page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerIds {
    /// Profile container
    pub fid: Option<String>,
    /// Timeline list container
    pub lfid: Option<String>,
}

impl ContainerIds {
    /// Parses the percent-encoded query string stored in the container cookie
    pub fn from_cookie_value(raw: &str) -> Self {
        let decoded = urlencoding::decode(raw)
            .map(|value| value.into_owned())
            .unwrap_or_else(|_| raw.to_string());

        let mut ids = Self::default();
        for (key, value) in url::form_urlencoded::parse(decoded.as_bytes()) {
            if value.is_empty() {
                continue;
            }
            match key.as_ref() {
                "fid" => ids.fid = Some(value.into_owned()),
                "lfid" => ids.lfid = Some(value.into_owned()),
                _ => {}
            }
        }
        ids
    }
}

/// Client for the platform's mobile API
///
/// Clones share the HTTP connection pool, the session and the retry
/// controller.
#[derive(Clone)]
pub struct PlatformClient {
    http: Client,
    host: String,
    image_proxy_host: String,
    session: SessionState,
    retrier: Arc<Retrier>,
    recovery_delay: Duration,
}

impl PlatformClient {
    pub fn new(
        http: Client,
        config: &PlatformConfig,
        session: SessionState,
        retrier: Arc<Retrier>,
    ) -> Self {
        Self {
            http,
            host: config.host.trim_end_matches('/').to_string(),
            image_proxy_host: config.image_proxy_host.clone(),
            session,
            retrier,
            recovery_delay: Duration::from_millis(config.recovery_delay_ms),
        }
    }

    /// Builds a client whose session is seeded from the configured cookie string
    pub fn from_config(config: &PlatformConfig, retrier: Retrier) -> Result<Self> {
        let http = build_http_client(config)?;
        let session = SessionState::new(
            Session::new(&config.user_agent, &config.cookies),
            Arc::new(StaticCookieProvider::new(&config.cookies)),
        );

        Ok(Self::new(http, config, session, Arc::new(retrier)))
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn session(&self) -> &SessionState {
        &self.session
    }

    fn endpoint(&self, uri: &str, params: &[(&str, String)]) -> Result<Url> {
        let base = format!("{}{}", self.host, uri);
        if params.is_empty() {
            return Ok(Url::parse(&base)?);
        }
        Ok(Url::parse_with_params(
            &base,
            params.iter().map(|(key, value)| (*key, value.as_str())),
        )?)
    }

    async fn send(&self, url: &Url, headers: &[(&str, String)]) -> reqwest::Result<Response> {
        let session = self.session.snapshot().await;

        let mut request = self.http.get(url.clone());
        for (name, value) in &session.headers {
            request = request.header(name.as_str(), value.as_str());
        }
        if !headers.iter().any(|(name, _)| name.eq_ignore_ascii_case("referer")) {
            request = request.header("Referer", self.host.as_str());
        }
        for (name, value) in headers {
            request = request.header(*name, value.as_str());
        }

        request.send().await
    }

    async fn attempt_json(
        &self,
        url: &Url,
        headers: &[(&str, String)],
    ) -> std::result::Result<Value, AttemptError> {
        let response = self.send(url, headers).await?;
        let status = response.status();
        let body = response.text().await?;

        let outcome = decode_envelope(&body).map_err(|e| {
            let preview: String = body.chars().take(120).collect();
            tracing::error!(
                "Undecodable response from {} (HTTP {}): {}",
                url.path(),
                status,
                preview
            );
            AttemptError::Malformed(format!("HTTP {}: {}", status, e))
        })?;

        if let ProviderOutcome::SoftEmpty { message } = &outcome {
            tracing::warn!("{} answered with a soft failure: {}", url.path(), message);
        }
        outcome.into_data().map_err(|reason| {
            tracing::error!("{} answered with an error: {}", url.path(), reason);
            AttemptError::HardProvider(reason)
        })
    }

    async fn attempt_text(&self, url: &Url) -> std::result::Result<String, AttemptError> {
        let response = self.send(url, &[]).await?;
        let status = response.status();
        if status != StatusCode::OK {
            return Err(AttemptError::HardProvider(format!("HTTP {}", status)));
        }
        Ok(response.text().await?)
    }

    async fn attempt_container_cookie(
        &self,
        url: &Url,
    ) -> std::result::Result<Option<String>, AttemptError> {
        let response = self.send(url, &[]).await?;
        let cookie = response
            .cookies()
            .find(|cookie| cookie.name() == CONTAINER_COOKIE)
            .map(|cookie| cookie.value().to_string());
        Ok(cookie)
    }

    /// Refreshes the session after the provider answered with garbage
    async fn recover_session(&self) {
        if !self.recovery_delay.is_zero() {
            tokio::time::sleep(self.recovery_delay).await;
        }

        let filter = [self.host.clone()];
        if let Err(e) = self.session.refresh(Some(&filter)).await {
            tracing::warn!("Session recovery failed: {}", e);
        }
    }

    /// Issues a GET against a JSON endpoint through the retry controller
    ///
    /// # Returns
    ///
    /// * `Ok(Value)` - The envelope's `data`, or an empty object for a soft failure
    /// * `Err(HarvestError::RetryExhausted)` - Every attempt failed
    /// * `Err(HarvestError::Cancelled)` - Shutdown was requested during backoff
    pub async fn get_json(
        &self,
        uri: &str,
        params: &[(&str, String)],
        headers: &[(&str, String)],
    ) -> Result<Value> {
        let url = self.endpoint(uri, params)?;
        let label = format!("GET {}", uri);

        self.retrier
            .run(
                &label,
                || self.attempt_json(&url, headers),
                || self.recover_session(),
            )
            .await
    }

    /// Checks whether the current session is logged in
    pub async fn probe(&self) -> bool {
        match self.get_json("/api/config", &[], &[]).await {
            Ok(data) => {
                let logged_in = data.get("login").and_then(Value::as_bool).unwrap_or(false);
                if logged_in {
                    tracing::info!("Session probe succeeded, logged in");
                } else {
                    tracing::warn!("Session probe succeeded, but the session is not logged in");
                }
                logged_in
            }
            Err(e) => {
                tracing::error!("Session probe failed: {}", e);
                false
            }
        }
    }

    /// Re-derives every cookie from the session provider
    pub async fn refresh_session(&self) -> Result<usize> {
        self.session.refresh(None).await
    }

    /// Fetches one page of a creator's timeline
    pub async fn get_notes_by_creator(
        &self,
        creator_id: &str,
        container_id: &str,
        since_id: &str,
    ) -> Result<Value> {
        let params = [
            ("jumpfrom", "weibocom".to_string()),
            ("type", "uid".to_string()),
            ("value", creator_id.to_string()),
            ("containerid", container_id.to_string()),
            ("since_id", since_id.to_string()),
        ];
        self.get_json("/api/container/getIndex", &params, &[]).await
    }

    /// Fetches one page of a note's comment thread
    pub async fn get_note_comments(
        &self,
        note_id: &str,
        max_id: Option<i64>,
        max_id_type: i64,
    ) -> Result<Value> {
        let mut params = vec![
            ("id", note_id.to_string()),
            ("mid", note_id.to_string()),
            ("max_id_type", max_id_type.to_string()),
        ];
        if let Some(max_id) = max_id {
            params.push(("max_id", max_id.to_string()));
        }

        let referer = format!("{}/detail/{}", self.host, note_id);
        self.get_json("/comments/hotflow", &params, &[("Referer", referer)])
            .await
    }

    /// Fetches one page of keyword search results
    pub async fn get_note_by_keyword(
        &self,
        keyword: &str,
        page: u32,
        search_type: SearchType,
    ) -> Result<Value> {
        let params = [
            (
                "containerid",
                format!(
                    "{}type={}&q={}",
                    SEARCH_CONTAINER_PREFIX,
                    search_type.code(),
                    keyword
                ),
            ),
            ("page_type", "searchall".to_string()),
            ("page", page.to_string()),
        ];
        self.get_json("/api/container/getIndex", &params, &[]).await
    }

    /// Fetches a creator's profile card container
    pub async fn get_creator_info(&self, creator_id: &str) -> Result<Value> {
        let params = [
            ("jumpfrom", "weibocom".to_string()),
            ("type", "uid".to_string()),
            ("value", creator_id.to_string()),
            (
                "containerid",
                format!("{}{}", PROFILE_CONTAINER_PREFIX, creator_id),
            ),
        ];
        self.get_json("/api/container/getIndex", &params, &[]).await
    }

    /// Discovers a creator's container ids from the profile page cookie
    pub async fn get_creator_container_ids(&self, creator_id: &str) -> Result<ContainerIds> {
        let uri = format!("/u/{}", creator_id);
        let url = self.endpoint(&uri, &[])?;
        let label = format!("GET {}", uri);

        let cookie = self
            .retrier
            .run(
                &label,
                || self.attempt_container_cookie(&url),
                || self.recover_session(),
            )
            .await?;

        let ids = cookie
            .map(|raw| ContainerIds::from_cookie_value(&raw))
            .unwrap_or_default();
        if ids.lfid.is_none() {
            return Err(HarvestError::MissingContainer {
                creator_id: creator_id.to_string(),
            });
        }

        tracing::debug!("Creator {} containers: {:?}", creator_id, ids);
        Ok(ids)
    }

    /// Fetches the full note from its detail page
    ///
    /// # Returns
    ///
    /// * `Ok(Some(Mblog))` - The page embedded the note
    /// * `Ok(None)` - The page loaded but carried no note
    pub async fn get_note_detail(&self, note_id: &str) -> Result<Option<Mblog>> {
        let uri = format!("/detail/{}", note_id);
        let url = self.endpoint(&uri, &[])?;
        let label = format!("GET {}", uri);

        let html = self
            .retrier
            .run(&label, || self.attempt_text(&url), || self.recover_session())
            .await?;

        let detail = extract_note_detail(&html);
        if detail.is_none() {
            tracing::warn!("Detail page for note {} carried no render data", note_id);
        }
        Ok(detail)
    }

    /// Downloads a picture through the image proxy
    ///
    /// Failures are logged and yield `None`; a missing picture never fails a note.
    pub async fn get_note_image(&self, image_url: &str) -> Option<Vec<u8>> {
        let Some(target) = proxied_image_url(&self.image_proxy_host, image_url) else {
            tracing::warn!("Unrecognized picture URL: {}", image_url);
            return None;
        };

        let response = match self.http.get(&target).send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!("Picture download failed for {}: {}", target, e);
                return None;
            }
        };

        if !response.status().is_success() {
            tracing::warn!(
                "Picture download failed for {}: HTTP {}",
                target,
                response.status()
            );
            return None;
        }

        match response.bytes().await {
            Ok(bytes) => Some(bytes.to_vec()),
            Err(e) => {
                tracing::warn!("Picture body unreadable for {}: {}", target, e);
                None
            }
        }
    }
}
