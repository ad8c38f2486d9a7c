use crate::HarvestError;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Authentication material attached to every request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub headers: BTreeMap<String, String>,
    pub cookies: BTreeMap<String, String>,
}

impl Session {
    /// Creates a session from a user agent and a `name=value; ...` cookie string
    pub fn new(user_agent: &str, cookie_string: &str) -> Self {
        let mut session = Self::default();
        session
            .headers
            .insert("User-Agent".to_string(), user_agent.to_string());
        session.set_cookies(parse_cookie_string(cookie_string));
        session
    }

    /// Replaces the cookie jar and rewrites the `Cookie` header to match
    pub fn set_cookies(&mut self, cookies: Vec<(String, String)>) {
        self.cookies = cookies.into_iter().collect();
        let header = self.cookie_header();
        if header.is_empty() {
            self.headers.remove("Cookie");
        } else {
            self.headers.insert("Cookie".to_string(), header);
        }
    }

    /// Serializes the jar in `Cookie` header form
    pub fn cookie_header(&self) -> String {
        self.cookies
            .iter()
            .map(|(name, value)| format!("{}={}", name, value))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Parses `name=value; name2=value2` into pairs, skipping malformed entries
pub fn parse_cookie_string(raw: &str) -> Vec<(String, String)> {
    raw.split(';')
        .filter_map(|pair| {
            let (name, value) = pair.split_once('=')?;
            let name = name.trim();
            (!name.is_empty()).then(|| (name.to_string(), value.trim().to_string()))
        })
        .collect()
}

/// Source of fresh cookies, e.g. a logged-in browser context
#[async_trait]
pub trait SessionProvider: Send + Sync {
    /// Returns the current cookies, restricted to `url_filter` when given
    async fn cookies(
        &self,
        url_filter: Option<&[String]>,
    ) -> Result<Vec<(String, String)>, HarvestError>;
}

/// Provider that always hands back the cookies it was configured with
#[derive(Debug, Clone, Default)]
pub struct StaticCookieProvider {
    cookies: Vec<(String, String)>,
}

impl StaticCookieProvider {
    pub fn new(cookie_string: &str) -> Self {
        Self {
            cookies: parse_cookie_string(cookie_string),
        }
    }
}

#[async_trait]
impl SessionProvider for StaticCookieProvider {
    async fn cookies(
        &self,
        _url_filter: Option<&[String]>,
    ) -> Result<Vec<(String, String)>, HarvestError> {
        Ok(self.cookies.clone())
    }
}

/// Shared, refreshable session
///
/// Clones share the same session. Refreshes take the write lock only after the
/// provider has answered, so readers always see either the old or the new
/// header set in full.
#[derive(Clone)]
pub struct SessionState {
    inner: Arc<RwLock<Session>>,
    provider: Arc<dyn SessionProvider>,
}

impl SessionState {
    pub fn new(session: Session, provider: Arc<dyn SessionProvider>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(session)),
            provider,
        }
    }

    /// Returns a consistent copy of the current session
    pub async fn snapshot(&self) -> Session {
        self.inner.read().await.clone()
    }

    /// Re-derives cookies from the provider
    ///
    /// # Returns
    ///
    /// The number of cookies now in the jar
    pub async fn refresh(&self, url_filter: Option<&[String]>) -> Result<usize, HarvestError> {
        match url_filter {
            Some(urls) => tracing::info!("Refreshing session cookies for {:?}", urls),
            None => tracing::info!("Refreshing all session cookies"),
        }

        let cookies = self.provider.cookies(url_filter).await?;

        let mut session = self.inner.write().await;
        session.set_cookies(cookies);
        let count = session.cookies.len();

        tracing::info!("Session refreshed, {} cookies", count);
        Ok(count)
    }
}
