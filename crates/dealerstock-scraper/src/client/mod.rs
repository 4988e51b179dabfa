//! HTTP client shared by every source adapter and the detail fetcher.

mod origin;

use std::time::Duration;

use dealerstock_core::ApiCredentials;
use reqwest::{Client, RequestBuilder, Response};

use crate::error::ScraperError;
use crate::retry::retry_with_backoff;

pub use origin::{extract_origin, resolve_url};
#[cfg(test)]
use origin::extract_domain;

pub(crate) const BROWSER_FALLBACK_UA: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

/// HTTP client for listing pages and the structured listing API.
///
/// Handles rate limiting (429), not-found (404), bot challenges, and other
/// non-2xx responses as typed errors. Transient errors are retried with
/// exponential backoff up to `max_retries` additional attempts.
pub struct HttpFetcher {
    client: Client,
    max_retries: u32,
    backoff_base_ms: u64,
    credentials: Option<ApiCredentials>,
}

impl HttpFetcher {
    /// Creates an `HttpFetcher` with configured timeout, `User-Agent`, and retry policy.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn new(
        timeout_secs: u64,
        user_agent: &str,
        max_retries: u32,
        backoff_base_ms: u64,
    ) -> Result<Self, ScraperError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(user_agent)
            .build()?;
        Ok(Self {
            client,
            max_retries,
            backoff_base_ms,
            credentials: None,
        })
    }

    /// Attaches basic-auth credentials sent with structured API requests.
    #[must_use]
    pub fn with_credentials(mut self, credentials: Option<ApiCredentials>) -> Self {
        self.credentials = credentials;
        self
    }

    /// Fetches a listing page as markup.
    ///
    /// A 403 with the configured user agent is retried once with a
    /// browser-like user agent, since several marketplaces filter bots that way.
    ///
    /// # Errors
    ///
    /// - [`ScraperError::BotChallenge`]: the page is an anti-bot interstitial.
    /// - [`ScraperError::NotFound`] / [`ScraperError::UnexpectedStatus`]: non-2xx.
    /// - [`ScraperError::Http`]: network failure after all retries.
    pub async fn fetch_markup(&self, url: &str) -> Result<String, ScraperError> {
        let body = match self.fetch_markup_with_user_agent(url, None).await {
            Err(ScraperError::UnexpectedStatus { status: 403, .. }) => {
                tracing::debug!(url, "403 with configured user agent; retrying as browser");
                self.fetch_markup_with_user_agent(url, Some(BROWSER_FALLBACK_UA))
                    .await?
            }
            other => other?,
        };

        if looks_like_bot_challenge(&body) {
            return Err(ScraperError::BotChallenge {
                url: url.to_owned(),
            });
        }
        Ok(body)
    }

    async fn fetch_markup_with_user_agent(
        &self,
        url: &str,
        user_agent_override: Option<&str>,
    ) -> Result<String, ScraperError> {
        let referer = extract_origin(url);
        retry_with_backoff(self.max_retries, self.backoff_base_ms, || {
            let referer = referer.clone();
            async move {
                let mut request = self
                    .client
                    .get(url)
                    .header(
                        reqwest::header::ACCEPT,
                        "text/html,application/xhtml+xml;q=0.9,*/*;q=0.8",
                    )
                    .header(reqwest::header::ACCEPT_LANGUAGE, "de-DE,de;q=0.9,en;q=0.7")
                    .header(reqwest::header::REFERER, &referer);
                if let Some(ua) = user_agent_override {
                    request = request.header(reqwest::header::USER_AGENT, ua);
                }
                let response = self.send_checked(request, url).await?;
                Ok(response.text().await?)
            }
        })
        .await
    }

    /// Fetches a JSON document from the structured API, attaching credentials
    /// when configured.
    ///
    /// # Errors
    ///
    /// - [`ScraperError::Deserialize`]: body is not JSON (not retried).
    /// - Any status or network error from [`Self::fetch_markup`]'s taxonomy.
    pub async fn fetch_json(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<serde_json::Value, ScraperError> {
        let full_url = build_url(url, query)?.to_string();
        retry_with_backoff(self.max_retries, self.backoff_base_ms, || {
            let full_url = full_url.clone();
            async move {
                let mut request = self
                    .client
                    .get(&full_url)
                    .header(reqwest::header::ACCEPT, "application/json");
                if let Some(creds) = &self.credentials {
                    request = request.basic_auth(&creds.username, Some(&creds.password));
                }
                let response = self.send_checked(request, &full_url).await?;
                let body = response.text().await?;
                serde_json::from_str::<serde_json::Value>(&body).map_err(|e| {
                    ScraperError::Deserialize {
                        context: format!("JSON from {full_url}"),
                        source: e,
                    }
                })
            }
        })
        .await
    }

    async fn send_checked(
        &self,
        request: RequestBuilder,
        url: &str,
    ) -> Result<Response, ScraperError> {
        let response = request.send().await?;
        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(60);
            return Err(ScraperError::RateLimited {
                domain: origin::extract_domain(url),
                retry_after_secs,
            });
        }

        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(ScraperError::NotFound {
                url: url.to_owned(),
            });
        }

        if !status.is_success() {
            return Err(ScraperError::UnexpectedStatus {
                status: status.as_u16(),
                url: url.to_owned(),
            });
        }

        Ok(response)
    }
}

/// Appends `query` pairs to `base`.
///
/// # Errors
///
/// Returns [`ScraperError::InvalidUrl`] if `base` does not parse.
fn build_url(base: &str, query: &[(&str, String)]) -> Result<reqwest::Url, ScraperError> {
    let mut url = reqwest::Url::parse(base).map_err(|e| ScraperError::InvalidUrl {
        url: base.to_owned(),
        reason: e.to_string(),
    })?;
    if !query.is_empty() {
        let mut pairs = url.query_pairs_mut();
        for (key, value) in query {
            pairs.append_pair(key, value);
        }
    }
    Ok(url)
}

fn looks_like_bot_challenge(body: &str) -> bool {
    let lowered = body.to_ascii_lowercase();
    let has_cloudflare_banner = lowered.contains("attention required! | cloudflare");
    let has_challenge_platform = lowered.contains("/cdn-cgi/challenge-platform/");
    let has_just_a_moment = lowered.contains("just a moment...");
    let has_cookie_gate = lowered.contains("please enable cookies");
    let has_captcha_gate = lowered.contains("captcha-delivery.com");

    has_cloudflare_banner
        || has_challenge_platform
        || has_captcha_gate
        || (has_just_a_moment && has_cookie_gate)
}

#[cfg(test)]
#[path = "../client_test.rs"]
mod tests;
