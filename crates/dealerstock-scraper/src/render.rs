//! Headless rendering capability used by the rendered-DOM tier.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Semaphore;

use crate::error::ScraperError;

/// Renders a page with script execution and returns the resulting markup.
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Navigates to `url` and returns the post-script DOM.
    ///
    /// `wait_for` is a marker expected in the rendered markup once content
    /// has loaded. `timeout` bounds the whole navigation.
    ///
    /// # Errors
    ///
    /// [`ScraperError::RenderTimeout`] when `timeout` elapses,
    /// [`ScraperError::RenderUnavailable`] when no browser can be started,
    /// [`ScraperError::RenderFailed`] when the browser exits unsuccessfully.
    async fn render(
        &self,
        url: &str,
        wait_for: Option<&str>,
        timeout: Duration,
    ) -> Result<String, ScraperError>;
}

/// Renderer for deployments without a browser. Always unavailable, so the
/// chain moves on to the static tiers.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopRenderer;

#[async_trait]
impl Renderer for NoopRenderer {
    async fn render(
        &self,
        url: &str,
        _wait_for: Option<&str>,
        _timeout: Duration,
    ) -> Result<String, ScraperError> {
        tracing::debug!(url, "no renderer configured");
        Err(ScraperError::RenderUnavailable(
            "no headless browser configured".to_string(),
        ))
    }
}

/// Runs headless Chromium with `--dump-dom`.
///
/// Concurrent sessions are capped by a semaphore. The permit is taken right
/// before spawning and dropped when `render` returns; the child is spawned
/// with `kill_on_drop`, so a timeout or a cancelled caller tears the browser
/// down with the future.
pub struct ChromiumRenderer {
    binary: PathBuf,
    settle_ms: u64,
    user_agent: String,
    sessions: Arc<Semaphore>,
}

impl ChromiumRenderer {
    #[must_use]
    pub fn new(binary: PathBuf, settle_ms: u64, max_sessions: usize, user_agent: &str) -> Self {
        Self {
            binary,
            settle_ms,
            user_agent: user_agent.to_string(),
            sessions: Arc::new(Semaphore::new(max_sessions.max(1))),
        }
    }

    fn command(&self, url: &str) -> tokio::process::Command {
        let mut command = tokio::process::Command::new(&self.binary);
        command
            .arg("--headless=new")
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--hide-scrollbars")
            .arg("--mute-audio")
            .arg(format!("--virtual-time-budget={}", self.settle_ms))
            .arg(format!("--user-agent={}", self.user_agent))
            .arg("--dump-dom")
            .arg(url)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true);
        command
    }
}

#[async_trait]
impl Renderer for ChromiumRenderer {
    async fn render(
        &self,
        url: &str,
        wait_for: Option<&str>,
        timeout: Duration,
    ) -> Result<String, ScraperError> {
        let _permit = self
            .sessions
            .acquire()
            .await
            .map_err(|e| ScraperError::RenderUnavailable(e.to_string()))?;

        let child = self.command(url).spawn().map_err(|e| {
            ScraperError::RenderUnavailable(format!(
                "failed to start {}: {e}",
                self.binary.display()
            ))
        })?;

        let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(ScraperError::RenderFailed {
                    url: url.to_string(),
                    reason: e.to_string(),
                });
            }
            Err(_) => {
                let timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
                tracing::warn!(url, timeout_ms, "render timed out");
                return Err(ScraperError::RenderTimeout {
                    url: url.to_string(),
                    timeout_ms,
                });
            }
        };

        if !output.status.success() {
            return Err(ScraperError::RenderFailed {
                url: url.to_string(),
                reason: format!("browser exited with {}", output.status),
            });
        }

        let markup = String::from_utf8_lossy(&output.stdout).into_owned();
        if let Some(marker) = wait_for {
            if !markup.contains(marker) {
                tracing::debug!(url, marker, "content marker absent after settle delay");
            }
        }
        Ok(markup)
    }
}
