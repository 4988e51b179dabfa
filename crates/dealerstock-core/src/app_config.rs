use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

/// Basic-auth credentials for the structured listing API.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiCredentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for ApiCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiCredentials")
            .field("username", &self.username)
            .field("password", &"[redacted]")
            .finish()
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub env: Environment,
    pub bind_addr: SocketAddr,
    pub log_level: String,
    pub dealer_path: PathBuf,
    pub request_timeout_secs: u64,
    pub user_agent: String,
    pub max_retries: u32,
    pub retry_backoff_base_ms: u64,
    pub cache_ttl_secs: u64,
    pub detail_cache_ttl_secs: u64,
    pub dedup_prefix_len: usize,
    pub source_budget_secs: u64,
    pub render_nav_timeout_ms: u64,
    pub render_settle_ms: u64,
    pub render_max_sessions: usize,
    pub chromium_path: Option<PathBuf>,
    pub api_credentials: Option<ApiCredentials>,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("bind_addr", &self.bind_addr)
            .field("log_level", &self.log_level)
            .field("dealer_path", &self.dealer_path)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("user_agent", &self.user_agent)
            .field("max_retries", &self.max_retries)
            .field("retry_backoff_base_ms", &self.retry_backoff_base_ms)
            .field("cache_ttl_secs", &self.cache_ttl_secs)
            .field("detail_cache_ttl_secs", &self.detail_cache_ttl_secs)
            .field("dedup_prefix_len", &self.dedup_prefix_len)
            .field("source_budget_secs", &self.source_budget_secs)
            .field("render_nav_timeout_ms", &self.render_nav_timeout_ms)
            .field("render_settle_ms", &self.render_settle_ms)
            .field("render_max_sessions", &self.render_max_sessions)
            .field("chromium_path", &self.chromium_path)
            .field(
                "api_credentials",
                &self.api_credentials.as_ref().map(|_| "[redacted]"),
            )
            .finish()
    }
}
