//! Runtime configuration: command-line flags, each with an environment
//! variable fallback.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::ideas::upstream::DEFAULT_UPSTREAM_ORIGIN;

#[derive(Debug, Clone, Parser)]
#[command(
    name = "ideas-relay",
    version,
    about = "Caching relay for a paginated ideas listing API",
    long_about = None
)]
pub struct Config {
    /// Interface to listen on.
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on.
    #[arg(long, env = "PORT", default_value_t = 3000)]
    pub port: u16,

    /// Origin of the upstream listing API; also used to absolutize image URLs.
    #[arg(long, env = "UPSTREAM_ORIGIN", default_value = DEFAULT_UPSTREAM_ORIGIN)]
    pub upstream_origin: String,

    /// Upstream request timeout in seconds.
    #[arg(long, env = "UPSTREAM_TIMEOUT_SECS", default_value_t = 10)]
    pub upstream_timeout_secs: u64,

    /// How long a cached listing page stays fresh, in seconds.
    #[arg(long, env = "CACHE_TTL_SECS", default_value_t = 300)]
    pub cache_ttl_secs: u64,

    /// Host that `/proxy/*` requests are forwarded to.
    #[arg(long, env = "PROXY_TARGET", default_value = DEFAULT_UPSTREAM_ORIGIN)]
    pub proxy_target: String,

    /// Directory served for non-API paths.
    #[arg(long, env = "STATIC_DIR", value_name = "PATH", default_value = "public")]
    pub static_dir: PathBuf,

    /// Origins allowed by CORS.
    #[arg(
        long,
        env = "ALLOWED_ORIGINS",
        value_delimiter = ',',
        default_value = "http://localhost:3000,http://127.0.0.1:3000"
    )]
    pub allowed_origins: Vec<String>,

    /// Requests allowed per client per window on `/api/` paths.
    #[arg(long, env = "RATE_LIMIT_MAX", default_value_t = 100)]
    pub rate_limit_max: u32,

    /// Rate limit window in seconds.
    #[arg(long, env = "RATE_LIMIT_WINDOW_SECS", default_value_t = 900)]
    pub rate_limit_window_secs: u64,

    /// Log filter used when `RUST_LOG` is unset.
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Config {
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream_timeout_secs)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn rate_limit_window(&self) -> Duration {
        Duration::from_secs(self.rate_limit_window_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_flags_override_defaults() {
        let config = Config::try_parse_from([
            "ideas-relay",
            "--host",
            "127.0.0.1",
            "--port",
            "8080",
            "--cache-ttl-secs",
            "60",
            "--upstream-timeout-secs",
            "2",
            "--allowed-origins",
            "https://a.test,https://b.test",
        ])
        .unwrap();

        assert_eq!(config.listen_addr(), "127.0.0.1:8080");
        assert_eq!(config.cache_ttl(), Duration::from_secs(60));
        assert_eq!(config.upstream_timeout(), Duration::from_secs(2));
        assert_eq!(config.allowed_origins, vec!["https://a.test", "https://b.test"]);
    }

    #[test]
    fn rejects_non_numeric_port() {
        assert!(Config::try_parse_from(["ideas-relay", "--port", "http"]).is_err());
    }

    #[test]
    fn window_conversion() {
        let config = Config::try_parse_from([
            "ideas-relay",
            "--rate-limit-window-secs",
            "30",
            "--rate-limit-max",
            "5",
        ])
        .unwrap();
        assert_eq!(config.rate_limit_window(), Duration::from_secs(30));
        assert_eq!(config.rate_limit_max, 5);
    }
}
