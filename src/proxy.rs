//! Proxy configuration for the launcher process and its children.
//!
//! Settings are applied to the process environment before any container is
//! started, so spawned children inherit them; the same values are also
//! threaded explicitly into container invocations via [`ProxySettings::env_pairs`].

use std::env;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use url::Url;

/// The four proxy fields applied as one unit: either fully set or untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxySettings {
    pub http: String,
    pub https: String,
    pub ftp: String,
    pub no_proxy: String,
}

/// A proxy URL is valid iff it is empty ("no proxy requested") or parses as
/// an absolute URI.
pub fn is_valid_proxy_url(candidate: &str) -> bool {
    candidate.is_empty() || Url::parse(candidate).is_ok()
}

/// Validate and apply proxy configuration.
///
/// Both inputs empty is a no-op (reverting previously applied settings is a
/// deferred extension point). An invalid proxy URL is non-fatal: it is logged
/// and prior configuration is left untouched.
pub fn configure(http_proxy: &str, no_proxy: &str) -> Option<ProxySettings> {
    if http_proxy.is_empty() && no_proxy.is_empty() {
        return None;
    }

    if !is_valid_proxy_url(http_proxy) {
        warn!("invalid proxy URL {http_proxy:?}, ignoring proxy settings");
        return None;
    }

    let settings = ProxySettings {
        http: http_proxy.to_string(),
        https: http_proxy.to_string(),
        ftp: http_proxy.to_string(),
        no_proxy: no_proxy.to_string(),
    };
    settings.apply();
    info!("proxy configuration applied");
    Some(settings)
}

impl ProxySettings {
    /// The settings as (lowercase name, value) pairs, for explicit
    /// pass-through into child-process invocations.
    pub fn env_pairs(&self) -> Vec<(String, String)> {
        vec![
            ("http_proxy".to_string(), self.http.clone()),
            ("https_proxy".to_string(), self.https.clone()),
            ("ftp_proxy".to_string(), self.ftp.clone()),
            ("no_proxy".to_string(), self.no_proxy.clone()),
        ]
    }

    /// Set the proxy variables in the process environment, lower- and
    /// upper-case, so all subsequently spawned children inherit them.
    /// Empty fields are skipped: tools distinguish unset from empty, and a
    /// no-proxy-only configuration must not set `http_proxy=""`.
    pub fn apply(&self) {
        for (name, value) in self.env_pairs() {
            if value.is_empty() {
                continue;
            }
            env::set_var(&name, &value);
            env::set_var(name.to_uppercase(), &value);
        }
    }

    /// Read the current proxy configuration back from the environment.
    pub fn from_env() -> Self {
        let read = |name: &str| {
            env::var(name)
                .or_else(|_| env::var(name.to_uppercase()))
                .unwrap_or_default()
        };
        Self {
            http: read("http_proxy"),
            https: read("https_proxy"),
            ftp: read("ftp_proxy"),
            no_proxy: read("no_proxy"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_url_is_valid() {
        assert!(is_valid_proxy_url(""));
    }

    #[test]
    fn test_absolute_urls_are_valid() {
        assert!(is_valid_proxy_url("http://proxy.example.com:3128"));
        assert!(is_valid_proxy_url("https://10.0.0.1:8080"));
        assert!(is_valid_proxy_url("socks5://proxy:1080"));
    }

    #[test]
    fn test_relative_and_garbage_urls_are_invalid() {
        assert!(!is_valid_proxy_url("not a url"));
        assert!(!is_valid_proxy_url("/just/a/path"));
        assert!(!is_valid_proxy_url("http://"));
    }

    #[test]
    fn test_configure_noop_when_both_empty() {
        assert!(configure("", "").is_none());
    }

    #[test]
    fn test_configure_rejects_invalid_proxy() {
        assert!(configure("not a url", "localhost").is_none());
    }

    #[test]
    fn test_apply_skips_empty_fields() {
        for name in ["http_proxy", "https_proxy", "ftp_proxy", "no_proxy"] {
            env::remove_var(name);
            env::remove_var(name.to_uppercase());
        }

        let settings = ProxySettings {
            no_proxy: "localhost,127.0.0.1".to_string(),
            ..Default::default()
        };
        settings.apply();

        assert!(env::var("http_proxy").is_err());
        assert!(env::var("https_proxy").is_err());
        assert!(env::var("ftp_proxy").is_err());
        assert_eq!(env::var("no_proxy").as_deref(), Ok("localhost,127.0.0.1"));
    }

    #[test]
    fn test_env_pairs_cover_all_four_fields() {
        let settings = ProxySettings {
            http: "http://p:3128".to_string(),
            https: "http://p:3128".to_string(),
            ftp: "http://p:3128".to_string(),
            no_proxy: "localhost,127.0.0.1".to_string(),
        };
        let names: Vec<_> = settings.env_pairs().into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, ["http_proxy", "https_proxy", "ftp_proxy", "no_proxy"]);
    }
}
