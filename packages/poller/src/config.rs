//! Configuration constants, the broker configuration file and validation.

use std::fs;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;

use crate::error::{PollerError, Result};
use crate::monitors::MonitorDefinition;

/// Path of the SEMP endpoint on the broker's management interface.
pub const SEMP_PATH: &str = "/SEMP";

/// HTTP timeout in seconds.
pub const HTTP_TIMEOUT_SECS: u64 = 30;

/// Default management port for plain HTTP.
pub const DEFAULT_SEMP_PORT: u16 = 8080;

/// Default management port for HTTPS.
pub const DEFAULT_SEMP_TLS_PORT: u16 = 1943;

/// Environment variable that overrides the password from the file.
pub const PASSWORD_ENV_VAR: &str = "SEMPWATCH_PASSWORD";

/// Content type of every SEMP request.
pub const SEMP_CONTENT_TYPE: &str = "text/xml; charset=utf-8";

/// Hostname (RFC 1123 labels) or dotted IPv4 address.
#[allow(clippy::expect_used)] // Static regex that is guaranteed to be valid
static HOST_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?)*$")
        .expect("valid regex")
});

/// Validate a broker host name.
///
/// # Examples
/// ```
/// use sempwatch_poller::config::validate_host;
///
/// assert!(validate_host("broker-1.example.com").is_ok());
/// assert!(validate_host("10.0.0.5").is_ok());
/// assert!(validate_host("http://broker").is_err());
/// ```
pub fn validate_host(host: &str) -> Result<()> {
    if HOST_PATTERN.is_match(host) {
        Ok(())
    } else {
        Err(PollerError::InvalidHost(host.to_string()))
    }
}

/// Connection settings for one broker.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BrokerConfig {
    /// Hostname or IPv4 address of the management interface.
    pub host: String,

    /// Management port; defaults depend on `tls`.
    #[serde(default)]
    pub port: Option<u16>,

    /// SEMP user.
    pub username: String,

    /// SEMP password. May be left out and supplied via `SEMPWATCH_PASSWORD`.
    #[serde(default)]
    pub password: String,

    /// Use HTTPS.
    #[serde(default)]
    pub tls: bool,

    /// Request timeout override in seconds.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl BrokerConfig {
    /// Port to connect to.
    #[must_use]
    pub fn effective_port(&self) -> u16 {
        self.port.unwrap_or(if self.tls {
            DEFAULT_SEMP_TLS_PORT
        } else {
            DEFAULT_SEMP_PORT
        })
    }

    /// Full SEMP endpoint URL.
    ///
    /// # Examples
    /// ```
    /// use sempwatch_poller::config::BrokerConfig;
    ///
    /// let broker = BrokerConfig::new("broker", "admin", "secret").with_port(8080);
    /// assert_eq!(broker.semp_url(), "http://broker:8080/SEMP");
    /// ```
    #[must_use]
    pub fn semp_url(&self) -> String {
        let scheme = if self.tls { "https" } else { "http" };
        format!(
            "{scheme}://{}:{}{SEMP_PATH}",
            self.host,
            self.effective_port()
        )
    }

    /// Request timeout in seconds.
    #[must_use]
    pub fn timeout_secs(&self) -> u64 {
        self.timeout_secs.unwrap_or(HTTP_TIMEOUT_SECS)
    }

    /// Check host and port before any request is made.
    pub fn validate(&self) -> Result<()> {
        validate_host(&self.host)?;
        if self.port == Some(0) {
            return Err(PollerError::InvalidPort(0));
        }
        Ok(())
    }

    /// Minimal plain-HTTP configuration.
    #[must_use]
    pub fn new(
        host: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port: None,
            username: username.into(),
            password: password.into(),
            tls: false,
            timeout_secs: None,
        }
    }

    /// Set an explicit port.
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Switch to HTTPS.
    #[must_use]
    pub fn with_tls(mut self, tls: bool) -> Self {
        self.tls = tls;
        self
    }
}

/// Contents of the YAML configuration file.
///
/// ```yaml
/// broker:
///   host: broker-1.example.com
///   port: 8080
///   username: admin
///   password: admin
/// monitors:
///   - name: orders-queues
///     request: "<rpc><show><queue><name>orders*</name></queue></show></rpc>"
///     row_element: queue
///     fields: [name, message-vpn, num-messages-spooled]
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PollerConfig {
    pub broker: BrokerConfig,

    /// Custom monitors added to (or replacing) the presets.
    #[serde(default)]
    pub monitors: Vec<MonitorDefinition>,
}

impl PollerConfig {
    /// Parse and validate configuration from YAML text.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml_ng::from_str(yaml)?;
        config.broker.validate()?;
        Ok(config)
    }

    /// Replace the password when an override is present.
    #[must_use]
    pub fn with_password_override(mut self, password: Option<String>) -> Self {
        if let Some(password) = password {
            tracing::debug!("password taken from {PASSWORD_ENV_VAR}");
            self.broker.password = password;
        }
        self
    }
}

/// Load the configuration file, applying `SEMPWATCH_PASSWORD` if set.
///
/// # Arguments
/// * `path` - Path to the YAML configuration file
///
/// # Returns
/// The validated configuration
pub fn load_config(path: &Path) -> Result<PollerConfig> {
    let yaml = fs::read_to_string(path)?;
    let config = PollerConfig::from_yaml(&yaml)?;
    Ok(config.with_password_override(std::env::var(PASSWORD_ENV_VAR).ok()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_validate_host_valid() {
        assert!(validate_host("localhost").is_ok());
        assert!(validate_host("broker-1").is_ok());
        assert!(validate_host("mgmt.broker.example.com").is_ok());
        assert!(validate_host("192.168.1.10").is_ok());
    }

    #[test]
    fn test_validate_host_invalid() {
        assert!(validate_host("").is_err());
        assert!(validate_host("-broker").is_err());
        assert!(validate_host("broker/SEMP").is_err());
        assert!(validate_host("broker:8080").is_err());
        assert!(validate_host("bro ker").is_err());
    }

    #[test]
    fn test_default_ports() {
        let plain = BrokerConfig::new("broker", "admin", "pw");
        assert_eq!(plain.effective_port(), DEFAULT_SEMP_PORT);
        let secure = plain.clone().with_tls(true);
        assert_eq!(secure.effective_port(), DEFAULT_SEMP_TLS_PORT);
        assert_eq!(secure.semp_url(), "https://broker:1943/SEMP");
    }

    #[test]
    fn test_from_yaml() {
        let config = PollerConfig::from_yaml(
            "broker:\n  host: broker\n  port: 9000\n  username: admin\n  password: secret\n",
        )
        .unwrap();
        assert_eq!(config.broker.semp_url(), "http://broker:9000/SEMP");
        assert_eq!(config.broker.timeout_secs(), HTTP_TIMEOUT_SECS);
        assert!(config.monitors.is_empty());
    }

    #[test]
    fn test_from_yaml_rejects_bad_host() {
        let err = PollerConfig::from_yaml("broker:\n  host: 'http://x'\n  username: a\n").unwrap_err();
        assert!(matches!(err, PollerError::InvalidHost(_)));
    }

    #[test]
    fn test_from_yaml_rejects_port_zero() {
        let err =
            PollerConfig::from_yaml("broker:\n  host: x\n  port: 0\n  username: a\n").unwrap_err();
        assert!(matches!(err, PollerError::InvalidPort(0)));
    }

    #[test]
    fn test_from_yaml_rejects_unknown_field() {
        let err = PollerConfig::from_yaml("broker:\n  host: x\n  username: a\n  pasword: b\n")
            .unwrap_err();
        assert!(matches!(err, PollerError::Yaml(_)));
    }

    #[test]
    fn test_password_override() {
        let config = PollerConfig::from_yaml("broker:\n  host: x\n  username: a\n").unwrap();
        assert_eq!(config.broker.password, "");
        let config = config.with_password_override(Some("from-env".to_string()));
        assert_eq!(config.broker.password, "from-env");
        let config = config.with_password_override(None);
        assert_eq!(config.broker.password, "from-env");
    }

    #[test]
    fn test_load_config_missing_file() {
        let err = load_config(Path::new("/nonexistent/sempwatch.yaml")).unwrap_err();
        assert!(matches!(err, PollerError::Io(_)));
    }
}
