//! Configuration loading and management

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use url::Url;

const PAGE_URL_VAR: &str = "REMOTE_CONSOLE_PAGE_URL";
const SOCKET_VAR: &str = "REMOTE_CONSOLE_SOCKET";
const VOICE_VAR: &str = "REMOTE_CONSOLE_VOICE";

const DEFAULT_PAGE_URL: &str = "http://localhost/";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("page URL {0} has no host")]
    MissingHost(Url),

    #[error("invalid endpoint: {0}")]
    Endpoint(#[from] url::ParseError),
}

/// Client configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Page origin the console endpoint is derived from
    pub page_url: Url,

    /// Path to the Unix domain socket for front-end IPC
    pub socket_path: PathBuf,

    /// Directory for runtime data
    pub data_dir: PathBuf,

    /// Whether a voice recognizer is available
    pub voice_enabled: bool,

    /// Constant delay before every reconnect attempt
    pub reconnect_delay: Duration,

    /// HIGH-to-LOW delay of a keyboard impulse
    pub impulse_delay: Duration,

    /// Window for suppressing repeated voice commands
    pub debounce_window: Duration,

    /// Delay before restarting an ended recognizer
    pub voice_restart_delay: Duration,

    /// Upper bound on a single handshake
    pub connect_timeout: Duration,
}

impl Config {
    /// Load configuration from environment and defaults
    pub fn load() -> Result<Self> {
        let home = std::env::var("HOME").context("HOME is not set")?;
        let data_dir = PathBuf::from(&home)
            .join(".local")
            .join("share")
            .join("remote-console");

        let socket_path = std::env::var_os(SOCKET_VAR)
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join("console.sock"));

        let page_url =
            std::env::var(PAGE_URL_VAR).unwrap_or_else(|_| DEFAULT_PAGE_URL.to_string());
        let page_url = Url::parse(&page_url)
            .with_context(|| format!("invalid {PAGE_URL_VAR}: {page_url}"))?;

        let voice_enabled = std::env::var(VOICE_VAR)
            .map(|v| parse_flag(&v))
            .unwrap_or(true);

        Ok(Self {
            socket_path,
            data_dir,
            voice_enabled,
            ..Self::for_page(page_url)
        })
    }

    /// Default timings and paths for a console served from `page_url`
    pub fn for_page(page_url: Url) -> Self {
        Self {
            page_url,
            socket_path: PathBuf::from("console.sock"),
            data_dir: PathBuf::from("."),
            voice_enabled: true,
            reconnect_delay: Duration::from_millis(1500),
            impulse_delay: Duration::from_millis(120),
            debounce_window: Duration::from_millis(400),
            voice_restart_delay: Duration::from_millis(300),
            connect_timeout: Duration::from_secs(10),
        }
    }

    /// WebSocket endpoint of the console
    pub fn endpoint(&self) -> Result<Url, ConfigError> {
        endpoint_for(&self.page_url)
    }

    /// Ensure data directory exists
    pub fn ensure_dirs(&self) -> Result<()> {
        std::fs::create_dir_all(&self.data_dir)
            .with_context(|| format!("failed to create {}", self.data_dir.display()))?;
        Ok(())
    }
}

/// `{ws|wss}://{host[:port]}/ws`, secure when the page is served over https
pub fn endpoint_for(page: &Url) -> Result<Url, ConfigError> {
    let scheme = if page.scheme() == "https" { "wss" } else { "ws" };
    let host = page
        .host_str()
        .filter(|host| !host.is_empty())
        .ok_or_else(|| ConfigError::MissingHost(page.clone()))?;
    let authority = match page.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    };
    Ok(Url::parse(&format!("{scheme}://{authority}/ws"))?)
}

fn parse_flag(value: &str) -> bool {
    !matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "0" | "false" | "no" | "off"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint(page: &str) -> String {
        endpoint_for(&Url::parse(page).unwrap()).unwrap().to_string()
    }

    #[test]
    fn test_config_load() {
        let config = Config::load().unwrap();
        assert!(config.data_dir.to_string_lossy().contains("remote-console"));
    }

    #[test]
    fn test_default_timings() {
        let config = Config::for_page(Url::parse(DEFAULT_PAGE_URL).unwrap());
        assert_eq!(config.endpoint().unwrap().as_str(), "ws://localhost/ws");
        assert_eq!(config.reconnect_delay, Duration::from_millis(1500));
        assert_eq!(config.impulse_delay, Duration::from_millis(120));
        assert_eq!(config.debounce_window, Duration::from_millis(400));
        assert_eq!(config.voice_restart_delay, Duration::from_millis(300));
    }

    #[test]
    fn test_plain_page_uses_ws() {
        assert_eq!(endpoint("http://192.168.1.40/"), "ws://192.168.1.40/ws");
        assert_eq!(
            endpoint("http://console.local:8080/index.html"),
            "ws://console.local:8080/ws"
        );
    }

    #[test]
    fn test_secure_page_uses_wss() {
        assert_eq!(endpoint("https://console.example.com/"), "wss://console.example.com/ws");
        assert_eq!(
            endpoint("https://console.example.com:8443/x"),
            "wss://console.example.com:8443/ws"
        );
    }

    #[test]
    fn test_ipv6_host() {
        assert_eq!(endpoint("http://[::1]:8000/"), "ws://[::1]:8000/ws");
    }

    #[test]
    fn test_page_without_host() {
        let page = Url::parse("data:text/plain,console").unwrap();
        assert!(matches!(endpoint_for(&page), Err(ConfigError::MissingHost(_))));
    }

    #[test]
    fn test_voice_flag() {
        assert!(parse_flag("1"));
        assert!(parse_flag("yes"));
        assert!(!parse_flag("0"));
        assert!(!parse_flag(" False "));
    }
}
