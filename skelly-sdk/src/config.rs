//! Immutable connection and identity settings.
//!
//! A [`Config`] is built once by the process entry point and then shared
//! read-only (behind an `Arc`) by the transport, the dispatcher and the
//! supervisor. Nothing in the SDK mutates it after the first connect.

use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;

/// Default plaintext IRC port.
pub const DEFAULT_PORT: u16 = 6667;
/// Default TLS IRC port.
pub const DEFAULT_TLS_PORT: u16 = 6697;

/// Which IP family the transport may dial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressFamily {
    /// Use whatever the resolver returns, in order.
    #[default]
    Any,
    /// IPv4 addresses only.
    V4,
    /// IPv6 addresses only.
    V6,
}

impl AddressFamily {
    pub fn allows(self, addr: &std::net::SocketAddr) -> bool {
        match self {
            AddressFamily::Any => true,
            AddressFamily::V4 => addr.is_ipv4(),
            AddressFamily::V6 => addr.is_ipv6(),
        }
    }
}

impl std::fmt::Display for AddressFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AddressFamily::Any => f.write_str("any"),
            AddressFamily::V4 => f.write_str("ipv4"),
            AddressFamily::V6 => f.write_str("ipv6"),
        }
    }
}

impl std::str::FromStr for AddressFamily {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "any" => Ok(AddressFamily::Any),
            "4" | "v4" | "ipv4" => Ok(AddressFamily::V4),
            "6" | "v6" | "ipv6" => Ok(AddressFamily::V6),
            other => Err(format!("unknown address family '{other}' (expected any, ipv4 or ipv6)")),
        }
    }
}

/// TLS settings.
#[derive(Debug, Clone, Default)]
pub struct TlsConfig {
    /// Wrap the TCP stream in TLS.
    pub enabled: bool,
    /// Verify the server certificate against the webpki roots.
    /// Off by default: many IRC networks still run self-signed certs.
    pub verify: bool,
    /// PEM file with the client certificate chain (and optionally the key).
    pub cert_file: Option<String>,
    /// PEM file with the client private key. Defaults to `cert_file`.
    pub key_file: Option<String>,
    /// Password for an encrypted PKCS#8 private key.
    pub cert_password: Option<String>,
}

/// Timing knobs for the session and the supervisor.
#[derive(Debug, Clone)]
pub struct Throttle {
    /// Pause between two ordinary outbound commands.
    pub flood_delay: Duration,
    /// Grace period between registration (001) and the channel JOIN.
    pub join_delay: Duration,
    /// Fixed wait before every reconnect attempt.
    pub reconnect: Duration,
    /// Silence on the read side after which the session is declared stalled.
    pub idle_timeout: Duration,
    /// Upper bound on dialing plus the TLS handshake.
    pub connect_timeout: Duration,
}

impl Default for Throttle {
    fn default() -> Self {
        Self {
            flood_delay: Duration::ZERO,
            join_delay: Duration::from_secs(15),
            reconnect: Duration::from_secs(15),
            idle_timeout: Duration::from_secs(300),
            connect_timeout: Duration::from_secs(15),
        }
    }
}

/// Everything the bot needs to connect, register and join its channel.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server host name or IP address.
    pub server: String,
    pub port: u16,
    /// Channel to join after registration (always starts with `#`).
    pub channel: String,
    /// Channel key, if the channel is `+k`.
    pub channel_key: Option<String>,
    /// Server password, sent as `PASS` before registration.
    pub password: Option<String>,
    pub family: AddressFamily,
    /// Local address to bind before dialing.
    pub vhost: Option<String>,
    pub tls: TlsConfig,
    pub nickname: String,
    pub username: String,
    pub realname: String,
    /// User modes applied after registration, without the leading `+`.
    pub modes: Option<String>,
    pub nickserv_password: Option<String>,
    pub oper_password: Option<String>,
    pub throttle: Throttle,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            channel: "#dev".to_string(),
            channel_key: None,
            password: None,
            family: AddressFamily::Any,
            vhost: None,
            tls: TlsConfig::default(),
            nickname: "skelly".to_string(),
            username: "skelly".to_string(),
            realname: "IRC bot skeleton".to_string(),
            modes: None,
            nickserv_password: None,
            oper_password: None,
            throttle: Throttle::default(),
        }
    }
}

impl Config {
    /// `host:port` as used in logs and for resolution.
    pub fn server_addr(&self) -> String {
        if self.server.contains(':') && !self.server.starts_with('[') {
            // Bare IPv6 literal
            format!("[{}]:{}", self.server, self.port)
        } else {
            format!("{}:{}", self.server, self.port)
        }
    }

    /// Prefix the channel with `#` when it was given without one.
    pub fn normalize_channel(channel: &str) -> String {
        if channel.starts_with('#') || channel.starts_with('&') {
            channel.to_string()
        } else {
            format!("#{channel}")
        }
    }

    /// Check the fields the connection cannot work without.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.trim().is_empty() {
            return Err(ConfigError::MissingServer);
        }
        if self.channel.len() < 2 {
            return Err(ConfigError::MissingChannel);
        }
        if self.port == 0 {
            return Err(ConfigError::Port);
        }
        if self.nickname.is_empty() || self.nickname.contains(' ') {
            return Err(ConfigError::Nickname(self.nickname.clone()));
        }
        Ok(())
    }

    /// The JOIN line for the configured channel. The key argument is left
    /// out entirely when no key is set.
    pub fn join_command(&self) -> String {
        match self.channel_key.as_deref().filter(|k| !k.is_empty()) {
            Some(key) => format!("JOIN {} {key}", self.channel),
            None => format!("JOIN {}", self.channel),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_omits_missing_key() {
        let config = Config { channel: "#dev".into(), ..Default::default() };
        assert_eq!(config.join_command(), "JOIN #dev");

        let config = Config { channel_key: Some(String::new()), ..config };
        assert_eq!(config.join_command(), "JOIN #dev");

        let config = Config { channel_key: Some("hunter2".into()), ..config };
        assert_eq!(config.join_command(), "JOIN #dev hunter2");
    }

    #[test]
    fn channel_gets_hash_prefix() {
        assert_eq!(Config::normalize_channel("dev"), "#dev");
        assert_eq!(Config::normalize_channel("#dev"), "#dev");
        assert_eq!(Config::normalize_channel("&local"), "&local");
    }

    #[test]
    fn ipv6_literal_is_bracketed() {
        let config = Config { server: "::1".into(), port: 6697, ..Default::default() };
        assert_eq!(config.server_addr(), "[::1]:6697");
        let config = Config { server: "irc.example.org".into(), ..config };
        assert_eq!(config.server_addr(), "irc.example.org:6697");
    }

    #[test]
    fn family_parsing() {
        assert_eq!("ipv6".parse::<AddressFamily>().unwrap(), AddressFamily::V6);
        assert_eq!("4".parse::<AddressFamily>().unwrap(), AddressFamily::V4);
        assert!("ipx".parse::<AddressFamily>().is_err());
    }

    #[test]
    fn validation_rejects_empty_server() {
        let config = Config { server: " ".into(), ..Default::default() };
        assert_eq!(config.validate(), Err(ConfigError::MissingServer));
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn validation_rejects_bad_port_channel_and_nick() {
        let config = Config { port: 0, ..Default::default() };
        assert_eq!(config.validate(), Err(ConfigError::Port));
        let config = Config { channel: "#".into(), ..Default::default() };
        assert_eq!(config.validate(), Err(ConfigError::MissingChannel));
        let config = Config { nickname: "two words".into(), ..Default::default() };
        assert_eq!(config.validate(), Err(ConfigError::Nickname("two words".into())));
    }
}
