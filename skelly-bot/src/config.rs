//! Command line flags and the optional TOML config file.
//!
//! Resolution order for every setting: command line (or its environment
//! variable) > config file > built-in default.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use clap::Parser;
use serde::Deserialize;
use skelly_sdk::config::{DEFAULT_PORT, DEFAULT_TLS_PORT};
use skelly_sdk::{AddressFamily, Config, Throttle, TlsConfig};

#[derive(Parser, Debug, Default)]
#[command(name = "skelly", about = "Always-reconnecting IRC bot skeleton")]
pub struct Cli {
    /// TOML file supplying values for flags not given on the command line
    #[arg(long, short = 'c', env = "SKELLY_CONFIG")]
    pub config: Option<PathBuf>,

    /// IRC server host name or IP address
    #[arg(long, short = 's', env = "SKELLY_SERVER")]
    pub server: Option<String>,

    /// Server port [default: 6667, or 6697 with --tls]
    #[arg(long, short = 'p', env = "SKELLY_PORT")]
    pub port: Option<u16>,

    /// Channel to join (the leading # is optional)
    #[arg(long, env = "SKELLY_CHANNEL")]
    pub channel: Option<String>,

    /// Channel key
    #[arg(long = "key", short = 'k', env = "SKELLY_CHANNEL_KEY")]
    pub channel_key: Option<String>,

    /// Server password (sent as PASS)
    #[arg(long, env = "SKELLY_PASSWORD")]
    pub password: Option<String>,

    /// Only dial IPv4 addresses
    #[arg(long, short = '4', conflicts_with = "ipv6")]
    pub ipv4: bool,

    /// Only dial IPv6 addresses
    #[arg(long, short = '6')]
    pub ipv6: bool,

    /// Local address to bind before connecting
    #[arg(long)]
    pub vhost: Option<String>,

    /// Connect with TLS
    #[arg(long)]
    pub tls: bool,

    /// Verify the server certificate
    #[arg(long)]
    pub tls_verify: bool,

    /// Client certificate (PEM); may also hold the key
    #[arg(long)]
    pub cert: Option<String>,

    /// Client private key (PEM), if not inside --cert
    #[arg(long)]
    pub key_file: Option<String>,

    /// Password for an encrypted client key
    #[arg(long, env = "SKELLY_CERT_PASSWORD")]
    pub cert_password: Option<String>,

    /// Nickname [default: skelly]
    #[arg(long, short = 'n', env = "SKELLY_NICK")]
    pub nick: Option<String>,

    /// Username [default: skelly]
    #[arg(long, short = 'u')]
    pub user: Option<String>,

    /// Real name [default: IRC bot skeleton]
    #[arg(long)]
    pub realname: Option<String>,

    /// User modes to set after registration, e.g. B or +iB
    #[arg(long)]
    pub modes: Option<String>,

    /// NickServ password
    #[arg(long, env = "SKELLY_NICKSERV_PASSWORD")]
    pub nickserv: Option<String>,

    /// IRC operator password (OPER uses the username)
    #[arg(long, env = "SKELLY_OPER_PASSWORD")]
    pub oper: Option<String>,

    /// Seconds between ordinary outbound commands [default: 0]
    #[arg(long)]
    pub flood_delay: Option<f64>,

    /// Seconds between registration and the channel JOIN [default: 15]
    #[arg(long)]
    pub join_delay: Option<f64>,

    /// Seconds to wait before each reconnect [default: 15]
    #[arg(long)]
    pub reconnect_delay: Option<f64>,

    /// Seconds of server silence before reconnecting [default: 300]
    #[arg(long)]
    pub idle_timeout: Option<f64>,

    /// Seconds allowed for dialing and the TLS handshake [default: 15]
    #[arg(long)]
    pub connect_timeout: Option<f64>,
}

/// Contents of the `--config` file. Every key is optional.
///
/// ```toml
/// server = "irc.libera.chat"
/// channel = "#skelly"
/// nick = "skelly"
///
/// [tls]
/// enabled = true
///
/// [throttle]
/// join_delay = 10
/// ```
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub server: Option<String>,
    pub port: Option<u16>,
    pub channel: Option<String>,
    pub key: Option<String>,
    pub password: Option<String>,
    /// `any`, `v4` or `v6`.
    pub family: Option<AddressFamily>,
    pub vhost: Option<String>,
    pub nick: Option<String>,
    pub user: Option<String>,
    pub realname: Option<String>,
    pub modes: Option<String>,
    pub nickserv: Option<String>,
    pub oper: Option<String>,
    pub tls: FileTls,
    pub throttle: FileThrottle,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileTls {
    pub enabled: Option<bool>,
    pub verify: Option<bool>,
    pub cert: Option<String>,
    pub key: Option<String>,
    pub password: Option<String>,
}

/// Durations in seconds.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileThrottle {
    pub flood_delay: Option<f64>,
    pub join_delay: Option<f64>,
    pub reconnect: Option<f64>,
    pub idle_timeout: Option<f64>,
    pub connect_timeout: Option<f64>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("can't read config file {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("bad config file {}", path.display()))
    }
}

/// Build the SDK config from flags and file, then validate it.
pub fn resolve(cli: &Cli, file: &FileConfig) -> Result<Config> {
    let defaults = Config::default();
    let default_throttle = Throttle::default();

    let server = cli
        .server
        .clone()
        .or_else(|| file.server.clone())
        .ok_or_else(|| anyhow!("a server is required (--server or `server` in the config file)"))?;
    let channel = cli
        .channel
        .clone()
        .or_else(|| file.channel.clone())
        .ok_or_else(|| anyhow!("a channel is required (--channel or `channel` in the config file)"))?;

    let tls = TlsConfig {
        enabled: cli.tls || file.tls.enabled.unwrap_or(false),
        verify: cli.tls_verify || file.tls.verify.unwrap_or(false),
        cert_file: cli.cert.clone().or_else(|| file.tls.cert.clone()),
        key_file: cli.key_file.clone().or_else(|| file.tls.key.clone()),
        cert_password: cli.cert_password.clone().or_else(|| file.tls.password.clone()),
    };
    if tls.key_file.is_some() && tls.cert_file.is_none() {
        bail!("a client key was given without a client certificate");
    }

    let family = if cli.ipv4 {
        AddressFamily::V4
    } else if cli.ipv6 {
        AddressFamily::V6
    } else {
        file.family.unwrap_or_default()
    };

    let port = cli
        .port
        .or(file.port)
        .unwrap_or(if tls.enabled { DEFAULT_TLS_PORT } else { DEFAULT_PORT });

    let throttle = Throttle {
        flood_delay: seconds("flood delay", cli.flood_delay.or(file.throttle.flood_delay), default_throttle.flood_delay)?,
        join_delay: seconds("join delay", cli.join_delay.or(file.throttle.join_delay), default_throttle.join_delay)?,
        reconnect: seconds(
            "reconnect delay",
            cli.reconnect_delay.or(file.throttle.reconnect),
            default_throttle.reconnect,
        )?,
        idle_timeout: seconds(
            "idle timeout",
            cli.idle_timeout.or(file.throttle.idle_timeout),
            default_throttle.idle_timeout,
        )?,
        connect_timeout: seconds(
            "connect timeout",
            cli.connect_timeout.or(file.throttle.connect_timeout),
            default_throttle.connect_timeout,
        )?,
    };
    if throttle.idle_timeout.is_zero() {
        bail!("idle timeout must be greater than zero");
    }

    let config = Config {
        server,
        port,
        channel: Config::normalize_channel(&channel),
        channel_key: cli.channel_key.clone().or_else(|| file.key.clone()),
        password: cli.password.clone().or_else(|| file.password.clone()),
        family,
        vhost: cli.vhost.clone().or_else(|| file.vhost.clone()),
        tls,
        nickname: cli.nick.clone().or_else(|| file.nick.clone()).unwrap_or(defaults.nickname),
        username: cli.user.clone().or_else(|| file.user.clone()).unwrap_or(defaults.username),
        realname: cli
            .realname
            .clone()
            .or_else(|| file.realname.clone())
            .unwrap_or(defaults.realname),
        modes: cli.modes.clone().or_else(|| file.modes.clone()),
        nickserv_password: cli.nickserv.clone().or_else(|| file.nickserv.clone()),
        oper_password: cli.oper.clone().or_else(|| file.oper.clone()),
        throttle,
    };
    config.validate().context("invalid configuration")?;
    Ok(config)
}

fn seconds(what: &str, value: Option<f64>, default: Duration) -> Result<Duration> {
    match value {
        None => Ok(default),
        Some(secs) => Duration::try_from_secs_f64(secs)
            .map_err(|_| anyhow!("{what} must be a non-negative number of seconds, got {secs}")),
    }
}
