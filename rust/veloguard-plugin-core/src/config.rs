//! Resolved configuration handed to the proxy engine.

use crate::options::{LogLevel, Role};
use crate::socket::SocketTuning;
use crate::tls::TlsPolicy;
use crate::transport::{TransportKind, TransportSettings};
use serde::{Serialize, Serializer};
use std::fmt;
use std::net::{IpAddr, Ipv4Addr};

/// Redirect target that tells the receiving side to demultiplex mux streams.
pub const MUX_COOL_DOMAIN: &str = "v1.mux.cool";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Address {
    Ip(IpAddr),
    Domain(String),
}

impl Address {
    /// IP literals (IPv6 optionally in brackets) become [`Address::Ip`],
    /// anything else is treated as a domain.
    pub fn parse(s: &str) -> Self {
        let trimmed = s.trim();
        let unbracketed = trimmed
            .strip_prefix('[')
            .and_then(|rest| rest.strip_suffix(']'))
            .unwrap_or(trimmed);

        match unbracketed.parse::<IpAddr>() {
            Ok(ip) => Address::Ip(ip),
            Err(_) => Address::Domain(trimmed.to_string()),
        }
    }

    pub fn localhost() -> Self {
        Address::Ip(IpAddr::V4(Ipv4Addr::LOCALHOST))
    }

    pub fn mux_cool() -> Self {
        Address::Domain(MUX_COOL_DOMAIN.to_string())
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Address::Ip(ip) => write!(f, "{}", ip),
            Address::Domain(domain) => f.write_str(domain),
        }
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Tcp,
}

/// Where an inbound listener forwards accepted connections.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RedirectTarget {
    pub address: Address,
    pub networks: Vec<Network>,
}

impl RedirectTarget {
    pub fn tcp(address: Address) -> Self {
        Self {
            address,
            networks: vec![Network::Tcp],
        }
    }
}

/// Transport, socket and security settings shared by a listener or sender.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StreamSettings {
    pub protocol: &'static str,
    pub transport: TransportSettings,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub socket: Option<SocketTuning>,
    pub security: TlsPolicy,
}

impl StreamSettings {
    pub fn kind(&self) -> TransportKind {
        self.transport.kind()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InboundConfig {
    pub listen: Address,
    pub port: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream: Option<StreamSettings>,
    pub redirect: RedirectTarget,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Destination {
    pub address: Address,
    pub port: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MuxSettings {
    pub enabled: bool,
    pub concurrency: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SenderSettings {
    pub stream: StreamSettings,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mux: Option<MuxSettings>,
}

/// The single outbound: a passthrough whose destination is overridden,
/// optionally sending through the configured transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutboundConfig {
    pub destination: Destination,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender: Option<SenderSettings>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogTarget {
    Console,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Debug,
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ErrorLogConfig {
    pub target: LogTarget,
    pub level: Severity,
}

/// Engine log configuration derived from the plugin log level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LogConfig {
    pub error: ErrorLogConfig,
    pub access: LogTarget,
}

impl From<LogLevel> for LogConfig {
    fn from(level: LogLevel) -> Self {
        let mut config = LogConfig {
            error: ErrorLogConfig {
                target: LogTarget::Console,
                level: Severity::Warning,
            },
            access: LogTarget::Console,
        };

        match level {
            LogLevel::Debug => config.error.level = Severity::Debug,
            LogLevel::Info => config.error.level = Severity::Info,
            LogLevel::Warning => {}
            LogLevel::Error => config.error.level = Severity::Error,
            LogLevel::None => {
                config.error.target = LogTarget::None;
                config.access = LogTarget::None;
            }
        }
        config
    }
}

/// Engine subsystems, passed through as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "app", rename_all = "snake_case")]
pub enum AppConfig {
    Dispatcher,
    InboundManager,
    OutboundManager,
    Log(LogConfig),
}

impl AppConfig {
    pub fn defaults(level: LogLevel) -> Vec<AppConfig> {
        vec![
            AppConfig::Dispatcher,
            AppConfig::InboundManager,
            AppConfig::OutboundManager,
            AppConfig::Log(level.into()),
        ]
    }
}

/// Fully resolved configuration for one proxy session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedConfig {
    pub role: Role,
    pub inbounds: Vec<InboundConfig>,
    pub outbound: OutboundConfig,
    pub apps: Vec<AppConfig>,
    /// Outbound sockets must be protected from the VPN routing loop.
    pub protect_sockets: bool,
}

impl ResolvedConfig {
    pub fn to_yaml(&self) -> crate::error::Result<String> {
        serde_yaml::to_string(self).map_err(|e| crate::error::Error::Config {
            message: format!("Failed to serialize resolved config: {}", e),
            source: Some(Box::new(e)),
        })
    }

    pub fn log_config(&self) -> Option<&LogConfig> {
        self.apps.iter().find_map(|app| match app {
            AppConfig::Log(log) => Some(log),
            _ => None,
        })
    }

    /// Stream settings on the transport side: the first listener of a
    /// server, the sender of a client.
    pub fn stream(&self) -> Option<&StreamSettings> {
        match self.role {
            Role::Server => self.inbounds.first().and_then(|i| i.stream.as_ref()),
            Role::Client => self.outbound.sender.as_ref().map(|s| &s.stream),
        }
    }

    /// TLS policy in effect on the transport side, if any.
    pub fn security(&self) -> Option<&TlsPolicy> {
        self.stream().map(|s| &s.security)
    }

    /// Whether socket buffers are sized explicitly.
    pub fn tunes_buffers(&self) -> bool {
        self.stream()
            .and_then(|s| s.socket)
            .is_some_and(|tuning| tuning.rx_buf_size > 0 || tuning.tx_buf_size > 0)
    }
}
