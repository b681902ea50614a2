pub mod merge;
pub mod plugin_env;

pub use merge::{OptionMerger, ResolvedOptions};
pub use plugin_env::PluginOptions;

use clap::Parser;
use serde::Serialize;

/// Declared plugin parameters. Every field carries the default used when
/// neither the command line nor the host overrides it.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "veloguard-plugin",
    about = "SIP003 transport plugin: WebSocket, QUIC and gRPC with TLS mimicry",
    disable_version_flag = true
)]
pub struct DeclaredOptions {
    /// Run in VPN mode.
    #[arg(short = 'V')]
    pub vpn: bool,

    /// Enable TCP fast open.
    #[arg(long = "fast-open")]
    pub fast_open: bool,

    /// Local address to listen on. Server mode accepts several, separated by '|'.
    #[arg(long = "localAddr", default_value = "127.0.0.1")]
    pub local_addr: String,

    /// Local port to listen on.
    #[arg(long = "localPort", default_value = "1984")]
    pub local_port: String,

    /// Remote address to forward to.
    #[arg(long = "remoteAddr", default_value = "127.0.0.1")]
    pub remote_addr: String,

    /// Remote port to forward to.
    #[arg(long = "remotePort", default_value = "1080")]
    pub remote_port: String,

    /// URL path for websocket.
    #[arg(long, default_value = "/")]
    pub path: String,

    /// Service name for grpc.
    #[arg(long = "serviceName", default_value = "GunService")]
    pub service_name: String,

    /// Hostname for server.
    #[arg(long, default_value = "cloudfront.com")]
    pub host: String,

    /// Enable TLS.
    #[arg(long)]
    pub tls: bool,

    /// Path to TLS certificate file. Overrides certRaw. Default: ~/.acme.sh/{host}/fullchain.cer
    #[arg(long, default_value = "")]
    pub cert: String,

    /// Raw TLS certificate content. Intended only for Android.
    #[arg(long = "certRaw", default_value = "")]
    pub cert_raw: String,

    /// (server) Path to TLS key file. Default: ~/.acme.sh/{host}/{host}.key
    #[arg(long, default_value = "")]
    pub key: String,

    /// Transport mode: websocket, quic (enforced tls), grpc.
    #[arg(long, default_value = "websocket")]
    pub mode: String,

    /// Concurrent multiplexed connections (websocket client mode only).
    #[arg(long, default_value_t = 1)]
    pub mux: u32,

    /// Run in server mode.
    #[arg(long)]
    pub server: bool,

    /// Log level: debug, info, warning (default), error, none.
    #[arg(long = "loglevel", default_value = "")]
    pub log_level: String,

    /// Show current version.
    #[arg(long)]
    pub version: bool,

    /// Set SO_MARK option for outbound sockets.
    #[arg(long, default_value_t = 0)]
    pub fwmark: u32,

    /// Allow insecure certificate from server, commonly self signed.
    #[arg(long)]
    pub insecure: bool,

    /// Pinned certificate chain sha256 fingerprints, separated by '#'.
    #[arg(long = "pinnedSha256", default_value = "")]
    pub pinned_sha256: String,

    /// User agent (base64) to include in http request.
    #[arg(long = "userAgent", default_value = "")]
    pub user_agent: String,

    /// Set snd/recv socket buffer size.
    #[arg(long = "bufSize", default_value_t = 0)]
    pub buf_size: u32,
}

impl Default for DeclaredOptions {
    fn default() -> Self {
        Self::parse_from(["veloguard-plugin"])
    }
}

/// Which side of the tunnel this process is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Listens for the local application and forwards to the remote peer.
    #[default]
    Client,
    /// Listens for the remote peer and forwards to the local application server.
    Server,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Client => "client",
            Role::Server => "server",
        }
    }

    pub fn from_server_flag(server: bool) -> Self {
        if server {
            Role::Server
        } else {
            Role::Client
        }
    }

    pub fn is_server(self) -> bool {
        self == Role::Server
    }
}

/// Log level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    #[default]
    Warning,
    Error,
    None,
}

impl LogLevel {
    /// Unknown or empty input falls back to [`LogLevel::Warning`].
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "debug" => LogLevel::Debug,
            "info" => LogLevel::Info,
            "error" => LogLevel::Error,
            "none" => LogLevel::None,
            _ => LogLevel::Warning,
        }
    }
}
