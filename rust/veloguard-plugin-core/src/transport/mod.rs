//! Transport Layer - Resolves the outer framing used to carry proxied traffic
//!
//! Supported transports:
//! - WebSocket: HTTP upgrade with decoy headers, the only mux-capable transport
//! - QUIC: always wrapped in TLS by the security layer
//! - gRPC: "gun" streaming over HTTP/2

pub mod grpc;
pub mod websocket;

pub use grpc::GrpcSettings;
pub use websocket::{Header, WebSocketSettings};

use crate::error::{Error, Result};
use crate::options::{ResolvedOptions, Role};
use serde::Serialize;

/// Transport type enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    WebSocket,
    Quic,
    Grpc,
}

impl TransportKind {
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "websocket" => Ok(TransportKind::WebSocket),
            "quic" => Ok(TransportKind::Quic),
            "grpc" => Ok(TransportKind::Grpc),
            other => Err(Error::unsupported_transport(other)),
        }
    }

    /// Name the proxy engine registers this transport under.
    pub fn protocol_name(self) -> &'static str {
        match self {
            TransportKind::WebSocket => "websocket",
            TransportKind::Quic => "quic",
            TransportKind::Grpc => "gun",
        }
    }

    /// QUIC has no plaintext mode, so TLS is switched on regardless of the flag.
    pub fn forces_tls(self) -> bool {
        self == TransportKind::Quic
    }
}

/// Security applied by the transport itself, independent of the TLS layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportSecurity {
    None,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuicSettings {
    pub security: TransportSecurity,
}

impl Default for QuicSettings {
    fn default() -> Self {
        Self {
            security: TransportSecurity::None,
        }
    }
}

/// Transport-specific settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TransportSettings {
    WebSocket(WebSocketSettings),
    Quic(QuicSettings),
    Grpc(GrpcSettings),
}

impl TransportSettings {
    pub fn kind(&self) -> TransportKind {
        match self {
            TransportSettings::WebSocket(_) => TransportKind::WebSocket,
            TransportSettings::Quic(_) => TransportKind::Quic,
            TransportSettings::Grpc(_) => TransportKind::Grpc,
        }
    }
}

/// Output of transport resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTransport {
    pub settings: TransportSettings,
    /// Connections may be multiplexed: WebSocket with a non-zero mux.
    pub mux_eligible: bool,
}

impl ResolvedTransport {
    pub fn kind(&self) -> TransportKind {
        self.settings.kind()
    }
}

/// Resolve the transport settings for the configured mode and role.
pub fn resolve(opts: &ResolvedOptions) -> Result<ResolvedTransport> {
    let kind = TransportKind::parse(&opts.mode)?;

    let settings = match kind {
        TransportKind::WebSocket => {
            let ws = match opts.role {
                Role::Server => WebSocketSettings::server(&opts.path, &opts.host),
                Role::Client => WebSocketSettings::client(
                    &opts.path,
                    &opts.host,
                    opts.user_agent.as_deref(),
                ),
            };
            TransportSettings::WebSocket(ws)
        }
        TransportKind::Quic => TransportSettings::Quic(QuicSettings::default()),
        TransportKind::Grpc => TransportSettings::Grpc(GrpcSettings::new(&opts.service_name)),
    };

    let mux_eligible = kind == TransportKind::WebSocket && opts.mux != 0;
    tracing::debug!(
        "Transport resolved: {} (role: {:?}, mux eligible: {})",
        kind.protocol_name(),
        opts.role,
        mux_eligible
    );

    Ok(ResolvedTransport {
        settings,
        mux_eligible,
    })
}
