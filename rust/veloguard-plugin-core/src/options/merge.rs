use super::{DeclaredOptions, LogLevel, PluginOptions, Role};
use crate::error::Result;
use std::str::FromStr;

/// Parameters after merging declared defaults with host overrides.
///
/// `local_*` is always where this process listens and `remote_*` is where it
/// forwards to, whatever the role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedOptions {
    pub role: Role,
    pub vpn: bool,
    pub fast_open: bool,
    pub local_addr: String,
    pub local_port: u16,
    pub remote_addr: String,
    pub remote_port: u16,
    pub path: String,
    pub service_name: String,
    pub host: String,
    pub tls: bool,
    pub cert: Option<String>,
    pub cert_raw: Option<String>,
    pub key: Option<String>,
    pub mode: String,
    pub mux: u32,
    pub log_level: LogLevel,
    pub fwmark: u32,
    pub insecure: bool,
    pub pinned_sha256: Option<String>,
    pub user_agent: Option<String>,
    pub buf_size: u32,
}

/// Combines declared options with host-injected overrides.
pub struct OptionMerger;

impl OptionMerger {
    /// Merge `declared` with `overrides`, overrides taking precedence.
    ///
    /// Endpoint overrides are expressed from the host's point of view. On a
    /// server the host's "local" side is what this process forwards to, so
    /// the local/remote bindings are swapped before anything reads them.
    pub fn merge(
        declared: &DeclaredOptions,
        overrides: Option<&PluginOptions>,
    ) -> Result<ResolvedOptions> {
        let mut opts = declared.clone();

        if let Some(overrides) = overrides {
            Self::apply(&mut opts, overrides);
        }

        Self::finish(opts)
    }

    fn apply(opts: &mut DeclaredOptions, overrides: &PluginOptions) {
        let set = |target: &mut String, key: &str| {
            if let Some(v) = overrides.get(key) {
                *target = v.to_string();
            }
        };

        set(&mut opts.mode, "mode");
        set_number(&mut opts.mux, overrides, "mux");
        if overrides.contains("tls") {
            opts.tls = true;
        }
        set(&mut opts.host, "host");
        set(&mut opts.path, "path");
        set(&mut opts.service_name, "serviceName");
        set(&mut opts.cert, "cert");
        set(&mut opts.cert_raw, "certRaw");
        set(&mut opts.key, "key");
        set(&mut opts.log_level, "loglevel");
        if overrides.contains("server") {
            opts.server = true;
        }

        let server = opts.server;
        let (local_addr, local_port, remote_addr, remote_port) = if server {
            (
                &mut opts.remote_addr,
                &mut opts.remote_port,
                &mut opts.local_addr,
                &mut opts.local_port,
            )
        } else {
            (
                &mut opts.local_addr,
                &mut opts.local_port,
                &mut opts.remote_addr,
                &mut opts.remote_port,
            )
        };
        set(local_addr, "localAddr");
        set(local_port, "localPort");
        set(remote_addr, "remoteAddr");
        set(remote_port, "remotePort");

        if overrides.contains("fastOpen") {
            opts.fast_open = true;
        }
        if overrides.contains("__android_vpn") {
            opts.vpn = true;
        }
        set_number(&mut opts.fwmark, overrides, "fwmark");
        if overrides.contains("insecure") {
            opts.insecure = true;
        }
        set(&mut opts.pinned_sha256, "pinnedsha256");
        if !server {
            set(&mut opts.user_agent, "useragent");
        }
        set_number(&mut opts.buf_size, overrides, "bufSize");
    }

    fn finish(opts: DeclaredOptions) -> Result<ResolvedOptions> {
        let local_port = crate::parse_required!(u16, "localPort", &opts.local_port);
        let remote_port = crate::parse_required!(u16, "remotePort", &opts.remote_port);

        Ok(ResolvedOptions {
            role: Role::from_server_flag(opts.server),
            vpn: opts.vpn,
            fast_open: opts.fast_open,
            local_addr: opts.local_addr,
            local_port,
            remote_addr: opts.remote_addr,
            remote_port,
            path: opts.path,
            service_name: opts.service_name,
            host: opts.host,
            tls: opts.tls,
            cert: non_empty(opts.cert),
            cert_raw: non_empty(opts.cert_raw),
            key: non_empty(opts.key),
            mode: opts.mode,
            mux: opts.mux,
            log_level: LogLevel::parse(&opts.log_level),
            fwmark: opts.fwmark,
            insecure: opts.insecure,
            pinned_sha256: non_empty(opts.pinned_sha256),
            user_agent: non_empty(opts.user_agent),
            buf_size: opts.buf_size,
        })
    }
}

/// Optional numeric tunables keep their previous value when the override
/// does not parse.
fn set_number<T: FromStr>(target: &mut T, overrides: &PluginOptions, key: &str) {
    if let Some(raw) = overrides.get(key) {
        match raw.trim().parse() {
            Ok(v) => *target = v,
            Err(_) => tracing::warn!("failed to parse {} ({:?}), using default value", key, raw),
        }
    }
}

fn non_empty(s: String) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}
