//! End-to-end resolution scenarios through [`crate::resolve`].

use crate::config::{Address, ResolvedConfig};
use crate::error::Error;
use crate::options::{DeclaredOptions, PluginOptions, Role};
use crate::platform::PlatformFamily;
use crate::tls::TlsPolicy;
use crate::transport::TransportSettings;
use crate::{resolve, ResolveEnv};
use std::path::PathBuf;

fn env(home: Option<PathBuf>) -> ResolveEnv {
    ResolveEnv {
        home_dir: home,
        platform: PlatformFamily::Unix,
    }
}

fn host_overrides(plugin_options: &str, local: (&str, &str), remote: (&str, &str)) -> PluginOptions {
    PluginOptions::from_vars(remote.0, remote.1, local.0, local.1, plugin_options)
        .unwrap()
        .unwrap()
}

#[test]
fn test_client_websocket_tls_mux_scenario() {
    let overrides = host_overrides(
        "mode=websocket;host=example.com;tls;mux=4",
        ("127.0.0.1", "1984"),
        ("1.2.3.4", "8443"),
    );
    let config = resolve(&DeclaredOptions::default(), Some(&overrides), &env(None)).unwrap();

    assert_eq!(config.role, Role::Client);
    assert_eq!(config.inbounds.len(), 1);
    let inbound = &config.inbounds[0];
    assert_eq!(inbound.listen.to_string(), "127.0.0.1");
    assert_eq!(inbound.port, 1984);
    assert_eq!(inbound.redirect.address, Address::localhost());

    assert_eq!(config.outbound.destination.address.to_string(), "1.2.3.4");
    assert_eq!(config.outbound.destination.port, 8443);

    let sender = config.outbound.sender.as_ref().unwrap();
    match &sender.stream.transport {
        TransportSettings::WebSocket(ws) => assert_eq!(ws.header("Host"), Some("example.com")),
        other => panic!("expected websocket, got {:?}", other),
    }
    match &sender.stream.security {
        TlsPolicy::ClientMimicry(tls) => {
            assert_eq!(tls.server_name, "example.com");
            assert_eq!(tls.imitate, "randomized");
        }
        other => panic!("expected client mimicry, got {:?}", other),
    }
    let mux = sender.mux.unwrap();
    assert!(mux.enabled);
    assert_eq!(mux.concurrency, 4);
}

#[test]
fn test_quic_forces_tls_without_flag() {
    let declared = DeclaredOptions {
        mode: "quic".to_string(),
        tls: false,
        ..DeclaredOptions::default()
    };
    let config = resolve(&declared, None, &env(None)).unwrap();
    assert!(config.security().unwrap().is_enabled());
}

#[test]
fn test_quic_server_needs_certificate() {
    let home = tempfile::tempdir().unwrap();
    let declared = DeclaredOptions {
        mode: "quic".to_string(),
        server: true,
        host: "quic.example.com".to_string(),
        ..DeclaredOptions::default()
    };
    let err = resolve(&declared, None, &env(Some(home.path().to_path_buf()))).unwrap_err();
    match err {
        Error::CertificateIo { path: Some(path), .. } => {
            assert!(path.to_string_lossy().contains("quic.example.com"));
        }
        other => panic!("expected certificate error, got {:?}", other),
    }
}

fn server_config(home: &std::path::Path, overrides: &PluginOptions) -> ResolvedConfig {
    resolve(
        &DeclaredOptions::default(),
        Some(overrides),
        &env(Some(home.to_path_buf())),
    )
    .unwrap()
}

#[test]
fn test_client_and_server_configs_complement() {
    // Same nominal host parameters on both ends: the shadowsocks side is
    // always "local", the tunnel side always "remote".
    let client = resolve(
        &DeclaredOptions::default(),
        Some(&host_overrides(
            "host=example.com",
            ("127.0.0.1", "1080"),
            ("203.0.113.7", "443"),
        )),
        &env(None),
    )
    .unwrap();

    let home = tempfile::tempdir().unwrap();
    let server = server_config(
        home.path(),
        &host_overrides(
            "server;host=example.com",
            ("127.0.0.1", "8388"),
            ("203.0.113.7", "443"),
        ),
    );

    assert_eq!(server.role, Role::Server);
    assert_eq!(server.inbounds.len(), 1);
    assert_eq!(server.inbounds[0].listen, client.outbound.destination.address);
    assert_eq!(server.inbounds[0].port, client.outbound.destination.port);
    assert_eq!(server.outbound.destination.address.to_string(), "127.0.0.1");
    assert_eq!(server.outbound.destination.port, 8388);

    let server_stream = server.inbounds[0].stream.as_ref().unwrap();
    let client_stream = &client.outbound.sender.as_ref().unwrap().stream;
    assert_eq!(server_stream.protocol, client_stream.protocol);
}

#[test]
fn test_server_tls_with_files() {
    let dir = tempfile::tempdir().unwrap();
    let cert = dir.path().join("chain.pem");
    let key = dir.path().join("key.pem");
    std::fs::write(&cert, b"CHAIN").unwrap();
    std::fs::write(&key, b"KEY").unwrap();

    let options = format!(
        "server;tls;host=example.com;cert={};key={}",
        cert.display(),
        key.display()
    );
    let overrides = host_overrides(&options, ("127.0.0.1", "8388"), ("0.0.0.0", "443"));
    let config = resolve(&DeclaredOptions::default(), Some(&overrides), &env(None)).unwrap();

    match config.security().unwrap() {
        TlsPolicy::ServerTerminated(tls) => {
            assert_eq!(tls.certificate.certificate, b"CHAIN");
            assert_eq!(tls.certificate.key, b"KEY");
        }
        other => panic!("expected server TLS, got {:?}", other),
    }
}

#[test]
fn test_unsupported_mode_propagates() {
    let overrides = host_overrides("mode=mkcp", ("127.0.0.1", "1984"), ("1.2.3.4", "443"));
    let err = resolve(&DeclaredOptions::default(), Some(&overrides), &env(None)).unwrap_err();
    assert!(matches!(err, Error::UnsupportedTransport { .. }));
}

#[test]
fn test_fingerprint_overflow_is_rejected() {
    let declared = DeclaredOptions {
        tls: true,
        pinned_sha256: "a#b#c#d".to_string(),
        ..DeclaredOptions::default()
    };
    let err = resolve(&declared, None, &env(None)).unwrap_err();
    assert!(matches!(err, Error::Config { .. }));
}

#[test]
fn test_socket_tuning_on_windows_family() {
    let declared = DeclaredOptions::default();
    let windows = ResolveEnv {
        home_dir: None,
        platform: PlatformFamily::Windows,
    };
    let config = resolve(&declared, None, &windows).unwrap();
    let socket = config.outbound.sender.unwrap().stream.socket.unwrap();
    assert_eq!(socket.rx_buf_size, 196_608);

    let config = resolve(&declared, None, &env(None)).unwrap();
    assert!(config.outbound.sender.unwrap().stream.socket.is_none());
}

#[test]
fn test_yaml_dump_contains_key_fields() {
    let overrides = host_overrides(
        "host=example.com;tls;pinnedsha256=aa#bb",
        ("127.0.0.1", "1984"),
        ("1.2.3.4", "8443"),
    );
    let config = resolve(&DeclaredOptions::default(), Some(&overrides), &env(None)).unwrap();
    let yaml = config.to_yaml().unwrap();

    assert!(yaml.contains("role: client"));
    assert!(yaml.contains("protocol: websocket"));
    assert!(yaml.contains("address: 1.2.3.4"));
    assert!(yaml.contains("imitate: randomized"));
    assert!(yaml.contains("- aa"));
}
