//! Property-based tests for option merging and resolution
//!
//! These tests check invariants that must hold for any host-supplied input:
//! role inversion of addresses, forced TLS on QUIC, the Windows buffer rule,
//! fingerprint slot ordering and the plugin options escaping rules.

use crate::options::{DeclaredOptions, OptionMerger, PluginOptions, Role};
use crate::platform::PlatformFamily;
use crate::socket::{self, SYSTEM_DEFAULT_BUFFER_SIZE, WINDOWS_DEFAULT_BUFFER_SIZE};
use crate::tls::{PinnedFingerprintSet, PINNED_FINGERPRINT_SLOTS};
use crate::{resolve, ResolveEnv};
use proptest::prelude::*;

fn host_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        (1u8..=254, 0u8..=255, 0u8..=255, 1u8..=254)
            .prop_map(|(a, b, c, d)| format!("{}.{}.{}.{}", a, b, c, d)),
        ("[a-z]{1,10}", prop_oneof!["com", "org", "net", "io"])
            .prop_map(|(name, tld)| format!("{}.{}", name, tld)),
    ]
}

fn fingerprint_strategy() -> impl Strategy<Value = String> {
    "[0-9a-f]{64}"
}

/// Text that may contain every character the options syntax treats
/// specially.
fn option_value_strategy() -> impl Strategy<Value = String> {
    prop::collection::vec(
        prop_oneof![
            Just(';'),
            Just('='),
            Just('\\'),
            prop::char::range('a', 'z'),
            prop::char::range('0', '9'),
        ],
        0..16,
    )
    .prop_map(|chars| chars.into_iter().collect())
}

fn escape_option(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, ';' | '=' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn unix_env() -> ResolveEnv {
    ResolveEnv {
        home_dir: None,
        platform: PlatformFamily::Unix,
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// *For any* host-supplied endpoints, a server listens on the host's
    /// remote endpoint and forwards to the host's local endpoint, while a
    /// client keeps them as given.
    #[test]
    fn test_role_inversion_of_host_endpoints(
        remote_host in host_strategy(),
        remote_port in 1u16..=u16::MAX,
        local_host in host_strategy(),
        local_port in 1u16..=u16::MAX,
        server in any::<bool>(),
    ) {
        let options = if server { "server" } else { "" };
        let overrides = PluginOptions::from_vars(
            &remote_host,
            &remote_port.to_string(),
            &local_host,
            &local_port.to_string(),
            options,
        )
        .unwrap()
        .unwrap();

        let resolved = OptionMerger::merge(&DeclaredOptions::default(), Some(&overrides)).unwrap();

        if server {
            prop_assert_eq!(resolved.role, Role::Server);
            prop_assert_eq!(&resolved.local_addr, &remote_host);
            prop_assert_eq!(resolved.local_port, remote_port);
            prop_assert_eq!(&resolved.remote_addr, &local_host);
            prop_assert_eq!(resolved.remote_port, local_port);

            // Feeding the swapped endpoints back in swaps them home again.
            let again = PluginOptions::from_vars(
                &resolved.remote_addr,
                &resolved.remote_port.to_string(),
                &resolved.local_addr,
                &resolved.local_port.to_string(),
                "server",
            )
            .unwrap()
            .unwrap();
            let twice = OptionMerger::merge(&DeclaredOptions::default(), Some(&again)).unwrap();
            prop_assert_eq!(&twice.local_addr, &local_host);
            prop_assert_eq!(twice.local_port, local_port);
            prop_assert_eq!(&twice.remote_addr, &remote_host);
            prop_assert_eq!(twice.remote_port, remote_port);
        } else {
            prop_assert_eq!(resolved.role, Role::Client);
            prop_assert_eq!(&resolved.local_addr, &local_host);
            prop_assert_eq!(resolved.local_port, local_port);
            prop_assert_eq!(&resolved.remote_addr, &remote_host);
            prop_assert_eq!(resolved.remote_port, remote_port);
        }
    }

    /// *For any* client QUIC session, TLS is enabled whatever the tls flag
    /// says, and QUIC is never multiplexed.
    #[test]
    fn test_quic_always_carries_tls(
        tls in any::<bool>(),
        host in host_strategy(),
        mux in 0u32..64,
    ) {
        let declared = DeclaredOptions {
            mode: "quic".to_string(),
            tls,
            host,
            mux,
            ..DeclaredOptions::default()
        };

        let config = resolve(&declared, None, &unix_env()).unwrap();
        prop_assert!(config.security().unwrap().is_enabled());
        prop_assert!(config.outbound.sender.as_ref().unwrap().mux.is_none());
    }

    /// *For any* configured buffer size, Windows substitutes its default for
    /// zero, leaves the system default untouched, and passes anything else
    /// through; other platforms always pass the value through.
    #[test]
    fn test_buffer_size_rule(buf_size in prop_oneof![
        Just(0u32),
        Just(SYSTEM_DEFAULT_BUFFER_SIZE),
        any::<u32>(),
    ]) {
        let windows = socket::effective_buffer_size(buf_size, PlatformFamily::Windows);
        let expected = match buf_size {
            0 => WINDOWS_DEFAULT_BUFFER_SIZE,
            SYSTEM_DEFAULT_BUFFER_SIZE => 0,
            other => other,
        };
        prop_assert_eq!(windows, expected);
        prop_assert_eq!(socket::effective_buffer_size(buf_size, PlatformFamily::Unix), buf_size);

        let tuning = socket::resolve(false, 0, buf_size, PlatformFamily::Windows);
        prop_assert_eq!(tuning.is_some(), expected != 0);
    }

    /// *For any* one to three fingerprints, slots are filled in order and
    /// the remainder stays empty; a fourth fingerprint is rejected.
    #[test]
    fn test_fingerprint_slots_keep_order(
        pins in prop::collection::vec(fingerprint_strategy(), 1..=PINNED_FINGERPRINT_SLOTS),
        extra in fingerprint_strategy(),
    ) {
        let set: PinnedFingerprintSet = pins.join("#").parse().unwrap();
        for (i, slot) in set.slots().iter().enumerate() {
            match pins.get(i) {
                Some(pin) => prop_assert_eq!(slot, pin),
                None => prop_assert!(slot.is_empty()),
            }
        }

        let mut overflow = vec![extra; PINNED_FINGERPRINT_SLOTS + 1];
        overflow[0] = pins[0].clone();
        prop_assert!(overflow.join("#").parse::<PinnedFingerprintSet>().is_err());
    }

    /// *For any* key/value pair, escaping the delimiters yields a string that
    /// parses back to the same pair.
    #[test]
    fn test_escaped_options_parse_back(
        key in "[a-z]{1,12}",
        value in option_value_strategy(),
        bare in "[a-z]{1,12}",
    ) {
        let text = format!("{}={};{}", escape_option(&key), escape_option(&value), bare);
        let parsed = PluginOptions::parse(&text).unwrap();

        // Lookups return the first occurrence of a repeated key.
        prop_assert_eq!(parsed.get(&key), Some(value.as_str()));
        prop_assert!(parsed.contains(&bare));
        if key != bare {
            prop_assert_eq!(parsed.get(&bare), Some("1"));
        }
    }

    /// *For any* list of listen addresses, a server opens one inbound per
    /// address, all on the same port.
    #[test]
    fn test_server_inbound_per_listen_address(
        addrs in prop::collection::vec(host_strategy(), 1..5),
        port in 1u16..=u16::MAX,
    ) {
        let declared = DeclaredOptions {
            server: true,
            local_addr: addrs.join("|"),
            local_port: port.to_string(),
            ..DeclaredOptions::default()
        };
        let opts = OptionMerger::merge(&declared, None).unwrap();
        let config = crate::resolve_options(&opts, &unix_env()).unwrap();

        prop_assert_eq!(config.inbounds.len(), addrs.len());
        for (inbound, addr) in config.inbounds.iter().zip(&addrs) {
            prop_assert_eq!(&inbound.listen.to_string(), addr);
            prop_assert_eq!(inbound.port, port);
        }
    }
}
