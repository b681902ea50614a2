//! TLS policy resolution
//!
//! A server terminates TLS with a certificate and key, by default the ones
//! issued by acme.sh for the configured host. A client always goes through a
//! mimicry layer that randomizes its ClientHello, optionally pinning a trust
//! anchor or certificate chain fingerprints.

use crate::error::{Error, Result};
use crate::options::{ResolvedOptions, Role};
use serde::{Serialize, Serializer};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub const PEM_CERT_HEAD: &str = "-----BEGIN CERTIFICATE-----";
pub const PEM_CERT_TAIL: &str = "-----END CERTIFICATE-----";

/// Client identity the mimicry layer imitates.
pub const MIMICRY_RANDOMIZED: &str = "randomized";

/// Number of chain fingerprints that can be pinned.
pub const PINNED_FINGERPRINT_SLOTS: usize = 3;

const FINGERPRINT_DELIMITER: char = '#';

/// Where a certificate comes from. A path wins over an inline body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CertificateSource {
    File(PathBuf),
    /// Base64 body without PEM markers, as passed by Android hosts.
    Inline(String),
}

impl CertificateSource {
    pub fn select(path: Option<&str>, inline: Option<&str>) -> Option<Self> {
        match (path, inline) {
            (Some(path), _) => Some(Self::File(PathBuf::from(path))),
            (None, Some(body)) => Some(Self::Inline(body.to_string())),
            (None, None) => None,
        }
    }

    pub fn load(&self) -> Result<Vec<u8>> {
        match self {
            Self::File(path) => read_file("failed to read cert", path),
            Self::Inline(body) => {
                Ok(format!("{}\n{}\n{}", PEM_CERT_HEAD, body, PEM_CERT_TAIL).into_bytes())
            }
        }
    }
}

/// Load a certificate from whichever source is configured.
pub fn read_certificate(source: Option<&CertificateSource>) -> Result<Vec<u8>> {
    match source {
        Some(source) => source.load(),
        None => Err(Error::certificate("no certificate source configured")),
    }
}

fn read_file(context: &str, path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path)
        .map_err(|e| Error::certificate_read(format!("{}: {}", context, path.display()), path, e))
}

/// `~/.acme.sh/<host>/fullchain.cer`
pub fn default_cert_path(home: &Path, host: &str) -> PathBuf {
    home.join(".acme.sh").join(host).join("fullchain.cer")
}

/// `~/.acme.sh/<host>/<host>.key`
pub fn default_key_path(home: &Path, host: &str) -> PathBuf {
    home.join(".acme.sh").join(host).join(format!("{}.key", host))
}

/// Certificate chain and private key for a listening side.
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct CertificateMaterial {
    #[serde(serialize_with = "serialize_pem")]
    pub certificate: Vec<u8>,
    #[serde(serialize_with = "serialize_pem")]
    pub key: Vec<u8>,
}

impl fmt::Debug for CertificateMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CertificateMaterial")
            .field("certificate", &format_args!("{} bytes", self.certificate.len()))
            .field("key", &format_args!("<redacted {} bytes>", self.key.len()))
            .finish()
    }
}

fn serialize_pem<S: Serializer>(bytes: &[u8], serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(&String::from_utf8_lossy(bytes))
}

fn serialize_pem_opt<S: Serializer>(
    bytes: &Option<Vec<u8>>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    match bytes {
        Some(bytes) => serialize_pem(bytes, serializer),
        None => serializer.serialize_none(),
    }
}

/// Fixed set of pinned certificate chain SHA-256 fingerprints. Unused slots
/// are empty.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(transparent)]
pub struct PinnedFingerprintSet([String; PINNED_FINGERPRINT_SLOTS]);

impl PinnedFingerprintSet {
    pub fn slots(&self) -> &[String; PINNED_FINGERPRINT_SLOTS] {
        &self.0
    }

    /// Non-empty fingerprints in order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str).filter(|s| !s.is_empty())
    }
}

impl FromStr for PinnedFingerprintSet {
    type Err = Error;

    /// More than [`PINNED_FINGERPRINT_SLOTS`] segments is rejected.
    fn from_str(s: &str) -> Result<Self> {
        let segments: Vec<&str> = s.split(FINGERPRINT_DELIMITER).collect();
        if segments.len() > PINNED_FINGERPRINT_SLOTS {
            crate::bail_config!(
                "too many pinned fingerprints: got {}, at most {} are supported",
                segments.len(),
                PINNED_FINGERPRINT_SLOTS
            );
        }

        let mut slots: [String; PINNED_FINGERPRINT_SLOTS] = Default::default();
        for (slot, segment) in slots.iter_mut().zip(segments) {
            *slot = segment.to_string();
        }
        Ok(Self(slots))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServerTls {
    pub server_name: String,
    pub certificate: CertificateMaterial,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClientTls {
    pub server_name: String,
    pub imitate: String,
    /// Certificate used to verify the server's authority.
    #[serde(serialize_with = "serialize_pem_opt")]
    pub trust_anchor: Option<Vec<u8>>,
    pub allow_insecure: bool,
    pub allow_insecure_if_pinned: bool,
    pub pinned_peer_chain_sha256: Option<PinnedFingerprintSet>,
}

impl ClientTls {
    pub fn new<S: Into<String>>(server_name: S) -> Self {
        Self {
            server_name: server_name.into(),
            imitate: MIMICRY_RANDOMIZED.to_string(),
            trust_anchor: None,
            allow_insecure: false,
            allow_insecure_if_pinned: false,
            pinned_peer_chain_sha256: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TlsPolicy {
    #[default]
    Disabled,
    ServerTerminated(ServerTls),
    ClientMimicry(ClientTls),
}

impl TlsPolicy {
    pub fn is_enabled(&self) -> bool {
        !matches!(self, TlsPolicy::Disabled)
    }
}

/// Resolves the TLS policy for one session.
pub struct TlsResolver<'a> {
    opts: &'a ResolvedOptions,
    home_dir: Option<&'a Path>,
}

impl<'a> TlsResolver<'a> {
    /// `home_dir` is only consulted when a server has no explicit certificate
    /// or key path.
    pub fn new(opts: &'a ResolvedOptions, home_dir: Option<&'a Path>) -> Self {
        Self { opts, home_dir }
    }

    /// `forced` is set by transports that cannot run without TLS.
    pub fn resolve(&self, forced: bool) -> Result<TlsPolicy> {
        if !(self.opts.tls || forced) {
            return Ok(TlsPolicy::Disabled);
        }

        match self.opts.role {
            Role::Server => self.resolve_server().map(TlsPolicy::ServerTerminated),
            Role::Client => self.resolve_client().map(TlsPolicy::ClientMimicry),
        }
    }

    fn resolve_server(&self) -> Result<ServerTls> {
        let host = &self.opts.host;

        let cert_source = match CertificateSource::select(
            self.opts.cert.as_deref(),
            self.opts.cert_raw.as_deref(),
        ) {
            Some(source) => source,
            None => {
                let path = default_cert_path(self.home()?, host);
                tracing::warn!("No TLS cert specified, trying {}", path.display());
                CertificateSource::File(path)
            }
        };
        let certificate = read_certificate(Some(&cert_source))?;

        let key_path = match self.opts.key.as_deref() {
            Some(path) => PathBuf::from(path),
            None => {
                let path = default_key_path(self.home()?, host);
                tracing::warn!("No TLS key specified, trying {}", path.display());
                path
            }
        };
        let key = read_file("failed to read key file", &key_path)?;

        Ok(ServerTls {
            server_name: host.clone(),
            certificate: CertificateMaterial { certificate, key },
        })
    }

    fn resolve_client(&self) -> Result<ClientTls> {
        let mut tls = ClientTls::new(self.opts.host.clone());

        if let Some(source) =
            CertificateSource::select(self.opts.cert.as_deref(), self.opts.cert_raw.as_deref())
        {
            tls.trust_anchor = Some(read_certificate(Some(&source))?);
        }

        if self.opts.insecure {
            tls.allow_insecure = true;
            tls.allow_insecure_if_pinned = true;
        }

        if let Some(pins) = self.opts.pinned_sha256.as_deref() {
            tls.pinned_peer_chain_sha256 = Some(pins.parse()?);
        }

        Ok(tls)
    }

    fn home(&self) -> Result<&'a Path> {
        match self.home_dir {
            Some(home) => Ok(home),
            None => crate::bail_certificate!(
                "cannot determine home directory for default certificate path of {}",
                self.opts.host
            ),
        }
    }
}
