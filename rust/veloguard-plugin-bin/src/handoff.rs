//! Engine that hands the resolved configuration to an external proxy
//! process, either through a file or on stdout.

use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use veloguard_plugin_core::{ProxyEngine, ResolvedConfig};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandoffTarget {
    Stdout,
    File(PathBuf),
}

impl HandoffTarget {
    pub fn from_path(path: Option<PathBuf>) -> Self {
        path.map_or(HandoffTarget::Stdout, HandoffTarget::File)
    }
}

impl fmt::Display for HandoffTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandoffTarget::Stdout => f.write_str("stdout"),
            HandoffTarget::File(path) => write!(f, "{}", path.display()),
        }
    }
}

pub struct ConfigHandoff {
    config: ResolvedConfig,
    target: HandoffTarget,
    published: bool,
}

impl ConfigHandoff {
    /// Fails when the target file could never be written, so the error is
    /// reported as a configuration problem rather than a start failure.
    pub fn new(config: ResolvedConfig, target: HandoffTarget) -> io::Result<Self> {
        if let HandoffTarget::File(path) = &target {
            let parent = path.parent().filter(|p| !p.as_os_str().is_empty());
            if let Some(parent) = parent {
                if !parent.is_dir() {
                    return Err(io::Error::new(
                        io::ErrorKind::NotFound,
                        format!("handoff directory does not exist: {}", parent.display()),
                    ));
                }
            }
        }

        Ok(Self {
            config,
            target,
            published: false,
        })
    }

    pub fn config(&self) -> &ResolvedConfig {
        &self.config
    }

    fn render(&self) -> io::Result<String> {
        self.config
            .to_yaml()
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))
    }
}

/// Owner-only mode for the handoff file; a server tree carries its TLS key.
#[cfg(unix)]
const HANDOFF_FILE_MODE: u32 = 0o600;

/// Write through a sibling temp file so readers never see a partial config.
/// The temp file is removed if anything fails before it is renamed.
fn write_private(path: &Path, contents: &str) -> io::Result<()> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let mut file = tempfile::Builder::new()
        .prefix(".veloguard-handoff")
        .tempfile_in(dir)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.as_file()
            .set_permissions(fs::Permissions::from_mode(HANDOFF_FILE_MODE))?;
    }

    file.write_all(contents.as_bytes())?;
    file.as_file().sync_all()?;
    file.persist(path).map_err(|e| e.error)?;
    Ok(())
}

impl ProxyEngine for ConfigHandoff {
    type Error = io::Error;

    fn start(&mut self) -> io::Result<()> {
        let yaml = self.render()?;
        match &self.target {
            HandoffTarget::Stdout => {
                let mut stdout = io::stdout().lock();
                stdout.write_all(yaml.as_bytes())?;
                stdout.flush()?;
            }
            HandoffTarget::File(path) => {
                write_private(path, &yaml)?;
                tracing::info!("Configuration handed off to {}", path.display());
            }
        }
        self.published = true;
        Ok(())
    }

    fn close(&mut self) -> io::Result<()> {
        if !std::mem::take(&mut self.published) {
            return Ok(());
        }
        match &self.target {
            HandoffTarget::Stdout => Ok(()),
            HandoffTarget::File(path) => match fs::remove_file(path) {
                Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
                _ => Ok(()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use veloguard_plugin_core::{launch, DeclaredOptions, OptionMerger, ResolveEnv};

    fn config() -> ResolvedConfig {
        let opts = OptionMerger::merge(&DeclaredOptions::default(), None).unwrap();
        veloguard_plugin_core::resolve_options(&opts, &ResolveEnv::detect()).unwrap()
    }

    #[test]
    fn test_file_handoff_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.yaml");
        let target = HandoffTarget::from_path(Some(path.clone()));

        let running = launch(config(), |c| ConfigHandoff::new(c, target)).unwrap();
        let written = fs::read_to_string(&path).unwrap();
        assert!(written.contains("role: client"));
        assert!(written.contains("port: 1984"));
        assert!(running.engine().unwrap().config().inbounds.len() == 1);

        running.shutdown();
        assert!(!path.exists());
    }

    #[test]
    fn test_missing_directory_is_construction_error() {
        let dir = tempfile::tempdir().unwrap();
        let target = HandoffTarget::File(dir.path().join("missing").join("engine.yaml"));

        let err = launch(config(), |c| ConfigHandoff::new(c, target))
            .err()
            .unwrap();
        assert_eq!(err.exit_status(), veloguard_plugin_core::EXIT_CONFIG_ERROR);
    }

    #[test]
    fn test_unwritable_target_is_start_error() {
        let dir = tempfile::tempdir().unwrap();
        // A directory in place of the file makes the final rename fail.
        let path = dir.path().join("occupied");
        fs::create_dir(&path).unwrap();
        fs::write(path.join("keep"), b"x").unwrap();

        let err = launch(config(), |c| {
            ConfigHandoff::new(c, HandoffTarget::File(path.clone()))
        })
        .err()
        .unwrap();
        assert_eq!(err.exit_status(), veloguard_plugin_core::EXIT_FAILURE);

        let left: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(left, ["occupied"]);
    }

    #[cfg(unix)]
    #[test]
    fn test_server_tls_handoff_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let cert = dir.path().join("chain.pem");
        let key = dir.path().join("key.pem");
        fs::write(&cert, b"CHAIN").unwrap();
        fs::write(&key, b"SECRET").unwrap();

        let declared = DeclaredOptions {
            server: true,
            tls: true,
            cert: cert.display().to_string(),
            key: key.display().to_string(),
            ..DeclaredOptions::default()
        };
        let opts = OptionMerger::merge(&declared, None).unwrap();
        let config = veloguard_plugin_core::resolve_options(&opts, &ResolveEnv::detect()).unwrap();

        let path = dir.path().join("engine.yaml");
        let running = launch(config, |c| {
            ConfigHandoff::new(c, HandoffTarget::File(path.clone()))
        })
        .unwrap();

        assert!(fs::read_to_string(&path).unwrap().contains("SECRET"));
        let mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o600);

        running.shutdown();
        assert!(!path.exists());
    }

    #[test]
    fn test_stdout_target_default() {
        assert_eq!(HandoffTarget::from_path(None), HandoffTarget::Stdout);
        assert_eq!(HandoffTarget::Stdout.to_string(), "stdout");
    }
}
