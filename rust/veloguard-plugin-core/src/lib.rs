#[macro_use]
pub mod macros;
pub mod assembler;
pub mod config;
pub mod engine;
pub mod error;
pub mod logging;
pub mod options;
pub mod platform;
pub mod socket;
pub mod tls;
pub mod transport;

#[cfg(test)]
mod tests;

/// Plugin version, generated from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use assembler::ConfigAssembler;
pub use config::ResolvedConfig;
pub use engine::{launch, ProxyEngine, RunningEngine};
pub use error::*;
pub use options::{DeclaredOptions, LogLevel, OptionMerger, PluginOptions, ResolvedOptions, Role};
pub use platform::{NativePlatform, PlatformFamily, PlatformSocket};
pub use tls::TlsPolicy;
pub use transport::TransportKind;

use std::path::PathBuf;

/// Host facts the resolvers depend on.
#[derive(Debug, Clone)]
pub struct ResolveEnv {
    pub home_dir: Option<PathBuf>,
    pub platform: PlatformFamily,
}

impl ResolveEnv {
    pub fn detect() -> Self {
        Self {
            home_dir: dirs::home_dir(),
            platform: PlatformFamily::current(),
        }
    }
}

/// Merge both option sources and resolve them into the engine configuration.
pub fn resolve(
    declared: &DeclaredOptions,
    overrides: Option<&PluginOptions>,
    env: &ResolveEnv,
) -> Result<ResolvedConfig> {
    let timer = logging::StageTimer::start("merge");
    let opts = OptionMerger::merge(declared, overrides)?;
    timer.finish();

    let timer = logging::StageTimer::start("resolve");
    let config = resolve_options(&opts, env)?;
    timer.finish();
    Ok(config)
}

/// Resolve already-merged options.
pub fn resolve_options(opts: &ResolvedOptions, env: &ResolveEnv) -> Result<ResolvedConfig> {
    let transport = transport::resolve(opts)?;
    let security = tls::TlsResolver::new(opts, env.home_dir.as_deref())
        .resolve(transport.kind().forces_tls())?;
    let socket = socket::resolve_for(opts, env.platform);

    Ok(ConfigAssembler::new(opts, transport, security, socket).assemble())
}
