mod handoff;

use anyhow::Result;
use clap::Parser;
use handoff::{ConfigHandoff, HandoffTarget};
use std::path::PathBuf;
use veloguard_plugin_core::{
    launch, logging, DeclaredOptions, Error, LogLevel, NativePlatform, PlatformSocket,
    PluginOptions, ResolveEnv,
};

/// VeloGuard SIP003 plugin
#[derive(Parser, Debug)]
#[command(name = "veloguard-plugin", disable_version_flag = true, long_about = None)]
struct Args {
    #[command(flatten)]
    options: DeclaredOptions,

    /// Print the resolved configuration and exit
    #[arg(long = "dump-config")]
    dump_config: bool,

    /// Write the resolved configuration to this file instead of stdout
    #[arg(long)]
    handoff: Option<PathBuf>,
}

#[cfg(unix)]
async fn wait_for_signal(shutdown_tx: tokio::sync::mpsc::Sender<()>) {
    use futures::StreamExt;
    if let Ok(mut signals) = signal_hook_tokio::Signals::new([
        signal_hook::consts::SIGINT,
        signal_hook::consts::SIGTERM,
    ]) {
        if signals.next().await.is_some() {
            let _ = shutdown_tx.send(()).await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal(shutdown_tx: tokio::sync::mpsc::Sender<()>) {
    if tokio::signal::ctrl_c().await.is_ok() {
        let _ = shutdown_tx.send(()).await;
    }
}

fn fail(error: Error) -> ! {
    logging::log_error(&error, None);
    std::process::exit(error.exit_status());
}

fn print_version() {
    println!(
        "veloguard-plugin {} ({} {})",
        veloguard_plugin_core::VERSION,
        std::env::consts::OS,
        std::env::consts::ARCH
    );
}

/// Read the host overrides and set up logging. Logging is configured from
/// the level the merge will settle on, so warnings raised while merging are
/// visible.
fn load_overrides(declared: &DeclaredOptions) -> Option<PluginOptions> {
    let (overrides, env_error) = match PluginOptions::from_env() {
        Ok(overrides) => (overrides, None),
        Err(e) => (None, Some(e)),
    };

    let level = overrides
        .as_ref()
        .and_then(|o| o.get("loglevel"))
        .unwrap_or(declared.log_level.as_str());
    if let Err(e) = logging::init_logging(LogLevel::parse(level)) {
        eprintln!("failed to initialize logging: {}", e);
    }

    if let Some(e) = env_error {
        tracing::warn!("Ignoring host plugin options: {}", e);
    }
    logging::log_option_sources(overrides.as_ref().map(PluginOptions::len));
    overrides
}

fn report_socket_buffers(platform: &NativePlatform) {
    let socket = match socket2::Socket::new(socket2::Domain::IPV4, socket2::Type::STREAM, None) {
        Ok(socket) => socket,
        Err(e) => {
            tracing::debug!("Cannot probe socket buffers: {}", e);
            return;
        }
    };
    match platform.recv_buffer_size(&socket) {
        Ok(size) => tracing::debug!("Default SO_RCVBUF is {} bytes", size),
        Err(e) => tracing::debug!("Cannot read SO_RCVBUF: {}", e),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.options.version {
        print_version();
        return Ok(());
    }

    let overrides = load_overrides(&args.options);
    let platform = NativePlatform;

    if let Err(e) = platform.lower_process_priority() {
        tracing::warn!("Failed to lower process priority: {}", e);
    }

    let config = veloguard_plugin_core::resolve(&args.options, overrides.as_ref(), &ResolveEnv::detect())
        .unwrap_or_else(|e| fail(e));

    if config.tunes_buffers() {
        report_socket_buffers(&platform);
    }

    if args.dump_config {
        let yaml = config.to_yaml().unwrap_or_else(|e| fail(e));
        print!("{}", yaml);
        return Ok(());
    }

    let role = config.role;
    let target = HandoffTarget::from_path(args.handoff);
    let destination = target.to_string();
    let running =
        launch(config, |config| ConfigHandoff::new(config, target)).unwrap_or_else(|e| fail(e));

    logging::log_started(role, &destination);

    let (shutdown_tx, mut shutdown_rx) = tokio::sync::mpsc::channel(1);
    tokio::spawn(wait_for_signal(shutdown_tx));
    shutdown_rx.recv().await;

    tracing::info!("Shutting down");
    running.shutdown();
    Ok(())
}
