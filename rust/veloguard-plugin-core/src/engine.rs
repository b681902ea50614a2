//! Seam to the external proxy engine.
//!
//! The resolved configuration is moved into the engine; nothing here touches
//! it afterwards.

use crate::config::ResolvedConfig;
use crate::error::{Error, Result};

/// A proxy engine that consumes a [`ResolvedConfig`].
pub trait ProxyEngine {
    type Error: std::error::Error + Send + Sync + 'static;

    fn start(&mut self) -> std::result::Result<(), Self::Error>;

    fn close(&mut self) -> std::result::Result<(), Self::Error>;
}

/// Engine that has been started. Dropping it closes the engine; a close
/// failure is only reported.
pub struct RunningEngine<E: ProxyEngine> {
    engine: Option<E>,
}

impl<E: ProxyEngine> RunningEngine<E> {
    pub fn engine(&self) -> Option<&E> {
        self.engine.as_ref()
    }

    pub fn shutdown(mut self) {
        self.close();
    }

    fn close(&mut self) {
        if let Some(mut engine) = self.engine.take() {
            match engine.close() {
                Ok(()) => tracing::info!("Proxy engine closed"),
                Err(e) => tracing::warn!("Failed to close proxy engine: {}", e),
            }
        }
    }
}

impl<E: ProxyEngine> Drop for RunningEngine<E> {
    fn drop(&mut self) {
        self.close();
    }
}

/// Construct an engine from `config` and start it.
///
/// Construction failures map to [`Error::EngineConstruction`], start
/// failures to [`Error::EngineStart`].
pub fn launch<E, F>(config: ResolvedConfig, create: F) -> Result<RunningEngine<E>>
where
    E: ProxyEngine,
    F: FnOnce(ResolvedConfig) -> std::result::Result<E, E::Error>,
{
    let mut engine =
        create(config).map_err(|e| Error::engine_construction("failed to create proxy engine", e))?;

    engine
        .start()
        .map_err(|e| Error::engine_start("failed to start server", e))?;

    Ok(RunningEngine {
        engine: Some(engine),
    })
}
