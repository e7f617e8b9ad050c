//! Sandboxed module loading.
//!
//! The loader turns a directory of `.js` files into a [`Registry`]. Each
//! candidate is instantiated on its own watchdog thread so a module that
//! hangs during initialization only costs its time budget; an expired load
//! is abandoned and reported, never retried. Loading is fail-soft per
//! module: a broken or slow module is omitted and its siblings still load.

use std::path::Path;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use apiary_common::{ApiaryError, Result};

use crate::capabilities::CapabilitySet;
use crate::registry::{Registry, ServiceDefinition};
use crate::sandbox::ServiceContext;

/// Loader configuration.
///
/// `timeout` bounds each module's initialization; `display_errors` controls
/// whether the full underlying cause of a failed load is surfaced to the
/// host log or only a one-line warning.
#[derive(Debug, Clone, PartialEq)]
pub struct LoaderConfig {
    pub timeout: Duration,
    pub display_errors: bool,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(5000),
            display_errors: false,
        }
    }
}

impl LoaderConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_display_errors(mut self, display_errors: bool) -> Self {
        self.display_errors = display_errors;
        self
    }

    /// Rejects budgets that are zero or over an hour.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.timeout.is_zero() {
            return Err("load timeout must be greater than zero".to_string());
        }
        if self.timeout.as_secs() > 3600 {
            return Err(format!(
                "load timeout must be <= 1 hour (got {} seconds)",
                self.timeout.as_secs()
            ));
        }
        Ok(())
    }
}

pub struct Loader {
    capabilities: CapabilitySet,
    config: LoaderConfig,
}

impl Loader {
    pub fn new(capabilities: CapabilitySet, config: LoaderConfig) -> Self {
        Loader { capabilities, config }
    }

    /// Load every `.js` module in `dir` into a registry.
    ///
    /// Non-matching directory entries are skipped, not errored. Only the
    /// directory read itself can fail the whole pass.
    pub fn load_dir(&self, dir: &Path) -> Result<Registry> {
        let mut definitions = Vec::new();

        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some("js") {
                continue;
            }
            let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };

            match self.load_module(name, &path) {
                Ok(definition) => {
                    tracing::info!(
                        "service '{}' loaded with methods {:?}",
                        definition.name(),
                        definition.methods()
                    );
                    definitions.push(definition);
                }
                Err(e) => self.report_failure(name, &e),
            }
        }

        Ok(Registry::from_definitions(definitions))
    }

    fn load_module(&self, name: &str, path: &Path) -> Result<ServiceDefinition> {
        let source: Arc<str> = std::fs::read_to_string(path)
            .map_err(|e| ApiaryError::LoadError {
                module: name.to_string(),
                cause: format!("failed to read source: {e}"),
            })?
            .into();

        let (tx, rx) = mpsc::channel();
        let watched_source = Arc::clone(&source);
        let capabilities = self.capabilities.clone();

        thread::Builder::new()
            .name(format!("load-{name}"))
            .spawn(move || {
                let outcome = ServiceContext::instantiate(&watched_source, &capabilities)
                    .and_then(|mut ctx| ctx.method_names());
                // The receiver is gone if the budget already expired.
                let _ = tx.send(outcome);
            })
            .map_err(|e| ApiaryError::LoadError {
                module: name.to_string(),
                cause: format!("failed to spawn initialization thread: {e}"),
            })?;

        match rx.recv_timeout(self.config.timeout) {
            Ok(Ok(methods)) => Ok(ServiceDefinition::new(name.to_string(), source, methods)),
            Ok(Err(e)) => Err(ApiaryError::LoadError {
                module: name.to_string(),
                cause: e.to_string(),
            }),
            Err(RecvTimeoutError::Timeout) => Err(ApiaryError::LoadTimeout {
                module: name.to_string(),
                timeout_ms: self.config.timeout.as_millis() as u64,
            }),
            Err(RecvTimeoutError::Disconnected) => Err(ApiaryError::LoadError {
                module: name.to_string(),
                cause: "initialization thread panicked".into(),
            }),
        }
    }

    fn report_failure(&self, name: &str, error: &ApiaryError) {
        if self.config.display_errors {
            tracing::error!("module '{name}' not loaded: {error}");
        } else {
            tracing::warn!("module '{name}' not loaded");
        }
    }
}
