//! # Contexto Compartido del Servidor
//! src/server/context.rs
//!
//! Estado de sólo lectura (más el flag de shutdown) que comparten el
//! listener y todos los workers a través de un `Arc`.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::http::Persistence;
use crate::security::SecurityValidator;
use crate::upload::UploadStore;

pub struct ServerContext {
    /// Directorio de recursos, canonicalizado
    root: PathBuf,

    validator: SecurityValidator,
    uploads: UploadStore,

    max_request_bytes: usize,
    keep_alive_timeout: Duration,
    max_requests: usize,

    shutting_down: Arc<AtomicBool>,
}

impl ServerContext {
    /// Prepara el directorio de recursos (y `uploads/`) para el puerto efectivo
    pub fn new(config: &Config, port: u16) -> io::Result<Self> {
        std::fs::create_dir_all(&config.root)?;
        let root = config.root.canonicalize()?;
        let uploads = UploadStore::new(&root)?;

        Ok(Self {
            root,
            validator: SecurityValidator::new(&config.host, port),
            uploads,
            max_request_bytes: config.max_request_bytes,
            keep_alive_timeout: config.keep_alive_timeout(),
            max_requests: config.max_requests_per_connection,
            shutting_down: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn validator(&self) -> &SecurityValidator {
        &self.validator
    }

    pub fn uploads(&self) -> &UploadStore {
        &self.uploads
    }

    pub fn max_request_bytes(&self) -> usize {
        self.max_request_bytes
    }

    pub fn keep_alive_timeout(&self) -> Duration {
        self.keep_alive_timeout
    }

    pub fn max_requests(&self) -> usize {
        self.max_requests
    }

    /// Headers `Connection`/`Keep-Alive` para una conexión que persiste
    pub fn keep_alive(&self) -> Persistence {
        Persistence::KeepAlive {
            timeout_secs: self.keep_alive_timeout.as_secs(),
            max_requests: self.max_requests,
        }
    }

    pub fn shutdown_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutting_down)
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::SeqCst)
    }
}
