//! # Configuración del Servidor
//! src/config.rs
//!
//! Configuración del servidor HTTP con soporte para argumentos CLI y
//! variables de entorno.
//!
//! ## Ejemplos de uso
//!
//! ### CLI
//! ```bash
//! ./mt_http_server 8080 127.0.0.1 10 \
//!   --root ./resources \
//!   --queue-capacity 50 \
//!   --keep-alive-timeout 30
//! ```
//!
//! ### Variables de entorno
//! ```bash
//! HTTP_PORT=8080 HTTP_HOST=0.0.0.0 RESOURCE_ROOT=/srv/www ./mt_http_server
//! ```

use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

/// Configuración del servidor HTTP/1.1
#[derive(Debug, Clone, Parser)]
#[command(name = "mt_http_server")]
#[command(about = "Servidor HTTP/1.1 concurrente con pool de threads")]
#[command(version)]
pub struct Config {
    /// Puerto en el que escucha el servidor
    #[arg(default_value = "8080", env = "HTTP_PORT")]
    pub port: u16,

    /// Host/IP en el que escucha
    #[arg(default_value = "127.0.0.1", env = "HTTP_HOST")]
    pub host: String,

    /// Número de workers del pool
    #[arg(default_value = "10", env = "HTTP_THREADS")]
    pub threads: usize,

    /// Directorio de recursos servidos por GET (uploads/ vive adentro)
    #[arg(long, default_value = "resources", env = "RESOURCE_ROOT")]
    pub root: PathBuf,

    // === Colas y sockets ===

    /// Conexiones aceptadas que pueden esperar un worker libre
    #[arg(long = "queue-capacity", default_value = "50", env = "QUEUE_CAPACITY")]
    pub queue_capacity: usize,

    /// Backlog del socket de escucha
    #[arg(long, default_value = "50", env = "LISTEN_BACKLOG")]
    pub backlog: i32,

    // === Límites por conexión ===

    /// Tamaño máximo de un request (headers + body) en bytes
    #[arg(long = "max-request-bytes", default_value = "8192", env = "MAX_REQUEST_BYTES")]
    pub max_request_bytes: usize,

    /// Segundos de inactividad antes de cerrar una conexión persistente
    #[arg(long = "keep-alive-timeout", default_value = "30", env = "KEEP_ALIVE_TIMEOUT")]
    pub keep_alive_timeout_secs: u64,

    /// Requests máximos por conexión
    #[arg(long = "max-requests", default_value = "100", env = "MAX_REQUESTS")]
    pub max_requests_per_connection: usize,

    // === Logging ===

    /// Filtro de logging (RUST_LOG tiene prioridad)
    #[arg(long = "log-level", default_value = "info", env = "LOG_LEVEL")]
    pub log_level: String,
}

impl Config {
    /// Crea una nueva configuración parseando argumentos CLI
    pub fn new() -> Self {
        Config::parse()
    }

    /// Obtiene la dirección completa para bind (host:port)
    ///
    /// # Ejemplo
    /// ```rust
    /// use mt_http_server::config::Config;
    ///
    /// let config = Config::default();
    /// assert_eq!(config.address(), "127.0.0.1:8080");
    /// ```
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Timeout de inactividad como `Duration`
    pub fn keep_alive_timeout(&self) -> Duration {
        Duration::from_secs(self.keep_alive_timeout_secs)
    }

    /// Valida la configuración
    ///
    /// Retorna errores si hay valores inválidos
    pub fn validate(&self) -> Result<(), String> {
        if self.threads == 0 {
            return Err("Thread pool size must be >= 1".to_string());
        }
        if self.queue_capacity == 0 {
            return Err("Queue capacity must be >= 1".to_string());
        }
        if self.backlog <= 0 {
            return Err("Listen backlog must be >= 1".to_string());
        }
        if self.max_request_bytes == 0 {
            return Err("Max request bytes must be >= 1".to_string());
        }
        if self.keep_alive_timeout_secs == 0 {
            return Err("Keep-alive timeout must be > 0".to_string());
        }
        if self.max_requests_per_connection == 0 {
            return Err("Max requests per connection must be >= 1".to_string());
        }
        Ok(())
    }

    /// Loguea un resumen de la configuración
    pub fn print_summary(&self) {
        tracing::info!(address = %self.address(), root = %self.root.display(), "red");
        tracing::info!(
            threads = self.threads,
            queue_capacity = self.queue_capacity,
            backlog = self.backlog,
            "pool de workers"
        );
        tracing::info!(
            max_request_bytes = self.max_request_bytes,
            keep_alive_timeout_secs = self.keep_alive_timeout_secs,
            max_requests = self.max_requests_per_connection,
            "límites por conexión"
        );
    }
}

impl Default for Config {
    /// Configuración por defecto
    fn default() -> Self {
        Self {
            port: 8080,
            host: "127.0.0.1".to_string(),
            threads: 10,
            root: PathBuf::from("resources"),
            queue_capacity: 50,
            backlog: 50,
            max_request_bytes: 8192,
            keep_alive_timeout_secs: 30,
            max_requests_per_connection: 100,
            log_level: "info".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.port, 8080);
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.threads, 10);
        assert_eq!(config.queue_capacity, 50);
        assert_eq!(config.backlog, 50);
        assert_eq!(config.max_request_bytes, 8192);
        assert_eq!(config.keep_alive_timeout(), Duration::from_secs(30));
        assert_eq!(config.max_requests_per_connection, 100);
    }

    #[test]
    fn test_address_custom() {
        let mut config = Config::default();
        config.host = "0.0.0.0".to_string();
        config.port = 3000;
        assert_eq!(config.address(), "0.0.0.0:3000");
    }

    // ==================== CLI ====================

    #[test]
    fn test_cli_defaults_match_default() {
        let parsed = Config::try_parse_from(["mt_http_server"]).unwrap();
        let default = Config::default();

        assert_eq!(parsed.port, default.port);
        assert_eq!(parsed.host, default.host);
        assert_eq!(parsed.threads, default.threads);
        assert_eq!(parsed.root, default.root);
    }

    #[test]
    fn test_cli_positional_arguments() {
        let config = Config::try_parse_from(["mt_http_server", "9000", "0.0.0.0", "4"]).unwrap();

        assert_eq!(config.port, 9000);
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.threads, 4);
    }

    #[test]
    fn test_cli_flags() {
        let config = Config::try_parse_from([
            "mt_http_server",
            "--root",
            "/srv/www",
            "--max-requests",
            "5",
            "--keep-alive-timeout",
            "2",
        ])
        .unwrap();

        assert_eq!(config.root, PathBuf::from("/srv/www"));
        assert_eq!(config.max_requests_per_connection, 5);
        assert_eq!(config.keep_alive_timeout_secs, 2);
    }

    #[test]
    fn test_cli_rejects_non_numeric_port() {
        assert!(Config::try_parse_from(["mt_http_server", "abc"]).is_err());
    }

    // ==================== Validation ====================

    #[test]
    fn test_validate_success() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_validate_invalid_threads() {
        let mut config = Config::default();
        config.threads = 0;
        assert!(config.validate().unwrap_err().contains("Thread pool"));
    }

    #[test]
    fn test_validate_invalid_queue_capacity() {
        let mut config = Config::default();
        config.queue_capacity = 0;
        assert!(config.validate().unwrap_err().contains("Queue capacity"));
    }

    #[test]
    fn test_validate_invalid_backlog() {
        let mut config = Config::default();
        config.backlog = 0;
        assert!(config.validate().unwrap_err().contains("backlog"));
    }

    #[test]
    fn test_validate_invalid_limits() {
        let mut config = Config::default();
        config.max_request_bytes = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.keep_alive_timeout_secs = 0;
        assert!(config.validate().unwrap_err().contains("Keep-alive"));

        let mut config = Config::default();
        config.max_requests_per_connection = 0;
        assert!(config.validate().unwrap_err().contains("Max requests"));
    }
}
