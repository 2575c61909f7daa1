//! # mt_http_server
//! src/lib.rs
//!
//! Servidor HTTP/1.1 concurrente implementado desde cero sobre sockets TCP:
//! un listener, un pool fijo de workers con cola acotada, conexiones
//! persistentes (keep-alive) y validación de seguridad en cada request.
//!
//! ## Arquitectura
//!
//! El servidor está dividido en módulos especializados:
//! - `config`: argumentos CLI y variables de entorno
//! - `http`: parsing de requests y serialización de respuestas
//! - `security`: validación de `Host` y normalización de paths
//! - `router`: dispatch a archivos estáticos y al endpoint de uploads
//! - `upload`: persistencia de documentos JSON con nombres únicos
//! - `pool`: pool de threads y cola acotada de conexiones
//! - `server`: listener TCP y máquina de estados de cada conexión
//! - `error`: errores de manejo de requests y su respuesta HTTP
//!
//! ## Ejemplo de uso
//!
//! ```no_run
//! use mt_http_server::config::Config;
//! use mt_http_server::server::Server;
//!
//! let config = Config::default();
//! let server = Server::bind(&config).expect("Error al abrir el socket");
//! server.run().expect("Error en el servidor");
//! ```

pub mod config;
pub mod error;
pub mod http;
pub mod pool;
pub mod router;
pub mod security;
pub mod server;
pub mod upload;
