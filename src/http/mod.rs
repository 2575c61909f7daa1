//! # Módulo HTTP
//!
//! Implementa el protocolo HTTP/1.1 desde cero, sin librerías de alto nivel:
//!
//! - Parsing incremental de requests con límite de tamaño
//! - Construcción de responses con headers calculados
//! - Códigos de estado
//!
//! ### Formato de Request
//!
//! ```text
//! GET /index.html HTTP/1.1\r\n
//! Host: localhost:8080\r\n
//! Connection: keep-alive\r\n
//! \r\n
//! ```
//!
//! ### Formato de Response
//!
//! ```text
//! HTTP/1.1 200 OK\r\n
//! Content-Type: application/json\r\n
//! Content-Length: 13\r\n
//! \r\n
//! {"ok": true}
//! ```

pub mod request;   // Parsing de HTTP requests
pub mod response;  // Construcción de HTTP responses
pub mod status;    // Códigos de estado HTTP

// Re-exportamos los tipos principales para facilitar su uso
pub use request::{Method, ParseError, Parsed, Request, Version};
pub use response::{Persistence, Response};
pub use status::StatusCode;
