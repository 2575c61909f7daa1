//! # Parsing de Requests HTTP/1.1
//! src/http/request.rs
//!
//! Parser HTTP/1.1 implementado desde cero sobre los bytes crudos del socket.
//!
//! ## Formato de un Request
//!
//! ```text
//! POST /upload HTTP/1.1\r\n
//! Host: localhost:8080\r\n
//! Content-Type: application/json\r\n
//! Content-Length: 13\r\n
//! \r\n
//! {"ok": true}
//! ```
//!
//! ## Componentes
//!
//! 1. **Request Line**: `METHOD /path?query VERSION`, separados por un espacio
//! 2. **Headers**: Pares `Name: Value` (uno por línea)
//! 3. **Empty Line**: `\r\n` que separa headers del body
//! 4. **Body**: exactamente `Content-Length` bytes
//!
//! El parser es incremental: recibe todo lo acumulado hasta ahora en la
//! conexión y responde `Parsed::Partial` si todavía faltan bytes. El tamaño
//! total (headers + body) nunca puede superar el límite configurado.

use std::collections::HashMap;
use thiserror::Error;

/// Métodos HTTP
///
/// Sólo GET y POST tienen handler; cualquier otro token válido se conserva
/// para que el routing pueda responder 405.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Method {
    /// GET - Obtener un archivo del directorio de recursos
    GET,

    /// POST - Subir un documento JSON
    POST,

    /// Cualquier otro método (PUT, DELETE, ...)
    Other(String),
}

impl Method {
    /// Parsea un método HTTP desde su token (sensible a mayúsculas)
    fn from_token(token: &str) -> Self {
        match token {
            "GET" => Method::GET,
            "POST" => Method::POST,
            other => Method::Other(other.to_string()),
        }
    }

    /// Convierte el método a string
    pub fn as_str(&self) -> &str {
        match self {
            Method::GET => "GET",
            Method::POST => "POST",
            Method::Other(token) => token,
        }
    }
}

/// Versiones HTTP aceptadas
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Version {
    Http10,
    Http11,
}

impl Version {
    fn from_token(token: &str) -> Option<Self> {
        match token {
            "HTTP/1.0" => Some(Version::Http10),
            "HTTP/1.1" => Some(Version::Http11),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Version::Http10 => "HTTP/1.0",
            Version::Http11 => "HTTP/1.1",
        }
    }
}

/// Representa un request HTTP parseado
///
/// Es inmutable una vez construido y vive un único ciclo request/response.
#[derive(Debug, Clone)]
pub struct Request {
    /// Método HTTP
    method: Method,

    /// Path de la petición tal como llegó (sin decodificar, sin query)
    path: String,

    /// Query string cruda (lo que sigue a `?`), si existe
    query: Option<String>,

    /// Versión HTTP
    version: Version,

    /// Headers con nombre en minúsculas (ej: {"host": "localhost:8080"})
    headers: HashMap<String, String>,

    /// Body crudo (exactamente Content-Length bytes)
    body: Vec<u8>,
}

/// Errores que pueden ocurrir durante el parsing
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// Request line o headers inválidos
    #[error("Malformed request: {0}")]
    Malformed(String),

    /// El request supera el límite de bytes antes de estar completo
    #[error("Request exceeds {limit} bytes")]
    TooLarge { limit: usize },
}

/// Resultado de un intento de parseo sobre el buffer acumulado
#[derive(Debug)]
pub enum Parsed {
    /// Request completo; `consumed` indica cuántos bytes del buffer usó
    Complete { request: Request, consumed: usize },

    /// Faltan bytes: hay que seguir leyendo del socket
    Partial,
}

const HEAD_TERMINATOR: &[u8] = b"\r\n\r\n";

impl Request {
    /// Intenta parsear un request desde los bytes acumulados de una conexión
    ///
    /// # Argumentos
    ///
    /// * `buffer` - Todo lo leído hasta ahora del socket
    /// * `limit` - Máximo de bytes permitidos para headers + body
    ///
    /// # Ejemplo
    ///
    /// ```
    /// use mt_http_server::http::request::{Parsed, Request};
    ///
    /// let raw = b"GET /index.html HTTP/1.1\r\nHost: localhost\r\n\r\n";
    /// match Request::parse(raw, 8192).unwrap() {
    ///     Parsed::Complete { request, consumed } => {
    ///         assert_eq!(request.path(), "/index.html");
    ///         assert_eq!(consumed, raw.len());
    ///     }
    ///     Parsed::Partial => unreachable!(),
    /// }
    /// ```
    pub fn parse(buffer: &[u8], limit: usize) -> Result<Parsed, ParseError> {
        // 1. Buscar el fin de los headers
        let head_end = match find_subsequence(buffer, HEAD_TERMINATOR) {
            Some(pos) => pos,
            None if buffer.len() > limit => return Err(ParseError::TooLarge { limit }),
            None => return Ok(Parsed::Partial),
        };

        let body_start = head_end + HEAD_TERMINATOR.len();
        if body_start > limit {
            return Err(ParseError::TooLarge { limit });
        }

        let head = std::str::from_utf8(&buffer[..head_end])
            .map_err(|_| ParseError::Malformed("request head is not valid UTF-8".to_string()))?;

        let mut lines = head.split("\r\n");

        // 2. Request line
        let request_line = lines.next().unwrap_or_default();
        let (method, path, query, version) = Self::parse_request_line(request_line)?;

        // 3. Headers
        let headers = Self::parse_headers(lines)?;

        // 4. Body
        if headers.contains_key("transfer-encoding") {
            return Err(ParseError::Malformed(
                "Transfer-Encoding is not supported".to_string(),
            ));
        }

        // Sólo dígitos: `usize::from_str` aceptaría también un `+` inicial
        let content_length = match headers.get("content-length") {
            Some(value) if !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit()) => {
                value.parse::<usize>().map_err(|_| {
                    ParseError::Malformed(format!("invalid Content-Length: {}", value))
                })?
            }
            Some(value) => {
                return Err(ParseError::Malformed(format!(
                    "invalid Content-Length: {}",
                    value
                )))
            }
            None => 0,
        };

        let total = body_start
            .checked_add(content_length)
            .ok_or(ParseError::TooLarge { limit })?;
        if total > limit {
            return Err(ParseError::TooLarge { limit });
        }
        if buffer.len() < total {
            return Ok(Parsed::Partial);
        }

        let request = Request {
            method,
            path,
            query,
            version,
            headers,
            body: buffer[body_start..total].to_vec(),
        };

        Ok(Parsed::Complete {
            request,
            consumed: total,
        })
    }

    /// Parsea la request line
    ///
    /// Formato: `GET /path?query HTTP/1.1` (exactamente un espacio entre partes)
    fn parse_request_line(
        line: &str,
    ) -> Result<(Method, String, Option<String>, Version), ParseError> {
        let parts: Vec<&str> = line.split(' ').collect();

        if parts.len() != 3 || parts.iter().any(|part| part.is_empty()) {
            return Err(ParseError::Malformed(format!("invalid request line: {:?}", line)));
        }

        if !parts[0].bytes().all(is_token_byte) {
            return Err(ParseError::Malformed(format!("invalid method: {:?}", parts[0])));
        }
        let method = Method::from_token(parts[0]);

        if parts[1].bytes().any(|b| b.is_ascii_control()) {
            return Err(ParseError::Malformed("control character in request target".to_string()));
        }
        let (path, query) = match parts[1].split_once('?') {
            Some((path, query)) => (path.to_string(), Some(query.to_string())),
            None => (parts[1].to_string(), None),
        };

        let version = Version::from_token(parts[2])
            .ok_or_else(|| ParseError::Malformed(format!("unsupported version: {}", parts[2])))?;

        Ok((method, path, query, version))
    }

    /// Parsea los headers HTTP
    ///
    /// Los nombres se guardan en minúsculas. Un header repetido se une con
    /// `", "`, salvo `Host` y `Content-Length` que deben ser únicos.
    fn parse_headers<'a>(
        lines: impl Iterator<Item = &'a str>,
    ) -> Result<HashMap<String, String>, ParseError> {
        let mut headers: HashMap<String, String> = HashMap::new();

        for line in lines {
            if line.starts_with(' ') || line.starts_with('\t') {
                return Err(ParseError::Malformed("obsolete header folding".to_string()));
            }

            let (name, value) = line
                .split_once(':')
                .ok_or_else(|| ParseError::Malformed(format!("invalid header: {:?}", line)))?;

            if name.is_empty() || !name.bytes().all(is_token_byte) {
                return Err(ParseError::Malformed(format!("invalid header name: {:?}", name)));
            }

            let name = name.to_ascii_lowercase();
            let value = value.trim();

            match headers.get_mut(&name) {
                Some(_) if name == "host" || name == "content-length" => {
                    return Err(ParseError::Malformed(format!("duplicate {} header", name)));
                }
                Some(existing) => {
                    existing.push_str(", ");
                    existing.push_str(value);
                }
                None => {
                    headers.insert(name, value.to_string());
                }
            }
        }

        Ok(headers)
    }

    // === Métodos públicos para acceder a los campos ===

    /// Obtiene el método HTTP del request
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Obtiene el path del request (sin query, sin decodificar)
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Obtiene la query string cruda
    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    /// Obtiene la versión HTTP
    pub fn version(&self) -> Version {
        self.version
    }

    /// Obtiene todos los headers (nombres en minúsculas)
    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    /// Obtiene un header específico (búsqueda insensible a mayúsculas)
    ///
    /// # Ejemplo
    /// ```
    /// use mt_http_server::http::request::{Parsed, Request};
    ///
    /// let raw = b"GET / HTTP/1.1\r\nHost: localhost:8080\r\n\r\n";
    /// if let Parsed::Complete { request, .. } = Request::parse(raw, 8192).unwrap() {
    ///     assert_eq!(request.header("HOST"), Some("localhost:8080"));
    /// }
    /// ```
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(|s| s.as_str())
    }

    /// Obtiene el body del request
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Indica si el cliente quiere mantener la conexión abierta
    ///
    /// `Connection: close` cierra, `Connection: keep-alive` mantiene y, si no
    /// hay header, HTTP/1.1 mantiene y HTTP/1.0 cierra.
    pub fn wants_keep_alive(&self) -> bool {
        match self.header("connection").map(|v| v.to_ascii_lowercase()) {
            Some(value) if value.split(',').any(|t| t.trim() == "close") => false,
            Some(value) if value.split(',').any(|t| t.trim() == "keep-alive") => true,
            _ => self.version == Version::Http11,
        }
    }
}

/// Caracteres permitidos en un token (RFC 7230 §3.2.6)
fn is_token_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b)
}

fn find_subsequence(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}
