//! # Construcción de Respuestas HTTP
//! src/http/response.rs
//!
//! API para construir respuestas HTTP/1.1 y convertirlas a bytes.
//!
//! ## Formato de una respuesta
//!
//! ```text
//! HTTP/1.1 200 OK\r\n
//! Date: Tue, 15 Nov 1994 08:12:31 GMT\r\n
//! Server: mt_http_server/0.1.0\r\n
//! Content-Type: text/html; charset=utf-8\r\n
//! Content-Length: 13\r\n
//! Connection: keep-alive\r\n
//! Keep-Alive: timeout=30, max=100\r\n
//! \r\n
//! <h1>Hola</h1>
//! ```
//!
//! `Date`, `Server`, `Content-Length` y el par `Connection`/`Keep-Alive` se
//! generan al serializar: el largo siempre sale del body real y la
//! persistencia la decide el manejador de la conexión, no el handler.
//!
//! ## Ejemplo de uso
//!
//! ```
//! use mt_http_server::http::{Persistence, Response, StatusCode};
//!
//! let response = Response::html(StatusCode::Ok, b"<h1>Hola</h1>".to_vec());
//! let bytes = response.to_bytes(Persistence::Close);
//! assert!(bytes.starts_with(b"HTTP/1.1 200 OK\r\n"));
//! ```

use super::StatusCode;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Valor del header `Server`
pub const SERVER_NAME: &str = concat!("mt_http_server/", env!("CARGO_PKG_VERSION"));

pub const TEXT_HTML: &str = "text/html; charset=utf-8";
pub const OCTET_STREAM: &str = "application/octet-stream";
pub const APPLICATION_JSON: &str = "application/json";

/// Cuerpo `{"status": ..., "message": ...}` de la API
#[derive(Debug, Serialize)]
pub struct ApiMessage<'a> {
    pub status: &'a str,
    pub message: &'a str,
}

/// Decisión de persistencia que se refleja en `Connection`/`Keep-Alive`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Persistence {
    KeepAlive { timeout_secs: u64, max_requests: usize },
    Close,
}

/// Representa una respuesta HTTP/1.1 completa
#[derive(Debug, Clone)]
pub struct Response {
    /// Código de estado HTTP
    status: StatusCode,

    /// Headers propios de la respuesta, en orden de inserción
    headers: Vec<(String, String)>,

    /// Cuerpo de la respuesta (puede ser vacío)
    body: Vec<u8>,

    /// La conexión debe cerrarse después de enviar esta respuesta
    close_connection: bool,
}

impl Response {
    /// Crea una nueva respuesta sin headers ni body
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: Vec::new(),
            close_connection: false,
        }
    }

    /// Agrega un header (si ya existe, se sobrescribe en su posición)
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.add_header(name, value);
        self
    }

    /// Versión mutable de `with_header`
    pub fn add_header(&mut self, name: &str, value: &str) {
        match self
            .headers
            .iter_mut()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
        {
            Some(entry) => entry.1 = value.to_string(),
            None => self.headers.push((name.to_string(), value.to_string())),
        }
    }

    /// Establece el cuerpo de la respuesta desde bytes
    pub fn with_body_bytes(mut self, body: Vec<u8>) -> Self {
        self.body = body;
        self
    }

    /// Marca la respuesta como no persistente
    pub fn closing(mut self) -> Self {
        self.close_connection = true;
        self
    }

    /// Respuesta HTML renderizable (`text/html; charset=utf-8`)
    pub fn html(status: StatusCode, body: Vec<u8>) -> Self {
        Self::new(status)
            .with_header("Content-Type", TEXT_HTML)
            .with_body_bytes(body)
    }

    /// Descarga binaria con `Content-Disposition: attachment`
    ///
    /// # Ejemplo
    /// ```
    /// use mt_http_server::http::Response;
    ///
    /// let response = Response::attachment(vec![0x89, 0x50, 0x4E, 0x47], "logo.png");
    /// assert_eq!(
    ///     response.header("Content-Disposition"),
    ///     Some("attachment; filename=\"logo.png\"")
    /// );
    /// ```
    pub fn attachment(body: Vec<u8>, filename: &str) -> Self {
        let filename: String = filename
            .chars()
            .map(|c| if c == '"' || c == '\\' || c.is_control() { '_' } else { c })
            .collect();

        Self::new(StatusCode::Ok)
            .with_header("Content-Type", OCTET_STREAM)
            .with_header(
                "Content-Disposition",
                &format!("attachment; filename=\"{}\"", filename),
            )
            .with_body_bytes(body)
    }

    /// Respuesta JSON de la API
    pub fn json<T: Serialize + ?Sized>(status: StatusCode, value: &T) -> Self {
        let body = serde_json::to_vec_pretty(value).unwrap_or_else(|_| b"{}".to_vec());
        Self::new(status)
            .with_header("Content-Type", APPLICATION_JSON)
            .with_body_bytes(body)
    }

    /// Error en formato JSON: `{"status": "error", "message": "..."}`
    pub fn json_error(status: StatusCode, message: &str) -> Self {
        Self::json(
            status,
            &ApiMessage {
                status: "error",
                message,
            },
        )
    }

    /// Página de error HTML mínima
    ///
    /// El mensaje se escapa: puede contener el path pedido por el cliente.
    pub fn error_page(status: StatusCode, message: &str) -> Self {
        let body = format!(
            "<!DOCTYPE html>\n<html>\n<head><title>{status}</title></head>\n<body>\n\
             <h1>{status}</h1>\n<p>{message}</p>\n<hr>\n<p><em>{server}</em></p>\n\
             </body>\n</html>\n",
            status = status,
            message = escape_html(message),
            server = SERVER_NAME,
        );
        Self::html(status, body.into_bytes())
    }

    /// 503 enviado por el listener cuando la cola está llena
    pub fn service_unavailable() -> Self {
        Self::error_page(
            StatusCode::ServiceUnavailable,
            "The server is at capacity, please retry later",
        )
        .with_header("Retry-After", "30")
        .closing()
    }

    /// Convierte la respuesta a bytes listos para enviar por el socket
    ///
    /// Orden: status line, `Date`, `Server`, headers propios,
    /// `Content-Length`, `Connection` y, si persiste, `Keep-Alive`.
    pub fn to_bytes(&self, persistence: Persistence) -> Vec<u8> {
        let mut head = format!(
            "HTTP/1.1 {}\r\nDate: {}\r\nServer: {}\r\n",
            self.status,
            http_date(Utc::now()),
            SERVER_NAME
        );

        for (name, value) in &self.headers {
            head.push_str(&format!("{}: {}\r\n", name, value));
        }

        head.push_str(&format!("Content-Length: {}\r\n", self.body.len()));

        match persistence {
            Persistence::KeepAlive {
                timeout_secs,
                max_requests,
            } => {
                head.push_str("Connection: keep-alive\r\n");
                head.push_str(&format!(
                    "Keep-Alive: timeout={}, max={}\r\n",
                    timeout_secs, max_requests
                ));
            }
            Persistence::Close => head.push_str("Connection: close\r\n"),
        }

        head.push_str("\r\n");

        let mut result = head.into_bytes();
        result.extend_from_slice(&self.body);
        result
    }

    /// Obtiene el código de estado de la respuesta
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Obtiene los headers propios (sin los generados al serializar)
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// Busca un header propio (insensible a mayúsculas)
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Obtiene una referencia al body
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Indica si la respuesta obliga a cerrar la conexión
    pub fn closes_connection(&self) -> bool {
        self.close_connection
    }
}

/// Fecha en formato RFC 7231 (IMF-fixdate), siempre en GMT
pub fn http_date(now: DateTime<Utc>) -> String {
    now.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            c => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn text(response: &Response, persistence: Persistence) -> String {
        String::from_utf8(response.to_bytes(persistence)).unwrap()
    }

    const KEEP: Persistence = Persistence::KeepAlive {
        timeout_secs: 30,
        max_requests: 100,
    };

    #[test]
    fn test_new_response() {
        let response = Response::new(StatusCode::Ok);
        assert_eq!(response.status(), StatusCode::Ok);
        assert!(response.headers().is_empty());
        assert!(response.body().is_empty());
        assert!(!response.closes_connection());
    }

    #[test]
    fn test_with_header_overwrites_in_place() {
        let response = Response::new(StatusCode::Ok)
            .with_header("Content-Type", "text/plain")
            .with_header("X-Custom", "value")
            .with_header("content-type", "application/json");

        assert_eq!(response.headers().len(), 2);
        assert_eq!(response.headers()[0].1, "application/json");
        assert_eq!(response.header("x-custom"), Some("value"));
    }

    #[test]
    fn test_content_length_matches_body() {
        let body = vec![0u8, 1, 2, 255, 13, 10];
        let response = Response::attachment(body.clone(), "data.png");
        let bytes = response.to_bytes(Persistence::Close);

        let head_end = bytes.windows(4).position(|w| w == b"\r\n\r\n").unwrap();
        let head = String::from_utf8(bytes[..head_end].to_vec()).unwrap();

        assert!(head.contains("Content-Length: 6"));
        assert_eq!(&bytes[head_end + 4..], &body[..]);
    }

    #[test]
    fn test_standard_headers_present() {
        let response = Response::html(StatusCode::Ok, b"<p>x</p>".to_vec());
        let text = text(&response, KEEP);

        assert!(text.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(text.contains("\r\nDate: "));
        assert!(text.contains(&format!("\r\nServer: {}\r\n", SERVER_NAME)));
        assert!(text.contains("\r\nContent-Type: text/html; charset=utf-8\r\n"));
        assert!(text.contains("\r\nConnection: keep-alive\r\n"));
        assert!(text.contains("\r\nKeep-Alive: timeout=30, max=100\r\n"));
        assert!(text.ends_with("\r\n\r\n<p>x</p>"));
    }

    #[test]
    fn test_close_has_no_keep_alive_header() {
        let response = Response::html(StatusCode::Ok, Vec::new());
        let text = text(&response, Persistence::Close);

        assert!(text.contains("\r\nConnection: close\r\n"));
        assert!(!text.contains("Keep-Alive"));
    }

    #[test]
    fn test_attachment_headers() {
        let response = Response::attachment(vec![1, 2, 3], "photo\".jpg");

        assert_eq!(response.header("Content-Type"), Some(OCTET_STREAM));
        assert_eq!(
            response.header("Content-Disposition"),
            Some("attachment; filename=\"photo_.jpg\"")
        );
    }

    #[test]
    fn test_html_has_no_disposition() {
        let response = Response::html(StatusCode::Ok, b"hi".to_vec());
        assert_eq!(response.header("Content-Disposition"), None);
    }

    #[test]
    fn test_json_response() {
        let response = Response::json(
            StatusCode::Created,
            &serde_json::json!({ "status": "success" }),
        );

        assert_eq!(response.status(), StatusCode::Created);
        assert_eq!(response.header("Content-Type"), Some(APPLICATION_JSON));
        let parsed: serde_json::Value = serde_json::from_slice(response.body()).unwrap();
        assert_eq!(parsed["status"], "success");
    }

    #[test]
    fn test_error_page_escapes_message() {
        let response = Response::error_page(StatusCode::NotFound, "/<script>.html");
        let body = String::from_utf8(response.body().to_vec()).unwrap();

        assert!(body.contains("404 Not Found"));
        assert!(body.contains("/&lt;script&gt;.html"));
        assert!(!body.contains("<script>"));
    }

    #[test]
    fn test_service_unavailable() {
        let response = Response::service_unavailable();

        assert_eq!(response.status(), StatusCode::ServiceUnavailable);
        assert_eq!(response.header("Retry-After"), Some("30"));
        assert!(response.closes_connection());
    }

    #[test]
    fn test_http_date_format() {
        let date = Utc.with_ymd_and_hms(1994, 11, 6, 8, 49, 37).unwrap();
        assert_eq!(http_date(date), "Sun, 06 Nov 1994 08:49:37 GMT");
    }
}
