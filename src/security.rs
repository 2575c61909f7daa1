//! # Validación de Seguridad
//! src/security.rs
//!
//! Chequeos que se evalúan antes del routing:
//!
//! 1. **Host**: el header `Host` debe existir y coincidir con alguno de los
//!    alias del servidor (`host:port`, `host` y sus equivalentes de loopback).
//! 2. **Path**: el path pedido, una vez normalizado, debe quedar dentro del
//!    directorio de recursos.
//!
//! Ambos son funciones puras sobre strings: no tocan el disco. El logging de
//! las violaciones lo hace quien llama, con el valor ofensivo.
//!
//! ## Decodificación
//!
//! El path se decodifica (percent-encoding) antes de normalizar, y se prueban
//! hasta `MAX_DECODE_ROUNDS` decodificaciones sucesivas: `%252e%252e` es
//! rechazado igual que `..` aunque el sistema de archivos sólo vea la primera.

use std::net::Ipv4Addr;
use std::path::PathBuf;
use thiserror::Error;

use crate::http::StatusCode;

const MAX_DECODE_ROUNDS: usize = 3;

/// Violaciones de seguridad detectadas en un request
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SecurityViolation {
    #[error("Missing Host header")]
    MissingHost,

    #[error("Host header mismatch: {0}")]
    HostMismatch(String),

    #[error("Unauthorized path access: {0}")]
    PathTraversal(String),
}

impl SecurityViolation {
    /// Host ausente es 400; todo lo demás es 403
    pub fn status(&self) -> StatusCode {
        match self {
            SecurityViolation::MissingHost => StatusCode::BadRequest,
            SecurityViolation::HostMismatch(_) | SecurityViolation::PathTraversal(_) => {
                StatusCode::Forbidden
            }
        }
    }
}

/// Validador configurado con los alias aceptados para `Host`
#[derive(Debug, Clone)]
pub struct SecurityValidator {
    aliases: Vec<String>,
}

impl SecurityValidator {
    /// Crea el validador para el host configurado y el puerto efectivo
    ///
    /// # Ejemplo
    /// ```
    /// use mt_http_server::security::SecurityValidator;
    ///
    /// let validator = SecurityValidator::new("127.0.0.1", 8080);
    /// assert!(validator.check_host(Some("localhost:8080")).is_ok());
    /// assert!(validator.check_host(Some("evil.com")).is_err());
    /// ```
    pub fn new(host: &str, port: u16) -> Self {
        let host = host.trim().to_ascii_lowercase();

        let mut names = vec![host.clone()];
        if is_loopback_or_unspecified(&host) {
            for loopback in ["localhost", "127.0.0.1"] {
                if !names.iter().any(|n| n == loopback) {
                    names.push(loopback.to_string());
                }
            }
        }

        let mut aliases = Vec::with_capacity(names.len() * 2);
        for name in names {
            aliases.push(format!("{}:{}", name, port));
            aliases.push(name);
        }

        Self { aliases }
    }

    /// Alias aceptados (en minúsculas)
    pub fn aliases(&self) -> &[String] {
        &self.aliases
    }

    /// Verifica el header `Host`
    pub fn check_host(&self, host: Option<&str>) -> Result<(), SecurityViolation> {
        let host = match host.map(str::trim) {
            Some(value) if !value.is_empty() => value,
            _ => return Err(SecurityViolation::MissingHost),
        };

        let lowered = host.to_ascii_lowercase();
        if self.aliases.iter().any(|alias| *alias == lowered) {
            Ok(())
        } else {
            Err(SecurityViolation::HostMismatch(host.to_string()))
        }
    }

    /// Verifica el path y retorna su forma relativa al directorio de recursos
    pub fn check_path(&self, raw_path: &str) -> Result<PathBuf, SecurityViolation> {
        normalize_path(raw_path)
    }
}

/// Normaliza un path de request a un `PathBuf` relativo
///
/// `/` se normaliza a un path vacío. Se rechaza:
/// - todo lo que no empiece con `/`
/// - segmentos vacíos (`//`), `.` o `..` (una única barra final se permite)
/// - `\`, `:` y caracteres de control (incluido NUL)
/// - escapes `%` inválidos o bytes no UTF-8 en la primera decodificación
/// - cualquiera de lo anterior tras decodificaciones sucesivas
pub fn normalize_path(raw_path: &str) -> Result<PathBuf, SecurityViolation> {
    let violation = || SecurityViolation::PathTraversal(raw_path.to_string());

    check_form(raw_path).map_err(|_| violation())?;

    let decoded = percent_decode(raw_path).ok_or_else(violation)?;
    let segments = check_form(&decoded).map_err(|_| violation())?;

    let mut probe = decoded.clone();
    for _ in 1..MAX_DECODE_ROUNDS {
        match percent_decode(&probe) {
            Some(next) if next != probe => {
                check_form(&next).map_err(|_| violation())?;
                probe = next;
            }
            _ => break,
        }
    }

    Ok(segments.into_iter().collect())
}

/// Verifica la forma de un path y retorna sus segmentos
fn check_form(path: &str) -> Result<Vec<String>, ()> {
    let rest = path.strip_prefix('/').ok_or(())?;

    if path.chars().any(|c| c == '\\' || c == ':' || c.is_control()) {
        return Err(());
    }

    if rest.is_empty() {
        return Ok(Vec::new());
    }

    // Una barra final (`/images/`) se ignora: el lookup decide si es archivo
    let rest = rest.strip_suffix('/').unwrap_or(rest);

    let mut segments = Vec::new();
    for segment in rest.split('/') {
        if segment.is_empty() || segment == "." || segment == ".." {
            return Err(());
        }
        segments.push(segment.to_string());
    }

    Ok(segments)
}

/// Decodifica `%XX`; `None` si hay un escape inválido o el resultado no es UTF-8
pub fn percent_decode(input: &str) -> Option<String> {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hi = hex_value(*bytes.get(i + 1)?)?;
            let lo = hex_value(*bytes.get(i + 2)?)?;
            out.push(hi << 4 | lo);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }

    String::from_utf8(out).ok()
}

fn hex_value(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

fn is_loopback_or_unspecified(host: &str) -> bool {
    if host == "localhost" {
        return true;
    }
    host.parse::<Ipv4Addr>()
        .map(|ip| ip.is_loopback() || ip.is_unspecified())
        .unwrap_or(false)
}

/// Chequeo de contenido para `/upload`: `Content-Type` debe ser exactamente
/// `application/json` (sin parámetros, sin importar mayúsculas)
pub fn is_json_content_type(content_type: Option<&str>) -> bool {
    content_type
        .map(|value| value.trim().eq_ignore_ascii_case("application/json"))
        .unwrap_or(false)
}
