//! # Sistema de Routing
//! src/router/mod.rs
//!
//! Lleva un request ya parseado hasta su respuesta:
//!
//! ```text
//! Request → Host check → Path check → RequestKind → Handler → Response
//! ```
//!
//! Las violaciones de seguridad se resuelven antes de mirar el método. El
//! tipo de request se decide una sola vez (`RequestKind::resolve`) y cada
//! variante tiene un único handler.

pub mod files;

use std::path::Path;

use serde::Serialize;

use crate::error::HandlerError;
use crate::http::{Method, Request, Response, StatusCode};
use crate::security::{self, SecurityViolation};
use crate::server::ServerContext;
use crate::upload::UploadError;

/// Path del endpoint de uploads
pub const UPLOAD_PATH: &str = "/upload";

/// Tipo de request, resuelto una vez durante el routing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestKind {
    /// GET de un archivo del directorio de recursos
    Get,

    /// POST /upload
    Upload,

    /// Cualquier otra combinación; `allow` va en el header `Allow`
    Unsupported { allow: &'static str },
}

impl RequestKind {
    pub fn resolve(request: &Request) -> Self {
        match request.method() {
            Method::GET => RequestKind::Get,
            Method::POST if request.path() == UPLOAD_PATH => RequestKind::Upload,
            Method::POST => RequestKind::Unsupported { allow: "GET" },
            Method::Other(_) => RequestKind::Unsupported { allow: "GET, POST" },
        }
    }
}

/// Procesa un request completo y retorna siempre una respuesta
pub fn handle(ctx: &ServerContext, request: &Request) -> Response {
    let relative = match check_security(ctx, request) {
        Ok(relative) => relative,
        Err(violation) => return HandlerError::from(violation).into_response(),
    };

    match RequestKind::resolve(request) {
        RequestKind::Get => files::serve(ctx.root(), &relative, request.path())
            .unwrap_or_else(HandlerError::into_response),
        RequestKind::Upload => upload(ctx, request).unwrap_or_else(HandlerError::into_json_response),
        RequestKind::Unsupported { allow } => HandlerError::MethodNotAllowed {
            method: request.method().as_str().to_string(),
            allow,
        }
        .into_response(),
    }
}

/// Host y path, en ese orden; loguea la violación con el valor ofensivo
fn check_security(
    ctx: &ServerContext,
    request: &Request,
) -> Result<std::path::PathBuf, SecurityViolation> {
    let validator = ctx.validator();

    if let Err(violation) = validator.check_host(request.header("host")) {
        tracing::warn!(
            host = request.header("host").unwrap_or(""),
            %violation,
            "violación de seguridad"
        );
        return Err(violation);
    }

    validator.check_path(request.path()).map_err(|violation| {
        tracing::warn!(path = request.path(), %violation, "violación de seguridad");
        violation
    })
}

/// Handler de `POST /upload`
fn upload(ctx: &ServerContext, request: &Request) -> Result<Response, HandlerError> {
    let content_type = request.header("content-type");
    if !security::is_json_content_type(content_type) {
        tracing::info!(content_type = content_type.unwrap_or(""), "Content-Type inválido para POST");
        return Err(HandlerError::UnsupportedMedia(
            "Only application/json is supported for POST requests".to_string(),
        ));
    }

    let record = ctx.uploads().save(request.body())?;
    tracing::info!(file = %record.filename, bytes = record.size, "archivo JSON creado");

    Ok(Response::json(
        StatusCode::Created,
        &UploadCreated {
            status: "success",
            message: "File created successfully",
            filepath: record.public_path(),
        },
    ))
}

/// Cuerpo de la respuesta 201 de `POST /upload`
#[derive(Debug, Serialize)]
struct UploadCreated {
    status: &'static str,
    message: &'static str,
    filepath: String,
}

impl From<UploadError> for HandlerError {
    fn from(error: UploadError) -> Self {
        match error {
            UploadError::InvalidJson(e) => {
                tracing::info!(error = %e, "JSON inválido");
                HandlerError::InvalidPayload("Invalid JSON data".to_string())
            }
            UploadError::Io(e) => {
                tracing::error!(error = %e, "error guardando upload");
                HandlerError::Internal("Error saving file".to_string())
            }
        }
    }
}

/// Path relativo vacío significa la raíz
pub(crate) fn is_root(relative: &Path) -> bool {
    relative.as_os_str().is_empty()
}
