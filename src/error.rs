//! # Errores de manejo de requests
//! src/error.rs
//!
//! Taxonomía de fallas de un ciclo request/response. Todas se convierten en
//! una respuesta HTTP bien formada en el borde de la conexión; ninguna llega
//! a matar un worker.

use thiserror::Error;

use crate::http::{ParseError, Response, StatusCode};
use crate::security::SecurityViolation;

#[derive(Debug, Error)]
pub enum HandlerError {
    /// Request malformado o demasiado grande (400)
    #[error(transparent)]
    ClientProtocol(#[from] ParseError),

    /// Host ausente (400), host no aceptado o path fuera de la raíz (403)
    #[error(transparent)]
    Security(#[from] SecurityViolation),

    #[error("The requested resource {0} was not found")]
    NotFound(String),

    /// Método sin handler; lleva el valor para el header `Allow`
    #[error("Method {method} is not allowed for this resource")]
    MethodNotAllowed { method: String, allow: &'static str },

    #[error("{0}")]
    UnsupportedMedia(String),

    /// Cola de conexiones llena (503)
    #[error("Connection queue is full")]
    CapacityExceeded,

    /// Cuerpo inválido en un endpoint de la API (400 con body JSON)
    #[error("{0}")]
    InvalidPayload(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl HandlerError {
    pub fn status(&self) -> StatusCode {
        match self {
            HandlerError::ClientProtocol(_) => StatusCode::BadRequest,
            HandlerError::Security(violation) => violation.status(),
            HandlerError::NotFound(_) => StatusCode::NotFound,
            HandlerError::MethodNotAllowed { .. } => StatusCode::MethodNotAllowed,
            HandlerError::UnsupportedMedia(_) => StatusCode::UnsupportedMediaType,
            HandlerError::CapacityExceeded => StatusCode::ServiceUnavailable,
            HandlerError::InvalidPayload(_) => StatusCode::BadRequest,
            HandlerError::Internal(_) => StatusCode::InternalServerError,
        }
    }

    /// Errores de protocolo y de seguridad cierran la conexión
    pub fn closes_connection(&self) -> bool {
        matches!(
            self,
            HandlerError::ClientProtocol(_)
                | HandlerError::Security(_)
                | HandlerError::CapacityExceeded
        )
    }

    /// Respuesta de error con página HTML
    pub fn into_response(self) -> Response {
        if let HandlerError::CapacityExceeded = self {
            return Response::service_unavailable();
        }

        let mut response = Response::error_page(self.status(), &self.to_string());
        if let HandlerError::MethodNotAllowed { allow, .. } = &self {
            response.add_header("Allow", allow);
        }
        if self.closes_connection() {
            response = response.closing();
        }
        response
    }

    /// Respuesta de error con body JSON, para endpoints de la API
    pub fn into_json_response(self) -> Response {
        let mut response = Response::json_error(self.status(), &self.to_string());
        if let HandlerError::MethodNotAllowed { allow, .. } = &self {
            response.add_header("Allow", allow);
        }
        if self.closes_connection() {
            response = response.closing();
        }
        response
    }
}
