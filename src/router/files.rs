//! # Archivos Estáticos (GET)
//! src/router/files.rs
//!
//! | Extensión               | Respuesta                                   |
//! |-------------------------|---------------------------------------------|
//! | `.html`                 | `text/html; charset=utf-8`, inline          |
//! | `.txt` `.png` `.jpg` `.jpeg` | `application/octet-stream`, attachment |
//! | otra                    | 415                                         |
//!
//! El archivo se lee completo a memoria.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::HandlerError;
use crate::http::{Response, StatusCode};
use crate::security::SecurityViolation;

use super::is_root;

const INDEX_FILE: &str = "index.html";

/// Cómo se entrega un archivo según su extensión
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Html,
    Binary,
}

impl FileKind {
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "html" => Some(FileKind::Html),
            "txt" | "png" | "jpg" | "jpeg" => Some(FileKind::Binary),
            _ => None,
        }
    }
}

/// Sirve `relative` desde `root`
///
/// `display_path` es el path tal como lo pidió el cliente (para mensajes).
pub fn serve(root: &Path, relative: &Path, display_path: &str) -> Result<Response, HandlerError> {
    let relative: PathBuf = if is_root(relative) {
        PathBuf::from(INDEX_FILE)
    } else {
        relative.to_path_buf()
    };
    let full = root.join(&relative);

    let is_file = fs::metadata(&full).map(|m| m.is_file()).unwrap_or(false);
    if !is_file {
        return Err(HandlerError::NotFound(display_path.to_string()));
    }

    // Un symlink dentro de la raíz no puede apuntar afuera
    let canonical = full
        .canonicalize()
        .map_err(|e| HandlerError::Internal(e.to_string()))?;
    if !canonical.starts_with(root) {
        tracing::warn!(path = display_path, "symlink fuera del directorio de recursos");
        return Err(SecurityViolation::PathTraversal(display_path.to_string()).into());
    }

    let kind = FileKind::from_path(&full).ok_or_else(|| {
        let ext = full
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| format!(".{}", e))
            .unwrap_or_else(|| "(none)".to_string());
        HandlerError::UnsupportedMedia(format!("File type {} is not supported", ext))
    })?;

    let content = fs::read(&full).map_err(|e| {
        tracing::error!(path = %full.display(), error = %e, "error leyendo archivo");
        HandlerError::Internal("Error reading file".to_string())
    })?;

    let filename = full
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(INDEX_FILE);
    tracing::info!(file = filename, bytes = content.len(), ?kind, "enviando archivo");

    Ok(match kind {
        FileKind::Html => Response::html(StatusCode::Ok, content),
        FileKind::Binary => Response::attachment(content, filename),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::response::{OCTET_STREAM, TEXT_HTML};
    use std::sync::atomic::{AtomicUsize, Ordering};

    static COUNTER: AtomicUsize = AtomicUsize::new(0);

    fn temp_root() -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "mt_http_files_{}_{}",
            std::process::id(),
            COUNTER.fetch_add(1, Ordering::SeqCst)
        ));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir.canonicalize().unwrap()
    }

    #[test]
    fn test_file_kinds() {
        assert_eq!(FileKind::from_path(Path::new("a.html")), Some(FileKind::Html));
        assert_eq!(FileKind::from_path(Path::new("a.HTML")), Some(FileKind::Html));
        assert_eq!(FileKind::from_path(Path::new("a.txt")), Some(FileKind::Binary));
        assert_eq!(FileKind::from_path(Path::new("a.jpeg")), Some(FileKind::Binary));
        assert_eq!(FileKind::from_path(Path::new("a.exe")), None);
        assert_eq!(FileKind::from_path(Path::new("Makefile")), None);
    }

    #[test]
    fn test_serve_html_inline() {
        let root = temp_root();
        fs::write(root.join("index.html"), "<h1>hola</h1>").unwrap();

        let response = serve(&root, Path::new("index.html"), "/index.html").unwrap();

        assert_eq!(response.status(), StatusCode::Ok);
        assert_eq!(response.header("Content-Type"), Some(TEXT_HTML));
        assert_eq!(response.body(), b"<h1>hola</h1>");
    }

    #[test]
    fn test_root_serves_index() {
        let root = temp_root();
        fs::write(root.join("index.html"), "home").unwrap();

        let response = serve(&root, Path::new(""), "/").unwrap();
        assert_eq!(response.body(), b"home");
    }

    #[test]
    fn test_serve_binary_attachment() {
        let root = temp_root();
        let bytes: Vec<u8> = (0..=255).collect();
        fs::write(root.join("logo.png"), &bytes).unwrap();

        let response = serve(&root, Path::new("logo.png"), "/logo.png").unwrap();

        assert_eq!(response.header("Content-Type"), Some(OCTET_STREAM));
        assert_eq!(
            response.header("Content-Disposition"),
            Some("attachment; filename=\"logo.png\"")
        );
        assert_eq!(response.body(), &bytes[..]);
    }

    #[test]
    fn test_missing_file_is_404() {
        let root = temp_root();
        let err = serve(&root, Path::new("missing.html"), "/missing.html").unwrap_err();

        assert_eq!(err.status(), StatusCode::NotFound);
        assert!(err.to_string().contains("/missing.html"));
    }

    #[test]
    fn test_directory_is_404() {
        let root = temp_root();
        fs::create_dir_all(root.join("images")).unwrap();

        let err = serve(&root, Path::new("images"), "/images").unwrap_err();
        assert_eq!(err.status(), StatusCode::NotFound);
    }

    #[test]
    fn test_unsupported_extension_is_415() {
        let root = temp_root();
        fs::write(root.join("script.sh"), "echo").unwrap();

        let err = serve(&root, Path::new("script.sh"), "/script.sh").unwrap_err();
        assert_eq!(err.status(), StatusCode::UnsupportedMediaType);
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_escape_is_403() {
        let root = temp_root();
        let outside = temp_root();
        fs::write(outside.join("secret.txt"), "secret").unwrap();
        std::os::unix::fs::symlink(outside.join("secret.txt"), root.join("link.txt")).unwrap();

        let err = serve(&root, Path::new("link.txt"), "/link.txt").unwrap_err();
        assert_eq!(err.status(), StatusCode::Forbidden);
    }
}
