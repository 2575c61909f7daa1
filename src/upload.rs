//! # Almacenamiento de Uploads JSON
//! src/upload.rs
//!
//! Persiste los documentos JSON recibidos por `POST /upload` en
//! `<recursos>/uploads/`, un archivo por upload:
//!
//! ```text
//! upload_20240131_235959_9f3a01bc.json
//! ```
//!
//! Varios workers escriben en el mismo directorio sin locks: la unicidad
//! viene del sufijo aleatorio y de abrir con `create_new`, que nunca
//! sobrescribe un archivo existente.

use chrono::Utc;
use rand::Rng;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Subdirectorio (dentro de los recursos) donde se guardan los uploads
pub const UPLOADS_DIR: &str = "uploads";

/// Intentos ante una colisión de nombre antes de rendirse
const MAX_NAME_ATTEMPTS: usize = 8;

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("Invalid JSON data: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("Error saving file: {0}")]
    Io(#[from] io::Error),
}

/// Un upload ya escrito en disco
#[derive(Debug, Clone)]
pub struct UploadRecord {
    /// Nombre generado (`upload_<timestamp>_<sufijo>.json`)
    pub filename: String,

    /// Ruta completa en disco
    pub path: PathBuf,

    /// Bytes escritos
    pub size: usize,
}

impl UploadRecord {
    /// Ruta pública reportada al cliente (`/uploads/<nombre>`)
    pub fn public_path(&self) -> String {
        format!("/{}/{}", UPLOADS_DIR, self.filename)
    }
}

/// Store de uploads sobre un directorio
#[derive(Debug, Clone)]
pub struct UploadStore {
    dir: PathBuf,
}

impl UploadStore {
    /// Crea el store bajo `<resource_root>/uploads`, creando el directorio
    pub fn new(resource_root: &Path) -> io::Result<Self> {
        let dir = resource_root.join(UPLOADS_DIR);
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Valida el body como JSON y lo guarda tal cual llegó
    pub fn save(&self, body: &[u8]) -> Result<UploadRecord, UploadError> {
        serde_json::from_slice::<serde::de::IgnoredAny>(body)?;

        let mut last_err = None;
        for _ in 0..MAX_NAME_ATTEMPTS {
            let filename = generate_filename();
            let path = self.dir.join(&filename);

            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(mut file) => {
                    write_or_discard(&mut file, &path, body)?;
                    return Ok(UploadRecord {
                        filename,
                        path,
                        size: body.len(),
                    });
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    tracing::debug!(file = %filename, "colisión de nombre, reintentando");
                    last_err = Some(e);
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(last_err
            .unwrap_or_else(|| io::Error::new(io::ErrorKind::AlreadyExists, "no free filename"))
            .into())
    }
}

/// Destino de un upload que además puede forzarse a disco
trait DurableWrite: Write {
    fn sync(&mut self) -> io::Result<()>;
}

impl DurableWrite for File {
    fn sync(&mut self) -> io::Result<()> {
        self.sync_all()
    }
}

/// Escribe el body completo; si falla, elimina el archivo a medio escribir
///
/// Un upload reportado como fallido nunca deja un archivo en `uploads/`.
fn write_or_discard<W: DurableWrite>(file: &mut W, path: &Path, body: &[u8]) -> io::Result<()> {
    let result = file.write_all(body).and_then(|_| file.sync());

    if let Err(e) = &result {
        tracing::error!(path = %path.display(), error = %e, "escritura fallida, descartando archivo");
        if let Err(remove_err) = fs::remove_file(path) {
            tracing::error!(path = %path.display(), error = %remove_err, "no se pudo eliminar el archivo");
        }
    }
    result
}

/// `upload_<YYYYmmdd_HHMMSS>_<8 hex>.json` (hora UTC)
fn generate_filename() -> String {
    let timestamp = Utc::now().format("%Y%m%d_%H%M%S");
    let suffix: u32 = rand::thread_rng().gen();
    format!("upload_{}_{:08x}.json", timestamp, suffix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;

    static COUNTER: AtomicUsize = AtomicUsize::new(0);

    fn temp_root() -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "mt_http_upload_{}_{}",
            std::process::id(),
            COUNTER.fetch_add(1, Ordering::SeqCst)
        ));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_new_creates_uploads_dir() {
        let root = temp_root();
        let store = UploadStore::new(&root).unwrap();

        assert!(store.dir().is_dir());
        assert_eq!(store.dir(), root.join("uploads"));
    }

    #[test]
    fn test_save_writes_raw_bytes() {
        let root = temp_root();
        let store = UploadStore::new(&root).unwrap();
        let body = br#"{ "name": "test",   "values": [1, 2, 3] }"#;

        let record = store.save(body).unwrap();

        assert_eq!(fs::read(&record.path).unwrap(), body.to_vec());
        assert_eq!(record.size, body.len());
        assert_eq!(record.public_path(), format!("/uploads/{}", record.filename));
    }

    #[test]
    fn test_filename_format() {
        let name = generate_filename();

        assert!(name.starts_with("upload_"));
        assert!(name.ends_with(".json"));
        // upload_ + 8 + _ + 6 + _ + 8 + .json
        assert_eq!(name.len(), 7 + 8 + 1 + 6 + 1 + 8 + 5);
    }

    #[test]
    fn test_invalid_json_rejected() {
        let root = temp_root();
        let store = UploadStore::new(&root).unwrap();

        for body in [&b"{not json"[..], b"", b"{\"a\": 1} trailing"] {
            assert!(matches!(store.save(body), Err(UploadError::InvalidJson(_))));
        }
        assert_eq!(fs::read_dir(store.dir()).unwrap().count(), 0);
    }

    /// Escribe la mitad del body y después falla (disco lleno)
    struct FailingWriter {
        written: Vec<u8>,
        fail_on_sync: bool,
    }

    impl Write for FailingWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.fail_on_sync || self.written.is_empty() {
                let n = if self.fail_on_sync { buf.len() } else { buf.len() / 2 };
                self.written.extend_from_slice(&buf[..n]);
                Ok(n)
            } else {
                Err(io::Error::new(io::ErrorKind::Other, "no space left on device"))
            }
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl DurableWrite for FailingWriter {
        fn sync(&mut self) -> io::Result<()> {
            if self.fail_on_sync {
                Err(io::Error::new(io::ErrorKind::Other, "sync failed"))
            } else {
                Ok(())
            }
        }
    }

    #[test]
    fn test_failed_write_removes_partial_file() {
        let root = temp_root();
        let store = UploadStore::new(&root).unwrap();

        for fail_on_sync in [false, true] {
            let path = store.dir().join(generate_filename());
            fs::write(&path, b"{\"par").unwrap();

            let mut writer = FailingWriter {
                written: Vec::new(),
                fail_on_sync,
            };
            let result = write_or_discard(&mut writer, &path, br#"{"partial": true}"#);

            assert!(result.is_err());
            assert!(!path.exists(), "fail_on_sync = {}", fail_on_sync);
        }
        assert_eq!(fs::read_dir(store.dir()).unwrap().count(), 0);
    }

    #[test]
    fn test_successful_write_keeps_file() {
        let root = temp_root();
        let path = root.join("ok.json");
        let mut file = File::create(&path).unwrap();

        write_or_discard(&mut file, &path, b"{}").unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"{}");
    }

    #[test]
    fn test_concurrent_saves_never_collide() {
        let root = temp_root();
        let store = Arc::new(UploadStore::new(&root).unwrap());

        let handles: Vec<_> = (0..20)
            .map(|i| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    let body = format!(r#"{{"id": {}}}"#, i);
                    store.save(body.as_bytes()).unwrap()
                })
            })
            .collect();

        let records: Vec<UploadRecord> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let names: HashSet<_> = records.iter().map(|r| r.filename.clone()).collect();

        assert_eq!(names.len(), 20);
        assert_eq!(fs::read_dir(store.dir()).unwrap().count(), 20);
    }
}
