//! # Módulo del Servidor HTTP
//! src/server/mod.rs
//!
//! Este módulo implementa el servidor TCP que:
//! 1. Escucha en un puerto (`tcp`)
//! 2. Acepta conexiones y las encola en el pool de workers
//! 3. Procesa cada conexión como una máquina de estados (`connection`)
//! 4. Comparte la configuración efectiva con los workers (`context`)

pub mod connection;
pub mod context;
pub mod tcp;

pub use connection::{Connection, ConnectionHandler, State, Transport};
pub use context::ServerContext;
pub use tcp::{Server, ShutdownHandle};
