//! # Manejo de una Conexión (máquina de estados)
//! src/server/connection.rs
//!
//! Cada conexión aceptada la procesa un único worker, request por request,
//! siguiendo estos estados:
//!
//! ```text
//!              ┌──────────────────────────────────────────────┐
//!              ▼                                              │ keep-alive
//! AwaitRequest ──▶ Parsing ──▶ Routing ──▶ Responding ────────┘
//!      │              │                        │
//!      │ EOF/timeout  │ 400 (malformed/large)  │ close / max / error
//!      ▼              └────────▶ Responding ──▶▼
//!    Closed ◀──────────────────────────────── Closed
//! ```
//!
//! - `AwaitRequest`: espera el próximo request con el timeout de inactividad.
//! - `Parsing`: acumula bytes hasta tener un request completo o pasar el límite.
//! - `Routing`: validación de seguridad y dispatch (ver `router`).
//! - `Responding`: escribe la respuesta y decide si la conexión sigue.
//! - `Closed`: terminal; el socket se cierra y no se vuelve a usar.

use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::HandlerError;
use crate::http::{Parsed, Persistence, Request, Response};
use crate::router;

use super::ServerContext;

const READ_CHUNK: usize = 4096;

const LINGER_TIMEOUT: Duration = Duration::from_millis(100);
const LINGER_MAX_BYTES: usize = 64 * 1024;

/// Transporte de una conexión (un `TcpStream` en producción)
pub trait Transport: Read + Write {
    /// Timeout de lectura/escritura mientras se espera al cliente
    fn set_idle_timeout(&mut self, timeout: Duration) -> io::Result<()>;

    /// Cierra el transporte en ambos sentidos
    fn close(&mut self);
}

impl Transport for TcpStream {
    fn set_idle_timeout(&mut self, timeout: Duration) -> io::Result<()> {
        self.set_read_timeout(Some(timeout))?;
        self.set_write_timeout(Some(timeout))
    }

    fn close(&mut self) {
        lingering_close(self);
    }
}

/// Cierra la escritura y descarta lo que el cliente todavía esté enviando
///
/// Cerrar un socket con bytes sin leer provoca un RST que puede hacer que el
/// cliente pierda la última respuesta (ej: un 400 por request demasiado grande).
pub(crate) fn lingering_close(stream: &mut TcpStream) {
    if stream.shutdown(Shutdown::Write).is_err() {
        return;
    }

    // Plazo total para todo el drenaje, no por lectura
    let deadline = Instant::now() + LINGER_TIMEOUT;
    let mut sink = [0u8; READ_CHUNK];
    let mut drained = 0;
    while drained < LINGER_MAX_BYTES {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() || stream.set_read_timeout(Some(remaining)).is_err() {
            break;
        }
        match stream.read(&mut sink) {
            Ok(0) | Err(_) => break,
            Ok(n) => drained += n,
        }
    }
}

/// Tarea que viaja por la cola del pool: una conexión recién aceptada
#[derive(Debug)]
pub struct Connection {
    pub stream: TcpStream,
    pub peer: SocketAddr,
}

/// Estados de la conexión
#[derive(Debug)]
pub enum State {
    AwaitRequest,
    Parsing,
    Routing(Request),
    Responding { response: Response, keep_alive: bool },
    Closed,
}

/// Procesa una conexión completa (punto de entrada de los workers)
pub fn serve_connection(connection: Connection, ctx: Arc<ServerContext>) -> usize {
    let Connection { stream, peer } = connection;
    ConnectionHandler::new(stream, peer.to_string(), ctx).run()
}

/// Estado por conexión; vive sólo en el worker que la procesa
pub struct ConnectionHandler<S: Transport> {
    stream: S,
    peer: String,
    ctx: Arc<ServerContext>,

    /// Bytes recibidos y todavía no consumidos por el parser
    buffer: Vec<u8>,

    requests_served: usize,
    keep_alive: bool,
}

impl<S: Transport> ConnectionHandler<S> {
    pub fn new(stream: S, peer: String, ctx: Arc<ServerContext>) -> Self {
        Self {
            stream,
            peer,
            ctx,
            buffer: Vec::with_capacity(READ_CHUNK),
            requests_served: 0,
            keep_alive: true,
        }
    }

    /// Corre la máquina de estados hasta `Closed`; retorna los requests servidos
    pub fn run(mut self) -> usize {
        tracing::info!(peer = %self.peer, "conexión abierta");

        let mut state = State::AwaitRequest;
        loop {
            state = match state {
                State::Closed => break,
                state => self.step(state),
            };
        }

        self.stream.close();
        tracing::info!(
            peer = %self.peer,
            requests = self.requests_served,
            "conexión cerrada"
        );
        self.requests_served
    }

    /// Ejecuta una transición
    pub fn step(&mut self, state: State) -> State {
        match state {
            State::AwaitRequest => self.await_request(),
            State::Parsing => self.parse(),
            State::Routing(request) => self.route(request),
            State::Responding {
                response,
                keep_alive,
            } => self.respond(response, keep_alive),
            State::Closed => State::Closed,
        }
    }

    pub fn requests_served(&self) -> usize {
        self.requests_served
    }

    pub fn is_keep_alive(&self) -> bool {
        self.keep_alive
    }

    fn await_request(&mut self) -> State {
        // Bytes sobrantes del request anterior: ya es el inicio del próximo
        if !self.buffer.is_empty() {
            return State::Parsing;
        }

        if let Err(e) = self.stream.set_idle_timeout(self.ctx.keep_alive_timeout()) {
            tracing::debug!(peer = %self.peer, error = %e, "no se pudo configurar timeout");
            return State::Closed;
        }

        match self.read_more() {
            Ok(0) => State::Closed,
            Ok(_) => State::Parsing,
            Err(e) if is_timeout(&e) => {
                tracing::info!(peer = %self.peer, "timeout de conexión");
                State::Closed
            }
            Err(e) => {
                tracing::debug!(peer = %self.peer, error = %e, "error de lectura");
                State::Closed
            }
        }
    }

    fn parse(&mut self) -> State {
        match Request::parse(&self.buffer, self.ctx.max_request_bytes()) {
            Ok(Parsed::Complete { request, consumed }) => {
                self.buffer.drain(..consumed);
                State::Routing(request)
            }
            Ok(Parsed::Partial) => match self.read_more() {
                Ok(0) => {
                    tracing::debug!(peer = %self.peer, "cliente cerró a mitad de request");
                    State::Closed
                }
                Ok(_) => State::Parsing,
                Err(e) => {
                    tracing::debug!(peer = %self.peer, error = %e, "error leyendo request");
                    State::Closed
                }
            },
            Err(e) => {
                tracing::warn!(peer = %self.peer, error = %e, "request inválido");
                self.buffer.clear();
                State::Responding {
                    response: HandlerError::from(e).into_response(),
                    keep_alive: false,
                }
            }
        }
    }

    fn route(&mut self, request: Request) -> State {
        tracing::info!(
            peer = %self.peer,
            method = request.method().as_str(),
            path = request.path(),
            version = request.version().as_str(),
            "request"
        );

        let ctx = &self.ctx;
        let response = panic::catch_unwind(AssertUnwindSafe(|| router::handle(ctx, &request)))
            .unwrap_or_else(|_| {
                tracing::error!(peer = %self.peer, path = request.path(), "panic procesando request");
                HandlerError::Internal("Unexpected error while handling the request".to_string())
                    .into_response()
            });

        let keep_alive = request.wants_keep_alive()
            && !response.closes_connection()
            && self.requests_served + 1 < self.ctx.max_requests()
            && !self.ctx.is_shutting_down();

        State::Responding {
            response,
            keep_alive,
        }
    }

    fn respond(&mut self, response: Response, keep_alive: bool) -> State {
        let persistence = if keep_alive {
            self.ctx.keep_alive()
        } else {
            Persistence::Close
        };

        let bytes = response.to_bytes(persistence);
        if let Err(e) = self
            .stream
            .write_all(&bytes)
            .and_then(|_| self.stream.flush())
        {
            tracing::debug!(peer = %self.peer, error = %e, "error escribiendo respuesta");
            return State::Closed;
        }

        self.requests_served += 1;
        self.keep_alive = keep_alive && self.requests_served < self.ctx.max_requests();

        tracing::info!(
            peer = %self.peer,
            status = response.status().as_u16(),
            bytes = response.body().len(),
            keep_alive = self.keep_alive,
            "respuesta enviada"
        );

        if self.keep_alive {
            State::AwaitRequest
        } else {
            State::Closed
        }
    }

    fn read_more(&mut self) -> io::Result<usize> {
        let mut chunk = [0u8; READ_CHUNK];
        loop {
            match self.stream.read(&mut chunk) {
                Ok(n) => {
                    self.buffer.extend_from_slice(&chunk[..n]);
                    return Ok(n);
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
    }
}

fn is_timeout(error: &io::Error) -> bool {
    matches!(
        error.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
    )
}
