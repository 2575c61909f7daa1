//! # Servidor TCP Concurrente
//! src/server/tcp.rs
//!
//! El listener acepta conexiones en un único thread y las entrega al pool de
//! workers. Nunca procesa requests por sí mismo: si la cola está llena,
//! responde 503 y cierra.

use std::io::{self, Write};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use socket2::{Domain, Protocol, Socket, Type};

use crate::config::Config;
use crate::error::HandlerError;
use crate::http::Persistence;
use crate::pool::{Rejected, ThreadPool};

use super::connection::{lingering_close, serve_connection, Connection};
use super::ServerContext;

/// Sobre esta fracción de workers ocupados se loguea una advertencia
const HIGH_UTILIZATION: f64 = 0.7;

const REJECT_TIMEOUT: Duration = Duration::from_millis(100);

/// Servidor HTTP/1.1 con pool de threads
pub struct Server {
    listener: TcpListener,
    local_addr: SocketAddr,
    ctx: Arc<ServerContext>,
    threads: usize,
    queue_capacity: usize,
}

/// Permite detener un `Server` que corre en otro thread
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    flag: Arc<AtomicBool>,
    wake_addr: SocketAddr,
}

impl ShutdownHandle {
    /// Marca el shutdown y despierta al listener bloqueado en `accept`
    pub fn shutdown(&self) {
        if self.flag.swap(true, Ordering::SeqCst) {
            return;
        }
        tracing::info!("shutdown solicitado");
        let _ = TcpStream::connect_timeout(&self.wake_addr, Duration::from_secs(1));
    }
}

impl Server {
    /// Abre el socket de escucha y prepara el directorio de recursos
    ///
    /// Con `port = 0` el sistema elige un puerto libre (ver `local_addr`).
    pub fn bind(config: &Config) -> io::Result<Self> {
        let addr = config
            .address()
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("cannot resolve {}", config.address()),
                )
            })?;

        let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;
        socket.set_reuse_address(true)?;
        socket.bind(&addr.into())?;
        socket.listen(config.backlog)?;

        let listener: TcpListener = socket.into();
        let local_addr = listener.local_addr()?;
        let ctx = Arc::new(ServerContext::new(config, local_addr.port())?);

        tracing::info!(
            address = %local_addr,
            backlog = config.backlog,
            aliases = ?ctx.validator().aliases(),
            "servidor escuchando"
        );

        Ok(Self {
            listener,
            local_addr,
            ctx,
            threads: config.threads,
            queue_capacity: config.queue_capacity,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn context(&self) -> &Arc<ServerContext> {
        &self.ctx
    }

    pub fn handle(&self) -> ShutdownHandle {
        let wake_ip = match self.local_addr.ip() {
            IpAddr::V4(ip) if ip.is_unspecified() => IpAddr::V4(Ipv4Addr::LOCALHOST),
            IpAddr::V6(ip) if ip.is_unspecified() => IpAddr::V6(Ipv6Addr::LOCALHOST),
            ip => ip,
        };

        ShutdownHandle {
            flag: self.ctx.shutdown_flag(),
            wake_addr: SocketAddr::new(wake_ip, self.local_addr.port()),
        }
    }

    /// Loop de aceptación; retorna después del shutdown, con los workers ya
    /// terminados
    pub fn run(self) -> io::Result<()> {
        let mut pool = {
            let ctx = Arc::clone(&self.ctx);
            ThreadPool::new(self.threads, self.queue_capacity, move |connection: Connection| {
                serve_connection(connection, Arc::clone(&ctx));
            })?
        };
        tracing::info!(
            workers = self.threads,
            queue_capacity = self.queue_capacity,
            "pool de workers listo"
        );

        for stream in self.listener.incoming() {
            if self.ctx.is_shutting_down() {
                break;
            }

            match stream {
                Ok(stream) => self.dispatch(&pool, stream),
                Err(e) => tracing::warn!(error = %e, "error al aceptar conexión"),
            }
        }

        tracing::info!(queued = pool.stats().queued, "deteniendo workers");
        pool.shutdown();
        tracing::info!("servidor detenido");
        Ok(())
    }

    fn dispatch(&self, pool: &ThreadPool<Connection>, stream: TcpStream) {
        let peer = match stream.peer_addr() {
            Ok(peer) => peer,
            Err(e) => {
                tracing::debug!(error = %e, "conexión sin peer");
                return;
            }
        };

        match pool.submit(Connection { stream, peer }) {
            Ok(()) => {
                let stats = pool.stats();
                if stats.utilization() > HIGH_UTILIZATION {
                    tracing::warn!(
                        active = stats.active_workers,
                        total = stats.total_workers,
                        queued = stats.queued,
                        "pool con alta utilización"
                    );
                }
            }
            Err(Rejected { task, reason }) => {
                tracing::warn!(peer = %task.peer, ?reason, "cola llena, conexión rechazada");
                reject(task.stream);
            }
        }
    }
}

/// Responde 503 y cierra, sin pasar por el pool
fn reject(mut stream: TcpStream) {
    let response = HandlerError::CapacityExceeded.into_response();

    let _ = stream.set_write_timeout(Some(REJECT_TIMEOUT));
    if stream
        .write_all(&response.to_bytes(Persistence::Close))
        .is_ok()
    {
        lingering_close(&mut stream);
    }
}
