//! # Pool de Workers
//! src/pool/mod.rs
//!
//! Pool fijo de threads que consumen tareas de una cola acotada.
//!
//! ```text
//! Listener ──submit──▶ [ TaskQueue (cap Q) ] ──pop──▶ worker-1 .. worker-N
//! ```
//!
//! - Cada worker procesa una tarea hasta el final (una conexión completa,
//!   con todos sus requests keep-alive) y vuelve a esperar.
//! - Un worker sólo termina en el shutdown: un panic dentro del handler se
//!   captura y se loguea.
//! - `submit` nunca bloquea: si la cola está llena, la tarea vuelve al
//!   llamador para que responda 503.

pub mod queue;

pub use queue::{PushError, TaskQueue};

use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};

/// Tarea rechazada por el pool, devuelta al llamador
#[derive(Debug)]
pub struct Rejected<T> {
    pub task: T,
    pub reason: PushError,
}

/// Snapshot del estado del pool (diagnóstico)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    pub active_workers: usize,
    pub total_workers: usize,
    pub queued: usize,
    pub queue_capacity: usize,
}

impl PoolStats {
    /// Fracción de workers ocupados (0.0 - 1.0)
    pub fn utilization(&self) -> f64 {
        if self.total_workers == 0 {
            return 0.0;
        }
        self.active_workers as f64 / self.total_workers as f64
    }
}

struct Worker {
    id: usize,
    thread: Option<JoinHandle<()>>,
}

/// Pool de threads con cola acotada
pub struct ThreadPool<T: Send + 'static> {
    queue: Arc<TaskQueue<T>>,
    workers: Vec<Worker>,

    /// Workers procesando una tarea en este momento
    active: Arc<Mutex<usize>>,
}

/// Decrementa el contador de activos al salir, incluso si hubo panic
struct ActiveGuard<'a>(&'a Mutex<usize>);

impl<'a> ActiveGuard<'a> {
    fn enter(counter: &'a Mutex<usize>) -> Self {
        *lock_counter(counter) += 1;
        ActiveGuard(counter)
    }
}

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        let mut active = lock_counter(self.0);
        *active = active.saturating_sub(1);
    }
}

fn lock_counter(counter: &Mutex<usize>) -> MutexGuard<'_, usize> {
    counter.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl<T: Send + 'static> ThreadPool<T> {
    /// Crea el pool y arranca `size` workers
    ///
    /// # Ejemplo
    /// ```
    /// use mt_http_server::pool::ThreadPool;
    /// use std::sync::mpsc;
    ///
    /// let (tx, rx) = mpsc::channel();
    /// let tx = std::sync::Mutex::new(tx);
    /// let mut pool = ThreadPool::new(2, 4, move |n: u32| {
    ///     tx.lock().unwrap().send(n * 2).unwrap();
    /// })
    /// .unwrap();
    ///
    /// pool.submit(21).unwrap();
    /// assert_eq!(rx.recv().unwrap(), 42);
    /// pool.shutdown();
    /// ```
    pub fn new<F>(size: usize, queue_capacity: usize, handler: F) -> io::Result<Self>
    where
        F: Fn(T) + Send + Sync + 'static,
    {
        if size == 0 || queue_capacity == 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "pool size and queue capacity must be >= 1",
            ));
        }

        let queue = Arc::new(TaskQueue::new(queue_capacity));
        let active = Arc::new(Mutex::new(0));
        let handler = Arc::new(handler);

        let mut pool = Self {
            queue,
            workers: Vec::with_capacity(size),
            active,
        };

        for id in 1..=size {
            let queue = Arc::clone(&pool.queue);
            let active = Arc::clone(&pool.active);
            let handler = Arc::clone(&handler);

            let spawned = thread::Builder::new()
                .name(format!("worker-{}", id))
                .spawn(move || Self::worker_loop(id, queue, active, handler));

            match spawned {
                Ok(handle) => pool.workers.push(Worker {
                    id,
                    thread: Some(handle),
                }),
                Err(e) => {
                    // Drop hace shutdown de los workers ya creados
                    return Err(e);
                }
            }
        }

        tracing::debug!(workers = size, queue_capacity, "pool iniciado");
        Ok(pool)
    }

    fn worker_loop<F>(id: usize, queue: Arc<TaskQueue<T>>, active: Arc<Mutex<usize>>, handler: Arc<F>)
    where
        F: Fn(T) + Send + Sync + 'static,
    {
        while let Some(task) = queue.pop() {
            let _guard = ActiveGuard::enter(&active);
            tracing::debug!(worker = id, "tarea desencolada");

            if panic::catch_unwind(AssertUnwindSafe(|| handler(task))).is_err() {
                tracing::error!(worker = id, "panic procesando tarea; el worker sigue activo");
            }
        }

        tracing::debug!(worker = id, "worker terminado");
    }

    /// Intenta encolar una tarea sin bloquear
    pub fn submit(&self, task: T) -> Result<(), Rejected<T>> {
        self.queue
            .try_push(task)
            .map_err(|(task, reason)| Rejected { task, reason })
    }

    /// Workers ocupados en este momento
    pub fn active_workers(&self) -> usize {
        *lock_counter(&self.active)
    }

    pub fn size(&self) -> usize {
        self.workers.len()
    }

    /// Snapshot del estado del pool
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            active_workers: self.active_workers(),
            total_workers: self.workers.len(),
            queued: self.queue.len(),
            queue_capacity: self.queue.capacity(),
        }
    }

    /// Deja de aceptar tareas, espera a que se procese lo encolado y lo que
    /// está en curso, y hace join de todos los workers. Idempotente.
    pub fn shutdown(&mut self) {
        self.queue.close();

        for worker in &mut self.workers {
            if let Some(handle) = worker.thread.take() {
                if handle.join().is_err() {
                    tracing::error!(worker = worker.id, "worker terminó con panic");
                }
            }
        }
    }
}

impl<T: Send + 'static> Drop for ThreadPool<T> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc;
    use std::time::Duration;

    #[test]
    fn test_pool_processes_all_tasks() {
        let done = Arc::new(AtomicUsize::new(0));
        let mut pool = {
            let done = Arc::clone(&done);
            ThreadPool::new(4, 100, move |_: usize| {
                done.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap()
        };

        for i in 0..50 {
            pool.submit(i).unwrap();
        }
        pool.shutdown();

        assert_eq!(done.load(Ordering::SeqCst), 50);
    }

    #[test]
    fn test_zero_size_is_rejected() {
        assert!(ThreadPool::new(0, 10, |_: ()| {}).is_err());
        assert!(ThreadPool::new(2, 0, |_: ()| {}).is_err());
    }

    #[test]
    fn test_full_queue_returns_task() {
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let release_rx = Mutex::new(release_rx);
        let (started_tx, started_rx) = mpsc::channel::<()>();
        let started_tx = Mutex::new(started_tx);

        let mut pool = ThreadPool::new(1, 1, move |_: u32| {
            started_tx.lock().unwrap().send(()).unwrap();
            release_rx.lock().unwrap().recv().unwrap();
        })
        .unwrap();

        // El único worker queda ocupado con la tarea 1
        pool.submit(1).unwrap();
        started_rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(pool.active_workers(), 1);

        // La tarea 2 ocupa la cola; la 3 es rechazada
        pool.submit(2).unwrap();
        let rejected = pool.submit(3).unwrap_err();
        assert_eq!(rejected.task, 3);
        assert_eq!(rejected.reason, PushError::Full);

        let stats = pool.stats();
        assert_eq!(stats.queued, 1);
        assert_eq!(stats.total_workers, 1);
        assert_eq!(stats.utilization(), 1.0);

        release_tx.send(()).unwrap();
        release_tx.send(()).unwrap();
        pool.shutdown();
        assert_eq!(pool.active_workers(), 0);
    }

    #[test]
    fn test_panic_does_not_kill_worker() {
        let done = Arc::new(AtomicUsize::new(0));
        let mut pool = {
            let done = Arc::clone(&done);
            ThreadPool::new(1, 10, move |n: u32| {
                if n == 0 {
                    panic!("boom");
                }
                done.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap()
        };

        pool.submit(0).unwrap();
        pool.submit(1).unwrap();
        pool.submit(2).unwrap();
        pool.shutdown();

        assert_eq!(done.load(Ordering::SeqCst), 2);
        assert_eq!(pool.active_workers(), 0);
    }

    #[test]
    fn test_submit_after_shutdown() {
        let mut pool = ThreadPool::new(1, 1, |_: u8| {}).unwrap();
        pool.shutdown();

        let rejected = pool.submit(9).unwrap_err();
        assert_eq!(rejected.reason, PushError::Closed);
    }
}
