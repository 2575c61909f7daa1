//! # Cola Acotada de Tareas
//! src/pool/queue.rs
//!
//! Cola FIFO thread-safe con capacidad máxima. El listener encola sin
//! bloquear (si está llena, la tarea vuelve al llamador); los workers
//! desencolan bloqueando hasta que haya tareas o la cola se cierre.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard};

struct QueueState<T> {
    items: VecDeque<T>,
    closed: bool,
}

/// Razón por la que una tarea no pudo encolarse
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushError {
    /// La cola alcanzó su capacidad máxima
    Full,

    /// La cola fue cerrada (shutdown)
    Closed,
}

/// Cola acotada compartida entre el listener y los workers
pub struct TaskQueue<T> {
    state: Mutex<QueueState<T>>,

    /// Condvar para despertar workers cuando hay tareas o al cerrar
    available: Condvar,

    capacity: usize,
}

impl<T> TaskQueue<T> {
    /// Crea una nueva cola con capacidad máxima
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Mutex::new(QueueState {
                items: VecDeque::with_capacity(capacity),
                closed: false,
            }),
            available: Condvar::new(),
            capacity,
        }
    }

    // Un panic con el lock tomado no deja la cola inconsistente: cada
    // operación modifica el estado en un solo paso.
    fn lock(&self) -> MutexGuard<'_, QueueState<T>> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Encola una tarea sin bloquear
    ///
    /// Si la cola está llena o cerrada, retorna la tarea junto con la razón.
    pub fn try_push(&self, task: T) -> Result<(), (T, PushError)> {
        let mut state = self.lock();

        if state.closed {
            return Err((task, PushError::Closed));
        }
        if state.items.len() >= self.capacity {
            return Err((task, PushError::Full));
        }

        state.items.push_back(task);

        // Notificar a un worker esperando
        self.available.notify_one();

        Ok(())
    }

    /// Desencola la tarea más antigua
    ///
    /// Bloquea hasta que haya una tarea. Retorna `None` sólo cuando la cola
    /// está cerrada y vacía: las tareas ya encoladas se entregan igual.
    pub fn pop(&self) -> Option<T> {
        let mut state = self.lock();

        loop {
            if let Some(task) = state.items.pop_front() {
                return Some(task);
            }
            if state.closed {
                return None;
            }
            state = self
                .available
                .wait(state)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
        }
    }

    /// Cierra la cola: no acepta más tareas y despierta a todos los workers
    pub fn close(&self) {
        let mut state = self.lock();
        state.closed = true;
        self.available.notify_all();
    }

    /// Retorna el tamaño actual de la cola
    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    /// Verifica si la cola está vacía
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Retorna la capacidad máxima
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }
}
