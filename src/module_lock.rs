//! # Módulo de Exclusión por Módulo
//!
//! Un [`ModuleLock`] serializa el acceso a un módulo. Cada solicitud recibe un
//! ticket creciente en el instante en que se emite, antes de bloquear, y el
//! módulo se concede según la [`AdmissionPolicy`] configurada (FCFS: el ticket
//! más bajo pendiente). Así el orden de concesión no depende de qué hilo
//! planifique primero el sistema operativo.
//!
//! El estado compartido (titular y cola) está protegido por un `Mutex`; el
//! trabajo simulado ocurre fuera de él.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use tracing::trace;

use crate::clock::Clock;
use crate::error::SimulationError;
use crate::policy::{AdmissionPolicy, Request};
use crate::process::ProcessId;
use crate::sync::{lock, wait};

/// Comprobante de una solicitud emitida con [`ModuleLock::request`].
///
/// Se consume al esperar la concesión.
#[derive(Debug, PartialEq, Eq)]
pub struct Ticket {
    module_id: String,
    number: u64,
}

impl Ticket {
    /// Número de secuencia dentro del módulo (orden de emisión)
    pub fn number(&self) -> u64 {
        self.number
    }
}

#[derive(Debug)]
struct Holder {
    ticket: u64,
    process: ProcessId,
    granted_at: Duration,
}

#[derive(Debug, Default)]
struct LockState {
    next_ticket: u64,
    holder: Option<Holder>,
    pending: Vec<Request>,
    /// Tickets cuyo hilo está bloqueado, con su slot de reloj
    parked: BTreeMap<u64, usize>,
    aborted: bool,
}

/// Primitiva de exclusión de un módulo con admisión ordenada.
pub struct ModuleLock {
    module_id: String,
    state: Mutex<LockState>,
    granted: Condvar,
    policy: Arc<dyn AdmissionPolicy>,
    clock: Arc<dyn Clock>,
}

impl ModuleLock {
    /// Crea el lock de un módulo.
    ///
    /// # Arguments
    ///
    /// * `module_id` - Identificador del módulo
    /// * `policy` - Política que decide el orden de concesión
    /// * `clock` - Reloj de la ejecución, para sellar las concesiones
    pub fn new(
        module_id: impl Into<String>,
        policy: Arc<dyn AdmissionPolicy>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            module_id: module_id.into(),
            state: Mutex::new(LockState::default()),
            granted: Condvar::new(),
            policy,
            clock,
        }
    }

    pub fn module_id(&self) -> &str {
        &self.module_id
    }

    /// Emite una solicitud sin bloquear.
    ///
    /// El ticket devuelto fija la posición del solicitante en el orden de
    /// admisión. Si el módulo está libre se concede en el acto.
    ///
    /// # Errors
    ///
    /// - `DoubleAcquire` si `requester` ya tiene o ya solicitó el módulo
    /// - `Aborted` si la ejecución fue abortada
    pub fn request(
        &self,
        requester: &ProcessId,
        issued_at: Duration,
    ) -> Result<Ticket, SimulationError> {
        let mut state = lock(&self.state);
        if state.aborted {
            return Err(SimulationError::Aborted);
        }

        let holds = state
            .holder
            .as_ref()
            .is_some_and(|holder| holder.process == *requester);
        let queued = state.pending.iter().any(|r| r.requester == *requester);
        if holds || queued {
            return Err(SimulationError::DoubleAcquire(self.module_id.clone()));
        }

        let number = state.next_ticket;
        state.next_ticket += 1;
        state.pending.push(Request {
            ticket: number,
            requester: requester.clone(),
            issued_at,
        });
        trace!(module = %self.module_id, process = %requester, ticket = number, "request issued");

        self.grant_next(&mut state);

        Ok(Ticket {
            module_id: self.module_id.clone(),
            number,
        })
    }

    /// Bloquea hasta que el ticket recibe el módulo.
    ///
    /// # Arguments
    ///
    /// * `ticket` - Ticket emitido por este mismo lock
    /// * `slot` - Slot de reloj del hilo que espera
    ///
    /// # Returns
    ///
    /// El instante en que el módulo fue concedido
    ///
    /// # Errors
    ///
    /// - `Aborted` si la ejecución se aborta mientras espera
    /// - `UnknownModule` si el ticket pertenece a otro módulo
    pub fn wait(&self, ticket: Ticket, slot: usize) -> Result<Duration, SimulationError> {
        if ticket.module_id != self.module_id {
            return Err(SimulationError::UnknownModule(ticket.module_id));
        }

        let mut state = lock(&self.state);
        let granted_at = loop {
            if let Some(holder) = state.holder.as_ref().filter(|h| h.ticket == ticket.number) {
                break holder.granted_at;
            }

            if state.aborted {
                state.pending.retain(|r| r.ticket != ticket.number);
                state.parked.remove(&ticket.number);
                return Err(SimulationError::Aborted);
            }

            if !state.parked.contains_key(&ticket.number) {
                state.parked.insert(ticket.number, slot);
                trace!(module = %self.module_id, ticket = ticket.number, "waiting for module");
                self.clock.park(slot);
            }

            state = wait(&self.granted, state);
        };
        drop(state);

        self.clock.resume(slot);
        Ok(granted_at)
    }

    /// Solicita el módulo y bloquea hasta obtenerlo.
    ///
    /// # Returns
    ///
    /// El instante de concesión; la espera es `granted - issued_at`
    ///
    /// # Examples
    ///
    /// ```rust
    /// use std::sync::Arc;
    /// use std::time::Duration;
    /// use cluster_process_simulator::{Fcfs, ModuleLock, ProcessId, RealClock};
    ///
    /// let lock = ModuleLock::new("arm", Arc::new(Fcfs), Arc::new(RealClock::new()));
    /// let p1 = ProcessId::from("p1");
    ///
    /// let granted = lock.acquire(&p1, 0, Duration::ZERO).unwrap();
    /// assert_eq!(lock.holder(), Some(p1.clone()));
    /// lock.release(&p1).unwrap();
    /// # let _ = granted;
    /// ```
    pub fn acquire(
        &self,
        requester: &ProcessId,
        slot: usize,
        issued_at: Duration,
    ) -> Result<Duration, SimulationError> {
        let ticket = self.request(requester, issued_at)?;
        self.wait(ticket, slot)
    }

    /// Libera el módulo y lo concede al siguiente según la política.
    ///
    /// # Errors
    ///
    /// `ReleaseByNonHolder` si `requester` no es el titular actual
    pub fn release(&self, requester: &ProcessId) -> Result<(), SimulationError> {
        let mut state = lock(&self.state);
        match &state.holder {
            Some(holder) if holder.process == *requester => {
                trace!(module = %self.module_id, process = %requester, "module released");
                state.holder = None;
                self.grant_next(&mut state);
                Ok(())
            }
            _ => Err(SimulationError::ReleaseByNonHolder(self.module_id.clone())),
        }
    }

    /// Despierta a todos los que esperan con `Aborted` y rechaza nuevas solicitudes.
    pub fn abort(&self) {
        let mut state = lock(&self.state);
        state.aborted = true;
        self.granted.notify_all();
    }

    /// Proceso que tiene el módulo en este momento.
    pub fn holder(&self) -> Option<ProcessId> {
        lock(&self.state)
            .holder
            .as_ref()
            .map(|holder| holder.process.clone())
    }

    /// Número de solicitudes pendientes de concesión.
    pub fn queue_len(&self) -> usize {
        lock(&self.state).pending.len()
    }

    fn grant_next(&self, state: &mut LockState) {
        if state.holder.is_some() || state.pending.is_empty() {
            return;
        }
        let Some(index) = self
            .policy
            .admit(&state.pending)
            .filter(|index| *index < state.pending.len())
        else {
            return;
        };

        let request = state.pending.remove(index);
        let granted_at = self.clock.now();
        trace!(
            module = %self.module_id,
            process = %request.requester,
            ticket = request.ticket,
            policy = self.policy.name(),
            "module granted"
        );
        if let Some(slot) = state.parked.remove(&request.ticket) {
            self.clock.unpark(slot);
        }
        state.holder = Some(Holder {
            ticket: request.ticket,
            process: request.requester,
            granted_at,
        });
        self.granted.notify_all();
    }
}

impl fmt::Debug for ModuleLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleLock")
            .field("module_id", &self.module_id)
            .field("policy", &self.policy.name())
            .finish_non_exhaustive()
    }
}
