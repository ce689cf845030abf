//! # Módulo de Políticas de Admisión
//!
//! Este módulo define la estrategia con la que un [`ModuleLock`](crate::ModuleLock)
//! elige a quién conceder el módulo cuando queda libre. Sólo se implementa
//! FCFS; otras políticas (prioridad, trabajo más corto primero) se pueden
//! sustituir sin tocar el ejecutor ni el planificador.

use std::fmt;
use std::time::Duration;

use crate::process::ProcessId;

/// Solicitud pendiente de acceso a un módulo.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Request {
    /// Número de secuencia asignado al emitir la solicitud
    pub ticket: u64,
    /// Proceso solicitante
    pub requester: ProcessId,
    /// Momento en que se emitió la solicitud
    pub issued_at: Duration,
}

/// Estrategia de admisión de un módulo.
///
/// `admit` recibe las solicitudes pendientes (nunca vacío) y devuelve el
/// índice de la que debe recibir el módulo.
pub trait AdmissionPolicy: Send + Sync + fmt::Debug {
    /// Nombre corto de la política, para logs y reportes
    fn name(&self) -> &'static str;

    /// Elige la siguiente solicitud a conceder.
    fn admit(&self, pending: &[Request]) -> Option<usize>;
}

/// First-Come First-Served: concede al ticket más bajo pendiente.
///
/// El orden lo fija el momento en que se emite la solicitud, no qué hilo
/// despierta primero, así que el resultado es reproducible.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Fcfs;

impl AdmissionPolicy for Fcfs {
    fn name(&self) -> &'static str {
        "FCFS"
    }

    fn admit(&self, pending: &[Request]) -> Option<usize> {
        pending
            .iter()
            .enumerate()
            .min_by_key(|(_, request)| request.ticket)
            .map(|(index, _)| index)
    }
}

impl fmt::Display for Fcfs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FCFS")
    }
}
