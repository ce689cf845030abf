//! # Módulo de Errores
//!
//! Clasificación de los errores que puede producir una ejecución. Todos son
//! irrecuperables: el primero que aparece bloquea la ejecución completa.

use std::io;

use thiserror::Error;

use crate::operation::Operation;
use crate::process::ProcessId;
use crate::scheduler::RunState;

/// Tipo de fallo detectado al ejecutar una operación o al manipular un módulo.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SimulationError {
    /// La operación referencia un módulo que no está en el registro
    #[error("module `{0}` is not registered")]
    UnknownModule(String),

    /// PLACE sin un PICK pendiente sobre el mismo módulo
    #[error("PLACE on `{0}` without an outstanding PICK")]
    UnmatchedPlace(String),

    /// PICK sobre un módulo que el proceso ya tiene o ya solicitó
    #[error("`{0}` is already held or requested by this process")]
    DoubleAcquire(String),

    /// Duración negativa o que no cabe en la unidad de tiempo
    #[error("invalid duration {0}")]
    InvalidDuration(i64),

    /// Liberación intentada por quien no tiene el módulo
    #[error("release of `{0}` by a process that does not hold it")]
    ReleaseByNonHolder(String),

    /// El proceso terminó su secuencia sin liberar el módulo
    #[error("process finished while still holding `{0}`")]
    UnreleasedModule(String),

    /// La ejecución fue abortada por el fallo de otro proceso
    #[error("run aborted")]
    Aborted,
}

/// Error de una ejecución completa del [`Scheduler`](crate::Scheduler).
#[derive(Debug, Error)]
pub enum RunError {
    #[error("process {process} failed at operation #{index} ({operation}): {source}")]
    Operation {
        process: ProcessId,
        index: usize,
        operation: Operation,
        #[source]
        source: SimulationError,
    },

    #[error("process {process} stopped because the run was aborted")]
    Aborted { process: ProcessId },

    #[error("runner thread for process {process} panicked")]
    Panicked { process: ProcessId },

    #[error("could not spawn runner thread for process {process}")]
    Spawn {
        process: ProcessId,
        #[source]
        source: io::Error,
    },

    #[error("duplicate process id {0}")]
    DuplicateProcess(ProcessId),

    #[error("scheduler cannot run from state {0}")]
    NotRunnable(RunState),
}

impl RunError {
    /// Clasificación del fallo, si se originó en una operación.
    pub fn kind(&self) -> Option<&SimulationError> {
        match self {
            Self::Operation { source, .. } => Some(source),
            _ => None,
        }
    }

    /// Proceso que originó el error, si lo hay.
    pub fn process(&self) -> Option<&ProcessId> {
        match self {
            Self::Operation { process, .. }
            | Self::Aborted { process }
            | Self::Panicked { process }
            | Self::Spawn { process, .. }
            | Self::DuplicateProcess(process) => Some(process),
            Self::NotRunnable(_) => None,
        }
    }

    /// `true` para errores secundarios: un hermano abortado por otro fallo.
    pub(crate) fn is_secondary(&self) -> bool {
        matches!(self, Self::Aborted { .. })
            || matches!(
                self,
                Self::Operation {
                    source: SimulationError::Aborted,
                    ..
                }
            )
    }
}
