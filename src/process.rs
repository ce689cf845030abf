//! # Módulo de Procesos
//!
//! Este módulo define los procesos simulados: una secuencia ordenada de
//! operaciones más los contadores de tiempo que su ejecutor acumula.
//!
//! Un `Process` es un registro de datos puro. Sólo su
//! [`ProcessRunner`](crate::runner::ProcessRunner) escribe en los contadores
//! mientras se ejecuta; después de terminar es de sólo lectura.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::operation::Operation;

/// Identificador único de un proceso dentro de una ejecución.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProcessId(String);

impl ProcessId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ProcessId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for ProcessId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Contadores de tiempo de un proceso.
///
/// Los instantes se miden como desplazamiento desde la época del reloj de la
/// ejecución, de modo que son comparables entre procesos.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProcessTiming {
    /// Momento en que el proceso empezó a ejecutar su primera operación
    pub start_time: Option<Duration>,
    /// Momento en que terminó su última operación
    pub end_time: Option<Duration>,
    /// Tiempo total esperando módulos ocupados (downtime)
    pub total_wait_time: Duration,
    /// Tiempo total de trabajo simulado
    pub total_work_time: Duration,
    /// Downtime desglosado por módulo
    pub wait_by_module: BTreeMap<String, Duration>,
}

/// Representa un proceso que ejecuta operaciones sobre los módulos.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Process {
    /// Identificador único del proceso
    pub id: ProcessId,
    /// Operaciones en orden de ejecución
    pub operations: Vec<Operation>,
    /// Tiempos acumulados durante la ejecución
    pub timing: ProcessTiming,
}

impl Process {
    /// Crea un nuevo proceso con los contadores a cero.
    ///
    /// # Arguments
    ///
    /// * `id` - Identificador único del proceso
    /// * `operations` - Operaciones en orden de ejecución
    ///
    /// # Examples
    ///
    /// ```rust
    /// use cluster_process_simulator::{Operation, Process};
    ///
    /// let process = Process::new("p1", vec![
    ///     Operation::pick("arm", 5),
    ///     Operation::place("arm", 0),
    /// ]);
    /// assert_eq!(process.operations.len(), 2);
    /// assert!(!process.is_completed());
    /// ```
    pub fn new(id: impl Into<ProcessId>, operations: Vec<Operation>) -> Self {
        Self {
            id: id.into(),
            operations,
            timing: ProcessTiming::default(),
        }
    }

    /// Tiempo transcurrido entre el inicio y el fin del proceso.
    ///
    /// # Returns
    ///
    /// `Some(Duration)` si el proceso terminó, `None` en caso contrario
    pub fn elapsed(&self) -> Option<Duration> {
        let start = self.timing.start_time?;
        let end = self.timing.end_time?;
        Some(end.saturating_sub(start))
    }

    /// Verifica si el proceso completó su secuencia de operaciones.
    pub fn is_completed(&self) -> bool {
        self.timing.end_time.is_some()
    }

    /// Suma de las duraciones nominales de las operaciones, en unidades.
    ///
    /// Satura en los límites de `i64` en lugar de desbordar.
    pub fn nominal_work_units(&self) -> i64 {
        self.operations
            .iter()
            .fold(0i64, |total, op| total.saturating_add(op.duration))
    }
}
