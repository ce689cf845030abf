//! # Módulo de Ejecución de Procesos
//!
//! Un [`ProcessRunner`] ejecuta la secuencia de operaciones de un proceso en
//! orden estricto, toma y libera los módulos del registro compartido y
//! acumula los tiempos de trabajo y de espera del proceso.
//!
//! Cualquier error en una operación aborta la ejecución completa: el ejecutor
//! marca el registro como abortado antes de devolver el error.

use std::thread;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::error::{RunError, SimulationError};
use crate::operation::{Operation, OperationKind};
use crate::process::Process;
use crate::registry::ModuleRegistry;

/// Ejecutor de un único proceso.
pub struct ProcessRunner<'a> {
    process: Process,
    slot: usize,
    registry: &'a ModuleRegistry,
    time_unit: Duration,
}

/// Mantiene la participación del hilo en el reloj mientras el ejecutor vive.
///
/// Al soltarse retira el slot del reloj; si el hilo está en pánico además
/// aborta la ejecución para que nadie quede esperando un módulo tomado.
struct Participation<'a> {
    clock: &'a dyn Clock,
    registry: &'a ModuleRegistry,
    slot: usize,
}

impl Drop for Participation<'_> {
    fn drop(&mut self) {
        if thread::panicking() {
            self.registry.abort();
        }
        self.clock.retire(self.slot);
    }
}

impl<'a> ProcessRunner<'a> {
    /// Crea un ejecutor.
    ///
    /// # Arguments
    ///
    /// * `process` - Proceso a ejecutar; el ejecutor es su único escritor
    /// * `slot` - Índice del proceso en la ejecución, usado como slot del reloj
    /// * `registry` - Registro compartido de módulos
    /// * `time_unit` - Duración real o virtual de una unidad de trabajo
    pub fn new(
        process: Process,
        slot: usize,
        registry: &'a ModuleRegistry,
        time_unit: Duration,
    ) -> Self {
        Self {
            process,
            slot,
            registry,
            time_unit,
        }
    }

    /// Ejecuta todas las operaciones y devuelve el proceso con sus tiempos.
    ///
    /// # Errors
    ///
    /// `RunError::Operation` con el índice, la operación y la clasificación
    /// del fallo, o `RunError::Aborted` si otro proceso abortó la ejecución.
    pub fn run(mut self) -> Result<Process, RunError> {
        let registry = self.registry;
        let clock = registry.clock().as_ref();
        let _participation = Participation {
            clock,
            registry,
            slot: self.slot,
        };

        clock.resume(self.slot);
        let start = clock.now();
        self.process.timing.start_time = Some(start);
        info!(process = %self.process.id, operations = self.process.operations.len(), "process started");

        // Módulos tomados y aún no liberados, con el índice de su PICK
        let mut held: Vec<(String, usize)> = Vec::new();
        let operations = std::mem::take(&mut self.process.operations);

        for (index, operation) in operations.iter().enumerate() {
            if registry.is_aborted() {
                warn!(process = %self.process.id, index, "run aborted, stopping");
                return Err(RunError::Aborted {
                    process: self.process.id.clone(),
                });
            }

            if let Err(source) = self.execute(clock, operation, &mut held, index) {
                return Err(self.fail(index, operation, source));
            }
        }

        if let Some((module_id, index)) = held.first().cloned() {
            let source = SimulationError::UnreleasedModule(module_id);
            return Err(self.fail(index, &operations[index], source));
        }

        let end = clock.now();
        self.process.timing.end_time = Some(end);
        self.process.operations = operations;
        info!(
            process = %self.process.id,
            elapsed = ?end.saturating_sub(start),
            work = ?self.process.timing.total_work_time,
            wait = ?self.process.timing.total_wait_time,
            "process finished"
        );

        Ok(self.process)
    }

    /// Ejecuta una operación: toma el módulo si es `PICK`, simula el trabajo
    /// y lo libera si es `PLACE`.
    fn execute(
        &mut self,
        clock: &dyn Clock,
        operation: &Operation,
        held: &mut Vec<(String, usize)>,
        index: usize,
    ) -> Result<(), SimulationError> {
        let registry = self.registry;
        let work = self.work_duration(operation.duration)?;
        let module = registry.get(&operation.module_id)?;
        let is_held = held.iter().any(|(id, _)| *id == operation.module_id);

        if operation.kind == OperationKind::Pick {
            if is_held {
                return Err(SimulationError::DoubleAcquire(operation.module_id.clone()));
            }

            let requested_at = clock.now();
            let granted_at = module.acquire(&self.process.id, self.slot, requested_at)?;
            let waited = granted_at.saturating_sub(requested_at);

            let timing = &mut self.process.timing;
            timing.total_wait_time += waited;
            *timing
                .wait_by_module
                .entry(operation.module_id.clone())
                .or_default() += waited;
            held.push((operation.module_id.clone(), index));

            debug!(
                process = %self.process.id,
                module = %operation.module_id,
                waited = ?waited,
                "module acquired"
            );
        } else if !is_held {
            return Err(SimulationError::UnmatchedPlace(operation.module_id.clone()));
        }

        clock.sleep(self.slot, work);
        self.process.timing.total_work_time += work;
        debug!(process = %self.process.id, operation = %operation, "operation done");

        if operation.kind == OperationKind::Place {
            module.release(&self.process.id)?;
            held.retain(|(id, _)| *id != operation.module_id);
        }

        Ok(())
    }

    /// Convierte unidades de trabajo en tiempo.
    fn work_duration(&self, units: i64) -> Result<Duration, SimulationError> {
        u32::try_from(units)
            .ok()
            .and_then(|units| self.time_unit.checked_mul(units))
            .ok_or(SimulationError::InvalidDuration(units))
    }

    fn fail(&self, index: usize, operation: &Operation, source: SimulationError) -> RunError {
        if source == SimulationError::Aborted {
            return RunError::Aborted {
                process: self.process.id.clone(),
            };
        }

        self.registry.abort();
        let error = RunError::Operation {
            process: self.process.id.clone(),
            index,
            operation: operation.clone(),
            source,
        };
        warn!(%error, "process failed");
        error
    }
}
