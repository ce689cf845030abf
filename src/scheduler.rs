//! # Módulo del Planificador
//!
//! El [`Scheduler`] coordina una ejecución completa:
//! - lanza un hilo por proceso y los libera a la vez con una compuerta de inicio;
//! - recibe los procesos terminados por un canal (`std::sync::mpsc`);
//! - ante el primer fallo aborta el registro, de modo que nadie quede
//!   esperando un módulo, y descarta todos los resultados parciales;
//! - si todos terminan, calcula las métricas en el orden de entrada.

use std::collections::HashSet;
use std::fmt;
use std::sync::{mpsc, Condvar, Mutex};
use std::thread;
use std::time::Duration;

use tracing::{error, info};

use crate::error::RunError;
use crate::metrics::{MetricsCalculator, SimulationMetrics};
use crate::process::Process;
use crate::registry::ModuleRegistry;
use crate::runner::ProcessRunner;
use crate::sync::{lock, wait_while};

/// Estado de una ejecución. `Completed` y `Failed` son finales.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunState {
    Initialized,
    Running,
    Completed,
    Failed,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Initialized => write!(f, "INITIALIZED"),
            Self::Running => write!(f, "RUNNING"),
            Self::Completed => write!(f, "COMPLETED"),
            Self::Failed => write!(f, "FAILED"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Gate {
    Closed,
    Open,
    Cancelled,
}

/// Compuerta que libera a todos los hilos de proceso al mismo tiempo.
struct StartGate {
    state: Mutex<Gate>,
    changed: Condvar,
}

impl StartGate {
    fn new() -> Self {
        Self {
            state: Mutex::new(Gate::Closed),
            changed: Condvar::new(),
        }
    }

    fn set(&self, gate: Gate) {
        *lock(&self.state) = gate;
        self.changed.notify_all();
    }

    /// Bloquea hasta que la compuerta se abre (`true`) o se cancela (`false`).
    fn wait(&self) -> bool {
        let state = wait_while(&self.changed, lock(&self.state), |gate| {
            *gate == Gate::Closed
        });
        *state == Gate::Open
    }
}

/// Orquestador de una ejecución.
///
/// Un planificador sirve para una sola ejecución: tras `Completed` o `Failed`
/// hay que construir un registro y un planificador nuevos.
pub struct Scheduler {
    registry: ModuleRegistry,
    time_unit: Duration,
    state: RunState,
    metrics_calculator: MetricsCalculator,
}

impl Scheduler {
    /// Crea un planificador con una unidad de tiempo de 1 ms.
    pub fn new(registry: ModuleRegistry) -> Self {
        Self {
            registry,
            time_unit: Duration::from_millis(1),
            state: RunState::Initialized,
            metrics_calculator: MetricsCalculator::new(),
        }
    }

    /// Cambia la duración de una unidad de trabajo.
    pub fn with_time_unit(mut self, time_unit: Duration) -> Self {
        self.time_unit = time_unit;
        self
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn registry(&self) -> &ModuleRegistry {
        &self.registry
    }

    /// Ejecuta todos los procesos concurrentemente.
    ///
    /// # Returns
    ///
    /// Las métricas de cada proceso en el orden de `processes`, o el error
    /// que bloqueó la ejecución. No hay resultados parciales.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use std::sync::Arc;
    /// use cluster_process_simulator::{ModuleRegistry, Operation, Process, Scheduler, VirtualClock};
    ///
    /// let registry = ModuleRegistry::new(["arm"], Arc::new(VirtualClock::new()));
    /// let mut scheduler = Scheduler::new(registry);
    /// let processes = vec![Process::new("p1", vec![
    ///     Operation::pick("arm", 5),
    ///     Operation::place("arm", 0),
    /// ])];
    ///
    /// let metrics = scheduler.run(&processes).unwrap();
    /// assert_eq!(metrics.processes[0].work_time.as_millis(), 5);
    /// ```
    pub fn run(&mut self, processes: &[Process]) -> Result<SimulationMetrics, RunError> {
        if self.state != RunState::Initialized {
            return Err(RunError::NotRunnable(self.state));
        }

        let mut seen = HashSet::new();
        if let Some(duplicate) = processes.iter().find(|p| !seen.insert(&p.id)) {
            self.state = RunState::Failed;
            return Err(RunError::DuplicateProcess(duplicate.id.clone()));
        }

        self.state = RunState::Running;
        info!(
            processes = processes.len(),
            modules = self.registry.len(),
            time_unit = ?self.time_unit,
            "run started"
        );

        match self.execute(processes) {
            Ok(finished) => {
                self.state = RunState::Completed;
                let metrics = self
                    .metrics_calculator
                    .calculate_simulation_metrics(&finished);
                info!(cluster_time = ?metrics.cluster_time, "run completed");
                Ok(metrics)
            }
            Err(err) => {
                self.state = RunState::Failed;
                error!(%err, "run failed");
                Err(err)
            }
        }
    }

    /// Lanza un hilo por proceso y espera a que terminen todos.
    fn execute(&self, processes: &[Process]) -> Result<Vec<Process>, RunError> {
        let registry = &self.registry;
        let gate = StartGate::new();
        let (sender, receiver) = mpsc::channel::<(usize, Result<Process, RunError>)>();

        registry.clock().enroll(processes.len());

        thread::scope(|scope| {
            let mut handles = Vec::with_capacity(processes.len());

            for (slot, process) in processes.iter().enumerate() {
                let runner = ProcessRunner::new(process.clone(), slot, registry, self.time_unit);
                let sender = sender.clone();
                let gate = &gate;

                let spawned = thread::Builder::new()
                    .name(format!("process-{}", process.id))
                    .spawn_scoped(scope, move || {
                        if gate.wait() {
                            // El receptor sólo desaparece si el planificador ya terminó
                            let _ = sender.send((slot, runner.run()));
                        }
                    });

                match spawned {
                    Ok(handle) => handles.push((process, handle)),
                    Err(source) => {
                        gate.set(Gate::Cancelled);
                        registry.abort();
                        return Err(RunError::Spawn {
                            process: process.id.clone(),
                            source,
                        });
                    }
                }
            }
            drop(sender);
            gate.set(Gate::Open);

            let mut finished: Vec<Option<Process>> = vec![None; processes.len()];
            let mut failure: Option<RunError> = None;

            // Termina cuando todos los hilos soltaron su emisor
            for (slot, outcome) in receiver {
                match outcome {
                    Ok(process) => finished[slot] = Some(process),
                    Err(err) => {
                        registry.abort();
                        failure = Some(prefer_primary(failure, err));
                    }
                }
            }

            for (process, handle) in handles {
                if handle.join().is_err() {
                    let panicked = RunError::Panicked {
                        process: process.id.clone(),
                    };
                    failure = Some(prefer_primary(failure, panicked));
                }
            }

            if let Some(err) = failure {
                return Err(err);
            }

            finished
                .into_iter()
                .zip(processes)
                .map(|(done, process)| {
                    done.ok_or_else(|| RunError::Panicked {
                        process: process.id.clone(),
                    })
                })
                .collect()
        })
    }
}

/// Conserva el primer error que no sea consecuencia del aborto.
fn prefer_primary(current: Option<RunError>, candidate: RunError) -> RunError {
    match current {
        Some(current) if !current.is_secondary() || candidate.is_secondary() => current,
        _ => candidate,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::VirtualClock;
    use crate::error::SimulationError;
    use crate::operation::Operation;
    use crate::process::ProcessId;
    use std::sync::Arc;

    fn scheduler(modules: &[&str]) -> Scheduler {
        let registry = ModuleRegistry::new(modules.iter().copied(), Arc::new(VirtualClock::new()));
        Scheduler::new(registry)
    }

    fn pick_place(id: &str, module: &str, work: i64) -> Process {
        Process::new(id, vec![Operation::pick(module, work), Operation::place(module, 0)])
    }

    #[test]
    fn test_state_machine_completed_is_final() {
        let mut scheduler = scheduler(&["arm"]);
        assert_eq!(scheduler.state(), RunState::Initialized);

        let processes = vec![pick_place("p1", "arm", 3)];
        scheduler.run(&processes).unwrap();
        assert_eq!(scheduler.state(), RunState::Completed);

        let err = scheduler.run(&processes).unwrap_err();
        assert!(matches!(err, RunError::NotRunnable(RunState::Completed)));
    }

    #[test]
    fn test_state_machine_failed_is_final() {
        let mut scheduler = scheduler(&["arm"]);
        let processes = vec![pick_place("p1", "Z", 3)];

        assert!(scheduler.run(&processes).is_err());
        assert_eq!(scheduler.state(), RunState::Failed);
        assert!(matches!(
            scheduler.run(&processes),
            Err(RunError::NotRunnable(RunState::Failed))
        ));
    }

    #[test]
    fn test_duplicate_process_ids() {
        let mut scheduler = scheduler(&["arm"]);
        let processes = vec![pick_place("p1", "arm", 1), pick_place("p1", "arm", 1)];

        match scheduler.run(&processes) {
            Err(RunError::DuplicateProcess(id)) => assert_eq!(id, ProcessId::from("p1")),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_empty_run() {
        let mut scheduler = scheduler(&["arm"]);
        let metrics = scheduler.run(&[]).unwrap();

        assert!(metrics.processes.is_empty());
        assert_eq!(metrics.cluster_time, Duration::ZERO);
    }

    #[test]
    fn test_failure_wins_over_aborted_siblings() {
        let mut scheduler = scheduler(&["arm"]);
        let processes = vec![
            // p1 toma el módulo y falla mientras lo tiene
            Process::new(
                "p1",
                vec![Operation::pick("arm", 4), Operation::place("smp", 0)],
            ),
            pick_place("p2", "arm", 2),
            pick_place("p3", "arm", 2),
        ];

        let err = scheduler.run(&processes).unwrap_err();
        assert_eq!(err.process(), Some(&ProcessId::from("p1")));
        assert_eq!(
            err.kind(),
            Some(&SimulationError::UnknownModule("smp".to_string()))
        );
    }

    #[test]
    fn test_prefer_primary() {
        let aborted = || RunError::Aborted {
            process: ProcessId::from("p2"),
        };
        let primary = || RunError::DuplicateProcess(ProcessId::from("p1"));

        assert!(matches!(
            prefer_primary(Some(aborted()), primary()),
            RunError::DuplicateProcess(_)
        ));
        assert!(matches!(
            prefer_primary(Some(primary()), aborted()),
            RunError::DuplicateProcess(_)
        ));
        assert!(matches!(prefer_primary(None, aborted()), RunError::Aborted { .. }));
    }
}
