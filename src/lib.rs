//! # Simulador de Procesos de Clúster
//!
//! Esta biblioteca simula procesos concurrentes que compiten por módulos
//! exclusivos de un clúster (`inc`, `out`, `add`, `smp`, `arm`, ...). Cada
//! proceso es una secuencia de operaciones `PICK`/`PLACE` con una duración de
//! trabajo; mientras un proceso tiene un módulo, los demás que lo piden
//! esperan y ese tiempo se contabiliza como *downtime*.
//!
//! ## Características principales
//!
//! - **Un hilo por proceso**: los procesos corren en paralelo con
//!   `std::thread::scope` y reportan su resultado por un canal (`std::sync::mpsc`).
//! - **Exclusión FCFS por módulo**: cada módulo concede el acceso en el orden
//!   en que se emitieron las solicitudes, con `Mutex` + `Condvar`.
//! - **Reloj real o virtual**: el reloj virtual hace la ejecución
//!   determinista, con tiempos exactos y reproducibles.
//! - **Métricas**: trabajo, espera (total y por módulo), tiempo transcurrido
//!   de cada proceso y tiempo total del clúster, en texto, CSV o JSON.
//!
//! ## Estructura del proyecto
//!
//! - `operation`: Operaciones `PICK`/`PLACE` de un proceso
//! - `process`: Procesos y sus contadores de tiempo
//! - `policy`: Políticas de admisión a un módulo (FCFS)
//! - `clock`: Relojes real y virtual
//! - `module_lock`: Exclusión mutua de un módulo
//! - `registry`: Registro de módulos de una ejecución
//! - `runner`: Ejecución de un proceso
//! - `scheduler`: Coordinación de la ejecución completa
//! - `metrics`: Cálculo y reporte de métricas
//! - `loader`: Lectura de procesos desde CSV
//! - `config`: Configuración y valores por defecto
//!
//! ## Ejemplo
//!
//! ```rust
//! use cluster_process_simulator::{simulate, ClockMode, Operation, Process, SimulationConfig};
//!
//! let config = SimulationConfig { clock: ClockMode::Virtual, ..Default::default() };
//! let processes = vec![
//!     Process::new("p1", vec![Operation::pick("arm", 10), Operation::place("arm", 0)]),
//!     Process::new("p2", vec![Operation::pick("arm", 5), Operation::place("arm", 0)]),
//! ];
//!
//! let metrics = simulate(&config, &processes).unwrap();
//! assert_eq!(metrics.process("p2").unwrap().wait_time.as_millis(), 10);
//! ```

pub mod clock;
pub mod config;
pub mod error;
pub mod loader;
pub mod metrics;
pub mod module_lock;
pub mod operation;
pub mod policy;
pub mod process;
pub mod registry;
pub mod runner;
pub mod scheduler;

mod sync;

// Re-exportar las estructuras principales para facilitar su uso
pub use clock::{Clock, ClockMode, RealClock, VirtualClock};
pub use config::{ConfigError, OutputFormat, SimulationConfig};
pub use error::{RunError, SimulationError};
pub use loader::{load_process, load_processes, parse_operations, LoadError};
pub use metrics::{MetricsCalculator, ProcessMetrics, SimulationMetrics};
pub use module_lock::{ModuleLock, Ticket};
pub use operation::{Operation, OperationKind};
pub use policy::{AdmissionPolicy, Fcfs, Request};
pub use process::{Process, ProcessId, ProcessTiming};
pub use registry::ModuleRegistry;
pub use runner::ProcessRunner;
pub use scheduler::{RunState, Scheduler};

/// Ejecuta `processes` con un registro y un planificador nuevos construidos
/// a partir de `config`.
///
/// # Errors
///
/// El primer error que bloqueó la ejecución; no hay resultados parciales.
pub fn simulate(
    config: &SimulationConfig,
    processes: &[Process],
) -> Result<SimulationMetrics, RunError> {
    config.build_scheduler().run(processes)
}
