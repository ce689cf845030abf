//! # Configuración del Simulador
//!
//! Valores por defecto y configuración de una ejecución. La configuración se
//! puede leer de un archivo TOML; cualquier campo ausente toma su valor por
//! defecto:
//!
//! ```toml
//! modules = ["inc", "out", "add", "smp", "arm"]
//! time_unit_ms = 1
//! clock = "virtual"
//! format = "json"
//! processes = ["data/grex_process_1.csv"]
//! ```

use std::collections::BTreeSet;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::clock::{Clock, ClockMode};
use crate::registry::ModuleRegistry;
use crate::scheduler::Scheduler;

/// Módulos del clúster por defecto
pub const DEFAULT_MODULES: [&str; 5] = ["inc", "out", "add", "smp", "arm"];

/// Milisegundos por unidad de duración (los archivos de proceso están en ms)
pub const DEFAULT_TIME_UNIT_MS: u64 = 1;

/// Formato del reporte final.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Csv,
    Json,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Csv => write!(f, "csv"),
            Self::Json => write!(f, "json"),
        }
    }
}

/// Error de configuración.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid config file {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Configuración de una ejecución.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimulationConfig {
    /// Identificadores de los módulos del clúster
    pub modules: Vec<String>,
    /// Milisegundos por unidad de duración
    pub time_unit_ms: u64,
    /// Reloj real o virtual
    pub clock: ClockMode,
    /// Archivos CSV de los procesos
    pub processes: Vec<PathBuf>,
    /// Formato del reporte
    pub format: OutputFormat,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            modules: DEFAULT_MODULES.iter().map(|m| m.to_string()).collect(),
            time_unit_ms: DEFAULT_TIME_UNIT_MS,
            clock: ClockMode::default(),
            processes: Vec::new(),
            format: OutputFormat::default(),
        }
    }
}

impl SimulationConfig {
    /// Lee y valida la configuración de un archivo TOML.
    ///
    /// # Errors
    ///
    /// `Io` si el archivo no se puede leer, `Parse` si no es TOML válido o
    /// tiene campos desconocidos, `Invalid` si no pasa la validación.
    ///
    /// Las rutas relativas de `processes` se resuelven contra el directorio
    /// del archivo de configuración.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config: Self = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        if let Some(base) = path.parent() {
            for process in &mut config.processes {
                if process.is_relative() {
                    *process = base.join(&*process);
                }
            }
        }
        config.validate()?;
        Ok(config)
    }

    /// Comprueba que la unidad de tiempo sea positiva y que haya módulos.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.time_unit_ms == 0 {
            return Err(ConfigError::Invalid("time_unit_ms must be greater than 0".into()));
        }
        if self.modules.iter().all(|m| m.trim().is_empty()) {
            return Err(ConfigError::Invalid("at least one module is required".into()));
        }
        Ok(())
    }

    /// Conjunto de módulos permitidos.
    pub fn module_set(&self) -> BTreeSet<String> {
        self.modules
            .iter()
            .map(|m| m.trim())
            .filter(|m| !m.is_empty())
            .map(String::from)
            .collect()
    }

    pub fn time_unit(&self) -> Duration {
        Duration::from_millis(self.time_unit_ms)
    }

    pub fn build_clock(&self) -> Arc<dyn Clock> {
        self.clock.build()
    }

    /// Construye un registro y un planificador nuevos para una ejecución.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use cluster_process_simulator::{ClockMode, RunState, SimulationConfig};
    ///
    /// let config = SimulationConfig { clock: ClockMode::Virtual, ..Default::default() };
    /// let scheduler = config.build_scheduler();
    /// assert_eq!(scheduler.state(), RunState::Initialized);
    /// assert_eq!(scheduler.registry().len(), 5);
    /// ```
    pub fn build_scheduler(&self) -> Scheduler {
        let registry = ModuleRegistry::new(self.module_set(), self.build_clock());
        Scheduler::new(registry).with_time_unit(self.time_unit())
    }
}
