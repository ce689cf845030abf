//! # Módulo de Registro de Módulos
//!
//! El [`ModuleRegistry`] asocia cada identificador de módulo con su
//! [`ModuleLock`]. Se construye una vez por ejecución y después sólo se lee,
//! por lo que no necesita sincronización propia; la única escritura posterior
//! es la bandera atómica de aborto.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::warn;

use crate::clock::Clock;
use crate::error::SimulationError;
use crate::module_lock::ModuleLock;
use crate::policy::{AdmissionPolicy, Fcfs};

/// Registro inmutable de los módulos de una ejecución.
#[derive(Debug)]
pub struct ModuleRegistry {
    locks: BTreeMap<String, ModuleLock>,
    clock: Arc<dyn Clock>,
    aborted: AtomicBool,
}

impl ModuleRegistry {
    /// Crea un registro con política FCFS.
    ///
    /// # Arguments
    ///
    /// * `module_ids` - Identificadores de los módulos; los repetidos se ignoran
    /// * `clock` - Reloj compartido por todos los módulos y ejecutores
    ///
    /// # Examples
    ///
    /// ```rust
    /// use std::sync::Arc;
    /// use cluster_process_simulator::{ModuleRegistry, RealClock};
    ///
    /// let registry = ModuleRegistry::new(["arm", "smp"], Arc::new(RealClock::new()));
    /// assert!(registry.get("arm").is_ok());
    /// assert!(registry.get("Z").is_err());
    /// ```
    pub fn new<I, S>(module_ids: I, clock: Arc<dyn Clock>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_policy(module_ids, clock, Arc::new(Fcfs))
    }

    /// Crea un registro con una política de admisión concreta.
    pub fn with_policy<I, S>(
        module_ids: I,
        clock: Arc<dyn Clock>,
        policy: Arc<dyn AdmissionPolicy>,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let locks = module_ids
            .into_iter()
            .map(Into::into)
            .map(|id: String| {
                let lock = ModuleLock::new(id.clone(), Arc::clone(&policy), Arc::clone(&clock));
                (id, lock)
            })
            .collect();

        Self {
            locks,
            clock,
            aborted: AtomicBool::new(false),
        }
    }

    /// Obtiene el lock de un módulo.
    ///
    /// # Errors
    ///
    /// `UnknownModule` si el módulo nunca fue registrado
    pub fn get(&self, module_id: &str) -> Result<&ModuleLock, SimulationError> {
        self.locks
            .get(module_id)
            .ok_or_else(|| SimulationError::UnknownModule(module_id.to_string()))
    }

    /// Identificadores registrados, en orden alfabético.
    pub fn module_ids(&self) -> impl Iterator<Item = &str> {
        self.locks.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }

    /// Reloj compartido de la ejecución.
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Aborta la ejecución: todos los que esperan un módulo despiertan con
    /// `Aborted` y no se admiten nuevas solicitudes. Idempotente.
    pub fn abort(&self) {
        if self.aborted.swap(true, Ordering::SeqCst) {
            return;
        }
        warn!(modules = self.locks.len(), "aborting run, waking all waiters");
        for lock in self.locks.values() {
            lock.abort();
        }
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::SeqCst)
    }
}
