//! # Módulo de Operaciones
//!
//! Define las operaciones que un proceso ejecuta sobre los módulos: tomar
//! (`PICK`) y dejar (`PLACE`). Las operaciones son valores inmutables que
//! pertenecen exclusivamente a su proceso.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Tipo de operación sobre un módulo.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OperationKind {
    /// Solicita acceso exclusivo al módulo
    Pick,
    /// Libera el módulo tomado por el último `Pick`
    Place,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pick => write!(f, "PICK"),
            Self::Place => write!(f, "PLACE"),
        }
    }
}

/// Error al interpretar un nombre de operación.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown operation `{0}`")]
pub struct UnknownOperation(pub String);

impl FromStr for OperationKind {
    type Err = UnknownOperation;

    /// Acepta `PICK`/`PLACE` en cualquier combinación de mayúsculas y los
    /// códigos `0x500`/`0x600`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use cluster_process_simulator::OperationKind;
    ///
    /// assert_eq!("pick".parse::<OperationKind>().unwrap(), OperationKind::Pick);
    /// assert_eq!("0x600".parse::<OperationKind>().unwrap(), OperationKind::Place);
    /// ```
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let token = s.trim();
        if token.eq_ignore_ascii_case("pick") || token.eq_ignore_ascii_case("0x500") {
            Ok(Self::Pick)
        } else if token.eq_ignore_ascii_case("place") || token.eq_ignore_ascii_case("0x600") {
            Ok(Self::Place)
        } else {
            Err(UnknownOperation(token.to_string()))
        }
    }
}

/// Una operación de un proceso.
///
/// La duración se expresa en unidades de tiempo abstractas (milisegundos en
/// los archivos de proceso) y se guarda con signo: la validación ocurre al
/// ejecutarla, no al construirla.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    /// Identificador del módulo sobre el que actúa
    pub module_id: String,
    /// Tipo de operación
    pub kind: OperationKind,
    /// Tiempo de trabajo simulado, en unidades
    pub duration: i64,
}

impl Operation {
    pub fn new(module_id: impl Into<String>, kind: OperationKind, duration: i64) -> Self {
        Self {
            module_id: module_id.into(),
            kind,
            duration,
        }
    }

    /// Crea una operación `PICK`.
    pub fn pick(module_id: impl Into<String>, duration: i64) -> Self {
        Self::new(module_id, OperationKind::Pick, duration)
    }

    /// Crea una operación `PLACE`.
    pub fn place(module_id: impl Into<String>, duration: i64) -> Self {
        Self::new(module_id, OperationKind::Place, duration)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} ({})", self.kind, self.module_id, self.duration)
    }
}
