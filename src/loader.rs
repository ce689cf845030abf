//! # Módulo de Carga de Procesos
//!
//! Lee los archivos CSV que describen un proceso. Cada archivo tiene una fila
//! de encabezado seguida de filas `modulo,operacion,duracion`; las líneas en
//! blanco se ignoran. El identificador del proceso es el nombre del archivo
//! sin extensión.
//!
//! El cargador valida los nombres de módulo contra el conjunto permitido y
//! los nombres de operación; la validez de la duración la decide el ejecutor.

use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, Trim};
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::operation::{Operation, OperationKind};
use crate::process::Process;

/// Error al cargar un archivo de proceso.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("cannot read {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{path}:{line}: malformed CSV row")]
    Csv {
        path: PathBuf,
        line: usize,
        #[source]
        source: csv::Error,
    },

    #[error("{path}:{line}: expected 3 columns (module,operation,duration), found {found}")]
    Columns {
        path: PathBuf,
        line: usize,
        found: usize,
    },

    #[error("{path}:{line}: unknown module `{module}`")]
    UnknownModule {
        path: PathBuf,
        line: usize,
        module: String,
    },

    #[error("{path}:{line}: unknown operation `{operation}`")]
    UnknownOperation {
        path: PathBuf,
        line: usize,
        operation: String,
    },

    #[error("{path}:{line}: duration `{value}` is not an integer")]
    Duration {
        path: PathBuf,
        line: usize,
        value: String,
    },
}

/// Fila de un archivo de proceso, por posición.
#[derive(Debug, Deserialize)]
struct Row {
    module: String,
    operation: String,
    duration: String,
}

/// Interpreta el contenido CSV de un proceso.
///
/// # Arguments
///
/// * `path` - Ruta usada sólo en los mensajes de error
/// * `content` - Texto CSV con encabezado
/// * `allowed_modules` - Módulos válidos
///
/// # Examples
///
/// ```rust
/// use std::collections::BTreeSet;
/// use std::path::Path;
/// use cluster_process_simulator::loader::parse_operations;
///
/// let modules: BTreeSet<String> = ["arm".to_string()].into();
/// let ops = parse_operations(Path::new("p1.csv"), "module,op,ms\narm,0x500,40\narm,0x600,10\n", &modules).unwrap();
/// assert_eq!(ops.len(), 2);
/// ```
pub fn parse_operations(
    path: &Path,
    content: &str,
    allowed_modules: &BTreeSet<String>,
) -> Result<Vec<Operation>, LoadError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .trim(Trim::All)
        .flexible(true)
        .from_reader(content.as_bytes());
    let mut operations = Vec::new();

    for result in reader.records() {
        let record = result.map_err(|source| LoadError::Csv {
            path: path.to_path_buf(),
            line: source.position().map_or(0, |p| p.line() as usize),
            source,
        })?;
        let line = record.position().map_or(0, |p| p.line() as usize);

        // Una fila de sólo espacios queda como un único campo vacío
        if record.iter().all(str::is_empty) {
            continue;
        }
        if record.len() != 3 {
            return Err(LoadError::Columns {
                path: path.to_path_buf(),
                line,
                found: record.len(),
            });
        }

        let row: Row = record.deserialize(None).map_err(|source| LoadError::Csv {
            path: path.to_path_buf(),
            line,
            source,
        })?;

        if !allowed_modules.contains(&row.module) {
            return Err(LoadError::UnknownModule {
                path: path.to_path_buf(),
                line,
                module: row.module,
            });
        }

        let kind: OperationKind = row.operation.parse().map_err(|_| LoadError::UnknownOperation {
            path: path.to_path_buf(),
            line,
            operation: row.operation.clone(),
        })?;

        let duration: i64 = row.duration.parse().map_err(|_| LoadError::Duration {
            path: path.to_path_buf(),
            line,
            value: row.duration.clone(),
        })?;

        operations.push(Operation::new(row.module, kind, duration));
    }

    Ok(operations)
}

/// Carga un proceso desde un archivo CSV.
pub fn load_process(path: &Path, allowed_modules: &BTreeSet<String>) -> Result<Process, LoadError> {
    let content = fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let operations = parse_operations(path, &content, allowed_modules)?;

    let id = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    debug!(process = %id, operations = operations.len(), path = %path.display(), "process loaded");

    Ok(Process::new(id, operations))
}

/// Carga varios procesos, en el orden dado.
pub fn load_processes<P: AsRef<Path>>(
    paths: &[P],
    allowed_modules: &BTreeSet<String>,
) -> Result<Vec<Process>, LoadError> {
    paths
        .iter()
        .map(|path| load_process(path.as_ref(), allowed_modules))
        .collect()
}
