//! # Módulo de Métricas y Reportes
//!
//! Este módulo se encarga de calcular las métricas de una ejecución a partir
//! de los procesos terminados y de generar reportes en texto, CSV y JSON.
//! El downtime se reporta siempre, también cuando es cero.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Serialize, Serializer};

use crate::process::{Process, ProcessId};

/// Métricas individuales de un proceso.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessMetrics {
    /// ID del proceso
    pub process_id: ProcessId,
    /// Número de operaciones ejecutadas
    pub operations: usize,
    /// Inicio relativo a la época de la ejecución
    #[serde(rename = "start_ms", serialize_with = "as_millis")]
    pub start_time: Duration,
    /// Fin relativo a la época de la ejecución
    #[serde(rename = "end_ms", serialize_with = "as_millis")]
    pub end_time: Duration,
    /// Tiempo total de trabajo
    #[serde(rename = "work_ms", serialize_with = "as_millis")]
    pub work_time: Duration,
    /// Tiempo total de espera (downtime)
    #[serde(rename = "wait_ms", serialize_with = "as_millis")]
    pub wait_time: Duration,
    /// Tiempo transcurrido (`end - start`)
    #[serde(rename = "elapsed_ms", serialize_with = "as_millis")]
    pub elapsed: Duration,
    /// Downtime por módulo
    #[serde(rename = "wait_by_module_ms", serialize_with = "map_as_millis")]
    pub wait_by_module: BTreeMap<String, Duration>,
}

/// Métricas agregadas de toda la ejecución.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationMetrics {
    /// Métricas de cada proceso, en el orden de entrada
    pub processes: Vec<ProcessMetrics>,
    /// Desde el primer inicio hasta el último fin
    #[serde(rename = "cluster_time_ms", serialize_with = "as_millis")]
    pub cluster_time: Duration,
    #[serde(rename = "total_wait_ms", serialize_with = "as_millis")]
    pub total_wait_time: Duration,
    #[serde(rename = "average_wait_ms", serialize_with = "as_millis")]
    pub average_wait_time: Duration,
    #[serde(rename = "average_elapsed_ms", serialize_with = "as_millis")]
    pub average_elapsed_time: Duration,
}

impl SimulationMetrics {
    /// Busca las métricas de un proceso por su identificador.
    pub fn process(&self, id: &str) -> Option<&ProcessMetrics> {
        self.processes.iter().find(|p| p.process_id.as_str() == id)
    }
}

fn as_millis<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(millis(*duration))
}

fn map_as_millis<S: Serializer>(
    map: &BTreeMap<String, Duration>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_map(map.iter().map(|(module, duration)| (module, millis(*duration))))
}

/// Calculadora de métricas de la ejecución.
pub struct MetricsCalculator;

impl MetricsCalculator {
    /// Crea una nueva instancia del calculador de métricas.
    pub fn new() -> Self {
        Self
    }

    /// Calcula las métricas de un proceso.
    ///
    /// # Returns
    ///
    /// `ProcessMetrics`, o `None` si el proceso no ha terminado
    pub fn calculate_process_metrics(&self, process: &Process) -> Option<ProcessMetrics> {
        let start_time = process.timing.start_time?;
        let end_time = process.timing.end_time?;

        Some(ProcessMetrics {
            process_id: process.id.clone(),
            operations: process.operations.len(),
            start_time,
            end_time,
            work_time: process.timing.total_work_time,
            wait_time: process.timing.total_wait_time,
            elapsed: end_time.saturating_sub(start_time),
            wait_by_module: process.timing.wait_by_module.clone(),
        })
    }

    /// Calcula las métricas agregadas de todos los procesos terminados.
    ///
    /// Los procesos sin terminar se ignoran.
    pub fn calculate_simulation_metrics(&self, processes: &[Process]) -> SimulationMetrics {
        let metrics: Vec<ProcessMetrics> = processes
            .iter()
            .filter_map(|process| self.calculate_process_metrics(process))
            .collect();

        let first_start = metrics.iter().map(|m| m.start_time).min();
        let last_end = metrics.iter().map(|m| m.end_time).max();
        let cluster_time = match (first_start, last_end) {
            (Some(start), Some(end)) => end.saturating_sub(start),
            _ => Duration::ZERO,
        };

        let total_wait_time: Duration = metrics.iter().map(|m| m.wait_time).sum();
        let total_elapsed: Duration = metrics.iter().map(|m| m.elapsed).sum();
        let count = u32::try_from(metrics.len()).unwrap_or(u32::MAX);
        let (average_wait_time, average_elapsed_time) = if count > 0 {
            (total_wait_time / count, total_elapsed / count)
        } else {
            (Duration::ZERO, Duration::ZERO)
        };

        SimulationMetrics {
            processes: metrics,
            cluster_time,
            total_wait_time,
            average_wait_time,
            average_elapsed_time,
        }
    }

    /// Genera un reporte de texto con una fila por proceso.
    pub fn generate_report(&self, metrics: &SimulationMetrics) -> String {
        let mut report = String::new();

        report.push_str("\n=== REPORTE DE RESULTADOS ===\n\n");
        report.push_str(&format!(
            "{:<12} {:>6} {:>12} {:>12} {:>12} {:>12}\n",
            "Proceso", "Ops", "Trabajo", "Espera", "Total", "Fin"
        ));
        report.push_str(&format!("{}\n", "-".repeat(72)));

        for process in &metrics.processes {
            report.push_str(&format!(
                "{:<12} {:>6} {:>12} {:>12} {:>12} {:>12}\n",
                process.process_id.as_str(),
                process.operations,
                Self::format_duration(process.work_time),
                Self::format_duration(process.wait_time),
                Self::format_duration(process.elapsed),
                Self::format_duration(process.end_time),
            ));
            for (module, wait) in process.wait_by_module.iter().filter(|(_, w)| !w.is_zero()) {
                report.push_str(&format!(
                    "{:<12} espera en {}: {}\n",
                    "",
                    module,
                    Self::format_duration(*wait)
                ));
            }
        }

        report.push_str("\n=== ESTADÍSTICAS RESUMIDAS ===\n");
        report.push_str(&format!("Procesos completados: {}\n", metrics.processes.len()));
        report.push_str(&format!(
            "Tiempo total de espera: {}\n",
            Self::format_duration(metrics.total_wait_time)
        ));
        report.push_str(&format!(
            "Tiempo promedio de espera: {}\n",
            Self::format_duration(metrics.average_wait_time)
        ));
        report.push_str(&format!(
            "Tiempo promedio por proceso: {}\n",
            Self::format_duration(metrics.average_elapsed_time)
        ));
        report.push_str(&format!(
            "Tiempo total del clúster: {}\n",
            Self::format_duration(metrics.cluster_time)
        ));

        report
    }

    /// Genera un reporte en formato CSV, en milisegundos.
    pub fn generate_csv_report(&self, metrics: &SimulationMetrics) -> String {
        let mut csv = String::new();

        csv.push_str("ProcessID,Operations,StartMs,EndMs,WorkMs,WaitMs,ElapsedMs\n");
        for process in &metrics.processes {
            csv.push_str(&format!(
                "{},{},{:.3},{:.3},{:.3},{:.3},{:.3}\n",
                process.process_id,
                process.operations,
                millis(process.start_time),
                millis(process.end_time),
                millis(process.work_time),
                millis(process.wait_time),
                millis(process.elapsed),
            ));
        }

        csv
    }

    /// Genera un reporte JSON.
    pub fn generate_json_report(&self, metrics: &SimulationMetrics) -> serde_json::Result<String> {
        serde_json::to_string_pretty(metrics)
    }

    /// Formatea una duración en formato "s.mmm".
    pub fn format_duration(duration: Duration) -> String {
        let millis = duration.as_millis();
        let seconds = millis / 1000;
        let milliseconds = millis % 1000;
        format!("{}.{:03}s", seconds, milliseconds)
    }
}

impl Default for MetricsCalculator {
    fn default() -> Self {
        Self::new()
    }
}

fn millis(duration: Duration) -> f64 {
    duration.as_nanos() as f64 / 1_000_000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::Operation;

    fn finished(id: &str, start: u64, work: u64, wait: u64) -> Process {
        let mut process = Process::new(
            id,
            vec![Operation::pick("arm", work as i64), Operation::place("arm", 0)],
        );
        process.timing.start_time = Some(Duration::from_millis(start));
        process.timing.end_time = Some(Duration::from_millis(start + work + wait));
        process.timing.total_work_time = Duration::from_millis(work);
        process.timing.total_wait_time = Duration::from_millis(wait);
        process
            .timing
            .wait_by_module
            .insert("arm".to_string(), Duration::from_millis(wait));
        process
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(
            MetricsCalculator::format_duration(Duration::from_millis(1500)),
            "1.500s"
        );
        assert_eq!(
            MetricsCalculator::format_duration(Duration::from_millis(250)),
            "0.250s"
        );
        assert_eq!(MetricsCalculator::format_duration(Duration::ZERO), "0.000s");
    }

    #[test]
    fn test_unfinished_process_is_skipped() {
        let calculator = MetricsCalculator::new();
        let pending = Process::new("p9", Vec::new());

        assert_eq!(calculator.calculate_process_metrics(&pending), None);
        let metrics = calculator.calculate_simulation_metrics(&[pending]);
        assert!(metrics.processes.is_empty());
        assert_eq!(metrics.cluster_time, Duration::ZERO);
    }

    #[test]
    fn test_aggregates() {
        let calculator = MetricsCalculator::default();
        let metrics = calculator.calculate_simulation_metrics(&[
            finished("p1", 0, 10, 0),
            finished("p2", 0, 5, 9),
        ]);

        assert_eq!(metrics.cluster_time, Duration::from_millis(14));
        assert_eq!(metrics.total_wait_time, Duration::from_millis(9));
        assert_eq!(metrics.average_wait_time, Duration::from_micros(4500));
        assert_eq!(metrics.average_elapsed_time, Duration::from_millis(12));
        assert_eq!(metrics.process("p2").map(|p| p.elapsed), Some(Duration::from_millis(14)));
    }

    #[test]
    fn test_report_generation() {
        let calculator = MetricsCalculator::new();
        let metrics = calculator.calculate_simulation_metrics(&[
            finished("p1", 0, 10, 0),
            finished("p2", 0, 5, 9),
        ]);

        let text = calculator.generate_report(&metrics);
        assert!(text.contains("REPORTE DE RESULTADOS"));
        assert!(text.contains("espera en arm: 0.009s"));
        assert!(text.contains("Tiempo total del clúster: 0.014s"));

        let csv = calculator.generate_csv_report(&metrics);
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[2], "p2,2,0.000,14.000,5.000,9.000,14.000");

        let json = calculator.generate_json_report(&metrics).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["cluster_time_ms"], 14.0);
        assert_eq!(value["processes"][0]["wait_ms"], 0.0);
        assert_eq!(value["processes"][1]["wait_by_module_ms"]["arm"], 9.0);
    }
}
