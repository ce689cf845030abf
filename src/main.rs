use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use cluster_process_simulator::{
    load_processes, simulate, ClockMode, MetricsCalculator, OutputFormat, SimulationConfig,
};

/// Simula procesos que compiten por los módulos exclusivos de un clúster.
#[derive(Parser, Debug)]
#[command(name = "cluster-process-simulator", version, about)]
struct Cli {
    /// Archivos CSV de los procesos (encabezado + filas `modulo,operacion,duracion`)
    processes: Vec<PathBuf>,

    /// Archivo de configuración TOML
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Módulos del clúster, separados por comas
    #[arg(short, long, value_delimiter = ',')]
    modules: Option<Vec<String>>,

    /// Milisegundos por unidad de duración
    #[arg(short, long)]
    time_unit_ms: Option<u64>,

    /// Reloj de la simulación
    #[arg(long, value_enum)]
    clock: Option<ClockMode>,

    /// Formato del reporte
    #[arg(short, long, value_enum)]
    format: Option<OutputFormat>,

    /// Aumenta el detalle de los logs (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    /// Combina el archivo de configuración con las opciones de la línea de
    /// comandos; las opciones tienen prioridad.
    fn into_config(self) -> Result<SimulationConfig> {
        let mut config = match &self.config {
            Some(path) => SimulationConfig::from_file(path)?,
            None => SimulationConfig::default(),
        };

        if !self.processes.is_empty() {
            config.processes = self.processes;
        }
        if let Some(modules) = self.modules {
            config.modules = modules;
        }
        if let Some(time_unit_ms) = self.time_unit_ms {
            config.time_unit_ms = time_unit_ms;
        }
        if let Some(clock) = self.clock {
            config.clock = clock;
        }
        if let Some(format) = self.format {
            config.format = format;
        }

        config.validate()?;
        Ok(config)
    }
}

fn init_log(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    if let Err(e) = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_thread_names(true)
        .try_init()
    {
        eprintln!("failed to init logger: {}", e);
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_log(cli.verbose);

    let config = cli.into_config()?;
    if config.processes.is_empty() {
        bail!("no process files given (pass them as arguments or set `processes` in the config file)");
    }

    let processes = load_processes(&config.processes, &config.module_set())
        .context("failed to load process files")?;
    info!(
        processes = processes.len(),
        clock = %config.clock,
        time_unit_ms = config.time_unit_ms,
        "simulation configured"
    );

    let metrics = simulate(&config, &processes).context("simulation failed")?;

    let calculator = MetricsCalculator::new();
    let report = match config.format {
        OutputFormat::Text => calculator.generate_report(&metrics),
        OutputFormat::Csv => calculator.generate_csv_report(&metrics),
        OutputFormat::Json => calculator.generate_json_report(&metrics)?,
    };
    println!("{report}");

    Ok(())
}
