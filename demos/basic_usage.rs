//! Ejemplo básico de uso del simulador de procesos de clúster

use cluster_process_simulator::{
    simulate, ClockMode, MetricsCalculator, Operation, Process, SimulationConfig,
};

fn pick_place(module: &str, work: i64) -> Vec<Operation> {
    vec![Operation::pick(module, work), Operation::place(module, 0)]
}

fn main() {
    println!("=== Ejemplo: Uso Básico del Simulador ===\n");

    let processes = vec![
        Process::new("grex_1", [pick_place("arm", 40), pick_place("smp", 20)].concat()),
        Process::new("grex_2", [pick_place("smp", 30), pick_place("arm", 10)].concat()),
        Process::new("grex_3", [pick_place("inc", 15), pick_place("out", 15)].concat()),
    ];
    let calculator = MetricsCalculator::new();

    // Reloj virtual: tiempos exactos y reproducibles
    println!("1. Ejecutando con reloj virtual...");
    let virtual_config = SimulationConfig {
        clock: ClockMode::Virtual,
        ..Default::default()
    };
    let virtual_metrics = match simulate(&virtual_config, &processes) {
        Ok(metrics) => metrics,
        Err(e) => {
            eprintln!("La simulación falló: {}", e);
            return;
        }
    };
    println!("{}", calculator.generate_report(&virtual_metrics));

    // Reloj real: las esperas incluyen la latencia del sistema operativo
    println!("\n2. Ejecutando con reloj real (1 ms por unidad)...");
    let real_metrics = match simulate(&SimulationConfig::default(), &processes) {
        Ok(metrics) => metrics,
        Err(e) => {
            eprintln!("La simulación falló: {}", e);
            return;
        }
    };
    println!("{}", calculator.generate_report(&real_metrics));

    // Comparación de resultados
    println!("\n=== Comparación de Relojes ===");
    println!("| Proceso   | Espera virtual | Espera real |");
    println!("|-----------|----------------|-------------|");
    for (v, r) in virtual_metrics.processes.iter().zip(&real_metrics.processes) {
        println!(
            "| {:<9} | {:>14} | {:>11} |",
            v.process_id.as_str(),
            MetricsCalculator::format_duration(v.wait_time),
            MetricsCalculator::format_duration(r.wait_time)
        );
    }

    // Un proceso que nunca libera su módulo bloquea la ejecución
    println!("\n3. Proceso inválido (PICK sin PLACE)...");
    let invalid = vec![Process::new("roto", vec![Operation::pick("arm", 5)])];
    match simulate(&virtual_config, &invalid) {
        Ok(_) => println!("Inesperado: la ejecución terminó"),
        Err(e) => println!("Error detectado: {}", e),
    }
}
