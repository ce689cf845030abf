//! Tests de integración para el simulador de procesos de clúster

use std::fs;
use std::sync::Arc;
use std::time::Duration;

use cluster_process_simulator::{
    load_processes, simulate, AdmissionPolicy, ClockMode, MetricsCalculator, ModuleRegistry,
    Operation, Process, ProcessMetrics, Request, RunError, RunState, Scheduler, SimulationConfig,
    SimulationError, SimulationMetrics, VirtualClock,
};
use proptest::prelude::*;

fn virtual_config(modules: &[&str]) -> SimulationConfig {
    SimulationConfig {
        modules: modules.iter().map(|m| m.to_string()).collect(),
        clock: ClockMode::Virtual,
        ..Default::default()
    }
}

fn real_config(modules: &[&str], time_unit_ms: u64) -> SimulationConfig {
    SimulationConfig {
        modules: modules.iter().map(|m| m.to_string()).collect(),
        time_unit_ms,
        clock: ClockMode::Real,
        ..Default::default()
    }
}

fn pick_place(module: &str, work: i64) -> Vec<Operation> {
    vec![Operation::pick(module, work), Operation::place(module, 0)]
}

/// Proceso que llega a `PICK module` después de `delay` unidades de trabajo
/// en un módulo propio.
fn delayed(id: &str, private: &str, delay: i64, module: &str, work: i64) -> Process {
    let mut operations = pick_place(private, delay);
    operations.extend(pick_place(module, work));
    Process::new(id, operations)
}

fn ms(millis: u64) -> Duration {
    Duration::from_millis(millis)
}

fn by_grant_order(metrics: &SimulationMetrics) -> Vec<&str> {
    let mut processes: Vec<&ProcessMetrics> = metrics.processes.iter().collect();
    processes.sort_by_key(|p| p.end_time);
    processes.iter().map(|p| p.process_id.as_str()).collect()
}

#[test]
fn test_single_process_single_module() {
    let processes = vec![Process::new("p1", pick_place("M", 5))];
    let metrics = simulate(&virtual_config(&["M"]), &processes).unwrap();

    let p1 = metrics.process("p1").unwrap();
    assert_eq!(p1.work_time, ms(5));
    assert_eq!(p1.wait_time, Duration::ZERO);
    assert_eq!(p1.elapsed, ms(5));
}

#[test]
fn test_two_processes_contend_for_one_module() {
    let processes = vec![
        Process::new("p1", pick_place("M", 10)),
        delayed("p2", "X", 1, "M", 5),
    ];
    let metrics = simulate(&virtual_config(&["M", "X"]), &processes).unwrap();

    let p1 = metrics.process("p1").unwrap();
    assert_eq!(p1.wait_time, Duration::ZERO);
    assert_eq!(p1.end_time, ms(10));

    let p2 = metrics.process("p2").unwrap();
    assert_eq!(p2.wait_time, ms(9));
    assert_eq!(p2.wait_by_module.get("M"), Some(&ms(9)));
    assert_eq!(p2.wait_by_module.get("X"), Some(&Duration::ZERO));
    assert_eq!(p2.work_time, ms(6));
    assert_eq!(p2.elapsed, ms(15));
    assert_eq!(metrics.cluster_time, ms(15));
}

#[test]
fn test_grants_follow_issuance_order_not_input_order() {
    // Orden de entrada P1, P2, P3; orden de solicitud P3, P1, P2
    let processes = vec![
        delayed("p1", "a", 1, "M", 10),
        delayed("p2", "b", 2, "M", 10),
        Process::new("p3", pick_place("M", 10)),
    ];
    let metrics = simulate(&virtual_config(&["M", "a", "b"]), &processes).unwrap();

    assert_eq!(by_grant_order(&metrics), vec!["p3", "p1", "p2"]);
    assert_eq!(metrics.process("p3").unwrap().wait_time, Duration::ZERO);
    assert_eq!(metrics.process("p1").unwrap().wait_time, ms(9));
    assert_eq!(metrics.process("p2").unwrap().wait_time, ms(18));

    // Las métricas se reportan en el orden de entrada
    let ids: Vec<&str> = metrics.processes.iter().map(|p| p.process_id.as_str()).collect();
    assert_eq!(ids, vec!["p1", "p2", "p3"]);
}

#[test]
fn test_grants_follow_issuance_order_on_real_clock() {
    let processes = vec![
        delayed("p1", "a", 1, "M", 2),
        delayed("p2", "b", 2, "M", 2),
        Process::new("p3", pick_place("M", 2)),
    ];
    let metrics = simulate(&real_config(&["M", "a", "b"], 20), &processes).unwrap();

    assert_eq!(by_grant_order(&metrics), vec!["p3", "p1", "p2"]);
}

#[test]
fn test_unknown_module_fails_the_run() {
    let processes = vec![
        Process::new("p1", pick_place("M", 10)),
        Process::new("p2", pick_place("Z", 1)),
    ];
    let registry = ModuleRegistry::new(["M"], Arc::new(VirtualClock::new()));
    let mut scheduler = Scheduler::new(registry);

    let err = scheduler.run(&processes).unwrap_err();
    assert_eq!(err.kind(), Some(&SimulationError::UnknownModule("Z".to_string())));
    assert_eq!(err.process().map(|p| p.as_str()), Some("p2"));
    assert_eq!(scheduler.state(), RunState::Failed);
    assert!(scheduler.registry().is_aborted());
}

#[test]
fn test_place_without_pick_fails_the_run() {
    let processes = vec![Process::new("p1", vec![Operation::place("M", 1)])];
    let err = simulate(&virtual_config(&["M"]), &processes).unwrap_err();

    match err {
        RunError::Operation { index, source, .. } => {
            assert_eq!(index, 0);
            assert_eq!(source, SimulationError::UnmatchedPlace("M".to_string()));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_independent_modules_run_in_parallel() {
    let processes = vec![
        Process::new("p1", pick_place("A", 10)),
        Process::new("p2", pick_place("B", 6)),
    ];

    let metrics = simulate(&virtual_config(&["A", "B"]), &processes).unwrap();
    assert_eq!(metrics.cluster_time, ms(10));
    assert!(metrics.processes.iter().all(|p| p.wait_time.is_zero()));

    // Con reloj real: 100 ms y 60 ms en paralelo, no 160 ms
    let metrics = simulate(&real_config(&["A", "B"], 10), &processes).unwrap();
    assert!(metrics.processes.iter().all(|p| p.wait_time < ms(5)));
    assert!(metrics.cluster_time >= ms(100));
    assert!(metrics.cluster_time < ms(150), "cluster time {:?}", metrics.cluster_time);
}

#[test]
fn test_real_clock_elapsed_matches_work_plus_wait() {
    let processes = vec![
        Process::new("p1", pick_place("M", 20)),
        delayed("p2", "X", 5, "M", 10),
    ];
    let metrics = simulate(&real_config(&["M", "X"], 1), &processes).unwrap();

    for process in &metrics.processes {
        let accounted = process.work_time + process.wait_time;
        assert!(process.elapsed >= accounted);
        assert!(
            process.elapsed - accounted < ms(30),
            "{}: elapsed {:?}, work + wait {:?}",
            process.process_id,
            process.elapsed,
            accounted
        );
    }
    assert!(metrics.process("p2").unwrap().wait_time >= ms(10));
}

#[test]
fn test_repeated_runs_are_identical() {
    let processes = vec![
        Process::new("p1", [pick_place("inc", 4), pick_place("arm", 7)].concat()),
        Process::new("p2", [pick_place("arm", 3), pick_place("smp", 2)].concat()),
        Process::new("p3", [pick_place("smp", 5), pick_place("inc", 1)].concat()),
    ];
    let config = virtual_config(&["inc", "arm", "smp"]);

    let first = simulate(&config, &processes).unwrap();
    for _ in 0..5 {
        assert_eq!(simulate(&config, &processes).unwrap(), first);
    }
}

#[test]
fn test_uncontended_process_never_waits() {
    let processes = vec![
        Process::new("p1", [pick_place("arm", 5), pick_place("smp", 5)].concat()),
        Process::new("p2", [pick_place("arm", 5), pick_place("smp", 5)].concat()),
        Process::new("loner", [pick_place("inc", 3), pick_place("out", 3)].concat()),
    ];
    let metrics = simulate(&virtual_config(&["arm", "smp", "inc", "out"]), &processes).unwrap();

    assert_eq!(metrics.process("loner").unwrap().wait_time, Duration::ZERO);
    assert!(metrics.process("p2").unwrap().wait_time > Duration::ZERO);
}

/// El último en llegar entra primero.
#[derive(Debug)]
struct LastComeFirstServed;

impl AdmissionPolicy for LastComeFirstServed {
    fn name(&self) -> &'static str {
        "LCFS"
    }

    fn admit(&self, pending: &[Request]) -> Option<usize> {
        pending
            .iter()
            .enumerate()
            .max_by_key(|(_, request)| request.ticket)
            .map(|(index, _)| index)
    }
}

#[test]
fn test_admission_policy_is_swappable() {
    let processes = vec![
        Process::new("p1", pick_place("M", 10)),
        delayed("p2", "a", 1, "M", 10),
        delayed("p3", "b", 2, "M", 10),
    ];
    let registry = ModuleRegistry::with_policy(
        ["M", "a", "b"],
        Arc::new(VirtualClock::new()),
        Arc::new(LastComeFirstServed),
    );

    let metrics = Scheduler::new(registry).run(&processes).unwrap();
    assert_eq!(by_grant_order(&metrics), vec!["p1", "p3", "p2"]);
}

#[test]
fn test_load_and_report_from_csv_files() {
    let dir = tempfile::tempdir().unwrap();
    let p1 = dir.path().join("grex_process_1.csv");
    let p2 = dir.path().join("grex_process_2.csv");
    fs::write(&p1, "module,operation,duration\narm,0x500,40\narm,0x600,0\n").unwrap();
    fs::write(&p2, "module,operation,duration\n\narm,PICK,10\narm,PLACE,5\n").unwrap();

    let config = SimulationConfig {
        clock: ClockMode::Virtual,
        ..Default::default()
    };
    let processes = load_processes(&[&p1, &p2], &config.module_set()).unwrap();
    let metrics = simulate(&config, &processes).unwrap();

    let csv = MetricsCalculator::new().generate_csv_report(&metrics);
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines[1], "grex_process_1,2,0.000,40.000,40.000,0.000,40.000");
    assert_eq!(lines[2], "grex_process_2,2,0.000,55.000,15.000,40.000,55.000");
}

fn arb_process(modules: usize) -> impl Strategy<Value = Vec<Operation>> {
    prop::collection::vec((0..modules, 0i64..20, 0i64..5), 0..4).prop_map(|pairs| {
        pairs
            .into_iter()
            .flat_map(|(module, work, tail)| {
                let module = format!("m{module}");
                vec![Operation::pick(&module, work), Operation::place(&module, tail)]
            })
            .collect()
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_virtual_runs_are_exact_and_repeatable(
        operations in prop::collection::vec(arb_process(3), 1..5)
    ) {
        let processes: Vec<Process> = operations
            .into_iter()
            .enumerate()
            .map(|(i, ops)| Process::new(format!("p{i}"), ops))
            .collect();
        let config = virtual_config(&["m0", "m1", "m2"]);

        let first = simulate(&config, &processes).unwrap();
        for (process, metrics) in processes.iter().zip(&first.processes) {
            let nominal = u64::try_from(process.nominal_work_units()).unwrap();
            prop_assert_eq!(metrics.work_time, ms(nominal));
            prop_assert_eq!(metrics.elapsed, metrics.work_time + metrics.wait_time);
            prop_assert_eq!(
                metrics.wait_time,
                metrics.wait_by_module.values().sum::<Duration>()
            );
        }

        let second = simulate(&config, &processes).unwrap();
        prop_assert_eq!(first, second);
    }
}
