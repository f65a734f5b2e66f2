use asclepius::workload::{run_department, DayType, DepartmentConfig};
use asclepius::{KernelResult, RunReport};
use tracing_subscriber::EnvFilter;

fn main() {
    init_log();

    println!("═══════════════════════════════════════════════════════");
    println!("  Asclepius — Emergency Department Simulation");
    println!("═══════════════════════════════════════════════════════");
    println!();

    // ── Same seed twice ───────────────────────────────────────
    let first = run("Run 1", &DepartmentConfig::new());
    let second = run("Run 2", &DepartmentConfig::new());
    match (&first, &second) {
        (Some(a), Some(b)) if a == b => println!("    ✓ Runs are IDENTICAL — deterministic replay confirmed."),
        (Some(_), Some(_)) => println!("    ✗ MISMATCH — determinism violation detected!"),
        _ => {}
    }
    println!();

    // ── Busier days ───────────────────────────────────────────
    for day_type in [DayType::Weekend, DayType::Holiday] {
        let config = DepartmentConfig::new().with_day_type(day_type);
        run(&format!("{day_type}"), &config);
    }
}

fn run(label: &str, config: &DepartmentConfig) -> Option<RunReport> {
    let result: KernelResult<RunReport> = run_department(config);
    match result {
        Ok(report) => {
            println!("  {label}: {}", report.summary);
            println!(
                "    {} arrived, {} events, peak load nurses={} doctors={} lab={} xray={}",
                report.arrivals,
                report.events,
                report.peak_load("nurses"),
                report.peak_load("doctors"),
                report.peak_load("lab_techs"),
                report.peak_load("xray_machines"),
            );
            Some(report)
        }
        Err(e) => {
            eprintln!("  {label}: run failed: {e}");
            None
        }
    }
}

fn init_log() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if let Err(e) = tracing_subscriber::fmt().with_env_filter(env_filter).with_target(false).try_init() {
        eprintln!("failed to init logger: {e}");
    }
}
