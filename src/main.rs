use clap::Parser;
use color_eyre::eyre;
use console::style;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
struct Options {
    /// Program to simulate
    #[arg(short = 'p', long = "program", value_name = "PROGRAM")]
    program: PathBuf,
    /// Chip and simulation config, defaults to a single core chip
    #[arg(short = 'c', long = "config", value_name = "CONFIG")]
    config: Option<PathBuf>,
    /// Write statistics as json
    #[arg(long = "stats", value_name = "STATS")]
    stats: Option<PathBuf>,
    /// Turn debugging information on
    #[arg(short, long, action = clap::ArgAction::Count)]
    debug: u8,
}

fn main() -> eyre::Result<()> {
    color_eyre::install()?;
    let options = Options::parse();

    let level = match options.debug {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();

    let start = std::time::Instant::now();
    let stats = cimsim::run(options.config.as_deref(), &options.program)?;

    let scheduler = stats.scheduler_total();
    println!(
        "{} {} cycles ({} ns simulated) in {:?}",
        style("cimsim:").bold(),
        stats.sim.cycles,
        stats.sim.elapsed_ns,
        start.elapsed()
    );
    println!(
        "dispatched {} of {} decoded instructions ({} dropped)",
        scheduler.dispatched, scheduler.num_decoded, scheduler.dropped
    );
    let instructions = stats.instructions_total();
    println!(
        "instructions: {} scalar, {} simd, {} reduce, {} transfer, {} cim, {} control",
        instructions.scalar.total,
        instructions.simd.total,
        instructions.reduce.total,
        instructions.transfer.total,
        instructions.cim.total,
        instructions.control.total
    );
    println!(
        "stalls: {} hazard, {} unit busy, {} drain",
        scheduler.hazard_stall, scheduler.unit_busy_stall, scheduler.drain_cycles
    );
    for (name, unit) in stats.units_total().iter() {
        println!(
            "{name:>12}: {} admitted, {} batches, {} busy cycles",
            unit.admitted, unit.batches, unit.busy_cycles
        );
    }
    if stats.sim.deadline_reached {
        println!(
            "{}",
            style(format!(
                "deadline reached with {}/{} cores finished",
                stats.sim.finished_cores,
                stats.cores.len()
            ))
            .red()
        );
    }

    if let Some(path) = &options.stats {
        cimsim::save_stats(&stats, path)?;
    }
    Ok(())
}
