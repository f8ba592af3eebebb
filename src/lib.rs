#![allow(
    clippy::missing_panics_doc,
    clippy::missing_errors_doc,
    clippy::too_many_lines,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss,
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap
)]

pub mod address_space;
pub mod allocation;
pub mod chip;
pub mod clock;
pub mod config;
pub mod core;
pub mod decoder;
pub mod engine;
pub mod func_unit;
pub mod hazard;
pub mod instruction;
pub mod memory;
pub mod program;
pub mod registers;
pub mod socket;
pub mod sync;

#[cfg(test)]
pub mod testing;

use color_eyre::eyre;
use std::path::Path;

/// Writes `stats` as pretty printed json.
pub fn save_stats(stats: &stats::Stats, path: impl AsRef<Path>) -> eyre::Result<()> {
    use serde::Serialize;

    let output_file = utils::fs::open_writable(path)?;
    let mut json_serializer = serde_json::Serializer::with_formatter(
        output_file,
        serde_json::ser::PrettyFormatter::with_indent(b"    "),
    );
    stats.serialize(&mut json_serializer)?;
    Ok(())
}

/// Loads the config and program and simulates them to completion.
///
/// Without a config path the default chip is simulated.
pub fn run(
    config_path: Option<&Path>,
    program_path: impl AsRef<Path>,
) -> eyre::Result<stats::Stats> {
    #[cfg(feature = "deadlock_detection")]
    std::thread::spawn(move || loop {
        // Create a background thread which checks for deadlocks every 10s
        std::thread::sleep(std::time::Duration::from_secs(10));
        let deadlocks = parking_lot::deadlock::check_deadlock();
        if deadlocks.is_empty() {
            continue;
        }

        println!("{} deadlocks detected", deadlocks.len());
        for (i, threads) in deadlocks.iter().enumerate() {
            println!("Deadlock #{i}");
            for t in threads {
                println!("Thread Id {:#?}", t.thread_id());
                println!("{:#?}", t.backtrace());
            }
        }
    });

    let config = match config_path {
        Some(path) => config::Config::load(path)?,
        None => config::Config::default(),
    };
    let program = program::Program::load(program_path.as_ref())?;
    log::info!(
        "loaded program with {} instructions for {} cores",
        program.num_instructions(),
        program.cores.len()
    );

    let mut chip = chip::Chip::new(&config, program)?;
    Ok(chip.run())
}
