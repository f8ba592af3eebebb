use crate::chip::Chip;
use crate::config;
use crate::program::Program;

const SCALAR_AND_COPY: &str = r#"[
    {"op": "g_li", "rd": 1, "imm": 0},
    {"op": "g_li", "rd": 2, "imm": 42},
    {"op": "sc_st", "rs": 1, "rt": 2, "imm": 0},
    {"op": "sc_ld", "rs": 1, "rd": 3, "imm": 0},
    {"op": "g_li", "rd": 4, "imm": 65536},
    {"op": "g_li", "rd": 5, "imm": 4},
    {"op": "mem_cpy", "rs": 1, "rt": 5, "rd": 4},
    {"op": "sc_ld", "rs": 4, "rd": 6, "imm": 0},
    {"op": "g_li", "rd": 7, "imm": 3},
    {"op": "g_li", "rd": 8, "imm": 0},
    {"op": "sc_ri", "funct": "add", "rs": 8, "rd": 8, "imm": 1},
    {"op": "bne", "rs": 8, "rt": 7, "imm": -1},
    {"op": "sc_rr", "funct": "mul", "rs": 6, "rt": 7, "rd": 9}
]"#;

const VECTOR_AND_CIM: &str = r#"[
    {"op": "g_li", "rd": 1, "imm": 0},
    {"op": "g_li", "rd": 2, "imm": 32},
    {"op": "g_li", "rd": 3, "imm": 65536},
    {"op": "g_li", "rd": 4, "imm": 196608},
    {"op": "mem_cpy", "rs": 4, "rt": 2, "rd": 1},
    {"op": "vec_op", "functor": "vvadd", "input_count": 2, "rs": 1, "rt": 1, "rd": 3, "re": 2},
    {"op": "reduce", "functor": "sum", "rs": 3, "rd": 1, "re": 2},
    {"op": "cim_cfg", "rs": 0, "rt": 1},
    {"op": "cim_mvm", "rs": 1, "rt": 2, "re": 0},
    {"op": "cim_out", "rs": 2, "rt": 1, "rd": 3}
]"#;

fn program() -> Program {
    let core = |raw: &str| serde_json::from_str(raw).unwrap();
    Program::new(vec![core(SCALAR_AND_COPY), core(VECTOR_AND_CIM)])
}

fn config() -> config::Config {
    config::Config {
        chip: config::Chip {
            core_count: 2,
            ..config::Chip::default()
        },
        ..config::Config::default()
    }
}

#[test]
fn program_runs_to_completion() {
    super::init_logging();
    let mut chip = Chip::new(&config(), program()).unwrap();
    let stats = chip.run();

    assert!(chip.is_finished());
    assert!(!stats.sim.deadline_reached);
    assert_eq!(stats.sim.finished_cores, 2);
    assert_eq!(stats.sim.elapsed_ns, stats.sim.cycles * stats.sim.period_ns);

    chip.verify_registers(0, &[0, 0, 42, 42, 65536, 4, 42, 3, 3, 126])
        .unwrap();

    let scheduler = stats.scheduler_total();
    assert_eq!(scheduler.dropped, 0);
    // the loop body runs three times on core 0
    assert_eq!(stats.cores[0].scheduler.num_decoded, 17);
    assert_eq!(stats.cores[0].scheduler.dispatched, 14);
    assert_eq!(stats.cores[1].scheduler.dispatched, 10);

    let scalar_core = &stats.cores[0].instructions;
    assert_eq!(scalar_core.total, 17);
    assert_eq!(scalar_core.scalar.total, 13);
    assert_eq!(scalar_core.scalar.general_li, 6);
    assert_eq!(scalar_core.scalar.ri, 3);
    assert_eq!(scalar_core.scalar.load, 2);
    assert_eq!(scalar_core.scalar.store, 1);
    assert_eq!(scalar_core.scalar.rr, 1);
    assert_eq!(scalar_core.transfer.local, 1);
    assert_eq!(scalar_core.control.branch, 3);

    let vector_core = &stats.cores[1].instructions;
    assert_eq!(vector_core.total, 10);
    assert_eq!(vector_core.transfer.global_load, 1);
    assert_eq!(vector_core.simd.get("vvadd"), 1);
    assert_eq!(vector_core.reduce.get("sum"), 1);
    assert_eq!(vector_core.cim.total, 3);
    assert_eq!(
        (vector_core.cim.compute, vector_core.cim.set, vector_core.cim.output),
        (1, 1, 1)
    );
    assert_eq!(stats.instructions_total().total, 27);

    let units = &stats.cores[1].units;
    for (unit, admitted) in [
        ("transfer", 1),
        ("simd", 1),
        ("reduce", 1),
        ("cim_compute", 1),
        ("cim_control", 2),
    ] {
        assert_eq!(
            units.get(unit).map(|unit| unit.admitted),
            Some(admitted),
            "{unit}"
        );
    }
    assert_eq!(
        stats.units_total().get("transfer").map(|unit| unit.finished),
        Some(2)
    );
}

#[test]
fn run_from_files() {
    super::init_logging();
    let dir = std::env::temp_dir().join(format!("cimsim-{}", std::process::id()));
    let program_path = dir.join("program.json");
    let stats_path = dir.join("stats.json");

    let program = Program::new(vec![serde_json::from_str(SCALAR_AND_COPY).unwrap()]);
    let writer = utils::fs::open_writable(&program_path).unwrap();
    serde_json::to_writer(writer, &program).unwrap();

    let stats = crate::run(None, &program_path).unwrap();
    assert_eq!(stats.sim.finished_cores, 1);
    assert_eq!(stats.cores.len(), 1);

    crate::save_stats(&stats, &stats_path).unwrap();
    let reader = utils::fs::open_readable(&stats_path).unwrap();
    let saved: stats::Stats = serde_json::from_reader(reader).unwrap();
    pretty_assertions_sorted::assert_eq_sorted!(saved, stats);

    std::fs::remove_dir_all(&dir).ok();
}
