use super::mock::{Script, UnitSpec};
use crate::engine::cycle::Component;
use crate::instruction::UnitType;

#[test]
fn dispatch_reaches_exactly_one_unit() {
    super::init_logging();
    let mut script = Script::new();
    let ids = [
        script.push(UnitType::Scalar, &[], &[0]),
        script.push(UnitType::Transfer, &[1], &[2]),
        script.push(UnitType::Simd, &[3], &[4]),
        script.push(UnitType::Scalar, &[], &[5]),
    ];
    let mut harness = script.build(&[
        UnitSpec::new(UnitType::Scalar, 1),
        UnitSpec::new(UnitType::Transfer, 2),
        UnitSpec::new(UnitType::Simd, 3),
    ]);
    assert!(harness.run(100).is_some());

    let trace = harness.trace.lock();
    let expected = [
        UnitType::Scalar,
        UnitType::Transfer,
        UnitType::Simd,
        UnitType::Scalar,
    ];
    for (id, unit_type) in ids.into_iter().zip(expected) {
        let dispatches: Vec<_> = trace.dispatches(id).collect();
        assert_eq!(dispatches.len(), 3, "instruction {id} seen by every unit");
        let targets: Vec<_> = dispatches
            .iter()
            .filter(|issued| issued.has_payload)
            .map(|issued| issued.unit_type)
            .collect();
        assert_eq!(targets, vec![unit_type]);
    }
    drop(trace);

    let stats = harness.core.stats();
    assert_eq!(stats.scheduler.num_decoded, 4);
    assert_eq!(stats.scheduler.dispatched, 4);
    assert_eq!(stats.scheduler.dropped, 0);
}

#[test]
fn single_candidate_in_program_order() {
    super::init_logging();
    let mut script = Script::new();
    for _ in 0..4 {
        script.push(UnitType::Scalar, &[0], &[0]);
    }
    let mut harness = script.build(&[UnitSpec::new(UnitType::Scalar, 3)]);

    let mut candidates = Vec::new();
    for cycle in 1..50 {
        harness.core.cycle(cycle);
        if let Some(candidate) = harness.core.candidate() {
            candidates.push(candidate.descriptor().id);
        }
        if harness.core.is_finished() {
            break;
        }
    }
    assert!(harness.core.is_finished());
    // stalled candidates stay in the slot, later ones only follow in order
    assert!(!candidates.is_empty());
    assert!(candidates.windows(2).all(|pair| pair[0] <= pair[1]));

    let trace = harness.trace.lock();
    let started: Vec<_> = trace.started.iter().map(|(id, _)| *id).collect();
    assert_eq!(started, vec![0, 1, 2, 3]);
}

#[test]
fn independent_instructions_complete_out_of_order() {
    super::init_logging();
    let mut script = Script::new();
    let slow = script.push(UnitType::Scalar, &[], &[0]);
    let fast = script.push(UnitType::Transfer, &[1], &[2]);
    let mut harness = script.build(&[
        UnitSpec::new(UnitType::Scalar, 5),
        UnitSpec::new(UnitType::Transfer, 1),
    ]);
    assert_eq!(harness.run(100), Some(7));

    let trace = harness.trace.lock();
    assert_eq!(trace.started(slow), Some(2));
    assert_eq!(trace.started(fast), Some(3));
    assert_eq!(trace.finished(fast), Some(4));
    assert_eq!(trace.finished(slow), Some(7));
    drop(trace);
    assert_eq!(harness.core.stats().scheduler.hazard_stall, 0);
}

#[test]
fn transfer_waits_for_scalar_write() {
    super::init_logging();
    let mut script = Script::new();
    let write = script.push(UnitType::Scalar, &[], &[1]);
    let read = script.push(UnitType::Transfer, &[1], &[]);
    let mut harness = script.build(&[
        UnitSpec::new(UnitType::Scalar, 4),
        UnitSpec::new(UnitType::Transfer, 1),
    ]);

    for cycle in 1..=3 {
        harness.core.cycle(cycle);
    }
    // the transfer is decoded but held back by the scalar record
    assert!(harness.core.is_stalled());
    assert_eq!(
        harness.core.candidate().map(|candidate| candidate.descriptor().id),
        Some(read)
    );
    let scalar = harness.core.units().get(UnitType::Scalar).unwrap();
    assert!(scalar.conflict);
    assert!(scalar.detector.is_tracked(write));
    let transfer = harness.core.units().get(UnitType::Transfer).unwrap();
    assert!(!transfer.conflict);

    let finished = (4..100).find(|&cycle| {
        harness.core.cycle(cycle);
        harness.core.is_finished()
    });
    assert_eq!(finished, Some(8));

    let trace = harness.trace.lock();
    assert_eq!(trace.finished(write), Some(6));
    // released in cycle 6, dispatched in cycle 6, admitted in cycle 7
    assert_eq!(trace.started(read), Some(7));
    drop(trace);

    let stats = harness.core.stats();
    assert_eq!(stats.scheduler.hazard_stall, 4);
    assert_eq!(stats.scheduler.unit_busy_stall, 0);
    assert_eq!(stats.scheduler.dispatched, 2);
}

#[test]
fn busy_unit_stalls_its_own_instructions() {
    super::init_logging();
    let mut script = Script::new();
    let first = script.push(UnitType::Scalar, &[], &[]);
    let second = script.push(UnitType::Scalar, &[], &[]);
    let mut harness = script.build(&[UnitSpec::new(UnitType::Scalar, 3).blocking()]);
    assert!(harness.run(100).is_some());

    let trace = harness.trace.lock();
    assert_eq!(trace.finished(first), Some(5));
    assert_eq!(trace.started(second), Some(6));
    drop(trace);

    let stats = harness.core.stats();
    assert_eq!(stats.scheduler.unit_busy_stall, 3);
    assert_eq!(stats.scheduler.hazard_stall, 0);
}

#[test]
fn core_finishes_only_when_every_unit_finished() {
    super::init_logging();
    let mut script = Script::new();
    script.push(UnitType::Scalar, &[], &[0]);
    script.push(UnitType::Transfer, &[1], &[2]);
    let mut harness = script.build(&[
        UnitSpec::new(UnitType::Scalar, 1),
        UnitSpec::new(UnitType::Transfer, 6),
    ]);

    let mut partially_finished = false;
    let mut finish_cycle = None;
    for cycle in 1..50 {
        harness.core.cycle(cycle);
        let finished: Vec<bool> = harness
            .core
            .units()
            .iter()
            .map(|registration| registration.unit.run_finished())
            .collect();
        let all = finished.iter().all(|finished| *finished);
        partially_finished |= !all && finished.iter().any(|finished| *finished);
        assert_eq!(harness.core.is_finished(), all, "cycle {cycle}");
        if all {
            finish_cycle = Some(cycle);
            break;
        }
    }
    assert!(partially_finished);
    assert_eq!(finish_cycle, Some(9));

    let stats = harness.core.stats();
    assert_eq!(stats.finish_cycle, Some(9));
    assert_eq!(stats.scheduler.drain_cycles, 6);
    assert_eq!(stats.units.get("transfer").map(|unit| unit.finished), Some(1));
}

#[test]
fn instructions_without_unit_are_dropped() {
    super::init_logging();
    let mut script = Script::new();
    script.push(UnitType::None, &[], &[]);
    script.push(UnitType::Simd, &[0], &[1]);
    script.push(UnitType::Scalar, &[], &[2]);
    let mut harness = script.build(&[UnitSpec::new(UnitType::Scalar, 1)]);
    assert!(harness.run(100).is_some());

    let stats = harness.core.stats();
    assert_eq!(stats.scheduler.num_decoded, 3);
    assert_eq!(stats.scheduler.dropped, 2);
    assert_eq!(stats.scheduler.dispatched, 1);
    assert_eq!(harness.trace.lock().started.len(), 1);
}
