use super::Base;
use crate::allocation::ResourceAllocation;
use crate::instruction::{InstructionDescriptor, Payload};
use crate::socket::{self, StageSocket};
use smallvec::SmallVec;
use std::collections::VecDeque;

pub const MAX_STAGES: usize = 4;

pub type Latencies = SmallVec<[u64; MAX_STAGES]>;

/// One slice of an instruction's work travelling through the stages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch<T> {
    pub descriptor: InstructionDescriptor,
    pub index: usize,
    pub last: bool,
    /// Cycles spent in each stage, a missing or zero entry counts as one cycle.
    pub latencies: Latencies,
    pub info: T,
}

impl<T> Batch<T> {
    /// Splits an instruction into `count` batches (at least one).
    pub fn split(
        descriptor: InstructionDescriptor,
        count: usize,
        latencies: &[u64],
        mut info: impl FnMut(usize) -> T,
    ) -> Vec<Self> {
        let count = count.max(1);
        (0..count)
            .map(|index| Batch {
                descriptor,
                index,
                last: index + 1 == count,
                latencies: latencies.iter().copied().collect(),
                info: info(index),
            })
            .collect()
    }

    fn latency(&self, stage: usize) -> u64 {
        self.latencies.get(stage).copied().unwrap_or(1).max(1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Departure {
    pub instruction_id: i64,
    pub index: usize,
    pub stage: usize,
}

/// What happened in the pipeline during one cycle.
#[derive(Debug)]
pub struct Progress<T> {
    pub departed: SmallVec<[Departure; MAX_STAGES]>,
    /// Batches that left the last stage.
    pub finished: Vec<Batch<T>>,
}

#[derive(Debug)]
struct Stage<T> {
    name: &'static str,
    remaining: u64,
    socket: StageSocket<Batch<T>>,
}

/// A chain of stage sockets.
///
/// Batches move back to front first so that a stage freed in this cycle can
/// accept its predecessor's batch within the same cycle.
#[derive(Debug)]
pub struct BatchPipeline<T> {
    stages: Vec<Stage<T>>,
}

impl<T> BatchPipeline<T> {
    #[must_use]
    pub fn new(stage_names: &[&'static str]) -> Self {
        debug_assert!(!stage_names.is_empty() && stage_names.len() <= MAX_STAGES);
        let stages = stage_names
            .iter()
            .map(|&name| Stage {
                name,
                remaining: 0,
                socket: StageSocket::new(),
            })
            .collect();
        Self { stages }
    }

    #[must_use]
    pub fn num_stages(&self) -> usize {
        self.stages.len()
    }

    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.stages.iter().all(|stage| stage.socket.is_vacant())
    }

    /// Counts down busy stages and moves completed batches on.
    pub fn advance(&mut self) -> Progress<T> {
        let mut progress = Progress {
            departed: SmallVec::new(),
            finished: Vec::new(),
        };
        for stage in &mut self.stages {
            if stage.socket.is_busy() {
                stage.remaining = stage.remaining.saturating_sub(1);
            }
        }

        let last = self.stages.len() - 1;
        for idx in (0..self.stages.len()).rev() {
            let (head, tail) = self.stages.split_at_mut(idx + 1);
            let current = &mut head[idx];
            if !current.socket.is_busy() || current.remaining > 0 {
                continue;
            }
            let Some(batch) = current.socket.payload() else {
                continue;
            };
            let departure = Departure {
                instruction_id: batch.descriptor.id,
                index: batch.index,
                stage: idx,
            };
            if idx == last {
                if let Some(batch) = current.socket.finish() {
                    progress.finished.push(batch);
                    progress.departed.push(departure);
                }
            } else if socket::forward(&mut current.socket, &mut tail[0].socket) {
                progress.departed.push(departure);
            } else {
                log::trace!(
                    "pipeline: batch {} of {} stalled in {}",
                    departure.index,
                    departure.instruction_id,
                    current.name
                );
            }
        }
        progress
    }

    /// Places a batch in the first stage.
    pub fn push(&mut self, batch: Batch<T>) -> Result<(), Batch<T>> {
        match self.stages.first_mut() {
            Some(first) => socket::send_and_start_next(batch, &mut first.socket),
            None => Err(batch),
        }
    }

    /// Starts stages that received a batch this cycle.
    pub fn start(&mut self) {
        for (idx, stage) in self.stages.iter_mut().enumerate() {
            if let std::task::Poll::Ready(batch) = stage.socket.poll_start() {
                stage.remaining = batch.latency(idx);
                log::trace!(
                    "pipeline: {} starts batch {} of {} for {} cycles",
                    stage.name,
                    batch.index,
                    batch.descriptor,
                    stage.remaining
                );
            }
        }
    }
}

/// Feeds the batches of one admitted instruction into a pipeline.
///
/// After a batch is pushed, the next one waits until that batch left the
/// gate stage: the first stage when batches may overlap, the last stage otherwise.
#[derive(Debug)]
pub struct BatchIssue<T> {
    pending: VecDeque<Batch<T>>,
    gate_stage: usize,
    awaiting: Option<usize>,
    instruction_id: i64,
}

impl<T> BatchIssue<T> {
    #[must_use]
    pub fn new(instruction_id: i64, batches: Vec<Batch<T>>, gate_stage: usize) -> Self {
        Self {
            pending: batches.into(),
            gate_stage,
            awaiting: None,
            instruction_id,
        }
    }

    pub fn observe(&mut self, departed: &[Departure]) {
        let Some(index) = self.awaiting else {
            return;
        };
        let passed_gate = departed.iter().any(|departure| {
            departure.instruction_id == self.instruction_id
                && departure.index == index
                && departure.stage == self.gate_stage
        });
        if passed_gate {
            self.awaiting = None;
        }
    }

    /// Pushes the next batch if possible, returns `true` once all batches are issued.
    pub fn step(&mut self, pipeline: &mut BatchPipeline<T>) -> bool {
        if self.awaiting.is_some() {
            return false;
        }
        let Some(batch) = self.pending.pop_front() else {
            return true;
        };
        let (index, last) = (batch.index, batch.last);
        match pipeline.push(batch) {
            Ok(()) if last => true,
            Ok(()) => {
                self.awaiting = Some(index);
                false
            }
            Err(batch) => {
                self.pending.push_front(batch);
                false
            }
        }
    }
}

/// The work an admitted instruction is split into.
#[derive(Debug)]
pub struct Plan<T> {
    pub allocation: ResourceAllocation,
    pub batches: Vec<Batch<T>>,
    /// Whether consecutive batches may overlap in the pipeline.
    pub use_pipeline: bool,
}

/// Shared shape of units that stream batches through a chain of stages.
///
/// The issue stage admits one instruction at a time and reports ready again
/// once its last batch entered the pipeline. The instruction's resources are
/// released when its last batch leaves the last stage.
#[derive(Debug)]
pub struct PipelinedUnit<T> {
    pub base: Base,
    pipeline: BatchPipeline<T>,
    issue: Option<BatchIssue<T>>,
}

impl<T> PipelinedUnit<T> {
    #[must_use]
    pub fn new(base: Base, stage_names: &[&'static str]) -> Self {
        Self {
            base,
            pipeline: BatchPipeline::new(stage_names),
            issue: None,
        }
    }

    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.issue.is_none() && self.pipeline.is_idle()
    }

    /// Steps the unit by one cycle.
    ///
    /// `plan` splits a newly admitted instruction into batches, returning
    /// `None` rejects it. `on_finished` sees every batch leaving the last stage.
    pub fn cycle_with<P, F>(&mut self, cycle: u64, plan: P, mut on_finished: F)
    where
        P: FnOnce(&InstructionDescriptor, Payload) -> Option<Plan<T>>,
        F: FnMut(&Batch<T>),
    {
        let progress = self.pipeline.advance();
        if let Some(issue) = &mut self.issue {
            issue.observe(&progress.departed);
        }
        for batch in progress.finished {
            on_finished(&batch);
            self.base.stats.batches += 1;
            if batch.last {
                self.base.release(batch.descriptor.id);
                self.base.finish_instruction(&batch.descriptor, cycle);
            }
        }

        if self.issue.is_none() {
            if let Some((descriptor, payload)) = self.base.admit() {
                match plan(&descriptor, payload) {
                    Some(Plan {
                        allocation,
                        batches,
                        use_pipeline,
                    }) => {
                        let gate_stage = if use_pipeline {
                            0
                        } else {
                            self.pipeline.num_stages() - 1
                        };
                        log::debug!(
                            "{}: {} split into {} batches (pipelined={})",
                            self.base.name,
                            descriptor,
                            batches.len(),
                            use_pipeline
                        );
                        self.base.allocate(allocation);
                        self.issue = Some(BatchIssue::new(descriptor.id, batches, gate_stage));
                    }
                    None => self.base.reject(&descriptor, cycle),
                }
            }
        }

        if let Some(issue) = &mut self.issue {
            if issue.step(&mut self.pipeline) {
                self.issue = None;
                self.base.ready_for_next();
            }
        }

        self.pipeline.start();
        self.base.tick();
    }
}
