use std::collections::BTreeSet;

/// Identifies a party waiting on the next clock edge.
pub type WakerId = usize;

/// Free running clock driving the simulation.
///
/// Parties register for the next positive edge with
/// [`Clock::notify_next_pos_edge`]. Every [`Clock::tick`] advances simulated
/// time by one period and wakes (and forgets) all registered parties.
#[derive(Debug)]
pub struct Clock {
    period_ns: u64,
    cycle: u64,
    pos_edge: bool,
    waiting: BTreeSet<WakerId>,
}

impl Clock {
    #[must_use]
    pub fn init(period_ns: u64) -> Self {
        log::debug!("clock: init with period {period_ns} ns");
        Self {
            period_ns,
            cycle: 0,
            pos_edge: false,
            waiting: BTreeSet::new(),
        }
    }

    pub fn notify_next_pos_edge(&mut self, waker: WakerId) {
        self.waiting.insert(waker);
    }

    /// Advances to the next edge and returns the parties to wake, in id order.
    pub fn tick(&mut self) -> Vec<WakerId> {
        self.cycle += 1;
        self.pos_edge = true;
        let woken = std::mem::take(&mut self.waiting);
        woken.into_iter().collect()
    }

    /// Leaves the edge instant after all woken parties ran.
    pub fn end_pos_edge(&mut self) {
        self.pos_edge = false;
    }

    #[must_use]
    pub fn is_pos_edge(&self) -> bool {
        self.pos_edge
    }

    #[must_use]
    pub fn has_waiting(&self) -> bool {
        !self.waiting.is_empty()
    }

    #[must_use]
    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    #[must_use]
    pub fn period_ns(&self) -> u64 {
        self.period_ns
    }

    #[must_use]
    pub fn now_ns(&self) -> u64 {
        self.cycle * self.period_ns
    }

    /// Stops the clock and returns the elapsed simulated time in ns.
    #[must_use]
    pub fn teardown(self) -> u64 {
        if !self.waiting.is_empty() {
            log::debug!(
                "clock: teardown with {} parties still waiting",
                self.waiting.len()
            );
        }
        self.now_ns()
    }
}
