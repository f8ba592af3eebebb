use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scalar {
    pub total: u64,
    pub rr: u64,
    pub ri: u64,
    pub load: u64,
    pub store: u64,
    pub lui: u64,
    pub general_li: u64,
    pub special_li: u64,
    /// Moves between general and special registers.
    pub special_general_assign: u64,
}

impl std::ops::AddAssign for Scalar {
    fn add_assign(&mut self, other: Self) {
        self.total += other.total;
        self.rr += other.rr;
        self.ri += other.ri;
        self.load += other.load;
        self.store += other.store;
        self.lui += other.lui;
        self.general_li += other.general_li;
        self.special_li += other.special_li;
        self.special_general_assign += other.special_general_assign;
    }
}

/// Counts keyed by functor name.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Functors {
    pub total: u64,
    pub functors: BTreeMap<String, u64>,
}

impl Functors {
    pub fn add(&mut self, functor: &str) {
        self.total += 1;
        *self.functors.entry(functor.to_string()).or_default() += 1;
    }

    #[must_use]
    pub fn get(&self, functor: &str) -> u64 {
        self.functors.get(functor).copied().unwrap_or(0)
    }
}

impl std::ops::AddAssign for Functors {
    fn add_assign(&mut self, other: Self) {
        self.total += other.total;
        for (functor, count) in other.functors {
            *self.functors.entry(functor).or_default() += count;
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transfer {
    pub total: u64,
    pub local: u64,
    pub global_load: u64,
    pub global_store: u64,
}

impl std::ops::AddAssign for Transfer {
    fn add_assign(&mut self, other: Self) {
        self.total += other.total;
        self.local += other.local;
        self.global_load += other.global_load;
        self.global_store += other.global_store;
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cim {
    pub total: u64,
    pub compute: u64,
    pub set: u64,
    pub output: u64,
}

impl std::ops::AddAssign for Cim {
    fn add_assign(&mut self, other: Self) {
        self.total += other.total;
        self.compute += other.compute;
        self.set += other.set;
        self.output += other.output;
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Control {
    pub total: u64,
    pub branch: u64,
    pub jump: u64,
}

impl std::ops::AddAssign for Control {
    fn add_assign(&mut self, other: Self) {
        self.total += other.total;
        self.branch += other.branch;
        self.jump += other.jump;
    }
}

/// Decoded instructions by kind.
///
/// Every decoded instruction is counted once in `total` and in the group of
/// its kind, including instructions that are later dropped.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instructions {
    pub total: u64,
    pub scalar: Scalar,
    pub simd: Functors,
    pub reduce: Functors,
    pub transfer: Transfer,
    pub cim: Cim,
    pub control: Control,
}

impl std::ops::AddAssign for Instructions {
    fn add_assign(&mut self, other: Self) {
        self.total += other.total;
        self.scalar += other.scalar;
        self.simd += other.simd;
        self.reduce += other.reduce;
        self.transfer += other.transfer;
        self.cim += other.cim;
        self.control += other.control;
    }
}
