use crate::instruction::Instruction;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Open(#[from] utils::fs::Error),
    #[error("failed to parse program")]
    Parse(#[from] serde_json::Error),
}

/// Instructions of every core, indexed by core id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Program {
    pub cores: Vec<Vec<Instruction>>,
}

impl Program {
    #[must_use]
    pub fn new(cores: Vec<Vec<Instruction>>) -> Self {
        Self { cores }
    }

    pub fn from_reader(reader: impl std::io::Read) -> Result<Self, Error> {
        Ok(serde_json::from_reader(reader)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        let reader = utils::fs::open_readable(path)?;
        Self::from_reader(reader)
    }

    #[must_use]
    pub fn num_instructions(&self) -> usize {
        self.cores.iter().map(Vec::len).sum()
    }
}
