// Durable storage contract for the draft state blob.

use std::sync::Mutex;

use anyhow::{anyhow, Result};

use crate::draft::state::DraftState;

/// Somewhere the draft state can be stored and read back.
///
/// Called by whoever drives the engine, after a mutation has committed in
/// memory. The engine itself never touches a sink.
pub trait PersistenceSink: Send + Sync {
    fn save(&self, state: &DraftState) -> Result<()>;

    /// The last saved state, or `None` if nothing was ever saved.
    fn load(&self) -> Result<Option<DraftState>>;
}

/// Sink that keeps the last saved state in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    slot: Mutex<Option<DraftState>>,
    saves: Mutex<usize>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful `save` calls so far.
    pub fn save_count(&self) -> usize {
        self.saves.lock().map(|n| *n).unwrap_or(0)
    }
}

impl PersistenceSink for MemorySink {
    fn save(&self, state: &DraftState) -> Result<()> {
        let mut slot = self.slot.lock().map_err(|_| anyhow!("memory sink poisoned"))?;
        *slot = Some(state.clone());
        let mut saves = self.saves.lock().map_err(|_| anyhow!("memory sink poisoned"))?;
        *saves += 1;
        Ok(())
    }

    fn load(&self) -> Result<Option<DraftState>> {
        let slot = self.slot.lock().map_err(|_| anyhow!("memory sink poisoned"))?;
        Ok(slot.clone())
    }
}
