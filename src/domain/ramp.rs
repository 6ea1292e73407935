//! Memory ramp state machine.
//!
//! Allocates fixed-size chunks and retains every one of them for its own
//! lifetime: retention, not leakage, is the intended behavior, since the
//! goal is sustained memory pressure. Once a configured cap is reached the
//! machine fails deterministically and refuses further allocation.

use std::time::{Duration, Instant};

use crate::domain::errors::{ConfigError, RampError};

/// Ramp controller phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RampPhase {
    /// Allocating chunks
    Ramping,
    /// Cap reached; no further allocation occurs
    Failed,
    /// Shutdown path ran; no further allocation or emission occurs
    Terminated,
}

/// Receipt for one completed allocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkReceipt {
    /// 1-based index of the chunk just allocated
    pub chunk_index: u64,
    /// Total bytes retained after this allocation
    pub allocated_bytes: u64,
}

/// State machine that ramps resident memory in fixed chunks.
///
/// The allocation list is exclusively owned here; no other component reads
/// or writes it. `allocated_bytes` is always `chunks_allocated * chunk_bytes`
/// and is monotonically non-decreasing.
pub struct MemoryRamp {
    chunk_bytes: u64,
    cap_bytes: Option<u64>,
    phase: RampPhase,
    allocations: Vec<Vec<u8>>,
    started_at: Instant,
}

impl MemoryRamp {
    /// Creates a ramp. A zero chunk size is a configuration error, rejected
    /// here before any allocation or telemetry. An unset cap means the ramp
    /// never self-terminates and must be externally interrupted.
    pub fn new(chunk_bytes: u64, cap_bytes: Option<u64>) -> Result<Self, ConfigError> {
        if chunk_bytes == 0 {
            return Err(ConfigError::ZeroChunkSize);
        }

        Ok(Self {
            chunk_bytes,
            cap_bytes,
            phase: RampPhase::Ramping,
            allocations: Vec::new(),
            started_at: Instant::now(),
        })
    }

    /// Allocates and retains one chunk, returning its receipt.
    ///
    /// Returns `None` once the machine has left `Ramping`: after a cap
    /// failure or termination no allocation ever happens again.
    pub fn allocate_chunk(&mut self) -> Option<ChunkReceipt> {
        if self.phase != RampPhase::Ramping {
            return None;
        }

        // A nonzero fill touches every page so the RSS actually grows;
        // zeroed pages may stay uncommitted.
        self.allocations.push(vec![0xA5u8; self.chunk_bytes as usize]);

        Some(ChunkReceipt {
            chunk_index: self.chunks_allocated(),
            allocated_bytes: self.allocated_bytes(),
        })
    }

    /// Evaluates the cap. Called once per iteration, after the allocation
    /// and before the sleep, so the cap is enforced with at most one chunk
    /// of overshoot. Reaching the cap exactly (>=, not >) still fails.
    pub fn enforce_cap(&mut self) -> Result<(), RampError> {
        let Some(cap_bytes) = self.cap_bytes else {
            return Ok(());
        };

        if self.allocated_bytes() >= cap_bytes {
            self.phase = RampPhase::Failed;
            return Err(RampError::CapReached {
                cap_bytes,
                allocated_bytes: self.allocated_bytes(),
                chunks: self.chunks_allocated(),
            });
        }

        Ok(())
    }

    /// Entered only via the shutdown path.
    pub fn terminate(&mut self) {
        self.phase = RampPhase::Terminated;
    }

    pub fn phase(&self) -> RampPhase {
        self.phase
    }

    pub fn chunks_allocated(&self) -> u64 {
        self.allocations.len() as u64
    }

    pub fn allocated_bytes(&self) -> u64 {
        self.chunks_allocated() * self.chunk_bytes
    }

    pub fn chunk_bytes(&self) -> u64 {
        self.chunk_bytes
    }

    pub fn cap_bytes(&self) -> Option<u64> {
        self.cap_bytes
    }

    /// Time since the ramp was constructed
    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }
}
