//! Pool configuration

use serde::{Deserialize, Serialize};

use crate::error::{Result, TesseraError};

/// Sizing for one paired pool (payload slots + control-block slots).
///
/// Capacities are hard caps; slots are allocated lazily in blocks of
/// `*_block_size`, `*_growth_chunk_size` blocks at a time. Growth chunk sizes
/// of zero are rejected at configure time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Maximum number of control-block slots
    pub control_block_capacity: usize,
    /// Control-block slots per storage block
    pub control_block_block_size: usize,
    /// Blocks added per control-block growth step
    pub control_block_growth_chunk_size: usize,
    /// Maximum number of payload slots
    pub payload_capacity: usize,
    /// Payload slots per storage block
    pub payload_block_size: usize,
    /// Blocks added per payload growth step
    pub payload_growth_chunk_size: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            control_block_capacity: 64,
            control_block_block_size: 16,
            control_block_growth_chunk_size: 1,
            payload_capacity: 64,
            payload_block_size: 16,
            payload_growth_chunk_size: 1,
        }
    }
}

impl PoolConfig {
    /// Set both capacities
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.control_block_capacity = capacity;
        self.payload_capacity = capacity;
        self
    }

    /// Set the payload capacity
    pub fn with_payload_capacity(mut self, capacity: usize) -> Self {
        self.payload_capacity = capacity;
        self
    }

    /// Set the control-block capacity
    pub fn with_control_block_capacity(mut self, capacity: usize) -> Self {
        self.control_block_capacity = capacity;
        self
    }

    /// Set both storage block sizes
    pub fn with_block_size(mut self, block_size: usize) -> Self {
        self.control_block_block_size = block_size;
        self.payload_block_size = block_size;
        self
    }

    /// Set both growth chunk sizes
    pub fn with_growth_chunk_size(mut self, chunk: usize) -> Self {
        self.control_block_growth_chunk_size = chunk;
        self.payload_growth_chunk_size = chunk;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.control_block_growth_chunk_size == 0 {
            return Err(TesseraError::invalid_argument(
                "control_block_growth_chunk_size",
                "growth chunk size must be > 0",
            ));
        }
        if self.payload_growth_chunk_size == 0 {
            return Err(TesseraError::invalid_argument(
                "payload_growth_chunk_size",
                "growth chunk size must be > 0",
            ));
        }
        if self.control_block_block_size == 0 {
            return Err(TesseraError::invalid_argument(
                "control_block_block_size",
                "block size must be > 0",
            ));
        }
        if self.payload_block_size == 0 {
            return Err(TesseraError::invalid_argument(
                "payload_block_size",
                "block size must be > 0",
            ));
        }
        Ok(())
    }
}
