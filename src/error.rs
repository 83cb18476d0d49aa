//! Error types for the map renderer.
//!
//! Errors fall into three groups with very different handling:
//! * [`ChunkLookupError`] - a caller asked for a chunk outside the grid.
//! * [`BuildError`] - the mesh builder could not produce a chunk mesh. These are
//!   recovered inside the scheduler by leaving the chunk dirty.
//! * [`InitError`] - capacity or shape problems detected while (re)initialising
//!   the render context. These are fatal to the caller.

use cgmath::Point3;
use thiserror::Error;

/// A chunk or block coordinate fell outside the world grid.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChunkLookupError {
    /// The coordinates do not address any chunk of the grid.
    #[error("chunk {coords:?} lies outside the {dims:?} chunk grid")]
    OutOfRange {
        /// The rejected chunk coordinates
        coords: Point3<i32>,
        /// Grid dimensions in chunks (x, y, z)
        dims: [usize; 3],
    },
    /// The block coordinates do not lie inside the world.
    #[error("block {coords:?} lies outside the world")]
    BlockOutOfRange {
        /// The rejected block coordinates
        coords: Point3<i32>,
    },
}

/// Reasons a chunk mesh could not be (re)built.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BuildError {
    /// The mesh builder reported a failure, e.g. resource exhaustion.
    #[error("mesh build failed for chunk {coords:?}: {reason}")]
    Failed {
        /// Chunk that failed to build
        coords: Point3<i32>,
        /// Human readable cause reported by the builder
        reason: String,
    },
    /// The mesh builder returned a part list that does not match the atlas batches.
    #[error("mesh builder returned {returned} parts for chunk {coords:?}, expected {expected}")]
    PartCountMismatch {
        /// Chunk whose result was rejected
        coords: Point3<i32>,
        /// Number of atlas batches in use
        expected: usize,
        /// Number of slots the builder returned
        returned: usize,
    },
}

/// Fatal conditions found while setting up the render context.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InitError {
    /// More atlas batches were requested than the aggregator can track.
    #[error("{requested} atlas batches requested, at most {max} are supported")]
    TooManyAtlases {
        /// Requested number of atlas batches
        requested: usize,
        /// Fixed capacity
        max: usize,
    },
    /// At least one grid dimension is zero.
    #[error("chunk grid {dims:?} has no chunks")]
    EmptyGrid {
        /// Requested grid dimensions
        dims: [usize; 3],
    },
    /// The grid cannot be addressed with the coordinate and index types.
    #[error("chunk grid {dims:?} is too large to index")]
    GridTooLarge {
        /// Requested grid dimensions
        dims: [usize; 3],
    },
    /// Chunks must be at least one block wide.
    #[error("chunk size must be non-zero")]
    ZeroChunkSize,
    /// The renderer configuration failed validation.
    #[error("invalid renderer configuration: {0}")]
    InvalidConfig(String),
}

/// Failures while loading a [`crate::config::RendererConfig`].
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The config file could not be read
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// The config file is not valid JSON for [`crate::config::RendererConfig`]
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
    /// A value is outside the range the scheduler accepts
    #[error("invalid configuration: {0}")]
    Invalid(String),
}
