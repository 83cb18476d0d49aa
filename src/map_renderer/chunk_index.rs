//! Maps 3D chunk coordinates to slots in the flat chunk array and back.
//!
//! The grid is laid out x-fastest, then y, then z:
//! `index = (cz * chunks_y + cy) * chunks_x + cx`.

use cgmath::{Point3, Vector3};

use crate::error::{ChunkLookupError, InitError};

/// Dimensions of the world, in chunks, and the chunk edge length in blocks.
///
/// Immutable once created; every chunk array in the renderer is sized from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorldGrid {
    chunks_x: usize,
    chunks_y: usize,
    chunks_z: usize,
    chunk_size: u32,
}

impl WorldGrid {
    /// Creates a grid of `chunks_x * chunks_y * chunks_z` chunks.
    ///
    /// # Arguments
    /// * `dims` - Number of chunks along the x, y and z axes
    /// * `chunk_size` - Edge length of a chunk in blocks
    ///
    /// # Returns
    /// The grid, or an [`InitError`] if it would hold no chunks or cannot be
    /// addressed with `i32` coordinates and `usize` indices
    pub fn new(dims: [usize; 3], chunk_size: u32) -> Result<Self, InitError> {
        if chunk_size == 0 {
            return Err(InitError::ZeroChunkSize);
        }
        if dims.iter().any(|&d| d == 0) {
            return Err(InitError::EmptyGrid { dims });
        }

        let fits_coordinates = dims
            .iter()
            .all(|&d| {
                (d as u64)
                    .checked_mul(chunk_size as u64)
                    .is_some_and(|extent| extent <= i32::MAX as u64)
            });
        let total = dims[0]
            .checked_mul(dims[1])
            .and_then(|xy| xy.checked_mul(dims[2]));

        match total {
            Some(_) if fits_coordinates => Ok(Self {
                chunks_x: dims[0],
                chunks_y: dims[1],
                chunks_z: dims[2],
                chunk_size,
            }),
            _ => Err(InitError::GridTooLarge { dims }),
        }
    }

    /// Grid dimensions in chunks as `[x, y, z]`.
    pub fn dims(&self) -> [usize; 3] {
        [self.chunks_x, self.chunks_y, self.chunks_z]
    }

    /// Edge length of a chunk in blocks.
    pub fn chunk_size(&self) -> u32 {
        self.chunk_size
    }

    /// Number of chunks in the world.
    pub fn total_chunks(&self) -> usize {
        self.chunks_x * self.chunks_y * self.chunks_z
    }

    /// Whether `coords` addresses a chunk of this grid.
    pub fn contains(&self, coords: Point3<i32>) -> bool {
        coords.x >= 0
            && coords.y >= 0
            && coords.z >= 0
            && (coords.x as usize) < self.chunks_x
            && (coords.y as usize) < self.chunks_y
            && (coords.z as usize) < self.chunks_z
    }

    /// Packs chunk coordinates into a flat array index.
    ///
    /// Coordinates must lie inside the grid; this is only checked in debug builds.
    /// Use [`WorldGrid::try_pack`] for untrusted input.
    #[inline]
    pub fn pack(&self, coords: Point3<i32>) -> usize {
        debug_assert!(
            self.contains(coords),
            "chunk {:?} outside grid {:?}",
            coords,
            self.dims()
        );
        (coords.z as usize * self.chunks_y + coords.y as usize) * self.chunks_x + coords.x as usize
    }

    /// Packs chunk coordinates, returning `None` when they fall outside the grid.
    pub fn try_pack(&self, coords: Point3<i32>) -> Option<usize> {
        self.contains(coords).then(|| self.pack(coords))
    }

    /// Like [`WorldGrid::try_pack`], but reports the miss as a [`ChunkLookupError`].
    pub fn lookup(&self, coords: Point3<i32>) -> Result<usize, ChunkLookupError> {
        self.try_pack(coords).ok_or(ChunkLookupError::OutOfRange {
            coords,
            dims: self.dims(),
        })
    }

    /// Inverse of [`WorldGrid::pack`].
    pub fn unpack(&self, index: usize) -> Point3<i32> {
        debug_assert!(index < self.total_chunks());
        let x = index % self.chunks_x;
        let y = (index / self.chunks_x) % self.chunks_y;
        let z = index / (self.chunks_x * self.chunks_y);
        Point3::new(x as i32, y as i32, z as i32)
    }

    /// World-space minimum corner of the chunk at `coords`.
    pub fn chunk_origin(&self, coords: Point3<i32>) -> Point3<f32> {
        let size = self.chunk_size as f32;
        Point3::new(
            coords.x as f32 * size,
            coords.y as f32 * size,
            coords.z as f32 * size,
        )
    }

    /// Converts block coordinates into the coordinates of the chunk holding them
    /// and the block's offset inside that chunk.
    pub fn block_to_chunk(&self, block: Point3<i32>) -> (Point3<i32>, Vector3<i32>) {
        let size = self.chunk_size as i32;
        (
            Point3::new(
                block.x.div_euclid(size),
                block.y.div_euclid(size),
                block.z.div_euclid(size),
            ),
            Vector3::new(
                block.x.rem_euclid(size),
                block.y.rem_euclid(size),
                block.z.rem_euclid(size),
            ),
        )
    }
}
