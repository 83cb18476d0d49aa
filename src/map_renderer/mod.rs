//! Chunk render-state management and frame scheduling for the voxel map.
//!
//! The world is split into a fixed grid of chunks. Each chunk owns one mesh part
//! per texture-atlas batch; this module decides when those parts are rebuilt,
//! which chunks are drawn, and in what order and batches they are submitted.
//!
//! # Architecture
//! - [`WorldGrid`]: chunk coordinate <-> array slot arithmetic
//! - [`ChunkRenderState`]: per-chunk parts and dirty/empty/visible flags
//! - [`AtlasBatches`]: per-batch occupancy used to skip empty batches
//! - `scheduler`: the per-frame update step ([`MapRenderer::update`])
//! - `batch_renderer`: the normal and translucent draw passes
//! - [`collaborators`]: traits for the mesh builder, camera, draw API and weather
//!
//! # Frame Flow
//! ```text
//! refresh()/refresh_block()  (world edits, any time)
//! update(delta, camera)      distances -> sort -> rebuild -> render subset -> batch checks -> weather
//! render_normal(delta, ..)   opaque batches, front-to-back, then precipitation
//! render_translucent(..)     translucent batches, back-to-front
//! ```
//!
//! Everything runs on one thread; the context is only ever borrowed mutably by
//! one of the steps above at a time.

use cgmath::Point3;

mod atlas_batches;
mod batch_renderer;
mod chunk_index;
mod chunk_info;
pub mod collaborators;
mod scheduler;

#[cfg(test)]
pub(crate) mod test_support;

pub use atlas_batches::{AtlasBatches, MAX_ATLASES_COUNT};
pub use batch_renderer::DrawStats;
pub use chunk_index::WorldGrid;
pub use chunk_info::ChunkRenderState;
pub use collaborators::{
    ChunkVisibility, ClearSkies, DrawPass, DrawTarget, MeshBuilder, MeshPart, WeatherEffects,
};
pub use scheduler::FrameStats;

use crate::{
    config::RendererConfig,
    error::{ChunkLookupError, InitError},
};

/// The world render context: every chunk's render state plus the views and
/// counters the scheduler and draw passes share.
///
/// Created once per world with [`MapRenderer::new`]; [`MapRenderer::clear`] (or
/// dropping the context) releases every mesh part.
pub struct MapRenderer<B: MeshBuilder, W: WeatherEffects = ClearSkies> {
    config: RendererConfig,
    grid: WorldGrid,
    /// Render info for every chunk, unsorted, indexed by [`WorldGrid::pack`]
    chunks: Vec<ChunkRenderState<B::Part>>,
    batches: AtlasBatches,
    /// Every chunk index, nearest first
    sorted_chunks: Vec<usize>,
    /// Renderable chunk indices, nearest first
    render_chunks: Vec<usize>,
    /// Adaptive number of rebuilds allowed per frame
    rebuild_target: u32,
    mesh_builder: B,
    weather: W,
}

impl<B: MeshBuilder, W: WeatherEffects> MapRenderer<B, W> {
    /// Creates the render context for a world of `dims` chunks.
    ///
    /// # Arguments
    /// * `dims` - Number of chunks along x, y and z
    /// * `used_atlas_count` - Number of texture-atlas batches in use
    /// * `config` - Scheduler settings; `chunk_size` fixes the chunk edge length
    /// * `mesh_builder` - Builds chunk meshes on demand
    /// * `weather` - Weather simulation stepped every frame
    ///
    /// # Returns
    /// The context with every chunk dirty and awaiting its first build, or an
    /// [`InitError`] if the configuration is invalid or the grid or the atlas
    /// count cannot be represented
    pub fn new(
        dims: [usize; 3],
        used_atlas_count: usize,
        config: RendererConfig,
        mesh_builder: B,
        weather: W,
    ) -> Result<Self, InitError> {
        config
            .validate()
            .map_err(|err| InitError::InvalidConfig(err.to_string()))?;
        let grid = WorldGrid::new(dims, config.chunk_size)?;
        let batches = AtlasBatches::new(used_atlas_count)?;

        let chunks = (0..grid.total_chunks())
            .map(|index| {
                let coords = grid.unpack(index);
                ChunkRenderState::new(coords, grid.chunk_origin(coords), grid.chunk_size())
            })
            .collect::<Vec<_>>();

        log::info!(
            "Map renderer initialized: {:?} chunks ({} total), {} atlas batches",
            dims,
            chunks.len(),
            used_atlas_count
        );

        Ok(Self {
            rebuild_target: config.max_rebuilds_per_frame,
            sorted_chunks: (0..chunks.len()).collect(),
            render_chunks: Vec::with_capacity(chunks.len()),
            config,
            grid,
            chunks,
            batches,
            mesh_builder,
            weather,
        })
    }

    /// The world grid this context was created for.
    pub fn grid(&self) -> &WorldGrid {
        &self.grid
    }

    /// Active scheduler settings.
    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    /// Number of texture-atlas batches in use.
    pub fn used_atlas_count(&self) -> usize {
        self.batches.used_count()
    }

    /// Per-batch occupancy counters and pass flags.
    pub fn batches(&self) -> &AtlasBatches {
        &self.batches
    }

    /// Render state of every chunk, indexed by [`WorldGrid::pack`].
    pub fn chunks(&self) -> &[ChunkRenderState<B::Part>] {
        &self.chunks
    }

    /// Looks up the render state of the chunk at `coords`.
    ///
    /// # Returns
    /// [`ChunkLookupError::OutOfRange`] if `coords` lies outside the grid
    pub fn get_chunk(
        &self,
        coords: Point3<i32>,
    ) -> Result<&ChunkRenderState<B::Part>, ChunkLookupError> {
        let index = self.grid.lookup(coords)?;
        Ok(&self.chunks[index])
    }

    /// Every chunk index, ordered nearest first as of the last update.
    pub fn sorted_chunks(&self) -> &[usize] {
        &self.sorted_chunks
    }

    /// Indices of the chunks drawn this frame, nearest first.
    pub fn render_chunks(&self) -> &[usize] {
        &self.render_chunks
    }

    /// Number of chunks drawn this frame.
    pub fn render_chunks_count(&self) -> usize {
        self.render_chunks.len()
    }

    /// Chunk coordinates of [`MapRenderer::sorted_chunks`].
    pub fn sorted_chunk_coords(&self) -> Vec<Point3<i32>> {
        self.sorted_chunks
            .iter()
            .map(|&index| self.chunks[index].coords)
            .collect()
    }

    /// Current adaptive per-frame rebuild target.
    pub fn rebuild_target(&self) -> u32 {
        self.rebuild_target
    }

    /// The mesh builder driven by the scheduler.
    pub fn mesh_builder(&self) -> &B {
        &self.mesh_builder
    }

    /// Mutable access to the mesh builder, e.g. to point it at new block data.
    pub fn mesh_builder_mut(&mut self) -> &mut B {
        &mut self.mesh_builder
    }

    /// The weather effects stepped by the scheduler.
    pub fn weather(&self) -> &W {
        &self.weather
    }

    /// Mutable access to the weather effects.
    pub fn weather_mut(&mut self) -> &mut W {
        &mut self.weather
    }

    /// Marks the chunk at `coords` as needing a rebuild.
    ///
    /// Its current mesh parts are released right away and the batches they
    /// occupied are scheduled for a recheck.
    pub fn refresh(&mut self, coords: Point3<i32>) -> Result<(), ChunkLookupError> {
        let index = self.grid.lookup(coords)?;
        self.release_chunk(index);
        Ok(())
    }

    /// Marks the chunk holding the block at `block` as needing a rebuild.
    ///
    /// Blocks on a chunk face also refresh the neighbouring chunk sharing that
    /// face, since its exposed faces depend on this block. Neighbours outside the
    /// grid are ignored.
    pub fn refresh_block(&mut self, block: Point3<i32>) -> Result<(), ChunkLookupError> {
        let (chunk, offset) = self.grid.block_to_chunk(block);
        let index = self
            .grid
            .try_pack(chunk)
            .ok_or(ChunkLookupError::BlockOutOfRange { coords: block })?;
        self.release_chunk(index);

        let last = self.grid.chunk_size() as i32 - 1;
        for axis in 0..3 {
            for step in [-1, 1] {
                let on_face = if step < 0 {
                    offset[axis] == 0
                } else {
                    offset[axis] == last
                };
                if !on_face {
                    continue;
                }

                let mut neighbour = chunk;
                neighbour[axis] += step;
                if let Some(neighbour_index) = self.grid.try_pack(neighbour) {
                    self.release_chunk(neighbour_index);
                }
            }
        }

        Ok(())
    }

    /// Marks every chunk as needing a rebuild, releasing all mesh parts.
    pub fn refresh_all(&mut self) {
        let released = self.release_all_parts();
        log::info!(
            "Refreshing all {} chunks ({} mesh parts released)",
            self.chunks.len(),
            released
        );
    }

    /// Switches to a new number of texture-atlas batches.
    ///
    /// Parts are indexed by batch id, so every chunk is released and rebuilt.
    ///
    /// # Returns
    /// [`InitError::TooManyAtlases`] if `used_atlas_count` exceeds
    /// [`MAX_ATLASES_COUNT`]; the context is left unchanged in that case
    pub fn set_used_atlas_count(&mut self, used_atlas_count: usize) -> Result<(), InitError> {
        let batches = AtlasBatches::new(used_atlas_count)?;
        let released = self.release_all_parts();
        self.batches = batches;
        log::info!(
            "Atlas batch count changed to {} ({} mesh parts released)",
            used_atlas_count,
            released
        );
        Ok(())
    }

    /// Releases every mesh part held by the world.
    ///
    /// Chunks are left dirty, so the context can be reused after the world
    /// reloads.
    pub fn clear(&mut self) {
        let released = self.release_all_parts();
        log::info!("Map renderer cleared, {} mesh parts released", released);
    }

    fn release_chunk(&mut self, index: usize) -> usize {
        let parts = self.chunks[index].take_parts();
        retire_parts(&mut self.batches, parts)
    }

    fn release_all_parts(&mut self) -> usize {
        let mut released = 0;
        for chunk in self.chunks.iter_mut() {
            released += chunk.take_parts().len();
            chunk.in_render_set = false;
        }
        self.batches.reset();
        self.render_chunks.clear();
        released
    }
}

/// Uncounts and drops retired parts, returning how many were released.
fn retire_parts<P: MeshPart>(batches: &mut AtlasBatches, parts: Vec<(usize, P)>) -> usize {
    let released = parts.len();
    for (batch, part) in parts {
        batches.remove_part(batch, &part);
    }
    released
}
