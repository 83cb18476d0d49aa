//! Seams to the systems the map renderer drives but does not implement.
//!
//! The renderer only decides which chunk meshes exist, when they are rebuilt and
//! in what order they are submitted. Turning block data into geometry, deciding
//! what the camera can see, talking to the GPU and simulating weather all live
//! behind these traits.

use cgmath::Point3;
use web_time::Duration;

use crate::error::BuildError;

/// The two draw passes of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DrawPass {
    /// Opaque and alpha-tested geometry, drawn front-to-back
    Normal,
    /// Blended geometry such as water, drawn back-to-front
    Translucent,
}

/// The geometry one chunk contributes to one atlas batch.
///
/// Parts are owned exclusively by their chunk. Dropping a part must release
/// whatever resources (GPU buffers, pool slots) it holds.
pub trait MeshPart {
    /// Whether the part holds any geometry for `pass`.
    fn has_geometry(&self, pass: DrawPass) -> bool;
}

/// Builds the mesh parts of a single chunk from the world's block data.
pub trait MeshBuilder {
    /// The part type produced by this builder
    type Part: MeshPart;

    /// Builds every atlas batch part of the chunk at `coords`.
    ///
    /// # Arguments
    /// * `coords` - Chunk coordinates to build
    /// * `used_atlas_count` - Number of atlas batches in use
    ///
    /// # Returns
    /// Exactly `used_atlas_count` slots, `None` where the chunk has no geometry for
    /// that batch, or a [`BuildError`] if the chunk could not be built this time
    fn build(
        &mut self,
        coords: Point3<i32>,
        used_atlas_count: usize,
    ) -> Result<Vec<Option<Self::Part>>, BuildError>;
}

/// Camera position and frustum/occlusion test, sampled once per update.
pub trait ChunkVisibility {
    /// Camera position in world space.
    fn camera_position(&self) -> Point3<f32>;

    /// Whether the chunk spanning `min..max` in world space may be seen.
    fn is_chunk_visible(&self, min: Point3<f32>, max: Point3<f32>) -> bool;
}

/// The low-level draw API the batch renderer submits to.
pub trait DrawTarget<P> {
    /// Binds the texture resource of atlas batch `batch`.
    fn bind_atlas(&mut self, batch: usize);

    /// Draws the `pass` geometry of `part` with the currently bound atlas.
    fn submit(&mut self, part: &P, pass: DrawPass);
}

/// Weather simulation and precipitation overlay.
pub trait WeatherEffects {
    /// Advances the weather simulation; called at the end of every update step.
    fn advance(&mut self, delta: Duration);

    /// Draws precipitation; called after the normal pass, sharing its depth buffer.
    fn render(&mut self, delta: Duration);
}

/// Weather that never does anything, for worlds without precipitation.
#[derive(Debug, Default, Clone, Copy)]
pub struct ClearSkies;

impl WeatherEffects for ClearSkies {
    fn advance(&mut self, _delta: Duration) {}

    fn render(&mut self, _delta: Duration) {}
}
