//! Per-chunk render state.
//!
//! One [`ChunkRenderState`] exists for every cell of the world grid for the whole
//! lifetime of the world. It owns the chunk's mesh parts, one slot per atlas
//! batch, and the flags the scheduler uses to decide whether the chunk is rebuilt
//! and drawn.
//!
//! # Lifecycle
//! `Dirty -> (build) -> Clean, empty or not -> (refresh) -> Dirty -> ...`
//!
//! A failed build leaves the chunk dirty with its previous parts untouched.

use cgmath::{MetricSpace, Point3, Vector3};

use super::collaborators::{DrawPass, MeshPart};

/// Render bookkeeping for one chunk of the world grid.
#[derive(Debug)]
pub struct ChunkRenderState<P> {
    /// Chunk coordinates in the world grid
    pub coords: Point3<i32>,
    /// World-space minimum corner of the chunk
    pub position: Point3<f32>,
    /// World-space centre, used for distance ordering
    centre: Point3<f32>,
    /// Squared distance from the camera to the chunk centre; ordering only
    pub distance_to_camera: f32,
    mesh_parts: Vec<Option<P>>,
    is_empty: bool,
    is_dirty: bool,
    is_visible: bool,
    /// Whether the chunk was part of the renderable subset last update
    pub(crate) in_render_set: bool,
}

impl<P: MeshPart> ChunkRenderState<P> {
    /// Creates the state of a chunk that has never been built.
    ///
    /// The chunk starts dirty, with no parts, and invisible until the first update.
    pub fn new(coords: Point3<i32>, position: Point3<f32>, chunk_size: u32) -> Self {
        let half = chunk_size as f32 / 2.0;
        Self {
            coords,
            position,
            centre: position + Vector3::new(half, half, half),
            distance_to_camera: 0.0,
            mesh_parts: Vec::new(),
            is_empty: true,
            is_dirty: true,
            is_visible: false,
            in_render_set: false,
        }
    }

    /// True when no atlas batch slot holds geometry.
    pub fn is_empty(&self) -> bool {
        self.is_empty
    }

    /// True when the block data changed since the last successful build.
    pub fn is_dirty(&self) -> bool {
        self.is_dirty
    }

    /// True when the camera admitted this chunk during the last update.
    pub fn is_visible(&self) -> bool {
        self.is_visible
    }

    /// Non-empty and visible: eligible for the renderable subset.
    pub fn is_renderable(&self) -> bool {
        !self.is_empty && self.is_visible
    }

    /// The part this chunk contributes to atlas batch `batch`, if any.
    pub fn mesh_part(&self, batch: usize) -> Option<&P> {
        self.mesh_parts.get(batch).and_then(Option::as_ref)
    }

    /// The part for `batch` if it has geometry for `pass`.
    pub fn part_for_pass(&self, batch: usize, pass: DrawPass) -> Option<&P> {
        self.mesh_part(batch).filter(|part| part.has_geometry(pass))
    }

    /// Iterates the atlas batches this chunk currently contributes to.
    pub fn occupied_batches(&self) -> impl Iterator<Item = (usize, &P)> + '_ {
        self.mesh_parts
            .iter()
            .enumerate()
            .filter_map(|(batch, part)| part.as_ref().map(|part| (batch, part)))
    }

    pub(crate) fn set_visible(&mut self, visible: bool) {
        self.is_visible = visible;
    }

    pub(crate) fn update_distance(&mut self, camera: Point3<f32>) {
        self.distance_to_camera = self.centre.distance2(camera);
    }

    /// Centre of the chunk in world space.
    pub fn centre(&self) -> Point3<f32> {
        self.centre
    }

    /// World-space maximum corner, given the chunk edge length.
    pub fn max_corner(&self, chunk_size: u32) -> Point3<f32> {
        let size = chunk_size as f32;
        self.position + Vector3::new(size, size, size)
    }

    /// Takes every part out of the chunk and marks it dirty and empty.
    ///
    /// The caller is responsible for updating the batch counts from the returned
    /// parts before dropping them.
    pub(crate) fn take_parts(&mut self) -> Vec<(usize, P)> {
        let parts = std::mem::take(&mut self.mesh_parts)
            .into_iter()
            .enumerate()
            .filter_map(|(batch, part)| part.map(|part| (batch, part)))
            .collect();
        self.is_empty = true;
        self.is_dirty = true;
        parts
    }

    /// Installs a freshly built set of parts and clears the dirty flag.
    ///
    /// Parts without geometry for either pass are discarded so that an occupied
    /// slot always means real geometry. Returns the previous parts so the caller
    /// can retire them from the batch counts.
    pub(crate) fn install_parts(&mut self, parts: Vec<Option<P>>) -> Vec<(usize, P)> {
        let previous = self.take_parts();

        self.mesh_parts = parts
            .into_iter()
            .map(|part| {
                part.filter(|p| {
                    p.has_geometry(DrawPass::Normal) || p.has_geometry(DrawPass::Translucent)
                })
            })
            .collect();
        self.is_empty = self.mesh_parts.iter().all(Option::is_none);
        self.is_dirty = false;

        previous
    }
}
