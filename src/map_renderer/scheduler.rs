//! The per-frame update step.
//!
//! # Frame Steps
//! 1. Refresh every chunk's camera distance and visibility, releasing chunks that
//!    fell out of view distance
//! 2. Sort all chunks nearest first
//! 3. Rebuild dirty visible chunks in that order, bounded by the adaptive rebuild
//!    target and a share of the frame time
//! 4. Recompute the renderable subset, flagging batches whose contributors changed
//! 5. Recheck the flagged batches
//! 6. Advance the weather simulation
//!
//! # Performance Considerations
//! - Mesh building is by far the most expensive step, so the number of rebuilds
//!   per frame adapts to the measured frame time
//! - Batch flags are only rescanned for batches that actually changed

use web_time::{Duration, Instant};

use super::{
    chunk_info::ChunkRenderState, collaborators::ChunkVisibility, retire_parts, DrawPass,
    MapRenderer, MeshBuilder, MeshPart, WeatherEffects,
};
use crate::error::BuildError;

/// Summary of one [`MapRenderer::update`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FrameStats {
    /// Chunks rebuilt successfully this frame
    pub built: u32,
    /// Chunks whose build failed this frame; they stay dirty
    pub failed: u32,
    /// Visible chunks still waiting for a rebuild
    pub pending_dirty: u32,
    /// Chunks in the renderable subset
    pub renderable: u32,
    /// Rebuild target used this frame
    pub rebuild_target: u32,
}

impl<B: MeshBuilder, W: WeatherEffects> MapRenderer<B, W> {
    /// Advances the map renderer by one frame.
    ///
    /// # Arguments
    /// * `delta` - Time since the previous frame
    /// * `camera` - Camera position and visibility test for this frame
    ///
    /// # Returns
    /// Counters describing the work done this frame
    pub fn update<C: ChunkVisibility + ?Sized>(
        &mut self,
        delta: Duration,
        camera: &C,
    ) -> FrameStats {
        self.update_visibility(camera);
        sort_by_distance(&mut self.sorted_chunks, &self.chunks);

        self.adapt_rebuild_target(delta);
        let (built, failed) = self.rebuild_dirty_chunks(delta);

        self.select_render_chunks();
        self.recheck_batches();

        self.weather.advance(delta);

        let stats = FrameStats {
            built,
            failed,
            pending_dirty: self
                .chunks
                .iter()
                .filter(|chunk| chunk.is_dirty() && chunk.is_visible())
                .count() as u32,
            renderable: self.render_chunks.len() as u32,
            rebuild_target: self.rebuild_target,
        };
        log::debug!("Map renderer frame: {:?}", stats);
        stats
    }

    fn update_visibility<C: ChunkVisibility + ?Sized>(&mut self, camera: &C) {
        let camera_position = camera.camera_position();
        let max_distance = self.config.view_distance_squared();
        let chunk_size = self.grid.chunk_size();

        for chunk in self.chunks.iter_mut() {
            chunk.update_distance(camera_position);

            if chunk.distance_to_camera > max_distance {
                chunk.set_visible(false);
                if !chunk.is_empty() {
                    let released = retire_parts(&mut self.batches, chunk.take_parts());
                    log::trace!(
                        "Chunk {:?} out of view distance, released {} parts",
                        chunk.coords,
                        released
                    );
                }
                continue;
            }

            let visible = camera.is_chunk_visible(chunk.position, chunk.max_corner(chunk_size));
            chunk.set_visible(visible);
        }
    }

    /// Moves the rebuild target one step towards what the frame time allows.
    fn adapt_rebuild_target(&mut self, delta: Duration) {
        let target = if delta < self.config.target_frame_time() {
            self.rebuild_target.saturating_add(1)
        } else {
            self.rebuild_target.saturating_sub(1)
        };
        self.rebuild_target = target
            .max(self.config.min_rebuilds_per_frame)
            .min(self.config.max_rebuilds_per_frame);
    }

    fn rebuild_dirty_chunks(&mut self, delta: Duration) -> (u32, u32) {
        let limit = self.rebuild_target;
        let budget = self
            .config
            .target_frame_time()
            .max(delta)
            .mul_f32(self.config.rebuild_budget_fraction);
        let started = Instant::now();

        let mut attempts = 0;
        let mut built = 0;
        let mut failed = 0;

        for position in 0..self.sorted_chunks.len() {
            let index = self.sorted_chunks[position];
            let chunk = &self.chunks[index];
            if !chunk.is_dirty() || !chunk.is_visible() {
                continue;
            }
            if attempts >= limit || (attempts > 0 && started.elapsed() >= budget) {
                break;
            }

            attempts += 1;
            match self.build_chunk(index) {
                Ok(()) => built += 1,
                Err(err) => {
                    log::warn!("Chunk rebuild failed: {}", err);
                    failed += 1;
                }
            }
        }

        (built, failed)
    }

    /// Builds one chunk and swaps its parts in; on error nothing is touched.
    fn build_chunk(&mut self, index: usize) -> Result<(), BuildError> {
        let coords = self.chunks[index].coords;
        let expected = self.batches.used_count();

        let parts = self.mesh_builder.build(coords, expected)?;
        if parts.len() != expected {
            return Err(BuildError::PartCountMismatch {
                coords,
                expected,
                returned: parts.len(),
            });
        }

        let chunk = &mut self.chunks[index];
        let previous = chunk.install_parts(parts);
        retire_parts(&mut self.batches, previous);
        for (batch, part) in chunk.occupied_batches() {
            self.batches.add_part(batch, part);
        }

        Ok(())
    }

    /// Recomputes `render_chunks` from the sorted order.
    ///
    /// Chunks entering or leaving the subset flag their batches for a recheck.
    fn select_render_chunks(&mut self) {
        self.render_chunks.clear();

        for &index in &self.sorted_chunks {
            let chunk = &mut self.chunks[index];
            let renderable = chunk.is_renderable();

            if renderable != chunk.in_render_set {
                chunk.in_render_set = renderable;
                for (batch, part) in chunk.occupied_batches() {
                    self.batches.mark_part_changed(batch, part);
                }
            }

            if renderable {
                self.render_chunks.push(index);
            }
        }
    }

    fn recheck_batches(&mut self) {
        if !self.batches.any_pending_checks() {
            return;
        }

        for batch in self.batches.batches_needing_check() {
            let mut has_normal = false;
            let mut has_translucent = false;

            for &index in &self.render_chunks {
                if let Some(part) = self.chunks[index].mesh_part(batch) {
                    has_normal |= part.has_geometry(DrawPass::Normal);
                    has_translucent |= part.has_geometry(DrawPass::Translucent);
                }
                if has_normal && has_translucent {
                    break;
                }
            }

            self.batches.resolve(batch, has_normal, has_translucent);
        }
    }
}

/// Orders chunk indices by distance, ties broken by index.
fn sort_by_distance<P>(order: &mut [usize], chunks: &[ChunkRenderState<P>]) {
    order.sort_unstable_by(|&a, &b| {
        chunks[a]
            .distance_to_camera
            .total_cmp(&chunks[b].distance_to_camera)
            .then(a.cmp(&b))
    });
}

#[cfg(test)]
mod tests {
    use cgmath::Point3;

    use super::*;
    use crate::{
        config::RendererConfig,
        map_renderer::test_support::{
            FakePart, FixedCamera, Layout, RecordingWeather, ScriptedBuilder,
        },
    };

    const FAST_FRAME: Duration = Duration::from_millis(5);

    fn renderer_with(
        dims: [usize; 3],
        config: RendererConfig,
        builder: ScriptedBuilder,
    ) -> MapRenderer<ScriptedBuilder, RecordingWeather> {
        MapRenderer::new(dims, 2, config, builder, RecordingWeather::default()).unwrap()
    }

    fn one_rebuild_per_frame() -> RendererConfig {
        RendererConfig {
            min_rebuilds_per_frame: 1,
            max_rebuilds_per_frame: 1,
            ..RendererConfig::default()
        }
    }

    #[test]
    fn sort_breaks_distance_ties_by_index() {
        let mut chunks: Vec<ChunkRenderState<FakePart>> = (0..4)
            .map(|x| ChunkRenderState::new(Point3::new(x, 0, 0), Point3::new(0.0, 0.0, 0.0), 16))
            .collect();
        for (chunk, distance) in chunks.iter_mut().zip([5.0, 3.0, 3.0, 1.0]) {
            chunk.distance_to_camera = distance;
        }
        let mut order = vec![0, 1, 2, 3];

        sort_by_distance(&mut order, &chunks);

        assert_eq!(order, vec![3, 1, 2, 0]);
    }

    #[test]
    fn nearest_dirty_chunks_are_rebuilt_first() {
        let mut map = renderer_with([4, 1, 1], one_rebuild_per_frame(), ScriptedBuilder::new());
        let camera = FixedCamera::at(64.0, 8.0, 8.0);

        let stats = map.update(FAST_FRAME, &camera);

        assert_eq!(stats.built, 1);
        assert_eq!(stats.pending_dirty, 3);
        assert_eq!(map.mesh_builder().built, vec![Point3::new(3, 0, 0)]);

        map.update(FAST_FRAME, &camera);
        map.update(FAST_FRAME, &camera);
        let stats = map.update(FAST_FRAME, &camera);

        assert_eq!(stats.pending_dirty, 0);
        assert_eq!(
            map.mesh_builder().built,
            vec![
                Point3::new(3, 0, 0),
                Point3::new(2, 0, 0),
                Point3::new(1, 0, 0),
                Point3::new(0, 0, 0),
            ]
        );
        assert_eq!(map.render_chunks_count(), 4);
    }

    #[test]
    fn rebuild_target_adapts_within_bounds() {
        let config = RendererConfig {
            min_rebuilds_per_frame: 2,
            max_rebuilds_per_frame: 4,
            ..RendererConfig::default()
        };
        let mut map = renderer_with([1, 1, 1], config, ScriptedBuilder::new());
        let camera = FixedCamera::at(0.0, 0.0, 0.0);
        assert_eq!(map.rebuild_target(), 4);

        let slow = Duration::from_millis(50);
        assert_eq!(map.update(slow, &camera).rebuild_target, 3);
        assert_eq!(map.update(slow, &camera).rebuild_target, 2);
        assert_eq!(map.update(slow, &camera).rebuild_target, 2);

        assert_eq!(map.update(FAST_FRAME, &camera).rebuild_target, 3);
        assert_eq!(map.update(FAST_FRAME, &camera).rebuild_target, 4);
        assert_eq!(map.update(FAST_FRAME, &camera).rebuild_target, 4);
    }

    #[test]
    fn hidden_chunks_are_neither_built_nor_rendered() {
        let mut map = renderer_with([2, 1, 1], RendererConfig::default(), ScriptedBuilder::new());
        let camera = FixedCamera::at(0.0, 0.0, 0.0).hiding(Point3::new(1, 0, 0));

        let stats = map.update(FAST_FRAME, &camera);

        assert_eq!(stats.built, 1);
        assert_eq!(map.mesh_builder().built, vec![Point3::new(0, 0, 0)]);
        let hidden = map.get_chunk(Point3::new(1, 0, 0)).unwrap();
        assert!(hidden.is_dirty());
        assert!(!hidden.is_visible());
        assert_eq!(map.render_chunks(), &[0]);
    }

    #[test]
    fn failed_builds_stay_dirty_and_are_retried() {
        let mut builder = ScriptedBuilder::new();
        builder.fail(Point3::new(0, 0, 0));
        let mut map = renderer_with([1, 1, 1], RendererConfig::default(), builder);
        let camera = FixedCamera::at(0.0, 0.0, 0.0);

        let stats = map.update(FAST_FRAME, &camera);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.built, 0);
        assert!(map.get_chunk(Point3::new(0, 0, 0)).unwrap().is_dirty());
        assert_eq!(map.batches().parts_count(0), 0);

        map.mesh_builder_mut().succeed(Point3::new(0, 0, 0));
        let stats = map.update(FAST_FRAME, &camera);

        assert_eq!(stats.built, 1);
        assert!(!map.get_chunk(Point3::new(0, 0, 0)).unwrap().is_dirty());
        assert_eq!(map.batches().parts_count(0), 1);
    }

    #[test]
    fn wrong_part_count_is_a_failed_build() {
        struct ShortBuilder;
        impl MeshBuilder for ShortBuilder {
            type Part = FakePart;
            fn build(
                &mut self,
                _coords: Point3<i32>,
                _used_atlas_count: usize,
            ) -> Result<Vec<Option<FakePart>>, BuildError> {
                Ok(vec![Some(FakePart::normal(1))])
            }
        }

        let mut map = MapRenderer::new(
            [1, 1, 1],
            3,
            RendererConfig::default(),
            ShortBuilder,
            RecordingWeather::default(),
        )
        .unwrap();

        let stats = map.update(FAST_FRAME, &FixedCamera::at(0.0, 0.0, 0.0));

        assert_eq!(stats.failed, 1);
        assert!(map.chunks()[0].is_dirty());
        assert_eq!(map.batches().parts_count(0), 0);
    }

    #[test]
    fn chunks_beyond_view_distance_are_released_and_rebuilt_on_return() {
        let config = RendererConfig {
            view_distance: 40.0,
            ..RendererConfig::default()
        };
        let mut map = renderer_with([4, 1, 1], config, ScriptedBuilder::new());
        let near = FixedCamera::at(8.0, 8.0, 8.0);

        map.update(FAST_FRAME, &near);
        // Chunk 3 is centred at x = 56, beyond the view distance
        assert!(map.chunks()[3].is_dirty());
        assert!(!map.chunks()[2].is_dirty());
        assert_eq!(map.mesh_builder().live_parts(), 3);

        let far = FixedCamera::at(56.0, 8.0, 8.0);
        let stats = map.update(FAST_FRAME, &far);

        assert!(map.chunks()[0].is_dirty());
        assert!(map.chunks()[0].is_empty());
        assert!(!map.chunks()[3].is_dirty());
        assert_eq!(stats.renderable, 3);
        assert_eq!(map.batches().parts_count(0), 3);
        assert_eq!(map.mesh_builder().live_parts(), 3);
    }

    #[test]
    fn renderable_subset_is_visible_non_empty_chunks_nearest_first() {
        let builder = ScriptedBuilder::new().with_layout(Point3::new(1, 0, 0), vec![]);
        let mut map = renderer_with([4, 1, 1], RendererConfig::default(), builder);
        let camera = FixedCamera::at(0.0, 8.0, 8.0).hiding(Point3::new(2, 0, 0));

        map.update(FAST_FRAME, &camera);

        assert_eq!(map.render_chunks(), &[0, 3]);
        for &index in map.render_chunks() {
            assert!(map.chunks()[index].is_renderable());
        }
        let renderable = map.chunks().iter().filter(|c| c.is_renderable()).count();
        assert_eq!(renderable, map.render_chunks_count());
    }

    #[test]
    fn batch_flags_follow_the_renderable_subset() {
        let builder = ScriptedBuilder::new()
            .with_layout(Point3::new(0, 0, 0), vec![(1, Layout::Translucent)])
            .with_layout(Point3::new(1, 0, 0), vec![(0, Layout::Normal), (1, Layout::Normal)]);
        let mut map = renderer_with([2, 1, 1], RendererConfig::default(), builder);

        map.update(FAST_FRAME, &FixedCamera::at(0.0, 0.0, 0.0));
        assert!(map.batches().has_normal_parts(0));
        assert!(map.batches().has_normal_parts(1));
        assert!(map.batches().has_translucent_parts(1));
        assert!(!map.batches().has_translucent_parts(0));
        assert!(!map.batches().any_pending_checks());

        // Hiding chunk 1 leaves only translucent geometry in batch 1
        let camera = FixedCamera::at(0.0, 0.0, 0.0).hiding(Point3::new(1, 0, 0));
        map.update(FAST_FRAME, &camera);

        assert_eq!(map.batches().parts_count(1), 2);
        assert!(!map.batches().has_normal_parts(0));
        assert!(!map.batches().has_normal_parts(1));
        assert!(map.batches().has_translucent_parts(1));
    }

    #[test]
    fn weather_advances_once_per_update() {
        let mut map = renderer_with([1, 1, 1], RendererConfig::default(), ScriptedBuilder::new());
        let camera = FixedCamera::at(0.0, 0.0, 0.0);

        map.update(Duration::from_millis(10), &camera);
        map.update(Duration::from_millis(20), &camera);

        assert_eq!(
            map.weather().advanced,
            vec![Duration::from_millis(10), Duration::from_millis(20)]
        );
        assert!(map.weather().rendered.is_empty());
    }

    #[test]
    fn nothing_dirty_means_nothing_built() {
        let mut map = renderer_with([2, 1, 1], RendererConfig::default(), ScriptedBuilder::new());
        let camera = FixedCamera::at(0.0, 0.0, 0.0);
        map.update(FAST_FRAME, &camera);
        let builds = map.mesh_builder().built.len();

        let stats = map.update(FAST_FRAME, &camera);

        assert_eq!(stats.built, 0);
        assert_eq!(stats.failed, 0);
        assert_eq!(map.mesh_builder().built.len(), builds);
    }
}
