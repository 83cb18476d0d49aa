//! Normal and translucent draw passes over the renderable subset.
//!
//! Geometry is submitted one atlas batch at a time so each atlas texture is
//! bound once per pass. Batches that no renderable chunk contributes to for the
//! current pass are skipped without touching the draw target.

use web_time::Duration;

use super::{DrawPass, DrawTarget, MapRenderer, MeshBuilder, WeatherEffects};

/// Summary of one draw pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DrawStats {
    /// Atlas batches bound during the pass
    pub batches_bound: u32,
    /// Mesh parts submitted during the pass
    pub parts_submitted: u32,
}

impl<B: MeshBuilder, W: WeatherEffects> MapRenderer<B, W> {
    /// Draws the opaque geometry of every renderable chunk, nearest first, then
    /// the precipitation overlay.
    ///
    /// # Arguments
    /// * `delta` - Time since the previous frame, forwarded to the weather
    /// * `target` - Draw API receiving atlas binds and part submissions
    pub fn render_normal<T: DrawTarget<B::Part> + ?Sized>(
        &mut self,
        delta: Duration,
        target: &mut T,
    ) -> DrawStats {
        let stats = self.render_pass(DrawPass::Normal, target);
        self.weather.render(delta);
        stats
    }

    /// Draws the translucent geometry of every renderable chunk, farthest first.
    pub fn render_translucent<T: DrawTarget<B::Part> + ?Sized>(
        &mut self,
        _delta: Duration,
        target: &mut T,
    ) -> DrawStats {
        self.render_pass(DrawPass::Translucent, target)
    }

    fn render_pass<T: DrawTarget<B::Part> + ?Sized>(
        &self,
        pass: DrawPass,
        target: &mut T,
    ) -> DrawStats {
        let mut stats = DrawStats::default();

        for batch in 0..self.batches.used_count() {
            if self.batches.parts_count(batch) == 0 || !self.batches.has_parts(batch, pass) {
                continue;
            }

            target.bind_atlas(batch);
            stats.batches_bound += 1;
            stats.parts_submitted += self.submit_batch(batch, pass, target);
        }

        log::trace!("{:?} pass: {:?}", pass, stats);
        stats
    }

    fn submit_batch<T: DrawTarget<B::Part> + ?Sized>(
        &self,
        batch: usize,
        pass: DrawPass,
        target: &mut T,
    ) -> u32 {
        let mut submitted = 0;
        let mut submit = |index: usize| {
            if let Some(part) = self.chunks[index].part_for_pass(batch, pass) {
                target.submit(part, pass);
                submitted += 1;
            }
        };

        match pass {
            DrawPass::Normal => self.render_chunks.iter().copied().for_each(&mut submit),
            DrawPass::Translucent => self.render_chunks.iter().rev().copied().for_each(&mut submit),
        }

        submitted
    }
}
