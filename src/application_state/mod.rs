//! # Application State Management
//!
//! Headless driver for the map renderer. It owns a synthetic world and steps it
//! frame by frame the way a windowed application would on every redraw:
//! - Frame timing from the wall clock
//! - Camera movement and random block edits
//! - `update`, then the normal and translucent passes
//! - Periodic statistics in the log

pub mod demo_world;

use cgmath::Point3;
use demo_world::{DrawCounter, OrbitCamera, ProceduralBuilder, Rain};

use crate::{
    config::RendererConfig,
    error::InitError,
    map_renderer::{FrameStats, MapRenderer, WorldGrid},
};

/// World size of the demo, in chunks.
pub const DEMO_WORLD_DIMS: [usize; 3] = [24, 4, 24];
/// Atlas batches used by the demo world.
pub const DEMO_ATLAS_COUNT: usize = 4;

const BUILD_FAILURE_RATE: f32 = 0.02;
const EDITS_PER_FRAME: u32 = 2;
const STATS_INTERVAL: u64 = 120;

/// Totals accumulated over a run.
#[derive(Debug, Default, Clone, Copy)]
pub struct RunStats {
    /// Frames stepped
    pub frames: u64,
    /// Successful chunk rebuilds
    pub built: u64,
    /// Failed chunk rebuilds
    pub failed: u64,
    /// Block edits applied
    pub edits: u64,
}

/// The running demo: the render context plus everything that feeds it.
pub struct ApplicationState {
    /// The map renderer being driven
    pub renderer: MapRenderer<ProceduralBuilder, Rain>,
    /// Camera orbiting the world
    pub camera: OrbitCamera,
    /// Draw calls issued by the render passes
    pub draw_counter: DrawCounter,
    /// Totals so far
    pub stats: RunStats,
    /// Timestamp of the last frame for delta time calculations
    last_frame_time: web_time::Instant,
    rng: fastrand::Rng,
}

impl ApplicationState {
    /// Creates the demo world.
    ///
    /// # Arguments
    /// * `config` - Renderer settings
    /// * `seed` - Seed for block edits and injected build failures
    pub fn new(config: RendererConfig, seed: u64) -> Result<Self, InitError> {
        let chunk_size = config.chunk_size as f32;
        let grid = WorldGrid::new(DEMO_WORLD_DIMS, config.chunk_size)?;
        let builder = ProceduralBuilder::new(grid, seed, BUILD_FAILURE_RATE);
        let renderer = MapRenderer::new(
            DEMO_WORLD_DIMS,
            DEMO_ATLAS_COUNT,
            config,
            builder,
            Rain::default(),
        )?;

        let centre = Point3::new(
            DEMO_WORLD_DIMS[0] as f32 * chunk_size / 2.0,
            0.0,
            DEMO_WORLD_DIMS[2] as f32 * chunk_size / 2.0,
        );
        let camera = OrbitCamera::new(centre, centre.x * 0.6, 48.0, 0.3);

        Ok(Self {
            renderer,
            camera,
            draw_counter: DrawCounter::default(),
            stats: RunStats::default(),
            last_frame_time: web_time::Instant::now(),
            rng: fastrand::Rng::with_seed(seed),
        })
    }

    /// Runs `frames` frames back to back.
    pub fn run_frames(&mut self, frames: u64) -> RunStats {
        for _ in 0..frames {
            self.step();
        }
        self.stats
    }

    /// Steps one frame using the wall-clock time since the previous one.
    pub fn step(&mut self) -> FrameStats {
        let now = web_time::Instant::now();
        let delta = now - self.last_frame_time;
        self.last_frame_time = now;

        self.camera.advance(delta);
        self.apply_random_edits();

        let frame = self.renderer.update(delta, &self.camera);
        self.renderer.render_normal(delta, &mut self.draw_counter);
        self.renderer.render_translucent(delta, &mut self.draw_counter);

        self.stats.frames += 1;
        self.stats.built += u64::from(frame.built);
        self.stats.failed += u64::from(frame.failed);

        if self.stats.frames % STATS_INTERVAL == 0 {
            log::info!(
                "Frame {}: {} renderable, {} pending, rebuild target {}, {} draws so far, rain {:.2}",
                self.stats.frames,
                frame.renderable,
                frame.pending_dirty,
                frame.rebuild_target,
                self.draw_counter.draws,
                self.renderer.weather().intensity()
            );
        }

        frame
    }

    /// Simulates players editing blocks somewhere in the world.
    fn apply_random_edits(&mut self) {
        let size = self.renderer.grid().chunk_size() as i32;
        let [x, y, z] = self.renderer.grid().dims().map(|d| d as i32 * size);

        for _ in 0..EDITS_PER_FRAME {
            let block = Point3::new(
                self.rng.i32(0..x),
                self.rng.i32(0..y),
                self.rng.i32(0..z),
            );
            match self.renderer.refresh_block(block) {
                Ok(()) => self.stats.edits += 1,
                Err(err) => log::warn!("Dropping block edit: {}", err),
            }
        }
    }
}
