#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![warn(rustdoc::invalid_rust_codeblocks)]

//! # Voxel Map Renderer
//!
//! Chunk render-state management and frame scheduling for a voxel world.
//!
//! The world is a fixed grid of chunks. Every frame the renderer measures which
//! chunks the camera can see, rebuilds the nearest out-of-date chunk meshes within
//! a time budget, and submits the visible geometry grouped by texture atlas in
//! two passes: opaque front-to-back, then translucent back-to-front.
//!
//! ## Key Modules
//!
//! * `map_renderer` - The render context, scheduler and batch renderer
//! * `gpu` - wgpu implementations of the mesh part and draw target seams
//! * `config` - JSON-backed scheduler settings
//! * `error` - Error types of every fallible operation
//! * `application_state` - Headless driver stepping a synthetic world
//!
//! ## Usage
//!
//! ```rust,ignore
//! let mut renderer = MapRenderer::new([32, 8, 32], atlas_count, config, builder, ClearSkies)?;
//!
//! // every frame
//! renderer.update(delta, &camera);
//! renderer.render_normal(delta, &mut opaque_target);
//! renderer.render_translucent(delta, &mut translucent_target);
//!
//! // whenever a block changes
//! renderer.refresh_block(block_coords)?;
//! ```
//!
//! ## Performance Considerations
//!
//! * Mesh rebuilds are bounded per frame by an adaptive count and a time budget
//! * Empty atlas batches are skipped without a bind or draw call
//! * Batch occupancy is maintained incrementally rather than rescanned each frame

#[cfg(not(target_family = "wasm"))]
use log::info;

pub mod application_state;
pub mod config;
pub mod error;
pub mod gpu;
pub mod map_renderer;

pub use config::RendererConfig;
pub use error::{BuildError, ChunkLookupError, ConfigError, InitError};
pub use map_renderer::{
    ChunkVisibility, ClearSkies, DrawPass, DrawStats, DrawTarget, FrameStats, MapRenderer,
    MeshBuilder, MeshPart, WeatherEffects,
};

/// Frames stepped by [`run`].
pub const DEMO_FRAMES: u64 = 1200;

/// Runs the headless demo world.
///
/// An optional path to a JSON [`RendererConfig`] may be given as the first
/// command line argument; defaults are used otherwise.
#[cfg(not(target_family = "wasm"))]
pub fn run() {
    let mut log_builder = env_logger::Builder::new();
    log_builder
        .target(env_logger::Target::Stdout)
        .parse_env("RUST_LOG")
        .init();

    info!("Logger initialized");

    let config = match std::env::args().nth(1) {
        Some(path) => match RendererConfig::load(&path) {
            Ok(config) => {
                info!("Loaded renderer config from {}", path);
                config
            }
            Err(err) => {
                log::error!("Invalid renderer config {}: {}", path, err);
                return;
            }
        },
        None => RendererConfig::default(),
    };
    let frame_time = config.target_frame_time();

    let mut state = match application_state::ApplicationState::new(config, fastrand::u64(..)) {
        Ok(state) => state,
        Err(err) => {
            log::error!("Failed to create the demo world: {}", err);
            return;
        }
    };

    for _ in 0..DEMO_FRAMES {
        let started = web_time::Instant::now();
        state.step();
        if let Some(rest) = frame_time.checked_sub(started.elapsed()) {
            std::thread::sleep(rest);
        }
    }

    info!("Demo finished: {:?}, {:?}", state.stats, state.draw_counter);
    state.renderer.clear();
}
