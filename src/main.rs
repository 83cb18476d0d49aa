//! # Voxel Map Renderer Entry Point
//!
//! Runs the headless demo world through the library's `run()` function.
//!
//! ## Usage
//!
//! ```bash
//! cargo run --release -- [path/to/renderer_config.json]
//! ```

fn main() {
    #[cfg(not(target_family = "wasm"))]
    voxel_map_renderer::run();
}
