//! Synthetic collaborators used to drive the map renderer without a window.
//!
//! The world is a rolling heightmap over a flat sea: chunks crossing the terrain
//! surface get opaque geometry spread over the atlas batches, chunks crossing the
//! sea level get translucent water in the last batch. Everything else is empty.

use cgmath::{InnerSpace, MetricSpace, Point3, Vector3};
use noise::{NoiseFn, Perlin};
use web_time::Duration;

use crate::{
    error::BuildError,
    map_renderer::{
        ChunkVisibility, DrawPass, DrawTarget, MeshBuilder, MeshPart, WeatherEffects, WorldGrid,
    },
};

/// Height of the sea surface, in blocks.
pub const SEA_LEVEL: i32 = 28;
/// Scaling factor applied to block columns when sampling Perlin noise.
pub const PERLIN_SCALE_FACTOR: f64 = 0.02;
/// Largest distance of the terrain surface from the sea level, in blocks.
pub const TERRAIN_AMPLITUDE: f64 = 12.0;

/// Stand-in for uploaded geometry: only the triangle counts per pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DemoPart {
    /// Opaque triangles
    pub normal_triangles: u32,
    /// Water triangles
    pub translucent_triangles: u32,
}

impl MeshPart for DemoPart {
    fn has_geometry(&self, pass: DrawPass) -> bool {
        match pass {
            DrawPass::Normal => self.normal_triangles > 0,
            DrawPass::Translucent => self.translucent_triangles > 0,
        }
    }
}

/// Meshes chunks of a procedural heightmap, occasionally failing on purpose.
pub struct ProceduralBuilder {
    grid: WorldGrid,
    perlin: Perlin,
    rng: fastrand::Rng,
    failure_rate: f32,
    /// Total number of builds requested
    pub builds: u64,
}

impl ProceduralBuilder {
    /// Creates a builder for `grid`.
    ///
    /// # Arguments
    /// * `grid` - The world the chunks belong to
    /// * `seed` - Seed of the terrain and the failure injection
    /// * `failure_rate` - Probability in `[0, 1]` that a build fails
    pub fn new(grid: WorldGrid, seed: u64, failure_rate: f32) -> Self {
        Self {
            grid,
            perlin: Perlin::new(seed as u32),
            rng: fastrand::Rng::with_seed(seed),
            failure_rate,
            builds: 0,
        }
    }

    /// Terrain height at block column `(x, z)`.
    pub fn surface_height(&self, x: f32, z: f32) -> i32 {
        let sample = self.perlin.get([
            x as f64 * PERLIN_SCALE_FACTOR,
            z as f64 * PERLIN_SCALE_FACTOR,
        ]);
        SEA_LEVEL + (sample.clamp(-1.0, 1.0) * TERRAIN_AMPLITUDE) as i32
    }
}

impl MeshBuilder for ProceduralBuilder {
    type Part = DemoPart;

    fn build(
        &mut self,
        coords: Point3<i32>,
        used_atlas_count: usize,
    ) -> Result<Vec<Option<DemoPart>>, BuildError> {
        self.builds += 1;
        if self.rng.f32() < self.failure_rate {
            return Err(BuildError::Failed {
                coords,
                reason: "injected failure".into(),
            });
        }

        let mut parts = vec![None; used_atlas_count];
        if used_atlas_count == 0 {
            return Ok(parts);
        }

        let size = self.grid.chunk_size() as i32;
        let origin = self.grid.chunk_origin(coords);
        let (bottom, top) = (coords.y * size, coords.y * size + size);

        let mut surface_columns = 0u32;
        let mut water_columns = 0u32;
        for dz in 0..size {
            for dx in 0..size {
                let height = self.surface_height(origin.x + dx as f32, origin.z + dz as f32);
                if (bottom..top).contains(&height) {
                    surface_columns += 1;
                }
                if height < SEA_LEVEL && (bottom..top).contains(&SEA_LEVEL) {
                    water_columns += 1;
                }
            }
        }

        if surface_columns > 0 {
            let batch = (coords.x + coords.z).rem_euclid(used_atlas_count as i32) as usize;
            parts[batch] = Some(DemoPart {
                normal_triangles: surface_columns * 2,
                translucent_triangles: 0,
            });
        }
        if water_columns > 0 {
            let water = parts[used_atlas_count - 1].get_or_insert(DemoPart {
                normal_triangles: 0,
                translucent_triangles: 0,
            });
            water.translucent_triangles = water_columns * 2;
        }

        Ok(parts)
    }
}

/// A camera circling the middle of the world, looking along its direction of
/// travel.
#[derive(Debug, Clone)]
pub struct OrbitCamera {
    centre: Point3<f32>,
    radius: f32,
    height: f32,
    angle: f32,
    /// Radians per second
    angular_speed: f32,
    /// Half the view-cone angle, in radians
    half_fov: f32,
}

impl OrbitCamera {
    /// Creates a camera orbiting `centre`.
    pub fn new(centre: Point3<f32>, radius: f32, height: f32, angular_speed: f32) -> Self {
        Self {
            centre,
            radius,
            height,
            angle: 0.0,
            angular_speed,
            half_fov: 50f32.to_radians(),
        }
    }

    /// Moves the camera along its orbit.
    pub fn advance(&mut self, delta: Duration) {
        self.angle = (self.angle + self.angular_speed * delta.as_secs_f32())
            % std::f32::consts::TAU;
    }

    /// Normalized view direction, tangent to the orbit.
    pub fn forward(&self) -> Vector3<f32> {
        Vector3::new(-self.angle.sin(), -0.2, self.angle.cos()).normalize()
    }
}

impl ChunkVisibility for OrbitCamera {
    fn camera_position(&self) -> Point3<f32> {
        Point3::new(
            self.centre.x + self.radius * self.angle.cos(),
            self.height,
            self.centre.z + self.radius * self.angle.sin(),
        )
    }

    /// Cone test against the box centre, widened by the box's bounding sphere.
    fn is_chunk_visible(&self, min: Point3<f32>, max: Point3<f32>) -> bool {
        let eye = self.camera_position();
        let centre = min + (max - min) / 2.0;
        let bounding_radius = min.distance(max) / 2.0;

        let to_centre = centre - eye;
        let distance = to_centre.magnitude();
        if distance <= bounding_radius {
            return true;
        }

        let cos_angle = (to_centre.dot(self.forward()) / distance).clamp(-1.0, 1.0);
        let widening = (bounding_radius / distance).asin();
        cos_angle.acos() <= self.half_fov + widening
    }
}

/// Counts what would have been sent to the GPU.
#[derive(Debug, Default, Clone, Copy)]
pub struct DrawCounter {
    /// Atlas binds issued
    pub binds: u64,
    /// Draw calls issued
    pub draws: u64,
    /// Triangles submitted
    pub triangles: u64,
}

impl DrawTarget<DemoPart> for DrawCounter {
    fn bind_atlas(&mut self, _batch: usize) {
        self.binds += 1;
    }

    fn submit(&mut self, part: &DemoPart, pass: DrawPass) {
        self.draws += 1;
        let triangles = match pass {
            DrawPass::Normal => part.normal_triangles,
            DrawPass::Translucent => part.translucent_triangles,
        };
        self.triangles += u64::from(triangles);
    }
}

/// Rain that fades in and out over a fixed cycle.
#[derive(Debug, Default)]
pub struct Rain {
    elapsed: Duration,
    /// Precipitation overlays drawn so far
    pub overlays_drawn: u64,
}

impl Rain {
    const CYCLE: Duration = Duration::from_secs(20);

    /// Rain intensity in `[0, 1]`.
    pub fn intensity(&self) -> f32 {
        let phase = self.elapsed.as_secs_f32() / Self::CYCLE.as_secs_f32();
        (phase * std::f32::consts::TAU).sin().max(0.0)
    }
}

impl WeatherEffects for Rain {
    fn advance(&mut self, delta: Duration) {
        self.elapsed += delta;
        if self.elapsed >= Self::CYCLE {
            self.elapsed -= Self::CYCLE;
        }
    }

    fn render(&mut self, _delta: Duration) {
        if self.intensity() > 0.0 {
            self.overlays_drawn += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid() -> WorldGrid {
        WorldGrid::new([8, 4, 8], 16).unwrap()
    }

    #[test]
    fn builds_return_one_slot_per_batch() {
        let mut builder = ProceduralBuilder::new(grid(), 1, 0.0);
        for coords in [Point3::new(0, 0, 0), Point3::new(3, 1, 5), Point3::new(7, 3, 7)] {
            assert_eq!(builder.build(coords, 4).unwrap().len(), 4);
        }
        assert_eq!(builder.builds, 3);
    }

    #[test]
    fn chunks_far_above_the_terrain_are_empty() {
        let mut builder = ProceduralBuilder::new(grid(), 1, 0.0);
        let parts = builder.build(Point3::new(2, 3, 2), 4).unwrap();
        assert!(parts.iter().all(Option::is_none));
    }

    #[test]
    fn surface_chunks_have_opaque_geometry() {
        let mut builder = ProceduralBuilder::new(grid(), 1, 0.0);
        let column: Vec<_> = (0..4)
            .map(|y| builder.build(Point3::new(0, y, 0), 2).unwrap())
            .collect();

        assert!(column
            .iter()
            .flatten()
            .flatten()
            .any(|part| part.has_geometry(DrawPass::Normal)));
    }

    #[test]
    fn certain_failure_always_fails() {
        let mut builder = ProceduralBuilder::new(grid(), 7, 1.0);
        assert!(matches!(
            builder.build(Point3::new(1, 1, 1), 2),
            Err(BuildError::Failed { .. })
        ));
    }

    #[test]
    fn camera_sees_ahead_but_not_behind() {
        let camera = OrbitCamera::new(Point3::new(0.0, 0.0, 0.0), 100.0, 40.0, 0.0);
        let eye = camera.camera_position();
        let ahead = eye + camera.forward() * 80.0;
        let behind = eye - camera.forward() * 80.0;
        let half = Vector3::new(8.0, 8.0, 8.0);

        assert!(camera.is_chunk_visible(ahead - half, ahead + half));
        assert!(!camera.is_chunk_visible(behind - half, behind + half));
        assert!(camera.is_chunk_visible(eye - half, eye + half));
    }

    #[test]
    fn draw_counter_counts_triangles_of_the_submitted_pass() {
        let part = DemoPart {
            normal_triangles: 10,
            translucent_triangles: 4,
        };
        let mut counter = DrawCounter::default();

        counter.bind_atlas(0);
        counter.submit(&part, DrawPass::Normal);
        counter.submit(&part, DrawPass::Translucent);

        assert_eq!(counter.binds, 1);
        assert_eq!(counter.draws, 2);
        assert_eq!(counter.triangles, 14);
    }
}
