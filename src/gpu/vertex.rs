//! Vertex format of chunk meshes.

use cgmath::Point3;

/// A vertex of a chunk mesh part.
///
/// Texture coordinates address the atlas bound for the part's batch, so no
/// texture index is stored per vertex.
///
/// # Memory Layout
/// - Position: 3x i32 (12 bytes)
/// - Texture Coordinates: [f32; 2] (8 bytes)
/// - Colour: packed RGBA8 tint and shade (4 bytes)
///
/// Total size: 24 bytes
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex {
    x: i32,
    y: i32,
    z: i32,
    /// UV coordinates inside the atlas (normalized 0.0-1.0)
    tex_coords: [f32; 2],
    colour: [u8; 4],
}

impl Vertex {
    /// Creates a new vertex.
    ///
    /// # Arguments
    /// * `pos` - Position in world space, in blocks
    /// * `u` - U coordinate inside the atlas
    /// * `v` - V coordinate inside the atlas
    /// * `colour` - Packed RGBA8 tint, lighting already applied
    pub fn new(pos: Point3<i32>, u: f32, v: f32, colour: [u8; 4]) -> Self {
        Vertex {
            x: pos.x,
            y: pos.y,
            z: pos.z,
            tex_coords: [u, v],
            colour,
        }
    }

    /// World-space position of the vertex.
    pub fn position(&self) -> Point3<i32> {
        Point3::new(self.x, self.y, self.z)
    }

    /// Returns the vertex buffer layout matching the chunk shader inputs.
    ///
    /// # Shader Attributes
    /// - `location = 0`: position (vec3<i32>)
    /// - `location = 1`: tex_coords (vec2<f32>)
    /// - `location = 2`: colour (vec4<f32>, unpacked from unorm8x4)
    pub fn desc<'a>() -> wgpu::VertexBufferLayout<'a> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Sint32x3,
                },
                wgpu::VertexAttribute {
                    offset: std::mem::size_of::<[i32; 3]>() as wgpu::BufferAddress,
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32x2,
                },
                wgpu::VertexAttribute {
                    offset: std::mem::size_of::<[u32; 5]>() as wgpu::BufferAddress,
                    shader_location: 2,
                    format: wgpu::VertexFormat::Unorm8x4,
                },
            ],
        }
    }
}
