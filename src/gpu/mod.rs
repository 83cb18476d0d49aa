//! wgpu implementations of the mesh part and draw target seams.
//!
//! # Architecture
//! - [`GpuMeshPart`]: one chunk's geometry for one atlas batch, uploaded into its
//!   own vertex and index buffers. Opaque and translucent indices share the index
//!   buffer and are told apart by range.
//! - [`WgpuDrawTarget`]: forwards atlas binds and part submissions to an open
//!   `wgpu::RenderPass`
//! - [`ChunkPipelines`]: the opaque and blended render pipelines the two passes
//!   are recorded with
//!
//! # Performance Considerations
//! - Each submitted part is a single `draw_indexed` call; the atlas bind group is
//!   set once per batch by the batch renderer
//! - Buffers are released when the part is dropped, which happens as soon as the
//!   owning chunk is refreshed or rebuilt

use std::ops::Range;

use wgpu::util::DeviceExt;

use crate::map_renderer::{DrawPass, DrawTarget, MeshPart};

mod vertex;

pub use vertex::Vertex;

/// GPU buffers holding the geometry one chunk contributes to one atlas batch.
#[derive(Debug)]
pub struct GpuMeshPart {
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    ranges: IndexRanges,
}

impl GpuMeshPart {
    /// Uploads a mesh part.
    ///
    /// # Arguments
    /// * `device` - The WebGPU device
    /// * `label` - Debug label prefix for the created buffers
    /// * `vertices` - Vertices shared by both passes
    /// * `normal_indices` - Triangle indices drawn in the normal pass
    /// * `translucent_indices` - Triangle indices drawn in the translucent pass
    ///
    /// # Returns
    /// The uploaded part, or `None` when there is nothing to draw in either pass
    pub fn upload(
        device: &wgpu::Device,
        label: &str,
        vertices: &[Vertex],
        normal_indices: &[u32],
        translucent_indices: &[u32],
    ) -> Option<Self> {
        if vertices.is_empty() || (normal_indices.is_empty() && translucent_indices.is_empty()) {
            return None;
        }

        let ranges = IndexRanges::new(normal_indices.len(), translucent_indices.len());
        let indices = [normal_indices, translucent_indices].concat();

        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{} Vertex Buffer", label)),
            contents: bytemuck::cast_slice(vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{} Index Buffer", label)),
            contents: bytemuck::cast_slice(&indices),
            usage: wgpu::BufferUsages::INDEX,
        });

        Some(Self {
            vertex_buffer,
            index_buffer,
            ranges,
        })
    }

    /// Index range drawn for `pass`.
    pub fn indices(&self, pass: DrawPass) -> Range<u32> {
        self.ranges.get(pass)
    }
}

impl MeshPart for GpuMeshPart {
    fn has_geometry(&self, pass: DrawPass) -> bool {
        self.ranges.has_geometry(pass)
    }
}

/// One index buffer split into the normal range followed by the translucent one.
#[derive(Debug, Clone, PartialEq, Eq)]
struct IndexRanges {
    normal: Range<u32>,
    translucent: Range<u32>,
}

impl IndexRanges {
    fn new(normal: usize, translucent: usize) -> Self {
        let normal_end = normal as u32;
        Self {
            normal: 0..normal_end,
            translucent: normal_end..normal_end + translucent as u32,
        }
    }

    fn get(&self, pass: DrawPass) -> Range<u32> {
        match pass {
            DrawPass::Normal => self.normal.clone(),
            DrawPass::Translucent => self.translucent.clone(),
        }
    }

    fn has_geometry(&self, pass: DrawPass) -> bool {
        !self.get(pass).is_empty()
    }
}

/// Indices to draw for a submission, or `None` when nothing may be drawn: the
/// last atlas bind failed or the part has no geometry for the pass.
fn draw_range(bound: bool, indices: Range<u32>) -> Option<Range<u32>> {
    (bound && !indices.is_empty()).then_some(indices)
}

/// Submits mesh parts into an open render pass.
///
/// The caller sets the pipeline and the camera bind group for the pass before
/// handing it to the batch renderer.
pub struct WgpuDrawTarget<'p, 'e> {
    render_pass: &'p mut wgpu::RenderPass<'e>,
    atlas_bind_groups: &'p [wgpu::BindGroup],
    atlas_bind_group_index: u32,
    bound: bool,
}

impl<'p, 'e> WgpuDrawTarget<'p, 'e> {
    /// Wraps `render_pass`.
    ///
    /// # Arguments
    /// * `render_pass` - The pass being recorded
    /// * `atlas_bind_groups` - One texture bind group per atlas batch
    /// * `atlas_bind_group_index` - Bind group slot the atlas texture is bound to
    pub fn new(
        render_pass: &'p mut wgpu::RenderPass<'e>,
        atlas_bind_groups: &'p [wgpu::BindGroup],
        atlas_bind_group_index: u32,
    ) -> Self {
        Self {
            render_pass,
            atlas_bind_groups,
            atlas_bind_group_index,
            bound: false,
        }
    }
}

impl DrawTarget<GpuMeshPart> for WgpuDrawTarget<'_, '_> {
    fn bind_atlas(&mut self, batch: usize) {
        match self.atlas_bind_groups.get(batch) {
            Some(bind_group) => {
                self.render_pass
                    .set_bind_group(self.atlas_bind_group_index, bind_group, &[]);
                self.bound = true;
            }
            None => {
                log::error!(
                    "No bind group for atlas batch {} ({} available)",
                    batch,
                    self.atlas_bind_groups.len()
                );
                self.bound = false;
            }
        }
    }

    fn submit(&mut self, part: &GpuMeshPart, pass: DrawPass) {
        let Some(indices) = draw_range(self.bound, part.indices(pass)) else {
            return;
        };

        self.render_pass
            .set_vertex_buffer(0, part.vertex_buffer.slice(..));
        self.render_pass
            .set_index_buffer(part.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
        self.render_pass.draw_indexed(indices, 0, 0..1);
    }
}

/// Render pipelines for the normal and translucent chunk passes.
pub struct ChunkPipelines {
    /// Opaque geometry, depth tested and written
    pub normal: wgpu::RenderPipeline,
    /// Alpha-blended geometry, depth tested but not written
    pub translucent: wgpu::RenderPipeline,
}

impl ChunkPipelines {
    /// Creates both chunk pipelines from one WGSL shader.
    ///
    /// # Arguments
    /// * `device` - The WebGPU device
    /// * `shader_string` - WGSL source with `vs_main` and `fs_main` entry points
    /// * `texture_format` - Format of the colour target
    /// * `bind_group_layouts` - Layouts of the camera and atlas bind groups
    /// * `depth_format` - Format of the shared depth buffer
    pub fn new(
        device: &wgpu::Device,
        shader_string: &str,
        texture_format: wgpu::TextureFormat,
        bind_group_layouts: &[&wgpu::BindGroupLayout],
        depth_format: wgpu::TextureFormat,
    ) -> Self {
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Chunk Pipeline Layout"),
            bind_group_layouts,
            push_constant_ranges: &[],
        });

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Chunk Shader"),
            source: wgpu::ShaderSource::Wgsl(shader_string.into()),
        });

        let create = |label: &str, blend: wgpu::BlendState, depth_write_enabled: bool| {
            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(label),
                layout: Some(&pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &shader,
                    entry_point: Some("vs_main"),
                    compilation_options: Default::default(),
                    buffers: &[Vertex::desc()],
                },
                fragment: Some(wgpu::FragmentState {
                    module: &shader,
                    entry_point: Some("fs_main"),
                    compilation_options: Default::default(),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: texture_format,
                        blend: Some(blend),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                }),
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    strip_index_format: None,
                    front_face: wgpu::FrontFace::Ccw,
                    cull_mode: Some(wgpu::Face::Back),
                    polygon_mode: wgpu::PolygonMode::Fill,
                    unclipped_depth: false,
                    conservative: false,
                },
                depth_stencil: Some(wgpu::DepthStencilState {
                    format: depth_format,
                    depth_write_enabled,
                    depth_compare: wgpu::CompareFunction::Less,
                    stencil: wgpu::StencilState::default(),
                    bias: wgpu::DepthBiasState::default(),
                }),
                multisample: Default::default(),
                multiview: None,
                cache: None,
            })
        };

        Self {
            normal: create("Chunk Normal Pipeline", wgpu::BlendState::REPLACE, true),
            translucent: create(
                "Chunk Translucent Pipeline",
                wgpu::BlendState::ALPHA_BLENDING,
                false,
            ),
        }
    }
}
