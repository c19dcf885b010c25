use crate::render::RenderError;
use common::glm::{Vec2, Vec3, Vec4};
use common::memoffset::offset_of;
use std::mem;
use std::path::Path;
use std::sync::Arc;
use std::fs;
use vk_wrapper::{
    vk, DescriptorSetLayout, Device, GraphicsPipelineDesc, Pipeline, PipelineLayout, RenderPass, VertexInputBinding,
};

#[repr(C)]
#[derive(Copy, Clone, Debug, Default)]
pub struct ModelVertex {
    pub position: Vec3,
    pub normal: Vec3,
    pub uv: Vec2,
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Default)]
pub struct ModelInstance {
    pub position: Vec4,
}

/// One sprite, billboard, glyph or Spine quad. The quad corners are generated in the vertex shader.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default)]
pub struct QuadInstance {
    pub position: Vec4,
    /// `xy` is the size, `zw` is unused.
    pub size: Vec4,
    /// `(u0, v0, u1, v1)`
    pub uv_rect: Vec4,
    pub fg_color: Vec4,
    pub bg_color: Vec4,
}

#[repr(u32)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum QuadMode {
    Sprite = 0,
    Billboard = 1,
    Glyph = 2,
    Spine = 3,
}

#[repr(C)]
#[derive(Copy, Clone)]
pub(crate) struct QuadPushConstants {
    pub mode: u32,
    pub _pad: [u32; 3],
}

impl QuadPushConstants {
    pub fn new(mode: QuadMode) -> Self {
        Self {
            mode: mode as u32,
            _pad: [0; 3],
        }
    }
}

pub(crate) struct ShaderSet {
    model_vert: Vec<u8>,
    model_frag: Vec<u8>,
    quad_vert: Vec<u8>,
    quad_frag: Vec<u8>,
}

impl ShaderSet {
    pub fn load(dir: &Path) -> Result<Self, RenderError> {
        let read = |name: &str| {
            let path = dir.join(name);
            fs::read(&path).map_err(|e| RenderError::Shader(format!("{}: {}", path.display(), e)))
        };

        Ok(Self {
            model_vert: read("model.vert.spv")?,
            model_frag: read("model.frag.spv")?,
            quad_vert: read("quad.vert.spv")?,
            quad_frag: read("quad.frag.spv")?,
        })
    }
}

/// Pipelines sharing one layout: set 0 is the frame uniform block, set 1 the texture.
#[derive(Clone)]
pub struct PipelineSet {
    pub layout: Arc<PipelineLayout>,
    pub model: Arc<Pipeline>,
    pub quad: Arc<Pipeline>,
}

impl PipelineSet {
    pub(crate) fn new(
        device: &Device,
        shaders: &ShaderSet,
        render_pass: &Arc<RenderPass>,
        frame_layout: &Arc<DescriptorSetLayout>,
        texture_layout: &Arc<DescriptorSetLayout>,
    ) -> Result<Self, RenderError> {
        let layout = device.create_pipeline_layout(
            &[frame_layout, texture_layout],
            mem::size_of::<QuadPushConstants>() as u32,
        )?;

        let model_bindings = [
            VertexInputBinding {
                binding: 0,
                stride: mem::size_of::<ModelVertex>() as u32,
                per_instance: false,
                attributes: vec![
                    (0, vk::Format::R32G32B32_SFLOAT, offset_of!(ModelVertex, position) as u32),
                    (1, vk::Format::R32G32B32_SFLOAT, offset_of!(ModelVertex, normal) as u32),
                    (2, vk::Format::R32G32_SFLOAT, offset_of!(ModelVertex, uv) as u32),
                ],
            },
            VertexInputBinding {
                binding: 1,
                stride: mem::size_of::<ModelInstance>() as u32,
                per_instance: true,
                attributes: vec![(3, vk::Format::R32G32B32A32_SFLOAT, 0)],
            },
        ];
        let model = device.create_graphics_pipeline(&GraphicsPipelineDesc {
            vertex_spirv: &shaders.model_vert,
            fragment_spirv: &shaders.model_frag,
            vertex_bindings: &model_bindings,
            layout: &layout,
            render_pass,
            subpass: 0,
            topology: vk::PrimitiveTopology::TRIANGLE_LIST,
            depth_test: true,
            depth_write: true,
            alpha_blend: false,
            cull_back_faces: true,
        })?;

        let vec4 = vk::Format::R32G32B32A32_SFLOAT;
        let quad_bindings = [VertexInputBinding {
            binding: 0,
            stride: mem::size_of::<QuadInstance>() as u32,
            per_instance: true,
            attributes: vec![
                (0, vec4, offset_of!(QuadInstance, position) as u32),
                (1, vec4, offset_of!(QuadInstance, size) as u32),
                (2, vec4, offset_of!(QuadInstance, uv_rect) as u32),
                (3, vec4, offset_of!(QuadInstance, fg_color) as u32),
                (4, vec4, offset_of!(QuadInstance, bg_color) as u32),
            ],
        }];
        let quad = device.create_graphics_pipeline(&GraphicsPipelineDesc {
            vertex_spirv: &shaders.quad_vert,
            fragment_spirv: &shaders.quad_frag,
            vertex_bindings: &quad_bindings,
            layout: &layout,
            render_pass,
            subpass: 0,
            topology: vk::PrimitiveTopology::TRIANGLE_LIST,
            depth_test: false,
            depth_write: false,
            alpha_blend: true,
            cull_back_faces: false,
        })?;

        Ok(Self { layout, model, quad })
    }
}

/// Everything recording depends on that changes with the swapchain.
pub struct RenderTarget {
    pub render_pass: Arc<RenderPass>,
    pub pipelines: PipelineSet,
    pub extent: (u32, u32),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vertex_layouts_match_shaders() {
        assert_eq!(mem::size_of::<ModelVertex>(), 32);
        assert_eq!(offset_of!(ModelVertex, uv), 24);
        assert_eq!(mem::size_of::<ModelInstance>(), 16);
        assert_eq!(mem::size_of::<QuadInstance>(), 80);
        assert_eq!(offset_of!(QuadInstance, bg_color), 64);
        assert_eq!(mem::size_of::<QuadPushConstants>(), 16);
    }
}
