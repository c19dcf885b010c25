use crate::device::DeviceWrapper;
use crate::descriptor_pool::DescriptorSetLayout;
use crate::{Device, DeviceError, RenderPass};
use ash::vk;
use smallvec::SmallVec;
use std::ffi::CStr;
use std::io::Cursor;
use std::sync::Arc;

const SHADER_ENTRY: &CStr = unsafe { CStr::from_bytes_with_nul_unchecked(b"main\0") };

pub struct PipelineLayout {
    pub(crate) device_wrapper: Arc<DeviceWrapper>,
    pub(crate) native: vk::PipelineLayout,
    pub(crate) _set_layouts: Vec<Arc<DescriptorSetLayout>>,
    pub(crate) push_constants_size: u32,
}

impl PipelineLayout {
    pub fn push_constants_size(&self) -> u32 {
        self.push_constants_size
    }
}

impl Drop for PipelineLayout {
    fn drop(&mut self) {
        unsafe { self.device_wrapper.native.destroy_pipeline_layout(self.native, None) };
    }
}

#[derive(Clone, Debug)]
pub struct VertexInputBinding {
    pub binding: u32,
    pub stride: u32,
    pub per_instance: bool,
    /// (location, format, offset)
    pub attributes: Vec<(u32, vk::Format, u32)>,
}

pub struct GraphicsPipelineDesc<'a> {
    pub vertex_spirv: &'a [u8],
    pub fragment_spirv: &'a [u8],
    pub vertex_bindings: &'a [VertexInputBinding],
    pub layout: &'a Arc<PipelineLayout>,
    pub render_pass: &'a Arc<RenderPass>,
    pub subpass: u32,
    pub topology: vk::PrimitiveTopology,
    pub depth_test: bool,
    pub depth_write: bool,
    pub alpha_blend: bool,
    pub cull_back_faces: bool,
}

pub struct Pipeline {
    pub(crate) device_wrapper: Arc<DeviceWrapper>,
    pub(crate) native: vk::Pipeline,
    pub(crate) layout: Arc<PipelineLayout>,
}

impl Pipeline {
    pub fn layout(&self) -> &Arc<PipelineLayout> {
        &self.layout
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        unsafe { self.device_wrapper.native.destroy_pipeline(self.native, None) };
    }
}

struct ShaderModule<'a> {
    device_wrapper: &'a DeviceWrapper,
    native: vk::ShaderModule,
}

impl Drop for ShaderModule<'_> {
    fn drop(&mut self) {
        unsafe { self.device_wrapper.native.destroy_shader_module(self.native, None) };
    }
}

fn create_shader_module<'a>(device_wrapper: &'a DeviceWrapper, spirv: &[u8]) -> Result<ShaderModule<'a>, DeviceError> {
    let code = ash::util::read_spv(&mut Cursor::new(spirv)).map_err(|e| DeviceError::InvalidShader(e.to_string()))?;
    let create_info = vk::ShaderModuleCreateInfo::builder().code(&code);

    Ok(ShaderModule {
        device_wrapper,
        native: unsafe { device_wrapper.native.create_shader_module(&create_info, None)? },
    })
}

impl Device {
    /// Push constants, if any, are visible to both vertex and fragment stages starting at offset 0.
    pub fn create_pipeline_layout(
        &self,
        set_layouts: &[&Arc<DescriptorSetLayout>],
        push_constants_size: u32,
    ) -> Result<Arc<PipelineLayout>, DeviceError> {
        let native_layouts: SmallVec<[vk::DescriptorSetLayout; 4]> = set_layouts.iter().map(|l| l.native).collect();
        let push_ranges = [vk::PushConstantRange {
            stage_flags: vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT,
            offset: 0,
            size: push_constants_size,
        }];

        let mut create_info = vk::PipelineLayoutCreateInfo::builder().set_layouts(&native_layouts);
        if push_constants_size > 0 {
            create_info = create_info.push_constant_ranges(&push_ranges);
        }

        Ok(Arc::new(PipelineLayout {
            device_wrapper: Arc::clone(&self.wrapper),
            native: unsafe { self.wrapper.native.create_pipeline_layout(&create_info, None)? },
            _set_layouts: set_layouts.iter().map(|l| Arc::clone(l)).collect(),
            push_constants_size,
        }))
    }

    pub fn create_graphics_pipeline(&self, desc: &GraphicsPipelineDesc) -> Result<Arc<Pipeline>, DeviceError> {
        let vertex_module = create_shader_module(&self.wrapper, desc.vertex_spirv)?;
        let fragment_module = create_shader_module(&self.wrapper, desc.fragment_spirv)?;

        let stages = [
            vk::PipelineShaderStageCreateInfo::builder()
                .stage(vk::ShaderStageFlags::VERTEX)
                .module(vertex_module.native)
                .name(SHADER_ENTRY)
                .build(),
            vk::PipelineShaderStageCreateInfo::builder()
                .stage(vk::ShaderStageFlags::FRAGMENT)
                .module(fragment_module.native)
                .name(SHADER_ENTRY)
                .build(),
        ];

        let binding_descs: SmallVec<[vk::VertexInputBindingDescription; 4]> = desc
            .vertex_bindings
            .iter()
            .map(|b| vk::VertexInputBindingDescription {
                binding: b.binding,
                stride: b.stride,
                input_rate: if b.per_instance {
                    vk::VertexInputRate::INSTANCE
                } else {
                    vk::VertexInputRate::VERTEX
                },
            })
            .collect();
        let attribute_descs: SmallVec<[vk::VertexInputAttributeDescription; 16]> = desc
            .vertex_bindings
            .iter()
            .flat_map(|b| {
                b.attributes
                    .iter()
                    .map(move |&(location, format, offset)| vk::VertexInputAttributeDescription {
                        location,
                        binding: b.binding,
                        format,
                        offset,
                    })
            })
            .collect();

        let vertex_input = vk::PipelineVertexInputStateCreateInfo::builder()
            .vertex_binding_descriptions(&binding_descs)
            .vertex_attribute_descriptions(&attribute_descs);
        let input_assembly = vk::PipelineInputAssemblyStateCreateInfo::builder().topology(desc.topology);
        let viewport = vk::PipelineViewportStateCreateInfo::builder()
            .viewport_count(1)
            .scissor_count(1);
        let rasterization = vk::PipelineRasterizationStateCreateInfo::builder()
            .polygon_mode(vk::PolygonMode::FILL)
            .cull_mode(if desc.cull_back_faces {
                vk::CullModeFlags::BACK
            } else {
                vk::CullModeFlags::NONE
            })
            .front_face(vk::FrontFace::COUNTER_CLOCKWISE)
            .line_width(1.0);
        let multisample =
            vk::PipelineMultisampleStateCreateInfo::builder().rasterization_samples(vk::SampleCountFlags::TYPE_1);
        let depth_stencil = vk::PipelineDepthStencilStateCreateInfo::builder()
            .depth_test_enable(desc.depth_test)
            .depth_write_enable(desc.depth_write)
            .depth_compare_op(vk::CompareOp::LESS_OR_EQUAL);

        let blend_attachment = vk::PipelineColorBlendAttachmentState::builder()
            .blend_enable(desc.alpha_blend)
            .src_color_blend_factor(vk::BlendFactor::SRC_ALPHA)
            .dst_color_blend_factor(vk::BlendFactor::ONE_MINUS_SRC_ALPHA)
            .color_blend_op(vk::BlendOp::ADD)
            .src_alpha_blend_factor(vk::BlendFactor::ONE)
            .dst_alpha_blend_factor(vk::BlendFactor::ONE_MINUS_SRC_ALPHA)
            .alpha_blend_op(vk::BlendOp::ADD)
            .color_write_mask(vk::ColorComponentFlags::RGBA)
            .build();
        let color_blend =
            vk::PipelineColorBlendStateCreateInfo::builder().attachments(std::slice::from_ref(&blend_attachment));

        let dynamic_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
        let dynamic = vk::PipelineDynamicStateCreateInfo::builder().dynamic_states(&dynamic_states);

        let create_info = vk::GraphicsPipelineCreateInfo::builder()
            .stages(&stages)
            .vertex_input_state(&vertex_input)
            .input_assembly_state(&input_assembly)
            .viewport_state(&viewport)
            .rasterization_state(&rasterization)
            .multisample_state(&multisample)
            .depth_stencil_state(&depth_stencil)
            .color_blend_state(&color_blend)
            .dynamic_state(&dynamic)
            .layout(desc.layout.native)
            .render_pass(desc.render_pass.native)
            .subpass(desc.subpass)
            .build();

        let native = unsafe {
            self.wrapper
                .native
                .create_graphics_pipelines(vk::PipelineCache::null(), std::slice::from_ref(&create_info), None)
                .map_err(|(_, err)| err)?[0]
        };

        Ok(Arc::new(Pipeline {
            device_wrapper: Arc::clone(&self.wrapper),
            native,
            layout: Arc::clone(desc.layout),
        }))
    }
}
