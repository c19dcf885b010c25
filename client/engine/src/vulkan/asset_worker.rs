use crate::asset::{mesh, AssetError, TextureCreateArgs};
use crate::render::AssetWorker;
use crate::vulkan::backend::VulkanBackend;
use crate::vulkan::pipelines::ModelVertex;
use crate::vulkan::resources::{VulkanModel, VulkanTexture};
use std::path::Path;
use std::sync::Arc;
use vk_wrapper::{vk, BufferUsageFlags, CmdList, ImageLayout, ImageUsageFlags};

/// Uploads textures and meshes using its own command pool.
pub struct VulkanAssetWorker {
    backend: Arc<VulkanBackend>,
    cmd_list: CmdList,
}

impl VulkanAssetWorker {
    pub(crate) fn new(backend: Arc<VulkanBackend>) -> Result<Self, AssetError> {
        let cmd_list = backend.device().queue().create_primary_cmd_list()?;
        Ok(Self { backend, cmd_list })
    }
}

impl AssetWorker<VulkanBackend> for VulkanAssetWorker {
    fn load_texture(&mut self, path: &Path, args: &TextureCreateArgs) -> Result<VulkanTexture, AssetError> {
        let device = self.backend.device();
        let pixels = image::open(path)?.into_rgba8();
        let size = pixels.dimensions();

        let mut staging = device.create_host_buffer::<u8>(BufferUsageFlags::TRANSFER_SRC, pixels.len() as u64)?;
        staging.write(0, pixels.as_raw());

        let image = device.create_image_2d(
            vk::Format::R8G8B8A8_SRGB,
            ImageUsageFlags::TRANSFER_DST | ImageUsageFlags::SAMPLED,
            size,
        )?;

        let cl = &mut self.cmd_list;
        cl.reset(false)?;
        cl.begin(true)?;
        cl.barrier_image(
            &image,
            vk::PipelineStageFlags::TOP_OF_PIPE,
            vk::PipelineStageFlags::TRANSFER,
            ImageLayout::UNDEFINED,
            ImageLayout::TRANSFER_DST,
        );
        cl.copy_buffer_to_image(staging.raw(), &image);
        cl.barrier_image(
            &image,
            vk::PipelineStageFlags::TRANSFER,
            vk::PipelineStageFlags::FRAGMENT_SHADER,
            ImageLayout::TRANSFER_DST,
            ImageLayout::SHADER_READ,
        );
        cl.end()?;

        device.queue().submit_and_wait(cl)?;

        let view = Arc::new(image.create_view()?);
        let sampler = Arc::clone(self.backend.sampler(args));
        let descriptor = self.backend.descriptors().create_texture_set(&view, &sampler)?;

        Ok(VulkanTexture {
            view,
            sampler,
            descriptor,
            size,
        })
    }

    fn load_model(&mut self, path: &Path) -> Result<VulkanModel, AssetError> {
        let device = self.backend.device();
        let mesh = mesh::load_glb_file(path)?;

        let vertices: Vec<ModelVertex> = mesh
            .positions
            .iter()
            .zip(&mesh.normals)
            .zip(&mesh.tex_coords)
            .map(|((position, normal), uv)| ModelVertex {
                position: *position,
                normal: *normal,
                uv: *uv,
            })
            .collect();

        let mut vertex_buffer =
            device.create_host_buffer::<ModelVertex>(BufferUsageFlags::VERTEX, vertices.len() as u64)?;
        vertex_buffer.write(0, &vertices);

        let mut index_buffer = device.create_host_buffer::<u32>(BufferUsageFlags::INDEX, mesh.indices.len() as u64)?;
        index_buffer.write(0, &mesh.indices);

        Ok(VulkanModel {
            vertices: vertex_buffer,
            indices: index_buffer,
            index_count: mesh.indices.len() as u32,
        })
    }
}
