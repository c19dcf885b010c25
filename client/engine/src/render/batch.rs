use common::glm::{Mat4, Vec2, Vec3, Vec4};

/// Instances of one model sharing one texture.
#[derive(Clone, Debug, Default)]
pub struct ModelBatch {
    pub model_id: u32,
    pub texture_id: u32,
    pub positions: Vec<Vec3>,
}

/// Screen-space sprites, or camera-facing billboards when passed to `draw_billboards`.
#[derive(Clone, Debug, Default)]
pub struct SpriteBatch {
    pub texture_id: u32,
    pub positions: Vec<Vec3>,
    pub sizes: Vec<Vec2>,
}

#[derive(Clone, Debug, Default)]
pub struct SpineSpriteBatch {
    pub spine_id: u32,
    pub texture_id: u32,
    pub positions: Vec<Vec3>,
    pub sizes: Vec<Vec2>,
}

#[derive(Clone, Debug, Default)]
pub struct GlyphBatch {
    pub texture_id: u32,
    pub positions: Vec<Vec3>,
    pub sizes: Vec<Vec2>,
    pub fg_colors: Vec<Vec4>,
    pub bg_colors: Vec<Vec4>,
    /// Per-glyph `(u0, v0, u1, v1)` rectangle inside the font texture.
    /// Empty means every glyph samples the whole texture.
    pub uv_rects: Vec<Vec4>,
}

impl ModelBatch {
    pub fn instance_count(&self) -> usize {
        self.positions.len()
    }
}

impl SpriteBatch {
    pub fn instance_count(&self) -> usize {
        self.positions.len().min(self.sizes.len())
    }
}

impl SpineSpriteBatch {
    pub fn instance_count(&self) -> usize {
        self.positions.len().min(self.sizes.len())
    }
}

impl GlyphBatch {
    pub fn instance_count(&self) -> usize {
        let n = self
            .positions
            .len()
            .min(self.sizes.len())
            .min(self.fg_colors.len())
            .min(self.bg_colors.len());
        if self.uv_rects.is_empty() {
            n
        } else {
            n.min(self.uv_rects.len())
        }
    }
}

/// Per-frame uniform block, laid out as the shaders expect it.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameUniforms {
    pub view: Mat4,
    pub proj: Mat4,
    pub ortho_view: Mat4,
    pub ortho_proj: Mat4,
}

impl Default for FrameUniforms {
    fn default() -> Self {
        Self {
            view: Mat4::identity(),
            proj: Mat4::identity(),
            ortho_view: Mat4::identity(),
            ortho_proj: Mat4::identity(),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TaskKind {
    UpdateUniforms,
    Models,
    Billboards,
    Sprites,
    Glyphs,
    Spines,
}

/// One unit of per-frame work, consumed by exactly one render worker.
#[derive(Clone, Debug)]
pub enum RenderTask {
    UpdateUniforms(FrameUniforms),
    Models(Vec<ModelBatch>),
    Billboards(Vec<SpriteBatch>),
    Sprites(Vec<SpriteBatch>),
    Glyphs(Vec<GlyphBatch>),
    Spines(Vec<SpineSpriteBatch>),
}

impl RenderTask {
    pub fn kind(&self) -> TaskKind {
        match self {
            RenderTask::UpdateUniforms(_) => TaskKind::UpdateUniforms,
            RenderTask::Models(_) => TaskKind::Models,
            RenderTask::Billboards(_) => TaskKind::Billboards,
            RenderTask::Sprites(_) => TaskKind::Sprites,
            RenderTask::Glyphs(_) => TaskKind::Glyphs,
            RenderTask::Spines(_) => TaskKind::Spines,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn glyph_instance_count_is_shortest_array() {
        let batch = GlyphBatch {
            texture_id: 0,
            positions: vec![Vec3::zeros(); 4],
            sizes: vec![Vec2::zeros(); 4],
            fg_colors: vec![Vec4::zeros(); 3],
            bg_colors: vec![Vec4::zeros(); 4],
            uv_rects: vec![],
        };
        assert_eq!(batch.instance_count(), 3);

        let batch = GlyphBatch {
            uv_rects: vec![Vec4::zeros(); 2],
            ..batch
        };
        assert_eq!(batch.instance_count(), 2);
    }

    #[test]
    fn frame_uniforms_are_four_packed_matrices() {
        assert_eq!(std::mem::size_of::<FrameUniforms>(), 4 * 16 * 4);
    }
}
