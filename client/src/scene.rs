use common::glm::{self, Mat4, Vec2, Vec3, Vec4};
use common::log::{info, warn};
use engine::asset::{AssetError, AssetFuture, AssetManager, ModelInfo, TextureCreateArgs, TextureFilter, TextureInfo};
use engine::render::{GlyphBatch, ModelBatch, RenderBackend, SpriteBatch};
use engine::{FrameStatus, RenderError, Renderer};
use image::{Rgba, RgbaImage};
use std::env;
use std::path::PathBuf;
use std::time::Instant;

const CHECKER_SIZE: u32 = 64;
const CHECKER_CELL: u32 = 8;

/// Generates the demo texture so the binary runs without resource files.
fn write_checker_texture() -> Result<PathBuf, AssetError> {
    let img = RgbaImage::from_fn(CHECKER_SIZE, CHECKER_SIZE, |x, y| {
        if (x / CHECKER_CELL + y / CHECKER_CELL) % 2 == 0 {
            Rgba([230, 230, 230, 255])
        } else {
            Rgba([60, 90, 160, 255])
        }
    });
    let path = env::temp_dir().join("frame-pipeline-checker.png");
    img.save(&path)?;
    Ok(path)
}

/// Vulkan clip space has Y pointing down.
pub fn perspective(aspect: f32) -> Mat4 {
    let mut proj = glm::perspective_rh_zo(aspect, 60f32.to_radians(), 0.1, 100.0);
    proj[(1, 1)] *= -1.0;
    proj
}

/// Pixel coordinates with the origin in the top-left corner.
pub fn screen_ortho(width: f32, height: f32) -> Mat4 {
    glm::ortho_rh_zo(0.0, width, 0.0, height, -1.0, 1.0)
}

pub fn orbit_view(time: f32) -> Mat4 {
    let eye = Vec3::new(6.0 * time.cos(), 3.0, 6.0 * time.sin());
    glm::look_at_rh(&eye, &Vec3::zeros(), &Vec3::y())
}

pub struct Scene {
    texture_id: u32,
    texture_future: Option<AssetFuture<TextureInfo>>,
    texture_ready: bool,
    model_id: Option<u32>,
    model_future: Option<AssetFuture<ModelInfo>>,
    model_ready: bool,
    started: Instant,
}

impl Scene {
    pub fn load<B: RenderBackend>(assets: &AssetManager<B>, model_path: Option<&str>) -> Result<Self, AssetError> {
        let texture_path = write_checker_texture()?;
        let (texture_id, texture_future) = assets.request_texture(
            texture_path,
            TextureCreateArgs {
                filter: TextureFilter::Nearest,
                repeat: true,
            },
        )?;

        let (model_id, model_future) = match model_path {
            Some(path) => {
                let (id, future) = assets.request_model(path)?;
                (Some(id), Some(future))
            }
            None => (None, None),
        };

        Ok(Self {
            texture_id,
            texture_future: Some(texture_future),
            texture_ready: false,
            model_id,
            model_future,
            model_ready: false,
            started: Instant::now(),
        })
    }

    pub fn poll_assets(&mut self) {
        if let Some(result) = self.texture_future.as_ref().and_then(|f| f.try_get()) {
            self.texture_future = None;
            match result {
                Ok(info) => {
                    info!("Texture {} loaded ({}x{})", info.id, info.width, info.height);
                    self.texture_ready = true;
                }
                Err(err) => warn!("Texture failed to load: {}", err),
            }
        }

        if let Some(result) = self.model_future.as_ref().and_then(|f| f.try_get()) {
            self.model_future = None;
            match result {
                Ok(info) => {
                    info!("Model {} loaded", info.id);
                    self.model_ready = true;
                }
                Err(err) => warn!("Model failed to load: {}", err),
            }
        }
    }

    pub fn render<R: Renderer>(&mut self, renderer: &mut R) -> Result<(), RenderError> {
        if renderer.begin_frame()? != FrameStatus::Busy {
            return Ok(());
        }

        let time = self.started.elapsed().as_secs_f32();
        let aspect = renderer.aspect_ratio();
        let (width, height) = (720.0 * aspect, 720.0);
        renderer.update_frame_uniforms(
            &orbit_view(time * 0.3),
            &perspective(aspect),
            &Mat4::identity(),
            &screen_ortho(width, height),
        );

        if self.texture_ready {
            self.draw(renderer, time);
        }

        renderer.end_frame()
    }

    fn draw<R: Renderer>(&self, renderer: &mut R, time: f32) {
        let texture_id = self.texture_id;

        if let (Some(model_id), true) = (self.model_id, self.model_ready) {
            let positions = (-2..=2)
                .map(|i| Vec3::new(i as f32 * 2.5, 0.0, 0.0))
                .collect();
            renderer.draw_models(vec![ModelBatch {
                model_id,
                texture_id,
                positions,
            }]);
        }

        let billboards: Vec<Vec3> = (0..8)
            .map(|i| {
                let a = i as f32 / 8.0 * std::f32::consts::TAU;
                Vec3::new(3.0 * a.cos(), 1.0 + (time + a).sin() * 0.5, 3.0 * a.sin())
            })
            .collect();
        renderer.draw_billboards(vec![SpriteBatch {
            texture_id,
            sizes: vec![Vec2::new(0.6, 0.6); billboards.len()],
            positions: billboards,
        }]);

        renderer.draw_sprites(vec![SpriteBatch {
            texture_id,
            positions: vec![Vec3::new(16.0, 16.0, 0.0)],
            sizes: vec![Vec2::new(128.0, 128.0)],
        }]);

        let glyphs = 12;
        renderer.draw_glyphs(vec![GlyphBatch {
            texture_id,
            positions: (0..glyphs).map(|i| Vec3::new(160.0 + i as f32 * 20.0, 16.0, 0.0)).collect(),
            sizes: vec![Vec2::new(16.0, 24.0); glyphs],
            fg_colors: vec![Vec4::new(1.0, 0.9, 0.3, 1.0); glyphs],
            bg_colors: vec![Vec4::new(0.0, 0.0, 0.0, 0.5); glyphs],
            uv_rects: vec![],
        }]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn ortho_maps_top_left_to_clip_corner() {
        let proj = screen_ortho(800.0, 600.0);
        let top_left = proj * Vec4::new(0.0, 0.0, 0.0, 1.0);
        let bottom_right = proj * Vec4::new(800.0, 600.0, 0.0, 1.0);

        assert_relative_eq!(top_left.x, -1.0);
        assert_relative_eq!(top_left.y, -1.0);
        assert_relative_eq!(bottom_right.x, 1.0);
        assert_relative_eq!(bottom_right.y, 1.0);
    }

    #[test]
    fn perspective_flips_y() {
        let proj = perspective(1.0);
        let above = proj * Vec4::new(0.0, 1.0, -5.0, 1.0);
        assert!(above.y / above.w < 0.0);
    }

    #[test]
    fn orbit_looks_at_origin() {
        let view = orbit_view(1.3);
        let origin = view * Vec4::new(0.0, 0.0, 0.0, 1.0);
        assert_relative_eq!(origin.x, 0.0, epsilon = 1e-5);
        assert_relative_eq!(origin.y, 0.0, epsilon = 1e-5);
        assert!(origin.z < 0.0);
    }
}
