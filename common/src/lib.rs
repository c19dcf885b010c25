pub mod shader_compiler;
pub mod threading;
pub mod types;

pub use log;
pub use memoffset;
pub use nalgebra_glm as glm;
pub use parking_lot;
pub use shader_compiler::compile_shaders;
use std::sync::atomic;

pub const MO_RELAXED: atomic::Ordering = atomic::Ordering::Relaxed;
pub const MO_ACQUIRE: atomic::Ordering = atomic::Ordering::Acquire;
pub const MO_RELEASE: atomic::Ordering = atomic::Ordering::Release;
