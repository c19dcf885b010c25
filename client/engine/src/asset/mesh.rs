use common::glm::{Vec2, Vec3};
use gltf::mesh::util::ReadIndices;
use std::path::Path;
use std::{fmt, fs, io};

#[derive(Debug)]
pub enum MeshLoadError {
    Io(io::Error),
    InvalidData(gltf::Error),
    FileNotBinary,
    NoMeshes,
    NoPrimitivesInMesh,
    NoPositions,
}

impl fmt::Display for MeshLoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MeshLoadError::Io(e) => write!(f, "{}", e),
            MeshLoadError::InvalidData(e) => write!(f, "invalid glTF: {}", e),
            MeshLoadError::FileNotBinary => write!(f, "not a binary glTF file"),
            MeshLoadError::NoMeshes => write!(f, "file contains no meshes"),
            MeshLoadError::NoPrimitivesInMesh => write!(f, "mesh has no primitives"),
            MeshLoadError::NoPositions => write!(f, "primitive has no positions"),
        }
    }
}

impl std::error::Error for MeshLoadError {}

/// Indexed triangle list with per-vertex attributes of equal length.
pub struct MeshData {
    pub positions: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    pub tex_coords: Vec<Vec2>,
    pub indices: Vec<u32>,
}

/// Loads the first primitive of the first mesh of a `.glb` file.
/// Missing normals and texture coordinates are zero-filled, missing indices are generated.
pub fn load_glb(file_data: &[u8]) -> Result<MeshData, MeshLoadError> {
    let file = gltf::Gltf::from_slice(file_data).map_err(MeshLoadError::InvalidData)?;
    let raw_data = file.blob.as_deref().ok_or(MeshLoadError::FileNotBinary)?;

    let mesh = file.meshes().next().ok_or(MeshLoadError::NoMeshes)?;
    let primitive = mesh.primitives().next().ok_or(MeshLoadError::NoPrimitivesInMesh)?;
    let reader = primitive.reader(|_| Some(raw_data));

    let positions: Vec<Vec3> = reader
        .read_positions()
        .ok_or(MeshLoadError::NoPositions)
        .map(|iter| iter.map(Vec3::from).collect())?;
    let n_vertices = positions.len();

    let normals: Vec<Vec3> = reader
        .read_normals()
        .map(|iter| iter.map(Vec3::from).collect())
        .unwrap_or_else(|| vec![Vec3::zeros(); n_vertices]);

    let tex_coords: Vec<Vec2> = reader
        .read_tex_coords(0)
        .map(|coords| coords.into_f32().map(Vec2::from).collect())
        .unwrap_or_else(|| vec![Vec2::zeros(); n_vertices]);

    let indices: Vec<u32> = match reader.read_indices() {
        Some(ReadIndices::U8(iter)) => iter.map(|v| v as u32).collect(),
        Some(ReadIndices::U16(iter)) => iter.map(|v| v as u32).collect(),
        Some(ReadIndices::U32(iter)) => iter.collect(),
        None => (0..n_vertices as u32).collect(),
    };

    Ok(MeshData {
        positions,
        normals,
        tex_coords,
        indices,
    })
}

pub fn load_glb_file(path: &Path) -> Result<MeshData, MeshLoadError> {
    let data = fs::read(path).map_err(MeshLoadError::Io)?;
    load_glb(&data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_gltf_is_rejected() {
        let json = br#"{"asset":{"version":"2.0"}}"#;
        assert!(matches!(load_glb(json), Err(MeshLoadError::FileNotBinary)));
    }

    #[test]
    fn garbage_is_invalid_data() {
        assert!(matches!(load_glb(b"\x00\x01garbage"), Err(MeshLoadError::InvalidData(_))));
    }
}
