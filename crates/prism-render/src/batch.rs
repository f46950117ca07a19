// SPDX-License-Identifier: CEPL-1.0
//! Splits a flat triangle soup into runs that share one material.
use crate::error::{FrameError, Result};

/// De-indexed geometry: three consecutive vertices per triangle.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MeshSource {
    pub positions: Vec<[f32; 3]>,
    pub normals: Vec<[f32; 3]>,
    /// One material id per triangle.
    pub face_materials: Vec<u32>,
}

impl MeshSource {
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn position_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.positions)
    }

    pub fn normal_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.normals)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MaterialDesc {
    pub emissive: [f32; 3],
    pub albedo: [f32; 3],
    pub specular: [f32; 3],
    pub shininess: f32,
    pub metalness: f32,
}

impl Default for MaterialDesc {
    fn default() -> Self {
        Self {
            emissive: [0.0; 3],
            albedo: [0.8; 3],
            specular: [0.5; 3],
            shininess: 32.0,
            metalness: 0.0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MeshBatch {
    pub material: u32,
    pub first_vertex: u32,
    pub vertex_count: u32,
}

/// Groups consecutive triangles with the same material into one draw.
///
/// Non-adjacent runs of one material stay separate draws; the vertex order
/// of the source is never changed.
pub fn split_by_material(mesh: &MeshSource, material_count: usize) -> Result<Vec<MeshBatch>> {
    if mesh.normals.len() != mesh.positions.len() {
        return Err(FrameError::Batch(format!(
            "{} positions but {} normals",
            mesh.positions.len(),
            mesh.normals.len()
        )));
    }
    if mesh.positions.len() != mesh.face_materials.len() * 3 {
        return Err(FrameError::Batch(format!(
            "{} vertices do not form {} triangles",
            mesh.positions.len(),
            mesh.face_materials.len()
        )));
    }

    let mut batches: Vec<MeshBatch> = Vec::new();
    let mut current: Option<u32> = None;
    for (face, &material) in mesh.face_materials.iter().enumerate() {
        if material as usize >= material_count {
            return Err(FrameError::Batch(format!(
                "triangle {face} uses material {material} but only {material_count} exist"
            )));
        }
        match (current, batches.last_mut()) {
            (Some(m), Some(run)) if m == material => run.vertex_count += 3,
            _ => {
                batches.push(MeshBatch {
                    material,
                    first_vertex: face as u32 * 3,
                    vertex_count: 3,
                });
                current = Some(material);
            }
        }
    }
    Ok(batches)
}
