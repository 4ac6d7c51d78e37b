//! Generic triangle mesh resource
//!
//! Mesh loaders decode their format into [`MeshAttributes`] and hand them to
//! [`MeshResource::from_attributes`], which flattens them into one
//! interleaved vertex stream and fills in defaults for missing attributes.

use std::any::Any;

use super::{Resource, ResourceKey};
use crate::error::{ResourceError, Result};

/// Floats per interleaved vertex: position (3), normal (3), uv (2)
pub const FLOATS_PER_VERTEX: usize = 8;

/// Normal written when the source has none
pub const DEFAULT_NORMAL: [f32; 3] = [1.0, 1.0, 0.0];

/// Texture coordinate written when the source has none
pub const DEFAULT_TEX_COORD: [f32; 2] = [0.0, 0.0];

/// One face corner, indexing into the attribute streams
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Corner {
    pub position: u32,
    pub normal: Option<u32>,
    pub tex_coord: Option<u32>,
}

/// Decoded, still-indexed mesh attributes
#[derive(Debug, Clone, Default)]
pub struct MeshAttributes {
    pub positions: Vec<[f32; 3]>,
    pub normals: Vec<[f32; 3]>,
    pub tex_coords: Vec<[f32; 2]>,
    pub corners: Vec<Corner>,
}

/// Triangle mesh ready for upload
///
/// The vertices are stored as a flat `Vec<f32>` with the following layout:
/// `[pos_x, pos_y, pos_z, norm_x, norm_y, norm_z, u, v, ...]`.
/// Every corner becomes its own vertex, so indices are sequential.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshResource {
    vertices: Vec<f32>,
    indices: Vec<u32>,
    guid: ResourceKey,
}

impl MeshResource {
    /// Flatten decoded attributes into an interleaved mesh
    ///
    /// Missing positions are reported as an error in the log, missing
    /// normals or texture coordinates as a warning; both are replaced with
    /// defaults. A corner pointing outside its attribute stream fails the
    /// decode.
    pub fn from_attributes(
        path: &str,
        guid: ResourceKey,
        attributes: &MeshAttributes,
    ) -> Result<Self> {
        if attributes.positions.is_empty() {
            log::error!("Couldn't find any vertex positions in {path}");
        }
        if attributes.normals.is_empty() {
            log::warn!("Couldn't find any vertex normals in {path}");
        }
        if attributes.tex_coords.is_empty() {
            log::warn!("Couldn't find any vertex UVs in {path}");
        }

        let count = attributes.corners.len();
        let mut vertices = Vec::with_capacity(count * FLOATS_PER_VERTEX);
        let mut indices = Vec::with_capacity(count);

        for (i, corner) in attributes.corners.iter().enumerate() {
            let position = fetch(&attributes.positions, Some(corner.position), path, "position")?;
            vertices.extend_from_slice(&position.unwrap_or_default());

            let normal = if attributes.normals.is_empty() {
                DEFAULT_NORMAL
            } else {
                fetch(&attributes.normals, corner.normal, path, "normal")?.unwrap_or(DEFAULT_NORMAL)
            };
            vertices.extend_from_slice(&normal);

            let tex_coord = if attributes.tex_coords.is_empty() {
                DEFAULT_TEX_COORD
            } else {
                match fetch(&attributes.tex_coords, corner.tex_coord, path, "uv")? {
                    // Flip v into top-left origin
                    Some([u, v]) => [u, 1.0 - v],
                    None => DEFAULT_TEX_COORD,
                }
            };
            vertices.extend_from_slice(&tex_coord);

            indices.push(i as u32);
        }

        Ok(Self {
            vertices,
            indices,
            guid,
        })
    }

    /// Interleaved vertex data
    pub fn vertices(&self) -> &[f32] {
        &self.vertices
    }

    /// Index data
    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    /// Number of vertices
    pub fn vertex_count(&self) -> usize {
        self.vertices.len() / FLOATS_PER_VERTEX
    }

    /// Number of indices
    pub fn index_count(&self) -> usize {
        self.indices.len()
    }
}

fn fetch<T: Copy>(stream: &[T], index: Option<u32>, path: &str, what: &str) -> Result<Option<T>> {
    match index {
        None => Ok(None),
        Some(i) => stream.get(i as usize).copied().map(Some).ok_or_else(|| {
            ResourceError::decode(
                path,
                format!("{what} index {i} out of range ({} available)", stream.len()),
            )
        }),
    }
}

impl Resource for MeshResource {
    fn size_cpu(&self) -> u64 {
        std::mem::size_of::<Self>() as u64
    }

    fn size_gpu(&self) -> u64 {
        (self.vertices.len() * std::mem::size_of::<f32>()
            + self.indices.len() * std::mem::size_of::<u32>()) as u64
    }

    fn guid(&self) -> Option<u64> {
        Some(self.guid)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
