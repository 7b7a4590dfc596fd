use glam::Vec3;
use sha2::{Digest, Sha256};
use std::fmt;

/// Content-addressed mesh ID computed from the geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MeshId(pub u64);

/// Triangle geometry with a flat base colour.
///
/// Immutable once built so the ID stays valid.
#[derive(Clone)]
pub struct Mesh {
    id: MeshId,
    positions: Vec<Vec3>,
    normals: Vec<Vec3>,
    indices: Vec<u32>,
    base_color: [f32; 4],
    double_sided: bool,
}

impl Mesh {
    /// Build a mesh. Missing normals fall back to +Y; an empty index list means
    /// the positions are drawn in order.
    pub fn new(
        positions: Vec<Vec3>,
        normals: Vec<Vec3>,
        indices: Vec<u32>,
        base_color: [f32; 4],
    ) -> Self {
        let normals = if normals.len() == positions.len() {
            normals
        } else {
            vec![Vec3::Y; positions.len()]
        };
        let indices = if indices.is_empty() {
            (0..positions.len() as u32).collect()
        } else {
            indices
        };
        let id = content_hash(&positions, &normals, &indices, &base_color);
        Self {
            id,
            positions,
            normals,
            indices,
            base_color,
            double_sided: false,
        }
    }

    /// Mark both faces of every triangle as visible.
    pub fn with_double_sided(mut self, double_sided: bool) -> Self {
        self.double_sided = double_sided;
        self
    }

    pub fn id(&self) -> MeshId {
        self.id
    }

    pub fn positions(&self) -> &[Vec3] {
        &self.positions
    }

    pub fn normals(&self) -> &[Vec3] {
        &self.normals
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    pub fn base_color(&self) -> [f32; 4] {
        self.base_color
    }

    pub fn is_double_sided(&self) -> bool {
        self.double_sided
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

impl fmt::Debug for Mesh {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mesh")
            .field("id", &self.id)
            .field("vertices", &self.positions.len())
            .field("indices", &self.indices.len())
            .field("double_sided", &self.double_sided)
            .finish()
    }
}

fn content_hash(positions: &[Vec3], normals: &[Vec3], indices: &[u32], color: &[f32; 4]) -> MeshId {
    let mut hasher = Sha256::new();
    for v in positions.iter().chain(normals) {
        for c in v.to_array() {
            hasher.update(c.to_le_bytes());
        }
    }
    for i in indices {
        hasher.update(i.to_le_bytes());
    }
    for c in color {
        hasher.update(c.to_le_bytes());
    }
    let result = hasher.finalize();
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&result[..8]);
    MeshId(u64::from_le_bytes(bytes))
}

/// Unit cube centred on the origin with per-face normals. Handy for tests and demos.
pub fn cube(half_extent: f32, base_color: [f32; 4]) -> Mesh {
    let p = half_extent;
    #[rustfmt::skip]
    let faces: [(Vec3, [Vec3; 4]); 6] = [
        (Vec3::Z, [Vec3::new(-p, -p, p), Vec3::new(p, -p, p), Vec3::new(p, p, p), Vec3::new(-p, p, p)]),
        (Vec3::NEG_Z, [Vec3::new(p, -p, -p), Vec3::new(-p, -p, -p), Vec3::new(-p, p, -p), Vec3::new(p, p, -p)]),
        (Vec3::X, [Vec3::new(p, -p, p), Vec3::new(p, -p, -p), Vec3::new(p, p, -p), Vec3::new(p, p, p)]),
        (Vec3::NEG_X, [Vec3::new(-p, -p, -p), Vec3::new(-p, -p, p), Vec3::new(-p, p, p), Vec3::new(-p, p, -p)]),
        (Vec3::Y, [Vec3::new(-p, p, p), Vec3::new(p, p, p), Vec3::new(p, p, -p), Vec3::new(-p, p, -p)]),
        (Vec3::NEG_Y, [Vec3::new(-p, -p, -p), Vec3::new(p, -p, -p), Vec3::new(p, -p, p), Vec3::new(-p, -p, p)]),
    ];
    let mut positions = Vec::with_capacity(24);
    let mut normals = Vec::with_capacity(24);
    let mut indices = Vec::with_capacity(36);
    for (normal, corners) in faces {
        let base = positions.len() as u32;
        positions.extend(corners);
        normals.extend([normal; 4]);
        indices.extend([base, base + 1, base + 2, base + 2, base + 3, base]);
    }
    Mesh::new(positions, normals, indices, base_color)
}
