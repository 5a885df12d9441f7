//! GPU upload layout for a consolidated scene.
//!
//! One 80-byte record per primitive plus a flat `u32` neighbor array that
//! each record slices into with `(neighbours_offset, neighbours_count)`.

use crate::geometry::Primitive;

/// Set when the primitive blends with its neighbors.
pub const FLAG_SDF: u32 = 1;
/// Set when `user_data` carries a value.
pub const FLAG_USER_DATA: u32 = 1 << 1;

// ── Packed record (must match the shader layout exactly) ──

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct PackedPrimitive {
    // Geometry (3 × vec4 = 48 bytes)
    pub p0: [f32; 3],
    pub r0: f32,
    pub p1: [f32; 3],
    pub r1: f32,
    pub displacement: [f32; 3],
    pub kind: u32,
    // Tags (2 × vec4 = 32 bytes)
    pub material_id: u32,
    pub group_id: u32,
    pub neighbours_offset: u32,
    pub neighbours_count: u32,
    /// Low and high words
    pub user_data: [u32; 2],
    pub flags: u32,
    pub _pad: u32,
}

impl PackedPrimitive {
    pub fn pack(primitive: &Primitive, neighbours_offset: u32, neighbours_count: u32) -> Self {
        let (p0, p1) = primitive.shape.endpoints();
        let (r0, r1) = primitive.shape.radii();
        let mut flags = 0;
        if primitive.is_sdf() {
            flags |= FLAG_SDF;
        }
        let user_data = match primitive.user_data {
            Some(v) => {
                flags |= FLAG_USER_DATA;
                [v as u32, (v >> 32) as u32]
            }
            None => [0, 0],
        };
        Self {
            p0: p0.to_array(),
            r0,
            p1: p1.to_array(),
            r1,
            displacement: primitive.shape.displacement(),
            kind: primitive.kind() as u32,
            material_id: primitive.material_id as u32,
            group_id: primitive.group_id,
            neighbours_offset,
            neighbours_count,
            user_data,
            flags,
            _pad: 0,
        }
    }

    pub fn user_data(&self) -> Option<u64> {
        (self.flags & FLAG_USER_DATA != 0)
            .then(|| u64::from(self.user_data[0]) | (u64::from(self.user_data[1]) << 32))
    }
}

/// Packed copy of a scene, ready for buffer upload.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PackedScene {
    pub primitives: Vec<PackedPrimitive>,
    pub neighbours: Vec<u32>,
}

impl PackedScene {
    pub fn primitive_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.primitives)
    }

    /// Neighbor indices of the primitive at `index`.
    pub fn neighbours_of(&self, index: usize) -> &[u32] {
        let Some(p) = self.primitives.get(index) else {
            return &[];
        };
        let start = p.neighbours_offset as usize;
        let end = start + p.neighbours_count as usize;
        self.neighbours.get(start..end).unwrap_or(&[])
    }
}
