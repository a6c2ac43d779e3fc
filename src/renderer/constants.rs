// renderer/constants.rs
//
// Shader constant register map shared by the application and the shaders in
// `src/shader/`. Registers hold four floats; matrices take four consecutive
// registers, one per column.

use glam::{Mat4, Vec3};

use crate::error::{DemoError, Result};

pub const VECTORS_IN_MATRIX: usize = 4;

// ---- vertex shader registers ----
pub const REG_VIEW_MX: u32 = 0;
/// Start of the per-model block: bone matrices for skinning, radius and
/// morph parameter for morphing, radius for the light source.
pub const REG_MODEL_DATA: u32 = 4;
pub const MODEL_DATA_CAPACITY: usize = 8;
pub const REG_DIFFUSE_COEF: u32 = 14;
pub const REG_AMBIENT_COLOR: u32 = 15;
pub const REG_POINT_COLOR: u32 = 16;
pub const REG_POINT_POSITION: u32 = 17;
pub const REG_ATTENUATION: u32 = 18;
pub const REG_SPECULAR_COEF: u32 = 19;
pub const REG_SPECULAR_F: u32 = 20;
pub const REG_EYE: u32 = 21;
pub const REG_POS_AND_ROT_MX: u32 = 27;
pub const REG_SHADOW_PROJ_MX: u32 = 31;
pub const REG_SHADOW_ATTENUATION: u32 = 35;
pub const REG_FILTER_TEXCOORD_SHIFT: u32 = 40;

// ---- pixel shader registers ----
pub const REG_FILTER: u32 = 0;

// ---- fixed values ----
pub const DIFFUSE_COEF: f32 = 0.7;
pub const AMBIENT_COLOR: [u8; 3] = [20, 20, 20];
pub const POINT_COLOR: [u8; 3] = [204, 204, 100];
pub const BLACK: [u8; 3] = [0, 0, 0];
pub const POINT_POSITION: Vec3 = Vec3::new(0.2, -0.91, 1.5);
pub const ATTENUATION: Vec3 = Vec3::new(1.0, 0.0, 0.3);
pub const SPECULAR_COEF: f32 = 0.4;
pub const SPECULAR_F: f32 = 35.0;
pub const SHADOW_ATTENUATION: Vec3 = Vec3::new(0.8, 0.0, 0.1);
pub const BACKGROUND_COLOR: [u8; 3] = [15, 15, 25];
pub const STENCIL_REF_VALUE: u32 = 50;

pub fn float(f: f32) -> [f32; 4] {
    [f; 4]
}

/// Direction: w = 0.
pub fn vector(v: Vec3) -> [f32; 4] {
    v.extend(0.0).to_array()
}

/// Position: w = 1.
pub fn point(p: Vec3) -> [f32; 4] {
    p.extend(1.0).to_array()
}

pub fn color(rgb: [u8; 3]) -> [f32; 4] {
    [
        rgb[0] as f32 / 255.0,
        rgb[1] as f32 / 255.0,
        rgb[2] as f32 / 255.0,
        1.0,
    ]
}

pub fn matrix(m: &Mat4) -> [[f32; 4]; VECTORS_IN_MATRIX] {
    m.to_cols_array_2d()
}

/// Fixed-capacity register block that refuses to overflow.
///
/// Variants write their per-model constants through this instead of a raw
/// slice; asking for more room than the block has is an error, never a
/// silent truncation.
#[derive(Debug, Clone)]
pub struct ConstantWriter {
    registers: [[f32; 4]; MODEL_DATA_CAPACITY],
    capacity: usize,
    len: usize,
}

impl ConstantWriter {
    pub fn new() -> Self {
        Self::with_capacity(MODEL_DATA_CAPACITY)
    }

    /// A writer limited to `capacity` registers (clamped to the block size).
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            registers: [[0.0; 4]; MODEL_DATA_CAPACITY],
            capacity: capacity.min(MODEL_DATA_CAPACITY),
            len: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Fails before writing anything if `needed` registers do not fit.
    pub fn reserve(&self, needed: usize) -> Result<()> {
        if self.len + needed > self.capacity {
            return Err(DemoError::ConstantBudgetExceeded {
                needed: self.len + needed,
                capacity: self.capacity,
            });
        }
        Ok(())
    }

    pub fn push(&mut self, value: [f32; 4]) -> Result<()> {
        self.reserve(1)?;
        self.registers[self.len] = value;
        self.len += 1;
        Ok(())
    }

    pub fn push_matrix(&mut self, m: &Mat4) -> Result<()> {
        self.reserve(VECTORS_IN_MATRIX)?;
        for column in matrix(m) {
            self.push(column)?;
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn as_slice(&self) -> &[[f32; 4]] {
        &self.registers[..self.len]
    }

    pub fn clear(&mut self) {
        self.len = 0;
    }
}

impl Default for ConstantWriter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writer_rejects_overflow_instead_of_truncating() {
        let mut writer = ConstantWriter::with_capacity(2);
        writer.push(float(1.0)).unwrap();
        let err = writer.push_matrix(&Mat4::IDENTITY).unwrap_err();
        assert!(matches!(
            err,
            DemoError::ConstantBudgetExceeded {
                needed: 5,
                capacity: 2
            }
        ));
        // nothing from the failed matrix was written
        assert_eq!(writer.len(), 1);
    }

    #[test]
    fn two_bone_matrices_fill_the_model_block_exactly() {
        let mut writer = ConstantWriter::new();
        writer.push_matrix(&Mat4::IDENTITY).unwrap();
        writer.push_matrix(&Mat4::IDENTITY).unwrap();
        assert_eq!(writer.len(), MODEL_DATA_CAPACITY);
        assert!(writer.push(float(0.0)).is_err());
    }

    #[test]
    fn model_block_does_not_overlap_lighting_registers() {
        assert!(REG_MODEL_DATA as usize + MODEL_DATA_CAPACITY <= REG_DIFFUSE_COEF as usize);
    }

    #[test]
    fn colors_are_normalized() {
        assert_eq!(color([255, 0, 51]), [1.0, 0.0, 0.2, 1.0]);
    }
}
