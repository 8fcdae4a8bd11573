// Math primitives for the vmap pipeline
// Covers the small G3D subset the C++ tools use: 3-float vectors,
// axis-aligned boxes and Euler rotation matrices, plus the little-endian
// on-disk encoding of vectors shared by every vmap file format.

use std::io::{Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn min(self, other: Self) -> Self {
        Self::new(self.x.min(other.x), self.y.min(other.y), self.z.min(other.z))
    }

    pub fn max(self, other: Self) -> Self {
        Self::new(self.x.max(other.x), self.y.max(other.y), self.z.max(other.z))
    }

    pub fn add(self, other: Self) -> Self {
        Self::new(self.x + other.x, self.y + other.y, self.z + other.z)
    }

    pub fn sub(self, other: Self) -> Self {
        Self::new(self.x - other.x, self.y - other.y, self.z - other.z)
    }

    pub fn scale(self, s: f32) -> Self {
        Self::new(self.x * s, self.y * s, self.z * s)
    }

    /// Component by axis index (0 = x, 1 = y, 2 = z).
    pub fn axis(self, axis: usize) -> f32 {
        match axis {
            0 => self.x,
            1 => self.y,
            _ => self.z,
        }
    }

    pub fn set_axis(&mut self, axis: usize, value: f32) {
        match axis {
            0 => self.x = value,
            1 => self.y = value,
            _ => self.z = value,
        }
    }

    pub fn read_from<R: Read>(reader: &mut R) -> std::io::Result<Self> {
        let x = reader.read_f32::<LittleEndian>()?;
        let y = reader.read_f32::<LittleEndian>()?;
        let z = reader.read_f32::<LittleEndian>()?;
        Ok(Self::new(x, y, z))
    }

    pub fn write_to<W: Write>(self, writer: &mut W) -> std::io::Result<()> {
        writer.write_f32::<LittleEndian>(self.x)?;
        writer.write_f32::<LittleEndian>(self.y)?;
        writer.write_f32::<LittleEndian>(self.z)?;
        Ok(())
    }
}

/// Axis-aligned bounding box. A default box is the zero box at the origin;
/// growing one from geometry starts from `from_point`.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct AaBox {
    pub min: Vec3,
    pub max: Vec3,
}

impl AaBox {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    pub fn from_point(p: Vec3) -> Self {
        Self { min: p, max: p }
    }

    pub fn merge(&mut self, p: Vec3) {
        self.min = self.min.min(p);
        self.max = self.max.max(p);
    }

    /// Box translated by `v`.
    pub fn add(self, v: Vec3) -> Self {
        Self {
            min: self.min.add(v),
            max: self.max.add(v),
        }
    }

    pub fn read_from<R: Read>(reader: &mut R) -> std::io::Result<Self> {
        let min = Vec3::read_from(reader)?;
        let max = Vec3::read_from(reader)?;
        Ok(Self { min, max })
    }

    pub fn write_to<W: Write>(self, writer: &mut W) -> std::io::Result<()> {
        self.min.write_to(writer)?;
        self.max.write_to(writer)?;
        Ok(())
    }
}

/// Row-major 3x3 rotation matrix.
#[derive(Clone, Copy, Debug)]
pub struct Matrix3 {
    rows: [[f32; 3]; 3],
}

impl Matrix3 {
    /// Rotation from Euler angles (radians) applied in Z, then Y, then X
    /// order, matching the placement rotation convention of the map data.
    pub fn from_euler_zyx(z: f32, y: f32, x: f32) -> Self {
        let (sz, cz) = z.sin_cos();
        let (sy, cy) = y.sin_cos();
        let (sx, cx) = x.sin_cos();

        Self {
            rows: [
                [cy * cz, cz * sx * sy - cx * sz, cx * cz * sy + sx * sz],
                [cy * sz, cx * cz + sx * sy * sz, -cz * sx + cx * sy * sz],
                [-sy, cy * sx, cx * cy],
            ],
        }
    }

    pub fn transform(&self, v: Vec3) -> Vec3 {
        let m = &self.rows;
        Vec3::new(
            m[0][0] * v.x + m[0][1] * v.y + m[0][2] * v.z,
            m[1][0] * v.x + m[1][1] * v.y + m[1][2] * v.z,
            m[2][0] * v.x + m[2][1] * v.y + m[2][2] * v.z,
        )
    }
}

pub fn deg_to_rad(value: f32) -> f32 {
    value * std::f32::consts::PI / 180.0
}
