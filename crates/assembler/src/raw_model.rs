// Raw model file reader
// Parses the intermediate model format the extractor writes next to
// dir_bin: an 8-byte magic, a small header and per-group "GRP "/"INDX"/
// "VERT"(/"LIQU") blocks in fixed order. The format is positional, not
// self-describing, so every tag is asserted in sequence.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt};
use vmap_shared::math::{AaBox, Vec3};

use crate::error::{AssembleError, Result};

pub const RAW_VMAP_MAGIC: &[u8; 8] = b"VMAPs05\0";

/// Cap for any count field read from a raw model before allocating, so a
/// corrupt length word cannot request an unbounded buffer.
const MAX_DECLARED_COUNT: u32 = 0x0100_0000;

#[derive(Clone, Copy, Debug)]
pub struct MeshTriangle {
    pub idx0: u32,
    pub idx1: u32,
    pub idx2: u32,
}

/// Liquid surface of one group: a height grid over tiles_x x tiles_y cells
/// plus one type flag byte per cell. Owned by its group.
#[derive(Clone, Debug)]
pub struct WmoLiquid {
    pub tiles_x: u32,
    pub tiles_y: u32,
    pub corner: Vec3,
    pub liquid_type: u32,
    pub heights: Vec<f32>,
    pub flags: Vec<u8>,
}

impl WmoLiquid {
    pub fn vertex_count(&self) -> u32 {
        (self.tiles_x + 1) * (self.tiles_y + 1)
    }

    /// Write the runtime encoding: tile dims, corner, type, a full
    /// (tiles_x+1)*(tiles_y+1) height grid (zero-padded if the source grid
    /// was short) and one flag byte per tile.
    pub fn write_to<W: std::io::Write>(&self, writer: &mut W) -> Result<()> {
        use byteorder::WriteBytesExt;

        writer.write_u32::<LittleEndian>(self.tiles_x)?;
        writer.write_u32::<LittleEndian>(self.tiles_y)?;
        self.corner.write_to(writer)?;
        writer.write_u32::<LittleEndian>(self.liquid_type)?;
        for i in 0..self.vertex_count() as usize {
            let height = self.heights.get(i).copied().unwrap_or(0.0);
            writer.write_f32::<LittleEndian>(height)?;
        }
        let mut flags = self.flags.clone();
        flags.resize((self.tiles_x * self.tiles_y) as usize, 0);
        writer.write_all(&flags)?;
        Ok(())
    }

    pub fn file_size(&self) -> u32 {
        2 * std::mem::size_of::<u32>() as u32
            + std::mem::size_of::<Vec3>() as u32
            + std::mem::size_of::<u32>() as u32
            + self.vertex_count() * std::mem::size_of::<f32>() as u32
            + self.tiles_x * self.tiles_y
    }
}

#[derive(Clone, Debug)]
pub struct RawGroup {
    pub mogp_flags: u32,
    pub group_wmo_id: u32,
    pub bounds: AaBox,
    pub liquid_flags: u32,
    pub triangles: Vec<MeshTriangle>,
    pub vertices: Vec<Vec3>,
    pub liquid: Option<WmoLiquid>,
}

#[derive(Clone, Debug)]
pub struct RawModel {
    pub root_wmo_id: u32,
    pub groups: Vec<RawGroup>,
}

impl RawModel {
    /// Read a raw model file. Any magic/tag mismatch or short read aborts
    /// the whole file; no partial group list is ever returned.
    pub fn read(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|err| AssembleError::file_open(path, err))?;
        let mut reader = BufReader::new(file);
        Self::read_from(&mut reader)
    }

    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self> {
        let mut magic = [0u8; 8];
        reader.read_exact(&mut magic)?;
        if &magic != RAW_VMAP_MAGIC {
            return Err(AssembleError::format(format!(
                "raw model magic mismatch: {:?}",
                magic
            )));
        }

        // vertex count hint used during extraction, not needed here
        let _vertex_hint = reader.read_u32::<LittleEndian>()?;
        let group_count = checked_len(reader.read_u32::<LittleEndian>()?, "group")?;
        let root_wmo_id = reader.read_u32::<LittleEndian>()?;

        let mut groups = Vec::with_capacity(group_count);
        for _ in 0..group_count {
            groups.push(read_group(reader)?);
        }

        Ok(Self {
            root_wmo_id,
            groups,
        })
    }

    /// Accumulate the model's vertex bound, mapping every vertex through
    /// `transform` first. None when no group has any geometry.
    pub fn accumulate_bounds(&self, transform: impl Fn(Vec3) -> Vec3) -> Option<AaBox> {
        let mut bound: Option<AaBox> = None;
        for group in &self.groups {
            for v in &group.vertices {
                let p = transform(*v);
                match bound.as_mut() {
                    Some(current) => current.merge(p),
                    None => bound = Some(AaBox::from_point(p)),
                }
            }
        }
        bound
    }
}

fn read_group<R: Read>(reader: &mut R) -> Result<RawGroup> {
    let mogp_flags = reader.read_u32::<LittleEndian>()?;
    let group_wmo_id = reader.read_u32::<LittleEndian>()?;
    let bounds = AaBox::read_from(reader)?;
    let liquid_flags = reader.read_u32::<LittleEndian>()?;

    // branch table, reserved
    expect_tag(reader, b"GRP ")?;
    let _block_size = reader.read_i32::<LittleEndian>()?;
    let branches = checked_len(reader.read_u32::<LittleEndian>()?, "branch")?;
    for _ in 0..branches {
        let _ = reader.read_u32::<LittleEndian>()?;
    }

    expect_tag(reader, b"INDX")?;
    let _block_size = reader.read_i32::<LittleEndian>()?;
    let nindexes = checked_len(reader.read_u32::<LittleEndian>()?, "index")?;
    let mut indices = Vec::with_capacity(nindexes);
    for _ in 0..nindexes {
        indices.push(reader.read_u16::<LittleEndian>()?);
    }
    // indices come in triples; a trailing remainder is dropped
    let mut triangles = Vec::with_capacity(indices.len() / 3);
    for chunk in indices.chunks_exact(3) {
        triangles.push(MeshTriangle {
            idx0: chunk[0] as u32,
            idx1: chunk[1] as u32,
            idx2: chunk[2] as u32,
        });
    }

    expect_tag(reader, b"VERT")?;
    let _block_size = reader.read_i32::<LittleEndian>()?;
    let nvectors = checked_len(reader.read_u32::<LittleEndian>()?, "vertex")?;
    let mut vertices = Vec::with_capacity(nvectors);
    for _ in 0..nvectors {
        vertices.push(Vec3::read_from(reader)?);
    }

    let liquid = if (liquid_flags & 1) != 0 {
        Some(read_liquid(reader)?)
    } else {
        None
    };

    Ok(RawGroup {
        mogp_flags,
        group_wmo_id,
        bounds,
        liquid_flags,
        triangles,
        vertices,
        liquid,
    })
}

fn read_liquid<R: Read>(reader: &mut R) -> Result<WmoLiquid> {
    expect_tag(reader, b"LIQU")?;
    let _block_size = reader.read_i32::<LittleEndian>()?;
    let xverts = reader.read_i32::<LittleEndian>()?;
    let yverts = reader.read_i32::<LittleEndian>()?;
    let xtiles = reader.read_i32::<LittleEndian>()?;
    let ytiles = reader.read_i32::<LittleEndian>()?;
    let corner = Vec3::read_from(reader)?;
    let liquid_type = reader.read_i16::<LittleEndian>()?;
    let _pad = reader.read_u16::<LittleEndian>()?;

    let height_count =
        checked_len((xverts.max(0) as i64 * yverts.max(0) as i64).min(u32::MAX as i64) as u32, "liquid height")?;
    let mut heights = Vec::with_capacity(height_count);
    for _ in 0..height_count {
        heights.push(reader.read_f32::<LittleEndian>()?);
    }

    let flag_count =
        checked_len((xtiles.max(0) as i64 * ytiles.max(0) as i64).min(u32::MAX as i64) as u32, "liquid flag")?;
    let mut flags = vec![0u8; flag_count];
    reader.read_exact(&mut flags)?;

    Ok(WmoLiquid {
        tiles_x: xtiles.max(0) as u32,
        tiles_y: ytiles.max(0) as u32,
        corner,
        liquid_type: liquid_type.max(0) as u32,
        heights,
        flags,
    })
}

fn expect_tag<R: Read>(reader: &mut R, expected: &[u8; 4]) -> Result<()> {
    let mut tag = [0u8; 4];
    reader.read_exact(&mut tag)?;
    if &tag != expected {
        return Err(AssembleError::format(format!(
            "block tag mismatch: expected {:?}, got {:?}",
            expected, tag
        )));
    }
    Ok(())
}

fn checked_len(count: u32, what: &str) -> Result<usize> {
    if count > MAX_DECLARED_COUNT {
        return Err(AssembleError::format(format!(
            "{} count {} exceeds sanity limit",
            what, count
        )));
    }
    Ok(count as usize)
}
