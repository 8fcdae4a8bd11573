// Model spawns and per-map spawn bookkeeping
// A spawn is one placed instance of a named model; the extractor dumps all
// of them into dir_bin as a flat record stream, keyed by map and tile.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use vmap_shared::math::{AaBox, Vec3};

use crate::bih::HasBounds;
use crate::config::AssemblerConfig;
use crate::error::{AssembleError, Result};

/// Spawn flag bits, shared with the extractor and the runtime loader.
pub const MOD_M2: u32 = 1;
pub const MOD_WORLDSPAWN: u32 = 1 << 1;
pub const MOD_HAS_BOUND: u32 = 1 << 2;

/// Grid coordinate reserved for spawns not tied to any terrain tile.
pub const GLOBAL_TILE_COORD: u32 = 65;

/// Placement dump produced by the extractor.
pub const DIR_BIN: &str = "dir_bin";

pub fn pack_tile_id(tile_x: u32, tile_y: u32) -> u32 {
    (tile_x << 16) | tile_y
}

pub fn unpack_tile_id(tile_id: u32) -> (u32, u32) {
    (tile_id >> 16, tile_id & 0xFFFF)
}

pub fn global_tile_id() -> u32 {
    pack_tile_id(GLOBAL_TILE_COORD, GLOBAL_TILE_COORD)
}

/// One placed model instance. `bound` is world-space and valid only when
/// MOD_HAS_BOUND is set; it is filled in exactly once, either by the
/// extractor or by the bound pass of the assembler.
#[derive(Clone, Debug)]
pub struct ModelSpawn {
    pub id: u32,
    pub flags: u32,
    pub pos: Vec3,
    /// Euler rotation in degrees, applied Z, then Y, then X
    pub rot: Vec3,
    pub scale: f32,
    pub bound: Option<AaBox>,
    pub name: String,
}

impl ModelSpawn {
    /// Read one placement record. The bound words are always present in
    /// the stream; they carry data only when MOD_HAS_BOUND is set.
    pub fn read_from<R: Read>(reader: &mut R, max_name_length: u32) -> Result<Self> {
        let id = reader.read_u32::<LittleEndian>()?;
        let flags = reader.read_u32::<LittleEndian>()?;
        let pos = Vec3::read_from(reader)?;
        let rot = Vec3::read_from(reader)?;
        let scale = reader.read_f32::<LittleEndian>()?;
        let bound_words = AaBox::read_from(reader)?;
        let bound = ((flags & MOD_HAS_BOUND) != 0).then_some(bound_words);

        let name_len = reader.read_u32::<LittleEndian>()?;
        if name_len > max_name_length {
            return Err(AssembleError::format(format!(
                "spawn {} name length {} exceeds limit {}",
                id, name_len, max_name_length
            )));
        }
        let mut name_buf = vec![0u8; name_len as usize];
        reader.read_exact(&mut name_buf)?;
        let name = String::from_utf8_lossy(&name_buf).into_owned();

        Ok(Self {
            id,
            flags,
            pos,
            rot,
            scale,
            bound,
            name,
        })
    }

    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_u32::<LittleEndian>(self.id)?;
        writer.write_u32::<LittleEndian>(self.flags)?;
        self.pos.write_to(writer)?;
        self.rot.write_to(writer)?;
        writer.write_f32::<LittleEndian>(self.scale)?;
        self.bound.unwrap_or_default().write_to(writer)?;
        writer.write_u32::<LittleEndian>(self.name.len() as u32)?;
        writer.write_all(self.name.as_bytes())?;
        Ok(())
    }
}

impl HasBounds for ModelSpawn {
    fn bounds(&self) -> AaBox {
        self.bound.unwrap_or_default()
    }
}

/// All placements of one map. Spawn ids are unique per map; a spawn that
/// spans several tiles appears once in `unique_entries` and once per tile
/// in `tile_entries`.
#[derive(Debug, Default)]
pub struct MapSpawns {
    pub unique_entries: BTreeMap<u32, ModelSpawn>,
    pub tile_entries: Vec<(u32, u32)>,
}

impl MapSpawns {
    pub fn insert(&mut self, tile_id: u32, spawn: ModelSpawn) {
        let spawn_id = spawn.id;
        // duplicate ids keep the latest record
        self.unique_entries.insert(spawn_id, spawn);
        self.tile_entries.push((tile_id, spawn_id));
    }

    pub fn has_global_spawns(&self) -> bool {
        self.tile_entries
            .iter()
            .any(|(tile_id, _)| *tile_id == global_tile_id())
    }
}

/// Read the placement dump and group it per map. The stream is a flat
/// repetition of {map, tile_x, tile_y, record}; end-of-file at the leading
/// map id is the normal termination, anywhere else it is corruption.
pub fn read_map_spawns(
    raw_dir: &Path,
    config: &AssemblerConfig,
) -> Result<BTreeMap<u32, MapSpawns>> {
    let path = raw_dir.join(DIR_BIN);
    let file = File::open(&path).map_err(|err| AssembleError::file_open(&path, err))?;
    let mut reader = BufReader::new(file);

    let mut map_data: BTreeMap<u32, MapSpawns> = BTreeMap::new();
    loop {
        let map_id = match reader.read_u32::<LittleEndian>() {
            Ok(value) => value,
            Err(err) if err.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(err) => return Err(err.into()),
        };
        let tile_x = reader.read_u32::<LittleEndian>()?;
        let tile_y = reader.read_u32::<LittleEndian>()?;
        let spawn = ModelSpawn::read_from(&mut reader, config.max_name_length)?;

        map_data
            .entry(map_id)
            .or_default()
            .insert(pack_tile_id(tile_x, tile_y), spawn);
    }

    Ok(map_data)
}
