// Map tree and tile file writer
// One .vmtree per map (spawn tree + global spawns) and one .vmtile per
// non-empty terrain tile (tile spawns + their leaf positions in the map
// tree). The leaf position lookup is what lets the runtime patch tree
// leaves in and out as tiles stream.

use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use byteorder::{LittleEndian, WriteBytesExt};

use crate::assemble::VMAP_MAGIC;
use crate::bih::Bih;
use crate::config::AssemblerConfig;
use crate::error::{AssembleError, Result};
use crate::spawn::{global_tile_id, unpack_tile_id, MapSpawns, ModelSpawn, MOD_WORLDSPAWN};

pub fn write_map_files(
    output_dir: &Path,
    map_id: u32,
    spawns: &MapSpawns,
    config: &AssemblerConfig,
) -> Result<()> {
    let mut map_spawns: Vec<&ModelSpawn> = Vec::with_capacity(spawns.unique_entries.len());
    for spawn in spawns.unique_entries.values() {
        if spawn.bound.is_none() {
            return Err(AssembleError::format(format!(
                "spawn {} ({}) reached serialization without a bound",
                spawn.id, spawn.name
            )));
        }
        map_spawns.push(spawn);
    }

    // tile records reference tree leaves by the spawn's position in the
    // build ordering, so the mapping must iterate exactly the order the
    // tree consumed
    let tree = Bih::build(&map_spawns, config.map_leaf_size);
    let mut node_index: HashMap<u32, u32> = HashMap::with_capacity(map_spawns.len());
    for (position, spawn) in map_spawns.iter().enumerate() {
        node_index.insert(spawn.id, position as u32);
    }

    // only maps without terrain tiles carry their spawns globally
    let is_tiled = !spawns.has_global_spawns();

    let map_path = output_dir.join(format!("{:03}.vmtree", map_id));
    let file = File::create(&map_path).map_err(|err| AssembleError::file_open(&map_path, err))?;
    let mut out = BufWriter::new(file);
    out.write_all(VMAP_MAGIC)?;
    out.write_u8(is_tiled as u8)?;
    out.write_all(b"NODE")?;
    tree.write_to(&mut out)?;
    out.write_all(b"GOBJ")?;
    for (tile_id, spawn_id) in &spawns.tile_entries {
        if *tile_id != global_tile_id() {
            continue;
        }
        let spawn = spawns
            .unique_entries
            .get(spawn_id)
            .expect("global tile entry without a unique entry");
        spawn.write_to(&mut out)?;
    }
    out.flush()?;
    drop(out);

    let mut tiles: BTreeMap<u32, Vec<u32>> = BTreeMap::new();
    for (tile_id, spawn_id) in &spawns.tile_entries {
        if *tile_id == global_tile_id() {
            continue;
        }
        tiles.entry(*tile_id).or_default().push(*spawn_id);
    }

    for (tile_id, entries) in tiles {
        // worldspawns already went into the GOBJ section
        let tile_spawns: Vec<&ModelSpawn> = entries
            .iter()
            .map(|spawn_id| {
                spawns
                    .unique_entries
                    .get(spawn_id)
                    .expect("tile entry without a unique entry")
            })
            .filter(|spawn| (spawn.flags & MOD_WORLDSPAWN) == 0)
            .collect();
        if tile_spawns.is_empty() {
            continue;
        }

        let (tile_x, tile_y) = unpack_tile_id(tile_id);
        let tile_path =
            output_dir.join(format!("{:03}_{:02}_{:02}.vmtile", map_id, tile_x, tile_y));
        let file =
            File::create(&tile_path).map_err(|err| AssembleError::file_open(&tile_path, err))?;
        let mut tile_out = BufWriter::new(file);
        tile_out.write_all(VMAP_MAGIC)?;
        tile_out.write_u32::<LittleEndian>(tile_spawns.len() as u32)?;
        for spawn in tile_spawns {
            spawn.write_to(&mut tile_out)?;
            let leaf = *node_index
                .get(&spawn.id)
                .expect("tile spawn missing from the map tree node index");
            tile_out.write_u32::<LittleEndian>(leaf)?;
        }
        tile_out.flush()?;
    }

    Ok(())
}
