// Assembler driver
// Reads the placement dump, computes missing spawn bounds per map, writes
// the per-map tree and tile files and finally converts every referenced
// model. Maps are processed strictly sequentially: the conversion set
// accumulates across maps, so the stages share it by reference. A future
// parallel split would go per map id and per model name.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use vmap_shared::math::{deg_to_rad, AaBox, Matrix3, Vec3};

use crate::config::AssemblerConfig;
use crate::error::Result;
use crate::map_writer::write_map_files;
use crate::model_list::export_gameobject_models;
use crate::raw_model::RawModel;
use crate::spawn::{read_map_spawns, MapSpawns, ModelSpawn, MOD_HAS_BOUND, MOD_M2, MOD_WORLDSPAWN};
use crate::world_model::convert_raw_file;
use crate::Cli;

/// Output format magic, shared by the map tree, tile and model files.
pub const VMAP_MAGIC: &[u8; 8] = b"VMAP_7.0";

/// Maps with terrain and world-object maps use different coordinate
/// origins; bounds of worldspawns are shifted into the terrain grid.
const WORLDSPAWN_OFFSET: f32 = 533.33333 * 32.0;

pub fn run_assemble(args: &Cli) -> anyhow::Result<()> {
    tracing::info!(
        "VMap assembler: raw='{}' output='{}'",
        args.raw_data_dir,
        args.output_dir
    );

    let raw_dir = Path::new(&args.raw_data_dir);
    if !raw_dir.exists() {
        anyhow::bail!("Raw data directory does not exist: {}", args.raw_data_dir);
    }

    let output_dir = PathBuf::from(&args.output_dir);
    if !output_dir.exists() {
        std::fs::create_dir_all(&output_dir)?;
    }

    let config = AssemblerConfig::load(Path::new(&args.config_input));

    let mut map_data = read_map_spawns(raw_dir, &config)?;

    let mut success = true;
    let mut spawned_model_files: BTreeSet<String> = BTreeSet::new();
    for (map_id, spawns) in &mut map_data {
        tracing::info!("Calculating model bounds for map {}...", map_id);
        prepare_map_spawns(raw_dir, *map_id, spawns, &mut spawned_model_files);

        tracing::info!("Writing map files for map {}...", map_id);
        if let Err(err) = write_map_files(&output_dir, *map_id, spawns, &config) {
            tracing::error!("Map {} export failed: {}", map_id, err);
            success = false;
            break;
        }
    }

    if let Err(err) =
        export_gameobject_models(raw_dir, &output_dir, &mut spawned_model_files, &config)
    {
        tracing::error!("Gameobject model list export failed: {}", err);
        success = false;
    }

    tracing::info!("Converting model files");
    for name in &spawned_model_files {
        tracing::info!("Converting {}", name);
        if let Err(err) = convert_raw_file(raw_dir, &output_dir, name, &config) {
            tracing::error!("Error converting {}: {}", name, err);
            success = false;
            break;
        }
    }

    if !success {
        anyhow::bail!("vmap assembly finished with errors");
    }
    Ok(())
}

/// Bound pass over one map: compute missing bounds from the raw geometry,
/// apply the worldspawn origin correction and collect referenced model
/// names. Spawns whose model cannot be read are dropped from the map.
fn prepare_map_spawns(
    raw_dir: &Path,
    map_id: u32,
    spawns: &mut MapSpawns,
    spawned_model_files: &mut BTreeSet<String>,
) {
    let mut dropped = Vec::new();
    for (spawn_id, spawn) in spawns.unique_entries.iter_mut() {
        if (spawn.flags & MOD_HAS_BOUND) == 0 {
            if let Err(err) = calculate_transformed_bound(raw_dir, spawn) {
                tracing::warn!("Dropping spawn {} (map {}): {}", spawn_id, map_id, err);
                dropped.push(*spawn_id);
                continue;
            }
        }
        if (spawn.flags & MOD_WORLDSPAWN) != 0 {
            if let Some(bound) = spawn.bound {
                let offset = Vec3::new(WORLDSPAWN_OFFSET, WORLDSPAWN_OFFSET, 0.0);
                spawn.bound = Some(bound.add(offset));
            }
        }
        spawned_model_files.insert(spawn.name.clone());
    }

    if !dropped.is_empty() {
        for spawn_id in &dropped {
            spawns.unique_entries.remove(spawn_id);
        }
        spawns
            .tile_entries
            .retain(|(_, spawn_id)| !dropped.contains(spawn_id));
    }
}

/// World-space bound of a placed model. Fixed transform order: scale each
/// vertex, rotate it, accumulate, translate the finished box by the spawn
/// position.
fn calculate_transformed_bound(raw_dir: &Path, spawn: &mut ModelSpawn) -> Result<()> {
    let model = RawModel::read(&raw_dir.join(&spawn.name))?;

    if (spawn.flags & MOD_M2) != 0 && model.groups.len() != 1 {
        tracing::warn!(
            "'{}' has {} groups, expected a single-group doodad model",
            spawn.name,
            model.groups.len()
        );
    }

    let rotation = Matrix3::from_euler_zyx(
        deg_to_rad(spawn.rot.y),
        deg_to_rad(spawn.rot.x),
        deg_to_rad(spawn.rot.z),
    );
    let scale = spawn.scale;
    let bound = model.accumulate_bounds(|v| rotation.transform(v.scale(scale)));

    let bound = bound.unwrap_or_else(|| {
        tracing::warn!("Model '{}' has no geometry", spawn.name);
        AaBox::default()
    });

    spawn.bound = Some(bound.add(spawn.pos));
    spawn.flags |= MOD_HAS_BOUND;
    Ok(())
}
