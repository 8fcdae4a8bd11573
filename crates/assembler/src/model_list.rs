// Gameobject model list export
// The extractor leaves a list of (display id, model name) records for
// models that are spawned as gameobjects rather than map placements. The
// assembler copies the list, augmenting each record with the model's
// untransformed vertex bound, and queues every referenced model for
// conversion.

use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::config::AssemblerConfig;
use crate::error::{AssembleError, Result};
use crate::raw_model::RawModel;

pub const GAMEOBJECT_MODELS: &str = "temp_gameobject_models";

pub fn export_gameobject_models(
    raw_dir: &Path,
    output_dir: &Path,
    spawned_model_files: &mut BTreeSet<String>,
    config: &AssemblerConfig,
) -> Result<()> {
    let src_path = raw_dir.join(GAMEOBJECT_MODELS);
    let Ok(src) = File::open(&src_path) else {
        // not every extraction produces a gameobject list
        return Ok(());
    };
    let mut reader = BufReader::new(src);

    let dest_path = output_dir.join(GAMEOBJECT_MODELS);
    let dest = File::create(&dest_path).map_err(|err| AssembleError::file_open(&dest_path, err))?;
    let mut writer = BufWriter::new(dest);

    loop {
        let display_id = match reader.read_u32::<LittleEndian>() {
            Ok(value) => value,
            Err(err) if err.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(err) => return Err(err.into()),
        };

        // corruption past this point stops the list but keeps what was
        // already written
        let Ok(name_len) = reader.read_u32::<LittleEndian>() else {
            tracing::warn!("'{}' seems to be corrupted", GAMEOBJECT_MODELS);
            break;
        };
        if name_len > config.max_name_length {
            tracing::warn!("'{}' seems to be corrupted", GAMEOBJECT_MODELS);
            break;
        }
        let mut name_buf = vec![0u8; name_len as usize];
        if reader.read_exact(&mut name_buf).is_err() {
            tracing::warn!("'{}' seems to be corrupted", GAMEOBJECT_MODELS);
            break;
        }
        let name = String::from_utf8_lossy(&name_buf).into_owned();

        let model = match RawModel::read(&raw_dir.join(&name)) {
            Ok(model) => model,
            Err(err) => {
                tracing::warn!("Skipping gameobject model {}: {}", name, err);
                continue;
            }
        };
        let bounds = model.accumulate_bounds(|v| v).unwrap_or_default();

        spawned_model_files.insert(name);

        writer.write_u32::<LittleEndian>(display_id)?;
        writer.write_u32::<LittleEndian>(name_len)?;
        writer.write_all(&name_buf)?;
        bounds.write_to(&mut writer)?;
    }

    writer.flush()?;
    Ok(())
}
