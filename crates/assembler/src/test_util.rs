// Test helpers: synthesize files in the extractor's raw formats so parser
// and converter tests run against realistic inputs.

use std::path::Path;

use byteorder::{LittleEndian, WriteBytesExt};
use vmap_shared::math::{AaBox, Vec3};

use crate::raw_model::RAW_VMAP_MAGIC;
use crate::spawn::ModelSpawn;

pub struct RawGroupSpec {
    pub mogp_flags: u32,
    pub group_wmo_id: u32,
    pub vertices: Vec<Vec3>,
    pub indices: Vec<u16>,
    pub liquid: Option<RawLiquidSpec>,
}

pub struct RawLiquidSpec {
    pub xtiles: i32,
    pub ytiles: i32,
    pub corner: Vec3,
    pub liquid_type: i16,
    pub height: f32,
}

/// A minimal spawn with no bound; tests override fields as needed.
pub fn test_spawn(id: u32, name: &str) -> ModelSpawn {
    ModelSpawn {
        id,
        flags: 0,
        pos: Vec3::default(),
        rot: Vec3::default(),
        scale: 1.0,
        bound: None,
        name: name.to_string(),
    }
}

pub fn raw_model_bytes(root_wmo_id: u32, groups: &[RawGroupSpec]) -> Vec<u8> {
    let mut buf = Vec::new();
    buf.extend_from_slice(RAW_VMAP_MAGIC);
    buf.write_u32::<LittleEndian>(0).unwrap(); // vertex count hint
    buf.write_u32::<LittleEndian>(groups.len() as u32).unwrap();
    buf.write_u32::<LittleEndian>(root_wmo_id).unwrap();
    for group in groups {
        push_group(&mut buf, group);
    }
    buf
}

pub fn write_raw_model_file(path: &Path, root_wmo_id: u32, groups: &[RawGroupSpec]) {
    std::fs::write(path, raw_model_bytes(root_wmo_id, groups)).unwrap();
}

fn push_group(buf: &mut Vec<u8>, group: &RawGroupSpec) {
    let mut bounds = AaBox::default();
    if let Some((first, rest)) = group.vertices.split_first() {
        bounds = AaBox::from_point(*first);
        for v in rest {
            bounds.merge(*v);
        }
    }

    buf.write_u32::<LittleEndian>(group.mogp_flags).unwrap();
    buf.write_u32::<LittleEndian>(group.group_wmo_id).unwrap();
    bounds.write_to(buf).unwrap();
    buf.write_u32::<LittleEndian>(group.liquid.is_some() as u32)
        .unwrap();

    buf.extend_from_slice(b"GRP ");
    buf.write_i32::<LittleEndian>(4).unwrap();
    buf.write_u32::<LittleEndian>(0).unwrap(); // no branches

    buf.extend_from_slice(b"INDX");
    buf.write_i32::<LittleEndian>(4 + group.indices.len() as i32 * 2)
        .unwrap();
    buf.write_u32::<LittleEndian>(group.indices.len() as u32)
        .unwrap();
    for idx in &group.indices {
        buf.write_u16::<LittleEndian>(*idx).unwrap();
    }

    buf.extend_from_slice(b"VERT");
    buf.write_i32::<LittleEndian>(4 + group.vertices.len() as i32 * 12)
        .unwrap();
    buf.write_u32::<LittleEndian>(group.vertices.len() as u32)
        .unwrap();
    for v in &group.vertices {
        v.write_to(buf).unwrap();
    }

    if let Some(liquid) = &group.liquid {
        let xverts = liquid.xtiles + 1;
        let yverts = liquid.ytiles + 1;
        buf.extend_from_slice(b"LIQU");
        buf.write_i32::<LittleEndian>(
            32 + xverts * yverts * 4 + liquid.xtiles * liquid.ytiles,
        )
        .unwrap();
        buf.write_i32::<LittleEndian>(xverts).unwrap();
        buf.write_i32::<LittleEndian>(yverts).unwrap();
        buf.write_i32::<LittleEndian>(liquid.xtiles).unwrap();
        buf.write_i32::<LittleEndian>(liquid.ytiles).unwrap();
        liquid.corner.write_to(buf).unwrap();
        buf.write_i16::<LittleEndian>(liquid.liquid_type).unwrap();
        buf.write_u16::<LittleEndian>(0).unwrap(); // pad
        for _ in 0..xverts * yverts {
            buf.write_f32::<LittleEndian>(liquid.height).unwrap();
        }
        for _ in 0..liquid.xtiles * liquid.ytiles {
            buf.push(1);
        }
    }
}
