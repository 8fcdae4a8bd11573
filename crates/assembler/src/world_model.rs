// Runtime model writer
// Converts a raw extractor model into the compact .vmo format the
// collision engine loads: per-group mesh data plus prebuilt triangle and
// group trees, so the runtime never has to index geometry itself.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use byteorder::{LittleEndian, WriteBytesExt};
use vmap_shared::math::{AaBox, Vec3};

use crate::assemble::VMAP_MAGIC;
use crate::bih::{Bih, HasBounds};
use crate::config::AssemblerConfig;
use crate::error::{AssembleError, Result};
use crate::raw_model::{MeshTriangle, RawGroup, RawModel, WmoLiquid};

pub struct GroupModel {
    pub mogp_flags: u32,
    pub group_wmo_id: u32,
    pub bounds: AaBox,
    pub triangles: Vec<MeshTriangle>,
    pub vertices: Vec<Vec3>,
    pub liquid: Option<WmoLiquid>,
}

impl HasBounds for GroupModel {
    fn bounds(&self) -> AaBox {
        self.bounds
    }
}

pub struct WorldModel {
    pub root_wmo_id: u32,
    pub groups: Vec<GroupModel>,
}

impl WorldModel {
    pub fn from_raw(raw: RawModel) -> Self {
        let groups = raw.groups.into_iter().map(GroupModel::from_raw).collect();
        Self {
            root_wmo_id: raw.root_wmo_id,
            groups,
        }
    }

    pub fn write_file(&self, path: &Path, config: &AssemblerConfig) -> Result<()> {
        let file = File::create(path).map_err(|err| AssembleError::file_open(path, err))?;
        let mut out = BufWriter::new(file);

        out.write_all(VMAP_MAGIC)?;
        out.write_all(b"WMOD")?;
        out.write_u32::<LittleEndian>((std::mem::size_of::<u32>() * 2) as u32)?;
        out.write_u32::<LittleEndian>(self.root_wmo_id)?;

        if !self.groups.is_empty() {
            out.write_all(b"GMOD")?;
            out.write_u32::<LittleEndian>(self.groups.len() as u32)?;
            for group in &self.groups {
                group.write_to(&mut out, config)?;
            }

            out.write_all(b"GBIH")?;
            Bih::build(&self.groups, config.group_leaf_size).write_to(&mut out)?;
        }

        out.flush()?;
        Ok(())
    }
}

impl GroupModel {
    fn from_raw(raw: RawGroup) -> Self {
        Self {
            mogp_flags: raw.mogp_flags,
            group_wmo_id: raw.group_wmo_id,
            bounds: raw.bounds,
            triangles: raw.triangles,
            vertices: raw.vertices,
            liquid: raw.liquid,
        }
    }

    fn write_to<W: Write>(&self, writer: &mut W, config: &AssemblerConfig) -> Result<()> {
        self.bounds.write_to(writer)?;
        writer.write_u32::<LittleEndian>(self.mogp_flags)?;
        writer.write_u32::<LittleEndian>(self.group_wmo_id)?;

        writer.write_all(b"VERT")?;
        let count = self.vertices.len() as u32;
        let chunk_size =
            std::mem::size_of::<u32>() as u32 + count * std::mem::size_of::<Vec3>() as u32;
        writer.write_u32::<LittleEndian>(chunk_size)?;
        writer.write_u32::<LittleEndian>(count)?;
        if count == 0 {
            // a geometry-less group ends here, nothing to index
            return Ok(());
        }
        for v in &self.vertices {
            v.write_to(writer)?;
        }

        writer.write_all(b"TRIM")?;
        let tri_count = self.triangles.len() as u32;
        let chunk_size =
            std::mem::size_of::<u32>() as u32 + tri_count * 3 * std::mem::size_of::<u32>() as u32;
        writer.write_u32::<LittleEndian>(chunk_size)?;
        writer.write_u32::<LittleEndian>(tri_count)?;
        for tri in &self.triangles {
            writer.write_u32::<LittleEndian>(tri.idx0)?;
            writer.write_u32::<LittleEndian>(tri.idx1)?;
            writer.write_u32::<LittleEndian>(tri.idx2)?;
        }

        writer.write_all(b"MBIH")?;
        Bih::build(&self.triangle_bounds(), config.mesh_leaf_size).write_to(writer)?;

        writer.write_all(b"LIQU")?;
        let liquid_size = self.liquid.as_ref().map(WmoLiquid::file_size).unwrap_or(0);
        writer.write_u32::<LittleEndian>(liquid_size)?;
        if let Some(liquid) = &self.liquid {
            liquid.write_to(writer)?;
        }

        Ok(())
    }

    /// Per-triangle bounds for the mesh tree. An index pointing outside
    /// the vertex list contributes nothing to its triangle's box.
    fn triangle_bounds(&self) -> Vec<AaBox> {
        self.triangles
            .iter()
            .map(|tri| {
                let mut bound: Option<AaBox> = None;
                for idx in [tri.idx0, tri.idx1, tri.idx2] {
                    if let Some(v) = self.vertices.get(idx as usize) {
                        match bound.as_mut() {
                            Some(current) => current.merge(*v),
                            None => bound = Some(AaBox::from_point(*v)),
                        }
                    }
                }
                bound.unwrap_or_default()
            })
            .collect()
    }
}

/// Convert one raw model file into its runtime counterpart `<name>.vmo`.
pub fn convert_raw_file(
    raw_dir: &Path,
    output_dir: &Path,
    name: &str,
    config: &AssemblerConfig,
) -> Result<()> {
    let raw = RawModel::read(&raw_dir.join(name))?;
    let model = WorldModel::from_raw(raw);
    model.write_file(&output_dir.join(format!("{}.vmo", name)), config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    use byteorder::ReadBytesExt;

    use crate::test_util::{raw_model_bytes, write_raw_model_file, RawGroupSpec, RawLiquidSpec};

    struct ParsedGroup {
        vertex_count: u32,
        triangle_count: u32,
        liquid_dims: Option<(u32, u32)>,
    }

    fn skip(reader: &mut impl Read, count: usize) {
        let mut buf = vec![0u8; count];
        reader.read_exact(&mut buf).unwrap();
    }

    fn expect_tag(reader: &mut impl Read, expected: &[u8; 4]) {
        let mut tag = [0u8; 4];
        reader.read_exact(&mut tag).unwrap();
        assert_eq!(&tag, expected);
    }

    fn skip_bih(reader: &mut impl Read) {
        skip(reader, 24); // bounds
        let tree_len = reader.read_u32::<LittleEndian>().unwrap() as usize;
        skip(reader, tree_len * 4);
        let object_len = reader.read_u32::<LittleEndian>().unwrap() as usize;
        skip(reader, object_len * 4);
    }

    fn parse_vmo(bytes: &[u8]) -> (u32, Vec<ParsedGroup>) {
        let mut r = bytes;
        let mut magic = [0u8; 8];
        r.read_exact(&mut magic).unwrap();
        assert_eq!(&magic, VMAP_MAGIC);

        expect_tag(&mut r, b"WMOD");
        let _chunk = r.read_u32::<LittleEndian>().unwrap();
        let root_wmo_id = r.read_u32::<LittleEndian>().unwrap();

        let mut groups = Vec::new();
        let mut tag = [0u8; 4];
        if r.read_exact(&mut tag).is_ok() {
            assert_eq!(&tag, b"GMOD");
            let group_count = r.read_u32::<LittleEndian>().unwrap();
            for _ in 0..group_count {
                skip(&mut r, 24); // bounds
                let _mogp = r.read_u32::<LittleEndian>().unwrap();
                let _wmo_id = r.read_u32::<LittleEndian>().unwrap();

                expect_tag(&mut r, b"VERT");
                let _chunk = r.read_u32::<LittleEndian>().unwrap();
                let vertex_count = r.read_u32::<LittleEndian>().unwrap();
                if vertex_count == 0 {
                    groups.push(ParsedGroup {
                        vertex_count,
                        triangle_count: 0,
                        liquid_dims: None,
                    });
                    continue;
                }
                skip(&mut r, vertex_count as usize * 12);

                expect_tag(&mut r, b"TRIM");
                let _chunk = r.read_u32::<LittleEndian>().unwrap();
                let triangle_count = r.read_u32::<LittleEndian>().unwrap();
                skip(&mut r, triangle_count as usize * 12);

                expect_tag(&mut r, b"MBIH");
                skip_bih(&mut r);

                expect_tag(&mut r, b"LIQU");
                let liquid_size = r.read_u32::<LittleEndian>().unwrap();
                let liquid_dims = if liquid_size > 0 {
                    let tiles_x = r.read_u32::<LittleEndian>().unwrap();
                    let tiles_y = r.read_u32::<LittleEndian>().unwrap();
                    skip(&mut r, 12); // corner
                    let _liquid_type = r.read_u32::<LittleEndian>().unwrap();
                    skip(&mut r, ((tiles_x + 1) * (tiles_y + 1)) as usize * 4);
                    skip(&mut r, (tiles_x * tiles_y) as usize);
                    Some((tiles_x, tiles_y))
                } else {
                    None
                };

                groups.push(ParsedGroup {
                    vertex_count,
                    triangle_count,
                    liquid_dims,
                });
            }
            expect_tag(&mut r, b"GBIH");
            skip_bih(&mut r);
        }
        assert!(r.is_empty());

        (root_wmo_id, groups)
    }

    fn pyramid_spec(liquid: Option<RawLiquidSpec>) -> RawGroupSpec {
        RawGroupSpec {
            mogp_flags: 0x8,
            group_wmo_id: 2,
            vertices: vec![
                Vec3::new(0.0, 0.0, 0.0),
                Vec3::new(2.0, 0.0, 0.0),
                Vec3::new(0.0, 2.0, 0.0),
                Vec3::new(0.0, 0.0, 2.0),
            ],
            indices: vec![0, 1, 2, 0, 1, 3, 0, 2, 3, 1, 2, 3],
            liquid,
        }
    }

    #[test]
    fn test_vmo_round_trip_counts() {
        let liquid = RawLiquidSpec {
            xtiles: 3,
            ytiles: 2,
            corner: Vec3::new(-1.0, -1.0, 0.5),
            liquid_type: 2,
            height: 4.25,
        };
        let bytes = raw_model_bytes(77, &[pyramid_spec(Some(liquid)), pyramid_spec(None)]);
        let raw = RawModel::read_from(&mut bytes.as_slice()).unwrap();
        let model = WorldModel::from_raw(raw);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("castle.wmo.vmo");
        model.write_file(&path, &AssemblerConfig::default()).unwrap();

        let (root_wmo_id, groups) = parse_vmo(&std::fs::read(&path).unwrap());
        assert_eq!(root_wmo_id, 77);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].vertex_count, 4);
        assert_eq!(groups[0].triangle_count, 4);
        assert_eq!(groups[0].liquid_dims, Some((3, 2)));
        assert_eq!(groups[1].vertex_count, 4);
        assert_eq!(groups[1].liquid_dims, None);
    }

    #[test]
    fn test_convert_raw_file_writes_vmo() {
        let raw_dir = tempfile::tempdir().unwrap();
        let out_dir = tempfile::tempdir().unwrap();
        write_raw_model_file(&raw_dir.path().join("well.m2"), 0, &[pyramid_spec(None)]);

        convert_raw_file(
            raw_dir.path(),
            out_dir.path(),
            "well.m2",
            &AssemblerConfig::default(),
        )
        .unwrap();

        assert!(out_dir.path().join("well.m2.vmo").exists());
    }

    #[test]
    fn test_convert_missing_file_is_open_error() {
        let raw_dir = tempfile::tempdir().unwrap();
        let out_dir = tempfile::tempdir().unwrap();
        let err = convert_raw_file(
            raw_dir.path(),
            out_dir.path(),
            "absent.m2",
            &AssemblerConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, AssembleError::FileOpen { .. }));
    }

    #[test]
    fn test_groupless_model_has_no_group_section() {
        let bytes = raw_model_bytes(5, &[]);
        let raw = RawModel::read_from(&mut bytes.as_slice()).unwrap();
        let model = WorldModel::from_raw(raw);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.vmo");
        model.write_file(&path, &AssemblerConfig::default()).unwrap();

        let (root_wmo_id, groups) = parse_vmo(&std::fs::read(&path).unwrap());
        assert_eq!(root_wmo_id, 5);
        assert!(groups.is_empty());
    }
}
