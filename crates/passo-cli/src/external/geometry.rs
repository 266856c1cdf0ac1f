use crate::error::{CliError, Result};
use nalgebra::Point3;
use passo::core::models::pose::{BlockId, StructureHandle};
use passo::engine::collaborators::StaticGeometry;
use serde::Deserialize;
use std::path::Path;
use tracing::debug;

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
struct FileBlocks {
    #[serde(rename = "A", default)]
    a: Vec<[f64; 3]>,
    #[serde(rename = "B", default)]
    b: Vec<[f64; 3]>,
    #[serde(rename = "C", default)]
    c: Vec<[f64; 3]>,
}

/// On-disk layout of a geometry file: an optional input structure the design engine
/// understands plus the atom coordinates of each block.
#[derive(Deserialize, Debug)]
#[serde(deny_unknown_fields)]
struct GeometryFile {
    structure: Option<String>,
    blocks: FileBlocks,
}

#[derive(Debug, Clone)]
pub struct LoadedGeometry {
    pub geometry: StaticGeometry,
    pub structure: Option<StructureHandle>,
}

fn points(raw: Vec<[f64; 3]>) -> Vec<Point3<f64>> {
    raw.into_iter().map(|[x, y, z]| Point3::new(x, y, z)).collect()
}

/// Reads a geometry file. A relative `structure` path is resolved against the file's
/// directory. Missing blocks are left out and surface later as `BlockNotFound`.
pub fn load_geometry(path: &Path) -> Result<LoadedGeometry> {
    debug!("Loading geometry from file: {:?}", path);
    let content = std::fs::read_to_string(path)?;
    let file: GeometryFile = toml::from_str(&content).map_err(|e| CliError::FileParsing {
        path: path.to_path_buf(),
        source: e.into(),
    })?;

    let mut geometry = StaticGeometry::new();
    for (block, coords) in [
        (BlockId::FixedA, file.blocks.a),
        (BlockId::FixedB, file.blocks.b),
        (BlockId::Movable, file.blocks.c),
    ] {
        if !coords.is_empty() {
            geometry = geometry.with_block(block, points(coords));
        }
    }

    let structure = file.structure.map(|s| {
        let p = Path::new(&s);
        if p.is_absolute() {
            StructureHandle::new(s)
        } else {
            let base = path.parent().unwrap_or_else(|| Path::new(""));
            StructureHandle::new(base.join(p).to_string_lossy().into_owned())
        }
    });

    Ok(LoadedGeometry {
        geometry,
        structure,
    })
}
