use super::SearchContext;
use crate::cli::GridArgs;
use crate::config::builder::ExecutionOverrides;
use crate::error::{CliError, Result};
use passo::core::io::atomic::atomic_write;
use passo::engine::grid::{DockingGrid, DockingGridBuilder};
use serde::Serialize;
use std::path::Path;
use tracing::info;

#[derive(Serialize, Debug)]
#[serde(rename_all = "kebab-case")]
struct GridOriginRecord {
    id: usize,
    coordinate: [f64; 3],
    distance_to_center: f64,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "kebab-case")]
struct GridRecord {
    virtual_center: [f64; 3],
    origins: Vec<GridOriginRecord>,
}

impl From<&DockingGrid> for GridRecord {
    fn from(grid: &DockingGrid) -> Self {
        let v = grid.virtual_center;
        Self {
            virtual_center: [v.x, v.y, v.z],
            origins: grid
                .origins
                .iter()
                .map(|origin| {
                    let c = origin.coordinate();
                    GridOriginRecord {
                        id: origin.id().0,
                        coordinate: [c.x, c.y, c.z],
                        distance_to_center: (c - v).norm(),
                    }
                })
                .collect(),
        }
    }
}

fn write_grid(grid: &DockingGrid, path: &Path) -> Result<()> {
    let content = toml::to_string(&GridRecord::from(grid)).map_err(|e| CliError::Other(e.into()))?;
    atomic_write(path, content.as_bytes())?;
    Ok(())
}

pub async fn run(args: GridArgs) -> Result<()> {
    let ctx = SearchContext::load(&args.search, &ExecutionOverrides::default())?;
    let cfg = &ctx.app.core_config;

    let grid = DockingGridBuilder::new(cfg.grid.clone(), cfg.execution.decoys_per_origin)
        .build(&ctx.loaded.geometry)?;
    info!(origins = grid.origins.len(), "Docking grid built.");

    let v = grid.virtual_center;
    println!("Virtual center: ({:.3}, {:.3}, {:.3})", v.x, v.y, v.z);
    println!(
        "{} grid origins x {} decoys = {} decoys",
        grid.origins.len(),
        cfg.execution.decoys_per_origin,
        grid.origins.len() * cfg.execution.decoys_per_origin
    );
    for origin in &grid.origins {
        let c = origin.coordinate();
        println!(
            "  origin {:>4}  ({:>9.3}, {:>9.3}, {:>9.3})",
            origin.id().0,
            c.x,
            c.y,
            c.z
        );
    }

    if let Some(path) = &args.write {
        write_grid(&grid, path)?;
        println!("Grid written to: {}", path.display());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Point3;
    use passo::core::models::pose::BlockId;
    use passo::engine::collaborators::StaticGeometry;
    use passo::engine::config::GridConfig;
    use tempfile::tempdir;

    #[test]
    fn grid_file_lists_center_and_origins() {
        let geometry = StaticGeometry::new()
            .with_block(BlockId::FixedA, vec![Point3::new(0.0, 0.0, 0.0)])
            .with_block(BlockId::FixedB, vec![Point3::new(10.0, 0.0, 0.0)])
            .with_block(BlockId::Movable, vec![Point3::new(10.0, 5.0, 0.0)]);
        let grid = DockingGridBuilder::new(GridConfig::default(), 2)
            .build(&geometry)
            .unwrap();
        let dir = tempdir().unwrap();
        let path = dir.path().join("grid.toml");

        write_grid(&grid, &path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let value: toml::Table = toml::from_str(&content).unwrap();
        assert_eq!(
            value["virtual-center"].as_array().unwrap()[0].as_float(),
            Some(15.0)
        );
        assert_eq!(value["origins"].as_array().unwrap().len(), 27);
    }
}
