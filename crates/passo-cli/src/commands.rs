pub mod decoy;
pub mod grid;
pub mod run;
pub mod status;

use crate::cli::SearchArgs;
use crate::config::builder::ExecutionOverrides;
use crate::config::{AppConfig, build_config};
use crate::error::{CliError, Result};
use crate::external::engine::ProcessDesignEngine;
use crate::external::geometry::{LoadedGeometry, load_geometry};
use passo::engine::collaborators::GeometrySource;
use passo::workflows::multi_dock::MultiDockDriver;
use tracing::info;

/// Directory, below the output directory, the design engine writes structures into.
pub const STRUCTURES_DIR: &str = "structures";

/// Resolved configuration plus the geometry it refers to.
pub struct SearchContext {
    pub app: AppConfig,
    pub loaded: LoadedGeometry,
}

impl SearchContext {
    pub fn load(args: &SearchArgs, overrides: &ExecutionOverrides) -> Result<Self> {
        info!("Merging configuration from file and CLI arguments...");
        let app = build_config(args, overrides)?;
        info!("Loading geometry from {:?}", &app.geometry_path);
        let loaded = load_geometry(&app.geometry_path)?;
        Ok(Self { app, loaded })
    }

    pub fn driver(&self) -> MultiDockDriver<'_> {
        let geometry: &dyn GeometrySource = &self.loaded.geometry;
        let driver = MultiDockDriver::new(&self.app.core_config, geometry);
        match &self.loaded.structure {
            Some(structure) => driver.with_input_structure(structure.clone()),
            None => driver,
        }
    }

    pub fn design_engine(&self) -> Result<ProcessDesignEngine> {
        let program = self.app.engine.program.clone().ok_or_else(|| {
            CliError::Config(
                "`engine.program` is required to run decoys. Set it in the config file or with -S engine.program=PATH."
                    .to_string(),
            )
        })?;
        let work_dir = self.app.output_dir().join(STRUCTURES_DIR);
        std::fs::create_dir_all(&work_dir)?;
        Ok(ProcessDesignEngine::new(
            program,
            self.app.engine.args.clone(),
            work_dir,
        ))
    }
}
