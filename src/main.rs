//! Polymesh CLI Application

use anyhow::{Context, Result};
use clap::Parser;
use polymesh::config::GeometryConfig;
use polymesh::mesh::{AttributeRegistry, MeshInfo};
use polymesh::operation::Operation;
use polymesh::shapes::Shape;
use polymesh::MeshError;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;

mod cli;
use cli::{Cli, Commands};

/// Statistics of one pipeline stage
#[derive(Serialize)]
struct Stage {
    operation: String,
    info: MeshInfo,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    let log_level = if cli.debug {
        "debug"
    } else if cli.verbose {
        "info"
    } else {
        "warn"
    };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    match cli.command {
        Commands::Info { shape, size } => cmd_info(&shape, size),
        Commands::Apply {
            shape,
            size,
            ops,
            config,
            check,
        } => cmd_apply(&shape, size, &ops, config, check),
        Commands::Config { output } => cmd_config(output),
    }
}

fn load_config(path: Option<PathBuf>) -> Result<GeometryConfig> {
    match path {
        Some(path) => GeometryConfig::from_file(&path)
            .with_context(|| format!("Failed to load configuration from {}", path.display())),
        None => Ok(GeometryConfig::default()),
    }
}

fn cmd_info(shape: &str, size: f32) -> Result<()> {
    let shape: Shape = shape.parse()?;
    let mesh = shape.try_make(size, Arc::new(AttributeRegistry::standard()))?;
    let json = serde_json::to_string_pretty(&mesh.info()).context("Failed to serialize mesh info")?;
    println!("{}", json);
    Ok(())
}

fn cmd_apply(
    shape: &str,
    size: f32,
    ops: &[String],
    config: Option<PathBuf>,
    check: bool,
) -> Result<()> {
    let config = load_config(config)?;
    let shape: Shape = shape.parse()?;
    let operations = ops
        .iter()
        .map(|name| name.parse::<Operation>())
        .collect::<polymesh::Result<Vec<_>>>()?;

    let mut mesh = shape.try_make(size, Arc::new(AttributeRegistry::standard()))?;
    mesh.process(&config.process);
    let mut stages = vec![Stage {
        operation: shape.to_string(),
        info: mesh.info(),
    }];

    for operation in operations {
        log::info!("Applying {} to {}", operation, mesh.name);
        mesh = operation.apply(mesh, &config);
        if check && !mesh.sanity_check() {
            return Err(MeshError::InvalidMeshTopology(format!(
                "{} produced an inconsistent mesh",
                operation
            ))
            .into());
        }
        stages.push(Stage {
            operation: operation.to_string(),
            info: mesh.info(),
        });
    }

    let json = serde_json::to_string_pretty(&stages).context("Failed to serialize statistics")?;
    println!("{}", json);
    Ok(())
}

fn cmd_config(output: PathBuf) -> Result<()> {
    GeometryConfig::default()
        .to_file(&output)
        .with_context(|| format!("Failed to write configuration to {}", output.display()))?;
    println!("Wrote default configuration to {}", output.display());
    Ok(())
}
