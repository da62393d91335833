//! warpdeck - warp settings inspector and exporter
//!
//! Loads (or creates) a warp settings document, rebuilds the warps,
//! resolves their derived geometry and optionally exports the
//! tessellated meshes as JSON or the edge-blend mask as a grayscale
//! PNG, standing in for the rendering layer during projector setup.

use anyhow::{bail, Context, Result};
use clap::Parser;
use serde::Serialize;
use std::path::PathBuf;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use warpdeck::mesh::WarpMesh;
use warpdeck::{Warp, WarpConfig, WarpMethod};

/// warpdeck - projection mapping warp geometry
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Warp settings document
    #[arg(short, long, default_value = "warps.toml")]
    config: PathBuf,

    /// Content width in pixels
    #[arg(long, default_value_t = 1920)]
    width: u32,

    /// Content height in pixels
    #[arg(long, default_value_t = 1080)]
    height: u32,

    /// Add a warp to the document (bilinear, perspective or perspectivebilinear)
    #[arg(long)]
    add: Option<String>,

    /// Write the tessellated meshes to a JSON file
    #[arg(long)]
    export_mesh: Option<PathBuf>,

    /// Write the first warp's blend mask to a grayscale PNG
    #[arg(long)]
    export_blend: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Serialize)]
struct MeshExport {
    method: &'static str,
    width: u32,
    height: u32,
    mesh: WarpMesh,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let _subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .compact()
        .init();

    info!("warpdeck v{}", env!("CARGO_PKG_VERSION"));

    let mut config = WarpConfig::load_or_create(&args.config)?;

    let mut changed = false;
    if let Some(method) = &args.add {
        let method = parse_method(method)?;
        let warp = Warp::new(method, args.width, args.height);
        config.warps.push(warp.to_settings());
        info!("Added {} warp", method.as_str());
        changed = true;
    }

    let mut warps: Vec<Warp> = config
        .warps
        .iter()
        .map(|s| Warp::from_settings(s, args.width, args.height))
        .collect();

    for (i, warp) in warps.iter_mut().enumerate() {
        if let Err(e) = warp.update_geometry() {
            warn!("Warp {}: {}", i, e);
        }

        let settings = warp.to_settings();
        let edges = warp.blend().edges();
        info!(
            "Warp {}: {} {}x{} grid, {} control point(s), edges [{:.2} {:.2} {:.2} {:.2}]",
            i,
            settings.method.as_str(),
            settings.columns,
            settings.rows,
            warp.control_point_count(),
            edges[0],
            edges[1],
            edges[2],
            edges[3],
        );
        if let Some(mesh) = warp.mesh() {
            info!(
                "  mesh {}x{} ({} vertices, {} triangles)",
                mesh.resolution_x,
                mesh.resolution_y,
                mesh.vertices.len(),
                mesh.indices.len() / 3
            );
        }
    }

    if let Some(path) = &args.export_mesh {
        let mut exports = Vec::new();
        for warp in warps.iter_mut() {
            let method = warp.method().as_str();
            if let Some(mesh) = warp.mesh() {
                exports.push(MeshExport {
                    method,
                    width: args.width,
                    height: args.height,
                    mesh: mesh.clone(),
                });
            }
        }
        let json = serde_json::to_string_pretty(&exports)
            .context("Failed to serialize mesh export")?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write mesh export to {:?}", path))?;
        info!("Wrote {} mesh(es) to {:?}", exports.len(), path);
    }

    if let Some(path) = &args.export_blend {
        match warps.first() {
            Some(warp) => {
                let mask = warp.blend().mask_image(args.width, args.height);
                mask.save(path)
                    .with_context(|| format!("Failed to write blend mask to {:?}", path))?;
                info!("Wrote blend mask to {:?}", path);
            }
            None => warn!("No warps in document, skipping blend mask export"),
        }
    }

    if changed {
        config.save(&args.config)?;
    }

    Ok(())
}

fn parse_method(s: &str) -> Result<WarpMethod> {
    match s {
        "bilinear" => Ok(WarpMethod::Bilinear),
        "perspective" => Ok(WarpMethod::Perspective),
        "perspectivebilinear" => Ok(WarpMethod::PerspectiveBilinear),
        other => bail!(
            "Unknown warp method '{}' (expected bilinear, perspective or perspectivebilinear)",
            other
        ),
    }
}
