//! Command line front end for building, inspecting and converting BSP files.

mod input;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use collision_bsp::codec::{self, CURRENT_VERSION};
use collision_bsp::{BspBuilder, BspTree, BuildConfig, UserDataKey};
use log::info;
use nalgebra::Point3;

#[derive(Parser, Debug)]
#[command(name = "bsp-tool", version, about = "Build and inspect collision BSP files")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build a tree from a text triangle list
    Build {
        /// One triangle per line: nine coordinates and optional flags
        triangles: PathBuf,
        output: PathBuf,
        /// TOML file with build settings
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long)]
        seed: Option<u64>,
        /// Largest node left unsplit
        #[arg(long)]
        leaf_size: Option<usize>,
    },
    /// Print a summary of a BSP file
    Info { file: PathBuf },
    /// Cast a segment through a BSP file and report the nearest hit
    Ray {
        file: PathBuf,
        #[arg(allow_negative_numbers = true)]
        x0: f32,
        #[arg(allow_negative_numbers = true)]
        y0: f32,
        #[arg(allow_negative_numbers = true)]
        z0: f32,
        #[arg(allow_negative_numbers = true)]
        x1: f32,
        #[arg(allow_negative_numbers = true)]
        y1: f32,
        #[arg(allow_negative_numbers = true)]
        z1: f32,
    },
    /// Rewrite a BSP file of any supported version in the current format
    Convert { input: PathBuf, output: PathBuf },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match Cli::parse().command {
        Command::Build {
            triangles,
            output,
            config,
            seed,
            leaf_size,
        } => {
            let mut config = match config {
                Some(path) => read_config(&path)?,
                None => BuildConfig::default(),
            };
            if seed.is_some() {
                config.seed = seed;
            }
            if let Some(leaf_size) = leaf_size {
                config.max_triangles_per_node = leaf_size;
            }
            build(&triangles, &output, config)
        }
        Command::Info { file } => {
            let data = fs::read(&file).with_context(|| format!("failed to read {}", file.display()))?;
            let tree = load(&data, &file)?;
            let version = codec::bsp_version(&data).unwrap_or(CURRENT_VERSION);
            print_info(&tree, version);
            Ok(())
        }
        Command::Ray {
            file,
            x0,
            y0,
            z0,
            x1,
            y1,
            z1,
        } => {
            let tree = read_tree(&file)?;
            ray(&tree, Point3::new(x0, y0, z0), Point3::new(x1, y1, z1));
            Ok(())
        }
        Command::Convert { input, output } => {
            let tree = read_tree(&input)?;
            write_tree(&tree, &output)
        }
    }
}

fn read_config(path: &Path) -> Result<BuildConfig> {
    let text = fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    toml::from_str(&text).with_context(|| format!("invalid build config {}", path.display()))
}

fn build(input: &Path, output: &Path, config: BuildConfig) -> Result<()> {
    let text = fs::read_to_string(input).with_context(|| format!("failed to read {}", input.display()))?;
    let triangles = input::parse_triangles(&text).with_context(|| format!("failed to parse {}", input.display()))?;

    let mut tree = BspBuilder::with_config(config).build(&triangles);
    tree.set_user_data(
        UserDataKey::TIMESTAMP,
        chrono::Utc::now().to_rfc3339().into_bytes(),
    );
    info!(
        "built {} nodes over {} triangles, depth {}",
        tree.num_nodes(),
        tree.num_triangles(),
        tree.depth()
    );
    write_tree(&tree, output)
}

fn read_tree(path: &Path) -> Result<BspTree> {
    let data = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    load(&data, path)
}

fn load(data: &[u8], path: &Path) -> Result<BspTree> {
    codec::load(data).with_context(|| format!("failed to load {}", path.display()))
}

fn write_tree(tree: &BspTree, path: &Path) -> Result<()> {
    let data = codec::save(tree);
    fs::write(path, &data).with_context(|| format!("failed to write {}", path.display()))?;
    info!("wrote {} bytes to {}", data.len(), path.display());
    Ok(())
}

fn print_info(tree: &BspTree, version: u8) {
    let bounds = tree.bounding_box();
    println!("version:      {version}");
    println!("triangles:    {}", tree.num_triangles());
    println!("nodes:        {}", tree.num_nodes());
    println!("shared refs:  {}", tree.num_shared());
    println!("depth:        {}", tree.depth());
    println!("memory:       {} bytes", tree.used_memory());
    println!("can collide:  {}", tree.can_collide());
    if bounds.is_empty() {
        println!("bounds:       empty");
    } else {
        println!("bounds:       {:?} .. {:?}", bounds.min().coords.as_slice(), bounds.max().coords.as_slice());
    }
    for (key, data) in tree.user_data_entries() {
        match key {
            UserDataKey::TIMESTAMP => println!("built at:     {}", String::from_utf8_lossy(data)),
            UserDataKey(key) => println!("user data {key}: {} bytes", data.len()),
        }
    }
}

fn ray(tree: &BspTree, start: Point3<f32>, end: Point3<f32>) {
    match tree.ray_cast(&start, &end) {
        Some(hit) => {
            let at = start + (end - start) * hit.fraction;
            println!(
                "hit at fraction {:.6} ({}, {}, {}), triangle flags {}",
                hit.fraction,
                at.x,
                at.y,
                at.z,
                hit.triangle.flags()
            );
        }
        None => println!("no hit"),
    }
}
