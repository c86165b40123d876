use clap::{Parser, Subcommand};
use sku_tiles::color::{ColorLookup, ColorTable};
use sku_tiles::config::{self, Config};
use sku_tiles::imaging::{MagickEngine, Quality, TILE_PLACEHOLDER, TilePipeline};
use sku_tiles::naming::{self, ImageDescriptor};
use sku_tiles::normalize::{Normalizer, Passthrough};
use sku_tiles::types::Dimensions;
use sku_tiles::{output, store};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser)]
#[command(name = "sku-tiles")]
#[command(about = "Product photo naming, sharded storage and zoom tiles")]
#[command(long_about = "\
Product photo naming, sharded storage and zoom tiles

Every image is identified by its file name:

  <sku>[_<color>][_<number>][_<qualifier>][,<template>[-<index>]].<ext>

  308024_01.jpg                     image 1 of SKU 308024
  308024_ff00aa_01_zoom.jpg         color ff00aa, qualifier zoom
  308024_01_260x325,grid-17.jpg     tile 17 of the grid template

Images live in a sharded tree below the storage root:

  images/
  └── 30802401/                     first 8 characters of the SKU
      └── 3080240112/               first 10 characters of the SKU
          ├── 3080240112_01.jpg
          └── 3080240112_01_260x325,grid-0.jpg

Tiles are cut by ImageMagick (convert + identify must be installed).

Run 'sku-tiles gen-config' to generate a documented config.toml.")]
#[command(version)]
struct Cli {
    /// Config file (missing file = defaults)
    #[arg(long, default_value = "config.toml", global = true)]
    config: PathBuf,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show the fields of a file name
    Parse {
        name: String,
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
        /// Resolve the directory in the sharded layout
        #[arg(long)]
        sharded: bool,
        /// Tab-separated `name<TAB>hex` color table for color names
        #[arg(long)]
        colors: Option<PathBuf>,
    },
    /// Print where a file name lives in the image tree
    Path {
        name: String,
        /// Tree root (defaults to storage.root)
        #[arg(long)]
        root: Option<PathBuf>,
    },
    /// Tidy an uploaded file name
    EasyName {
        name: String,
        /// Rename the file on disk
        #[arg(long)]
        rename: bool,
    },
    /// Cut a master image into zoom tiles
    Tiles(TileArgs),
    /// Move uploaded files from a directory into the image tree
    MoveToTree {
        from: PathBuf,
        #[arg(long)]
        root: Option<PathBuf>,
        #[arg(long, default_value = "jpg")]
        ext: String,
        /// Text cut out of every file name before parsing
        #[arg(long, default_value = "")]
        remove: String,
    },
    /// Copy an image into other trees, keeping its layout
    Copy {
        file: String,
        /// Target tree root (repeatable)
        #[arg(long = "to", required = true)]
        roots: Vec<PathBuf>,
    },
    /// Find an image in the tree with one of the given extensions
    Find {
        name: String,
        #[arg(long)]
        root: Option<PathBuf>,
        /// Accepted extensions, in order of preference
        #[arg(long, value_delimiter = ',', default_value = "tif,tiff,png,jpg")]
        ext: Vec<String>,
    },
    /// Print a stock config.toml with all options documented
    GenConfig,
}

#[derive(clap::Args)]
struct TileArgs {
    /// Master image
    master: PathBuf,
    /// Tile template name, e.g. `grid`
    #[arg(long)]
    template: String,
    /// Tile width in permille of the canvas
    #[arg(long)]
    tile_width: u32,
    /// Tile height in permille of the canvas
    #[arg(long)]
    tile_height: u32,
    /// Tree root for the tiles (defaults to storage.root)
    #[arg(long)]
    root: Option<PathBuf>,
    /// Tile file extension
    #[arg(long, default_value = "jpg")]
    ext: String,
    /// Tile size in pixels (default: derived from the master)
    #[arg(long)]
    resize: Option<Dimensions>,
    /// JPEG quality (1-100, defaults to tiles.quality)
    #[arg(long)]
    quality: Option<u32>,
    /// Use -adaptive-resize
    #[arg(long)]
    adaptive: bool,
    /// Purge existing tiles instead of skipping
    #[arg(long)]
    delete_first: bool,
    #[arg(long, allow_hyphen_values = true)]
    sharpen: Option<String>,
    #[arg(long, allow_hyphen_values = true)]
    adaptive_sharpen: Option<String>,
    #[arg(long, allow_hyphen_values = true)]
    unsharp: Option<String>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let config_path = cli.config;
    let load = || config::load_config(&config_path);

    match cli.command {
        Command::Parse {
            name,
            json,
            sharded,
            colors,
        } => {
            let mut desc = ImageDescriptor::parse(&name);
            if sharded {
                desc = desc.into_sharded();
            }
            if json {
                println!("{}", serde_json::to_string_pretty(&output::descriptor_json(&desc))?);
            } else {
                let table = colors.as_deref().map(ColorTable::load).transpose()?;
                output::print_descriptor(&desc, table.as_ref().map(|t| t as &dyn ColorLookup));
            }
        }
        Command::Path { name, root } => {
            let config = load()?;
            let desc = in_tree(ImageDescriptor::parse(&name), &tree_root(&config, root), &config);
            println!("{}", desc.full_path());
        }
        Command::EasyName { name, rename } => {
            let normalizer = Normalizer::today();
            let tidy = if rename {
                store::easy_rename(Path::new(&name), &normalizer)?
            } else {
                naming::easy_file_name_with(&name, &normalizer)
            };
            println!("{}", tidy.full_path());
        }
        Command::Tiles(args) => return run_tiles(&load()?, args),
        Command::MoveToTree {
            from,
            root,
            ext,
            remove,
        } => {
            let config = load()?;
            let root = tree_root(&config, root);
            let count = store::move_to_tree(&from, &root, &ext, &remove)?;
            println!("{}", output::format_move_summary(count, &root.to_string_lossy()));
        }
        Command::Copy { file, roots } => {
            let config = load()?;
            let mut desc = ImageDescriptor::parse_with(&file, &Passthrough);
            if config.storage.sharded {
                desc = desc.into_sharded();
            }
            for path in store::copy_to(&desc, &roots)? {
                println!("{}", path.display());
            }
        }
        Command::Find { name, root, ext } => {
            let config = load()?;
            let desc = in_tree(ImageDescriptor::parse(&name), &tree_root(&config, root), &config);
            let extensions: Vec<&str> = ext.iter().map(String::as_str).collect();
            match store::find_existing(&desc, &extensions)? {
                Some(found) => println!("{}", found.full_path()),
                None => {
                    eprintln!("No match for {} in {}", desc.file_name(), desc.directory());
                    return Ok(ExitCode::FAILURE);
                }
            }
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn run_tiles(config: &Config, args: TileArgs) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let master = ImageDescriptor::parse_with(&args.master.to_string_lossy(), &Passthrough);
    let dest = in_tree(
        master
            .clone()
            .with_tile(args.template, TILE_PLACEHOLDER)
            .with_extension(args.ext),
        &tree_root(config, args.root),
        config,
    );

    let mut spec = config.tiles.spec(args.tile_width, args.tile_height);
    if let Some(size) = args.resize {
        spec.resize_width = size.width;
        spec.resize_height = size.height;
    }
    if let Some(quality) = args.quality {
        spec.quality = Some(Quality::new(quality));
    }
    spec.adaptive |= args.adaptive;
    spec.delete_existing_first = args.delete_first;
    spec.sharpen = args.sharpen;
    spec.adaptive_sharpen = args.adaptive_sharpen;
    spec.unsharp_mask = args.unsharp;

    let pipeline = TilePipeline::new(MagickEngine::from_config(&config.engine), config);
    let outcome = pipeline.create_tiles(&master, &spec, &dest)?;
    output::print_tile_outcome(&outcome);

    Ok(if outcome.success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn tree_root(config: &Config, root: Option<PathBuf>) -> PathBuf {
    root.unwrap_or_else(|| PathBuf::from(&config.storage.root))
}

/// Place `desc` below `root` in the configured layout.
fn in_tree(desc: ImageDescriptor, root: &Path, config: &Config) -> ImageDescriptor {
    let desc = desc.with_directory(root.to_string_lossy());
    if config.storage.sharded {
        desc.into_sharded()
    } else {
        desc
    }
}

fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "sku_tiles=debug"
    } else {
        "sku_tiles=warn"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
