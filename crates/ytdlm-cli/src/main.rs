use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use ytdlm_core::{
    sidecar, CancellationToken, LibraryConfig, MediaIndexer, MediaType, MetadataDescriptor,
    MetadataMaintainer,
};

#[derive(Parser)]
#[command(name = "ytdlm", version, about = "Index downloaded media libraries and bundle files into zip archives")]
struct Cli {
    /// JSON config with audioFolderPath / videoFolderPath
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Audio library folder (overrides the config file)
    #[arg(long, global = true)]
    audio_dir: Option<PathBuf>,

    /// Video library folder (overrides the config file)
    #[arg(long, global = true)]
    video_dir: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List media files that have metadata, as JSON
    Index {
        /// audio or video
        #[arg(short = 't', long = "type", default_value = "video")]
        media_type: MediaType,
        /// Folder to scan instead of the configured one
        #[arg(long)]
        root: Option<PathBuf>,
        /// Emit the raw sidecar JSON (plus id) instead of records
        #[arg(long)]
        full: bool,
        /// Sort entries by id
        #[arg(long)]
        sort: bool,
    },
    /// Expected total size of the given .info.json files
    Size {
        #[arg(required = true)]
        json_files: Vec<PathBuf>,
    },
    /// Print the thumbnail path of an item
    Thumbnail {
        id: String,
        #[arg(short = 't', long = "type", default_value = "video")]
        media_type: MediaType,
        #[arg(long)]
        root: Option<PathBuf>,
    },
    /// Reset sidecar and thumbnail permissions of an item to 0644
    FixPerms {
        id: String,
        #[arg(short = 't', long = "type", default_value = "video")]
        media_type: MediaType,
        #[arg(long)]
        root: Option<PathBuf>,
    },
    /// Delete the sidecar JSON of an item
    DeleteMeta {
        id: String,
        #[arg(short = 't', long = "type", default_value = "video")]
        media_type: MediaType,
        #[arg(long)]
        root: Option<PathBuf>,
    },
    /// Zip files into one archive, flattened to their base names
    Archive {
        /// Destination .zip
        #[arg(short, long)]
        output: PathBuf,
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}

fn init_logging(verbose: bool) {
    if verbose {
        env_logger::Builder::from_env(env_logger::Env::default())
            .filter_level(log::LevelFilter::Warn)
            .filter_module("ytdlm_core", log::LevelFilter::Debug)
            .filter_module("ytdlm", log::LevelFilter::Debug)
            .format_timestamp_millis()
            .init();
    } else {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<LibraryConfig> {
    let mut config = match &cli.config {
        Some(path) => {
            let file = File::open(path)
                .with_context(|| format!("Failed to open config {}", path.display()))?;
            serde_json::from_reader::<_, LibraryConfig>(BufReader::new(file))
                .with_context(|| format!("Failed to parse config {}", path.display()))?
        }
        None => LibraryConfig::default(),
    };
    if let Some(dir) = &cli.audio_dir {
        config.audio_folder_path = dir.clone();
    }
    if let Some(dir) = &cli.video_dir {
        config.video_folder_path = dir.clone();
    }
    Ok(config)
}

fn read_descriptors(paths: &[PathBuf]) -> anyhow::Result<Vec<MetadataDescriptor>> {
    paths
        .iter()
        .map(|p| {
            sidecar::read_descriptor(p).with_context(|| format!("Failed to read {}", p.display()))
        })
        .collect()
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let config = load_config(&cli)?;
    log::debug!("Library config: {config:?}");

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        ctrlc::set_handler(move || cancel.cancel()).context("Failed to install Ctrl-C handler")?;
    }

    match &cli.command {
        Command::Index {
            media_type,
            root,
            full,
            sort,
        } => {
            let indexer = MediaIndexer::new(config);
            let mut outcome = indexer
                .build_index(root.as_deref(), *media_type, *full, Some(&cancel))
                .context("Indexing failed")?;
            if *sort {
                outcome.entries.sort_by(|a, b| a.id().cmp(&b.id()));
            }
            for skipped in &outcome.skipped {
                eprintln!("skipped {}: {}", skipped.path.display(), skipped.reason);
            }
            println!("{}", serde_json::to_string_pretty(&outcome.entries)?);
        }
        Command::Size { json_files } => {
            let descriptors = read_descriptors(json_files)?;
            println!("{}", ytdlm_core::estimate_size(&descriptors));
        }
        Command::Thumbnail {
            id,
            media_type,
            root,
        } => {
            let indexer = MediaIndexer::new(config);
            match indexer.resolve_thumbnail(id, *media_type, root.as_deref()) {
                Some(path) => println!("{}", path.display()),
                None => anyhow::bail!("No thumbnail for '{}'", id),
            }
        }
        Command::FixPerms {
            id,
            media_type,
            root,
        } => {
            MetadataMaintainer::new(config)
                .normalize_permissions(id, *media_type, root.as_deref())
                .with_context(|| format!("Failed to fix permissions for '{}'", id))?;
        }
        Command::DeleteMeta {
            id,
            media_type,
            root,
        } => {
            MetadataMaintainer::new(config)
                .delete_metadata(id, *media_type, root.as_deref())
                .with_context(|| format!("Failed to delete metadata for '{}'", id))?;
        }
        Command::Archive { output, files } => {
            let written = ytdlm_core::build_archive(output, files, Some(&cancel))
                .with_context(|| format!("Failed to build archive {}", output.display()))?;
            eprintln!("Wrote {}", written.display());
        }
    }

    Ok(())
}
