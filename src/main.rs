use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use sql_object_model::{
    scan_workspace, AutoLinkedProperty, LinkerSettings, ModelIndex, ScanOptions, DEFAULT_PATTERN,
};

#[derive(Parser)]
#[command(name = "sql-object-model")]
#[command(author, version, about = "Build a class/property/object model from SQL seed scripts")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args)]
struct WorkspaceArgs {
    /// Directory containing the SQL files
    #[arg(short, long, default_value = ".")]
    root: PathBuf,

    /// Glob for SQL files, relative to the root
    #[arg(short, long, default_value = DEFAULT_PATTERN)]
    pattern: String,

    /// Catch-all class id for objects that cannot be linked
    #[arg(long)]
    ignore_uuid: Option<String>,

    /// Skip the catch-all class during direct class_id matching
    #[arg(long)]
    ignore_status: bool,

    /// Auto-linked property, as <property-uuid>[=<class-uuid>]
    #[arg(long = "auto-link")]
    auto_link: Vec<AutoLinkedProperty>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

impl WorkspaceArgs {
    fn into_options(self) -> ScanOptions {
        ScanOptions {
            root: self.root,
            pattern: self.pattern,
            settings: LinkerSettings {
                ignore_status: self.ignore_status,
                ignore_uuid: self.ignore_uuid.unwrap_or_default(),
                auto_linked_properties: self.auto_link,
            },
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Print every class with its property and object counts
    Scan {
        #[command(flatten)]
        workspace: WorkspaceArgs,
    },
    /// Describe the class, property or object with the given UUID
    Lookup {
        uuid: String,

        #[command(flatten)]
        workspace: WorkspaceArgs,
    },
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Scan { workspace } => {
            init_tracing(workspace.verbose);
            let model = scan_workspace(workspace.into_options()).await?;

            for class in &model.classes {
                println!(
                    "{}  {}  ({} properties, {} objects)",
                    class.id,
                    class.name,
                    class.properties.len(),
                    class.objects.len()
                );
            }
            println!(
                "{} classes, {} properties, {} objects",
                model.classes.len(),
                model.properties.len(),
                model.objects.len()
            );
        }
        Commands::Lookup { uuid, workspace } => {
            init_tracing(workspace.verbose);
            let model = scan_workspace(workspace.into_options()).await?;
            let index = ModelIndex::new(&model);

            let Some(info) = index.lookup(&uuid) else {
                bail!("No class, property or object with id {}", uuid);
            };
            println!("{}: {}", info.kind, info.name);
            if !info.description.is_empty() {
                println!("  {}", info.description);
            }
            if let Some(class_type) = info.class_type {
                println!("  class type: {:?} ({})", class_type, class_type.code());
            }
            if let Some(data_type) = info.data_type {
                let array = if data_type.is_array() { ", array" } else { "" };
                println!("  data type: {:?} ({}{})", data_type, data_type.code(), array);
            }
            if let (Some(name), Some(id)) = (&info.class_name, &info.class_uuid) {
                println!("  class: {} ({})", name, id);
            }
            println!(
                "  defined at {}:{}",
                info.location.file_path.display(),
                info.location.line_number
            );
        }
    }

    Ok(())
}
