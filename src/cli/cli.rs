use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::cli::LogLevel;

/// Builds and inspects RAM filesystem images.
#[derive(Parser, Debug, Clone)]
#[command(version)]
pub struct Cli {
    /// Image file to operate on [default: from settings, else ramfs.img]
    #[clap(long, short)]
    pub file: Option<PathBuf>,

    /// Settings file [default: ramfs.yaml when present]
    #[clap(long, short)]
    pub config: Option<PathBuf>,

    #[clap(long, short, default_value = "warn", value_enum)]
    pub log_level: LogLevel,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Create an empty file system image
    Mkfs,
    /// Print the contents of files
    Cat {
        #[arg(required = true)]
        paths: Vec<String>,
    },
    /// Copy a file from the host into the image
    Cp { source: PathBuf, destination: String },
    /// List directory contents
    Ls { paths: Vec<String> },
    /// Create directories, including missing parents
    Mkdir {
        #[arg(required = true)]
        paths: Vec<String>,
    },
    /// Remove files
    Rm {
        #[arg(required = true)]
        paths: Vec<String>,
    },
    /// Remove empty directories
    Rmdir {
        #[arg(required = true)]
        paths: Vec<String>,
    },
}

impl Command {
    /// Whether the image has to be written back afterwards.
    pub fn mutates(&self) -> bool {
        !matches!(self, Command::Cat { .. } | Command::Ls { .. })
    }
}
