use std::path::PathBuf;

use crate::cli::{Cli, Command};

#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub image: Option<PathBuf>,
    pub settings: Option<PathBuf>,
    pub command: Command,
}

impl From<Cli> for RuntimeConfig {
    fn from(cli: Cli) -> Self {
        Self {
            image: cli.file,
            settings: cli.config,
            command: cli.command,
        }
    }
}
