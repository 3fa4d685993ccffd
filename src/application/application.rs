use std::ffi::OsString;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use ramfs::codec::{self, ExportError, ImportError};
use ramfs::config::{SETTINGS_FILE_NAME, Settings, SettingsError};
use ramfs::ext::BestEffortPathExt;
use ramfs::filesystem::{Limits, Tree};
use snafu::Snafu;
use snafu::prelude::*;
use tracing::{debug, info, warn};

use crate::application::RuntimeConfig;
use crate::application::commands::{self, CommandError};
use crate::cli::Command;

const DEFAULT_IMAGE_PATH: &str = "ramfs.img";

pub struct Application;

impl Application {
    pub async fn run(runtime: impl Into<RuntimeConfig>) -> Result<(), ApplicationError> {
        let color = supports_color::on(supports_color::Stream::Stdout).is_some();
        let mut stdout = std::io::stdout().lock();
        Self::run_with_output(runtime, &mut stdout, color).await
    }

    /// Loads the image (unless creating a new one), runs the command and
    /// writes the image back if the command changed it. A failing command
    /// leaves the image file untouched.
    pub async fn run_with_output(
        runtime: impl Into<RuntimeConfig>,
        out: &mut impl Write,
        color: bool,
    ) -> Result<(), ApplicationError> {
        let runtime: RuntimeConfig = runtime.into();
        let settings = match &runtime.settings {
            Some(path) => Settings::read(path).await,
            None => Settings::read_or_default(Path::new(SETTINGS_FILE_NAME)).await,
        }
        .context(SettingsSnafu)?;
        debug!("Loaded settings: {:?}", settings);

        let image = runtime
            .image
            .clone()
            .or(settings.image)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_IMAGE_PATH));

        let mut tree = match runtime.command {
            Command::Mkfs => Tree::new(settings.limits),
            _ => Self::load(&image, settings.limits).await?,
        };

        commands::execute(&mut tree, &runtime.command, out, color)
            .await
            .context(CommandSnafu)?;

        if runtime.command.mutates() {
            Self::store(&tree, &image).await?;
        }

        Ok(())
    }

    async fn load(image: &Path, limits: Limits) -> Result<Tree, ApplicationError> {
        let file_path = image.best_effort_path_display();
        let bytes = match compio::fs::read(image).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return MissingImageSnafu { file_path }.fail();
            }
            Err(err) => return Err(err).context(LoadImageSnafu { file_path }),
        };

        let tree = codec::decode(&bytes, limits).context(ImportSnafu {
            file_path: file_path.clone(),
        })?;
        info!("Loaded {} bytes from image {}", bytes.len(), file_path);
        Ok(tree)
    }

    /// Writes through a staging file that is renamed over `image`. A failed
    /// write leaves the previous image intact.
    async fn store(tree: &Tree, image: &Path) -> Result<(), ApplicationError> {
        let file_path = image.best_effort_path_display();
        let bytes = codec::encode(tree).context(ExportSnafu {
            file_path: file_path.clone(),
        })?;
        let len = bytes.len();

        let staging = staging_path(image);
        let written = match compio::fs::write(&staging, bytes).await.0 {
            Ok(()) => compio::fs::rename(&staging, image).await,
            Err(err) => Err(err),
        };
        if let Err(err) = written {
            match compio::fs::remove_file(&staging).await {
                Err(cleanup) if cleanup.kind() != ErrorKind::NotFound => warn!(
                    "Failed to remove staging file {}: {}",
                    staging.best_effort_path_display(),
                    cleanup
                ),
                _ => {}
            }
            return Err(err).context(StoreImageSnafu { file_path });
        }

        info!("Wrote {} bytes to image {}", len, file_path);
        Ok(())
    }
}

/// `<image>.tmp`, in the same directory as `image`.
fn staging_path(image: &Path) -> PathBuf {
    let mut name = image
        .file_name()
        .map(OsString::from)
        .unwrap_or_else(|| OsString::from(DEFAULT_IMAGE_PATH));
    name.push(".tmp");
    image.with_file_name(name)
}

#[derive(Debug, Snafu)]
pub enum ApplicationError {
    #[snafu(display("Critical failure encountered while reading settings"))]
    SettingsError { source: SettingsError },
    #[snafu(display("Image {} does not exist (create it with 'mkfs')", file_path))]
    MissingImage { file_path: String },
    #[snafu(display("Failed to read image {}", file_path))]
    LoadImageError {
        file_path: String,
        source: std::io::Error,
    },
    #[snafu(display("Failed to import file system from {}", file_path))]
    ImportError {
        file_path: String,
        source: ImportError,
    },
    #[snafu(display("Failed to export file system for {}", file_path))]
    ExportError {
        file_path: String,
        source: ExportError,
    },
    #[snafu(display("Failed to write image {}", file_path))]
    StoreImageError {
        file_path: String,
        source: std::io::Error,
    },
    #[snafu(display("Command failed"))]
    CommandError { source: CommandError },
}
