use std::{
    borrow::Cow,
    io::ErrorKind,
    path::{Path, PathBuf},
    string::FromUtf8Error,
};

use hashlink::LinkedHashMap;
use saphyr::{LoadableYamlNode, Scalar, Yaml};
use snafu::prelude::*;
use tracing::{debug, info};

use crate::{ext::BestEffortPathExt, filesystem::Limits};

pub const SETTINGS_FILE_NAME: &str = "ramfs.yaml";

fn key(name: &'static str) -> Yaml<'static> {
    Yaml::Value(Scalar::String(Cow::Borrowed(name)))
}

/// Optional tool settings read from a YAML file.
///
/// ```yaml
/// image: boot/ramfs.img
/// limits:
///   max_name_length: 64
///   max_depth: 16
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Settings {
    pub image: Option<PathBuf>,
    pub limits: Limits,
}

impl Settings {
    /// Reads settings that the user asked for explicitly; a missing file is an error.
    pub async fn read(path: &Path) -> Result<Self, SettingsError> {
        debug!("Opening settings file: {}", path.best_effort_path_display());
        let bytes = compio::fs::read(path).await.context(ReadSnafu {
            file_path: path.best_effort_path_display(),
        })?;
        Self::from_bytes(path, bytes)
    }

    /// Reads settings from a conventional location, falling back to the
    /// defaults when the file does not exist.
    pub async fn read_or_default(path: &Path) -> Result<Self, SettingsError> {
        match compio::fs::read(path).await {
            Ok(bytes) => Self::from_bytes(path, bytes),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    "No settings file at {}, using defaults",
                    path.best_effort_path_display()
                );
                Ok(Self::default())
            }
            Err(err) => Err(err).context(ReadSnafu {
                file_path: path.best_effort_path_display(),
            }),
        }
    }

    fn from_bytes(path: &Path, bytes: Vec<u8>) -> Result<Self, SettingsError> {
        debug!("Read {} bytes of settings", bytes.len());
        let contents = String::from_utf8(bytes).context(EncodingSnafu {
            file_path: path.best_effort_path_display(),
        })?;
        contents.as_str().try_into()
    }

    fn parse_limits(limits: &LinkedHashMap<Yaml, Yaml>) -> Result<Limits, SettingsError> {
        let defaults = Limits::default();
        Ok(Limits {
            max_name_len: Self::parse_bound(
                limits,
                "max_name_length",
                defaults.max_name_len,
                Limits::NAME_LEN_CEILING,
            )?,
            max_depth: Self::parse_bound(
                limits,
                "max_depth",
                defaults.max_depth,
                Limits::DEPTH_CEILING,
            )?,
        })
    }

    fn parse_bound(
        limits: &LinkedHashMap<Yaml, Yaml>,
        name: &'static str,
        default: usize,
        ceiling: usize,
    ) -> Result<usize, SettingsError> {
        let value = match limits.get(&key(name)) {
            None => return Ok(default),
            Some(Yaml::Value(Scalar::Integer(value))) => *value,
            Some(_) => {
                return InvalidValueSnafu {
                    key: name,
                    expected: "an integer",
                }
                .fail();
            }
        };

        usize::try_from(value)
            .ok()
            .filter(|bound| (1..=ceiling).contains(bound))
            .context(LimitOutOfRangeSnafu {
                key: name,
                value,
                max: ceiling,
            })
    }
}

impl TryFrom<&str> for Settings {
    type Error = SettingsError;

    fn try_from(contents: &str) -> Result<Self, Self::Error> {
        let documents = Yaml::load_from_str(contents).context(ParseSnafu)?;
        let document = documents.first().context(MalformedSettingsSnafu)?;
        let top_level = document.as_mapping().context(TopLevelNotMapSnafu)?;

        for (name, _) in top_level.iter() {
            match name.as_str() {
                Some("image" | "limits") => {}
                other => debug!("Ignoring unknown settings key: {:?}", other),
            }
        }

        let image = match top_level.get(&key("image")) {
            None => None,
            Some(value) => Some(
                value
                    .as_str()
                    .map(PathBuf::from)
                    .context(InvalidValueSnafu {
                        key: "image",
                        expected: "a path string",
                    })?,
            ),
        };

        let limits = match top_level.get(&key("limits")) {
            None => Limits::default(),
            Some(value) => {
                let mapping = value.as_mapping().context(InvalidValueSnafu {
                    key: "limits",
                    expected: "a map",
                })?;
                Self::parse_limits(mapping)?
            }
        };

        Ok(Settings { image, limits })
    }
}

#[derive(Debug, Snafu)]
pub enum SettingsError {
    #[snafu(display("Failed to read the settings file: {}", file_path))]
    ReadError {
        file_path: String,
        source: std::io::Error,
    },
    #[snafu(display("Settings file {} is not valid UTF-8", file_path))]
    EncodingError {
        file_path: String,
        source: FromUtf8Error,
    },
    #[snafu(display("Failed to parse the settings file"))]
    ParseError { source: saphyr::ScanError },
    #[snafu(display("Improperly formatted settings file"))]
    MalformedSettings,
    #[snafu(display("Top level of settings should be a map"))]
    TopLevelNotMap,
    #[snafu(display("Setting '{}' should be {}", key, expected))]
    InvalidValue {
        key: String,
        expected: &'static str,
    },
    #[snafu(display("Setting '{}' is {}, expected 1 to {}", key, value, max))]
    LimitOutOfRange { key: String, value: i64, max: usize },
}
