use std::{io::Write, path::Path};

use colored::Colorize;
use ramfs::{
    ext::BestEffortPathExt,
    filesystem::{Entry, Tree, TreeError},
};
use snafu::{ResultExt, Snafu};
use tracing::{debug, info};

use crate::cli::Command;

/// Runs one command against an already loaded tree. Output goes to `out`;
/// persisting the tree is left to the caller.
pub async fn execute(
    tree: &mut Tree,
    command: &Command,
    out: &mut impl Write,
    color: bool,
) -> Result<(), CommandError> {
    match command {
        Command::Mkfs => {
            info!("Initializing empty file system");
            Ok(())
        }
        Command::Cat { paths } => cat(tree, paths, out),
        Command::Cp {
            source,
            destination,
        } => cp(tree, source, destination).await,
        Command::Ls { paths } => ls(tree, paths, out, color),
        Command::Mkdir { paths } => each(paths, |path| tree.make_subdir(path).map(|_| ())),
        Command::Rm { paths } => each(paths, |path| tree.remove_file(path).map(|_| ())),
        Command::Rmdir { paths } => each(paths, |path| tree.remove_dir(path).map(|_| ())),
    }
}

fn each(
    paths: &[String],
    mut operation: impl FnMut(&str) -> Result<(), TreeError>,
) -> Result<(), CommandError> {
    for path in paths {
        operation(path).context(OperationSnafu)?;
    }
    Ok(())
}

fn cat(tree: &Tree, paths: &[String], out: &mut impl Write) -> Result<(), CommandError> {
    for path in paths {
        let file = tree.resolve_file(path).context(OperationSnafu)?;
        out.write_all(file.data()).context(OutputSnafu)?;
    }
    Ok(())
}

async fn cp(tree: &mut Tree, source: &Path, destination: &str) -> Result<(), CommandError> {
    let bytes = compio::fs::read(source).await.context(SourceSnafu {
        file_path: source.best_effort_path_display(),
    })?;
    debug!(
        "Copying {} bytes from {} to '{}'",
        bytes.len(),
        source.best_effort_path_display(),
        destination
    );

    tree.make_file(destination)
        .context(OperationSnafu)?
        .replace_data(bytes);
    Ok(())
}

fn ls(tree: &Tree, paths: &[String], out: &mut impl Write, color: bool) -> Result<(), CommandError> {
    let root = [String::from("/")];
    let paths = if paths.is_empty() { &root[..] } else { paths };

    for path in paths {
        let dir = tree.resolve_dir(path).context(OperationSnafu)?;
        writeln!(out, "{}:", path).context(OutputSnafu)?;

        for entry in dir.entries() {
            let name = match entry {
                Entry::Directory(_) if color => entry.name().blue().bold().to_string(),
                _ => entry.name().to_string(),
            };
            writeln!(out, "{} : {}", entry.kind(), name).context(OutputSnafu)?;
        }
    }
    Ok(())
}

#[derive(Debug, Snafu)]
pub enum CommandError {
    #[snafu(display("File system operation failed"))]
    OperationError { source: TreeError },
    #[snafu(display("Failed to read source file {}", file_path))]
    SourceError {
        file_path: String,
        source: std::io::Error,
    },
    #[snafu(display("Failed to write command output"))]
    OutputError { source: std::io::Error },
}
