use anyhow::Result;
use fs_err::File;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Creates a spinner for monitoring a scan whose row count is not known up front.
pub fn progress_spinner_for_rows(table: &str) -> ProgressBar {
    let style = ProgressStyle::with_template(
        "[{elapsed_precise}] {spinner} {msg}: {human_pos} rows ({per_sec})",
    )
    .unwrap_or_else(|_| ProgressStyle::default_spinner());
    ProgressBar::new_spinner()
        .with_style(style)
        .with_message(table.to_string())
}

pub fn write_json_file<T: Serialize>(
    file_name: String,
    output_directory: &str,
    data: T,
) -> Result<()> {
    let path = format!("{output_directory}/{file_name}.json");
    log::info!("Writing to {path}");
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer(&mut writer, &data)?;
    writer.flush()?;
    Ok(())
}

/// Writes `\n` terminated lines next to `path` and renames the result into place,
/// so `path` never holds a half-written file.
pub fn write_lines_atomically<I, L>(path: &Path, lines: I) -> std::io::Result<usize>
where
    I: IntoIterator<Item = L>,
    L: std::fmt::Display,
{
    let partial_path = partial_path_for(path);
    let written = write_lines(&partial_path, lines);
    match written {
        Ok(count) => {
            fs_err::rename(&partial_path, path)?;
            Ok(count)
        }
        Err(e) => {
            let _ = fs_err::remove_file(&partial_path);
            Err(e)
        }
    }
}

fn write_lines<I, L>(path: &Path, lines: I) -> std::io::Result<usize>
where
    I: IntoIterator<Item = L>,
    L: std::fmt::Display,
{
    let mut writer = BufWriter::new(File::create(path)?);
    let mut count = 0;
    for line in lines {
        writeln!(writer, "{line}")?;
        count += 1;
    }
    writer.flush()?;
    Ok(count)
}

fn partial_path_for(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".partial");
    path.with_file_name(name)
}

/// Removes an output file left by this or a previous run. Missing files are fine.
pub fn remove_output(path: &Path) {
    if path.exists() {
        match fs_err::remove_file(path) {
            Ok(()) => log::warn!("Removed output file {}", path.display()),
            Err(e) => log::error!("Could not remove output file: {e}"),
        }
    }
}
