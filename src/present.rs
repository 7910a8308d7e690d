//! Rendering of snapshots to the console and to export files.
//!
//! Every function here is a pure function of the snapshot it is given; none
//! of them collect data. Styling is passed per call instead of living in
//! process-wide terminal state.

use crate::snapshot::{bytes_to_gb, FullSnapshot, LiveReading};
use crossterm::style::Stylize;
use serde::Serialize;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;

const KEY_WIDTH: usize = 15;

/// Output capability of the surface being written to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Styling {
    Color,
    Plain,
}

impl Styling {
    pub fn for_console(color_enabled: bool) -> Self {
        if color_enabled {
            Styling::Color
        } else {
            Styling::Plain
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Text,
}

impl ExportFormat {
    /// `json` (any case) selects JSON; everything else is plain text.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => ExportFormat::Json,
            _ => ExportFormat::Text,
        }
    }
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("failed to write {path}: {source}")]
    Write { path: String, source: io::Error },
    #[error("failed to serialize snapshot: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// One titled block of `key: value` lines.
struct Section {
    key: &'static str,
    title: &'static str,
    lines: Vec<(String, String)>,
}

fn sections(snapshot: &FullSnapshot) -> Vec<Section> {
    let sys = &snapshot.system;
    let cpu = &snapshot.cpu;
    let mem = &snapshot.memory;
    let net = &snapshot.network;

    vec![
        Section {
            key: "system",
            title: "SYSTEM INFORMATION",
            lines: vec![
                ("os_name".into(), sys.os_name.clone()),
                ("host_name".into(), sys.host_name.clone()),
                ("os_release".into(), sys.os_release.clone()),
                ("os_version".into(), sys.os_version.clone()),
                ("machine_arch".into(), sys.machine_arch.clone()),
                ("processor".into(), sys.processor_label.clone()),
            ],
        },
        Section {
            key: "cpu",
            title: "CPU INFORMATION",
            lines: vec![
                (
                    "physical_cores".into(),
                    cpu.physical_core_count
                        .map(|n| n.to_string())
                        .unwrap_or_else(|| "unknown".to_string()),
                ),
                ("logical_cores".into(), cpu.logical_core_count.to_string()),
                (
                    "usage_per_core".into(),
                    format_percent_list(&cpu.per_core_usage_percent),
                ),
                ("total_usage".into(), format!("{:.1}%", cpu.total_usage_percent)),
            ],
        },
        Section {
            key: "memory",
            title: "MEMORY INFORMATION",
            lines: vec![
                ("total_gb".into(), mem.total_gb().to_string()),
                ("available_gb".into(), mem.available_gb().to_string()),
                ("used_gb".into(), mem.used_gb().to_string()),
                ("usage_percent".into(), format!("{:.1}%", mem.usage_percent)),
            ],
        },
        Section {
            key: "disk",
            title: "DISK INFORMATION",
            lines: snapshot
                .disk
                .iter()
                .map(|(device, usage)| {
                    (
                        device.to_string(),
                        format!(
                            "total {} GB, used {} GB, free {} GB ({:.1}%)",
                            bytes_to_gb(usage.total_bytes),
                            bytes_to_gb(usage.used_bytes),
                            bytes_to_gb(usage.free_bytes),
                            usage.usage_percent
                        ),
                    )
                })
                .collect(),
        },
        Section {
            key: "network",
            title: "NETWORK INFORMATION",
            lines: vec![
                ("host_name".into(), net.host_name.clone()),
                ("ip_address".into(), net.ip_address.clone()),
            ],
        },
    ]
}

fn format_percent_list(values: &[f64]) -> String {
    let parts: Vec<String> = values.iter().map(|v| format!("{v:.1}%")).collect();
    format!("[{}]", parts.join(", "))
}

fn write_kv<W: Write>(out: &mut W, key: &str, value: &str) -> io::Result<()> {
    writeln!(out, "{key:<width$}: {value}", width = KEY_WIDTH)
}

/// Human-readable report with a blank line before each section header.
pub fn render_console<W: Write>(
    out: &mut W,
    snapshot: &FullSnapshot,
    styling: Styling,
) -> io::Result<()> {
    for section in sections(snapshot) {
        let header = format!("=== {} ===", section.title);
        match styling {
            Styling::Color => writeln!(out, "\n{}", header.cyan())?,
            Styling::Plain => writeln!(out, "\n{header}")?,
        }
        for (key, value) in &section.lines {
            write_kv(out, key, value)?;
        }
    }
    Ok(())
}

/// Plain-text export: `=== KEY ===`, the lines, then one blank line.
pub fn render_text<W: Write>(out: &mut W, snapshot: &FullSnapshot) -> io::Result<()> {
    for section in sections(snapshot) {
        writeln!(out, "=== {} ===", section.key.to_uppercase())?;
        for (key, value) in &section.lines {
            write_kv(out, key, value)?;
        }
        writeln!(out)?;
    }
    Ok(())
}

/// JSON export, indented with four spaces.
pub fn render_json<W: Write>(out: &mut W, snapshot: &FullSnapshot) -> Result<(), ExportError> {
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(out, formatter);
    snapshot.serialize(&mut ser)?;
    Ok(())
}

pub fn render_live<W: Write>(
    out: &mut W,
    reading: &LiveReading,
    styling: Styling,
) -> io::Result<()> {
    let header = "=== LIVE MONITORING ===";
    match styling {
        Styling::Color => writeln!(out, "{}", header.cyan())?,
        Styling::Plain => writeln!(out, "{header}")?,
    }
    writeln!(out, "CPU Usage     : {:.1}%", reading.cpu_usage_percent)?;
    writeln!(out, "Memory Usage  : {:.1}%", reading.memory_usage_percent)?;
    Ok(())
}

/// Renders `snapshot` in the format implied by `path` and replaces the file
/// in one step.
pub fn export_to_file(path: &Path, snapshot: &FullSnapshot) -> Result<ExportFormat, ExportError> {
    let format = ExportFormat::from_path(path);
    let mut buf = Vec::new();
    match format {
        ExportFormat::Json => {
            render_json(&mut buf, snapshot)?;
            buf.push(b'\n');
        }
        ExportFormat::Text => {
            render_text(&mut buf, snapshot).map_err(|source| write_err(path, source))?
        }
    }
    write_atomic(path, &buf)?;
    Ok(format)
}

/// Writes through a temp file in the target's directory. An existing target
/// keeps its permissions, and a symlinked target is updated at the file it
/// points to rather than replaced by a regular file.
fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), ExportError> {
    let target = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
    let existing = fs::metadata(&target).ok().map(|meta| meta.permissions());
    let dir = parent_dir(&target);

    let mut tmp = temp_file_in(&dir).map_err(|source| write_err(path, source))?;
    if let Some(permissions) = existing {
        tmp.as_file()
            .set_permissions(permissions)
            .map_err(|source| write_err(path, source))?;
    }
    tmp.write_all(contents)
        .and_then(|_| tmp.as_file().sync_all())
        .map_err(|source| write_err(path, source))?;
    tmp.persist(&target).map_err(|err| write_err(path, err.error))?;
    Ok(())
}

/// New exports get the mode a plain `File::create` would give them.
#[cfg(unix)]
fn temp_file_in(dir: &Path) -> io::Result<NamedTempFile> {
    use std::os::unix::fs::PermissionsExt;

    tempfile::Builder::new()
        .permissions(fs::Permissions::from_mode(0o666))
        .tempfile_in(dir)
}

#[cfg(not(unix))]
fn temp_file_in(dir: &Path) -> io::Result<NamedTempFile> {
    NamedTempFile::new_in(dir)
}

fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

fn write_err(path: &Path, source: io::Error) -> ExportError {
    ExportError::Write {
        path: path.display().to_string(),
        source,
    }
}

pub fn export_notice<W: Write>(out: &mut W, path: &Path, styling: Styling) -> io::Result<()> {
    let text = format!("Data successfully exported to {}", path.display());
    match styling {
        Styling::Color => writeln!(out, "{}", text.green()),
        Styling::Plain => writeln!(out, "{text}"),
    }
}
