//! Application bits packaging.
//!
//! A directory is zipped with sorted relative paths so the same tree
//! always yields the same archive; a detected war file is uploaded as it
//! is. Each archive carries a blake3 fingerprint for logs.

use std::fs;
use std::io::{Cursor, Write};
use std::path::Path;

use anyhow::Context;
use tracing::debug;
use zip::write::SimpleFileOptions;

/// Directory names never uploaded.
const SKIPPED_DIRS: &[&str] = &[".git", ".svn", ".hg"];

const KIB: usize = 1024;
const MIB: usize = 1024 * 1024;

/// Zipped application ready for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bits {
    pub archive: Vec<u8>,
    pub fingerprint: String,
}

impl Bits {
    fn new(archive: Vec<u8>) -> Self {
        let fingerprint = blake3::hash(&archive).to_hex().to_string();
        Self {
            archive,
            fingerprint,
        }
    }

    pub fn len(&self) -> usize {
        self.archive.len()
    }

    pub fn is_empty(&self) -> bool {
        self.archive.is_empty()
    }

    /// Upload size as `NM` or `NK`.
    pub fn size_label(&self) -> String {
        upload_size_label(self.len())
    }

    pub fn into_archive(self) -> Vec<u8> {
        self.archive
    }
}

pub fn upload_size_label(size: usize) -> String {
    if size > MIB {
        format!("{}M", (size as f64 / MIB as f64).round())
    } else if size > 0 {
        format!("{}K", (size as f64 / KIB as f64).round())
    } else {
        "0K".to_string()
    }
}

/// Package `dir`, or `war_file` verbatim when one was detected.
pub fn package(dir: &Path, war_file: Option<&Path>) -> anyhow::Result<Bits> {
    let bits = match war_file {
        Some(war) => {
            let archive = fs::read(war)
                .with_context(|| format!("Failed to read war file: {}", war.display()))?;
            Bits::new(archive)
        }
        None => Bits::new(zip_dir(dir)?),
    };
    debug!(
        dir = %dir.display(),
        size = bits.len(),
        fingerprint = %bits.fingerprint,
        "packaged application bits"
    );
    Ok(bits)
}

/// Zip every regular file under `dir`, paths relative to `dir`.
pub fn zip_dir(dir: &Path) -> anyhow::Result<Vec<u8>> {
    let mut buf = Cursor::new(Vec::new());
    {
        let mut zip = zip::ZipWriter::new(&mut buf);
        let options = SimpleFileOptions::default().last_modified_time(zip::DateTime::default());
        add_dir_recursive(&mut zip, options, dir, "")?;
        zip.finish().context("Failed to finish zip archive")?;
    }
    Ok(buf.into_inner())
}

fn add_dir_recursive<W: Write + std::io::Seek>(
    zip: &mut zip::ZipWriter<W>,
    options: SimpleFileOptions,
    dir: &Path,
    base: &str,
) -> anyhow::Result<()> {
    let entries = fs::read_dir(dir)
        .with_context(|| format!("Failed to read directory: {}", dir.display()))?;

    let mut sorted_entries: Vec<_> = entries
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("Failed to read directory entries: {}", dir.display()))?;
    sorted_entries.sort_by_key(|e| e.file_name());

    for entry in sorted_entries {
        let name = entry.file_name();
        let name_str = name.to_string_lossy();
        let rel_path = if base.is_empty() {
            name_str.to_string()
        } else {
            format!("{base}/{name_str}")
        };

        let ty = entry
            .file_type()
            .with_context(|| format!("Failed to stat file: {}", entry.path().display()))?;

        if ty.is_dir() {
            if SKIPPED_DIRS.contains(&name_str.as_ref()) {
                continue;
            }
            zip.add_directory(rel_path.as_str(), options)
                .with_context(|| format!("Failed to add directory: {rel_path}"))?;
            add_dir_recursive(zip, options, &entry.path(), &rel_path)?;
        } else if ty.is_file() {
            let content = fs::read(entry.path())
                .with_context(|| format!("Failed to read file: {}", entry.path().display()))?;
            zip.start_file(rel_path.as_str(), options)
                .with_context(|| format!("Failed to add file: {rel_path}"))?;
            zip.write_all(&content)
                .with_context(|| format!("Failed to write file: {rel_path}"))?;
        } else {
            anyhow::bail!(
                "Unsupported filesystem entry type: {}",
                entry.path().display()
            );
        }
    }
    Ok(())
}
