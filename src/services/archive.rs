use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::debug;
use zip::CompressionMethod;
use zip::write::{FileOptions, ZipWriter};

use crate::services::staging::StagedFile;

pub struct ArchiveSummary {
    pub path: PathBuf,
    pub entries: usize,
    pub bytes: u64,
}

/// Packages staged files into a single deflate-compressed ZIP container.
pub struct ArchiveAssembler;

impl ArchiveAssembler {
    /// Write one entry per staged file, named after its basename, in input order.
    /// Entry contents are copied byte for byte.
    pub fn assemble(staged: &[StagedFile], dest: &Path) -> Result<ArchiveSummary> {
        let file = File::create(dest)
            .with_context(|| format!("Failed to create archive {}", dest.display()))?;
        let mut zip = ZipWriter::new(BufWriter::new(file));
        let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

        for entry in staged {
            zip.start_file(entry.basename.as_str(), options)
                .with_context(|| format!("Failed to add ZIP entry {}", entry.basename))?;

            let mut source = File::open(&entry.local_path).with_context(|| {
                format!("Failed to open staged file {}", entry.local_path.display())
            })?;
            std::io::copy(&mut source, &mut zip)
                .with_context(|| format!("Failed to write ZIP entry {}", entry.basename))?;

            debug!("Archived {} as {} ({} bytes)", entry.source_key, entry.basename, entry.size);
        }

        let mut writer = zip.finish().context("Failed to finalize ZIP archive")?;
        writer.flush().context("Failed to flush ZIP archive")?;
        drop(writer);

        let bytes = std::fs::metadata(dest)
            .with_context(|| format!("Failed to stat archive {}", dest.display()))?
            .len();

        Ok(ArchiveSummary {
            path: dest.to_path_buf(),
            entries: staged.len(),
            bytes,
        })
    }
}
