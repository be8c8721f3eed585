use crate::error::Error;
use log::{debug, info, warn};
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

/// Extracts every file entry of a zip archive into `dest_dir`.
///
/// Entries whose names would escape `dest_dir` are skipped. A corrupt archive fails the
/// whole extraction.
///
/// # Returns
/// The paths of the extracted files, in archive order.
pub fn unpack(archive_path: &Path, dest_dir: &Path) -> Result<Vec<PathBuf>, Error> {
    debug!("unpacking {} into {}", archive_path.display(), dest_dir.display());

    fs::create_dir_all(dest_dir)?;
    let mut archive = zip::ZipArchive::new(File::open(archive_path)?)?;

    let mut extracted = Vec::with_capacity(archive.len());
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;

        let target = match entry.enclosed_name() {
            Some(name) => dest_dir.join(name),
            None => {
                warn!("skipping entry with unsafe path: {}", entry.name());
                continue;
            }
        };

        if entry.is_dir() {
            fs::create_dir_all(&target)?;
            continue;
        }

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut out = File::create(&target)?;
        io::copy(&mut entry, &mut out)?;
        extracted.push(target);
    }

    info!(
        "extracted {} file(s) from {}",
        extracted.len(),
        archive_path.display()
    );
    Ok(extracted)
}
