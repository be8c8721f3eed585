use chrono::NaiveDate;
use std::fs::File;
use std::io::Read;
use std::path::Path;

const SPREADSHEET_EXTENSIONS: &[&str] = &["xls", "xlsx"];

const ZIP_LOCAL_FILE_HEADER: [u8; 4] = [0x50, 0x4B, 0x03, 0x04];
const ZIP_EMPTY_ARCHIVE: [u8; 4] = [0x50, 0x4B, 0x05, 0x06];

/// How a downloaded report file has to be handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Spreadsheet,
    Archive,
    /// Neither a workbook nor an archive; uploaded unmodified.
    PassThrough,
}

/// Classifies by extension for workbooks and by signature for archives.
///
/// Files that cannot be read degrade to [`FileFormat::PassThrough`].
pub fn classify_file(path: &Path) -> FileFormat {
    let is_spreadsheet = path
        .extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .is_some_and(|ext| SPREADSHEET_EXTENSIONS.contains(&ext.as_str()));

    if is_spreadsheet {
        FileFormat::Spreadsheet
    } else if has_zip_signature(path) {
        FileFormat::Archive
    } else {
        FileFormat::PassThrough
    }
}

fn has_zip_signature(path: &Path) -> bool {
    let mut header = [0u8; 4];
    File::open(path)
        .and_then(|mut file| file.read_exact(&mut header))
        .map(|_| matches!(header, ZIP_LOCAL_FILE_HEADER | ZIP_EMPTY_ARCHIVE))
        .unwrap_or(false)
}

/// The files found inside the brand and ASIN report archives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveEntry {
    /// `<advertiser> ASIN Hierarchy.csv`, published as-is.
    Hierarchy,
    /// `<advertiser> <date> ASIN Movement Report.csv`, published as-is.
    Movement,
    /// `<advertiser> <date> ASIN Grain Report.csv`, one row per period; the `period` column is split.
    Grain,
    /// `metrics.csv`, wide table that is melted.
    Metrics,
    Unknown,
}

impl ArchiveEntry {
    /// Storage category the entry is published under, `None` for unknown entries.
    pub fn category(&self) -> Option<&'static str> {
        match self {
            ArchiveEntry::Hierarchy => Some("asin_hierarchy"),
            ArchiveEntry::Movement => Some("asin_movement"),
            ArchiveEntry::Grain => Some("grain_report"),
            ArchiveEntry::Metrics => Some("metrics"),
            ArchiveEntry::Unknown => None,
        }
    }

    /// Name of the reshaped file written to the prepared directory.
    pub fn prepared_file_name(&self) -> Option<&'static str> {
        match self {
            ArchiveEntry::Grain => Some("asin_grain_report.csv"),
            ArchiveEntry::Metrics => Some("metrics.csv"),
            _ => None,
        }
    }
}

/// Resolves an extracted file name to its entry kind by exact match.
///
/// Dated names are accepted with either the index date exactly as the API listed it, which
/// may be unpadded (`2024-3-17`), or its zero-padded form.
pub fn classify_entry(
    file_name: &str,
    advertiser_id: &str,
    index_date: &str,
    date: NaiveDate,
) -> ArchiveEntry {
    let padded = date.format("%Y-%m-%d").to_string();
    let dated = |suffix: &str| {
        [index_date, padded.as_str()]
            .iter()
            .any(|d| file_name == format!("{} {} {}", advertiser_id, d, suffix))
    };

    if file_name == format!("{} ASIN Hierarchy.csv", advertiser_id) {
        ArchiveEntry::Hierarchy
    } else if dated("ASIN Movement Report.csv") {
        ArchiveEntry::Movement
    } else if dated("ASIN Grain Report.csv") {
        ArchiveEntry::Grain
    } else if file_name == "metrics.csv" {
        ArchiveEntry::Metrics
    } else {
        ArchiveEntry::Unknown
    }
}
