//! Chunk file reading and output file writing
//!
//! Input files are JSON, holding either a single chunk object or an array
//! of chunks. Each input produces three JSON output files next to each
//! other in the output directory:
//!
//! - `<stem>.raw_records_coin_nv.json`: kept records of all chunks
//! - `<stem>.lone_raw_records_nv.json`: retained lone records of all chunks
//! - `<stem>.lone_raw_record_statistics_nv.json`: one statistics row per chunk

use crate::recorder::{Chunk, RecorderOutput};
use nveto_common::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

pub const RAW_RECORDS_COIN_SUFFIX: &str = "raw_records_coin_nv.json";
pub const LONE_RAW_RECORDS_SUFFIX: &str = "lone_raw_records_nv.json";
pub const LONE_STATISTICS_SUFFIX: &str = "lone_raw_record_statistics_nv.json";

#[derive(Deserialize)]
#[serde(untagged)]
enum ChunkFile {
    Many(Vec<Chunk>),
    One(Chunk),
}

/// Read the chunks stored in a JSON file
pub fn read_chunks(path: &Path) -> Result<Vec<Chunk>> {
    let file = File::open(path).map_err(|e| {
        Error::InvalidInput(format!("Failed to open {}: {}", path.display(), e))
    })?;
    let chunks = match serde_json::from_reader(BufReader::new(file))? {
        ChunkFile::Many(chunks) => chunks,
        ChunkFile::One(chunk) => vec![chunk],
    };
    debug!(path = %path.display(), chunks = chunks.len(), "Read chunk file");
    Ok(chunks)
}

/// Paths of the three output files for one input stem
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPaths {
    pub raw_records_coin: PathBuf,
    pub lone_raw_records: PathBuf,
    pub lone_raw_record_statistics: PathBuf,
}

impl OutputPaths {
    pub fn new(output_dir: &Path, stem: &str) -> Self {
        let name = |suffix: &str| output_dir.join(format!("{}.{}", stem, suffix));
        Self {
            raw_records_coin: name(RAW_RECORDS_COIN_SUFFIX),
            lone_raw_records: name(LONE_RAW_RECORDS_SUFFIX),
            lone_raw_record_statistics: name(LONE_STATISTICS_SUFFIX),
        }
    }

    /// Output paths for an input file, using the file stem
    pub fn for_input(output_dir: &Path, input: &Path) -> Self {
        let stem = input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "chunk".to_string());
        Self::new(output_dir, &stem)
    }
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer(&mut writer, value)?;
    writer.flush()?;
    Ok(())
}

/// Write recorder outputs of one input file
pub fn write_outputs(paths: &OutputPaths, outputs: &[RecorderOutput]) -> Result<()> {
    if let Some(parent) = paths.raw_records_coin.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let coin: Vec<_> = outputs.iter().flat_map(|o| &o.raw_records_coin).collect();
    let lone: Vec<_> = outputs.iter().flat_map(|o| &o.lone_raw_records).collect();
    let statistics: Vec<_> = outputs.iter().map(|o| &o.lone_raw_record_statistics).collect();

    write_json(&paths.raw_records_coin, &coin)?;
    write_json(&paths.lone_raw_records, &lone)?;
    write_json(&paths.lone_raw_record_statistics, &statistics)?;

    debug!(
        coin = coin.len(),
        lone = lone.len(),
        rows = statistics.len(),
        "Wrote recorder outputs"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use nveto_common::RawRecord;
    use tempfile::TempDir;

    #[test]
    fn test_output_names_follow_input_stem() {
        let paths = OutputPaths::for_input(Path::new("/out"), Path::new("/data/run_0042.json"));
        assert_eq!(
            paths.raw_records_coin,
            PathBuf::from("/out/run_0042.raw_records_coin_nv.json")
        );
        assert_eq!(
            paths.lone_raw_record_statistics,
            PathBuf::from("/out/run_0042.lone_raw_record_statistics_nv.json")
        );
    }

    #[test]
    fn test_single_chunk_object_and_array() {
        let dir = TempDir::new().unwrap();
        let chunk = Chunk::new(0, 100, vec![RawRecord::single(10, 2000, 2, vec![1, 2])]);

        let one = dir.path().join("one.json");
        std::fs::write(&one, serde_json::to_string(&chunk).unwrap()).unwrap();
        assert_eq!(read_chunks(&one).unwrap(), vec![chunk.clone()]);

        let many = dir.path().join("many.json");
        let both = vec![chunk.clone(), Chunk::new(100, 200, vec![])];
        std::fs::write(&many, serde_json::to_string(&both).unwrap()).unwrap();
        assert_eq!(read_chunks(&many).unwrap(), both);
    }

    #[test]
    fn test_chunk_without_records_field() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bare.json");
        std::fs::write(&path, r#"{"start": 0, "end": 50}"#).unwrap();
        let chunks = read_chunks(&path).unwrap();
        assert_eq!(chunks, vec![Chunk::new(0, 50, vec![])]);
    }

    #[test]
    fn test_missing_file_names_path() {
        let err = read_chunks(Path::new("/nonexistent/nveto-chunks.json")).unwrap_err();
        assert!(err.to_string().contains("nveto-chunks.json"));
    }
}
