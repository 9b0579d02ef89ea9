//! Interaction sinks for tournament output
//! - InteractionSink: trait the tournament streams rows into
//! - FileSink:        JSON-lines file at a caller path
//! - TempFileSink:    JSON-lines temporary file, removed on drop
//! - MemorySink:      rows kept in memory

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::error::Result;
use crate::interaction::{read_rows, InteractionRow};

/// Destination for one row per (matchup, repetition).
pub trait InteractionSink: Send {
    fn write_row(&mut self, row: &InteractionRow) -> Result<()>;

    /// Flush buffered rows
    fn finish(&mut self) -> Result<()>;

    /// Every row written so far, in write order
    fn read_back(&mut self) -> Result<Vec<InteractionRow>>;
}

fn write_line(writer: &mut impl Write, row: &InteractionRow) -> Result<()> {
    serde_json::to_writer(&mut *writer, row)?;
    writer.write_all(b"\n")?;
    Ok(())
}

/// JSONL file sink.
pub struct FileSink {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl FileSink {
    /// Create a new sink writing to `path`, truncating any existing file.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path)?;
        Ok(Self {
            path,
            writer: BufWriter::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl InteractionSink for FileSink {
    fn write_row(&mut self, row: &InteractionRow) -> Result<()> {
        write_line(&mut self.writer, row)
    }

    fn finish(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }

    fn read_back(&mut self) -> Result<Vec<InteractionRow>> {
        self.finish()?;
        read_rows(&self.path)
    }
}

/// JSONL sink on a temporary file that disappears with the sink.
pub struct TempFileSink {
    writer: BufWriter<NamedTempFile>,
}

impl TempFileSink {
    pub fn new() -> Result<Self> {
        Ok(Self {
            writer: BufWriter::new(NamedTempFile::new()?),
        })
    }

    pub fn path(&self) -> &Path {
        self.writer.get_ref().path()
    }
}

impl InteractionSink for TempFileSink {
    fn write_row(&mut self, row: &InteractionRow) -> Result<()> {
        write_line(&mut self.writer, row)
    }

    fn finish(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }

    fn read_back(&mut self) -> Result<Vec<InteractionRow>> {
        self.finish()?;
        read_rows(self.writer.get_ref().path())
    }
}

/// Sink that keeps rows in memory.
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    rows: Vec<InteractionRow>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rows(&self) -> &[InteractionRow] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<InteractionRow> {
        self.rows
    }
}

impl InteractionSink for MemorySink {
    fn write_row(&mut self, row: &InteractionRow) -> Result<()> {
        self.rows.push(row.clone());
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        Ok(())
    }

    fn read_back(&mut self) -> Result<Vec<InteractionRow>> {
        Ok(self.rows.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{C, D};

    fn row(repetition: usize) -> InteractionRow {
        InteractionRow::new((0, 1), repetition, ("A".into(), "B".into()), &[(C, D)])
    }

    fn exercise(sink: &mut dyn InteractionSink) {
        sink.write_row(&row(0)).unwrap();
        sink.write_row(&row(1)).unwrap();
        sink.finish().unwrap();
        assert_eq!(sink.read_back().unwrap(), vec![row(0), row(1)]);
    }

    #[test]
    fn test_file_sink() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rows.jsonl");
        let mut sink = FileSink::create(&path).unwrap();
        exercise(&mut sink);
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().count(), 2);
        assert_eq!(sink.path(), path.as_path());
    }

    #[test]
    fn test_temp_file_sink_is_removed() {
        let mut sink = TempFileSink::new().unwrap();
        exercise(&mut sink);
        let path = sink.path().to_path_buf();
        assert!(path.exists());
        drop(sink);
        assert!(!path.exists());
    }

    #[test]
    fn test_memory_sink() {
        let mut sink = MemorySink::new();
        exercise(&mut sink);
        assert_eq!(sink.rows().len(), 2);
        assert_eq!(sink.into_rows()[1].repetition, 1);
    }
}
