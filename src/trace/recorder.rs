use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use thiserror::Error;

use crate::trace::Trace;

#[derive(Debug, Error)]
pub enum TraceError {
    #[error("failed to open trace file {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write trace: {0}")]
    Write(#[source] std::io::Error),
    #[error("failed to read trace file: {0}")]
    Read(#[source] std::io::Error),
    #[error("failed to encode trace: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("trace file {path} line {line} is malformed: {source}")]
    Decode {
        path: String,
        line: usize,
        #[source]
        source: serde_json::Error,
    },
}

/// Append-as-you-go sink so a run interrupted halfway still leaves every
/// finished item on disk. One JSON object per line; the file is truncated at
/// the start of each run.
pub struct TraceWriter {
    writer: BufWriter<File>,
    written: usize,
}

impl TraceWriter {
    pub fn create(path: &Path) -> Result<Self, TraceError> {
        let file = File::create(path).map_err(|source| TraceError::Open {
            path: path.display().to_string(),
            source,
        })?;
        Ok(Self {
            writer: BufWriter::new(file),
            written: 0,
        })
    }

    pub fn append(&mut self, trace: &Trace) -> Result<(), TraceError> {
        let line = serde_json::to_string(trace).map_err(TraceError::Encode)?;
        self.writer.write_all(line.as_bytes()).map_err(TraceError::Write)?;
        self.writer.write_all(b"\n").map_err(TraceError::Write)?;
        self.writer.flush().map_err(TraceError::Write)?;
        self.written += 1;
        Ok(())
    }

    /// Number of traces written once the file handle is released.
    pub fn finish(mut self) -> Result<usize, TraceError> {
        self.writer.flush().map_err(TraceError::Write)?;
        self.writer
            .get_ref()
            .sync_all()
            .map_err(TraceError::Write)?;
        Ok(self.written)
    }
}

pub fn read_traces(path: &Path) -> Result<Vec<Trace>, TraceError> {
    let file = File::open(path).map_err(|source| TraceError::Open {
        path: path.display().to_string(),
        source,
    })?;
    let reader = BufReader::new(file);
    let mut traces = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line.map_err(TraceError::Read)?;
        if line.trim().is_empty() {
            continue;
        }
        let trace = serde_json::from_str(&line).map_err(|source| TraceError::Decode {
            path: path.display().to_string(),
            line: index + 1,
            source,
        })?;
        traces.push(trace);
    }
    Ok(traces)
}
