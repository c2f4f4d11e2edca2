use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One duplex from the validation corpus. `structure` covers both strands
/// joined by '+', `pairing_mask` covers both strands with no separator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub seq_a: String,
    pub seq_b: String,
    pub energy: f64,
    pub pairing_mask: String,
    pub structure: String,
}

impl Item {
    pub fn strand_len(&self) -> usize {
        self.seq_a.chars().count()
    }
}

/// Wire form of a corpus row, kept as a tuple so corpora written by the
/// dataset generator load back unchanged.
pub type RawRow = (String, String, f64, String, String);

impl Item {
    pub fn to_row(&self) -> RawRow {
        (
            self.seq_a.clone(),
            self.seq_b.clone(),
            self.energy,
            self.pairing_mask.clone(),
            self.structure.clone(),
        )
    }
}

#[derive(Debug, Error)]
pub enum CorpusError {
    #[error("failed to read corpus {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse corpus {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("corpus row {index} is malformed: {reason}")]
    MalformedRow { index: usize, reason: String },
}

pub fn load_items(path: &Path) -> Result<Vec<Item>, CorpusError> {
    let content = fs::read_to_string(path).map_err(|source| CorpusError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let rows: Vec<RawRow> = serde_json::from_str(&content).map_err(|source| CorpusError::Parse {
        path: path.display().to_string(),
        source,
    })?;
    rows.into_iter()
        .enumerate()
        .map(|(index, row)| item_from_row(index, row))
        .collect()
}

pub fn item_from_row(index: usize, row: RawRow) -> Result<Item, CorpusError> {
    let (seq_a, seq_b, energy, pairing_mask, structure) = row;
    let strand_len = seq_a.chars().count();

    if strand_len == 0 {
        return Err(malformed(index, "first strand is empty"));
    }
    if seq_b.chars().count() != strand_len {
        return Err(malformed(index, "strands differ in length"));
    }
    for (label, strand) in [("first", &seq_a), ("second", &seq_b)] {
        if !strand.chars().all(|c| matches!(c, 'A' | 'C' | 'G' | 'T')) {
            return Err(malformed(index, &format!("{label} strand has symbols outside ACGT")));
        }
    }
    if pairing_mask.chars().count() != strand_len * 2
        || !pairing_mask.chars().all(|c| matches!(c, '0' | '1'))
    {
        return Err(malformed(index, "pairing mask must be binary over both strands"));
    }
    if structure.chars().count() != strand_len * 2 + 1 {
        return Err(malformed(index, "structure must cover both strands and the strand break"));
    }
    if structure.chars().nth(strand_len) != Some('+') {
        return Err(malformed(index, "structure is missing '+' at the strand break"));
    }
    if !structure.chars().all(|c| matches!(c, '(' | ')' | '.' | '+')) {
        return Err(malformed(index, "structure has symbols outside ().+"));
    }

    Ok(Item {
        seq_a,
        seq_b,
        energy,
        pairing_mask,
        structure,
    })
}

fn malformed(index: usize, reason: &str) -> CorpusError {
    CorpusError::MalformedRow {
        index,
        reason: reason.to_string(),
    }
}
