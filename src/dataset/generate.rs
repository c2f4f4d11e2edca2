use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use rand::rngs::StdRng;
use rand::seq::index;
use rand::{Rng, SeedableRng};

use crate::corpus::{Item, RawRow};
use crate::dataset::{DatasetConfig, DatasetError};
use crate::dna;
use crate::fold::{pairing_mask, FoldPort};

const NUCLEOTIDES: [char; 4] = ['A', 'T', 'C', 'G'];

#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedSets {
    pub train: Vec<Item>,
    pub validation: Vec<Item>,
}

/// Samples near-complementary strand pairs, folds each through the backend,
/// and keeps the ones whose structure stays within its own strand halves and
/// agrees with the pairing mask. Deterministic for a fixed seed and backend.
pub async fn generate(
    config: &DatasetConfig,
    fold: &dyn FoldPort,
) -> Result<GeneratedSets, DatasetError> {
    if config.min_len == 0 || config.max_len < config.min_len {
        return Err(DatasetError::InvalidParams(format!(
            "strand length bounds {}..={} are unusable",
            config.min_len, config.max_len
        )));
    }
    if config.validation_size >= config.size {
        return Err(DatasetError::InvalidParams(format!(
            "validation size {} must be below total size {}",
            config.validation_size, config.size
        )));
    }
    if !(0.0..=1.0).contains(&config.mismatch_fraction) {
        return Err(DatasetError::InvalidParams(format!(
            "mismatch fraction {} must lie in 0..=1",
            config.mismatch_fraction
        )));
    }

    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut seen: HashSet<(String, String)> = HashSet::new();
    let mut items: Vec<Item> = Vec::with_capacity(config.size);

    while items.len() < config.size {
        let strand_len = rng.gen_range(config.min_len..=config.max_len);
        let cap = (strand_len as f64 * config.mismatch_fraction).round() as usize;
        let mismatches = rng.gen_range(0..=cap).max(1);
        let (seq_a, seq_b) = mismatched_pair(&mut rng, strand_len, mismatches);

        if seen.contains(&(seq_a.clone(), seq_b.clone()))
            || seen.contains(&(seq_b.clone(), seq_a.clone()))
        {
            continue;
        }

        let outcome = fold.fold(&seq_a, &seq_b).await?;
        let mask = pairing_mask(&outcome.pair_probabilities);
        let structure = outcome.structure;
        let energy = (outcome.free_energy * 10.0).round() / 10.0;

        if !halves_self_contained(&structure) {
            continue;
        }
        if !mask_matches_structure(&mask, &structure) {
            continue;
        }

        seen.insert((seq_a.clone(), seq_b.clone()));
        items.push(Item {
            seq_a,
            seq_b,
            energy,
            pairing_mask: mask,
            structure,
        });
        if items.len() % 1000 == 0 {
            tracing::debug!(target: "dataset", kept = items.len(), "generation_progress");
        }
    }

    Ok(split_sets(&mut rng, items, config.validation_size))
}

/// A random strand and a mutated copy of its reverse complement, differing
/// at exactly `mismatches` positions.
fn mismatched_pair(rng: &mut StdRng, strand_len: usize, mismatches: usize) -> (String, String) {
    let seq_a: String = (0..strand_len)
        .map(|_| NUCLEOTIDES[rng.gen_range(0..NUCLEOTIDES.len())])
        .collect();
    let mut strand_b: Vec<char> = dna::reverse_complement(&seq_a).chars().collect();
    for position in index::sample(rng, strand_len, mismatches.min(strand_len)) {
        let current = strand_b[position];
        let replacement = loop {
            let candidate = NUCLEOTIDES[rng.gen_range(0..NUCLEOTIDES.len())];
            if candidate != current {
                break candidate;
            }
        };
        strand_b[position] = replacement;
    }
    (seq_a, strand_b.into_iter().collect())
}

/// Duplex structures only: no pairing within the first strand's suffix back
/// into itself across the break.
fn halves_self_contained(structure: &str) -> bool {
    match structure.split_once('+') {
        Some((first, second)) => !first.contains(')') && !second.contains('('),
        None => false,
    }
}

fn mask_matches_structure(mask: &str, structure: &str) -> bool {
    let stripped: String = structure.chars().filter(|c| *c != '+').collect();
    if mask.chars().count() != stripped.chars().count() {
        return false;
    }
    mask.chars().zip(stripped.chars()).all(|(bit, symbol)| match bit {
        '0' => symbol == '.',
        '1' => matches!(symbol, '(' | ')'),
        _ => false,
    })
}

fn split_sets(rng: &mut StdRng, items: Vec<Item>, validation_size: usize) -> GeneratedSets {
    let total = items.len();
    let train_picks = index::sample(rng, total, total - validation_size);
    let mut in_train = vec![false; total];
    let mut train = Vec::with_capacity(total - validation_size);
    for position in train_picks.iter() {
        in_train[position] = true;
    }
    for position in train_picks.iter() {
        train.push(items[position].clone());
    }
    let validation = items
        .into_iter()
        .enumerate()
        .filter(|(position, _)| !in_train[*position])
        .map(|(_, item)| item)
        .collect();
    GeneratedSets { train, validation }
}

pub fn write_sets(dir: &Path, sets: &GeneratedSets) -> Result<(PathBuf, PathBuf), DatasetError> {
    fs::create_dir_all(dir)?;
    let train_path = dir.join("sequence_train_set.json");
    let validation_path = dir.join("sequence_validation_set.json");
    write_rows(&train_path, &sets.train)?;
    write_rows(&validation_path, &sets.validation)?;
    Ok((train_path, validation_path))
}

fn write_rows(path: &Path, items: &[Item]) -> Result<(), DatasetError> {
    let rows: Vec<RawRow> = items.iter().map(Item::to_row).collect();
    let tmp_path = path.with_extension("json.tmp");
    {
        let file = File::create(&tmp_path)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer(&mut writer, &rows)?;
        writer.flush()?;
        writer.get_ref().sync_all()?;
    }
    fs::rename(&tmp_path, path)?;
    Ok(())
}
