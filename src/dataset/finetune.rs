//! Training-set emission, one JSONL row per corpus item. Assistant replies
//! for rationale conditions carry the stepwise working the experts are
//! expected to reproduce at inference time.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::corpus::Item;
use crate::dataset::DatasetError;
use crate::dna;
use crate::gateway::types::ChatMessage;
use crate::pipeline::prompts;
use crate::pipeline::stages::{
    parse_condition, BaseComparisonCondition, BasePairingCondition, ExperimentKind,
    FreeEnergyCondition, RevCompCondition, SecondaryStructureCondition,
    SequenceDesignCondition, StructureConversionCondition,
};

/// Training-side wording where it differs from the runtime prompts.
const TRAIN_SECONDARY_STRUCTURE: &str = "You are a DNA analyzer. Please analyze the following DNA sequence pair and produce the secondary structure in parens-dot-plus notation.";

const TRAIN_BASE_PAIRING_SPLIT: &str = "You are a DNA analyzer. Please compare the two sequences and the corresponding base comparison binary to show where bases bind using parens-dot-plus notation.";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingRow {
    pub messages: Vec<ChatMessage>,
}

fn row(system: &str, user: String, assistant: String) -> TrainingRow {
    TrainingRow {
        messages: vec![
            ChatMessage::system(system),
            ChatMessage::user(user),
            ChatMessage::assistant(assistant),
        ],
    }
}

pub fn training_file_name(kind: ExperimentKind, condition: &str, train_size: u64) -> String {
    format!("{kind}_{condition}_train_size_{train_size}.jsonl")
}

/// Rows for one experiment and condition over the given items. The chain has
/// no emission of its own; its stages are trained through their standalone
/// experiments.
pub fn rows_for(
    kind: ExperimentKind,
    condition: Option<&str>,
    items: &[Item],
) -> Result<Vec<TrainingRow>, DatasetError> {
    match kind {
        ExperimentKind::ReverseComplement => {
            let condition: RevCompCondition = parse(kind, condition)?;
            Ok(items.iter().map(|item| reverse_complement_row(item, condition)).collect())
        }
        ExperimentKind::BaseComparison => {
            let condition: BaseComparisonCondition = parse(kind, condition)?;
            Ok(items.iter().map(|item| base_comparison_row(item, condition)).collect())
        }
        ExperimentKind::BasePairing => {
            let condition: BasePairingCondition = parse(kind, condition)?;
            Ok(items.iter().map(|item| base_pairing_row(item, condition)).collect())
        }
        ExperimentKind::StructureConversion => {
            let condition: StructureConversionCondition = parse(kind, condition)?;
            Ok(items.iter().map(|item| structure_conversion_row(item, condition)).collect())
        }
        ExperimentKind::SecondaryStructure => {
            let condition: SecondaryStructureCondition = parse(kind, condition)?;
            Ok(items.iter().map(|item| secondary_structure_row(item, condition)).collect())
        }
        ExperimentKind::FreeEnergy => {
            let condition: FreeEnergyCondition = parse(kind, condition)?;
            Ok(items.iter().map(|item| free_energy_row(item, condition)).collect())
        }
        ExperimentKind::SequenceDesign => {
            let condition: SequenceDesignCondition = parse(kind, condition)?;
            Ok(items.iter().map(|item| sequence_design_row(item, condition)).collect())
        }
        ExperimentKind::ChainOfExperts => Err(DatasetError::Unsupported(
            "chain_of_experts trains each expert through its standalone experiment".to_string(),
        )),
    }
}

fn parse<T>(kind: ExperimentKind, condition: Option<&str>) -> Result<T, DatasetError>
where
    T: serde::de::DeserializeOwned + Default,
{
    parse_condition(kind, condition).map_err(|err| DatasetError::BadCondition(err.to_string()))
}

fn window(text: &str, start: usize, width: usize) -> &str {
    &text[start..start + width]
}

fn reverse_complement_row(item: &Item, condition: RevCompCondition) -> TrainingRow {
    let seq_b = &item.seq_b;
    let rev = dna::reverse_complement(seq_b);
    let assistant = match condition {
        RevCompCondition::Naive => rev.clone(),
        RevCompCondition::ChainOfThought => {
            let len = seq_b.len();
            let mut steps = String::new();
            for index in 0..len {
                steps.push_str(&format!(
                    "{},{}:{} ",
                    &seq_b[..len - index],
                    &seq_b[len - 1 - index..len - index],
                    &rev[..index + 1]
                ));
            }
            format!("{} ans:{rev}", steps.trim_end())
        }
    };
    row(prompts::REVERSE_COMPLEMENT, seq_b.clone(), assistant)
}

fn base_comparison_row(item: &Item, condition: BaseComparisonCondition) -> TrainingRow {
    let seq_a = &item.seq_a;
    let rev = dna::reverse_complement(&item.seq_b);
    let comparison = dna::base_comparison(seq_a, &rev);
    match condition {
        BaseComparisonCondition::RawPair => row(
            prompts::BASE_COMPARISON_PAIRED,
            format!("{seq_a} {}", item.seq_b),
            comparison,
        ),
        BaseComparisonCondition::Aligned => row(
            prompts::BASE_COMPARISON_ALIGNED,
            format!("{seq_a} {rev}"),
            comparison,
        ),
        BaseComparisonCondition::RawPairRationale => {
            let mut steps = String::new();
            for (index, (a, b)) in seq_a.chars().zip(item.seq_b.chars().rev()).enumerate() {
                steps.push_str(&format!("{a}{b}:{} ", &comparison[index..index + 1]));
            }
            row(
                prompts::BASE_COMPARISON_PAIRED,
                format!("{seq_a} {}", item.seq_b),
                format!("{} ans:{comparison}", steps.trim_end()),
            )
        }
        BaseComparisonCondition::AlignedRationale => {
            let mut steps = String::new();
            for index in 0..seq_a.len() {
                steps.push_str(&format!(
                    "({},{}){}{}:{} ",
                    &seq_a[index..],
                    &rev[index..],
                    &seq_a[index..index + 1],
                    &rev[index..index + 1],
                    &comparison[index..index + 1],
                ));
            }
            row(
                prompts::BASE_COMPARISON_ALIGNED,
                format!("{seq_a} {rev}"),
                format!("{} ans:{comparison}", steps.trim_end()),
            )
        }
    }
}

fn base_pairing_row(item: &Item, condition: BasePairingCondition) -> TrainingRow {
    let len = item.strand_len();
    let seq_a = &item.seq_a;
    let rev = dna::reverse_complement(&item.seq_b);
    let comparison = dna::base_comparison(seq_a, &rev);
    let (mask_a, mask_b) = dna::split_halves(&item.pairing_mask, len);
    let (dot_a, dot_b) = dna::split_halves(&item.structure, len);

    let pad_seq_a = format!("__{seq_a}__");
    let pad_rev = format!("__{rev}__");
    let pad_cmp = format!("__{comparison}__");
    let zpad_cmp = format!("00{comparison}00");
    let pad_mask_a = format!("xxxxx{mask_a}");
    let pad_mask_b = format!("xxxxx{mask_b}");

    let mut steps = String::new();
    for index in 0..len {
        match condition {
            BasePairingCondition::WithComparison => steps.push_str(&format!(
                "[{},{},{},{},{}]:{},{} ",
                window(&pad_seq_a, index, 5),
                window(&pad_rev, index, 5),
                window(&pad_cmp, index, 5),
                window(&pad_mask_a, index, 5),
                window(&pad_mask_b, index, 5),
                &mask_a[index..index + 1],
                &mask_b[index..index + 1],
            )),
            BasePairingCondition::SequencesOnly => steps.push_str(&format!(
                "[{},{},{},{}]:{},{} ",
                window(&pad_seq_a, index, 5),
                window(&pad_rev, index, 5),
                window(&pad_mask_a, index, 5),
                window(&pad_mask_b, index, 5),
                &mask_a[index..index + 1],
                &mask_b[index..index + 1],
            )),
            BasePairingCondition::SplitStructure => steps.push_str(&format!(
                "[{},{},{},{},{}]:{},{} ",
                window(&pad_seq_a, index, 5),
                window(&pad_rev, index, 5),
                window(&pad_cmp, index, 5),
                window(&pad_mask_a, index, 5),
                window(&pad_mask_b, index, 5),
                &dot_a[index..index + 1],
                &dot_b[index..index + 1],
            )),
            BasePairingCondition::FullStructureRationale => steps.push_str(&format!(
                "[{},{},{}]:{},{} ",
                window(&pad_seq_a, index, 5),
                window(&pad_rev, index, 5),
                window(&zpad_cmp, index, 5),
                &mask_a[index..index + 1],
                &mask_b[index..index + 1],
            )),
        }
    }
    let steps = steps.trim_end();

    match condition {
        BasePairingCondition::WithComparison => row(
            prompts::BASE_PAIRING_WITH_COMPARISON,
            format!("{seq_a} {rev} {comparison}"),
            format!("{steps} ans:{mask_a} {mask_b}"),
        ),
        BasePairingCondition::SequencesOnly => row(
            prompts::BASE_PAIRING_SEQUENCES_ONLY,
            format!("{seq_a} {rev}"),
            format!("{steps} ans:{mask_a} {mask_b}"),
        ),
        BasePairingCondition::SplitStructure => row(
            TRAIN_BASE_PAIRING_SPLIT,
            format!("{seq_a} {rev} {comparison}"),
            format!("{steps} ans:{dot_a} {dot_b}"),
        ),
        BasePairingCondition::FullStructureRationale => row(
            prompts::BASE_PAIRING_STRUCTURE,
            format!("{seq_a} {rev} {comparison}"),
            format!("{steps} {mask_a} {mask_b} ans:{}", item.structure),
        ),
    }
}

fn structure_conversion_row(item: &Item, condition: StructureConversionCondition) -> TrainingRow {
    let len = item.strand_len();
    let structure = &item.structure;
    let (mask_a, mask_b) = dna::split_halves(&item.pairing_mask, len);
    let (dot_a, dot_b) = dna::split_halves(structure, len);
    let user = format!("{mask_a} {mask_b}");
    match condition {
        StructureConversionCondition::Complete => {
            row(prompts::STRUCTURE_CONVERSION, user, structure.clone())
        }
        StructureConversionCondition::CompleteRationale => {
            let full = structure.len();
            let mut steps = String::new();
            for index in 0..len {
                steps.push_str(&format!(
                    "[{},{}]{}{}:{}+{} ",
                    &mask_a[index..],
                    &mask_b[index..],
                    &dot_a[index..index + 1],
                    &dot_b[index..index + 1],
                    &structure[..index + 1],
                    &structure[full - (index + 1)..],
                ));
            }
            row(
                prompts::STRUCTURE_CONVERSION,
                user,
                format!("{} ans:{structure}", steps.trim_end()),
            )
        }
        StructureConversionCondition::CharConvert => row(
            prompts::STRUCTURE_CONVERSION_CHARS,
            user,
            format!("{dot_a} {dot_b}"),
        ),
    }
}

fn secondary_structure_row(item: &Item, condition: SecondaryStructureCondition) -> TrainingRow {
    let structure = &item.structure;
    let user = format!("{} {}", item.seq_a, item.seq_b);
    match condition {
        SecondaryStructureCondition::Naive => {
            row(TRAIN_SECONDARY_STRUCTURE, user, structure.clone())
        }
        SecondaryStructureCondition::ChainOfThought
        | SecondaryStructureCondition::ChainOfThoughtNoErrorCheck => {
            let pad_seq_a = format!("_{}_", item.seq_a);
            let reversed_b: String = item.seq_b.chars().rev().collect();
            let pad_reversed_b = format!("_{reversed_b}_");
            let mut steps = String::new();
            for index in 0..item.strand_len() {
                steps.push_str(&format!(
                    "[{},{}]:{} ",
                    window(&pad_seq_a, index, 3),
                    window(&pad_reversed_b, index, 3),
                    &structure[..index + 1],
                ));
            }
            row(
                TRAIN_SECONDARY_STRUCTURE,
                user,
                format!("{} ans:{structure}", steps.trim_end()),
            )
        }
    }
}

fn structure_prefix_steps(item: &Item, rev: &str) -> String {
    let pad_seq_a = format!("_{}_", item.seq_a);
    let pad_rev = format!("_{rev}_");
    let mut steps = String::new();
    for index in 0..item.strand_len() {
        steps.push_str(&format!(
            "[{},{}]:{} ",
            window(&pad_seq_a, index, 3),
            window(&pad_rev, index, 3),
            &item.structure[..index + 1],
        ));
    }
    steps.trim_end().to_string()
}

fn free_energy_row(item: &Item, condition: FreeEnergyCondition) -> TrainingRow {
    let rev = dna::reverse_complement(&item.seq_b);
    let energy = format!("{:.1}", item.energy);
    match condition {
        FreeEnergyCondition::Naive => row(
            prompts::FREE_ENERGY,
            format!("{} {}", item.seq_a, item.seq_b),
            energy,
        ),
        FreeEnergyCondition::Rationale => row(
            prompts::FREE_ENERGY,
            format!("{} {}", item.seq_a, item.seq_b),
            format!("{rev} {} ans:{energy}", structure_prefix_steps(item, &rev)),
        ),
        FreeEnergyCondition::AlignedRationale => row(
            prompts::FREE_ENERGY,
            format!("{} {rev}", item.seq_a),
            format!("{} ans:{energy}", structure_prefix_steps(item, &rev)),
        ),
        FreeEnergyCondition::AlignedStructure => row(
            prompts::FREE_ENERGY_WITH_STRUCTURE,
            format!("{} {rev} {}", item.seq_a, item.structure),
            energy,
        ),
    }
}

fn sequence_design_row(item: &Item, condition: SequenceDesignCondition) -> TrainingRow {
    let answer = format!("{} {}", item.seq_a, item.seq_b);
    match condition {
        SequenceDesignCondition::Naive => {
            row(prompts::SEQUENCE_DESIGN, item.structure.clone(), answer)
        }
        SequenceDesignCondition::Rationale => {
            let len = item.strand_len();
            let rev = dna::reverse_complement(&item.seq_b);
            let pad_dot = format!("_{}_", &item.structure[..len]);
            let mut steps = String::new();
            for index in 0..len {
                steps.push_str(&format!(
                    "[{}]:[{},{}] ",
                    window(&pad_dot, index, 3),
                    &item.seq_a[..index + 1],
                    &rev[..index + 1],
                ));
            }
            row(
                prompts::SEQUENCE_DESIGN,
                item.structure.clone(),
                format!("{} ans:{answer}", steps.trim_end()),
            )
        }
    }
}

pub fn write_training_rows(path: &Path, rows: &[TrainingRow]) -> Result<usize, DatasetError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp_path = path.with_extension("jsonl.tmp");
    {
        let file = File::create(&tmp_path)?;
        let mut writer = BufWriter::new(file);
        for row in rows {
            let line = serde_json::to_string(row)?;
            writer.write_all(line.as_bytes())?;
            writer.write_all(b"\n")?;
        }
        writer.flush()?;
        writer.get_ref().sync_all()?;
    }
    fs::rename(&tmp_path, path)?;
    Ok(rows.len())
}
