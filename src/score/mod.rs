use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::fold::{FoldError, FoldPort};
use crate::pipeline::types::{StageId, StageRecord, StageResult};
use crate::trace::Trace;

/// Aggregate view over a trace file. Scoring reads only what the run
/// recorded, so re-running it over the same file gives the same summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreSummary {
    pub total: usize,
    /// Items whose final stage was accepted with exactly the expected value.
    pub exact_matches: usize,
    pub accuracy_pct: f64,
    /// Items where some stage exhausted its tries.
    pub failed_items: usize,
    /// Earliest stage whose result diverges from its expected value, per
    /// item. Attribution, not blame: downstream stages may have recovered.
    pub first_divergence: BTreeMap<StageId, usize>,
    /// Absolute-error statistics over accepted free-energy predictions.
    /// Absent when the run had none.
    pub energy_error: Option<EnergyErrorStats>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnergyErrorStats {
    pub scored: usize,
    pub mean_absolute_error: f64,
    pub std_deviation: f64,
}

pub fn score(traces: &[Trace]) -> ScoreSummary {
    let total = traces.len();
    let mut exact_matches = 0;
    let mut failed_items = 0;
    let mut first_divergence: BTreeMap<StageId, usize> = BTreeMap::new();
    let mut energy_errors: Vec<f64> = Vec::new();

    for trace in traces {
        if let Some(last) = trace.final_record() {
            if last.result.value() == Some(last.expected.as_str()) {
                exact_matches += 1;
            }
        }
        if trace.records.iter().any(|record| record.result.is_failed()) {
            failed_items += 1;
        }
        if let Some(record) = trace.records.iter().find(|record| diverges(record)) {
            *first_divergence.entry(record.stage).or_insert(0) += 1;
        }
        for record in &trace.records {
            if record.stage != StageId::FreeEnergy {
                continue;
            }
            if let Some(value) = record.result.value() {
                if let Ok(predicted) = value.parse::<f64>() {
                    energy_errors.push((predicted - trace.item.energy).abs());
                }
            }
        }
    }

    let accuracy_pct = if total == 0 {
        0.0
    } else {
        exact_matches as f64 / total as f64 * 100.0
    };

    ScoreSummary {
        total,
        exact_matches,
        accuracy_pct,
        failed_items,
        first_divergence,
        energy_error: energy_stats(&energy_errors),
    }
}

fn diverges(record: &StageRecord) -> bool {
    match &record.result {
        StageResult::Failed => true,
        StageResult::Accepted { value } => *value != record.expected,
    }
}

fn energy_stats(errors: &[f64]) -> Option<EnergyErrorStats> {
    if errors.is_empty() {
        return None;
    }
    let scored = errors.len();
    let mean = errors.iter().sum::<f64>() / scored as f64;
    let variance = errors
        .iter()
        .map(|error| (error - mean) * (error - mean))
        .sum::<f64>()
        / scored as f64;
    Some(EnergyErrorStats {
        scored,
        mean_absolute_error: mean,
        std_deviation: variance.sqrt(),
    })
}

/// Outcome of refolding one designed strand pair. `checker` is what the
/// structure-check expert predicted during the run; `achieved` is what the
/// thermodynamic backend says the design actually folds into.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DesignVerification {
    pub target: String,
    pub designed_a: Option<String>,
    pub designed_b: Option<String>,
    pub checker: StageResult,
    pub achieved: Option<String>,
}

impl DesignVerification {
    pub fn achieved_target(&self) -> bool {
        self.achieved.as_deref() == Some(self.target.as_str())
    }
}

pub async fn verify_designs(
    traces: &[Trace],
    fold: &dyn FoldPort,
) -> Result<Vec<DesignVerification>, FoldError> {
    let mut verifications = Vec::with_capacity(traces.len());
    for trace in traces {
        let target = trace.item.structure.clone();
        let checker = trace
            .record(StageId::StructureCheck)
            .map(|record| record.result.clone())
            .unwrap_or(StageResult::Failed);

        let designed = trace
            .record(StageId::SequenceDesign)
            .and_then(|record| record.result.value())
            .and_then(|pair| pair.split_once(' '))
            .map(|(a, b)| (a.to_string(), b.to_string()));

        let verification = match designed {
            Some((designed_a, designed_b)) => {
                let outcome = fold.fold(&designed_a, &designed_b).await?;
                DesignVerification {
                    target,
                    designed_a: Some(designed_a),
                    designed_b: Some(designed_b),
                    checker,
                    achieved: Some(outcome.structure),
                }
            }
            None => DesignVerification {
                target,
                designed_a: None,
                designed_b: None,
                checker,
                achieved: None,
            },
        };
        verifications.push(verification);
    }
    Ok(verifications)
}
