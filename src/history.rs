use crate::error::Result;
use crate::model::EpochSummary;
use serde::Serialize;
use std::path::Path;

/// Which training pass an epoch belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// The only pass of a single run
    Train,
    /// First pass of a two-stage run
    Static,
    /// Second pass of a two-stage run
    Mover,
}

/// One row of the training history
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HistoryRecord {
    pub stage: Stage,
    pub epoch: usize,
    pub loss: f64,
    pub accuracy: f64,
}

pub fn tag(stage: Stage, history: Vec<EpochSummary>) -> Vec<HistoryRecord> {
    history
        .into_iter()
        .map(|summary| HistoryRecord {
            stage,
            epoch: summary.epoch,
            loss: summary.loss,
            accuracy: summary.accuracy,
        })
        .collect()
}

/// Write the history as CSV with a header row
pub fn write_history(path: &Path, records: &[HistoryRecord]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;

    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;

    Ok(())
}
