use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use super::diagnostics::Diagnostics;
use super::error::SummaryWriterError;
use super::run_parameters::RunParameters;
use super::scaler::Scaler;
use super::unpacker::UnpackedEvent;

/// Per run tally of everything the unpacker produced
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunSummary {
    pub run_number: i32,
    pub bytes_read: u64,
    pub head_singles: u64,
    pub tail_singles: u64,
    pub coincidences: u64,
    pub head_scaler_reads: u64,
    pub tail_scaler_reads: u64,
    pub decode_failures: u64,
    pub decode_faults: u64,
    /// Mean tail minus head timestamp of the coincidences that had both
    pub mean_xtof: Option<f64>,
    pub run_parameters: RunParameters,
    pub diagnostics: Diagnostics,
    pub head_scaler_sums: BTreeMap<String, u64>,
    pub tail_scaler_sums: BTreeMap<String, u64>,
    #[serde(skip)]
    xtof_sum: f64,
    #[serde(skip)]
    xtof_count: u64,
}

impl RunSummary {
    pub fn new(run_number: i32) -> Self {
        Self {
            run_number,
            ..Default::default()
        }
    }

    pub fn tally(&mut self, event: &UnpackedEvent) {
        match event {
            UnpackedEvent::Head(_) => self.head_singles += 1,
            UnpackedEvent::Tail(_) => self.tail_singles += 1,
            UnpackedEvent::Coinc(coinc) => {
                self.coincidences += 1;
                if let Some(xtof) = coinc.xtof {
                    self.xtof_sum += xtof;
                    self.xtof_count += 1;
                    self.mean_xtof = Some(self.xtof_sum / self.xtof_count as f64);
                }
            }
            UnpackedEvent::HeadScaler(_) => self.head_scaler_reads += 1,
            UnpackedEvent::TailScaler(_) => self.tail_scaler_reads += 1,
            UnpackedEvent::RunParameters(params) => self.run_parameters = params.clone(),
            UnpackedEvent::DecodeFailure(diag) => {
                self.decode_failures += 1;
                self.decode_faults += diag.faults.len() as u64;
            }
        }
    }

    /// Record the end of run state of the unpacker
    pub fn finish(
        &mut self,
        diagnostics: &Diagnostics,
        head_scaler: &Scaler,
        tail_scaler: &Scaler,
        bytes_read: u64,
    ) {
        self.diagnostics = diagnostics.clone();
        self.head_scaler_sums = head_scaler
            .named_sums()
            .map(|(name, sum)| (String::from(name), sum))
            .collect();
        self.tail_scaler_sums = tail_scaler
            .named_sums()
            .map(|(name, sum)| (String::from(name), sum))
            .collect();
        self.bytes_read = bytes_read;
    }
}

/// Writes run summaries as YAML
#[derive(Debug)]
pub struct SummaryWriter {
    file_path: PathBuf,
}

impl SummaryWriter {
    pub fn new(path: &Path) -> Self {
        Self {
            file_path: path.to_path_buf(),
        }
    }

    pub fn write(&self, summary: &RunSummary) -> Result<(), SummaryWriterError> {
        let yaml_str = serde_yaml::to_string(summary)?;
        std::fs::write(&self.file_path, yaml_str)?;
        spdlog::info!("Wrote run summary to {}", self.file_path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::unpacker::DecodeDiagnostic;

    #[test]
    fn test_tally_and_write() {
        let mut summary = RunSummary::new(3);
        summary.tally(&UnpackedEvent::DecodeFailure(DecodeDiagnostic {
            event_id: 1,
            serial_number: 0,
            faults: Vec::new(),
        }));
        summary.tally(&UnpackedEvent::RunParameters(RunParameters {
            run_number: Some(3),
            start_time: Some(10),
            stop_time: Some(20),
        }));
        assert_eq!(summary.decode_failures, 1);
        assert_eq!(summary.run_parameters.duration(), Some(10));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run_00003.yml");
        SummaryWriter::new(&path).write(&summary).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("run_number: 3"));
        assert!(text.contains("decode_failures: 1"));
        assert!(!text.contains("xtof_sum"));
    }
}
