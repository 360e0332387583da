use serde::Serialize;

use super::midas_event::BankSource;
use super::variables::ScalerVariables;

/// Periodic counter readout of one subsystem.
///
/// `count` holds the most recent read, `sum` the total since the start of the run and
/// `rate` the counts per second over the interval since the previous read.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Scaler {
    pub count: Vec<u32>,
    pub sum: Vec<u64>,
    pub rate: Vec<Option<f64>>,
    #[serde(skip)]
    last_time: Option<u32>,
    #[serde(skip)]
    variables: ScalerVariables,
}

impl Scaler {
    pub fn new(variables: ScalerVariables) -> Self {
        let n = variables.names.len();
        Self {
            count: vec![0; n],
            sum: vec![0; n],
            rate: vec![None; n],
            last_time: None,
            variables,
        }
    }

    pub fn variables(&self) -> &ScalerVariables {
        &self.variables
    }

    /// Clear everything, including the running sums. Done at the start of each run.
    pub fn reset(&mut self) {
        self.count.iter_mut().for_each(|c| *c = 0);
        self.sum.iter_mut().for_each(|s| *s = 0);
        self.rate.iter_mut().for_each(|r| *r = None);
        self.last_time = None;
    }

    /// Read the scaler bank of an event. Returns false if the bank was missing or
    /// unreadable, in which case nothing is changed.
    pub fn unpack<E: BankSource + ?Sized>(&mut self, event: &E) -> bool {
        let Some(bank) = event.find_bank(&self.variables.bank) else {
            spdlog::warn!(
                "Scaler bank {} not present in event {}",
                self.variables.bank,
                event.event_id()
            );
            return false;
        };
        let words = match bank.words() {
            Ok(w) => w,
            Err(e) => {
                spdlog::warn!("{e} -- scaler bank name: {}", self.variables.bank);
                return false;
            }
        };

        let time = event.header().time_stamp;
        let elapsed = self
            .last_time
            .map(|last| time.saturating_sub(last))
            .filter(|dt| *dt > 0);

        let mut n_words = 0;
        for (idx, word) in words.enumerate() {
            n_words += 1;
            if idx >= self.count.len() {
                continue;
            }
            self.count[idx] = word;
            self.sum[idx] += word as u64;
            self.rate[idx] = elapsed.map(|dt| word as f64 / dt as f64);
        }
        if n_words > self.count.len() {
            spdlog::debug!(
                "Scaler bank {} has {n_words} channels but only {} are named",
                self.variables.bank,
                self.count.len()
            );
        }
        self.last_time = Some(time);
        true
    }

    /// Running sum by channel name
    pub fn named_sums(&self) -> impl Iterator<Item = (&str, u64)> {
        self.variables
            .names
            .iter()
            .map(String::as_str)
            .zip(self.sum.iter().copied())
    }
}
