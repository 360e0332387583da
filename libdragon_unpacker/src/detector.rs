use super::buffer::{unpack_bank, BankOutcome, WordFault};
use super::midas_event::BankSource;
use super::module::ModuleRecord;

/// Common behaviour of the per-subsystem event assemblers (head and tail).
///
/// One MIDAS event is processed as `reset` -> `unpack` -> `calculate`. Each pass
/// replaces all state from the previous event.
pub trait DetectorEvent {
    /// Return all raw and derived data to "no data"
    fn reset(&mut self);

    /// Read raw data from every bank this subsystem owns
    fn unpack<E: BankSource + ?Sized>(&mut self, event: &E) -> UnpackReport;

    /// Derive higher level quantities from the unpacked raw data
    fn calculate(&mut self);

    /// The trigger timestamp read from the event, if one was present
    fn timestamp(&self) -> Option<u64>;

    /// Run the whole reset/unpack/calculate sequence
    fn assemble<E: BankSource + ?Sized>(&mut self, event: &E) -> UnpackReport {
        self.reset();
        let report = self.unpack(event);
        self.calculate();
        report
    }
}

/// Per-bank outcomes of unpacking one event
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnpackReport {
    pub outcomes: Vec<BankOutcome>,
}

impl UnpackReport {
    /// True if no bank that was present had a decode fault
    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(|o| o.faults().is_empty())
    }

    pub fn missing_banks(&self) -> impl Iterator<Item = &str> {
        self.outcomes.iter().filter_map(|o| match o {
            BankOutcome::NotFound(name) => Some(name.as_str()),
            BankOutcome::Unpacked(_) => None,
        })
    }

    /// Every fault, tagged with the bank it came from
    pub fn faults(&self) -> impl Iterator<Item = (&str, &WordFault)> {
        self.outcomes.iter().flat_map(|o| {
            let bank = match o {
                BankOutcome::NotFound(name) => name.as_str(),
                BankOutcome::Unpacked(report) => report.bank.as_str(),
            };
            o.faults().iter().map(move |f| (bank, f))
        })
    }

    pub fn n_faults(&self) -> usize {
        self.outcomes.iter().map(|o| o.faults().len()).sum()
    }
}

/// Unpack each named bank into the module record at the same index
pub fn unpack_adc_banks<E: BankSource + ?Sized>(
    event: &E,
    banks: &[String],
    records: &mut [ModuleRecord],
) -> Vec<BankOutcome> {
    banks
        .iter()
        .zip(records.iter_mut())
        .map(|(bank, record)| {
            let outcome = unpack_bank(event, bank, record);
            if let BankOutcome::NotFound(name) = &outcome {
                spdlog::debug!("Bank {name} not present in event {}", event.event_id());
            }
            outcome
        })
        .collect()
}

/// Read a trigger timestamp bank: word 0 holds the low 32 bits, the optional word 1
/// the high bits.
pub fn read_timestamp<E: BankSource + ?Sized>(event: &E, bank_name: &str) -> Option<u64> {
    let bank = event.find_bank(bank_name)?;
    let mut words = match bank.words() {
        Ok(w) => w,
        Err(e) => {
            spdlog::warn!("{e} -- timestamp bank name: {bank_name}");
            return None;
        }
    };
    let low = words.next()? as u64;
    let high = words.next().unwrap_or(0) as u64;
    Some((high << 32) | low)
}
