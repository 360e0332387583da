use super::decoder::{decode_word, RawWord};
use super::error::DecodeError;
use super::midas_event::BankSource;
use super::module::ModuleRecord;

/// A decode failure tied to the word that caused it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WordFault {
    pub index: usize,
    pub word: u32,
    pub error: DecodeError,
}

/// The result of scanning every word of one bank
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BankReport {
    pub bank: String,
    pub n_words: usize,
    pub faults: Vec<WordFault>,
}

impl BankReport {
    /// True if every word in the bank was a known, well formed buffer type
    pub fn is_success(&self) -> bool {
        self.faults.is_empty()
    }
}

/// Outcome of unpacking a named bank.
///
/// A missing bank means there was nothing to decode, which is not a decode failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BankOutcome {
    NotFound(String),
    Unpacked(BankReport),
}

impl BankOutcome {
    pub fn is_found(&self) -> bool {
        matches!(self, Self::Unpacked(_))
    }

    /// True if the bank was present and decoded without faults
    pub fn is_success(&self) -> bool {
        match self {
            Self::NotFound(_) => false,
            Self::Unpacked(report) => report.is_success(),
        }
    }

    pub fn faults(&self) -> &[WordFault] {
        match self {
            Self::NotFound(_) => &[],
            Self::Unpacked(report) => &report.faults,
        }
    }
}

/// Decode every word of a bank into a module record.
///
/// Faulty words are recorded and skipped; the scan always runs to the end of the bank.
pub fn unpack_bank<E: BankSource + ?Sized>(
    event: &E,
    bank_name: &str,
    record: &mut ModuleRecord,
) -> BankOutcome {
    let bank = match event.find_bank(bank_name) {
        Some(b) => b,
        None => return BankOutcome::NotFound(bank_name.to_string()),
    };

    let mut report = BankReport {
        bank: bank_name.to_string(),
        n_words: bank.len(),
        faults: Vec::new(),
    };

    let words = match bank.words() {
        Ok(w) => w,
        Err(e) => {
            spdlog::warn!("{e} -- MIDAS bank name: {bank_name}");
            report.faults.push(WordFault {
                index: 0,
                word: 0,
                error: e,
            });
            return BankOutcome::Unpacked(report);
        }
    };

    for (index, word) in words.enumerate() {
        if let Err(error) = decode_word(RawWord(word), record) {
            spdlog::warn!("{error} -- MIDAS bank name: {bank_name}, word {index}");
            report.faults.push(WordFault { index, word, error });
        }
    }
    BankOutcome::Unpacked(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{BUFFER_TYPE_SHIFT, DRAGON_HEAD_EVENT, INVALID_BITS, TID_DOUBLE};
    use crate::decoder::tests::{data_word, footer_word, header_word};
    use crate::midas_event::MidasEventBuilder;
    use crate::validity::ValidityDomain;

    #[test]
    fn test_clean_bank() {
        let event = MidasEventBuilder::new(DRAGON_HEAD_EVENT)
            .bank_u32(
                "ADC0",
                &[header_word(2), data_word(0, 100), data_word(5, 200), footer_word(7)],
            )
            .build()
            .unwrap();
        let mut record = ModuleRecord::new(32, ValidityDomain::default());
        let outcome = unpack_bank(&event, "ADC0", &mut record);
        assert!(outcome.is_success());
        assert_eq!(record.get(0), Some(100));
        assert_eq!(record.get(5), Some(200));
        assert_eq!(record.n_present, 2);
        assert_eq!(record.count, 7);
    }

    #[test]
    fn test_missing_bank_is_distinct() {
        let event = MidasEventBuilder::new(DRAGON_HEAD_EVENT).build().unwrap();
        let mut record = ModuleRecord::new(32, ValidityDomain::default());
        let outcome = unpack_bank(&event, "ADC0", &mut record);
        assert_eq!(outcome, BankOutcome::NotFound("ADC0".to_string()));
        assert!(!outcome.is_found());
        assert!(outcome.faults().is_empty());
    }

    #[test]
    fn test_faults_do_not_stop_the_scan() {
        let invalid = (INVALID_BITS as u32) << BUFFER_TYPE_SHIFT;
        let unknown = 0x7 << BUFFER_TYPE_SHIFT;
        let event = MidasEventBuilder::new(DRAGON_HEAD_EVENT)
            .bank_u32(
                "ADC0",
                &[
                    data_word(20, 1),
                    invalid,
                    data_word(1, 11),
                    unknown,
                    data_word(2, 22),
                ],
            )
            .build()
            .unwrap();
        let mut record = ModuleRecord::new(16, ValidityDomain::default());
        let outcome = unpack_bank(&event, "ADC0", &mut record);
        assert!(outcome.is_found());
        assert!(!outcome.is_success());
        let indices: Vec<usize> = outcome.faults().iter().map(|f| f.index).collect();
        assert_eq!(indices, vec![0, 1, 3]);
        assert!(matches!(
            outcome.faults()[0].error,
            DecodeError::OutOfRange { channel: 20, .. }
        ));
        assert_eq!(record.get(1), Some(11));
        assert_eq!(record.get(2), Some(22));
    }

    #[test]
    fn test_wide_bank_is_a_fault() {
        let event = MidasEventBuilder::new(DRAGON_HEAD_EVENT)
            .bank("ADC0", TID_DOUBLE, &[0u8; 8])
            .build()
            .unwrap();
        let mut record = ModuleRecord::new(32, ValidityDomain::default());
        let outcome = unpack_bank(&event, "ADC0", &mut record);
        assert!(!outcome.is_success());
        assert_eq!(
            outcome.faults()[0].error,
            DecodeError::UnsupportedBankType(TID_DOUBLE)
        );
    }
}
