use std::sync::Arc;

use super::calc::{channel_map, linear_calibrate, max_valid, pedestal_subtract, sum_valid};
use super::detector::{read_timestamp, unpack_adc_banks, DetectorEvent, UnpackReport};
use super::midas_event::{BankSource, EventHeader};
use super::module::ModuleRecord;
use super::validity::ValidityDomain;
use super::variables::HeadVariables;

/// The BGO gamma-ray array
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Bgo {
    /// Calibrated energy of each crystal
    pub ecal: Vec<Option<f64>>,
    /// Energies of the crystals that fired, largest first
    pub esort: Vec<f64>,
    /// Summed energy of the crystals that fired
    pub sum: Option<f64>,
    /// Index of the crystal with the largest energy
    pub hit0: Option<usize>,
}

impl Bgo {
    fn reset(&mut self) {
        self.ecal.clear();
        self.esort.clear();
        self.sum = None;
        self.hit0 = None;
    }
}

/// A complete gamma (head) event
#[derive(Debug, Clone)]
pub struct Head {
    pub header: EventHeader,
    pub adc: Vec<ModuleRecord>,
    pub tsc: Option<u64>,
    pub bgo: Bgo,
    variables: Arc<HeadVariables>,
}

impl Head {
    pub fn new(variables: Arc<HeadVariables>, n_channels: usize, domain: ValidityDomain) -> Self {
        let adc = variables
            .adc_banks
            .iter()
            .map(|_| ModuleRecord::new(n_channels, domain))
            .collect();
        Self {
            header: EventHeader::default(),
            adc,
            tsc: None,
            bgo: Bgo::default(),
            variables,
        }
    }

    pub fn variables(&self) -> &HeadVariables {
        &self.variables
    }
}

impl DetectorEvent for Head {
    fn reset(&mut self) {
        self.header = EventHeader::default();
        self.adc.iter_mut().for_each(ModuleRecord::reset);
        self.tsc = None;
        self.bgo.reset();
    }

    fn unpack<E: BankSource + ?Sized>(&mut self, event: &E) -> UnpackReport {
        self.header = event.header();
        self.tsc = read_timestamp(event, &self.variables.tsc_bank);
        UnpackReport {
            outcomes: unpack_adc_banks(event, &self.variables.adc_banks, &mut self.adc),
        }
    }

    fn calculate(&mut self) {
        let vars = &self.variables.bgo;
        let mut ecal = channel_map(&self.adc, vars);
        pedestal_subtract(&mut ecal, vars);
        linear_calibrate(&mut ecal, vars);

        let mut esort: Vec<f64> = ecal.iter().flatten().copied().collect();
        esort.sort_by(|a, b| b.total_cmp(a));

        self.bgo.sum = sum_valid(&ecal);
        self.bgo.hit0 = max_valid(&ecal).map(|(idx, _)| idx);
        self.bgo.esort = esort;
        self.bgo.ecal = ecal;
    }

    fn timestamp(&self) -> Option<u64> {
        self.tsc
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::DRAGON_HEAD_EVENT;
    use crate::decoder::tests::{data_word, footer_word, header_word};
    use crate::midas_event::MidasEventBuilder;

    fn make_head() -> Head {
        let mut vars = HeadVariables::default();
        vars.bgo.pedestal[2] = 50;
        vars.bgo.slope[0] = 2.0;
        Head::new(Arc::new(vars), 32, ValidityDomain::default())
    }

    #[test]
    fn test_assemble_head() {
        let event = MidasEventBuilder::new(DRAGON_HEAD_EVENT)
            .serial_number(5)
            .bank_u32(
                "ADC0",
                &[
                    header_word(3),
                    data_word(0, 100),
                    data_word(1, 400),
                    data_word(2, 20),
                    footer_word(5),
                ],
            )
            .bank_u32("TSCH", &[1000])
            .build()
            .unwrap();
        let mut head = make_head();
        let report = head.assemble(&event);
        assert!(report.is_success());
        assert_eq!(head.header.serial_number, 5);
        assert_eq!(head.timestamp(), Some(1000));
        assert_eq!(head.bgo.ecal.len(), 30);
        assert_eq!(head.bgo.ecal[0], Some(200.0));
        assert_eq!(head.bgo.ecal[1], Some(400.0));
        // Below pedestal
        assert_eq!(head.bgo.ecal[2], None);
        assert_eq!(head.bgo.esort, vec![400.0, 200.0]);
        assert_eq!(head.bgo.sum, Some(600.0));
        assert_eq!(head.bgo.hit0, Some(1));
    }

    #[test]
    fn test_no_carry_over_between_events() {
        let mut head = make_head();
        let first = MidasEventBuilder::new(DRAGON_HEAD_EVENT)
            .bank_u32("ADC0", &[data_word(4, 321)])
            .bank_u32("TSCH", &[7])
            .build()
            .unwrap();
        head.assemble(&first);
        assert_eq!(head.bgo.sum, Some(321.0));

        let empty = MidasEventBuilder::new(DRAGON_HEAD_EVENT).build().unwrap();
        let report = head.assemble(&empty);
        assert!(report.is_success());
        assert_eq!(report.missing_banks().collect::<Vec<&str>>(), vec!["ADC0"]);
        assert_eq!(head.tsc, None);
        assert_eq!(head.adc[0].get(4), None);
        assert_eq!(head.bgo.sum, None);
        assert_eq!(head.bgo.hit0, None);
        assert!(head.bgo.esort.is_empty());
    }

    #[test]
    fn test_decode_fault_reported() {
        let event = MidasEventBuilder::new(DRAGON_HEAD_EVENT)
            .bank_u32("ADC0", &[data_word(1, 10), 0x0700_0000])
            .build()
            .unwrap();
        let mut head = make_head();
        let report = head.assemble(&event);
        assert!(!report.is_success());
        assert_eq!(report.n_faults(), 1);
        let (bank, fault) = report.faults().next().unwrap();
        assert_eq!(bank, "ADC0");
        assert_eq!(fault.index, 1);
        assert_eq!(head.bgo.ecal[1], Some(10.0));
    }
}
