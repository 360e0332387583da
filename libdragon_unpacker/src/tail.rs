use std::sync::Arc;

use super::calc::{calculate_sum, channel_map, linear_calibrate, max_valid, pedestal_subtract};
use super::constants::{DSSSD_FRONT_CHANNELS, MCP_HALF_WIDTH};
use super::detector::{read_timestamp, unpack_adc_banks, DetectorEvent, UnpackReport};
use super::midas_event::{BankSource, EventHeader};
use super::module::ModuleRecord;
use super::validity::ValidityDomain;
use super::variables::{AdcVariables, TailVariables};

/// Map, pedestal subtract, and calibrate a block of ADC channels
fn calibrated(modules: &[ModuleRecord], vars: &AdcVariables) -> Vec<Option<f64>> {
    let mut values = channel_map(modules, vars);
    pedestal_subtract(&mut values, vars);
    linear_calibrate(&mut values, vars);
    values
}

/// Double sided silicon strip detector. Strips 0-15 are the front, 16-31 the back.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dsssd {
    pub ecal: Vec<Option<f64>>,
    pub efront: Option<f64>,
    pub eback: Option<f64>,
    pub hit_front: Option<usize>,
    pub hit_back: Option<usize>,
}

impl Dsssd {
    fn calculate(&mut self, modules: &[ModuleRecord], vars: &AdcVariables) {
        self.ecal = calibrated(modules, vars);
        let split = DSSSD_FRONT_CHANNELS.min(self.ecal.len());
        let (front, back) = self.ecal.split_at(split);
        if let Some((hit, e)) = max_valid(front) {
            self.hit_front = Some(hit);
            self.efront = Some(e);
        }
        if let Some((hit, e)) = max_valid(back) {
            self.hit_back = Some(hit + split);
            self.eback = Some(e);
        }
    }
}

/// Ionization chamber
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IonChamber {
    pub anode: Vec<Option<f64>>,
    /// Sum of all anodes, only if every anode fired
    pub sum: Option<f64>,
}

impl IonChamber {
    fn calculate(&mut self, modules: &[ModuleRecord], vars: &AdcVariables) {
        self.anode = calibrated(modules, vars);
        self.sum = calculate_sum(&self.anode);
    }
}

/// Micro channel plate with four corner anodes and a TAC
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mcp {
    pub anode: Vec<Option<f64>>,
    pub esum: Option<f64>,
    pub tac: Option<f64>,
    /// Position on the plate in mm
    pub x: Option<f64>,
    pub y: Option<f64>,
}

impl Mcp {
    fn calculate(&mut self, modules: &[ModuleRecord], anode: &AdcVariables, tac: &AdcVariables) {
        self.anode = calibrated(modules, anode);
        self.tac = calibrated(modules, tac).first().copied().flatten();
        self.esum = calculate_sum(&self.anode);
        if let (Some(sum), [Some(a0), Some(a1), Some(a2), Some(a3)]) =
            (self.esum, self.anode.as_slice())
        {
            if sum != 0.0 {
                self.x = Some(MCP_HALF_WIDTH * ((a1 + a2) - (a0 + a3)) / sum);
                self.y = Some(MCP_HALF_WIDTH * ((a0 + a1) - (a2 + a3)) / sum);
            }
        }
    }
}

/// A complete heavy-ion (tail) event
#[derive(Debug, Clone)]
pub struct Tail {
    pub header: EventHeader,
    pub adc: Vec<ModuleRecord>,
    pub tsc: Option<u64>,
    pub dsssd: Dsssd,
    pub ic: IonChamber,
    pub mcp: Mcp,
    variables: Arc<TailVariables>,
}

impl Tail {
    pub fn new(variables: Arc<TailVariables>, n_channels: usize, domain: ValidityDomain) -> Self {
        let adc = variables
            .adc_banks
            .iter()
            .map(|_| ModuleRecord::new(n_channels, domain))
            .collect();
        Self {
            header: EventHeader::default(),
            adc,
            tsc: None,
            dsssd: Dsssd::default(),
            ic: IonChamber::default(),
            mcp: Mcp::default(),
            variables,
        }
    }

    pub fn variables(&self) -> &TailVariables {
        &self.variables
    }
}

impl DetectorEvent for Tail {
    fn reset(&mut self) {
        self.header = EventHeader::default();
        self.adc.iter_mut().for_each(ModuleRecord::reset);
        self.tsc = None;
        self.dsssd = Dsssd::default();
        self.ic = IonChamber::default();
        self.mcp = Mcp::default();
    }

    fn unpack<E: BankSource + ?Sized>(&mut self, event: &E) -> UnpackReport {
        self.header = event.header();
        self.tsc = read_timestamp(event, &self.variables.tsc_bank);
        UnpackReport {
            outcomes: unpack_adc_banks(event, &self.variables.adc_banks, &mut self.adc),
        }
    }

    fn calculate(&mut self) {
        let vars = &self.variables;
        self.dsssd.calculate(&self.adc, &vars.dsssd);
        self.ic.calculate(&self.adc, &vars.ic);
        self.mcp.calculate(&self.adc, &vars.mcp.anode, &vars.mcp.tac);
    }

    fn timestamp(&self) -> Option<u64> {
        self.tsc
    }
}
