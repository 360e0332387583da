use serde::{Deserialize, Serialize};

use super::constants::*;
use super::error::ConfigError;
use super::validity::Sample;

/// Mapping and calibration of a block of ADC channels.
///
/// Every vector holds one entry per detector channel: which module record
/// (index into the assembler's bank list) and channel it is read from, its
/// pedestal, and its linear calibration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdcVariables {
    pub module: Vec<usize>,
    pub channel: Vec<usize>,
    pub pedestal: Vec<Sample>,
    pub slope: Vec<f64>,
    pub offset: Vec<f64>,
}

impl AdcVariables {
    /// n channels read from module 0, channels 0..n, no pedestal, unit calibration
    pub fn identity(n: usize) -> Self {
        Self::starting_at(n, 0, 0)
    }

    /// n channels read from `module` starting at `first_channel`, unit calibration
    pub fn starting_at(n: usize, module: usize, first_channel: usize) -> Self {
        Self {
            module: vec![module; n],
            channel: (first_channel..first_channel + n).collect(),
            pedestal: vec![0; n],
            slope: vec![1.0; n],
            offset: vec![0.0; n],
        }
    }

    pub fn len(&self) -> usize {
        self.module.len()
    }

    pub fn is_empty(&self) -> bool {
        self.module.is_empty()
    }

    /// Check that the block describes exactly `expected` channels and only
    /// references modules/channels that exist
    pub fn validate(
        &self,
        name: &'static str,
        expected: usize,
        n_modules: usize,
        n_channels: usize,
    ) -> Result<(), ConfigError> {
        let lengths = [
            self.module.len(),
            self.channel.len(),
            self.pedestal.len(),
            self.slope.len(),
            self.offset.len(),
        ];
        if lengths.iter().any(|l| *l != expected) {
            return Err(ConfigError::BadVariables(
                name,
                format!("expected {expected} entries per field, found {lengths:?}"),
            ));
        }
        if let Some(m) = self.module.iter().find(|m| **m >= n_modules) {
            return Err(ConfigError::BadVariables(
                name,
                format!("module index {m} but only {n_modules} ADC banks are configured"),
            ));
        }
        if let Some(ch) = self.channel.iter().find(|ch| **ch >= n_channels) {
            return Err(ConfigError::BadVariables(
                name,
                format!("channel {ch} but modules have {n_channels} channels"),
            ));
        }
        Ok(())
    }
}

/// Variables for the gamma (head) subsystem
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeadVariables {
    pub adc_banks: Vec<String>,
    pub tsc_bank: String,
    pub bgo: AdcVariables,
}

impl Default for HeadVariables {
    fn default() -> Self {
        Self {
            adc_banks: vec![String::from("ADC0")],
            tsc_bank: String::from("TSCH"),
            bgo: AdcVariables::identity(BGO_CHANNELS),
        }
    }
}

impl HeadVariables {
    pub fn validate(&self, n_channels: usize) -> Result<(), ConfigError> {
        self.bgo
            .validate("bgo", BGO_CHANNELS, self.adc_banks.len(), n_channels)
    }
}

/// Variables for the MCP: four anodes and one TAC
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct McpVariables {
    pub anode: AdcVariables,
    pub tac: AdcVariables,
}

/// Variables for the heavy-ion (tail) subsystem
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TailVariables {
    pub adc_banks: Vec<String>,
    pub tsc_bank: String,
    pub dsssd: AdcVariables,
    pub ic: AdcVariables,
    pub mcp: McpVariables,
}

impl Default for TailVariables {
    fn default() -> Self {
        Self {
            adc_banks: vec![String::from("ADC0"), String::from("ADC1")],
            tsc_bank: String::from("TSCT"),
            dsssd: AdcVariables::identity(DSSSD_CHANNELS),
            ic: AdcVariables::starting_at(IC_ANODES, 1, 0),
            mcp: McpVariables {
                anode: AdcVariables::starting_at(MCP_ANODES, 1, 8),
                tac: AdcVariables::starting_at(1, 1, 12),
            },
        }
    }
}

impl TailVariables {
    pub fn validate(&self, n_channels: usize) -> Result<(), ConfigError> {
        let n_modules = self.adc_banks.len();
        self.dsssd
            .validate("dsssd", DSSSD_CHANNELS, n_modules, n_channels)?;
        self.ic.validate("ic", IC_ANODES, n_modules, n_channels)?;
        self.mcp
            .anode
            .validate("mcp anode", MCP_ANODES, n_modules, n_channels)?;
        self.mcp.tac.validate("mcp tac", 1, n_modules, n_channels)
    }
}

/// Variables for one scaler readout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalerVariables {
    pub bank: String,
    pub names: Vec<String>,
}

impl ScalerVariables {
    pub fn head() -> Self {
        Self::with_bank("SCH0")
    }

    pub fn tail() -> Self {
        Self::with_bank("SCT0")
    }

    fn with_bank(bank: &str) -> Self {
        Self {
            bank: String::from(bank),
            names: (0..17).map(|i| format!("channel_{i}")).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        assert!(HeadVariables::default().validate(32).is_ok());
        assert!(TailVariables::default().validate(32).is_ok());
        // Default tail maps the DSSSD onto all 32 channels of module 0
        assert!(TailVariables::default().validate(16).is_err());
    }

    #[test]
    fn test_bad_lengths() {
        let mut vars = HeadVariables::default();
        vars.bgo.slope.pop();
        assert!(matches!(
            vars.validate(32),
            Err(ConfigError::BadVariables("bgo", _))
        ));
    }

    #[test]
    fn test_bad_module() {
        let mut vars = HeadVariables::default();
        vars.bgo.module[3] = 1;
        assert!(vars.validate(32).is_err());
    }
}
