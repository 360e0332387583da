use super::constants::MAX_MODULE_CHANNELS;
use super::validity::{Sample, ValidityDomain};

/// The data read out of one CAEN V785/V792 style peak sensing module.
///
/// The record has a fixed number of channels chosen at construction. All channels
/// start out as "no data" and are filled in place as hardware words are decoded.
#[derive(Debug, Clone, PartialEq)]
pub struct ModuleRecord {
    data: Box<[Sample]>,
    pub overflow: bool,
    pub underflow: bool,
    pub n_present: u16,
    pub count: u32,
    domain: ValidityDomain,
}

impl ModuleRecord {
    /// Create a record with `n_channels` channels, all set to no data.
    ///
    /// The channel count is clamped to what a 5-bit channel field can address.
    pub fn new(n_channels: usize, domain: ValidityDomain) -> Self {
        let n_channels = n_channels.min(MAX_MODULE_CHANNELS);
        Self {
            data: vec![domain.none; n_channels].into_boxed_slice(),
            overflow: false,
            underflow: false,
            n_present: 0,
            count: 0,
            domain,
        }
    }

    /// Return every field to its default value
    pub fn reset(&mut self) {
        self.data.fill(self.domain.none);
        self.overflow = false;
        self.underflow = false;
        self.n_present = 0;
        self.count = 0;
    }

    pub fn n_channels(&self) -> usize {
        self.data.len()
    }

    pub fn domain(&self) -> &ValidityDomain {
        &self.domain
    }

    /// The raw samples, with the sentinel in place of missing channels
    pub fn data(&self) -> &[Sample] {
        &self.data
    }

    /// Get a channel value. None if the channel has no data or does not exist.
    pub fn get(&self, channel: usize) -> Option<Sample> {
        self.data
            .get(channel)
            .and_then(|sample| self.domain.get(*sample))
    }

    /// Write a channel value. Returns false (and writes nothing) if the channel does not exist.
    pub fn set(&mut self, channel: usize, value: Sample) -> bool {
        match self.data.get_mut(channel) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    /// Copy the raw samples into a destination slice; returns the number copied
    pub fn copy_data(&self, destination: &mut [Sample]) -> usize {
        let n = destination.len().min(self.data.len());
        destination[..n].copy_from_slice(&self.data[..n]);
        n
    }
}
