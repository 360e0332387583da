use serde::Serialize;
use std::fmt::Display;
use time::OffsetDateTime;

use super::midas_event::EventHeader;

/// Run number and start/stop times, taken from the begin and end of run events
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunParameters {
    pub run_number: Option<u32>,
    /// Unix time of the begin of run
    pub start_time: Option<u32>,
    /// Unix time of the end of run
    pub stop_time: Option<u32>,
}

fn format_unix(time: Option<u32>) -> String {
    match time.map(|t| OffsetDateTime::from_unix_timestamp(t as i64)) {
        Some(Ok(dt)) => dt.to_string(),
        _ => String::from("None"),
    }
}

impl RunParameters {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Begin of run: the serial number of the event is the run number
    pub fn begin(&mut self, header: &EventHeader) {
        self.reset();
        self.run_number = Some(header.serial_number);
        self.start_time = Some(header.time_stamp);
    }

    pub fn end(&mut self, header: &EventHeader) {
        if let Some(run) = self.run_number {
            if run != header.serial_number {
                spdlog::warn!(
                    "End of run number {} does not match begin of run number {run}",
                    header.serial_number
                );
            }
        } else {
            self.run_number = Some(header.serial_number);
        }
        self.stop_time = Some(header.time_stamp);
    }

    /// Run duration in seconds, if both ends were seen
    pub fn duration(&self) -> Option<u32> {
        match (self.start_time, self.stop_time) {
            (Some(start), Some(stop)) => Some(stop.saturating_sub(start)),
            _ => None,
        }
    }
}

impl Display for RunParameters {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let run = match self.run_number {
            Some(n) => n.to_string(),
            None => String::from("None"),
        };
        write!(
            f,
            "Run: {run} Start: {} Stop: {}",
            format_unix(self.start_time),
            format_unix(self.stop_time)
        )
    }
}
