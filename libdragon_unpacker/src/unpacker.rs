use std::sync::Arc;

use super::buffer::WordFault;
use super::coinc::{AssembledEvent, Coinc};
use super::constants::*;
use super::detector::{DetectorEvent, UnpackReport};
use super::diagnostics::Diagnostics;
use super::head::Head;
use super::midas_event::{BankSource, EventHeader};
use super::queue::{
    Clock, CoincidenceEvent, CoincidenceQueue, PendingEvent, QueueSink, WallClock,
};
use super::run_parameters::RunParameters;
use super::scaler::Scaler;
use super::tail::Tail;
use super::validity::{Sample, ValidityDomain, NONE};
use super::variables::{HeadVariables, ScalerVariables, TailVariables};

/// Everything the unpacker needs to know, fixed at construction
#[derive(Debug, Clone, PartialEq)]
pub struct UnpackerConfig {
    pub singles_mode: bool,
    pub coinc_window: u64,
    pub queue_timeout: u64,
    pub module_channels: usize,
    pub no_data: Sample,
    pub head: HeadVariables,
    pub tail: TailVariables,
    pub head_scaler: ScalerVariables,
    pub tail_scaler: ScalerVariables,
}

impl Default for UnpackerConfig {
    fn default() -> Self {
        Self {
            singles_mode: false,
            coinc_window: COINC_WINDOW_DEFAULT,
            queue_timeout: QUEUE_TIMEOUT_DEFAULT,
            module_channels: MAX_MODULE_CHANNELS,
            no_data: NONE,
            head: HeadVariables::default(),
            tail: TailVariables::default(),
            head_scaler: ScalerVariables::head(),
            tail_scaler: ScalerVariables::tail(),
        }
    }
}

/// Decode faults of one event, reported alongside the (still assembled) event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeDiagnostic {
    pub event_id: u16,
    pub serial_number: u32,
    /// Each fault with the name of the bank it came from
    pub faults: Vec<(String, WordFault)>,
}

impl DecodeDiagnostic {
    fn new(header: &EventHeader, report: &UnpackReport) -> Self {
        Self {
            event_id: header.event_id,
            serial_number: header.serial_number,
            faults: report
                .faults()
                .map(|(bank, fault)| (String::from(bank), fault.clone()))
                .collect(),
        }
    }
}

/// The output of the unpacker
#[derive(Debug, Clone)]
pub enum UnpackedEvent {
    Head(Head),
    Tail(Tail),
    Coinc(Coinc),
    HeadScaler(Scaler),
    TailScaler(Scaler),
    RunParameters(RunParameters),
    DecodeFailure(DecodeDiagnostic),
}

impl From<AssembledEvent> for UnpackedEvent {
    fn from(value: AssembledEvent) -> Self {
        match value {
            AssembledEvent::Head(head) => Self::Head(head),
            AssembledEvent::Tail(tail) => Self::Tail(tail),
        }
    }
}

/// Turns what leaves the coincidence queue into unpacked events
struct UnpackedSink<'a> {
    unpacked: &'a mut Vec<UnpackedEvent>,
    invalid_pairs: u64,
}

impl QueueSink<AssembledEvent> for UnpackedSink<'_> {
    fn coincidence(&mut self, event: CoincidenceEvent<AssembledEvent>) {
        match Coinc::try_from(event) {
            Ok(coinc) => self.unpacked.push(UnpackedEvent::Coinc(coinc)),
            Err((e, head, tail)) => {
                spdlog::warn!(
                    "{e} -- emitting head (timestamp {}) and tail (timestamp {}) as singles",
                    head.timestamp,
                    tail.timestamp
                );
                self.invalid_pairs += 1;
                self.unpacked.push(head.payload.into());
                self.unpacked.push(tail.payload.into());
            }
        }
    }

    fn single(&mut self, event: PendingEvent<AssembledEvent>) {
        self.unpacked.push(event.payload.into());
    }
}

/// Routes MIDAS events to the detector assemblers, scalers, and the coincidence queue.
///
/// In singles mode no queue exists and every assembled event is emitted at once. In
/// coincidence mode head and tail events go through the queue; scaler and run
/// control events never do.
#[derive(Debug)]
pub struct Unpacker<C = WallClock> {
    head: Head,
    tail: Tail,
    head_scaler: Scaler,
    tail_scaler: Scaler,
    run_parameters: RunParameters,
    diagnostics: Diagnostics,
    queue: Option<CoincidenceQueue<AssembledEvent, C>>,
    unpacked: Vec<UnpackedEvent>,
}

impl Unpacker<WallClock> {
    pub fn new(config: &UnpackerConfig) -> Self {
        Self::with_clock(config, WallClock::default())
    }
}

impl<C: Clock> Unpacker<C> {
    /// Create an unpacker whose time-budgeted flush reads `clock`
    pub fn with_clock(config: &UnpackerConfig, clock: C) -> Self {
        let domain = ValidityDomain::new(config.no_data);
        let queue = if config.singles_mode {
            None
        } else {
            Some(CoincidenceQueue::with_clock(
                config.coinc_window,
                config.queue_timeout,
                clock,
            ))
        };
        Self {
            head: Head::new(
                Arc::new(config.head.clone()),
                config.module_channels,
                domain,
            ),
            tail: Tail::new(
                Arc::new(config.tail.clone()),
                config.module_channels,
                domain,
            ),
            head_scaler: Scaler::new(config.head_scaler.clone()),
            tail_scaler: Scaler::new(config.tail_scaler.clone()),
            run_parameters: RunParameters::default(),
            diagnostics: Diagnostics::default(),
            queue,
            unpacked: Vec::new(),
        }
    }

    pub fn is_singles_mode(&self) -> bool {
        self.queue.is_none()
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn run_parameters(&self) -> &RunParameters {
        &self.run_parameters
    }

    pub fn head_scaler(&self) -> &Scaler {
        &self.head_scaler
    }

    pub fn tail_scaler(&self) -> &Scaler {
        &self.tail_scaler
    }

    /// Number of events waiting in the coincidence queue
    pub fn queue_len(&self) -> usize {
        self.queue.as_ref().map_or(0, CoincidenceQueue::len)
    }

    /// Hand over everything unpacked since the last call
    pub fn take_unpacked(&mut self) -> Vec<UnpackedEvent> {
        std::mem::take(&mut self.unpacked)
    }

    /// Route one MIDAS event by its event id
    pub fn unpack_midas_event<E: BankSource + ?Sized>(&mut self, event: &E) {
        let header = event.header();
        match header.event_id {
            DRAGON_HEAD_EVENT => {
                let report = self.head.assemble(event);
                self.report_faults(&header, &report);
                self.handle_assembled(AssembledEvent::Head(self.head.clone()));
            }
            DRAGON_TAIL_EVENT => {
                let report = self.tail.assemble(event);
                self.report_faults(&header, &report);
                self.handle_assembled(AssembledEvent::Tail(self.tail.clone()));
            }
            DRAGON_HEAD_SCALER => {
                if self.head_scaler.unpack(event) {
                    self.unpacked
                        .push(UnpackedEvent::HeadScaler(self.head_scaler.clone()));
                }
            }
            DRAGON_TAIL_SCALER => {
                if self.tail_scaler.unpack(event) {
                    self.unpacked
                        .push(UnpackedEvent::TailScaler(self.tail_scaler.clone()));
                }
            }
            MIDAS_BOR => self.begin_run(&header),
            MIDAS_EOR => self.end_run(&header),
            MIDAS_MESSAGE => spdlog::debug!("Skipping MIDAS message event"),
            id => spdlog::warn!(
                "Unrecognized event id {id} (serial number {}), skipping",
                header.serial_number
            ),
        }
    }

    /// Time-budgeted drain of the queue. Returns the number of events evicted.
    pub fn flush_queue(&mut self, flush_time: u64) -> usize {
        let Some(queue) = self.queue.as_mut() else {
            return 0;
        };
        let mut sink = UnpackedSink {
            unpacked: &mut self.unpacked,
            invalid_pairs: 0,
        };
        let evicted = queue.flush(flush_time, &mut self.diagnostics, &mut sink);
        self.diagnostics.invalid_pairs += sink.invalid_pairs;
        evicted
    }

    /// Evict the oldest queued event. Returns the number of events still queued.
    pub fn flush_queue_iterative(&mut self) -> usize {
        let Some(queue) = self.queue.as_mut() else {
            return 0;
        };
        let mut sink = UnpackedSink {
            unpacked: &mut self.unpacked,
            invalid_pairs: 0,
        };
        let remaining = queue.flush_iterative(&mut self.diagnostics, &mut sink);
        self.diagnostics.invalid_pairs += sink.invalid_pairs;
        remaining
    }

    /// Evict every queued event as a single. Returns the number evicted.
    pub fn drain_queue(&mut self) -> usize {
        let Some(queue) = self.queue.as_mut() else {
            return 0;
        };
        let mut sink = UnpackedSink {
            unpacked: &mut self.unpacked,
            invalid_pairs: 0,
        };
        let evicted = queue.flush_all(&mut self.diagnostics, &mut sink);
        self.diagnostics.invalid_pairs += sink.invalid_pairs;
        evicted
    }

    fn report_faults(&mut self, header: &EventHeader, report: &UnpackReport) {
        if !report.is_success() {
            self.unpacked
                .push(UnpackedEvent::DecodeFailure(DecodeDiagnostic::new(
                    header, report,
                )));
        }
    }

    fn handle_assembled(&mut self, event: AssembledEvent) {
        let Some(queue) = self.queue.as_mut() else {
            self.unpacked.push(event.into());
            return;
        };
        match event.into_timestamped() {
            Ok(queued) => {
                let mut sink = UnpackedSink {
                    unpacked: &mut self.unpacked,
                    invalid_pairs: 0,
                };
                queue.push(queued, &mut self.diagnostics, &mut sink);
                self.diagnostics.invalid_pairs += sink.invalid_pairs;
            }
            Err(event) => {
                spdlog::warn!(
                    "{:?} event without a timestamp cannot be matched, emitting as a single",
                    event.subsystem()
                );
                self.diagnostics.missing_timestamp += 1;
                self.diagnostics.record_unmatched(event.subsystem());
                self.unpacked.push(event.into());
            }
        }
    }

    fn begin_run(&mut self, header: &EventHeader) {
        if self.queue_len() > 0 {
            spdlog::warn!(
                "Begin of run with {} events still queued from the previous run, draining",
                self.queue_len()
            );
            self.drain_queue();
        }
        self.head_scaler.reset();
        self.tail_scaler.reset();
        self.diagnostics.reset();
        self.run_parameters.begin(header);
        spdlog::info!("Begin of run -- {}", self.run_parameters);
    }

    fn end_run(&mut self, header: &EventHeader) {
        self.run_parameters.end(header);
        let drained = self.drain_queue();
        spdlog::info!(
            "End of run -- {} -- flushed {drained} unmatched events",
            self.run_parameters
        );
        self.unpacked
            .push(UnpackedEvent::RunParameters(self.run_parameters.clone()));
    }
}
