use super::calc::calculate_tof;
use super::detector::DetectorEvent;
use super::error::CoincidenceError;
use super::head::Head;
use super::queue::{CoincidenceEvent, PendingEvent, Subsystem, Timestamped};
use super::tail::Tail;

/// A fully assembled single-subsystem event, the payload carried by the coincidence queue
#[derive(Debug, Clone)]
pub enum AssembledEvent {
    Head(Head),
    Tail(Tail),
}

impl AssembledEvent {
    pub fn subsystem(&self) -> Subsystem {
        match self {
            Self::Head(_) => Subsystem::Head,
            Self::Tail(_) => Subsystem::Tail,
        }
    }

    pub fn timestamp(&self) -> Option<u64> {
        match self {
            Self::Head(head) => head.timestamp(),
            Self::Tail(tail) => tail.timestamp(),
        }
    }

    /// Tag the event for the queue. Events without a timestamp cannot be matched and
    /// are handed back.
    pub fn into_timestamped(self) -> Result<Timestamped<Self>, Self> {
        match self.timestamp() {
            Some(ts) => Ok(Timestamped::new(self.subsystem(), ts, self)),
            None => Err(self),
        }
    }
}

/// A matched head and tail event
#[derive(Debug, Clone)]
pub struct Coinc {
    pub head: Head,
    pub tail: Tail,
    /// Tail minus head trigger time, in timestamp ticks
    pub xtof: Option<f64>,
}

impl Coinc {
    pub fn new(head: Head, tail: Tail) -> Self {
        let xtof = calculate_tof(tail.tsc.map(|t| t as f64), head.tsc.map(|t| t as f64));
        Self { head, tail, xtof }
    }
}

impl TryFrom<CoincidenceEvent<AssembledEvent>> for Coinc {
    type Error = (CoincidenceError, PendingEvent<AssembledEvent>, PendingEvent<AssembledEvent>);

    /// Unwrap the payloads of a matched pair. A payload whose variant disagrees with its
    /// subsystem tag is returned with the error so neither half is lost.
    fn try_from(value: CoincidenceEvent<AssembledEvent>) -> Result<Self, Self::Error> {
        let (head, tail) = value.into_parts();
        match (head.payload, tail.payload) {
            (AssembledEvent::Head(h), AssembledEvent::Tail(t)) => Ok(Self::new(h, t)),
            (hp, tp) => {
                let bad = if hp.subsystem() != Subsystem::Head {
                    Subsystem::Head
                } else {
                    Subsystem::Tail
                };
                Err((
                    CoincidenceError::MismatchedPayload(bad),
                    PendingEvent {
                        subsystem: head.subsystem,
                        timestamp: head.timestamp,
                        arrival: head.arrival,
                        payload: hp,
                    },
                    PendingEvent {
                        subsystem: tail.subsystem,
                        timestamp: tail.timestamp,
                        arrival: tail.arrival,
                        payload: tp,
                    },
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validity::ValidityDomain;
    use crate::variables::{HeadVariables, TailVariables};
    use std::sync::Arc;

    fn head_at(tsc: Option<u64>) -> Head {
        let mut head = Head::new(Arc::new(HeadVariables::default()), 32, ValidityDomain::default());
        head.tsc = tsc;
        head
    }

    fn tail_at(tsc: Option<u64>) -> Tail {
        let mut tail = Tail::new(Arc::new(TailVariables::default()), 32, ValidityDomain::default());
        tail.tsc = tsc;
        tail
    }

    fn pending(payload: AssembledEvent, subsystem: Subsystem, timestamp: u64) -> PendingEvent<AssembledEvent> {
        PendingEvent {
            subsystem,
            timestamp,
            arrival: 0,
            payload,
        }
    }

    #[test]
    fn test_xtof() {
        let coinc = Coinc::new(head_at(Some(100)), tail_at(Some(104)));
        assert_eq!(coinc.xtof, Some(4.0));
        let coinc = Coinc::new(head_at(Some(100)), tail_at(None));
        assert_eq!(coinc.xtof, None);
    }

    #[test]
    fn test_missing_timestamp_is_not_queued() {
        let event = AssembledEvent::Head(head_at(None));
        assert!(event.into_timestamped().is_err());
        let event = AssembledEvent::Tail(tail_at(Some(7)));
        let queued = event.into_timestamped().unwrap();
        assert_eq!(queued.subsystem, Subsystem::Tail);
        assert_eq!(queued.timestamp, 7);
    }

    #[test]
    fn test_mismatched_payload() {
        let good = CoincidenceEvent::new(
            pending(AssembledEvent::Head(head_at(Some(10))), Subsystem::Head, 10),
            pending(AssembledEvent::Tail(tail_at(Some(12))), Subsystem::Tail, 12),
            5,
        )
        .unwrap();
        assert!(Coinc::try_from(good).is_ok());

        let bad = CoincidenceEvent::new(
            pending(AssembledEvent::Tail(tail_at(Some(10))), Subsystem::Head, 10),
            pending(AssembledEvent::Tail(tail_at(Some(12))), Subsystem::Tail, 12),
            5,
        )
        .unwrap();
        match Coinc::try_from(bad) {
            Err((err, head, tail)) => {
                assert_eq!(err, CoincidenceError::MismatchedPayload(Subsystem::Head));
                assert_eq!(head.timestamp, 10);
                assert_eq!(tail.timestamp, 12);
            }
            Ok(_) => panic!("mismatched pair was accepted"),
        }
    }
}
