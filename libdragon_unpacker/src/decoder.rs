use super::constants::*;
use super::error::DecodeError;
use super::module::ModuleRecord;
use super::validity::Sample;

/// The kind of a CAEN output buffer word, held in bits 24-26
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferType {
    Data,
    Header,
    Footer,
    Invalid,
}

impl TryFrom<u8> for BufferType {
    type Error = DecodeError;
    fn try_from(tag: u8) -> Result<Self, Self::Error> {
        match tag {
            DATA_BITS => Ok(Self::Data),
            HEADER_BITS => Ok(Self::Header),
            FOOTER_BITS => Ok(Self::Footer),
            INVALID_BITS => Ok(Self::Invalid),
            _ => Err(DecodeError::UnknownBufferType(tag)),
        }
    }
}

/// One 32-bit word from a CAEN output buffer, with accessors for each field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawWord(pub u32);

impl RawWord {
    pub fn tag(&self) -> u8 {
        ((self.0 >> BUFFER_TYPE_SHIFT) & READ3) as u8
    }

    pub fn buffer_type(&self) -> Result<BufferType, DecodeError> {
        BufferType::try_from(self.tag())
    }

    pub fn channel(&self) -> u8 {
        ((self.0 >> CHANNEL_SHIFT) & READ5) as u8
    }

    pub fn value(&self) -> Sample {
        (self.0 & READ12) as Sample
    }

    pub fn overflow(&self) -> bool {
        (self.0 >> OVERFLOW_SHIFT) & READ1 == 1
    }

    pub fn underflow(&self) -> bool {
        (self.0 >> UNDERFLOW_SHIFT) & READ1 == 1
    }

    pub fn n_present(&self) -> u16 {
        ((self.0 >> N_PRESENT_SHIFT) & READ8) as u16
    }

    pub fn event_count(&self) -> u32 {
        self.0 & READ24
    }
}

impl From<u32> for RawWord {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

/// Decode one hardware word into the record.
///
/// Returns the buffer type that was handled. On error the record is left untouched.
pub fn decode_word(word: RawWord, record: &mut ModuleRecord) -> Result<BufferType, DecodeError> {
    let kind = word.buffer_type()?;
    match kind {
        BufferType::Data => {
            let channel = word.channel();
            if channel as usize >= record.n_channels() {
                return Err(DecodeError::OutOfRange {
                    channel,
                    capacity: record.n_channels(),
                });
            }
            record.underflow = word.underflow();
            record.overflow = word.overflow();
            record.set(channel as usize, word.value());
        }
        BufferType::Header => record.n_present = word.n_present(),
        BufferType::Footer => record.count = word.event_count(),
        BufferType::Invalid => return Err(DecodeError::ProtocolViolation(word.0)),
    }
    Ok(kind)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::validity::{ValidityDomain, NONE};

    pub fn data_word(channel: u32, value: u32) -> u32 {
        ((DATA_BITS as u32) << BUFFER_TYPE_SHIFT) | (channel << CHANNEL_SHIFT) | (value & READ12)
    }

    pub fn header_word(n_present: u32) -> u32 {
        ((HEADER_BITS as u32) << BUFFER_TYPE_SHIFT) | (n_present << N_PRESENT_SHIFT)
    }

    pub fn footer_word(count: u32) -> u32 {
        ((FOOTER_BITS as u32) << BUFFER_TYPE_SHIFT) | (count & READ24)
    }

    #[test]
    fn test_data_word_sets_one_channel() {
        let mut record = ModuleRecord::new(32, ValidityDomain::default());
        record.set(4, 77);
        let kind = decode_word(RawWord(data_word(7, 2345)), &mut record).unwrap();
        assert_eq!(kind, BufferType::Data);
        for ch in 0..32 {
            match ch {
                4 => assert_eq!(record.data()[ch], 77),
                7 => assert_eq!(record.data()[ch], 2345),
                _ => assert_eq!(record.data()[ch], NONE),
            }
        }
    }

    #[test]
    fn test_flags() {
        let mut record = ModuleRecord::new(32, ValidityDomain::default());
        let word = data_word(1, 4095) | (1 << OVERFLOW_SHIFT) | (1 << UNDERFLOW_SHIFT);
        decode_word(RawWord(word), &mut record).unwrap();
        assert!(record.overflow);
        assert!(record.underflow);
        assert_eq!(record.get(1), Some(4095));
    }

    #[test]
    fn test_out_of_range_leaves_record_unchanged() {
        let mut record = ModuleRecord::new(16, ValidityDomain::default());
        let before = record.clone();
        let result = decode_word(RawWord(data_word(16, 100) | (1 << OVERFLOW_SHIFT)), &mut record);
        assert_eq!(
            result,
            Err(DecodeError::OutOfRange {
                channel: 16,
                capacity: 16
            })
        );
        assert_eq!(record, before);
    }

    #[test]
    fn test_header_and_footer_independent_of_data() {
        let words = [
            header_word(3),
            data_word(2, 10),
            data_word(0, 20),
            data_word(9, 30),
            footer_word(0xabcdef),
        ];
        let mut forward = ModuleRecord::new(32, ValidityDomain::default());
        for w in words {
            decode_word(RawWord(w), &mut forward).unwrap();
        }
        let mut shuffled = ModuleRecord::new(32, ValidityDomain::default());
        for w in [words[0], words[3], words[1], words[2], words[4]] {
            decode_word(RawWord(w), &mut shuffled).unwrap();
        }
        assert_eq!(forward.n_present, 3);
        assert_eq!(forward.count, 0xabcdef);
        assert_eq!(forward, shuffled);
    }

    #[test]
    fn test_invalid_and_unknown() {
        let mut record = ModuleRecord::new(32, ValidityDomain::default());
        let before = record.clone();
        let invalid = (INVALID_BITS as u32) << BUFFER_TYPE_SHIFT;
        assert_eq!(
            decode_word(RawWord(invalid), &mut record),
            Err(DecodeError::ProtocolViolation(invalid))
        );
        let unknown = 0x5 << BUFFER_TYPE_SHIFT;
        assert_eq!(
            decode_word(RawWord(unknown), &mut record),
            Err(DecodeError::UnknownBufferType(0x5))
        );
        assert_eq!(record, before);
    }

    #[test]
    fn test_unknown_message_names_bits() {
        let msg = DecodeError::UnknownBufferType(0x3).to_string();
        assert!(msg.contains("1, 1, 0"));
    }
}
