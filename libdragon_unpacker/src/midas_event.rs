use byteorder::{LittleEndian, ReadBytesExt};
use fxhash::FxHashMap;
use std::io::{Cursor, Read};

use super::constants::*;
use super::error::{DecodeError, MidasEventError};

/// The fixed 16 byte header in front of every MIDAS event
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EventHeader {
    pub event_id: u16,
    pub trigger_mask: u16,
    /// Event serial number. For begin/end of run events this is the run number.
    pub serial_number: u32,
    /// Unix time (seconds) at which the frontend sent the event
    pub time_stamp: u32,
    pub data_size: u32,
}

impl EventHeader {
    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self, std::io::Error> {
        Ok(Self {
            event_id: reader.read_u16::<LittleEndian>()?,
            trigger_mask: reader.read_u16::<LittleEndian>()?,
            serial_number: reader.read_u32::<LittleEndian>()?,
            time_stamp: reader.read_u32::<LittleEndian>()?,
            data_size: reader.read_u32::<LittleEndian>()?,
        })
    }

    pub fn is_system_event(&self) -> bool {
        self.event_id & MIDAS_SYSTEM_MASK != 0
    }
}

/// Size in bytes of one element of a MIDAS bank type. None for unknown types.
pub fn element_size(tid: u16) -> Option<usize> {
    match tid {
        TID_BYTE | TID_SBYTE | TID_CHAR => Some(1),
        TID_WORD | TID_SHORT => Some(2),
        TID_DWORD | TID_INT | TID_BOOL | TID_FLOAT => Some(4),
        TID_DOUBLE => Some(8),
        _ => None,
    }
}

/// A borrowed view of one bank inside an event
#[derive(Debug, Clone, Copy)]
pub struct Bank<'a> {
    pub name: &'a str,
    pub tid: u16,
    pub data: &'a [u8],
}

impl Bank<'_> {
    /// Number of elements of the bank's declared type
    pub fn len(&self) -> usize {
        match element_size(self.tid) {
            Some(size) => self.data.len() / size,
            None => self.data.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterate the bank as 32-bit words, widening 1 and 2 byte elements.
    ///
    /// Types wider than 32 bits (or unknown types) cannot be read this way.
    pub fn words(&self) -> Result<impl Iterator<Item = u32> + '_, DecodeError> {
        let size = match element_size(self.tid) {
            Some(s) if s <= 4 => s,
            _ => return Err(DecodeError::UnsupportedBankType(self.tid)),
        };
        Ok(self.data.chunks_exact(size).map(move |chunk| match size {
            1 => chunk[0] as u32,
            2 => u16::from_le_bytes([chunk[0], chunk[1]]) as u32,
            _ => u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]),
        }))
    }
}

/// The view of a decoded event the unpacking core relies on
pub trait BankSource {
    fn header(&self) -> EventHeader;
    fn find_bank(&self, name: &str) -> Option<Bank<'_>>;

    fn event_id(&self) -> u16 {
        self.header().event_id
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct BankLocation {
    tid: u16,
    start: usize,
    end: usize,
}

/// A single MIDAS event: its header, its raw data, and an index of its banks
#[derive(Debug, Clone)]
pub struct MidasEvent {
    pub header: EventHeader,
    data: Vec<u8>,
    banks: FxHashMap<String, BankLocation>,
    bank_order: Vec<String>,
}

impl MidasEvent {
    /// Build an event from its header and data. System events (begin/end of run,
    /// messages) hold an ODB dump rather than banks, so their banks are not indexed.
    pub fn new(header: EventHeader, data: Vec<u8>) -> Result<Self, MidasEventError> {
        let mut event = Self {
            header,
            data,
            banks: FxHashMap::default(),
            bank_order: Vec::new(),
        };
        if !header.is_system_event() {
            event.index_banks()?;
        }
        Ok(event)
    }

    /// Read one full event (header and data) from a reader
    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self, MidasEventError> {
        let header = EventHeader::read_from(reader)?;
        let mut data = vec![0u8; header.data_size as usize];
        reader.read_exact(&mut data)?;
        Self::new(header, data)
    }

    pub fn time_stamp(&self) -> u32 {
        self.header.time_stamp
    }

    pub fn serial_number(&self) -> u32 {
        self.header.serial_number
    }

    /// The raw event data following the header
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn bank_names(&self) -> &[String] {
        &self.bank_order
    }

    fn index_banks(&mut self) -> Result<(), MidasEventError> {
        if self.data.len() < BANK_HEADER_SIZE {
            return Ok(());
        }
        let mut cursor = Cursor::new(&self.data[..]);
        let banks_size = cursor.read_u32::<LittleEndian>()?;
        let flags = cursor.read_u32::<LittleEndian>()?;
        let end = BANK_HEADER_SIZE + banks_size as usize;
        if end > self.data.len() {
            return Err(MidasEventError::BadBankHeader(banks_size, self.data.len()));
        }
        let is_32bit = flags & BANK_FORMAT_32BIT != 0;
        let is_aligned = flags & BANK_FORMAT_64BIT_ALIGNED != 0;

        let mut position = BANK_HEADER_SIZE;
        while position < end {
            let mut name_bytes = [0u8; 4];
            cursor.set_position(position as u64);
            cursor.read_exact(&mut name_bytes)?;
            let name = String::from_utf8_lossy(&name_bytes).into_owned();
            let (tid, size, header_size) = if is_32bit {
                let tid = cursor.read_u32::<LittleEndian>()? as u16;
                let size = cursor.read_u32::<LittleEndian>()? as usize;
                let header_size = if is_aligned {
                    BANK32A_HEADER_SIZE
                } else {
                    BANK32_HEADER_SIZE
                };
                (tid, size, header_size)
            } else {
                let tid = cursor.read_u16::<LittleEndian>()?;
                let size = cursor.read_u16::<LittleEndian>()? as usize;
                (tid, size, BANK16_HEADER_SIZE)
            };
            let start = position + header_size;
            let stop = start + size;
            if stop > end {
                return Err(MidasEventError::BankOverrun(name));
            }
            self.bank_order.push(name.clone());
            self.banks.insert(name, BankLocation { tid, start, end: stop });
            position = start + padded(size);
        }
        Ok(())
    }
}

impl BankSource for MidasEvent {
    fn header(&self) -> EventHeader {
        self.header
    }

    fn find_bank(&self, name: &str) -> Option<Bank<'_>> {
        let (key, location) = self.banks.get_key_value(name)?;
        Some(Bank {
            name: key,
            tid: location.tid,
            data: &self.data[location.start..location.end],
        })
    }
}

fn padded(size: usize) -> usize {
    size.div_ceil(BANK_ALIGNMENT) * BANK_ALIGNMENT
}

/// Assembles a MIDAS event in memory.
///
/// Useful for simulated input and for feeding hand made events to the unpacker. Banks are
/// written with 16-bit headers unless `bank_flags` selects one of the 32-bit formats.
#[derive(Debug, Clone, Default)]
pub struct MidasEventBuilder {
    header: EventHeader,
    flags: u32,
    banks: Vec<([u8; 4], u16, Vec<u8>)>,
}

impl MidasEventBuilder {
    pub fn new(event_id: u16) -> Self {
        Self {
            header: EventHeader {
                event_id,
                ..Default::default()
            },
            flags: 0,
            banks: Vec::new(),
        }
    }

    pub fn serial_number(mut self, serial_number: u32) -> Self {
        self.header.serial_number = serial_number;
        self
    }

    pub fn time_stamp(mut self, time_stamp: u32) -> Self {
        self.header.time_stamp = time_stamp;
        self
    }

    pub fn trigger_mask(mut self, trigger_mask: u16) -> Self {
        self.header.trigger_mask = trigger_mask;
        self
    }

    /// Set the flags word of the bank header (`BANK_FORMAT_32BIT`, `BANK_FORMAT_64BIT_ALIGNED`)
    pub fn bank_flags(mut self, flags: u32) -> Self {
        self.flags = flags;
        self
    }

    /// Append a bank of raw bytes with the given MIDAS type. Names are cut/padded to 4 bytes.
    pub fn bank(mut self, name: &str, tid: u16, data: &[u8]) -> Self {
        let mut name_bytes = [b' '; 4];
        for (slot, byte) in name_bytes.iter_mut().zip(name.bytes()) {
            *slot = byte;
        }
        self.banks.push((name_bytes, tid, data.to_vec()));
        self
    }

    /// Append a bank of 32-bit words
    pub fn bank_u32(self, name: &str, words: &[u32]) -> Self {
        let mut data = Vec::with_capacity(words.len() * 4);
        for word in words {
            data.extend_from_slice(&word.to_le_bytes());
        }
        self.bank(name, TID_DWORD, &data)
    }

    /// Serialize the event (header included) as it would appear in a MIDAS file
    pub fn to_bytes(&self) -> Vec<u8> {
        let data = self.data_bytes();
        let mut bytes = Vec::with_capacity(EVENT_HEADER_SIZE + data.len());
        bytes.extend_from_slice(&self.header.event_id.to_le_bytes());
        bytes.extend_from_slice(&self.header.trigger_mask.to_le_bytes());
        bytes.extend_from_slice(&self.header.serial_number.to_le_bytes());
        bytes.extend_from_slice(&self.header.time_stamp.to_le_bytes());
        bytes.extend_from_slice(&(data.len() as u32).to_le_bytes());
        bytes.extend_from_slice(&data);
        bytes
    }

    pub fn build(self) -> Result<MidasEvent, MidasEventError> {
        let data = self.data_bytes();
        let header = EventHeader {
            data_size: data.len() as u32,
            ..self.header
        };
        MidasEvent::new(header, data)
    }

    fn data_bytes(&self) -> Vec<u8> {
        if self.header.is_system_event() {
            return Vec::new();
        }
        let is_32bit = self.flags & BANK_FORMAT_32BIT != 0;
        let is_aligned = self.flags & BANK_FORMAT_64BIT_ALIGNED != 0;
        let mut banks = Vec::new();
        for (name, tid, data) in self.banks.iter() {
            banks.extend_from_slice(name);
            if is_32bit {
                banks.extend_from_slice(&(*tid as u32).to_le_bytes());
                banks.extend_from_slice(&(data.len() as u32).to_le_bytes());
                if is_aligned {
                    banks.extend_from_slice(&0u32.to_le_bytes());
                }
            } else {
                banks.extend_from_slice(&tid.to_le_bytes());
                banks.extend_from_slice(&(data.len() as u16).to_le_bytes());
            }
            banks.extend_from_slice(data);
            banks.resize(banks.len() + padded(data.len()) - data.len(), 0);
        }

        let mut data = Vec::with_capacity(BANK_HEADER_SIZE + banks.len());
        data.extend_from_slice(&(banks.len() as u32).to_le_bytes());
        data.extend_from_slice(&self.flags.to_le_bytes());
        data.extend_from_slice(&banks);
        data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_and_find_banks() {
        let event = MidasEventBuilder::new(DRAGON_HEAD_EVENT)
            .serial_number(12)
            .time_stamp(1_700_000_000)
            .bank_u32("ADC0", &[1, 2, 3])
            .bank("TEST", TID_WORD, &[0x01, 0x00, 0xff, 0xff])
            .build()
            .unwrap();
        assert_eq!(event.event_id(), DRAGON_HEAD_EVENT);
        assert_eq!(event.serial_number(), 12);
        assert_eq!(event.bank_names(), &["ADC0".to_string(), "TEST".to_string()]);

        let adc = event.find_bank("ADC0").unwrap();
        assert_eq!(adc.len(), 3);
        assert_eq!(adc.words().unwrap().collect::<Vec<u32>>(), vec![1, 2, 3]);

        let test = event.find_bank("TEST").unwrap();
        assert_eq!(test.words().unwrap().collect::<Vec<u32>>(), vec![1, 0xffff]);

        assert!(event.find_bank("NOPE").is_none());
    }

    #[test]
    fn test_read_from_bytes() {
        let bytes = MidasEventBuilder::new(DRAGON_TAIL_EVENT)
            .bank_u32("TSCT", &[0xdead, 0x1])
            .to_bytes();
        let mut cursor = Cursor::new(bytes);
        let event = MidasEvent::read_from(&mut cursor).unwrap();
        assert_eq!(event.event_id(), DRAGON_TAIL_EVENT);
        let words: Vec<u32> = event.find_bank("TSCT").unwrap().words().unwrap().collect();
        assert_eq!(words, vec![0xdead, 0x1]);
    }

    #[test]
    fn test_32bit_bank_headers() {
        let event = MidasEventBuilder::new(DRAGON_HEAD_EVENT)
            .bank_flags(0x11)
            .bank_u32("TSCH", &[5, 1])
            .bank("TEST", TID_WORD, &[0x02, 0x00])
            .build()
            .unwrap();
        assert_eq!(event.bank_names(), &["TSCH".to_string(), "TEST".to_string()]);
        let tsch = event.find_bank("TSCH").unwrap();
        assert_eq!(tsch.words().unwrap().collect::<Vec<u32>>(), vec![5, 1]);
        let test = event.find_bank("TEST").unwrap();
        assert_eq!(test.words().unwrap().collect::<Vec<u32>>(), vec![2]);
        // 8 byte bank header + (12 + 8) + (12 + 8)
        assert_eq!(event.data().len(), 48);
    }

    #[test]
    fn test_64bit_aligned_bank_headers() {
        let bytes = MidasEventBuilder::new(DRAGON_TAIL_EVENT)
            .bank_flags(0x31)
            .bank_u32("TSCT", &[7])
            .bank_u32("ADC0", &[1, 2, 3])
            .to_bytes();
        // 16 byte bank headers keep every payload 8 byte aligned
        assert_eq!(bytes.len(), EVENT_HEADER_SIZE + 8 + (16 + 8) + (16 + 16));
        let event = MidasEvent::read_from(&mut Cursor::new(bytes)).unwrap();
        let tsct = event.find_bank("TSCT").unwrap();
        assert_eq!(tsct.tid, TID_DWORD);
        assert_eq!(tsct.words().unwrap().collect::<Vec<u32>>(), vec![7]);
        let adc = event.find_bank("ADC0").unwrap();
        assert_eq!(adc.words().unwrap().collect::<Vec<u32>>(), vec![1, 2, 3]);
    }

    #[test]
    fn test_system_events_have_no_banks() {
        let event = MidasEventBuilder::new(MIDAS_BOR)
            .serial_number(42)
            .build()
            .unwrap();
        assert!(event.header.is_system_event());
        assert!(event.bank_names().is_empty());
    }

    #[test]
    fn test_double_bank_cannot_be_read_as_words() {
        let event = MidasEventBuilder::new(DRAGON_HEAD_EVENT)
            .bank("DBLE", TID_DOUBLE, &[0u8; 16])
            .build()
            .unwrap();
        let bank = event.find_bank("DBLE").unwrap();
        assert_eq!(bank.len(), 2);
        assert!(matches!(
            bank.words(),
            Err(DecodeError::UnsupportedBankType(TID_DOUBLE))
        ));
    }

    #[test]
    fn test_overrun_is_rejected() {
        let mut data = Vec::new();
        data.extend_from_slice(&12u32.to_le_bytes());
        data.extend_from_slice(&0u32.to_le_bytes());
        data.extend_from_slice(b"ADC0");
        data.extend_from_slice(&TID_DWORD.to_le_bytes());
        data.extend_from_slice(&64u16.to_le_bytes());
        data.extend_from_slice(&[0u8; 4]);
        let header = EventHeader {
            event_id: DRAGON_HEAD_EVENT,
            data_size: data.len() as u32,
            ..Default::default()
        };
        assert!(matches!(
            MidasEvent::new(header, data),
            Err(MidasEventError::BankOverrun(_))
        ));
    }
}
