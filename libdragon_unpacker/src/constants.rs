// Bit masks for reading fields out of 32-bit VME words
pub const READ1: u32 = 0x1;
pub const READ3: u32 = 0x7;
pub const READ5: u32 = 0x1f;
pub const READ8: u32 = 0xff;
pub const READ12: u32 = 0xfff;
pub const READ24: u32 = 0xffffff;

// CAEN ADC/QDC buffer type tags (bits 24-26)
pub const BUFFER_TYPE_SHIFT: u32 = 24;
pub const DATA_BITS: u8 = 0x0;
pub const HEADER_BITS: u8 = 0x2;
pub const FOOTER_BITS: u8 = 0x4;
pub const INVALID_BITS: u8 = 0x6;

// CAEN data word layout
pub const CHANNEL_SHIFT: u32 = 16;
pub const UNDERFLOW_SHIFT: u32 = 13;
pub const OVERFLOW_SHIFT: u32 = 12;
pub const N_PRESENT_SHIFT: u32 = 6;

/// Largest channel count a CAEN record can address with a 5-bit channel field
pub const MAX_MODULE_CHANNELS: usize = 32;

// MIDAS event ids
pub const DRAGON_HEAD_EVENT: u16 = 1;
pub const DRAGON_HEAD_SCALER: u16 = 2;
pub const DRAGON_TAIL_EVENT: u16 = 3;
pub const DRAGON_TAIL_SCALER: u16 = 4;
pub const MIDAS_BOR: u16 = 0x8000;
pub const MIDAS_EOR: u16 = 0x8001;
pub const MIDAS_MESSAGE: u16 = 0x8002;
pub const MIDAS_SYSTEM_MASK: u16 = 0x8000;

// MIDAS container layout
pub const EVENT_HEADER_SIZE: usize = 16;
pub const BANK_HEADER_SIZE: usize = 8;
pub const BANK16_HEADER_SIZE: usize = 8;
pub const BANK32_HEADER_SIZE: usize = 12;
pub const BANK32A_HEADER_SIZE: usize = 16;
pub const BANK_FORMAT_32BIT: u32 = 0x10;
pub const BANK_FORMAT_64BIT_ALIGNED: u32 = 0x20;
pub const BANK_ALIGNMENT: usize = 8;

// MIDAS type ids
pub const TID_BYTE: u16 = 1;
pub const TID_SBYTE: u16 = 2;
pub const TID_CHAR: u16 = 3;
pub const TID_WORD: u16 = 4;
pub const TID_SHORT: u16 = 5;
pub const TID_DWORD: u16 = 6;
pub const TID_INT: u16 = 7;
pub const TID_BOOL: u16 = 8;
pub const TID_FLOAT: u16 = 9;
pub const TID_DOUBLE: u16 = 10;

/// Default coincidence matching window, in timestamp ticks
pub const COINC_WINDOW_DEFAULT: u64 = 10;
/// Default residency time of a pending event, in timestamp ticks (two seconds at 1 MHz)
pub const QUEUE_TIMEOUT_DEFAULT: u64 = 2_000_000;

// Detector sizes
pub const BGO_CHANNELS: usize = 30;
pub const DSSSD_CHANNELS: usize = 32;
pub const DSSSD_FRONT_CHANNELS: usize = 16;
pub const IC_ANODES: usize = 4;
pub const MCP_ANODES: usize = 4;
/// Half the width of the MCP active area, in mm
pub const MCP_HALF_WIDTH: f64 = 25.0;
