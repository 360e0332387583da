use std::path::PathBuf;
use thiserror::Error;

use super::queue::Subsystem;
use super::worker_status::WorkerStatus;

fn tag_bit(tag: &u8, bit: u8) -> u8 {
    (tag >> bit) & 1
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("Read a channel number {channel} which is >= the module capacity {capacity}")]
    OutOfRange { channel: u8, capacity: usize },
    #[error("Read INVALID buffer code from a CAEN ADC output buffer (word {0:#010x})")]
    ProtocolViolation(u32),
    #[error("Unknown CAEN ADC buffer type (bits 24, 25, 26 = {}, {}, {})", tag_bit(.0, 0), tag_bit(.0, 1), tag_bit(.0, 2))]
    UnknownBufferType(u8),
    #[error("Bank has MIDAS type {0} which cannot be read as 32-bit words")]
    UnsupportedBankType(u16),
}

#[derive(Debug, Error)]
pub enum MidasEventError {
    #[error("Failed to parse buffer into a MIDAS event: {0}")]
    IOError(#[from] std::io::Error),
    #[error("MIDAS bank {0} runs past the end of its event")]
    BankOverrun(String),
    #[error("MIDAS bank header declares {0} bytes but the event only holds {1}")]
    BadBankHeader(u32, usize),
}

#[derive(Debug, Error)]
pub enum MidasFileError {
    #[error("Error when parsing MidasEvent from MidasFile: {0}")]
    BadEvent(#[from] MidasEventError),
    #[error("Could not open MidasFile because file {0:?} does not exist")]
    BadFilePath(PathBuf),
    #[error("Reached end of MidasFile")]
    EndOfFile,
    #[error("MidasFile failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum MidasStackError {
    #[error("MidasStack failed with IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("MidasStack did not find any matching files in the MIDAS directory")]
    NoMatchingFiles,
    #[error("MidasStack failed due to MidasFile error: {0}")]
    FileError(#[from] MidasFileError),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoincidenceError {
    #[error("Invalid coincidence pair: both events belong to the {0:?} subsystem")]
    SameSubsystem(Subsystem),
    #[error("Invalid coincidence pair: timestamp difference {delta} exceeds window {window}")]
    OutsideWindow { delta: u64, window: u64 },
    #[error("Invalid coincidence pair: payload does not match its {0:?} subsystem tag")]
    MismatchedPayload(Subsystem),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration as file {0:?} does not exist")]
    BadFilePath(PathBuf),
    #[error("Config failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Config failed to parse YAML: {0}")]
    ParsingError(#[from] serde_yaml::Error),
    #[error("Config has an invalid value: {0}")]
    BadValue(String),
    #[error("Config has inconsistent {0} variables: {1}")]
    BadVariables(&'static str, String),
}

#[derive(Debug, Error)]
pub enum SummaryWriterError {
    #[error("SummaryWriter failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("SummaryWriter failed to convert to yaml: {0}")]
    ParsingError(#[from] serde_yaml::Error),
}

#[derive(Debug, Error)]
pub enum ProcessorError {
    #[error("Processor failed due to MidasStack error: {0}")]
    StackError(#[from] MidasStackError),
    #[error("Processor failed due to Config error: {0}")]
    ConfigError(#[from] ConfigError),
    #[error("Processor failed due to SummaryWriter error: {0}")]
    SummaryError(#[from] SummaryWriterError),
    #[error("Processor failed due to Send error: {0}")]
    SendError(#[from] std::sync::mpsc::SendError<WorkerStatus>),
    #[error("Processor failed due to IO error: {0}")]
    IoError(#[from] std::io::Error),
}
