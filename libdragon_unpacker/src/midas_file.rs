use std::fs::File;
use std::io::{BufReader, ErrorKind};
use std::path::{Path, PathBuf};

use super::constants::EVENT_HEADER_SIZE;
use super::error::{MidasEventError, MidasFileError};
use super::midas_event::MidasEvent;

/// A single MIDAS .mid file, read one event at a time
#[derive(Debug)]
pub struct MidasFile {
    reader: BufReader<File>,
    file_path: PathBuf,
    size_bytes: u64,
    bytes_read: u64,
}

impl MidasFile {
    pub fn new(path: &Path) -> Result<Self, MidasFileError> {
        if !path.exists() {
            return Err(MidasFileError::BadFilePath(path.to_path_buf()));
        }
        let file = File::open(path)?;
        let size_bytes = file.metadata()?.len();
        Ok(Self {
            reader: BufReader::new(file),
            file_path: path.to_path_buf(),
            size_bytes,
            bytes_read: 0,
        })
    }

    /// Read the next event. Returns `MidasFileError::EndOfFile` once the file is exhausted.
    ///
    /// A run stopped abruptly can leave a partial event at the end of the file. That
    /// event is dropped with a warning and the file is treated as exhausted.
    pub fn get_next_event(&mut self) -> Result<MidasEvent, MidasFileError> {
        if self.is_eof() {
            return Err(MidasFileError::EndOfFile);
        }
        match MidasEvent::read_from(&mut self.reader) {
            Ok(event) => {
                self.bytes_read += (EVENT_HEADER_SIZE + event.data().len()) as u64;
                Ok(event)
            }
            Err(MidasEventError::IOError(e)) if e.kind() == ErrorKind::UnexpectedEof => {
                spdlog::warn!(
                    "File {:?} ends with a partial event ({} of {} bytes unread), skipping it",
                    self.file_path,
                    self.size_bytes - self.bytes_read,
                    self.size_bytes
                );
                self.bytes_read = self.size_bytes;
                Err(MidasFileError::EndOfFile)
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn is_eof(&self) -> bool {
        self.bytes_read >= self.size_bytes
    }

    pub fn get_size_bytes(&self) -> u64 {
        self.size_bytes
    }

    pub fn get_bytes_read(&self) -> u64 {
        self.bytes_read
    }

    pub fn get_path(&self) -> &Path {
        &self.file_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{DRAGON_HEAD_EVENT, DRAGON_TAIL_EVENT, MIDAS_BOR};
    use crate::midas_event::{BankSource, MidasEventBuilder};
    use std::io::Write;

    #[test]
    fn test_read_events_until_eof() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run00007.mid");
        {
            let mut file = File::create(&path).unwrap();
            file.write_all(&MidasEventBuilder::new(MIDAS_BOR).serial_number(7).to_bytes())
                .unwrap();
            file.write_all(
                &MidasEventBuilder::new(DRAGON_HEAD_EVENT)
                    .bank_u32("TSCH", &[12])
                    .to_bytes(),
            )
            .unwrap();
        }

        let mut midas = MidasFile::new(&path).unwrap();
        let bor = midas.get_next_event().unwrap();
        assert_eq!(bor.event_id(), MIDAS_BOR);
        assert_eq!(bor.serial_number(), 7);
        let head = midas.get_next_event().unwrap();
        assert!(head.find_bank("TSCH").is_some());
        assert!(midas.is_eof());
        assert!(matches!(
            midas.get_next_event(),
            Err(MidasFileError::EndOfFile)
        ));
    }

    #[test]
    fn test_partial_last_event_ends_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run00009.mid");
        let mut bytes = MidasEventBuilder::new(DRAGON_HEAD_EVENT)
            .bank_u32("TSCH", &[1_000])
            .to_bytes();
        let tail = MidasEventBuilder::new(DRAGON_TAIL_EVENT)
            .bank_u32("TSCT", &[1_002])
            .to_bytes();
        bytes.extend_from_slice(&tail[..tail.len() - 6]);
        std::fs::write(&path, &bytes).unwrap();

        let mut midas = MidasFile::new(&path).unwrap();
        let head = midas.get_next_event().unwrap();
        assert_eq!(head.event_id(), DRAGON_HEAD_EVENT);
        assert!(matches!(
            midas.get_next_event(),
            Err(MidasFileError::EndOfFile)
        ));
        assert!(midas.is_eof());
        assert_eq!(midas.get_bytes_read(), bytes.len() as u64);
    }

    #[test]
    fn test_partial_header_ends_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run00010.mid");
        let mut bytes = MidasEventBuilder::new(MIDAS_BOR).to_bytes();
        bytes.extend_from_slice(&[0u8; 5]);
        std::fs::write(&path, &bytes).unwrap();

        let mut midas = MidasFile::new(&path).unwrap();
        assert_eq!(midas.get_next_event().unwrap().event_id(), MIDAS_BOR);
        assert!(matches!(
            midas.get_next_event(),
            Err(MidasFileError::EndOfFile)
        ));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            MidasFile::new(Path::new("/definitely/not/here.mid")),
            Err(MidasFileError::BadFilePath(_))
        ));
    }
}
