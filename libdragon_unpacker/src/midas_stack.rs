use super::error::{MidasFileError, MidasStackError};
use super::midas_event::MidasEvent;
use super::midas_file::MidasFile;

use std::collections::VecDeque;
use std::path::{Path, PathBuf};

/// All of the .mid files belonging to one run.
///
/// MIDAS may split a run into several subfiles (`run00042.mid`, `run00042_001.mid`, ...).
/// The stack reads through them in order as if they were one file.
#[derive(Debug)]
pub struct MidasStack {
    pub file_stack: VecDeque<PathBuf>,
    active_file: MidasFile,
    pub total_stack_size_bytes: u64,
    bytes_done: u64,
    is_ended: bool,
}

impl MidasStack {
    /// Create a new MidasStack for the files in `path` whose names start with `run_str`
    pub fn new(path: &Path, run_str: &str) -> Result<Self, MidasStackError> {
        let (mut stack, bytes) = Self::get_file_stack(path, run_str)?;
        if let Some(file_path) = stack.pop_front() {
            Ok(Self {
                file_stack: stack,
                active_file: MidasFile::new(&file_path)?,
                total_stack_size_bytes: bytes,
                bytes_done: 0,
                is_ended: false,
            })
        } else {
            Err(MidasStackError::NoMatchingFiles)
        }
    }

    /// Get the next event in the stack. None once every file is exhausted.
    pub fn get_next_event(&mut self) -> Result<Option<MidasEvent>, MidasStackError> {
        loop {
            if self.is_ended {
                return Ok(None);
            }

            match self.active_file.get_next_event() {
                Ok(event) => return Ok(Some(event)),
                Err(MidasFileError::EndOfFile) => {
                    self.move_to_next_file()?;
                }
                Err(e) => return Err(MidasStackError::FileError(e)),
            };
        }
    }

    /// Bytes consumed so far across all files
    pub fn get_bytes_read(&self) -> u64 {
        self.bytes_done + self.active_file.get_bytes_read()
    }

    pub fn get_active_file(&self) -> &MidasFile {
        &self.active_file
    }

    /// Collect the matching .mid files and sort them
    fn get_file_stack(
        parent_path: &Path,
        run_str: &str,
    ) -> Result<(VecDeque<PathBuf>, u64), MidasStackError> {
        let mut file_list: Vec<PathBuf> = Vec::new();
        let mut total_stack_size_bytes = 0;
        for item in parent_path.read_dir()? {
            let item = item?;
            let item_path = item.path();
            let is_match = item_path
                .file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.starts_with(run_str) && name.ends_with(".mid"));
            if is_match {
                total_stack_size_bytes += item.metadata()?.len();
                file_list.push(item_path);
            }
        }

        if file_list.is_empty() {
            return Err(MidasStackError::NoMatchingFiles);
        }

        file_list.sort();
        Ok((file_list.into(), total_stack_size_bytes))
    }

    fn move_to_next_file(&mut self) -> Result<(), MidasStackError> {
        loop {
            if let Some(next_file_path) = self.file_stack.pop_front() {
                let next_file = MidasFile::new(&next_file_path)?;
                self.bytes_done += self.active_file.get_bytes_read();
                self.active_file = next_file;
                if !self.active_file.is_eof() {
                    spdlog::info!("Moving to file {:?}", self.active_file.get_path());
                    return Ok(());
                }
            } else {
                self.is_ended = true;
                return Ok(());
            }
        }
    }
}
