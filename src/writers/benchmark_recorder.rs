use crossbeam::channel::{self, Receiver, Sender};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::thread::JoinHandle;
use tracing::{debug, error};

use crate::error::{BenchError, Result};
use crate::models::LogRecord;

/// Append-only CSV log with a single writer thread.
///
/// The header is written only by the process that creates the file. Every
/// record becomes one complete line handed to a single `write_all` on an
/// `O_APPEND` descriptor, so lines from concurrent workers (or concurrent
/// processes sharing the file) never interleave.
pub struct BenchmarkRecorder<T: LogRecord> {
    path: PathBuf,
    sender: Option<Sender<T>>,
    handle: Option<JoinHandle<Result<usize>>>,
    _record: PhantomData<fn(T)>,
}

impl<T: LogRecord> BenchmarkRecorder<T> {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = open_log(&path, &T::header_line())?;

        let (sender, receiver) = channel::unbounded::<T>();
        let thread_path = path.clone();
        let handle = std::thread::Builder::new()
            .name("benchmark-recorder".to_string())
            .spawn(move || write_loop(file, receiver, &thread_path))?;

        Ok(Self {
            path,
            sender: Some(sender),
            handle: Some(handle),
            _record: PhantomData,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Queue one record. Safe to call from any worker.
    pub fn append(&self, record: T) -> Result<()> {
        let sender = self
            .sender
            .as_ref()
            .ok_or_else(|| BenchError::Config("benchmark recorder already closed".to_string()))?;
        sender.send(record).map_err(|_| {
            BenchError::Io(std::io::Error::new(
                ErrorKind::BrokenPipe,
                format!("writer for {} has stopped", self.path.display()),
            ))
        })
    }

    /// Flush queued records and stop the writer. Returns the number of lines written.
    pub fn close(mut self) -> Result<usize> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> Result<usize> {
        drop(self.sender.take());
        match self.handle.take() {
            Some(handle) => handle.join().map_err(|_| {
                BenchError::Io(std::io::Error::new(
                    ErrorKind::Other,
                    "benchmark recorder thread panicked",
                ))
            })?,
            None => Ok(0),
        }
    }
}

impl<T: LogRecord> Drop for BenchmarkRecorder<T> {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            error!("Failed to flush {}: {}", self.path.display(), e);
        }
    }
}

/// Create the log with its header, or reopen an existing log for append
/// after checking that its header matches.
fn open_log(path: &Path, header: &str) -> Result<File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    match OpenOptions::new().append(true).create_new(true).open(path) {
        Ok(mut file) => {
            file.write_all(format!("{}\n", header).as_bytes())?;
            debug!("Created {}", path.display());
            Ok(file)
        }
        Err(e) if e.kind() == ErrorKind::AlreadyExists => {
            verify_header(path, header)?;
            Ok(OpenOptions::new().append(true).open(path)?)
        }
        Err(e) => Err(e.into()),
    }
}

fn verify_header(path: &Path, header: &str) -> Result<()> {
    let mut first = String::new();
    BufReader::new(File::open(path)?).read_line(&mut first)?;

    // An empty file belongs to a process that has created it but not yet
    // written its header.
    if first.is_empty() {
        return Ok(());
    }

    let existing = first.trim_end_matches(['\r', '\n']);
    if existing != header {
        return Err(BenchError::Config(format!(
            "{} has header '{}', expected '{}'",
            path.display(),
            existing,
            header
        )));
    }
    Ok(())
}

fn encode<T: LogRecord>(record: &T) -> Result<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    writer.serialize(record)?;
    writer
        .into_inner()
        .map_err(|e| BenchError::Io(e.into_error()))
}

fn write_loop<T: LogRecord>(mut file: File, receiver: Receiver<T>, path: &Path) -> Result<usize> {
    let mut written = 0;
    let mut first_error = None;

    for record in receiver {
        let result = encode(&record).and_then(|line| Ok(file.write_all(&line)?));
        match result {
            Ok(()) => written += 1,
            Err(e) => {
                error!("Failed to append to {}: {}", path.display(), e);
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
        }
    }

    file.flush()?;
    match first_error {
        Some(e) => Err(e),
        None => Ok(written),
    }
}
