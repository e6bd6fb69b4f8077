use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use thiserror::Error;

const CHUNK_BYTES: usize = 4096;

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("cannot start audio source: {0}")]
    Source(io::Error),
    #[error("audio capture I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("audio capture thread panicked")]
    Panicked,
}

/// Raw PCM byte stream, optionally backed by a recorder process that is
/// terminated when the source is released.
pub struct AudioSource {
    reader: Box<dyn Read + Send>,
    child: Option<Child>,
}

impl AudioSource {
    /// 16-bit little-endian interleaved PCM from `arecord`.
    pub fn arecord(device: &str, rate_hz: u32, channels: u16) -> Result<Self, CaptureError> {
        let mut child = Command::new("arecord")
            .args(["-q", "-D", device, "-f", "S16_LE", "-t", "raw"])
            .arg("-r")
            .arg(rate_hz.to_string())
            .arg("-c")
            .arg(channels.to_string())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(CaptureError::Source)?;

        let stdout = child.stdout.take().ok_or_else(|| {
            CaptureError::Source(io::Error::new(io::ErrorKind::Other, "arecord has no stdout"))
        })?;
        log::info!("Recording from {} (PID: {})", device, child.id());

        Ok(Self {
            reader: Box::new(stdout),
            child: Some(child),
        })
    }

    #[cfg(test)]
    pub fn from_reader<R: Read + Send + 'static>(reader: R) -> Self {
        Self {
            reader: Box::new(reader),
            child: None,
        }
    }

    fn release(self) {
        drop(self.reader);
        if let Some(mut child) = self.child {
            if let Err(e) = child.kill() {
                log::debug!("Recorder already exited: {}", e);
            }
            match child.wait() {
                Ok(status) => log::info!("Recorder stopped ({})", status),
                Err(e) => log::warn!("Recorder wait error: {}", e),
            }
        }
    }
}

/// Background thread copying an [`AudioSource`] to a file until stopped.
pub struct CaptureWorker {
    running: Arc<AtomicBool>,
    join: Option<JoinHandle<Result<u64, CaptureError>>>,
    path: PathBuf,
}

impl CaptureWorker {
    pub fn start(source: AudioSource, output: &Path) -> Result<Self, CaptureError> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(output)?;

        let running = Arc::new(AtomicBool::new(true));
        let flag = running.clone();
        let join = thread::spawn(move || {
            let result = copy_until_stopped(source, file, &flag);
            flag.store(false, Ordering::SeqCst);
            result
        });

        log::info!("Audio capture to {}", output.display());
        Ok(Self {
            running,
            join: Some(join),
            path: output.to_path_buf(),
        })
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Clears the running flag and waits for the worker. Returns the number
    /// of bytes written.
    pub fn stop(mut self) -> Result<u64, CaptureError> {
        self.finish()
    }

    fn finish(&mut self) -> Result<u64, CaptureError> {
        self.running.store(false, Ordering::SeqCst);
        match self.join.take() {
            Some(join) => {
                let written = join.join().map_err(|_| CaptureError::Panicked)??;
                log::info!("Captured {} bytes to {}", written, self.path.display());
                Ok(written)
            }
            None => Ok(0),
        }
    }
}

impl Drop for CaptureWorker {
    fn drop(&mut self) {
        if let Err(e) = self.finish() {
            log::error!("Audio capture failed: {}", e);
        }
    }
}

fn copy_until_stopped(
    mut source: AudioSource,
    file: File,
    running: &AtomicBool,
) -> Result<u64, CaptureError> {
    let mut out = BufWriter::new(file);
    let mut buf = [0u8; CHUNK_BYTES];
    let mut written: u64 = 0;

    let result = loop {
        if !running.load(Ordering::SeqCst) {
            break Ok(());
        }
        match source.reader.read(&mut buf) {
            Ok(0) => {
                log::warn!("Audio source ended");
                break Ok(());
            }
            Ok(n) => {
                if let Err(e) = out.write_all(&buf[..n]) {
                    break Err(e);
                }
                written += n as u64;
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => break Err(e),
        }
    };

    source.release();
    result?;
    out.flush()?;
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::time::Duration;

    #[test]
    fn copies_until_source_ends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pass.raw");
        let pcm: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();

        let worker = CaptureWorker::start(AudioSource::from_reader(Cursor::new(pcm.clone())), &path)
            .unwrap();
        while worker.is_running() {
            thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(worker.stop().unwrap(), pcm.len() as u64);
        assert_eq!(std::fs::read(&path).unwrap(), pcm);
    }

    #[test]
    fn stop_joins_an_endless_source() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("endless.raw");

        let worker = CaptureWorker::start(AudioSource::from_reader(io::repeat(0x55)), &path).unwrap();
        thread::sleep(Duration::from_millis(20));
        assert!(worker.is_running());

        let written = worker.stop().unwrap();
        assert!(written > 0);
        assert_eq!(std::fs::metadata(&path).unwrap().len(), written);
    }

    #[test]
    fn unwritable_output_fails_to_start() {
        let result = CaptureWorker::start(
            AudioSource::from_reader(Cursor::new(vec![0u8; 4])),
            Path::new("/nonexistent/dir/out.raw"),
        );
        assert!(matches!(result, Err(CaptureError::Io(_))));
    }
}
