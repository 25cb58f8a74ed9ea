//! Per-call audio mailbox
//!
//! The telephony layer records caller audio to `<id>_in.wav` and plays
//! responses from `<id>.out.wav`, both under one directory. Replies within
//! a turn are sample-appended so multiple spoken lines play as one file.
//! A transcript sidecar `<id>.ctx.txt` mirrors everything said.

use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::SpeechError;

#[derive(Debug, Clone)]
pub struct AudioMailbox {
    dir: PathBuf,
}

impl AudioMailbox {
    /// Open (creating if needed) a mailbox directory.
    pub fn new(dir: impl Into<PathBuf>) -> std::io::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Where the telephony layer records the caller
    pub fn inbound_path(&self, call_id: &str) -> PathBuf {
        self.dir.join(format!("{call_id}_in.wav"))
    }

    /// Where the telephony layer expects response audio
    pub fn outbound_path(&self, call_id: &str) -> PathBuf {
        self.dir.join(format!("{call_id}.out.wav"))
    }

    fn transcript_path(&self, call_id: &str) -> PathBuf {
        self.dir.join(format!("{call_id}.ctx.txt"))
    }

    /// Read the caller's recorded utterance.
    pub fn read_inbound(&self, call_id: &str) -> std::io::Result<Vec<u8>> {
        fs::read(self.inbound_path(call_id))
    }

    /// Append one synthesized reply to the call's outbound audio.
    ///
    /// The first reply lands as-is; later replies are appended sample-wise
    /// when formats agree. A format change replaces the file rather than
    /// producing garbled audio.
    pub fn append_reply(&self, call_id: &str, wav: &[u8]) -> Result<(), SpeechError> {
        let path = self.outbound_path(call_id);

        if !path.exists() {
            fs::write(&path, wav)?;
            return Ok(());
        }

        let mut existing = hound::WavReader::open(&path)?;
        let mut incoming = hound::WavReader::new(Cursor::new(wav))?;
        let spec = existing.spec();

        if spec != incoming.spec() || spec.sample_format != hound::SampleFormat::Int {
            tracing::warn!(call_id, "outbound WAV format changed, replacing file");
            fs::write(&path, wav)?;
            return Ok(());
        }

        let mut samples: Vec<i16> = Vec::new();
        for sample in existing.samples::<i16>() {
            samples.push(sample?);
        }
        for sample in incoming.samples::<i16>() {
            samples.push(sample?);
        }

        let mut writer = hound::WavWriter::create(&path, spec)?;
        for sample in samples {
            writer.write_sample(sample)?;
        }
        writer.finalize()?;

        Ok(())
    }

    /// Append one line to the transcript sidecar.
    pub fn append_transcript(&self, call_id: &str, line: &str) -> std::io::Result<()> {
        use std::io::Write;

        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.transcript_path(call_id))?;
        writeln!(file, "{line}")
    }

    /// Read the transcript sidecar, if any.
    pub fn read_transcript(&self, call_id: &str) -> std::io::Result<String> {
        fs::read_to_string(self.transcript_path(call_id))
    }

    /// Remove every file belonging to a call.
    pub fn purge(&self, call_id: &str) -> std::io::Result<()> {
        for path in [
            self.inbound_path(call_id),
            self.outbound_path(call_id),
            self.transcript_path(call_id),
        ] {
            match fs::remove_file(&path) {
                Ok(()) => {}
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }

    /// Delete mailbox files untouched for longer than `max_age`.
    /// Returns how many were removed.
    pub fn sweep(&self, max_age: Duration) -> std::io::Result<usize> {
        let mut removed = 0;

        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let metadata = match entry.metadata() {
                Ok(m) if m.is_file() => m,
                _ => continue,
            };
            let stale = metadata
                .modified()
                .ok()
                .and_then(|t| t.elapsed().ok())
                .map(|age| age > max_age)
                .unwrap_or(false);
            if stale && fs::remove_file(entry.path()).is_ok() {
                removed += 1;
            }
        }

        Ok(removed)
    }
}
