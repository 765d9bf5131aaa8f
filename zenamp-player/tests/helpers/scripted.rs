//! Decoder with canned results per path
//!
//! Lets transport tests run without real media files or a device.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use zenamp_player::audio::{AudioDecoder, DecodedAudio, TrackMetadata};
use zenamp_player::Error;

/// What decoding a path yields
#[derive(Debug, Clone)]
pub enum Script {
    Audio(DecodedAudio),
    /// Decoder error (corrupt or unsupported file)
    Fail,
    /// Parses but produces no samples
    Empty,
}

#[derive(Default)]
pub struct ScriptedDecoder {
    scripts: Mutex<HashMap<PathBuf, Script>>,
    metadata: Mutex<HashMap<PathBuf, TrackMetadata>>,
    decode_calls: AtomicUsize,
}

impl ScriptedDecoder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn script(&self, path: impl Into<PathBuf>, script: Script) {
        self.scripts.lock().unwrap().insert(path.into(), script);
    }

    /// `frames` of a constant mono signal at `sample_rate`
    pub fn mono(&self, path: impl Into<PathBuf>, sample_rate: u32, frames: usize, value: i16) {
        self.script(
            path,
            Script::Audio(DecodedAudio::new(vec![value; frames], sample_rate, 1)),
        );
    }

    pub fn tag(&self, path: impl Into<PathBuf>, metadata: TrackMetadata) {
        self.metadata.lock().unwrap().insert(path.into(), metadata);
    }

    pub fn decode_calls(&self) -> usize {
        self.decode_calls.load(Ordering::SeqCst)
    }
}

impl AudioDecoder for ScriptedDecoder {
    fn decode(&self, path: &Path) -> zenamp_player::Result<DecodedAudio> {
        self.decode_calls.fetch_add(1, Ordering::SeqCst);
        match self.scripts.lock().unwrap().get(path) {
            Some(Script::Audio(audio)) => Ok(audio.clone()),
            Some(Script::Fail) => Err(Error::Decode(format!("scripted failure: {}", path.display()))),
            Some(Script::Empty) => Ok(DecodedAudio::new(Vec::new(), 44100, 2)),
            None => Err(Error::Decode(format!("no script for {}", path.display()))),
        }
    }

    fn read_metadata(&self, path: &Path) -> TrackMetadata {
        self.metadata
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .unwrap_or_default()
    }
}
