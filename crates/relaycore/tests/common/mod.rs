//! Scripted backends and a recording transport for integration tests.
//!
//! Files are created sparse (`set_len`) so an "80 MB" download costs nothing.

#![allow(dead_code)]
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use relaycore::conversion::{EncodeError, EncodeJob, Encoder, ProbeError, Prober, StreamInfo};
use relaycore::download::source::{ExtractError, ExtractJob, Extracted, Extractor};
use relaycore::{Backends, ChatRef, Identity, Inbound, MediaArtifact, RelayConfig, StatusMessage, Transport, TransportError};

pub const MB: u64 = 1024 * 1024;

/// Config pointing at `dir`, with every default otherwise.
pub fn test_config(dir: &Path) -> RelayConfig {
    RelayConfig {
        download_dir: dir.to_path_buf(),
        instagram_cookies: dir.join("missing-cookies.txt"),
        ..RelayConfig::default()
    }
}

pub fn inbound(identity: u64, text: &str) -> Inbound {
    Inbound {
        identity: Identity(identity),
        chat: ChatRef::new(identity as i64).replying_to(1),
        text: text.to_string(),
    }
}

/// Names of every file in `dir`.
pub fn files_in(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

fn write_sparse(path: &Path, size: u64) {
    let file = std::fs::File::create(path).unwrap();
    file.set_len(size).unwrap();
}

/// What the fake extractor does at one ladder position.
#[derive(Debug, Clone)]
pub enum Step {
    Size(u64),
    Fail(ExtractError),
    Panic,
}

/// Answers ladder position `n` (taken from the `_a{n}` stem) with `steps[n-1]`.
/// Positions past the script repeat the last step.
pub struct ScriptedExtractor {
    steps: Vec<Step>,
    delay: Duration,
    has_audio: Option<bool>,
    dimensions: Option<(u32, u32)>,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    pub calls: AtomicUsize,
    /// Files present in the download directory when each call started
    pub files_at_start: Mutex<Vec<Vec<String>>>,
    pub jobs: Mutex<Vec<ExtractJob>>,
}

impl ScriptedExtractor {
    pub fn new(steps: Vec<Step>) -> Self {
        Self {
            steps,
            delay: Duration::ZERO,
            has_audio: Some(true),
            dimensions: Some((1280, 720)),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
            files_at_start: Mutex::new(Vec::new()),
            jobs: Mutex::new(Vec::new()),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn without_audio(mut self) -> Self {
        self.has_audio = Some(false);
        self
    }

    /// Reports no audio information, as when the output was found by scanning
    pub fn audio_unknown(mut self) -> Self {
        self.has_audio = None;
        self
    }

    fn step_for(&self, stem: &Path) -> Step {
        let name = stem.file_name().unwrap().to_string_lossy();
        let position: usize = name.rsplit("_a").next().unwrap().parse().unwrap();
        self.steps
            .get(position - 1)
            .or_else(|| self.steps.last())
            .cloned()
            .unwrap()
    }
}

#[async_trait]
impl Extractor for ScriptedExtractor {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn extract(&self, job: &ExtractJob) -> Result<Extracted, ExtractError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.jobs.lock().unwrap().push(job.clone());
        let dir = job.output_stem.parent().unwrap();
        self.files_at_start.lock().unwrap().push(files_in(dir));

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match self.step_for(&job.output_stem) {
            Step::Size(size) => {
                let path = PathBuf::from(format!("{}.mp4", job.output_stem.display()));
                write_sparse(&path, size);
                Ok(Extracted {
                    path,
                    declared_size: Some(size),
                    duration_secs: Some(12.0),
                    has_audio: self.has_audio,
                    width: self.dimensions.map(|d| d.0),
                    height: self.dimensions.map(|d| d.1),
                })
            }
            Step::Fail(e) => {
                // Leave a partial behind like yt-dlp does
                write_sparse(&PathBuf::from(format!("{}.mp4.part", job.output_stem.display())), 1024);
                Err(e)
            }
            Step::Panic => panic!("extractor exploded"),
        }
    }
}

/// Writes `sizes[i]` bytes for the i-th call; `None` fails it. Past the
/// script the last entry repeats.
pub struct ScriptedEncoder {
    sizes: Vec<Option<u64>>,
    installed: bool,
    pub calls: AtomicUsize,
    pub jobs: Mutex<Vec<EncodeJob>>,
}

impl ScriptedEncoder {
    pub fn new(sizes: Vec<Option<u64>>) -> Self {
        Self {
            sizes,
            installed: true,
            calls: AtomicUsize::new(0),
            jobs: Mutex::new(Vec::new()),
        }
    }
}

impl ScriptedEncoder {
    /// Behaves like a missing ffmpeg binary.
    pub fn missing() -> Self {
        Self {
            installed: false,
            ..Self::new(vec![])
        }
    }
}

#[async_trait]
impl Encoder for ScriptedEncoder {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn available(&self) -> bool {
        self.installed
    }

    async fn encode(&self, job: &EncodeJob) -> Result<(), EncodeError> {
        let index = self.calls.fetch_add(1, Ordering::SeqCst);
        self.jobs.lock().unwrap().push(job.clone());
        if !self.installed {
            return Err(EncodeError::Unavailable("ffmpeg".to_string()));
        }
        match self.sizes.get(index).or_else(|| self.sizes.last()).copied().flatten() {
            Some(size) => {
                write_sparse(&job.output, size);
                Ok(())
            }
            None => Err(EncodeError::Failed("scripted failure".to_string())),
        }
    }
}

pub enum FixedProber {
    Info(StreamInfo),
    Unavailable,
}

impl FixedProber {
    pub fn sar(sar: &str) -> Self {
        FixedProber::Info(StreamInfo {
            width: Some(1280),
            height: Some(720),
            sample_aspect_ratio: Some(sar.to_string()),
            has_audio: true,
        })
    }

    /// Square pixels, no audio stream.
    pub fn silent() -> Self {
        FixedProber::Info(StreamInfo {
            width: Some(1280),
            height: Some(720),
            sample_aspect_ratio: Some("1:1".to_string()),
            has_audio: false,
        })
    }
}

#[async_trait]
impl Prober for FixedProber {
    async fn probe(&self, _path: &Path) -> Result<StreamInfo, ProbeError> {
        match self {
            FixedProber::Info(info) => Ok(info.clone()),
            FixedProber::Unavailable => Err(ProbeError::Unavailable("ffprobe".to_string())),
        }
    }
}

pub fn backends(extractor: Arc<ScriptedExtractor>, encoder: Arc<ScriptedEncoder>, prober: FixedProber) -> Backends {
    Backends {
        extractor,
        encoder,
        prober: Arc::new(prober),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sent {
    Text { chat_id: i64, text: String },
    Edit { message_id: i32, text: String },
    Delete { message_id: i32 },
    Media { chat_id: i64, size: u64, animated: bool, file_existed: bool },
}

#[derive(Default)]
pub struct RecordingTransport {
    pub sent: Mutex<Vec<Sent>>,
    next_id: AtomicI32,
    pub fail_media: bool,
}

impl RecordingTransport {
    pub fn failing_media() -> Self {
        Self {
            fail_media: true,
            ..Self::default()
        }
    }

    pub fn log(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    pub fn texts(&self) -> Vec<String> {
        self.log()
            .into_iter()
            .filter_map(|s| match s {
                Sent::Text { text, .. } | Sent::Edit { text, .. } => Some(text),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn send_text(&self, chat: ChatRef, text: &str) -> Result<StatusMessage, TransportError> {
        self.sent.lock().unwrap().push(Sent::Text {
            chat_id: chat.chat_id,
            text: text.to_string(),
        });
        Ok(StatusMessage {
            chat_id: chat.chat_id,
            message_id: self.next_id.fetch_add(1, Ordering::SeqCst) + 100,
        })
    }

    async fn edit_text(&self, message: StatusMessage, text: &str) -> Result<(), TransportError> {
        self.sent.lock().unwrap().push(Sent::Edit {
            message_id: message.message_id,
            text: text.to_string(),
        });
        Ok(())
    }

    async fn delete_message(&self, message: StatusMessage) -> Result<(), TransportError> {
        self.sent.lock().unwrap().push(Sent::Delete {
            message_id: message.message_id,
        });
        Ok(())
    }

    async fn send_media(&self, chat: ChatRef, artifact: &MediaArtifact) -> Result<(), TransportError> {
        self.sent.lock().unwrap().push(Sent::Media {
            chat_id: chat.chat_id,
            size: artifact.size,
            animated: artifact.animated,
            file_existed: artifact.path.is_file(),
        });
        if self.fail_media {
            return Err(TransportError("Request Entity Too Large".to_string()));
        }
        Ok(())
    }
}
