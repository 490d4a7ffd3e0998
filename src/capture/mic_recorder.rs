//! Microphone recorder via cpal.
//!
//! cpal streams are not `Send`, so the stream lives on a dedicated worker
//! thread and the async API talks to it over a command channel. Pausing keeps
//! the buffered samples; stopping writes them to a 16-bit WAV file.

use anyhow::{Context, Result};
use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use hound::{WavSpec, WavWriter};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use super::{AudioRecorder, AudioRef, CaptureOptions, DeviceError, DeviceHandle};

type Reply<T> = oneshot::Sender<Result<T, DeviceError>>;

enum RecorderCommand {
    Start {
        options: CaptureOptions,
        reply: Reply<DeviceHandle>,
    },
    Pause {
        handle_id: u64,
        reply: Reply<()>,
    },
    Resume {
        handle_id: u64,
        reply: Reply<()>,
    },
    Stop {
        handle_id: u64,
        reply: Reply<AudioRef>,
    },
    Abort {
        handle_id: u64,
        reply: oneshot::Sender<()>,
    },
}

pub struct MicRecorder {
    commands: mpsc::UnboundedSender<RecorderCommand>,
}

impl MicRecorder {
    /// Spawn the recorder worker. Recordings are written to `audio_dir`.
    pub fn new(audio_dir: PathBuf) -> Result<Self> {
        let (tx, rx) = mpsc::unbounded_channel();

        // The worker owns the (non-Send) stream, so it is built on its own thread.
        std::thread::Builder::new()
            .name("fieldrec-mic".to_string())
            .spawn(move || {
                RecorderWorker {
                    audio_dir,
                    active: None,
                    next_id: 1,
                }
                .run(rx)
            })
            .context("Failed to spawn microphone worker thread")?;

        Ok(Self { commands: tx })
    }

    async fn call<T>(
        &self,
        make: impl FnOnce(Reply<T>) -> RecorderCommand,
    ) -> Result<T, DeviceError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(make(reply))
            .map_err(|_| DeviceError::Fault("microphone worker has stopped".to_string()))?;
        response
            .await
            .map_err(|_| DeviceError::Fault("microphone worker dropped the request".to_string()))?
    }
}

#[async_trait]
impl AudioRecorder for MicRecorder {
    async fn start(&self, options: &CaptureOptions) -> Result<DeviceHandle, DeviceError> {
        let options = options.clone();
        self.call(|reply| RecorderCommand::Start { options, reply })
            .await
    }

    async fn pause(&self, handle: &DeviceHandle) -> Result<(), DeviceError> {
        let handle_id = handle.id();
        self.call(|reply| RecorderCommand::Pause { handle_id, reply })
            .await
    }

    async fn resume(&self, handle: &DeviceHandle) -> Result<(), DeviceError> {
        let handle_id = handle.id();
        self.call(|reply| RecorderCommand::Resume { handle_id, reply })
            .await
    }

    async fn stop(&self, handle: DeviceHandle) -> Result<AudioRef, DeviceError> {
        let handle_id = handle.id();
        self.call(|reply| RecorderCommand::Stop { handle_id, reply })
            .await
    }

    async fn abort(&self, handle: DeviceHandle) {
        let (reply, done) = oneshot::channel();
        let command = RecorderCommand::Abort {
            handle_id: handle.id(),
            reply,
        };
        if self.commands.send(command).is_err() {
            warn!("Microphone worker gone before abort");
            return;
        }
        let _ = done.await;
    }
}

struct ActiveRecording {
    id: u64,
    stream: cpal::Stream,
    samples: Arc<Mutex<Vec<i16>>>,
    faulted: Arc<AtomicBool>,
    sample_rate: u32,
    channels: u16,
    output_path: PathBuf,
}

struct RecorderWorker {
    audio_dir: PathBuf,
    active: Option<ActiveRecording>,
    next_id: u64,
}

impl RecorderWorker {
    fn run(mut self, mut rx: mpsc::UnboundedReceiver<RecorderCommand>) {
        debug!("Microphone worker started");
        while let Some(command) = rx.blocking_recv() {
            match command {
                RecorderCommand::Start { options, reply } => {
                    let _ = reply.send(self.start(&options));
                }
                RecorderCommand::Pause { handle_id, reply } => {
                    let _ = reply.send(self.pause(handle_id));
                }
                RecorderCommand::Resume { handle_id, reply } => {
                    let _ = reply.send(self.resume(handle_id));
                }
                RecorderCommand::Stop { handle_id, reply } => {
                    let _ = reply.send(self.stop(handle_id));
                }
                RecorderCommand::Abort { handle_id, reply } => {
                    self.abort(handle_id);
                    let _ = reply.send(());
                }
            }
        }

        if self.active.take().is_some() {
            warn!("Microphone worker shutting down with an open recording");
        }
        debug!("Microphone worker stopped");
    }

    fn start(&mut self, options: &CaptureOptions) -> Result<DeviceHandle, DeviceError> {
        if self.active.is_some() {
            return Err(DeviceError::Unavailable(
                "microphone is already recording".to_string(),
            ));
        }

        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| DeviceError::Unavailable("no input device available".to_string()))?;

        info!(
            "Recording from input device: {}",
            device.name().unwrap_or_else(|_| "unknown".to_string())
        );

        let config = cpal::StreamConfig {
            channels: options.channels,
            sample_rate: cpal::SampleRate(options.sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let samples = Arc::new(Mutex::new(Vec::new()));
        let faulted = Arc::new(AtomicBool::new(false));
        let samples_clone = Arc::clone(&samples);
        let faulted_clone = Arc::clone(&faulted);

        let stream = device
            .build_input_stream(
                &config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    if let Ok(mut samples) = samples_clone.lock() {
                        samples.extend(data.iter().map(|s| to_i16(*s)));
                    }
                },
                move |err| {
                    error!("Microphone stream error: {}", err);
                    faulted_clone.store(true, Ordering::SeqCst);
                },
                None,
            )
            .map_err(|e| DeviceError::Unavailable(format!("failed to open input stream: {e}")))?;

        stream
            .play()
            .map_err(|e| DeviceError::Unavailable(format!("failed to start input stream: {e}")))?;

        let id = self.next_id;
        self.next_id += 1;
        self.active = Some(ActiveRecording {
            id,
            stream,
            samples,
            faulted,
            sample_rate: options.sample_rate,
            channels: options.channels,
            output_path: self.audio_dir.join(format!("{}.wav", options.session_id)),
        });

        Ok(DeviceHandle::new(id))
    }

    fn recording(&self, handle_id: u64) -> Result<&ActiveRecording, DeviceError> {
        let active = self
            .active
            .as_ref()
            .filter(|a| a.id == handle_id)
            .ok_or_else(|| DeviceError::Unavailable(format!("unknown handle {handle_id}")))?;

        if active.faulted.load(Ordering::SeqCst) {
            return Err(DeviceError::Fault("input stream reported an error".to_string()));
        }
        Ok(active)
    }

    fn pause(&self, handle_id: u64) -> Result<(), DeviceError> {
        self.recording(handle_id)?
            .stream
            .pause()
            .map_err(|e| DeviceError::Fault(format!("failed to pause input stream: {e}")))
    }

    fn resume(&self, handle_id: u64) -> Result<(), DeviceError> {
        self.recording(handle_id)?
            .stream
            .play()
            .map_err(|e| DeviceError::Fault(format!("failed to resume input stream: {e}")))
    }

    fn stop(&mut self, handle_id: u64) -> Result<AudioRef, DeviceError> {
        let check = self.recording(handle_id).map(|_| ());
        let Some(active) = self.take_active(handle_id) else {
            return Err(DeviceError::Unavailable(format!("unknown handle {handle_id}")));
        };
        drop(active.stream);
        check?;

        let samples = match active.samples.lock() {
            Ok(mut guard) => std::mem::take(&mut *guard),
            Err(_) => return Err(DeviceError::Fault("sample buffer poisoned".to_string())),
        };

        write_wav(
            &active.output_path,
            &samples,
            active.sample_rate,
            active.channels,
        )
        .map_err(|e| DeviceError::Fault(format!("{e:#}")))?;

        info!(
            "Microphone stopped, {} samples written to {:?}",
            samples.len(),
            active.output_path
        );
        Ok(AudioRef(active.output_path.to_string_lossy().to_string()))
    }

    fn take_active(&mut self, handle_id: u64) -> Option<ActiveRecording> {
        match &self.active {
            Some(active) if active.id == handle_id => self.active.take(),
            _ => None,
        }
    }

    fn abort(&mut self, handle_id: u64) {
        if self.take_active(handle_id).is_some() {
            info!("Microphone recording {} aborted", handle_id);
        }
    }
}

fn to_i16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16
}

fn write_wav(path: &Path, samples: &[i16], sample_rate: u32, channels: u16) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).context("Failed to create recordings directory")?;
    }

    let spec = WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = WavWriter::create(path, spec)
        .with_context(|| format!("Failed to create WAV file: {:?}", path))?;
    for &sample in samples {
        writer.write_sample(sample)?;
    }
    writer.finalize().context("Failed to finalize WAV file")?;
    Ok(())
}
