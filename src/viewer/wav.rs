//! WAV loading and speaker output for the viewer.

use anyhow::Context;
use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use super::playback::{AudioClip, AudioLoader, AudioSink, PlaybackError};
use crate::capture::AudioRef;

/// Reads the WAV file an `AudioRef` points at.
#[derive(Debug, Default, Clone)]
pub struct WavAudioLoader;

#[async_trait]
impl AudioLoader for WavAudioLoader {
    async fn load(&self, audio: &AudioRef) -> Result<AudioClip, PlaybackError> {
        let path = PathBuf::from(&audio.0);
        let load_error = |reason: String| PlaybackError::Load {
            path: audio.to_string(),
            reason,
        };

        tokio::task::spawn_blocking(move || read_wav(&path))
            .await
            .map_err(|e| load_error(e.to_string()))?
            .map_err(|e| load_error(format!("{e:#}")))
    }
}

fn read_wav(path: &std::path::Path) -> anyhow::Result<AudioClip> {
    let reader = hound::WavReader::open(path)
        .with_context(|| format!("Failed to open WAV file: {:?}", path))?;
    let spec = reader.spec();

    let samples = match (spec.sample_format, spec.bits_per_sample) {
        (hound::SampleFormat::Int, 16) => reader
            .into_samples::<i16>()
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to decode WAV samples")?,
        (hound::SampleFormat::Float, 32) => reader
            .into_samples::<f32>()
            .map(|s| s.map(|s| (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16))
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to decode WAV samples")?,
        (format, bits) => anyhow::bail!("Unsupported WAV format: {:?} {}-bit", format, bits),
    };

    Ok(AudioClip {
        sample_rate: spec.sample_rate,
        channels: spec.channels,
        samples,
    })
}

type Reply<T> = oneshot::Sender<Result<T, PlaybackError>>;

enum SinkCommand {
    Play {
        clip: Arc<AudioClip>,
        from: usize,
        reply: Reply<()>,
    },
    Pause {
        reply: Reply<usize>,
    },
    Stop,
}

/// Default output device via cpal. Like the microphone, the stream lives on
/// its own thread.
pub struct CpalSink {
    commands: mpsc::UnboundedSender<SinkCommand>,
    position: Arc<AtomicUsize>,
}

impl CpalSink {
    pub fn new() -> anyhow::Result<Self> {
        let (tx, rx) = mpsc::unbounded_channel();
        let position = Arc::new(AtomicUsize::new(0));
        let worker_position = Arc::clone(&position);

        std::thread::Builder::new()
            .name("fieldrec-speaker".to_string())
            .spawn(move || {
                SinkWorker {
                    position: worker_position,
                    stream: None,
                }
                .run(rx)
            })
            .context("Failed to spawn speaker worker thread")?;

        Ok(Self {
            commands: tx,
            position,
        })
    }

    async fn call<T>(&self, make: impl FnOnce(Reply<T>) -> SinkCommand) -> Result<T, PlaybackError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(make(reply))
            .map_err(|_| PlaybackError::Output("speaker worker has stopped".to_string()))?;
        response
            .await
            .map_err(|_| PlaybackError::Output("speaker worker dropped the request".to_string()))?
    }
}

#[async_trait]
impl AudioSink for CpalSink {
    async fn play(&self, clip: Arc<AudioClip>, from: usize) -> Result<(), PlaybackError> {
        self.call(|reply| SinkCommand::Play { clip, from, reply })
            .await
    }

    async fn pause(&self) -> Result<usize, PlaybackError> {
        self.call(|reply| SinkCommand::Pause { reply }).await
    }

    fn position(&self) -> usize {
        self.position.load(Ordering::SeqCst)
    }

    fn stop(&self) {
        if self.commands.send(SinkCommand::Stop).is_err() {
            debug!("Speaker worker already gone");
        }
    }
}

struct SinkWorker {
    position: Arc<AtomicUsize>,
    stream: Option<cpal::Stream>,
}

impl SinkWorker {
    fn run(mut self, mut rx: mpsc::UnboundedReceiver<SinkCommand>) {
        debug!("Speaker worker started");
        while let Some(command) = rx.blocking_recv() {
            match command {
                SinkCommand::Play { clip, from, reply } => {
                    let _ = reply.send(self.play(clip, from));
                }
                SinkCommand::Pause { reply } => {
                    let _ = reply.send(self.pause());
                }
                SinkCommand::Stop => {
                    if self.stream.take().is_some() {
                        info!("Speaker output stopped");
                    }
                }
            }
        }
        debug!("Speaker worker stopped");
    }

    fn play(&mut self, clip: Arc<AudioClip>, from: usize) -> Result<(), PlaybackError> {
        self.stream = None;
        self.position.store(from, Ordering::SeqCst);

        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| PlaybackError::Output("no output device available".to_string()))?;

        let config = cpal::StreamConfig {
            channels: clip.channels,
            sample_rate: cpal::SampleRate(clip.sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let channels = usize::from(clip.channels.max(1));
        let position = Arc::clone(&self.position);
        let stream = device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    let frame = position.load(Ordering::SeqCst);
                    let start = frame * channels;
                    let available = clip.samples.len().saturating_sub(start);
                    let count = data.len().min(available);
                    for (out, sample) in data.iter_mut().zip(&clip.samples[start..start + count]) {
                        *out = f32::from(*sample) / i16::MAX as f32;
                    }
                    for out in data.iter_mut().skip(count) {
                        *out = 0.0;
                    }
                    position.store(frame + count / channels, Ordering::SeqCst);
                },
                move |err| error!("Speaker stream error: {}", err),
                None,
            )
            .map_err(|e| PlaybackError::Output(format!("failed to open output stream: {e}")))?;

        stream
            .play()
            .map_err(|e| PlaybackError::Output(format!("failed to start output stream: {e}")))?;
        self.stream = Some(stream);
        Ok(())
    }

    fn pause(&mut self) -> Result<usize, PlaybackError> {
        match self.stream.as_ref() {
            Some(stream) => stream
                .pause()
                .map_err(|e| PlaybackError::Output(format!("failed to pause output stream: {e}")))?,
            None => warn!("Pause requested with no output stream"),
        }
        Ok(self.position.load(Ordering::SeqCst))
    }
}
