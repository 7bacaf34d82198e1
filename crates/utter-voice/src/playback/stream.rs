//! Dedicated audio output thread that isolates `!Send` rodio resources.
//!
//! `rodio::OutputStream` is `!Send` on some platforms, so the device and
//! its sinks are confined to one OS thread; the [`OutputManager`] handle is
//! the `Send + Sync` proxy the coordinator holds, routing every operation
//! through a command channel. At most one sink is active per process;
//! starting a new playback stops and replaces the previous one.

use std::io::Cursor;
use std::sync::mpsc;
use std::thread;

use rodio::source::Source;
use rodio::{OutputStream, Sink};
use tokio::sync::oneshot;
use tracing::debug;

use utter_core::error::{SpeechError, SpeechResult};

/// Silence prepended to every stream so the device spins up before the
/// first audible samples; without it the opening syllable can be clipped.
const PREBUFFER: std::time::Duration = std::time::Duration::from_millis(50);

enum AudioCommand {
    /// Decode `bytes` and play them on a fresh sink, replacing any active
    /// one. `started` reports whether playback began; `drained` fires when
    /// the device has consumed the buffer (or the sink was stopped).
    Play {
        bytes: Vec<u8>,
        started: oneshot::Sender<SpeechResult<()>>,
        drained: oneshot::Sender<()>,
    },

    /// Stop the active sink immediately. Idempotent.
    Stop,

    /// Shut down the audio thread, releasing the device.
    Shutdown,
}

/// `Send + Sync` handle to the audio output thread.
pub(crate) struct OutputManager {
    cmd_tx: mpsc::Sender<AudioCommand>,
    thread: Option<thread::JoinHandle<()>>,
}

impl OutputManager {
    /// Spawn the audio thread and open the default output device on it.
    /// Device-open failure is propagated back through the init channel.
    pub fn spawn() -> SpeechResult<Self> {
        let (cmd_tx, cmd_rx) = mpsc::channel::<AudioCommand>();
        let (init_tx, init_rx) = mpsc::channel::<SpeechResult<()>>();

        let thread = thread::Builder::new()
            .name("utter-audio".into())
            .spawn(move || run(&cmd_rx, &init_tx))
            .map_err(|e| SpeechError::Playback(format!("failed to spawn audio thread: {e}")))?;

        init_rx
            .recv()
            .map_err(|_| SpeechError::Playback("audio thread died during init".to_string()))??;

        Ok(Self {
            cmd_tx,
            thread: Some(thread),
        })
    }

    /// Begin playing `bytes`. Returns the two completion channels: await
    /// `started` for the open/decode outcome, then `drained` for the device
    /// finishing the buffer.
    pub fn play(
        &self,
        bytes: Vec<u8>,
    ) -> SpeechResult<(oneshot::Receiver<SpeechResult<()>>, oneshot::Receiver<()>)> {
        let (started_tx, started_rx) = oneshot::channel();
        let (drained_tx, drained_rx) = oneshot::channel();
        self.cmd_tx
            .send(AudioCommand::Play {
                bytes,
                started: started_tx,
                drained: drained_tx,
            })
            .map_err(|_| SpeechError::Playback("audio thread is gone".to_string()))?;
        Ok((started_rx, drained_rx))
    }

    /// Stop any active playback immediately (fire-and-forget).
    pub fn stop(&self) {
        let _ = self.cmd_tx.send(AudioCommand::Stop);
    }
}

impl Drop for OutputManager {
    fn drop(&mut self) {
        let _ = self.cmd_tx.send(AudioCommand::Shutdown);
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
    }
}

/// Audio thread body. Owns the `!Send` output stream for its entire life.
fn run(cmd_rx: &mpsc::Receiver<AudioCommand>, init_tx: &mpsc::Sender<SpeechResult<()>>) {
    let (_stream, handle) = match OutputStream::try_default() {
        Ok(pair) => pair,
        Err(e) => {
            let _ = init_tx.send(Err(SpeechError::Playback(format!(
                "no audio output device: {e}"
            ))));
            return;
        }
    };
    if init_tx.send(Ok(())).is_err() {
        return;
    }

    // The one active sink this process owns.
    let mut current: Option<std::sync::Arc<Sink>> = None;

    while let Ok(cmd) = cmd_rx.recv() {
        match cmd {
            AudioCommand::Play {
                bytes,
                started,
                drained,
            } => {
                // Stop and close any still-active stream first.
                if let Some(sink) = current.take() {
                    sink.stop();
                }

                let outcome = open_sink(&handle, bytes);
                match outcome {
                    Ok(sink) => {
                        let sink = std::sync::Arc::new(sink);
                        current = Some(std::sync::Arc::clone(&sink));
                        let _ = started.send(Ok(()));
                        // Completion watcher: `sleep_until_end` returns on
                        // natural drain and on stop() alike.
                        thread::spawn(move || {
                            sink.sleep_until_end();
                            let _ = drained.send(());
                        });
                    }
                    Err(e) => {
                        let _ = started.send(Err(e));
                    }
                }
            }

            AudioCommand::Stop => {
                if let Some(sink) = current.take() {
                    sink.stop();
                }
            }

            AudioCommand::Shutdown => break,
        }
    }

    debug!("audio thread shutting down");
}

fn open_sink(handle: &rodio::OutputStreamHandle, bytes: Vec<u8>) -> SpeechResult<Sink> {
    let sink = Sink::try_new(handle)
        .map_err(|e| SpeechError::Playback(format!("failed to open sink: {e}")))?;

    let prime = rodio::source::Zero::<f32>::new(1, 44_100).take_duration(PREBUFFER);
    sink.append(prime);

    let source = rodio::Decoder::new(Cursor::new(bytes))
        .map_err(|e| SpeechError::Playback(format!("failed to decode audio: {e}")))?;
    sink.append(source.convert_samples::<f32>());

    Ok(sink)
}
