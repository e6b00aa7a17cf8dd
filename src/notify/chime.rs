//! Audible reminder cue.
//!
//! rodio output streams are not `Send`, so playback lives on a dedicated
//! thread that owns the stream and receives commands over a channel.

use std::sync::{
    mpsc::{self, Receiver, Sender},
    Mutex,
};
use std::thread;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use log::{debug, warn};
use rodio::{source::SineWave, OutputStream, Sink, Source};

use super::AudioCue;

/// (frequency Hz, length ms) for each note of the chime.
const CHIME_TONES: [(f32, u64); 3] = [(880.0, 180), (660.0, 180), (880.0, 320)];
const TONE_GAIN: f32 = 0.4;

enum ChimeCommand {
    Play,
    Stop,
}

/// Output device opened on first use. Dropping it releases the device.
struct ChimeOutput {
    _stream: OutputStream,
    sink: Sink,
}

impl ChimeOutput {
    fn open(volume: f32) -> Result<Self> {
        let (stream, handle) =
            OutputStream::try_default().context("no audio output device available")?;
        let sink = Sink::try_new(&handle).context("failed to create audio sink")?;
        sink.set_volume(volume);
        Ok(Self {
            _stream: stream,
            sink,
        })
    }

    fn play(&self) {
        for (frequency, millis) in CHIME_TONES {
            self.sink.append(
                SineWave::new(frequency)
                    .take_duration(Duration::from_millis(millis))
                    .amplify(TONE_GAIN),
            );
        }
    }
}

fn chime_thread(commands: Receiver<ChimeCommand>, volume: f32) {
    let mut output: Option<ChimeOutput> = None;

    while let Ok(command) = commands.recv() {
        match command {
            ChimeCommand::Play => {
                if output.is_none() {
                    match ChimeOutput::open(volume) {
                        Ok(opened) => output = Some(opened),
                        Err(err) => {
                            warn!("chime skipped: {err:#}");
                            continue;
                        }
                    }
                }
                if let Some(output) = &output {
                    output.play();
                }
            }
            ChimeCommand::Stop => {
                if let Some(output) = output.take() {
                    output.sink.stop();
                }
                break;
            }
        }
    }
    debug!("chime thread exiting");
}

/// Plays a short chime with every reminder. The audio thread is started on
/// the first `play`, so a machine without sound only pays for it then.
pub struct ChimeHandle {
    tx: Mutex<Option<Sender<ChimeCommand>>>,
    volume: f32,
}

impl ChimeHandle {
    pub fn new(volume: f32) -> Self {
        Self {
            tx: Mutex::new(None),
            volume: volume.clamp(0.0, 1.0),
        }
    }

    fn sender(&self) -> Result<Sender<ChimeCommand>> {
        let mut guard = self
            .tx
            .lock()
            .map_err(|_| anyhow!("chime channel lock poisoned"))?;
        if let Some(tx) = guard.as_ref() {
            return Ok(tx.clone());
        }

        let (tx, rx) = mpsc::channel();
        let volume = self.volume;
        thread::Builder::new()
            .name("chime".into())
            .spawn(move || chime_thread(rx, volume))
            .context("failed to spawn chime thread")?;

        *guard = Some(tx.clone());
        Ok(tx)
    }

    pub fn stop(&self) {
        let sender = match self.tx.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(tx) = sender {
            let _ = tx.send(ChimeCommand::Stop);
        }
    }
}

impl AudioCue for ChimeHandle {
    fn play(&self) -> Result<()> {
        let tx = self.sender()?;
        if tx.send(ChimeCommand::Play).is_ok() {
            return Ok(());
        }

        // Thread exited; forget the sender so the next call respawns it.
        if let Ok(mut guard) = self.tx.lock() {
            guard.take();
        }
        Err(anyhow!("chime thread exited"))
    }
}

impl Drop for ChimeHandle {
    fn drop(&mut self) {
        self.stop();
    }
}
