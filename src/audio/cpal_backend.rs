use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use parking_lot::Mutex;
use std::sync::mpsc::{self, RecvTimeoutError};
use tracing::{debug, error, info};

use super::service::{AudioError, AudioService, RingerMode, ToneCompletion};
use super::tone::Tone;

pub const MAX_RING_VOLUME: u32 = 7;
pub const MAX_MEDIA_VOLUME: u32 = 15;

#[derive(Debug)]
struct DeviceState {
    ringer: RingerMode,
    ring_volume: u32,
    media_volume: u32,
}

/// Desktop audio backend. A desktop has no ringer policy or vibrator, so
/// those are held in memory and logged; tones go out through the default
/// cpal output device.
pub struct CpalAudioService {
    state: Mutex<DeviceState>,
    active: Mutex<Option<mpsc::Sender<()>>>,
}

impl CpalAudioService {
    pub fn new(ringer: RingerMode, ring_volume: u32, media_volume: u32) -> Self {
        Self {
            state: Mutex::new(DeviceState {
                ringer,
                ring_volume: ring_volume.min(MAX_RING_VOLUME),
                media_volume: media_volume.min(MAX_MEDIA_VOLUME),
            }),
            active: Mutex::new(None),
        }
    }
}

impl Default for CpalAudioService {
    fn default() -> Self {
        Self::new(RingerMode::Normal, 5, 8)
    }
}

impl AudioService for CpalAudioService {
    fn ringer_mode(&self) -> RingerMode {
        self.state.lock().ringer
    }

    fn set_ringer_mode(&self, mode: RingerMode) {
        self.state.lock().ringer = mode;
    }

    fn ring_volume(&self) -> u32 {
        self.state.lock().ring_volume
    }

    fn max_ring_volume(&self) -> u32 {
        MAX_RING_VOLUME
    }

    fn media_volume(&self) -> u32 {
        self.state.lock().media_volume
    }

    fn max_media_volume(&self) -> u32 {
        MAX_MEDIA_VOLUME
    }

    fn set_media_volume(&self, volume: u32) {
        self.state.lock().media_volume = volume.min(MAX_MEDIA_VOLUME);
    }

    fn vibrate(&self, pattern_ms: &[u64]) {
        info!("[VIBRATE] pattern {:?}", pattern_ms);
    }

    fn cancel_vibration(&self) {
        debug!("[VIBRATE] cancelled");
    }

    fn play_tone(&self, tone: &Tone, on_complete: ToneCompletion) -> Result<(), AudioError> {
        self.stop_tone();

        let host = cpal::default_host();
        let device = host.default_output_device().ok_or(AudioError::NoOutputDevice)?;
        info!("Audio Output Device: {}", device.name().unwrap_or_default());

        let gain = self.media_volume() as f32 / MAX_MEDIA_VOLUME as f32;
        let tone = tone.clone();
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let (ready_tx, ready_rx) = mpsc::sync_channel::<Result<(), AudioError>>(1);

        // cpal streams are not Send on every platform, so the stream lives and
        // dies on its own thread for the length of the tone.
        std::thread::Builder::new()
            .name("alert-tone".to_string())
            .spawn(move || {
                let stream = match build_stream(&device, &tone, gain) {
                    Ok(stream) => {
                        let _ = ready_tx.send(Ok(()));
                        stream
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };

                let completed = matches!(stop_rx.recv_timeout(tone.duration()), Err(RecvTimeoutError::Timeout));
                drop(stream);
                if completed {
                    on_complete();
                }
            })
            .map_err(|e| AudioError::Backend(e.to_string()))?;

        ready_rx
            .recv()
            .map_err(|_| AudioError::Backend("tone thread exited before starting".to_string()))??;

        *self.active.lock() = Some(stop_tx);
        Ok(())
    }

    fn stop_tone(&self) {
        if let Some(stop_tx) = self.active.lock().take() {
            let _ = stop_tx.send(());
        }
    }
}

fn build_stream(device: &cpal::Device, tone: &Tone, gain: f32) -> Result<cpal::Stream, AudioError> {
    let backend = |e: &dyn std::fmt::Display| AudioError::Backend(e.to_string());

    let config = device.default_output_config().map_err(|e| backend(&e))?;
    let channels = config.channels() as usize;
    let step = tone.sample_rate as f64 / config.sample_rate().0 as f64;
    debug!("Output Config: Rate={}Hz, Channels={}", config.sample_rate().0, channels);

    let err_fn = |err| error!("an error occurred on output stream: {}", err);
    let samples = tone.samples.clone();
    let mut cursor = 0.0f64;

    let stream = match config.sample_format() {
        cpal::SampleFormat::F32 => device.build_output_stream(
            &config.into(),
            move |data: &mut [f32], _: &_| {
                write_frames(data, channels, &samples, &mut cursor, step, |s| s * gain)
            },
            err_fn,
            None,
        ),
        cpal::SampleFormat::I16 => device.build_output_stream(
            &config.into(),
            move |data: &mut [i16], _: &_| {
                write_frames(data, channels, &samples, &mut cursor, step, |s| (s * gain * i16::MAX as f32) as i16)
            },
            err_fn,
            None,
        ),
        other => return Err(AudioError::Backend(format!("Unsupported sample format {:?}", other))),
    }
    .map_err(|e| backend(&e))?;

    stream.play().map_err(|e| backend(&e))?;
    Ok(stream)
}

/// Nearest-neighbour resampling; silence once the tone runs out.
fn write_frames<T: Copy>(
    output: &mut [T],
    channels: usize,
    samples: &[f32],
    cursor: &mut f64,
    step: f64,
    convert: impl Fn(f32) -> T,
) {
    for frame in output.chunks_mut(channels.max(1)) {
        let sample = samples.get(*cursor as usize).copied().unwrap_or(0.0);
        *cursor += step;
        let value = convert(sample);
        for slot in frame.iter_mut() {
            *slot = value;
        }
    }
}
