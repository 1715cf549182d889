use std::collections::HashMap;
use std::f32::consts::PI;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use super::service::AudioError;

/// Mono PCM tone, samples in [-1.0, 1.0].
#[derive(Debug, Clone)]
pub struct Tone {
    pub name: String,
    pub sample_rate: u32,
    pub samples: Arc<[f32]>,
}

impl Tone {
    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(self.samples.len() as u64 * 1000 / self.sample_rate as u64)
    }

    /// Beeps of `beep_ms` at `freq_hz` separated by `gap_ms` of silence.
    pub fn beeps(name: &str, freq_hz: f32, beep_ms: u32, gap_ms: u32, count: u32) -> Self {
        const RATE: u32 = 16_000;
        let beep_len = (RATE * beep_ms / 1000) as usize;
        let gap_len = (RATE * gap_ms / 1000) as usize;
        let mut samples = Vec::with_capacity((beep_len + gap_len) * count as usize);

        for _ in 0..count {
            for i in 0..beep_len {
                let t = i as f32 / RATE as f32;
                // short linear fade avoids clicks at the edges
                let edge = (i.min(beep_len - 1 - i) as f32 / 160.0).min(1.0);
                samples.push((2.0 * PI * freq_hz * t).sin() * 0.8 * edge);
            }
            samples.extend(std::iter::repeat(0.0).take(gap_len));
        }

        Self { name: name.to_string(), sample_rate: RATE, samples: samples.into() }
    }

    pub fn from_wav(path: impl AsRef<Path>) -> Result<Self, AudioError> {
        let path = path.as_ref();
        let decode_err = |source| AudioError::Decode { path: path.display().to_string(), source };

        let mut reader = hound::WavReader::open(path).map_err(decode_err)?;
        let spec = reader.spec();
        let channels = spec.channels.max(1) as usize;

        let interleaved: Vec<f32> = match spec.sample_format {
            hound::SampleFormat::Float => reader
                .samples::<f32>()
                .collect::<Result<_, _>>()
                .map_err(decode_err)?,
            hound::SampleFormat::Int => {
                let scale = (1i64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
                reader
                    .samples::<i32>()
                    .map(|s| s.map(|v| v as f32 / scale))
                    .collect::<Result<_, _>>()
                    .map_err(decode_err)?
            }
        };

        // Downmix to mono
        let samples: Vec<f32> = interleaved
            .chunks(channels)
            .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
            .collect();

        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "tone".to_string());

        if samples.is_empty() {
            return Err(AudioError::EmptyTone(name));
        }

        Ok(Self { name, sample_rate: spec.sample_rate, samples: samples.into() })
    }
}

/// Tone id -> tone. Ids 0..=3 are synthesized; WAV files may be registered
/// under any id, replacing a built-in.
#[derive(Debug, Clone)]
pub struct ToneLibrary {
    tones: HashMap<i64, Tone>,
}

impl ToneLibrary {
    pub fn builtin() -> Self {
        let mut tones = HashMap::new();
        tones.insert(0, Tone::beeps("siren-high", 1760.0, 400, 100, 6));
        tones.insert(1, Tone::beeps("chime", 880.0, 250, 250, 4));
        tones.insert(2, Tone::beeps("pulse", 1200.0, 150, 150, 10));
        tones.insert(3, Tone::beeps("long", 1000.0, 2000, 500, 1));
        Self { tones }
    }

    pub fn empty() -> Self {
        Self { tones: HashMap::new() }
    }

    pub fn insert(&mut self, id: i64, tone: Tone) {
        self.tones.insert(id, tone);
    }

    pub fn register_wav(&mut self, id: i64, path: impl AsRef<Path>) -> Result<(), AudioError> {
        let tone = Tone::from_wav(path)?;
        info!("Registered tone {} as '{}' ({:?})", id, tone.name, tone.duration());
        self.tones.insert(id, tone);
        Ok(())
    }

    pub fn resolve(&self, id: i64) -> Result<Tone, AudioError> {
        self.tones.get(&id).cloned().ok_or(AudioError::UnknownTone(id))
    }
}

impl Default for ToneLibrary {
    fn default() -> Self {
        Self::builtin()
    }
}
