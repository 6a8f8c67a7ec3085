/// Sound engine: procedural effects and a background loop via rodio.
///
/// All sounds are generated as in-memory WAV buffers at init time.
/// Effects are fire-and-forget (non-blocking) via rodio's Sink; the music
/// loop keeps its own Sink so it can be stopped when play ends.
///
/// Compile without the "sound" feature to disable audio entirely
/// (the stub SoundEngine does nothing).

#[cfg(feature = "sound")]
mod inner {
    use std::io::Cursor;
    use std::sync::Arc;

    use rodio::{OutputStream, OutputStreamHandle, Sink};
    use tracing::debug;

    use crate::sim::flow::Cue;

    const SAMPLE_RATE: u32 = 22050;
    const TAU: f32 = 2.0 * std::f32::consts::PI;

    pub struct SoundEngine {
        _stream: OutputStream,
        handle: OutputStreamHandle,
        sfx_transition: Arc<Vec<u8>>,
        sfx_coin: Arc<Vec<u8>>,
        sfx_hit: Arc<Vec<u8>>,
        sfx_jump: Arc<Vec<u8>>,
        sfx_win: Arc<Vec<u8>>,
        sfx_lose: Arc<Vec<u8>>,
        music_loop: Arc<Vec<u8>>,
        music: Option<Sink>,
    }

    impl SoundEngine {
        pub fn new() -> Option<Self> {
            let (stream, handle) = match OutputStream::try_default() {
                Ok(pair) => pair,
                Err(e) => {
                    debug!(error = %e, "no audio output, running silent");
                    return None;
                }
            };

            Some(SoundEngine {
                _stream: stream,
                handle,
                sfx_transition: Arc::new(make_wav(&gen_blip(660.0, 0.05, 0.2))),
                sfx_coin: Arc::new(make_wav(&gen_coin())),
                sfx_hit: Arc::new(make_wav(&gen_hit())),
                sfx_jump: Arc::new(make_wav(&gen_jump())),
                sfx_win: Arc::new(make_wav(&gen_win())),
                sfx_lose: Arc::new(make_wav(&gen_lose())),
                music_loop: Arc::new(make_wav(&gen_music())),
                music: None,
            })
        }

        fn play_buf(&self, buf: &Arc<Vec<u8>>) {
            if let Ok(sink) = Sink::try_new(&self.handle) {
                let cursor = Cursor::new(buf.as_ref().clone());
                if let Ok(src) = rodio::Decoder::new(cursor) {
                    sink.append(src);
                    sink.detach(); // fire-and-forget
                }
            }
        }

        pub fn play(&self, cue: Cue) {
            let buf = match cue {
                Cue::Transition => &self.sfx_transition,
                Cue::Coin => &self.sfx_coin,
                Cue::Hit => &self.sfx_hit,
                Cue::Jump => &self.sfx_jump,
                Cue::Win => &self.sfx_win,
                Cue::Lose => &self.sfx_lose,
            };
            self.play_buf(buf);
        }

        /// Start or stop the background loop. Idempotent.
        pub fn set_music(&mut self, on: bool) {
            match (on, self.music.is_some()) {
                (true, false) => {
                    let Ok(sink) = Sink::try_new(&self.handle) else { return };
                    let cursor = Cursor::new(self.music_loop.as_ref().clone());
                    if let Ok(src) = rodio::Decoder::new_looped(cursor) {
                        sink.append(src);
                        self.music = Some(sink);
                    }
                }
                (false, true) => {
                    if let Some(sink) = self.music.take() {
                        sink.stop();
                    }
                }
                _ => {}
            }
        }
    }

    // ════════════════════════════════════════════════════════════
    //  Waveform generators: all produce Vec<f32> mono samples
    // ════════════════════════════════════════════════════════════

    fn gen_blip(freq: f32, duration: f32, volume: f32) -> Vec<f32> {
        let n = (SAMPLE_RATE as f32 * duration) as usize;
        (0..n)
            .map(|i| {
                let t = i as f32 / SAMPLE_RATE as f32;
                let env = 1.0 - (i as f32 / n as f32);
                (t * freq * TAU).sin() * env * volume
            })
            .collect()
    }

    /// Sequence of notes, each with a fading envelope.
    fn gen_notes(notes: &[(f32, f32)], volume: f32) -> Vec<f32> {
        let mut samples = Vec::new();
        for &(freq, dur) in notes {
            let n = (SAMPLE_RATE as f32 * dur) as usize;
            for i in 0..n {
                let t = i as f32 / SAMPLE_RATE as f32;
                let env = 1.0 - (i as f32 / n as f32).powf(0.5);
                let wave = (t * freq * TAU).sin() * 0.7 + (t * freq * 3.0 * TAU).sin() * 0.3;
                samples.push(wave * env * volume);
            }
        }
        samples
    }

    /// Coin: two bright notes, B5 → E6
    fn gen_coin() -> Vec<f32> {
        gen_notes(&[(988.0, 0.05), (1319.0, 0.12)], 0.25)
    }

    /// Jump: short rising sweep
    fn gen_jump() -> Vec<f32> {
        let n = (SAMPLE_RATE as f32 * 0.12) as usize;
        let mut phase = 0.0_f32;
        (0..n)
            .map(|i| {
                let t = i as f32 / n as f32;
                let freq = 300.0 + t * 500.0;
                phase += freq / SAMPLE_RATE as f32;
                (phase * TAU).sin() * (1.0 - t) * 0.2
            })
            .collect()
    }

    /// Hit: noise burst over a low tone
    fn gen_hit() -> Vec<f32> {
        let n = (SAMPLE_RATE as f32 * 0.18) as usize;
        let mut rng: u32 = 12345;
        (0..n)
            .map(|i| {
                let t = i as f32 / n as f32;
                let ti = i as f32 / SAMPLE_RATE as f32;
                let tone = (ti * 120.0 * TAU).sin();
                rng = rng.wrapping_mul(1103515245).wrapping_add(12345);
                let noise = (rng as f32 / u32::MAX as f32) * 2.0 - 1.0;
                (tone * 0.5 + noise * 0.5) * (1.0 - t).powf(0.8) * 0.3
            })
            .collect()
    }

    /// Win: ascending fanfare C5 → E5 → G5 → C6
    fn gen_win() -> Vec<f32> {
        gen_notes(&[(523.0, 0.1), (659.0, 0.1), (784.0, 0.1), (1047.0, 0.35)], 0.3)
    }

    /// Lose: descending A4 → F#4 → Eb4 → C4
    fn gen_lose() -> Vec<f32> {
        gen_notes(&[(440.0, 0.14), (370.0, 0.14), (311.0, 0.14), (261.0, 0.3)], 0.3)
    }

    /// Background loop: a quiet eight-note phrase.
    fn gen_music() -> Vec<f32> {
        let phrase = [392.0, 523.0, 659.0, 523.0, 440.0, 587.0, 698.0, 587.0];
        let notes: Vec<(f32, f32)> = phrase.iter().map(|&f| (f, 0.25)).collect();
        gen_notes(&notes, 0.08)
    }

    // ════════════════════════════════════════════════════════════
    //  WAV encoder: wraps f32 samples into a valid WAV buffer
    // ════════════════════════════════════════════════════════════

    fn make_wav(samples: &[f32]) -> Vec<u8> {
        let num_channels: u16 = 1;
        let bits_per_sample: u16 = 16;
        let byte_rate = SAMPLE_RATE * (num_channels as u32) * (bits_per_sample as u32) / 8;
        let block_align = num_channels * bits_per_sample / 8;
        let data_size = samples.len() as u32 * 2;
        let file_size = 36 + data_size;

        let mut buf = Vec::with_capacity(44 + data_size as usize);

        buf.extend_from_slice(b"RIFF");
        buf.extend_from_slice(&file_size.to_le_bytes());
        buf.extend_from_slice(b"WAVE");

        buf.extend_from_slice(b"fmt ");
        buf.extend_from_slice(&16u32.to_le_bytes()); // chunk size
        buf.extend_from_slice(&1u16.to_le_bytes()); // PCM
        buf.extend_from_slice(&num_channels.to_le_bytes());
        buf.extend_from_slice(&SAMPLE_RATE.to_le_bytes());
        buf.extend_from_slice(&byte_rate.to_le_bytes());
        buf.extend_from_slice(&block_align.to_le_bytes());
        buf.extend_from_slice(&bits_per_sample.to_le_bytes());

        buf.extend_from_slice(b"data");
        buf.extend_from_slice(&data_size.to_le_bytes());

        for &s in samples {
            let val = (s.clamp(-1.0, 1.0) * 32767.0) as i16;
            buf.extend_from_slice(&val.to_le_bytes());
        }

        buf
    }

}

// ════════════════════════════════════════════════════════════
//  Public API: compiles to no-ops when sound feature is off
// ════════════════════════════════════════════════════════════

#[cfg(feature = "sound")]
pub use inner::SoundEngine;

#[cfg(not(feature = "sound"))]
pub struct SoundEngine;

#[cfg(not(feature = "sound"))]
impl SoundEngine {
    pub fn new() -> Option<Self> { Some(SoundEngine) }
    pub fn play(&self, _cue: crate::sim::flow::Cue) {}
    pub fn set_music(&mut self, _on: bool) {}
}
