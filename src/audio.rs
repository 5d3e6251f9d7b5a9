use crate::media::MediaRef;
use crate::settings::MusicSource;

/// Volume removed per fade step; twenty steps take full volume to silence.
pub const FADE_STEP: f32 = 0.05;
pub const FADE_INTERVAL_MS: u64 = 50;

/// Background music output, local file or streamed player alike.
///
/// Volume is normalised to `0.0..=1.0`; a streamed player maps it onto its own scale.
pub trait MusicOutput {
    fn volume(&self) -> f32;
    fn set_volume(&mut self, volume: f32);
    fn play(&mut self);
    fn pause(&mut self);
}

/// A short one-shot sound such as the hit confirmation.
pub trait SoundEffect {
    /// Rewind to the start and play.
    fn restart(&mut self);
}

/// Opens playable handles for the engine.
pub trait AudioBackend {
    fn open_music(&self, source: &MusicSource) -> Option<Box<dyn MusicOutput>>;
    fn open_effect(&self, media: &MediaRef) -> Option<Box<dyn SoundEffect>>;
}

/// Backend for headless runs: nothing is ever audible.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullAudio;

impl AudioBackend for NullAudio {
    fn open_music(&self, _source: &MusicSource) -> Option<Box<dyn MusicOutput>> {
        None
    }

    fn open_effect(&self, _media: &MediaRef) -> Option<Box<dyn SoundEffect>> {
        None
    }
}

/// One fade step down from `volume`, snapping float residue to silence.
pub fn faded(volume: f32) -> f32 {
    let next = (volume - FADE_STEP).max(0.0);
    if next < FADE_STEP / 10.0 {
        0.0
    } else {
        next
    }
}
