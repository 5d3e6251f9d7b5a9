use crate::audio::{AudioBackend, NullAudio};
use crate::coach::{Coach, NoCoach};
use crate::config::{load_or_default, MemorySettingsStore, SettingsStore};
use crate::engine::{SessionEngine, SessionEvent};
use crate::error::Result;
use crate::media::{restore_slot, BlobStore, MediaRef, MediaSlot, MemoryBlobStore};
use crate::session::{GameStatus, SessionConfig};
use crate::settings::GameSettings;
use crate::targets::{TargetDescriptor, TargetField};
use clap::ValueEnum;
use std::sync::Arc;
use std::time::Duration;

/// Assembles a [`Range`] from its collaborators.
pub struct RangeBuilder {
    settings_store: Box<dyn SettingsStore>,
    blobs: Box<dyn BlobStore>,
    audio: Box<dyn AudioBackend>,
    coach: Arc<dyn Coach>,
    session: SessionConfig,
    seed: Option<u64>,
}

impl Default for RangeBuilder {
    fn default() -> Self {
        Self {
            settings_store: Box::new(MemorySettingsStore::new()),
            blobs: Box::new(MemoryBlobStore::new()),
            audio: Box::new(NullAudio),
            coach: Arc::new(NoCoach),
            session: SessionConfig::default(),
            seed: None,
        }
    }
}

impl RangeBuilder {
    pub fn settings_store(mut self, store: impl SettingsStore + 'static) -> Self {
        self.settings_store = Box::new(store);
        self
    }

    pub fn blob_store(mut self, store: impl BlobStore + 'static) -> Self {
        self.blobs = Box::new(store);
        self
    }

    pub fn audio(mut self, audio: impl AudioBackend + 'static) -> Self {
        self.audio = Box::new(audio);
        self
    }

    pub fn coach(mut self, coach: Arc<dyn Coach>) -> Self {
        self.coach = coach;
        self
    }

    pub fn duration_ms(mut self, duration_ms: u64) -> Self {
        self.session.duration_ms = duration_ms;
        self
    }

    /// Fix the spawn sequence, for reproducible runs.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Load stored settings and media, then open audio handles.
    pub fn build(self) -> Range {
        let mut settings = load_or_default(self.settings_store.as_ref());
        let mut target_skin = None;

        for &slot in MediaSlot::value_variants() {
            let Some(media) = restore_slot(self.blobs.as_ref(), slot) else {
                continue;
            };
            match slot {
                MediaSlot::TargetSkin => target_skin = Some(media),
                MediaSlot::HitSound => settings.hit_sound = Some(media),
                MediaSlot::BackgroundMusic => settings.music_file = Some(media),
                MediaSlot::MenuBackground => settings.menu_background = Some(media),
            }
        }

        let mut session = self.session;
        session.indefinite = settings.indefinite;
        let field = match self.seed {
            Some(seed) => TargetField::seeded(seed),
            None => TargetField::new(),
        };

        let mut range = Range {
            engine: SessionEngine::new(session, self.coach),
            field,
            settings,
            settings_store: self.settings_store,
            blobs: self.blobs,
            audio: self.audio,
            target_skin,
            pointer_locked: false,
            events: Vec::new(),
        };
        range.refresh_music();
        range.refresh_hit_sound();
        range
    }
}

/// The practice range as seen by a presentation layer.
///
/// Input is routed in through the methods here; what changed comes back out
/// through [`Range::drain_events`].
pub struct Range {
    engine: SessionEngine,
    field: TargetField,
    settings: GameSettings,
    settings_store: Box<dyn SettingsStore>,
    blobs: Box<dyn BlobStore>,
    audio: Box<dyn AudioBackend>,
    target_skin: Option<MediaRef>,
    pointer_locked: bool,
    events: Vec<SessionEvent>,
}

impl Range {
    pub fn builder() -> RangeBuilder {
        RangeBuilder::default()
    }

    pub fn engine(&self) -> &SessionEngine {
        &self.engine
    }

    pub fn status(&self) -> GameStatus {
        self.engine.status()
    }

    pub fn settings(&self) -> &GameSettings {
        &self.settings
    }

    pub fn targets(&self) -> &[TargetDescriptor] {
        self.field.targets()
    }

    pub fn target_skin(&self) -> Option<&MediaRef> {
        self.target_skin.as_ref()
    }

    pub fn pointer_locked(&self) -> bool {
        self.pointer_locked
    }

    pub fn drain_events(&mut self) -> Vec<SessionEvent> {
        std::mem::take(&mut self.events)
    }

    // session commands

    pub fn start(&mut self) {
        self.engine.start();
        self.sync();
    }

    pub fn pause(&mut self) {
        self.engine.pause();
        self.sync();
    }

    pub fn resume(&mut self) {
        self.engine.resume();
        self.sync();
    }

    pub fn quit(&mut self) {
        self.engine.quit();
        self.sync();
    }

    pub fn finish(&mut self) {
        self.engine.finish();
        self.sync();
    }

    pub fn advance(&mut self, dt_ms: u64) {
        self.engine.advance(dt_ms);
        self.sync();
    }

    pub fn wait_for_feedback(&mut self, timeout: Duration) -> bool {
        let ready = self.engine.wait_for_feedback(timeout);
        self.sync();
        ready
    }

    // input

    /// Losing pointer lock pauses play; gaining it arms the countdown.
    pub fn on_pointer_lock(&mut self, locked: bool) {
        self.pointer_locked = locked;
        if locked {
            self.engine.pointer_engaged();
        } else {
            self.engine.pause();
        }
        self.sync();
    }

    /// A click landed on target `id`. Returns true if it counted as a hit.
    pub fn click_target(&mut self, id: &str) -> bool {
        if !self.accepts_clicks() || !self.field.remove(id) {
            return false;
        }
        self.engine.register_hit();
        self.field.spawn(self.settings.target_size);
        self.sync();
        true
    }

    /// A click landed on the floor or sky.
    pub fn click_background(&mut self) {
        if !self.accepts_clicks() {
            return;
        }
        self.engine.register_miss();
        self.sync();
    }

    fn accepts_clicks(&self) -> bool {
        self.engine.status() == GameStatus::Playing && self.pointer_locked
    }

    // settings and media

    /// Change settings through `f`, then validate, save and apply them.
    pub fn update_settings<R>(&mut self, f: impl FnOnce(&mut GameSettings) -> R) -> R {
        let music_before = self.settings.music_source();
        let sound_before = self.settings.hit_sound.clone();
        let out = f(&mut self.settings);
        self.settings.sanitize();

        if let Err(e) = self.settings_store.save(&self.settings) {
            log::warn!("could not save settings: {}", e);
        }
        self.engine.set_indefinite(self.settings.indefinite);
        if self.settings.music_source() != music_before {
            self.refresh_music();
        }
        if self.settings.hit_sound != sound_before {
            self.refresh_hit_sound();
        }
        out
    }

    /// Store uploaded media and install it in its slot.
    ///
    /// The handle is installed even if the store rejects the write; the
    /// error is returned so callers that need persistence can fail on it.
    pub fn import_media(&mut self, slot: MediaSlot, data: Vec<u8>) -> Result<()> {
        let saved = self.blobs.save_blob(slot.key(), &data);
        if let Err(e) = &saved {
            log::warn!("could not store {}: {}", slot, e);
        }
        let media = MediaRef::new(slot, data);
        match slot {
            MediaSlot::TargetSkin => self.target_skin = Some(media),
            MediaSlot::HitSound => self.update_settings(|s| s.set_hit_sound(Some(media))),
            MediaSlot::BackgroundMusic => self.update_settings(|s| s.set_music_file(Some(media))),
            MediaSlot::MenuBackground => {
                self.update_settings(|s| s.set_menu_background(Some(media)))
            }
        }
        saved
    }

    fn refresh_music(&mut self) {
        let music = self
            .settings
            .music_source()
            .and_then(|source| self.audio.open_music(&source));
        self.engine.set_music(music);
    }

    fn refresh_hit_sound(&mut self) {
        let sound = self
            .settings
            .hit_sound
            .as_ref()
            .and_then(|media| self.audio.open_effect(media));
        self.engine.set_hit_sound(sound);
    }

    /// Forward engine events to the target field, then queue them for the caller.
    fn sync(&mut self) {
        for event in self.engine.drain_events() {
            if let SessionEvent::StatusChanged { to, .. } = event {
                self.field.on_status(to, self.settings.target_size);
            }
            self.events.push(event);
        }
    }
}
