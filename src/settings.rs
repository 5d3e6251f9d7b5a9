use crate::error::{RangeError, Result};
use crate::media::MediaRef;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

pub const SENSITIVITY_RANGE: (f32, f32) = (0.01, 1.0);
pub const FOV_RANGE: (u32, u32) = (60, 130);
pub const TARGET_SIZE_RANGE: (f32, f32) = (0.2, 3.0);
pub const CROSSHAIR_LENGTH_RANGE: (u32, u32) = (1, 40);
pub const CROSSHAIR_WIDTH_RANGE: (u32, u32) = (1, 10);
pub const CROSSHAIR_GAP_RANGE: (u32, u32) = (0, 20);

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CrosshairSettings {
    pub length: u32,
    pub width: u32,
    pub gap: u32,
    pub color: String,
    pub dot: bool,
}

impl Default for CrosshairSettings {
    fn default() -> Self {
        Self {
            length: 12,
            width: 2,
            gap: 4,
            color: "#4ade80".to_string(),
            dot: true,
        }
    }
}

impl CrosshairSettings {
    fn clamp(&mut self) {
        self.length = self
            .length
            .clamp(CROSSHAIR_LENGTH_RANGE.0, CROSSHAIR_LENGTH_RANGE.1);
        self.width = self
            .width
            .clamp(CROSSHAIR_WIDTH_RANGE.0, CROSSHAIR_WIDTH_RANGE.1);
        self.gap = self.gap.clamp(CROSSHAIR_GAP_RANGE.0, CROSSHAIR_GAP_RANGE.1);
        if !is_hex_color(&self.color) {
            self.color = CrosshairSettings::default().color;
        }
    }
}

#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    ValueEnum,
    strum_macros::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum MusicMode {
    #[default]
    None,
    File,
    Streamed,
}

#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    ValueEnum,
    strum_macros::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum EnvironmentPreset {
    #[default]
    Night,
    Sunset,
    Forest,
    City,
    Studio,
    Warehouse,
    Apartment,
    Lobby,
    Park,
    Dawn,
}

/// Where background music comes from once the settings are resolved.
#[derive(Debug, Clone, PartialEq)]
pub enum MusicSource {
    File(MediaRef),
    Stream { video_id: String },
}

/// User configuration for the range.
///
/// Media handles are process-local and never serialised; everything else
/// round-trips through the settings store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GameSettings {
    pub sensitivity: f32,
    pub fov: u32,
    pub target_size: f32,
    pub indefinite: bool,
    #[serde(skip)]
    pub hit_sound: Option<MediaRef>,
    pub crosshair: CrosshairSettings,
    pub music_mode: MusicMode,
    #[serde(skip)]
    pub music_file: Option<MediaRef>,
    pub stream_url: Option<String>,
    #[serde(skip)]
    pub menu_background: Option<MediaRef>,
    pub menu_translucent: bool,
    pub environment: EnvironmentPreset,
}

impl Default for GameSettings {
    fn default() -> Self {
        Self {
            sensitivity: 0.1096,
            fov: 103,
            target_size: 1.0,
            indefinite: false,
            hit_sound: None,
            crosshair: CrosshairSettings::default(),
            music_mode: MusicMode::None,
            music_file: None,
            stream_url: None,
            menu_background: None,
            menu_translucent: true,
            environment: EnvironmentPreset::Night,
        }
    }
}

impl GameSettings {
    /// Pull every numeric field back into its declared range.
    pub fn sanitize(&mut self) {
        self.set_sensitivity(self.sensitivity);
        self.set_fov(self.fov);
        self.set_target_size(self.target_size);
        self.crosshair.clamp();
    }

    /// Back to defaults, keeping the loaded media handles.
    pub fn reset(&mut self) {
        *self = GameSettings {
            hit_sound: self.hit_sound.take(),
            music_file: self.music_file.take(),
            menu_background: self.menu_background.take(),
            ..GameSettings::default()
        };
    }

    // general

    pub fn set_sensitivity(&mut self, value: f32) -> f32 {
        self.sensitivity = clamp_f32(value, SENSITIVITY_RANGE, 0.1096);
        self.sensitivity
    }

    pub fn set_fov(&mut self, degrees: u32) -> u32 {
        self.fov = degrees.clamp(FOV_RANGE.0, FOV_RANGE.1);
        self.fov
    }

    pub fn set_target_size(&mut self, multiplier: f32) -> f32 {
        self.target_size = clamp_f32(multiplier, TARGET_SIZE_RANGE, 1.0);
        self.target_size
    }

    pub fn set_indefinite(&mut self, indefinite: bool) {
        self.indefinite = indefinite;
    }

    // crosshair

    pub fn set_crosshair_length(&mut self, length: u32) -> u32 {
        self.crosshair.length = length.clamp(CROSSHAIR_LENGTH_RANGE.0, CROSSHAIR_LENGTH_RANGE.1);
        self.crosshair.length
    }

    pub fn set_crosshair_width(&mut self, width: u32) -> u32 {
        self.crosshair.width = width.clamp(CROSSHAIR_WIDTH_RANGE.0, CROSSHAIR_WIDTH_RANGE.1);
        self.crosshair.width
    }

    pub fn set_crosshair_gap(&mut self, gap: u32) -> u32 {
        self.crosshair.gap = gap.clamp(CROSSHAIR_GAP_RANGE.0, CROSSHAIR_GAP_RANGE.1);
        self.crosshair.gap
    }

    pub fn set_crosshair_color(&mut self, color: &str) -> Result<()> {
        if !is_hex_color(color) {
            return Err(RangeError::InvalidColor(color.to_string()));
        }
        self.crosshair.color = color.to_ascii_lowercase();
        Ok(())
    }

    pub fn set_crosshair_dot(&mut self, dot: bool) {
        self.crosshair.dot = dot;
    }

    // scenery

    pub fn set_environment(&mut self, preset: EnvironmentPreset) {
        self.environment = preset;
    }

    pub fn set_menu_background(&mut self, media: Option<MediaRef>) {
        self.menu_background = media;
    }

    pub fn set_menu_translucent(&mut self, translucent: bool) {
        self.menu_translucent = translucent;
    }

    // audio

    pub fn set_music_mode(&mut self, mode: MusicMode) {
        self.music_mode = mode;
    }

    pub fn set_stream_url(&mut self, url: Option<String>) {
        self.stream_url = url
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty());
    }

    pub fn set_hit_sound(&mut self, media: Option<MediaRef>) {
        self.hit_sound = media;
    }

    /// Installing a music file also switches the music mode to file playback.
    pub fn set_music_file(&mut self, media: Option<MediaRef>) {
        if media.is_some() {
            self.music_mode = MusicMode::File;
        }
        self.music_file = media;
    }

    pub fn music_source(&self) -> Option<MusicSource> {
        match self.music_mode {
            MusicMode::None => None,
            MusicMode::File => self.music_file.clone().map(MusicSource::File),
            MusicMode::Streamed => self
                .stream_url
                .as_deref()
                .and_then(stream_video_id)
                .map(|video_id| MusicSource::Stream { video_id }),
        }
    }
}

fn clamp_f32(value: f32, (lo, hi): (f32, f32), fallback: f32) -> f32 {
    if value.is_nan() {
        fallback
    } else {
        value.clamp(lo, hi)
    }
}

pub fn is_hex_color(color: &str) -> bool {
    color.len() == 7
        && color.starts_with('#')
        && color[1..].chars().all(|c| c.is_ascii_hexdigit())
}

/// Extract the 11-character video id from the usual share/watch/embed URL forms.
pub fn stream_video_id(url: &str) -> Option<String> {
    const MARKERS: [&str; 6] = ["youtu.be/", "?v=", "&v=", "/embed/", "/v/", "/e/"];

    MARKERS.iter().find_map(|marker| {
        let start = url.find(marker)? + marker.len();
        let id: String = url[start..]
            .chars()
            .take_while(|c| !matches!(c, '"' | '&' | '?' | '/') && !c.is_whitespace())
            .collect();
        (id.chars().count() >= 11).then(|| id.chars().take(11).collect())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::MediaSlot;

    #[test]
    fn defaults_match_the_shipped_profile() {
        let s = GameSettings::default();
        assert_eq!(s.sensitivity, 0.1096);
        assert_eq!(s.fov, 103);
        assert_eq!(s.target_size, 1.0);
        assert!(!s.indefinite);
        assert_eq!(s.crosshair.color, "#4ade80");
        assert_eq!(s.music_mode, MusicMode::None);
        assert!(s.menu_translucent);
        assert_eq!(s.environment, EnvironmentPreset::Night);
    }

    #[test]
    fn reset_keeps_loaded_media() {
        let mut s = GameSettings::default();
        s.set_fov(70);
        s.set_music_file(Some(MediaRef::new(MediaSlot::BackgroundMusic, vec![1])));
        s.reset();
        assert_eq!(s.fov, 103);
        assert_eq!(s.music_mode, MusicMode::None);
        assert!(s.music_file.is_some());
    }

    #[test]
    fn setters_clamp_to_declared_ranges() {
        let mut s = GameSettings::default();
        assert_eq!(s.set_sensitivity(5.0), 1.0);
        assert_eq!(s.set_sensitivity(0.0), 0.01);
        assert_eq!(s.set_sensitivity(f32::NAN), 0.1096);
        assert_eq!(s.set_fov(10), 60);
        assert_eq!(s.set_fov(200), 130);
        assert_eq!(s.set_target_size(0.05), 0.2);
        assert_eq!(s.set_crosshair_length(0), 1);
        assert_eq!(s.set_crosshair_width(99), 10);
        assert_eq!(s.set_crosshair_gap(25), 20);
    }

    #[test]
    fn invalid_color_is_rejected_and_unchanged() {
        let mut s = GameSettings::default();
        assert!(s.set_crosshair_color("red").is_err());
        assert_eq!(s.crosshair.color, "#4ade80");
        s.set_crosshair_color("#FF00AA").unwrap();
        assert_eq!(s.crosshair.color, "#ff00aa");
    }

    #[test]
    fn sanitize_repairs_out_of_range_values() {
        let mut s = GameSettings {
            fov: 500,
            target_size: 9.0,
            crosshair: CrosshairSettings {
                length: 0,
                width: 0,
                gap: 100,
                color: "nope".into(),
                dot: false,
            },
            ..GameSettings::default()
        };
        s.sanitize();
        assert_eq!(s.fov, 130);
        assert_eq!(s.target_size, 3.0);
        assert_eq!(s.crosshair.length, 1);
        assert_eq!(s.crosshair.width, 1);
        assert_eq!(s.crosshair.gap, 20);
        assert_eq!(s.crosshair.color, "#4ade80");
        assert!(!s.crosshair.dot);
    }

    #[test]
    fn transient_media_is_not_serialised() {
        let mut s = GameSettings::default();
        s.set_hit_sound(Some(MediaRef::new(MediaSlot::HitSound, vec![1, 2, 3])));
        let json = serde_json::to_string(&s).unwrap();
        assert!(!json.contains("hit_sound"));
        assert!(!json.contains("music_file"));
        assert!(!json.contains("menu_background"));
    }

    #[test]
    fn partial_json_merges_onto_defaults() {
        let s: GameSettings = serde_json::from_str(r#"{"fov": 90, "crosshair": {"gap": 7}}"#).unwrap();
        assert_eq!(s.fov, 90);
        assert_eq!(s.crosshair.gap, 7);
        assert_eq!(s.crosshair.length, 12);
        assert_eq!(s.sensitivity, 0.1096);
    }

    #[test]
    fn music_file_switches_mode() {
        let mut s = GameSettings::default();
        let track = MediaRef::new(MediaSlot::BackgroundMusic, vec![9; 4]);
        s.set_music_file(Some(track.clone()));
        assert_eq!(s.music_mode, MusicMode::File);
        assert_eq!(s.music_source(), Some(MusicSource::File(track)));
    }

    #[test]
    fn streamed_music_needs_a_video_id() {
        let mut s = GameSettings::default();
        s.set_music_mode(MusicMode::Streamed);
        assert_eq!(s.music_source(), None);

        s.set_stream_url(Some("https://example.com/watch".into()));
        assert_eq!(s.music_source(), None);

        s.set_stream_url(Some(" https://www.youtube.com/watch?v=dQw4w9WgXcQ&t=3 ".into()));
        assert_eq!(
            s.music_source(),
            Some(MusicSource::Stream {
                video_id: "dQw4w9WgXcQ".into()
            })
        );
    }

    #[test]
    fn video_id_forms() {
        assert_eq!(stream_video_id("https://youtu.be/abcdefghijk").as_deref(), Some("abcdefghijk"));
        assert_eq!(
            stream_video_id("https://www.youtube.com/embed/abcdefghijk?rel=0").as_deref(),
            Some("abcdefghijk")
        );
        assert_eq!(
            stream_video_id("https://www.youtube.com/watch?list=x&v=abcdefghijk").as_deref(),
            Some("abcdefghijk")
        );
        assert_eq!(stream_video_id("https://youtu.be/short"), None);
    }
}
