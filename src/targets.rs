use crate::session::GameStatus;
use glam::Vec3;
use rand::distributions::Alphanumeric;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;

/// Targets put up when play begins on an empty field.
pub const INITIAL_BATCH: usize = 4;
/// Lateral spread of the spawn band, centred on the viewer.
pub const FIELD_WIDTH: f32 = 14.0;
pub const MIN_HEIGHT: f32 = 1.0;
pub const HEIGHT_BAND: f32 = 4.0;
/// Closest a target may spawn in front of the viewer.
pub const MIN_DEPTH: f32 = 8.0;
pub const DEPTH_BAND: f32 = 8.0;
/// Radius of a target at size multiplier 1.0.
pub const BASE_SIZE: f32 = 0.4;
const ID_LEN: usize = 9;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TargetDescriptor {
    pub id: String,
    pub position: Vec3,
    pub size: f32,
}

/// The live targets of the range and the policy that spawns them.
#[derive(Debug)]
pub struct TargetField {
    targets: Vec<TargetDescriptor>,
    rng: StdRng,
}

impl Default for TargetField {
    fn default() -> Self {
        Self::new()
    }
}

impl TargetField {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    pub fn seeded(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        Self {
            targets: Vec::new(),
            rng,
        }
    }

    pub fn targets(&self) -> &[TargetDescriptor] {
        &self.targets
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.targets.iter().any(|t| t.id == id)
    }

    /// React to the engine entering `status`.
    pub fn on_status(&mut self, status: GameStatus, size_multiplier: f32) {
        match status {
            GameStatus::Playing if self.targets.is_empty() => {
                for _ in 0..INITIAL_BATCH {
                    self.spawn(size_multiplier);
                }
                log::debug!("spawned initial batch of {}", INITIAL_BATCH);
            }
            GameStatus::Idle | GameStatus::Countdown => self.clear(),
            _ => {}
        }
    }

    pub fn spawn(&mut self, size_multiplier: f32) -> &TargetDescriptor {
        let target = spawn_target(&mut self.rng, size_multiplier);
        self.targets.push(target);
        &self.targets[self.targets.len() - 1]
    }

    /// Take a target off the field. False if it was not live.
    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.targets.len();
        self.targets.retain(|t| t.id != id);
        self.targets.len() != before
    }

    pub fn clear(&mut self) {
        self.targets.clear();
    }
}

/// Draw one target from the spawn band in front of the viewer.
pub fn spawn_target<R: Rng>(rng: &mut R, size_multiplier: f32) -> TargetDescriptor {
    let x = (rng.gen::<f32>() - 0.5) * FIELD_WIDTH;
    let y = MIN_HEIGHT + rng.gen::<f32>() * HEIGHT_BAND;
    let z = -MIN_DEPTH - rng.gen::<f32>() * DEPTH_BAND;

    TargetDescriptor {
        id: random_id(rng),
        position: Vec3::new(x, y, z),
        size: size_multiplier * BASE_SIZE,
    }
}

fn random_id<R: Rng>(rng: &mut R) -> String {
    rng.sample_iter(&Alphanumeric)
        .take(ID_LEN)
        .map(|b| char::from(b).to_ascii_lowercase())
        .collect()
}
