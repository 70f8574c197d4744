//! Deterministic robot colours.
//!
//! A robot's primary colour is derived from hashes of its identity so the
//! same robot is drawn the same colour in every session: the model picks
//! the hue (robots of one model share a colour family), the robot name
//! picks the saturation, and the fleet picks the lightness.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// CSS colour string, e.g. `hsl(212, 63%, 48%)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Color(pub String);

impl Color {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Color {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Computes robot colours. Stateless; memoization is the cache's job.
#[derive(Debug, Clone, Copy, Default)]
pub struct ColorManager;

impl ColorManager {
    pub fn new() -> Self {
        Self
    }

    pub fn robot_primary_color(&self, fleet: &str, robot: &str, model: &str) -> Color {
        let hue = hash32(model) % 360;
        let saturation = 50 + hash32(robot) % 50;
        let lightness = 25 + hash32(fleet) % 50;
        Color(format!("hsl({hue}, {saturation}%, {lightness}%)"))
    }
}

fn hash32(s: &str) -> u32 {
    let digest = Sha256::digest(s.as_bytes());
    u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]])
}
