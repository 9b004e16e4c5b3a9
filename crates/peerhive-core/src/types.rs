//! Zone labels and prediction types

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Emotional zone predicted by the classifier.
///
/// The discriminant is the model's output class index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Zone {
    Calm = 0,
    Stressed = 1,
    Overwhelmed = 2,
}

impl Zone {
    /// All zones in class-index order
    pub const ALL: [Zone; 3] = [Zone::Calm, Zone::Stressed, Zone::Overwhelmed];

    /// Number of output classes the model must produce
    pub const COUNT: usize = Self::ALL.len();

    /// Map a model class index to its zone
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Class index of this zone
    pub fn index(self) -> usize {
        self as usize
    }

    /// Label used on the wire
    pub fn as_str(self) -> &'static str {
        match self {
            Zone::Calm => "Calm",
            Zone::Stressed => "Stressed",
            Zone::Overwhelmed => "Overwhelmed",
        }
    }
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Zone {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Zone::ALL
            .into_iter()
            .find(|zone| zone.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("Unknown zone: {}", s))
    }
}

/// Probability of each zone.
///
/// Always serialized with exactly the three zone labels as keys.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ZoneProbabilities {
    #[serde(rename = "Calm")]
    pub calm: f32,

    #[serde(rename = "Stressed")]
    pub stressed: f32,

    #[serde(rename = "Overwhelmed")]
    pub overwhelmed: f32,
}

impl ZoneProbabilities {
    /// Probability assigned to `zone`
    pub fn get(&self, zone: Zone) -> f32 {
        match zone {
            Zone::Calm => self.calm,
            Zone::Stressed => self.stressed,
            Zone::Overwhelmed => self.overwhelmed,
        }
    }

    /// Iterate `(zone, probability)` pairs in class-index order
    pub fn iter(&self) -> impl Iterator<Item = (Zone, f32)> + '_ {
        Zone::ALL.into_iter().map(move |zone| (zone, self.get(zone)))
    }

    /// Sum of all three probabilities
    pub fn sum(&self) -> f32 {
        self.calm + self.stressed + self.overwhelmed
    }
}

/// Result of classifying one piece of text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// Zone with the highest probability
    pub predicted_zone: Zone,

    /// Full distribution over zones
    pub probabilities: ZoneProbabilities,
}

impl Prediction {
    /// Build a prediction from a softmax distribution in class-index order.
    ///
    /// The first index wins on exact ties.
    pub fn from_probabilities(probs: &[f32]) -> Result<Self> {
        if probs.len() != Zone::COUNT {
            return Err(Error::classifier(format!(
                "Expected {} class probabilities, got {}",
                Zone::COUNT,
                probs.len()
            )));
        }

        if let Some(bad) = probs.iter().find(|p| !p.is_finite()) {
            return Err(Error::classifier(format!(
                "Non-finite class probability: {}",
                bad
            )));
        }

        let mut best = 0;
        for (idx, prob) in probs.iter().enumerate().skip(1) {
            if *prob > probs[best] {
                best = idx;
            }
        }

        let predicted_zone = Zone::from_index(best)
            .ok_or_else(|| Error::internal(format!("No zone for class index {}", best)))?;

        Ok(Self {
            predicted_zone,
            probabilities: ZoneProbabilities {
                calm: probs[0],
                stressed: probs[1],
                overwhelmed: probs[2],
            },
        })
    }
}
