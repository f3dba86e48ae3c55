//! Shape-matching challenge shown before anonymous comments are accepted.
//!
//! The visitor is asked to pick the named shape from a shuffled set. This keeps
//! casual spam out; it does not stop a determined bot.

use chrono::{DateTime, Duration, Utc};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const CHALLENGE_TTL_SECS: i64 = 5 * 60;
const OPTION_COUNT: usize = 4;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Shape {
    Circle,
    Square,
    Triangle,
    Star,
    Heart,
    Diamond,
    Hexagon,
}

impl Shape {
    pub const ALL: [Shape; 7] = [
        Self::Circle,
        Self::Square,
        Self::Triangle,
        Self::Star,
        Self::Heart,
        Self::Diamond,
        Self::Hexagon,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Circle => "circle",
            Self::Square => "square",
            Self::Triangle => "triangle",
            Self::Star => "star",
            Self::Heart => "heart",
            Self::Diamond => "diamond",
            Self::Hexagon => "hexagon",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        Self::ALL.into_iter().find(|shape| shape.as_str().eq_ignore_ascii_case(raw))
    }

    pub fn glyph(&self) -> &'static str {
        match self {
            Self::Circle => "\u{25CF}",
            Self::Square => "\u{25A0}",
            Self::Triangle => "\u{25B2}",
            Self::Star => "\u{2605}",
            Self::Heart => "\u{2665}",
            Self::Diamond => "\u{25C6}",
            Self::Hexagon => "\u{2B22}",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Challenge {
    pub id: String,
    pub target: Shape,
    pub options: Vec<Shape>,
    pub expires_at: DateTime<Utc>,
}

/// What the client sees: the prompt and the options, never the answer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ChallengePrompt {
    pub id: String,
    pub prompt: String,
    pub options: Vec<ChallengeOption>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ChallengeOption {
    pub shape: Shape,
    pub glyph: &'static str,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CaptchaError {
    #[error("captcha challenge expired")]
    Expired,
    #[error("captcha answer did not match")]
    WrongAnswer,
    #[error("captcha challenge not found or already used")]
    Unknown,
}

impl Challenge {
    pub fn generate<R: Rng + ?Sized>(rng: &mut R, now: DateTime<Utc>) -> Self {
        let mut pool = Shape::ALL.to_vec();
        pool.shuffle(rng);
        let mut options: Vec<Shape> = pool.into_iter().take(OPTION_COUNT).collect();
        let target = options[rng.gen_range(0..options.len())];
        options.shuffle(rng);

        Self {
            id: uuid::Uuid::new_v4().to_string(),
            target,
            options,
            expires_at: now + Duration::seconds(CHALLENGE_TTL_SECS),
        }
    }

    pub fn prompt(&self) -> ChallengePrompt {
        ChallengePrompt {
            id: self.id.clone(),
            prompt: format!("Select the {}", self.target.as_str()),
            options: self
                .options
                .iter()
                .map(|shape| ChallengeOption { shape: *shape, glyph: shape.glyph() })
                .collect(),
            expires_at: self.expires_at,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

pub fn verify(challenge: &Challenge, answer: &str, now: DateTime<Utc>) -> Result<(), CaptchaError> {
    if challenge.is_expired(now) {
        return Err(CaptchaError::Expired);
    }
    match Shape::parse(answer) {
        Some(shape) if shape == challenge.target => Ok(()),
        _ => Err(CaptchaError::WrongAnswer),
    }
}
