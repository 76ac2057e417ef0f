use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of emotion classes the head predicts.
pub const NUM_EMOTIONS: usize = 7;

/// Emotion class labels, indexed by the integer label stored with each sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Emotion {
    Angry,
    Disgust,
    Fear,
    Happy,
    Neutral,
    Sad,
    Surprise,
}

impl Emotion {
    pub const ALL: [Emotion; NUM_EMOTIONS] = [
        Emotion::Angry,
        Emotion::Disgust,
        Emotion::Fear,
        Emotion::Happy,
        Emotion::Neutral,
        Emotion::Sad,
        Emotion::Surprise,
    ];

    pub fn from_label(label: usize) -> Option<Self> {
        Self::ALL.get(label).copied()
    }

    pub fn label(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Emotion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Emotion::Angry    => "angry",
            Emotion::Disgust  => "disgust",
            Emotion::Fear     => "fear",
            Emotion::Happy    => "happy",
            Emotion::Neutral  => "neutral",
            Emotion::Sad      => "sad",
            Emotion::Surprise => "surprise",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_round_trip() {
        for e in Emotion::ALL {
            assert_eq!(Emotion::from_label(e.label()), Some(e));
        }
        assert_eq!(Emotion::from_label(NUM_EMOTIONS), None);
    }
}
