//! Binary sample labels.

use serde::{Deserialize, Serialize};

/// Class of a training sample.
///
/// The cascade only distinguishes the object class (`Positive`) from
/// background (`Negative`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Label {
    Negative = 0,
    Positive = 1,
}

impl Label {
    /// Parse the `0.0` / `1.0` float labels used by annotation files.
    ///
    /// Any other value yields `None`.
    pub fn from_f32(value: f32) -> Option<Self> {
        if value == 1.0 {
            Some(Label::Positive)
        } else if value == 0.0 {
            Some(Label::Negative)
        } else {
            None
        }
    }

    #[inline]
    pub fn is_positive(self) -> bool {
        matches!(self, Label::Positive)
    }

    /// `+1.0` for positives, `-1.0` for negatives.
    #[inline]
    pub fn sign(self) -> f32 {
        match self {
            Label::Positive => 1.0,
            Label::Negative => -1.0,
        }
    }
}

impl From<bool> for Label {
    fn from(positive: bool) -> Self {
        if positive { Label::Positive } else { Label::Negative }
    }
}
