//! Static hand gesture classification.
//!
//! Gestures are derived from the fingertip landmarks of a single [`Hand`], independently for every
//! frame. There is no temporal filtering.
//!
//! Each finger is considered *extended* according to a fixed per-finger rule:
//!
//! | Finger | Extended if                              |
//! |--------|------------------------------------------|
//! | thumb  | `thumb_tip.y < index_tip.y`              |
//! | index  | `index_tip.z < middle_tip.z`             |
//! | middle | `middle_tip.z < ring_tip.z`              |
//! | ring   | `ring_tip.z < pinky_tip.z`               |
//! | pinky  | `pinky_tip.z <` [`PINKY_EXTENDED_MAX_Z`] |
//!
//! The thumb is compared on the image Y axis while all other fingers use depth. These rules are
//! uncalibrated constants; changing them changes which poses are recognized.

use std::fmt;

use crate::landmark::{Hand, LandmarkIdx};

/// Depth below which the pinky tip counts as extended.
pub const PINKY_EXTENDED_MAX_Z: f32 = 0.7;

/// A recognized static hand gesture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Gesture {
    ThumbsUp,
    Peace,
    Rock,
    FingersSplayed,
    #[default]
    None,
}

impl Gesture {
    /// All gestures, in classification priority order, followed by [`Gesture::None`].
    pub const ALL: [Gesture; 5] = [
        Gesture::ThumbsUp,
        Gesture::Peace,
        Gesture::Rock,
        Gesture::FingersSplayed,
        Gesture::None,
    ];

    /// Returns the gesture's identifier (`thumbs_up`, `peace`, `rock`, `fingers_splayed` or
    /// `none`).
    pub fn name(&self) -> &'static str {
        match self {
            Gesture::ThumbsUp => "thumbs_up",
            Gesture::Peace => "peace",
            Gesture::Rock => "rock",
            Gesture::FingersSplayed => "fingers_splayed",
            Gesture::None => "none",
        }
    }

    /// Returns the text to show for this gesture on screen.
    ///
    /// This is the same as [`Gesture::name`], except for [`Gesture::None`], which has an empty
    /// caption.
    pub fn caption(&self) -> &'static str {
        match self {
            Gesture::None => "",
            other => other.name(),
        }
    }

    #[inline]
    pub fn is_none(&self) -> bool {
        *self == Gesture::None
    }
}

impl fmt::Display for Gesture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Per-finger extension state of a hand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Fingers {
    pub thumb: bool,
    pub index: bool,
    pub middle: bool,
    pub ring: bool,
    pub pinky: bool,
}

impl Fingers {
    /// Evaluates the finger extension rules on `hand`.
    ///
    /// All comparisons are strict, so equal coordinates (and NaNs) count as *not* extended.
    pub fn of(hand: &Hand) -> Self {
        let thumb = hand.landmark(LandmarkIdx::ThumbTip);
        let index = hand.landmark(LandmarkIdx::IndexFingerTip);
        let middle = hand.landmark(LandmarkIdx::MiddleFingerTip);
        let ring = hand.landmark(LandmarkIdx::RingFingerTip);
        let pinky = hand.landmark(LandmarkIdx::PinkyTip);

        Self {
            thumb: thumb.y() < index.y(),
            index: index.z() < middle.z(),
            middle: middle.z() < ring.z(),
            ring: ring.z() < pinky.z(),
            pinky: pinky.z() < PINKY_EXTENDED_MAX_Z,
        }
    }

    /// Maps the extension pattern to a gesture. Patterns without a gesture map to
    /// [`Gesture::None`].
    pub fn gesture(&self) -> Gesture {
        match (self.thumb, self.index, self.middle, self.ring, self.pinky) {
            (true, true, false, false, false) => Gesture::ThumbsUp,
            (false, true, true, false, false) => Gesture::Peace,
            (false, false, true, true, false) => Gesture::Rock,
            (true, true, true, true, true) => Gesture::FingersSplayed,
            _ => Gesture::None,
        }
    }
}

/// Classifies the gesture shown by a single hand.
pub fn classify(hand: &Hand) -> Gesture {
    Fingers::of(hand).gesture()
}

/// Classifies the gesture of the first hand in `hands`.
///
/// Returns [`Gesture::None`] if `hands` is empty.
pub fn classify_hands(hands: &[Hand]) -> Gesture {
    match hands.first() {
        Some(hand) => classify(hand),
        None => Gesture::None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::landmark::Landmark;

    /// Builds a hand whose fingertips have the given `(y, z)` coordinates; every other landmark is
    /// at the origin.
    fn hand(tips: [(f32, f32); 5]) -> Hand {
        let mut landmarks = [Landmark::default(); Hand::NUM_LANDMARKS];
        let indices = [
            LandmarkIdx::ThumbTip,
            LandmarkIdx::IndexFingerTip,
            LandmarkIdx::MiddleFingerTip,
            LandmarkIdx::RingFingerTip,
            LandmarkIdx::PinkyTip,
        ];
        for (idx, (y, z)) in indices.into_iter().zip(tips) {
            landmarks[idx as usize] = Landmark::new([0.0, y, z]);
        }
        Hand::new(landmarks)
    }

    #[test]
    fn finger_rules() {
        let fingers = Fingers::of(&hand([(0.0, 0.0), (1.0, 0.0), (0.0, 1.0), (0.0, 2.0), (0.0, 3.0)]));
        assert_eq!(
            fingers,
            Fingers {
                thumb: true,
                index: true,
                middle: true,
                ring: true,
                pinky: false,
            }
        );
    }

    #[test]
    fn equal_coordinates_are_not_extended() {
        let fingers = Fingers::of(&hand([(5.0, 0.7); 5]));
        assert_eq!(fingers, Fingers::default());
        assert_eq!(fingers.gesture(), Gesture::None);
    }

    #[test]
    fn pattern_table() {
        let f = |thumb, index, middle, ring, pinky| {
            Fingers {
                thumb,
                index,
                middle,
                ring,
                pinky,
            }
            .gesture()
        };

        assert_eq!(f(true, true, false, false, false), Gesture::ThumbsUp);
        assert_eq!(f(false, true, true, false, false), Gesture::Peace);
        assert_eq!(f(false, false, true, true, false), Gesture::Rock);
        assert_eq!(f(true, true, true, true, true), Gesture::FingersSplayed);

        let mut recognized = 0;
        for bits in 0..32u32 {
            let b = |i: u32| bits & (1 << i) != 0;
            if f(b(0), b(1), b(2), b(3), b(4)) != Gesture::None {
                recognized += 1;
            }
        }
        assert_eq!(recognized, 4);
    }

    #[test]
    fn thumbs_up() {
        // thumb above index tip, index in front of middle, rest flexed, pinky deep
        let hand = hand([(10.0, 0.0), (20.0, 0.0), (0.0, 1.0), (0.0, 1.0), (0.0, 1.0)]);
        assert_eq!(classify(&hand), Gesture::ThumbsUp);
    }

    #[test]
    fn peace() {
        let hand = hand([(20.0, 0.0), (20.0, 0.0), (0.0, 0.5), (0.0, 0.9), (0.0, 0.8)]);
        assert_eq!(classify(&hand), Gesture::Peace);
    }

    #[test]
    fn rock() {
        let hand = hand([(20.0, 0.0), (10.0, 0.9), (0.0, 0.8), (0.0, 0.85), (0.0, 0.9)]);
        assert_eq!(classify(&hand), Gesture::Rock);
    }

    #[test]
    fn fingers_splayed() {
        let hand = hand([(0.0, 0.0), (10.0, -0.4), (0.0, -0.3), (0.0, -0.2), (0.0, -0.1)]);
        assert_eq!(classify(&hand), Gesture::FingersSplayed);
    }

    #[test]
    fn nan_is_none() {
        let hand = hand([(f32::NAN, f32::NAN); 5]);
        assert_eq!(classify(&hand), Gesture::None);
    }

    #[test]
    fn no_hands() {
        assert_eq!(classify_hands(&[]), Gesture::None);
    }

    #[test]
    fn first_hand_wins() {
        let splayed = hand([(0.0, 0.0), (10.0, -0.4), (0.0, -0.3), (0.0, -0.2), (0.0, -0.1)]);
        let peace = hand([(20.0, 0.0), (20.0, 0.0), (0.0, 0.5), (0.0, 0.9), (0.0, 0.8)]);
        assert_eq!(
            classify_hands(&[splayed.clone(), peace.clone()]),
            Gesture::FingersSplayed
        );
        assert_eq!(classify_hands(&[peace, splayed]), Gesture::Peace);
    }

    #[test]
    fn names() {
        let names = Gesture::ALL.map(|g| g.to_string());
        assert_eq!(
            names,
            ["thumbs_up", "peace", "rock", "fingers_splayed", "none"]
        );
        assert_eq!(Gesture::None.caption(), "");
        assert_eq!(Gesture::Rock.caption(), "rock");
        assert_eq!(Gesture::default(), Gesture::None);
    }
}
