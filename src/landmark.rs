//! Hand landmarks.
//!
//! A [`Hand`] always consists of exactly [`Hand::NUM_LANDMARKS`] landmarks, in the order defined by
//! [`LandmarkIdx`]. Hand estimators that cannot produce a complete set of landmarks must not produce
//! a [`Hand`] at all.

/// A landmark in 3D space.
///
/// X and Y are frame pixel coordinates (Y pointing down). Z is the relative depth reported by the
/// landmark network, passed through without scaling.
#[derive(Debug, PartialEq, Clone, Copy, Default)]
pub struct Landmark {
    pos: [f32; 3],
}

impl Landmark {
    #[inline]
    pub const fn new(position: [f32; 3]) -> Self {
        Self { pos: position }
    }

    #[inline]
    pub fn x(&self) -> f32 {
        self.pos[0]
    }

    #[inline]
    pub fn y(&self) -> f32 {
        self.pos[1]
    }

    #[inline]
    pub fn z(&self) -> f32 {
        self.pos[2]
    }
}

/// Names for the hand pose landmarks.
///
/// # Terminology
///
/// - **CMC**: [Carpometacarpal joint], the lowest joint of the thumb, located near the wrist.
/// - **MCP**: [Metacarpophalangeal joint], the lower joint forming the knuckles near the palm of
///   the hand.
/// - **PIP**: Proximal Interphalangeal joint, the joint between the MCP and DIP.
/// - **DIP**: Distal Interphalangeal joint, the highest joint of a finger.
/// - **Tip**: This landmark is just placed on the tip of the finger, above the DIP.
///
/// [Carpometacarpal joint]: https://en.wikipedia.org/wiki/Carpometacarpal_joint
/// [Metacarpophalangeal joint]: https://en.wikipedia.org/wiki/Metacarpophalangeal_joint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LandmarkIdx {
    Wrist,
    ThumbCmc,
    ThumbMcp,
    ThumbIp,
    ThumbTip,
    IndexFingerMcp,
    IndexFingerPip,
    IndexFingerDip,
    IndexFingerTip,
    MiddleFingerMcp,
    MiddleFingerPip,
    MiddleFingerDip,
    MiddleFingerTip,
    RingFingerMcp,
    RingFingerPip,
    RingFingerDip,
    RingFingerTip,
    PinkyMcp,
    PinkyPip,
    PinkyDip,
    PinkyTip,
}

/// A detected hand: exactly [`Hand::NUM_LANDMARKS`] landmarks.
#[derive(Debug, Clone, PartialEq)]
pub struct Hand {
    landmarks: [Landmark; Hand::NUM_LANDMARKS],
}

impl Hand {
    pub const NUM_LANDMARKS: usize = 21;

    /// Creates a hand from a complete set of landmarks.
    pub fn new(landmarks: [Landmark; Self::NUM_LANDMARKS]) -> Self {
        Self { landmarks }
    }

    /// Creates a hand from a slice of positions.
    ///
    /// Returns [`None`] unless `positions` contains exactly [`Hand::NUM_LANDMARKS`] entries.
    pub fn from_positions(positions: &[[f32; 3]]) -> Option<Self> {
        if positions.len() != Self::NUM_LANDMARKS {
            return None;
        }

        let mut landmarks = [Landmark::default(); Self::NUM_LANDMARKS];
        for (out, &pos) in landmarks.iter_mut().zip(positions) {
            *out = Landmark::new(pos);
        }
        Some(Self::new(landmarks))
    }

    #[inline]
    pub fn landmark(&self, idx: LandmarkIdx) -> Landmark {
        self.landmarks[idx as usize]
    }

    #[inline]
    pub fn landmarks(&self) -> &[Landmark; Self::NUM_LANDMARKS] {
        &self.landmarks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_positions_requires_21_landmarks() {
        assert!(Hand::from_positions(&[]).is_none());
        assert!(Hand::from_positions(&[[0.0; 3]; 20]).is_none());
        assert!(Hand::from_positions(&[[0.0; 3]; 22]).is_none());
        assert!(Hand::from_positions(&[[0.0; 3]; 21]).is_some());
    }

    #[test]
    fn landmark_indices() {
        let positions: Vec<[f32; 3]> = (0..21).map(|i| [i as f32, 0.0, 0.0]).collect();
        let hand = Hand::from_positions(&positions).unwrap();
        assert_eq!(hand.landmark(LandmarkIdx::Wrist).x(), 0.0);
        assert_eq!(hand.landmark(LandmarkIdx::ThumbTip).x(), 4.0);
        assert_eq!(hand.landmark(LandmarkIdx::IndexFingerTip).x(), 8.0);
        assert_eq!(hand.landmark(LandmarkIdx::MiddleFingerTip).x(), 12.0);
        assert_eq!(hand.landmark(LandmarkIdx::RingFingerTip).x(), 16.0);
        assert_eq!(hand.landmark(LandmarkIdx::PinkyTip).x(), 20.0);
    }
}
