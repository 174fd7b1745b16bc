//! Hand landmark data.
//!
//! A [`HandPose`] is what the landmark network produces for one hand: 21 named keypoints in the
//! input image's coordinate system. For capture and classification, poses are flattened into a
//! [`LandmarkVector`].

use std::fmt;

type Position = [f32; 3];

/// Flattened numeric form of a [`HandPose`].
///
/// A vector is only usable for capture or prediction when it is *complete*, meaning it holds
/// exactly [`LandmarkVector::LEN`] values. An empty vector means that no hand was detected.
#[derive(Clone, Default, PartialEq)]
pub struct LandmarkVector(Vec<f32>);

impl LandmarkVector {
    /// Number of values in a complete vector: 21 keypoints with 3 coordinates each.
    pub const LEN: usize = HandPose::NUM_LANDMARKS * 3;

    /// Returns an empty vector, indicating that no hand was detected.
    pub fn empty() -> Self {
        Self(Vec::new())
    }

    /// Wraps raw values without checking their count.
    ///
    /// Callers must check [`LandmarkVector::is_complete`] before using the result.
    pub fn from_raw(values: Vec<f32>) -> Self {
        Self(values)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns whether this vector holds exactly [`LandmarkVector::LEN`] values.
    #[inline]
    pub fn is_complete(&self) -> bool {
        self.0.len() == Self::LEN
    }

    #[inline]
    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }
}

impl fmt::Debug for LandmarkVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LandmarkVector({} values)", self.0.len())
    }
}

impl From<&HandPose> for LandmarkVector {
    fn from(pose: &HandPose) -> Self {
        Self(pose.positions.iter().flatten().copied().collect())
    }
}

/// Estimated keypoints of a single hand.
#[derive(Clone, Debug)]
pub struct HandPose {
    positions: [Position; Self::NUM_LANDMARKS],
    presence: f32,
}

impl HandPose {
    pub const NUM_LANDMARKS: usize = 21;

    pub fn new(positions: [Position; Self::NUM_LANDMARKS], presence: f32) -> Self {
        Self {
            positions,
            presence,
        }
    }

    /// Returns the 3D landmark positions in the input image's coordinate system.
    pub fn positions(&self) -> &[Position] {
        &self.positions
    }

    /// Returns a landmark's position in the input image's coordinate system.
    pub fn position(&self, idx: LandmarkIdx) -> Position {
        self.positions[idx as usize]
    }

    /// Confidence that a hand is actually present, in range 0.0 to 1.0.
    pub fn presence(&self) -> f32 {
        self.presence
    }

    /// Flattens the keypoints into a [`LandmarkVector`] (x, y, z per keypoint, in index order).
    pub fn to_vector(&self) -> LandmarkVector {
        LandmarkVector::from(self)
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

/// Pairs of landmarks that are connected by a bone (or the palm outline).
pub const CONNECTIVITY: &[(LandmarkIdx, LandmarkIdx)] = {
    use LandmarkIdx::*;
    &[
        // Surround the palm:
        (Wrist, ThumbCmc),
        (ThumbCmc, IndexFingerMcp),
        (IndexFingerMcp, MiddleFingerMcp),
        (MiddleFingerMcp, RingFingerMcp),
        (RingFingerMcp, PinkyMcp),
        (PinkyMcp, Wrist),
        // Thumb:
        (ThumbCmc, ThumbMcp),
        (ThumbMcp, ThumbIp),
        (ThumbIp, ThumbTip),
        // Index:
        (IndexFingerMcp, IndexFingerPip),
        (IndexFingerPip, IndexFingerDip),
        (IndexFingerDip, IndexFingerTip),
        // Middle:
        (MiddleFingerMcp, MiddleFingerPip),
        (MiddleFingerPip, MiddleFingerDip),
        (MiddleFingerDip, MiddleFingerTip),
        // Ring:
        (RingFingerMcp, RingFingerPip),
        (RingFingerPip, RingFingerDip),
        (RingFingerDip, RingFingerTip),
        // Pinky:
        (PinkyMcp, PinkyPip),
        (PinkyPip, PinkyDip),
        (PinkyDip, PinkyTip),
    ]
};
