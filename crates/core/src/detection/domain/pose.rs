/// Minimum keypoint confidence to treat a landmark as visible.
pub const KEYPOINT_CONF_THRESH: f64 = 0.5;

/// Number of keypoints in the COCO person skeleton.
pub const NUM_KEYPOINTS: usize = 17;

/// COCO keypoint order used by ultralytics pose models.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeypointKind {
    Nose = 0,
    LeftEye,
    RightEye,
    LeftEar,
    RightEar,
    LeftShoulder,
    RightShoulder,
    LeftElbow,
    RightElbow,
    LeftWrist,
    RightWrist,
    LeftHip,
    RightHip,
    LeftKnee,
    RightKnee,
    LeftAnkle,
    RightAnkle,
}

/// Limb connections drawn by the annotator.
pub const SKELETON: &[(KeypointKind, KeypointKind)] = &[
    (KeypointKind::LeftShoulder, KeypointKind::RightShoulder),
    (KeypointKind::LeftShoulder, KeypointKind::LeftElbow),
    (KeypointKind::LeftElbow, KeypointKind::LeftWrist),
    (KeypointKind::RightShoulder, KeypointKind::RightElbow),
    (KeypointKind::RightElbow, KeypointKind::RightWrist),
    (KeypointKind::LeftShoulder, KeypointKind::LeftHip),
    (KeypointKind::RightShoulder, KeypointKind::RightHip),
    (KeypointKind::LeftHip, KeypointKind::RightHip),
    (KeypointKind::LeftHip, KeypointKind::LeftKnee),
    (KeypointKind::LeftKnee, KeypointKind::LeftAnkle),
    (KeypointKind::RightHip, KeypointKind::RightKnee),
    (KeypointKind::RightKnee, KeypointKind::RightAnkle),
];

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Keypoint {
    pub x: f64,
    pub y: f64,
    pub confidence: f64,
}

impl Keypoint {
    pub fn is_visible(&self) -> bool {
        self.confidence >= KEYPOINT_CONF_THRESH
    }
}

/// The 17 body keypoints of one person, in frame coordinates.
#[derive(Clone, Debug, PartialEq)]
pub struct Pose {
    keypoints: [Keypoint; NUM_KEYPOINTS],
}

impl Pose {
    pub fn new(keypoints: [Keypoint; NUM_KEYPOINTS]) -> Self {
        Self { keypoints }
    }

    pub fn get(&self, kind: KeypointKind) -> &Keypoint {
        &self.keypoints[kind as usize]
    }

    pub fn visible(&self, kind: KeypointKind) -> Option<(f64, f64)> {
        let kp = self.get(kind);
        kp.is_visible().then_some((kp.x, kp.y))
    }

    pub fn keypoints(&self) -> &[Keypoint; NUM_KEYPOINTS] {
        &self.keypoints
    }

    /// Midpoint of the visible members of a left/right pair.
    pub fn midpoint(&self, left: KeypointKind, right: KeypointKind) -> Option<(f64, f64)> {
        match (self.visible(left), self.visible(right)) {
            (Some(a), Some(b)) => Some(((a.0 + b.0) / 2.0, (a.1 + b.1) / 2.0)),
            (Some(a), None) | (None, Some(a)) => Some(a),
            (None, None) => None,
        }
    }

    /// Torso angle from vertical in degrees (0 = upright, 90 = horizontal).
    ///
    /// Measured from the shoulder midpoint to the hip midpoint. `None` when
    /// neither shoulder or neither hip is visible, or when they coincide.
    pub fn torso_angle(&self) -> Option<f64> {
        let shoulders = self.midpoint(KeypointKind::LeftShoulder, KeypointKind::RightShoulder)?;
        let hips = self.midpoint(KeypointKind::LeftHip, KeypointKind::RightHip)?;
        let dx = (hips.0 - shoulders.0).abs();
        let dy = (hips.1 - shoulders.1).abs();
        if dx == 0.0 && dy == 0.0 {
            return None;
        }
        Some(dx.atan2(dy).to_degrees())
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    /// Pose with only shoulders and hips visible.
    pub fn torso(shoulders: (f64, f64), hips: (f64, f64)) -> Pose {
        let mut kps = [Keypoint::default(); NUM_KEYPOINTS];
        let visible = |x, y| Keypoint {
            x,
            y,
            confidence: 0.9,
        };
        kps[KeypointKind::LeftShoulder as usize] = visible(shoulders.0 - 10.0, shoulders.1);
        kps[KeypointKind::RightShoulder as usize] = visible(shoulders.0 + 10.0, shoulders.1);
        kps[KeypointKind::LeftHip as usize] = visible(hips.0 - 8.0, hips.1);
        kps[KeypointKind::RightHip as usize] = visible(hips.0 + 8.0, hips.1);
        Pose::new(kps)
    }

    pub fn upright() -> Pose {
        torso((50.0, 40.0), (50.0, 100.0))
    }

    pub fn lying() -> Pose {
        torso((20.0, 100.0), (90.0, 104.0))
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_upright_torso_is_near_zero_degrees() {
        assert_relative_eq!(upright().torso_angle().unwrap(), 0.0);
    }

    #[test]
    fn test_lying_torso_is_near_horizontal() {
        assert!(lying().torso_angle().unwrap() > 80.0);
    }

    #[test]
    fn test_diagonal_torso_is_45_degrees() {
        let pose = torso((0.0, 0.0), (30.0, 30.0));
        assert_relative_eq!(pose.torso_angle().unwrap(), 45.0, epsilon = 1e-9);
    }

    #[test]
    fn test_torso_angle_needs_visible_keypoints() {
        let pose = Pose::new([Keypoint::default(); NUM_KEYPOINTS]);
        assert!(pose.torso_angle().is_none());
    }

    #[test]
    fn test_midpoint_falls_back_to_single_side() {
        let mut kps = [Keypoint::default(); NUM_KEYPOINTS];
        kps[KeypointKind::LeftHip as usize] = Keypoint {
            x: 12.0,
            y: 34.0,
            confidence: 0.7,
        };
        let pose = Pose::new(kps);
        assert_eq!(
            pose.midpoint(KeypointKind::LeftHip, KeypointKind::RightHip),
            Some((12.0, 34.0))
        );
    }

    #[test]
    fn test_low_confidence_keypoint_is_invisible() {
        let kp = Keypoint {
            x: 1.0,
            y: 1.0,
            confidence: 0.49,
        };
        assert!(!kp.is_visible());
    }
}
