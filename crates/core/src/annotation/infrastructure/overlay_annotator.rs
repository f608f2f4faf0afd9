use crate::annotation::domain::frame_annotator::FrameAnnotator;
use crate::detection::domain::pose::{Pose, SKELETON};
use crate::fall::domain::fall_monitor::{PersonStatus, PersonStatusView};
use crate::shared::frame::Frame;

use super::drawing;

pub const UPRIGHT_COLOR: [u8; 3] = [40, 200, 80];
pub const FALLING_COLOR: [u8; 3] = [255, 176, 0];
pub const FALLEN_COLOR: [u8; 3] = [230, 30, 30];
const SKELETON_COLOR: [u8; 3] = [0, 200, 255];

/// Draws person boxes coloured by fall status, pose skeletons, and a red
/// frame border while anyone is down.
pub struct OverlayAnnotator {
    box_thickness: i64,
    border_thickness: i64,
    draw_skeleton: bool,
}

impl OverlayAnnotator {
    pub fn new(box_thickness: u32, border_thickness: u32, draw_skeleton: bool) -> Self {
        Self {
            box_thickness: box_thickness.max(1) as i64,
            border_thickness: border_thickness as i64,
            draw_skeleton,
        }
    }

    fn skeleton(&self, frame: &mut Frame, pose: &Pose) {
        for &(a, b) in SKELETON {
            if let (Some(p), Some(q)) = (pose.visible(a), pose.visible(b)) {
                drawing::line(
                    frame,
                    (p.0.round() as i64, p.1.round() as i64),
                    (q.0.round() as i64, q.1.round() as i64),
                    2,
                    SKELETON_COLOR,
                );
            }
        }
    }
}

impl Default for OverlayAnnotator {
    fn default() -> Self {
        Self::new(3, 8, true)
    }
}

pub fn status_color(status: PersonStatus) -> [u8; 3] {
    match status {
        PersonStatus::Upright => UPRIGHT_COLOR,
        PersonStatus::Falling => FALLING_COLOR,
        PersonStatus::Fallen => FALLEN_COLOR,
    }
}

impl FrameAnnotator for OverlayAnnotator {
    fn annotate(
        &self,
        frame: &mut Frame,
        people: &[PersonStatusView],
    ) -> Result<(), Box<dyn std::error::Error>> {
        for person in people {
            let b = person.detection.bbox.clamp_to(frame.width(), frame.height());
            drawing::rect(
                frame,
                b.x1.round() as i64,
                b.y1.round() as i64,
                b.x2.round() as i64,
                b.y2.round() as i64,
                self.box_thickness,
                status_color(person.status),
            );
            if self.draw_skeleton {
                if let Some(pose) = &person.detection.pose {
                    self.skeleton(frame, pose);
                }
            }
        }

        let anyone_down = people.iter().any(|p| p.status == PersonStatus::Fallen);
        if anyone_down && self.border_thickness > 0 {
            drawing::rect(
                frame,
                0,
                0,
                frame.width() as i64 - 1,
                frame.height() as i64 - 1,
                self.border_thickness,
                FALLEN_COLOR,
            );
        }
        Ok(())
    }
}
