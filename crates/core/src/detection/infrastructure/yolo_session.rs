/// Shared ONNX Runtime plumbing for ultralytics YOLO exports.
///
/// Both the pose model and the trained fall model take a letterboxed
/// `[1, 3, S, S]` float tensor and return `[1, F, N]` (or `[1, N, F]`) rows;
/// this type owns the session and turns a frame into those rows.
use std::path::Path;

use crate::shared::bbox::BBox;
use crate::shared::frame::Frame;

use super::execution_provider::preferred_execution_providers;

/// Fallback YOLO model input resolution when the model doesn't specify dimensions.
const DEFAULT_INPUT_SIZE: u32 = 640;

/// Letterbox padding value (YOLO convention).
const PAD_VALUE: f32 = 114.0 / 255.0;

/// Mapping from letterboxed model coordinates back to the source frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Letterbox {
    pub scale: f64,
    pub pad_x: u32,
    pub pad_y: u32,
}

impl Letterbox {
    pub fn to_frame(&self, x: f64, y: f64) -> (f64, f64) {
        (
            (x - self.pad_x as f64) / self.scale,
            (y - self.pad_y as f64) / self.scale,
        )
    }

    /// Converts a `cx, cy, w, h` model box into frame coordinates.
    pub fn box_to_frame(&self, cx: f64, cy: f64, w: f64, h: f64) -> BBox {
        let b = BBox::from_center(cx, cy, w, h);
        let (x1, y1) = self.to_frame(b.x1, b.y1);
        let (x2, y2) = self.to_frame(b.x2, b.y2);
        BBox::new(x1, y1, x2, y2)
    }
}

/// Decoded model output: one feature row per candidate detection.
pub struct YoloOutput {
    pub rows: Vec<Vec<f32>>,
    pub letterbox: Letterbox,
}

pub struct YoloSession {
    session: ort::session::Session,
    input_size: u32,
}

impl YoloSession {
    /// Load a YOLO ONNX model.
    ///
    /// The input resolution is read from the model's NCHW input shape and
    /// falls back to 640 when the shape is dynamic.
    pub fn load(model_path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let session = ort::session::Session::builder()?
            .with_execution_providers(preferred_execution_providers())?
            .commit_from_file(model_path)?;

        let input_size = session
            .inputs()
            .first()
            .and_then(|input| match input.dtype() {
                ort::value::ValueType::Tensor { ref shape, .. }
                    if shape.len() >= 4 && shape[2] > 0 =>
                {
                    Some(shape[2] as u32)
                }
                _ => None,
            })
            .unwrap_or(DEFAULT_INPUT_SIZE);

        log::debug!(
            "Loaded YOLO model {} (input {input_size}x{input_size})",
            model_path.display()
        );
        Ok(Self {
            session,
            input_size,
        })
    }

    pub fn infer(&mut self, frame: &Frame) -> Result<YoloOutput, Box<dyn std::error::Error>> {
        let (input_tensor, letterbox) = letterbox(frame, self.input_size);

        let input_value = ort::value::Tensor::from_array(input_tensor)?;
        let outputs = self.session.run(ort::inputs![input_value])?;
        if outputs.len() == 0 {
            return Err("YOLO model produced no outputs".into());
        }
        let tensor = outputs[0].try_extract_array::<f32>()?;
        let shape = tensor.shape().to_vec();
        let data = tensor.as_slice().ok_or("YOLO output tensor is not contiguous")?;

        let rows = split_rows(data, &shape)?;
        Ok(YoloOutput { rows, letterbox })
    }
}

/// Splits a `[1, F, N]` or `[1, N, F]` output into `N` rows of `F` features.
///
/// Ultralytics exports are feature-major (`F < N`); detection-major outputs
/// are read as they are.
fn split_rows(data: &[f32], shape: &[usize]) -> Result<Vec<Vec<f32>>, Box<dyn std::error::Error>> {
    if shape.len() != 3 {
        return Err(format!("Unexpected YOLO output shape: {shape:?}").into());
    }
    let feature_major = shape[1] < shape[2];
    let (num_dets, num_feats) = if feature_major {
        (shape[2], shape[1])
    } else {
        (shape[1], shape[2])
    };
    if data.len() < num_dets * num_feats {
        return Err(format!("YOLO output shorter than its shape {shape:?}").into());
    }

    let rows = (0..num_dets)
        .map(|i| {
            if feature_major {
                (0..num_feats).map(|f| data[f * num_dets + i]).collect()
            } else {
                data[i * num_feats..(i + 1) * num_feats].to_vec()
            }
        })
        .collect();
    Ok(rows)
}

/// Letterbox-resize a frame into a `target_size` square NCHW tensor.
fn letterbox(frame: &Frame, target_size: u32) -> (ndarray::Array4<f32>, Letterbox) {
    let fw = frame.width() as f64;
    let fh = frame.height() as f64;
    let target = target_size as f64;

    let scale = (target / fw).min(target / fh);
    let new_w = ((fw * scale).round() as u32).min(target_size);
    let new_h = ((fh * scale).round() as u32).min(target_size);
    let pad_x = (target_size - new_w) / 2;
    let pad_y = (target_size - new_h) / 2;

    let size = target_size as usize;
    let mut tensor = ndarray::Array4::<f32>::from_elem((1, 3, size, size), PAD_VALUE);

    let src = frame.as_ndarray();
    let src_h = frame.height() as usize;
    let src_w = frame.width() as usize;

    // Nearest-neighbour resize into the padded window
    for y in 0..new_h as usize {
        let src_y = ((y as f64 / scale) as usize).min(src_h - 1);
        for x in 0..new_w as usize {
            let src_x = ((x as f64 / scale) as usize).min(src_w - 1);
            let ty = pad_y as usize + y;
            let tx = pad_x as usize + x;
            for c in 0..3 {
                tensor[[0, c, ty, tx]] = src[[src_y, src_x, c]] as f32 / 255.0;
            }
        }
    }

    (
        tensor,
        Letterbox {
            scale,
            pad_x,
            pad_y,
        },
    )
}
