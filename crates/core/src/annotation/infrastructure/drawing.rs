//! Pixel primitives. Everything clips to the frame.

use crate::shared::frame::Frame;

/// Bresenham line, `thickness` pixels wide (grown downwards and rightwards).
///
/// The segment is clipped to the frame first, so far-off endpoints cost no
/// more than on-screen ones.
pub fn line(frame: &mut Frame, from: (i64, i64), to: (i64, i64), thickness: i64, rgb: [u8; 3]) {
    let t = thickness.max(1);
    let bounds = (
        (1 - t) as f64,
        (1 - t) as f64,
        (frame.width() as i64 - 1) as f64,
        (frame.height() as i64 - 1) as f64,
    );
    let Some((from, to)) = clip_segment(from, to, bounds) else {
        return;
    };
    let (mut x, mut y) = from;
    let dx = (to.0 - x).abs();
    let dy = -(to.1 - y).abs();
    let sx = if x < to.0 { 1 } else { -1 };
    let sy = if y < to.1 { 1 } else { -1 };
    let mut err = dx + dy;
    loop {
        dot(frame, x, y, thickness, rgb);
        if x == to.0 && y == to.1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x += sx;
        }
        if e2 <= dx {
            err += dx;
            y += sy;
        }
    }
}

/// Outline of the rectangle with corners `(x1, y1)` and `(x2, y2)`, drawn
/// inwards.
pub fn rect(frame: &mut Frame, x1: i64, y1: i64, x2: i64, y2: i64, thickness: i64, rgb: [u8; 3]) {
    let t = thickness.max(1);
    fill(frame, x1, y1, x2, y1 + t - 1, rgb);
    fill(frame, x1, y2 - t + 1, x2, y2, rgb);
    fill(frame, x1, y1, x1 + t - 1, y2, rgb);
    fill(frame, x2 - t + 1, y1, x2, y2, rgb);
}

/// Solid rectangle, inclusive bounds.
pub fn fill(frame: &mut Frame, x1: i64, y1: i64, x2: i64, y2: i64, rgb: [u8; 3]) {
    let max_x = frame.width() as i64 - 1;
    let max_y = frame.height() as i64 - 1;
    let (x1, x2) = (x1.max(0), x2.min(max_x));
    let (y1, y2) = (y1.max(0), y2.min(max_y));
    for y in y1..=y2 {
        for x in x1..=x2 {
            frame.put_pixel(x, y, rgb);
        }
    }
}

/// Liang-Barsky clip of a segment to `(min_x, min_y, max_x, max_y)`.
fn clip_segment(
    from: (i64, i64),
    to: (i64, i64),
    (min_x, min_y, max_x, max_y): (f64, f64, f64, f64),
) -> Option<((i64, i64), (i64, i64))> {
    let (x0, y0) = (from.0 as f64, from.1 as f64);
    let (dx, dy) = (to.0 as f64 - x0, to.1 as f64 - y0);
    let (mut t0, mut t1) = (0.0_f64, 1.0_f64);
    for (p, q) in [
        (-dx, x0 - min_x),
        (dx, max_x - x0),
        (-dy, y0 - min_y),
        (dy, max_y - y0),
    ] {
        if p == 0.0 {
            if q < 0.0 {
                return None;
            }
        } else {
            let r = q / p;
            if p < 0.0 {
                t0 = t0.max(r);
            } else {
                t1 = t1.min(r);
            }
        }
    }
    if t0 > t1 {
        return None;
    }
    let at = |t: f64| ((x0 + t * dx).round() as i64, (y0 + t * dy).round() as i64);
    Some((at(t0), at(t1)))
}

fn dot(frame: &mut Frame, x: i64, y: i64, thickness: i64, rgb: [u8; 3]) {
    let t = thickness.max(1);
    fill(frame, x, y, x + t - 1, y + t - 1, rgb);
}
