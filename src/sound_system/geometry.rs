//! Map geometry and the audibility gate for positional sounds

/// A position in a zone's coordinate system
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Straight-line distance to `other`
    pub fn distance(&self, other: Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// Axis-aligned rectangle; contains points on its left/top edges only
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    /// Rectangle of the given size centered on `center`
    pub fn centered(center: Point, width: f64, height: f64) -> Self {
        Self::new(center.x - width / 2.0, center.y - height / 2.0, width, height)
    }

    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.x
            && point.y >= self.y
            && point.x < self.x + self.width
            && point.y < self.y + self.height
    }
}

/// Distance falloff volume index (0-100) for a sound heard at `distance`
///
/// 100 at the listener's position, 5 at `max_distance`, 0 at the far corners.
pub fn falloff_index(distance: f64, max_distance: f64) -> u8 {
    let index = (95.0 * (max_distance - distance) / max_distance + 5.0) as i32;
    index.clamp(0, 100) as u8
}

/// Decides whether a sound at `source` reaches a listener and how loud
///
/// Returns the falloff volume index, or `None` when the source lies outside
/// the listener's hearing area or the listener stands outside the sound's
/// audibility area.
pub fn audible_falloff(
    source: Point,
    listener: Point,
    hearing: Rect,
    audibility: Option<Rect>,
) -> Option<u8> {
    if !hearing.contains(source) {
        return None;
    }
    if let Some(area) = audibility {
        if !area.contains(listener) {
            return None;
        }
    }

    let max_distance = hearing.width / 2.0;
    Some(falloff_index(source.distance(listener), max_distance))
}
