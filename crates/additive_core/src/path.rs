//! Path building and arc-length measurement
//!
//! Paths are only ever sampled, never rendered: [`PathMeasure`] flattens the
//! curves once and answers position/tangent queries by distance.

use smallvec::SmallVec;

/// Segments used to flatten one curve command
const CURVE_SEGMENTS: usize = 24;

/// A 2D point
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const ZERO: Point = Point { x: 0.0, y: 0.0 };

    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    fn distance_to(self, other: Point) -> f32 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        (dx * dx + dy * dy).sqrt()
    }

    fn lerp(self, other: Point, t: f32) -> Point {
        Point::new(
            self.x + (other.x - self.x) * t,
            self.y + (other.y - self.y) * t,
        )
    }
}

/// Path command
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PathCommand {
    MoveTo(Point),
    LineTo(Point),
    QuadTo {
        control: Point,
        end: Point,
    },
    CubicTo {
        control1: Point,
        control2: Point,
        end: Point,
    },
    Close,
}

/// A 2D path composed of commands
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Path {
    commands: SmallVec<[PathCommand; 16]>,
}

impl Path {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder() -> PathBuilder {
        PathBuilder::new()
    }

    pub fn commands(&self) -> &[PathCommand] {
        &self.commands
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

/// Builder for constructing paths
pub struct PathBuilder {
    path: Path,
}

impl PathBuilder {
    pub fn new() -> Self {
        Self { path: Path::new() }
    }

    pub fn move_to(mut self, x: f32, y: f32) -> Self {
        self.path.commands.push(PathCommand::MoveTo(Point::new(x, y)));
        self
    }

    pub fn line_to(mut self, x: f32, y: f32) -> Self {
        self.path.commands.push(PathCommand::LineTo(Point::new(x, y)));
        self
    }

    pub fn quad_to(mut self, cx: f32, cy: f32, x: f32, y: f32) -> Self {
        self.path.commands.push(PathCommand::QuadTo {
            control: Point::new(cx, cy),
            end: Point::new(x, y),
        });
        self
    }

    pub fn cubic_to(mut self, c1x: f32, c1y: f32, c2x: f32, c2y: f32, x: f32, y: f32) -> Self {
        self.path.commands.push(PathCommand::CubicTo {
            control1: Point::new(c1x, c1y),
            control2: Point::new(c2x, c2y),
            end: Point::new(x, y),
        });
        self
    }

    pub fn close(mut self) -> Self {
        self.path.commands.push(PathCommand::Close);
        self
    }

    pub fn build(self) -> Path {
        self.path
    }
}

impl Default for PathBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// One flattened straight segment, with the arc length at its start
#[derive(Clone, Copy, Debug)]
struct Segment {
    from: Point,
    to: Point,
    start_distance: f32,
    length: f32,
}

/// Arc-length parameterization of a [`Path`].
///
/// Only the first contour with a non-zero length is measured; later contours
/// are ignored. With `force_closed`, an open contour gets a closing segment.
#[derive(Clone, Debug)]
pub struct PathMeasure {
    segments: Vec<Segment>,
    length: f32,
}

impl PathMeasure {
    pub fn new(path: &Path, force_closed: bool) -> Self {
        let mut measure = Self {
            segments: Vec::new(),
            length: 0.0,
        };

        let mut contour_start = Point::ZERO;
        let mut current = Point::ZERO;
        let mut contour_open = false;

        for command in path.commands() {
            match *command {
                PathCommand::MoveTo(point) => {
                    if contour_open {
                        if force_closed {
                            measure.push(current, contour_start);
                        }
                        contour_open = false;
                        if measure.length > 0.0 {
                            break;
                        }
                    }
                    contour_start = point;
                    current = point;
                }
                PathCommand::LineTo(point) => {
                    measure.push(current, point);
                    current = point;
                    contour_open = true;
                }
                PathCommand::QuadTo { control, end } => {
                    let mut prev = current;
                    for i in 1..=CURVE_SEGMENTS {
                        let t = i as f32 / CURVE_SEGMENTS as f32;
                        let next = quad_point(current, control, end, t);
                        measure.push(prev, next);
                        prev = next;
                    }
                    current = end;
                    contour_open = true;
                }
                PathCommand::CubicTo {
                    control1,
                    control2,
                    end,
                } => {
                    let mut prev = current;
                    for i in 1..=CURVE_SEGMENTS {
                        let t = i as f32 / CURVE_SEGMENTS as f32;
                        let next = cubic_point(current, control1, control2, end, t);
                        measure.push(prev, next);
                        prev = next;
                    }
                    current = end;
                    contour_open = true;
                }
                PathCommand::Close => {
                    measure.push(current, contour_start);
                    current = contour_start;
                    contour_open = false;
                    if measure.length > 0.0 {
                        break;
                    }
                }
            }
        }

        if force_closed && contour_open {
            measure.push(current, contour_start);
        }

        measure
    }

    fn push(&mut self, from: Point, to: Point) {
        let length = from.distance_to(to);
        if length <= f32::EPSILON {
            return;
        }
        self.segments.push(Segment {
            from,
            to,
            start_distance: self.length,
            length,
        });
        self.length += length;
    }

    /// Total arc length
    pub fn length(&self) -> f32 {
        self.length
    }

    /// Position and unit tangent at `distance` along the path.
    ///
    /// `distance` is clamped to `[0, length]`. Returns `None` for a path with
    /// zero length.
    pub fn pos_tan(&self, distance: f32) -> Option<(Point, Point)> {
        if self.segments.is_empty() {
            return None;
        }
        let distance = distance.clamp(0.0, self.length);

        let index = self
            .segments
            .partition_point(|s| s.start_distance + s.length < distance)
            .min(self.segments.len() - 1);
        let segment = &self.segments[index];

        let local = ((distance - segment.start_distance) / segment.length).clamp(0.0, 1.0);
        let position = segment.from.lerp(segment.to, local);
        let tangent = Point::new(
            (segment.to.x - segment.from.x) / segment.length,
            (segment.to.y - segment.from.y) / segment.length,
        );
        Some((position, tangent))
    }
}

fn quad_point(p0: Point, p1: Point, p2: Point, t: f32) -> Point {
    let mt = 1.0 - t;
    Point::new(
        mt * mt * p0.x + 2.0 * mt * t * p1.x + t * t * p2.x,
        mt * mt * p0.y + 2.0 * mt * t * p1.y + t * t * p2.y,
    )
}

fn cubic_point(p0: Point, p1: Point, p2: Point, p3: Point, t: f32) -> Point {
    let mt = 1.0 - t;
    let a = mt * mt * mt;
    let b = 3.0 * mt * mt * t;
    let c = 3.0 * mt * t * t;
    let d = t * t * t;
    Point::new(
        a * p0.x + b * p1.x + c * p2.x + d * p3.x,
        a * p0.y + b * p1.y + c * p2.y + d * p3.y,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_polyline_length_and_midpoint() {
        let path = Path::builder()
            .move_to(0.0, 0.0)
            .line_to(100.0, 0.0)
            .line_to(100.0, 50.0)
            .build();
        let measure = PathMeasure::new(&path, false);

        assert!((measure.length() - 150.0).abs() < 1e-4);

        let (pos, tan) = measure.pos_tan(75.0).unwrap();
        assert!((pos.x - 75.0).abs() < 1e-4);
        assert_eq!(pos.y, 0.0);
        assert_eq!(tan, Point::new(1.0, 0.0));

        let (pos, tan) = measure.pos_tan(125.0).unwrap();
        assert!((pos.x - 100.0).abs() < 1e-4);
        assert!((pos.y - 25.0).abs() < 1e-4);
        assert_eq!(tan, Point::new(0.0, 1.0));
    }

    #[test]
    fn test_force_closed_adds_closing_segment() {
        let path = Path::builder()
            .move_to(0.0, 0.0)
            .line_to(30.0, 0.0)
            .line_to(30.0, 40.0)
            .build();

        assert!((PathMeasure::new(&path, false).length() - 70.0).abs() < 1e-4);
        assert!((PathMeasure::new(&path, true).length() - 120.0).abs() < 1e-4);
    }

    #[test]
    fn test_only_first_contour_is_measured() {
        let path = Path::builder()
            .move_to(0.0, 0.0)
            .line_to(10.0, 0.0)
            .move_to(50.0, 50.0)
            .line_to(50.0, 80.0)
            .build();
        let measure = PathMeasure::new(&path, false);
        assert!((measure.length() - 10.0).abs() < 1e-4);
        assert_eq!(measure.pos_tan(100.0).unwrap().0, Point::new(10.0, 0.0));

        let closed = Path::builder()
            .move_to(0.0, 0.0)
            .line_to(30.0, 0.0)
            .line_to(30.0, 40.0)
            .move_to(100.0, 100.0)
            .line_to(200.0, 100.0)
            .build();
        assert!((PathMeasure::new(&closed, true).length() - 120.0).abs() < 1e-4);

        let after_close = Path::builder()
            .move_to(0.0, 0.0)
            .line_to(10.0, 0.0)
            .close()
            .line_to(0.0, 10.0)
            .build();
        assert!((PathMeasure::new(&after_close, false).length() - 20.0).abs() < 1e-4);
    }

    #[test]
    fn test_zero_length_contour_is_skipped() {
        let path = Path::builder()
            .move_to(5.0, 5.0)
            .line_to(5.0, 5.0)
            .move_to(0.0, 0.0)
            .line_to(0.0, 20.0)
            .build();
        let measure = PathMeasure::new(&path, false);
        assert!((measure.length() - 20.0).abs() < 1e-4);
        assert_eq!(measure.pos_tan(0.0).unwrap().0, Point::new(0.0, 0.0));
    }

    #[test]
    fn test_distance_is_clamped() {
        let path = Path::builder().move_to(0.0, 0.0).line_to(10.0, 0.0).build();
        let measure = PathMeasure::new(&path, false);

        assert_eq!(measure.pos_tan(-5.0).unwrap().0, Point::new(0.0, 0.0));
        assert_eq!(measure.pos_tan(50.0).unwrap().0, Point::new(10.0, 0.0));
    }

    #[test]
    fn test_empty_path_has_no_position() {
        let measure = PathMeasure::new(&Path::new(), true);
        assert_eq!(measure.length(), 0.0);
        assert!(measure.pos_tan(0.0).is_none());
    }

    #[test]
    fn test_quad_curve_ends_at_end_point() {
        let path = Path::builder()
            .move_to(0.0, 0.0)
            .quad_to(50.0, 100.0, 100.0, 0.0)
            .build();
        let measure = PathMeasure::new(&path, false);

        // Longer than the straight chord
        assert!(measure.length() > 100.0);
        let (end, _) = measure.pos_tan(measure.length()).unwrap();
        assert!((end.x - 100.0).abs() < 1e-3);
        assert!(end.y.abs() < 1e-3);
    }
}
