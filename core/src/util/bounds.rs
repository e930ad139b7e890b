use geo::{coord, Rect};

use crate::codec::sequence::CoordSequence;

/// Trait to extend rectangles
///
/// # Examples
///
/// ```rust
/// use geo::{coord, Rect};
/// use quadshape_core::util::bounds::ExtendRect;
///
/// let mut bb = Rect::new(
///     coord! { x: 1.0, y: 2.0 },
///     coord! { x: 1.0, y: 2.0 }
/// );
///
/// bb.extend_point(5.0, 6.0);
/// assert_eq!(bb.min().x, 1.0);
/// assert_eq!(bb.min().y, 2.0);
/// assert_eq!(bb.max().x, 5.0);
/// assert_eq!(bb.max().y, 6.0);
///
/// bb.extend_point(-7.0, -6.0);
/// assert_eq!(bb.min().x, -7.0);
/// assert_eq!(bb.min().y, -6.0);
/// assert_eq!(bb.max().x, 5.0);
/// assert_eq!(bb.max().y, 6.0);
/// ```
///
/// ```rust
/// use geo::{coord, Rect};
/// use quadshape_core::util::bounds::ExtendRect;
///
/// let mut bb1 = Rect::new(
///     coord! { x: 1.0, y: 2.0 },
///     coord! { x: 4.0, y: 5.0 }
/// );
/// let bb2 = Rect::new(
///     coord! { x: 40.0, y: 50.0 },
///     coord! { x: 70.0, y: 80.0 }
/// );
///
/// bb1.extend_rect(&bb2);
/// assert_eq!(bb1.min().x, 1.0);
/// assert_eq!(bb1.min().y, 2.0);
/// assert_eq!(bb1.max().x, 70.0);
/// assert_eq!(bb1.max().y, 80.0);
/// ```
pub trait ExtendRect {
    /// Extends the rectangle so it overlaps the given point
    fn extend_point(&mut self, x: f64, y: f64);

    /// Extends the rectangle so it overlaps the given other rectangle
    fn extend_rect(&mut self, other: &Rect);
}

impl ExtendRect for Rect {
    fn extend_point(&mut self, x: f64, y: f64) {
        let min = self.min();
        self.set_min((min.x.min(x), min.y.min(y)));
        let max = self.max();
        self.set_max((max.x.max(x), max.y.max(y)));
    }

    fn extend_rect(&mut self, other: &Rect) {
        let min = self.min();
        let other_min = other.min();
        self.set_min((min.x.min(other_min.x), min.y.min(other_min.y)));
        let max = self.max();
        let other_max = other.max();
        self.set_max((max.x.max(other_max.x), max.y.max(other_max.y)));
    }
}

/// Bounding box of all coordinates across the given sequences, `None` if
/// there are no coordinates at all
pub fn parts_bounds<S: CoordSequence>(parts: &[S]) -> Option<Rect> {
    let mut bounds: Option<Rect> = None;
    for part in parts {
        for index in 0..part.len() {
            let (x, y) = (part.x(index), part.y(index));
            match bounds.as_mut() {
                Some(bounds) => bounds.extend_point(x, y),
                None => bounds = Some(Rect::new(coord! { x: x, y: y }, coord! { x: x, y: y })),
            }
        }
    }
    bounds
}

#[cfg(test)]
mod tests {
    use crate::codec::sequence::PackedSequence;
    use crate::geom::Coordinate;

    use super::parts_bounds;

    #[test]
    fn bounds_across_parts() {
        let part1 = PackedSequence::from_coordinates(
            &[Coordinate::xy(1.0, 2.0), Coordinate::xy(3.0, -4.0)],
            2,
            0,
        );
        let part2 = PackedSequence::from_coordinates(&[Coordinate::xy(-5.0, 0.5)], 2, 0);

        let bounds = parts_bounds(&[part1, part2]).unwrap();
        assert_eq!(bounds.min().x, -5.0);
        assert_eq!(bounds.min().y, -4.0);
        assert_eq!(bounds.max().x, 3.0);
        assert_eq!(bounds.max().y, 2.0);
    }

    #[test]
    fn no_coordinates_no_bounds() {
        let empty: Vec<PackedSequence> = Vec::new();
        assert!(parts_bounds(&empty).is_none());
        assert!(parts_bounds(&[PackedSequence::new(0, 2, 0)]).is_none());
    }
}
