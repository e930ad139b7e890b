use std::fmt::{self, Display, Formatter};

use crate::codec::sequence::PackedSequence;
use crate::codec::CodecError;

/// Geometry family of a record type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShapeFamily {
    Point,
    MultiPoint,
    Arc,
    Polygon,
}

/// Dimensionality of a record type.
///
/// `ZMeasured` carries both elevation and measure values: elevation implies
/// measures in this format. `Measured` carries measure values only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dimensionality {
    Plain,
    Measured,
    ZMeasured,
}

/// One of the closed set of record types supported by the format,
/// distinguished by geometry family and dimensionality
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShapeKind {
    family: ShapeFamily,
    dims: Dimensionality,
}

impl ShapeKind {
    pub const POINT: ShapeKind = ShapeKind::new(ShapeFamily::Point, Dimensionality::Plain);
    pub const POINT_M: ShapeKind = ShapeKind::new(ShapeFamily::Point, Dimensionality::Measured);
    pub const POINT_Z: ShapeKind = ShapeKind::new(ShapeFamily::Point, Dimensionality::ZMeasured);
    pub const MULTI_POINT: ShapeKind = ShapeKind::new(ShapeFamily::MultiPoint, Dimensionality::Plain);
    pub const MULTI_POINT_M: ShapeKind =
        ShapeKind::new(ShapeFamily::MultiPoint, Dimensionality::Measured);
    pub const MULTI_POINT_Z: ShapeKind =
        ShapeKind::new(ShapeFamily::MultiPoint, Dimensionality::ZMeasured);
    pub const ARC: ShapeKind = ShapeKind::new(ShapeFamily::Arc, Dimensionality::Plain);
    pub const ARC_M: ShapeKind = ShapeKind::new(ShapeFamily::Arc, Dimensionality::Measured);
    pub const ARC_Z: ShapeKind = ShapeKind::new(ShapeFamily::Arc, Dimensionality::ZMeasured);
    pub const POLYGON: ShapeKind = ShapeKind::new(ShapeFamily::Polygon, Dimensionality::Plain);
    pub const POLYGON_M: ShapeKind = ShapeKind::new(ShapeFamily::Polygon, Dimensionality::Measured);
    pub const POLYGON_Z: ShapeKind =
        ShapeKind::new(ShapeFamily::Polygon, Dimensionality::ZMeasured);

    pub const fn new(family: ShapeFamily, dims: Dimensionality) -> Self {
        Self { family, dims }
    }

    pub fn family(&self) -> ShapeFamily {
        self.family
    }

    pub fn dims(&self) -> Dimensionality {
        self.dims
    }

    pub fn has_z(&self) -> bool {
        matches!(self.dims, Dimensionality::ZMeasured)
    }

    pub fn has_m(&self) -> bool {
        matches!(self.dims, Dimensionality::Measured | Dimensionality::ZMeasured)
    }

    /// Number of dimensions per coordinate, in `2..=4`
    pub fn dimensions(&self) -> usize {
        2 + usize::from(self.has_z()) + usize::from(self.has_m())
    }

    /// Number of measure dimensions per coordinate, `0` or `1`
    pub fn measures(&self) -> usize {
        usize::from(self.has_m())
    }

    /// The numeric code identifying this kind on disk
    pub fn code(&self) -> i32 {
        let base = match self.family {
            ShapeFamily::Point => 1,
            ShapeFamily::Arc => 3,
            ShapeFamily::Polygon => 5,
            ShapeFamily::MultiPoint => 8,
        };
        match self.dims {
            Dimensionality::Plain => base,
            Dimensionality::ZMeasured => base + 10,
            Dimensionality::Measured => base + 20,
        }
    }

    /// Resolves a numeric code from disk. Code `0` identifies a null record
    /// and yields `None`; codes outside the format fail.
    pub fn from_code(code: i32) -> Result<Option<ShapeKind>, CodecError> {
        let family = match code % 10 {
            0 if code == 0 => return Ok(None),
            1 => ShapeFamily::Point,
            3 => ShapeFamily::Arc,
            5 => ShapeFamily::Polygon,
            8 => ShapeFamily::MultiPoint,
            _ => return Err(CodecError::UnknownShapeCode(code)),
        };
        let dims = match code / 10 {
            0 => Dimensionality::Plain,
            1 => Dimensionality::ZMeasured,
            2 => Dimensionality::Measured,
            _ => return Err(CodecError::UnknownShapeCode(code)),
        };
        Ok(Some(ShapeKind::new(family, dims)))
    }
}

impl Display for ShapeKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let family = match self.family {
            ShapeFamily::Point => "point",
            ShapeFamily::MultiPoint => "multipoint",
            ShapeFamily::Arc => "arc",
            ShapeFamily::Polygon => "polygon",
        };
        let suffix = match self.dims {
            Dimensionality::Plain => "",
            Dimensionality::Measured => "-m",
            Dimensionality::ZMeasured => "-z",
        };
        write!(f, "{}{}", family, suffix)
    }
}

/// A single coordinate with up to four ordinates. Absent ordinates are `NaN`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinate {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub m: f64,
}

impl Coordinate {
    pub fn new(x: f64, y: f64, z: f64, m: f64) -> Self {
        Self { x, y, z, m }
    }

    pub fn xy(x: f64, y: f64) -> Self {
        Self {
            x,
            y,
            z: f64::NAN,
            m: f64::NAN,
        }
    }

    /// Compares two coordinates in X, Y and whichever of Z and M are present
    pub fn equals_in(&self, other: &Coordinate, has_z: bool, has_m: bool) -> bool {
        if self.x != other.x || self.y != other.y {
            return false;
        }
        if has_z && self.z != other.z {
            return false;
        }
        if has_m && self.m != other.m {
            return false;
        }
        true
    }
}

/// A decoded geometry record.
///
/// `MultiLine` and `Polygon` hold one materialized sequence per part; a
/// polygon part is a closed ring. Empty variants are the format's empty
/// geometry sentinels produced by null records.
#[derive(Debug, Clone, PartialEq)]
pub enum Geometry {
    Point(PackedSequence),
    MultiPoint(PackedSequence),
    MultiLine(Vec<PackedSequence>),
    Polygon(Vec<PackedSequence>),
}

impl Geometry {
    /// The empty geometry sentinel for the given kind
    pub fn empty(kind: ShapeKind) -> Geometry {
        match kind.family() {
            ShapeFamily::Point => {
                Geometry::Point(PackedSequence::new(0, kind.dimensions(), kind.measures()))
            }
            ShapeFamily::MultiPoint => {
                Geometry::MultiPoint(PackedSequence::new(0, kind.dimensions(), kind.measures()))
            }
            ShapeFamily::Arc => Geometry::MultiLine(Vec::new()),
            ShapeFamily::Polygon => Geometry::Polygon(Vec::new()),
        }
    }

    pub fn family(&self) -> ShapeFamily {
        match self {
            Geometry::Point(_) => ShapeFamily::Point,
            Geometry::MultiPoint(_) => ShapeFamily::MultiPoint,
            Geometry::MultiLine(_) => ShapeFamily::Arc,
            Geometry::Polygon(_) => ShapeFamily::Polygon,
        }
    }

    /// The coordinate sequences of this geometry: one per part for compound
    /// geometries, the single sequence for point and multi point geometries
    pub fn parts(&self) -> &[PackedSequence] {
        match self {
            Geometry::Point(seq) | Geometry::MultiPoint(seq) => std::slice::from_ref(seq),
            Geometry::MultiLine(parts) | Geometry::Polygon(parts) => parts,
        }
    }

    /// Number of part entries a record of this geometry carries
    pub fn num_parts(&self) -> usize {
        match self {
            Geometry::Point(_) | Geometry::MultiPoint(_) => 0,
            Geometry::MultiLine(parts) | Geometry::Polygon(parts) => parts.len(),
        }
    }

    /// Total number of points across all parts
    pub fn num_points(&self) -> usize {
        use crate::codec::sequence::CoordSequence;
        self.parts().iter().map(|part| part.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.num_points() == 0
    }
}

#[cfg(test)]
mod tests {
    use assertor::{assert_that, EqualityAssertion};

    use super::{Coordinate, Dimensionality, Geometry, ShapeFamily, ShapeKind};
    use crate::codec::CodecError;

    #[test]
    fn codes_round_trip() {
        for kind in [
            ShapeKind::POINT,
            ShapeKind::POINT_M,
            ShapeKind::POINT_Z,
            ShapeKind::MULTI_POINT,
            ShapeKind::MULTI_POINT_M,
            ShapeKind::MULTI_POINT_Z,
            ShapeKind::ARC,
            ShapeKind::ARC_M,
            ShapeKind::ARC_Z,
            ShapeKind::POLYGON,
            ShapeKind::POLYGON_M,
            ShapeKind::POLYGON_Z,
        ] {
            assert_eq!(ShapeKind::from_code(kind.code()).unwrap(), Some(kind));
        }
    }

    #[test]
    fn null_and_unknown_codes() {
        assert_eq!(ShapeKind::from_code(0).unwrap(), None);
        assert!(matches!(
            ShapeKind::from_code(7),
            Err(CodecError::UnknownShapeCode(7))
        ));
        assert!(matches!(
            ShapeKind::from_code(33),
            Err(CodecError::UnknownShapeCode(33))
        ));
    }

    #[test]
    fn elevation_implies_measures() {
        assert!(ShapeKind::ARC_Z.has_z());
        assert!(ShapeKind::ARC_Z.has_m());
        assert_that!(ShapeKind::ARC_Z.dimensions()).is_equal_to(4);

        assert!(!ShapeKind::ARC_M.has_z());
        assert!(ShapeKind::ARC_M.has_m());
        assert_that!(ShapeKind::ARC_M.dimensions()).is_equal_to(3);

        assert_that!(ShapeKind::ARC.dimensions()).is_equal_to(2);
    }

    #[test]
    fn coordinate_equality_by_present_dimensions() {
        let a = Coordinate::new(1.0, 2.0, 3.0, 4.0);
        let b = Coordinate::new(1.0, 2.0, 9.0, 4.0);
        assert!(a.equals_in(&b, false, true));
        assert!(!a.equals_in(&b, true, true));
        assert!(a.equals_in(&b, false, false));
    }

    #[test]
    fn empty_sentinels() {
        let empty = Geometry::empty(ShapeKind::new(
            ShapeFamily::Arc,
            Dimensionality::ZMeasured,
        ));
        assert!(empty.is_empty());
        assert_that!(empty.num_parts()).is_equal_to(0);
        assert_eq!(empty.family(), ShapeFamily::Arc);

        let empty = Geometry::empty(ShapeKind::POINT);
        assert!(empty.is_empty());
        assert_eq!(empty.family(), ShapeFamily::Point);
    }
}
