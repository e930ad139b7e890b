use super::CodecError;
use crate::geom::ShapeKind;

/// Room (in doubles) for the min/max range header that precedes each of the
/// Z and M value blocks inside a record's ordinate buffer. The header is
/// written by the owning record, not by the layout or any sequence view.
const RANGE_HEADER_DOUBLES: usize = 2;

/// Maps `(point count, hasZ, hasM)` to offsets within a flat double buffer
/// laid out as all `[x,y]` pairs, followed by all `[z]`, followed by all
/// `[m]`.
///
/// This is the single source of truth for the buffer arithmetic shared by
/// the read path ([`BufferSequence`](super::sequence::BufferSequence)) and
/// the write path ([`RecordHandler`](crate::record::RecordHandler)).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferLayout {
    size: usize,
    has_z: bool,
    has_m: bool,
    z_offset: Option<usize>,
    m_offset: Option<usize>,
}

impl BufferLayout {
    /// Creates a layout for `size` points with the given dimensions.
    ///
    /// Fails with [`CodecError::InvalidConfiguration`] if `has_m` is set
    /// without `has_z`: elevation implies measures in this format, never
    /// the other way around. Kind-driven construction via [`Self::for_kind`]
    /// also admits the measure-only layout that measured record kinds use.
    pub fn new(size: usize, has_z: bool, has_m: bool) -> Result<Self, CodecError> {
        if has_m && !has_z {
            return Err(CodecError::InvalidConfiguration);
        }
        Ok(Self::with_dims(size, has_z, has_m))
    }

    /// Creates the layout for a record of the given shape kind
    pub fn for_kind(size: usize, kind: ShapeKind) -> Self {
        Self::with_dims(size, kind.has_z(), kind.has_m())
    }

    pub(crate) fn with_dims(size: usize, has_z: bool, has_m: bool) -> Self {
        let z_offset = has_z.then(|| RANGE_HEADER_DOUBLES + 2 * size);
        let m_offset = has_m.then(|| match z_offset {
            Some(z_offset) => RANGE_HEADER_DOUBLES + z_offset + size,
            None => RANGE_HEADER_DOUBLES + 2 * size,
        });
        Self {
            size,
            has_z,
            has_m,
            z_offset,
            m_offset,
        }
    }

    /// Number of points the layout spans
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn has_z(&self) -> bool {
        self.has_z
    }

    pub fn has_m(&self) -> bool {
        self.has_m
    }

    /// Number of dimensions per coordinate, in `2..=4`
    pub fn dimensions(&self) -> usize {
        2 + usize::from(self.has_z) + usize::from(self.has_m)
    }

    /// Number of measure dimensions per coordinate, `0` or `1`
    pub fn measures(&self) -> usize {
        usize::from(self.has_m)
    }

    /// Offset in doubles of ordinate `ordinate` of point `index`.
    ///
    /// Returns `None` for an ordinate the layout does not carry (readers
    /// yield `NaN` for these). Ordinate 2 addresses the Z block when
    /// present and falls back to the M block for measure-only layouts,
    /// matching the aliasing of three-dimensional measured coordinates.
    pub fn ordinate_offset(
        &self,
        index: usize,
        ordinate: usize,
    ) -> Result<Option<usize>, CodecError> {
        match ordinate {
            0 => Ok(Some(2 * index)),
            1 => Ok(Some(1 + 2 * index)),
            2 => Ok(self.z_offset.or(self.m_offset).map(|offset| offset + index)),
            3 => Ok(self.m_offset.map(|offset| offset + index)),
            out_of_range => Err(CodecError::OrdinateOutOfRange(out_of_range)),
        }
    }

    /// Total length in doubles of the ordinate buffer the layout describes,
    /// range headers included
    pub fn doubles_len(&self) -> usize {
        let mut len = 2 * self.size;
        if self.has_z {
            len += RANGE_HEADER_DOUBLES + self.size;
        }
        if self.has_m {
            len += RANGE_HEADER_DOUBLES + self.size;
        }
        len
    }
}

#[cfg(test)]
mod tests {
    use assertor::{assert_that, EqualityAssertion};

    use super::BufferLayout;
    use crate::codec::CodecError;
    use crate::geom::ShapeKind;

    #[test]
    fn measures_require_elevation() {
        let err = BufferLayout::new(3, false, true).unwrap_err();
        assert!(matches!(err, CodecError::InvalidConfiguration));
    }

    #[test]
    fn plain_offsets() {
        let layout = BufferLayout::new(5, false, false).unwrap();
        assert_that!(layout.dimensions()).is_equal_to(2);
        assert_that!(layout.measures()).is_equal_to(0);
        assert_that!(layout.doubles_len()).is_equal_to(10);

        assert_eq!(layout.ordinate_offset(0, 0).unwrap(), Some(0));
        assert_eq!(layout.ordinate_offset(0, 1).unwrap(), Some(1));
        assert_eq!(layout.ordinate_offset(3, 0).unwrap(), Some(6));
        assert_eq!(layout.ordinate_offset(3, 1).unwrap(), Some(7));

        // no Z and no M blocks to address
        assert_eq!(layout.ordinate_offset(0, 2).unwrap(), None);
        assert_eq!(layout.ordinate_offset(0, 3).unwrap(), None);
    }

    #[test]
    fn elevation_and_measure_offsets() {
        let layout = BufferLayout::new(4, true, true).unwrap();
        assert_that!(layout.dimensions()).is_equal_to(4);
        assert_that!(layout.measures()).is_equal_to(1);

        // Z block starts after the XY pairs and its range header
        assert_eq!(layout.ordinate_offset(0, 2).unwrap(), Some(10));
        assert_eq!(layout.ordinate_offset(2, 2).unwrap(), Some(12));

        // M block starts after the Z block and its own range header
        assert_eq!(layout.ordinate_offset(0, 3).unwrap(), Some(16));
        assert_eq!(layout.ordinate_offset(3, 3).unwrap(), Some(19));

        assert_that!(layout.doubles_len()).is_equal_to(20);
    }

    #[test]
    fn measure_only_offsets_via_kind() {
        // the public constructor rejects this combination, but measured
        // record kinds produce it through the kind-driven path
        let layout = BufferLayout::for_kind(4, ShapeKind::ARC_M);
        assert_that!(layout.dimensions()).is_equal_to(3);
        assert_that!(layout.measures()).is_equal_to(1);

        // the M block sits where the Z block would have been
        assert_eq!(layout.ordinate_offset(0, 3).unwrap(), Some(10));
        // ordinate 2 aliases the measure for three-dimensional coordinates
        assert_eq!(layout.ordinate_offset(1, 2).unwrap(), Some(11));
        assert_that!(layout.doubles_len()).is_equal_to(14);
    }

    #[test]
    fn ordinate_out_of_range() {
        let layout = BufferLayout::new(2, true, true).unwrap();
        assert!(matches!(
            layout.ordinate_offset(0, 4),
            Err(CodecError::OrdinateOutOfRange(4))
        ));
    }
}
