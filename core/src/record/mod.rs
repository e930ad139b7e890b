use itertools::{Itertools, MinMaxResult};

use crate::codec::sequence::{
    BufferSequence, CoordSequence, PackedSequence, PackedSequenceFactory, SequenceFactory,
};
use crate::codec::CodecError;
use crate::geom::{Geometry, ShapeFamily, ShapeKind};
use crate::util::bounds::parts_bounds;

/// Cooperative cancellation predicate polled while reading a record
pub type AbortCheck = Box<dyn Fn() -> bool + Send + Sync>;

/// Reads and writes the binary records of one shape kind.
///
/// One handler covers all families; the kind fixed at construction selects
/// the record framing (bounding box, part table, Z/M range headers) and the
/// payload dimensionality. Record contents exclude the leading numeric
/// shape kind code, which belongs to the surrounding record stream;
/// [`Self::record_length`] includes it.
pub struct RecordHandler {
    kind: ShapeKind,
    abort: AbortCheck,
    factory: Box<dyn SequenceFactory + Send + Sync>,
}

impl RecordHandler {
    pub fn new(kind: ShapeKind) -> Self {
        Self {
            kind,
            abort: Box::new(|| false),
            factory: Box::new(PackedSequenceFactory),
        }
    }

    pub fn kind(&self) -> ShapeKind {
        self.kind
    }

    /// Replaces the cancellation predicate. It is polled once per part
    /// while reading; a `true` result aborts the read with no partial
    /// geometry. It has no effect on writes.
    pub fn set_abort_check(&mut self, check: impl Fn() -> bool + Send + Sync + 'static) {
        self.abort = Box::new(check);
    }

    /// Replaces the factory used to materialize decoded coordinates
    pub fn set_sequence_factory(&mut self, factory: impl SequenceFactory + Send + Sync + 'static) {
        self.factory = Box::new(factory);
    }

    /// Length in bytes of the record the geometry encodes to, including the
    /// four byte shape kind code
    pub fn record_length(&self, geometry: &Geometry) -> Result<usize, CodecError> {
        if geometry.family() != self.kind.family() {
            return Err(CodecError::InvalidShapeKind(self.kind));
        }
        let num_points = geometry.num_points();
        let num_parts = geometry.num_parts();

        let base = match self.kind.family() {
            ShapeFamily::Point => 4 + 16,
            ShapeFamily::MultiPoint => 40 + 16 * num_points,
            ShapeFamily::Arc | ShapeFamily::Polygon => 44 + 4 * num_parts + 16 * num_points,
        };
        let per_extra_dimension = match self.kind.family() {
            ShapeFamily::Point => 8,
            _ => 16 + 8 * num_points,
        };
        let extra_dimensions = usize::from(self.kind.has_m()) + usize::from(self.kind.has_z());
        Ok(base + extra_dimensions * per_extra_dimension)
    }

    /// Decodes one record's contents.
    ///
    /// A `None` declared kind identifies a null record and yields the
    /// format's empty geometry sentinel. `Ok(None)` means the cancellation
    /// predicate aborted the read; no geometry was produced and no error
    /// occurred. With `flatten` set the decoded coordinates are projected
    /// to 2D.
    pub fn read(
        &self,
        content: &[u8],
        declared: Option<ShapeKind>,
        flatten: bool,
    ) -> Result<Option<Geometry>, CodecError> {
        if declared.is_none() {
            return Ok(Some(Geometry::empty(self.kind)));
        }
        match self.kind.family() {
            ShapeFamily::Point => self.read_point(content, flatten),
            ShapeFamily::MultiPoint => self.read_multi_point(content, flatten),
            ShapeFamily::Arc => self.read_multi_part(content, flatten, false),
            ShapeFamily::Polygon => self.read_multi_part(content, flatten, true),
        }
    }

    /// Encodes the geometry into record contents, appended to `out`
    pub fn write(&self, out: &mut Vec<u8>, geometry: &Geometry) -> Result<(), CodecError> {
        if geometry.family() != self.kind.family() {
            return Err(CodecError::InvalidShapeKind(self.kind));
        }
        match (self.kind.family(), geometry) {
            (ShapeFamily::Point, Geometry::Point(seq)) => self.write_point(out, seq),
            (ShapeFamily::MultiPoint, Geometry::MultiPoint(seq)) => {
                self.write_multi(out, std::slice::from_ref(seq), false)
            }
            (_, Geometry::MultiLine(parts)) | (_, Geometry::Polygon(parts)) => {
                self.write_multi(out, parts, true)
            }
            _ => Err(CodecError::InvalidShapeKind(self.kind)),
        }
    }

    fn read_point(&self, content: &[u8], flatten: bool) -> Result<Option<Geometry>, CodecError> {
        let mut reader = SliceReader::new(content);
        let x = reader.f64_le()?;
        let y = reader.f64_le()?;
        let z = if self.kind.has_z() {
            Some(reader.f64_le()?)
        } else {
            None
        };
        let m = if self.kind.has_m() {
            Some(reader.f64_le()?)
        } else {
            None
        };

        let (dimensions, measures) = if flatten {
            (2, 0)
        } else {
            (self.kind.dimensions(), self.kind.measures())
        };
        let mut seq = self.factory.create(1, dimensions, measures);
        seq.set_ordinate(0, 0, x)?;
        seq.set_ordinate(0, 1, y)?;
        if !flatten {
            if let Some(z) = z {
                seq.set_ordinate(0, 2, z)?;
            }
            if let Some(m) = m {
                let ordinate = if self.kind.has_z() { 3 } else { 2 };
                seq.set_ordinate(0, ordinate, m)?;
            }
        }
        Ok(Some(Geometry::Point(seq)))
    }

    fn read_multi_point(
        &self,
        content: &[u8],
        flatten: bool,
    ) -> Result<Option<Geometry>, CodecError> {
        let mut reader = SliceReader::new(content);
        // bounding box is not needed for reconstruction
        reader.skip(4 * 8)?;
        let num_points = reader.count()?;

        if (self.abort)() {
            return Ok(None);
        }
        if num_points == 0 {
            let seq = self
                .factory
                .create(0, self.kind.dimensions(), self.kind.measures());
            return Ok(Some(Geometry::MultiPoint(seq)));
        }

        let mut coords = BufferSequence::decode(reader.remainder(), num_points, self.kind)?;
        if flatten {
            coords = coords.flatten_to_2d();
        }
        let seq = coords.copy_range(0, num_points, self.factory.as_ref())?;
        Ok(Some(Geometry::MultiPoint(seq)))
    }

    fn read_multi_part(
        &self,
        content: &[u8],
        flatten: bool,
        close_rings: bool,
    ) -> Result<Option<Geometry>, CodecError> {
        let mut reader = SliceReader::new(content);
        // bounding box is not needed for reconstruction
        reader.skip(4 * 8)?;
        let num_parts = reader.count()?;
        let num_points = reader.count()?;
        let mut part_offsets = Vec::with_capacity(num_parts);
        for _ in 0..num_parts {
            part_offsets.push(reader.count()?);
        }

        let mut coords = BufferSequence::decode(reader.remainder(), num_points, self.kind)?;
        if flatten {
            coords = coords.flatten_to_2d();
        }

        let factory = self.factory.as_ref();
        let mut parts = Vec::with_capacity(num_parts);
        for part in 0..num_parts {
            if (self.abort)() {
                return Ok(None);
            }
            let start = part_offsets[part];
            let finish = if part == num_parts - 1 {
                num_points
            } else {
                part_offsets[part + 1]
            };

            let seq = if close_rings {
                coords.copy_range_closing_ring(start, finish, factory)?
            } else {
                let seq = coords.copy_range(start, finish, factory)?;
                if finish - start == 1 {
                    // a single-vertex part still has to become a valid line:
                    // duplicate the lone coordinate
                    let lone = seq.coordinate(0);
                    let mut pair = factory.create(2, seq.dimensions(), seq.measures());
                    pair.set_coordinate(0, &lone)?;
                    pair.set_coordinate(1, &lone)?;
                    pair
                } else {
                    seq
                }
            };
            parts.push(seq);
        }

        Ok(Some(if close_rings {
            Geometry::Polygon(parts)
        } else {
            Geometry::MultiLine(parts)
        }))
    }

    fn write_point(&self, out: &mut Vec<u8>, seq: &PackedSequence) -> Result<(), CodecError> {
        if seq.len() != 1 {
            return Err(CodecError::Malformed("point record holds one coordinate"));
        }
        let coordinate = seq.coordinate(0);
        push_f64(out, coordinate.x);
        push_f64(out, coordinate.y);
        if self.kind.has_z() {
            let z = coordinate.z;
            push_f64(out, if z.is_nan() { 0.0 } else { z });
        }
        if self.kind.has_m() {
            push_f64(out, coordinate.m);
        }
        Ok(())
    }

    fn write_multi(
        &self,
        out: &mut Vec<u8>,
        parts: &[PackedSequence],
        with_part_table: bool,
    ) -> Result<(), CodecError> {
        let num_points: usize = parts.iter().map(|part| part.len()).sum();

        let bounds = parts_bounds(parts);
        let (min, max) = bounds
            .map(|b| ((b.min().x, b.min().y), (b.max().x, b.max().y)))
            .unwrap_or(((0.0, 0.0), (0.0, 0.0)));
        push_f64(out, min.0);
        push_f64(out, min.1);
        push_f64(out, max.0);
        push_f64(out, max.1);

        if with_part_table {
            push_i32(out, parts.len() as i32);
        }
        push_i32(out, num_points as i32);
        if with_part_table {
            let mut offset = 0usize;
            for part in parts {
                push_i32(out, offset as i32);
                offset += part.len();
            }
        }

        for part in parts {
            for index in 0..part.len() {
                push_f64(out, part.x(index));
                push_f64(out, part.y(index));
            }
        }

        if self.kind.has_z() {
            let z_values: Vec<f64> = parts
                .iter()
                .flat_map(|part| (0..part.len()).map(|index| part.coordinate(index).z))
                .collect();
            // the range covers the finite values only; all-NaN collapses
            // to (0, 0)
            let (z_min, z_max) = match z_values
                .iter()
                .copied()
                .filter(|z| !z.is_nan())
                .minmax_by(|a, b| a.total_cmp(b))
            {
                MinMaxResult::NoElements => (0.0, 0.0),
                MinMaxResult::OneElement(z) => (z, z),
                MinMaxResult::MinMax(min, max) => (min, max),
            };
            push_f64(out, z_min);
            push_f64(out, z_max);
            for z in z_values {
                push_f64(out, if z.is_nan() { 0.0 } else { z });
            }
        }

        if self.kind.has_m() {
            let m_values: Vec<f64> = parts
                .iter()
                .flat_map(|part| (0..part.len()).map(|index| part.coordinate(index).m))
                .collect();
            let (m_min, m_max) = match m_values.iter().copied().minmax_by(|a, b| a.total_cmp(b)) {
                MinMaxResult::NoElements => return Err(CodecError::EmptyMeasureRange),
                MinMaxResult::OneElement(m) => (m, m),
                MinMaxResult::MinMax(min, max) => (min, max),
            };
            push_f64(out, m_min);
            push_f64(out, m_max);
            for m in m_values {
                push_f64(out, m);
            }
        }

        Ok(())
    }
}

fn push_f64(out: &mut Vec<u8>, value: f64) {
    out.extend_from_slice(&value.to_le_bytes());
}

fn push_i32(out: &mut Vec<u8>, value: i32) {
    out.extend_from_slice(&value.to_le_bytes());
}

/// Little-endian reader over a record content slice
struct SliceReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> SliceReader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], CodecError> {
        let remaining = self.bytes.len() - self.pos;
        if remaining < len {
            return Err(CodecError::Truncated {
                needed: len - remaining,
            });
        }
        let slice = &self.bytes[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    fn skip(&mut self, len: usize) -> Result<(), CodecError> {
        self.take(len).map(|_| ())
    }

    fn i32_le(&mut self) -> Result<i32, CodecError> {
        let mut raw = [0u8; 4];
        raw.copy_from_slice(self.take(4)?);
        Ok(i32::from_le_bytes(raw))
    }

    fn f64_le(&mut self) -> Result<f64, CodecError> {
        let mut raw = [0u8; 8];
        raw.copy_from_slice(self.take(8)?);
        Ok(f64::from_le_bytes(raw))
    }

    /// A count field; never negative in a well-formed record
    fn count(&mut self) -> Result<usize, CodecError> {
        usize::try_from(self.i32_le()?).map_err(|_| CodecError::Malformed("negative count"))
    }

    fn remainder(&self) -> &'a [u8] {
        &self.bytes[self.pos..]
    }
}
