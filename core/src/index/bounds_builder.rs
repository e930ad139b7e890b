use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use anyhow::{bail, Context, Result};
use bincode::{Decode, Encode};
use geo::{coord, Rect};

use crate::geom::ShapeFamily;
use crate::index::QuadTreeBuilder;
use crate::scan::RecordStreamReader;
use crate::util::bounds::ExtendRect;

/// Serialized spatial index contents: the aggregate bounds plus one entry
/// per non-null record, in record order
#[derive(Debug, Clone, PartialEq, Encode, Decode)]
pub struct BoundsIndex {
    /// min x, min y, max x, max y over all entries
    pub bounds: [f64; 4],
    pub entries: Vec<BoundsEntry>,
}

/// The bounding box of one record
#[derive(Debug, Clone, Copy, PartialEq, Encode, Decode)]
pub struct BoundsEntry {
    pub record: i32,
    /// min x, min y, max x, max y
    pub bounds: [f64; 4],
}

impl BoundsIndex {
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let (index, _) = bincode::decode_from_slice(bytes, bincode::config::standard())
            .context("unable to decode spatial index contents")?;
        Ok(index)
    }
}

/// The stock [`QuadTreeBuilder`]: one pass over the record stream,
/// harvesting each record's bounding box from its framing.
///
/// Multi-part and multi-point records carry their bounding box in the
/// record header, so nothing is decoded beyond the framing; point records
/// contribute their single coordinate. Null records are skipped.
pub struct RecordBoundsBuilder;

impl QuadTreeBuilder for RecordBoundsBuilder {
    fn build(&self, data_path: &Path) -> Result<Vec<u8>> {
        let file = File::open(data_path)
            .with_context(|| format!("unable to open {}", data_path.display()))?;
        let mut reader = RecordStreamReader::new(BufReader::new(file));

        let mut entries = Vec::new();
        let mut bounds: Option<Rect> = None;
        while let Some(record) = reader.next_record()? {
            let Some(kind) = record.kind else {
                continue;
            };
            let entry_bounds = match kind.family() {
                ShapeFamily::Point => {
                    let (x, y) = read_point_origin(&record.content)
                        .with_context(|| format!("record {} is truncated", record.number))?;
                    [x, y, x, y]
                }
                _ => read_framed_bounds(&record.content)
                    .with_context(|| format!("record {} is truncated", record.number))?,
            };

            let rect = Rect::new(
                coord! { x: entry_bounds[0], y: entry_bounds[1] },
                coord! { x: entry_bounds[2], y: entry_bounds[3] },
            );
            match bounds.as_mut() {
                Some(bounds) => bounds.extend_rect(&rect),
                None => bounds = Some(rect),
            }
            entries.push(BoundsEntry {
                record: record.number,
                bounds: entry_bounds,
            });
        }

        let bounds = bounds
            .map(|b| [b.min().x, b.min().y, b.max().x, b.max().y])
            .unwrap_or([0.0; 4]);
        let index = BoundsIndex { bounds, entries };
        let bytes = bincode::encode_to_vec(&index, bincode::config::standard())
            .context("unable to encode spatial index contents")?;
        Ok(bytes)
    }
}

fn read_point_origin(content: &[u8]) -> Result<(f64, f64)> {
    if content.len() < 16 {
        bail!("{} bytes, expected at least 16", content.len());
    }
    let x = f64::from_le_bytes(content[0..8].try_into().expect("8 byte slice"));
    let y = f64::from_le_bytes(content[8..16].try_into().expect("8 byte slice"));
    Ok((x, y))
}

fn read_framed_bounds(content: &[u8]) -> Result<[f64; 4]> {
    if content.len() < 32 {
        bail!("{} bytes, expected at least 32", content.len());
    }
    let mut bounds = [0.0; 4];
    for (slot, chunk) in bounds.iter_mut().zip(content[0..32].chunks_exact(8)) {
        *slot = f64::from_le_bytes(chunk.try_into().expect("8 byte slice"));
    }
    Ok(bounds)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use assertor::{assert_that, EqualityAssertion};
    use tempdir::TempDir;

    use super::{BoundsIndex, RecordBoundsBuilder};
    use crate::codec::sequence::PackedSequence;
    use crate::geom::{Coordinate, Geometry, ShapeKind};
    use crate::index::QuadTreeBuilder;
    use crate::record::RecordHandler;
    use crate::scan::RecordStreamWriter;

    #[test]
    fn harvests_record_bounds() {
        let dir = TempDir::new("quadshape_bounds").unwrap();
        let path = dir.path().join("lines.shp");

        let handler = RecordHandler::new(ShapeKind::ARC);
        let mut writer = RecordStreamWriter::new(Vec::new());
        writer
            .append(
                &handler,
                &Geometry::MultiLine(vec![PackedSequence::from_coordinates(
                    &[Coordinate::xy(0.0, 0.0), Coordinate::xy(4.0, 2.0)],
                    2,
                    0,
                )]),
            )
            .unwrap();
        writer.append_null().unwrap();
        writer
            .append(
                &handler,
                &Geometry::MultiLine(vec![PackedSequence::from_coordinates(
                    &[Coordinate::xy(-3.0, 5.0), Coordinate::xy(1.0, 6.0)],
                    2,
                    0,
                )]),
            )
            .unwrap();
        fs::write(&path, writer.finish().unwrap()).unwrap();

        let bytes = RecordBoundsBuilder.build(&path).unwrap();
        let index = BoundsIndex::decode(&bytes).unwrap();

        assert_that!(index.entries.len()).is_equal_to(2);
        assert_that!(index.entries[0].record).is_equal_to(1);
        assert_eq!(index.entries[0].bounds, [0.0, 0.0, 4.0, 2.0]);
        assert_that!(index.entries[1].record).is_equal_to(3);
        assert_eq!(index.entries[1].bounds, [-3.0, 5.0, 1.0, 6.0]);
        assert_eq!(index.bounds, [-3.0, 0.0, 4.0, 6.0]);
    }

    #[test]
    fn point_records_contribute_their_coordinate() {
        let dir = TempDir::new("quadshape_bounds").unwrap();
        let path = dir.path().join("points.shp");

        let handler = RecordHandler::new(ShapeKind::POINT);
        let mut writer = RecordStreamWriter::new(Vec::new());
        for (x, y) in [(1.0, 2.0), (-7.0, 3.0)] {
            writer
                .append(
                    &handler,
                    &Geometry::Point(PackedSequence::from_coordinates(
                        &[Coordinate::xy(x, y)],
                        2,
                        0,
                    )),
                )
                .unwrap();
        }
        fs::write(&path, writer.finish().unwrap()).unwrap();

        let index = BoundsIndex::decode(&RecordBoundsBuilder.build(&path).unwrap()).unwrap();
        assert_eq!(index.bounds, [-7.0, 2.0, 1.0, 3.0]);
        assert_eq!(index.entries[1].bounds, [-7.0, 3.0, -7.0, 3.0]);
    }

    #[test]
    fn empty_stream_yields_an_empty_index() {
        let dir = TempDir::new("quadshape_bounds").unwrap();
        let path = dir.path().join("empty.shp");
        fs::write(&path, b"").unwrap();

        let index = BoundsIndex::decode(&RecordBoundsBuilder.build(&path).unwrap()).unwrap();
        assert!(index.entries.is_empty());
        assert_eq!(index.bounds, [0.0; 4]);
    }
}
