use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::Path;
use std::thread::spawn;

use anyhow::{bail, Context, Result};
use crossbeam_channel::bounded;
use geo::Rect;
use tracing::debug;

use crate::geom::{Geometry, ShapeKind};
use crate::record::RecordHandler;
use crate::util::bounds::ExtendRect;

/// One framed record pulled off a record stream.
///
/// `content` is the record's payload after the shape kind code.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    pub number: i32,
    pub kind: Option<ShapeKind>,
    pub content: Vec<u8>,
}

/// Reads framed records off a stream: a big-endian header carrying the
/// record number and the content length in 16-bit words, followed by the
/// record contents starting with the little-endian shape kind code
pub struct RecordStreamReader<R> {
    inner: R,
}

impl<R: Read> RecordStreamReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    /// The next record, or `None` at a clean end of stream
    pub fn next_record(&mut self) -> Result<Option<RawRecord>> {
        let mut header = [0u8; 8];
        match read_fully(&mut self.inner, &mut header)? {
            0 => return Ok(None),
            8 => {}
            n => bail!("record header truncated after {n} bytes"),
        }
        let number = i32::from_be_bytes(header[0..4].try_into().expect("4 byte slice"));
        let words = i32::from_be_bytes(header[4..8].try_into().expect("4 byte slice"));
        if words < 2 {
            bail!("record {number} declares {words} words, expected at least 2");
        }

        let mut content = vec![0u8; words as usize * 2];
        self.inner
            .read_exact(&mut content)
            .with_context(|| format!("record {number} contents truncated"))?;

        let code = i32::from_le_bytes(content[0..4].try_into().expect("4 byte slice"));
        let kind = ShapeKind::from_code(code)
            .with_context(|| format!("record {number} has an invalid shape kind"))?;
        content.drain(0..4);

        Ok(Some(RawRecord {
            number,
            kind,
            content,
        }))
    }
}

/// Reads until `buf` is full or the stream ends; returns the bytes read
fn read_fully(reader: &mut impl Read, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

/// Appends framed records to a stream, numbering them starting at 1
pub struct RecordStreamWriter<W> {
    inner: W,
    next_number: i32,
}

impl<W: Write> RecordStreamWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            next_number: 1,
        }
    }

    /// Writes one geometry record; returns its record number
    pub fn append(&mut self, handler: &RecordHandler, geometry: &Geometry) -> Result<i32> {
        let length = handler.record_length(geometry)?;
        let mut content = Vec::with_capacity(length);
        content.extend_from_slice(&handler.kind().code().to_le_bytes());
        handler.write(&mut content, geometry)?;
        if content.len() != length {
            bail!(
                "record length mismatch: computed {length}, encoded {}",
                content.len()
            );
        }
        self.append_raw(&content)
    }

    /// Writes one null record; returns its record number
    pub fn append_null(&mut self) -> Result<i32> {
        self.append_raw(&0i32.to_le_bytes())
    }

    fn append_raw(&mut self, content: &[u8]) -> Result<i32> {
        let number = self.next_number;
        self.inner.write_all(&number.to_be_bytes())?;
        self.inner.write_all(&((content.len() / 2) as i32).to_be_bytes())?;
        self.inner.write_all(content)?;
        self.next_number += 1;
        Ok(number)
    }

    pub fn finish(mut self) -> Result<W> {
        self.inner.flush()?;
        Ok(self.inner)
    }
}

/// The shape kind of the first non-null record in the stream, `None` if the
/// stream holds null records only
pub fn detect_kind(path: &Path) -> Result<Option<ShapeKind>> {
    let file = File::open(path).with_context(|| format!("unable to open {}", path.display()))?;
    let mut reader = RecordStreamReader::new(BufReader::new(file));
    while let Some(record) = reader.next_record()? {
        if let Some(kind) = record.kind {
            return Ok(Some(kind));
        }
    }
    Ok(None)
}

/// Aggregate statistics over all records of a stream
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanStats {
    pub records: usize,
    pub null_records: usize,
    pub parts: usize,
    pub points: usize,
    pub bounds: Option<Rect>,
}

struct RecordSummary {
    null: bool,
    parts: usize,
    points: usize,
    bounds: Option<Rect>,
}

/// Scans a record stream and folds per-record statistics.
///
/// Records are framed on one reader thread and decoded on a pool of worker
/// threads. Even though decoding a single record is cheap, wide files with
/// millions of points benefit from parallel decoding.
pub fn scan_stats(path: &Path, kind: ShapeKind) -> Result<ScanStats> {
    let file = File::open(path).with_context(|| format!("unable to open {}", path.display()))?;

    let (record_send, record_recv) = bounded::<RawRecord>(16);
    let reader_thread = spawn(move || {
        let mut reader = RecordStreamReader::new(BufReader::new(file));
        while let Some(record) = reader.next_record()? {
            record_send.send(record)?;
        }
        anyhow::Ok(())
    });

    let (summary_send, summary_recv) = bounded::<RecordSummary>(16);
    let worker_threads = (0..num_cpus::get())
        .map(|_| {
            let record_recv = record_recv.clone();
            let summary_send = summary_send.clone();
            spawn(move || {
                let handler = RecordHandler::new(kind);
                for record in record_recv {
                    let summary = match record.kind {
                        None => RecordSummary {
                            null: true,
                            parts: 0,
                            points: 0,
                            bounds: None,
                        },
                        Some(_) => {
                            // no cancellation predicate is installed, so a
                            // read never aborts
                            let Some(geometry) = handler.read(&record.content, record.kind, true)?
                            else {
                                bail!("record {} decode aborted", record.number);
                            };
                            RecordSummary {
                                null: false,
                                parts: geometry.num_parts(),
                                points: geometry.num_points(),
                                bounds: crate::util::bounds::parts_bounds(geometry.parts()),
                            }
                        }
                    };
                    summary_send.send(summary)?;
                }
                anyhow::Ok(())
            })
        })
        .collect::<Vec<_>>();
    drop(record_recv);
    drop(summary_send);

    let mut stats = ScanStats::default();
    for summary in summary_recv {
        stats.records += 1;
        if summary.null {
            stats.null_records += 1;
        }
        stats.parts += summary.parts;
        stats.points += summary.points;
        if let Some(record_bounds) = summary.bounds {
            match stats.bounds.as_mut() {
                Some(bounds) => bounds.extend_rect(&record_bounds),
                None => stats.bounds = Some(record_bounds),
            }
        }
    }

    match reader_thread.join() {
        Err(panic) => bail!("reader thread panicked: {panic:?}"),
        Ok(result) => result?,
    }
    for worker in worker_threads {
        match worker.join() {
            Err(panic) => bail!("decode worker panicked: {panic:?}"),
            Ok(result) => result?,
        }
    }

    debug!(
        records = stats.records,
        points = stats.points,
        "scanned record stream"
    );
    Ok(stats)
}
