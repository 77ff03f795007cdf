//! IDX sample file ingestion: header parsing, batched loading and random-access reads.
//!
//! Image files carry `[2051][count][rows][cols]` followed by `count * rows * cols`
//! unsigned bytes; label files carry `[2049][count]` followed by one byte per
//! sample. Header fields are big-endian `u32`. Either file may be gzip-compressed.
use crate::error::{Error, Result};
use byteorder::{BigEndian, ReadBytesExt};
use flate2::read::GzDecoder;
use ndarray::{s, Array1, Array2, ArrayView1, ArrayViewMut1, Axis};
use std::fmt;
use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::Path;
use tracing::info;

pub const IMAGE_MAGIC: u32 = 2051;
pub const LABEL_MAGIC: u32 = 2049;
pub const IMAGE_HEADER_LEN: u64 = 16;
pub const LABEL_HEADER_LEN: u64 = 8;
pub const NUM_CLASSES: usize = 10;

const GZIP_SIGNATURE: [u8; 2] = [0x1f, 0x8b];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleKind {
    Images,
    Labels,
}

impl SampleKind {
    pub fn magic(self) -> u32 {
        match self {
            SampleKind::Images => IMAGE_MAGIC,
            SampleKind::Labels => LABEL_MAGIC,
        }
    }

    pub fn header_len(self) -> u64 {
        match self {
            SampleKind::Images => IMAGE_HEADER_LEN,
            SampleKind::Labels => LABEL_HEADER_LEN,
        }
    }

    fn from_magic(magic: u32) -> Option<Self> {
        match magic {
            IMAGE_MAGIC => Some(SampleKind::Images),
            LABEL_MAGIC => Some(SampleKind::Labels),
            _ => None,
        }
    }
}

impl fmt::Display for SampleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SampleKind::Images => write!(f, "image"),
            SampleKind::Labels => write!(f, "label"),
        }
    }
}

/// Parsed file header. Label files have no dimension fields and report `1 x 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub kind: SampleKind,
    pub count: usize,
    pub rows: usize,
    pub cols: usize,
}

impl Header {
    /// Bytes per sample on disk.
    pub fn record_len(&self) -> usize {
        self.rows * self.cols
    }

    /// Columns of one decoded batch row: pixels per image, or classes per one-hot label.
    pub fn feature_width(&self) -> usize {
        match self.kind {
            SampleKind::Images => self.record_len(),
            SampleKind::Labels => NUM_CLASSES,
        }
    }
}

/// Byte source over a plain or gzip-compressed sample file.
enum Source {
    Plain(BufReader<File>),
    Gzip(GzDecoder<BufReader<File>>),
}

impl Source {
    fn open(path: &Path) -> Result<Self> {
        let mut file = File::open(path).map_err(|e| Error::io(path, e))?;
        let mut signature = [0u8; 2];
        let sniffed = read_prefix(&mut file, &mut signature).map_err(|e| Error::io(path, e))?;
        file.seek(SeekFrom::Start(0))
            .map_err(|e| Error::io(path, e))?;
        let reader = BufReader::new(file);
        if sniffed == signature.len() && signature == GZIP_SIGNATURE {
            Ok(Source::Gzip(GzDecoder::new(reader)))
        } else {
            Ok(Source::Plain(reader))
        }
    }

    /// Move from decoded offset `from` to decoded offset `to` (`to >= from`).
    fn skip_to(&mut self, from: u64, to: u64) -> io::Result<()> {
        match self {
            Source::Plain(r) => r.seek(SeekFrom::Start(to)).map(|_| ()),
            Source::Gzip(r) => {
                let wanted = to - from;
                let skipped = io::copy(&mut r.by_ref().take(wanted), &mut io::sink())?;
                if skipped < wanted {
                    return Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "sample file ends before the requested record",
                    ));
                }
                Ok(())
            }
        }
    }
}

impl Source {
    /// Decoded length, when it is known without reading the stream.
    fn known_len(&self) -> io::Result<Option<u64>> {
        match self {
            Source::Plain(r) => r.get_ref().metadata().map(|m| Some(m.len())),
            Source::Gzip(_) => Ok(None),
        }
    }
}

impl Read for Source {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Source::Plain(r) => r.read(buf),
            Source::Gzip(r) => r.read(buf),
        }
    }
}

fn read_prefix(file: &mut File, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match file.read(&mut buf[filled..])? {
            0 => break,
            n => filled += n,
        }
    }
    Ok(filled)
}

fn unexpected_eof(msg: String) -> io::Error {
    io::Error::new(io::ErrorKind::UnexpectedEof, msg)
}

/// Fill `record` with exactly `len` bytes. The vector grows only as bytes arrive.
fn read_record_bytes(src: &mut impl Read, len: usize, record: &mut Vec<u8>) -> io::Result<()> {
    record.clear();
    src.by_ref().take(len as u64).read_to_end(record)?;
    if record.len() < len {
        return Err(unexpected_eof(format!(
            "sample file ends after {} of {len} record bytes",
            record.len()
        )));
    }
    Ok(())
}

/// Fail a plain file that is shorter than its header claims, before anything is sized from it.
fn check_declared_len(src: &Source, path: &Path, header: &Header) -> Result<()> {
    let Some(actual) = src.known_len().map_err(|e| Error::io(path, e))? else {
        return Ok(());
    };
    let declared = (header.count as u64)
        .checked_mul(header.record_len() as u64)
        .and_then(|body| body.checked_add(header.kind.header_len()));
    match declared {
        Some(declared) if declared <= actual => Ok(()),
        _ => Err(Error::io(
            path,
            unexpected_eof(format!(
                "header declares {} records of {} bytes but the file holds {actual} bytes",
                header.count,
                header.record_len()
            )),
        )),
    }
}

fn read_field(src: &mut impl Read, path: &Path) -> Result<usize> {
    let value = src
        .read_u32::<BigEndian>()
        .map_err(|e| Error::io(path, e))?;
    Ok(value as usize)
}

/// Parse the rest of a header once the magic number is known.
fn read_header_fields(src: &mut impl Read, path: &Path, kind: SampleKind) -> Result<Header> {
    let count = read_field(src, path)?;
    let (rows, cols) = match kind {
        SampleKind::Images => (read_field(src, path)?, read_field(src, path)?),
        SampleKind::Labels => (1, 1),
    };
    Ok(Header {
        kind,
        count,
        rows,
        cols,
    })
}

fn read_expected_header(src: &mut impl Read, path: &Path, kind: SampleKind) -> Result<Header> {
    let magic = src
        .read_u32::<BigEndian>()
        .map_err(|e| Error::io(path, e))?;
    if magic != kind.magic() {
        return Err(Error::format(
            path,
            format!(
                "magic number {magic} does not match the {kind} format ({})",
                kind.magic()
            ),
        ));
    }
    read_header_fields(src, path, kind)
}

/// Read just the header of a sample file, detecting its kind from the magic number.
pub fn read_header(path: impl AsRef<Path>) -> Result<Header> {
    let path = path.as_ref();
    let mut src = Source::open(path)?;
    let magic = src
        .read_u32::<BigEndian>()
        .map_err(|e| Error::io(path, e))?;
    let kind = SampleKind::from_magic(magic).ok_or_else(|| {
        Error::format(
            path,
            format!("unknown magic number {magic} (expected {IMAGE_MAGIC} or {LABEL_MAGIC})"),
        )
    })?;
    read_header_fields(&mut src, path, kind)
}

/// One-hot encode
pub fn one_hot(label: usize, num_classes: usize) -> Array1<f64> {
    let mut v = Array1::zeros(num_classes);
    if label < num_classes {
        v[label] = 1.0;
    }
    v
}

/// Decode one on-disk record into a batch row, overwriting every column.
fn decode_record(
    kind: SampleKind,
    record: &[u8],
    mut row: ArrayViewMut1<'_, f64>,
    path: &Path,
    index: usize,
) -> Result<()> {
    match kind {
        SampleKind::Images => {
            for (dst, &byte) in row.iter_mut().zip(record) {
                *dst = f64::from(byte) / 255.0;
            }
        }
        SampleKind::Labels => {
            let class = usize::from(record[0]);
            if class >= NUM_CLASSES {
                return Err(Error::format(
                    path,
                    format!("label {class} of sample {index} is outside 0..{NUM_CLASSES}"),
                ));
            }
            row.fill(0.0);
            row[class] = 1.0;
        }
    }
    Ok(())
}

/// A whole sample file decoded into row-major batches.
///
/// Every batch but the last holds exactly `batch_size` rows; the last holds the
/// remainder (or a full batch when the count divides evenly).
#[derive(Debug, Clone)]
pub struct Batches {
    header: Header,
    batch_size: usize,
    batches: Vec<Array2<f64>>,
}

impl Batches {
    /// Stream `path` into batches of `batch_size` rows.
    pub fn load(path: impl AsRef<Path>, kind: SampleKind, batch_size: usize) -> Result<Self> {
        let path = path.as_ref();
        if batch_size == 0 {
            return Err(Error::Config("batch size must be > 0".to_owned()));
        }
        let mut src = Source::open(path)?;
        let header = read_expected_header(&mut src, path, kind)?;
        info!(
            path = %path.display(),
            kind = %kind,
            count = header.count,
            rows = header.rows,
            cols = header.cols,
            "reading sample file"
        );

        check_declared_len(&src, path, &header)?;

        let record_len = header.record_len();
        let mut record = Vec::new();
        // Sized only once a whole record has been read.
        let mut buffer: Option<Array2<f64>> = None;
        let mut batches = Vec::new();
        let mut filled = 0;
        for i in 0..header.count {
            read_record_bytes(&mut src, record_len, &mut record)
                .map_err(|e| Error::io(path, e))?;
            let buf = buffer.get_or_insert_with(|| {
                Array2::zeros((batch_size.min(header.count), header.feature_width()))
            });
            decode_record(kind, &record, buf.row_mut(filled), path, i)?;
            filled += 1;
            if filled == batch_size || i + 1 == header.count {
                batches.push(buf.slice(s![..filled, ..]).to_owned());
                filled = 0;
            }
        }

        Ok(Self {
            header,
            batch_size,
            batches,
        })
    }

    /// Split an in-memory matrix (one sample per row) into batches.
    pub fn from_matrix(kind: SampleKind, data: &Array2<f64>, batch_size: usize) -> Result<Self> {
        if batch_size == 0 {
            return Err(Error::Config("batch size must be > 0".to_owned()));
        }
        let header = match kind {
            SampleKind::Images => Header {
                kind,
                count: data.nrows(),
                rows: 1,
                cols: data.ncols(),
            },
            SampleKind::Labels => {
                if data.ncols() != NUM_CLASSES {
                    return Err(Error::Shape(format!(
                        "label matrix has {} columns, expected {NUM_CLASSES}",
                        data.ncols()
                    )));
                }
                Header {
                    kind,
                    count: data.nrows(),
                    rows: 1,
                    cols: 1,
                }
            }
        };
        let batches = data
            .axis_chunks_iter(Axis(0), batch_size)
            .map(|chunk| chunk.to_owned())
            .collect();
        Ok(Self {
            header,
            batch_size,
            batches,
        })
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    /// Number of samples across all batches.
    pub fn len(&self) -> usize {
        self.header.count
    }

    pub fn is_empty(&self) -> bool {
        self.header.count == 0
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn num_batches(&self) -> usize {
        self.batches.len()
    }

    pub fn batch(&self, index: usize) -> Result<&Array2<f64>> {
        self.batches.get(index).ok_or(Error::Range {
            what: "batch",
            index,
            len: self.batches.len(),
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = &Array2<f64>> {
        self.batches.iter()
    }

    /// Row for global sample `index`: batch `index / batch_size`, row `index % batch_size`.
    pub fn sample(&self, index: usize) -> Result<ArrayView1<'_, f64>> {
        if index >= self.len() {
            return Err(Error::Range {
                what: "sample",
                index,
                len: self.len(),
            });
        }
        let batch = self.batch(index / self.batch_size)?;
        Ok(batch.row(index % self.batch_size))
    }
}

/// Paired image and label batches with identical layout.
#[derive(Debug, Clone)]
pub struct MnistDataset {
    images: Batches,
    labels: Batches,
}

impl MnistDataset {
    pub fn load(
        images: impl AsRef<Path>,
        labels: impl AsRef<Path>,
        batch_size: usize,
    ) -> Result<Self> {
        let images = Batches::load(images, SampleKind::Images, batch_size)?;
        let labels = Batches::load(labels, SampleKind::Labels, batch_size)?;
        Self::from_batches(images, labels)
    }

    pub fn from_batches(images: Batches, labels: Batches) -> Result<Self> {
        if images.len() != labels.len() {
            return Err(Error::Shape(format!(
                "{} images but {} labels",
                images.len(),
                labels.len()
            )));
        }
        if images.batch_size() != labels.batch_size() {
            return Err(Error::Shape(format!(
                "image batch size {} differs from label batch size {}",
                images.batch_size(),
                labels.batch_size()
            )));
        }
        Ok(Self { images, labels })
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn batch_size(&self) -> usize {
        self.images.batch_size()
    }

    pub fn num_batches(&self) -> usize {
        self.images.num_batches()
    }

    /// `(rows, cols)` of a single image.
    pub fn image_shape(&self) -> (usize, usize) {
        let h = self.images.header();
        (h.rows, h.cols)
    }

    pub fn images(&self) -> &Batches {
        &self.images
    }

    pub fn labels(&self) -> &Batches {
        &self.labels
    }

    /// Image and one-hot label matrices of batch `index`.
    pub fn batch(&self, index: usize) -> Result<(&Array2<f64>, &Array2<f64>)> {
        Ok((self.images.batch(index)?, self.labels.batch(index)?))
    }

    pub fn sample(&self, index: usize) -> Result<(ArrayView1<'_, f64>, ArrayView1<'_, f64>)> {
        Ok((self.images.sample(index)?, self.labels.sample(index)?))
    }
}

/// Seek to and read the raw bytes of record `index` without loading the whole file.
fn read_record(path: &Path, kind: SampleKind, index: usize) -> Result<(Header, Vec<u8>)> {
    let mut src = Source::open(path)?;
    let header = read_expected_header(&mut src, path, kind)?;
    check_declared_len(&src, path, &header)?;
    if index >= header.count {
        return Err(Error::Range {
            what: "sample",
            index,
            len: header.count,
        });
    }
    let record_len = header.record_len();
    let offset = kind.header_len() + (index * record_len) as u64;
    src.skip_to(kind.header_len(), offset)
        .map_err(|e| Error::io(path, e))?;
    let mut record = Vec::new();
    read_record_bytes(&mut src, record_len, &mut record).map_err(|e| Error::io(path, e))?;
    Ok((header, record))
}

/// Read image `index` as a `rows x cols` matrix of values in `[0, 1]`.
pub fn read_single_image(path: impl AsRef<Path>, index: usize) -> Result<Array2<f64>> {
    let path = path.as_ref();
    let (header, record) = read_record(path, SampleKind::Images, index)?;
    let pixels = record.iter().map(|&b| f64::from(b) / 255.0).collect();
    Array2::from_shape_vec((header.rows, header.cols), pixels)
        .map_err(|e| Error::Shape(e.to_string()))
}

/// Read label `index` as a one-hot vector of length [`NUM_CLASSES`].
pub fn read_single_label(path: impl AsRef<Path>, index: usize) -> Result<Array1<f64>> {
    let path = path.as_ref();
    let (_, record) = read_record(path, SampleKind::Labels, index)?;
    let mut label = Array1::zeros(NUM_CLASSES);
    decode_record(SampleKind::Labels, &record, label.view_mut(), path, index)?;
    Ok(label)
}
