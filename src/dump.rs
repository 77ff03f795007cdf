//! Plain-text tensor dumps for inspecting single samples.
//!
//! Line 1 holds the rank, the next `rank` lines the shape, and the remaining
//! lines the values in row-major order, one per line.
use crate::error::{Error, Result};
use ndarray::{ArrayBase, ArrayD, Data, Dimension, IxDyn};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

pub fn write_tensor_text<S, D>(tensor: &ArrayBase<S, D>, path: impl AsRef<Path>) -> Result<()>
where
    S: Data<Elem = f64>,
    D: Dimension,
{
    let path = path.as_ref();
    let file = File::create(path).map_err(|e| Error::io(path, e))?;
    let mut out = BufWriter::new(file);
    let write = |out: &mut BufWriter<File>| -> std::io::Result<()> {
        writeln!(out, "{}", tensor.ndim())?;
        for dim in tensor.shape() {
            writeln!(out, "{dim}")?;
        }
        for value in tensor.iter() {
            writeln!(out, "{value}")?;
        }
        out.flush()
    };
    write(&mut out).map_err(|e| Error::io(path, e))
}

pub fn read_tensor_text(path: impl AsRef<Path>) -> Result<ArrayD<f64>> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
    let mut lines = text.lines().map(str::trim);
    let mut next = |what: &'static str| {
        lines
            .next()
            .ok_or_else(|| Error::format(path, format!("missing {what} line")))
    };

    // Vectors grow line by line; nothing is sized from the header alone.
    let rank: usize = parse(path, next("rank")?)?;
    let mut shape = Vec::new();
    for _ in 0..rank {
        shape.push(parse::<usize>(path, next("shape")?)?);
    }
    let len = shape
        .iter()
        .try_fold(1usize, |acc, &dim| acc.checked_mul(dim))
        .ok_or_else(|| Error::format(path, format!("shape {shape:?} overflows")))?;
    let mut values = Vec::new();
    for _ in 0..len {
        values.push(parse::<f64>(path, next("value")?)?);
    }
    ArrayD::from_shape_vec(IxDyn(&shape), values).map_err(|e| Error::Shape(e.to_string()))
}

fn parse<T: std::str::FromStr>(path: &Path, line: &str) -> Result<T> {
    line.parse()
        .map_err(|_| Error::format(path, format!("cannot parse {line:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array1};
    use tempfile::TempDir;

    #[test]
    fn matrix_dump_has_rank_shape_then_values() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("t.txt");
        write_tensor_text(&array![[0.5, 1.0], [0.0, 0.25]], &path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "2\n2\n2\n0.5\n1\n0\n0.25\n");
    }

    #[test]
    fn vectors_read_back_with_their_shape() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("label.txt");
        let mut v = Array1::zeros(10);
        v[3] = 1.0;
        write_tensor_text(&v, &path).unwrap();

        let back = read_tensor_text(&path).unwrap();
        assert_eq!(back.shape(), &[10]);
        assert_eq!(back.iter().copied().collect::<Vec<_>>(), v.to_vec());
    }

    #[test]
    fn oversized_headers_are_format_errors() {
        let dir = TempDir::new().unwrap();
        let overflow = dir.path().join("overflow.txt");
        std::fs::write(&overflow, format!("2\n{}\n2\n0\n", usize::MAX)).unwrap();
        assert!(matches!(read_tensor_text(&overflow), Err(Error::Format { .. })));

        let huge_rank = dir.path().join("rank.txt");
        std::fs::write(&huge_rank, format!("{}\n1\n", usize::MAX)).unwrap();
        assert!(matches!(read_tensor_text(&huge_rank), Err(Error::Format { .. })));

        let huge_len = dir.path().join("len.txt");
        std::fs::write(&huge_len, "1\n4000000000000\n1\n").unwrap();
        assert!(matches!(read_tensor_text(&huge_len), Err(Error::Format { .. })));
    }

    #[test]
    fn short_files_are_format_errors() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("short.txt");
        std::fs::write(&path, "2\n2\n2\n1\n").unwrap();
        assert!(matches!(read_tensor_text(&path), Err(Error::Format { .. })));
    }
}
