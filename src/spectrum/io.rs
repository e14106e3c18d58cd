//! Payload codecs for [`Spectrum`]: plain ASCII columns and a compact
//! little-endian binary dump.
//!
//! ASCII files hold one pixel per line as whitespace-separated columns.
//! Blank lines and lines starting with `#` are skipped. A file with only
//! two columns (wavelength, value) reads with all errors set to zero.
//!
//! Binary files carry a fixed 40-byte header followed by the three `f64`
//! arrays back to back:
//!
//! ```text
//! offset  size  content
//! 0       8     magic  b"SPECBLOB"
//! 8       8     u64    pixel count n
//! 16      8     u64    byte offset of the wavelength array
//! 24      8     u64    byte offset of the value array
//! 32      8     u64    byte offset of the error array
//! 40      8n    f64[n] wavelengths, then values, then errors
//! ```
//!
//! All integers and floats are little-endian. Readers verify the magic and
//! that the offsets match n before allocating; a corrupt header surfaces as
//! [`SpectrumError::InvalidSpectrum`], never a panic.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use serde::{Deserialize, Serialize};

use crate::metadata::MetadataMap;
use crate::spectrum::{Spectrum, SpectrumError};

/// File format of a serialised spectrum payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayloadFormat {
    /// Header + three raw `f64` arrays, little-endian.
    Binary,
    /// Three whitespace-separated text columns, one pixel per line.
    Ascii,
}

impl std::fmt::Display for PayloadFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PayloadFormat::Binary => write!(f, "binary"),
            PayloadFormat::Ascii => write!(f, "ascii"),
        }
    }
}

impl std::str::FromStr for PayloadFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "binary" => Ok(PayloadFormat::Binary),
            "ascii" => Ok(PayloadFormat::Ascii),
            other => Err(format!("unknown payload format {other:?}")),
        }
    }
}

/// Which ASCII columns hold the three arrays (0-based).
///
/// Only consulted for [`PayloadFormat::Ascii`]; the binary layout is fixed.
/// `error: None` fills the errors with zeros regardless of how many columns
/// the file has.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnSelection {
    /// Column index of the wavelengths.
    pub wavelength: usize,
    /// Column index of the values.
    pub value: usize,
    /// Column index of the errors, if any.
    pub error: Option<usize>,
}

impl Default for ColumnSelection {
    fn default() -> Self {
        Self {
            wavelength: 0,
            value: 1,
            error: Some(2),
        }
    }
}

const BINARY_MAGIC: &[u8; 8] = b"SPECBLOB";
const BINARY_HEADER_LEN: u64 = 40;

impl Spectrum {
    /// Read a spectrum payload from `path` and attach `metadata` to it.
    ///
    /// `columns` selects which ASCII columns to read (defaults to the first
    /// three; a missing error column reads as zeros). Fails with
    /// [`SpectrumError::Io`] on filesystem errors and
    /// [`SpectrumError::InvalidSpectrum`] when the content does not form a
    /// valid spectrum.
    pub fn load_from_file(
        path: impl AsRef<Path>,
        metadata: MetadataMap,
        columns: Option<ColumnSelection>,
        format: PayloadFormat,
    ) -> Result<Self, SpectrumError> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let (wavelengths, values, value_errors) = match format {
            PayloadFormat::Ascii => read_ascii(BufReader::new(file), columns.unwrap_or_default())?,
            PayloadFormat::Binary => {
                let file_len = file.metadata()?.len();
                read_binary(BufReader::new(file), file_len)?
            }
        };
        Spectrum::new(wavelengths, values, value_errors, metadata)
    }

    /// Write this spectrum's three arrays to `path` in the given format.
    ///
    /// Refuses to replace an existing file unless `overwrite` is set. The
    /// file is flushed and synced before returning, so a successful return
    /// means the payload is durable.
    pub fn save_to_file(
        &self,
        path: impl AsRef<Path>,
        format: PayloadFormat,
        overwrite: bool,
    ) -> Result<(), SpectrumError> {
        let path = path.as_ref();
        if !overwrite && path.exists() {
            return Err(SpectrumError::FileExists(path.to_path_buf()));
        }
        let mut writer = BufWriter::new(File::create(path)?);
        match format {
            PayloadFormat::Ascii => self.write_ascii(&mut writer)?,
            PayloadFormat::Binary => self.write_binary(&mut writer)?,
        }
        let file = writer.into_inner().map_err(std::io::Error::from)?;
        file.sync_all()?;
        Ok(())
    }

    fn write_ascii(&self, writer: &mut impl Write) -> Result<(), SpectrumError> {
        for i in 0..self.len() {
            // f64 Display prints the shortest digits that parse back to the
            // same bits, so ASCII payloads round-trip exactly.
            writeln!(
                writer,
                "{} {} {}",
                self.wavelengths()[i],
                self.values()[i],
                self.value_errors()[i]
            )?;
        }
        Ok(())
    }

    fn write_binary(&self, writer: &mut impl Write) -> Result<(), SpectrumError> {
        let n = self.len() as u64;
        let wavelength_offset = BINARY_HEADER_LEN;
        let value_offset = wavelength_offset + 8 * n;
        let error_offset = value_offset + 8 * n;

        writer.write_all(BINARY_MAGIC)?;
        writer.write_u64::<LittleEndian>(n)?;
        writer.write_u64::<LittleEndian>(wavelength_offset)?;
        writer.write_u64::<LittleEndian>(value_offset)?;
        writer.write_u64::<LittleEndian>(error_offset)?;
        for &x in self.wavelengths() {
            writer.write_f64::<LittleEndian>(x)?;
        }
        for &x in self.values() {
            writer.write_f64::<LittleEndian>(x)?;
        }
        for &x in self.value_errors() {
            writer.write_f64::<LittleEndian>(x)?;
        }
        Ok(())
    }
}

type Arrays = (Vec<f64>, Vec<f64>, Vec<f64>);

fn read_ascii(reader: impl BufRead, columns: ColumnSelection) -> Result<Arrays, SpectrumError> {
    let mut wavelengths = Vec::new();
    let mut values = Vec::new();
    let mut value_errors = Vec::new();

    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let fields: Vec<&str> = trimmed.split_whitespace().collect();

        wavelengths.push(parse_field(&fields, columns.wavelength, line_no)?);
        values.push(parse_field(&fields, columns.value, line_no)?);
        value_errors.push(match columns.error {
            Some(idx) if idx < fields.len() => parse_field(&fields, idx, line_no)?,
            _ => 0.0,
        });
    }

    Ok((wavelengths, values, value_errors))
}

fn parse_field(fields: &[&str], index: usize, line_no: usize) -> Result<f64, SpectrumError> {
    let field = fields.get(index).ok_or_else(|| {
        SpectrumError::InvalidSpectrum(format!(
            "line {}: expected a column at index {index}, found {} columns",
            line_no + 1,
            fields.len()
        ))
    })?;
    field.parse::<f64>().map_err(|_| {
        SpectrumError::InvalidSpectrum(format!(
            "line {}: column {index} is not a number: {field:?}",
            line_no + 1
        ))
    })
}

fn read_binary(mut reader: impl Read, file_len: u64) -> Result<Arrays, SpectrumError> {
    let mut magic = [0u8; 8];
    reader.read_exact(&mut magic)?;
    if &magic != BINARY_MAGIC {
        return Err(SpectrumError::InvalidSpectrum(format!(
            "bad payload magic {magic:?}, not a binary spectrum"
        )));
    }

    let n = reader.read_u64::<LittleEndian>()?;
    let wavelength_offset = reader.read_u64::<LittleEndian>()?;
    let value_offset = reader.read_u64::<LittleEndian>()?;
    let error_offset = reader.read_u64::<LittleEndian>()?;

    // Validate the header against the file size before allocating, so a
    // corrupt pixel count cannot trigger a huge allocation.
    let arrays_len = n
        .checked_mul(24)
        .and_then(|b| b.checked_add(BINARY_HEADER_LEN));
    if arrays_len != Some(file_len)
        || wavelength_offset != BINARY_HEADER_LEN
        || value_offset != BINARY_HEADER_LEN + 8 * n
        || error_offset != BINARY_HEADER_LEN + 16 * n
    {
        return Err(SpectrumError::InvalidSpectrum(format!(
            "binary header inconsistent: n={n}, offsets ({wavelength_offset}, \
             {value_offset}, {error_offset}), file length {file_len}"
        )));
    }

    let n = n as usize;
    let mut wavelengths = vec![0.0; n];
    let mut values = vec![0.0; n];
    let mut value_errors = vec![0.0; n];
    reader.read_f64_into::<LittleEndian>(&mut wavelengths)?;
    reader.read_f64_into::<LittleEndian>(&mut values)?;
    reader.read_f64_into::<LittleEndian>(&mut value_errors)?;

    Ok((wavelengths, values, value_errors))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::MetadataValue;
    use std::io::Write as _;

    fn sample() -> Spectrum {
        let mut meta = MetadataMap::new();
        meta.insert("Starname".to_string(), MetadataValue::from("Sun"));
        Spectrum::new(
            vec![4000.0, 4000.5, 4001.25],
            vec![1.0, 0.875, 1.125],
            vec![0.01, 0.02, 0.015],
            meta,
        )
        .expect("valid spectrum")
    }

    #[test]
    fn ascii_round_trip_is_exact() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("sun.spec");
        let original = sample();

        original
            .save_to_file(&path, PayloadFormat::Ascii, false)
            .expect("save");
        let loaded = Spectrum::load_from_file(
            &path,
            original.metadata().clone(),
            None,
            PayloadFormat::Ascii,
        )
        .expect("load");

        assert_eq!(loaded, original);
    }

    #[test]
    fn binary_round_trip_is_exact() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("sun.spec");
        let original = sample();

        original
            .save_to_file(&path, PayloadFormat::Binary, false)
            .expect("save");
        let loaded = Spectrum::load_from_file(
            &path,
            original.metadata().clone(),
            None,
            PayloadFormat::Binary,
        )
        .expect("load");

        assert_eq!(loaded, original);
    }

    #[test]
    fn two_column_file_reads_zero_errors() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("two_col.txt");
        let mut file = File::create(&path).expect("create");
        writeln!(file, "# wavelength value").expect("write");
        writeln!(file, "5000.0 1.0").expect("write");
        writeln!(file).expect("write");
        writeln!(file, "5001.0 0.5").expect("write");

        let loaded =
            Spectrum::load_from_file(&path, MetadataMap::new(), None, PayloadFormat::Ascii)
                .expect("load");
        assert_eq!(loaded.wavelengths(), &[5000.0, 5001.0]);
        assert_eq!(loaded.value_errors(), &[0.0, 0.0]);
    }

    #[test]
    fn column_selection_reorders_fields() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("swapped.txt");
        let mut file = File::create(&path).expect("create");
        // value wavelength error
        writeln!(file, "1.0 5000.0 0.1").expect("write");
        writeln!(file, "0.5 5001.0 0.2").expect("write");

        let columns = ColumnSelection {
            wavelength: 1,
            value: 0,
            error: Some(2),
        };
        let loaded =
            Spectrum::load_from_file(&path, MetadataMap::new(), Some(columns), PayloadFormat::Ascii)
                .expect("load");
        assert_eq!(loaded.wavelengths(), &[5000.0, 5001.0]);
        assert_eq!(loaded.values(), &[1.0, 0.5]);
        assert_eq!(loaded.value_errors(), &[0.1, 0.2]);
    }

    #[test]
    fn garbage_text_is_invalid_not_io() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("garbage.txt");
        std::fs::write(&path, "5000.0 not_a_number 0.1\n").expect("write");

        let err = Spectrum::load_from_file(&path, MetadataMap::new(), None, PayloadFormat::Ascii)
            .unwrap_err();
        assert!(matches!(err, SpectrumError::InvalidSpectrum(_)));
    }

    #[test]
    fn binary_rejects_bad_magic() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("bad.spec");
        std::fs::write(&path, b"NOTSPECXrest of the file").expect("write");

        let err = Spectrum::load_from_file(&path, MetadataMap::new(), None, PayloadFormat::Binary)
            .unwrap_err();
        assert!(matches!(err, SpectrumError::InvalidSpectrum(_)));
    }

    #[test]
    fn binary_rejects_truncated_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("truncated.spec");
        let original = sample();
        original
            .save_to_file(&path, PayloadFormat::Binary, false)
            .expect("save");
        let bytes = std::fs::read(&path).expect("read");
        std::fs::write(&path, &bytes[..bytes.len() - 8]).expect("truncate");

        let err = Spectrum::load_from_file(&path, MetadataMap::new(), None, PayloadFormat::Binary)
            .unwrap_err();
        assert!(matches!(err, SpectrumError::InvalidSpectrum(_)));
    }

    #[test]
    fn save_refuses_existing_file_without_overwrite() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("sun.spec");
        let spectrum = sample();

        spectrum
            .save_to_file(&path, PayloadFormat::Ascii, false)
            .expect("first save");
        let err = spectrum
            .save_to_file(&path, PayloadFormat::Ascii, false)
            .unwrap_err();
        assert!(matches!(err, SpectrumError::FileExists(_)));

        spectrum
            .save_to_file(&path, PayloadFormat::Binary, true)
            .expect("overwrite");
    }
}
