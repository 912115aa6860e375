use std::{
    io::{Read, Write},
    path::PathBuf,
    str::FromStr,
};

use tracing::{debug, info};

use crate::Dataset;

#[derive(Clone, Debug, PartialEq)]
pub struct File {
    path: PathBuf,
    file_type: FileType,
    gz: bool,
}

impl File {
    pub fn new(path: impl Into<PathBuf>, file_type: FileType, gz: bool) -> Self {
        Self {
            path: path.into(),
            file_type,
            gz,
        }
    }

    #[inline(always)]
    #[cfg_attr(coverage_nightly, coverage(off))]
    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    #[inline(always)]
    #[cfg_attr(coverage_nightly, coverage(off))]
    pub fn file_type(&self) -> FileType {
        self.file_type
    }

    #[inline(always)]
    #[cfg_attr(coverage_nightly, coverage(off))]
    pub fn gz(&self) -> bool {
        self.gz
    }

    pub fn read(&self) -> Result<Dataset, crate::Error> {
        let file = std::fs::File::open(&self.path)?;
        if self.gz {
            let decoder = flate2::read::GzDecoder::new(file);
            self.read_from_reader(decoder)
        } else {
            self.read_from_reader(file)
        }
    }

    pub fn read_from_reader(&self, reader: impl Read) -> Result<Dataset, crate::Error> {
        let ds = match self.file_type {
            FileType::Csv => Self::read_text_file(reader, Some(b','))?,
            FileType::Tsv => Self::read_text_file(reader, Some(b'\t'))?,
            FileType::Txt => Self::read_text_file(reader, None)?,
            FileType::Json => serde_json::from_reader(reader)?,
        };
        info!(
            nrows = ds.nrows(),
            ncols = ds.ncols(),
            "Read {}",
            self.path.display()
        );
        Ok(ds)
    }

    /// Reads a delimited text table whose first line holds the column names.
    /// `None` splits on runs of whitespace. `NA` and empty fields become `NaN`.
    #[doc(hidden)]
    pub fn read_text_file(mut reader: impl Read, sep: Option<u8>) -> Result<Dataset, crate::Error> {
        let mut file = vec![];
        reader.read_to_end(&mut file)?;
        let file = std::str::from_utf8(file.trim_ascii())
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        let split = |line: &str| -> Vec<String> {
            let line = line.trim_end_matches('\r');
            let fields: Vec<&str> = match sep {
                Some(sep) => line.split(sep as char).collect(),
                None => line.split_ascii_whitespace().collect(),
            };
            fields
                .into_iter()
                .map(|f| f.trim().trim_matches('"').to_string())
                .collect()
        };

        let mut lines = file.lines().filter(|l| !l.trim().is_empty());
        let header = match lines.next() {
            Some(header) => split(header),
            None => return Dataset::new(0, vec![], vec![]),
        };
        let ncols = header.len();

        let mut rows = vec![];
        for line in lines {
            let fields = split(line);
            if fields.len() != ncols {
                return Err(crate::Error::IncompleteFile);
            }
            for field in fields {
                if field == "NA" || field.is_empty() {
                    rows.push(f64::NAN);
                } else {
                    rows.push(field.parse()?);
                }
            }
        }
        let nrows = rows.len() / ncols.max(1);
        debug!(nrows, ncols, "Parsed text table");

        // row major to column major
        let mut data = Vec::with_capacity(rows.len());
        for j in 0..ncols {
            data.extend((0..nrows).map(|i| rows[i * ncols + j]));
        }
        Dataset::new(nrows, data, header)
    }

    pub fn write(&self, ds: &Dataset) -> Result<(), crate::Error> {
        let file = std::fs::File::create(&self.path)?;
        if self.gz {
            let mut encoder = flate2::write::GzEncoder::new(file, flate2::Compression::default());
            self.write_to_writer(&mut encoder, ds)?;
            encoder.finish()?;
            Ok(())
        } else {
            self.write_to_writer(file, ds)
        }
    }

    pub fn write_to_writer(&self, writer: impl Write, ds: &Dataset) -> Result<(), crate::Error> {
        match self.file_type {
            FileType::Csv => Self::write_text_file(writer, ds, b',')?,
            FileType::Tsv => Self::write_text_file(writer, ds, b'\t')?,
            FileType::Txt => Self::write_text_file(writer, ds, b' ')?,
            FileType::Json => serde_json::to_writer(writer, ds)?,
        }
        Ok(())
    }

    #[doc(hidden)]
    pub fn write_text_file(writer: impl Write, ds: &Dataset, sep: u8) -> Result<(), crate::Error> {
        let mut writer = std::io::BufWriter::with_capacity(128 * 1024, writer);
        let header = ds.colnames().join((sep as char).to_string().as_str());
        writer.write_all(header.as_bytes())?;
        let sep = [sep];
        writer.write_all(b"\n")?;
        let data = ds.data();
        for i in 0..ds.nrows() {
            for j in 0..ds.ncols() {
                let v = data[i + j * ds.nrows()];
                if v.is_nan() {
                    writer.write_all(b"NA")?;
                } else {
                    writer.write_all(v.to_string().as_bytes())?;
                }
                if j != ds.ncols() - 1 {
                    writer.write_all(&sep)?;
                }
            }
            writer.write_all(b"\n")?;
        }
        writer.flush()?;
        Ok(())
    }

    pub fn from_path(path: impl Into<PathBuf>) -> Result<Self, crate::Error> {
        let path = path.into();
        let extension = path
            .file_name()
            .ok_or(crate::Error::NoFileName)?
            .to_str()
            .ok_or(crate::Error::InvalidFileName)?
            .split('.')
            .filter(|x| !x.is_empty())
            .collect::<Vec<&str>>();
        if extension.len() < 2 {
            return Err(crate::Error::NoFileExtension);
        }
        let gz = extension[extension.len() - 1] == "gz";
        if gz && extension.len() < 3 {
            return Err(crate::Error::NoFileExtension);
        }
        let extension = extension[extension.len() - if gz { 2 } else { 1 }];
        let file_type = FileType::from_str(extension)?;
        Ok(Self {
            path,
            file_type,
            gz,
        })
    }
}

impl FromStr for File {
    type Err = crate::Error;

    #[cfg_attr(coverage_nightly, coverage(off))]
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_path(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    /// Comma-separated values, row major.
    /// Expects the first row to be the column names.
    Csv,
    /// Tab-separated values, row major.
    /// Expects the first row to be the column names.
    Tsv,
    /// Serialized Dataset type.
    Json,
    /// Whitespace-separated values, row major.
    /// Expects the first row to be the column names.
    Txt,
}

impl FromStr for FileType {
    type Err = crate::Error;

    #[cfg_attr(coverage_nightly, coverage(off))]
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "csv" => Self::Csv,
            "tsv" => Self::Tsv,
            "json" => Self::Json,
            "txt" => Self::Txt,
            _ => return Err(crate::Error::UnsupportedFileType(s.to_string())),
        })
    }
}
