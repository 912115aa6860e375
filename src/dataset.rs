use std::{collections::HashMap, path::PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{File, FileType};

/// A table of named numeric columns stored column-major. Missing values are
/// `NaN`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawDataset", into = "RawDataset")]
pub struct Dataset {
    nrows: usize,
    colnames: Vec<String>,
    data: Vec<f64>,
}

#[derive(Serialize, Deserialize)]
struct RawDataset {
    colnames: Vec<String>,
    columns: Vec<Vec<f64>>,
}

impl TryFrom<RawDataset> for Dataset {
    type Error = crate::Error;

    fn try_from(raw: RawDataset) -> Result<Self, Self::Error> {
        Dataset::from_columns(raw.colnames.into_iter().zip(raw.columns))
    }
}

impl From<Dataset> for RawDataset {
    fn from(ds: Dataset) -> Self {
        let columns = ds.data.chunks(ds.nrows.max(1)).map(|c| c.to_vec());
        RawDataset {
            columns: if ds.nrows == 0 {
                vec![Vec::new(); ds.colnames.len()]
            } else {
                columns.collect()
            },
            colnames: ds.colnames,
        }
    }
}

impl Dataset {
    /// Build a dataset from column-major data. `data.len()` must equal
    /// `nrows * colnames.len()`.
    pub fn new(nrows: usize, data: Vec<f64>, colnames: Vec<String>) -> Result<Self, crate::Error> {
        if data.len() != nrows * colnames.len() {
            return Err(crate::Error::UnequalColumnLengths);
        }
        for (i, name) in colnames.iter().enumerate() {
            if colnames[..i].contains(name) {
                return Err(crate::Error::DuplicateColumnName(name.clone()));
            }
        }
        Ok(Self {
            nrows,
            colnames,
            data,
        })
    }

    pub fn from_columns<S, C>(columns: impl IntoIterator<Item = (S, C)>) -> Result<Self, crate::Error>
    where
        S: Into<String>,
        C: AsRef<[f64]>,
    {
        let mut nrows = None;
        let mut colnames = vec![];
        let mut data = vec![];
        for (name, col) in columns {
            let col = col.as_ref();
            match nrows {
                None => nrows = Some(col.len()),
                Some(n) if n != col.len() => return Err(crate::Error::UnequalColumnLengths),
                Some(_) => {},
            }
            colnames.push(name.into());
            data.extend_from_slice(col);
        }
        Self::new(nrows.unwrap_or(0), data, colnames)
    }

    #[inline]
    pub fn nrows(&self) -> usize {
        self.nrows
    }

    #[inline]
    pub fn ncols(&self) -> usize {
        self.colnames.len()
    }

    pub fn colnames(&self) -> Vec<&str> {
        self.colnames.iter().map(|x| x.as_str()).collect()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.colnames.iter().any(|c| c == name)
    }

    pub fn column(&self, name: &str) -> Result<&[f64], crate::Error> {
        let i = self
            .colnames
            .iter()
            .position(|c| c == name)
            .ok_or_else(|| crate::Error::ColumnNameNotFound(name.to_string()))?;
        Ok(&self.data[i * self.nrows..(i + 1) * self.nrows])
    }

    pub(crate) fn data(&self) -> &[f64] {
        &self.data
    }
}

/// Supplies datasets by identifier.
pub trait DatasetProvider {
    fn load(&self, identifier: &str) -> Result<Dataset, crate::Error>;
}

impl DatasetProvider for HashMap<String, Dataset> {
    fn load(&self, identifier: &str) -> Result<Dataset, crate::Error> {
        self.get(identifier)
            .cloned()
            .ok_or_else(|| crate::Error::DatasetNotFound(identifier.to_string()))
    }
}

/// Loads `<root>/<identifier>.<ext>` for the first supported extension that
/// exists on disk.
#[derive(Clone, Debug)]
pub struct DataDir {
    root: PathBuf,
}

const EXTENSIONS: [(&str, FileType, bool); 7] = [
    ("csv", FileType::Csv, false),
    ("csv.gz", FileType::Csv, true),
    ("tsv", FileType::Tsv, false),
    ("tsv.gz", FileType::Tsv, true),
    ("txt", FileType::Txt, false),
    ("json", FileType::Json, false),
    ("json.gz", FileType::Json, true),
];

impl DataDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Uses `LMTEST_DATA_DIR`, falling back to the working directory.
    pub fn from_env() -> Self {
        Self::new(std::env::var("LMTEST_DATA_DIR").unwrap_or_else(|_| ".".to_string()))
    }

    pub fn root(&self) -> &PathBuf {
        &self.root
    }

    fn resolve(&self, identifier: &str) -> Option<File> {
        EXTENSIONS.iter().find_map(|(ext, file_type, gz)| {
            let path = self.root.join(format!("{}.{}", identifier, ext));
            debug!("Trying {}", path.display());
            path.is_file().then(|| File::new(path, *file_type, *gz))
        })
    }
}

impl Default for DataDir {
    fn default() -> Self {
        Self::from_env()
    }
}

impl DatasetProvider for DataDir {
    fn load(&self, identifier: &str) -> Result<Dataset, crate::Error> {
        let file = self
            .resolve(identifier)
            .ok_or_else(|| crate::Error::DatasetNotFound(identifier.to_string()))?;
        info!("Loading dataset {} from {}", identifier, file.path().display());
        file.read()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Dataset {
        Dataset::from_columns([("a", vec![1.0, 2.0, 3.0]), ("b", vec![4.0, 5.0, 6.0])]).unwrap()
    }

    #[test]
    fn test_column_lookup() {
        let ds = sample();
        assert_eq!(ds.nrows(), 3);
        assert_eq!(ds.ncols(), 2);
        assert_eq!(ds.colnames(), vec!["a", "b"]);
        assert_eq!(ds.column("b").unwrap(), &[4.0, 5.0, 6.0]);
        assert!(ds.has_column("a"));
        assert!(!ds.has_column("c"));
        assert!(matches!(
            ds.column("c"),
            Err(crate::Error::ColumnNameNotFound(c)) if c == "c"
        ));
    }

    #[test]
    fn test_unequal_columns() {
        let ds = Dataset::from_columns([("a", vec![1.0, 2.0]), ("b", vec![1.0])]);
        assert!(matches!(ds, Err(crate::Error::UnequalColumnLengths)));
    }

    #[test]
    fn test_duplicate_columns() {
        let ds = Dataset::from_columns([("a", vec![1.0]), ("a", vec![2.0])]);
        assert!(matches!(ds, Err(crate::Error::DuplicateColumnName(_))));
    }

    #[test]
    fn test_json_shape() {
        let ds = sample();
        let json = serde_json::to_string(&ds).unwrap();
        assert_eq!(
            json,
            r#"{"colnames":["a","b"],"columns":[[1.0,2.0,3.0],[4.0,5.0,6.0]]}"#
        );
        let back: Dataset = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ds);
    }

    #[test]
    fn test_in_memory_provider() {
        let mut provider = HashMap::new();
        provider.insert("sample".to_string(), sample());
        assert_eq!(provider.load("sample").unwrap(), sample());
        assert!(matches!(
            provider.load("other"),
            Err(crate::Error::DatasetNotFound(_))
        ));
    }

    #[test]
    fn test_data_dir() {
        let dir = std::env::temp_dir().join(format!("lmtest-data-dir-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("small.csv"), "a,b\n1,4\n2,5\n3,6\n").unwrap();
        let provider = DataDir::new(&dir);
        assert_eq!(provider.load("small").unwrap(), sample());
        assert!(matches!(
            provider.load("missing"),
            Err(crate::Error::DatasetNotFound(_))
        ));
        std::fs::remove_dir_all(dir).unwrap();
    }
}
