use crate::boundary::{read_boundaries, GeoBoundary};
use crate::columns::{self, BOUNDARY_STATE};
use crate::error::Result;
use crate::normalize::normalize_records;
use log::{debug, info};
use polars::prelude::*;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

/// Identity of a snapshot file on disk. Any change means a different snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
struct SnapshotId {
    len: u64,
    modified: Option<SystemTime>,
}

impl SnapshotId {
    fn of(path: &Path) -> Result<Self> {
        let metadata = std::fs::metadata(path)?;
        Ok(Self {
            len: metadata.len(),
            modified: metadata.modified().ok(),
        })
    }
}

/// Memoizes "snapshot path -> loaded value".
///
/// An entry is reused only while the file keeps the same length and
/// modification time; otherwise it is loaded again and replaced whole.
pub struct SnapshotCache<T> {
    entries: Mutex<HashMap<PathBuf, (SnapshotId, Arc<T>)>>,
}

impl<T> Default for SnapshotCache<T> {
    fn default() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }
}

impl<T> SnapshotCache<T> {
    pub fn get_or_load<F>(&self, path: &Path, load: F) -> Result<Arc<T>>
    where
        F: FnOnce(&Path) -> Result<T>,
    {
        let key = std::fs::canonicalize(path)?;
        let id = SnapshotId::of(&key)?;

        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        if let Some((cached_id, value)) = entries.get(&key) {
            if *cached_id == id {
                debug!("snapshot cache hit for {}", key.display());
                return Ok(Arc::clone(value));
            }
        }

        let value = Arc::new(load(&key)?);
        entries.insert(key, (id, Arc::clone(&value)));
        Ok(value)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Reads the filtered records and boundary snapshots, memoized per file.
#[derive(Default)]
pub struct DataLoader {
    records: SnapshotCache<DataFrame>,
    boundaries: SnapshotCache<Vec<GeoBoundary>>,
}

impl DataLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the Parquet records snapshot with numeric columns normalized.
    pub fn load_records(&self, path: &Path) -> Result<Arc<DataFrame>> {
        self.records.get_or_load(path, read_records)
    }

    /// Load the simplified boundary GeoJSON.
    pub fn load_boundaries(&self, path: &Path) -> Result<Arc<Vec<GeoBoundary>>> {
        self.boundaries.get_or_load(path, |p| {
            let boundaries = read_boundaries(p, BOUNDARY_STATE)?;
            info!("loaded {} boundaries from {}", boundaries.len(), p.display());
            Ok(boundaries)
        })
    }
}

pub fn read_records(path: &Path) -> Result<DataFrame> {
    let df = ParquetReader::new(std::fs::File::open(path)?).finish()?;
    columns::require_columns(&df)?;
    let df = normalize_records(df)?;
    info!("loaded {} records from {}", df.height(), path.display());
    Ok(df)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::tests::records;
    use std::cell::Cell;

    fn write_parquet(path: &Path, mut df: DataFrame) {
        let mut file = std::fs::File::create(path).unwrap();
        ParquetWriter::new(&mut file).finish(&mut df).unwrap();
    }

    #[test]
    fn test_cache_reuses_unchanged_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snapshot.txt");
        std::fs::write(&path, "one").unwrap();

        let cache: SnapshotCache<String> = SnapshotCache::default();
        let loads = Cell::new(0);
        let load = |p: &Path| -> Result<String> {
            loads.set(loads.get() + 1);
            Ok(std::fs::read_to_string(p)?)
        };

        let first = cache.get_or_load(&path, load).unwrap();
        let second = cache.get_or_load(&path, load).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(loads.get(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_cache_reloads_changed_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snapshot.txt");
        std::fs::write(&path, "one").unwrap();

        let cache: SnapshotCache<String> = SnapshotCache::default();
        let load = |p: &Path| -> Result<String> { Ok(std::fs::read_to_string(p)?) };

        let first = cache.get_or_load(&path, load).unwrap();
        std::fs::write(&path, "three").unwrap();
        let second = cache.get_or_load(&path, load).unwrap();
        assert_eq!(first.as_str(), "one");
        assert_eq!(second.as_str(), "three");
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_load_records_normalizes_numbers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dados_filtrado.parquet");
        write_parquet(
            &path,
            records(&[("1", "Acme", "SP", "Campinas", "10,5", "2,25")]),
        );

        let loader = DataLoader::new();
        let df = loader.load_records(&path).unwrap();
        assert_eq!(df.column(columns::AREA).unwrap().f64().unwrap().get(0), Some(10.5));
        assert_eq!(df.column(columns::PREMIUM).unwrap().f64().unwrap().get(0), Some(2.25));

        let again = loader.load_records(&path).unwrap();
        assert!(Arc::ptr_eq(&df, &again));
    }

    #[test]
    fn test_load_records_rejects_incomplete_schema() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("partial.parquet");
        write_parquet(&path, df!(columns::POLICY => &["1"]).unwrap());

        let err = DataLoader::new().load_records(&path).unwrap_err();
        assert!(matches!(err, crate::error::PipelineError::SchemaMismatch(_)));
    }
}
