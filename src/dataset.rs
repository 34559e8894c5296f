// 📂 Dataset Loader
// Temple records: CSV → typed records, loaded once per session and shared read-only

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

/// Raw GitHub URL of the published temple list
pub const DEFAULT_DATA_URL: &str =
    "https://raw.githubusercontent.com/hwa0mb0y/202408-AI/main/fulldata_koreantemple.csv";

// CSV column names (header-driven lookup, order does not matter)
pub const COL_NAME: &str = "사찰명";
pub const COL_KIND: &str = "구분";
pub const COL_PROVINCE: &str = "시도";
pub const COL_ADDRESS: &str = "상세주소";
pub const COL_LATITUDE: &str = "Latitude";
pub const COL_LONGITUDE: &str = "Longitude";
pub const COL_AFFILIATION: &str = "소속단체(종단)";

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} answered with HTTP {status}")]
    Http { url: String, status: u16 },

    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed CSV in {origin}: {source}")]
    Csv {
        origin: String,
        #[source]
        source: csv::Error,
    },

    #[error("column '{column}' is missing from {origin}")]
    MissingColumn { column: &'static str, origin: String },
}

// ============================================================================
// RECORDS
// ============================================================================

/// One row of the temple table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TempleRecord {
    pub name: String,
    pub kind: String,
    pub province: String,
    pub address: String,
    pub affiliation: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl TempleRecord {
    pub fn new(name: &str, affiliation: &str, latitude: Option<f64>, longitude: Option<f64>) -> Self {
        TempleRecord {
            name: name.to_string(),
            kind: String::new(),
            province: String::new(),
            address: String::new(),
            affiliation: affiliation.to_string(),
            latitude,
            longitude,
        }
    }

    /// Builder pattern: add province
    pub fn with_province(mut self, province: &str) -> Self {
        self.province = province.to_string();
        self
    }

    /// Builder pattern: add kind (전통사찰 등)
    pub fn with_kind(mut self, kind: &str) -> Self {
        self.kind = kind.to_string();
        self
    }

    /// Builder pattern: add detailed address
    pub fn with_address(mut self, address: &str) -> Self {
        self.address = address.to_string();
        self
    }

    /// Both coordinates, if the record can be placed on a map
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) => Some((lat, lon)),
            _ => None,
        }
    }

    pub fn is_mappable(&self) -> bool {
        self.coordinates().is_some()
    }
}

/// Lenient coordinate parsing: blanks, junk and NaN/inf become None
fn parse_coordinate(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

// ============================================================================
// DATA SOURCE
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DataSource {
    Url(String),
    File(PathBuf),
}

impl DataSource {
    /// URLs start with http:// or https://, everything else is a path
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if raw.starts_with("http://") || raw.starts_with("https://") {
            DataSource::Url(raw.to_string())
        } else {
            DataSource::File(PathBuf::from(raw))
        }
    }
}

impl Default for DataSource {
    fn default() -> Self {
        DataSource::Url(DEFAULT_DATA_URL.to_string())
    }
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataSource::Url(url) => write!(f, "{}", url),
            DataSource::File(path) => write!(f, "{}", path.display()),
        }
    }
}

// ============================================================================
// DATASET
// ============================================================================

/// Immutable table of records plus provenance
#[derive(Debug, Clone, Serialize)]
pub struct Dataset {
    pub records: Vec<TempleRecord>,
    pub source: String,
    pub loaded_at: DateTime<Utc>,
    /// SHA-256 of the raw CSV bytes (of the rows for `from_records`)
    pub fingerprint: String,
    /// Records without usable coordinates
    pub unmappable: usize,
}

impl Dataset {
    /// Build a dataset from records already in memory
    ///
    /// There are no raw bytes here, so the fingerprint is the SHA-256 of the
    /// rows themselves (every field, one line per record). It identifies the
    /// content but will not match the fingerprint of the CSV it came from.
    pub fn from_records(records: Vec<TempleRecord>, source: &str) -> Self {
        let mut hasher = Sha256::new();
        for r in &records {
            hasher.update(format!(
                "{}|{}|{}|{}|{}|{:?}|{:?}\n",
                r.name, r.kind, r.province, r.address, r.affiliation, r.latitude, r.longitude
            ));
        }
        let unmappable = records.iter().filter(|r| !r.is_mappable()).count();

        Dataset {
            records,
            source: source.to_string(),
            loaded_at: Utc::now(),
            fingerprint: format!("{:x}", hasher.finalize()),
            unmappable,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// First 12 hex digits of the fingerprint, for logs and page footers
    pub fn short_fingerprint(&self) -> &str {
        &self.fingerprint[..self.fingerprint.len().min(12)]
    }

    pub fn mappable(&self) -> impl Iterator<Item = &TempleRecord> {
        self.records.iter().filter(|r| r.is_mappable())
    }
}

/// Parse CSV bytes into a dataset
///
/// Columns are looked up by header name once, then every row is read into a
/// `TempleRecord`. A missing column or a malformed row fails the whole load.
pub fn parse_csv(bytes: &[u8], origin: &str) -> Result<Dataset, LoadError> {
    let body = bytes.strip_prefix("\u{feff}".as_bytes()).unwrap_or(bytes);

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(body);

    let headers = reader
        .headers()
        .map_err(|source| LoadError::Csv {
            origin: origin.to_string(),
            source,
        })?
        .clone();

    let column = |name: &'static str| -> Result<usize, LoadError> {
        headers
            .iter()
            .position(|h| h.trim() == name)
            .ok_or_else(|| LoadError::MissingColumn {
                column: name,
                origin: origin.to_string(),
            })
    };

    let name_idx = column(COL_NAME)?;
    let kind_idx = column(COL_KIND)?;
    let province_idx = column(COL_PROVINCE)?;
    let address_idx = column(COL_ADDRESS)?;
    let lat_idx = column(COL_LATITUDE)?;
    let lon_idx = column(COL_LONGITUDE)?;
    let aff_idx = column(COL_AFFILIATION)?;

    let mut records = Vec::new();
    for result in reader.records() {
        let row = result.map_err(|source| LoadError::Csv {
            origin: origin.to_string(),
            source,
        })?;
        let text = |idx: usize| row.get(idx).unwrap_or("").trim().to_string();

        records.push(TempleRecord {
            name: text(name_idx),
            kind: text(kind_idx),
            province: text(province_idx),
            address: text(address_idx),
            affiliation: text(aff_idx),
            latitude: row.get(lat_idx).and_then(parse_coordinate),
            longitude: row.get(lon_idx).and_then(parse_coordinate),
        });
    }

    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let unmappable = records.iter().filter(|r| !r.is_mappable()).count();

    if unmappable > 0 {
        tracing::warn!(
            origin,
            unmappable,
            "records without usable coordinates will be left off the map"
        );
    }

    Ok(Dataset {
        records,
        source: origin.to_string(),
        loaded_at: Utc::now(),
        fingerprint: format!("{:x}", hasher.finalize()),
        unmappable,
    })
}

/// Fetch or read the CSV and parse it. Blocks on network I/O.
pub fn load(source: &DataSource) -> Result<Dataset, LoadError> {
    let origin = source.to_string();

    let bytes = match source {
        DataSource::Url(url) => fetch(url)?,
        DataSource::File(path) => std::fs::read(path).map_err(|source| LoadError::Io {
            path: origin.clone(),
            source,
        })?,
    };

    let dataset = parse_csv(&bytes, &origin)?;
    tracing::info!(
        source = %origin,
        records = dataset.len(),
        fingerprint = dataset.short_fingerprint(),
        "dataset loaded"
    );
    Ok(dataset)
}

fn fetch(url: &str) -> Result<Vec<u8>, LoadError> {
    let request_error = |source| LoadError::Request {
        url: url.to_string(),
        source,
    };

    tracing::debug!(url, "fetching temple CSV");
    let response = reqwest::blocking::get(url).map_err(request_error)?;

    let status = response.status();
    if !status.is_success() {
        return Err(LoadError::Http {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }

    let body = response.bytes().map_err(request_error)?;
    Ok(body.to_vec())
}

// ============================================================================
// SESSION CACHE
// ============================================================================

/// Lazily loaded, shared, read-only dataset
///
/// Holds at most one dataset, keyed by its source. Asking for another source
/// drops the cached one and loads the new one. The slot lock is only held to
/// read or install a dataset; loads are serialized by `loading` so readers
/// never wait on the network.
#[derive(Default)]
pub struct DatasetCache {
    slot: RwLock<Option<(DataSource, Arc<Dataset>)>>,
    loading: Mutex<()>,
}

impl DatasetCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached dataset for `source`, loading it on first use
    pub fn get_or_load(&self, source: &DataSource) -> Result<Arc<Dataset>, LoadError> {
        self.get_or_load_with(source, load)
    }

    /// Same as `get_or_load` with a custom loader (used by tests)
    pub fn get_or_load_with<F>(&self, source: &DataSource, loader: F) -> Result<Arc<Dataset>, LoadError>
    where
        F: FnOnce(&DataSource) -> Result<Dataset, LoadError>,
    {
        if let Some(dataset) = self.cached(source) {
            return Ok(dataset);
        }

        let _loading = self.loading.lock();
        // Another caller may have loaded it while we waited
        if let Some(dataset) = self.cached(source) {
            return Ok(dataset);
        }

        {
            let mut slot = self.slot.write();
            if let Some((cached_source, _)) = slot.as_ref() {
                tracing::info!(old = %cached_source, new = %source, "data source changed, reloading");
            }
            *slot = None;
        }

        let dataset = Arc::new(loader(source)?);
        *self.slot.write() = Some((source.clone(), Arc::clone(&dataset)));
        Ok(dataset)
    }

    fn cached(&self, source: &DataSource) -> Option<Arc<Dataset>> {
        match self.slot.read().as_ref() {
            Some((cached_source, dataset)) if cached_source == source => Some(Arc::clone(dataset)),
            _ => None,
        }
    }

    /// Currently cached dataset, without loading
    pub fn current(&self) -> Option<Arc<Dataset>> {
        self.slot.read().as_ref().map(|(_, d)| Arc::clone(d))
    }

    pub fn invalidate(&self) {
        *self.slot.write() = None;
    }
}

// ============================================================================
// TESTS
// ============================================================================
