// Korean Temple Map - Core Library
// Exposes all modules for use in CLI, TUI, web server, and tests

pub mod config;
pub mod dataset;
pub mod selector;
pub mod map;
pub mod summary;
pub mod chart;
pub mod page;

// Re-export commonly used types
pub use config::Config;
pub use dataset::{
    Dataset, DataSource, DatasetCache, LoadError, TempleRecord,
    load, parse_csv, DEFAULT_DATA_URL,
};
pub use selector::{affiliations, AffiliationOrder, Selection};
pub use map::{
    build_map, center_of, MapOptions, MapOutcome, MapView, Marker, MarkerIcon,
    MarkerStyle, OverlayGroup, EMPTY_SELECTION_WARNING,
};
pub use summary::{FrequencyTable, Summary};
pub use chart::{Bar, BarChart};
pub use page::{render_page, write_page};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
