#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod dataset;
pub mod ir;
pub mod layout;
pub mod layout_dump;

#[cfg(feature = "cli")]
pub use cli::run;
pub use config::{DimensionConfig, LayoutConfig, RoutingConfig, load_config};
pub use dataset::{NormalizedDataset, normalize_records, parse_dataset};
pub use ir::{Gender, Individual};
pub use layout::{Layout, LayoutError, compute_layout, compute_layout_with_cancel};
