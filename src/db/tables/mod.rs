//! Database table operations

mod download_table;

pub use download_table::DownloadTable;
