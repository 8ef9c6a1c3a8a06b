pub mod csv_import;
pub mod database;
pub mod json;

pub use csv_import::import_csv;
pub use database::{AnalysisKey, DatabaseArchive};
pub use json::{load_experiment, save_experiment, JsonArchive};
