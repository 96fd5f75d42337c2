pub mod browser;
pub mod csv_store;
pub mod hanzii;

pub use browser::{BrowserPool, PageHandle};
pub use csv_store::{CsvResultStore, read_key_column};
pub use hanzii::{HanziiExtractor, parse_word_page};
