pub mod loader;
pub mod price;
pub mod writer;

pub use loader::{load_csv, read_csv, select_symbols};
pub use price::{PricePoint, PriceSeries};
pub use writer::{write_equity_csv, write_grid_csv, write_grid_json};
