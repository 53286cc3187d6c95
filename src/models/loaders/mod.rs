pub mod toml_loader;

pub use toml_loader::{load_example_bank, load_example_bank_or_empty, parse_example_bank};
