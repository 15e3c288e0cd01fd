pub mod table;

pub use table::{load_table, read_table, save_table, write_table, CsvDirectory, MemorySink, TableSink};
