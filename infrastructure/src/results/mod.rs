//! Results sinks

mod csv_sink;

pub use csv_sink::CsvResultsSink;
