pub mod batch;
pub mod grid;
pub mod statistics;
