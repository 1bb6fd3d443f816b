pub mod seed;
pub mod tables;
