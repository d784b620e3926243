pub mod job;
pub mod product;
pub mod status;
pub mod unit;
