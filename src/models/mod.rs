pub mod audit;
pub mod job;
pub mod message;
pub mod model;
pub mod result;
pub mod sample;
pub mod validation_data;
