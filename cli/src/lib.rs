pub mod commands;
pub mod dataset_io;
pub mod pipeline;
