pub mod data_logger;

pub use data_logger::{ChannelFn, DataLogger, TelemetrySink};
