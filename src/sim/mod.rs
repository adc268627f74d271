pub mod config;
pub mod console;
pub mod top;

pub use config::{CacheLevelConfig, Config, MemConfig, SimConfig};
pub use top::{Sim, SimSummary};
