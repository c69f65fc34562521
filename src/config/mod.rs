pub mod load;
pub mod types;

pub use load::validate_generations;
pub use types::{
    Config, DEFAULT_BATCH_SIZE, DEFAULT_CONFIG_FILE, DEFAULT_TOLERANCE_SECONDS, GenerationConfig,
};
pub use crate::tools::ScheduleTimezone;
