mod captured_file;
mod file_registry;
mod path_validator;
mod schedule;

pub use captured_file::{CapturedFile, sort_by_capture_time};
pub use file_registry::{DirectoryRegistry, FileRegistry, JsonFileRegistry};
pub use path_validator::{ensure_directory_exists, validate_directory_exists};
pub use schedule::{ScheduleIterator, ScheduleTimezone};
