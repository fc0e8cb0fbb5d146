//! Platform services shared by the client and the terminal front end.
//!
//! - **setting**: Global settings management
//! - **logger**: Logging initialisation
//! - **utility**: Data directory helpers

pub mod logger;
pub mod setting;
pub mod utility;

pub use logger::{init_logger, level_from_int, level_to_string, CRITICAL, DEBUG, ERROR, INFO, WARNING};
pub use setting::{SettingValue, Settings, SETTINGS, SETTING_FILENAME};
pub use utility::{get_file_path, get_folder_path, BASE_DIR, DATA_DIR};
