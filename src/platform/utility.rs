//! Data directory and file path helpers.

use std::env;
use std::fs;
use std::path::PathBuf;
use std::sync::LazyLock;

/// Name of the data folder looked up in the working directory, then in home.
pub const DATA_FOLDER_NAME: &str = ".backtest";

/// Resolve the (base, data) directory pair
fn get_data_dir(folder_name: &str) -> (PathBuf, PathBuf) {
    let cwd = env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let data_path = cwd.join(folder_name);

    // A data folder in the working directory takes precedence
    if data_path.exists() {
        return (cwd, data_path);
    }

    let home_path = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
    let data_path = home_path.join(folder_name);

    if !data_path.exists() {
        let _ = fs::create_dir_all(&data_path);
    }

    (home_path, data_path)
}

/// Base directory the data folder lives in
pub static BASE_DIR: LazyLock<PathBuf> = LazyLock::new(|| {
    let (base_dir, _) = get_data_dir(DATA_FOLDER_NAME);
    base_dir
});

/// Data directory
pub static DATA_DIR: LazyLock<PathBuf> = LazyLock::new(|| {
    let (_, data_dir) = get_data_dir(DATA_FOLDER_NAME);
    data_dir
});

/// Get path for a file in the data directory
pub fn get_file_path(filename: &str) -> PathBuf {
    DATA_DIR.join(filename)
}

/// Get path for a folder in the data directory, creating it if needed
pub fn get_folder_path(folder_name: &str) -> PathBuf {
    let folder_path = DATA_DIR.join(folder_name);
    if !folder_path.exists() {
        let _ = fs::create_dir_all(&folder_path);
    }
    folder_path
}
