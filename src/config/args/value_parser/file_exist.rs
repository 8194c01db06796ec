use std::path::PathBuf;

/// Accept only paths that name an existing regular file.
pub fn is_file_exist(file_path: &str) -> Result<String, String> {
    let file_path = PathBuf::from(file_path);

    if file_path.exists() && file_path.is_file() {
        Ok(file_path.to_string_lossy().to_string())
    } else {
        Err(format!("file not found: {}", file_path.display()))
    }
}
