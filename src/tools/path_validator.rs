use crate::error::{GenerationError, GenerationResult};
use std::path::Path;

pub fn validate_directory_exists(path: &Path) -> GenerationResult<()> {
    if !path.exists() {
        return Err(GenerationError::config(format!(
            "路徑不存在: {}",
            path.display()
        )));
    }
    if !path.is_dir() {
        return Err(GenerationError::config(format!(
            "路徑不是資料夾: {}",
            path.display()
        )));
    }
    Ok(())
}

pub fn ensure_directory_exists(path: &Path) -> GenerationResult<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)?;
    }
    validate_directory_exists(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_ensure_directory_creates_nested() {
        let temp_dir = TempDir::new().unwrap();
        let nested = temp_dir.path().join("videos/daily");

        ensure_directory_exists(&nested).unwrap();
        assert!(nested.is_dir());
    }

    #[test]
    fn test_validate_rejects_file() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("video.mp4");
        std::fs::write(&file, b"x").unwrap();

        assert!(matches!(
            validate_directory_exists(&file),
            Err(GenerationError::Config(_))
        ));
        assert!(ensure_directory_exists(&file).is_err());
    }
}
