use crate::config::types::{Config, GenerationConfig};
use crate::error::{GenerationError, GenerationResult};
use crate::tools::{DirectoryRegistry, FileRegistry, JsonFileRegistry};
use anyhow::{Context, Result};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        Self::from_json(&content)
            .with_context(|| format!("Failed to load config from {}", path.display()))
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(content).context("無法解析設定檔")?;
        config.validate()?;
        Ok(config)
    }

    /// 產生設定的基本檢查，任何錯誤都會在建立暫存目錄前中止執行
    pub fn validate(&self) -> GenerationResult<()> {
        validate_generations(&self.generations)
    }

    /// 依名稱挑選要執行的產生設定，`only` 為空時回傳全部
    pub fn select_generations(&self, only: &[String]) -> GenerationResult<Vec<GenerationConfig>> {
        if only.is_empty() {
            return Ok(self.generations.clone());
        }

        let selected: Vec<_> = self
            .generations
            .iter()
            .filter(|g| only.contains(&g.name))
            .cloned()
            .collect();

        if selected.is_empty() {
            return Err(GenerationError::config(format!(
                "找不到指定的產生設定: {}",
                only.join(", ")
            )));
        }

        Ok(selected)
    }

    #[must_use]
    pub fn build_registry(&self) -> Box<dyn FileRegistry> {
        match &self.registry_file {
            Some(path) => Box::new(JsonFileRegistry::new(path)),
            None => Box::new(DirectoryRegistry::new(&self.images_dir)),
        }
    }
}

pub fn validate_generations(generations: &[GenerationConfig]) -> GenerationResult<()> {
    if generations.is_empty() {
        return Err(GenerationError::config("沒有任何產生設定"));
    }

    let mut names = HashSet::new();
    for generation in generations {
        let name = generation.name.as_str();
        if name.trim().is_empty() {
            return Err(GenerationError::config("產生設定名稱不可為空"));
        }
        // 名稱直接作為輸出檔名
        if name.trim() != name {
            return Err(GenerationError::config(format!(
                "產生設定名稱前後不可有空白: '{name}'"
            )));
        }
        if name.contains(['/', '\\']) || name == "." || name == ".." {
            return Err(GenerationError::config(format!(
                "產生設定名稱不可包含路徑: {name}"
            )));
        }
        if !names.insert(name) {
            return Err(GenerationError::config(format!("產生設定名稱重複: {name}")));
        }
        if generation.batch_size == 0 {
            return Err(GenerationError::config(format!(
                "batch_size 必須大於 0: {name}"
            )));
        }
        if generation.interval_expression.trim().is_empty() {
            return Err(GenerationError::config(format!("排程表達式不可為空: {name}")));
        }
    }

    Ok(())
}
