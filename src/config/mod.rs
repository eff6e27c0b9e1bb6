use anyhow::{Context, Result};
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const SETTINGS_PATH: &str = "config/settings.toml";
const PLACEHOLDER_KEY: &str = "your-ocr-api-key";

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    pub ocr: OcrConfig,
    pub extraction: ExtractionConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OcrConfig {
    pub api_key: String,
    pub api_url: String,
    pub language: String,
    pub engine: u8,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExtractionConfig {
    pub use_ocr: bool,
    pub min_question_chars: usize,
    pub max_question_chars: usize,
    pub metadata_scan_chars: usize,
    pub preview_chars: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    pub database_path: String,
    pub upload_dir: String,
}

/// 解析后的 OCR 设置，凭据是否可用由 `ocr_enabled` 显式表示
#[derive(Debug, Clone)]
pub struct OcrSettings {
    pub ocr_enabled: bool,
    pub api_key: String,
    pub api_url: String,
    pub language: String,
    pub engine: u8,
    pub timeout_secs: u64,
}

impl From<&OcrConfig> for OcrSettings {
    fn from(config: &OcrConfig) -> Self {
        let key = config.api_key.trim();
        Self {
            ocr_enabled: !key.is_empty() && key != PLACEHOLDER_KEY,
            api_key: key.to_string(),
            api_url: config.api_url.clone(),
            language: config.language.clone(),
            engine: config.engine,
            timeout_secs: config.timeout_secs,
        }
    }
}

impl OcrSettings {
    /// 不带凭据的设置，只走本地文本层
    pub fn disabled() -> Self {
        Self::from(&OcrConfig {
            api_key: String::new(),
            ..AppConfig::default().ocr
        })
    }
}

impl AppConfig {
    /// 默认值 → config/settings.toml → 环境变量（EXAMBANK__OCR__API_KEY 等）
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new(SETTINGS_PATH))
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let defaults = Config::try_from(&Self::default()).context("序列化默认配置失败")?;

        let settings = Config::builder()
            .add_source(defaults)
            .add_source(File::from(path).format(FileFormat::Toml).required(false))
            .add_source(
                Environment::with_prefix("EXAMBANK")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .with_context(|| format!("读取配置失败: {}", path.display()))?;

        let mut config: AppConfig = settings.try_deserialize().context("解析配置失败")?;

        // 兼容旧部署使用的环境变量名
        if let Ok(key) = std::env::var("OCR_SPACE_API_KEY") {
            if !key.trim().is_empty() {
                config.ocr.api_key = key;
            }
        }

        Ok(config)
    }

    pub fn save(&self, path: &str) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn ocr_settings(&self) -> OcrSettings {
        OcrSettings::from(&self.ocr)
    }

    pub fn database_url(&self) -> String {
        format!("sqlite:{}", self.storage.database_path)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            ocr: OcrConfig {
                api_key: String::new(),
                api_url: "https://api.ocr.space/parse/image".to_string(),
                language: "eng".to_string(),
                engine: 2,
                timeout_secs: 60,
            },
            extraction: ExtractionConfig::default(),
            storage: StorageConfig {
                database_path: "./data/exambank.db".to_string(),
                upload_dir: "./data/uploads".to_string(),
            },
        }
    }
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            use_ocr: true,
            min_question_chars: 10,
            max_question_chars: 5000,
            metadata_scan_chars: 500,
            preview_chars: 1000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_or_placeholder_key_disables_ocr() {
        let mut ocr = AppConfig::default().ocr;
        assert!(!OcrSettings::from(&ocr).ocr_enabled);

        ocr.api_key = PLACEHOLDER_KEY.to_string();
        assert!(!OcrSettings::from(&ocr).ocr_enabled);

        ocr.api_key = "  K8123  ".to_string();
        let settings = OcrSettings::from(&ocr);
        assert!(settings.ocr_enabled);
        assert_eq!(settings.api_key, "K8123");
    }

    #[test]
    fn disabled_settings_keep_service_defaults() {
        let settings = OcrSettings::disabled();
        assert!(!settings.ocr_enabled);
        assert_eq!(settings.timeout_secs, 60);
        assert_eq!(settings.engine, 2);
    }

    #[test]
    fn settings_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        std::fs::write(
            &path,
            "[extraction]\nuse_ocr = false\nmin_question_chars = 10\nmax_question_chars = 2000\n\
             metadata_scan_chars = 500\npreview_chars = 1000\n",
        )
        .unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert!(!config.extraction.use_ocr);
        assert_eq!(config.extraction.max_question_chars, 2000);
        assert_eq!(config.storage.database_path, "./data/exambank.db");
    }

    #[test]
    fn missing_settings_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.extraction.metadata_scan_chars, 500);
        assert_eq!(config.ocr.api_url, "https://api.ocr.space/parse/image");
    }

    #[test]
    fn saved_config_is_valid_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        AppConfig::default().save(path.to_str().unwrap()).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("[ocr]"));
        assert!(content.contains("preview_chars = 1000"));
    }
}
