use crate::error::{AppResult, ConfigError};
use serde::Deserialize;
use std::path::Path;
use std::str::FromStr;

/// 程序配置文件
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// 上传文件所在的存储桶
    pub files_bucket: String,
    /// 对象键前缀（上传文件统一放在该前缀下）
    pub object_key_prefix: String,
    /// 本地对象存储根目录
    pub object_root: String,
    /// 公司名称，作为回答上下文传给适配器
    pub company_name: String,
    /// 问题起始行（从0开始）
    pub query_start_row: u32,
    /// 问题所在列（从0开始）
    pub query_column: u32,
    /// 单次适配器调用的最长时间（秒）
    pub adapter_timeout_secs: u64,
    /// 是否推送逐 token 的流式事件
    pub stream_tokens: bool,
    /// 内存存储的分页大小
    pub store_page_size: usize,
    /// 进度事件推送地址，未配置时只写日志
    pub notifier_endpoint: Option<String>,
    /// 单次进度事件推送的最长时间（秒）
    pub notifier_timeout_secs: u64,
    /// 是否显示详细日志
    pub verbose_logging: bool,
    // --- LLM 配置 ---
    pub llm_api_key: String,
    pub llm_api_base_url: String,
    pub llm_model_name: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            files_bucket: "chatbot-files".to_string(),
            object_key_prefix: "public/".to_string(),
            object_root: "object_store".to_string(),
            company_name: "Example Corp".to_string(),
            query_start_row: 1,
            query_column: 0,
            adapter_timeout_secs: 300,
            stream_tokens: true,
            store_page_size: 100,
            notifier_endpoint: None,
            notifier_timeout_secs: 10,
            verbose_logging: false,
            llm_api_key: String::new(),
            llm_api_base_url: "https://api.openai.com/v1".to_string(),
            llm_model_name: "gpt-4o-mini".to_string(),
        }
    }
}

impl Config {
    /// 默认值 + 环境变量覆盖
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// 从 TOML 文件加载，缺省字段使用默认值
    pub fn from_toml_file(path: impl AsRef<Path>) -> AppResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFailed {
            path: path.display().to_string(),
            source,
        })?;
        let config = toml::from_str(&content).map_err(|source| ConfigError::TomlParseFailed {
            path: path.display().to_string(),
            source,
        })?;
        Ok(config)
    }

    /// 若设置了 `RFP_CONFIG_FILE` 则先读取文件，再应用环境变量覆盖
    pub fn load() -> AppResult<Self> {
        let base = match std::env::var("RFP_CONFIG_FILE") {
            Ok(path) => Self::from_toml_file(path)?,
            Err(_) => Self::default(),
        };
        Ok(base.with_env_overrides())
    }

    fn with_env_overrides(self) -> Self {
        let base = self;
        Self {
            files_bucket: env_string("CHATBOT_FILES_BUCKET_NAME", base.files_bucket),
            object_key_prefix: env_string("OBJECT_KEY_PREFIX", base.object_key_prefix),
            object_root: env_string("OBJECT_ROOT", base.object_root),
            company_name: env_string("COMPANY_NAME", base.company_name),
            query_start_row: env_parsed("QUERY_START_ROW", base.query_start_row),
            query_column: env_parsed("QUERY_COLUMN", base.query_column),
            adapter_timeout_secs: env_parsed("ADAPTER_TIMEOUT_SECS", base.adapter_timeout_secs),
            stream_tokens: env_parsed("STREAM_TOKENS", base.stream_tokens),
            store_page_size: env_parsed("STORE_PAGE_SIZE", base.store_page_size),
            notifier_endpoint: std::env::var("NOTIFIER_ENDPOINT").ok().or(base.notifier_endpoint),
            notifier_timeout_secs: env_parsed("NOTIFIER_TIMEOUT_SECS", base.notifier_timeout_secs),
            verbose_logging: env_parsed("VERBOSE_LOGGING", base.verbose_logging),
            llm_api_key: env_string("LLM_API_KEY", base.llm_api_key),
            llm_api_base_url: env_string("LLM_API_BASE_URL", base.llm_api_base_url),
            llm_model_name: env_string("LLM_MODEL_NAME", base.llm_model_name),
        }
    }

    /// 上传文件名对应的完整对象键
    pub fn object_key(&self, file_key: &str) -> String {
        format!("{}{}", self.object_key_prefix, file_key)
    }
}

fn env_string(key: &str, fallback: String) -> String {
    std::env::var(key).unwrap_or(fallback)
}

/// 环境变量缺失或无法解析时使用 `fallback`
fn env_parsed<T: FromStr>(key: &str, fallback: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(fallback)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toml_partial_override() {
        let dir = std::env::temp_dir().join(format!("rfp-config-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, "company_name = \"Acme\"\nquery_start_row = 3\n").unwrap();

        let config = Config::from_toml_file(&path).unwrap();
        assert_eq!(config.company_name, "Acme");
        assert_eq!(config.query_start_row, 3);
        // 未写的字段保持默认值
        assert_eq!(config.query_column, 0);
        assert_eq!(config.object_key_prefix, "public/");

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_missing_config_file() {
        let err = Config::from_toml_file("/definitely/not/here.toml").unwrap_err();
        assert!(err.to_string().contains("读取配置文件失败"));
    }

    #[test]
    fn test_env_parsed_falls_back_on_invalid_value() {
        std::env::set_var("RFP_TEST_PAGE_SIZE_VALID", "7");
        std::env::set_var("RFP_TEST_PAGE_SIZE_INVALID", "seven");
        assert_eq!(env_parsed("RFP_TEST_PAGE_SIZE_VALID", 100usize), 7);
        assert_eq!(env_parsed("RFP_TEST_PAGE_SIZE_INVALID", 100usize), 100);
        assert_eq!(env_parsed("RFP_TEST_PAGE_SIZE_UNSET", 100usize), 100);
    }

    #[test]
    fn test_object_key() {
        let config = Config::default();
        assert_eq!(config.object_key("rfp.xlsx"), "public/rfp.xlsx");
    }
}
