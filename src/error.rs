use thiserror::Error;

/// 应用程序错误类型
///
/// 按消息处理的终止语义划分：
/// - `MalformedMessage` / `Format` / `AdapterNotFound` / `MissingSource`：单条消息（或单次导出）终止
/// - `StoreWrite`：单道题目的答案写回失败时只记录，不中断消息
#[derive(Debug, Error)]
pub enum AppError {
    /// 队列消息信封无法解码
    #[error("消息信封无法解码: {0}")]
    MalformedMessage(String),

    /// 上传的文件不是可解析的表格
    #[error("表格解析失败: {0}")]
    Format(String),

    /// 注册表中没有匹配的适配器
    #[error("未找到适配器: provider={provider}, model={model}")]
    AdapterNotFound { provider: String, model: String },

    /// 适配器调用失败
    #[error("适配器调用失败 (模型: {model}): {message}")]
    Adapter { model: String, message: String },

    /// 适配器调用超时
    #[error("适配器调用超时 (模型: {model})，已超过 {secs} 秒")]
    AdapterTimeout { model: String, secs: u64 },

    /// 存储写入失败
    #[error("存储写入失败 ({entity}): {message}")]
    StoreWrite { entity: String, message: String },

    /// 存储读取失败
    #[error("存储读取失败 ({entity}): {message}")]
    StoreRead { entity: String, message: String },

    /// 对象存储读写失败
    #[error("对象存储错误 ({key}): {message}")]
    ObjectStorage { key: String, message: String },

    /// 导出时缺少源工作簿
    #[error("会话 {session_id} 没有源工作簿，无法导出")]
    MissingSource { session_id: String },

    /// 推送进度事件失败
    #[error("进度事件推送失败: {0}")]
    Notify(String),

    /// 配置错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),

    #[error("JSON解析失败: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO错误: {0}")]
    Io(#[from] std::io::Error),
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 配置文件读取失败
    #[error("读取配置文件失败 ({path}): {source}")]
    ReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// TOML 解析失败
    #[error("TOML解析失败 ({path}): {source}")]
    TomlParseFailed {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

// ========== 从常见错误类型转换 ==========

impl From<calamine::Error> for AppError {
    fn from(err: calamine::Error) -> Self {
        AppError::Format(err.to_string())
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::Notify(err.to_string())
    }
}

// ========== 便捷构造函数 ==========

impl AppError {
    /// 创建存储写入错误
    pub fn store_write(entity: impl Into<String>, message: impl ToString) -> Self {
        AppError::StoreWrite {
            entity: entity.into(),
            message: message.to_string(),
        }
    }

    /// 创建存储读取错误
    pub fn store_read(entity: impl Into<String>, message: impl ToString) -> Self {
        AppError::StoreRead {
            entity: entity.into(),
            message: message.to_string(),
        }
    }

    /// 创建对象存储错误
    pub fn object_storage(key: impl Into<String>, message: impl ToString) -> Self {
        AppError::ObjectStorage {
            key: key.into(),
            message: message.to_string(),
        }
    }

    /// 创建适配器调用错误
    pub fn adapter(model: impl Into<String>, message: impl ToString) -> Self {
        AppError::Adapter {
            model: model.into(),
            message: message.to_string(),
        }
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;
