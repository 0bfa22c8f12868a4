use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 对外暴露的错误代码，序列化为固定的大写字符串。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    InvalidType,
    FileTooLarge,
    EmptyFile,
    ParseError,
    WorkerError,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::InvalidType => "INVALID_TYPE",
            ErrorCode::FileTooLarge => "FILE_TOO_LARGE",
            ErrorCode::EmptyFile => "EMPTY_FILE",
            ErrorCode::ParseError => "PARSE_ERROR",
            ErrorCode::WorkerError => "WORKER_ERROR",
        }
    }

    pub fn default_message(self) -> &'static str {
        match self {
            ErrorCode::InvalidType => "文件类型无效，请选择 .dxf 文件",
            ErrorCode::FileTooLarge => "文件过大，超过允许的最大尺寸",
            ErrorCode::EmptyFile => "文件为空或不包含可识别的实体",
            ErrorCode::ParseError => "DXF 文件解析失败，文件可能已损坏",
            ErrorCode::WorkerError => "后台解析任务异常终止",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 解析/校验失败的描述。`line` 为 1 起始的行号，仅在能定位时给出。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(rename_all = "camelCase")]
#[error("[{code}] {message}")]
pub struct ParseError {
    pub code: ErrorCode,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
}

impl ParseError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            line: None,
        }
    }

    /// 使用错误代码自带的默认提示。
    pub fn from_code(code: ErrorCode) -> Self {
        Self::new(code, code.default_message())
    }

    pub fn with_line(mut self, line: usize) -> Self {
        self.line = Some(line);
        self
    }
}

/// 解析被调用方取消，不携带任何部分结果。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("解析已取消")]
pub struct Cancelled;

/// 解析管线内部使用的错误，在 `parse` 边界转换为 [`ParseError`]。
#[derive(Debug, Error)]
pub enum DxfError {
    #[error("{message}")]
    Invalid {
        message: String,
        line: Option<usize>,
    },
    #[error("{0}")]
    Empty(String),
    #[error(transparent)]
    Cancelled(#[from] Cancelled),
}

impl DxfError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid {
            message: message.into(),
            line: None,
        }
    }

    pub(crate) fn invalid_at(message: impl Into<String>, line: usize) -> Self {
        Self::Invalid {
            message: message.into(),
            line: Some(line),
        }
    }

    /// 取消不属于错误结果，原样向上传递。
    pub fn into_parse_error(self) -> Result<ParseError, Cancelled> {
        match self {
            DxfError::Invalid { message, line } => {
                let error = ParseError::new(ErrorCode::ParseError, message);
                Ok(match line {
                    Some(line) => error.with_line(line),
                    None => error,
                })
            }
            DxfError::Empty(message) => Ok(ParseError::new(ErrorCode::EmptyFile, message)),
            DxfError::Cancelled(cancelled) => Err(cancelled),
        }
    }
}
