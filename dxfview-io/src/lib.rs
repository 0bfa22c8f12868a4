pub mod error;
pub mod normalize;
pub mod parser;
pub mod progress;
pub mod scanner;
pub mod validator;

use std::time::Instant;

use dxfview_core::document::{CadData, Units};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

pub use error::{Cancelled, DxfError, ErrorCode, ParseError};
pub use normalize::{Normalized, normalize};
pub use parser::{DxfDocument, LayerEntry, RawEntity, parse_document};
pub use progress::{CancelToken, ParseStage, ProgressSink};
pub use validator::{
    FileInfo, FileLimits, ValidationResult, format_file_size, should_warn_size,
    should_warn_size_with, validate, validate_with,
};

use crate::normalize::normalize_with;
use crate::parser::DxfParser;
use crate::progress::Control;

/// 调用方提供的文件来源信息，直接写入结果元数据。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceInfo {
    pub file_name: String,
    pub file_size: u64,
}

impl SourceInfo {
    pub fn new(file_name: impl Into<String>, file_size: u64) -> Self {
        Self {
            file_name: file_name.into(),
            file_size,
        }
    }
}

/// 解析选项，全部在文档解析之后生效。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ParseOptions {
    /// 坐标保留的小数位数。
    pub precision: Option<u32>,
    /// 非空时只保留这些图层上的实体。
    pub layer_filter: Vec<String>,
    pub scale_to_unit: Option<Units>,
    pub simplify: bool,
    pub max_entities: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParseResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<CadData>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<ParseError>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    pub parse_time_ms: f64,
}

impl ParseResult {
    pub fn succeeded(data: CadData, warnings: Vec<String>, parse_time_ms: f64) -> Self {
        Self {
            success: true,
            data: Some(data),
            errors: Vec::new(),
            warnings,
            parse_time_ms,
        }
    }

    pub fn failed(error: ParseError, parse_time_ms: f64) -> Self {
        Self {
            success: false,
            data: None,
            errors: vec![error],
            warnings: Vec::new(),
            parse_time_ms,
        }
    }

    pub fn first_error(&self) -> Option<&ParseError> {
        self.errors.first()
    }

    pub fn into_result(self) -> Result<CadData, ParseError> {
        if self.success {
            if let Some(data) = self.data {
                return Ok(data);
            }
        }
        Err(self
            .errors
            .into_iter()
            .next()
            .unwrap_or_else(|| ParseError::from_code(ErrorCode::ParseError)))
    }
}

/// 无状态的解析入口。同步调用与后台任务共用同一实现。
#[derive(Debug, Clone, Copy, Default)]
pub struct DxfFacade;

impl DxfFacade {
    pub fn new() -> Self {
        Self
    }

    pub fn parse(&self, text: &str, source: &SourceInfo, options: &ParseOptions) -> ParseResult {
        let started = Instant::now();
        let mut sink = |_: ParseStage| {};
        self.parse_with(text, source, options, &mut sink, None)
            .unwrap_or_else(|cancelled| {
                ParseResult::failed(
                    ParseError::new(ErrorCode::ParseError, cancelled.to_string()),
                    elapsed_ms(started),
                )
            })
    }

    /// 带进度与取消的解析。取消时返回 `Err(Cancelled)`，不产生任何数据。
    pub fn parse_with(
        &self,
        text: &str,
        source: &SourceInfo,
        options: &ParseOptions,
        progress: &mut dyn ProgressSink,
        cancel: Option<&CancelToken>,
    ) -> Result<ParseResult, Cancelled> {
        let started = Instant::now();
        let mut control = Control::new(progress, cancel);
        let outcome = run(text, source, options, &mut control);
        let parse_time_ms = elapsed_ms(started);
        match outcome {
            Ok(mut normalized) => {
                control.stage(ParseStage::Done)?;
                normalized.data.metadata.parse_time_ms = parse_time_ms;
                info!(
                    file = source.file_name.as_str(),
                    entities = normalized.data.entities.len(),
                    layers = normalized.data.layers.len(),
                    warnings = normalized.warnings.len(),
                    parse_time_ms,
                    "DXF 解析完成"
                );
                Ok(ParseResult::succeeded(
                    normalized.data,
                    normalized.warnings,
                    parse_time_ms,
                ))
            }
            Err(err) => {
                let error = err.into_parse_error()?;
                warn!(
                    file = source.file_name.as_str(),
                    code = %error.code,
                    line = ?error.line,
                    message = error.message.as_str(),
                    "DXF 解析失败"
                );
                Ok(ParseResult::failed(error, parse_time_ms))
            }
        }
    }
}

/// 使用默认门面解析文本。
pub fn parse(text: &str, source: &SourceInfo, options: &ParseOptions) -> ParseResult {
    DxfFacade::new().parse(text, source, options)
}

fn run(
    text: &str,
    source: &SourceInfo,
    options: &ParseOptions,
    control: &mut Control<'_, '_>,
) -> Result<Normalized, DxfError> {
    control.stage(ParseStage::Read)?;
    control.stage(ParseStage::Scan)?;
    let document = DxfParser::new(text, control.cancel_token()).parse()?;
    normalize_with(document, source, options, control)
}

fn elapsed_ms(started: Instant) -> f64 {
    started.elapsed().as_secs_f64() * 1000.0
}
