use dxfview_core::document::{CadData, CadEntity, CadMetadata, LayerInfo, Units};
use dxfview_core::geometry::BoundingBox;
use dxfview_io::{ErrorCode, ParseError, ParseResult, ParseStage};
use serde::{Deserialize, Serialize};

/// 后台任务发往调用方的消息。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum WorkerMessage {
    Progress { stage: ParseStage, percent: u8 },
    Success { payload: CadPayload },
    Error { payload: WorkerFailure },
}

impl WorkerMessage {
    pub fn progress(stage: ParseStage) -> Self {
        WorkerMessage::Progress {
            stage,
            percent: stage.percent(),
        }
    }

    /// 把一次完整解析的结果转换成终止消息。
    pub fn from_result(result: ParseResult) -> Self {
        if result.success {
            if let Some(data) = result.data {
                return WorkerMessage::Success {
                    payload: CadPayload::new(data, result.warnings),
                };
            }
        }
        let failure = result
            .errors
            .into_iter()
            .next()
            .map(WorkerFailure::from)
            .unwrap_or_else(|| WorkerFailure::from_code(ErrorCode::ParseError));
        WorkerMessage::Error { payload: failure }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, WorkerMessage::Progress { .. })
    }
}

/// 错误消息的负载，只保留错误码与说明。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerFailure {
    pub code: ErrorCode,
    pub message: String,
}

impl WorkerFailure {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn from_code(code: ErrorCode) -> Self {
        Self::new(code, code.default_message())
    }
}

impl From<ParseError> for WorkerFailure {
    fn from(error: ParseError) -> Self {
        Self::new(error.code, error.message)
    }
}

/// 跨序列化边界传输的解析数据。图层以 `[名称, 信息]` 有序对列出。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CadPayload {
    pub entities: Vec<CadEntity>,
    pub layers: Vec<(String, LayerInfo)>,
    pub bounds: BoundingBox,
    pub units: Units,
    pub metadata: CadMetadata,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl CadPayload {
    pub fn new(data: CadData, warnings: Vec<String>) -> Self {
        Self {
            entities: data.entities,
            layers: data
                .layers
                .into_iter()
                .map(|layer| (layer.name.clone(), layer))
                .collect(),
            bounds: data.bounds,
            units: data.units,
            metadata: data.metadata,
            warnings,
        }
    }

    pub fn into_data(self) -> CadData {
        CadData {
            entities: self.entities,
            layers: self.layers.into_iter().map(|(_, layer)| layer).collect(),
            bounds: self.bounds,
            units: self.units,
            metadata: self.metadata,
        }
    }
}

impl From<CadData> for CadPayload {
    fn from(data: CadData) -> Self {
        Self::new(data, Vec::new())
    }
}
