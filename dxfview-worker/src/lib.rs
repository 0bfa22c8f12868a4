pub mod job;
pub mod message;

use dxfview_io::ErrorCode;
use thiserror::Error;
use tokio::task::JoinError;

pub use job::{DEFAULT_WORKER_THRESHOLD, ExecutionPlan, ParseJob, ParseRequest, WorkerOutcome, run};
pub use message::{CadPayload, WorkerFailure, WorkerMessage};

/// 后台执行通道本身的故障，与文件内容无关。
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("后台解析任务异常终止: {0}")]
    Join(#[from] JoinError),
    #[error("后台解析任务未返回结果就关闭了通道")]
    Disconnected,
}

impl WorkerError {
    /// 统一映射为 `WORKER_ERROR`。
    pub fn to_failure(&self) -> WorkerFailure {
        WorkerFailure::new(ErrorCode::WorkerError, self.to_string())
    }
}
