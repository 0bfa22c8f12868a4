use dxfview_io::{
    CancelToken, Cancelled, DxfFacade, ErrorCode, ParseOptions, ParseResult, ParseStage,
    ProgressSink, SourceInfo,
};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::WorkerError;
use crate::message::{CadPayload, WorkerFailure, WorkerMessage};

/// 默认的后台解析阈值：超过 2 MiB 的文件不在调用方线程上解析。
pub const DEFAULT_WORKER_THRESHOLD: u64 = 2 * 1024 * 1024;

/// 进度消息最多七条，再加一条终止消息。
const CHANNEL_CAPACITY: usize = 16;

/// 一次解析需要的全部输入。
#[derive(Debug, Clone)]
pub struct ParseRequest {
    pub text: String,
    pub source: SourceInfo,
    pub options: ParseOptions,
}

impl ParseRequest {
    pub fn new(text: impl Into<String>, source: SourceInfo, options: ParseOptions) -> Self {
        Self {
            text: text.into(),
            source,
            options,
        }
    }
}

/// 在调用方线程解析还是交给阻塞线程池。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionPlan {
    Inline,
    Background,
}

impl ExecutionPlan {
    pub fn for_size(file_size: u64, threshold: u64) -> Self {
        if file_size > threshold {
            ExecutionPlan::Background
        } else {
            ExecutionPlan::Inline
        }
    }
}

/// 解析任务的最终结果。
#[derive(Debug, Clone, PartialEq)]
pub enum WorkerOutcome {
    Success(CadPayload),
    Failure(WorkerFailure),
    Cancelled,
}

impl WorkerOutcome {
    fn from_message(message: WorkerMessage) -> Option<Self> {
        match message {
            WorkerMessage::Progress { .. } => None,
            WorkerMessage::Success { payload } => Some(WorkerOutcome::Success(payload)),
            WorkerMessage::Error { payload } => Some(WorkerOutcome::Failure(payload)),
        }
    }
}

/// 运行中的后台解析。消息按 进度 → 终止 的顺序到达，取消后通道直接关闭。
#[derive(Debug)]
pub struct ParseJob {
    receiver: mpsc::Receiver<WorkerMessage>,
    cancel: CancelToken,
    supervisor: JoinHandle<()>,
}

impl ParseJob {
    pub fn spawn(request: ParseRequest) -> Self {
        Self::spawn_with_token(request, CancelToken::new())
    }

    pub fn spawn_with_token(request: ParseRequest, cancel: CancelToken) -> Self {
        let ParseRequest {
            text,
            source,
            options,
        } = request;
        Self::spawn_task(cancel, move |progress, token| {
            DxfFacade::new().parse_with(&text, &source, &options, progress, Some(token))
        })
    }

    /// 在阻塞线程池上执行 `task`，由一个异步监督任务转发结果。
    pub(crate) fn spawn_task<F>(cancel: CancelToken, task: F) -> Self
    where
        F: FnOnce(&mut dyn ProgressSink, &CancelToken) -> Result<ParseResult, Cancelled>
            + Send
            + 'static,
    {
        let (sender, receiver) = mpsc::channel(CHANNEL_CAPACITY);
        let token = cancel.clone();
        let progress_sender = sender.clone();

        let supervisor = tokio::spawn(async move {
            let blocking = tokio::task::spawn_blocking(move || {
                let mut sink = |stage: ParseStage| {
                    // 接收方已放弃时忽略发送失败
                    let _ = progress_sender.blocking_send(WorkerMessage::progress(stage));
                };
                task(&mut sink, &token)
            });

            let terminal = match blocking.await {
                Ok(Ok(result)) => Some(WorkerMessage::from_result(result)),
                Ok(Err(Cancelled)) => {
                    debug!("后台解析已取消，不发送结果");
                    None
                }
                Err(join_error) => {
                    let err = WorkerError::from(join_error);
                    error!(error = %err, "后台解析任务失败");
                    Some(WorkerMessage::Error {
                        payload: err.to_failure(),
                    })
                }
            };
            if let Some(message) = terminal {
                let _ = sender.send(message).await;
            }
        });

        Self {
            receiver,
            cancel,
            supervisor,
        }
    }

    /// 请求取消。已经发出的进度消息仍可读取，但不会再有结果消息。
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// 读取下一条消息；任务结束后返回 `None`。
    pub async fn recv(&mut self) -> Option<WorkerMessage> {
        self.receiver.recv().await
    }

    /// 等待任务结束，期间把进度交给 `on_progress`。
    pub async fn wait(mut self, mut on_progress: impl FnMut(ParseStage, u8)) -> WorkerOutcome {
        let mut outcome = None;
        while let Some(message) = self.receiver.recv().await {
            if let WorkerMessage::Progress { stage, percent } = message {
                on_progress(stage, percent);
                continue;
            }
            outcome = WorkerOutcome::from_message(message);
        }
        if let Err(join_error) = (&mut self.supervisor).await {
            let err = WorkerError::from(join_error);
            error!(error = %err, "后台解析监督任务失败");
            return WorkerOutcome::Failure(err.to_failure());
        }

        match outcome {
            Some(outcome) => outcome,
            None if self.cancel.is_cancelled() => WorkerOutcome::Cancelled,
            None => WorkerOutcome::Failure(WorkerError::Disconnected.to_failure()),
        }
    }
}

/// 放弃任务时请求取消，阻塞线程上的解析在下一个检查点退出。
/// 取消标记与调用方共享，丢弃后该标记保持已取消状态。
impl Drop for ParseJob {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// 按执行计划解析：小文件直接在当前线程完成，大文件交给后台任务。两条路径共用同一解析核心。
pub async fn run(
    request: ParseRequest,
    plan: ExecutionPlan,
    cancel: CancelToken,
    mut on_progress: impl FnMut(ParseStage, u8),
) -> WorkerOutcome {
    info!(
        file = request.source.file_name.as_str(),
        size = request.source.file_size,
        plan = ?plan,
        "开始解析"
    );
    match plan {
        ExecutionPlan::Inline => {
            let mut sink = |stage: ParseStage| on_progress(stage, stage.percent());
            let outcome = DxfFacade::new().parse_with(
                &request.text,
                &request.source,
                &request.options,
                &mut sink,
                Some(&cancel),
            );
            match outcome {
                Ok(result) => WorkerOutcome::from_message(WorkerMessage::from_result(result))
                    .unwrap_or_else(|| {
                        WorkerOutcome::Failure(WorkerFailure::from_code(ErrorCode::ParseError))
                    }),
                Err(Cancelled) => WorkerOutcome::Cancelled,
            }
        }
        ExecutionPlan::Background => {
            ParseJob::spawn_with_token(request, cancel)
                .wait(on_progress)
                .await
        }
    }
}
