use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};

use crate::error::Cancelled;

/// 解析进度的里程碑，百分比固定。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ParseStage {
    Read,
    Scan,
    ExtractLines,
    ExtractCurves,
    ExtractPolylines,
    LayerResolution,
    Done,
}

impl ParseStage {
    pub const fn percent(self) -> u8 {
        match self {
            ParseStage::Read => 5,
            ParseStage::Scan => 10,
            ParseStage::ExtractLines => 30,
            ParseStage::ExtractCurves => 50,
            ParseStage::ExtractPolylines => 70,
            ParseStage::LayerResolution => 85,
            ParseStage::Done => 100,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ParseStage::Read => "read",
            ParseStage::Scan => "scan",
            ParseStage::ExtractLines => "extract-lines",
            ParseStage::ExtractCurves => "extract-curves",
            ParseStage::ExtractPolylines => "extract-polylines",
            ParseStage::LayerResolution => "layer-resolution",
            ParseStage::Done => "done",
        }
    }
}

/// 进度接收方。闭包 `FnMut(ParseStage)` 自动实现该 trait。
pub trait ProgressSink {
    fn report(&mut self, stage: ParseStage);
}

impl<F> ProgressSink for F
where
    F: FnMut(ParseStage),
{
    fn report(&mut self, stage: ParseStage) {
        self(stage)
    }
}

/// 跨线程共享的取消标记，克隆后指向同一个标志位。
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// 解析过程中的进度与取消钩子。
pub(crate) struct Control<'p, 'c> {
    progress: &'p mut dyn ProgressSink,
    cancel: Option<&'c CancelToken>,
}

impl<'p, 'c> Control<'p, 'c> {
    pub(crate) fn new(progress: &'p mut dyn ProgressSink, cancel: Option<&'c CancelToken>) -> Self {
        Self { progress, cancel }
    }

    pub(crate) fn cancel_token(&self) -> Option<&'c CancelToken> {
        self.cancel
    }

    pub(crate) fn checkpoint(&self) -> Result<(), Cancelled> {
        match self.cancel {
            Some(token) if token.is_cancelled() => Err(Cancelled),
            _ => Ok(()),
        }
    }

    /// 先检查取消，再汇报阶段。
    pub(crate) fn stage(&mut self, stage: ParseStage) -> Result<(), Cancelled> {
        self.checkpoint()?;
        self.progress.report(stage);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stages_are_monotonic() {
        let stages = [
            ParseStage::Read,
            ParseStage::Scan,
            ParseStage::ExtractLines,
            ParseStage::ExtractCurves,
            ParseStage::ExtractPolylines,
            ParseStage::LayerResolution,
            ParseStage::Done,
        ];
        for pair in stages.windows(2) {
            assert!(pair[0].percent() < pair[1].percent());
        }
        assert_eq!(ParseStage::Done.percent(), 100);
        assert_eq!(
            serde_json::to_value(ParseStage::LayerResolution).expect("序列化阶段失败"),
            "layer-resolution"
        );
    }

    #[test]
    fn cancel_token_is_shared_between_clones() {
        let token = CancelToken::new();
        let clone = token.clone();
        let mut seen = Vec::new();
        let mut sink = |stage: ParseStage| seen.push(stage);
        {
            let mut control = Control::new(&mut sink, Some(&token));
            assert!(control.stage(ParseStage::Scan).is_ok());
            clone.cancel();
            assert_eq!(control.stage(ParseStage::Done), Err(Cancelled));
        }
        assert_eq!(seen, vec![ParseStage::Scan]);
    }
}
