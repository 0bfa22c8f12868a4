use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use dxfview_io::{
    FileInfo, FileLimits, ParseError, SourceInfo, format_file_size, should_warn_size_with,
    validate_with,
};
use tracing::{debug, warn};

/// 读入内存、通过校验的 DXF 文本。
#[derive(Debug, Clone)]
pub struct LoadedFile {
    pub text: String,
    pub source: SourceInfo,
}

/// 校验失败属于输入问题，与 I/O 故障分开返回。
#[derive(Debug)]
pub enum LoadOutcome {
    Loaded(LoadedFile),
    Rejected(ParseError),
}

/// 先按文件名与大小校验，再读取内容。非 UTF-8 字节按替换字符处理。
pub fn load(path: &Path, limits: &FileLimits) -> Result<LoadOutcome> {
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let size = fs::metadata(path)
        .with_context(|| format!("读取文件信息失败：{}", path.display()))?
        .len();

    if let Err(error) = validate_with(FileInfo::new(&name, size), limits) {
        return Ok(LoadOutcome::Rejected(error));
    }
    if should_warn_size_with(size, limits) {
        warn!(
            path = %path.display(),
            size = %format_file_size(size),
            "文件较大，解析可能需要较长时间"
        );
    }

    let bytes = fs::read(path).with_context(|| format!("读取文件失败：{}", path.display()))?;
    let text = String::from_utf8_lossy(&bytes).into_owned();
    debug!(path = %path.display(), size = %format_file_size(size), "已读取 DXF 文件");

    Ok(LoadOutcome::Loaded(LoadedFile {
        text,
        source: SourceInfo::new(name, size),
    }))
}
