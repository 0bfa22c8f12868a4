//! 读取文件内容之前的快速检查：扩展名与大小。

use crate::error::{ErrorCode, ParseError};

pub const MAX_FILE_SIZE: u64 = 20 * 1024 * 1024;
pub const WARNING_FILE_SIZE: u64 = 5 * 1024 * 1024;

/// 待校验文件的名称与字节数。
#[derive(Debug, Clone, Copy)]
pub struct FileInfo<'a> {
    pub name: &'a str,
    pub size: u64,
}

impl<'a> FileInfo<'a> {
    pub fn new(name: &'a str, size: u64) -> Self {
        Self { name, size }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileLimits {
    pub max_size: u64,
    pub warning_size: u64,
}

impl Default for FileLimits {
    fn default() -> Self {
        Self {
            max_size: MAX_FILE_SIZE,
            warning_size: WARNING_FILE_SIZE,
        }
    }
}

pub type ValidationResult = Result<(), ParseError>;

pub fn validate(file: FileInfo<'_>) -> ValidationResult {
    validate_with(file, &FileLimits::default())
}

/// 按固定顺序检查：扩展名、大小上限、空文件。
pub fn validate_with(file: FileInfo<'_>, limits: &FileLimits) -> ValidationResult {
    if !file.name.to_lowercase().ends_with(".dxf") {
        return Err(ParseError::from_code(ErrorCode::InvalidType));
    }
    if file.size > limits.max_size {
        return Err(ParseError::new(
            ErrorCode::FileTooLarge,
            format!(
                "文件大小 {} 超过上限 {}",
                format_file_size(file.size),
                format_file_size(limits.max_size)
            ),
        ));
    }
    if file.size == 0 {
        return Err(ParseError::from_code(ErrorCode::EmptyFile));
    }
    Ok(())
}

pub fn should_warn_size(size: u64) -> bool {
    should_warn_size_with(size, &FileLimits::default())
}

pub fn should_warn_size_with(size: u64, limits: &FileLimits) -> bool {
    size > limits.warning_size
}

pub fn format_file_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = 1024 * 1024;
    if bytes < KB {
        format!("{bytes} B")
    } else if bytes < MB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn code_of(name: &str, size: u64) -> Option<ErrorCode> {
        validate(FileInfo::new(name, size)).err().map(|err| err.code)
    }

    #[test]
    fn size_boundaries() {
        assert_eq!(code_of("plan.dxf", MAX_FILE_SIZE), None);
        assert_eq!(code_of("plan.dxf", MAX_FILE_SIZE + 1), Some(ErrorCode::FileTooLarge));
        assert_eq!(code_of("plan.dxf", 0), Some(ErrorCode::EmptyFile));
        assert_eq!(code_of("plan.dxf", 1), None);
    }

    #[test]
    fn extension_is_checked_first_and_case_insensitive() {
        assert_eq!(code_of("plan.DXF", 10), None);
        assert_eq!(code_of("plan.dwg", 0), Some(ErrorCode::InvalidType));
        assert_eq!(code_of("plan.dwg", MAX_FILE_SIZE + 1), Some(ErrorCode::InvalidType));
        assert_eq!(code_of("dxf", 10), Some(ErrorCode::InvalidType));
    }

    #[test]
    fn extension_casing_variants() {
        for name in ["test.DXF", "test.Dxf", "TEST.dxf"] {
            assert_eq!(code_of(name, 1024), None, "{name} 应通过校验");
        }
        for name in ["test.pdf", "test"] {
            assert_eq!(code_of(name, 1024), Some(ErrorCode::InvalidType), "{name} 应被拒绝");
        }
    }

    #[test]
    fn warning_threshold() {
        assert!(!should_warn_size(WARNING_FILE_SIZE));
        assert!(should_warn_size(WARNING_FILE_SIZE + 1));
    }

    #[test]
    fn custom_limits() {
        let limits = FileLimits {
            max_size: 100,
            warning_size: 50,
        };
        let err = validate_with(FileInfo::new("a.dxf", 101), &limits).expect_err("应超出上限");
        assert_eq!(err.code, ErrorCode::FileTooLarge);
        assert!(should_warn_size_with(51, &limits));
    }

    #[test]
    fn human_readable_sizes() {
        assert_eq!(format_file_size(512), "512 B");
        assert_eq!(format_file_size(1536), "1.5 KB");
        assert_eq!(format_file_size(5 * 1024 * 1024), "5.00 MB");
    }
}
