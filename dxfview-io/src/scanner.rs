//! DXF 组码/值的逐行扫描器。读取永不失败：越界时返回安全的默认值。

/// 组码行无法解析为整数时返回的哨兵值。
pub const INVALID_GROUP_CODE: i32 = i32::MIN;

/// 单个组值。数值保留原始文本，避免图层名 `"0"` 之类的文本字段被改写。
#[derive(Debug, Clone, PartialEq)]
pub enum DxfValue {
    Number { value: f64, raw: String },
    Text(String),
}

impl DxfValue {
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        match trimmed.parse::<f64>() {
            Ok(value) if !trimmed.is_empty() => DxfValue::Number {
                value,
                raw: trimmed.to_string(),
            },
            _ => DxfValue::Text(trimmed.to_string()),
        }
    }

    #[inline]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            DxfValue::Number { value, .. } => Some(*value),
            DxfValue::Text(_) => None,
        }
    }

    /// 截断为整数，非有限值视为缺失。
    #[inline]
    pub fn as_i64(&self) -> Option<i64> {
        self.as_f64()
            .filter(|value| value.is_finite())
            .map(|value| value.trunc() as i64)
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        match self {
            DxfValue::Number { raw, .. } => raw,
            DxfValue::Text(text) => text,
        }
    }
}

/// 只进不退的游标。每条记录占两行：组码行与值行。
#[derive(Debug)]
pub struct DxfScanner<'a> {
    lines: Vec<&'a str>,
    position: usize,
    malformed: usize,
}

impl<'a> DxfScanner<'a> {
    pub fn new(source: &'a str) -> Self {
        let mut lines: Vec<&'a str> = source.split('\n').collect();
        // 末尾空行不构成记录
        while lines.last().is_some_and(|line| line.trim().is_empty()) {
            lines.pop();
        }
        Self {
            lines,
            position: 0,
            malformed: 0,
        }
    }

    #[inline]
    pub fn is_exhausted(&self) -> bool {
        self.position >= self.lines.len()
    }

    /// 读取组码。越界返回 0（即把文件末尾当作实体边界），无法解析返回 [`INVALID_GROUP_CODE`]。
    pub fn read_code(&mut self) -> i32 {
        let code = self.code_at(self.position);
        if code == INVALID_GROUP_CODE {
            self.malformed += 1;
        }
        self.position += 1;
        code
    }

    pub fn read_value(&mut self) -> DxfValue {
        let value = DxfValue::parse(self.lines.get(self.position).copied().unwrap_or(""));
        self.position += 1;
        value
    }

    #[inline]
    pub fn peek_code(&self) -> i32 {
        self.code_at(self.position)
    }

    /// 下一条记录的值文本（已去除首尾空白），不移动游标。
    #[inline]
    pub fn peek_value(&self) -> Option<&'a str> {
        self.lines.get(self.position + 1).map(|line| line.trim())
    }

    /// 最近读取的一行的 1 起始行号。
    #[inline]
    pub fn line_number(&self) -> usize {
        self.position.min(self.lines.len())
    }

    /// 最近读取的一行的原始内容（去除首尾空白）。
    pub fn previous_line(&self) -> Option<&'a str> {
        self.position
            .checked_sub(1)
            .and_then(|index| self.lines.get(index))
            .map(|line| line.trim())
    }

    #[inline]
    pub fn malformed_codes(&self) -> usize {
        self.malformed
    }

    fn code_at(&self, index: usize) -> i32 {
        match self.lines.get(index) {
            None => 0,
            Some(line) => line.trim().parse::<i32>().unwrap_or(INVALID_GROUP_CODE),
        }
    }
}
