pub mod logger;

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExamError {
    #[error("数据库错误: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("网络请求错误: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("OCR服务错误: {0}")]
    OcrError(String),

    #[error("PDF文件不存在: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("IO错误: {0}")]
    IoError(#[from] std::io::Error),

    #[error("PDF处理错误: {0}")]
    PdfError(String),
}

pub type ExamResult<T> = Result<T, ExamError>;

/// 截取前 `n` 个字符（按字符而非字节，避免切断多字节字符）
pub fn take_chars(text: &str, n: usize) -> &str {
    match text.char_indices().nth(n) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn take_chars_respects_char_boundaries() {
        assert_eq!(take_chars("学期考试", 2), "学期");
        assert_eq!(take_chars("abc", 10), "abc");
        assert_eq!(take_chars("abc", 0), "");
    }

    #[test]
    fn file_not_found_message_names_the_path() {
        let err = ExamError::FileNotFound(PathBuf::from("/tmp/missing.pdf"));
        assert!(err.to_string().contains("/tmp/missing.pdf"));
    }
}
