pub mod metadata;
pub mod ocr;
pub mod pdf_parser;
pub mod question_parser;
pub mod text_extractor;

#[cfg(test)]
pub(crate) mod test_support;

pub use metadata::MetadataExtractor;
pub use ocr::OcrClient;
pub use pdf_parser::PdfParser;
pub use question_parser::QuestionParser;
pub use text_extractor::TextExtractor;

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};

use crate::config::{AppConfig, ExtractionConfig, OcrSettings};
use crate::utils::{take_chars, ExamResult};

pub const NO_TEXT_ERROR: &str = "No text could be extracted from PDF";

/// 从试卷中切分出的一道题
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedQuestion {
    pub question_number: u32,
    pub question_text: String,
    pub marks: Option<u32>,
}

/// 试卷元数据，未识别的字段不输出
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaperMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub semester: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exam_type: Option<String>,
}

impl PaperMetadata {
    pub fn is_empty(&self) -> bool {
        self.year.is_none() && self.semester.is_none() && self.exam_type.is_none()
    }
}

/// 提取管道的统一输出
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub success: bool,
    pub questions: Vec<ExtractedQuestion>,
    pub metadata: PaperMetadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_text_preview: Option<String>,
    pub total_questions: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExtractionResult {
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            questions: Vec::new(),
            metadata: PaperMetadata::default(),
            raw_text_preview: None,
            total_questions: 0,
            error: Some(error.into()),
        }
    }
}

/// 统一提取管道：文本提取 → 题目切分 → 元数据识别
pub struct ExtractionPipeline {
    text_extractor: TextExtractor,
    question_parser: QuestionParser,
    metadata_extractor: MetadataExtractor,
    preview_chars: usize,
}

impl ExtractionPipeline {
    pub fn new(config: &AppConfig) -> ExamResult<Self> {
        Self::with_settings(config.ocr_settings(), &config.extraction)
    }

    pub fn with_settings(ocr: OcrSettings, extraction: &ExtractionConfig) -> ExamResult<Self> {
        Ok(Self {
            text_extractor: TextExtractor::new(ocr)?,
            question_parser: QuestionParser::new(extraction),
            metadata_extractor: MetadataExtractor::new(extraction),
            preview_chars: extraction.preview_chars,
        })
    }

    /// 处理一份试卷PDF，任何失败都转换为 `success == false` 的结果
    pub async fn process(&self, pdf_path: &Path, use_ocr: bool) -> ExtractionResult {
        info!("开始提取管道: {}", pdf_path.display());

        match self.text_extractor.extract(pdf_path, use_ocr).await {
            Ok(text) => self.analyze_text(&text),
            Err(e) => {
                warn!("提取失败 {}: {}", pdf_path.display(), e);
                ExtractionResult::failure(e.to_string())
            }
        }
    }

    /// 对已提取的文本执行切分与元数据识别
    pub fn analyze_text(&self, text: &str) -> ExtractionResult {
        if text.trim().is_empty() {
            warn!("PDF中未提取到文本内容");
            return ExtractionResult::failure(NO_TEXT_ERROR);
        }

        let questions = self.question_parser.parse(text);
        let metadata = self.metadata_extractor.extract_metadata(text);
        info!("提取到 {} 道题", questions.len());

        ExtractionResult {
            success: true,
            total_questions: questions.len(),
            questions,
            metadata,
            raw_text_preview: Some(take_chars(text, self.preview_chars).to_string()),
            error: None,
        }
    }
}
