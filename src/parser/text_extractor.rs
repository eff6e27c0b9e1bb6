use std::path::Path;
use tracing::{info, warn};

use super::ocr::OcrClient;
use super::pdf_parser::PdfParser;
use crate::config::OcrSettings;
use crate::utils::{ExamError, ExamResult};

/// 文本提取：优先远程 OCR，失败时回退到本地文本层
pub struct TextExtractor {
    ocr: Option<OcrClient>,
    pdf_parser: PdfParser,
}

impl TextExtractor {
    pub fn new(settings: OcrSettings) -> ExamResult<Self> {
        let ocr = if settings.ocr_enabled {
            Some(OcrClient::new(settings)?)
        } else {
            info!("OCR API key 未配置，仅使用PDF文本层");
            None
        };

        Ok(Self {
            ocr,
            pdf_parser: PdfParser::new(),
        })
    }

    pub fn ocr_enabled(&self) -> bool {
        self.ocr.is_some()
    }

    /// 两条路径都拿不到文本时返回空字符串；文件不存在才算错误
    pub async fn extract(&self, pdf_path: &Path, prefer_ocr: bool) -> ExamResult<String> {
        if !pdf_path.exists() {
            return Err(ExamError::FileNotFound(pdf_path.to_path_buf()));
        }

        if prefer_ocr {
            if let Some(ocr) = &self.ocr {
                match ocr.recognize(pdf_path).await {
                    Ok(text) if !text.is_empty() => return Ok(text),
                    Ok(_) => warn!("OCR未识别到文本，回退到PDF文本层"),
                    Err(e) => warn!("OCR失败: {}，回退到PDF文本层", e),
                }
            }
        }

        // lopdf 解析是同步且耗CPU的，放到阻塞线程池
        let parser = self.pdf_parser;
        let path = pdf_path.to_path_buf();
        tokio::task::spawn_blocking(move || parser.extract_full_text(&path))
            .await
            .map_err(|e| ExamError::PdfError(format!("文本提取任务异常: {}", e)))?
    }
}
