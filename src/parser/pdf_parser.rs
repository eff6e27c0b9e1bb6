use lopdf::Document;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::utils::{ExamError, ExamResult};

/// 直接读取 PDF 自带的文本层，不依赖网络
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfParser;

impl PdfParser {
    pub fn new() -> Self {
        Self
    }

    /// 按页序提取文本，页与页之间用空行分隔；提取不到时返回空字符串
    pub fn extract_full_text(&self, pdf_path: &Path) -> ExamResult<String> {
        info!("提取PDF文本层: {}", pdf_path.display());

        if !pdf_path.exists() {
            return Err(ExamError::FileNotFound(pdf_path.to_path_buf()));
        }

        match Document::load(pdf_path) {
            Ok(doc) => {
                let text = self.extract_pages(&doc);
                if !text.is_empty() {
                    info!("提取文本长度: {} 字符", text.chars().count());
                    return Ok(text);
                }
                warn!("逐页提取未得到文本，尝试整篇提取");
            }
            Err(e) => warn!("lopdf 无法解析 {}: {}", pdf_path.display(), e),
        }

        match pdf_extract::extract_text(pdf_path) {
            Ok(text) => {
                let text = text.trim().to_string();
                info!("整篇提取文本长度: {} 字符", text.chars().count());
                Ok(text)
            }
            Err(e) => {
                warn!("PDF中未提取到文本内容: {}", e);
                Ok(String::new())
            }
        }
    }

    fn extract_pages(&self, doc: &Document) -> String {
        // get_pages 返回 BTreeMap，按页码有序
        let pages: Vec<String> = doc
            .get_pages()
            .into_keys()
            .filter_map(|page_num| match doc.extract_text(&[page_num]) {
                Ok(text) => Some(text),
                Err(e) => {
                    debug!("第 {} 页文本提取失败: {}", page_num, e);
                    None
                }
            })
            .collect();

        debug!("共 {} 页文本", pages.len());
        pages.join("\n\n").trim().to_string()
    }
}
