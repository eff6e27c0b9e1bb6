use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use serde_json::Value;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::OcrSettings;
use crate::utils::{ExamError, ExamResult};

/// OCR 服务响应体
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct OcrResponse {
    #[serde(default)]
    is_errored_on_processing: bool,
    #[serde(default)]
    error_message: Option<Value>,
    #[serde(default)]
    parsed_results: Option<Vec<ParsedResult>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ParsedResult {
    #[serde(default)]
    parsed_text: Option<String>,
}

/// 远程 OCR 客户端，用于没有文本层的扫描件
pub struct OcrClient {
    client: reqwest::Client,
    settings: OcrSettings,
}

impl OcrClient {
    pub fn new(settings: OcrSettings) -> ExamResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()?;
        Ok(Self { client, settings })
    }

    /// 上传整份 PDF，返回各页识别结果（页间空行分隔）
    pub async fn recognize(&self, pdf_path: &Path) -> ExamResult<String> {
        if !self.settings.ocr_enabled {
            return Err(ExamError::OcrError("未配置 OCR API key".to_string()));
        }

        info!("调用OCR服务: {}", pdf_path.display());

        let bytes = tokio::fs::read(pdf_path).await?;
        let filename = pdf_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("paper.pdf")
            .to_string();

        let part = Part::bytes(bytes)
            .file_name(filename)
            .mime_str("application/pdf")?;

        let form = Form::new()
            .text("apikey", self.settings.api_key.clone())
            .text("language", self.settings.language.clone())
            .text("isOverlayRequired", "false")
            .text("filetype", "PDF")
            .text("detectOrientation", "true")
            .text("scale", "true")
            .text("OCREngine", self.settings.engine.to_string())
            .part("file", part);

        let response = self
            .client
            .post(&self.settings.api_url)
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ExamError::OcrError(format!("HTTP {}: {}", status, body)));
        }

        let body: OcrResponse = response.json().await?;
        collect_parsed_text(body)
    }
}

fn collect_parsed_text(response: OcrResponse) -> ExamResult<String> {
    if response.is_errored_on_processing {
        let message = response
            .error_message
            .as_ref()
            .map(error_message_text)
            .unwrap_or_else(|| "未知错误".to_string());
        warn!("OCR处理失败: {}", message);
        return Err(ExamError::OcrError(message));
    }

    let pages: Vec<String> = response
        .parsed_results
        .unwrap_or_default()
        .into_iter()
        .map(|r| r.parsed_text.unwrap_or_default())
        .collect();

    info!("OCR识别完成，共 {} 页", pages.len());
    Ok(pages.join("\n\n").trim().to_string())
}

/// ErrorMessage 可能是字符串，也可能是字符串数组
fn error_message_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .filter_map(|v| v.as_str())
            .collect::<Vec<_>>()
            .join("; "),
        other => other.to_string(),
    }
}
