use serde::Serialize;
use std::path::Path;
use tracing::{info, warn};

use crate::parser::{ExtractionPipeline, ExtractionResult};
use crate::storage::models::NewPaper;
use crate::storage::Database;
use crate::utils::ExamResult;

/// 一次上传的结果；提取失败时上传依然成功，题目数为 0
#[derive(Debug, Clone, Serialize)]
pub struct UploadOutcome {
    pub paper_id: i64,
    pub question_count: usize,
    pub extraction: ExtractionResult,
}

pub struct PaperUploader<'a> {
    db: &'a Database,
    pipeline: &'a ExtractionPipeline,
}

impl<'a> PaperUploader<'a> {
    pub fn new(db: &'a Database, pipeline: &'a ExtractionPipeline) -> Self {
        Self { db, pipeline }
    }

    /// 提取题目 → 补全试卷信息 → 入库题目并更新题目数
    pub async fn upload(&self, mut paper: NewPaper, pdf_path: &Path, use_ocr: bool) -> ExamResult<UploadOutcome> {
        info!("上传试卷: {} ({})", paper.subject, pdf_path.display());

        let extraction = self.pipeline.process(pdf_path, use_ocr).await;
        if !extraction.success {
            warn!(
                "试卷题目提取失败: {}",
                extraction.error.as_deref().unwrap_or("未知错误")
            );
        }

        paper.fill_from(&extraction.metadata);
        if paper.pdf_path.is_empty() {
            paper.pdf_path = pdf_path.to_string_lossy().to_string();
        }

        let paper_id = self.db.create_paper(&paper).await?;
        let question_count = self
            .db
            .save_questions(paper_id, &paper.subject, &extraction.questions)
            .await?;

        info!("试卷已保存，ID: {}，题目数: {}", paper_id, question_count);

        Ok(UploadOutcome {
            paper_id,
            question_count,
            extraction,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ExtractionConfig, OcrSettings};

    async fn setup() -> (Database, ExtractionPipeline) {
        let db = Database::with_max_connections("sqlite::memory:", 1).await.unwrap();
        db.init_schema().await.unwrap();
        let pipeline =
            ExtractionPipeline::with_settings(OcrSettings::disabled(), &ExtractionConfig::default())
                .unwrap();
        (db, pipeline)
    }

    #[tokio::test]
    async fn test_failed_extraction_still_creates_paper() {
        let (db, pipeline) = setup().await;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scan.pdf");
        std::fs::write(&path, b"no text layer here").unwrap();

        let paper = NewPaper {
            subject: "Algorithms".to_string(),
            semester: "V".to_string(),
            ..Default::default()
        };
        let outcome = PaperUploader::new(&db, &pipeline)
            .upload(paper, &path, false)
            .await
            .unwrap();

        assert!(!outcome.extraction.success);
        assert_eq!(outcome.question_count, 0);

        let stored = db.get_paper(outcome.paper_id).await.unwrap().unwrap();
        assert_eq!(stored.question_count, 0);
        assert_eq!(stored.semester, "V");
        assert_eq!(stored.pdf_path, path.to_string_lossy());
    }

    #[tokio::test]
    async fn test_missing_file_is_not_fatal() {
        let (db, pipeline) = setup().await;
        let paper = NewPaper {
            subject: "Chemistry".to_string(),
            pdf_path: "uploads/chem.pdf".to_string(),
            ..Default::default()
        };

        let outcome = PaperUploader::new(&db, &pipeline)
            .upload(paper, Path::new("/nonexistent/chem.pdf"), true)
            .await
            .unwrap();

        assert!(outcome.extraction.error.is_some());
        let stored = db.get_paper(outcome.paper_id).await.unwrap().unwrap();
        assert_eq!(stored.pdf_path, "uploads/chem.pdf");
    }
}
