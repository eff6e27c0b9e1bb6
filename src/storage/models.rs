use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;

use crate::parser::PaperMetadata;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Paper {
    pub id: i64,
    pub subject: String,
    pub college: String,
    pub course: String,
    pub semester: String,
    pub year: String,
    pub exam_type: String,
    pub pdf_path: String,
    pub faculty_id: Option<String>,
    pub faculty_name: Option<String>,
    pub has_faculty_solution: bool,
    pub solution_url: Option<String>,
    pub question_count: i64,
    pub views: i64,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Question {
    pub id: i64,
    pub paper_id: i64,
    pub question_number: i64,
    pub question_text: String,
    pub marks: Option<i64>,
    pub subject: String,
    pub upvotes: i64,
    pub downvotes: i64,
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct QuestionReport {
    pub id: i64,
    pub question_id: i64,
    pub issue_type: String,
    pub description: String,
    pub user_id: String,
    pub reported_at: Option<String>,
}

/// 上传时由教师填写的试卷信息，空字符串表示未填写
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewPaper {
    pub subject: String,
    pub college: String,
    pub course: String,
    pub semester: String,
    pub year: String,
    pub exam_type: String,
    pub pdf_path: String,
    pub faculty_id: Option<String>,
    pub faculty_name: Option<String>,
    pub has_faculty_solution: bool,
    pub solution_url: Option<String>,
}

impl NewPaper {
    /// 用识别出的元数据补全未填写的字段，已填写的保持不变
    pub fn fill_from(&mut self, metadata: &PaperMetadata) {
        if self.year.trim().is_empty() {
            if let Some(year) = metadata.year {
                self.year = year.to_string();
            }
        }
        if self.semester.trim().is_empty() {
            if let Some(ref semester) = metadata.semester {
                self.semester = semester.clone();
            }
        }
        if self.exam_type.trim().is_empty() {
            if let Some(ref exam_type) = metadata.exam_type {
                self.exam_type = exam_type.clone();
            }
        }
    }
}

/// 试卷可修改的字段，`None` 表示不改
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PaperUpdate {
    pub subject: Option<String>,
    pub has_faculty_solution: Option<bool>,
    pub solution_url: Option<String>,
}

/// 试卷列表的筛选条件
#[derive(Debug, Clone, Default)]
pub struct PaperFilter {
    pub college: Option<String>,
    pub course: Option<String>,
    pub subject: Option<String>,
    pub year: Option<String>,
    pub exam_type: Option<String>,
    pub faculty_id: Option<String>,
    pub has_faculty_solution: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteType {
    Up,
    Down,
}

impl VoteType {
    pub(crate) fn column(self) -> &'static str {
        match self {
            VoteType::Up => "upvotes",
            VoteType::Down => "downvotes",
        }
    }
}

impl FromStr for VoteType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "up" => Ok(VoteType::Up),
            "down" => Ok(VoteType::Down),
            other => Err(format!("未知的投票类型: {} (可选 up / down)", other)),
        }
    }
}

/// 学生反馈的题目问题类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueType {
    WrongAnswer,
    WrongOcr,
    MissingTopic,
}

impl IssueType {
    pub fn as_str(self) -> &'static str {
        match self {
            IssueType::WrongAnswer => "wrong_answer",
            IssueType::WrongOcr => "wrong_ocr",
            IssueType::MissingTopic => "missing_topic",
        }
    }
}

impl fmt::Display for IssueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IssueType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.replace('-', "_").to_ascii_lowercase().as_str() {
            "wrong_answer" => Ok(IssueType::WrongAnswer),
            "wrong_ocr" => Ok(IssueType::WrongOcr),
            "missing_topic" => Ok(IssueType::MissingTopic),
            other => Err(format!(
                "未知的问题类型: {} (可选 wrong_answer / wrong_ocr / missing_topic)",
                other
            )),
        }
    }
}

#[derive(Debug, Clone)]
pub struct IssueReport {
    pub issue_type: IssueType,
    pub description: String,
    pub user_id: String,
}
