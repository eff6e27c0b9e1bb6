use regex::Regex;
use tracing::debug;

use super::PaperMetadata;
use crate::config::ExtractionConfig;
use crate::utils::take_chars;

/// 从试卷开头（标题、表头）识别年份、学期和考试类型
pub struct MetadataExtractor {
    year_patterns: Vec<Regex>,
    semester: Regex,
    exam_types: Vec<Regex>,
    scan_chars: usize,
}

impl MetadataExtractor {
    pub fn new(config: &ExtractionConfig) -> Self {
        let year_patterns = vec![
            Regex::new(r"20\d{2}").unwrap(),
            Regex::new(r"Year\s*:?\s*(\d{4})").unwrap(),
            Regex::new(r"Session\s*:?\s*.*?(\d{4})").unwrap(),
        ];

        let exam_types = ["mid-?term", "end-?term", "final", "sessional"]
            .iter()
            .map(|p| Regex::new(&format!("(?i){}", p)).unwrap())
            .collect();

        Self {
            year_patterns,
            semester: Regex::new(r"(?i)Semester\s*:?\s*(\d+|[IVX]+)").unwrap(),
            exam_types,
            scan_chars: config.metadata_scan_chars,
        }
    }

    pub fn extract_metadata(&self, text: &str) -> PaperMetadata {
        let head = take_chars(text, self.scan_chars);

        let metadata = PaperMetadata {
            year: self.find_year(head),
            semester: self
                .semester
                .captures(head)
                .and_then(|caps| caps.get(1))
                .map(|m| m.as_str().to_string()),
            exam_type: self
                .exam_types
                .iter()
                .find_map(|re| re.find(head))
                .map(|m| m.as_str().replace('-', "")),
        };

        debug!("试卷元数据: {:?}", metadata);
        metadata
    }

    fn find_year(&self, head: &str) -> Option<i32> {
        for pattern in &self.year_patterns {
            let Some(caps) = pattern.captures(head) else {
                continue;
            };
            let Some(matched) = caps.get(1).or_else(|| caps.get(0)) else {
                continue;
            };
            // 非 ASCII 数字等解析失败时换下一条规则
            match matched.as_str().parse::<i32>() {
                Ok(year) => return Some(year),
                Err(_) => debug!("年份解析失败: {}", matched.as_str()),
            }
        }
        None
    }
}

impl Default for MetadataExtractor {
    fn default() -> Self {
        Self::new(&ExtractionConfig::default())
    }
}
