use regex::Regex;
use std::collections::HashSet;
use tracing::{debug, info};

use super::ExtractedQuestion;
use crate::config::ExtractionConfig;

/// 一种题号标记风格
///
/// `regex` 不支持先行断言，所以每种风格拆成两条表达式：`marker` 匹配题号本身
/// （第 1 组为题号），`terminator` 匹配题目正文的结束位置。
struct MarkerStyle {
    name: &'static str,
    marker: Regex,
    terminator: Regex,
}

impl MarkerStyle {
    fn new(name: &'static str, marker: &str, terminator: &str) -> Self {
        Self {
            name,
            marker: Regex::new(marker).unwrap(),
            terminator: Regex::new(terminator).unwrap(),
        }
    }

    /// 依次切出 (题号文本, 正文片段)
    fn spans<'t>(&self, text: &'t str) -> Vec<(&'t str, &'t str)> {
        let mut spans = Vec::new();
        let mut pos = 0;

        while pos < text.len() {
            let Some(caps) = self.marker.captures_at(text, pos) else {
                break;
            };
            let (Some(whole), Some(number)) = (caps.get(0), caps.get(1)) else {
                break;
            };

            let body_start = whole.end();
            let body_end = self
                .terminator
                .find_at(text, body_start)
                .map(|m| m.start())
                .unwrap_or(text.len());

            spans.push((number.as_str(), &text[body_start..body_end]));
            pos = body_end;
        }

        spans
    }
}

pub struct QuestionParser {
    styles: Vec<MarkerStyle>,
    marks: Regex,
    min_chars: usize,
    max_chars: usize,
}

impl QuestionParser {
    pub fn new(config: &ExtractionConfig) -> Self {
        // 按优先级排列，找到第一个有结果的风格即停止
        let styles = vec![
            // Q1. / Q.1 / Q 1: / Q1)
            MarkerStyle::new(
                "q_prefix",
                r"(?i)Q\.?\s*([0-9]+)[.):]?\s*",
                r"(?i)Q\.?\s*[0-9]+",
            ),
            // Question 1.
            MarkerStyle::new(
                "question_word",
                r"(?i)Question\s*([0-9]+)[.):]?\s*",
                r"(?i)Question\s*[0-9]+",
            ),
            // 1. / 1)，特异性最低
            MarkerStyle::new("bare_number", r"([0-9]+)[.)]\s+", r"[0-9]+[.)]"),
        ];

        Self {
            styles,
            marks: Regex::new(r"(?i)\[([0-9]+)\s*marks?\]|\(([0-9]+)\s*marks?\)").unwrap(),
            min_chars: config.min_question_chars,
            max_chars: config.max_question_chars,
        }
    }

    /// 从全文中切分题目，结果按题号升序且题号唯一
    pub fn parse(&self, text: &str) -> Vec<ExtractedQuestion> {
        if text.trim().is_empty() {
            return Vec::new();
        }

        let mut questions = Vec::new();
        for style in &self.styles {
            questions = self.collect(style, text);
            if !questions.is_empty() {
                debug!("题号风格 [{}] 命中 {} 个候选", style.name, questions.len());
                break;
            }
        }

        // 稳定排序后保留同题号的第一条
        questions.sort_by_key(|q| q.question_number);
        let mut seen = HashSet::new();
        questions.retain(|q| seen.insert(q.question_number));

        info!("题目切分完成，共 {} 题", questions.len());
        questions
    }

    fn collect(&self, style: &MarkerStyle, text: &str) -> Vec<ExtractedQuestion> {
        style
            .spans(text)
            .into_iter()
            .filter_map(|(number, body)| self.build(number, body))
            .collect()
    }

    fn build(&self, number: &str, body: &str) -> Option<ExtractedQuestion> {
        let question_number = match number.parse::<u32>() {
            Ok(n) if n > 0 => n,
            _ => {
                debug!("跳过无效题号: {}", number);
                return None;
            }
        };

        let question_text = self.normalize(body)?;
        let marks = self.extract_marks(&question_text);

        Some(ExtractedQuestion {
            question_number,
            question_text,
            marks,
        })
    }

    /// 压缩空白并截断；过短的片段视为噪声
    fn normalize(&self, body: &str) -> Option<String> {
        let collapsed = body.split_whitespace().collect::<Vec<_>>().join(" ");
        if collapsed.chars().count() < self.min_chars {
            return None;
        }

        Some(collapsed.chars().take(self.max_chars).collect())
    }

    /// 分值标注保留在正文里，这里只额外取出数值
    fn extract_marks(&self, text: &str) -> Option<u32> {
        let caps = self.marks.captures(text)?;
        caps.get(1)
            .or_else(|| caps.get(2))
            .and_then(|m| m.as_str().parse::<u32>().ok())
            .filter(|&m| m > 0)
    }
}

impl Default for QuestionParser {
    fn default() -> Self {
        Self::new(&ExtractionConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numbers(questions: &[ExtractedQuestion]) -> Vec<u32> {
        questions.iter().map(|q| q.question_number).collect()
    }

    #[test]
    fn test_q_prefix_with_marks() {
        let parser = QuestionParser::default();
        let questions = parser.parse("Q1. What is a stack? [5 marks]\nQ2. Explain recursion.");

        assert_eq!(questions.len(), 2);
        assert_eq!(questions[0].question_number, 1);
        assert_eq!(questions[0].question_text, "What is a stack? [5 marks]");
        assert_eq!(questions[0].marks, Some(5));
        assert_eq!(questions[1].question_number, 2);
        assert_eq!(questions[1].question_text, "Explain recursion.");
        assert_eq!(questions[1].marks, None);
    }

    #[test]
    fn test_q_prefix_variants() {
        let parser = QuestionParser::default();
        let text = "Q.1 Define an operating system kernel.\n\
                    Q 2: Compare paging and segmentation.\n\
                    q3) Describe the dining philosophers problem.";
        let questions = parser.parse(text);

        assert_eq!(numbers(&questions), vec![1, 2, 3]);
        assert_eq!(questions[1].question_text, "Compare paging and segmentation.");
    }

    #[test]
    fn test_question_word_style() {
        let parser = QuestionParser::default();
        let text = "Question 1. Prove that the halting problem is undecidable.\n\n\
                    Question 2) Construct a DFA for binary strings divisible by 3. (10 Marks)";
        let questions = parser.parse(text);

        assert_eq!(numbers(&questions), vec![1, 2]);
        assert_eq!(questions[1].marks, Some(10));
        assert!(questions[1].question_text.ends_with("(10 Marks)"));
    }

    #[test]
    fn test_bare_number_style() {
        let parser = QuestionParser::default();
        let text = "1. Explain the working of a hash table.\n2) Write short notes on B-trees.\n";
        let questions = parser.parse(text);

        assert_eq!(numbers(&questions), vec![1, 2]);
        assert_eq!(questions[0].question_text, "Explain the working of a hash table.");
        assert_eq!(questions[1].question_text, "Write short notes on B-trees.");
    }

    #[test]
    fn test_bare_number_span_stops_at_inline_number() {
        let parser = QuestionParser::default();
        let questions = parser.parse("1. Round the value 3.75 to one decimal place and justify.");

        assert_eq!(questions.len(), 1);
        assert_eq!(questions[0].question_text, "Round the value");
    }

    #[test]
    fn test_higher_priority_style_wins() {
        let parser = QuestionParser::default();
        // 同时含 Q 风格与裸编号，只使用 Q 风格
        let text = "Q1. Answer all parts below carefully.\n1. first sub part here\n2. second sub part here";
        let questions = parser.parse(text);

        assert_eq!(questions.len(), 1);
        assert_eq!(questions[0].question_number, 1);
        assert!(questions[0].question_text.contains("first sub part"));
    }

    #[test]
    fn test_short_candidates_fall_through_to_next_style() {
        let parser = QuestionParser::default();
        // Q 风格的片段都不足 10 个字符，应回退到下一种风格
        let text = "Question 4. Discuss the CAP theorem in distributed systems.\nQ1 ok";
        let questions = parser.parse(text);

        assert_eq!(numbers(&questions), vec![4]);
        assert!(questions[0].question_text.starts_with("Discuss the CAP theorem"));
    }

    #[test]
    fn test_zero_markers_returns_empty() {
        let parser = QuestionParser::default();
        assert!(parser.parse("").is_empty());
        assert!(parser.parse("   \n\t ").is_empty());
        assert!(parser.parse("This page intentionally left blank without any numbering").is_empty());
    }

    #[test]
    fn test_sorted_and_deduplicated() {
        let parser = QuestionParser::default();
        let text = "Q3. Third question about graph traversal.\n\
                    Q1. First question about sorting algorithms.\n\
                    Q1. Duplicate numbering that should be dropped.\n\
                    Q2. Second question about binary search.";
        let questions = parser.parse(text);

        assert_eq!(numbers(&questions), vec![1, 2, 3]);
        assert_eq!(questions[0].question_text, "First question about sorting algorithms.");
    }

    #[test]
    fn test_duplicate_keeps_first_encountered_span() {
        let parser = QuestionParser::default();
        let text = "Q1. Alpha question text here\nQ1. Beta question text here\nQ2. Gamma question text here";
        let questions = parser.parse(text);

        assert_eq!(questions.len(), 2);
        assert_eq!(questions[0].question_text, "Alpha question text here");
        assert_eq!(questions[1].question_number, 2);
    }

    #[test]
    fn test_whitespace_collapsed_and_length_bounds() {
        let parser = QuestionParser::default();
        let long_body = "word ".repeat(2000);
        let text = format!("Q1.   Explain\n\n   the   OSI\tmodel layers.\nQ2. {}", long_body);
        let questions = parser.parse(&text);

        assert_eq!(questions[0].question_text, "Explain the OSI model layers.");
        for q in &questions {
            let len = q.question_text.chars().count();
            assert!(len >= 10 && len <= 5000, "length out of bounds: {}", len);
            assert!(!q.question_text.contains("  "));
            assert!(!q.question_text.contains('\n'));
        }
    }

    #[test]
    fn test_truncation_keeps_exactly_max_chars() {
        let parser = QuestionParser::default();
        let text = format!("Q1. {} tail", "a".repeat(4999));
        let questions = parser.parse(&text);

        let body = &questions[0].question_text;
        assert_eq!(body.chars().count(), 5000);
        assert!(body.ends_with("a "));
    }

    #[test]
    fn test_marks_singular_and_case_insensitive() {
        let parser = QuestionParser::default();
        let text = "Q1. State Ohm's law briefly. [1 Mark]\nQ2. Derive the lens formula. (12 MARKS)";
        let questions = parser.parse(text);

        assert_eq!(questions[0].marks, Some(1));
        assert_eq!(questions[1].marks, Some(12));
    }

    #[test]
    fn test_parse_is_idempotent() {
        let parser = QuestionParser::default();
        let text = "Q2. Explain deadlock prevention. [8 marks]\nQ1. What is virtual memory?";
        assert_eq!(parser.parse(text), parser.parse(text));
    }

    #[test]
    fn test_custom_length_limits() {
        let config = ExtractionConfig {
            min_question_chars: 3,
            max_question_chars: 12,
            ..ExtractionConfig::default()
        };
        let parser = QuestionParser::new(&config);
        let questions = parser.parse("Q1. Why?\nQ2. Describe the memory hierarchy");

        assert_eq!(questions[0].question_text, "Why?");
        assert_eq!(questions[1].question_text, "Describe the");
    }
}
