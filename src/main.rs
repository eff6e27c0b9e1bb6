use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::info;

use exambank::config::{AppConfig, SETTINGS_PATH};
use exambank::parser::ExtractionPipeline;
use exambank::storage::models::{IssueReport, IssueType, NewPaper, Paper, PaperFilter, PaperUpdate, VoteType};
use exambank::storage::Database;
use exambank::upload::PaperUploader;
use exambank::utils::logger;

#[derive(Parser)]
#[command(name = "exambank")]
#[command(about = "试卷上传与题目提取系统", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 初始化配置和数据库
    Init,
    /// 只提取题目，不入库
    Extract {
        /// 试卷PDF路径
        pdf: PathBuf,
        /// 跳过OCR，只读取PDF文本层
        #[arg(long)]
        no_ocr: bool,
        /// 以JSON输出完整结果
        #[arg(long)]
        json: bool,
    },
    /// 上传试卷并保存提取出的题目
    Upload {
        pdf: PathBuf,
        #[arg(long)]
        subject: String,
        #[arg(long, default_value = "")]
        college: String,
        #[arg(long, default_value = "")]
        course: String,
        #[arg(long, default_value = "")]
        semester: String,
        #[arg(long, default_value = "")]
        year: String,
        #[arg(long, default_value = "")]
        exam_type: String,
        #[arg(long)]
        faculty_id: Option<String>,
        #[arg(long)]
        faculty_name: Option<String>,
        /// 已附教师解答
        #[arg(long)]
        has_solution: bool,
        #[arg(long)]
        solution_url: Option<String>,
        #[arg(long)]
        no_ocr: bool,
    },
    /// 列出试卷
    Papers {
        #[arg(long)]
        subject: Option<String>,
        #[arg(long)]
        college: Option<String>,
        #[arg(long)]
        course: Option<String>,
        #[arg(long)]
        year: Option<String>,
        #[arg(long)]
        exam_type: Option<String>,
        #[arg(long)]
        faculty_id: Option<String>,
        /// 只看有（true）或没有（false）教师解答的试卷
        #[arg(long)]
        has_solution: Option<bool>,
        #[arg(long, default_value_t = 0)]
        skip: i64,
        #[arg(long, default_value_t = 20, value_parser = clap::value_parser!(i64).range(1..=100))]
        limit: i64,
    },
    /// 修改试卷信息
    Update {
        paper_id: i64,
        #[arg(long)]
        subject: Option<String>,
        #[arg(long)]
        has_solution: Option<bool>,
        #[arg(long)]
        solution_url: Option<String>,
    },
    /// 列出某位教师上传的试卷
    FacultyPapers {
        faculty_id: String,
    },
    /// 查看某份试卷的题目
    Questions {
        paper_id: i64,
    },
    /// 查看单道题目
    Question {
        question_id: i64,
    },
    /// 给题目点赞（up）或点踩（down）
    Vote {
        question_id: i64,
        direction: VoteType,
    },
    /// 反馈题目问题
    Report {
        question_id: i64,
        /// wrong_answer / wrong_ocr / missing_topic
        #[arg(long)]
        issue_type: IssueType,
        #[arg(long)]
        description: String,
        #[arg(long)]
        user_id: String,
    },
    /// 删除试卷及其题目
    Delete {
        paper_id: i64,
    },
    /// 清理上传文件和数据库
    Clean,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    logger::init_logger();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init => init_command().await?,
        Commands::Extract { pdf, no_ocr, json } => extract_command(&pdf, no_ocr, json).await?,
        Commands::Upload {
            pdf,
            subject,
            college,
            course,
            semester,
            year,
            exam_type,
            faculty_id,
            faculty_name,
            has_solution,
            solution_url,
            no_ocr,
        } => {
            let paper = NewPaper {
                subject,
                college,
                course,
                semester,
                year,
                exam_type,
                pdf_path: String::new(),
                faculty_id,
                faculty_name,
                has_faculty_solution: has_solution,
                solution_url,
            };
            upload_command(&pdf, paper, no_ocr).await?
        }
        Commands::Papers {
            subject,
            college,
            course,
            year,
            exam_type,
            faculty_id,
            has_solution,
            skip,
            limit,
        } => {
            let filter = PaperFilter {
                college,
                course,
                subject,
                year,
                exam_type,
                faculty_id,
                has_faculty_solution: has_solution,
            };
            papers_command(&filter, skip, limit).await?
        }
        Commands::Update {
            paper_id,
            subject,
            has_solution,
            solution_url,
        } => {
            let update = PaperUpdate {
                subject,
                has_faculty_solution: has_solution,
                solution_url,
            };
            update_command(paper_id, &update).await?
        }
        Commands::FacultyPapers { faculty_id } => faculty_papers_command(&faculty_id).await?,
        Commands::Questions { paper_id } => questions_command(paper_id).await?,
        Commands::Question { question_id } => question_command(question_id).await?,
        Commands::Vote {
            question_id,
            direction,
        } => vote_command(question_id, direction).await?,
        Commands::Report {
            question_id,
            issue_type,
            description,
            user_id,
        } => {
            let report = IssueReport {
                issue_type,
                description,
                user_id,
            };
            report_command(question_id, &report).await?
        }
        Commands::Delete { paper_id } => delete_command(paper_id).await?,
        Commands::Clean => clean_command().await?,
    }

    Ok(())
}

async fn open_database(config: &AppConfig) -> Result<Database> {
    let db = Database::new(&config.database_url()).await?;
    db.init_schema().await?;
    Ok(db)
}

async fn init_command() -> Result<()> {
    info!("初始化系统...");

    let app_config = AppConfig::load()?;
    tokio::fs::create_dir_all("config").await?;
    tokio::fs::create_dir_all(&app_config.storage.upload_dir).await?;
    if let Some(parent) = Path::new(&app_config.storage.database_path).parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    if !Path::new(SETTINGS_PATH).exists() {
        AppConfig::default().save(SETTINGS_PATH)?;
        info!("已生成配置文件: {}", SETTINGS_PATH);
    }

    open_database(&app_config).await?;
    info!("数据库初始化完成: {}", app_config.storage.database_path);

    info!("✅ 系统初始化完成！");
    info!("下一步:");
    info!("  1. 在 {} 或 .env 中配置 OCR_SPACE_API_KEY（可选）", SETTINGS_PATH);
    info!("  2. 运行 'exambank upload <pdf> --subject <科目>' 上传试卷");

    Ok(())
}

async fn extract_command(pdf: &Path, no_ocr: bool, json: bool) -> Result<()> {
    let app_config = AppConfig::load()?;
    let pipeline = ExtractionPipeline::new(&app_config)?;
    let use_ocr = app_config.extraction.use_ocr && !no_ocr;

    let result = pipeline.process(pdf, use_ocr).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    if !result.success {
        info!("❌ 提取失败: {}", result.error.as_deref().unwrap_or("未知错误"));
        return Ok(());
    }

    info!("年份: {:?}", result.metadata.year);
    info!("学期: {:?}", result.metadata.semester);
    info!("考试类型: {:?}", result.metadata.exam_type);
    info!("共 {} 道题", result.total_questions);
    for question in &result.questions {
        let marks = question
            .marks
            .map(|m| format!(" [{}分]", m))
            .unwrap_or_default();
        println!("Q{}{}: {}", question.question_number, marks, question.question_text);
    }

    Ok(())
}

async fn upload_command(pdf: &Path, mut paper: NewPaper, no_ocr: bool) -> Result<()> {
    let app_config = AppConfig::load()?;
    let db = open_database(&app_config).await?;
    let pipeline = ExtractionPipeline::new(&app_config)?;

    // 复制到上传目录，文件名加时间戳避免重名
    let papers_dir = Path::new(&app_config.storage.upload_dir).join("papers");
    tokio::fs::create_dir_all(&papers_dir).await?;
    let file_name = pdf
        .file_name()
        .and_then(|n| n.to_str())
        .context("无效的PDF文件名")?;
    let stored_path = papers_dir.join(format!("{}_{}", Utc::now().format("%Y%m%d%H%M%S%3f"), file_name));
    tokio::fs::copy(pdf, &stored_path)
        .await
        .with_context(|| format!("复制PDF失败: {}", pdf.display()))?;
    paper.pdf_path = stored_path.to_string_lossy().to_string();

    let use_ocr = app_config.extraction.use_ocr && !no_ocr;
    let outcome = PaperUploader::new(&db, &pipeline)
        .upload(paper, &stored_path, use_ocr)
        .await?;

    if outcome.extraction.success {
        info!("✅ 上传完成，试卷ID: {}，题目数: {}", outcome.paper_id, outcome.question_count);
    } else {
        info!(
            "⚠️ 试卷已保存（ID: {}），但未提取到题目: {}",
            outcome.paper_id,
            outcome.extraction.error.as_deref().unwrap_or("未知错误")
        );
    }

    Ok(())
}

async fn papers_command(filter: &PaperFilter, skip: i64, limit: i64) -> Result<()> {
    let app_config = AppConfig::load()?;
    let db = open_database(&app_config).await?;

    let papers = db.list_papers(filter, skip, limit).await?;
    if papers.is_empty() {
        info!("没有符合条件的试卷");
        return Ok(());
    }

    let total = db.count_papers(filter).await?;
    info!("共 {} 份试卷，显示第 {}-{} 份", total, skip + 1, skip + papers.len() as i64);
    papers.iter().for_each(print_paper);

    Ok(())
}

async fn faculty_papers_command(faculty_id: &str) -> Result<()> {
    let app_config = AppConfig::load()?;
    let db = open_database(&app_config).await?;

    let papers = db.faculty_papers(faculty_id).await?;
    info!("教师 {} 共上传 {} 份试卷", faculty_id, papers.len());
    papers.iter().for_each(print_paper);

    Ok(())
}

fn print_paper(paper: &Paper) {
    let solution = if paper.has_faculty_solution { " | 有解答" } else { "" };
    println!(
        "[{}] {} | {} {} | {} {} {} | {} 题 | 浏览 {}{}",
        paper.id,
        paper.subject,
        paper.college,
        paper.course,
        paper.year,
        paper.semester,
        paper.exam_type,
        paper.question_count,
        paper.views,
        solution,
    );
}

async fn update_command(paper_id: i64, update: &PaperUpdate) -> Result<()> {
    let app_config = AppConfig::load()?;
    let db = open_database(&app_config).await?;

    if db.update_paper(paper_id, update).await? {
        info!("✅ 已更新试卷 {}", paper_id);
    } else {
        info!("试卷不存在: {}", paper_id);
    }

    Ok(())
}

async fn questions_command(paper_id: i64) -> Result<()> {
    let app_config = AppConfig::load()?;
    let db = open_database(&app_config).await?;

    let Some(paper) = db.get_paper(paper_id).await? else {
        info!("试卷不存在: {}", paper_id);
        return Ok(());
    };

    info!("{} ({} 题)", paper.subject, paper.question_count);
    for question in db.questions_by_paper(paper_id).await? {
        let marks = question
            .marks
            .map(|m| format!(" [{}分]", m))
            .unwrap_or_default();
        println!("Q{}{}: {}", question.question_number, marks, question.question_text);
    }

    Ok(())
}

async fn question_command(question_id: i64) -> Result<()> {
    let app_config = AppConfig::load()?;
    let db = open_database(&app_config).await?;

    let Some(question) = db.get_question(question_id).await? else {
        info!("题目不存在: {}", question_id);
        return Ok(());
    };

    let marks = question
        .marks
        .map(|m| format!(" [{}分]", m))
        .unwrap_or_default();
    println!("[{}] {} 第{}题{}", question.id, question.subject, question.question_number, marks);
    println!("{}", question.question_text);
    println!("👍 {}  👎 {}", question.upvotes, question.downvotes);

    Ok(())
}

async fn vote_command(question_id: i64, vote: VoteType) -> Result<()> {
    let app_config = AppConfig::load()?;
    let db = open_database(&app_config).await?;

    if db.vote_question(question_id, vote).await? {
        info!("✅ 已记录投票: 题目 {}", question_id);
    } else {
        info!("题目不存在: {}", question_id);
    }

    Ok(())
}

async fn report_command(question_id: i64, report: &IssueReport) -> Result<()> {
    let app_config = AppConfig::load()?;
    let db = open_database(&app_config).await?;

    if db.report_question(question_id, report).await? {
        info!("✅ 问题已反馈，感谢！");
    } else {
        info!("题目不存在: {}", question_id);
    }

    Ok(())
}

async fn delete_command(paper_id: i64) -> Result<()> {
    let app_config = AppConfig::load()?;
    let db = open_database(&app_config).await?;

    if db.delete_paper(paper_id).await? {
        info!("✅ 已删除试卷 {}", paper_id);
    } else {
        info!("试卷不存在: {}", paper_id);
    }

    Ok(())
}

async fn clean_command() -> Result<()> {
    info!("开始清理数据...");

    let app_config = AppConfig::load()?;
    let papers_dir = Path::new(&app_config.storage.upload_dir).join("papers");

    let mut count = 0u64;
    match tokio::fs::read_dir(&papers_dir).await {
        Ok(mut entries) => {
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                if path.is_file() {
                    if let Err(e) = tokio::fs::remove_file(&path).await {
                        info!("删除失败 {}: {}", path.display(), e);
                    } else {
                        count += 1;
                    }
                }
            }
        }
        Err(_) => {
            info!("目录不存在，跳过: {}", papers_dir.display());
        }
    }

    match open_database(&app_config).await {
        Ok(db) => db.clear_all_tables().await?,
        Err(e) => info!("数据库连接失败，跳过清空: {}", e),
    }

    info!("✅ 清理完成，共删除 {} 个文件", count);
    Ok(())
}
