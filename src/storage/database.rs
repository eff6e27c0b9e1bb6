use chrono::Utc;
use sqlx::{sqlite::SqlitePoolOptions, QueryBuilder, Sqlite, SqlitePool};
use tracing::info;

use crate::parser::ExtractedQuestion;
use crate::storage::models::{
    IssueReport, NewPaper, Paper, PaperFilter, PaperUpdate, Question, QuestionReport, VoteType,
};
use crate::utils::ExamResult;

pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn new(database_url: &str) -> ExamResult<Self> {
        Self::with_max_connections(database_url, 5).await
    }

    /// `sqlite::memory:` 每个连接是独立的库，测试时传 1
    pub async fn with_max_connections(database_url: &str, max_connections: u32) -> ExamResult<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(
                database_url
                    .parse::<sqlx::sqlite::SqliteConnectOptions>()?
                    .create_if_missing(true),
            )
            .await?;

        info!("数据库连接成功: {}", database_url);
        Ok(Self { pool })
    }

    pub async fn init_schema(&self) -> ExamResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS papers (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                subject TEXT NOT NULL,
                college TEXT NOT NULL DEFAULT '',
                course TEXT NOT NULL DEFAULT '',
                semester TEXT NOT NULL DEFAULT '',
                year TEXT NOT NULL DEFAULT '',
                exam_type TEXT NOT NULL DEFAULT '',
                pdf_path TEXT NOT NULL,
                faculty_id TEXT,
                faculty_name TEXT,
                has_faculty_solution INTEGER NOT NULL DEFAULT 0,
                solution_url TEXT,
                question_count INTEGER NOT NULL DEFAULT 0,
                views INTEGER NOT NULL DEFAULT 0,
                created_at TEXT DEFAULT CURRENT_TIMESTAMP,
                updated_at TEXT DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS questions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                paper_id INTEGER NOT NULL,
                question_number INTEGER NOT NULL,
                question_text TEXT NOT NULL,
                marks INTEGER,
                subject TEXT NOT NULL,
                upvotes INTEGER NOT NULL DEFAULT 0,
                downvotes INTEGER NOT NULL DEFAULT 0,
                created_at TEXT DEFAULT CURRENT_TIMESTAMP,
                UNIQUE(paper_id, question_number),
                FOREIGN KEY (paper_id) REFERENCES papers(id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS question_reports (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                question_id INTEGER NOT NULL,
                issue_type TEXT NOT NULL,
                description TEXT NOT NULL,
                user_id TEXT NOT NULL,
                reported_at TEXT DEFAULT CURRENT_TIMESTAMP,
                FOREIGN KEY (question_id) REFERENCES questions(id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        info!("数据库表结构初始化完成");
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// 新建试卷，题目数从 0 开始
    pub async fn create_paper(&self, paper: &NewPaper) -> ExamResult<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO papers (subject, college, course, semester, year, exam_type, pdf_path,
                                faculty_id, faculty_name, has_faculty_solution, solution_url)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&paper.subject)
        .bind(&paper.college)
        .bind(&paper.course)
        .bind(&paper.semester)
        .bind(&paper.year)
        .bind(&paper.exam_type)
        .bind(&paper.pdf_path)
        .bind(&paper.faculty_id)
        .bind(&paper.faculty_name)
        .bind(paper.has_faculty_solution)
        .bind(&paper.solution_url)
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    /// 读取试卷，同时浏览次数加一
    pub async fn get_paper(&self, paper_id: i64) -> ExamResult<Option<Paper>> {
        let updated = sqlx::query("UPDATE papers SET views = views + 1 WHERE id = ?")
            .bind(paper_id)
            .execute(&self.pool)
            .await?;

        if updated.rows_affected() == 0 {
            return Ok(None);
        }

        let paper = sqlx::query_as::<_, Paper>("SELECT * FROM papers WHERE id = ?")
            .bind(paper_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(paper)
    }

    /// 按筛选条件分页列出试卷，新上传的在前
    pub async fn list_papers(&self, filter: &PaperFilter, skip: i64, limit: i64) -> ExamResult<Vec<Paper>> {
        let mut query: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT * FROM papers WHERE 1 = 1");
        push_filter(&mut query, filter);

        query.push(" ORDER BY created_at DESC, id DESC LIMIT ");
        query.push_bind(limit);
        query.push(" OFFSET ");
        query.push_bind(skip);

        let papers = query.build_query_as::<Paper>().fetch_all(&self.pool).await?;
        Ok(papers)
    }

    /// 符合筛选条件的试卷总数（不受分页影响）
    pub async fn count_papers(&self, filter: &PaperFilter) -> ExamResult<i64> {
        let mut query: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT COUNT(*) FROM papers WHERE 1 = 1");
        push_filter(&mut query, filter);

        let total = query.build_query_scalar::<i64>().fetch_one(&self.pool).await?;
        Ok(total)
    }

    /// 某位教师上传的全部试卷，新的在前
    pub async fn faculty_papers(&self, faculty_id: &str) -> ExamResult<Vec<Paper>> {
        let papers = sqlx::query_as::<_, Paper>(
            "SELECT * FROM papers WHERE faculty_id = ? ORDER BY created_at DESC, id DESC",
        )
        .bind(faculty_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(papers)
    }

    /// 只改传入的字段，`updated_at` 总会刷新；试卷不存在时返回 false
    pub async fn update_paper(&self, paper_id: i64, update: &PaperUpdate) -> ExamResult<bool> {
        let mut query: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE papers SET updated_at = ");
        query.push_bind(Utc::now().format("%Y-%m-%d %H:%M:%S").to_string());

        if let Some(subject) = &update.subject {
            query.push(", subject = ");
            query.push_bind(subject.clone());
        }
        if let Some(has_solution) = update.has_faculty_solution {
            query.push(", has_faculty_solution = ");
            query.push_bind(has_solution);
        }
        if let Some(url) = &update.solution_url {
            query.push(", solution_url = ");
            query.push_bind(url.clone());
        }

        query.push(" WHERE id = ");
        query.push_bind(paper_id);

        let result = query.build().execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }

    /// 删除试卷及其全部题目
    pub async fn delete_paper(&self, paper_id: i64) -> ExamResult<bool> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "DELETE FROM question_reports WHERE question_id IN (SELECT id FROM questions WHERE paper_id = ?)",
        )
        .bind(paper_id)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM questions WHERE paper_id = ?")
            .bind(paper_id)
            .execute(&mut *tx)
            .await?;

        let result = sqlx::query("DELETE FROM papers WHERE id = ?")
            .bind(paper_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }

    /// 在一个事务里保存全部题目，并把试卷题目数设为保存数量
    pub async fn save_questions(
        &self,
        paper_id: i64,
        subject: &str,
        questions: &[ExtractedQuestion],
    ) -> ExamResult<usize> {
        let mut tx = self.pool.begin().await?;

        for question in questions {
            sqlx::query(
                r#"
                INSERT INTO questions (paper_id, question_number, question_text, marks, subject)
                VALUES (?, ?, ?, ?, ?)
                ON CONFLICT(paper_id, question_number) DO UPDATE SET
                    question_text = excluded.question_text,
                    marks = excluded.marks
                "#,
            )
            .bind(paper_id)
            .bind(question.question_number as i64)
            .bind(&question.question_text)
            .bind(question.marks.map(i64::from))
            .bind(subject)
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query("UPDATE papers SET question_count = ?, updated_at = ? WHERE id = ?")
            .bind(questions.len() as i64)
            .bind(Utc::now().format("%Y-%m-%d %H:%M:%S").to_string())
            .bind(paper_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(questions.len())
    }

    pub async fn questions_by_paper(&self, paper_id: i64) -> ExamResult<Vec<Question>> {
        let questions = sqlx::query_as::<_, Question>(
            "SELECT * FROM questions WHERE paper_id = ? ORDER BY question_number ASC",
        )
        .bind(paper_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(questions)
    }

    pub async fn get_question(&self, question_id: i64) -> ExamResult<Option<Question>> {
        let question = sqlx::query_as::<_, Question>("SELECT * FROM questions WHERE id = ?")
            .bind(question_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(question)
    }

    /// 赞或踩一次；题目不存在时返回 false
    pub async fn vote_question(&self, question_id: i64, vote: VoteType) -> ExamResult<bool> {
        let column = vote.column();
        let result = sqlx::query(&format!("UPDATE questions SET {} = {} + 1 WHERE id = ?", column, column))
            .bind(question_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// 记录一条题目问题反馈；题目不存在时不写入并返回 false
    pub async fn report_question(&self, question_id: i64, report: &IssueReport) -> ExamResult<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO question_reports (question_id, issue_type, description, user_id)
            SELECT id, ?, ?, ? FROM questions WHERE id = ?
            "#,
        )
        .bind(report.issue_type.as_str())
        .bind(&report.description)
        .bind(&report.user_id)
        .bind(question_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() > 0 {
            info!("题目 {} 收到问题反馈: {}", question_id, report.issue_type);
        }
        Ok(result.rows_affected() > 0)
    }

    pub async fn reports_for_question(&self, question_id: i64) -> ExamResult<Vec<QuestionReport>> {
        let reports = sqlx::query_as::<_, QuestionReport>(
            "SELECT * FROM question_reports WHERE question_id = ? ORDER BY id ASC",
        )
        .bind(question_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(reports)
    }

    pub async fn clear_all_tables(&self) -> ExamResult<()> {
        sqlx::query("DELETE FROM question_reports").execute(&self.pool).await?;
        sqlx::query("DELETE FROM questions").execute(&self.pool).await?;
        sqlx::query("DELETE FROM papers").execute(&self.pool).await?;
        info!("已清空所有数据表");
        Ok(())
    }
}

fn push_filter(query: &mut QueryBuilder<'_, Sqlite>, filter: &PaperFilter) {
    let conditions = [
        ("college", &filter.college),
        ("course", &filter.course),
        ("subject", &filter.subject),
        ("year", &filter.year),
        ("exam_type", &filter.exam_type),
        ("faculty_id", &filter.faculty_id),
    ];
    for (column, value) in conditions {
        if let Some(value) = value {
            query.push(format!(" AND {} = ", column));
            query.push_bind(value.clone());
        }
    }

    if let Some(has_solution) = filter.has_faculty_solution {
        query.push(" AND has_faculty_solution = ");
        query.push_bind(has_solution);
    }
}
