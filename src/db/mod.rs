use crate::errors::{AppError, AppResult};
use crate::models::{Column, ColumnValue, CompanyProfile, Post, PostStatus, PostWithCompany};
use crate::query::{FeedQuery, Predicate};
use crate::store::{PostStore, StoreFuture};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Value;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use uuid::Uuid;

const SCHEMA_SQL: &str = include_str!("schema.sql");

const SELECT_POSTS: &str = "SELECT p.id, p.company_id, p.title, p.description, p.reward, p.status, p.created_at,
        c.id, c.name, c.email, c.avatar_url, c.website, c.legal_business_name, c.phone_number, c.created_at
     FROM posts p
     LEFT JOIN company_profiles c ON c.id = p.company_id";

#[derive(Debug)]
pub struct Database {
    conn: Mutex<Connection>,
    db_path: PathBuf,
}

impl Database {
    pub fn new(path: &Path) -> AppResult<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| AppError::Io(err.to_string()))?;
        }
        let conn = Connection::open(path).map_err(AppError::from)?;
        conn.execute_batch(SCHEMA_SQL).map_err(AppError::from)?;

        Ok(Self {
            conn: Mutex::new(conn),
            db_path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.db_path
    }

    fn lock(&self) -> AppResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| AppError::Internal("database mutex poisoned".to_string()))
    }

    pub fn insert_company(&self, company: &CompanyProfile) -> AppResult<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO company_profiles (
               id, name, email, avatar_url, website, legal_business_name, phone_number, created_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT(id) DO UPDATE SET
               name = excluded.name,
               email = excluded.email,
               avatar_url = excluded.avatar_url,
               website = excluded.website,
               legal_business_name = excluded.legal_business_name,
               phone_number = excluded.phone_number",
            params![
                company.id,
                company.name,
                company.email,
                company.avatar_url,
                company.website,
                company.legal_business_name,
                company.phone_number,
                format_time(company.created_at),
            ],
        )?;
        Ok(())
    }

    pub fn insert_post(&self, post: &Post) -> AppResult<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO posts (id, company_id, title, description, reward, status, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                post.id,
                post.company_id,
                post.title,
                post.description,
                post.reward,
                post.status.as_str(),
                format_time(post.created_at),
            ],
        )?;
        Ok(())
    }

    pub fn create_post(
        &self,
        company_id: &str,
        title: &str,
        description: &str,
        reward: i64,
        status: PostStatus,
    ) -> AppResult<Post> {
        let post = Post {
            id: Uuid::new_v4().to_string(),
            company_id: company_id.to_string(),
            title: title.to_string(),
            description: description.to_string(),
            reward,
            status,
            created_at: truncate_to_micros(Utc::now()),
        };
        self.insert_post(&post)?;
        Ok(post)
    }

    pub fn get_post(&self, post_id: &str) -> AppResult<Option<PostWithCompany>> {
        let conn = self.lock()?;
        conn.query_row(&format!("{} WHERE p.id = ?1", SELECT_POSTS), [post_id], parse_post_row)
            .optional()
            .map_err(AppError::from)
    }

    pub fn select_posts(&self, query: &FeedQuery) -> AppResult<Vec<PostWithCompany>> {
        let mut sql = String::from(SELECT_POSTS);
        let mut params_vec: Vec<Value> = Vec::new();

        sql.push_str(" WHERE ");
        render_predicate(&query.predicate, &mut sql, &mut params_vec);

        if !query.sort.is_empty() {
            let order = query
                .sort
                .iter()
                .map(|clause| {
                    format!(
                        "{} {}",
                        column_sql(clause.column),
                        if clause.ascending { "ASC" } else { "DESC" }
                    )
                })
                .collect::<Vec<_>>()
                .join(", ");
            sql.push_str(" ORDER BY ");
            sql.push_str(&order);
        }

        sql.push_str(" LIMIT ?");
        params_vec.push(Value::Integer(i64::from(query.limit)));

        tracing::trace!(sql = %sql, params = params_vec.len(), "executing feed query");

        let conn = self.lock()?;
        let mut statement = conn.prepare(&sql)?;
        let rows = statement.query_map(rusqlite::params_from_iter(params_vec), parse_post_row)?;
        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }
}

impl PostStore for Database {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn query<'a>(&'a self, query: &'a FeedQuery) -> StoreFuture<'a> {
        Box::pin(async move { self.select_posts(query) })
    }
}

fn column_sql(column: Column) -> &'static str {
    match column {
        Column::Id => "p.id",
        Column::CompanyId => "p.company_id",
        Column::CreatedAt => "p.created_at",
        Column::Reward => "p.reward",
        Column::Status => "p.status",
    }
}

fn render_predicate(predicate: &Predicate, sql: &mut String, params_vec: &mut Vec<Value>) {
    match predicate {
        Predicate::Compare { column, op, value } => {
            sql.push_str(column_sql(*column));
            sql.push(' ');
            sql.push_str(op.as_sql());
            sql.push_str(" ?");
            params_vec.push(to_sql_value(value));
        }
        Predicate::In { column, values } => {
            if values.is_empty() {
                sql.push_str("1 = 0");
                return;
            }
            sql.push_str(column_sql(*column));
            sql.push_str(" IN (");
            sql.push_str(&vec!["?"; values.len()].join(", "));
            sql.push(')');
            params_vec.extend(values.iter().map(to_sql_value));
        }
        Predicate::And(parts) => render_group(parts, " AND ", "1 = 1", sql, params_vec),
        Predicate::Or(parts) => render_group(parts, " OR ", "1 = 0", sql, params_vec),
    }
}

fn render_group(
    parts: &[Predicate],
    separator: &str,
    empty: &str,
    sql: &mut String,
    params_vec: &mut Vec<Value>,
) {
    if parts.is_empty() {
        sql.push_str(empty);
        return;
    }
    sql.push('(');
    for (index, part) in parts.iter().enumerate() {
        if index > 0 {
            sql.push_str(separator);
        }
        render_predicate(part, sql, params_vec);
    }
    sql.push(')');
}

fn to_sql_value(value: &ColumnValue) -> Value {
    match value {
        ColumnValue::Timestamp(at) => Value::Text(format_time(*at)),
        ColumnValue::Integer(number) => Value::Integer(*number),
        ColumnValue::Text(text) => Value::Text(text.clone()),
    }
}

// Fixed-width UTC text so lexical order in SQLite matches chronological order.
fn format_time(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn truncate_to_micros(at: DateTime<Utc>) -> DateTime<Utc> {
    let raw = format_time(at);
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(at)
}

fn parse_post_row(row: &Row<'_>) -> rusqlite::Result<PostWithCompany> {
    let post = Post {
        id: row.get(0)?,
        company_id: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        reward: row.get(4)?,
        status: parse_status(&row.get::<_, String>(5)?)?,
        created_at: parse_time(&row.get::<_, String>(6)?)?,
    };

    let company = match row.get::<_, Option<String>>(7)? {
        Some(id) => Some(CompanyProfile {
            id,
            name: row.get(8)?,
            email: row.get(9)?,
            avatar_url: row.get(10)?,
            website: row.get(11)?,
            legal_business_name: row.get(12)?,
            phone_number: row.get(13)?,
            created_at: parse_time(&row.get::<_, String>(14)?)?,
        }),
        None => None,
    };

    Ok(PostWithCompany { post, company })
}

fn parse_status(raw: &str) -> rusqlite::Result<PostStatus> {
    raw.parse::<PostStatus>().map_err(|error| {
        rusqlite::Error::FromSqlConversionFailure(
            5,
            rusqlite::types::Type::Text,
            Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, error.to_string())),
        )
    })
}

fn parse_time(raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|error| {
            rusqlite::Error::FromSqlConversionFailure(
                0,
                rusqlite::types::Type::Text,
                Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, error.to_string())),
            )
        })
}
