use super::database::SqlDatabase;
use super::llm::{ChatMessage, LanguageModel};
use crate::error::{AccordError, Result};
use async_trait::async_trait;
use regex::Regex;
use std::sync::OnceLock;

/// Turns a natural-language question into an answer using the model and the database
#[async_trait]
pub trait ReasoningLoop: Send + Sync {
    async fn run(&self, llm: &dyn LanguageModel, db: &SqlDatabase, question: &str) -> Result<String>;
}

const SQL_SYSTEM_PROMPT: &str = "You are a SQLite expert. Given a question, write one syntactically \
correct SQLite SELECT query that answers it. Only use the tables and columns below. \
Reply with the query only, in a ```sql code block.";

/// Schema, then query, then phrase the rows as an answer.
///
/// A failing query is sent back to the model with the error text, up to
/// `max_iterations` attempts in total.
#[derive(Debug, Clone)]
pub struct SqlReasoningLoop {
    pub max_iterations: usize,
    pub max_rows: usize,
}

impl SqlReasoningLoop {
    pub fn new(max_iterations: usize, max_rows: usize) -> Self {
        Self {
            max_iterations: max_iterations.max(1),
            max_rows,
        }
    }
}

#[async_trait]
impl ReasoningLoop for SqlReasoningLoop {
    async fn run(&self, llm: &dyn LanguageModel, db: &SqlDatabase, question: &str) -> Result<String> {
        let schema = db.table_info().await?;
        let mut messages = vec![
            ChatMessage::system(format!("{}\n\n{}", SQL_SYSTEM_PROMPT, schema)),
            ChatMessage::user(question),
        ];

        for attempt in 1..=self.max_iterations {
            let reply = llm.complete(&messages).await?;
            let sql = extract_sql(&reply)
                .ok_or_else(|| AccordError::Sql("model reply contained no SQL".to_string()))?;
            messages.push(ChatMessage::assistant(reply.clone()));

            match db.run(&sql, self.max_rows).await {
                Ok(rows) => {
                    log::debug!("SQL attempt {} succeeded: {}", attempt, sql);
                    messages.push(ChatMessage::user(format!(
                        "Query result:\n{}\n\nUsing only this result, answer the question: {}",
                        rows, question
                    )));
                    let answer = llm.complete(&messages).await?;
                    let answer = answer.trim();
                    if answer.is_empty() {
                        return Err(AccordError::Sql("model returned an empty answer".to_string()));
                    }
                    return Ok(answer.to_string());
                }
                Err(e) => {
                    log::debug!("SQL attempt {} failed: {}", attempt, e);
                    messages.push(ChatMessage::user(format!(
                        "The query failed: {}\nWrite a corrected query.",
                        e
                    )));
                }
            }
        }

        Err(AccordError::Sql(format!(
            "no working query after {} attempt(s)",
            self.max_iterations
        )))
    }
}

fn fence_regex() -> &'static Regex {
    static FENCE: OnceLock<Regex> = OnceLock::new();
    FENCE.get_or_init(|| {
        Regex::new(r"(?s)```[A-Za-z]*[ \t]*\n?(.*?)```").expect("Invalid regex pattern")
    })
}

/// SQL from a model reply: the first fenced block if any, else the whole text
pub fn extract_sql(reply: &str) -> Option<String> {
    let body = fence_regex()
        .captures(reply)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .unwrap_or(reply);

    let body = body.trim();
    let body = body.strip_prefix("SQLQuery:").unwrap_or(body).trim();
    if body.is_empty() {
        None
    } else {
        Some(body.to_string())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::sql::database::tests::chinook;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Replays canned replies and records every conversation it was shown
    pub(crate) struct ScriptedModel {
        replies: Mutex<Vec<String>>,
        pub(crate) seen: Mutex<Vec<Vec<ChatMessage>>>,
    }

    impl ScriptedModel {
        pub(crate) fn new(replies: &[&str]) -> Self {
            Self {
                replies: Mutex::new(replies.iter().rev().map(|r| r.to_string()).collect()),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl LanguageModel for ScriptedModel {
        fn model(&self) -> &str {
            "scripted"
        }

        async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
            self.seen.lock().unwrap().push(messages.to_vec());
            self.replies
                .lock()
                .unwrap()
                .pop()
                .ok_or_else(|| AccordError::Llm("script exhausted".to_string()))
        }
    }

    #[test]
    fn test_extract_sql() {
        assert_eq!(extract_sql("```sql\nSELECT 1;\n```").as_deref(), Some("SELECT 1;"));
        assert_eq!(extract_sql("Sure:\n```\nSELECT 2\n```\nDone").as_deref(), Some("SELECT 2"));
        assert_eq!(extract_sql("SQLQuery: SELECT 3").as_deref(), Some("SELECT 3"));
        assert_eq!(extract_sql("  SELECT 4  ").as_deref(), Some("SELECT 4"));
        assert_eq!(extract_sql("```sql\n```"), None);
    }

    #[tokio::test]
    async fn test_answers_from_rows() {
        let temp_dir = TempDir::new().unwrap();
        let db = SqlDatabase::open(&chinook(&temp_dir)).unwrap();
        let model = ScriptedModel::new(&[
            "```sql\nSELECT DISTINCT g.Name FROM Track t JOIN Genre g ON g.GenreId = t.GenreId \
             JOIN Artist a ON a.ArtistId = t.ArtistId WHERE a.Name = 'Alanis Morissette' ORDER BY g.Name\n```",
            "Pop and Rock.",
        ]);

        let answer = SqlReasoningLoop::new(3, 50)
            .run(&model, &db, "What are all the genres of Alanis Morissette songs?")
            .await
            .unwrap();
        assert_eq!(answer, "Pop and Rock.");

        let seen = model.seen.lock().unwrap();
        assert!(seen[0][0].content.contains("CREATE TABLE Genre"));
        assert!(seen[1].last().unwrap().content.contains("Pop\nRock"));
    }

    #[tokio::test]
    async fn test_sql_error_fed_back() {
        let temp_dir = TempDir::new().unwrap();
        let db = SqlDatabase::open(&chinook(&temp_dir)).unwrap();
        let model = ScriptedModel::new(&[
            "SELECT Title FROM Artist",
            "SELECT Name FROM Artist ORDER BY ArtistId",
            "Alanis Morissette and AC/DC.",
        ]);

        let answer = SqlReasoningLoop::new(3, 50)
            .run(&model, &db, "Which artists are there?")
            .await
            .unwrap();
        assert_eq!(answer, "Alanis Morissette and AC/DC.");

        let seen = model.seen.lock().unwrap();
        assert!(seen[1].last().unwrap().content.starts_with("The query failed"));
    }

    #[tokio::test]
    async fn test_gives_up_after_max_iterations() {
        let temp_dir = TempDir::new().unwrap();
        let db = SqlDatabase::open(&chinook(&temp_dir)).unwrap();
        let model = ScriptedModel::new(&["DROP TABLE Artist", "SELECT nope FROM Artist"]);

        let result = SqlReasoningLoop::new(2, 50).run(&model, &db, "Break it").await;
        assert!(matches!(result, Err(AccordError::Sql(_))));
        assert_eq!(model.seen.lock().unwrap().len(), 2);
    }
}
