pub mod database;
pub mod llm;
pub mod reasoning;

pub use database::SqlDatabase;
pub use llm::{ChatMessage, LanguageModel, OpenAIChatModel};
pub use reasoning::{extract_sql, ReasoningLoop, SqlReasoningLoop};

use crate::config::SqlAgentConfig;
use crate::error::{AccordError, Result};
use crate::mcp::tools::AgentTool;
use std::sync::Arc;
use tokio::sync::OnceCell;

/// Answer returned by the SQL tool whenever anything goes wrong
pub const FALLBACK_ANSWER: &str = "I don't know?";

pub const SQL_TOOL_NAME: &str = "query_sqldb";
pub const SQL_TOOL_DESCRIPTION: &str = "Query the SQL database. Input should be a search query.";

static SQL_AGENT: OnceCell<Arc<SqlAgent>> = OnceCell::const_new();

/// Language model, database and reasoning loop behind the SQL tool
pub struct SqlAgent {
    llm: Arc<dyn LanguageModel>,
    db: SqlDatabase,
    reasoning_loop: Box<dyn ReasoningLoop>,
}

impl SqlAgent {
    pub fn new(llm: Arc<dyn LanguageModel>, db: SqlDatabase, reasoning_loop: Box<dyn ReasoningLoop>) -> Self {
        Self {
            llm,
            db,
            reasoning_loop,
        }
    }

    /// Chat model and read-only database from `[sql_agent]`
    pub async fn from_config(config: &SqlAgentConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env).map_err(|_| {
            AccordError::Config(format!(
                "Environment variable {} not set. Set it in your .env file or as an environment variable.",
                config.api_key_env
            ))
        })?;

        let llm = OpenAIChatModel::new(api_key, config.model.clone(), config.base_url.clone())?;
        let db = SqlDatabase::open(&config.db_path)?;
        log::info!(
            "SQL agent on {} with tables: {}",
            db.path().display(),
            db.usable_table_names().await?.join(", ")
        );

        Ok(Self::new(
            Arc::new(llm),
            db,
            Box::new(SqlReasoningLoop::new(config.max_iterations, config.max_rows)),
        ))
    }

    /// Run the reasoning loop, propagating failures
    pub async fn ask(&self, question: &str) -> Result<String> {
        self.reasoning_loop.run(self.llm.as_ref(), &self.db, question).await
    }

    /// Run the reasoning loop; every failure is logged and becomes [`FALLBACK_ANSWER`]
    pub async fn query(&self, question: &str) -> String {
        match self.ask(question).await {
            Ok(answer) => answer,
            Err(e) => {
                log::error!("SQL agent failed on {:?}: {}", question, e);
                FALLBACK_ANSWER.to_string()
            }
        }
    }
}

/// The process-wide agent, built from `config` on first call.
///
/// Concurrent first callers wait on one construction; a failed construction
/// leaves the slot empty so a later call can retry.
pub async fn init_global(config: &SqlAgentConfig) -> Result<Arc<SqlAgent>> {
    SQL_AGENT
        .get_or_try_init(|| async { SqlAgent::from_config(config).await.map(Arc::new) })
        .await
        .cloned()
}

/// Install a ready-made agent as the process-wide one. Returns the agent in
/// place, which is the earlier one if another was installed first.
pub fn install(agent: SqlAgent) -> Arc<SqlAgent> {
    let agent = Arc::new(agent);
    match SQL_AGENT.set(Arc::clone(&agent)) {
        Ok(()) => agent,
        Err(_) => {
            log::warn!("SQL agent already installed, keeping the existing one");
            global().unwrap_or(agent)
        }
    }
}

pub fn global() -> Option<Arc<SqlAgent>> {
    SQL_AGENT.get().cloned()
}

/// Ask the process-wide agent; [`FALLBACK_ANSWER`] when none is installed or it fails
pub async fn query_sqldb(query: &str) -> String {
    match global() {
        Some(agent) => agent.query(query).await,
        None => {
            log::error!("SQL agent not initialised; cannot answer {:?}", query);
            FALLBACK_ANSWER.to_string()
        }
    }
}

/// Tool wrapper over an agent; never returns an error
pub fn sql_tool(agent: Arc<SqlAgent>) -> AgentTool {
    AgentTool::new(SQL_TOOL_NAME, SQL_TOOL_DESCRIPTION, move |query: String| {
        let agent = Arc::clone(&agent);
        async move { Ok::<_, AccordError>(agent.query(&query).await) }
    })
}

/// Tool over the process-wide agent, built from `config` on first use.
/// A failed construction is logged and answered with [`FALLBACK_ANSWER`].
pub fn lazy_sql_tool(config: SqlAgentConfig) -> AgentTool {
    let config = Arc::new(config);
    AgentTool::new(SQL_TOOL_NAME, SQL_TOOL_DESCRIPTION, move |query: String| {
        let config = Arc::clone(&config);
        async move {
            let answer = match init_global(&config).await {
                Ok(agent) => agent.query(&query).await,
                Err(e) => {
                    log::error!("SQL agent unavailable: {}", e);
                    FALLBACK_ANSWER.to_string()
                }
            };
            Ok::<_, AccordError>(answer)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::database::tests::chinook;
    use crate::sql::reasoning::tests::ScriptedModel;
    use async_trait::async_trait;
    use tempfile::TempDir;

    struct FailingLoop;

    #[async_trait]
    impl ReasoningLoop for FailingLoop {
        async fn run(&self, _llm: &dyn LanguageModel, _db: &SqlDatabase, _question: &str) -> Result<String> {
            Err(AccordError::Sql("could not parse model output".to_string()))
        }
    }

    fn agent(temp_dir: &TempDir, replies: &[&str], reasoning_loop: Box<dyn ReasoningLoop>) -> SqlAgent {
        let db = SqlDatabase::open(&chinook(temp_dir)).unwrap();
        SqlAgent::new(Arc::new(ScriptedModel::new(replies)), db, reasoning_loop)
    }

    #[tokio::test]
    async fn test_failure_becomes_fallback() {
        let temp_dir = TempDir::new().unwrap();
        let agent = agent(&temp_dir, &[], Box::new(FailingLoop));

        assert!(agent.ask("anything").await.is_err());
        assert_eq!(agent.query("anything").await, "I don't know?");
    }

    #[tokio::test]
    async fn test_llm_failure_becomes_fallback() {
        let temp_dir = TempDir::new().unwrap();
        let agent = agent(&temp_dir, &[], Box::new(SqlReasoningLoop::new(3, 50)));
        assert_eq!(agent.query("How many artists?").await, FALLBACK_ANSWER);
    }

    #[tokio::test]
    async fn test_tool_returns_answer() {
        let temp_dir = TempDir::new().unwrap();
        let agent = agent(
            &temp_dir,
            &["SELECT COUNT(*) FROM Artist", "There are 2 artists."],
            Box::new(SqlReasoningLoop::new(3, 50)),
        );

        let tool = sql_tool(Arc::new(agent));
        assert_eq!(tool.name(), "query_sqldb");
        assert_eq!(tool.invoke("How many artists?").await.unwrap(), "There are 2 artists.");
    }

    #[tokio::test]
    async fn test_lazy_tool_without_database_falls_back() {
        let temp_dir = TempDir::new().unwrap();
        std::env::set_var("ACCORD_TEST_LAZY_SQL_KEY", "test-key");
        let config = SqlAgentConfig {
            db_path: temp_dir.path().join("absent.db"),
            api_key_env: "ACCORD_TEST_LAZY_SQL_KEY".to_string(),
            ..SqlAgentConfig::default()
        };

        let tool = lazy_sql_tool(config);
        assert_eq!(tool.invoke("How many artists?").await.unwrap(), FALLBACK_ANSWER);
        assert!(global().is_none());
    }

    #[tokio::test]
    async fn test_from_config_requires_api_key() {
        let config = SqlAgentConfig {
            api_key_env: "ACCORD_TEST_MISSING_SQL_KEY".to_string(),
            ..SqlAgentConfig::default()
        };
        assert!(matches!(SqlAgent::from_config(&config).await, Err(AccordError::Config(_))));
    }
}
