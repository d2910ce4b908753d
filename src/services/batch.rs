// Turns a model response into executed statements
use crate::models::{ExecutedStatement, QueryPlan};
use crate::services::catalog::TableIndex;
use crate::services::executor::QueryExecutor;
use crate::services::router::DatabaseRouter;
use crate::services::splitter::CrossDatabaseSplitter;
use regex::Regex;
use std::sync::LazyLock;

static CODE_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)```[a-z]*").expect("code fence pattern is valid"));

/// Header and narration lines models like to wrap their SQL in
static NARRATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)(?:###|Query \d+:|To compare|I will generate|These queries).*$")
        .expect("narration pattern is valid")
});

/// Split a raw model response into candidate SELECT statements.
///
/// `--` comment lines are removed from every fragment. Fragments left blank,
/// or lacking a SELECT, are dropped without notice.
pub fn extract_statements(raw: &str) -> Vec<String> {
    let without_fences = CODE_FENCE.replace_all(raw.trim(), "");
    let cleaned = NARRATION.replace_all(&without_fences, "");

    cleaned
        .split(';')
        .map(strip_comment_lines)
        .filter(|fragment| !fragment.is_empty())
        .filter(|fragment| fragment.to_uppercase().contains("SELECT"))
        .collect()
}

fn strip_comment_lines(fragment: &str) -> String {
    fragment
        .lines()
        .filter(|line| !line.trim_start().starts_with("--"))
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

/// Routes, splits and executes a batch of statements in order
pub struct BatchProcessor {
    router: DatabaseRouter,
    splitter: CrossDatabaseSplitter,
    executor: QueryExecutor,
    split_cross_database: bool,
}

impl BatchProcessor {
    pub fn new(router: DatabaseRouter, splitter: CrossDatabaseSplitter, executor: QueryExecutor) -> Self {
        Self {
            router,
            splitter,
            executor,
            split_cross_database: true,
        }
    }

    /// When off, a cross-database statement is reported as a join error
    /// instead of being split.
    pub fn with_splitting(mut self, enabled: bool) -> Self {
        self.split_cross_database = enabled;
        self
    }

    /// Execute every statement sequentially. A cross-database statement is
    /// replaced in the output by its split queries and their results.
    pub async fn process_batch(&self, statements: &[String], index: &TableIndex) -> Vec<ExecutedStatement> {
        let mut executed = Vec::with_capacity(statements.len());

        for statement in statements {
            let plan = self.router.resolve(statement, index);
            match &plan {
                QueryPlan::CrossDatabaseJoin { statement, groups } if self.split_cross_database => {
                    for split in self.splitter.split(statement, groups) {
                        let result = self.executor.execute(&split.statement, &split.database).await;
                        executed.push(ExecutedStatement {
                            statement: split.statement,
                            database: split.database,
                            result,
                            split: true,
                        });
                    }
                }
                _ => {
                    let result = self.executor.execute_plan(&plan).await;
                    executed.push(ExecutedStatement {
                        statement: plan.statement().to_string(),
                        database: plan.target(),
                        result,
                        split: false,
                    });
                }
            }
        }

        tracing::info!(
            "Executed {} statements from a batch of {}",
            executed.len(),
            statements.len()
        );
        executed
    }
}
