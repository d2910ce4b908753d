use crate::api::middleware::AppError;
use crate::services::database::DatabaseKind;
use sqlparser::ast::Statement;
use sqlparser::dialect::{Dialect, MySqlDialect, PostgreSqlDialect, SQLiteDialect};
use sqlparser::parser::Parser;

/// Guards the direct execution endpoint: one read-only statement at a time
pub struct SqlValidator;

impl SqlValidator {
    fn dialect_for(kind: DatabaseKind) -> Box<dyn Dialect> {
        match kind {
            DatabaseKind::Sqlite => Box::new(SQLiteDialect {}),
            DatabaseKind::PostgreSQL => Box::new(PostgreSqlDialect {}),
            DatabaseKind::MySQL => Box::new(MySqlDialect {}),
        }
    }

    /// Parse `sql` in the dialect of the target store and accept a single
    /// SELECT. Returns the statement without its trailing semicolon.
    pub fn validate_select_only(sql: &str, kind: DatabaseKind) -> Result<String, AppError> {
        let dialect = Self::dialect_for(kind);
        let ast = Parser::parse_sql(dialect.as_ref(), sql)
            .map_err(|e| AppError::InvalidSql(format!("SQL parsing error: {}", e)))?;

        let stmt = match ast.as_slice() {
            [] => return Err(AppError::InvalidSql("Empty SQL query".to_string())),
            [stmt] => stmt,
            _ => {
                return Err(AppError::InvalidSql(
                    "Multiple statements are not allowed. Send one SELECT query at a time.".to_string(),
                ))
            }
        };

        let rejected = match stmt {
            Statement::Query(_) => return Ok(sql.trim().trim_end_matches(';').trim().to_string()),
            Statement::Insert { .. } => "INSERT",
            Statement::Update { .. } => "UPDATE",
            Statement::Delete { .. } => "DELETE",
            Statement::Drop { .. } => "DROP",
            Statement::CreateTable { .. } => "CREATE TABLE",
            Statement::AlterTable { .. } => "ALTER TABLE",
            _ => "Non-SELECT",
        };

        Err(AppError::InvalidSql(format!(
            "{} statements are not allowed. Only SELECT queries are permitted.",
            rejected
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_select_only() {
        let kind = DatabaseKind::Sqlite;
        assert!(SqlValidator::validate_select_only("SELECT * FROM Vw_GI_SalesDetails", kind).is_ok());
        assert!(SqlValidator::validate_select_only("WITH t AS (SELECT 1) SELECT * FROM t", kind).is_ok());
        assert!(SqlValidator::validate_select_only("INSERT INTO users VALUES (1)", kind).is_err());
        assert!(SqlValidator::validate_select_only("UPDATE users SET name = 'x'", kind).is_err());
        assert!(SqlValidator::validate_select_only("DELETE FROM users", kind).is_err());
        assert!(SqlValidator::validate_select_only("DROP TABLE users", kind).is_err());
    }

    #[test]
    fn test_rejection_message_names_statement() {
        let err = SqlValidator::validate_select_only("DELETE FROM orders", DatabaseKind::Sqlite).unwrap_err();
        assert!(matches!(err, AppError::InvalidSql(ref msg) if msg.starts_with("DELETE statements")));
    }

    #[test]
    fn test_trailing_semicolon_is_stripped() {
        let sql = SqlValidator::validate_select_only("  SELECT CheckId FROM orders;  ", DatabaseKind::Sqlite).unwrap();
        assert_eq!(sql, "SELECT CheckId FROM orders");
    }

    #[test]
    fn test_multiple_and_empty_statements() {
        assert!(SqlValidator::validate_select_only("SELECT 1; SELECT 2", DatabaseKind::Sqlite).is_err());
        assert!(SqlValidator::validate_select_only("", DatabaseKind::Sqlite).is_err());
        assert!(SqlValidator::validate_select_only("SELEC nonsense", DatabaseKind::Sqlite).is_err());
    }

    #[test]
    fn test_dialects() {
        assert!(SqlValidator::validate_select_only("SELECT `CheckId` FROM `orders`", DatabaseKind::MySQL).is_ok());
        assert!(SqlValidator::validate_select_only("SELECT \"CheckId\" FROM orders", DatabaseKind::PostgreSQL).is_ok());
    }
}
