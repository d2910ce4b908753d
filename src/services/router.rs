// Decides which database a generated statement runs against
use crate::models::{QueryPlan, TableGroup};
use crate::services::catalog::TableIndex;
use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

/// Join keywords that trigger the multi-table check
pub const JOIN_KEYWORDS: [&str; 4] = ["join", "inner join", "left join", "cross join"];

static TABLE_REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:from|join)\s+(\w+)").expect("table reference pattern is valid")
});

static IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\w+").expect("identifier pattern is valid"));

/// Finds the table identifiers a statement reads from.
///
/// Swap the implementation to get a parser-backed scan.
pub trait TableReferenceExtractor: Send + Sync {
    /// Candidate identifiers in order of appearance, without duplicates
    fn extract_referenced_tables(&self, sql: &str) -> Vec<String>;
}

/// Token scan for identifiers following `FROM` or `JOIN`.
///
/// Knows nothing about quoting, subqueries or CTEs, and cannot tell an alias
/// from a table name. Schema-qualified names yield only the schema part.
#[derive(Debug, Clone, Copy, Default)]
pub struct LexicalTableExtractor;

impl TableReferenceExtractor for LexicalTableExtractor {
    fn extract_referenced_tables(&self, sql: &str) -> Vec<String> {
        let mut seen = HashSet::new();
        TABLE_REFERENCE
            .captures_iter(sql)
            .filter_map(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
            .filter(|name| seen.insert(name.to_lowercase()))
            .collect()
    }
}

pub struct DatabaseRouter {
    extractor: Box<dyn TableReferenceExtractor>,
}

impl Default for DatabaseRouter {
    fn default() -> Self {
        Self::new(Box::new(LexicalTableExtractor))
    }
}

impl DatabaseRouter {
    pub fn new(extractor: Box<dyn TableReferenceExtractor>) -> Self {
        Self { extractor }
    }

    /// Classify one statement. Never fails: anything unrecognised goes to
    /// the default database.
    pub fn resolve(&self, statement: &str, index: &TableIndex) -> QueryPlan {
        let lowered = statement.to_lowercase();

        if JOIN_KEYWORDS.iter().any(|keyword| lowered.contains(keyword)) {
            let groups = self.group_by_database(statement, index);
            if groups.len() > 1 {
                tracing::info!(
                    "Cross-database join across {}",
                    groups
                        .iter()
                        .map(|g| g.database.as_str())
                        .collect::<Vec<_>>()
                        .join(", ")
                );
                return QueryPlan::CrossDatabaseJoin {
                    statement: statement.to_string(),
                    groups,
                };
            }
        }

        if let Some(database) = Self::first_known_table(&lowered, index) {
            tracing::debug!("Routing statement to {}", database);
            return QueryPlan::Single {
                statement: statement.to_string(),
                database: database.to_string(),
            };
        }

        let database = index.default_database();
        tracing::warn!(
            "No known table in statement, falling back to default database {}",
            database
        );
        QueryPlan::Single {
            statement: statement.to_string(),
            database: database.to_string(),
        }
    }

    /// Referenced tables grouped by owning database, in first-discovered order.
    /// Tables carry the spelling their database uses. Identifiers missing
    /// from the index are ignored.
    pub fn group_by_database(&self, statement: &str, index: &TableIndex) -> Vec<TableGroup> {
        let mut groups: Vec<TableGroup> = Vec::new();
        for table in self.extractor.extract_referenced_tables(statement) {
            let Some(location) = index.locate(&table) else {
                continue;
            };
            match groups.iter_mut().find(|g| g.database == location.database) {
                Some(group) => {
                    if !group.tables.contains(&location.name) {
                        group.tables.push(location.name.clone());
                    }
                }
                None => groups.push(TableGroup {
                    database: location.database.clone(),
                    tables: vec![location.name.clone()],
                }),
            }
        }
        groups
    }

    /// Database of the first indexed table that appears as a whole word
    fn first_known_table<'a>(lowered: &str, index: &'a TableIndex) -> Option<&'a str> {
        let tokens: HashSet<&str> = IDENTIFIER.find_iter(lowered).map(|m| m.as_str()).collect();
        index
            .entries()
            .iter()
            .find(|entry| tokens.contains(entry.key.as_str()))
            .map(|entry| entry.database.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index() -> TableIndex {
        TableIndex::from_tables(vec![
            (
                "DB1",
                vec!["Vw_GI_SalesDetails".to_string(), "orders".to_string()],
            ),
            ("DB2", vec!["sites".to_string(), "refunds".to_string()]),
        ])
        .unwrap()
    }

    #[test]
    fn test_extract_referenced_tables() {
        let extractor = LexicalTableExtractor;
        let tables = extractor.extract_referenced_tables(
            "SELECT o.CheckId FROM orders o INNER JOIN sites s ON o.SiteCode = s.SiteCode JOIN orders x ON 1=1",
        );
        assert_eq!(tables, vec!["orders", "sites"]);
    }

    #[test]
    fn test_extract_needs_keyword_boundary() {
        let extractor = LexicalTableExtractor;
        let tables = extractor.extract_referenced_tables("SELECT validfrom FROM orders");
        assert_eq!(tables, vec!["orders"]);
    }

    #[test]
    fn test_cross_database_join_detected() {
        let router = DatabaseRouter::default();
        let plan = router.resolve(
            "SELECT * FROM orders INNER JOIN sites ON orders.SiteCode = sites.SiteCode",
            &index(),
        );
        match plan {
            QueryPlan::CrossDatabaseJoin { groups, .. } => {
                assert_eq!(
                    groups,
                    vec![
                        TableGroup { database: "DB1".to_string(), tables: vec!["orders".to_string()] },
                        TableGroup { database: "DB2".to_string(), tables: vec!["sites".to_string()] },
                    ]
                );
            }
            other => panic!("expected cross-database plan, got {:?}", other),
        }
    }

    #[test]
    fn test_same_database_join_runs_directly() {
        let router = DatabaseRouter::default();
        let plan = router.resolve(
            "SELECT * FROM sites LEFT JOIN refunds ON sites.SiteCode = refunds.SiteCode",
            &index(),
        );
        assert_eq!(
            plan,
            QueryPlan::Single {
                statement: "SELECT * FROM sites LEFT JOIN refunds ON sites.SiteCode = refunds.SiteCode"
                    .to_string(),
                database: "DB2".to_string(),
            }
        );
    }

    #[test]
    fn test_repeated_table_routes_to_owner() {
        let router = DatabaseRouter::default();
        let plan = router.resolve(
            "SELECT COUNT(*) FROM refunds WHERE CheckId IN (SELECT CheckId FROM refunds)",
            &index(),
        );
        assert!(matches!(plan, QueryPlan::Single { ref database, .. } if database == "DB2"));
    }

    #[test]
    fn test_unknown_table_falls_back_to_default() {
        let router = DatabaseRouter::default();
        let plan = router.resolve("SELECT 1 FROM dual", &index());
        assert!(matches!(plan, QueryPlan::Single { ref database, .. } if database == "DB1"));
    }

    #[test]
    fn test_table_match_is_case_insensitive() {
        let router = DatabaseRouter::default();
        let plan = router.resolve("SELECT CheckId, Date FROM VW_GI_SALESDETAILS;", &index());
        assert!(matches!(plan, QueryPlan::Single { ref database, .. } if database == "DB1"));
    }

    #[test]
    fn test_table_name_inside_identifier_is_not_a_match() {
        // "sites" only appears inside a longer identifier
        let router = DatabaseRouter::default();
        let plan = router.resolve("SELECT total_sites FROM summary", &index());
        assert!(matches!(plan, QueryPlan::Single { ref database, .. } if database == "DB1"));
    }

    #[test]
    fn test_first_indexed_table_wins_without_join() {
        // Both databases appear, but without a join keyword the first indexed table decides
        let router = DatabaseRouter::default();
        let plan = router.resolve(
            "SELECT SiteCode FROM sites WHERE SiteCode IN (SELECT SiteCode FROM orders)",
            &index(),
        );
        assert!(matches!(plan, QueryPlan::Single { ref database, .. } if database == "DB1"));
    }

    #[test]
    fn test_join_keyword_inside_identifier_still_checks() {
        // "joined_at" trips the keyword test but only one database is referenced
        let router = DatabaseRouter::default();
        let plan = router.resolve("SELECT joined_at FROM sites", &index());
        assert!(matches!(plan, QueryPlan::Single { ref database, .. } if database == "DB2"));
    }

    #[test]
    fn test_groups_keep_database_spelling() {
        let index = TableIndex::from_tables(vec![
            ("A", vec!["Vw_GI_SalesDetails".to_string()]),
            ("B", vec!["Vw_GI_CompanyMaster".to_string()]),
        ])
        .unwrap();
        let router = DatabaseRouter::default();
        let plan = router.resolve(
            "select * from vw_gi_salesdetails d join VW_GI_COMPANYMASTER m on d.CompanyCode = m.CompanyCode",
            &index,
        );
        match plan {
            QueryPlan::CrossDatabaseJoin { groups, .. } => {
                assert_eq!(groups[0].tables, vec!["Vw_GI_SalesDetails".to_string()]);
                assert_eq!(groups[1].tables, vec!["Vw_GI_CompanyMaster".to_string()]);
            }
            other => panic!("expected cross-database plan, got {:?}", other),
        }
    }

    struct FixedExtractor(Vec<&'static str>);

    impl TableReferenceExtractor for FixedExtractor {
        fn extract_referenced_tables(&self, _sql: &str) -> Vec<String> {
            self.0.iter().map(|s| s.to_string()).collect()
        }
    }

    #[test]
    fn test_extractor_is_pluggable() {
        let router = DatabaseRouter::new(Box::new(FixedExtractor(vec!["refunds", "orders"])));
        let plan = router.resolve("SELECT * FROM a JOIN b ON a.id = b.id", &index());
        match plan {
            QueryPlan::CrossDatabaseJoin { groups, .. } => {
                assert_eq!(groups[0].database, "DB2");
                assert_eq!(groups[1].database, "DB1");
            }
            other => panic!("expected cross-database plan, got {:?}", other),
        }
    }
}
