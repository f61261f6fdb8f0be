//! In-process stand-ins for the database and the assistant.

use std::sync::atomic::{AtomicUsize, Ordering};

use askdb_core::schema_discovery::{
    ColumnSchema, DatabaseSchema, SchemaBackend, SchemaBackendError, SchemaCatalog, TableSchema,
};
use askdb_core::selection_tree::{Group, Leaf, ScopeEntry, SelectionError, SelectionTree};
use askdb_core::tabular::Record;
use askdb_core::transcript::{
    AssistantBackend, AssistantBackendError, AssistantReply, ChartPoint, Metric, ResponsePayload,
};
use async_trait::async_trait;
use tracing::debug;

pub const LEDGER_DATABASE: &str = "ledger_db";

const PRIMARY_KEY: &str = "INT (Primary Key, Auto Increment)";

fn table(name: &str, columns: &[(&str, &str)]) -> TableSchema {
    TableSchema {
        name: name.to_string(),
        columns: columns
            .iter()
            .map(|(column, data_type)| ColumnSchema::new(*column, *data_type))
            .collect(),
    }
}

fn database(name: &str, tables: Vec<TableSchema>) -> DatabaseSchema {
    DatabaseSchema {
        name: name.to_string(),
        tables,
    }
}

/// The dashboard's data sources followed by the freshly connected ledger
/// database.
#[must_use]
pub fn demo_catalog() -> SchemaCatalog {
    SchemaCatalog {
        databases: vec![
            database(
                "production_db",
                vec![
                    table(
                        "users",
                        &[("id", PRIMARY_KEY), ("name", "VARCHAR(100)"), ("email", "VARCHAR(100)")],
                    ),
                    table(
                        "orders",
                        &[("id", PRIMARY_KEY), ("user_id", "INT"), ("total", "DECIMAL(10, 2)")],
                    ),
                    table(
                        "products",
                        &[("id", PRIMARY_KEY), ("title", "VARCHAR(200)"), ("price", "DECIMAL(10, 2)")],
                    ),
                    table(
                        "payments",
                        &[("id", PRIMARY_KEY), ("order_id", "INT"), ("amount", "DECIMAL(10, 2)")],
                    ),
                ],
            ),
            database(
                "analytics_db",
                vec![
                    table("page_views", &[("id", PRIMARY_KEY), ("path", "VARCHAR(255)")]),
                    table("user_sessions", &[("id", PRIMARY_KEY), ("user_id", "INT")]),
                    table("conversion_events", &[("id", PRIMARY_KEY), ("event", "VARCHAR(50)")]),
                ],
            ),
            database(
                "warehouse_db",
                vec![
                    table("inventory", &[("id", PRIMARY_KEY), ("quantity", "INT")]),
                    table("suppliers", &[("id", PRIMARY_KEY), ("name", "VARCHAR(100)")]),
                    table("shipments", &[("id", PRIMARY_KEY), ("shipped_at", "DATETIME")]),
                ],
            ),
            ledger_schema(),
        ],
    }
}

fn ledger_schema() -> DatabaseSchema {
    database(
        LEDGER_DATABASE,
        vec![
            table(
                "transactions",
                &[
                    ("id", PRIMARY_KEY),
                    ("sender_id", "INT"),
                    ("receiver_id", "INT"),
                    ("amount", "DECIMAL(10, 2)"),
                    ("currency", "VARCHAR(10)"),
                    ("transaction_date", "DATETIME"),
                    ("status", "VARCHAR(20)"),
                    ("reference", "VARCHAR(100)"),
                    ("note", "TEXT"),
                ],
            ),
            table(
                "users",
                &[
                    ("id", PRIMARY_KEY),
                    ("username", "VARCHAR(50)"),
                    ("email", "VARCHAR(100)"),
                    ("password_hash", "VARCHAR(255)"),
                    ("first_name", "VARCHAR(50)"),
                    ("last_name", "VARCHAR(50)"),
                    ("created_at", "DATETIME"),
                    ("last_login", "DATETIME"),
                    ("is_active", "BOOLEAN"),
                ],
            ),
            table(
                "accounts",
                &[
                    ("id", PRIMARY_KEY),
                    ("user_id", "INT"),
                    ("account_number", "VARCHAR(20)"),
                    ("balance", "DECIMAL(15, 2)"),
                    ("account_type", "VARCHAR(20)"),
                    ("created_at", "DATETIME"),
                ],
            ),
            table(
                "audit_logs",
                &[
                    ("id", PRIMARY_KEY),
                    ("user_id", "INT"),
                    ("action", "VARCHAR(100)"),
                    ("timestamp", "DATETIME"),
                    ("ip_address", "VARCHAR(45)"),
                ],
            ),
        ],
    )
}

/// Serves [`demo_catalog`], or a fixed error when built with
/// [`MockSchemaBackend::failing`].
#[derive(Debug, Default)]
pub struct MockSchemaBackend {
    failure: Option<String>,
    fetches: AtomicUsize,
}

impl MockSchemaBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            failure: Some(message.into()),
            fetches: AtomicUsize::new(0),
        }
    }

    #[must_use]
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SchemaBackend for MockSchemaBackend {
    async fn fetch_schema(&self) -> Result<SchemaCatalog, SchemaBackendError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        match &self.failure {
            Some(message) => Err(SchemaBackendError::new(message.clone())),
            None => Ok(demo_catalog()),
        }
    }
}

/// Databases the chat starts with: `production_db` open and mostly
/// selected, everything else off. Databases missing from `catalog` are
/// skipped, and the ledger database is left to the schema setup step.
pub fn initial_data_sources(catalog: &SchemaCatalog) -> Result<SelectionTree, SelectionError> {
    let groups = catalog
        .databases
        .iter()
        .filter(|database| database.name != LEDGER_DATABASE)
        .map(|database| {
            let primary = database.name == "production_db";
            Group {
                name: database.name.clone(),
                selected: primary,
                expanded: primary,
                leaves: database
                    .tables
                    .iter()
                    .map(|table| Leaf::new(table.name.clone(), primary && table.name != "products"))
                    .collect(),
            }
        })
        .collect();
    SelectionTree::new(groups)
}

/// Tables and columns offered after connecting: everything included except
/// the audit log table and password hashes.
pub fn initial_column_selection(database: &DatabaseSchema) -> Result<SelectionTree, SelectionError> {
    let groups = database
        .tables
        .iter()
        .map(|table| Group {
            name: table.name.clone(),
            selected: table.name != "audit_logs",
            expanded: false,
            leaves: table
                .columns
                .iter()
                .map(|column| Leaf {
                    name: column.name.clone(),
                    selected: column.name != "password_hash",
                    annotation: column.description.clone(),
                    data_type: Some(column.data_type.clone()),
                })
                .collect(),
        })
        .collect();
    SelectionTree::new(groups)
}

const DEMO_USERS: [(&str, &str, &str, &str); 10] = [
    ("John Doe", "john@example.com", "Admin", "Active"),
    ("Jane Smith", "jane@example.com", "User", "Active"),
    ("Bob Johnson", "bob@example.com", "User", "Inactive"),
    ("Alice Brown", "alice@example.com", "Moderator", "Active"),
    ("Charlie Wilson", "charlie@example.com", "User", "Active"),
    ("Diana Prince", "diana@example.com", "Admin", "Active"),
    ("Edward Norton", "edward@example.com", "User", "Inactive"),
    ("Fiona Green", "fiona@example.com", "Moderator", "Active"),
    ("George Miller", "george@example.com", "User", "Active"),
    ("Hannah Lee", "hannah@example.com", "User", "Inactive"),
];

#[must_use]
pub fn demo_user_records() -> Vec<Record> {
    DEMO_USERS
        .iter()
        .zip(1_u32..)
        .map(|((name, email, role, status), id)| {
            Record::new()
                .with("id", id)
                .with("name", *name)
                .with("email", *email)
                .with("role", *role)
                .with("status", *status)
        })
        .collect()
}

#[must_use]
pub fn demo_chart() -> Vec<ChartPoint> {
    [
        ("Jan", 4000.0, 240.0),
        ("Feb", 3000.0, 139.0),
        ("Mar", 2000.0, 980.0),
        ("Apr", 2780.0, 390.0),
        ("May", 1890.0, 480.0),
        ("Jun", 2390.0, 380.0),
    ]
    .into_iter()
    .map(|(label, revenue, users)| ChartPoint {
        label: label.to_string(),
        series: vec![("revenue".to_string(), revenue), ("users".to_string(), users)],
    })
    .collect()
}

#[must_use]
pub fn demo_metrics() -> Vec<Metric> {
    [
        ("Total Revenue", "$45,230"),
        ("Total Users", "1247"),
        ("Active Users", "892"),
        ("Conversion Rate", "3.2%"),
    ]
    .into_iter()
    .map(|(label, value)| Metric {
        label: label.to_string(),
        value: value.to_string(),
    })
    .collect()
}

/// Cycles table, chart and metrics replies so a session sees each kind.
#[derive(Debug, Default)]
pub struct MockAssistant {
    turn: AtomicUsize,
}

impl MockAssistant {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AssistantBackend for MockAssistant {
    async fn respond(
        &self,
        prompt: &str,
        scope: &[ScopeEntry],
    ) -> Result<AssistantReply, AssistantBackendError> {
        if scope.is_empty() {
            return Err(AssistantBackendError::new(
                "no tables in scope, pick data sources first",
            ));
        }

        let turn = self.turn.fetch_add(1, Ordering::SeqCst);
        debug!(turn, prompt, "mock assistant responding");
        let reply = match turn % 3 {
            0 => AssistantReply {
                content: "Here are the users from your database:".to_string(),
                payload: Some(ResponsePayload::Table(demo_user_records())),
            },
            1 => AssistantReply {
                content: "Here's your revenue and user growth over the last 6 months:"
                    .to_string(),
                payload: Some(ResponsePayload::Chart(demo_chart())),
            },
            _ => AssistantReply {
                content: "Here are your key metrics:".to_string(),
                payload: Some(ResponsePayload::Metrics(demo_metrics())),
            },
        };
        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use askdb_core::schema_discovery::SchemaBackend;
    use askdb_core::selection_tree::{ScopeEntry, SelectionCounts, TriState};
    use askdb_core::transcript::{AssistantBackend, ResponsePayload};

    use super::{
        demo_catalog, demo_user_records, initial_column_selection, initial_data_sources,
        MockAssistant, MockSchemaBackend, LEDGER_DATABASE,
    };

    #[test]
    fn initial_data_sources_match_the_dashboard() {
        let tree = initial_data_sources(&demo_catalog()).expect("valid tree");

        assert_eq!(tree.groups().len(), 3);
        assert_eq!(
            tree.counts(),
            SelectionCounts {
                groups: 1,
                leaves: 3
            }
        );
        assert_eq!(
            tree.group_state("production_db").expect("known group"),
            TriState::Partial
        );
        assert!(tree
            .group("production_db")
            .expect("known group")
            .expanded);
        assert_eq!(
            tree.counts().describe("database", "table"),
            "1 database(s) and 3 table(s)"
        );
    }

    #[test]
    fn initial_column_selection_excludes_audit_logs_and_hashes() {
        let catalog = demo_catalog();
        let ledger = catalog
            .database(LEDGER_DATABASE)
            .expect("ledger database present");
        let tree = initial_column_selection(ledger).expect("valid tree");

        assert_eq!(
            tree.counts(),
            SelectionCounts {
                groups: 3,
                leaves: 9 + 8 + 6
            }
        );
        assert!(!tree
            .is_leaf_effective("users", "password_hash")
            .expect("known leaf"));
        assert!(!tree
            .is_leaf_effective("audit_logs", "action")
            .expect("known leaf"));
        assert_eq!(
            tree.groups()[0].leaves[0].data_type.as_deref(),
            Some("INT (Primary Key, Auto Increment)")
        );
    }

    #[tokio::test]
    async fn schema_backend_counts_fetches_and_can_fail() {
        let backend = MockSchemaBackend::new();
        let catalog = backend.fetch_schema().await.expect("mock schema");
        assert_eq!(catalog.databases.len(), 4);
        assert_eq!(backend.fetch_count(), 1);

        let failing = MockSchemaBackend::failing("connection refused");
        let error = failing.fetch_schema().await.expect_err("failing backend");
        assert_eq!(error.to_string(), "connection refused");
    }

    #[tokio::test]
    async fn assistant_rotates_payload_kinds() {
        let assistant = MockAssistant::new();
        let scope = vec![ScopeEntry {
            group: "production_db".to_string(),
            leaf: "users".to_string(),
        }];

        let mut kinds = Vec::new();
        for _ in 0..4 {
            let reply = assistant
                .respond("show me something", &scope)
                .await
                .expect("mock reply");
            kinds.push(match reply.payload {
                Some(ResponsePayload::Table(_)) => "table",
                Some(ResponsePayload::Chart(_)) => "chart",
                Some(ResponsePayload::Metrics(_)) => "metrics",
                None => "none",
            });
        }
        assert_eq!(kinds, vec!["table", "chart", "metrics", "table"]);
    }

    #[tokio::test]
    async fn assistant_refuses_an_empty_scope() {
        let error = MockAssistant::new()
            .respond("anything", &[])
            .await
            .expect_err("empty scope should fail");
        assert!(error.to_string().contains("no tables in scope"));
    }

    #[test]
    fn demo_users_have_sequential_ids() {
        let records = demo_user_records();
        assert_eq!(records.len(), 10);
        assert_eq!(
            records[3].get("name").map(ToString::to_string).as_deref(),
            Some("Alice Brown")
        );
        assert_eq!(
            records[9].get("id").map(ToString::to_string).as_deref(),
            Some("10")
        );
    }
}
