//! Statement creation, rewriting and result cursor filtering.

mod support;

use std::sync::Arc;

use pretty_assertions::assert_eq;
use sluice_core::{
    ConnectOptions, Connection, Driver, Error, FailurePolicy, PreparedStatement, RewriteError,
    SluiceConfig, Statement, StatementKind, Value,
};
use sluice_proxy::{ConnectionProxy, ProxyDriver, ResultFilter};
use sluice_rewrite::{CommentTagger, RewritePipeline, SqlRewriter};
use support::{Calls, MemDriver, Table, collect};

async fn open(driver: ProxyDriver, options: &ConnectOptions) -> ConnectionProxy {
    driver
        .connect_proxy("sluice:mem://db", options)
        .await
        .unwrap()
        .unwrap()
}

fn mem(table: Table) -> (Arc<dyn sluice_proxy::DriverRegistry>, Arc<Calls>) {
    let driver = MemDriver::new("mem", "mem://").with_table(table);
    let calls = Arc::clone(&driver.calls);
    let drivers: Vec<Arc<dyn Driver>> = vec![Arc::new(driver)];
    (Arc::new(drivers), calls)
}

fn tagging_driver(registry: Arc<dyn sluice_proxy::DriverRegistry>) -> ProxyDriver {
    ProxyDriver::new(registry).with_rewriter(Arc::new(CommentTagger::new("svc=test")))
}

#[tokio::test]
async fn test_prepare_rewrites_once() {
    let (registry, calls) = mem(Table::users());
    let conn = open(tagging_driver(registry), &ConnectOptions::new()).await;

    let mut stmt = conn.prepare_proxy("SELECT a FROM t").await.unwrap();
    assert_eq!(stmt.original_sql(), "SELECT a FROM t");
    assert_eq!(stmt.rewritten_sql(), "SELECT a FROM t /* svc=test */");
    assert_eq!(stmt.kind(), StatementKind::Prepared);

    stmt.set_parameter(1, Value::Int(5)).await.unwrap();
    stmt.execute_query().await.unwrap();
    stmt.execute_query().await.unwrap();

    let tagged = "SELECT a FROM t /* svc=test */".to_string();
    assert_eq!(calls.created(), vec![(StatementKind::Prepared, tagged.clone())]);
    assert_eq!(calls.executed(), vec![tagged.clone(), tagged]);
    assert_eq!(calls.parameters(), vec![(1, Value::Int(5))]);
}

#[tokio::test]
async fn test_every_creation_entry_point_is_rewritten() {
    let (registry, calls) = mem(Table::users());
    let conn = open(tagging_driver(registry), &ConnectOptions::new()).await;

    conn.create_statement("SELECT 1").await.unwrap();
    conn.prepare("UPDATE t SET a = ?").await.unwrap();
    conn.prepare_call("CALL refresh(?)").await.unwrap();

    assert_eq!(
        calls.created(),
        vec![
            (StatementKind::Plain, "SELECT 1 /* svc=test */".to_string()),
            (StatementKind::Prepared, "UPDATE t SET a = ? /* svc=test */".to_string()),
            (StatementKind::Callable, "CALL refresh(?) /* svc=test */".to_string()),
        ]
    );
}

#[tokio::test]
async fn test_rewriter_sees_statement_kind() {
    let (registry, calls) = mem(Table::users());
    let rewriter = |sql: &str, kind: StatementKind| -> Result<String, RewriteError> {
        Ok(format!("{sql} -- {kind}"))
    };
    let driver = ProxyDriver::new(registry).with_rewriter(Arc::new(rewriter));
    let conn = open(driver, &ConnectOptions::new()).await;

    conn.prepare_call("CALL p()").await.unwrap();
    assert_eq!(calls.created()[0].1, format!("CALL p() -- {}", StatementKind::Callable));
}

fn rejecting(_: &str, _: StatementKind) -> Result<String, RewriteError> {
    Err(RewriteError::Unsupported {
        reason: "multiple statements".into(),
    })
}

#[tokio::test]
async fn test_fail_open_forwards_original_sql() {
    let (registry, calls) = mem(Table::users());
    let pipeline = RewritePipeline::new(Arc::new(rejecting), FailurePolicy::Open);
    let driver = ProxyDriver::new(registry).with_pipeline(pipeline);
    let conn = open(driver, &ConnectOptions::new()).await;

    let stmt = conn.create_statement_proxy("SELECT 1; SELECT 2").await.unwrap();
    assert_eq!(stmt.rewritten_sql(), "SELECT 1; SELECT 2");
    assert_eq!(calls.created().len(), 1);
}

#[tokio::test]
async fn test_fail_closed_never_reaches_delegate() {
    let (registry, calls) = mem(Table::users());
    let pipeline = RewritePipeline::new(Arc::new(rejecting), FailurePolicy::Closed);
    let driver = ProxyDriver::new(registry).with_pipeline(pipeline);
    let conn = open(driver, &ConnectOptions::new()).await;

    let err = conn.prepare("SELECT 1; SELECT 2").await.err().unwrap();
    assert!(matches!(err, Error::Rewrite(RewriteError::Unsupported { .. })));
    assert!(err.is_proxy_error());
    assert!(calls.created().is_empty());
}

#[tokio::test]
async fn test_delegate_statement_errors_pass_through() {
    let (registry, _) = mem(Table::users());
    let conn = open(ProxyDriver::new(registry), &ConnectOptions::new()).await;

    let err = conn.prepare("   ").await.err().unwrap();
    assert!(matches!(err, Error::Query { .. }));

    let mut stmt = conn.create_statement("DELETE FROM t").await.unwrap();
    assert!(matches!(stmt.execute_query().await, Err(Error::Query { .. })));
    assert!(matches!(stmt.cancel().await, Err(Error::Cancelled)));
}

#[tokio::test]
async fn test_update_and_batch_forwarded() {
    let (registry, calls) = mem(Table::users());
    let conn = open(ProxyDriver::new(registry), &ConnectOptions::new()).await;

    let mut stmt = conn.prepare("UPDATE t SET a = ?").await.unwrap();
    assert_eq!(stmt.execute_update().await.unwrap(), 2);
    assert_eq!(stmt.update_count(), Some(2));

    stmt.set_parameter(1, Value::Int(1)).await.unwrap();
    stmt.add_batch().await.unwrap();
    stmt.set_parameter(1, Value::Int(2)).await.unwrap();
    stmt.add_batch().await.unwrap();
    assert_eq!(stmt.execute_batch().await.unwrap(), vec![1, 1]);
    assert_eq!(calls.executed().len(), 2);
}

#[tokio::test]
async fn test_callable_out_parameters() {
    let (registry, _) = mem(Table::users());
    let conn = open(ProxyDriver::new(registry), &ConnectOptions::new()).await;

    let mut call = conn.prepare_call("CALL next_id(?)").await.unwrap();
    call.register_out_parameter(1, "INT").await.unwrap();
    call.execute().await.unwrap();

    assert_eq!(call.out_parameter(1).await.unwrap(), Value::Text("out:INT".into()));
    assert!(matches!(
        call.out_parameter(2).await,
        Err(Error::InvalidArgument(_))
    ));
}

#[tokio::test]
async fn test_statement_close_reaches_delegate_once() {
    let (registry, calls) = mem(Table::users());
    let conn = open(ProxyDriver::new(registry), &ConnectOptions::new()).await;

    let mut stmt = conn.create_statement("SELECT 1").await.unwrap();
    stmt.close().await.unwrap();
    stmt.close().await.unwrap();

    assert!(stmt.is_closed());
    assert_eq!(calls.statement_closes(), 1);
    assert!(matches!(stmt.execute().await, Err(Error::Closed(_))));
}

fn masking_config() -> SluiceConfig {
    SluiceConfig::from_yaml(
        r#"
results:
  hidden_columns: [PASSWORD_HASH]
  redacted_columns: [email]
"#,
    )
    .unwrap()
}

#[tokio::test]
async fn test_result_columns_hidden_and_redacted() {
    let (registry, _) = mem(Table::users());
    let conn = open(
        ProxyDriver::from_config(&masking_config(), registry).unwrap(),
        &ConnectOptions::new(),
    )
    .await;

    let mut stmt = conn.create_statement("SELECT * FROM users").await.unwrap();
    let mut cursor = stmt.execute_query().await.unwrap();

    let names: Vec<&str> = cursor.columns().iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["id", "email"]);
    assert!(cursor.current().is_none());

    assert!(cursor.next().await.unwrap());
    assert_eq!(cursor.get_by_name("email").unwrap(), &Value::from("***"));
    assert!(cursor.get_by_name("password_hash").is_err());

    assert!(cursor.next().await.unwrap());
    assert_eq!(cursor.get(1).unwrap(), &Value::Null);

    assert!(!cursor.next().await.unwrap());
    assert!(!cursor.next().await.unwrap());
    assert!(cursor.current().is_none());
}

#[tokio::test]
async fn test_execute_then_result_set_is_wrapped() {
    let (registry, _) = mem(Table::users());
    let conn = open(
        ProxyDriver::from_config(&masking_config(), registry).unwrap(),
        &ConnectOptions::new(),
    )
    .await;

    let mut stmt = conn.create_statement("SELECT * FROM users").await.unwrap();
    assert!(stmt.execute().await.unwrap());
    let mut cursor = stmt.result_set().await.unwrap().unwrap();
    assert_eq!(cursor.columns().len(), 2);
    assert_eq!(
        collect(cursor.as_mut()).await,
        vec![
            vec![Value::Int(1), Value::from("***")],
            vec![Value::Int(2), Value::Null],
        ]
    );
    assert!(stmt.result_set().await.unwrap().is_none());
}

#[tokio::test]
async fn test_wrapping_disabled_per_connection() {
    let (registry, _) = mem(Table::users());
    let options = ConnectOptions::new().with("sluice.wrap_results", "no");
    let driver = ProxyDriver::from_config(&masking_config(), registry).unwrap();
    let conn = open(driver, &options).await;

    let mut stmt = conn.create_statement("SELECT * FROM users").await.unwrap();
    let cursor = stmt.execute_query().await.unwrap();
    assert_eq!(cursor.columns().len(), 3);
}

struct SkipFirstUser;

impl ResultFilter for SkipFirstUser {
    fn keep_row(&self, _columns: &[sluice_core::Column], row: &sluice_core::Row) -> bool {
        row.get(0) != Some(&Value::Int(1))
    }
}

#[tokio::test]
async fn test_filtered_rows_keep_exhaustion_signal() {
    let (registry, _) = mem(Table::users());
    let driver = ProxyDriver::new(registry).with_result_filter(Arc::new(SkipFirstUser));
    let conn = open(driver, &ConnectOptions::new()).await;

    let mut stmt = conn.create_statement("SELECT * FROM users").await.unwrap();
    let mut cursor = stmt.execute_query().await.unwrap();

    assert_eq!(collect(cursor.as_mut()).await.len(), 1);
    assert!(!cursor.next().await.unwrap());
}

#[tokio::test]
async fn test_navigation_follows_delegate() {
    let mut table = Table::users();

    // Forward-only delegate: the proxy cannot scroll either.
    let (registry, _) = mem(table.clone());
    let conn = open(ProxyDriver::new(registry), &ConnectOptions::new()).await;
    let mut stmt = conn.create_statement("SELECT * FROM users").await.unwrap();
    let mut cursor = stmt.execute_query().await.unwrap();
    assert!(!cursor.is_scrollable());
    assert!(matches!(cursor.previous().await, Err(Error::Unsupported(_))));

    table.scrollable = true;
    let (registry, _) = mem(table);
    let conn = open(ProxyDriver::new(registry), &ConnectOptions::new()).await;
    let mut stmt = conn.create_statement("SELECT * FROM users").await.unwrap();
    let mut cursor = stmt.execute_query().await.unwrap();
    assert!(cursor.is_scrollable());

    assert!(cursor.next().await.unwrap());
    assert!(cursor.next().await.unwrap());
    assert!(cursor.previous().await.unwrap());
    assert_eq!(cursor.get(0).unwrap(), &Value::Int(1));

    cursor.before_first().await.unwrap();
    assert!(cursor.current().is_none());
    assert_eq!(collect(cursor.as_mut()).await.len(), 2);

    cursor.close().await.unwrap();
    assert!(cursor.is_closed());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_connections_rewrite_identically() {
    let (registry, calls) = mem(Table::users());
    let driver = Arc::new(tagging_driver(registry));

    let mut handles = Vec::new();
    for _ in 0..8 {
        let driver = Arc::clone(&driver);
        handles.push(tokio::spawn(async move {
            let conn = open_shared(&driver).await;
            let stmt = conn.prepare_proxy("SELECT a FROM t").await.unwrap();
            conn.close().await.unwrap();
            stmt.rewritten_sql().to_string()
        }));
    }

    for handle in handles {
        assert_eq!(handle.await.unwrap(), "SELECT a FROM t /* svc=test */");
    }
    assert_eq!(calls.created().len(), 8);
    assert_eq!(calls.connection_closes(), 8);
}

async fn open_shared(driver: &ProxyDriver) -> ConnectionProxy {
    driver
        .connect_proxy("sluice:mem://db", &ConnectOptions::new())
        .await
        .unwrap()
        .unwrap()
}

#[test]
fn test_rewrite_is_deterministic() {
    let config = SluiceConfig::from_yaml(
        r#"
rewrite:
  tag: "svc=test"
  tenancy:
    tenant: acme
"#,
    )
    .unwrap();
    let chain = sluice_rewrite::chain_from_config(&config);

    let sql = "SELECT o.id FROM orders o WHERE o.total > 10";
    let first = chain.rewrite(sql, StatementKind::Prepared).unwrap();
    let second = chain.rewrite(sql, StatementKind::Prepared).unwrap();
    assert_eq!(first, second);
    assert!(first.contains("o.tenant_id = 'acme'"));
}
