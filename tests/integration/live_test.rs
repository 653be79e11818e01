//! Capture against a live PostgreSQL database.
//!
//! Skipped unless DATABASE_URL is set.

use pg_explain_capture::config::ServerConfig;
use pg_explain_capture::db::PostgresConnector;
use pg_explain_capture::router::MonitoredDatabases;
use pg_explain_capture::{run_explain, CaptureOptions, QuerySample};

fn get_test_connector() -> Option<(PostgresConnector, String)> {
    let url = std::env::var("DATABASE_URL").ok()?;
    let server = ServerConfig::from_connection_string(&url).ok()?;
    let dbname = server.dbname.clone()?;
    Some((PostgresConnector::new(server), dbname))
}

#[tokio::test]
async fn test_live_direct_and_prepared_capture() {
    let Some((connector, dbname)) = get_test_connector() else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let input = vec![
        QuerySample::new("", "SELECT 1", vec![]),
        QuerySample::new("", "SELECT $1::int + 1", vec!["41".to_string()]),
        QuerySample::new("", "SELECT $1::int + 1", vec!["42".to_string()]),
        QuerySample::new("", "SELECT * FROM nonexistent_table_xyz", vec![]),
    ];
    let options = CaptureOptions::new(MonitoredDatabases::single(dbname));

    let (output, summary) = run_explain(&connector, input, &options).await;

    assert!(output[0].explain_output.as_deref().unwrap().contains("\"Plan\""));
    assert!(output[1].explain_output.is_some(), "{:?}", output[1].explain_error);
    // The prepared statement was released, so the same name can be reused.
    assert!(output[2].explain_output.is_some(), "{:?}", output[2].explain_error);
    assert!(output[3]
        .explain_error
        .as_deref()
        .unwrap()
        .contains("nonexistent_table_xyz"));
    assert_eq!(summary.captured, 3);
    assert_eq!(summary.failed, 1);
}

#[tokio::test]
async fn test_live_unreachable_database_is_skipped() {
    let Some((connector, dbname)) = get_test_connector() else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let input = vec![QuerySample::new("no_such_database_xyz", "SELECT 1", vec![])];
    let options = CaptureOptions::new(MonitoredDatabases {
        db_name: dbname,
        all_names: true,
        extra_names: vec![],
    });

    let (output, summary) = run_explain(&connector, input.clone(), &options).await;

    assert_eq!(output, input);
    assert_eq!(summary.skipped_databases, 1);
}
