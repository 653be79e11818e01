//! End-to-end capture behavior through the public API, using the mock connector.

use pg_explain_capture::batch::{parse_samples, render_samples};
use pg_explain_capture::db::MockConnector;
use pg_explain_capture::router::{MonitoredDatabases, QUERY_MARKER_SQL};
use pg_explain_capture::{run_explain, CaptureOptions, ExplainSource, QuerySample};
use pretty_assertions::assert_eq;

fn options() -> CaptureOptions {
    CaptureOptions::new(MonitoredDatabases::single("appdb"))
}

fn mixed_batch() -> Vec<QuerySample> {
    let mut explained = QuerySample::new("appdb", "SELECT * FROM t", vec![]);
    explained.has_explain = true;
    explained.explain_source = ExplainSource::AutoExplain;
    explained.explain_output = Some("[{\"Plan\": {}}]".to_string());

    vec![
        QuerySample::new("", "SELECT 1", vec![]),
        explained,
        QuerySample::new("other", "SELECT 2", vec![]),
        QuerySample::new("appdb", "SELECT * FROM t WHERE id = $1", vec!["5".to_string()]),
        QuerySample::new("appdb", "SELECT pg_start_backup('x')", vec![]),
        QuerySample::new("appdb", &format!("{QUERY_MARKER_SQL}SELECT 3"), vec![]),
        QuerySample::new("appdb", "SELECT 1; DELETE FROM t", vec![]),
        QuerySample::new("appdb", "CREATE INDEX ON t (id)", vec![]),
    ]
}

#[tokio::test]
async fn test_filtered_samples_are_unchanged() {
    let connector = MockConnector::new();
    let input = mixed_batch();

    let (output, summary) = run_explain(&connector, input.clone(), &options()).await;

    assert_eq!(output.len(), input.len());
    for idx in [1, 2, 4, 5] {
        assert_eq!(output[idx], input[idx], "sample {idx} was modified");
    }
    assert_eq!(summary.filtered, 4);
}

#[tokio::test]
async fn test_ineligible_samples_have_no_result() {
    let connector = MockConnector::new();
    let input = mixed_batch();

    let (output, summary) = run_explain(&connector, input.clone(), &options()).await;

    for idx in [6, 7] {
        assert_eq!(output[idx], input[idx]);
        assert_eq!(output[idx].explain_output, None);
        assert_eq!(output[idx].explain_error, None);
    }
    assert_eq!(summary.ineligible, 2);
    assert_eq!(summary.captured, 2);
}

#[tokio::test]
async fn test_statements_issued_for_mixed_batch() {
    let connector = MockConnector::new();
    let log = connector.log();

    run_explain(&connector, mixed_batch(), &options()).await;

    assert_eq!(
        log.sql_for(""),
        vec![format!(
            "{QUERY_MARKER_SQL}EXPLAIN (VERBOSE, FORMAT JSON) SELECT 1"
        )]
    );
    assert_eq!(
        log.sql_for("appdb"),
        vec![
            format!("{QUERY_MARKER_SQL}PREPARE pganalyze_explain AS SELECT * FROM t WHERE id = $1"),
            format!("{QUERY_MARKER_SQL}EXPLAIN (VERBOSE, FORMAT JSON) EXECUTE pganalyze_explain('5')"),
            format!("{QUERY_MARKER_SQL}DEALLOCATE pganalyze_explain"),
        ]
    );
    assert!(log.sql_for("other").is_empty());

    let mut closes = log.closes();
    closes.sort();
    assert_eq!(closes, vec!["", "appdb"]);
}

#[tokio::test]
async fn test_second_pass_is_noop_after_marking() {
    let connector = MockConnector::new();
    let (mut first, _) = run_explain(&connector, mixed_batch(), &options()).await;
    first.iter_mut().for_each(|s| s.mark_explained());

    let second_connector = MockConnector::new();
    let log = second_connector.log();
    let (second, summary) = run_explain(&second_connector, first.clone(), &options()).await;

    assert_eq!(second, first);
    assert_eq!(summary.captured, 0);
    assert_eq!(summary.failed, 0);
    assert!(log
        .statements()
        .iter()
        .all(|s| !s.sql.contains("EXPLAIN (VERBOSE")));
}

#[tokio::test]
async fn test_parameters_are_quoted_on_fallback_path() {
    let connector = MockConnector::new();
    let log = connector.log();
    let input = vec![QuerySample::new(
        "appdb",
        "SELECT * FROM users WHERE name = $1 AND note = $2",
        vec!["x'); DROP TABLE users; --".to_string(), r"C:\tmp".to_string()],
    )];

    run_explain(&connector, input, &options()).await;

    let sql = log.sql_for("appdb");
    assert_eq!(
        sql[1],
        format!(
            "{QUERY_MARKER_SQL}EXPLAIN (VERBOSE, FORMAT JSON) EXECUTE pganalyze_explain('x''); DROP TABLE users; --',  E'C:\\\\tmp')"
        )
    );
}

#[tokio::test]
async fn test_helper_strategy_issues_single_call() {
    let connector = MockConnector::new().with_helper();
    let log = connector.log();
    let input = vec![
        QuerySample::new("appdb", "SELECT * FROM t WHERE id = $1", vec!["5".to_string()]),
        QuerySample::new("appdb", "SELECT 1", vec![]),
    ];

    let (output, _) = run_explain(&connector, input, &options()).await;

    let sql = log.sql_for("appdb");
    assert_eq!(
        sql,
        vec![
            format!("{QUERY_MARKER_SQL}SELECT pganalyze.explain($1, $2)"),
            format!("{QUERY_MARKER_SQL}SELECT pganalyze.explain($1, $2)"),
        ]
    );
    assert!(output.iter().all(|s| s.explain_output.is_some()));
}

#[tokio::test]
async fn test_json_batch_round_trip_through_capture() {
    let input = parse_samples(
        r#"[{"database": "", "query": "SELECT 1"}, {"database": "nope", "query": "SELECT 2"}]"#,
    )
    .unwrap();

    let connector = MockConnector::new();
    let (output, _) = run_explain(&connector, input, &options()).await;
    let json = render_samples(&output, false).unwrap();

    assert!(json.contains(r#""explain_source":"statement_log_explain""#));
    assert!(json.contains(r#""explain_format":"json""#));
    assert!(json.contains(r#""query":"SELECT 2""#));
}
