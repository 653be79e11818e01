//! Capability probing.
//!
//! Runs once per freshly opened connection: is the explain helper installed
//! in this database, and does the session hold elevated privileges?

use tracing::debug;

use crate::config::SystemType;
use crate::db::ExplainConnection;
use crate::error::Result;
use crate::router::QUERY_MARKER_SQL;
use crate::strategy::{Capabilities, EXPLAIN_HELPER, HELPER_SCHEMA};

/// Looks the helper up in the catalog instead of trying to call it.
pub fn helper_exists_sql() -> String {
    format!(
        "{QUERY_MARKER_SQL}SELECT COUNT(*) > 0 FROM pg_proc \
         JOIN pg_namespace ON (pronamespace = pg_namespace.oid) \
         WHERE nspname = '{HELPER_SCHEMA}' AND proname = $1::name"
    )
}

/// Query deciding whether the session is elevated, if it can be known.
pub fn elevated_session_sql(system_type: SystemType) -> Option<String> {
    match (system_type, system_type.admin_role()) {
        (_, Some(_)) => Some(format!(
            "{QUERY_MARKER_SQL}SELECT pg_has_role(current_user, $1::name, 'MEMBER')"
        )),
        (SystemType::SelfHosted, None) => Some(format!(
            "{QUERY_MARKER_SQL}SELECT current_setting('is_superuser') = 'on'"
        )),
        _ => None,
    }
}

/// Returns true if `pganalyze.explain()` is installed.
pub async fn helper_exists(conn: &mut dyn ExplainConnection) -> Result<bool> {
    conn.fetch_bool(&helper_exists_sql(), &[EXPLAIN_HELPER]).await
}

/// Returns true if the session holds superuser-equivalent rights.
///
/// Unknowable platforms and failing checks count as not elevated.
pub async fn is_elevated_session(conn: &mut dyn ExplainConnection, system_type: SystemType) -> bool {
    let Some(sql) = elevated_session_sql(system_type) else {
        return false;
    };
    let args: Vec<&str> = system_type.admin_role().into_iter().collect();

    match conn.fetch_bool(&sql, &args).await {
        Ok(elevated) => elevated,
        Err(e) => {
            debug!("Could not determine session privileges: {}", e);
            false
        }
    }
}

/// Probes a connection. A failing helper lookup fails the probe.
pub async fn probe_capabilities(
    conn: &mut dyn ExplainConnection,
    system_type: SystemType,
) -> Result<Capabilities> {
    let helper_available = helper_exists(conn).await?;
    let is_elevated_session = is_elevated_session(conn, system_type).await;

    Ok(Capabilities {
        helper_available,
        is_elevated_session,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Connector, MockConnector};

    #[test]
    fn test_helper_lookup_is_catalog_query() {
        let sql = helper_exists_sql();
        assert!(sql.starts_with(QUERY_MARKER_SQL));
        assert!(sql.contains("pg_proc"));
        assert!(sql.contains("nspname = 'pganalyze'"));
        assert!(sql.ends_with("proname = $1::name"));
    }

    #[test]
    fn test_elevated_session_sql_per_system_type() {
        assert!(elevated_session_sql(SystemType::SelfHosted)
            .unwrap()
            .contains("is_superuser"));
        assert!(elevated_session_sql(SystemType::AmazonRds)
            .unwrap()
            .contains("pg_has_role"));
        assert_eq!(elevated_session_sql(SystemType::Heroku), None);
    }

    #[tokio::test]
    async fn test_probe_with_helper() {
        let connector = MockConnector::new().with_helper();
        let log = connector.log();
        let mut conn = connector.connect("appdb").await.unwrap();

        let caps = probe_capabilities(conn.as_mut(), SystemType::SelfHosted)
            .await
            .unwrap();

        assert!(caps.helper_available);
        assert!(!caps.is_elevated_session);
        let statements = log.statements();
        assert_eq!(statements.len(), 2);
        assert_eq!(statements[0].bound, vec!["explain"]);
        assert!(statements[1].sql.contains("is_superuser"));
    }

    #[tokio::test]
    async fn test_probe_superuser_without_helper() {
        let connector = MockConnector::new().with_superuser();
        let mut conn = connector.connect("appdb").await.unwrap();

        let caps = probe_capabilities(conn.as_mut(), SystemType::SelfHosted)
            .await
            .unwrap();

        assert_eq!(
            caps,
            Capabilities {
                helper_available: false,
                is_elevated_session: true,
            }
        );
    }

    #[tokio::test]
    async fn test_managed_service_binds_admin_role() {
        let connector = MockConnector::new().with_superuser();
        let log = connector.log();
        let mut conn = connector.connect("appdb").await.unwrap();

        assert!(is_elevated_session(conn.as_mut(), SystemType::GoogleCloudsql).await);
        let statements = log.statements();
        assert_eq!(statements[0].bound, vec!["cloudsqlsuperuser"]);
    }

    #[tokio::test]
    async fn test_heroku_assumed_not_elevated_without_query() {
        let connector = MockConnector::new().with_superuser();
        let log = connector.log();
        let mut conn = connector.connect("appdb").await.unwrap();

        assert!(!is_elevated_session(conn.as_mut(), SystemType::Heroku).await);
        assert!(log.statements().is_empty());
    }

    #[tokio::test]
    async fn test_failing_helper_lookup_fails_probe() {
        let connector = MockConnector::new().with_failing_probes();
        let mut conn = connector.connect("appdb").await.unwrap();

        assert!(probe_capabilities(conn.as_mut(), SystemType::SelfHosted)
            .await
            .is_err());
    }
}
