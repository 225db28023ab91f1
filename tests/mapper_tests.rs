//! End-to-end tests for strata-mapper
//!
//! Conditions pick the SQL fragments, the coordinator runs them:
//!
//! 1. **Dynamic SQL** - fragments included only when their condition holds
//! 2. **Configured coordinator** - settings loaded from `strata-mapper.toml`
//! 3. **Session hygiene** - every auto-commit request releases its session

use proptest::prelude::*;
use serde::Serialize;
use std::sync::Arc;

use strata_mapper::engine::CONFIG_FILE_NAME;
use strata_mapper::testing::MemorySessionFactory;
use strata_mapper::{
    Condition, CoordinatorConfig, ExpressionEngine, Params, Propagation, RequestStatus,
    ResolutionMode, TransactionCoordinator, TransactionRequest,
};
use tempfile::TempDir;

// ============================================================================
// Test Helpers
// ============================================================================

/// `<if test="...">` fragments appended to a base statement
struct Template {
    base: &'static str,
    fragments: Vec<(Condition, &'static str)>,
}

impl Template {
    fn new(base: &'static str, fragments: &[(&str, &'static str)]) -> Self {
        let engine = ExpressionEngine::new();
        Self {
            base,
            fragments: fragments
                .iter()
                .map(|(test, sql)| (engine.compile(test).unwrap(), *sql))
                .collect(),
        }
    }

    fn render(&self, params: &Params, mode: ResolutionMode) -> String {
        let mut sql = self.base.to_string();
        for (condition, fragment) in &self.fragments {
            if condition.evaluate(params, mode).unwrap() {
                sql.push(' ');
                sql.push_str(fragment);
            }
        }
        sql
    }
}

fn activity_template() -> Template {
    Template::new(
        "SELECT * FROM biz_activity WHERE delete_flag = 1",
        &[
            (".name != null", "AND name LIKE #{name}"),
            (".start_time != null and .end_time != null", "AND create_time BETWEEN #{start_time} AND #{end_time}"),
            (".page <= 0 and .page <= -8 or .page > 0", "LIMIT #{page}, #{size}"),
        ],
    )
}

#[derive(Serialize)]
struct ActivityQuery {
    name: Option<String>,
    start_time: Option<String>,
    end_time: Option<String>,
    page: i64,
    size: i64,
}

// ============================================================================
// Dynamic SQL
// ============================================================================

mod dynamic_sql {
    use super::*;

    #[test]
    fn test_fragments_follow_parameters() {
        let template = activity_template();

        let all = Params::new()
            .with("name", "spring")
            .with("start_time", "2024-01-01")
            .with("end_time", "2024-02-01")
            .with("page", 2);
        assert_eq!(
            template.render(&all, ResolutionMode::Map),
            "SELECT * FROM biz_activity WHERE delete_flag = 1 AND name LIKE #{name} \
             AND create_time BETWEEN #{start_time} AND #{end_time} LIMIT #{page}, #{size}"
        );

        let none = Params::new().with("page", 0);
        assert_eq!(
            template.render(&none, ResolutionMode::Map),
            "SELECT * FROM biz_activity WHERE delete_flag = 1"
        );
    }

    #[test]
    fn test_struct_parameters() {
        let template = activity_template();
        let params = Params::from_serialize(&ActivityQuery {
            name: None,
            start_time: Some("2024-01-01".into()),
            end_time: None,
            page: -9,
            size: 10,
        })
        .unwrap();
        assert_eq!(
            template.render(&params, ResolutionMode::Struct),
            "SELECT * FROM biz_activity WHERE delete_flag = 1 LIMIT #{page}, #{size}"
        );
    }

    #[test]
    fn test_rendered_statement_runs_in_transaction() {
        let sessions = Arc::new(MemorySessionFactory::new());
        let coordinator = TransactionCoordinator::new(sessions.clone()).unwrap();
        let params = Params::new().with("name", "spring").with("page", 0);
        let sql = activity_template().render(&params, ResolutionMode::Map);

        let response = coordinator.do_transaction(
            &TransactionRequest::new(RequestStatus::Prepare, "tx1", "svc")
                .with_sql(sql.clone())
                .query(),
        );
        assert!(response.is_ok());
        let commit = coordinator
            .do_transaction(&TransactionRequest::new(RequestStatus::Commit, "tx1", "svc"));
        assert!(commit.is_ok());
        assert_eq!(sessions.log().statements(), vec![sql]);
        assert_eq!(sessions.log().commits(), 1);
    }
}

// ============================================================================
// Configured Coordinator
// ============================================================================

mod configured {
    use super::*;

    #[test]
    fn test_coordinator_from_config_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        CoordinatorConfig::write_default_if_missing(&path).unwrap();
        let mut config = CoordinatorConfig::from_file(&path).unwrap();
        assert_eq!(config.propagation, Propagation::Required);

        config.timeout_secs = 120;
        config.write_to_file(&path).unwrap();
        let config = CoordinatorConfig::from_file(&path).unwrap();

        let sessions = Arc::new(MemorySessionFactory::new());
        let coordinator = TransactionCoordinator::from_config(&config, sessions).unwrap();
        coordinator.do_transaction(
            &TransactionRequest::new(RequestStatus::Prepare, "tx1", "svc").with_sql("UPDATE t SET a = 1"),
        );
        let status = coordinator.factory().lookup("tx1").unwrap();
        assert!(status.has_pending_flush());

        coordinator.do_transaction(&TransactionRequest::new(RequestStatus::Commit, "tx1", "svc"));
        assert!(!status.has_pending_flush());
        assert!(status.is_flushed());
    }
}

// ============================================================================
// Session Hygiene
// ============================================================================

mod session_hygiene {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn prop_auto_commit_always_releases(fail in any::<bool>(), rows in 0usize..4) {
            let sessions = Arc::new(MemorySessionFactory::new());
            sessions.fail_statements_containing("boom");
            sessions.stub_query_rows(vec![Default::default(); rows]);
            let coordinator = TransactionCoordinator::new(sessions.clone()).unwrap();

            let sql = if fail { "SELECT boom" } else { "SELECT 1" };
            let response = coordinator.do_transaction(
                &TransactionRequest::new(RequestStatus::None, "auto", "svc")
                    .with_sql(sql)
                    .query(),
            );

            prop_assert_eq!(response.is_ok(), !fail);
            prop_assert_eq!(response.success, if fail { 0 } else { rows as u64 });
            let log = sessions.log();
            prop_assert_eq!(log.closed(), 1);
            prop_assert_eq!(log.commits() + log.rollbacks(), 1);
            prop_assert!(coordinator.active_transactions().is_empty());
        }
    }
}
