/*!
 * Transaction Boundary Tests
 * Protected calls: restart/rollback sentinels, opaque failure passthrough,
 * token discipline, cloning, and engine-deadline policies
 */

mod common;

use common::SimEngine;
use pretty_assertions::assert_eq;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use txgate::{restart, rollback, Config, CoordError, Lifecycle, Runtime, SessionToken, TimeoutPolicy};

async fn running_instance() -> (Arc<SimEngine>, Lifecycle, Runtime) {
    common::init_logging();
    let engine = Arc::new(SimEngine::new());
    let lifecycle = Lifecycle::new(engine.clone(), Config::default());
    let runtime = lifecycle.init().await.expect("init");
    (engine, lifecycle, runtime)
}

#[tokio::test(flavor = "multi_thread")]
async fn restart_twice_runs_three_attempts_and_commits_last_pass() {
    let (engine, lifecycle, runtime) = running_instance().await;
    let mut conn = runtime.new_connection();

    let mut passes = 0u32;
    let committed = runtime
        .transaction(&mut conn, "counter", &[], |conn| {
            passes += 1;
            engine.set(conn, "pass", &passes.to_string());
            if passes < 3 {
                restart();
            }
        })
        .expect("transaction");

    assert!(committed);
    assert_eq!(passes, 3);
    // Only the final pass's mutation survived the two rollbacks
    assert_eq!(engine.committed("pass"), Some("3".to_string()));

    lifecycle.shutdown(runtime).await.expect("shutdown");
}

#[tokio::test(flavor = "multi_thread")]
async fn rollback_returns_false_and_leaves_no_state() {
    let (engine, lifecycle, runtime) = running_instance().await;
    let mut conn = runtime.new_connection();

    let committed = runtime
        .transaction(&mut conn, "aborted", &[], |conn| {
            engine.set(conn, "ghost", "value");
            rollback();
        })
        .expect("transaction");

    assert!(!committed);
    assert_eq!(engine.committed("ghost"), None);

    lifecycle.shutdown(runtime).await.expect("shutdown");
}

#[tokio::test(flavor = "multi_thread")]
async fn opaque_failure_crosses_boundary_with_message_intact() {
    let (engine, lifecycle, runtime) = running_instance().await;
    let mut conn = runtime.new_connection();

    let outcome = catch_unwind(AssertUnwindSafe(|| {
        runtime.transaction(&mut conn, "explode", &[], |conn| {
            engine.set(conn, "partial", "value");
            panic!("application failure 17");
        })
    }));

    let payload = outcome.expect_err("failure must be re-raised");
    let message = payload
        .downcast_ref::<&str>()
        .copied()
        .map(str::to_string)
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .expect("payload identity preserved");
    assert_eq!(message, "application failure 17");

    // The engine rolled its own state back before the re-raise
    assert_eq!(engine.committed("partial"), None);
    // The carried failure did not corrupt the connection's token
    assert_eq!(conn.token(), SessionToken::NONE);

    lifecycle.shutdown(runtime).await.expect("shutdown");
}

#[tokio::test(flavor = "multi_thread")]
async fn clone_inside_transaction_copies_current_token() {
    let (_engine, lifecycle, runtime) = running_instance().await;
    let mut conn = runtime.new_connection();

    let mut observed = None;
    runtime
        .transaction(&mut conn, "cloning", &[], |conn| {
            let clone = conn.clone_handle();
            assert!(clone.token().in_transaction());
            observed = Some((clone.token(), conn.token()));
        })
        .expect("transaction");

    let (clone_token, parent_token) = observed.expect("callback ran");
    assert_eq!(clone_token, parent_token);
    // Token restored once the protected call returned
    assert_eq!(conn.token(), SessionToken::NONE);

    lifecycle.shutdown(runtime).await.expect("shutdown");
}

#[tokio::test(flavor = "multi_thread")]
async fn nested_transaction_gets_fresh_token_and_commits_into_parent() {
    let (engine, lifecycle, runtime) = running_instance().await;
    let mut conn = runtime.new_connection();

    runtime
        .transaction(&mut conn, "outer", &[], |conn| {
            let outer_token = conn.token();
            let inner = runtime.transaction(conn, "inner", &[], |conn| {
                assert_ne!(conn.token(), outer_token);
                engine.set(conn, "nested", "yes");
            });
            assert!(inner.expect("nested transaction"));
            // Nested commit is visible to the parent, not yet durable
            assert_eq!(engine.get(conn, "nested"), Some("yes".to_string()));
            assert_eq!(engine.committed("nested"), None);
            assert_eq!(conn.token(), outer_token);
        })
        .expect("transaction");

    assert_eq!(engine.committed("nested"), Some("yes".to_string()));

    lifecycle.shutdown(runtime).await.expect("shutdown");
}

#[tokio::test(flavor = "multi_thread")]
async fn engine_deadline_maps_through_the_connection_policy() {
    let (engine, lifecycle, runtime) = running_instance().await;

    // Default policy raises a typed failure
    let mut conn = runtime.new_connection();
    engine.expire_next_deadline();
    let raised = runtime.transaction(&mut conn, "deadline", &[], |_conn| {});
    assert!(matches!(raised, Err(CoordError::EngineTimeout)));

    // Commit-on-timeout reports success
    conn.set_timeout_policy(TimeoutPolicy::Commit);
    engine.expire_next_deadline();
    let committed = runtime.transaction(&mut conn, "deadline", &[], |_conn| {});
    assert!(matches!(committed, Ok(true)));

    // Rollback-on-timeout reports an ordinary not-committed result
    conn.set_timeout_policy(TimeoutPolicy::Rollback);
    engine.expire_next_deadline();
    let rolled_back = runtime.transaction(&mut conn, "deadline", &[], |_conn| {});
    assert!(matches!(rolled_back, Ok(false)));

    lifecycle.shutdown(runtime).await.expect("shutdown");
}

#[tokio::test(flavor = "multi_thread")]
async fn restart_outside_any_callback_is_an_ordinary_panic() {
    let outcome = catch_unwind(|| restart());
    assert!(outcome.is_err());
}
