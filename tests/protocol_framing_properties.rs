//! Interactive protocol framing properties
//!
//! A response stream of lines followed by `OK` resolves with exactly
//! those lines; silence past the inactivity timeout rejects with the
//! timeout error kind and kills the process.

use std::time::Duration;

use haskmate_process::{InteractiveProcess, ProcessError, SpawnConfig};

fn responder(script: &str) -> SpawnConfig {
    SpawnConfig::new("sh").args(["-c", script])
}

#[tokio::test]
async fn test_ok_terminated_response_resolves_with_lines() {
    let process = InteractiveProcess::new(responder(
        "while read line; do echo line1; echo line2; echo OK; done",
    ));
    let reply = process.interact("anything", &[], None).await.unwrap();
    assert_eq!(reply.stdout, vec!["line1", "line2"]);
    process.kill().await;
}

#[tokio::test]
async fn test_lines_after_ok_belong_to_next_interaction() {
    let process = InteractiveProcess::new(responder(
        "read a; echo first; echo OK; read b; echo second; echo OK; cat >/dev/null",
    ));
    let first = process.interact("one", &[], None).await.unwrap();
    let second = process.interact("two", &[], None).await.unwrap();
    assert_eq!(first.stdout, vec!["first"]);
    assert_eq!(second.stdout, vec!["second"]);
    process.kill().await;
}

#[tokio::test]
async fn test_inactivity_timeout_rejects_and_kills() {
    let process = InteractiveProcess::new(
        responder("read line; sleep 30").interaction_timeout(Duration::from_millis(150)),
    );
    let err = process.interact("stall", &[], None).await.unwrap_err();
    assert!(matches!(err, ProcessError::Timeout { .. }));
    // the process was killed: no live pid remains
    assert_eq!(process.pid().await, None);
}

#[tokio::test]
async fn test_output_resets_inactivity_deadline() {
    // each line arrives within the timeout even though the whole
    // interaction takes longer than one timeout window
    let process = InteractiveProcess::new(
        responder(
            "read line; for i in 1 2 3 4; do echo $i; sleep 0.1; done; echo OK; cat >/dev/null",
        )
        .interaction_timeout(Duration::from_millis(250)),
    );
    let reply = process.interact("slow-drip", &[], None).await.unwrap();
    assert_eq!(reply.stdout, vec!["1", "2", "3", "4"]);
    process.kill().await;
}

#[tokio::test]
async fn test_crash_mid_interaction_carries_output() {
    let process = InteractiveProcess::new(responder("read line; echo partial; exit 2"));
    let err = process.interact("boom", &[], None).await.unwrap_err();
    match err {
        ProcessError::Crashed { stdout, .. } => assert_eq!(stdout, vec!["partial"]),
        other => panic!("expected crash, got {other:?}"),
    }
}
