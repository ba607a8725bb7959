//! Conversation log append/read semantics and concurrent appends.

use std::sync::Arc;

use babushka::conversation::{ConversationLog, RecordKind};

#[test]
fn read_of_unknown_user_is_empty() {
    let log = ConversationLog::new();
    assert!(log.read("nobody").is_empty());
    assert_eq!(log.count_users(), 0);
}

#[test]
fn append_then_read_returns_record_last() {
    let log = ConversationLog::new();
    log.append("user_1", RecordKind::UserMessage, "first");
    let before = log.read("user_1").len();

    let appended = log.append("user_1", RecordKind::BotResponse, "second");
    let records = log.read("user_1");

    assert_eq!(records.len(), before + 1);
    assert_eq!(records.last(), Some(&appended));
}

#[test]
fn records_keep_insertion_order() {
    let log = ConversationLog::new();
    for (i, kind) in [
        RecordKind::UserMessage,
        RecordKind::BotResponse,
        RecordKind::UserMessage,
        RecordKind::BotResponse,
    ]
    .into_iter()
    .enumerate()
    {
        log.append("u", kind, format!("msg {i}"));
    }

    let records = log.read("u");
    let contents: Vec<&str> = records.iter().map(|r| r.content.as_str()).collect();
    assert_eq!(contents, vec!["msg 0", "msg 1", "msg 2", "msg 3"]);
    assert!(records
        .windows(2)
        .all(|pair| pair[0].timestamp <= pair[1].timestamp));
}

#[test]
fn users_are_isolated() {
    let log = ConversationLog::new();
    log.append("alice", RecordKind::UserMessage, "hi");
    log.append("bob", RecordKind::UserMessage, "hello");
    log.append("bob", RecordKind::BotResponse, "dearest child");

    assert_eq!(log.count_users(), 2);
    assert_eq!(log.count_all_records(), 3);
    assert_eq!(log.count_records_for("alice"), 1);
    assert_eq!(log.count_records_for("bob"), 2);
    assert_eq!(log.read("alice")[0].content, "hi");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_appends_are_not_lost() {
    let log = Arc::new(ConversationLog::new());
    let mut handles = Vec::new();
    for task in 0..16 {
        let log = Arc::clone(&log);
        handles.push(tokio::spawn(async move {
            for i in 0..50 {
                let user = format!("user_{}", task % 4);
                log.append(&user, RecordKind::UserMessage, format!("{task}-{i}"));
                tokio::task::yield_now().await;
            }
        }));
    }
    for handle in handles {
        assert!(handle.await.is_ok());
    }

    assert_eq!(log.count_users(), 4);
    assert_eq!(log.count_all_records(), 16 * 50);
    for user in 0..4 {
        assert_eq!(log.count_records_for(&format!("user_{user}")), 4 * 50);
    }
}
