use std::time::Duration;

use claims::{assert_err, assert_none, assert_ok};
use mail_merge_client::{mail_merge::MailMergeError, workflow::Phase};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, ResponseTemplate};

use crate::helpers::{recipient_json, spawn_app};

#[tokio::test]
async fn send_posts_every_reviewed_recipient_in_one_request() {
    // Arrange
    let mut app = spawn_app().await;
    app.upload_sample().await;
    Mock::given(path("/send_email"))
        .and(method("POST"))
        .and(header("Authorization", "Bearer test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "success": [recipient_json(1, "a@acme.com")],
            "failed": []
        })))
        .expect(1)
        .mount(&app.backend)
        .await;

    // Act
    assert_ok!(app.mail_merge().send().await);

    // Assert
    let batches = app.sent_batches().await;
    assert_eq!(batches.len(), 1);
    let emails: Vec<_> = batches[0].iter().map(|r| r.email.as_str()).collect();
    assert_eq!(emails, ["a@acme.com", "b@acme.com", "c@globex.com"]);
}

#[tokio::test]
async fn rows_removed_during_review_are_not_sent() {
    // Arrange
    let mut app = spawn_app().await;
    app.upload_sample().await;
    app.mount_send_once(serde_json::json!({"success": [], "failed": []}))
        .await;
    let set = app.mail_merge().recipients_mut().unwrap();
    set.set_filter("globex");
    let key = set.visible()[0].key;
    set.remove(key);

    // Act
    assert_ok!(app.mail_merge().send().await);

    // Assert
    let batches = app.sent_batches().await;
    let emails: Vec<_> = batches[0].iter().map(|r| r.email.as_str()).collect();
    assert_eq!(emails, ["a@acme.com", "b@acme.com"]);
}

#[tokio::test]
async fn clean_send_does_not_offer_a_retry() {
    // Arrange
    let mut app = spawn_app().await;
    app.upload_sample().await;
    app.mount_send_once(serde_json::json!({
        "success": [
            recipient_json(1, "a@acme.com"),
            recipient_json(2, "b@acme.com"),
            recipient_json(3, "c@globex.com")
        ]
    }))
    .await;

    // Act
    let outcome = app.mail_merge().send().await.unwrap();

    // Assert
    assert_eq!(outcome.success().len(), 3);
    assert!(outcome.failed().is_empty());
    assert!(!outcome.retry_armed());
    assert_eq!(app.mail_merge().workflow().phase(), Phase::AllSucceeded);
    assert!(app.mail_merge().workflow().recipients().is_none());
}

#[tokio::test]
async fn null_failed_list_counts_as_a_clean_send() {
    // Arrange
    let mut app = spawn_app().await;
    app.upload_sample().await;
    app.mount_send_once(serde_json::json!({
        "success": [
            recipient_json(1, "a@acme.com"),
            recipient_json(2, "b@acme.com"),
            recipient_json(3, "c@globex.com")
        ],
        "failed": null
    }))
    .await;

    // Act
    let outcome = assert_ok!(app.mail_merge().send().await);

    // Assert
    assert_eq!(outcome.success().len(), 3);
    assert!(!outcome.retry_armed());
    assert_eq!(app.mail_merge().workflow().phase(), Phase::AllSucceeded);
}

#[tokio::test]
async fn abandoned_send_returns_the_workflow_to_review() {
    // Arrange
    let mut app = spawn_app().await;
    app.upload_sample().await;
    Mock::given(path("/send_email"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({"success": [], "failed": []}))
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&app.backend)
        .await;

    // Act
    let abandoned = tokio::time::timeout(Duration::from_millis(50), app.mail_merge().send()).await;

    // Assert
    assert_err!(abandoned);
    assert_eq!(app.mail_merge().workflow().phase(), Phase::Reviewing);
    assert_eq!(app.mail_merge().workflow().recipients().unwrap().len(), 3);
    assert_ok!(app.mail_merge().send().await);
}

#[tokio::test]
async fn retry_appends_successes_and_replaces_failures() {
    // Arrange
    let mut app = spawn_app().await;
    app.upload_sample().await;
    app.mount_send_once(serde_json::json!({
        "success": [recipient_json(1, "a@acme.com")],
        "failed": [recipient_json(2, "b@acme.com"), recipient_json(3, "c@globex.com")]
    }))
    .await;
    app.mount_send_once(serde_json::json!({
        "success": [recipient_json(2, "b@acme.com")],
        "failed": [recipient_json(3, "c@globex.com")]
    }))
    .await;

    // Act
    let first = app.mail_merge().send().await.unwrap();
    assert!(first.retry_armed());
    let outcome = app.mail_merge().retry().await.unwrap();

    // Assert
    let sent: Vec<_> = outcome.success().iter().map(|r| r.email.as_str()).collect();
    let failed: Vec<_> = outcome.failed().iter().map(|r| r.email.as_str()).collect();
    assert_eq!(sent, ["a@acme.com", "b@acme.com"]);
    assert_eq!(failed, ["c@globex.com"]);
    assert!(outcome.retry_armed());
    assert_eq!(app.mail_merge().workflow().phase(), Phase::PartialFailure);

    let batches = app.sent_batches().await;
    let retried: Vec<_> = batches[1].iter().map(|r| r.email.as_str()).collect();
    assert_eq!(retried, ["b@acme.com", "c@globex.com"]);
}

#[tokio::test]
async fn retry_sends_only_what_is_left_in_the_retry_list() {
    // Arrange
    let mut app = spawn_app().await;
    app.upload_sample().await;
    app.mount_send_once(serde_json::json!({
        "success": [],
        "failed": [recipient_json(2, "b@acme.com"), recipient_json(3, "c@globex.com")]
    }))
    .await;
    app.mount_send_once(serde_json::json!({"success": [recipient_json(3, "c@globex.com")]}))
        .await;
    app.mail_merge().send().await.unwrap();
    let key = app.mail_merge().workflow().retry_list()[0].key;
    assert!(app.mail_merge().remove_from_retry(key));

    // Act
    let outcome = app.mail_merge().retry().await.unwrap();

    // Assert
    assert!(!outcome.retry_armed());
    assert_eq!(app.mail_merge().workflow().phase(), Phase::AllSucceeded);
    let batches = app.sent_batches().await;
    let retried: Vec<_> = batches[1].iter().map(|r| r.email.as_str()).collect();
    assert_eq!(retried, ["c@globex.com"]);
}

#[tokio::test]
async fn empty_retry_keeps_successes_and_disarms_the_retry() {
    // Arrange
    let mut app = spawn_app().await;
    app.upload_sample().await;
    app.mount_send_once(serde_json::json!({
        "success": [recipient_json(1, "a@acme.com")],
        "failed": [recipient_json(2, "b@acme.com")]
    }))
    .await;
    app.mount_send_once(serde_json::json!({"success": [], "failed": []}))
        .await;
    app.mail_merge().send().await.unwrap();
    let key = app.mail_merge().workflow().retry_list()[0].key;
    app.mail_merge().remove_from_retry(key);

    // Act
    let outcome = app.mail_merge().retry().await.unwrap();

    // Assert
    assert_eq!(outcome.success().len(), 1);
    assert!(outcome.failed().is_empty());
    assert!(!outcome.retry_armed());
    assert!(app.sent_batches().await[1].is_empty());
}

#[tokio::test]
async fn failed_retry_leaves_the_previous_outcome_alone() {
    // Arrange
    let mut app = spawn_app().await;
    app.upload_sample().await;
    app.mount_send_once(serde_json::json!({
        "success": [recipient_json(1, "a@acme.com")],
        "failed": [recipient_json(2, "b@acme.com")]
    }))
    .await;
    Mock::given(path("/send_email"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>gateway</html>"))
        .mount(&app.backend)
        .await;
    app.mail_merge().send().await.unwrap();
    let before = app.mail_merge().workflow().outcome().cloned();

    // Act
    let outcome = app.mail_merge().retry().await;

    // Assert
    assert!(matches!(outcome, Err(MailMergeError::Transport(_))));
    assert_eq!(app.mail_merge().workflow().outcome().cloned(), before);
    assert_eq!(app.mail_merge().workflow().phase(), Phase::PartialFailure);
    assert_eq!(app.mail_merge().workflow().retry_list().len(), 1);
}

#[tokio::test]
async fn unauthorized_send_discards_the_workflow_and_the_session() {
    // Arrange
    let mut app = spawn_app().await;
    app.upload_sample().await;
    Mock::given(path("/send_email"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&app.backend)
        .await;

    // Act
    let outcome = app.mail_merge().send().await;

    // Assert
    assert!(matches!(outcome, Err(MailMergeError::Unauthorized)));
    assert!(!app.mail_merge().session().is_authenticated());
    assert_eq!(app.mail_merge().workflow().phase(), Phase::Idle);
    assert!(app.mail_merge().workflow().recipients().is_none());
    assert!(app.mail_merge().workflow().outcome().is_none());
    assert_none!(app.store.load().await.unwrap().auth_token);
}

#[tokio::test]
async fn unauthorized_retry_discards_the_outcome() {
    // Arrange
    let mut app = spawn_app().await;
    app.upload_sample().await;
    app.mount_send_once(serde_json::json!({"failed": [recipient_json(2, "b@acme.com")]}))
        .await;
    Mock::given(path("/send_email"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&app.backend)
        .await;
    app.mail_merge().send().await.unwrap();

    // Act
    let outcome = app.mail_merge().retry().await;

    // Assert
    assert!(matches!(outcome, Err(MailMergeError::Unauthorized)));
    assert!(app.mail_merge().workflow().outcome().is_none());
    assert!(app.mail_merge().workflow().retry_list().is_empty());
}

#[tokio::test]
async fn cancelled_retry_cannot_be_resumed() {
    // Arrange
    let mut app = spawn_app().await;
    app.upload_sample().await;
    app.mount_send_once(serde_json::json!({"failed": [recipient_json(2, "b@acme.com")]}))
        .await;
    app.mail_merge().send().await.unwrap();

    // Act
    assert_ok!(app.mail_merge().cancel_retry());
    let outcome = app.mail_merge().retry().await;

    // Assert
    assert!(matches!(outcome, Err(MailMergeError::Workflow(_))));
    assert_eq!(app.mail_merge().workflow().phase(), Phase::RetryCancelled);
    assert_eq!(app.sent_batches().await.len(), 1);
}

#[tokio::test]
async fn back_to_main_clears_the_cycle() {
    // Arrange
    let mut app = spawn_app().await;
    app.upload_sample().await;
    app.mount_send_once(serde_json::json!({"failed": [recipient_json(2, "b@acme.com")]}))
        .await;
    app.mail_merge().send().await.unwrap();

    // Act
    app.mail_merge().back_to_main();

    // Assert
    assert_eq!(app.mail_merge().workflow().phase(), Phase::Idle);
    assert!(app.mail_merge().workflow().outcome().is_none());
    assert!(app.mail_merge().session().is_authenticated());
}
