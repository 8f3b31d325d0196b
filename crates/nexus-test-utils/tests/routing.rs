// SPDX-FileCopyrightText: 2026 Nexus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end routing tests against mock platforms and a mock workspace.

use std::sync::Arc;
use std::time::Duration;

use nexus_bridge::OutboundMessage;
use nexus_core::{BridgeStatus, ConversationStatus, Direction, NexusError, Platform, TenantId, TenantProfile};
use nexus_test_utils::{
    MockInbound, SendFailure, TestHarness, inbound_payload, receipt_payload, valid_credentials,
};

fn acme() -> TenantId {
    TenantId::from("acme")
}

fn auto_responding_tenant() -> TenantProfile {
    let mut tenant = TenantProfile::new("acme", "Acme");
    tenant.auto_respond = true;
    tenant.confidence_threshold = 0.8;
    tenant
}

async fn bridge_status(harness: &TestHarness, platform: Platform) -> BridgeStatus {
    harness.manager.status(&acme(), platform).await.unwrap().bridge.status
}

// --- Lifecycle -----------------------------------------------------------

#[tokio::test]
async fn setup_lists_fields_and_verification() {
    let harness = TestHarness::builder()
        .with_settings(|s| s.public_base_url = Some("https://bridge.example.com".into()))
        .build()
        .await
        .unwrap();

    let setup = harness.manager.initiate_setup(&acme(), Platform::WhatsApp).await.unwrap();
    assert_eq!(setup.status, BridgeStatus::Pending);
    assert!(setup.required_fields.contains(&"webhook_verify_token"));
    assert!(setup.requires_verification);
    assert_eq!(
        setup.webhook_url.as_deref(),
        Some(format!("https://bridge.example.com{}", setup.webhook_path).as_str())
    );

    // Running setup again returns the same bridge.
    let again = harness.manager.initiate_setup(&acme(), Platform::WhatsApp).await.unwrap();
    assert_eq!(again.bridge_id, setup.bridge_id);
}

#[tokio::test]
async fn configure_rejects_missing_fields() {
    let harness = TestHarness::builder().build().await.unwrap();
    harness.manager.initiate_setup(&acme(), Platform::Telegram).await.unwrap();

    let partial = nexus_core::Credentials::new().with("bot_token", "123:abc");
    let err = harness
        .manager
        .configure(&acme(), Platform::Telegram, partial)
        .await
        .unwrap_err();
    assert!(matches!(err, NexusError::Config(_)));
    assert!(err.to_string().contains("bot_username"));
    assert_eq!(bridge_status(&harness, Platform::Telegram).await, BridgeStatus::Pending);
}

#[tokio::test]
async fn configure_requires_setup_first() {
    let harness = TestHarness::builder().build().await.unwrap();
    let err = harness
        .manager
        .configure(&acme(), Platform::Signal, valid_credentials(Platform::Signal))
        .await
        .unwrap_err();
    assert!(matches!(err, NexusError::NotFound { .. }));
}

#[tokio::test]
async fn activate_requires_passing_test() {
    let harness = TestHarness::builder().build().await.unwrap();
    harness.manager.initiate_setup(&acme(), Platform::Telegram).await.unwrap();
    harness
        .manager
        .configure(&acme(), Platform::Telegram, valid_credentials(Platform::Telegram))
        .await
        .unwrap();

    let err = harness.manager.activate(&acme(), Platform::Telegram).await.unwrap_err();
    assert!(matches!(err, NexusError::Config(_)));
    assert_eq!(bridge_status(&harness, Platform::Telegram).await, BridgeStatus::Configuring);
    assert!(harness.workspace.bridge_inits().await.is_empty());
}

#[tokio::test]
async fn active_bridge_refuses_reconfiguration() {
    let harness = TestHarness::builder().build().await.unwrap();
    harness.activate_bridge("acme", Platform::Telegram).await.unwrap();

    let err = harness
        .manager
        .configure(&acme(), Platform::Telegram, valid_credentials(Platform::Telegram))
        .await
        .unwrap_err();
    assert!(matches!(err, NexusError::Config(_)));
    assert!(harness.manager.initiate_setup(&acme(), Platform::Telegram).await.is_err());
    assert_eq!(bridge_status(&harness, Platform::Telegram).await, BridgeStatus::Active);
}

#[tokio::test]
async fn failed_connection_test_records_diagnostic() {
    let harness = TestHarness::builder().build().await.unwrap();
    harness.platform.set_connection_ok(false);
    harness.manager.initiate_setup(&acme(), Platform::Instagram).await.unwrap();
    harness
        .manager
        .configure(&acme(), Platform::Instagram, valid_credentials(Platform::Instagram))
        .await
        .unwrap();

    let report = harness.manager.test_connection(&acme(), Platform::Instagram).await.unwrap();
    assert!(!report.ok);
    assert_eq!(report.status, BridgeStatus::Error);
    let bridge = harness.manager.status(&acme(), Platform::Instagram).await.unwrap().bridge;
    assert!(bridge.error_message.unwrap().contains("invalid token"));
    assert!(!harness.manager.registry().contains(&acme(), Platform::Instagram));

    // A later passing test clears the error.
    harness.platform.set_connection_ok(true);
    let report = harness.manager.test_connection(&acme(), Platform::Instagram).await.unwrap();
    assert!(report.ok);
    assert_eq!(report.status, BridgeStatus::Configured);
}

#[tokio::test]
async fn slow_connection_test_times_out() {
    let harness = TestHarness::builder()
        .with_settings(|s| s.test_timeout = Duration::from_millis(50))
        .build()
        .await
        .unwrap();
    harness.platform.set_test_delay(Some(Duration::from_millis(500))).await;
    harness.manager.initiate_setup(&acme(), Platform::Facebook).await.unwrap();
    harness
        .manager
        .configure(&acme(), Platform::Facebook, valid_credentials(Platform::Facebook))
        .await
        .unwrap();

    let report = harness.manager.test_connection(&acme(), Platform::Facebook).await.unwrap();
    assert!(!report.ok);
    assert!(report.diagnostic.contains("timed out"));
    assert_eq!(report.status, BridgeStatus::Error);
}

#[tokio::test]
async fn deactivate_then_reactivate_keeps_credentials() {
    let harness = TestHarness::builder().build().await.unwrap();
    harness.activate_bridge("acme", Platform::Signal).await.unwrap();

    let bridge = harness.manager.deactivate(&acme(), Platform::Signal).await.unwrap();
    assert_eq!(bridge.status, BridgeStatus::Inactive);
    assert!(!harness.manager.registry().contains(&acme(), Platform::Signal));

    let bridge = harness.manager.activate(&acme(), Platform::Signal).await.unwrap();
    assert_eq!(bridge.status, BridgeStatus::Active);
    assert!(bridge.setup_completed_at.is_some());
}

#[tokio::test]
async fn credentials_decrypt_for_verification() {
    let harness = TestHarness::builder().build().await.unwrap();
    harness.activate_bridge("acme", Platform::WhatsApp).await.unwrap();

    let creds = harness.manager.credentials(&acme(), Platform::WhatsApp).await.unwrap();
    assert_eq!(creds.get("webhook_verify_token"), Some("test-webhook_verify_token"));

    // Only public identifiers reach the workspace.
    let init = &harness.workspace.bridge_inits().await[0];
    assert!(init.public_ids.contains_key("phone_number_id"));
    assert!(!init.public_ids.contains_key("access_token"));
}

// --- Inbound -------------------------------------------------------------

#[tokio::test]
async fn inbound_message_is_stored_and_forwarded() {
    let harness = TestHarness::builder().build().await.unwrap();
    harness.activate_bridge("acme", Platform::Telegram).await.unwrap();

    let id = harness
        .deliver(
            "acme",
            Platform::Telegram,
            inbound_payload(&[MockInbound::text("u42", "where is my order?").named("Dana").id("m1")]),
        )
        .await
        .unwrap();

    let event = harness.event(id).await.unwrap();
    assert!(event.processed);
    assert_eq!(event.event_type, "message");

    let conversations = harness.conversations("acme").await;
    assert_eq!(conversations.len(), 1);
    assert_eq!(conversations[0].external_id, "u42");
    assert_eq!(conversations[0].participant_name.as_deref(), Some("Dana"));

    let messages = harness.messages(&conversations[0].id).await;
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].direction, Direction::Inbound);
    assert!(messages[0].is_processed);
    assert_eq!(messages[0].webhook_event_id, Some(id));

    let posts = harness.workspace.posts().await;
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].text, "[TELEGRAM] Dana (u42): where is my order?");
    assert_eq!(posts[0].room.0, "!acme-telegram-u42:mock");
}

#[tokio::test]
async fn anonymous_sender_is_labelled_by_id() {
    let harness = TestHarness::builder().build().await.unwrap();
    harness.activate_bridge("acme", Platform::Signal).await.unwrap();
    harness
        .deliver("acme", Platform::Signal, inbound_payload(&[MockInbound::text("+15550001", "hi")]))
        .await
        .unwrap();
    assert_eq!(
        harness.workspace.post_texts().await,
        vec!["[SIGNAL] +15550001 (+15550001): hi".to_string()]
    );
}

#[tokio::test]
async fn same_millisecond_messages_keep_arrival_order() {
    let harness = TestHarness::builder().build().await.unwrap();
    harness.activate_bridge("acme", Platform::WhatsApp).await.unwrap();

    let at = chrono::Utc::now().timestamp_millis();
    harness
        .deliver(
            "acme",
            Platform::WhatsApp,
            inbound_payload(&[
                MockInbound::text("u1", "first").id("a").at(at),
                MockInbound::text("u1", "second").id("b").at(at),
                MockInbound::text("u1", "third").id("c").at(at),
            ]),
        )
        .await
        .unwrap();

    let conversation = &harness.conversations("acme").await[0];
    let contents: Vec<String> = harness
        .messages(&conversation.id)
        .await
        .into_iter()
        .map(|m| m.content)
        .collect();
    assert_eq!(contents, ["first", "second", "third"]);
}

#[tokio::test]
async fn duplicate_delivery_is_forwarded_once() {
    let harness = TestHarness::builder().build().await.unwrap();
    harness.activate_bridge("acme", Platform::Facebook).await.unwrap();
    let payload = inbound_payload(&[MockInbound::text("psid-1", "hello").id("mid.1")]);

    let first = harness.deliver("acme", Platform::Facebook, payload.clone()).await.unwrap();
    let second = harness.deliver("acme", Platform::Facebook, payload).await.unwrap();
    assert_ne!(first, second);
    assert!(harness.event(second).await.unwrap().processed);

    let conversation = &harness.conversations("acme").await[0];
    assert_eq!(harness.messages(&conversation.id).await.len(), 1);
    assert_eq!(harness.workspace.posts().await.len(), 1);
}

#[tokio::test]
async fn workspace_failure_is_replayed_without_duplicates() {
    let harness = TestHarness::builder().build().await.unwrap();
    harness.activate_bridge("acme", Platform::Telegram).await.unwrap();
    harness.workspace.fail_next_sends(1);

    let id = harness
        .deliver(
            "acme",
            Platform::Telegram,
            inbound_payload(&[MockInbound::text("u1", "are you open?").id("m1")]),
        )
        .await
        .unwrap();
    let event = harness.event(id).await.unwrap();
    assert!(!event.processed);
    assert_eq!(event.retry_count, 1);
    assert!(event.error.is_some());
    assert!(harness.workspace.posts().await.is_empty());

    let queued = harness.manager.replay_pending().await.unwrap();
    assert_eq!(queued, 1);
    harness.settle().await;

    assert!(harness.event(id).await.unwrap().processed);
    let conversation = &harness.conversations("acme").await[0];
    let messages = harness.messages(&conversation.id).await;
    assert_eq!(messages.len(), 1);
    assert!(messages[0].is_processed);
    assert_eq!(harness.workspace.posts().await.len(), 1);

    // Nothing left to replay.
    assert_eq!(harness.manager.replay_pending().await.unwrap(), 0);
}

#[tokio::test]
async fn malformed_payload_is_not_retried() {
    let harness = TestHarness::builder().build().await.unwrap();
    harness.activate_bridge("acme", Platform::Instagram).await.unwrap();

    let id = harness
        .deliver("acme", Platform::Instagram, serde_json::json!("not an object"))
        .await
        .unwrap();
    let event = harness.event(id).await.unwrap();
    assert!(!event.processed);
    assert_eq!(event.retry_count, harness.manager.settings().max_webhook_retries);
    assert_eq!(harness.manager.replay_pending().await.unwrap(), 0);
}

#[tokio::test]
async fn status_updates_are_recorded_without_routing() {
    let harness = TestHarness::builder().build().await.unwrap();
    harness.activate_bridge("acme", Platform::WhatsApp).await.unwrap();

    let id = harness.deliver("acme", Platform::WhatsApp, receipt_payload()).await.unwrap();
    let event = harness.event(id).await.unwrap();
    assert!(event.processed);
    assert_eq!(event.event_type, "status");
    assert!(harness.conversations("acme").await.is_empty());
}

#[tokio::test]
async fn inactive_bridge_rejects_webhooks() {
    let harness = TestHarness::builder().build().await.unwrap();
    harness.activate_bridge("acme", Platform::Telegram).await.unwrap();
    harness.manager.deactivate(&acme(), Platform::Telegram).await.unwrap();

    let err = harness
        .deliver("acme", Platform::Telegram, inbound_payload(&[MockInbound::text("u1", "hi")]))
        .await
        .unwrap_err();
    assert!(matches!(err, NexusError::Config(_)));
    let report = harness.manager.status(&acme(), Platform::Telegram).await.unwrap();
    assert!(report.recent_events.is_empty());
}

#[tokio::test]
async fn unknown_bridge_webhook_is_not_found() {
    let harness = TestHarness::builder().build().await.unwrap();
    let err = harness
        .deliver("ghost", Platform::Signal, inbound_payload(&[MockInbound::text("u1", "hi")]))
        .await
        .unwrap_err();
    assert!(matches!(err, NexusError::NotFound { .. }));
}

#[tokio::test]
async fn full_queue_defers_to_replay() {
    let harness = TestHarness::builder()
        .without_workers()
        .with_settings(|s| s.queue_capacity = 1)
        .build()
        .await
        .unwrap();
    harness.activate_bridge("acme", Platform::Telegram).await.unwrap();

    for n in 0..3 {
        let payload = inbound_payload(&[MockInbound::text("u1", &format!("msg {n}"))]);
        harness
            .manager
            .handle_webhook(&acme(), Platform::Telegram, &payload)
            .await
            .unwrap();
    }
    assert_eq!(harness.manager.queue_depth(), 1);
    let report = harness.manager.status(&acme(), Platform::Telegram).await.unwrap();
    assert_eq!(report.recent_events.len(), 3);
    assert!(report.recent_events.iter().all(|e| !e.processed));
}

#[tokio::test]
async fn ai_job_refused_by_full_queue_is_replayed() {
    let mut harness = TestHarness::builder()
        .without_workers()
        .with_settings(|s| s.queue_capacity = 1)
        .with_tenant(auto_responding_tenant())
        .build()
        .await
        .unwrap();
    harness.activate_bridge("acme", Platform::Telegram).await.unwrap();
    harness.scorer.push_reply("We open at 9am.", 0.95).await;

    // The receipt occupies the only queue slot.
    let receipt = harness
        .manager
        .handle_webhook(&acme(), Platform::Telegram, &receipt_payload())
        .await
        .unwrap();
    let question = harness
        .manager
        .handle_webhook(
            &acme(),
            Platform::Telegram,
            &inbound_payload(&[MockInbound::text("u1", "when do you open?").id("m1")]),
        )
        .await
        .unwrap();
    harness.manager.process_webhook_event(question).await.unwrap();

    assert!(harness.event(question).await.unwrap().processed);
    let conversation = harness.conversations("acme").await.remove(0);
    let stored = harness.messages(&conversation.id).await;
    assert!(stored[0].is_processed);
    assert!(stored[0].ai_annotation.is_none());
    assert!(harness.platform.sent_messages().await.is_empty());

    harness.start_workers();
    harness.settle().await;
    assert!(harness.event(receipt).await.unwrap().processed);

    assert_eq!(harness.manager.replay_pending().await.unwrap(), 1);
    harness.settle().await;

    let sent = harness.platform.sent_messages().await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].content, "We open at 9am.");
    let stored = harness.messages(&conversation.id).await;
    let annotation = stored[0].ai_annotation.clone().unwrap();
    assert_eq!(annotation.action, "auto_send");
    assert_eq!(harness.manager.replay_pending().await.unwrap(), 0);
}

#[tokio::test]
async fn harness_shutdown_stops_workers_and_evicts_adapters() {
    let harness = TestHarness::builder().build().await.unwrap();
    harness.activate_bridge("acme", Platform::Telegram).await.unwrap();
    harness
        .manager
        .send_message(OutboundMessage::text(acme(), Platform::Telegram, "u1", "hello"))
        .await
        .unwrap();
    let platform = Arc::clone(&harness.platform);
    let manager = Arc::clone(&harness.manager);
    assert!(manager.registry().contains(&acme(), Platform::Telegram));

    harness.shutdown().await;
    assert!(!manager.registry().contains(&acme(), Platform::Telegram));
    assert!(platform.shutdowns() >= 1);
}

// --- AI ------------------------------------------------------------------

#[tokio::test]
async fn confident_suggestion_is_sent() {
    let harness = TestHarness::builder()
        .with_tenant(auto_responding_tenant())
        .build()
        .await
        .unwrap();
    harness.activate_bridge("acme", Platform::Telegram).await.unwrap();
    harness.scorer.push_reply("We open at 9am.", 0.95).await;

    harness
        .deliver(
            "acme",
            Platform::Telegram,
            inbound_payload(&[MockInbound::text("u1", "when do you open?").id("m1")]),
        )
        .await
        .unwrap();

    let sent = harness.platform.sent_messages().await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].recipient, "u1");
    assert_eq!(sent[0].content, "We open at 9am.");

    let conversation = &harness.conversations("acme").await[0];
    assert_eq!(conversation.status, ConversationStatus::Active);
    let messages = harness.messages(&conversation.id).await;
    assert_eq!(messages.len(), 2);
    let annotation = messages[0].ai_annotation.as_ref().unwrap();
    assert_eq!(annotation.action, "auto_send");
    assert!(!annotation.escalate);

    let reply = &messages[1];
    assert_eq!(reply.direction, Direction::Outbound);
    assert_eq!(reply.metadata["ai_generated"], true);
    assert_eq!(reply.metadata["in_reply_to"], messages[0].id.as_str());
    assert!(reply.platform_message_id.is_some());
}

#[tokio::test]
async fn low_confidence_escalates_instead_of_sending() {
    let harness = TestHarness::builder()
        .with_tenant(auto_responding_tenant())
        .build()
        .await
        .unwrap();
    harness.activate_bridge("acme", Platform::WhatsApp).await.unwrap();
    harness.scorer.push_reply("Maybe?", 0.5).await;

    harness
        .deliver("acme", Platform::WhatsApp, inbound_payload(&[MockInbound::text("u1", "odd question")]))
        .await
        .unwrap();

    assert_eq!(harness.platform.sent_count().await, 0);
    let conversation = &harness.conversations("acme").await[0];
    assert_eq!(conversation.status, ConversationStatus::Escalated);
    let reason = conversation.metadata["escalation_reason"].as_str().unwrap();
    assert!(reason.contains("below threshold"));
    assert!(conversation.metadata["escalated_at"].is_string());

    let annotation = harness.messages(&conversation.id).await[0].ai_annotation.clone().unwrap();
    assert!(annotation.escalate);
    assert_eq!(annotation.text.as_deref(), Some("Maybe?"));
}

#[tokio::test]
async fn keyword_escalates_even_when_confident() {
    let harness = TestHarness::builder()
        .with_tenant(auto_responding_tenant())
        .build()
        .await
        .unwrap();
    harness.activate_bridge("acme", Platform::Signal).await.unwrap();
    harness.scorer.push_reply("Refund issued.", 0.99).await;

    harness
        .deliver("acme", Platform::Signal, inbound_payload(&[MockInbound::text("u1", "I want a REFUND now")]))
        .await
        .unwrap();

    assert_eq!(harness.platform.sent_count().await, 0);
    let conversation = &harness.conversations("acme").await[0];
    assert_eq!(conversation.status, ConversationStatus::Escalated);
    assert!(conversation.metadata["escalation_reason"].as_str().unwrap().contains("refund"));
}

#[tokio::test]
async fn suggestions_are_recorded_when_auto_respond_is_off() {
    let harness = TestHarness::builder()
        .with_tenant(TenantProfile::new("acme", "Acme"))
        .build()
        .await
        .unwrap();
    harness.activate_bridge("acme", Platform::Telegram).await.unwrap();
    harness.scorer.push_reply("Sure thing.", 0.95).await;

    harness
        .deliver("acme", Platform::Telegram, inbound_payload(&[MockInbound::text("u1", "can you help?")]))
        .await
        .unwrap();

    assert_eq!(harness.platform.sent_count().await, 0);
    let conversation = &harness.conversations("acme").await[0];
    assert_eq!(conversation.status, ConversationStatus::Active);
    let annotation = harness.messages(&conversation.id).await[0].ai_annotation.clone().unwrap();
    assert_eq!(annotation.action, "record_only");
}

#[tokio::test]
async fn scorer_sees_prior_turns_oldest_first() {
    let harness = TestHarness::builder()
        .with_tenant(TenantProfile::new("acme", "Acme"))
        .build()
        .await
        .unwrap();
    harness.activate_bridge("acme", Platform::Telegram).await.unwrap();
    for reply in ["a", "b", "c"] {
        harness.scorer.push_reply(reply, 0.9).await;
    }

    for (n, text) in ["one", "two", "three"].into_iter().enumerate() {
        harness
            .deliver(
                "acme",
                Platform::Telegram,
                inbound_payload(&[MockInbound::text("u1", text).id(&format!("m{n}"))]),
            )
            .await
            .unwrap();
    }

    let requests = harness.scorer.requests().await;
    assert_eq!(requests.len(), 3);
    let last = &requests[2];
    assert_eq!(last.message, "three");
    let history: Vec<&str> = last.history.iter().map(|t| t.content.as_str()).collect();
    assert_eq!(history, ["one", "two"]);
}

#[tokio::test]
async fn unknown_tenant_skips_ai() {
    let harness = TestHarness::builder().build().await.unwrap();
    harness.activate_bridge("acme", Platform::Telegram).await.unwrap();

    harness
        .deliver("acme", Platform::Telegram, inbound_payload(&[MockInbound::text("u1", "hello")]))
        .await
        .unwrap();

    assert!(harness.scorer.requests().await.is_empty());
    let conversation = &harness.conversations("acme").await[0];
    let annotation = harness.messages(&conversation.id).await[0].ai_annotation.clone().unwrap();
    assert_eq!(annotation.action, "skipped");
    assert!(!annotation.escalate);
}

// --- Outbound ------------------------------------------------------------

#[tokio::test]
async fn send_stores_outbound_message() {
    let harness = TestHarness::builder().build().await.unwrap();
    harness.activate_bridge("acme", Platform::WhatsApp).await.unwrap();

    let stored = harness
        .manager
        .send_message(OutboundMessage::text(acme(), Platform::WhatsApp, "+15550002", "Your order shipped"))
        .await
        .unwrap();
    assert_eq!(stored.direction, Direction::Outbound);
    assert!(stored.is_processed);
    assert_eq!(stored.platform_message_id.unwrap().0, "mock-out-1");

    let conversation = &harness.conversations("acme").await[0];
    assert_eq!(conversation.external_id, "+15550002");
    assert_eq!(stored.conversation_id, conversation.id);
}

#[tokio::test]
async fn send_requires_active_bridge() {
    let harness = TestHarness::builder().build().await.unwrap();
    harness.manager.initiate_setup(&acme(), Platform::Telegram).await.unwrap();

    let err = harness
        .manager
        .send_message(OutboundMessage::text(acme(), Platform::Telegram, "u1", "hi"))
        .await
        .unwrap_err();
    assert!(matches!(err, NexusError::Config(_)));
    assert_eq!(harness.platform.builds(), 0);
}

#[tokio::test]
async fn auth_failure_moves_bridge_to_error() {
    let harness = TestHarness::builder().build().await.unwrap();
    harness.activate_bridge("acme", Platform::Instagram).await.unwrap();
    harness.platform.fail_next_sends([SendFailure::Auth]).await;

    let err = harness
        .manager
        .send_message_with_retry(OutboundMessage::text(acme(), Platform::Instagram, "igsid", "hi"))
        .await
        .unwrap_err();
    assert!(matches!(err, NexusError::Auth { .. }));
    assert_eq!(bridge_status(&harness, Platform::Instagram).await, BridgeStatus::Error);
    assert!(!harness.manager.registry().contains(&acme(), Platform::Instagram));
    assert_eq!(harness.platform.sent_count().await, 0);

    // Inbound still lands while in error.
    let id = harness
        .deliver("acme", Platform::Instagram, inbound_payload(&[MockInbound::text("igsid", "hello?")]))
        .await
        .unwrap();
    assert!(harness.event(id).await.unwrap().processed);

    // A passing test brings the linked bridge straight back.
    let report = harness.manager.test_connection(&acme(), Platform::Instagram).await.unwrap();
    assert_eq!(report.status, BridgeStatus::Active);
    harness
        .manager
        .send_message(OutboundMessage::text(acme(), Platform::Instagram, "igsid", "hi"))
        .await
        .unwrap();
}

#[tokio::test]
async fn send_timeout_leaves_bridge_active() {
    let harness = TestHarness::builder().build().await.unwrap();
    harness.activate_bridge("acme", Platform::Signal).await.unwrap();
    harness.platform.fail_next_sends([SendFailure::Timeout]).await;

    let err = harness
        .manager
        .send_message(OutboundMessage::text(acme(), Platform::Signal, "+15550003", "ping"))
        .await
        .unwrap_err();
    assert!(err.is_retryable());
    assert!(err.to_string().contains("timed out"));
    assert_eq!(bridge_status(&harness, Platform::Signal).await, BridgeStatus::Active);
}

#[tokio::test]
async fn transient_failures_are_retried() {
    let harness = TestHarness::builder().build().await.unwrap();
    harness.activate_bridge("acme", Platform::Facebook).await.unwrap();
    harness
        .platform
        .fail_next_sends([SendFailure::Transient, SendFailure::Transient])
        .await;

    harness
        .manager
        .send_message_with_retry(OutboundMessage::text(acme(), Platform::Facebook, "psid", "hi"))
        .await
        .unwrap();
    assert_eq!(harness.platform.sent_count().await, 1);
}

#[tokio::test]
async fn retries_stop_at_max_attempts() {
    let harness = TestHarness::builder().build().await.unwrap();
    harness.activate_bridge("acme", Platform::Facebook).await.unwrap();
    harness
        .platform
        .fail_next_sends([SendFailure::Transient; 4])
        .await;

    let err = harness
        .manager
        .send_message_with_retry(OutboundMessage::text(acme(), Platform::Facebook, "psid", "hi"))
        .await
        .unwrap_err();
    assert!(err.is_retryable());
    assert_eq!(harness.platform.sent_count().await, 0);
    assert_eq!(bridge_status(&harness, Platform::Facebook).await, BridgeStatus::Active);
}

#[tokio::test]
async fn permanent_failure_is_not_retried() {
    let harness = TestHarness::builder().build().await.unwrap();
    harness.activate_bridge("acme", Platform::Telegram).await.unwrap();
    harness
        .platform
        .fail_next_sends([SendFailure::Permanent, SendFailure::Permanent])
        .await;

    let err = harness
        .manager
        .send_message_with_retry(OutboundMessage::text(acme(), Platform::Telegram, "bad", "hi"))
        .await
        .unwrap_err();
    assert!(matches!(err, NexusError::Permanent { .. }));

    // The second scripted failure is still queued.
    assert!(
        harness
            .manager
            .send_message(OutboundMessage::text(acme(), Platform::Telegram, "bad", "hi"))
            .await
            .is_err()
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_sends_share_one_adapter() {
    let harness = TestHarness::builder().build().await.unwrap();
    harness.activate_bridge("acme", Platform::Telegram).await.unwrap();
    harness.manager.registry().evict(&acme(), Platform::Telegram).await;
    let builds_before = harness.platform.builds();

    let mut tasks = Vec::new();
    for n in 0..8 {
        let manager = Arc::clone(&harness.manager);
        tasks.push(tokio::spawn(async move {
            manager
                .send_message(OutboundMessage::text(acme(), Platform::Telegram, "u1", &format!("msg {n}")))
                .await
        }));
    }
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    assert_eq!(harness.platform.builds(), builds_before + 1);
    assert_eq!(harness.platform.sent_count().await, 8);
    let conversation = &harness.conversations("acme").await[0];
    assert_eq!(harness.messages(&conversation.id).await.len(), 8);
}
