// SPDX-FileCopyrightText: 2026 Leadline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Lead lifecycle after dispatch: provider actions, client decisions and
//! the sweeps.

use chrono::{Duration, Utc};
use leadline_audit::check_timeline;
use leadline_core::{
    AssignmentStatus, DispatchHints, EventType, Lead, LeadRepository, LeadStatus, LeadlineError,
    Provider,
};
use leadline_dispatch::{ClientDecision, DispatchTrigger, ProviderAction};
use leadline_test_utils::TestHarness;
use leadline_test_utils::fixtures;
use serde_json::json;

fn rated(id: &str, rating: f64) -> Provider {
    Provider {
        rating_average: rating,
        ..fixtures::provider(id)
    }
}

/// A harness with two providers and one lead dispatched to both.
async fn dispatched_pair() -> (TestHarness, Lead) {
    let harness = TestHarness::builder()
        .with_providers(vec![rated("p-1", 5.0), rated("p-2", 4.0)])
        .with_matching(json!({ "max_artisans_per_lead": 2 }))
        .build()
        .await
        .unwrap();
    let lead = harness
        .insert_lead(fixtures::lead(), Utc::now())
        .await
        .unwrap();
    let assigned = harness
        .dispatcher
        .dispatch(&lead.id, &DispatchHints::default())
        .await;
    assert_eq!(assigned, vec!["p-1", "p-2"]);
    (harness, lead)
}

fn quote(amount: f64) -> ProviderAction {
    ProviderAction::Quote {
        amount,
        valid_days: None,
    }
}

#[tokio::test]
async fn view_never_downgrades_a_status() {
    let (harness, lead) = dispatched_pair().await;
    let d = &harness.dispatcher;
    let now = Utc::now();

    let viewed = d
        .provider_action(&lead.id, "p-1", ProviderAction::View, now)
        .await
        .unwrap();
    assert_eq!(viewed.status, AssignmentStatus::Viewed);
    assert!(viewed.viewed_at.is_some());
    assert_eq!(harness.lead(&lead.id).await.unwrap().status, LeadStatus::Viewed);

    let quoted = d
        .provider_action(&lead.id, "p-1", quote(180.0), now)
        .await
        .unwrap();
    assert_eq!(quoted.status, AssignmentStatus::Quoted);

    let again = d
        .provider_action(&lead.id, "p-1", ProviderAction::View, now + Duration::minutes(5))
        .await
        .unwrap();
    assert_eq!(again.status, AssignmentStatus::Quoted);
    assert_eq!(again.viewed_at, viewed.viewed_at);
    assert_eq!(harness.lead(&lead.id).await.unwrap().status, LeadStatus::Quoted);

    let views = harness
        .timeline(&lead.id)
        .await
        .unwrap()
        .iter()
        .filter(|e| e.event_type == EventType::Viewed)
        .count();
    assert_eq!(views, 2);
}

#[tokio::test]
async fn quote_records_amount_and_default_validity() {
    let (harness, lead) = dispatched_pair().await;
    let now = Utc::now();
    harness
        .dispatcher
        .provider_action(&lead.id, "p-2", quote(250.0), now)
        .await
        .unwrap();

    let event = harness
        .timeline(&lead.id)
        .await
        .unwrap()
        .into_iter()
        .find(|e| e.event_type == EventType::Quoted)
        .unwrap();
    assert_eq!(event.provider_id.as_deref(), Some("p-2"));
    assert_eq!(event.metadata["amount"], json!(250.0));
    assert_eq!(
        event.metadata["valid_until"],
        json!((now + Duration::hours(72)).to_rfc3339())
    );

    let err = harness
        .dispatcher
        .provider_action(&lead.id, "p-1", quote(0.0), now)
        .await
        .unwrap_err();
    assert!(matches!(err, LeadlineError::Validation { .. }));
}

#[tokio::test]
async fn lead_is_declined_once_every_provider_declines() {
    let (harness, lead) = dispatched_pair().await;
    let d = &harness.dispatcher;
    let now = Utc::now();
    let decline = |reason: &str| ProviderAction::Decline {
        reason: Some(reason.to_string()),
    };

    d.provider_action(&lead.id, "p-1", decline("trop loin"), now)
        .await
        .unwrap();
    assert_eq!(
        harness.lead(&lead.id).await.unwrap().status,
        LeadStatus::Dispatched
    );

    let err = d
        .provider_action(&lead.id, "p-1", quote(90.0), now)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        LeadlineError::InvalidTransition { entity: "assignment", .. }
    ));

    d.provider_action(&lead.id, "p-2", decline("complet"), now)
        .await
        .unwrap();
    assert_eq!(
        harness.lead(&lead.id).await.unwrap().status,
        LeadStatus::Declined
    );
}

#[tokio::test]
async fn accept_requires_a_quote_and_completes_the_lifecycle() {
    let (harness, lead) = dispatched_pair().await;
    let d = &harness.dispatcher;
    let now = Utc::now();

    let err = d
        .client_decision(&lead.id, "p-1", ClientDecision::Accept, "client-1", now)
        .await
        .unwrap_err();
    assert!(matches!(err, LeadlineError::InvalidTransition { .. }));

    d.provider_action(&lead.id, "p-1", ProviderAction::View, now)
        .await
        .unwrap();
    d.provider_action(&lead.id, "p-1", quote(120.0), now)
        .await
        .unwrap();
    let accepted = d
        .client_decision(&lead.id, "p-1", ClientDecision::Accept, "client-1", now)
        .await
        .unwrap();
    assert_eq!(accepted.status, LeadStatus::Accepted);

    // Accepted leads take no further provider actions.
    let err = d
        .provider_action(&lead.id, "p-2", ProviderAction::View, now)
        .await
        .unwrap_err();
    assert!(matches!(err, LeadlineError::InvalidTransition { entity: "lead", .. }));

    let completed = d.complete(&lead.id, "client-1", now).await.unwrap();
    assert_eq!(completed.status, LeadStatus::Completed);
    assert!(d.complete(&lead.id, "client-1", now).await.is_err());

    let timeline = harness.timeline(&lead.id).await.unwrap();
    let kinds: Vec<EventType> = timeline.iter().map(|e| e.event_type).collect();
    assert_eq!(
        kinds,
        vec![
            EventType::Dispatched,
            EventType::Viewed,
            EventType::Quoted,
            EventType::Accepted,
            EventType::Completed,
        ]
    );
}

#[tokio::test]
async fn intake_to_completion_has_a_clean_timeline() {
    let harness = TestHarness::builder()
        .with_providers(vec![fixtures::provider("p-1")])
        .build()
        .await
        .unwrap();
    let d = &harness.dispatcher;
    let intake = d.intake(fixtures::lead()).await.unwrap();
    intake.dispatch.await.unwrap();
    let lead_id = intake.lead.id;

    let now = Utc::now();
    d.provider_action(&lead_id, "p-1", quote(300.0), now)
        .await
        .unwrap();
    d.client_decision(&lead_id, "p-1", ClientDecision::Refuse, "client-1", now)
        .await
        .unwrap();
    let lead = d
        .client_decision(&lead_id, "p-1", ClientDecision::Accept, "client-1", now)
        .await
        .unwrap();
    assert_eq!(lead.status, LeadStatus::Accepted);

    let timeline = harness.timeline(&lead_id).await.unwrap();
    let created = timeline
        .iter()
        .position(|e| e.event_type == EventType::Created)
        .unwrap();
    let dispatched = timeline
        .iter()
        .position(|e| e.event_type == EventType::Dispatched)
        .unwrap();
    assert!(created < dispatched);
    assert!(timeline.iter().any(|e| e.event_type == EventType::Refused));
    assert!(check_timeline(&timeline).is_empty());
}

#[tokio::test]
async fn unknown_assignment_is_not_found() {
    let (harness, lead) = dispatched_pair().await;
    let err = harness
        .dispatcher
        .provider_action(&lead.id, "p-ghost", ProviderAction::View, Utc::now())
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

// ---- Sweeps ----

#[tokio::test]
async fn expiry_only_touches_stale_open_leads() {
    let harness = TestHarness::builder().build().await.unwrap();
    let now = Utc::now();
    let old = now - Duration::hours(72);

    let stale = harness.insert_lead(fixtures::lead(), old).await.unwrap();
    let fresh = harness
        .insert_lead(fixtures::lead(), now - Duration::hours(2))
        .await
        .unwrap();
    let accepted = harness.insert_lead(fixtures::lead(), old).await.unwrap();
    harness
        .storage
        .transition_lead(&accepted.id, &[LeadStatus::Pending], LeadStatus::Accepted, old)
        .await
        .unwrap();

    let expired = harness.dispatcher.expire_stale_leads(now).await.unwrap();
    assert_eq!(expired, vec![stale.id.clone()]);
    assert_eq!(harness.lead(&stale.id).await.unwrap().status, LeadStatus::Expired);
    assert_eq!(harness.lead(&fresh.id).await.unwrap().status, LeadStatus::Pending);
    assert_eq!(
        harness.lead(&accepted.id).await.unwrap().status,
        LeadStatus::Accepted
    );

    let timeline = harness.timeline(&stale.id).await.unwrap();
    assert_eq!(timeline.len(), 1);
    assert_eq!(timeline[0].event_type, EventType::Expired);
    assert_eq!(timeline[0].metadata["previous_status"], "pending");

    // A second sweep finds nothing left to expire.
    assert!(harness.dispatcher.expire_stale_leads(now).await.unwrap().is_empty());
}

#[tokio::test]
async fn stale_pending_assignment_moves_to_next_best_provider() {
    let harness = TestHarness::builder()
        .with_providers(vec![rated("p-1", 5.0), rated("p-2", 4.0)])
        .with_matching(json!({ "max_artisans_per_lead": 1 }))
        .build()
        .await
        .unwrap();
    let now = Utc::now();
    let earlier = now - Duration::hours(30);
    let lead = harness.insert_lead(fixtures::lead(), earlier).await.unwrap();
    harness
        .dispatcher
        .dispatch_at(&lead.id, &DispatchHints::default(), DispatchTrigger::Manual, earlier)
        .await;

    let moved = harness.dispatcher.auto_reassign_stale(now).await.unwrap();
    assert_eq!(moved.len(), 1);
    assert_eq!(moved[0].provider_id, "p-2");
    assert_eq!(moved[0].status, AssignmentStatus::Pending);
    assert_eq!(moved[0].position, 1);

    let event = harness
        .timeline(&lead.id)
        .await
        .unwrap()
        .into_iter()
        .find(|e| e.event_type == EventType::Reassigned)
        .unwrap();
    assert_eq!(event.metadata["reason"], "auto");
    assert_eq!(event.metadata["previous_provider_id"], "p-1");
    assert!(event.actor_id.is_none());

    // The fresh assignment is not stale yet.
    assert!(harness.dispatcher.auto_reassign_stale(now).await.unwrap().is_empty());
}

#[tokio::test]
async fn stale_assignment_without_replacement_is_left_alone() {
    let harness = TestHarness::builder()
        .with_providers(vec![fixtures::provider("p-1")])
        .build()
        .await
        .unwrap();
    let now = Utc::now();
    let earlier = now - Duration::hours(30);
    let lead = harness.insert_lead(fixtures::lead(), earlier).await.unwrap();
    harness
        .dispatcher
        .dispatch_at(&lead.id, &DispatchHints::default(), DispatchTrigger::Manual, earlier)
        .await;

    let moved = harness.dispatcher.auto_reassign_stale(now).await.unwrap();
    assert!(moved.is_empty());
    let rows = harness.assignments(&lead.id).await.unwrap();
    assert_eq!(rows[0].provider_id, "p-1");
}

#[tokio::test]
async fn queue_stats_count_assignments_by_status() {
    let (harness, lead) = dispatched_pair().await;
    harness
        .dispatcher
        .provider_action(&lead.id, "p-1", ProviderAction::View, Utc::now())
        .await
        .unwrap();
    let stats = harness.dispatcher.queue_stats().await.unwrap();
    assert_eq!(stats.total, 2);
    assert_eq!(stats.pending, 1);
    assert_eq!(stats.viewed, 1);
    assert_eq!(stats.quoted, 0);
}
