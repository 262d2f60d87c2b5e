// SPDX-FileCopyrightText: 2026 Leadline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Handlers for the lead, assignment and configuration subcommands.
//!
//! Every handler prints either pretty JSON (`--json`) or a short text
//! report, with colors only when stdout is a terminal.

use std::io::Read;
use std::path::Path;

use chrono::Utc;
use colored::Colorize;
use leadline_audit::check_timeline;
use leadline_core::{DispatchHints, LeadlineError, NewLead};
use leadline_dispatch::{ClientDecision, ConfigSource, ProviderAction};
use serde::Serialize;
use serde_json::Value;

use crate::{Context, Output};

fn print_json<T: Serialize>(value: &T) -> Result<(), LeadlineError> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| LeadlineError::Internal(format!("failed to encode output: {e}")))?;
    println!("{text}");
    Ok(())
}

fn parse_json(label: &str, text: &str) -> Result<Value, LeadlineError> {
    serde_json::from_str(text)
        .map_err(|e| LeadlineError::invalid_field(label, format!("invalid JSON: {e}")))
}

fn heading(out: Output, title: &str) {
    println!();
    if out.color {
        println!("  {}", title.bold());
    } else {
        println!("  {title}");
    }
    println!("  {}", "-".repeat(40));
}

fn print_assigned(out: Output, lead_id: &str, provider_ids: &[String]) {
    if provider_ids.is_empty() {
        let line = format!("lead {lead_id}: no provider assigned");
        if out.color {
            println!("{}", line.yellow());
        } else {
            println!("{line}");
        }
        return;
    }
    println!("lead {lead_id}: {} provider(s) assigned", provider_ids.len());
    for (i, id) in provider_ids.iter().enumerate() {
        println!("  {}. {id}", i + 1);
    }
}

pub async fn config_show(ctx: &Context) -> Result<(), LeadlineError> {
    let loaded = ctx.dispatcher.config_store().get_config().await;
    if ctx.out.json {
        return print_json(&loaded.config);
    }
    heading(ctx.out, "matching configuration");
    let source = match loaded.source {
        ConfigSource::Stored => "stored",
        ConfigSource::Defaults => "defaults",
    };
    println!("  source: {source}");
    let fields = serde_json::to_value(&loaded.config)
        .map_err(|e| LeadlineError::Internal(format!("failed to encode configuration: {e}")))?;
    if let Value::Object(map) = fields {
        for (key, value) in map {
            println!("  {key:<30} {value}");
        }
    }
    println!();
    Ok(())
}

pub async fn config_set(ctx: &Context, patch: &str, actor: &str) -> Result<(), LeadlineError> {
    let patch = parse_json("patch", patch)?;
    let config = ctx
        .dispatcher
        .config_store()
        .update_config(&patch, actor, Utc::now())
        .await?;
    if ctx.out.json {
        return print_json(&config);
    }
    let changed: Vec<&String> = patch.as_object().map(|m| m.keys().collect()).unwrap_or_default();
    println!("matching configuration updated by {actor}: {changed:?}");
    Ok(())
}

pub async fn config_history(ctx: &Context, limit: u32) -> Result<(), LeadlineError> {
    let entries = ctx.dispatcher.config_store().history(limit).await?;
    if ctx.out.json {
        return print_json(&entries);
    }
    heading(ctx.out, "configuration history");
    for entry in &entries {
        println!(
            "  {}  {:<16} {}",
            entry.created_at.format("%Y-%m-%d %H:%M:%S"),
            entry.actor_id,
            entry.changed_fields.join(", ")
        );
    }
    if entries.is_empty() {
        println!("  no changes recorded");
    }
    println!();
    Ok(())
}

pub async fn submit(ctx: &Context, file: &Path) -> Result<(), LeadlineError> {
    let text = if file.as_os_str() == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .map_err(|e| LeadlineError::Internal(format!("failed to read stdin: {e}")))?;
        buf
    } else {
        std::fs::read_to_string(file).map_err(|e| {
            LeadlineError::Internal(format!("failed to read {}: {e}", file.display()))
        })?
    };
    let new_lead: NewLead = serde_json::from_str(&text)
        .map_err(|e| LeadlineError::invalid_field("lead", format!("invalid lead JSON: {e}")))?;

    let intake = ctx.dispatcher.intake(new_lead).await?;
    // The process exits after this command, so the dispatch task is awaited.
    let provider_ids = intake
        .dispatch
        .await
        .map_err(|e| LeadlineError::Internal(format!("dispatch task failed: {e}")))?;

    if ctx.out.json {
        return print_json(&serde_json::json!({
            "lead": intake.lead,
            "provider_ids": provider_ids,
        }));
    }
    print_assigned(ctx.out, &intake.lead.id, &provider_ids);
    Ok(())
}

pub async fn dispatch(
    ctx: &Context,
    lead_id: &str,
    hints: Option<&str>,
) -> Result<(), LeadlineError> {
    let hints: DispatchHints = match hints {
        Some(text) => serde_json::from_value(parse_json("hints", text)?)
            .map_err(|e| LeadlineError::invalid_field("hints", e.to_string()))?,
        None => DispatchHints::default(),
    };
    let provider_ids = ctx.dispatcher.dispatch(lead_id, &hints).await;
    if ctx.out.json {
        return print_json(&provider_ids);
    }
    print_assigned(ctx.out, lead_id, &provider_ids);
    Ok(())
}

pub async fn replay(ctx: &Context, assignment_id: &str) -> Result<(), LeadlineError> {
    let provider_ids = ctx.dispatcher.replay(assignment_id).await?;
    if ctx.out.json {
        return print_json(&provider_ids);
    }
    print_assigned(ctx.out, assignment_id, &provider_ids);
    Ok(())
}

pub async fn reassign(
    ctx: &Context,
    assignment_id: &str,
    provider_id: &str,
    actor: &str,
) -> Result<(), LeadlineError> {
    let assignment = ctx
        .dispatcher
        .reassign(assignment_id, provider_id, actor)
        .await?;
    if ctx.out.json {
        return print_json(&assignment);
    }
    println!(
        "assignment {} (position {}) now held by {}",
        assignment.id, assignment.position, assignment.provider_id
    );
    Ok(())
}

pub async fn provider_action(
    ctx: &Context,
    lead_id: &str,
    provider_id: &str,
    action: ProviderAction,
) -> Result<(), LeadlineError> {
    let assignment = ctx
        .dispatcher
        .provider_action(lead_id, provider_id, action, Utc::now())
        .await?;
    if ctx.out.json {
        return print_json(&assignment);
    }
    println!(
        "assignment {} for {provider_id}: {}",
        assignment.id, assignment.status
    );
    Ok(())
}

pub async fn client_decision(
    ctx: &Context,
    lead_id: &str,
    provider_id: &str,
    decision: ClientDecision,
    actor: &str,
) -> Result<(), LeadlineError> {
    let lead = ctx
        .dispatcher
        .client_decision(lead_id, provider_id, decision, actor, Utc::now())
        .await?;
    if ctx.out.json {
        return print_json(&lead);
    }
    println!("lead {}: {}", lead.id, lead.status);
    Ok(())
}

pub async fn complete(ctx: &Context, lead_id: &str, actor: &str) -> Result<(), LeadlineError> {
    let lead = ctx.dispatcher.complete(lead_id, actor, Utc::now()).await?;
    if ctx.out.json {
        return print_json(&lead);
    }
    println!("lead {}: {}", lead.id, lead.status);
    Ok(())
}

pub async fn timeline(ctx: &Context, lead_id: &str) -> Result<(), LeadlineError> {
    let events = ctx.dispatcher.events().timeline(lead_id).await?;
    let anomalies = check_timeline(&events);
    if ctx.out.json {
        let anomalies: Vec<Value> = anomalies
            .iter()
            .map(|a| {
                serde_json::json!({
                    "seq": a.seq,
                    "event_type": a.event_type,
                    "reason": a.reason,
                })
            })
            .collect();
        return print_json(&serde_json::json!({
            "events": events,
            "anomalies": anomalies,
        }));
    }

    heading(ctx.out, &format!("timeline {lead_id}"));
    for event in &events {
        let who = event
            .provider_id
            .as_deref()
            .or(event.actor_id.as_deref())
            .unwrap_or("system");
        println!(
            "  {}  {:<11} {:<20} {}",
            event.created_at.format("%Y-%m-%d %H:%M:%S"),
            event.event_type.to_string(),
            who,
            event.metadata
        );
    }
    if events.is_empty() {
        println!("  no events");
    }
    for anomaly in &anomalies {
        let line = format!(
            "  ! seq {} ({}): {}",
            anomaly.seq, anomaly.event_type, anomaly.reason
        );
        if ctx.out.color {
            println!("{}", line.yellow());
        } else {
            println!("{line}");
        }
    }
    println!();
    Ok(())
}

pub async fn stats(ctx: &Context) -> Result<(), LeadlineError> {
    let stats = ctx.dispatcher.queue_stats().await?;
    if ctx.out.json {
        return print_json(&stats);
    }
    heading(ctx.out, "assignment queue");
    println!("  {:<10} {}", "pending", stats.pending);
    println!("  {:<10} {}", "viewed", stats.viewed);
    println!("  {:<10} {}", "quoted", stats.quoted);
    println!("  {:<10} {}", "declined", stats.declined);
    println!("  {:<10} {}", "total", stats.total);
    println!();
    Ok(())
}

pub async fn sweep(ctx: &Context, expire: bool, reassign: bool) -> Result<(), LeadlineError> {
    let now = Utc::now();
    let expired = if expire {
        ctx.dispatcher.expire_stale_leads(now).await?
    } else {
        Vec::new()
    };
    let reassigned = if reassign {
        ctx.dispatcher.auto_reassign_stale(now).await?
    } else {
        Vec::new()
    };
    if ctx.out.json {
        return print_json(&serde_json::json!({
            "expired": expired,
            "reassigned": reassigned,
        }));
    }
    println!(
        "{} lead(s) expired, {} assignment(s) reassigned",
        expired.len(),
        reassigned.len()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_json_reports_the_field() {
        match parse_json("hints", "{nope").unwrap_err() {
            LeadlineError::Validation { errors } => assert_eq!(errors[0].field, "hints"),
            other => panic!("unexpected error {other:?}"),
        }
        assert_eq!(parse_json("patch", r#"{"a": 1}"#).unwrap()["a"], 1);
    }
}
