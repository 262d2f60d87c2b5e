// SPDX-FileCopyrightText: 2026 Leadline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Read and update the persisted matching configuration.
//!
//! Reads never fail: a missing, unreadable or invalid row yields the
//! compiled defaults. Updates are validated as a whole before anything is
//! written.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use leadline_config::MatchingConfig;
use leadline_core::types::{ConfigAuditEntry, ConfigUpdate};
use leadline_core::{ConfigRepository, LeadlineError};
use serde::Serialize;
use serde_json::Value;
use strum::Display;
use tracing::{debug, info, warn};

const MAX_UPDATE_ATTEMPTS: u32 = 5;

/// Where the effective configuration came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ConfigSource {
    Stored,
    Defaults,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoadedConfig {
    pub config: MatchingConfig,
    pub source: ConfigSource,
}

impl LoadedConfig {
    fn defaults() -> Self {
        Self {
            config: MatchingConfig::default(),
            source: ConfigSource::Defaults,
        }
    }
}

#[derive(Clone)]
pub struct ConfigStore {
    repo: Arc<dyn ConfigRepository>,
}

impl ConfigStore {
    pub fn new(repo: Arc<dyn ConfigRepository>) -> Self {
        Self { repo }
    }

    /// The effective matching configuration.
    pub async fn get_config(&self) -> LoadedConfig {
        let row = match self.repo.load_config().await {
            Ok(Some(row)) => row,
            Ok(None) => {
                debug!("no stored matching configuration, using defaults");
                return LoadedConfig::defaults();
            }
            Err(e) => {
                warn!(error = %e, "failed to read matching configuration, using defaults");
                return LoadedConfig::defaults();
            }
        };

        match MatchingConfig::from_stored(&row.payload) {
            Ok(config) => LoadedConfig {
                config,
                source: ConfigSource::Stored,
            },
            Err(reason) => {
                warn!(%reason, "stored matching configuration is invalid, using defaults");
                LoadedConfig::defaults()
            }
        }
    }

    /// Validate `patch` against the stored configuration and persist the
    /// merged result with an audit entry.
    ///
    /// Every invalid field is reported in one `Validation` error. The write
    /// only lands if the row is still the one the patch was merged onto;
    /// otherwise the merge is redone on the fresh row. A row that keeps
    /// changing yields `Conflict`.
    pub async fn update_config(
        &self,
        patch: &Value,
        actor_id: &str,
        at: DateTime<Utc>,
    ) -> Result<MatchingConfig, LeadlineError> {
        for attempt in 1..=MAX_UPDATE_ATTEMPTS {
            let expected_payload = self.repo.load_config().await?.map(|row| row.payload);
            // A corrupt row is replaced, as reads already ignore it.
            let current = expected_payload
                .as_deref()
                .and_then(|payload| MatchingConfig::from_stored(payload).ok())
                .unwrap_or_default();
            let outcome = current
                .apply_patch(patch)
                .map_err(|errors| LeadlineError::Validation { errors })?;

            let payload = serde_json::to_string(&outcome.config).map_err(|e| {
                LeadlineError::Internal(format!("failed to encode configuration: {e}"))
            })?;
            let saved = self
                .repo
                .save_config(ConfigUpdate {
                    payload,
                    patch: patch.to_string(),
                    changed_fields: outcome.changed_fields.clone(),
                    actor_id: actor_id.to_string(),
                    at,
                    expected_payload,
                })
                .await?;

            if saved {
                info!(
                    actor_id,
                    changed = ?outcome.changed_fields,
                    "matching configuration updated"
                );
                return Ok(outcome.config);
            }
            debug!(actor_id, attempt, "matching configuration changed underneath, merging again");
        }
        Err(LeadlineError::Conflict(format!(
            "matching configuration changed {MAX_UPDATE_ATTEMPTS} times during the update"
        )))
    }

    /// Most recent configuration changes first.
    pub async fn history(&self, limit: u32) -> Result<Vec<ConfigAuditEntry>, LeadlineError> {
        self.repo.config_history(limit).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use leadline_core::types::StoredConfig;
    use serde_json::json;
    use std::sync::Mutex;
    use tracing_test::traced_test;

    #[derive(Default)]
    struct MemoryConfig {
        row: Mutex<Option<StoredConfig>>,
        audit: Mutex<Vec<ConfigUpdate>>,
        broken: bool,
        /// Payload another admin writes just before the next save.
        racing_write: Mutex<Option<String>>,
        always_stale: bool,
    }

    #[async_trait]
    impl ConfigRepository for MemoryConfig {
        async fn load_config(&self) -> Result<Option<StoredConfig>, LeadlineError> {
            if self.broken {
                return Err(LeadlineError::Storage {
                    source: "database is locked".into(),
                });
            }
            Ok(self.row.lock().unwrap().clone())
        }

        async fn save_config(&self, update: ConfigUpdate) -> Result<bool, LeadlineError> {
            let mut row = self.row.lock().unwrap();
            if let Some(payload) = self.racing_write.lock().unwrap().take() {
                *row = Some(StoredConfig {
                    payload,
                    updated_by: Some("admin-other".into()),
                    updated_at: update.at,
                });
            }
            if self.always_stale || row.as_ref().map(|r| r.payload.clone()) != update.expected_payload {
                return Ok(false);
            }
            *row = Some(StoredConfig {
                payload: update.payload.clone(),
                updated_by: Some(update.actor_id.clone()),
                updated_at: update.at,
            });
            self.audit.lock().unwrap().push(update);
            Ok(true)
        }

        async fn config_history(
            &self,
            _limit: u32,
        ) -> Result<Vec<ConfigAuditEntry>, LeadlineError> {
            Ok(Vec::new())
        }
    }

    fn stored(payload: &str) -> MemoryConfig {
        MemoryConfig {
            row: Mutex::new(Some(StoredConfig {
                payload: payload.into(),
                updated_by: None,
                updated_at: Utc::now(),
            })),
            ..MemoryConfig::default()
        }
    }

    #[tokio::test]
    async fn missing_row_yields_defaults() {
        let store = ConfigStore::new(Arc::new(MemoryConfig::default()));
        let loaded = store.get_config().await;
        assert_eq!(loaded.source, ConfigSource::Defaults);
        assert_eq!(loaded.config, MatchingConfig::default());
    }

    #[tokio::test]
    #[traced_test]
    async fn corrupt_or_out_of_range_rows_yield_defaults() {
        for payload in ["{not json", r#"{"geo_radius_km": 0}"#, r#"{"bogus": 1}"#] {
            let store = ConfigStore::new(Arc::new(stored(payload)));
            let loaded = store.get_config().await;
            assert_eq!(loaded.source, ConfigSource::Defaults, "payload {payload}");
        }
        assert!(logs_contain("stored matching configuration is invalid"));

        let broken = MemoryConfig {
            broken: true,
            ..MemoryConfig::default()
        };
        let loaded = ConfigStore::new(Arc::new(broken)).get_config().await;
        assert_eq!(loaded.source, ConfigSource::Defaults);
    }

    #[tokio::test]
    async fn valid_row_is_used() {
        let store = ConfigStore::new(Arc::new(stored(
            r#"{"matching_strategy": "round_robin", "max_artisans_per_lead": 5}"#,
        )));
        let loaded = store.get_config().await;
        assert_eq!(loaded.source, ConfigSource::Stored);
        assert_eq!(loaded.config.max_artisans_per_lead, 5);
        assert_eq!(loaded.config.geo_radius_km, 50);
    }

    #[tokio::test]
    async fn update_merges_and_audits() {
        let repo = Arc::new(MemoryConfig::default());
        let store = ConfigStore::new(repo.clone());
        let updated = store
            .update_config(
                &json!({"max_artisans_per_lead": 4, "cooldown_minutes": 0}),
                "admin-1",
                Utc::now(),
            )
            .await
            .unwrap();
        assert_eq!(updated.max_artisans_per_lead, 4);
        assert_eq!(updated.cooldown_minutes, 0);
        assert_eq!(updated.weight_rating, 30);

        let second = store
            .update_config(&json!({"geo_radius_km": 80}), "admin-2", Utc::now())
            .await
            .unwrap();
        assert_eq!(second.max_artisans_per_lead, 4, "earlier update is kept");

        let audit = repo.audit.lock().unwrap();
        assert_eq!(audit.len(), 2);
        assert_eq!(
            audit[0].changed_fields,
            vec!["cooldown_minutes", "max_artisans_per_lead"]
        );
        assert_eq!(audit[1].actor_id, "admin-2");
    }

    #[tokio::test]
    async fn invalid_update_writes_nothing() {
        let repo = Arc::new(MemoryConfig::default());
        let store = ConfigStore::new(repo.clone());
        let err = store
            .update_config(
                &json!({"max_artisans_per_lead": 0, "weight_ratng": 10, "geo_radius_km": 20}),
                "admin-1",
                Utc::now(),
            )
            .await
            .unwrap_err();
        match err {
            LeadlineError::Validation { errors } => {
                let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
                assert!(fields.contains(&"max_artisans_per_lead"));
                assert!(fields.contains(&"weight_ratng"));
                assert_eq!(errors.len(), 2);
            }
            other => panic!("expected validation error, got {other:?}"),
        }
        assert!(repo.row.lock().unwrap().is_none());
        assert!(repo.audit.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn update_remerges_after_concurrent_write() {
        let repo = Arc::new(MemoryConfig {
            racing_write: Mutex::new(Some(r#"{"max_artisans_per_lead": 7}"#.into())),
            ..MemoryConfig::default()
        });
        let store = ConfigStore::new(repo.clone());
        let updated = store
            .update_config(&json!({"geo_radius_km": 120}), "admin-1", Utc::now())
            .await
            .unwrap();
        assert_eq!(updated.max_artisans_per_lead, 7);
        assert_eq!(updated.geo_radius_km, 120);

        let loaded = store.get_config().await;
        assert_eq!(loaded.config.max_artisans_per_lead, 7);
        assert_eq!(loaded.config.geo_radius_km, 120);
        assert_eq!(repo.audit.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn update_gives_up_on_a_row_that_keeps_changing() {
        let repo = Arc::new(MemoryConfig {
            always_stale: true,
            ..MemoryConfig::default()
        });
        let err = ConfigStore::new(repo.clone())
            .update_config(&json!({"geo_radius_km": 120}), "admin-1", Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, LeadlineError::Conflict(_)), "got {err:?}");
        assert!(repo.audit.lock().unwrap().is_empty());
    }
}
