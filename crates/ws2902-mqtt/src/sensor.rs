//! Sensor descriptors and the per-field publish path.
//!
//! Each recognized station field maps to one `SensorDescriptor`. Handling a
//! value publishes it on the sensor's state topic and, the first time only,
//! publishes a retained Home Assistant discovery config next to it.

use crate::publisher::{PublishError, Publisher};
use crate::units::Unit;
use chrono::NaiveDateTime;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;

/// Device segment shared by every topic and unique id.
pub const DEVICE_ID: &str = "ws2902";

/// Home Assistant component type for every entity we announce.
pub const COMPONENT: &str = "sensor";

const STATION_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const UTC_OFFSET: &str = "+00:00";

/// Errors raised while normalizing a raw field value.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransformError {
    #[error("Timestamp {value:?} has no date/time separator")]
    MissingSeparator { value: String },

    #[error("Timestamp {value:?} is not in YYYY-MM-DD HH:MM:SS form")]
    InvalidTimestamp { value: String },
}

/// Errors from handling a single field.
#[derive(Debug, Error)]
pub enum HandleError {
    #[error("Transform error: {0}")]
    Transform(#[from] TransformError),

    #[error("{0}")]
    Publish(#[from] PublishError),

    #[error("Config serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Value normalization applied before publishing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Transform {
    /// Publish the raw value unchanged.
    #[default]
    None,
    /// Station UTC timestamp `YYYY-MM-DD HH:MM:SS` to ISO-8601 with an
    /// explicit `+00:00` offset.
    UtcTimestamp,
}

impl Transform {
    pub fn apply(self, raw: &str) -> Result<String, TransformError> {
        match self {
            Transform::None => Ok(raw.to_string()),
            Transform::UtcTimestamp => {
                if !raw.contains(' ') {
                    return Err(TransformError::MissingSeparator {
                        value: raw.to_string(),
                    });
                }
                NaiveDateTime::parse_from_str(raw, STATION_TIMESTAMP_FORMAT).map_err(|_| {
                    TransformError::InvalidTimestamp {
                        value: raw.to_string(),
                    }
                })?;
                // Validated only; the station's digits go out unchanged.
                Ok(format!("{}{}", raw.replacen(' ', "T", 1), UTC_OFFSET))
            }
        }
    }
}

/// Derive the topic-safe identifier from a display name.
///
/// Lowercases, drops `(` and `)`, and turns spaces into underscores.
/// Applying it to its own output is a no-op.
pub fn derive_internal_id(friendly_name: &str) -> String {
    friendly_name
        .to_lowercase()
        .replace(['(', ')'], "")
        .replace(' ', "_")
}

/// At-most-once marker for a sensor's discovery config.
///
/// Only reachable through `try_claim`, so concurrent first requests race on a
/// single compare-and-swap instead of a read followed by a write.
#[derive(Debug, Default)]
pub struct ConfigLatch {
    published: AtomicBool,
}

impl ConfigLatch {
    pub const fn new() -> Self {
        Self {
            published: AtomicBool::new(false),
        }
    }

    /// Claim the right to publish. Returns `None` once another caller holds
    /// or has committed the claim.
    pub fn try_claim(&self) -> Option<ConfigClaim<'_>> {
        self.published
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| ConfigClaim {
                flag: &self.published,
                committed: false,
            })
    }

    pub fn is_published(&self) -> bool {
        self.published.load(Ordering::Acquire)
    }
}

/// Outstanding claim on a `ConfigLatch`.
///
/// Dropping it without `commit` (publish failed, request cancelled) releases
/// the latch so a later report retries.
#[must_use]
pub struct ConfigClaim<'a> {
    flag: &'a AtomicBool,
    committed: bool,
}

impl ConfigClaim<'_> {
    pub fn commit(mut self) {
        self.committed = true;
    }
}

impl Drop for ConfigClaim<'_> {
    fn drop(&mut self) {
        if !self.committed {
            self.flag.store(false, Ordering::Release);
        }
    }
}

/// Discovery payload published retained on `<prefix>/sensor/ws2902/<id>/config`.
#[derive(Debug, Serialize)]
pub struct DiscoveryConfig<'a> {
    pub name: &'a str,
    pub unique_id: String,
    pub state_topic: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_class: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit_of_measurement: Option<Unit>,
}

/// Static description of one station field plus its config latch.
#[derive(Debug)]
pub struct SensorDescriptor {
    friendly_name: &'static str,
    internal_id: String,
    unit: Option<Unit>,
    device_class: Option<&'static str>,
    transform: Transform,
    config: ConfigLatch,
}

impl SensorDescriptor {
    pub fn new(friendly_name: &'static str) -> Self {
        Self {
            friendly_name,
            internal_id: derive_internal_id(friendly_name),
            unit: None,
            device_class: None,
            transform: Transform::None,
            config: ConfigLatch::new(),
        }
    }

    pub fn with_unit(mut self, unit: Unit) -> Self {
        self.unit = Some(unit);
        self
    }

    pub fn with_device_class(mut self, device_class: &'static str) -> Self {
        self.device_class = Some(device_class);
        self
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    pub fn friendly_name(&self) -> &'static str {
        self.friendly_name
    }

    pub fn internal_id(&self) -> &str {
        &self.internal_id
    }

    pub fn unit(&self) -> Option<Unit> {
        self.unit
    }

    pub fn device_class(&self) -> Option<&'static str> {
        self.device_class
    }

    pub fn transform(&self) -> Transform {
        self.transform
    }

    pub fn config_published(&self) -> bool {
        self.config.is_published()
    }

    pub fn unique_id(&self) -> String {
        format!("{}_{}", DEVICE_ID, self.internal_id)
    }

    /// `<prefix>/sensor/ws2902/<internal_id>/<leaf>`
    pub fn topic(&self, prefix: &str, leaf: &str) -> String {
        format!(
            "{}/{}/{}/{}/{}",
            prefix, COMPONENT, DEVICE_ID, self.internal_id, leaf
        )
    }

    pub fn state_topic(&self, prefix: &str) -> String {
        self.topic(prefix, "state")
    }

    pub fn config_topic(&self, prefix: &str) -> String {
        self.topic(prefix, "config")
    }

    pub fn discovery_config(&self, prefix: &str) -> DiscoveryConfig<'_> {
        DiscoveryConfig {
            name: self.friendly_name,
            unique_id: self.unique_id(),
            state_topic: self.state_topic(prefix),
            device_class: self.device_class,
            unit_of_measurement: self.unit,
        }
    }

    /// Normalize `raw`, publish it as state, then announce the sensor if it
    /// has not been announced yet.
    pub async fn handle<P: Publisher>(
        &self,
        publisher: &P,
        prefix: &str,
        raw: &str,
    ) -> Result<(), HandleError> {
        log::debug!(
            "{}: {} {}",
            self.internal_id,
            raw,
            self.unit.map(Unit::symbol).unwrap_or_default()
        );

        let value = self.transform.apply(raw)?;
        publisher
            .publish(&self.state_topic(prefix), value, false)
            .await?;

        if let Some(claim) = self.config.try_claim() {
            let payload = serde_json::to_string(&self.discovery_config(prefix))?;
            let topic = self.config_topic(prefix);
            publisher.publish(&topic, payload, true).await?;
            claim.commit();
            log::info!("Published discovery config for {} on {}", self.internal_id, topic);
        }

        Ok(())
    }
}
