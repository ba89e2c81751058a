//! Austauschformat für Weck-Ereignisse.
//!
//! Ein [`DismissalEvent`] beschreibt, dass ein Wecker ausgeschaltet wurde:
//! wie lange es gedauert hat und welche Melodie lief. Solche Ereignisse
//! kommen als JSON-Zeilen aus dem Wecker-Frontend oder aus Aufzeichnungen
//! und werden für das Nachtrainieren wieder eingespielt.

use crate::error::Result;
use crate::{MelodyDescriptor, Outcome};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DismissalEvent {
    /// Eine eindeutige Kennung für dieses Ereignis, z. B. eine UUID.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// ISO-8601-Zeitstempel des Ausschaltens.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ts: Option<String>,
    /// Sekunden zwischen Auslösen und Ausschalten.
    pub snooze_seconds: u32,
    /// Die gespielte Melodie in Textform (`"60, -2, 62, -2"`). Fehlt sie,
    /// gilt die zuletzt angebotene Melodie.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub melody_used: Option<String>,
    /// Zusätzliche Metadaten, nur für Logging oder Debugging.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<BTreeMap<String, Value>>,
}

impl DismissalEvent {
    /// Geparste Melodie, sofern das Ereignis eine mitbringt.
    pub fn melody(&self) -> Result<Option<MelodyDescriptor>> {
        self.melody_used.as_deref().map(str::parse).transpose()
    }

    /// Wandelt das Ereignis in ein [`Outcome`]; `fallback` ersetzt eine fehlende Melodie.
    pub fn to_outcome(&self, fallback: impl FnOnce() -> MelodyDescriptor) -> Result<Outcome> {
        let melody = self.melody()?.unwrap_or_else(fallback);
        Ok(Outcome::new(self.snooze_seconds, melody))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CoreError;
    use serde_json::json;

    #[test]
    fn dismissal_event_from_json_fixture() {
        let event: DismissalEvent = serde_json::from_value(json!({
            "id": "evt-1",
            "ts": "2026-10-19T06:30:12Z",
            "snooze_seconds": 30,
            "melody_used": "60, -2, 62, -2",
            "meta": {"device": "nightstand"}
        }))
        .expect("Deserialization failed");

        assert_eq!(event.snooze_seconds, 30);
        let outcome = event
            .to_outcome(MelodyDescriptor::default_primer)
            .expect("valid melody");
        assert_eq!(outcome.melody_used.tokens(), &[60, -2, 62, -2]);
    }

    #[test]
    fn missing_melody_uses_fallback() {
        let event: DismissalEvent =
            serde_json::from_value(json!({"snooze_seconds": 7})).expect("Deserialization failed");
        let outcome = event
            .to_outcome(MelodyDescriptor::default_primer)
            .expect("fallback");
        assert_eq!(outcome, Outcome::new(7, MelodyDescriptor::default_primer()));

        // Optionale Felder tauchen beim Serialisieren nicht auf.
        let serialized = serde_json::to_string(&event).expect("Serialization failed");
        assert_eq!(serialized, r#"{"snooze_seconds":7}"#);
    }

    #[test]
    fn broken_melody_is_reported() {
        let event = DismissalEvent {
            id: None,
            ts: None,
            snooze_seconds: 1,
            melody_used: Some("60, do, re".into()),
            meta: None,
        };
        assert!(matches!(
            event.to_outcome(MelodyDescriptor::default_primer),
            Err(CoreError::InvalidToken(_))
        ));
    }
}
