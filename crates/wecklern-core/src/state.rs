//! Diskrete Zustandsschlüssel für die Werte-Tabelle.
//!
//! Ein [`StateKey`] fasst eine beobachtete Situation (Schlummerdauer,
//! gespielte Melodie) zu einem Tabellenindex zusammen. Das Format ist
//! versioniert (`v1:<sekunden>_<fingerprint>`), der Fingerprint ist ein
//! FNV-1a-64-Hash über den Melodietext. Damit sind Schlüssel über Prozesse
//! und Testläufe hinweg reproduzierbar.

use crate::Outcome;
use fnv::FnvHasher;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::Hasher;

const KEY_VERSION: &str = "v1:";
const FINGERPRINT_HEX_LEN: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StateKey(String);

impl StateKey {
    /// Kodiert Schlummerdauer und Melodietext. Reine Funktion, jede Eingabe
    /// (auch eine leere Melodie) ergibt einen gültigen Schlüssel.
    pub fn encode(snooze_seconds: u32, melody: &str) -> Self {
        Self::from_parts(snooze_seconds, fingerprint(melody.as_bytes()))
    }

    /// Schlüssel für ein Outcome; die Melodie wird in ihrer Textform gehasht.
    pub fn from_outcome(outcome: &Outcome) -> Self {
        Self::encode(outcome.snooze_seconds, &outcome.melody_used.to_string())
    }

    pub fn from_parts(snooze_seconds: u32, melody_fingerprint: u64) -> Self {
        Self(format!(
            "{KEY_VERSION}{snooze_seconds}_{melody_fingerprint:0width$x}",
            width = FINGERPRINT_HEX_LEN
        ))
    }

    /// Übernimmt einen Schlüssel unverändert, z. B. aus einem Snapshot.
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Zerlegt den Schlüssel in (Schlummerdauer, Fingerprint).
    /// `None` für fremde oder beschädigte Schlüssel.
    pub fn parts(&self) -> Option<(u32, u64)> {
        let body = self.0.strip_prefix(KEY_VERSION)?;
        let (snooze, fp) = body.split_once('_')?;
        if fp.len() != FINGERPRINT_HEX_LEN || !fp.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        if snooze.is_empty() || !snooze.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        Some((snooze.parse().ok()?, u64::from_str_radix(fp, 16).ok()?))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// FNV-1a (64 bit) über rohe Bytes.
pub fn fingerprint(bytes: &[u8]) -> u64 {
    let mut hasher = FnvHasher::default();
    hasher.write(bytes);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MelodyDescriptor;

    #[test]
    fn encode_is_deterministic() {
        let a = StateKey::encode(30, "60,-2,62,-2");
        let b = StateKey::encode(30, "60,-2,62,-2");
        assert_eq!(a, b);
        assert_ne!(a, StateKey::encode(31, "60,-2,62,-2"));
        assert_ne!(a, StateKey::encode(30, "60,-2,64,-2"));
    }

    #[test]
    fn fingerprint_is_stable_fnv1a() {
        // Referenzwerte von FNV-1a 64.
        assert_eq!(fingerprint(b""), 0xcbf2_9ce4_8422_2325);
        assert_eq!(fingerprint(b"a"), 0xaf63_dc4c_8601_ec8c);
    }

    #[test]
    fn empty_melody_yields_valid_key() {
        let key = StateKey::encode(0, "");
        assert_eq!(key.as_str(), "v1:0_cbf29ce484222325");
        assert_eq!(key.parts(), Some((0, 0xcbf2_9ce4_8422_2325)));
    }

    #[test]
    fn parts_roundtrip() {
        let key = StateKey::from_parts(42, 0xdead_beef);
        assert_eq!(key.parts(), Some((42, 0xdead_beef)));
    }

    #[test]
    fn foreign_keys_do_not_parse() {
        for raw in [
            "",
            "30_1234",
            "v1:30",
            "v1:x_00000000deadbeef",
            "v1:30_zz00000000000000",
            "v1:-3_00000000deadbeef",
            "v2:30_00000000deadbeef",
        ] {
            assert_eq!(StateKey::from_raw(raw).parts(), None, "{raw}");
        }
    }

    #[test]
    fn outcome_key_uses_melody_text() {
        let melody = MelodyDescriptor::new(vec![60, -2, 62, -2]);
        let outcome = Outcome::new(30, melody);
        assert_eq!(
            StateKey::from_outcome(&outcome),
            StateKey::encode(30, "60, -2, 62, -2")
        );
    }
}
