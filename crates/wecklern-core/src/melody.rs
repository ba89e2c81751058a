//! Melody descriptors and the palette that turns actions into melodies.
//!
//! A melody is an ordered list of integer tokens. Non-negative tokens are
//! MIDI pitch numbers, [`REST`] marks a pause. The text form is the
//! comma-separated list the generation service expects as its primer, e.g.
//! `60, -2, 62, -2`.

use crate::error::{CoreError, Result};
use crate::Action;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub type Token = i32;

/// Sentinel token for a pause between notes.
pub const REST: Token = -2;

/// C major scale, C4 to C5.
pub const DEFAULT_PALETTE: [Token; 8] = [60, 62, 64, 65, 67, 69, 71, 72];

/// Number of (pitch, rest) pairs emitted per melody.
const NOTES_PER_MELODY: usize = 4;

const DEFAULT_PRIMER: [Token; 8] = [60, REST, 62, REST, 64, REST, 65, REST];

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MelodyDescriptor(Vec<Token>);

impl MelodyDescriptor {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self(tokens)
    }

    /// Melody offered before the learner has published anything.
    pub fn default_primer() -> Self {
        Self(DEFAULT_PRIMER.to_vec())
    }

    pub fn tokens(&self) -> &[Token] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Pitch tokens in order, rests skipped.
    pub fn pitches(&self) -> impl Iterator<Item = Token> + '_ {
        self.0.iter().copied().filter(|t| *t != REST)
    }
}

impl From<Vec<Token>> for MelodyDescriptor {
    fn from(tokens: Vec<Token>) -> Self {
        Self(tokens)
    }
}

impl fmt::Display for MelodyDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, token) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{token}")?;
        }
        Ok(())
    }
}

impl FromStr for MelodyDescriptor {
    type Err = CoreError;

    /// Accepts `60, -2, 62`, `60,-2,62` and the bracketed `[60, -2, 62]`.
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let s = s
            .strip_prefix('[')
            .and_then(|rest| rest.strip_suffix(']'))
            .unwrap_or(s);

        s.split(',')
            .map(str::trim)
            .filter(|piece| !piece.is_empty())
            .map(|piece| {
                piece
                    .parse::<Token>()
                    .map_err(|_| CoreError::InvalidToken(piece.to_string()))
            })
            .collect::<Result<Vec<_>>>()
            .map(Self)
    }
}

/// Fixed set of base pitches, one per action (modulo its length).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Token>", into = "Vec<Token>")]
pub struct Palette {
    pitches: Vec<Token>,
}

impl Palette {
    pub fn new(pitches: Vec<Token>) -> Result<Self> {
        if pitches.is_empty() {
            return Err(CoreError::EmptyPalette);
        }
        Ok(Self { pitches })
    }

    pub fn len(&self) -> usize {
        self.pitches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pitches.is_empty()
    }

    pub fn pitches(&self) -> &[Token] {
        &self.pitches
    }

    pub fn pitch_for(&self, action: Action) -> Token {
        self.pitches[action % self.pitches.len()]
    }

    /// Melody for `action`: its palette pitch four times, each followed by a rest.
    pub fn melody_for(&self, action: Action) -> MelodyDescriptor {
        let pitch = self.pitch_for(action);
        let mut tokens = Vec::with_capacity(NOTES_PER_MELODY * 2);
        for _ in 0..NOTES_PER_MELODY {
            tokens.push(pitch);
            tokens.push(REST);
        }
        MelodyDescriptor(tokens)
    }
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            pitches: DEFAULT_PALETTE.to_vec(),
        }
    }
}

impl TryFrom<Vec<Token>> for Palette {
    type Error = CoreError;

    fn try_from(pitches: Vec<Token>) -> Result<Self> {
        Self::new(pitches)
    }
}

impl From<Palette> for Vec<Token> {
    fn from(palette: Palette) -> Self {
        palette.pitches
    }
}
