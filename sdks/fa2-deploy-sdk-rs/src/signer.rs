//! Signer boundary and seed phrase handling.

use std::fmt;

use async_trait::async_trait;
use zeroize::Zeroizing;

use crate::{
    address::Address,
    error::{DeployError, Result},
};

const WORD_COUNTS: [usize; 5] = [12, 15, 18, 21, 24];

/// Produces the account address operations are signed for.
#[async_trait]
pub trait Signer: Send + Sync {
    async fn public_key_hash(&self) -> Result<Address>;
}

/// BIP-39 style mnemonic. Wiped on drop; `Debug` never prints the words.
#[derive(Clone)]
pub struct SeedPhrase(Zeroizing<String>);

impl SeedPhrase {
    /// Normalise whitespace and check the word count and alphabet.
    pub fn new(phrase: impl Into<String>) -> Result<Self> {
        let raw = Zeroizing::new(phrase.into());
        let words: Vec<&str> = raw.split_whitespace().collect();

        if !WORD_COUNTS.contains(&words.len()) {
            return Err(DeployError::Config(format!(
                "seed phrase must have 12, 15, 18, 21 or 24 words, got {}",
                words.len()
            )));
        }
        if words
            .iter()
            .any(|w| !w.chars().all(|c| c.is_ascii_lowercase()))
        {
            return Err(DeployError::Config(
                "seed phrase words must be lowercase ascii letters".into(),
            ));
        }

        Ok(Self(Zeroizing::new(words.join(" "))))
    }

    pub fn word_count(&self) -> usize {
        self.0.split(' ').count()
    }

    /// Exposes the words to a signing backend.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SeedPhrase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SeedPhrase(<{} words redacted>)", self.word_count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PHRASE: &str = "abandon ability able about above absent absorb abstract absurd abuse access accident";

    #[test]
    fn accepts_and_normalises() {
        let seed = SeedPhrase::new(format!("  {}\n", PHRASE.replace(' ', "   "))).unwrap();
        assert_eq!(seed.expose(), PHRASE);
        assert_eq!(seed.word_count(), 12);
    }

    #[test]
    fn debug_is_redacted() {
        let seed = SeedPhrase::new(PHRASE).unwrap();
        let shown = format!("{seed:?}");
        assert!(!shown.contains("abandon"));
        assert!(shown.contains("12 words"));
    }

    #[test]
    fn rejects_placeholder_and_bad_words() {
        assert!(SeedPhrase::new("MNEMONIC GOES HERE").is_err());
        assert!(SeedPhrase::new("").is_err());
        let shouty = PHRASE.replace("abandon", "ABANDON");
        assert!(SeedPhrase::new(shouty).unwrap_err().is_configuration());
    }
}
