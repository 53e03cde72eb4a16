//! Human-readable share-id generation.
//!
//! Share-ids are short sentences such as `42-brave-otters-sing-loudly`:
//! a number followed by an adjective, a noun, a verb and an adverb drawn
//! from a fixed vocabulary. Every part is normalized so the joined id is
//! safe to drop into a URL path without percent-encoding.
//!
//! Output is deterministic for a given seed string. The seed is hashed with
//! SHA-256 into the state of a seeded RNG, so any non-empty string works as
//! a seed and two different seeds walk unrelated sequences.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sha2::{Digest, Sha256};
use std::sync::{Mutex, PoisonError};
use thiserror::Error;

/// Separator placed between the parts of a share-id.
pub const SEPARATOR: char = '-';

/// Largest number used as the leading part of a share-id.
const MAX_NUMBER: u32 = 99;

const ADJECTIVES: &[&str] = &[
    "able", "brave", "bright", "calm", "clever", "cosy", "crisp", "curious", "daring", "eager",
    "early", "fair", "fancy", "fast", "fluffy", "fresh", "gentle", "giant", "glad", "golden",
    "good", "grand", "happy", "honest", "humble", "jolly", "keen", "kind", "lazy", "little",
    "lively", "lucky", "merry", "mighty", "modern", "neat", "nice", "noble", "odd", "polite",
    "proud", "quick", "quiet", "rapid", "rare", "ready", "round", "royal", "shiny", "silent",
    "silly", "sleepy", "smart", "snappy", "soft", "solid", "sour", "spicy", "strong", "sunny",
    "swift", "tall", "tidy", "witty",
];

const NOUNS: &[&str] = &[
    "ants", "apes", "badgers", "bats", "bears", "bees", "birds", "bugs", "bulls", "camels",
    "cats", "chicks", "clams", "cobras", "cows", "crabs", "crows", "deer", "dingos", "dodos",
    "dogs", "doves", "ducks", "eagles", "eels", "elks", "emus", "ferrets", "fish", "foxes",
    "frogs", "geckos", "geese", "goats", "hawks", "hens", "horses", "ibises", "jays", "koalas",
    "lamas", "lions", "lizards", "mice", "moles", "moose", "mules", "newts", "otters", "owls",
    "pandas", "parrots", "pigs", "ponies", "pumas", "rabbits", "rats", "seals", "sheep",
    "snakes", "squids", "tigers", "toads", "wolves",
];

const VERBS: &[&str] = &[
    "act", "argue", "bake", "beg", "bow", "clap", "cry", "dance", "dream", "drink", "eat",
    "fly", "grin", "hide", "hop", "hug", "joke", "jump", "kneel", "laugh", "lie", "nap", "nod",
    "play", "pray", "rest", "run", "sing", "sit", "sleep", "swim", "wink",
];

const ADVERBS: &[&str] = &[
    "angrily", "badly", "boldly", "bravely", "busily", "calmly", "daily", "eagerly", "easily",
    "freely", "gently", "gladly", "happily", "kindly", "lazily", "loudly", "madly", "neatly",
    "nicely", "oddly", "openly", "politely", "quickly", "quietly", "rapidly", "safely",
    "sadly", "slowly", "softly", "swiftly", "warmly", "wisely",
];

/// Errors raised while building or reseeding a generator.
///
/// These are configuration faults: a process that hits one at startup
/// should refuse to serve rather than hand out broken ids.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GeneratorError {
    #[error("Vocabulary has no usable {0}")]
    EmptyVocabulary(&'static str),

    #[error("Generator seed must not be empty")]
    InvalidSeed,
}

/// Word lists a generator draws from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vocabulary {
    adjectives: Vec<String>,
    nouns: Vec<String>,
    verbs: Vec<String>,
    adverbs: Vec<String>,
}

impl Vocabulary {
    /// Builds a vocabulary from custom word lists.
    ///
    /// Each word is normalized; words that normalize to nothing are
    /// dropped. Fails if any list ends up empty.
    pub fn new<S: AsRef<str>>(
        adjectives: &[S],
        nouns: &[S],
        verbs: &[S],
        adverbs: &[S],
    ) -> Result<Self, GeneratorError> {
        Ok(Self {
            adjectives: normalize_words(adjectives, "adjectives")?,
            nouns: normalize_words(nouns, "nouns")?,
            verbs: normalize_words(verbs, "verbs")?,
            adverbs: normalize_words(adverbs, "adverbs")?,
        })
    }

    /// The built-in English vocabulary.
    pub fn builtin() -> Self {
        let owned = |words: &[&str]| words.iter().map(|w| w.to_string()).collect();
        Self {
            adjectives: owned(ADJECTIVES),
            nouns: owned(NOUNS),
            verbs: owned(VERBS),
            adverbs: owned(ADVERBS),
        }
    }

    /// Number of distinct share-ids this vocabulary can express.
    pub fn combinations(&self) -> u64 {
        [
            self.adjectives.len(),
            self.nouns.len(),
            self.verbs.len(),
            self.adverbs.len(),
        ]
        .iter()
        .fold(MAX_NUMBER as u64, |acc, n| acc.saturating_mul(*n as u64))
    }
}

impl Default for Vocabulary {
    fn default() -> Self {
        Self::builtin()
    }
}

fn normalize_words<S: AsRef<str>>(
    words: &[S],
    part: &'static str,
) -> Result<Vec<String>, GeneratorError> {
    let normalized: Vec<String> = words
        .iter()
        .map(|w| normalize_share_id(w.as_ref()))
        .filter(|w| !w.is_empty())
        .collect();

    if normalized.is_empty() {
        return Err(GeneratorError::EmptyVocabulary(part));
    }
    Ok(normalized)
}

/// Anything that can hand out fresh share-ids.
///
/// The document service only depends on this, so tests can swap in a
/// scripted generator to force collisions.
pub trait ShareIdGenerator: Send + Sync {
    fn generate(&self) -> String;
}

struct SeededState {
    seed: String,
    rng: StdRng,
}

impl SeededState {
    fn new(seed: String) -> Result<Self, GeneratorError> {
        if seed.is_empty() {
            return Err(GeneratorError::InvalidSeed);
        }
        Ok(Self::from_digest(seed))
    }

    /// Keys the RNG with the SHA-256 of any seed string.
    fn from_digest(seed: String) -> Self {
        let digest = Sha256::digest(seed.as_bytes());
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&digest);
        Self {
            seed,
            rng: StdRng::from_seed(bytes),
        }
    }
}

/// Seeded share-id generator.
///
/// One instance is meant to be shared process-wide behind an `Arc`. The
/// RNG sits behind a mutex so each call advances the sequence exactly once,
/// no matter how many requests call in concurrently.
pub struct HridGenerator {
    vocabulary: Vocabulary,
    state: Mutex<SeededState>,
}

impl HridGenerator {
    /// Creates a generator over the built-in vocabulary.
    pub fn new(seed: impl Into<String>) -> Result<Self, GeneratorError> {
        Self::with_vocabulary(seed, Vocabulary::builtin())
    }

    /// Creates a generator with a random seed.
    pub fn from_entropy() -> Self {
        let state = SeededState::from_digest(random_seed());
        Self {
            vocabulary: Vocabulary::builtin(),
            state: Mutex::new(state),
        }
    }

    pub fn with_vocabulary(
        seed: impl Into<String>,
        vocabulary: Vocabulary,
    ) -> Result<Self, GeneratorError> {
        let state = SeededState::new(seed.into())?;
        tracing::info!(
            "Share-id generator initialized with seed: {}... ({} combinations)",
            seed_preview(&state.seed),
            vocabulary.combinations()
        );
        Ok(Self {
            vocabulary,
            state: Mutex::new(state),
        })
    }

    /// Generates the next share-id in the sequence.
    pub fn generate(&self) -> String {
        let mut state = self.lock();
        let id = self.compose(&mut state.rng);
        tracing::debug!("Generated share-id: {}", id);
        id
    }

    /// Generates `count` share-ids, same as `count` calls to [`generate`].
    ///
    /// The lock is held for the whole batch so the ids are consecutive in
    /// the sequence.
    ///
    /// [`generate`]: HridGenerator::generate
    pub fn generate_batch(&self, count: usize) -> Vec<String> {
        let mut state = self.lock();
        let ids: Vec<String> = (0..count).map(|_| self.compose(&mut state.rng)).collect();
        tracing::debug!("Generated {} share-ids", ids.len());
        ids
    }

    /// The seed currently driving the sequence.
    pub fn seed(&self) -> String {
        self.lock().seed.clone()
    }

    /// Restarts the sequence from a new seed.
    ///
    /// Ids already handed out are unaffected; only later calls change.
    pub fn reseed(&self, seed: impl Into<String>) -> Result<(), GeneratorError> {
        let fresh = SeededState::new(seed.into())?;
        tracing::info!("Share-id seed reset to: {}...", seed_preview(&fresh.seed));
        *self.lock() = fresh;
        Ok(())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SeededState> {
        // A panic mid-call cannot leave the RNG half-stepped.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn compose(&self, rng: &mut StdRng) -> String {
        let vocab = &self.vocabulary;
        let number = rng.random_range(1..=MAX_NUMBER);
        let parts = [
            number.to_string(),
            pick(rng, &vocab.adjectives).to_string(),
            pick(rng, &vocab.nouns).to_string(),
            pick(rng, &vocab.verbs).to_string(),
            pick(rng, &vocab.adverbs).to_string(),
        ];
        normalize_share_id(&parts.join(" "))
    }
}

impl ShareIdGenerator for HridGenerator {
    fn generate(&self) -> String {
        HridGenerator::generate(self)
    }
}

impl std::fmt::Debug for HridGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HridGenerator")
            .field("seed", &format!("{}...", seed_preview(&self.seed())))
            .field("combinations", &self.vocabulary.combinations())
            .finish()
    }
}

fn pick<'a>(rng: &mut StdRng, words: &'a [String]) -> &'a str {
    &words[rng.random_range(0..words.len())]
}

fn seed_preview(seed: &str) -> String {
    seed.chars().take(10).collect()
}

/// Returns a fresh 64-character hex seed from the thread CSPRNG.
pub fn random_seed() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill(&mut bytes);
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Rewrites raw text into share-id form.
///
/// Lowercases, turns whitespace runs into a single separator, drops
/// anything outside `[a-z0-9-]`, and trims separators from both ends.
pub fn normalize_share_id(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars().flat_map(char::to_lowercase) {
        let c = if c.is_whitespace() { SEPARATOR } else { c };
        if c == SEPARATOR {
            if !out.is_empty() && !out.ends_with(SEPARATOR) {
                out.push(SEPARATOR);
            }
        } else if c.is_ascii_lowercase() || c.is_ascii_digit() {
            out.push(c);
        }
    }
    while out.ends_with(SEPARATOR) {
        out.pop();
    }
    out
}

/// True if `id` could have come out of [`normalize_share_id`].
pub fn is_url_safe(id: &str) -> bool {
    !id.is_empty()
        && !id.starts_with(SEPARATOR)
        && !id.ends_with(SEPARATOR)
        && !id.contains("--")
        && id
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == SEPARATOR)
}
