//! Omen codes: short, shareable names for a session seed.
//!
//! A code has the form `OMEN-<WORD><NN>` (e.g. `OMEN-COMET42`). The word and
//! number select one of 6400 slots kept in the low 16 bits of the seed; the
//! upper bits are an xxhash of the slot, so every code names exactly one seed
//! and re-encoding that seed yields the same code.
use std::fmt;
use std::hash::Hasher;
use std::str::FromStr;

use twox_hash::XxHash64;

const OMEN_PREFIX: &str = "OMEN";
const OMEN_HASH_KEY: u64 = 0x5041_4E54_4845_4F4E;
const SLOTS_PER_WORD: u16 = 100;
const SLOT_MASK: u64 = 0xFFFF;

pub const WORD_LIST: [&str; 64] = [
    "AEGIS", "ALTAR", "AMBER", "ANVIL", "ASHES", "AUGUR", "AURORA", "BANNER", "BLAZE", "CENSER",
    "CHALICE", "COMET", "CROWN", "DAWN", "DELTA", "DRIFT", "DUSK", "ECHO", "EMBER", "FABLE",
    "FATE", "FORGE", "GILDED", "GROVE", "HALO", "HARVEST", "HYMN", "IVORY", "JADE", "LANTERN",
    "LAUREL", "LOTUS", "MARBLE", "MIRAGE", "MOON", "MYRRH", "NECTAR", "OMEN", "ORACLE", "PEARL",
    "PHOENIX", "PILGRIM", "PRISM", "QUARTZ", "RELIC", "RIDDLE", "SABLE", "SCARAB", "SHRINE",
    "SIGIL", "SOLSTICE", "SPHINX", "STAR", "TEMPEST", "THORN", "TIDE", "TORCH", "URN", "VEIL",
    "VIGIL", "WILLOW", "WRAITH", "ZENITH", "ZEPHYR",
];

/// A decoded omen: an index into [`WORD_LIST`] and a two-digit number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Omen {
    word: u16,
    number: u16,
}

impl Omen {
    const SLOTS: u16 = WORD_LIST.len() as u16 * SLOTS_PER_WORD;

    /// The omen whose slot matches the low bits of `seed`.
    #[must_use]
    pub fn from_seed(seed: u64) -> Self {
        let slot = u16::try_from(seed & SLOT_MASK).unwrap_or(0) % Self::SLOTS;
        Self {
            word: slot / SLOTS_PER_WORD,
            number: slot % SLOTS_PER_WORD,
        }
    }

    #[must_use]
    pub const fn slot(self) -> u16 {
        self.word * SLOTS_PER_WORD + self.number
    }

    #[must_use]
    pub fn word(self) -> &'static str {
        WORD_LIST[usize::from(self.word)]
    }

    /// The canonical seed named by this omen.
    #[must_use]
    pub fn seed(self) -> u64 {
        let slot = self.slot();
        let mut hasher = XxHash64::with_seed(OMEN_HASH_KEY);
        hasher.write(OMEN_PREFIX.as_bytes());
        hasher.write(&slot.to_le_bytes());
        (hasher.finish() & !SLOT_MASK) | u64::from(slot)
    }
}

impl fmt::Display for Omen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{OMEN_PREFIX}-{}{:02}", self.word(), self.number)
    }
}

impl FromStr for Omen {
    type Err = ();

    fn from_str(code: &str) -> Result<Self, Self::Err> {
        let (prefix, body) = code.trim().split_once('-').ok_or(())?;
        if !prefix.eq_ignore_ascii_case(OMEN_PREFIX) || !body.is_ascii() || body.len() < 3 {
            return Err(());
        }
        let (word, digits) = body.split_at(body.len() - 2);
        if !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(());
        }
        let number: u16 = digits.parse().map_err(|_| ())?;
        let index = WORD_LIST
            .iter()
            .position(|candidate| candidate.eq_ignore_ascii_case(word))
            .ok_or(())?;
        Ok(Self {
            word: u16::try_from(index).map_err(|_| ())?,
            number,
        })
    }
}

/// Render the omen code for `seed`. Only the low 16 bits take part.
#[must_use]
pub fn encode_omen(seed: u64) -> String {
    Omen::from_seed(seed).to_string()
}

/// Recover the canonical seed behind an omen code.
#[must_use]
pub fn decode_omen(code: &str) -> Option<u64> {
    code.parse::<Omen>().ok().map(Omen::seed)
}

/// Pick an omen from arbitrary entropy (a clock, an OS random value).
#[must_use]
pub fn omen_from_entropy(entropy: u64) -> String {
    let mut hasher = XxHash64::with_seed(OMEN_HASH_KEY);
    hasher.write_u64(entropy);
    encode_omen(hasher.finish())
}

/// Accept either an omen code or a plain decimal seed.
#[must_use]
pub fn parse_seed(input: &str) -> Option<u64> {
    let trimmed = input.trim();
    trimmed.parse::<u64>().ok().or_else(|| decode_omen(trimmed))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_survives_a_seed_roundtrip() {
        let code = encode_omen(0xDEAD_BEEF_CAFE_BABE);
        let seed = decode_omen(&code).unwrap();
        assert_eq!(encode_omen(seed), code);
    }

    #[test]
    fn comet_42_is_stable_and_case_insensitive() {
        let seed = decode_omen("OMEN-COMET42").unwrap();
        assert_eq!(encode_omen(seed), "OMEN-COMET42");
        assert_eq!(decode_omen("omen-comet42"), Some(seed));
    }

    #[test]
    fn every_slot_names_a_distinct_seed() {
        let mut seeds: Vec<u64> = (0..Omen::SLOTS)
            .map(|slot| Omen::from_seed(u64::from(slot)).seed())
            .collect();
        seeds.sort_unstable();
        seeds.dedup();
        assert_eq!(seeds.len(), usize::from(Omen::SLOTS));
    }

    #[test]
    fn rejects_foreign_codes() {
        assert!(decode_omen("CL-ORANGE42").is_none());
        assert!(decode_omen("OMEN-NOTAWORD12").is_none());
        assert!(decode_omen("OMEN-COMETXX").is_none());
        assert!(decode_omen("OMEN-COMET+1").is_none());
    }

    #[test]
    fn entropy_codes_decode() {
        let code = omen_from_entropy(987_654_321);
        assert!(code.starts_with("OMEN-"));
        assert!(decode_omen(&code).is_some());
    }

    #[test]
    fn parse_seed_accepts_numbers_and_omens() {
        assert_eq!(parse_seed(" 1234 "), Some(1234));
        assert_eq!(parse_seed("OMEN-TIDE07"), decode_omen("OMEN-TIDE07"));
        assert!(parse_seed("???").is_none());
    }
}
