use anyhow::{Context, Result, bail};
use pantheon_game::seed::WORD_LIST;
use pantheon_game::{decode_omen, encode_omen};
use std::collections::HashMap;

/// Seed metadata used by the logic runs.
#[derive(Debug, Clone)]
pub struct SeedInfo {
    pub seed: u64,
    pub code: Option<String>,
}

impl SeedInfo {
    #[must_use]
    pub const fn from_numeric(seed: u64) -> Self {
        Self { seed, code: None }
    }

    #[must_use]
    pub const fn from_omen(seed: u64, code: String) -> Self {
        Self {
            seed,
            code: Some(code),
        }
    }

    /// The omen code a player would type to reach this seed.
    #[must_use]
    pub fn omen(&self) -> String {
        self.code.clone().unwrap_or_else(|| encode_omen(self.seed))
    }
}

/// Resolve a list of CLI seed arguments into canonical seeds.
///
/// Supports literal integers, omen codes, and the keywords `all` / `omens`
/// which expand to every omen-code seed.
pub fn resolve_seed_inputs(tokens: &[String]) -> Result<Vec<SeedInfo>> {
    let mut pending: Vec<SeedInfo> = Vec::new();
    let mut request_all = false;

    for token in tokens {
        if token.is_empty() {
            continue;
        }

        if token.eq_ignore_ascii_case("all") || token.eq_ignore_ascii_case("omens") {
            request_all = true;
            continue;
        }

        if let Ok(value) = token.parse::<i64>() {
            pending.push(SeedInfo::from_numeric(value.unsigned_abs()));
            continue;
        }

        if let Ok(value) = token.parse::<u64>() {
            pending.push(SeedInfo::from_numeric(value));
            continue;
        }

        if let Some(seed) = decode_omen(token) {
            pending.push(SeedInfo::from_omen(seed, token.to_uppercase()));
            continue;
        }

        bail!("Unrecognized seed token: {token}");
    }

    if request_all {
        pending.extend(generate_all_omen_seeds()?);
    }

    let mut deduped: Vec<SeedInfo> = Vec::new();
    let mut index: HashMap<u64, usize> = HashMap::new();

    for info in pending {
        if let Some(&existing) = index.get(&info.seed) {
            if let Some(entry) = deduped.get_mut(existing)
                && entry.code.is_none()
                && info.code.is_some()
            {
                *entry = info;
            }
        } else {
            index.insert(info.seed, deduped.len());
            deduped.push(info);
        }
    }

    if deduped.is_empty() {
        deduped.push(SeedInfo::from_numeric(1337));
    }

    Ok(deduped)
}

fn generate_all_omen_seeds() -> Result<Vec<SeedInfo>> {
    let mut seeds = Vec::with_capacity(WORD_LIST.len() * 100);

    for word in WORD_LIST {
        for suffix in 0..100 {
            let code = format!("OMEN-{word}{suffix:02}");
            let seed = decode_omen(&code).with_context(|| format!("failed to parse omen: {code}"))?;
            seeds.push(SeedInfo::from_omen(seed, code));
        }
    }

    Ok(seeds)
}
