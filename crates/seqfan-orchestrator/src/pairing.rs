//! Key pair matching
//!
//! Groups a flat object listing into (R1, R2) pairs by sample/lane base
//! name. The filter is deliberately permissive: keys that do not match the
//! expected naming pattern are dropped silently rather than reported, so
//! unrelated objects can share the bucket.

use regex::Regex;
use seqfan_common::types::PairKey;
use std::collections::BTreeMap;
use std::sync::LazyLock;
use tracing::{debug, info};

/// `<base>_L<3-digit-lane>_<R1|R2>_<3-digit-index>(_p<shard>)?.fastq.gz`
static PAIR_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<base>.+_L\d{3})_(?P<read>R[12])_\d{3}(_p\d+)?\.fastq\.gz$")
        .expect("pair pattern is valid")
});

/// A pair key with both read slots filled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchedPair {
    pub pair_key: PairKey,
    pub r1_key: String,
    pub r2_key: String,
}

/// Result of matching one listing.
#[derive(Debug, Default)]
pub struct PairingOutcome {
    /// Pairs with both R1 and R2 present, ordered by pair key.
    pub pairs: Vec<MatchedPair>,
    /// Pair keys seen with only one read side; excluded from dispatch.
    pub incomplete: Vec<PairKey>,
}

/// Match a listing of object keys into read pairs.
///
/// Index-read files (`_I1_`/`_I2_`) are always excluded. When duplicate
/// keys land in the same (pair, read-side) slot the last one seen wins;
/// listing order is an assumption about the store, not a guarantee.
pub fn match_pairs<'a>(keys: impl IntoIterator<Item = &'a str>) -> PairingOutcome {
    #[derive(Default)]
    struct Slots {
        r1: Option<String>,
        r2: Option<String>,
    }

    let mut slots: BTreeMap<PairKey, Slots> = BTreeMap::new();

    for key in keys {
        if !key.ends_with(".fastq.gz") || key.contains("_I1_") || key.contains("_I2_") {
            continue;
        }

        let Some(captures) = PAIR_PATTERN.captures(key) else {
            debug!(key, "Key does not match pairing pattern, skipping");
            continue;
        };

        let pair_key = PairKey::new(&captures["base"]);
        let entry = slots.entry(pair_key).or_default();
        match &captures["read"] {
            "R1" => entry.r1 = Some(key.to_string()),
            _ => entry.r2 = Some(key.to_string()),
        }
    }

    let mut outcome = PairingOutcome::default();
    for (pair_key, slots) in slots {
        match (slots.r1, slots.r2) {
            (Some(r1_key), Some(r2_key)) => outcome.pairs.push(MatchedPair {
                pair_key,
                r1_key,
                r2_key,
            }),
            _ => {
                debug!(pair_key = %pair_key, "Pair is missing a read side, excluding");
                outcome.incomplete.push(pair_key);
            }
        }
    }

    info!(
        "Matched {} complete pairs ({} incomplete excluded)",
        outcome.pairs.len(),
        outcome.incomplete.len()
    );
    outcome
}
