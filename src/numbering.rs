//! Number-Allocation Engine: nearest-unused search over ordered number
//! catalogs, pool-modulus allocation for uncorrelated fleets, and the typed
//! running-number decomposition used by the regex-renumbering families.
//!
//! Both allocators consult the document-scoped [`UsedNumbers`] set before a
//! number is handed back; the caller commits the chosen number into the set
//! via the session at the moment it rewrites the vehicle.

use regex::Regex;
use std::collections::BTreeSet;

/// Every running number assigned so far in the current document. One per
/// processed scenario, discarded afterwards.
#[derive(Debug, Default)]
pub struct UsedNumbers {
    numbers: BTreeSet<String>,
}

impl UsedNumbers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, number: &str) -> bool {
        self.numbers.contains(number)
    }

    pub fn insert(&mut self, number: &str) {
        self.numbers.insert(number.to_string());
    }

    pub fn len(&self) -> usize {
        self.numbers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.numbers.is_empty()
    }
}

/// One entry of a numbering catalog: the comparable numeric key, the full
/// number string as it will appear on the vehicle, and an opaque payload
/// (e.g. the blueprint/name row of a subclass table).
#[derive(Debug, Clone)]
pub struct Candidate<P> {
    pub key: i64,
    pub number: String,
    pub payload: P,
}

/// Walk `candidates` (ordered ascending by key) and return the nearest entry
/// to `target` whose number is not yet in `used`.
///
/// The walk keeps the gap to the last candidate still below the target; on
/// the first overshoot it returns that candidate unless its gap is strictly
/// larger than the remembered one, in which case the candidate before the
/// overshoot wins. An exact key match always wins immediately. Equal gaps
/// therefore favor the overshoot candidate. When nothing usable was seen
/// below the target, the first overshooting candidate is the nearest by
/// definition and is taken.
///
/// `boundaries` marks hard subclass cut-offs: an overshoot that crosses a
/// boundary the target sits below returns the pre-overshoot candidate no
/// matter how close it is, because numbers from another subclass are never
/// acceptable substitutes.
///
/// Returns `None` only if every candidate was used or cut off by a boundary
/// (or the list was empty); the caller falls back to the source number in
/// that case.
pub fn nearest_unused<'a, P>(
    target: i64,
    candidates: &'a [Candidate<P>],
    used: &UsedNumbers,
    boundaries: &[i64],
) -> Option<&'a Candidate<P>> {
    let mut last_seen: Option<&Candidate<P>> = None;
    let mut last_diff: i64 = 0;

    for candidate in candidates {
        if used.contains(&candidate.number) {
            // Already on another swapped vehicle - move on and try the next.
            continue;
        }
        if candidate.key == target {
            return Some(candidate);
        }
        if candidate.key < target {
            // Still below the target - remember how close we got.
            last_diff = target - candidate.key;
            last_seen = Some(candidate);
            continue;
        }
        // Overshot the target.
        let overshoot = candidate.key - target;
        let crosses_boundary = boundaries
            .iter()
            .any(|b| target < *b && candidate.key >= *b);
        if crosses_boundary {
            return last_seen;
        }
        if last_seen.is_some() && overshoot > last_diff {
            return last_seen;
        }
        return Some(candidate);
    }
    // Ran off the end of the catalog; degrade to the last number we saw
    // rather than failing the swap.
    last_seen
}

/// Pool-modulus allocation for families whose replacement numbering scheme
/// has no numeric relationship with the source scheme. Tries a literal probe
/// first (the source digits reformatted into the pool's notation), then
/// falls back to indexing the pool by `digits % len`.
pub fn pool_modulus<'a>(digits: u64, probe: &str, pool: &[&'a str]) -> Option<&'a str> {
    if pool.is_empty() {
        return None;
    }
    if let Some(hit) = pool.iter().find(|entry| **entry == probe) {
        return Some(hit);
    }
    let idx = (digits % pool.len() as u64) as usize;
    Some(pool[idx])
}

/// Structured decomposition of a running number: optional prefix (region
/// code, era marker), the numeric core, optional suffix (headcode,
/// decoration). Replaces raw capture-group indexing at the call sites.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NumberParts {
    pub prefix: String,
    pub core: String,
    pub suffix: String,
}

impl NumberParts {
    /// Numeric value of the core digits.
    pub fn value(&self) -> Option<i64> {
        self.core.parse().ok()
    }

    /// Reassemble with a different core, keeping prefix and suffix.
    pub fn with_core(&self, core: &str) -> String {
        format!("{}{}{}", self.prefix, core, self.suffix)
    }

    /// The full decomposed text.
    pub fn full(&self) -> String {
        self.with_core(&self.core)
    }
}

/// Decompose `number` with a family pattern of one, two or three capture
/// groups: `(core)`, `(core)(suffix)` or `(prefix)(core)(suffix)`.
pub fn decompose(pattern: &Regex, number: &str) -> Option<NumberParts> {
    let caps = pattern.captures(number)?;
    let group = |i: usize| caps.get(i).map(|m| m.as_str().to_string()).unwrap_or_default();
    match caps.len() {
        2 => Some(NumberParts {
            prefix: String::new(),
            core: group(1),
            suffix: String::new(),
        }),
        3 => Some(NumberParts {
            prefix: String::new(),
            core: group(1),
            suffix: group(2),
        }),
        4 => Some(NumberParts {
            prefix: group(1),
            core: group(2),
            suffix: group(3),
        }),
        _ => None,
    }
}

/// Build ordered candidates from a list of raw catalog number strings using a
/// family decomposition pattern. Strings the pattern rejects are skipped.
pub fn candidates_from_names(names: &[String], pattern: &Regex) -> Vec<Candidate<()>> {
    names
        .iter()
        .filter_map(|name| {
            let parts = decompose(pattern, name)?;
            let key = parts.value()?;
            Some(Candidate {
                key,
                number: parts.full(),
                payload: (),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain(keys: &[i64]) -> Vec<Candidate<()>> {
        keys.iter()
            .map(|k| Candidate {
                key: *k,
                number: k.to_string(),
                payload: (),
            })
            .collect()
    }

    #[test]
    fn exact_match_wins() {
        let c = plain(&[10, 20, 30]);
        let used = UsedNumbers::new();
        let hit = nearest_unused(20, &c, &used, &[]).unwrap();
        assert_eq!(hit.number, "20");
    }

    #[test]
    fn undershoot_closer_than_overshoot() {
        let c = plain(&[10, 20, 30]);
        let used = UsedNumbers::new();
        let hit = nearest_unused(21, &c, &used, &[]).unwrap();
        assert_eq!(hit.number, "20", "gap 1 beats gap 9");
    }

    #[test]
    fn equal_gap_favors_overshoot() {
        let c = plain(&[10, 20, 30]);
        let used = UsedNumbers::new();
        let hit = nearest_unused(25, &c, &used, &[]).unwrap();
        assert_eq!(hit.number, "30", "ties go to the overshoot candidate");
    }

    #[test]
    fn used_number_is_excluded() {
        let c = plain(&[10, 20, 30]);
        let mut used = UsedNumbers::new();
        used.insert("20");
        let hit = nearest_unused(20, &c, &used, &[]).unwrap();
        assert_ne!(hit.number, "20");
        assert_eq!(hit.number, "30", "30 overshoots by 10, last diff also 10");
    }

    #[test]
    fn overshoot_with_nothing_below_is_taken() {
        let c = plain(&[100, 200]);
        let used = UsedNumbers::new();
        let hit = nearest_unused(50, &c, &used, &[]).unwrap();
        assert_eq!(hit.number, "100");
    }

    #[test]
    fn duplicate_targets_walk_up_the_pool() {
        let c = plain(&[100, 101, 102]);
        let mut used = UsedNumbers::new();
        for expected in ["100", "101", "102"] {
            let hit = nearest_unused(100, &c, &used, &[]).unwrap();
            assert_eq!(hit.number, expected);
            used.insert(&hit.number);
        }
        assert!(nearest_unused(100, &c, &used, &[]).is_none());
    }

    #[test]
    fn exhausted_list_returns_last_seen() {
        let c = plain(&[10, 20]);
        let used = UsedNumbers::new();
        let hit = nearest_unused(500, &c, &used, &[]).unwrap();
        assert_eq!(hit.number, "20");
    }

    #[test]
    fn subclass_boundary_forces_last_seen() {
        let c = plain(&[47290, 47310]);
        let used = UsedNumbers::new();
        // 47298 is numerically closer to 47310, but 47301 starts another
        // subclass the target sits below.
        let hit = nearest_unused(47298, &c, &used, &[47301, 47401, 47701]).unwrap();
        assert_eq!(hit.number, "47290");
    }

    #[test]
    fn pool_modulus_prefers_exact_probe() {
        let pool = ["B171003", "B171012", "B171188"];
        assert_eq!(pool_modulus(171012, "B171012", &pool), Some("B171012"));
    }

    #[test]
    fn pool_modulus_falls_back_to_index() {
        let pool = ["B171003", "B171012", "B171188"];
        assert_eq!(pool_modulus(7, "B7", &pool), Some("B171012"));
        assert_eq!(pool_modulus(7, "B7", &[]), None);
    }

    #[test]
    fn decompose_three_groups() {
        let re = Regex::new("([A-Za-z]{0,2})([0-9]{4,5})(.*)").unwrap();
        let parts = decompose(&re, "SC13305").unwrap();
        assert_eq!(parts.prefix, "SC");
        assert_eq!(parts.core, "13305");
        assert_eq!(parts.with_core("13400"), "SC13400");
    }

    #[test]
    fn decompose_rejects_mismatch() {
        let re = Regex::new("(37[0-9]{3})(.*)").unwrap();
        assert!(decompose(&re, "D6700").is_none());
        let parts = decompose(&re, "37025 Inverness TMD").unwrap();
        assert_eq!(parts.core, "37025");
        assert_eq!(parts.suffix, " Inverness TMD");
    }

    #[test]
    fn candidates_skip_unparseable_names() {
        let re = Regex::new("([0-9]{5})(.*)").unwrap();
        let names = vec!["47001".to_string(), "spare".to_string(), "47002 x".to_string()];
        let c = candidates_from_names(&names, &re);
        assert_eq!(c.len(), 2);
        assert_eq!(c[1].number, "47002 x");
        assert_eq!(c[1].key, 47002);
    }
}
