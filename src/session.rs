//! Per-document processing state.
//!
//! Everything the transformer chain accumulates while one scenario is being
//! rewritten lives here: the used-number set, the renumbering pairs the
//! propagation pass replays, the consist-scoped scratch values, the report
//! rows and the RNG. A session is built per document and dropped after
//! serialization; nothing is shared between runs.

use std::time::{SystemTime, UNIX_EPOCH};

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::numbering::UsedNumbers;
use crate::scenario::Preload;

/// One committed renumbering: the number as found in the document and the
/// number written in its place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenumberPair {
    pub old: String,
    pub new: String,
}

/// One before- or after-row of the vehicle report, in document order.
#[derive(Debug, Clone)]
pub struct ReportRow {
    pub consist: usize,
    pub provider: String,
    pub product: String,
    pub blueprint: String,
    pub name: String,
    pub number: String,
    pub loaded: Preload,
    pub service: String,
    pub player_driven: bool,
}

pub struct Session {
    used: UsedNumbers,
    pairs: Vec<RenumberPair>,
    /// Driving-vehicle variant used last within the current consist, for
    /// families that alternate between two cab fittings.
    pub last_unit_variant: Option<String>,
    /// Set number carried from the most recent motor vehicle to its driving
    /// trailer within the current consist.
    pub last_motor_number: Option<String>,
    pub rng: StdRng,
    before: Vec<ReportRow>,
    after: Vec<ReportRow>,
}

impl Session {
    /// A session with a fixed seed renumbers identically on every run; with
    /// `None` the seed comes from the clock.
    pub fn new(seed: Option<u64>) -> Session {
        let seed = seed.unwrap_or_else(|| {
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_nanos() as u64)
                .unwrap_or_default()
        });
        Session {
            used: UsedNumbers::new(),
            pairs: Vec::new(),
            last_unit_variant: None,
            last_motor_number: None,
            rng: StdRng::seed_from_u64(seed),
            before: Vec::new(),
            after: Vec::new(),
        }
    }

    pub fn used(&self) -> &UsedNumbers {
        &self.used
    }

    /// Mark a number as taken without recording a propagation pair. For
    /// allocations whose source number never appears in driver instructions
    /// (freshly invented set numbers).
    pub fn reserve_number(&mut self, number: &str) {
        self.used.insert(number);
    }

    /// Commit a renumbering: the new number joins the used set immediately so
    /// no later vehicle can take it, and the pair feeds the propagation pass.
    pub fn record_pair(&mut self, old: &str, new: &str) {
        self.used.insert(new);
        self.pairs.push(RenumberPair {
            old: old.to_string(),
            new: new.to_string(),
        });
    }

    pub fn pairs(&self) -> &[RenumberPair] {
        &self.pairs
    }

    /// First-matching pair lookup used by the propagation pass.
    pub fn renumbered(&self, old: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|p| p.old == old)
            .map(|p| p.new.as_str())
    }

    /// Consist-scoped scratch dies at the consist boundary.
    pub fn reset_consist_state(&mut self) {
        self.last_unit_variant = None;
        self.last_motor_number = None;
    }

    pub fn record_before(&mut self, row: ReportRow) {
        self.before.push(row);
    }

    pub fn record_after(&mut self, row: ReportRow) {
        self.after.push(row);
    }

    pub fn before_rows(&self) -> &[ReportRow] {
        &self.before
    }

    pub fn after_rows(&self) -> &[ReportRow] {
        &self.after
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    #[test]
    fn committed_numbers_are_immediately_used() {
        let mut session = Session::new(Some(1));
        session.record_pair("47401", "47402");
        assert!(session.used().contains("47402"));
        assert!(!session.used().contains("47401"));
        assert_eq!(session.renumbered("47401"), Some("47402"));
        assert_eq!(session.renumbered("47402"), None);
    }

    #[test]
    fn first_matching_pair_wins() {
        let mut session = Session::new(Some(1));
        session.record_pair("100", "200");
        session.record_pair("100", "300");
        assert_eq!(session.renumbered("100"), Some("200"));
    }

    #[test]
    fn consist_reset_clears_scratch_only() {
        let mut session = Session::new(Some(1));
        session.last_unit_variant = Some("DMSLA".to_string());
        session.last_motor_number = Some("465001".to_string());
        session.record_pair("a", "b");
        session.reset_consist_state();
        assert!(session.last_unit_variant.is_none());
        assert!(session.last_motor_number.is_none());
        assert_eq!(session.pairs().len(), 1);
        assert!(session.used().contains("b"));
    }

    #[test]
    fn seeded_sessions_draw_identically() {
        let mut a = Session::new(Some(42));
        let mut b = Session::new(Some(42));
        let xs: Vec<u32> = (0..4).map(|_| a.rng.random_range(0..100)).collect();
        let ys: Vec<u32> = (0..4).map(|_| b.rng.random_range(0..100)).collect();
        assert_eq!(xs, ys);
    }
}
