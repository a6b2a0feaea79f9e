//! The family transformer chain.
//!
//! Each family is a [`Transformer`]; the chain is a literal ordered list of
//! them, consulted once per vehicle with first-match-wins semantics. The
//! chain runner stages every attempt on a scratch copy of the vehicle, so a
//! family can bail out halfway through its rewrite and the vehicle is
//! guaranteed untouched. Families commit session state (used numbers,
//! renumbering pairs) only on the path that returns [`Outcome::Matched`].

use anyhow::Result;
use tracing::debug;

use crate::catalog::{Catalog, SwapRule};
use crate::config::Config;
use crate::numbering::{candidates_from_names, nearest_unused};
use crate::scenario::Vehicle;
use crate::session::Session;
use crate::taillamp::ConsistPosition;

mod coaches;
mod ihh;
mod locos;
mod steam;
mod units;
mod user;
mod wagons;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    NoMatch,
    Matched,
}

/// What the walker knows about the consist around the current vehicle.
#[derive(Debug, Clone)]
pub struct ConsistContext {
    pub position: ConsistPosition,
    pub service: String,
    pub driven: bool,
    pub player_driven: bool,
}

impl ConsistContext {
    #[cfg(test)]
    pub fn loose() -> ConsistContext {
        ConsistContext {
            position: ConsistPosition::Interior,
            service: "Loose consist".to_string(),
            driven: false,
            player_driven: false,
        }
    }
}

pub trait Transformer {
    fn name(&self) -> &'static str;

    /// Inspect the vehicle and either rewrite it (returning `Matched`) or
    /// leave it for the next family. Mutations on a `NoMatch` return are
    /// discarded by the chain runner; session commits must happen only on
    /// the `Matched` path.
    fn attempt(
        &self,
        vehicle: &mut Vehicle,
        ctx: &ConsistContext,
        catalog: &Catalog,
        session: &mut Session,
    ) -> Result<Outcome>;
}

/// Build the chain in its fixed priority order, honoring the per-family
/// switches. Coaches, then wagons, then the discontinued-pack and steam-era
/// families, then locomotives, then units, then the user-defined fallback.
pub fn build_chain(config: &Config) -> Vec<Box<dyn Transformer>> {
    let f = &config.families;
    let mut chain: Vec<Box<dyn Transformer>> = Vec::new();
    if f.mk1 {
        chain.push(Box::new(coaches::Mk1));
    }
    if f.mk2ac {
        chain.push(Box::new(coaches::Mk2ac));
    }
    if f.mk2df {
        chain.push(Box::new(coaches::Mk2df));
    }
    if f.fsa {
        chain.push(Box::new(wagons::FsaFta));
    }
    if f.haa {
        chain.push(Box::new(wagons::Haa));
    }
    if f.hto {
        chain.push(Box::new(wagons::Coal21t::hto()));
    }
    if f.htv {
        chain.push(Box::new(wagons::Coal21t::htv()));
    }
    if f.vda {
        chain.push(Box::new(wagons::Vda));
    }
    if f.ihh {
        chain.push(Box::new(ihh::Ihh));
    }
    if f.black5 {
        chain.push(Box::new(steam::Black5));
    }
    if f.maunsell {
        chain.push(Box::new(steam::Maunsell));
    }
    if f.c31 {
        chain.push(Box::new(locos::Class31));
    }
    if f.c37 {
        chain.push(Box::new(locos::Class37));
    }
    if f.c40 {
        chain.push(Box::new(locos::Class40));
    }
    if f.c47 {
        chain.push(Box::new(locos::Class47));
    }
    if f.c50 {
        chain.push(Box::new(locos::Class50));
    }
    if f.c56 {
        chain.push(Box::new(locos::Class56 {
            policy: config.c56_policy,
        }));
    }
    if f.c66 {
        chain.push(Box::new(locos::Class66));
    }
    if f.c67 {
        chain.push(Box::new(locos::Class67));
    }
    if f.c68 {
        chain.push(Box::new(locos::Class68));
    }
    if f.c86 {
        chain.push(Box::new(locos::Class86 {
            headcode: config.c86_headcode,
        }));
    }
    if f.hst {
        chain.push(Box::new(units::Hst));
    }
    if f.c91 {
        chain.push(Box::new(units::Class91));
    }
    if f.c101 {
        chain.push(Box::new(units::Class101));
    }
    if f.c156 {
        chain.push(Box::new(units::Class156));
    }
    if f.c158 {
        chain.push(Box::new(units::Class158));
    }
    if f.c465 {
        chain.push(Box::new(units::Class465));
    }
    if f.user {
        chain.push(Box::new(user::UserDefined));
    }
    chain
}

/// Run the chain over one vehicle. Returns whether any family matched.
pub fn run_chain(
    chain: &[Box<dyn Transformer>],
    vehicle: &mut Vehicle,
    ctx: &ConsistContext,
    catalog: &Catalog,
    session: &mut Session,
) -> Result<bool> {
    for transformer in chain {
        let mut scratch = vehicle.clone();
        match transformer.attempt(&mut scratch, ctx, catalog, session)? {
            Outcome::Matched => {
                debug!(
                    family = transformer.name(),
                    number = %scratch.number,
                    "vehicle matched"
                );
                *vehicle = scratch;
                return Ok(true);
            }
            Outcome::NoMatch => {}
        }
    }
    Ok(false)
}

/// Find the first rule of a family matching the vehicle.
fn matching_rule<'a>(catalog: &'a Catalog, family: &str, vehicle: &Vehicle) -> Option<&'a SwapRule> {
    catalog.rules(family).iter().find(|r| r.matches(vehicle))
}

/// Path of a rule's number catalog relative to the RailWorks folder: the
/// `NumbersDcsv` column is relative to the replacement pack's asset
/// directory.
fn rule_dcsv_path(rule: &SwapRule) -> String {
    format!(
        "Assets/{}/{}/{}",
        rule.replace_provider, rule.replace_product, rule.numbers_dcsv
    )
}

/// Nearest-unused allocation out of a `.dcsv` catalog: decompose each
/// catalog entry with `pattern`, search for the entry closest to `target`,
/// and fall back to the source number when nothing at all was usable.
///
/// The chosen catalog entry joins the used set here, at the moment of
/// choice. Several families decorate the allocated number before committing
/// it (region suffixes, headcodes, plough markers); reserving the raw entry
/// keeps it off every later vehicle regardless of the decoration.
fn allocate_from_dcsv(
    catalog: &Catalog,
    session: &mut Session,
    dcsv_relative: &str,
    pattern: &regex::Regex,
    target: i64,
    source_number: &str,
) -> Result<String> {
    let names = catalog.dcsv_numbers(dcsv_relative)?;
    let candidates = candidates_from_names(&names, pattern);
    match nearest_unused(target, &candidates, session.used(), &[]) {
        Some(chosen) => {
            let number = chosen.number.clone();
            session.reserve_number(&number);
            Ok(number)
        }
        None => Ok(source_number.to_string()),
    }
}

/// Commit the number change: a real renumbering feeds the propagation pass,
/// an unchanged number is only reserved.
fn commit_number(session: &mut Session, old: &str, new: &str) {
    if old == new {
        session.reserve_number(new);
    } else {
        session.record_pair(old, new);
    }
}

/// Randomize the weathering level in a blueprint/name pair. The catalog
/// names its most-weathered variant in the blueprint (`W1` when three
/// levels exist, `W2` when only two); the replacement keeps the pair
/// consistent.
fn randomize_weathering(
    rng: &mut impl rand::Rng,
    blueprint: &str,
    name: &str,
    levels: u8,
) -> (String, String) {
    let (marker, picked) = match levels {
        2 => ("W2", rng.random_range(1..=2)),
        _ => ("W1", rng.random_range(1..=3)),
    };
    let weather = format!("W{picked}");
    (
        blueprint.replace(marker, &weather),
        name.replace(marker, &weather),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::Preload;

    struct Decliner;
    impl Transformer for Decliner {
        fn name(&self) -> &'static str {
            "decliner"
        }
        fn attempt(
            &self,
            vehicle: &mut Vehicle,
            _ctx: &ConsistContext,
            _catalog: &Catalog,
            _session: &mut Session,
        ) -> Result<Outcome> {
            // Scribbles on the vehicle before declining; the runner must
            // throw this away.
            vehicle.name = "clobbered".to_string();
            Ok(Outcome::NoMatch)
        }
    }

    struct Renamer;
    impl Transformer for Renamer {
        fn name(&self) -> &'static str {
            "renamer"
        }
        fn attempt(
            &self,
            vehicle: &mut Vehicle,
            _ctx: &ConsistContext,
            _catalog: &Catalog,
            _session: &mut Session,
        ) -> Result<Outcome> {
            vehicle.name = "renamed".to_string();
            Ok(Outcome::Matched)
        }
    }

    fn test_catalog() -> Catalog {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("Replacements.csv"),
            "Label,Provider,Product,Blueprint,ReplaceProvider,ReplaceProduct,ReplaceBlueprint,ReplaceName,NumbersDcsv\n",
        )
        .unwrap();
        std::fs::write(dir.path().join("Class47BRBlue_numbers.csv"), "").unwrap();
        Catalog::load(dir.path(), dir.path()).unwrap()
    }

    fn vehicle() -> Vehicle {
        Vehicle {
            provider: "X".to_string(),
            product: "Y".to_string(),
            blueprint: "Z.xml".to_string(),
            name: "orig".to_string(),
            number: "1".to_string(),
            loaded: Preload::NotApplicable,
            flipped: false,
            followers: Vec::new(),
        }
    }

    #[test]
    fn declined_mutations_are_discarded() {
        let catalog = test_catalog();
        let mut session = Session::new(Some(1));
        let chain: Vec<Box<dyn Transformer>> = vec![Box::new(Decliner)];
        let mut v = vehicle();
        let matched =
            run_chain(&chain, &mut v, &ConsistContext::loose(), &catalog, &mut session).unwrap();
        assert!(!matched);
        assert_eq!(v.name, "orig");
    }

    #[test]
    fn first_match_short_circuits() {
        let catalog = test_catalog();
        let mut session = Session::new(Some(1));
        let chain: Vec<Box<dyn Transformer>> =
            vec![Box::new(Decliner), Box::new(Renamer), Box::new(Decliner)];
        let mut v = vehicle();
        let matched =
            run_chain(&chain, &mut v, &ConsistContext::loose(), &catalog, &mut session).unwrap();
        assert!(matched);
        assert_eq!(v.name, "renamed");
    }

    #[test]
    fn chain_honors_family_switches() {
        let mut config = Config::default();
        let full = build_chain(&config).len();
        config.families.mk1 = false;
        config.families.c47 = false;
        assert_eq!(build_chain(&config).len(), full - 2);
    }

    #[test]
    fn weathering_keeps_blueprint_and_name_in_step() {
        let mut session = Session::new(Some(7));
        let (bp, name) = randomize_weathering(
            &mut session.rng,
            "RailVehicles\\37\\Loco_W1.xml",
            "AP Class 37 W1",
            3,
        );
        let level = &bp[bp.len() - 6..bp.len() - 4];
        assert!(matches!(level, "W1" | "W2" | "W3"));
        assert!(name.ends_with(level));
    }
}
