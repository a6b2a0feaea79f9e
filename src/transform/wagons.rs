//! Freight wagon families: FSA/FTA container flats, HAA merry-go-round
//! hoppers, the 21t coal hoppers (HTO/HTV) and VDA vans.
//!
//! Wagons carry the randomized texture of the fleet: livery and weathering
//! variants are picked with independent draws from the session RNG, and the
//! 21t hoppers additionally pick a numbering lot weighted by lot population
//! before remapping the source number into that lot's namespace.

use anyhow::Result;
use rand::Rng;
use regex::Regex;

use super::{
    allocate_from_dcsv, commit_number, matching_rule, rule_dcsv_path, ConsistContext, Outcome,
    Transformer,
};
use crate::catalog::Catalog;
use crate::data::{DiagramLot, HAA_EMPTY, HAA_LOADED, HTO_EMPTY_LOTS, HTO_LOADED_LOTS, HTV_EMPTY_LOTS, HTV_LOADED_LOTS, VDA_EMPTY, VDA_LOADED};
use crate::numbering::pool_modulus;
use crate::scenario::{Preload, Vehicle};
use crate::session::Session;
use crate::taillamp::{fit_tail_lamp, LampVariant};

fn wagon_dcsv() -> Regex {
    Regex::new("([0-9]{6})(.*)").expect("regex for wagon catalog entries")
}

/// FSA and FTA container flats, tried in that order.
pub struct FsaFta;

impl Transformer for FsaFta {
    fn name(&self) -> &'static str {
        "fsa-fta"
    }

    fn attempt(
        &self,
        vehicle: &mut Vehicle,
        ctx: &ConsistContext,
        catalog: &Catalog,
        session: &mut Session,
    ) -> Result<Outcome> {
        for family in ["FSA", "FTA"] {
            if let Some(outcome) = flat_wagon(family, vehicle, ctx, catalog, session)? {
                return Ok(outcome);
            }
        }
        Ok(Outcome::NoMatch)
    }
}

fn flat_wagon(
    family: &str,
    vehicle: &mut Vehicle,
    _ctx: &ConsistContext,
    catalog: &Catalog,
    session: &mut Session,
) -> Result<Option<Outcome>> {
    let Some(rule) = matching_rule(catalog, family, vehicle) else {
        return Ok(None);
    };
    let source_number = vehicle.number.clone();
    vehicle.provider = rule.replace_provider.clone();
    vehicle.product = rule.replace_product.clone();
    vehicle.blueprint = rule.replace_blueprint.clone();
    vehicle.name = rule.replace_name.clone();

    let dcsv = if vehicle.loaded == Preload::Empty {
        // The empty wagon is a single blueprint per family, whatever the
        // loaded variant was.
        let bp_re = Regex::new(&format!("{family}[a-zA-Z0-9_]*\\.xml"))
            .expect("regex for flat wagon blueprint");
        let name_re =
            Regex::new(&format!("AP.{family}.([a-zA-Z]*).*")).expect("regex for flat wagon name");
        vehicle.blueprint = bp_re
            .replace(&rule.replace_blueprint, format!("{family}.xml"))
            .into_owned();
        vehicle.name = name_re
            .replace(&rule.replace_name, format!("AP {family} $1"))
            .into_owned();
        format!("Assets/AP/FSAWagonPack/RailVehicles/Freight/FL/{family}.dcsv")
    } else {
        rule_dcsv_path(rule)
    };
    let target: i64 = source_number
        .chars()
        .filter(|c| c.is_ascii_digit())
        .collect::<String>()
        .parse()
        .unwrap_or_default();
    vehicle.number = allocate_from_dcsv(
        catalog,
        session,
        &dcsv,
        &wagon_dcsv(),
        target,
        &source_number,
    )?;
    commit_number(session, &source_number, &vehicle.number.clone());
    Ok(Some(Outcome::Matched))
}

/// The HAA replacement pack models the tail lamp as a separate blueprint.
const HAA_LAMP: LampVariant = LampVariant {
    blueprint_suffix: "_TailLamp",
    name_suffix: " (Tail Lamp)",
};

pub struct Haa;

impl Transformer for Haa {
    fn name(&self) -> &'static str {
        "haa"
    }

    fn attempt(
        &self,
        vehicle: &mut Vehicle,
        ctx: &ConsistContext,
        catalog: &Catalog,
        session: &mut Session,
    ) -> Result<Outcome> {
        let Some(_rule) = matching_rule(catalog, "HAA", vehicle) else {
            return Ok(Outcome::NoMatch);
        };
        let variants = match vehicle.loaded {
            Preload::Loaded => HAA_LOADED,
            Preload::Empty => HAA_EMPTY,
            Preload::NotApplicable => return Ok(Outcome::NoMatch),
        };
        let pick = &variants[session.rng.random_range(0..variants.len())];
        vehicle.provider = "AP".to_string();
        vehicle.product = "HAAWagonPack01".to_string();
        vehicle.blueprint = pick.blueprint.to_string();
        vehicle.name = pick.name.to_string();
        if ctx.driven {
            fit_tail_lamp(vehicle, ctx.position, &HAA_LAMP);
        }
        // The HAA keeps its number; reserve it so no allocation reuses it.
        session.reserve_number(&vehicle.number);
        Ok(Outcome::Matched)
    }
}

/// 21t coal hoppers, unfitted (HTO) and fitted (HTV).
pub struct Coal21t {
    family: &'static str,
    loaded_lots: &'static [DiagramLot],
    empty_lots: &'static [DiagramLot],
}

impl Coal21t {
    pub fn hto() -> Coal21t {
        Coal21t {
            family: "HTO",
            loaded_lots: HTO_LOADED_LOTS,
            empty_lots: HTO_EMPTY_LOTS,
        }
    }

    pub fn htv() -> Coal21t {
        Coal21t {
            family: "HTV",
            loaded_lots: HTV_LOADED_LOTS,
            empty_lots: HTV_EMPTY_LOTS,
        }
    }
}

impl Transformer for Coal21t {
    fn name(&self) -> &'static str {
        self.family
    }

    fn attempt(
        &self,
        vehicle: &mut Vehicle,
        _ctx: &ConsistContext,
        catalog: &Catalog,
        session: &mut Session,
    ) -> Result<Outcome> {
        let Some(_rule) = matching_rule(catalog, self.family, vehicle) else {
            return Ok(Outcome::NoMatch);
        };
        let lots = match vehicle.loaded {
            Preload::Loaded => self.loaded_lots,
            Preload::Empty => self.empty_lots,
            Preload::NotApplicable => return Ok(Outcome::NoMatch),
        };
        let digits: u64 = vehicle
            .number
            .chars()
            .filter(|c| c.is_ascii_digit())
            .collect::<String>()
            .parse()
            .unwrap_or_default();
        let probe = format!("B{digits}");

        // Weighted first pick, then walk the remaining lots if the chosen
        // pool hands back a number already on another wagon.
        let first = weighted_lot_index(&mut session.rng, lots);
        let mut chosen: Option<(&DiagramLot, &str)> = None;
        for offset in 0..lots.len() {
            let lot = &lots[(first + offset) % lots.len()];
            let Some(number) = pool_modulus(digits, &probe, lot.numbers) else {
                continue;
            };
            chosen = Some((lot, number));
            if !session.used().contains(number) {
                break;
            }
        }
        let Some((lot, number)) = chosen else {
            return Ok(Outcome::NoMatch);
        };

        let source_number = vehicle.number.clone();
        vehicle.provider = "FastlineSimulation".to_string();
        vehicle.product = lot.product.to_string();
        vehicle.blueprint = lot.blueprint.to_string();
        vehicle.name = lot.name.to_string();
        vehicle.number = number.to_string();
        commit_number(session, &source_number, &vehicle.number.clone());
        Ok(Outcome::Matched)
    }
}

/// Pick a lot with probability proportional to its number-pool population.
fn weighted_lot_index(rng: &mut impl Rng, lots: &[DiagramLot]) -> usize {
    let total: usize = lots.iter().map(|l| l.population()).sum();
    if total == 0 {
        return 0;
    }
    let mut roll = rng.random_range(0..total);
    for (idx, lot) in lots.iter().enumerate() {
        if roll < lot.population() {
            return idx;
        }
        roll -= lot.population();
    }
    lots.len() - 1
}

pub struct Vda;

impl Transformer for Vda {
    fn name(&self) -> &'static str {
        "vda"
    }

    fn attempt(
        &self,
        vehicle: &mut Vehicle,
        _ctx: &ConsistContext,
        _catalog: &Catalog,
        session: &mut Session,
    ) -> Result<Outcome> {
        if !vehicle.provider.contains("JL") || !vehicle.product.contains("WHL") {
            return Ok(Outcome::NoMatch);
        }
        let wanted = "railvehicles\\freight\\vda\\vda.xml";
        if !vehicle.blueprint.to_ascii_lowercase().contains(wanted) {
            return Ok(Outcome::NoMatch);
        }
        let variants = if vehicle.loaded == Preload::Loaded {
            VDA_LOADED
        } else {
            VDA_EMPTY
        };
        let pick = &variants[session.rng.random_range(0..variants.len())];
        let source_number = vehicle.number.clone();
        vehicle.provider = "FastlineSimulation".to_string();
        vehicle.product = pick.product.to_string();
        vehicle.blueprint = pick.blueprint.to_string();
        vehicle.name = pick.name.to_string();
        // Fastline numbering wants five trailing placeholder marks.
        vehicle.number = format!("{source_number}#####");
        session.record_pair(&source_number, &vehicle.number);
        Ok(Outcome::Matched)
    }
}
