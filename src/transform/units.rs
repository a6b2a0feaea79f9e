//! Multiple-unit families: HST sets, Class 91 sets, and the 101, 156, 158
//! and 465 units.
//!
//! The HST renumbers its power cars from the replacement catalog; the 156
//! and 158 re-express the unit number with a destination-blind code; the 91
//! and 101 are straight identity swaps. The 465 is the stateful one: its
//! two driving motors carry different control-logic fittings, so the
//! transformer alternates between the A and B cab variants within a consist
//! and keeps the whole set on one set number.

use anyhow::Result;
use regex::Regex;

use super::{allocate_from_dcsv, matching_rule, rule_dcsv_path, ConsistContext, Outcome, Transformer};
use crate::catalog::Catalog;
use crate::data::{c158_destination, C158Table};
use crate::scenario::Vehicle;
use crate::session::Session;

/// The two Class 465 driving-motor cab fittings. Consecutive driving motors
/// in one consist must not share a fitting.
pub const DMSL_VARIANT_A: &str = "DMSLA";
pub const DMSL_VARIANT_B: &str = "DMSLB";

pub struct Hst;

impl Transformer for Hst {
    fn name(&self) -> &'static str {
        "hst"
    }

    fn attempt(
        &self,
        vehicle: &mut Vehicle,
        _ctx: &ConsistContext,
        catalog: &Catalog,
        session: &mut Session,
    ) -> Result<Outcome> {
        let Some(rule) = matching_rule(catalog, "HST_set", vehicle) else {
            return Ok(Outcome::NoMatch);
        };
        let source_number = vehicle.number.clone();
        vehicle.provider = rule.replace_provider.clone();
        vehicle.product = rule.replace_product.clone();
        vehicle.blueprint = rule.replace_blueprint.clone();
        vehicle.name = rule.replace_name.clone();

        // Only the power cars renumber; trailers swap identity and keep
        // their marshalling number.
        if rule.replace_blueprint.contains("Class43") {
            let tops = Regex::new("(43[0-9]{3})").expect("regex for power car numbers");
            if let Some(caps) = tops.captures(&source_number) {
                let pattern =
                    Regex::new("(.?)(43[0-9]{3})(.*)").expect("regex for power car catalog entries");
                let target: i64 = caps[1].parse().unwrap_or_default();
                vehicle.number = allocate_from_dcsv(
                    catalog,
                    session,
                    &rule_dcsv_path(rule),
                    &pattern,
                    target,
                    &source_number,
                )?;
                session.record_pair(&source_number, &vehicle.number.clone());
            }
        }
        Ok(Outcome::Matched)
    }
}

pub struct Class91;

impl Transformer for Class91 {
    fn name(&self) -> &'static str {
        "class91"
    }

    fn attempt(
        &self,
        vehicle: &mut Vehicle,
        _ctx: &ConsistContext,
        catalog: &Catalog,
        _session: &mut Session,
    ) -> Result<Outcome> {
        direct_swap(catalog, "Class91_set", vehicle)
    }
}

pub struct Class101;

impl Transformer for Class101 {
    fn name(&self) -> &'static str {
        "class101"
    }

    fn attempt(
        &self,
        vehicle: &mut Vehicle,
        _ctx: &ConsistContext,
        catalog: &Catalog,
        _session: &mut Session,
    ) -> Result<Outcome> {
        direct_swap(catalog, "DMU101_set", vehicle)
    }
}

/// Identity-only swap: the set keeps every number it had.
fn direct_swap(catalog: &Catalog, family: &str, vehicle: &mut Vehicle) -> Result<Outcome> {
    let Some(rule) = matching_rule(catalog, family, vehicle) else {
        return Ok(Outcome::NoMatch);
    };
    vehicle.provider = rule.replace_provider.clone();
    vehicle.product = rule.replace_product.clone();
    vehicle.blueprint = rule.replace_blueprint.clone();
    vehicle.name = rule.replace_name.clone();
    Ok(Outcome::Matched)
}

pub struct Class156;

impl Transformer for Class156 {
    fn name(&self) -> &'static str {
        "class156"
    }

    fn attempt(
        &self,
        vehicle: &mut Vehicle,
        _ctx: &ConsistContext,
        catalog: &Catalog,
        session: &mut Session,
    ) -> Result<Outcome> {
        if !vehicle.provider.contains("Oovee") || !vehicle.product.contains("BRClass156Pack01") {
            return Ok(Outcome::NoMatch);
        }
        let Some(rule) = matching_rule(catalog, "DMU156_set", vehicle) else {
            return Ok(Outcome::NoMatch);
        };
        let unit = Regex::new("(156[0-9]{3})").expect("regex for class 156 numbers");
        let Some(caps) = unit.captures(&vehicle.number) else {
            // A non-standard unit number can't be re-expressed in the
            // replacement's notation, so leave the vehicle alone.
            return Ok(Outcome::NoMatch);
        };
        let source_number = vehicle.number.clone();
        // The rule's number column carries the pack's per-row number suffix.
        vehicle.number = format!("{}a{}", &caps[1], rule.numbers_dcsv);
        vehicle.provider = rule.replace_provider.clone();
        vehicle.product = rule.replace_product.clone();
        vehicle.blueprint = rule.replace_blueprint.clone();
        vehicle.name = rule.replace_name.clone();
        session.record_pair(&source_number, &vehicle.number.clone());
        Ok(Outcome::Matched)
    }
}

pub struct Class158;

impl Transformer for Class158 {
    fn name(&self) -> &'static str {
        "class158"
    }

    fn attempt(
        &self,
        vehicle: &mut Vehicle,
        _ctx: &ConsistContext,
        catalog: &Catalog,
        session: &mut Session,
    ) -> Result<Outcome> {
        let Some(rule) = matching_rule(catalog, "DMU158_set", vehicle) else {
            return Ok(Outcome::NoMatch);
        };
        let source_number = vehicle.number.clone();
        let mut rv_num = source_number.clone();

        if vehicle.provider == "S9Bl" {
            // The S9Bl packs spell the destination as a four-letter station
            // code ahead of the six-digit unit number; which code table
            // applies depends on the livery named in the blueprint.
            let form = Regex::new("(....).....([0-9]{6})").expect("regex for S9Bl 158 numbers");
            if let Some(caps) = form.captures(&source_number) {
                let destination = s9bl_table(&vehicle.blueprint)
                    .and_then(|table| c158_destination(table, &caps[1]))
                    .unwrap_or('a');
                rv_num = format!("{}{}", &caps[2], destination);
            }
        } else {
            let form = Regex::new("(.)([0-9]{4}).*").expect("regex for class 158 numbers");
            if let Some(caps) = form.captures(&source_number) {
                let destination = dtg_table(vehicle)
                    .and_then(|table| c158_destination(table, &caps[1]))
                    .unwrap_or('a');
                rv_num = format!("15{}{}", &caps[2], destination);
            }
            if vehicle.provider == "RSC" && vehicle.product == "SettleCarlisle" {
                // Settle-Carlisle units have no destination displays.
                let core: String = source_number.chars().skip(2).take(3).collect();
                rv_num = format!("158{core}a");
            }
        }
        vehicle.provider = rule.replace_provider.clone();
        vehicle.product = rule.replace_product.clone();
        vehicle.blueprint = rule.replace_blueprint.clone();
        vehicle.name = rule.replace_name.clone();
        vehicle.number = rv_num;
        if source_number == vehicle.number {
            session.reserve_number(&vehicle.number.clone());
        } else {
            session.record_pair(&source_number, &vehicle.number.clone());
        }
        Ok(Outcome::Matched)
    }
}

/// S9Bl destination table for a source blueprint, by livery marker.
fn s9bl_table(blueprint: &str) -> Option<C158Table> {
    let lower = blueprint.to_ascii_lowercase();
    if lower.contains("default") {
        Some(C158Table::S9blRegional)
    } else if lower.contains("fgw") {
        Some(C158Table::S9blFgw)
    } else if lower.contains("ntpe") {
        Some(C158Table::S9blTpe)
    } else if lower.contains("nr") {
        Some(C158Table::S9blNorthern)
    } else if lower.contains("south") || lower.contains("swt") {
        Some(C158Table::S9blSwt)
    } else {
        None
    }
}

/// Destination table for the DTG/RSC 158 packs; only the default-liveried
/// rows carry destination blinds.
fn dtg_table(vehicle: &Vehicle) -> Option<C158Table> {
    if !vehicle.blueprint.to_ascii_lowercase().contains("default") {
        return None;
    }
    match (vehicle.provider.as_str(), vehicle.product.as_str()) {
        ("DTG", "Class158Pack01") | ("DTG", "NorthWalesCoast") => Some(C158Table::NorthWalesCoast),
        ("DTG", "FifeCircle") => Some(C158Table::FifeCircle),
        ("RSC", "LiverpoolManchester") => Some(C158Table::LivManRegional),
        _ => None,
    }
}

pub struct Class465;

impl Transformer for Class465 {
    fn name(&self) -> &'static str {
        "class465"
    }

    fn attempt(
        &self,
        vehicle: &mut Vehicle,
        _ctx: &ConsistContext,
        catalog: &Catalog,
        session: &mut Session,
    ) -> Result<Outcome> {
        let Some(rule) = matching_rule(catalog, "Class465", vehicle) else {
            return Ok(Outcome::NoMatch);
        };
        let set = Regex::new("(465[0-9]{3})").expect("regex for class 465 set numbers");
        vehicle.provider = rule.replace_provider.clone();
        vehicle.product = rule.replace_product.clone();

        if vehicle.blueprint.to_ascii_lowercase().contains("dmsl") {
            // Driving motor: alternate the cab fitting within the consist.
            let variant = match session.last_unit_variant.as_deref() {
                Some(DMSL_VARIANT_A) => DMSL_VARIANT_B,
                _ => DMSL_VARIANT_A,
            };
            session.last_unit_variant = Some(variant.to_string());
            vehicle.blueprint = rule.replace_blueprint.replace(DMSL_VARIANT_A, variant);
            vehicle.name = rule.replace_name.replace(DMSL_VARIANT_A, variant);
            // A motor with a readable set number publishes it for the rest
            // of the set; one without adopts the published number.
            let current = vehicle.number.clone();
            if let Some(caps) = set.captures(&current) {
                session.last_motor_number = Some(caps[1].to_string());
                vehicle.number = caps[1].to_string();
            } else if let Some(stored) = session.last_motor_number.clone() {
                vehicle.number = stored;
            }
        } else {
            vehicle.blueprint = rule.replace_blueprint.clone();
            vehicle.name = rule.replace_name.clone();
            // Trailers ride on the set number the last motor published.
            if let Some(stored) = session.last_motor_number.clone() {
                vehicle.number = stored;
            }
        }
        session.reserve_number(&vehicle.number.clone());
        Ok(Outcome::Matched)
    }
}
