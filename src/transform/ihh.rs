//! Iron Horse House (IHH) stock.
//!
//! IHH packs are long discontinued, so scenarios that still carry them need
//! the whole group swapped out. One transformer covers the lot: the bonus
//! stock (GUV, 20t brake van and the BR blue Class 47) plus the Class 20,
//! 25, 26, 27, 40 and 45 locos. Several IHH number formats are unknown or
//! only partly decodable; those fall back to a randomly drawn plausible
//! number instead of declining, because leaving an IHH vehicle in place
//! means a missing asset on load.

use anyhow::Result;
use rand::Rng;
use regex::Regex;

use super::locos::{digit_value, C47_BOUNDARIES};
use super::{
    allocate_from_dcsv, commit_number, matching_rule, rule_dcsv_path, ConsistContext, Outcome,
    Transformer,
};
use crate::catalog::{Catalog, SwapRule};
use crate::numbering::nearest_unused;
use crate::scenario::Vehicle;
use crate::session::Session;

pub struct Ihh;

impl Transformer for Ihh {
    fn name(&self) -> &'static str {
        "ihh"
    }

    fn attempt(
        &self,
        vehicle: &mut Vehicle,
        _ctx: &ConsistContext,
        catalog: &Catalog,
        session: &mut Session,
    ) -> Result<Outcome> {
        if let Some(outcome) = bonus(vehicle, catalog, session)? {
            return Ok(outcome);
        }
        if let Some(outcome) = class20(vehicle, catalog, session)? {
            return Ok(outcome);
        }
        if let Some(outcome) = class25(vehicle, catalog, session)? {
            return Ok(outcome);
        }
        if let Some(outcome) = type2(vehicle, catalog, session, "Class_26", "IHH_Class26", "26024")?
        {
            return Ok(outcome);
        }
        if let Some(outcome) = type2(vehicle, catalog, session, "Class_27", "IHH_Class27", "27024")?
        {
            return Ok(outcome);
        }
        if let Some(outcome) = class40(vehicle, catalog, session)? {
            return Ok(outcome);
        }
        if let Some(outcome) = class45(vehicle, catalog, session)? {
            return Ok(outcome);
        }
        Ok(Outcome::NoMatch)
    }
}

fn swap_identity(vehicle: &mut Vehicle, rule: &SwapRule) {
    vehicle.provider = rule.replace_provider.clone();
    vehicle.product = rule.replace_product.clone();
    vehicle.blueprint = rule.replace_blueprint.clone();
    vehicle.name = rule.replace_name.clone();
}

/// Bonus-pack stock: the GUV, the 20t brake van and the BR blue Class 47.
fn bonus(vehicle: &mut Vehicle, catalog: &Catalog, session: &mut Session) -> Result<Option<Outcome>> {
    let Some(rule) = matching_rule(catalog, "IHH_Bonus", vehicle) else {
        return Ok(None);
    };
    let lower = vehicle.blueprint.to_ascii_lowercase();
    let source_number = vehicle.number.clone();
    if lower.contains("guv") {
        let shaped = Regex::new("^[A-Z][0-9]{5}").expect("regex for GUV numbers");
        if !shaped.is_match(&vehicle.number) {
            vehicle.number = format!("M{}", session.rng.random_range(86078..=86984));
        }
    } else if lower.contains("20t") {
        // The IHH 20t brake van numbering is unknown; any pool number fits.
        vehicle.number = format!("####B{}#", session.rng.random_range(953676..=954520));
    } else if lower.contains("brush_4_bue") {
        return blue47(vehicle, rule, catalog, session).map(Some);
    } else {
        return Ok(None);
    }
    swap_identity(vehicle, rule);
    commit_number(session, &source_number, &vehicle.number.clone());
    Ok(Some(Outcome::Matched))
}

/// The bonus Class 47 crosses over into the BR blue subclass table; the
/// rule's replace-provider column keys the table group, the rows carry the
/// actual identity.
fn blue47(
    vehicle: &mut Vehicle,
    rule: &SwapRule,
    catalog: &Catalog,
    session: &mut Session,
) -> Result<Outcome> {
    let source_number = vehicle.number.clone();
    let mut target: i64 = session.rng.random_range(47001..=47298);
    let tops = Regex::new("^47#([0-9]{3})").expect("regex for IHH 47 TOPS");
    let pretops = Regex::new("^D#([0-9]{4})").expect("regex for IHH 47 pre-TOPS");
    if let Some(caps) = tops.captures(&source_number) {
        target = 47000 + digit_value(&caps[1]);
    } else if let Some(caps) = pretops.captures(&source_number) {
        // Pre-TOPS identity folded into the 47/0 range.
        target = 47001 + ((digit_value(&caps[1]) - 1) % 298);
    }
    let group = catalog.c47_numbers(&rule.replace_provider);
    let Some(loco) =
        nearest_unused(target, group, session.used(), C47_BOUNDARIES).or_else(|| group.first())
    else {
        return Ok(Outcome::NoMatch);
    };
    vehicle.provider = "Kuju".to_string();
    vehicle.product = "RailSimulator".to_string();
    vehicle.blueprint = loco.payload.blueprint.clone();
    vehicle.name = loco.payload.name.clone();
    vehicle.number = loco.number.clone();
    commit_number(session, &source_number, &vehicle.number.clone());
    Ok(Outcome::Matched)
}

fn class20(
    vehicle: &mut Vehicle,
    catalog: &Catalog,
    session: &mut Session,
) -> Result<Option<Outcome>> {
    if !vehicle.provider.contains("IHH") || !vehicle.product.contains("Class 20") {
        return Ok(None);
    }
    let Some(rule) = matching_rule(catalog, "IHH_Class20", vehicle) else {
        return Ok(None);
    };
    let source_number = vehicle.number.clone();
    let mut rv_num = session.rng.random_range(20001..=20126).to_string();
    let shaped = Regex::new("^.20#([0-9]{3})").expect("regex for IHH 20 numbers");
    if let Some(caps) = shaped.captures(&source_number) {
        let identity = digit_value(&caps[1]);
        if identity < 127 {
            rv_num = (20000 + identity).to_string();
        }
    }
    swap_identity(vehicle, rule);
    vehicle.number = rv_num;
    commit_number(session, &source_number, &vehicle.number.clone());
    Ok(Some(Outcome::Matched))
}

fn class25(
    vehicle: &mut Vehicle,
    catalog: &Catalog,
    session: &mut Session,
) -> Result<Option<Outcome>> {
    if !vehicle.provider.contains("IHH") || !vehicle.product.contains("Class_25") {
        return Ok(None);
    }
    let Some(rule) = matching_rule(catalog, "IHH_Class25", vehicle) else {
        return Ok(None);
    };
    let source_number = vehicle.number.clone();
    let mut rv_num = "251040000".to_string();
    let shaped = Regex::new("^(25[0-9]{3})(....)").expect("regex for IHH 25 numbers");
    if let Some(caps) = shaped.captures(&source_number) {
        let blind = Regex::new("[0-9][A-Z][0-9]{2}").expect("regex for headcode blinds");
        let headcode = if blind.is_match(&caps[2]) {
            caps[2].to_string()
        } else if rule.replace_provider == "RSderek" {
            // The RSderek pack spells an unset blind with mask characters.
            "@##@".to_string()
        } else {
            "0000".to_string()
        };
        rv_num = format!("{}{}", &caps[1], headcode);
    }
    swap_identity(vehicle, rule);
    vehicle.number = rv_num;
    commit_number(session, &source_number, &vehicle.number.clone());
    Ok(Some(Outcome::Matched))
}

/// The Scottish Type 2s (26 and 27) differ only in their TOPS prefix and
/// placeholder identity.
fn type2(
    vehicle: &mut Vehicle,
    catalog: &Catalog,
    session: &mut Session,
    product_marker: &str,
    label: &str,
    placeholder: &str,
) -> Result<Option<Outcome>> {
    if !vehicle.provider.contains("IHH") || !vehicle.product.contains(product_marker) {
        return Ok(None);
    }
    let Some(rule) = matching_rule(catalog, label, vehicle) else {
        return Ok(None);
    };
    let source_number = vehicle.number.clone();
    let prefix = &placeholder[..2];
    let shaped =
        Regex::new(&format!("^({prefix}[0-9]{{3}})")).expect("regex for IHH type 2 numbers");
    let rv_num = shaped
        .captures(&source_number)
        .map(|caps| caps[1].to_string())
        .unwrap_or_else(|| placeholder.to_string());
    swap_identity(vehicle, rule);
    vehicle.number = rv_num;
    commit_number(session, &source_number, &vehicle.number.clone());
    Ok(Some(Outcome::Matched))
}

fn class40(
    vehicle: &mut Vehicle,
    catalog: &Catalog,
    session: &mut Session,
) -> Result<Option<Outcome>> {
    if !vehicle.provider.contains("IHH") || !vehicle.product.contains("Class_40") {
        return Ok(None);
    }
    let Some(rule) = matching_rule(catalog, "IHH_Class40", vehicle) else {
        return Ok(None);
    };
    let source_number = vehicle.number.clone();
    let mut rv_num = source_number.clone();
    let shaped = Regex::new("^(40[0-9]{3})(....)").expect("regex for IHH 40 numbers");
    let pattern = rule.blueprint.as_str().to_ascii_lowercase();
    if let Some(caps) = shaped.captures(&source_number) {
        if pattern.contains("disc_blue") || pattern.contains("late_blue") {
            // Disc loco: nine-digit catalog body re-fronted with closed discs.
            let probe = format!("1111{}", &caps[1]);
            let nine = Regex::new("([0-9]{9})(.*)").expect("regex for nine digit entries");
            let ap_num = allocate_from_dcsv(
                catalog,
                session,
                &rule_dcsv_path(rule),
                &nine,
                digit_value(&probe),
                &probe,
            )?;
            if let Some(body) = ap_num.get(0..9) {
                rv_num = format!("{body}2222");
            }
        } else {
            let probe = format!("11111{}", &caps[1]);
            let ten = Regex::new("([0-9]{10})(.*)").expect("regex for ten digit entries");
            let ap_num = allocate_from_dcsv(
                catalog,
                session,
                &rule_dcsv_path(rule),
                &ten,
                digit_value(&probe),
                &probe,
            )?;
            let blind = Regex::new("[0-9][A-Z][0-9]{2}").expect("regex for headcode blinds");
            rv_num = match (blind.find(&caps[2]), ap_num.get(3..10)) {
                (Some(headcode), Some(body)) => format!("110{}{}", body, headcode.as_str()),
                _ => ap_num.clone(),
            };
        }
    }
    swap_identity(vehicle, rule);
    vehicle.number = rv_num;
    commit_number(session, &source_number, &vehicle.number.clone());
    Ok(Some(Outcome::Matched))
}

fn class45(
    vehicle: &mut Vehicle,
    catalog: &Catalog,
    session: &mut Session,
) -> Result<Option<Outcome>> {
    if !vehicle.provider.contains("IHH") || !vehicle.product.contains("Class_45") {
        return Ok(None);
    }
    let Some(rule) = matching_rule(catalog, "IHH_Class45", vehicle) else {
        return Ok(None);
    };
    let source_number = vehicle.number.clone();
    // The Peak packs cover both the 45 and 46 number series.
    let shaped = Regex::new("^(45|46)#([0-9]{3})").expect("regex for IHH 45 numbers");
    let rv_num = shaped
        .captures(&source_number)
        .map(|caps| format!("{}{}", &caps[1], &caps[2]))
        .unwrap_or_else(|| source_number.clone());
    swap_identity(vehicle, rule);
    vehicle.number = rv_num;
    commit_number(session, &source_number, &vehicle.number.clone());
    Ok(Some(Outcome::Matched))
}
