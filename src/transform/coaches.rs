//! Mk1 and Mk2 coach families.
//!
//! All three families decompose the source number into an optional region
//! prefix and a 4-5 digit core, re-expressed in the replacement pack's
//! `;R=`/`;L=` suffix notation. Branding suffixes are chosen by substring
//! checks against the source display name.

use anyhow::Result;
use regex::Regex;

use super::{
    allocate_from_dcsv, commit_number, matching_rule, rule_dcsv_path, ConsistContext, Outcome,
    Transformer,
};
use crate::catalog::Catalog;
use crate::scenario::Vehicle;
use crate::session::Session;

fn coach_number() -> Regex {
    Regex::new("([A-Za-z]{0,2})([0-9]{4,5})").expect("regex for coach numbers")
}

fn coach_dcsv() -> Regex {
    Regex::new("([0-9]{4,5})(.*)").expect("regex for coach catalog entries")
}

/// `;R=` region suffix for a source region prefix: the four real regions
/// pass through, a missing prefix becomes the neutral `Z` region, anything
/// else gets no region suffix at all.
fn region_suffix(region: &str) -> String {
    let region = region.to_uppercase();
    match region.as_str() {
        "E" | "S" | "W" | "SC" => format!(";R={region}"),
        "" => ";R=Z".to_string(),
        _ => String::new(),
    }
}

pub struct Mk1;

impl Transformer for Mk1 {
    fn name(&self) -> &'static str {
        "mk1"
    }

    fn attempt(
        &self,
        vehicle: &mut Vehicle,
        _ctx: &ConsistContext,
        catalog: &Catalog,
        session: &mut Session,
    ) -> Result<Outcome> {
        let Some(rule) = matching_rule(catalog, "Mk1", vehicle) else {
            return Ok(Outcome::NoMatch);
        };
        let source_name = vehicle.name.clone();
        vehicle.provider = rule.replace_provider.clone();
        vehicle.product = rule.replace_product.clone();
        vehicle.blueprint = rule.replace_blueprint.clone();
        vehicle.name = rule.replace_name.clone();

        // A coach whose number defies the region+digits shape is still
        // swapped; it just keeps its number.
        if let Some(caps) = coach_number().captures(&vehicle.number) {
            let source_number = vehicle.number.clone();
            let core = caps[2].to_string();
            let mut suffix = region_suffix(&caps[1]);
            let core = allocate_from_dcsv(
                catalog,
                session,
                &rule_dcsv_path(rule),
                &coach_dcsv(),
                core.parse().unwrap_or_default(),
                &core,
            )?;
            // Branding markers in the source name map to the pack's livery
            // suffix codes.
            if source_name.contains(" (Newspapers)") {
                suffix.push_str(";L=6");
            } else if source_name.contains(" (Parcels)") {
                suffix.push_str(";L=3");
            } else if source_name.contains(" (ScotRail)") {
                suffix = ";R=SC;L=5".to_string();
            } else if source_name.contains(" (Swallow)") {
                suffix.push_str(";L=2");
            } else if source_name.contains("BR Blue/Grey (NSE)") {
                suffix = ";L=2".to_string();
            } else if source_name.contains(" (unbranded)") {
                suffix = ";L=0".to_string();
            }
            vehicle.number = format!("{core}{suffix}");
            commit_number(session, &source_number, &vehicle.number.clone());
        }
        Ok(Outcome::Matched)
    }
}

pub struct Mk2ac;

impl Transformer for Mk2ac {
    fn name(&self) -> &'static str {
        "mk2ac"
    }

    fn attempt(
        &self,
        vehicle: &mut Vehicle,
        _ctx: &ConsistContext,
        catalog: &Catalog,
        session: &mut Session,
    ) -> Result<Outcome> {
        let Some(rule) = matching_rule(catalog, "Mk2ac", vehicle) else {
            return Ok(Outcome::NoMatch);
        };
        let source_name = vehicle.name.clone();
        vehicle.provider = rule.replace_provider.clone();
        vehicle.product = rule.replace_product.clone();
        vehicle.blueprint = rule.replace_blueprint.clone();
        vehicle.name = rule.replace_name.clone();

        if let Some(caps) = coach_number().captures(&vehicle.number) {
            let source_number = vehicle.number.clone();
            let core = caps[2].to_string();
            let mut suffix = region_suffix(&caps[1]);
            if source_name.contains("BR Blue/Grey NSE") {
                suffix.push_str(";L=2");
            } else if source_name.contains("VintageTrains") {
                suffix.push_str(";L=0");
            } else if source_name.contains("BR Blue/Grey ScotRail") {
                // A non-Scottish region moves to SC; the regionless form
                // stays regionless.
                suffix = if suffix.starts_with(";R=") && !suffix.starts_with(";R=Z") {
                    ";R=SC;L=3".to_string()
                } else {
                    ";R=Z;L=3".to_string()
                };
            }
            vehicle.number = format!("{core}{suffix}");
            commit_number(session, &source_number, &vehicle.number.clone());
        }
        Ok(Outcome::Matched)
    }
}

pub struct Mk2df;

impl Transformer for Mk2df {
    fn name(&self) -> &'static str {
        "mk2df"
    }

    fn attempt(
        &self,
        vehicle: &mut Vehicle,
        _ctx: &ConsistContext,
        catalog: &Catalog,
        session: &mut Session,
    ) -> Result<Outcome> {
        let Some(rule) = matching_rule(catalog, "Mk2df", vehicle) else {
            return Ok(Outcome::NoMatch);
        };
        vehicle.provider = rule.replace_provider.clone();
        vehicle.product = rule.replace_product.clone();
        vehicle.blueprint = rule.replace_blueprint.clone();
        vehicle.name = rule.replace_name.clone();

        let digits = Regex::new("([0-9]{4,5})").expect("regex for coach digits");
        if let Some(caps) = digits.captures(&vehicle.number) {
            let source_number = vehicle.number.clone();
            vehicle.number = format!("{};R=Z", &caps[1]);
            commit_number(session, &source_number, &vehicle.number.clone());
        }
        Ok(Outcome::Matched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::Preload;
    use std::fs;

    fn coach(number: &str, name: &str) -> Vehicle {
        Vehicle {
            provider: "RSC".to_string(),
            product: "Mk1Pack".to_string(),
            blueprint: "RailVehicles\\Coach\\Mk1CK.xml".to_string(),
            name: name.to_string(),
            number: number.to_string(),
            loaded: Preload::NotApplicable,
            flipped: false,
            followers: Vec::new(),
        }
    }

    fn catalog_with_dcsv() -> (tempfile::TempDir, Catalog) {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("Replacements.csv"),
            "Label,Provider,Product,Blueprint,ReplaceProvider,ReplaceProduct,ReplaceBlueprint,ReplaceName,NumbersDcsv\n\
             Mk1,RSC,Mk1Pack,Mk1CK\\.xml,AP,Mk1Vol1,RailVehicles\\Coach\\Mk1CK.xml,AP Mk1 CK,Mk1.dcsv\n\
             Mk2ac,RSC,Mk2Pack,Mk2TSO\\.xml,AP,Mk2ACPack,RailVehicles\\Coach\\Mk2TSO.xml,AP Mk2 TSO,\n\
             Mk2df,RSC,Mk2ePack,Mk2eTSO\\.xml,AP,Mk2DFPack,RailVehicles\\Coach\\Mk2eTSO.xml,AP Mk2e TSO,\n",
        )
        .unwrap();
        fs::write(dir.path().join("Class47BRBlue_numbers.csv"), "").unwrap();
        let pack = dir.path().join("Assets/AP/Mk1Vol1");
        fs::create_dir_all(&pack).unwrap();
        fs::write(
            pack.join("Mk1.dcsv"),
            "<cCSVContainer>\
             <CSVItem><cCSVItem><Name>24800</Name></cCSVItem></CSVItem>\
             <CSVItem><cCSVItem><Name>24805</Name></cCSVItem></CSVItem>\
             </cCSVContainer>",
        )
        .unwrap();
        let catalog = Catalog::load(dir.path(), dir.path()).unwrap();
        (dir, catalog)
    }

    #[test]
    fn mk1_renumbers_with_region_suffix() {
        let (_dir, catalog) = catalog_with_dcsv();
        let mut session = Session::new(Some(1));
        let mut v = coach("W24801", "BR Mk1 CK");
        let outcome = Mk1
            .attempt(&mut v, &ConsistContext::loose(), &catalog, &mut session)
            .unwrap();
        assert_eq!(outcome, Outcome::Matched);
        assert_eq!(v.provider, "AP");
        assert_eq!(v.number, "24800;R=W");
        assert_eq!(session.renumbered("W24801"), Some("24800;R=W"));
    }

    #[test]
    fn mk1_missing_region_becomes_z() {
        let (_dir, catalog) = catalog_with_dcsv();
        let mut session = Session::new(Some(1));
        let mut v = coach("24805", "BR Mk1 CK (unbranded)");
        Mk1.attempt(&mut v, &ConsistContext::loose(), &catalog, &mut session)
            .unwrap();
        // Unbranded replaces the whole suffix, region included.
        assert_eq!(v.number, "24805;L=0");
    }

    #[test]
    fn mk1_odd_number_swaps_without_renumbering() {
        let (_dir, catalog) = catalog_with_dcsv();
        let mut session = Session::new(Some(1));
        let mut v = coach("???", "BR Mk1 CK");
        let outcome = Mk1
            .attempt(&mut v, &ConsistContext::loose(), &catalog, &mut session)
            .unwrap();
        assert_eq!(outcome, Outcome::Matched);
        assert_eq!(v.number, "???");
        assert!(session.pairs().is_empty());
    }

    #[test]
    fn mk2ac_scotrail_rewrites_region() {
        let (_dir, catalog) = catalog_with_dcsv();
        let mut session = Session::new(Some(1));
        let mut v = coach("E5232", "BR Blue/Grey ScotRail Mk2 TSO");
        v.product = "Mk2Pack".to_string();
        v.blueprint = "RailVehicles\\Coach\\Mk2TSO.xml".to_string();
        Mk2ac
            .attempt(&mut v, &ConsistContext::loose(), &catalog, &mut session)
            .unwrap();
        assert_eq!(v.number, "5232;R=SC;L=3");
    }

    #[test]
    fn mk2df_always_uses_neutral_region() {
        let (_dir, catalog) = catalog_with_dcsv();
        let mut session = Session::new(Some(1));
        let mut v = coach("SC5701", "BR Mk2e TSO");
        v.product = "Mk2ePack".to_string();
        v.blueprint = "RailVehicles\\Coach\\Mk2eTSO.xml".to_string();
        Mk2df
            .attempt(&mut v, &ConsistContext::loose(), &catalog, &mut session)
            .unwrap();
        assert_eq!(v.number, "5701;R=Z");
    }

    #[test]
    fn mk2df_unchanged_number_reserves_without_pair() {
        let (_dir, catalog) = catalog_with_dcsv();
        let mut session = Session::new(Some(1));
        // Already in the replacement notation; the rewrite lands on itself.
        let mut v = coach("5701;R=Z", "BR Mk2e TSO");
        v.product = "Mk2ePack".to_string();
        v.blueprint = "RailVehicles\\Coach\\Mk2eTSO.xml".to_string();
        Mk2df
            .attempt(&mut v, &ConsistContext::loose(), &catalog, &mut session)
            .unwrap();
        assert_eq!(v.number, "5701;R=Z");
        assert!(session.pairs().is_empty());
        assert!(session.used().contains("5701;R=Z"));
    }

    #[test]
    fn unknown_family_declines() {
        let (_dir, catalog) = catalog_with_dcsv();
        let mut session = Session::new(Some(1));
        let mut v = coach("24801", "BR Mk1 CK");
        v.product = "SomethingElse".to_string();
        let outcome = Mk1
            .attempt(&mut v, &ConsistContext::loose(), &catalog, &mut session)
            .unwrap();
        assert_eq!(outcome, Outcome::NoMatch);
    }
}
