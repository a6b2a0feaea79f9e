//! Diesel and electric locomotive families.
//!
//! Most of these decompose a TOPS running number, pick the nearest unused
//! replacement from the pack's number catalog and re-dress the loco with a
//! randomized weathering level. The odd ones out are the Class 40 and 50,
//! whose source packs encode era, headcode and identity inside the number
//! string, and the Class 47, which allocates from the built-in subclass
//! table instead of a `.dcsv` catalog.

use anyhow::Result;
use regex::Regex;

use super::{
    allocate_from_dcsv, commit_number, matching_rule, randomize_weathering, rule_dcsv_path,
    ConsistContext, Outcome, Transformer,
};
use crate::catalog::{Catalog, SwapRule};
use crate::config::{C56Policy, C86Headcode};
use crate::data::{ap40_headcode_62_69, ap40_headcode_69_77, c56_depot, c56_sector, CL50_CHARS};
use crate::numbering::nearest_unused;
use crate::scenario::Vehicle;
use crate::session::Session;

/// Class 47 subclass cut-offs; an allocation never crosses one upwards.
pub(super) const C47_BOUNDARIES: &[i64] = &[47301, 47401, 47701];

fn loco_dcsv() -> Regex {
    Regex::new("([0-9]{5})(.*)").expect("regex for loco catalog entries")
}

/// Numeric value of the digits in a running number fragment.
pub(super) fn digit_value(number: &str) -> i64 {
    number
        .chars()
        .filter(|c| c.is_ascii_digit())
        .collect::<String>()
        .parse()
        .unwrap_or_default()
}

/// The `NumbersDcsv` column doubles as a literal running number for table
/// rows whose replacement has exactly one identity.
fn dcsv_or_literal(
    catalog: &Catalog,
    session: &mut Session,
    rule: &SwapRule,
    target: i64,
    fallback: &str,
) -> Result<String> {
    if rule.numbers_dcsv.contains("dcsv") {
        allocate_from_dcsv(
            catalog,
            session,
            &rule_dcsv_path(rule),
            &loco_dcsv(),
            target,
            fallback,
        )
    } else {
        Ok(rule.numbers_dcsv.clone())
    }
}

/// Configure full snow ploughs, dropping any plough setting already present.
fn add_ploughs(number: &str) -> String {
    let stripped = number
        .replace(";plough=none", "")
        .replace(";plough=outer", "")
        .replace(";plough=full", "");
    format!("{stripped};plough=full")
}

/// Show the RETB data cord equipment in the cab.
fn add_retb(number: &str) -> String {
    let stripped = number.replace(";datacord=retb", "");
    format!("{stripped};datacord=retb")
}

pub struct Class31;

impl Transformer for Class31 {
    fn name(&self) -> &'static str {
        "class31"
    }

    fn attempt(
        &self,
        vehicle: &mut Vehicle,
        _ctx: &ConsistContext,
        catalog: &Catalog,
        session: &mut Session,
    ) -> Result<Outcome> {
        let Some(rule) = matching_rule(catalog, "Class31", vehicle) else {
            return Ok(Outcome::NoMatch);
        };
        // Rows naming a W2 variant only ship two weathering levels.
        let levels = if rule.replace_blueprint.contains("W2") { 2 } else { 3 };
        let (blueprint, name) =
            randomize_weathering(&mut session.rng, &rule.replace_blueprint, &rule.replace_name, levels);
        vehicle.provider = rule.replace_provider.clone();
        vehicle.product = rule.replace_product.clone();
        vehicle.blueprint = blueprint;
        vehicle.name = name;

        let tops = Regex::new("(31[0-9]{3})").expect("regex for class 31 numbers");
        if let Some(caps) = tops.captures(&vehicle.number) {
            let source_number = vehicle.number.clone();
            vehicle.number = allocate_from_dcsv(
                catalog,
                session,
                &rule_dcsv_path(rule),
                &loco_dcsv(),
                digit_value(&caps[1]),
                &caps[1],
            )?;
            commit_number(session, &source_number, &vehicle.number.clone());
        }
        Ok(Outcome::Matched)
    }
}

pub struct Class37;

impl Transformer for Class37 {
    fn name(&self) -> &'static str {
        "class37"
    }

    fn attempt(
        &self,
        vehicle: &mut Vehicle,
        _ctx: &ConsistContext,
        catalog: &Catalog,
        session: &mut Session,
    ) -> Result<Outcome> {
        let Some(rule) = matching_rule(catalog, "Class37", vehicle) else {
            return Ok(Outcome::NoMatch);
        };
        let (blueprint, name) =
            randomize_weathering(&mut session.rng, &rule.replace_blueprint, &rule.replace_name, 3);
        vehicle.provider = rule.replace_provider.clone();
        vehicle.product = rule.replace_product.clone();
        vehicle.blueprint = blueprint;
        vehicle.name = name;

        let source_number = vehicle.number.clone();
        let mut rv_num = source_number.clone();
        let mut rv_tops = source_number.clone();

        let pretops =
            Regex::new("D([0-9]{4})([0-9][a-zA-Z][0-9]{2})").expect("regex for class 37 pre-TOPS");
        if let Some(caps) = pretops.captures(&source_number) {
            let headcode = caps[2].to_string();
            rv_num = allocate_from_dcsv(
                catalog,
                session,
                &rule_dcsv_path(rule),
                &loco_dcsv(),
                digit_value(&caps[1]),
                &caps[1],
            )?;
            // The catalog spells pre-TOPS entries with a blind placeholder.
            rv_num = rv_num.replace("____", &headcode);
        }
        let tops = Regex::new("(37[0-9]{3})(.*)").expect("regex for class 37 TOPS");
        if let Some(caps) = tops.captures(&source_number) {
            rv_tops = caps[1].to_string();
            rv_num = dcsv_or_literal(catalog, session, rule, digit_value(&rv_tops), &rv_tops)?;
        }
        let pattern = rule.blueprint.as_str();
        if pattern.contains("_wp") {
            rv_num = add_ploughs(&rv_num);
        }
        if rule.product == "WHL" || rule.product == "FortWilliamMallaig" {
            if pattern.contains("Large") {
                // The large-logo replacements carry the West Highland
                // terrier emblem, flagged `L=1` in the catalog entry.
                let westie =
                    Regex::new("(37[0-9]{3})(.*L=1.*)").expect("regex for large logo entries");
                rv_num = allocate_from_dcsv(
                    catalog,
                    session,
                    &rule_dcsv_path(rule),
                    &westie,
                    digit_value(&rv_tops),
                    &rv_tops,
                )?;
            }
            rv_num = add_ploughs(&add_retb(&rv_num));
            if pattern.contains("Default") {
                // Black headcode boxes at both ends.
                rv_num.push_str(";no1front=bch;no2front=bch");
            }
        }
        vehicle.number = rv_num;
        commit_number(session, &source_number, &vehicle.number.clone());
        Ok(Outcome::Matched)
    }
}

pub struct Class40;

impl Transformer for Class40 {
    fn name(&self) -> &'static str {
        "class40"
    }

    fn attempt(
        &self,
        vehicle: &mut Vehicle,
        _ctx: &ConsistContext,
        catalog: &Catalog,
        session: &mut Session,
    ) -> Result<Outcome> {
        if !vehicle.provider.contains("DT") || !vehicle.product.contains("DT_class40") {
            return Ok(Outcome::NoMatch);
        }
        let Some(rule) = matching_rule(catalog, "Class40", vehicle) else {
            return Ok(Outcome::NoMatch);
        };
        let source_number = vehicle.number.clone();
        vehicle.provider = rule.replace_provider.clone();
        vehicle.product = rule.replace_product.clone();
        vehicle.blueprint = rule.replace_blueprint.clone();
        vehicle.name = rule.replace_name.clone();

        let mut rv_num = source_number.clone();
        let half_yellow = vehicle.blueprint.to_ascii_lowercase().contains("halfyellow");

        // Pre-TOPS disc loco: bare four-digit D number, headcode implied by
        // the leading digit's era table.
        let pretops_disc =
            Regex::new("^([0-9])([0-9]{3})$").expect("regex for class 40 pre-TOPS disc");
        if let Some(caps) = pretops_disc.captures(&source_number) {
            if let Some(headcode) = ap40_headcode_62_69(caps[1].chars().next().unwrap_or('0')) {
                rv_num = pretops_number(
                    catalog, session, rule, &caps[2], headcode, half_yellow, &rv_num,
                )?;
            }
        }
        // Pre-TOPS headcode loco: the blind code is spelled out in front of
        // the three-digit identity.
        let pretops_headcode =
            Regex::new("^([0-9][a-z][0-9]{2})([0-9]{3})$").expect("regex for class 40 pre-TOPS headcode");
        if let Some(caps) = pretops_headcode.captures(&source_number) {
            let headcode = caps[1].to_uppercase();
            rv_num = pretops_number(
                catalog, session, rule, &caps[2], &headcode, half_yellow, &rv_num,
            )?;
        }
        // TOPS loco with domino markers: ten-digit catalog form.
        let tops_domino = Regex::new("^(40[0-9]{3})$").expect("regex for class 40 TOPS domino");
        if let Some(caps) = tops_domino.captures(&source_number) {
            let probe = format!("11111{}", &caps[1]);
            let ten = Regex::new("([0-9]{10})(.*)").expect("regex for ten digit entries");
            rv_num = allocate_from_dcsv(
                catalog,
                session,
                &rule_dcsv_path(rule),
                &ten,
                digit_value(&probe),
                &probe,
            )?;
        }
        // TOPS loco that kept its discs: nine digits plus a headcode mapped
        // from the era table.
        let tops_disc = Regex::new("^([0-9])(40[0-9]{3})$").expect("regex for class 40 TOPS disc");
        if let Some(caps) = tops_disc.captures(&source_number) {
            if let Some(headcode) = ap40_headcode_69_77(caps[1].chars().next().unwrap_or('0')) {
                let probe = format!("1111{}", &caps[2]);
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
                    rv_num = format!("{body}{headcode}");
                }
            }
        }
        vehicle.number = rv_num;
        commit_number(session, &source_number, &vehicle.number.clone());
        Ok(Outcome::Matched)
    }
}

/// Build a pre-TOPS Class 40 number: allocate the four-digit identity, then
/// re-front it with the yellow-warning-panel marker and append the headcode.
fn pretops_number(
    catalog: &Catalog,
    session: &mut Session,
    rule: &SwapRule,
    identity: &str,
    headcode: &str,
    half_yellow: bool,
    current: &str,
) -> Result<String> {
    let probe = format!("0{identity}");
    let four = Regex::new("([0-9]{4})(.*)").expect("regex for four digit entries");
    let ap_num = allocate_from_dcsv(
        catalog,
        session,
        &rule_dcsv_path(rule),
        &four,
        digit_value(&probe),
        &probe,
    )?;
    let Some(body) = ap_num.get(1..4) else {
        return Ok(current.to_string());
    };
    let front = if half_yellow { '1' } else { '0' };
    Ok(format!("{front}{body}{headcode}"))
}

pub struct Class47;

impl Transformer for Class47 {
    fn name(&self) -> &'static str {
        "class47"
    }

    fn attempt(
        &self,
        vehicle: &mut Vehicle,
        _ctx: &ConsistContext,
        catalog: &Catalog,
        session: &mut Session,
    ) -> Result<Outcome> {
        let Some(rule) = matching_rule(catalog, "Class47BRBlue", vehicle) else {
            return Ok(Outcome::NoMatch);
        };
        let tops = Regex::new("^(47[0-9]{3})").expect("regex for class 47 numbers");
        let Some(caps) = tops.captures(&vehicle.number) else {
            return Ok(Outcome::NoMatch);
        };
        // The rule's replace-provider column keys the subclass table group;
        // the table rows carry the actual identity.
        let group = catalog.c47_numbers(&rule.replace_provider);
        let target = digit_value(&caps[1]);
        let Some(loco) = nearest_unused(target, group, session.used(), C47_BOUNDARIES)
            .or_else(|| group.first())
        else {
            return Ok(Outcome::NoMatch);
        };
        let source_number = vehicle.number.clone();
        vehicle.provider = "Kuju".to_string();
        vehicle.product = "RailSimulator".to_string();
        vehicle.blueprint = loco.payload.blueprint.clone();
        vehicle.name = loco.payload.name.clone();
        vehicle.number = loco.number.clone();
        commit_number(session, &source_number, &vehicle.number.clone());
        Ok(Outcome::Matched)
    }
}

pub struct Class50;

impl Transformer for Class50 {
    fn name(&self) -> &'static str {
        "class50"
    }

    fn attempt(
        &self,
        vehicle: &mut Vehicle,
        _ctx: &ConsistContext,
        catalog: &Catalog,
        session: &mut Session,
    ) -> Result<Outcome> {
        if !vehicle.provider.contains("MichaelWhiteley") || !vehicle.product.contains("Class 50") {
            return Ok(Outcome::NoMatch);
        }
        let rules = catalog.rules("Class50");
        let Some((idx, rule)) = rules.iter().enumerate().find(|(_, r)| r.matches(vehicle)) else {
            return Ok(Outcome::NoMatch);
        };
        let source_number = vehicle.number.clone();
        let pretops = Regex::new("^([0-9]{3})([0-9][a-zA-Z][0-9]{2})")
            .expect("regex for class 50 pre-TOPS");

        let mut levels = 3;
        let rv_num = if idx == 0 {
            // The preserved GWR liveried 50007 only ships two weathering
            // variants and exactly one identity.
            levels = 2;
            "50007".to_string()
        } else if source_number.chars().count() == 1 {
            cl50_char_to_number(&source_number)
        } else if let Some(caps) = pretops.captures(&source_number) {
            // Headcode-box loco: carry the blind code to both ends.
            format!("D{};L=1;HC1={};HC2={}", &caps[1], &caps[2], &caps[2])
        } else {
            source_number.clone()
        };
        let (blueprint, name) = randomize_weathering(
            &mut session.rng,
            &rule.replace_blueprint,
            &rule.replace_name,
            levels,
        );
        vehicle.provider = rule.replace_provider.clone();
        vehicle.product = rule.replace_product.clone();
        vehicle.blueprint = blueprint;
        vehicle.name = name;
        vehicle.number = rv_num;
        commit_number(session, &source_number, &vehicle.number.clone());
        Ok(Outcome::Matched)
    }
}

/// The MeshTools pack identifies each loco by a single character; its
/// position in the identity table plus 50001 is the TOPS number. Unknown
/// characters get 50043.
fn cl50_char_to_number(number: &str) -> String {
    let Some(ch) = number.chars().next() else {
        return "50043".to_string();
    };
    match CL50_CHARS.iter().position(|c| *c == ch) {
        Some(idx) => format!("{}", 50001 + idx),
        None => "50043".to_string(),
    }
}

pub struct Class56 {
    pub policy: C56Policy,
}

impl Transformer for Class56 {
    fn name(&self) -> &'static str {
        "class56"
    }

    fn attempt(
        &self,
        vehicle: &mut Vehicle,
        _ctx: &ConsistContext,
        catalog: &Catalog,
        session: &mut Session,
    ) -> Result<Outcome> {
        if !vehicle.provider.contains("RSC") || !vehicle.product.contains("Class56Pack01") {
            return Ok(Outcome::NoMatch);
        }
        let Some(rule) = matching_rule(catalog, "Class56", vehicle) else {
            return Ok(Outcome::NoMatch);
        };
        // The source number leads with a sector logo letter and a depot
        // plaque letter; both map onto the replacement's own codes, or blank
        // out when no equivalent exists.
        let mut chars = vehicle.number.chars();
        let sector = chars.next().and_then(c56_sector).unwrap_or('*');
        let depot = chars.next().and_then(c56_depot).unwrap_or('*');
        if self.policy == C56Policy::RetainUnlessMatching && (sector == '*' || depot == '*') {
            return Ok(Outcome::NoMatch);
        }
        let source_number = vehicle.number.clone();
        let tops: String = source_number.chars().skip(2).take(5).collect();
        vehicle.provider = rule.replace_provider.clone();
        vehicle.product = rule.replace_product.clone();
        vehicle.blueprint = rule.replace_blueprint.clone();
        vehicle.name = rule.replace_name.clone();
        vehicle.number = format!("{sector}{depot}{tops}");
        commit_number(session, &source_number, &vehicle.number.clone());
        Ok(Outcome::Matched)
    }
}

/// Plain nearest-number families: match, swap the four identity fields,
/// renumber from the rule's catalog. The Class 66 and 68 differ only in
/// their TOPS prefix.
struct NearestNumbered {
    label: &'static str,
    prefix: &'static str,
    weathered: bool,
}

impl NearestNumbered {
    fn swap(
        &self,
        vehicle: &mut Vehicle,
        catalog: &Catalog,
        session: &mut Session,
    ) -> Result<Outcome> {
        let Some(rule) = matching_rule(catalog, self.label, vehicle) else {
            return Ok(Outcome::NoMatch);
        };
        vehicle.provider = rule.replace_provider.clone();
        vehicle.product = rule.replace_product.clone();
        if self.weathered {
            let (blueprint, name) = randomize_weathering(
                &mut session.rng,
                &rule.replace_blueprint,
                &rule.replace_name,
                3,
            );
            vehicle.blueprint = blueprint;
            vehicle.name = name;
        } else {
            vehicle.blueprint = rule.replace_blueprint.clone();
            vehicle.name = rule.replace_name.clone();
        }
        let tops =
            Regex::new(&format!("({}[0-9]{{3}}).*", self.prefix)).expect("regex for TOPS numbers");
        if let Some(caps) = tops.captures(&vehicle.number) {
            let source_number = vehicle.number.clone();
            vehicle.number =
                dcsv_or_literal(catalog, session, rule, digit_value(&caps[1]), &caps[1])?;
            commit_number(session, &source_number, &vehicle.number.clone());
        }
        Ok(Outcome::Matched)
    }
}

pub struct Class66;

impl Transformer for Class66 {
    fn name(&self) -> &'static str {
        "class66"
    }

    fn attempt(
        &self,
        vehicle: &mut Vehicle,
        _ctx: &ConsistContext,
        catalog: &Catalog,
        session: &mut Session,
    ) -> Result<Outcome> {
        NearestNumbered {
            label: "Class66",
            prefix: "66",
            weathered: false,
        }
        .swap(vehicle, catalog, session)
    }
}

pub struct Class67;

impl Transformer for Class67 {
    fn name(&self) -> &'static str {
        "class67"
    }

    fn attempt(
        &self,
        vehicle: &mut Vehicle,
        _ctx: &ConsistContext,
        catalog: &Catalog,
        session: &mut Session,
    ) -> Result<Outcome> {
        NearestNumbered {
            label: "Class67",
            prefix: "67",
            weathered: true,
        }
        .swap(vehicle, catalog, session)
    }
}

pub struct Class68;

impl Transformer for Class68 {
    fn name(&self) -> &'static str {
        "class68"
    }

    fn attempt(
        &self,
        vehicle: &mut Vehicle,
        _ctx: &ConsistContext,
        catalog: &Catalog,
        session: &mut Session,
    ) -> Result<Outcome> {
        NearestNumbered {
            label: "Class68",
            prefix: "68",
            weathered: false,
        }
        .swap(vehicle, catalog, session)
    }
}

pub struct Class86 {
    pub headcode: C86Headcode,
}

impl Transformer for Class86 {
    fn name(&self) -> &'static str {
        "class86"
    }

    fn attempt(
        &self,
        vehicle: &mut Vehicle,
        _ctx: &ConsistContext,
        catalog: &Catalog,
        session: &mut Session,
    ) -> Result<Outcome> {
        let rules = catalog.rules("Class86");
        let Some(rule) = rules.iter().find(|r| r.matches(vehicle)) else {
            return Ok(Outcome::NoMatch);
        };
        let source_number = vehicle.number.clone();

        // Plain TOPS number, no headcode box: weathered straight swap.
        let tops = Regex::new("^(86[0-9]{3}).*").expect("regex for class 86 TOPS");
        if let Some(caps) = tops.captures(&source_number) {
            let (blueprint, name) = randomize_weathering(
                &mut session.rng,
                &rule.replace_blueprint,
                &rule.replace_name,
                3,
            );
            vehicle.provider = rule.replace_provider.clone();
            vehicle.product = rule.replace_product.clone();
            vehicle.blueprint = blueprint;
            vehicle.name = name;
            vehicle.number =
                dcsv_or_literal(catalog, session, rule, digit_value(&caps[1]), &caps[1])?;
            commit_number(session, &source_number, &vehicle.number.clone());
            return Ok(Outcome::Matched);
        }

        // TOPS number with a headcode box; the replacement depends on the
        // configured headcode treatment.
        let boxed = Regex::new("([0-9][a-zA-Z][0-9]{2})(86[0-9]{3})")
            .expect("regex for class 86 headcode");
        if let Some(caps) = boxed.captures(&source_number) {
            let headcode = caps[1].to_string();
            let target = digit_value(&caps[2]);
            match self.headcode {
                C86Headcode::Skip => {
                    // Consume the vehicle unchanged so no later family
                    // second-guesses the choice.
                    return Ok(Outcome::Matched);
                }
                C86Headcode::Blinds => {
                    let Some(blinds) = rules.first() else {
                        return Ok(Outcome::NoMatch);
                    };
                    vehicle.provider = blinds.replace_provider.clone();
                    vehicle.product = blinds.replace_product.clone();
                    vehicle.blueprint = blinds.replace_blueprint.clone();
                    vehicle.name = blinds.replace_name.clone();
                    let allocated = allocate_from_dcsv(
                        catalog,
                        session,
                        &rule_dcsv_path(blinds),
                        &loco_dcsv(),
                        target,
                        &caps[2],
                    )?;
                    // The catalog entries carry blank blinds; set the code.
                    vehicle.number = allocated.replace("0O00", &headcode);
                    commit_number(session, &source_number, &vehicle.number.clone());
                    return Ok(Outcome::Matched);
                }
                C86Headcode::PlatedBox => {
                    // Low- and raised-pantograph sources swap for different
                    // plated rows; numbers always come from the first
                    // plated row's catalog.
                    let row = if rule.blueprint.as_str().contains("panto_low") {
                        rules.get(4)
                    } else {
                        rules.get(6)
                    };
                    let (Some(row), Some(numbers_row)) = (row, rules.get(4)) else {
                        return Ok(Outcome::NoMatch);
                    };
                    let (blueprint, name) = randomize_weathering(
                        &mut session.rng,
                        &row.replace_blueprint,
                        &row.replace_name,
                        3,
                    );
                    vehicle.provider = row.replace_provider.clone();
                    vehicle.product = row.replace_product.clone();
                    vehicle.blueprint = blueprint;
                    vehicle.name = name;
                    vehicle.number = allocate_from_dcsv(
                        catalog,
                        session,
                        &rule_dcsv_path(numbers_row),
                        &loco_dcsv(),
                        target,
                        &caps[2],
                    )?;
                    commit_number(session, &source_number, &vehicle.number.clone());
                    return Ok(Outcome::Matched);
                }
            }
        }
        Ok(Outcome::NoMatch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::Preload;
    use std::fs;
    use std::path::Path;

    fn dcsv(names: &[&str]) -> String {
        let items: String = names
            .iter()
            .map(|n| format!("<CSVItem><cCSVItem><Name>{n}</Name></cCSVItem></CSVItem>"))
            .collect();
        format!("<cCSVContainer>{items}</cCSVContainer>")
    }

    fn write_dcsv(root: &Path, relative: &str, names: &[&str]) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, dcsv(names)).unwrap();
    }

    fn loco_catalog() -> (tempfile::TempDir, Catalog) {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("Replacements.csv"),
            "Label,Provider,Product,Blueprint,ReplaceProvider,ReplaceProduct,ReplaceBlueprint,ReplaceName,NumbersDcsv\n\
             Class31,RSC,Class31Pack,Class31\\.xml,AP,Class31Pack,RailVehicles\\31\\C31_W1.xml,AP Class 31 W1,RailVehicles/31/C31.dcsv\n\
             Class37,AP,WHL,C37_Default\\.xml,AP,Class37Pack,RailVehicles\\37\\C37_W1.xml,AP Class 37 W1,RailVehicles/37/C37.dcsv\n\
             Class40,DT,DT_class40,Class40\\.xml,AP,Class40Pack,RailVehicles\\40\\C40.xml,AP Class 40,RailVehicles/40/C40.dcsv\n\
             Class47BRBlue,RSC,Class47Pack01,Class47\\.xml,FullYellow,,,,\n\
             Class50,MichaelWhiteley,Class 50,C50_GWR\\.xml,AP,Class50Pack,RailVehicles\\50\\C50_GWR_W2.xml,AP Class 50 GWR W2,\n\
             Class50,MichaelWhiteley,Class 50,C50_BR\\.xml,AP,Class50Pack,RailVehicles\\50\\C50_BR_W1.xml,AP Class 50 BR W1,\n\
             Class56,RSC,Class56Pack01,Class56\\.xml,AP,Class56Pack,RailVehicles\\56\\C56.xml,AP Class 56,\n\
             Class66,EWS,Class66Pack,Class66\\.xml,AP,Class66Pack,RailVehicles\\66\\C66.xml,AP Class 66,RailVehicles/66/C66.dcsv\n\
             Class86,VP,Class86Blinds,NeverMatches\\.xml,VP,Class86Blinds,RailVehicles\\86\\C86_Blinds.xml,VP Class 86 Blinds,RailVehicles/86/C86.dcsv\n\
             Class86,RSC,Class86Pack,Class86\\.xml,AP,Class86Pack,RailVehicles\\86\\C86_W1.xml,AP Class 86 W1,RailVehicles/86/C86.dcsv\n",
        )
        .unwrap();
        fs::write(
            dir.path().join("Class47BRBlue_numbers.csv"),
            "FullYellow,47290,a,47290,BR Blue 47290,RailVehicles\\47\\47290.xml\n\
             FullYellow,47310,a,47310,BR Blue 47310,RailVehicles\\47\\47310.xml\n",
        )
        .unwrap();
        write_dcsv(dir.path(), "Assets/AP/Class31Pack/RailVehicles/31/C31.dcsv", &["31101", "31105"]);
        write_dcsv(dir.path(), "Assets/AP/Class37Pack/RailVehicles/37/C37.dcsv", &["37025;L=1", "37043"]);
        write_dcsv(
            dir.path(),
            "Assets/AP/Class40Pack/RailVehicles/40/C40.dcsv",
            &["111140122", "0214"],
        );
        write_dcsv(dir.path(), "Assets/AP/Class66Pack/RailVehicles/66/C66.dcsv", &["66001", "66100"]);
        write_dcsv(
            dir.path(),
            "Assets/VP/Class86Blinds/RailVehicles/86/C86.dcsv",
            &["86245;0O00", "86250;0O00"],
        );
        let catalog = Catalog::load(dir.path(), dir.path()).unwrap();
        (dir, catalog)
    }

    fn loco(provider: &str, product: &str, blueprint: &str, number: &str) -> Vehicle {
        Vehicle {
            provider: provider.to_string(),
            product: product.to_string(),
            blueprint: blueprint.to_string(),
            name: "loco".to_string(),
            number: number.to_string(),
            loaded: Preload::NotApplicable,
            flipped: false,
            followers: Vec::new(),
        }
    }

    #[test]
    fn class31_renumbers_and_weathers() {
        let (_dir, catalog) = loco_catalog();
        let mut session = Session::new(Some(2));
        let mut v = loco("RSC", "Class31Pack", "RailVehicles\\Class31.xml", "31102");
        let outcome = Class31
            .attempt(&mut v, &ConsistContext::loose(), &catalog, &mut session)
            .unwrap();
        assert_eq!(outcome, Outcome::Matched);
        assert_eq!(v.number, "31101", "gap 1 below beats gap 3 above");
        let level = &v.blueprint[v.blueprint.len() - 6..v.blueprint.len() - 4];
        assert!(matches!(level, "W1" | "W2" | "W3"));
        assert!(v.name.ends_with(level));
    }

    #[test]
    fn class37_west_highland_gets_retb_ploughs_and_black_boxes() {
        let (_dir, catalog) = loco_catalog();
        let mut session = Session::new(Some(2));
        let mut v = loco("AP", "WHL", "RailVehicles\\C37_Default.xml", "37043");
        Class37
            .attempt(&mut v, &ConsistContext::loose(), &catalog, &mut session)
            .unwrap();
        assert_eq!(
            v.number,
            "37043;datacord=retb;plough=full;no1front=bch;no2front=bch"
        );
    }

    #[test]
    fn class40_tops_disc_builds_nine_digit_number_with_headcode() {
        let (_dir, catalog) = loco_catalog();
        let mut session = Session::new(Some(2));
        let mut v = loco("DT", "DT_class40", "RailVehicles\\Class40.xml", "240135");
        Class40
            .attempt(&mut v, &ConsistContext::loose(), &catalog, &mut session)
            .unwrap();
        // The nine-digit catalog body keeps its marker digits; the era table
        // supplies the headcode for leading digit 2.
        assert_eq!(v.number, "1111401222E43");
        assert_eq!(session.renumbered("240135"), Some("1111401222E43"));
    }

    #[test]
    fn class47_respects_subclass_boundary() {
        let (_dir, catalog) = loco_catalog();
        let mut session = Session::new(Some(2));
        let mut v = loco(
            "RSC",
            "Class47Pack01",
            "RailVehicles\\Class47.xml",
            "47298",
        );
        let outcome = Class47
            .attempt(&mut v, &ConsistContext::loose(), &catalog, &mut session)
            .unwrap();
        assert_eq!(outcome, Outcome::Matched);
        // 47310 is numerically closer but sits beyond the 47301 cut-off.
        assert_eq!(v.number, "47290");
        assert_eq!(v.provider, "Kuju");
        assert_eq!(v.product, "RailSimulator");
        assert_eq!(v.blueprint, "RailVehicles\\47\\47290.xml");
    }

    #[test]
    fn class47_without_tops_number_declines() {
        let (_dir, catalog) = loco_catalog();
        let mut session = Session::new(Some(2));
        let mut v = loco("RSC", "Class47Pack01", "RailVehicles\\Class47.xml", "D1100");
        let outcome = Class47
            .attempt(&mut v, &ConsistContext::loose(), &catalog, &mut session)
            .unwrap();
        assert_eq!(outcome, Outcome::NoMatch);
    }

    #[test]
    fn class50_single_character_identity() {
        let (_dir, catalog) = loco_catalog();
        let mut session = Session::new(Some(2));
        let mut v = loco(
            "MichaelWhiteley",
            "Class 50",
            "RailVehicles\\C50_BR.xml",
            "B",
        );
        Class50
            .attempt(&mut v, &ConsistContext::loose(), &catalog, &mut session)
            .unwrap();
        assert_eq!(v.number, "50012");
        let mut unknown = loco(
            "MichaelWhiteley",
            "Class 50",
            "RailVehicles\\C50_BR.xml",
            "^",
        );
        Class50
            .attempt(&mut unknown, &ConsistContext::loose(), &catalog, &mut session)
            .unwrap();
        assert_eq!(unknown.number, "50043");
    }

    #[test]
    fn class50_headcode_box_carries_blinds() {
        let (_dir, catalog) = loco_catalog();
        let mut session = Session::new(Some(2));
        let mut v = loco(
            "MichaelWhiteley",
            "Class 50",
            "RailVehicles\\C50_BR.xml",
            "0351V70",
        );
        Class50
            .attempt(&mut v, &ConsistContext::loose(), &catalog, &mut session)
            .unwrap();
        assert_eq!(v.number, "D035;L=1;HC1=1V70;HC2=1V70");
    }

    #[test]
    fn class56_maps_sector_and_depot() {
        let (_dir, catalog) = loco_catalog();
        let mut session = Session::new(Some(2));
        let mut v = loco(
            "RSC",
            "Class56Pack01",
            "RailVehicles\\Class56.xml",
            "aG56032",
        );
        Class56 {
            policy: C56Policy::NearestNumbered,
        }
        .attempt(&mut v, &ConsistContext::loose(), &catalog, &mut session)
        .unwrap();
        assert_eq!(v.number, "dC56032");
    }

    #[test]
    fn class56_retain_policy_declines_unmapped_markings() {
        let (_dir, catalog) = loco_catalog();
        let mut session = Session::new(Some(2));
        let mut v = loco(
            "RSC",
            "Class56Pack01",
            "RailVehicles\\Class56.xml",
            "zZ56032",
        );
        let outcome = Class56 {
            policy: C56Policy::RetainUnlessMatching,
        }
        .attempt(&mut v, &ConsistContext::loose(), &catalog, &mut session)
        .unwrap();
        assert_eq!(outcome, Outcome::NoMatch);
        // The permissive policy blanks both markings instead.
        Class56 {
            policy: C56Policy::NearestNumbered,
        }
        .attempt(&mut v, &ConsistContext::loose(), &catalog, &mut session)
        .unwrap();
        assert_eq!(v.number, "**56032");
    }

    #[test]
    fn class66_allocates_nearest() {
        let (_dir, catalog) = loco_catalog();
        let mut session = Session::new(Some(2));
        let mut v = loco("EWS", "Class66Pack", "RailVehicles\\Class66.xml", "66004");
        Class66
            .attempt(&mut v, &ConsistContext::loose(), &catalog, &mut session)
            .unwrap();
        assert_eq!(v.number, "66001");
    }

    #[test]
    fn class86_blinds_sets_headcode_into_catalog_number() {
        let (_dir, catalog) = loco_catalog();
        let mut session = Session::new(Some(2));
        let mut v = loco(
            "RSC",
            "Class86Pack",
            "RailVehicles\\Class86.xml",
            "5M4286245",
        );
        let outcome = Class86 {
            headcode: C86Headcode::Blinds,
        }
        .attempt(&mut v, &ConsistContext::loose(), &catalog, &mut session)
        .unwrap();
        assert_eq!(outcome, Outcome::Matched);
        assert_eq!(v.product, "Class86Blinds");
        assert_eq!(v.number, "86245;5M42");
    }

    #[test]
    fn class86_skip_consumes_headcode_loco_unchanged() {
        let (_dir, catalog) = loco_catalog();
        let mut session = Session::new(Some(2));
        let mut v = loco(
            "RSC",
            "Class86Pack",
            "RailVehicles\\Class86.xml",
            "5M4286245",
        );
        let before = v.clone();
        let outcome = Class86 {
            headcode: C86Headcode::Skip,
        }
        .attempt(&mut v, &ConsistContext::loose(), &catalog, &mut session)
        .unwrap();
        assert_eq!(outcome, Outcome::Matched);
        assert_eq!(v, before);
    }
}
