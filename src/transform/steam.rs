//! Steam-era families: the Stanier Black 5 and the Maunsell corridor
//! coaches.
//!
//! Both source packs are swapped for payware whose number strings encode
//! more than the running number. The Black 5 appends a lamp-bracket marker,
//! the Maunsell coaches wrap the running number in the Southern `S` prefix
//! notation and model their gangway at the opposite end, so every swap also
//! turns the coach around.

use anyhow::Result;
use regex::Regex;

use super::locos::digit_value;
use super::{commit_number, matching_rule, ConsistContext, Outcome, Transformer};
use crate::catalog::Catalog;
use crate::scenario::Vehicle;
use crate::session::Session;

pub struct Black5;

impl Transformer for Black5 {
    fn name(&self) -> &'static str {
        "black5"
    }

    fn attempt(
        &self,
        vehicle: &mut Vehicle,
        _ctx: &ConsistContext,
        catalog: &Catalog,
        session: &mut Session,
    ) -> Result<Outcome> {
        let Some(rule) = matching_rule(catalog, "Black5", vehicle) else {
            return Ok(Outcome::NoMatch);
        };
        let source_number = vehicle.number.clone();
        vehicle.provider = rule.replace_provider.clone();
        vehicle.product = rule.replace_product.clone();
        vehicle.blueprint = rule.replace_blueprint.clone();
        vehicle.name = rule.replace_name.clone();

        // Optional lamp-bracket region letter ahead of the 4xxxx number.
        let shaped = Regex::new("([A-Z]?)4([0-9]{4})").expect("regex for black 5 numbers");
        if let Some(caps) = shaped.captures(&source_number) {
            let lamp = if caps[1].is_empty() { "B" } else { &caps[1] };
            let identity = caps[2].to_string();
            // 45000-45224 ran domeless; they ship in their own pack.
            if (5000..=5224).contains(&digit_value(&identity)) {
                vehicle.product = "Black5Pack03".to_string();
                vehicle.name = format!("{} Domeless", rule.replace_name);
            }
            vehicle.number = format!("{identity}#{lamp}N");
            commit_number(session, &source_number, &vehicle.number.clone());
        }
        Ok(Outcome::Matched)
    }
}

pub struct Maunsell;

impl Transformer for Maunsell {
    fn name(&self) -> &'static str {
        "maunsell"
    }

    fn attempt(
        &self,
        vehicle: &mut Vehicle,
        _ctx: &ConsistContext,
        catalog: &Catalog,
        session: &mut Session,
    ) -> Result<Outcome> {
        let Some(rule) = matching_rule(catalog, "MaunsellCoach", vehicle) else {
            return Ok(Outcome::NoMatch);
        };
        let source_number = vehicle.number.clone();
        vehicle.provider = rule.replace_provider.clone();
        vehicle.product = rule.replace_product.clone();
        vehicle.blueprint = rule.replace_blueprint.clone();
        vehicle.name = rule.replace_name.clone();

        let tail = |n: usize| {
            source_number
                .get(source_number.len().saturating_sub(n)..)
                .unwrap_or(source_number.as_str())
        };
        // The source pack displays only the trailing four characters, so
        // that fragment is what other vehicles carry and what propagation
        // must match on.
        let old_key = tail(4).to_string();
        let bp = &rule.replace_blueprint;
        if bp.contains("TKD2001") {
            vehicle.number = format!("S{}S", tail(3));
        } else if bp.contains("CKD2301") {
            vehicle.number = format!("S{}S", tail(4));
        } else if bp.contains("BCKD2401") || bp.contains("BTKD2101") {
            // Brake-ended diagrams carry a set number after the coach number.
            if let (Some(mid), Some(head)) = (source_number.get(3..7), source_number.get(0..3)) {
                vehicle.number = format!("S{mid}S{head}");
            }
        }
        commit_number(session, &old_key, &vehicle.number.clone());

        // The replacement models its gangway at the other end; the
        // orientation flag and every follower direction invert together so
        // the consist stays coupled.
        vehicle.flipped = !vehicle.flipped;
        for follower in &mut vehicle.followers {
            *follower = follower.invert();
        }
        Ok(Outcome::Matched)
    }
}
