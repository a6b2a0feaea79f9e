//! User-defined substitutions, the last family in the chain.
//!
//! Rows come from the user's own table and swap identity only; anything
//! needing renumbering belongs in a built-in family.

use anyhow::Result;

use super::{ConsistContext, Outcome, Transformer};
use crate::catalog::Catalog;
use crate::scenario::Vehicle;
use crate::session::Session;

pub struct UserDefined;

impl Transformer for UserDefined {
    fn name(&self) -> &'static str {
        "user"
    }

    fn attempt(
        &self,
        vehicle: &mut Vehicle,
        _ctx: &ConsistContext,
        catalog: &Catalog,
        _session: &mut Session,
    ) -> Result<Outcome> {
        let Some(rule) = catalog.user_rules().iter().find(|r| r.matches(vehicle)) else {
            return Ok(Outcome::NoMatch);
        };
        vehicle.provider = rule.replace_provider.clone();
        vehicle.product = rule.replace_product.clone();
        vehicle.blueprint = rule.replace_blueprint.clone();
        vehicle.name = rule.replace_name.clone();
        Ok(Outcome::Matched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::Preload;
    use std::fs;

    #[test]
    fn user_rule_swaps_identity_only() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("Replacements.csv"),
            "Label,Provider,Product,Blueprint,ReplaceProvider,ReplaceProduct,ReplaceBlueprint,ReplaceName,NumbersDcsv\n",
        )
        .unwrap();
        fs::write(dir.path().join("Class47BRBlue_numbers.csv"), "").unwrap();
        fs::write(
            dir.path().join("User.csv"),
            "Label,Provider,Product,Blueprint,ReplaceProvider,ReplaceProduct,ReplaceBlueprint,ReplaceName,NumbersDcsv\n\
             User,OldCo,OldPack,Wagon\\.xml,NewCo,NewPack,RailVehicles\\Wagon.xml,New Wagon,\n",
        )
        .unwrap();
        let catalog = Catalog::load(dir.path(), dir.path()).unwrap();
        let mut session = Session::new(Some(1));
        let mut v = Vehicle {
            provider: "OldCo".to_string(),
            product: "OldPack".to_string(),
            blueprint: "RailVehicles\\Wagon.xml".to_string(),
            name: "Old Wagon".to_string(),
            number: "100".to_string(),
            loaded: Preload::NotApplicable,
            flipped: false,
            followers: Vec::new(),
        };
        let outcome = UserDefined
            .attempt(&mut v, &ConsistContext::loose(), &catalog, &mut session)
            .unwrap();
        assert_eq!(outcome, Outcome::Matched);
        assert_eq!(v.provider, "NewCo");
        assert_eq!(v.name, "New Wagon");
        assert_eq!(v.number, "100");
        assert!(session.pairs().is_empty());
    }
}
