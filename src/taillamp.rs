//! Tail-lamp fitting and orientation adjustment.
//!
//! Some replacement packs model the tail lamp as a separate blueprint
//! variant. The first and last vehicles of a driven consist get the lamp
//! variant; vehicles of loose consists never do. The lamp is modeled at one
//! end of the vehicle, so when the stored orientation would point it into
//! the train the vehicle's `Flipped` flag and every follower direction are
//! inverted in the same commit. Flipping the flag without the followers (or
//! the reverse) derails the consist on load, so the two always change
//! together.

use crate::scenario::Vehicle;

/// Where a vehicle sits in its consist. Loose consists always report
/// `Interior` so their vehicles are never lamp-fitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsistPosition {
    First,
    Interior,
    Last,
}

/// How a family's replacement pack spells its tail-lamp variant.
#[derive(Debug, Clone, Copy)]
pub struct LampVariant {
    /// Inserted into the blueprint file name ahead of the extension.
    pub blueprint_suffix: &'static str,
    /// Appended to the display name.
    pub name_suffix: &'static str,
}

/// Fit the tail-lamp variant appropriate for `position`, adjusting the
/// orientation when the lamp would face into the train. Returns whether a
/// lamp was fitted.
pub fn fit_tail_lamp(vehicle: &mut Vehicle, position: ConsistPosition, lamp: &LampVariant) -> bool {
    let lamp_wants_flipped = match position {
        ConsistPosition::Interior => return false,
        // The lamp sits at the vehicle's rear end; leading vehicles must be
        // turned for it to face out of the train.
        ConsistPosition::First => true,
        ConsistPosition::Last => false,
    };
    vehicle.blueprint = suffix_blueprint(&vehicle.blueprint, lamp.blueprint_suffix);
    vehicle.name.push_str(lamp.name_suffix);
    if vehicle.flipped != lamp_wants_flipped {
        vehicle.flipped = lamp_wants_flipped;
        for follower in &mut vehicle.followers {
            *follower = follower.invert();
        }
    }
    true
}

fn suffix_blueprint(blueprint: &str, suffix: &str) -> String {
    let lower = blueprint.to_ascii_lowercase();
    match lower.rfind(".xml") {
        Some(idx) => format!("{}{}{}", &blueprint[..idx], suffix, &blueprint[idx..]),
        None => format!("{blueprint}{suffix}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::{FollowerDirection, Preload};

    const LAMP: LampVariant = LampVariant {
        blueprint_suffix: "_TL",
        name_suffix: " (Tail Lamp)",
    };

    fn wagon(flipped: bool) -> Vehicle {
        Vehicle {
            provider: "AP".to_string(),
            product: "HAAWagonPack01".to_string(),
            blueprint: "RailVehicles\\Freight\\HAA\\HAA_Empty.xml".to_string(),
            name: "AP HAA (Empty)".to_string(),
            number: "353001".to_string(),
            loaded: Preload::Empty,
            flipped,
            followers: vec![FollowerDirection::Forwards, FollowerDirection::Forwards],
        }
    }

    #[test]
    fn interior_vehicle_is_untouched() {
        let mut v = wagon(false);
        let before = v.clone();
        assert!(!fit_tail_lamp(&mut v, ConsistPosition::Interior, &LAMP));
        assert_eq!(v, before);
    }

    #[test]
    fn last_vehicle_gets_lamp_without_flip() {
        let mut v = wagon(false);
        assert!(fit_tail_lamp(&mut v, ConsistPosition::Last, &LAMP));
        assert_eq!(v.blueprint, "RailVehicles\\Freight\\HAA\\HAA_Empty_TL.xml");
        assert_eq!(v.name, "AP HAA (Empty) (Tail Lamp)");
        assert!(!v.flipped);
        assert_eq!(
            v.followers,
            vec![FollowerDirection::Forwards, FollowerDirection::Forwards]
        );
    }

    #[test]
    fn first_vehicle_flips_flag_and_followers_together() {
        let mut v = wagon(false);
        assert!(fit_tail_lamp(&mut v, ConsistPosition::First, &LAMP));
        assert!(v.flipped);
        assert_eq!(
            v.followers,
            vec![FollowerDirection::Backwards, FollowerDirection::Backwards]
        );
    }

    #[test]
    fn already_facing_out_keeps_orientation() {
        let mut v = wagon(true);
        assert!(fit_tail_lamp(&mut v, ConsistPosition::First, &LAMP));
        assert!(v.flipped);
        assert_eq!(
            v.followers,
            vec![FollowerDirection::Forwards, FollowerDirection::Forwards]
        );
    }
}
