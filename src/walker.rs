//! Document walker: drives the transformer chain over every rail vehicle of
//! a scenario, in strict document order, then replays the committed
//! renumberings into the driver instructions.
//!
//! Order matters. The used-number set and the consist-scoped scratch state
//! are written by one vehicle and read by the next, so the walk is a single
//! sequential pass; the propagation pass runs once, after every vehicle has
//! been processed, and never consumes a pair.

use anyhow::{bail, Result};
use tracing::{debug, info};

use crate::catalog::Catalog;
use crate::scenario::{read_vehicle, write_vehicle, Document};
use crate::session::{ReportRow, Session};
use crate::taillamp::ConsistPosition;
use crate::transform::{run_chain, ConsistContext, Transformer};

const SERVICE_PATH: &str = "Driver/cDriver/ServiceName/Localisation-cUserLocalisedString/English";
const PLAYER_PATH: &str = "Driver/cDriver/PlayerDriver";
const INITIAL_RV_PATH: &str = "Driver/cDriver/InitialRV/e";
const CONSIST_OPS_PATH: &str = "Driver/cDriver/DriverInstructionContainer/\
cDriverInstructionContainer/DriverInstruction/cConsistOperations/DeltaTarget/\
cDriverInstructionTarget/RailVehicleNumber/e";

/// What one processing run did, for the closing log line and the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Summary {
    pub consists: usize,
    pub vehicles: usize,
    pub swapped: usize,
    pub renumbered: usize,
}

/// Process one parsed scenario in place.
pub fn process_document(
    doc: &mut Document,
    chain: &[Box<dyn Transformer>],
    catalog: &Catalog,
    session: &mut Session,
) -> Result<Summary> {
    let consists = doc.root.find_all_mut("Record/cConsist");
    if consists.is_empty() {
        bail!("the file does not appear to contain any rail vehicle consists; is it definitely a scenario?");
    }
    let total_consists = consists.len();
    let mut vehicles = 0usize;
    let mut swapped = 0usize;

    for (consist_nr, consist) in consists.into_iter().enumerate() {
        // An undriven consist has no service; its vehicles are never
        // lamp-fitted and it reports under the loose-consist sentinel.
        let (service, driven) = match consist.find(SERVICE_PATH) {
            Some(e) => (e.text(), true),
            None => ("Loose consist".to_string(), false),
        };
        let player_driven = consist
            .find(PLAYER_PATH)
            .map(|e| e.text().trim() == "1")
            .unwrap_or(false);

        let entities = consist.find_all_mut("RailVehicles/cOwnedEntity");
        let count = entities.len();
        for (idx, entity) in entities.into_iter().enumerate() {
            let Some(mut vehicle) = read_vehicle(entity) else {
                debug!(consist = consist_nr, idx, "entity is not a rail vehicle, skipping");
                continue;
            };
            vehicles += 1;
            let position = if !driven {
                ConsistPosition::Interior
            } else if idx == 0 {
                ConsistPosition::First
            } else if idx == count - 1 {
                ConsistPosition::Last
            } else {
                ConsistPosition::Interior
            };
            let ctx = ConsistContext {
                position,
                service: service.clone(),
                driven,
                player_driven,
            };
            session.record_before(report_row(consist_nr, &vehicle, &ctx));
            if run_chain(chain, &mut vehicle, &ctx, catalog, session)? {
                swapped += 1;
                write_vehicle(entity, &vehicle);
            }
            session.record_after(report_row(consist_nr, &vehicle, &ctx));
        }
        session.reset_consist_state();
    }

    propagate_renumberings(doc, session);

    let summary = Summary {
        consists: total_consists,
        vehicles,
        swapped,
        renumbered: session.pairs().len(),
    };
    info!(
        consists = summary.consists,
        vehicles = summary.vehicles,
        swapped = summary.swapped,
        renumbered = summary.renumbered,
        "scenario processed"
    );
    Ok(summary)
}

/// Rewrite every driver-instruction reference to a renumbered vehicle: the
/// initial rail-vehicle list of each driver, and the coupling/uncoupling
/// consist-operation targets. First matching pair wins; pairs stay available
/// for every later reference.
fn propagate_renumberings(doc: &mut Document, session: &Session) {
    for consist in doc.root.find_all_mut("Record/cConsist") {
        for entry in consist.find_all_mut(INITIAL_RV_PATH) {
            if let Some(new) = session.renumbered(&entry.text()) {
                entry.set_text(new);
            }
        }
        for entry in consist.find_all_mut(CONSIST_OPS_PATH) {
            if let Some(new) = session.renumbered(&entry.text()) {
                entry.set_text(new);
            }
        }
    }
}

fn report_row(consist: usize, vehicle: &crate::scenario::Vehicle, ctx: &ConsistContext) -> ReportRow {
    ReportRow {
        consist,
        provider: vehicle.provider.clone(),
        product: vehicle.product.clone(),
        blueprint: vehicle.blueprint.clone(),
        name: vehicle.name.clone(),
        number: vehicle.number.clone(),
        loaded: vehicle.loaded,
        service: ctx.service.clone(),
        player_driven: ctx.player_driven,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::Vehicle;
    use crate::transform::Outcome;
    use std::fs;

    fn entity(number: &str) -> String {
        format!(
            "<cOwnedEntity><Name>Wagon</Name>\
             <BlueprintID><iBlueprintLibrary-cAbsoluteBlueprintID>\
             <BlueprintSetID><iBlueprintLibrary-cBlueprintSetID>\
             <Provider>OldCo</Provider><Product>OldPack</Product>\
             </iBlueprintLibrary-cBlueprintSetID></BlueprintSetID>\
             <BlueprintID>RailVehicles\\Wagon.xml</BlueprintID>\
             </iBlueprintLibrary-cAbsoluteBlueprintID></BlueprintID>\
             <Component><cWagon><UniqueNumber>{number}</UniqueNumber>\
             <Flipped>0</Flipped></cWagon></Component></cOwnedEntity>"
        )
    }

    fn scenario() -> String {
        format!(
            "<cRecordSet><Record><cConsist>\
             <Driver><cDriver>\
             <ServiceName><Localisation-cUserLocalisedString><English>6M41</English>\
             </Localisation-cUserLocalisedString></ServiceName>\
             <PlayerDriver>1</PlayerDriver>\
             <InitialRV><e>100</e><e>101</e></InitialRV>\
             <DriverInstructionContainer><cDriverInstructionContainer>\
             <DriverInstruction><cConsistOperations><DeltaTarget>\
             <cDriverInstructionTarget><RailVehicleNumber><e>100</e></RailVehicleNumber>\
             </cDriverInstructionTarget></DeltaTarget></cConsistOperations>\
             </DriverInstruction></cDriverInstructionContainer></DriverInstructionContainer>\
             </cDriver></Driver>\
             <RailVehicles>{}{}</RailVehicles>\
             </cConsist><cConsist>\
             <RailVehicles>{}</RailVehicles>\
             </cConsist></Record></cRecordSet>",
            entity("100"),
            entity("101"),
            entity("300")
        )
    }

    /// Bumps every number by 1000 and records the pair.
    struct Renumber;
    impl Transformer for Renumber {
        fn name(&self) -> &'static str {
            "renumber"
        }
        fn attempt(
            &self,
            vehicle: &mut Vehicle,
            _ctx: &ConsistContext,
            _catalog: &Catalog,
            session: &mut Session,
        ) -> Result<Outcome> {
            let old = vehicle.number.clone();
            let bumped: i64 = old.parse::<i64>().unwrap_or_default() + 1000;
            vehicle.number = bumped.to_string();
            session.record_pair(&old, &vehicle.number.clone());
            Ok(Outcome::Matched)
        }
    }

    fn test_catalog() -> (tempfile::TempDir, Catalog) {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("Replacements.csv"),
            "Label,Provider,Product,Blueprint,ReplaceProvider,ReplaceProduct,ReplaceBlueprint,ReplaceName,NumbersDcsv\n",
        )
        .unwrap();
        fs::write(dir.path().join("Class47BRBlue_numbers.csv"), "").unwrap();
        let catalog = Catalog::load(dir.path(), dir.path()).unwrap();
        (dir, catalog)
    }

    #[test]
    fn walk_renumbers_and_propagates_to_instructions() {
        let (_dir, catalog) = test_catalog();
        let mut doc = Document::parse(&scenario()).unwrap();
        let mut session = Session::new(Some(1));
        let chain: Vec<Box<dyn Transformer>> = vec![Box::new(Renumber)];
        let summary = process_document(&mut doc, &chain, &catalog, &mut session).unwrap();

        assert_eq!(summary.consists, 2);
        assert_eq!(summary.vehicles, 3);
        assert_eq!(summary.swapped, 3);
        assert_eq!(summary.renumbered, 3);

        let out = doc.to_xml_string().unwrap();
        assert!(out.contains("<UniqueNumber>1100</UniqueNumber>"));
        assert!(out.contains("<InitialRV><e>1100</e><e>1101</e></InitialRV>"));
        assert!(out.contains("<RailVehicleNumber><e>1100</e></RailVehicleNumber>"));
        // The loose consist renumbers too but has no instructions to patch.
        assert!(out.contains("<UniqueNumber>1300</UniqueNumber>"));
    }

    #[test]
    fn consist_context_reflects_service_and_position() {
        let (_dir, catalog) = test_catalog();
        let mut doc = Document::parse(&scenario()).unwrap();
        let mut session = Session::new(Some(1));

        struct Probe;
        impl Transformer for Probe {
            fn name(&self) -> &'static str {
                "probe"
            }
            fn attempt(
                &self,
                vehicle: &mut Vehicle,
                ctx: &ConsistContext,
                _catalog: &Catalog,
                _session: &mut Session,
            ) -> Result<Outcome> {
                // Stash what the walker told us into the name field.
                vehicle.name = format!(
                    "{}|{:?}|{}|{}",
                    ctx.service, ctx.position, ctx.driven, ctx.player_driven
                );
                Ok(Outcome::Matched)
            }
        }
        let chain: Vec<Box<dyn Transformer>> = vec![Box::new(Probe)];
        process_document(&mut doc, &chain, &catalog, &mut session).unwrap();
        let out = doc.to_xml_string().unwrap();
        assert!(out.contains("<Name>6M41|First|true|true</Name>"));
        assert!(out.contains("<Name>6M41|Last|true|true</Name>"));
        assert!(out.contains("<Name>Loose consist|Interior|false|false</Name>"));
    }

    #[test]
    fn document_without_consists_is_rejected() {
        let (_dir, catalog) = test_catalog();
        let mut doc = Document::parse("<cRecordSet><Record></Record></cRecordSet>").unwrap();
        let mut session = Session::new(Some(1));
        let chain: Vec<Box<dyn Transformer>> = Vec::new();
        let err = process_document(&mut doc, &chain, &catalog, &mut session).unwrap_err();
        assert!(err.to_string().contains("consists"));
    }

    #[test]
    fn report_rows_pair_before_and_after() {
        let (_dir, catalog) = test_catalog();
        let mut doc = Document::parse(&scenario()).unwrap();
        let mut session = Session::new(Some(1));
        let chain: Vec<Box<dyn Transformer>> = vec![Box::new(Renumber)];
        process_document(&mut doc, &chain, &catalog, &mut session).unwrap();
        assert_eq!(session.before_rows().len(), session.after_rows().len());
        assert_eq!(session.before_rows()[0].number, "100");
        assert_eq!(session.after_rows()[0].number, "1100");
        assert_eq!(session.before_rows()[2].service, "Loose consist");
    }
}
