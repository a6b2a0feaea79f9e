//! HTML report of the processed scenario.
//!
//! One table of the vehicles after processing (optionally side by side with
//! the originals), one table of the unique provider/product assets in use,
//! and the scenario/route properties when they can be found next to the
//! scenario file. Blueprints are shown in their compiled `.bin` form, and a
//! blueprint whose asset file is absent on disk is flagged red - advisory
//! only, the swap itself never checks.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::debug;

use crate::catalog::Catalog;
use crate::config::ReportMode;
use crate::scenario::{Document, Preload};
use crate::session::{ReportRow, Session};

const HTML_HEAD: &str = r#"<html lang="en">
<head>
<meta http-equiv=Content-Type content="text/html; charset=utf-8">
<title>Scenario rail vehicle and asset report</title>
<link href='https://fonts.googleapis.com/css?family=Roboto' rel='stylesheet'>
<style>
body,.dataframe {
    font-family: 'Roboto';font-size: 10pt;
}
tr.shaded_row {
    background-color: #cccccc;
}
td.missing {
    color: #bb2222;
    font-style: italic;
}
td.input,th.input {
    color: #2222bb;
    font-style: italic;
}
h1 {
    font-family: 'Roboto';font-size: 24pt;
    font-style: bold;
}
h2 {
    font-family: 'Roboto';font-size: 18pt;
    font-style: bold;
}
h3,thead {
    font-family: 'Roboto';font-size: 14pt;
    font-style: bold;
    border-style: none none solid none;
    border-width: 1px;
}
</style>
</head>
<body>
"#;

/// Header fields of the scenario and its route, for the report preamble.
#[derive(Debug, Clone)]
pub struct ScenarioProperties {
    pub title: String,
    pub description: String,
    pub briefing: String,
    pub start_from: String,
    pub route: String,
}

/// Read `ScenarioProperties.xml` from the scenario directory and the route's
/// `RouteProperties.xml` two levels up. A missing or unparseable properties
/// file just drops the section; a missing route file leaves a note in the
/// route field.
pub fn read_properties(scenario_dir: &Path) -> Option<ScenarioProperties> {
    let props_path = scenario_dir.join("ScenarioProperties.xml");
    let route_path = scenario_dir
        .parent()
        .and_then(Path::parent)
        .map(|p| p.join("RouteProperties.xml"))?;
    let doc = parse_properties(&props_path)?;
    let field = |path: &str| {
        doc.root
            .find(&format!("{path}/Localisation-cUserLocalisedString/English"))
            .map(|e| e.text())
            .unwrap_or_default()
    };
    let route = match parse_properties(&route_path) {
        Some(route_doc) => route_doc
            .root
            .find("DisplayName/Localisation-cUserLocalisedString/English")
            .map(|e| e.text())
            .unwrap_or_default(),
        None => format!("unknown - {} not found", route_path.display()),
    };
    Some(ScenarioProperties {
        title: field("DisplayName"),
        description: field("Description"),
        briefing: field("Briefing"),
        start_from: field("StartLocation"),
        route,
    })
}

fn parse_properties(path: &Path) -> Option<Document> {
    let text = fs::read_to_string(path).ok()?;
    match Document::parse(&text) {
        Ok(doc) => Some(doc),
        Err(err) => {
            debug!(path = %path.display(), %err, "properties file could not be parsed");
            None
        }
    }
}

/// Write the report next to the scenario.
pub fn write_report(
    path: &Path,
    catalog: &Catalog,
    session: &Session,
    mode: ReportMode,
    properties: Option<&ScenarioProperties>,
) -> Result<()> {
    let html = render(catalog, session, mode, properties);
    fs::write(path, html).with_context(|| format!("cannot write report {}", path.display()))
}

fn render(
    catalog: &Catalog,
    session: &Session,
    mode: ReportMode,
    properties: Option<&ScenarioProperties>,
) -> String {
    let mut html = String::from(HTML_HEAD);
    if let Some(props) = properties {
        html.push_str(&properties_table(props));
    }
    html.push_str(&asset_table(session.after_rows()));
    html.push_str(&vehicle_table(catalog, session, mode));
    html.push_str("</body>\n</html>\n");
    html
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;")
}

fn properties_table(props: &ScenarioProperties) -> String {
    let row = |label: &str, value: &str| {
        format!(
            "    <tr>\n      <th>{label}</th>\n      <td>{}</td>\n    </tr>\n",
            escape(value)
        )
    };
    format!(
        "\n<h1>Scenario properties</h1>\n<table border=\"1\" class=\"dataframe\" style=\"text-align: left;\">\n{}{}{}{}{}  </table>\n",
        row("Title", &props.title),
        row("Description", &props.description),
        row("Briefing", &props.briefing),
        row("Start From", &props.start_from),
        row("Route", &props.route),
    )
}

fn asset_table(rows: &[ReportRow]) -> String {
    let mut assets: Vec<(String, String)> = Vec::new();
    for row in rows {
        let pair = (row.provider.clone(), row.product.clone());
        if !assets.contains(&pair) {
            assets.push(pair);
        }
    }
    assets.sort();
    let mut html = String::from(
        "\n<h1>List of rail vehicle assets used</h1>\n<table border=\"1\" class=\"dataframe\">\n  <thead>\n    <tr style=\"text-align: right;\">\n      <th>Provider</th>\n      <th>Product</th>\n    </tr>\n  </thead>\n  <tbody>\n",
    );
    for (provider, product) in assets {
        html.push_str(&format!(
            "    <tr>\n      <td>{}</td>\n      <td>{}</td>\n    </tr>\n",
            escape(&provider),
            escape(&product)
        ));
    }
    html.push_str("  </tbody>\n</table>\n");
    html
}

fn loaded_text(loaded: Preload) -> &'static str {
    match loaded {
        Preload::Loaded => "eTrue",
        Preload::Empty => "eFalse",
        Preload::NotApplicable => "",
    }
}

/// Blueprint as the simulator ships it: the source XML is compiled to `.bin`.
fn compiled_blueprint(blueprint: &str) -> String {
    blueprint.replace(".xml", ".bin")
}

fn vehicle_table(catalog: &Catalog, session: &Session, mode: ReportMode) -> String {
    let rows = session.after_rows();
    let full = mode == ReportMode::Full;
    let mut html = String::from("<h1>Rail vehicle list</h1>\n<table border=\"1\" class=\"dataframe\">\n  <thead>\n    <tr style=\"text-align: right;\">\n      <th>Consist</th>\n");
    if full {
        for label in [
            "Original Provider",
            "Original Product",
            "Original Blueprint",
            "Original Name",
            "Original Number",
            "Loaded",
        ] {
            html.push_str(&format!("      <th class=\"input\">{label}</th>\n"));
        }
    }
    for label in ["Provider", "Product", "Blueprint", "Name", "Number", "Loaded"] {
        html.push_str(&format!("      <th>{label}</th>\n"));
    }
    html.push_str("    </tr>\n  </thead>\n  <tbody>\n");

    let mut last_consist: Option<usize> = None;
    for (idx, row) in rows.iter().enumerate() {
        let mut cells = String::new();
        if last_consist != Some(row.consist) {
            // First vehicle of the consist carries the consist cell spanning
            // every row of the consist.
            let rowspan = rows.iter().filter(|r| r.consist == row.consist).count();
            let mut label = format!("<i>{}</i>", escape(&row.service));
            if row.player_driven {
                label = format!("<b>{label}</b> (Player driven)");
            }
            cells.push_str(&format!("      <td rowspan={rowspan}>{label}</td>\n"));
        }
        if full {
            if let Some(original) = session.before_rows().get(idx) {
                for value in [
                    &original.provider,
                    &original.product,
                    &compiled_blueprint(&original.blueprint),
                    &original.name,
                    &original.number,
                    &loaded_text(original.loaded).to_string(),
                ] {
                    cells.push_str(&format!("      <td class=\"input\">{}</td>\n", escape(value)));
                }
            }
        }
        let asset_relative = format!(
            "Assets/{}/{}/{}",
            row.provider,
            row.product,
            compiled_blueprint(&row.blueprint)
        );
        let style = if catalog.asset_path(&asset_relative).is_file() {
            ""
        } else {
            " class=\"missing\""
        };
        for value in [
            &row.provider,
            &row.product,
            &compiled_blueprint(&row.blueprint),
            &row.name,
            &row.number,
            &loaded_text(row.loaded).to_string(),
        ] {
            cells.push_str(&format!("      <td{style}>{}</td>\n", escape(value)));
        }
        if row.consist % 2 == 0 {
            html.push_str(&format!("    <tr>\n{cells}    </tr>\n"));
        } else {
            html.push_str(&format!("    <tr class=\"shaded_row\">\n{cells}    </tr>\n"));
        }
        last_consist = Some(row.consist);
    }
    html.push_str(&format!(
        "  </tbody>\n</table>\n<h3>{} vehicles in total in this scenario.</h3>",
        rows.len()
    ));
    html
}
