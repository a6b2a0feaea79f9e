//! Scenario document tree.
//!
//! The scenario XML is held as an owned element tree so that fields the
//! engine never touches pass through unchanged. Transformers never see XML:
//! the walker reads a [`Vehicle`] out of a `cOwnedEntity` element, runs the
//! chain over it, and writes the fields back.
//!
//! Serialization reproduces the simulator's empty-tag quirks: the format
//! wants long-form empty elements everywhere except a fixed set of tags that
//! must stay self-closing.

use anyhow::{bail, Context, Result};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

/// Tags the simulator requires in self-closing form when empty. Everything
/// else serializes as `<Tag></Tag>`.
const SHORT_EMPTY_TAGS: &[&str] = &[
    "cEngineSimContainer",
    "RailVehicleNumber",
    "Other",
    "DeltaTarget",
    "d:nil",
    "DriverInstruction",
    "InitialLevel",
    "StaticChildrenMatrix",
    "RailVehicles",
];

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Element(Element),
    Text(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub name: String,
    pub attrs: Vec<(String, String)>,
    pub children: Vec<Node>,
}

impl Element {
    pub fn new(name: &str) -> Self {
        Element {
            name: name.to_string(),
            attrs: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Concatenated text content of this element.
    pub fn text(&self) -> String {
        self.children
            .iter()
            .filter_map(|n| match n {
                Node::Text(t) => Some(t.as_str()),
                Node::Element(_) => None,
            })
            .collect()
    }

    /// Replace the text content, leaving child elements alone.
    pub fn set_text(&mut self, text: &str) {
        self.children.retain(|n| matches!(n, Node::Element(_)));
        self.children.push(Node::Text(text.to_string()));
    }

    pub fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find_map(|n| match n {
            Node::Element(e) if e.name == name => Some(e),
            _ => None,
        })
    }

    /// First element matching a `/`-separated path. A `*` segment matches any
    /// element name.
    pub fn find(&self, path: &str) -> Option<&Element> {
        let mut current = self;
        for seg in path.split('/') {
            current = current.children.iter().find_map(|n| match n {
                Node::Element(e) if seg == "*" || e.name == seg => Some(e),
                _ => None,
            })?;
        }
        Some(current)
    }

    pub fn find_mut(&mut self, path: &str) -> Option<&mut Element> {
        let mut current = self;
        for seg in path.split('/') {
            current = current.children.iter_mut().find_map(|n| match n {
                Node::Element(e) if seg == "*" || e.name == seg => Some(e),
                _ => None,
            })?;
        }
        Some(current)
    }

    /// Every element matching the path, in document order.
    pub fn find_all(&self, path: &str) -> Vec<&Element> {
        let segs: Vec<&str> = path.split('/').collect();
        let mut out = Vec::new();
        collect(self, &segs, &mut out);
        out
    }

    pub fn find_all_mut(&mut self, path: &str) -> Vec<&mut Element> {
        let segs: Vec<&str> = path.split('/').collect();
        let mut out = Vec::new();
        collect_mut(self, &segs, &mut out);
        out
    }
}

fn collect<'a>(el: &'a Element, segs: &[&str], out: &mut Vec<&'a Element>) {
    let Some((first, rest)) = segs.split_first() else {
        return;
    };
    for node in &el.children {
        if let Node::Element(child) = node {
            if *first == "*" || child.name == *first {
                if rest.is_empty() {
                    out.push(child);
                } else {
                    collect(child, rest, out);
                }
            }
        }
    }
}

fn collect_mut<'a>(el: &'a mut Element, segs: &[&str], out: &mut Vec<&'a mut Element>) {
    let Some((first, rest)) = segs.split_first() else {
        return;
    };
    for node in el.children.iter_mut() {
        if let Node::Element(child) = node {
            if *first == "*" || child.name == *first {
                if rest.is_empty() {
                    out.push(child);
                } else {
                    collect_mut(child, rest, out);
                }
            }
        }
    }
}

/// A parsed scenario (or properties) document.
#[derive(Debug, Clone)]
pub struct Document {
    pub root: Element,
}

impl Document {
    pub fn parse(xml: &str) -> Result<Document> {
        let mut reader = Reader::from_str(xml);
        let mut stack: Vec<Element> = Vec::new();
        let mut root: Option<Element> = None;

        loop {
            match reader.read_event().context("XML parse error")? {
                Event::Start(start) => {
                    stack.push(element_from_start(&start)?);
                }
                Event::Empty(start) => {
                    let element = element_from_start(&start)?;
                    attach(&mut stack, &mut root, element)?;
                }
                Event::End(_) => {
                    let element = stack.pop().context("unbalanced XML end tag")?;
                    attach(&mut stack, &mut root, element)?;
                }
                Event::Text(text) => {
                    let value = text.unescape().context("XML text decode error")?;
                    if let Some(parent) = stack.last_mut() {
                        parent.children.push(Node::Text(value.into_owned()));
                    }
                }
                Event::CData(data) => {
                    let value = String::from_utf8_lossy(&data).into_owned();
                    if let Some(parent) = stack.last_mut() {
                        parent.children.push(Node::Text(value));
                    }
                }
                Event::Decl(_) | Event::Comment(_) | Event::PI(_) | Event::DocType(_) => {}
                Event::Eof => break,
            }
        }
        if !stack.is_empty() {
            bail!("XML document ended with unclosed elements");
        }
        root.context("XML document has no root element")
            .map(|root| Document { root })
    }

    /// Serialize back to XML text with the simulator's tag conventions.
    pub fn to_xml_string(&self) -> Result<String> {
        let mut writer = Writer::new(Vec::new());
        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;
        writer.write_event(Event::Text(BytesText::new("\n")))?;
        write_element(&mut writer, &self.root)?;
        let bytes = writer.into_inner();
        String::from_utf8(bytes).context("serialized XML is not valid UTF-8")
    }
}

fn element_from_start(start: &BytesStart<'_>) -> Result<Element> {
    let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
    let mut element = Element::new(&name);
    for attr in start.attributes() {
        let attr = attr.context("bad XML attribute")?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .context("bad XML attribute value")?
            .into_owned();
        element.attrs.push((key, value));
    }
    Ok(element)
}

fn attach(stack: &mut Vec<Element>, root: &mut Option<Element>, element: Element) -> Result<()> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(Node::Element(element)),
        None => {
            if root.is_some() {
                bail!("XML document has more than one root element");
            }
            *root = Some(element);
        }
    }
    Ok(())
}

fn write_element(writer: &mut Writer<Vec<u8>>, element: &Element) -> Result<()> {
    let mut start = BytesStart::new(element.name.as_str());
    for (key, value) in &element.attrs {
        start.push_attribute((key.as_str(), value.as_str()));
    }
    if element.children.is_empty() && SHORT_EMPTY_TAGS.contains(&element.name.as_str()) {
        writer.write_event(Event::Empty(start))?;
        return Ok(());
    }
    writer.write_event(Event::Start(start))?;
    for node in &element.children {
        match node {
            Node::Element(child) => write_element(writer, child)?,
            Node::Text(text) => writer.write_event(Event::Text(BytesText::new(text)))?,
        }
    }
    writer.write_event(Event::End(BytesEnd::new(element.name.as_str())))?;
    Ok(())
}

// Field paths within one cOwnedEntity vehicle element.
const PROVIDER_PATH: &str = "BlueprintID/iBlueprintLibrary-cAbsoluteBlueprintID/BlueprintSetID/iBlueprintLibrary-cBlueprintSetID/Provider";
const PRODUCT_PATH: &str = "BlueprintID/iBlueprintLibrary-cAbsoluteBlueprintID/BlueprintSetID/iBlueprintLibrary-cBlueprintSetID/Product";
const BLUEPRINT_PATH: &str = "BlueprintID/iBlueprintLibrary-cAbsoluteBlueprintID/BlueprintID";
const NAME_PATH: &str = "Name";
const NUMBER_PATH: &str = "Component/*/UniqueNumber";
const LOADED_PATH: &str = "Component/cCargoComponent/IsPreLoaded";
const FLIPPED_PATH: &str = "Component/*/Flipped";
const FOLLOWER_PATH: &str = "Component/*/Followers/Network-cTrackFollower/Direction";

/// Cargo pre-load state. Wagon families pick loaded/empty replacement
/// variants from it; vehicles without a cargo component report
/// `NotApplicable`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preload {
    Loaded,
    Empty,
    NotApplicable,
}

impl Preload {
    fn from_text(text: &str) -> Preload {
        if text.contains("eTrue") {
            Preload::Loaded
        } else if text.contains("eFalse") {
            Preload::Empty
        } else {
            Preload::NotApplicable
        }
    }
}

/// Track-follower travel direction; coupled to the vehicle's `Flipped` flag
/// and only ever inverted together with it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowerDirection {
    Forwards,
    Backwards,
}

impl FollowerDirection {
    pub fn invert(self) -> FollowerDirection {
        match self {
            FollowerDirection::Forwards => FollowerDirection::Backwards,
            FollowerDirection::Backwards => FollowerDirection::Forwards,
        }
    }

    fn from_text(text: &str) -> FollowerDirection {
        if text.trim() == "backwards" {
            FollowerDirection::Backwards
        } else {
            FollowerDirection::Forwards
        }
    }

    fn as_text(self) -> &'static str {
        match self {
            FollowerDirection::Forwards => "forwards",
            FollowerDirection::Backwards => "backwards",
        }
    }
}

/// The unit of work for the transformer chain: one rail vehicle's rewritable
/// fields, detached from the XML tree.
#[derive(Debug, Clone, PartialEq)]
pub struct Vehicle {
    pub provider: String,
    pub product: String,
    pub blueprint: String,
    pub name: String,
    pub number: String,
    pub loaded: Preload,
    pub flipped: bool,
    pub followers: Vec<FollowerDirection>,
}

/// Read a vehicle out of a `cOwnedEntity` element. Returns `None` when the
/// entity lacks the identifying fields (not a rail vehicle record); such
/// entities pass through untouched.
pub fn read_vehicle(entity: &Element) -> Option<Vehicle> {
    let provider = entity.find(PROVIDER_PATH)?.text();
    let product = entity.find(PRODUCT_PATH)?.text();
    let blueprint = entity.find(BLUEPRINT_PATH)?.text();
    let name = entity.find(NAME_PATH)?.text();
    let number = entity.find(NUMBER_PATH)?.text();
    let loaded = entity
        .find(LOADED_PATH)
        .map(|e| Preload::from_text(&e.text()))
        .unwrap_or(Preload::NotApplicable);
    let flipped = entity
        .find(FLIPPED_PATH)
        .map(|e| e.text().trim() == "1")
        .unwrap_or(false);
    let followers = entity
        .find_all(FOLLOWER_PATH)
        .iter()
        .map(|e| FollowerDirection::from_text(&e.text()))
        .collect();
    Some(Vehicle {
        provider,
        product,
        blueprint,
        name,
        number,
        loaded,
        flipped,
        followers,
    })
}

/// Write the (possibly rewritten) vehicle fields back into its element. Only
/// fields present in the source element are written; the cargo flag is left
/// alone because no transformer rewrites it.
pub fn write_vehicle(entity: &mut Element, vehicle: &Vehicle) {
    let set = |el: Option<&mut Element>, value: &str| {
        if let Some(el) = el {
            el.set_text(value);
        }
    };
    set(entity.find_mut(PROVIDER_PATH), &vehicle.provider);
    set(entity.find_mut(PRODUCT_PATH), &vehicle.product);
    set(entity.find_mut(BLUEPRINT_PATH), &vehicle.blueprint);
    set(entity.find_mut(NAME_PATH), &vehicle.name);
    set(entity.find_mut(NUMBER_PATH), &vehicle.number);
    set(
        entity.find_mut(FLIPPED_PATH),
        if vehicle.flipped { "1" } else { "0" },
    );
    for (element, direction) in entity
        .find_all_mut(FOLLOWER_PATH)
        .into_iter()
        .zip(vehicle.followers.iter())
    {
        element.set_text(direction.as_text());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<cRecordSet d:version="1.0"><Record><cConsist><RailVehicles><cOwnedEntity><Name>Test Wagon</Name><BlueprintID><iBlueprintLibrary-cAbsoluteBlueprintID><BlueprintSetID><iBlueprintLibrary-cBlueprintSetID><Provider>OldCo</Provider><Product>OldPack</Product></iBlueprintLibrary-cBlueprintSetID></BlueprintSetID><BlueprintID>RailVehicles\Freight\Wagon.xml</BlueprintID></iBlueprintLibrary-cAbsoluteBlueprintID></BlueprintID><Component><cWagon><UniqueNumber>100</UniqueNumber><Flipped>0</Flipped><Followers><Network-cTrackFollower><Direction>forwards</Direction></Network-cTrackFollower><Network-cTrackFollower><Direction>forwards</Direction></Network-cTrackFollower></Followers></cWagon><cCargoComponent><IsPreLoaded>eTrue</IsPreLoaded></cCargoComponent></Component></cOwnedEntity></RailVehicles><RailVehicleNumber></RailVehicleNumber></cConsist></Record></cRecordSet>"#;

    #[test]
    fn reads_vehicle_fields() {
        let doc = Document::parse(SAMPLE).unwrap();
        let entities = doc.root.find_all("Record/cConsist/RailVehicles/cOwnedEntity");
        assert_eq!(entities.len(), 1);
        let vehicle = read_vehicle(entities[0]).unwrap();
        assert_eq!(vehicle.provider, "OldCo");
        assert_eq!(vehicle.product, "OldPack");
        assert_eq!(vehicle.blueprint, "RailVehicles\\Freight\\Wagon.xml");
        assert_eq!(vehicle.number, "100");
        assert_eq!(vehicle.loaded, Preload::Loaded);
        assert!(!vehicle.flipped);
        assert_eq!(vehicle.followers.len(), 2);
    }

    #[test]
    fn writes_vehicle_fields_back() {
        let mut doc = Document::parse(SAMPLE).unwrap();
        let mut entities = doc
            .root
            .find_all_mut("Record/cConsist/RailVehicles/cOwnedEntity");
        let mut vehicle = read_vehicle(entities[0]).unwrap();
        vehicle.provider = "NewCo".to_string();
        vehicle.number = "101".to_string();
        vehicle.flipped = true;
        vehicle.followers = vehicle.followers.iter().map(|f| f.invert()).collect();
        write_vehicle(entities[0], &vehicle);

        let out = doc.to_xml_string().unwrap();
        assert!(out.contains("<Provider>NewCo</Provider>"));
        assert!(out.contains("<UniqueNumber>101</UniqueNumber>"));
        assert!(out.contains("<Flipped>1</Flipped>"));
        assert!(out.contains("<Direction>backwards</Direction>"));
    }

    #[test]
    fn empty_tag_conventions_survive_round_trip() {
        let doc = Document::parse(SAMPLE).unwrap();
        let out = doc.to_xml_string().unwrap();
        // RailVehicleNumber is on the short-tag list; long-form empties stay
        // long-form.
        assert!(out.contains("<RailVehicleNumber/>"));
        assert!(!out.contains("<RailVehicleNumber></RailVehicleNumber>"));
    }

    #[test]
    fn wildcard_path_segment_matches_any_component() {
        let doc = Document::parse(SAMPLE).unwrap();
        let entity = doc
            .root
            .find("Record/cConsist/RailVehicles/cOwnedEntity")
            .unwrap();
        assert_eq!(
            entity.find("Component/*/UniqueNumber").unwrap().text(),
            "100"
        );
    }

    #[test]
    fn untouched_fields_pass_through() {
        let doc = Document::parse(SAMPLE).unwrap();
        let out = doc.to_xml_string().unwrap();
        let reparsed = Document::parse(&out).unwrap();
        assert_eq!(doc.root, reparsed.root);
    }
}
