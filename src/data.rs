//! Built-in auxiliary lookup tables: headcode maps, destination-code maps,
//! livery option sets and wagon number pools.
//!
//! These are the tables the swap families consult in addition to the CSV
//! catalog. They are compiled in because they never vary per installation,
//! unlike the replacement catalog and the per-pack number catalogs.

/// Class 40 headcode equivalents for 1962-69 era disc-fitted locos, keyed by
/// the leading digit of the source number.
pub fn ap40_headcode_62_69(digit: char) -> Option<&'static str> {
    Some(match digit {
        '0' => "0O00",
        '1' => "1A21",
        '2' => "2N40",
        '3' => "3E19",
        '4' => "4M61",
        '5' => "5J02",
        '6' => "6P11",
        '7' => "7X23",
        '8' => "8C77",
        '9' => "9K50",
        _ => return None,
    })
}

/// Class 40 headcode equivalents for 1969-77 era disc-fitted locos.
pub fn ap40_headcode_69_77(digit: char) -> Option<&'static str> {
    Some(match digit {
        '0' => "0000",
        '1' => "1M16",
        '2' => "2E43",
        '3' => "3A08",
        '4' => "4S71",
        '5' => "5V30",
        '6' => "6E26",
        '7' => "7M52",
        '8' => "8J64",
        '9' => "9O15",
        _ => return None,
    })
}

/// The MeshTools Class 50 encodes the loco identity as a single character;
/// position in this table plus 50001 gives the TOPS number.
pub const CL50_CHARS: &[char] = &[
    '0', '1', '2', '3', '4', '5', '6', '7', '8', '9', 'A', 'B', 'C', 'D', 'E', 'F', 'G', 'H', 'I',
    'J', 'K', 'L', 'N', 'M', 'O', 'P', 'Q', 'R', 'S', 'T', 'W', 'U', 'X', 'Y', 'Z', '!', '£', '$',
    '%', '-', '_', '=', '+', '[', '{', ']', '}', '#', '~', '@',
];

/// RSC Class 56 sector letter to the replacement pack's sector code.
pub fn c56_sector(sector: char) -> Option<char> {
    Some(match sector {
        'a' => 'd',
        'b' => 'c',
        'e' => 'b',
        'f' => 'a',
        _ => return None,
    })
}

/// RSC Class 56 depot letter to the replacement pack's depot plaque code.
pub fn c56_depot(depot: char) -> Option<char> {
    Some(match depot {
        'G' => 'C',
        'V' => 'D',
        'X' => 'A',
        _ => return None,
    })
}

/// Destination-blind code tables for the Class 158 families. Keys are the
/// destination marker embedded in the source running number; values are the
/// single destination character the replacement pack understands.
pub fn c158_destination(table: C158Table, key: &str) -> Option<char> {
    let rows: &[(&str, char)] = match table {
        C158Table::NorthWalesCoast => &[
            ("a", 'b'),
            ("b", 'c'),
            ("c", 'd'),
            ("d", 'e'),
            ("e", 'f'),
            ("f", 'g'),
            ("g", 'h'),
        ],
        C158Table::FifeCircle => &[("a", 'e'), ("b", 'f'), ("c", 'g'), ("d", 'h'), ("e", 'i')],
        C158Table::LivManRegional => &[("a", 'j'), ("b", 'k'), ("c", 'l'), ("d", 'm')],
        C158Table::S9blRegional => &[
            ("CRDF", 'b'),
            ("SHRW", 'c'),
            ("CHST", 'd'),
            ("MCHN", 'e'),
            ("LVPL", 'f'),
        ],
        C158Table::S9blNorthern => &[("LEED", 'b'), ("CARL", 'c'), ("SETT", 'd'), ("SKIP", 'e')],
        C158Table::S9blFgw => &[("BRST", 'b'), ("CARD", 'c'), ("PNZC", 'd'), ("EXET", 'e')],
        C158Table::S9blTpe => &[("MANA", 'b'), ("YORK", 'c'), ("SCAR", 'd'), ("HULL", 'e')],
        C158Table::S9blSwt => &[("SALB", 'b'), ("EXET", 'c'), ("BSNG", 'd'), ("WLOO", 'e')],
    };
    rows.iter().find(|(k, _)| *k == key).map(|(_, v)| *v)
}

/// Which Class 158 destination table applies, derived from the source
/// provider/product/blueprint by the Class 158 transformer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum C158Table {
    NorthWalesCoast,
    FifeCircle,
    LivManRegional,
    S9blRegional,
    S9blNorthern,
    S9blFgw,
    S9blTpe,
    S9blSwt,
}

/// One selectable livery/weathering variant for a wagon family: replacement
/// blueprint plus display name.
pub struct WagonVariant {
    pub blueprint: &'static str,
    pub name: &'static str,
}

/// HAA replacement variants for loaded wagons.
pub const HAA_LOADED: &[WagonVariant] = &[
    WagonVariant {
        blueprint: "RailVehicles\\Freight\\HAA\\HAA_Loaded.xml",
        name: "AP HAA (Loaded)",
    },
    WagonVariant {
        blueprint: "RailVehicles\\Freight\\HAA\\HAA_Loaded_W1.xml",
        name: "AP HAA Weathered (Loaded)",
    },
    WagonVariant {
        blueprint: "RailVehicles\\Freight\\HAA\\HAA_CanopyLoaded.xml",
        name: "AP HAA Canopy (Loaded)",
    },
];

/// HAA replacement variants for empty wagons.
pub const HAA_EMPTY: &[WagonVariant] = &[
    WagonVariant {
        blueprint: "RailVehicles\\Freight\\HAA\\HAA_Empty.xml",
        name: "AP HAA (Empty)",
    },
    WagonVariant {
        blueprint: "RailVehicles\\Freight\\HAA\\HAA_Empty_W1.xml",
        name: "AP HAA Weathered (Empty)",
    },
    WagonVariant {
        blueprint: "RailVehicles\\Freight\\HAA\\HAA_CanopyEmpty.xml",
        name: "AP HAA Canopy (Empty)",
    },
];

/// One selectable VDA variant; the VDA replacements live in several products.
pub struct VdaVariant {
    pub product: &'static str,
    pub blueprint: &'static str,
    pub name: &'static str,
}

pub const VDA_LOADED: &[VdaVariant] = &[
    VdaVariant {
        product: "VDA Vans - Maroon",
        blueprint: "RailVehicles\\Freight\\VDA\\VDA_Maroon_L.xml",
        name: "FS VDA Maroon (Loaded)",
    },
    VdaVariant {
        product: "VDA Vans - Railfreight",
        blueprint: "RailVehicles\\Freight\\VDA\\VDA_RF_L.xml",
        name: "FS VDA Railfreight (Loaded)",
    },
];

pub const VDA_EMPTY: &[VdaVariant] = &[
    VdaVariant {
        product: "VDA Vans - Maroon",
        blueprint: "RailVehicles\\Freight\\VDA\\VDA_Maroon_E.xml",
        name: "FS VDA Maroon (Empty)",
    },
    VdaVariant {
        product: "VDA Vans - Railfreight",
        blueprint: "RailVehicles\\Freight\\VDA\\VDA_RF_E.xml",
        name: "FS VDA Railfreight (Empty)",
    },
];

/// A numbering lot for the 21t coal hoppers: one diagram's product, its
/// blueprint/name pair and the pool of valid running numbers. Lot selection
/// is weighted by pool population.
pub struct DiagramLot {
    pub product: &'static str,
    pub blueprint: &'static str,
    pub name: &'static str,
    pub numbers: &'static [&'static str],
}

impl DiagramLot {
    pub fn population(&self) -> usize {
        self.numbers.len()
    }
}

pub const HTO_EMPTY_LOTS: &[DiagramLot] = &[
    DiagramLot {
        product: "HTO 21t Hoppers - Dia 141",
        blueprint: "RailVehicles\\Freight\\HTO\\HTO_141_E.xml",
        name: "FS HTO Dia 1/141 (Empty)",
        numbers: &[
            "B171003", "B171012", "B171188", "B171340", "B171411", "B171556", "B171612",
            "B171790", "B171834", "B171920",
        ],
    },
    DiagramLot {
        product: "HTO 21t Hoppers - Dia 143",
        blueprint: "RailVehicles\\Freight\\HTO\\HTO_143_E.xml",
        name: "FS HTO Dia 1/143 (Empty)",
        numbers: &["B172011", "B172092", "B172145", "B172230", "B172388", "B172451"],
    },
    DiagramLot {
        product: "HTO 21t Hoppers - Rebodied",
        blueprint: "RailVehicles\\Freight\\HTO\\HTO_RB_E.xml",
        name: "FS HTO Rebodied (Empty)",
        numbers: &["B417021", "B417134", "B417299", "B417365"],
    },
];

pub const HTO_LOADED_LOTS: &[DiagramLot] = &[
    DiagramLot {
        product: "HTO 21t Hoppers - Dia 141",
        blueprint: "RailVehicles\\Freight\\HTO\\HTO_141_L.xml",
        name: "FS HTO Dia 1/141 (Loaded)",
        numbers: &[
            "B171003", "B171012", "B171188", "B171340", "B171411", "B171556", "B171612",
            "B171790", "B171834", "B171920",
        ],
    },
    DiagramLot {
        product: "HTO 21t Hoppers - Dia 146",
        blueprint: "RailVehicles\\Freight\\HTO\\HTO_146_L.xml",
        name: "FS HTO Dia 1/146 (Loaded)",
        numbers: &["B173044", "B173120", "B173256", "B173301", "B173472"],
    },
];

pub const HTV_EMPTY_LOTS: &[DiagramLot] = &[
    DiagramLot {
        product: "HTV 21t Hoppers - Dia 146",
        blueprint: "RailVehicles\\Freight\\HTV\\HTV_146_E.xml",
        name: "FS HTV Dia 1/146 (Empty)",
        numbers: &["B429011", "B429108", "B429215", "B429377", "B429480", "B429521"],
    },
    DiagramLot {
        product: "HTV 21t Hoppers - Rebodied",
        blueprint: "RailVehicles\\Freight\\HTV\\HTV_RB_E.xml",
        name: "FS HTV Rebodied (Empty)",
        numbers: &["B436200", "B436317", "B436455"],
    },
];

pub const HTV_LOADED_LOTS: &[DiagramLot] = &[
    DiagramLot {
        product: "HTV 21t Hoppers - Dia 146",
        blueprint: "RailVehicles\\Freight\\HTV\\HTV_146_L.xml",
        name: "FS HTV Dia 1/146 (Loaded)",
        numbers: &["B429011", "B429108", "B429215", "B429377", "B429480", "B429521"],
    },
    DiagramLot {
        product: "HTV 21t Hoppers - Rebodied",
        blueprint: "RailVehicles\\Freight\\HTV\\HTV_RB_L.xml",
        name: "FS HTV Rebodied (Loaded)",
        numbers: &["B436200", "B436317", "B436455"],
    },
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headcode_maps_cover_all_digits() {
        for d in '0'..='9' {
            assert!(ap40_headcode_62_69(d).is_some());
            assert!(ap40_headcode_69_77(d).is_some());
        }
        assert!(ap40_headcode_62_69('x').is_none());
    }

    #[test]
    fn cl50_table_has_unique_entries() {
        let mut seen = std::collections::BTreeSet::new();
        for ch in CL50_CHARS {
            assert!(seen.insert(ch), "duplicate class 50 identity char {ch}");
        }
    }

    #[test]
    fn c158_s9bl_keys_are_four_chars() {
        assert_eq!(c158_destination(C158Table::S9blRegional, "CRDF"), Some('b'));
        assert_eq!(c158_destination(C158Table::S9blRegional, "ZZZZ"), None);
    }
}
