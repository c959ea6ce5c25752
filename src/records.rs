// Inventory records on both sides of a reconciliation
//
// Every field is optional: an absent cell is None, never "".
// The engine only reads these records; the surrounding application owns them.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::path::Path;

/// Locally managed inventory entry
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SystemRecord {
    #[serde(default)]
    pub id: Option<String>,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub supplier: Option<String>,

    #[serde(default)]
    pub unit: Option<String>,

    #[serde(default, rename = "type")]
    pub item_type: Option<String>,

    #[serde(default)]
    pub state: Option<String>,

    /// Physical location, compared by the batch matcher
    #[serde(default)]
    pub location: Option<String>,
}

impl SystemRecord {
    pub fn with_description(description: &str) -> Self {
        SystemRecord {
            description: Some(description.to_string()),
            ..Default::default()
        }
    }
}

/// Externally sourced asset entry; `tag` is the canonical external identifier
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegistryRecord {
    #[serde(default)]
    pub tag: Option<String>,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub species: Option<String>,

    #[serde(default)]
    pub supplier: Option<String>,

    #[serde(default)]
    pub unit: Option<String>,

    #[serde(default)]
    pub status: Option<String>,
}

impl RegistryRecord {
    pub fn with_description(description: &str) -> Self {
        RegistryRecord {
            description: Some(description.to_string()),
            ..Default::default()
        }
    }
}

/// One line of a bulk paste from a spreadsheet
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PastedRecord {
    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub location: Option<String>,

    #[serde(default)]
    pub state: Option<String>,
}

impl PastedRecord {
    pub fn new(description: &str, location: &str, state: &str) -> Self {
        PastedRecord {
            description: Some(description.to_string()),
            location: Some(location.to_string()),
            state: Some(state.to_string()),
        }
    }
}

// ============================================================================
// LOADERS
// ============================================================================

/// Load system records from a CSV file with lowercase field-name headers
pub fn load_system_records(path: &Path) -> Result<Vec<SystemRecord>> {
    load_csv(csv::Reader::from_path(path)?)
}

/// Load registry records from a CSV file with lowercase field-name headers
pub fn load_registry_records(path: &Path) -> Result<Vec<RegistryRecord>> {
    load_csv(csv::Reader::from_path(path)?)
}

fn load_csv<T, R>(mut rdr: csv::Reader<R>) -> Result<Vec<T>>
where
    T: for<'de> Deserialize<'de>,
    R: Read,
{
    let mut records = Vec::new();
    for result in rdr.deserialize() {
        records.push(result?);
    }
    Ok(records)
}

/// Parse a tab-separated bulk paste: description, location, state
///
/// Blank lines are skipped. Missing trailing columns and blank cells are None.
pub fn parse_pasted(text: &str) -> Result<Vec<PastedRecord>> {
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .flexible(true)
        .quoting(false)
        .from_reader(text.as_bytes());

    let mut pasted = Vec::new();
    for result in rdr.records() {
        let row = result?;
        let cell = |i: usize| {
            row.get(i)
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(str::to_string)
        };

        let record = PastedRecord {
            description: cell(0),
            location: cell(1),
            state: cell(2),
        };

        if record == PastedRecord::default() {
            continue;
        }
        pasted.push(record);
    }

    Ok(pasted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_pasted_tab_separated() {
        let text = "Mesa\tSala 1\tBom\nCadeira giratória\tSala 2\tRegular\n";
        let pasted = parse_pasted(text).unwrap();

        assert_eq!(pasted.len(), 2);
        assert_eq!(pasted[0], PastedRecord::new("Mesa", "Sala 1", "Bom"));
        assert_eq!(pasted[1].description.as_deref(), Some("Cadeira giratória"));
    }

    #[test]
    fn test_parse_pasted_missing_columns_are_none() {
        let pasted = parse_pasted("Armário\n\nEstante\t\tRuim\n").unwrap();

        assert_eq!(pasted.len(), 2);
        assert_eq!(pasted[0].location, None);
        assert_eq!(pasted[0].state, None);
        assert_eq!(pasted[1].location, None);
        assert_eq!(pasted[1].state.as_deref(), Some("Ruim"));
    }

    #[test]
    fn test_parse_pasted_empty() {
        assert!(parse_pasted("").unwrap().is_empty());
    }

    #[test]
    fn test_load_registry_records_empty_cells_are_none() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "tag,description,species,supplier,unit,status").unwrap();
        writeln!(file, "PAT-001,Mesa de reunião,Mobiliário,Acme,UN,Ativo").unwrap();
        writeln!(file, "PAT-002,Cadeira,,,,").unwrap();

        let records = load_registry_records(file.path()).unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].tag.as_deref(), Some("PAT-001"));
        assert_eq!(records[0].supplier.as_deref(), Some("Acme"));
        assert_eq!(records[1].species, None);
        assert_eq!(records[1].supplier, None);
    }

    #[test]
    fn test_load_system_records_type_column() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "id,description,supplier,unit,type,state,location").unwrap();
        writeln!(file, "17,Mesa,Acme,UN,Permanente,Bom,Sala 1").unwrap();

        let records = load_system_records(file.path()).unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].item_type.as_deref(), Some("Permanente"));
        assert_eq!(records[0].location.as_deref(), Some("Sala 1"));
    }
}
