use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use anyhow::{bail, Result};
use pgm_cli::Session;
use pgm_core::{ComponentAttributeFilterOptions, DatasetType};
use pgm_dataset::{
    filter_dataset, resolve_component_attributes, AttributeSelection, ComponentAttributeMapping,
};
use tracing::debug;

pub fn handle(
    session: &Session,
    input: &Path,
    dataset_type: DatasetType,
    components: &[String],
    relevant: bool,
    output: &Path,
) -> Result<()> {
    let (dataset, extra) = session.load(input, dataset_type)?;
    let meta = session.dataset_meta(dataset_type)?;

    let (mapping, keep) = if relevant {
        (
            ComponentAttributeMapping::Filter(ComponentAttributeFilterOptions::Relevant),
            None,
        )
    } else {
        let (mapping, keep) = parse_selection(components)?;
        (mapping, Some(keep))
    };
    let mut resolved = resolve_component_attributes(&mapping, &dataset, meta)?;
    if let Some(keep) = keep {
        resolved.retain(|name, _| keep.contains(name));
    }
    debug!(?resolved, "resolved attribute selection");

    let filtered = filter_dataset(&dataset, meta, &resolved)?;
    session.save(output, &filtered, dataset_type, &extra)?;
    println!(
        "Wrote {} component types to {}",
        filtered.len(),
        output.display()
    );
    Ok(())
}

/// `node:u_rated,node:id,sym_load` into a per-component selection plus the
/// set of components to keep.
fn parse_selection(entries: &[String]) -> Result<(ComponentAttributeMapping, BTreeSet<String>)> {
    let mut selections: BTreeMap<String, AttributeSelection> = BTreeMap::new();
    for entry in entries
        .iter()
        .map(|entry| entry.trim())
        .filter(|entry| !entry.is_empty())
    {
        match entry.split_once(':') {
            None => {
                selections.insert(entry.to_string(), AttributeSelection::All);
            }
            Some((component, attribute)) => {
                let selection = selections
                    .entry(component.to_string())
                    .or_insert_with(|| AttributeSelection::List(Vec::new()));
                match selection {
                    AttributeSelection::List(names) => names.push(attribute.to_string()),
                    _ => bail!("'{component}' is selected whole and by attribute; pick one"),
                }
            }
        }
    }
    if selections.is_empty() {
        bail!("no components selected");
    }
    let keep = selections.keys().cloned().collect();
    Ok((ComponentAttributeMapping::PerComponent(selections), keep))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selection_groups_attributes_by_component() {
        let entries: Vec<String> = ["node:u_rated", "node:id", "line"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let (mapping, keep) = parse_selection(&entries).unwrap();
        let ComponentAttributeMapping::PerComponent(map) = mapping else {
            panic!("expected per-component mapping");
        };
        assert_eq!(map["node"], AttributeSelection::list(["u_rated", "id"]));
        assert_eq!(map["line"], AttributeSelection::All);
        assert_eq!(keep.len(), 2);
    }

    #[test]
    fn whole_and_partial_selection_conflict() {
        let entries = vec!["node".to_string(), "node:id".to_string()];
        assert!(parse_selection(&entries).is_err());
        assert!(parse_selection(&[]).is_err());
    }
}
