//! Fixed table of editor commands the relay is allowed to trigger
//!
//! Aliases are the names a prompt is likely to use; identifiers are what the
//! editor extension registers. Validation only ever checks identifiers.

/// (alias, canonical identifier)
pub const COMMAND_REGISTRY: &[(&str, &str)] = &[
    ("aurora", "aurora.helloAurora"),
    ("hello_aurora", "aurora.helloAurora"),
    ("patients", "aurora.openPatientTracker"),
    ("patient_tracker", "aurora.openPatientTracker"),
    ("billing", "aurora.openBilling"),
    ("process_dsl", "aurora.processDsl"),
    ("merge_pcms", "aurora.processDsl"),
    ("toggle_diagram", "aurora.toggleDiagramLayout"),
    ("toggle_diagram_layout", "aurora.toggleDiagramLayout"),
    ("change_narrative_type", "aurora.changeNarrativeType"),
    ("hide_narratives", "aurora.hideNarratives"),
    ("hide_named_groups", "aurora.hideNamedGroups"),
];

/// Whether `identifier` is a canonical command id (aliases are not accepted)
pub fn is_known(identifier: &str) -> bool {
    COMMAND_REGISTRY.iter().any(|(_, id)| *id == identifier)
}

pub fn resolve_alias(alias: &str) -> Option<&'static str> {
    COMMAND_REGISTRY
        .iter()
        .find(|(name, _)| *name == alias)
        .map(|(_, id)| *id)
}

/// Distinct identifiers in table order
pub fn identifiers() -> Vec<&'static str> {
    let mut ids: Vec<&'static str> = Vec::new();
    for (_, id) in COMMAND_REGISTRY {
        if !ids.contains(id) {
            ids.push(*id);
        }
    }
    ids
}

/// Aliases that map to `identifier`, in table order
pub fn aliases_for(identifier: &str) -> Vec<&'static str> {
    COMMAND_REGISTRY
        .iter()
        .filter(|(_, id)| *id == identifier)
        .map(|(alias, _)| *alias)
        .collect()
}
