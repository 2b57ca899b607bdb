//! External tool result import.
//!
//! Two static mapping tables translate external probe/test identifiers to
//! catalog technique ids: Table A covers garak probe ids
//! (`probes.<family>.<Name>`), Table B covers promptfoo test-type labels.
//! Unmapped identifiers produce warning records and never touch a
//! posterior. The reverse direction of the same tables feeds the
//! execution hooks attached to recommendations.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Table A: garak probe id → technique id.
pub static GARAK_PROBE_MAP: &[(&str, &str)] = &[
    ("probes.dan.Dan_6_0", "AP-TX-LLM-JB-DAN"),
    ("probes.dan.Dan_7_0", "AP-TX-LLM-JB-DAN"),
    ("probes.dan.Dan_11_0", "AP-TX-LLM-JB-DAN"),
    ("probes.dan.DAN_Jailbreak", "AP-TX-LLM-JB-DAN"),
    ("probes.dan.DUDE", "AP-TX-LLM-JB-DAN"),
    ("probes.dan.STAN", "AP-TX-LLM-JB-DAN"),
    ("probes.dan.AutoDAN", "AP-TX-LLM-JB-GCG"),
    ("probes.suffix.GCGCached", "AP-TX-LLM-JB-GCG"),
    ("probes.promptinject.HijackHateHumans", "AP-TX-LLM-INJECT-DIRECT"),
    ("probes.promptinject.HijackKillHumans", "AP-TX-LLM-INJECT-DIRECT"),
    ("probes.promptinject.HijackLongPrompt", "AP-TX-LLM-INJECT-DIRECT"),
    ("probes.encoding.InjectBase64", "AP-TX-LLM-JB-ENCODING"),
    ("probes.encoding.InjectHex", "AP-TX-LLM-JB-ENCODING"),
    ("probes.encoding.InjectROT13", "AP-TX-LLM-JB-ENCODING"),
    ("probes.encoding.InjectMorse", "AP-TX-LLM-JB-ENCODING"),
    ("probes.latentinjection.LatentInjectionReport", "AP-TX-LLM-INJECT-INDIRECT"),
    ("probes.latentinjection.LatentInjectionResume", "AP-TX-LLM-INJECT-INDIRECT"),
    ("probes.xss.MarkdownImageExfil", "AP-TX-LLM-EXFIL-MARKDOWN"),
    ("probes.leakreplay.LiteratureCloze", "AP-TX-LLM-EXTRACT-TRAINDATA"),
    ("probes.leakreplay.LiteratureComplete", "AP-TX-LLM-EXTRACT-TRAINDATA"),
    ("probes.continuation.ContinueSlursReclaimedSlurs", "AP-TX-LLM-EVADE-CONTINUATION"),
    ("probes.glitch.Glitch", "AP-TX-LLM-EVADE-GLITCH"),
    ("probes.packagehallucination.Python", "AP-TX-LLM-HALLUC-PKG"),
    ("probes.packagehallucination.JavaScript", "AP-TX-LLM-HALLUC-PKG"),
    ("probes.misleading.FalseAssertion", "AP-TX-LLM-MISLEAD-CLAIMS"),
    ("probes.grandma.Slurs", "AP-TX-LLM-JB-GRANDMA"),
    ("probes.grandma.Substances", "AP-TX-LLM-JB-GRANDMA"),
];

/// Table B: promptfoo test-type label → technique id.
///
/// `harmful:*` matches any label with the `harmful:` prefix.
pub static PROMPTFOO_TEST_MAP: &[(&str, &str)] = &[
    ("jailbreak", "AP-TX-LLM-JB-PAIR"),
    ("hijacking", "AP-TX-LLM-INJECT-DIRECT"),
    ("pii", "AP-TX-LLM-EXTRACT-PII"),
    ("hallucination", "AP-TX-LLM-MISLEAD-CLAIMS"),
    ("overreliance", "AP-TX-LLM-SYCOPHANCY-OVERRELIANCE"),
    ("contracts", "AP-TX-LLM-ROLE-CONTRACT"),
    ("harmful:*", "AP-TX-LLM-JB-PERSONA-ROLEPLAY"),
    ("politics", "AP-TX-LLM-MISLEAD-CLAIMS"),
    ("imitation", "AP-TX-LLM-JB-PERSONA-ROLEPLAY"),
    ("excessive-agency", "AP-TX-AGENT-GOAL-HIJACK"),
    ("shell-injection", "AP-TX-AGENT-TOOL-ABUSE"),
];

static GARAK_INDEX: Lazy<HashMap<&'static str, &'static str>> =
    Lazy::new(|| GARAK_PROBE_MAP.iter().copied().collect());

static PROMPTFOO_INDEX: Lazy<HashMap<&'static str, &'static str>> =
    Lazy::new(|| PROMPTFOO_TEST_MAP.iter().copied().collect());

/// One raw result entry from an external tool run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResultRecord {
    /// Probe or test-type identifier in the tool's own namespace.
    pub id: String,
    /// Whether the probe/test succeeded (from the attacker's perspective).
    pub outcome: bool,
    /// Optional confidence in [0,1]; drives fractional posterior credit.
    #[serde(default)]
    pub confidence: Option<f64>,
}

/// A tool result resolved to a catalog technique.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MappedObservation {
    pub source_id: String,
    pub technique_id: String,
    pub success: bool,
    pub confidence: Option<f64>,
}

/// Non-fatal import problem, surfaced alongside successful updates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportWarningRecord {
    pub source_id: String,
    pub message: String,
}

/// Map an external identifier to a technique id, if the tables know it.
pub fn map_identifier(id: &str) -> Option<&'static str> {
    if let Some(technique) = GARAK_INDEX.get(id) {
        return Some(technique);
    }
    if let Some(technique) = PROMPTFOO_INDEX.get(id) {
        return Some(technique);
    }
    if id.starts_with("harmful:") {
        return PROMPTFOO_INDEX.get("harmful:*").copied();
    }
    None
}

/// Parse an import payload: a JSON array or line-delimited JSON records.
pub fn parse_payload(text: &str) -> Result<Vec<ToolResultRecord>, serde_json::Error> {
    let trimmed = text.trim_start();
    if trimmed.starts_with('[') {
        return serde_json::from_str(trimmed);
    }
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(serde_json::from_str)
        .collect()
}

/// Resolve raw records through the mapping tables.
pub fn map_results(
    records: Vec<ToolResultRecord>,
) -> (Vec<MappedObservation>, Vec<ImportWarningRecord>) {
    let mut mapped = Vec::new();
    let mut warnings = Vec::new();

    for record in records {
        match map_identifier(&record.id) {
            Some(technique_id) => mapped.push(MappedObservation {
                source_id: record.id,
                technique_id: technique_id.to_string(),
                success: record.outcome,
                confidence: record.confidence,
            }),
            None => {
                tracing::warn!(source_id = %record.id, "unmapped tool result id");
                warnings.push(ImportWarningRecord {
                    source_id: record.id,
                    message: "no technique mapping for this probe/test id".to_string(),
                });
            }
        }
    }

    (mapped, warnings)
}

/// Garak probe ids that execute a given technique (reverse of Table A).
pub fn garak_probes_for(technique_id: &str) -> Vec<&'static str> {
    GARAK_PROBE_MAP
        .iter()
        .filter(|(_, technique)| *technique == technique_id)
        .map(|(probe, _)| *probe)
        .collect()
}

/// Promptfoo labels that execute a given technique (reverse of Table B).
pub fn promptfoo_labels_for(technique_id: &str) -> Vec<&'static str> {
    PROMPTFOO_TEST_MAP
        .iter()
        .filter(|(_, technique)| *technique == technique_id)
        .map(|(label, _)| *label)
        .collect()
}
