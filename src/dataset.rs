//! Canonicalizes loosely-typed person records into [`Individual`]s.
//!
//! Records come from several upstream formats: parents may be listed as a
//! `parents` array or as singular `father`/`mother` fields, children may only
//! be listed on the parent side, and ids may be numbers or strings. The
//! normalizer folds all of these into one shape so the graph builder only
//! ever follows `parents` and `partners`.

use std::collections::{HashMap, HashSet};

use serde::Deserialize;

use crate::ir::{Gender, Individual};
use crate::layout::{LayoutError, Result};

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(untagged)]
enum IdValue {
    Number(serde_json::Number),
    String(String),
}

impl IdValue {
    fn normalized(&self) -> Option<String> {
        let id = match self {
            IdValue::Number(num) => num.to_string(),
            IdValue::String(val) => val.trim().to_string(),
        };
        (!id.is_empty()).then_some(id)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum AgeValue {
    Number(f64),
    String(String),
}

impl AgeValue {
    fn as_f64(&self) -> Option<f64> {
        match self {
            AgeValue::Number(val) => Some(*val),
            AgeValue::String(val) => val.trim().parse::<f64>().ok(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawRecord {
    id: Option<IdValue>,
    #[serde(alias = "sex")]
    gender: Option<String>,
    name: Option<String>,
    parents: Vec<Option<IdValue>>,
    father: Option<IdValue>,
    mother: Option<IdValue>,
    children: Vec<Option<IdValue>>,
    partners: Vec<Option<IdValue>>,
    is_proband: bool,
    is_consultand: bool,
    is_deceased: bool,
    is_pregnancy: bool,
    #[serde(alias = "isStillbirth")]
    is_still_birth: bool,
    is_spontaneous_abortion: bool,
    is_terminated_pregnancy: bool,
    is_ectopic: bool,
    age: Option<AgeValue>,
    diseases: Vec<String>,
    #[serde(alias = "carrierOf")]
    carrier_of_diseases: Vec<String>,
    #[serde(alias = "asymptomaticOf")]
    asymptomatic_diseases: Vec<String>,
    data: serde_json::Value,
}

/// A record the normalizer dropped because partial datasets were allowed.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct RejectedRecord {
    pub index: usize,
    pub reason: String,
}

#[derive(Debug, Clone, Default)]
pub struct NormalizedDataset {
    pub individuals: Vec<Individual>,
    pub rejected: Vec<RejectedRecord>,
}

/// Parses dataset text as JSON, falling back to JSON5.
pub fn parse_dataset(input: &str) -> anyhow::Result<Vec<serde_json::Value>> {
    match serde_json::from_str::<Vec<serde_json::Value>>(input) {
        Ok(records) => Ok(records),
        Err(json_err) => json5::from_str::<Vec<serde_json::Value>>(input)
            .map_err(|_| anyhow::anyhow!("dataset is not a JSON array of records: {json_err}")),
    }
}

/// Normalizes raw records. With `skip_malformed` the offending records are
/// reported in [`NormalizedDataset::rejected`]; otherwise the first one is a
/// [`LayoutError::MalformedRecord`].
pub fn normalize_records(
    records: &[serde_json::Value],
    skip_malformed: bool,
) -> Result<NormalizedDataset> {
    let mut out = NormalizedDataset::default();
    let mut seen_ids: HashSet<String> = HashSet::new();
    let mut raw_children: Vec<(usize, Vec<String>)> = Vec::new();

    for (index, value) in records.iter().enumerate() {
        match normalize_record(index, value, &seen_ids) {
            Ok((individual, children)) => {
                seen_ids.insert(individual.id.clone());
                if !children.is_empty() {
                    raw_children.push((out.individuals.len(), children));
                }
                out.individuals.push(individual);
            }
            Err(LayoutError::MalformedRecord { index, reason }) if skip_malformed => {
                log::warn!("skipping malformed record {index}: {reason}");
                out.rejected.push(RejectedRecord { index, reason });
            }
            Err(err) => return Err(err),
        }
    }

    let position: HashMap<String, usize> = out
        .individuals
        .iter()
        .enumerate()
        .map(|(idx, ind)| (ind.id.clone(), idx))
        .collect();

    // Children listed on the parent side become parent links on the child.
    for (parent_idx, children) in raw_children {
        let parent_id = out.individuals[parent_idx].id.clone();
        for child_id in children {
            let Some(&child_idx) = position.get(&child_id) else {
                log::warn!("{parent_id} lists unknown child {child_id}");
                continue;
            };
            push_unique(&mut out.individuals[child_idx].parents, &parent_id);
        }
    }

    // Partner links are symmetric.
    let mut partner_links: Vec<(usize, String)> = Vec::new();
    for individual in &out.individuals {
        for partner in &individual.partners {
            if let Some(&other) = position.get(partner) {
                partner_links.push((other, individual.id.clone()));
            }
        }
    }
    for (idx, partner_id) in partner_links {
        push_unique(&mut out.individuals[idx].partners, &partner_id);
    }

    for individual in &mut out.individuals {
        let id = individual.id.clone();
        individual.parents.retain(|parent| {
            let known = position.contains_key(parent) && *parent != id;
            if !known {
                log::warn!("{id} references unknown parent {parent}");
            }
            known
        });
        individual
            .partners
            .retain(|partner| position.contains_key(partner) && *partner != id);
    }

    canonicalize_order(&mut out.individuals);
    Ok(out)
}

fn normalize_record(
    index: usize,
    value: &serde_json::Value,
    seen_ids: &HashSet<String>,
) -> Result<(Individual, Vec<String>)> {
    if !value.is_object() {
        return Err(LayoutError::malformed(index, "record is not an object"));
    }
    let raw: RawRecord = serde_json::from_value(value.clone())
        .map_err(|err| LayoutError::malformed(index, err.to_string()))?;

    let id = raw
        .id
        .as_ref()
        .and_then(IdValue::normalized)
        .ok_or_else(|| LayoutError::malformed(index, "missing id"))?;
    if seen_ids.contains(&id) {
        return Err(LayoutError::malformed(index, format!("duplicate id {id}")));
    }
    let gender_token = raw
        .gender
        .as_deref()
        .ok_or_else(|| LayoutError::malformed(index, format!("{id} has no gender")))?;
    let gender = Gender::from_token(gender_token).ok_or_else(|| {
        LayoutError::malformed(index, format!("{id} has unknown gender {gender_token:?}"))
    })?;

    let mut individual = Individual::new(&id, gender);
    individual.name = raw.name;
    individual.is_proband = raw.is_proband;
    individual.is_consultand = raw.is_consultand;
    individual.is_deceased = raw.is_deceased;
    individual.is_pregnancy = raw.is_pregnancy;
    individual.is_still_birth = raw.is_still_birth;
    individual.is_spontaneous_abortion = raw.is_spontaneous_abortion;
    individual.is_terminated_pregnancy = raw.is_terminated_pregnancy;
    individual.is_ectopic = raw.is_ectopic;
    individual.age = raw.age.as_ref().and_then(AgeValue::as_f64);
    individual.diseases = dedup_strings(raw.diseases);
    individual.carrier_of_diseases = dedup_strings(raw.carrier_of_diseases);
    individual.asymptomatic_diseases = dedup_strings(raw.asymptomatic_diseases);
    individual.data = raw.data;

    let parent_ids = raw
        .parents
        .iter()
        .flatten()
        .chain(raw.father.iter())
        .chain(raw.mother.iter())
        .filter_map(IdValue::normalized);
    for parent in parent_ids {
        push_unique(&mut individual.parents, &parent);
    }
    for partner in raw.partners.iter().flatten().filter_map(IdValue::normalized) {
        push_unique(&mut individual.partners, &partner);
    }
    let children = raw
        .children
        .iter()
        .flatten()
        .filter_map(IdValue::normalized)
        .collect();

    Ok((individual, children))
}

/// Moves the first proband to the front; everyone else keeps input order.
fn canonicalize_order(individuals: &mut Vec<Individual>) {
    if let Some(pos) = individuals.iter().position(|ind| ind.is_proband)
        && pos > 0
    {
        let proband = individuals.remove(pos);
        individuals.insert(0, proband);
    }
}

fn push_unique(list: &mut Vec<String>, value: &str) {
    if !list.iter().any(|existing| existing == value) {
        list.push(value.to_string());
    }
}

fn dedup_strings(values: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(values.len());
    for value in values {
        let trimmed = value.trim();
        if !trimmed.is_empty() {
            push_unique(&mut out, trimmed);
        }
    }
    out
}
