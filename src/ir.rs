use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
    Undetermined,
}

impl Gender {
    pub fn from_token(token: &str) -> Option<Self> {
        match token.trim().to_ascii_lowercase().as_str() {
            "male" | "m" => Some(Self::Male),
            "female" | "f" => Some(Self::Female),
            "undetermined" | "unknown" | "u" => Some(Self::Undetermined),
            _ => None,
        }
    }
}

/// A person record after normalization. Relationship links are still plain
/// ids here; the graph builder resolves them into arena indices.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Individual {
    pub id: String,
    pub name: Option<String>,
    pub gender: Gender,
    pub is_proband: bool,
    pub is_consultand: bool,
    pub is_deceased: bool,
    pub is_pregnancy: bool,
    pub is_still_birth: bool,
    pub is_spontaneous_abortion: bool,
    pub is_terminated_pregnancy: bool,
    pub is_ectopic: bool,
    pub age: Option<f64>,
    pub diseases: Vec<String>,
    pub carrier_of_diseases: Vec<String>,
    pub asymptomatic_diseases: Vec<String>,
    pub parents: Vec<String>,
    pub partners: Vec<String>,
    pub data: serde_json::Value,
}

impl Individual {
    pub fn new(id: &str, gender: Gender) -> Self {
        Self {
            id: id.to_string(),
            name: None,
            gender,
            is_proband: false,
            is_consultand: false,
            is_deceased: false,
            is_pregnancy: false,
            is_still_birth: false,
            is_spontaneous_abortion: false,
            is_terminated_pregnancy: false,
            is_ectopic: false,
            age: None,
            diseases: Vec::new(),
            carrier_of_diseases: Vec::new(),
            asymptomatic_diseases: Vec::new(),
            parents: Vec::new(),
            partners: Vec::new(),
            data: serde_json::Value::Null,
        }
    }

    /// Every condition name attached to this person, in legend order.
    pub fn conditions(&self) -> impl Iterator<Item = &str> {
        self.diseases
            .iter()
            .chain(self.carrier_of_diseases.iter())
            .chain(self.asymptomatic_diseases.iter())
            .map(String::as_str)
    }
}
