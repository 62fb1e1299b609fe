use serde::{Deserialize, Serialize};
use std::path::Path;

/// Node sizes and spacings, in pixels. The router's grid lines are derived
/// from these, so spacings should be multiples of the ledge length and the
/// node sizes should be even.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DimensionConfig {
    pub individual_width: i32,
    pub individual_height: i32,
    pub relationship_size: i32,
    pub horizontal_spacing: i32,
    pub vertical_spacing: i32,
    pub padding: i32,
    pub ledge: i32,
    pub corner_radius: i32,
}

impl Default for DimensionConfig {
    fn default() -> Self {
        Self {
            individual_width: 80,
            individual_height: 80,
            relationship_size: 40,
            horizontal_spacing: 80,
            vertical_spacing: 160,
            padding: 60,
            ledge: 20,
            corner_radius: 10,
        }
    }
}

impl DimensionConfig {
    pub fn slot_width(&self) -> i32 {
        self.individual_width + self.horizontal_spacing
    }

    pub fn row_height(&self) -> i32 {
        self.individual_height + self.vertical_spacing
    }

    /// Unit problems that would leave router grid lines off the node centers
    /// or make ledges overlap neighbouring boxes.
    pub fn check_units(&self) -> Vec<String> {
        let mut problems = Vec::new();
        let positive = [
            ("individualWidth", self.individual_width),
            ("individualHeight", self.individual_height),
            ("relationshipSize", self.relationship_size),
            ("ledge", self.ledge),
        ];
        for (name, value) in positive {
            if value <= 0 {
                problems.push(format!("{name} must be positive (got {value})"));
            }
        }
        for (name, value) in [
            ("individualWidth", self.individual_width),
            ("individualHeight", self.individual_height),
            ("relationshipSize", self.relationship_size),
        ] {
            if value % 2 != 0 {
                problems.push(format!("{name} should be even (got {value})"));
            }
        }
        if self.ledge > 0 {
            for (name, value) in [
                ("horizontalSpacing", self.horizontal_spacing),
                ("verticalSpacing", self.vertical_spacing),
            ] {
                if value % self.ledge != 0 {
                    problems.push(format!(
                        "{name} ({value}) should be a multiple of ledge ({})",
                        self.ledge
                    ));
                }
                if value < self.ledge * 2 {
                    problems.push(format!(
                        "{name} ({value}) should be at least twice the ledge ({})",
                        self.ledge
                    ));
                }
            }
        }
        if self.slot_width() % 2 != 0 {
            problems.push(format!(
                "individualWidth + horizontalSpacing should be even (got {})",
                self.slot_width()
            ));
        }
        problems
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutingConfig {
    /// Grid cells per layout slot on the first routing attempt.
    pub initial_subdivisions: usize,
    /// Highest subdivision count tried before giving up on an edge.
    pub max_subdivisions: usize,
    /// Cost multiplier for a segment that changes direction.
    pub turn_multiplier: u64,
    /// Cost multiplier, in percent, for a segment touching another edge's path.
    pub overlap_multiplier_percent: u64,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            initial_subdivisions: 2,
            max_subdivisions: 6,
            turn_multiplier: 3,
            overlap_multiplier_percent: 150,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutConfig {
    pub dimensions: DimensionConfig,
    pub routing: RoutingConfig,
    pub filter_unrelated_individuals: bool,
    pub visible_diseases: Option<Vec<String>>,
    pub root_id: Option<String>,
    pub skip_malformed_records: bool,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            dimensions: DimensionConfig::default(),
            routing: RoutingConfig::default(),
            filter_unrelated_individuals: false,
            visible_diseases: None,
            root_id: None,
            skip_malformed_records: false,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Number(f64),
    String(String),
}

impl NumberOrString {
    fn as_i32(&self) -> Option<i32> {
        match self {
            NumberOrString::Number(val) => Some(val.round() as i32),
            NumberOrString::String(val) => val.trim().trim_end_matches("px").parse::<i32>().ok(),
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct DimensionConfigFile {
    individual_width: Option<NumberOrString>,
    individual_height: Option<NumberOrString>,
    relationship_size: Option<NumberOrString>,
    #[serde(alias = "individualXSpacing")]
    horizontal_spacing: Option<NumberOrString>,
    #[serde(alias = "individualYSpacing")]
    vertical_spacing: Option<NumberOrString>,
    #[serde(alias = "graphPadding")]
    padding: Option<NumberOrString>,
    #[serde(alias = "edgeLedge")]
    ledge: Option<NumberOrString>,
    corner_radius: Option<NumberOrString>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct RoutingConfigFile {
    initial_subdivisions: Option<usize>,
    max_subdivisions: Option<usize>,
    turn_multiplier: Option<u64>,
    overlap_multiplier_percent: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct ConfigFile {
    #[serde(alias = "dimensionOpts")]
    dimensions: Option<DimensionConfigFile>,
    routing: Option<RoutingConfigFile>,
    filter_unrelated_individuals: Option<bool>,
    visible_diseases: Option<Vec<String>>,
    root_id: Option<String>,
    skip_malformed_records: Option<bool>,
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<LayoutConfig> {
    let Some(path) = path else {
        return Ok(LayoutConfig::default());
    };
    let contents = std::fs::read_to_string(path)?;
    parse_config(&contents)
}

pub fn parse_config(contents: &str) -> anyhow::Result<LayoutConfig> {
    let parsed: ConfigFile = match serde_json::from_str(contents) {
        Ok(parsed) => parsed,
        Err(json_err) => json5::from_str(contents)
            .map_err(|_| anyhow::anyhow!("invalid layout config: {json_err}"))?,
    };
    let mut config = LayoutConfig::default();

    if let Some(dims) = parsed.dimensions {
        let target = &mut config.dimensions;
        let fields = [
            (dims.individual_width, &mut target.individual_width),
            (dims.individual_height, &mut target.individual_height),
            (dims.relationship_size, &mut target.relationship_size),
            (dims.horizontal_spacing, &mut target.horizontal_spacing),
            (dims.vertical_spacing, &mut target.vertical_spacing),
            (dims.padding, &mut target.padding),
            (dims.ledge, &mut target.ledge),
            (dims.corner_radius, &mut target.corner_radius),
        ];
        for (value, slot) in fields {
            if let Some(v) = value.as_ref().and_then(NumberOrString::as_i32) {
                *slot = v;
            }
        }
    }

    if let Some(routing) = parsed.routing {
        if let Some(v) = routing.initial_subdivisions {
            config.routing.initial_subdivisions = v.max(1);
        }
        if let Some(v) = routing.max_subdivisions {
            config.routing.max_subdivisions = v;
        }
        if let Some(v) = routing.turn_multiplier {
            config.routing.turn_multiplier = v.max(1);
        }
        if let Some(v) = routing.overlap_multiplier_percent {
            config.routing.overlap_multiplier_percent = v.max(100);
        }
        config.routing.max_subdivisions = config
            .routing
            .max_subdivisions
            .max(config.routing.initial_subdivisions);
    }

    if let Some(v) = parsed.filter_unrelated_individuals {
        config.filter_unrelated_individuals = v;
    }
    if let Some(v) = parsed.visible_diseases {
        config.visible_diseases = Some(v);
    }
    if let Some(v) = parsed.root_id {
        config.root_id = Some(v);
    }
    if let Some(v) = parsed.skip_malformed_records {
        config.skip_malformed_records = v;
    }

    Ok(config)
}
