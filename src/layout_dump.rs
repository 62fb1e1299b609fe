use crate::dataset::RejectedRecord;
use crate::ir::Individual;
use crate::layout::{Drawing, EdgeKind, Layout, NodeRef};
use indexmap::IndexMap;
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutDump {
    pub width: i32,
    pub height: i32,
    pub max_height_index: usize,
    pub individuals: Vec<IndividualDump>,
    pub relationships: Vec<RelationshipDump>,
    pub edges: Vec<EdgeDump>,
    pub disease_index: IndexMap<String, usize>,
    pub detached: Vec<Individual>,
    pub rejected: Vec<RejectedRecord>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DrawingDump {
    pub height_index: usize,
    pub order: usize,
    pub x_coord: i32,
    pub y_coord: i32,
}

impl From<&Drawing> for DrawingDump {
    fn from(drawing: &Drawing) -> Self {
        Self {
            height_index: drawing.height_index,
            order: drawing.order,
            x_coord: drawing.x,
            y_coord: drawing.y,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndividualDump {
    #[serde(flatten)]
    pub record: Individual,
    pub order_based_name: String,
    #[serde(rename = "_drawing")]
    pub drawing: DrawingDump,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationshipDump {
    pub id: String,
    pub partners: Vec<String>,
    pub children: Vec<String>,
    #[serde(rename = "_drawing")]
    pub drawing: DrawingDump,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeDump {
    pub kind: EdgeKind,
    pub from: String,
    pub to: String,
    pub vertices: Vec<[i32; 2]>,
    pub adjustable: bool,
    pub direct: bool,
    pub path: String,
}

impl LayoutDump {
    pub fn from_layout(layout: &Layout, corner_radius: i32) -> Self {
        let graph = &layout.graph;
        let individuals = graph
            .individuals
            .iter()
            .enumerate()
            .map(|(idx, ind)| IndividualDump {
                record: ind.record.clone(),
                order_based_name: layout.order_based_names[idx].clone(),
                drawing: DrawingDump::from(&layout.drawing.individuals[idx]),
            })
            .collect();

        let ids = |members: &[usize]| -> Vec<String> {
            members
                .iter()
                .map(|&idx| graph.individuals[idx].id().to_string())
                .collect()
        };
        let relationships = graph
            .relationships
            .iter()
            .enumerate()
            .map(|(idx, rel)| RelationshipDump {
                id: rel.id.clone(),
                partners: ids(&rel.partners),
                children: ids(&rel.children),
                drawing: DrawingDump::from(&layout.drawing.relationships[idx]),
            })
            .collect();

        let node_id = |node: NodeRef| layout.node_id(node).to_string();
        let edges = layout
            .edges
            .iter()
            .map(|edge| EdgeDump {
                kind: edge.kind,
                from: node_id(edge.from),
                to: node_id(edge.to),
                vertices: edge.points.iter().map(|&(x, y)| [x, y]).collect(),
                adjustable: edge.adjustable,
                direct: edge.direct,
                path: edge.svg_path(corner_radius),
            })
            .collect();

        LayoutDump {
            width: layout.width,
            height: layout.height,
            max_height_index: layout.max_height_index,
            individuals,
            relationships,
            edges,
            disease_index: layout.disease_index.clone(),
            detached: layout.detached.clone(),
            rejected: layout.rejected.clone(),
        }
    }
}

/// Writes the dump as pretty JSON to `path`, or to stdout when `path` is
/// `None`.
pub fn write_layout_dump(
    path: Option<&Path>,
    layout: &Layout,
    corner_radius: i32,
) -> anyhow::Result<()> {
    let dump = LayoutDump::from_layout(layout, corner_radius);
    match path {
        Some(path) => {
            let writer = BufWriter::new(File::create(path)?);
            serde_json::to_writer_pretty(writer, &dump)?;
        }
        None => {
            let stdout = std::io::stdout();
            let mut writer = stdout.lock();
            serde_json::to_writer_pretty(&mut writer, &dump)?;
            writer.write_all(b"\n")?;
        }
    }
    Ok(())
}
