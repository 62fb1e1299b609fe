use pedigree_layout::config::LayoutConfig;
use pedigree_layout::layout::{EdgeKind, Layout, NodeRef, Point, compute_layout};
use pedigree_layout::layout_dump::LayoutDump;
use pedigree_layout::parse_dataset;
use std::path::Path;

fn fixtures_dir() -> std::path::PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
}

fn load(name: &str) -> Vec<serde_json::Value> {
    let path = fixtures_dir().join(name);
    let input = std::fs::read_to_string(&path).expect("fixture missing");
    parse_dataset(&input).expect("fixture parse failed")
}

fn layout_fixture(name: &str) -> Layout {
    layout_with(name, &LayoutConfig::default())
}

fn layout_with(name: &str, config: &LayoutConfig) -> Layout {
    compute_layout(&load(name), config)
        .unwrap_or_else(|err| panic!("layout failed for {name}: {err}"))
}

fn all_fixtures() -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(fixtures_dir())
        .expect("fixtures dir")
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.file_name().to_string_lossy().to_string())
        .filter(|name| name.ends_with(".json"))
        .collect();
    names.sort();
    names
}

fn drawing_of<'a>(layout: &'a Layout, id: &str) -> &'a pedigree_layout::layout::Drawing {
    layout
        .individual_drawing(id)
        .unwrap_or_else(|| panic!("{id} has no drawing"))
}

fn rows(layout: &Layout) -> Vec<Vec<NodeRef>> {
    let mut rows = vec![Vec::new(); layout.max_height_index + 1];
    for node in layout.graph.nodes() {
        rows[layout.drawing.height(node)].push(node);
    }
    for row in &mut rows {
        row.sort_by_key(|&node| layout.drawing.get(node).order);
    }
    rows
}

/// Positive-length collinear overlap between two axis-aligned segments.
fn overlaps(a: (Point, Point), b: (Point, Point)) -> bool {
    let span = |p: i32, q: i32| (p.min(q), p.max(q));
    let horizontal = |s: (Point, Point)| s.0.1 == s.1.1;
    if horizontal(a) && horizontal(b) && a.0.1 == b.0.1 {
        let (a0, a1) = span(a.0.0, a.1.0);
        let (b0, b1) = span(b.0.0, b.1.0);
        return a0.max(b0) < a1.min(b1);
    }
    if !horizontal(a) && !horizontal(b) && a.0.0 == b.0.0 {
        let (a0, a1) = span(a.0.1, a.1.1);
        let (b0, b1) = span(b.0.1, b.1.1);
        return a0.max(b0) < a1.min(b1);
    }
    false
}

#[test]
fn single_individual_gets_padded_canvas() {
    let layout = layout_fixture("single.json");
    let p = drawing_of(&layout, "p");
    assert_eq!((p.x, p.y), (100, 100));
    assert_eq!((layout.width, layout.height), (200, 360));
    assert_eq!(layout.max_height_index, 0);
    assert!(layout.edges.is_empty());
}

#[test]
fn parents_flank_relationship_above_proband() {
    let layout = layout_fixture("proband_parents.json");
    let p = drawing_of(&layout, "p");
    let f = drawing_of(&layout, "f");
    let m = drawing_of(&layout, "m");
    let rel = layout.relationship_drawing("rel:f&m").expect("relationship");

    assert_eq!(layout.max_height_index, 1);
    assert_eq!((p.height_index, f.height_index, m.height_index), (0, 1, 1));
    assert!(f.x < rel.x && rel.x < m.x);
    assert_eq!(rel.x, p.x);
    assert_eq!(rel.y, f.y);
    assert!(p.y > rel.y);

    let kinds: Vec<EdgeKind> = layout.edges.iter().map(|e| e.kind).collect();
    assert!(kinds.contains(&EdgeKind::Descent));
    assert!(kinds.contains(&EdgeKind::ChildDrop));
    assert!(!kinds.contains(&EdgeKind::SiblingBar));
    assert_eq!(layout.adjustable_edges().count(), 2);
    for edge in layout.adjustable_edges() {
        assert_eq!(edge.segment_count(), 1, "partners sit beside the relationship");
    }
}

#[test]
fn siblings_hang_from_one_bar() {
    let layout = layout_fixture("siblings.json");
    let a = drawing_of(&layout, "a");
    let b = drawing_of(&layout, "b");
    let rel = layout.relationship_drawing("rel:f&m").expect("relationship");
    assert_eq!(a.height_index, b.height_index);
    assert_eq!(a.order.abs_diff(b.order), 1);
    assert!(a.x.min(b.x) < rel.x && rel.x < a.x.max(b.x));

    let dims = LayoutConfig::default().dimensions;
    let bar_y = a.y - dims.individual_height / 2 - dims.vertical_spacing / 2;
    let bars: Vec<_> = layout
        .edges
        .iter()
        .filter(|e| e.kind == EdgeKind::SiblingBar)
        .collect();
    assert_eq!(bars.len(), 1);
    assert_eq!(bars[0].points, vec![(a.x.min(b.x), bar_y), (a.x.max(b.x), bar_y)]);
    let drops = layout
        .edges
        .iter()
        .filter(|e| e.kind == EdgeKind::ChildDrop)
        .count();
    assert_eq!(drops, 2);
}

#[test]
fn unrelated_individual_is_detached_when_filtering() {
    let config = LayoutConfig {
        filter_unrelated_individuals: true,
        ..LayoutConfig::default()
    };
    let layout = layout_with("unrelated.json", &config);
    assert!(layout.individual_drawing("neighbour").is_none());
    assert_eq!(layout.detached.len(), 1);
    assert_eq!(layout.detached[0].id, "neighbour");
    assert!(layout.disease_index.is_empty());
}

#[test]
fn unrelated_individual_is_placed_right_without_filtering() {
    let layout = layout_fixture("unrelated.json");
    let p = drawing_of(&layout, "p");
    let neighbour = drawing_of(&layout, "neighbour");
    assert!(layout.detached.is_empty());
    assert_eq!(neighbour.height_index, p.height_index);
    assert!(neighbour.x > p.x);
    assert_eq!(layout.disease_index.get("Asthma"), Some(&1));
}

#[test]
fn third_marriage_detours_around_the_first() {
    let layout = layout_fixture("three_marriages.json");
    let a = drawing_of(&layout, "a");
    let s0 = drawing_of(&layout, "s0");
    let s2 = drawing_of(&layout, "s2");
    assert!(a.x < s0.x && s0.x < s2.x);

    let a_idx = layout.individual_index("a").expect("a");
    let far = layout
        .adjustable_edges()
        .filter(|edge| edge.from == NodeRef::Individual(a_idx))
        .max_by_key(|edge| edge.segment_count())
        .expect("edges from a");
    assert_eq!(layout.node_id(far.to), "rel:a&s2");
    assert!(far.segment_count() >= 3, "got {:?}", far.points);
    let row_y = a.y;
    assert!(far.points[1..far.points.len() - 1]
        .iter()
        .any(|&(_, y)| y != row_y));
}

#[test]
fn partner_in_older_generation_connects_from_below() {
    let layout = layout_fixture("niece_marriage.json");
    let old = drawing_of(&layout, "old");
    let young = drawing_of(&layout, "young");
    let rel = layout
        .relationship_drawing("rel:old&young")
        .expect("relationship");
    assert_eq!(old.height_index, young.height_index + 1);
    assert_eq!(rel.height_index, young.height_index);

    let dims = LayoutConfig::default().dimensions;
    let old_idx = layout.individual_index("old").expect("old");
    let edge = layout
        .adjustable_edges()
        .find(|edge| edge.from == NodeRef::Individual(old_idx))
        .expect("edge from old");
    let first = edge.points[0];
    let last = edge.points[edge.points.len() - 1];
    assert_eq!(first, (old.x, old.y + dims.individual_height / 2 + dims.ledge));
    assert_eq!(last, (rel.x, rel.y - dims.relationship_size / 2 - dims.ledge));
}

#[test]
fn relationships_sit_one_row_above_their_children() {
    for name in all_fixtures() {
        let layout = layout_fixture(&name);
        for (idx, rel) in layout.graph.relationships.iter().enumerate() {
            let height = layout.drawing.relationships[idx].height_index;
            let lowest = rel
                .partners
                .iter()
                .map(|&p| layout.drawing.individuals[p].height_index)
                .min()
                .expect("partners");
            assert_eq!(height, lowest, "{name}: {}", rel.id);
            for &child in &rel.children {
                assert_eq!(
                    layout.drawing.individuals[child].height_index + 1,
                    height,
                    "{name}: {}",
                    rel.id
                );
            }
        }
    }
}

#[test]
fn rows_are_dense_and_left_to_right() {
    let dims = LayoutConfig::default().dimensions;
    for name in all_fixtures() {
        let layout = layout_fixture(&name);
        for (height, row) in rows(&layout).iter().enumerate() {
            for (pos, &node) in row.iter().enumerate() {
                let drawing = layout.drawing.get(node);
                assert_eq!(drawing.order, pos, "{name} row {height}");
                assert_eq!(
                    drawing.y,
                    dims.padding
                        + dims.individual_height / 2
                        + (layout.max_height_index - height) as i32 * dims.row_height(),
                    "{name} row {height}"
                );
            }
            for pair in row.windows(2) {
                let left = layout.drawing.get(pair[0]);
                let right = layout.drawing.get(pair[1]);
                assert!(
                    right.x - left.x >= dims.slot_width(),
                    "{name} row {height}: {} then {}",
                    left.x,
                    right.x
                );
            }
        }
        for node in layout.graph.nodes() {
            let d = layout.drawing.get(node);
            assert!(d.x >= dims.padding && d.x <= layout.width - dims.padding, "{name}");
        }
    }
}

#[test]
fn adjustable_edges_are_orthogonal_and_meet_their_stubs() {
    for name in all_fixtures() {
        let layout = layout_fixture(&name);
        let stubs: Vec<_> = layout
            .edges
            .iter()
            .filter(|e| e.kind == EdgeKind::PartnerStub)
            .collect();
        for edge in layout.adjustable_edges() {
            assert!(edge.points.len() >= 2, "{name}");
            for pair in edge.points.windows(2) {
                let (a, b) = (pair[0], pair[1]);
                assert!(a != b && (a.0 == b.0 || a.1 == b.1), "{name}: {:?}", edge.points);
            }
            let first = edge.points[0];
            let last = edge.points[edge.points.len() - 1];
            assert!(
                stubs.iter().any(|s| s.from == edge.from && s.points[1] == first),
                "{name}: no stub reaches {first:?}"
            );
            assert!(
                stubs.iter().any(|s| s.from == edge.to && s.points[0] == last),
                "{name}: no stub leaves {last:?}"
            );
        }
    }
}

#[test]
fn adjustable_edges_never_share_a_stretch() {
    for name in all_fixtures() {
        let layout = layout_fixture(&name);
        let edges: Vec<_> = layout.adjustable_edges().collect();
        for (i, a) in edges.iter().enumerate() {
            for b in &edges[i + 1..] {
                for sa in a.points.windows(2) {
                    for sb in b.points.windows(2) {
                        assert!(
                            !overlaps((sa[0], sa[1]), (sb[0], sb[1])),
                            "{name}: {:?} and {:?} share a stretch",
                            a.points,
                            b.points
                        );
                    }
                }
            }
        }
    }
}

#[test]
fn every_child_is_reached_by_a_drop() {
    for name in all_fixtures() {
        let layout = layout_fixture(&name);
        for (idx, rel) in layout.graph.relationships.iter().enumerate() {
            for &child in &rel.children {
                let drop = layout
                    .edges
                    .iter()
                    .find(|e| {
                        e.kind == EdgeKind::ChildDrop
                            && e.from == NodeRef::Relationship(idx)
                            && e.to == NodeRef::Individual(child)
                    })
                    .unwrap_or_else(|| panic!("{name}: missing drop"));
                assert_eq!(drop.points[0].0, layout.drawing.individuals[child].x);
            }
        }
    }
}

#[test]
fn layout_is_deterministic() {
    for name in all_fixtures() {
        let first = serde_json::to_string(&LayoutDump::from_layout(&layout_fixture(&name), 10))
            .expect("dump");
        let second = serde_json::to_string(&LayoutDump::from_layout(&layout_fixture(&name), 10))
            .expect("dump");
        assert_eq!(first, second, "{name}");
    }
}

#[test]
fn three_generations_keep_couples_and_legend() {
    let layout = layout_fixture("three_generations.json");
    assert_eq!(layout.max_height_index, 3);
    let proband = layout.individual_index("3").expect("proband");
    assert_eq!(layout.order_based_names[proband].chars().last(), Some('p'));
    assert!(layout.order_based_names[proband].starts_with("III-"));

    let names: Vec<&str> = layout.disease_index.keys().map(String::as_str).collect();
    assert_eq!(names.first(), Some(&"Long QT"));
    assert!(names.contains(&"Cardiomyopathy"));

    let rel = layout.relationship_drawing("rel:12&13").expect("rel");
    let child = drawing_of(&layout, "14");
    assert_eq!(child.height_index + 1, rel.height_index);
}

#[test]
fn visible_diseases_fix_the_legend() {
    let config = LayoutConfig {
        visible_diseases: Some(vec!["Cardiomyopathy".to_string(), "Other".to_string()]),
        ..LayoutConfig::default()
    };
    let layout = layout_with("three_generations.json", &config);
    let index: Vec<(&str, usize)> = layout
        .disease_index
        .iter()
        .map(|(k, v)| (k.as_str(), *v))
        .collect();
    assert_eq!(index, vec![("Cardiomyopathy", 1), ("Other", 2)]);
}

/// Foreign nodes on the row between a partner and its relationship.
fn partner_separation(layout: &Layout) -> Vec<(String, usize, usize)> {
    let mut found = Vec::new();
    for (idx, rel) in layout.graph.relationships.iter().enumerate() {
        let rel_drawing = layout.drawing.relationships[idx];
        for &partner in &rel.partners {
            let partner_drawing = layout.drawing.individuals[partner];
            if partner_drawing.height_index != rel_drawing.height_index {
                continue;
            }
            let between = partner_drawing.order.abs_diff(rel_drawing.order) - 1;
            let marriages = layout.graph.individuals[partner].marital_relationships.len();
            found.push((
                format!("{} to {}", layout.graph.individuals[partner].id(), rel.id),
                between,
                marriages,
            ));
        }
    }
    found
}

#[test]
fn partners_stay_beside_their_relationships() {
    for name in all_fixtures() {
        let layout = layout_fixture(&name);
        for (pair, between, marriages) in partner_separation(&layout) {
            // Each earlier marriage may put its relationship and spouse in the way.
            assert!(
                between <= 2 * (marriages - 1),
                "{name}: {pair} passes over {between} nodes"
            );
        }
    }
}

#[test]
fn descendant_pedigree_routes_with_every_couple_adjacent() {
    let layout = layout_fixture("descendants.json");
    assert_eq!(layout.max_height_index, 4);
    for (pair, between, _) in partner_separation(&layout) {
        assert_eq!(between, 0, "{pair}");
    }
    for edge in layout.adjustable_edges() {
        assert_eq!(edge.segment_count(), 1, "{:?}", edge.points);
    }
}

fn assert_canvas_covers_one_node(layout: &Layout, config: &LayoutConfig, what: &str) {
    let dims = &config.dimensions;
    assert!(
        layout.width >= 2 * dims.padding + dims.individual_width,
        "{what}: width {}",
        layout.width
    );
    assert!(
        layout.height >= 2 * dims.padding + dims.individual_height,
        "{what}: height {}",
        layout.height
    );
}

#[test]
fn canvas_grows_with_spacing() {
    for name in ["three_generations.json", "descendants.json"] {
        let mut last = (0, 0);
        for (horizontal, vertical) in [(80, 160), (120, 200), (160, 240)] {
            let mut config = LayoutConfig::default();
            config.dimensions.horizontal_spacing = horizontal;
            config.dimensions.vertical_spacing = vertical;
            let layout = layout_with(name, &config);
            let what = format!("{name} at {horizontal}x{vertical}");
            assert_canvas_covers_one_node(&layout, &config, &what);
            assert!(
                layout.width >= last.0 && layout.height >= last.1,
                "{what}: {}x{} after {last:?}",
                layout.width,
                layout.height
            );
            last = (layout.width, layout.height);
        }
    }
}

#[test]
fn canvas_grows_with_the_dataset() {
    let mut records = load("descendants.json");
    for record in &mut records {
        if let Some(fields) = record.as_object_mut() {
            fields.remove("isProband");
        }
    }
    let config = LayoutConfig::default();
    let mut last = (0, 0);
    // Generation boundaries of the fixture.
    for len in [2usize, 8, 26, 80, 242] {
        let layout = compute_layout(&records[..len], &config)
            .unwrap_or_else(|err| panic!("layout failed for {len} records: {err}"));
        let what = format!("first {len} records");
        assert_canvas_covers_one_node(&layout, &config, &what);
        assert!(
            layout.width >= last.0 && layout.height >= last.1,
            "{what}: {}x{} after {last:?}",
            layout.width,
            layout.height
        );
        last = (layout.width, layout.height);
    }
}
