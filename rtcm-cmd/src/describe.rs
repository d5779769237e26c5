use anyhow::{bail, Context, Result};
use rtcm::schema::{Count, HarmonicKind, SchemaNode};
use rtcm::Registry;
use std::io::{stdout, Write};

pub fn describe(identity: Option<&str>, registry: &Registry) -> Result<()> {
    let mut out = String::new();
    match identity {
        Some(identity) => {
            let Some(def) = registry.message(identity) else {
                bail!("No schema found for message type {identity}");
            };
            out.push_str(&format!("{identity}: {}\n", def.description));
            out.push_str(&format!(
                "{:<40} {:>5} {:>14}  {}\n",
                "Field", "Bits", "Scale", "Description"
            ));
            render_nodes(&mut out, &def.nodes, 0);
        }
        None => {
            for id in registry.identities() {
                out.push_str(&format!(
                    "{id:<10} {}\n",
                    registry.description(id).unwrap_or_default()
                ));
            }
        }
    }
    stdout()
        .write_all(out.as_bytes())
        .context("writing to stdout")
}

fn render_count(count: &Count) -> String {
    match count {
        Count::Fixed(n) => n.to_string(),
        Count::Field(name) => name.clone(),
        Count::Indexed { field, .. } => format!("{field}[i]"),
        Count::FieldPlusOne(name) => format!("{name} + 1"),
        Count::Harmonic(h) => {
            let kind = match h.kind {
                HarmonicKind::Cosine => "cosine",
                HarmonicKind::Sine => "sine",
            };
            format!("{kind} terms of {}, {}", h.degree, h.order)
        }
    }
}

fn render_nodes(out: &mut String, nodes: &[SchemaNode], depth: usize) {
    let indent = "  ".repeat(depth);
    for node in nodes {
        match node {
            SchemaNode::Field { name, def } => {
                let scale = if def.is_scaled() {
                    format!("{:e}", def.scale)
                } else {
                    String::new()
                };
                let name = format!("{indent}{name}");
                let width = if def.width == 0 {
                    "-".to_string()
                } else {
                    def.width.to_string()
                };
                out.push_str(&format!(
                    "{name:<40} {width:>5} {scale:>14}  {}\n",
                    def.description
                ));
            }
            SchemaNode::Group { count, children } => {
                out.push_str(&format!("{indent}repeat {}:\n", render_count(count)));
                render_nodes(out, children, depth + 1);
            }
            SchemaNode::Conditional {
                field,
                value,
                children,
            } => {
                out.push_str(&format!("{indent}if {field} == {value}:\n"));
                render_nodes(out, children, depth + 1);
            }
        }
    }
}
