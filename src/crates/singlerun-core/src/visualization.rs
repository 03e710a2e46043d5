//! Plan rendering
//!
//! Renders an [`ExecutionPlan`] in four formats:
//! - **DOT/Graphviz** - `dot -Tpng plan.dot -o plan.png`
//! - **Mermaid** - for markdown and web documentation
//! - **ASCII** - quick console output
//! - **States** - a state-machine JSON document (`StartAt` / `States` with
//!   `Pass`, `Task`, `Choice` and `Succeed` states)
//!
//! # Layout
//!
//! Every renderer works from the same flattened layout of the plan. A guarded
//! segment contributes four nodes:
//!
//! ```text
//! [Check B] ──► <B succeeded?> ──payload == "true"──► [Skip B] ──┐
//!                      └─────────otherwise──────────► [B] ───────┴──► next
//! ```
//!
//! # Example
//!
//! ```rust
//! use singlerun_core::visualization::{visualize, VisualizationOptions};
//! use singlerun_core::{ChainBuilder, Registry, Step};
//!
//! let registry = Registry::builder().unit("A", false)?.unit("B", true)?.build();
//! let plan = ChainBuilder::new("acme")?.build(Step::pass("Start"), &registry);
//!
//! let mermaid = visualize(&plan, &VisualizationOptions::mermaid().with_title("hooks"))?;
//! assert!(mermaid.contains("graph TD"));
//! # Ok::<(), singlerun_core::PlanError>(())
//! ```

use crate::error::{PlanError, Result};
use crate::plan::{Condition, ExecutionPlan, Step};
use serde_json::{json, Map, Value};
use std::fmt;
use std::str::FromStr;

/// Name of the terminal node
///
/// Contains a space, which unit names cannot, so it never collides with a
/// unit's step.
pub const END: &str = "All done";

/// Plan rendering format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisualizationFormat {
    /// DOT format for Graphviz
    Dot,
    /// Mermaid diagram format
    Mermaid,
    /// Simple ASCII art
    Ascii,
    /// State-machine JSON document
    States,
}

impl FromStr for VisualizationFormat {
    type Err = PlanError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "dot" => Ok(Self::Dot),
            "mermaid" => Ok(Self::Mermaid),
            "ascii" => Ok(Self::Ascii),
            "states" => Ok(Self::States),
            other => Err(PlanError::Configuration(format!(
                "unknown format '{}', expected ascii, mermaid, dot or states",
                other
            ))),
        }
    }
}

impl fmt::Display for VisualizationFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Dot => "dot",
            Self::Mermaid => "mermaid",
            Self::Ascii => "ascii",
            Self::States => "states",
        };
        f.write_str(name)
    }
}

/// Rendering options
#[derive(Debug, Clone)]
pub struct VisualizationOptions {
    /// Output format
    pub format: VisualizationFormat,
    /// Annotate nodes with their step kind and tenant
    pub include_details: bool,
    /// Diagram title, or the `Comment` of a state-machine document
    pub title: Option<String>,
}

impl Default for VisualizationOptions {
    fn default() -> Self {
        Self {
            format: VisualizationFormat::Dot,
            include_details: false,
            title: None,
        }
    }
}

impl VisualizationOptions {
    pub fn new(format: VisualizationFormat) -> Self {
        Self {
            format,
            ..Default::default()
        }
    }

    pub fn dot() -> Self {
        Self::new(VisualizationFormat::Dot)
    }

    pub fn mermaid() -> Self {
        Self::new(VisualizationFormat::Mermaid)
    }

    pub fn ascii() -> Self {
        Self::new(VisualizationFormat::Ascii)
    }

    pub fn states() -> Self {
        Self::new(VisualizationFormat::States)
    }

    /// Set title
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Include node details
    pub fn with_details(mut self) -> Self {
        self.include_details = true;
        self
    }
}

/// Render a plan as a string
///
/// # Errors
///
/// [`PlanError::Validation`] if two steps share an identifier (for example a
/// unit named like the initial step).
pub fn visualize(plan: &ExecutionPlan, options: &VisualizationOptions) -> Result<String> {
    let layout = Layout::of(plan)?;
    Ok(match options.format {
        VisualizationFormat::Dot => render_dot(&layout, plan, options),
        VisualizationFormat::Mermaid => render_mermaid(&layout, plan, options),
        VisualizationFormat::Ascii => render_ascii(&layout, plan, options),
        VisualizationFormat::States => {
            serde_json::to_string_pretty(&state_machine(&layout, options))?
        }
    })
}

/// State-machine document for a plan
///
/// Check steps become key-value `GetItem` tasks keyed by `unit` and `tenant`
/// whose result lands in `$.<unit>.payload`; the following `Choice` state
/// compares that path with the success sentinel.
pub fn to_state_machine(plan: &ExecutionPlan, options: &VisualizationOptions) -> Result<Value> {
    Ok(state_machine(&Layout::of(plan)?, options))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NodeKind {
    Entry,
    Invoke,
    Check,
    Choice,
    Skip,
    End,
}

#[derive(Debug)]
struct Node<'a> {
    id: String,
    kind: NodeKind,
    step: Option<&'a Step>,
}

#[derive(Debug)]
struct Edge {
    from: usize,
    to: usize,
    label: Option<String>,
}

/// Flattened plan: nodes in execution order plus edges between them
#[derive(Debug)]
struct Layout<'a> {
    nodes: Vec<Node<'a>>,
    edges: Vec<Edge>,
}

impl<'a> Layout<'a> {
    fn of(plan: &'a ExecutionPlan) -> Result<Self> {
        let mut layout = Layout {
            nodes: Vec::new(),
            edges: Vec::new(),
        };
        let mut tails: Vec<usize> = Vec::new();

        for step in plan.steps() {
            let node = layout.add(step)?;
            layout.connect(&mut tails, node);

            match step {
                Step::Branch {
                    condition,
                    on_match,
                    otherwise,
                    ..
                } => {
                    let matched = layout.add(on_match)?;
                    let fallback = layout.add(otherwise)?;
                    layout.edges.push(Edge {
                        from: node,
                        to: matched,
                        label: Some(condition_label(condition)),
                    });
                    layout.edges.push(Edge {
                        from: node,
                        to: fallback,
                        label: Some("otherwise".to_string()),
                    });
                    tails.push(matched);
                    tails.push(fallback);
                }
                _ => tails.push(node),
            }
        }

        let end = layout.push(END.to_string(), NodeKind::End, None)?;
        layout.connect(&mut tails, end);
        Ok(layout)
    }

    fn add(&mut self, step: &'a Step) -> Result<usize> {
        let kind = match step {
            Step::Pass { .. } => NodeKind::Entry,
            Step::Invoke { .. } => NodeKind::Invoke,
            Step::CheckState { .. } => NodeKind::Check,
            Step::Branch { .. } => NodeKind::Choice,
            Step::Skip { .. } => NodeKind::Skip,
        };
        self.push(step.id(), kind, Some(step))
    }

    fn push(&mut self, id: String, kind: NodeKind, step: Option<&'a Step>) -> Result<usize> {
        if self.nodes.iter().any(|n| n.id == id) {
            return Err(PlanError::Validation(format!(
                "step identifier '{}' is used more than once",
                id
            )));
        }
        self.nodes.push(Node { id, kind, step });
        Ok(self.nodes.len() - 1)
    }

    /// Join every dangling node to `to`
    fn connect(&mut self, tails: &mut Vec<usize>, to: usize) {
        for from in tails.drain(..) {
            self.edges.push(Edge {
                from,
                to,
                label: None,
            });
        }
    }

    fn outgoing(&self, from: usize) -> impl Iterator<Item = &Edge> {
        self.edges.iter().filter(move |e| e.from == from)
    }

    fn next_of(&self, from: usize) -> Option<&str> {
        self.outgoing(from)
            .next()
            .map(|e| self.nodes[e.to].id.as_str())
    }
}

fn condition_label(condition: &Condition) -> String {
    format!("{} == \"{}\"", condition.field, condition.equals)
}

fn details(node: &Node<'_>, plan: &ExecutionPlan) -> String {
    match node.kind {
        NodeKind::Entry => "entry".to_string(),
        NodeKind::Invoke => "invoke".to_string(),
        NodeKind::Check => format!("check state\\ntenant: {}", plan.tenant()),
        NodeKind::Choice => "choice".to_string(),
        NodeKind::Skip => "skip".to_string(),
        NodeKind::End => "end".to_string(),
    }
}

fn render_dot(layout: &Layout<'_>, plan: &ExecutionPlan, options: &VisualizationOptions) -> String {
    let mut output = String::new();

    output.push_str("digraph G {\n");
    output.push_str("    rankdir=TB;\n");
    output.push_str("    node [shape=box, style=rounded];\n");

    if let Some(title) = &options.title {
        output.push_str("    labelloc=\"t\";\n");
        output.push_str(&format!("    label=\"{}\";\n", escape_dot(title)));
    }

    for node in &layout.nodes {
        let label = if options.include_details {
            format!("{}\\n{}", escape_dot(&node.id), details(node, plan))
        } else {
            escape_dot(&node.id)
        };
        let shape = match node.kind {
            NodeKind::Entry => ", shape=circle, style=filled, fillcolor=green",
            NodeKind::End => ", shape=doublecircle, style=filled, fillcolor=red",
            NodeKind::Choice => ", shape=diamond, style=filled, fillcolor=lightyellow",
            NodeKind::Check => ", style=\"rounded,filled\", fillcolor=lightblue",
            NodeKind::Skip => ", style=\"rounded,dashed\"",
            NodeKind::Invoke => "",
        };
        output.push_str(&format!(
            "    \"{}\" [label=\"{}\"{}];\n",
            escape_dot(&node.id),
            label,
            shape
        ));
    }

    for edge in &layout.edges {
        let from = escape_dot(&layout.nodes[edge.from].id);
        let to = escape_dot(&layout.nodes[edge.to].id);
        match &edge.label {
            Some(label) => output.push_str(&format!(
                "    \"{}\" -> \"{}\" [label=\"{}\", style=dashed];\n",
                from,
                to,
                escape_dot(label)
            )),
            None => output.push_str(&format!("    \"{}\" -> \"{}\";\n", from, to)),
        }
    }

    output.push_str("}\n");
    output
}

fn render_mermaid(layout: &Layout<'_>, plan: &ExecutionPlan, options: &VisualizationOptions) -> String {
    let mut output = String::new();

    output.push_str("%%{init: {'theme':'base', 'themeVariables': {'primaryColor':'#f4f4f4','primaryTextColor':'#333','primaryBorderColor':'#7C7C7C','lineColor':'#7C7C7C','secondaryColor':'#e8e8e8','tertiaryColor':'#fff'}}}%%\n");
    output.push_str("graph TD\n");

    if let Some(title) = &options.title {
        output.push_str(&format!("    title[\"{}\"]\n", escape_mermaid(title)));
    }

    for (index, node) in layout.nodes.iter().enumerate() {
        let id = mermaid_id(index);
        let label = if options.include_details {
            format!("{}\\n{}", node.id, details(node, plan))
        } else {
            node.id.clone()
        };
        let (open, close, style) = match node.kind {
            NodeKind::Entry => ("((", "))", "fill:#90EE90,stroke:#228B22,stroke-width:3px"),
            NodeKind::End => ("((", "))", "fill:#FFB6C1,stroke:#DC143C,stroke-width:3px"),
            NodeKind::Choice => ("{", "}", "fill:#FFE4B5,stroke:#FF8C00,stroke-width:2px"),
            NodeKind::Check => ("[(", ")]", "fill:#ADD8E6,stroke:#4682B4,stroke-width:2px"),
            NodeKind::Skip => ("[", "]", "fill:#FFFFFF,stroke:#999,stroke-dasharray:4"),
            NodeKind::Invoke => ("[", "]", "fill:#F0F0F0,stroke:#666,stroke-width:2px"),
        };
        output.push_str(&format!(
            "    {}{}\"{}\"{}\n",
            id,
            open,
            escape_mermaid(&label),
            close
        ));
        output.push_str(&format!("    style {} {}\n", id, style));
    }

    for edge in &layout.edges {
        let from = mermaid_id(edge.from);
        let to = mermaid_id(edge.to);
        match &edge.label {
            Some(label) => output.push_str(&format!(
                "    {} -.\"{}\".-> {}\n",
                from,
                escape_mermaid(label),
                to
            )),
            None => output.push_str(&format!("    {} --> {}\n", from, to)),
        }
    }

    output
}

fn render_ascii(layout: &Layout<'_>, plan: &ExecutionPlan, options: &VisualizationOptions) -> String {
    let mut output = String::new();

    let heading = match &options.title {
        Some(title) => format!("{} (tenant: {})", title, plan.tenant()),
        None => format!("Plan (tenant: {})", plan.tenant()),
    };
    output.push_str(&heading);
    output.push('\n');
    output.push_str(&"=".repeat(heading.chars().count()));
    output.push_str("\n\n");

    for (index, node) in layout.nodes.iter().enumerate() {
        match node.kind {
            NodeKind::Choice => output.push_str(&format!("<{}>", node.id)),
            NodeKind::End => output.push_str(&node.id.to_uppercase()),
            _ => output.push_str(&format!("[{}]", node.id)),
        }
        if options.include_details {
            output.push_str(&format!(" ({})", details(node, plan).replace("\\n", ", ")));
        }
        output.push('\n');

        for edge in layout.outgoing(index) {
            let target = &layout.nodes[edge.to].id;
            match &edge.label {
                Some(label) => output.push_str(&format!("  [{}] -> {}\n", label, target)),
                None => output.push_str(&format!("  -> {}\n", target)),
            }
        }
    }

    output
}

fn state_machine(layout: &Layout<'_>, options: &VisualizationOptions) -> Value {
    let mut states = Map::new();

    for (index, node) in layout.nodes.iter().enumerate() {
        let next = layout.next_of(index);
        let state = match (node.kind, node.step) {
            (NodeKind::End, _) => json!({ "Type": "Succeed" }),
            (NodeKind::Check, Some(Step::CheckState { unit, tenant })) => json!({
                "Type": "Task",
                "Resource": "state:getItem",
                "Parameters": {
                    "Key": { "unit": unit, "tenant": tenant }
                },
                "ResultSelector": { "payload.$": "$.Item.payload" },
                "ResultPath": format!("$.{}", unit),
                "Next": next,
            }),
            (NodeKind::Choice, Some(Step::Branch { unit, condition, .. })) => {
                let mut outcomes = layout.outgoing(index);
                let matched = outcomes.next().map(|e| layout.nodes[e.to].id.as_str());
                let fallback = outcomes.next().map(|e| layout.nodes[e.to].id.as_str());
                json!({
                    "Type": "Choice",
                    "Choices": [{
                        "Variable": format!("$.{}.{}", unit, condition.field),
                        "StringEquals": condition.equals,
                        "Next": matched,
                    }],
                    "Default": fallback,
                })
            }
            (NodeKind::Invoke, Some(step)) => json!({
                "Type": "Task",
                "Resource": format!("invoke:{}", step.unit().unwrap_or_default()),
                "ResultPath": Value::Null,
                "Next": next,
            }),
            _ => json!({ "Type": "Pass", "Next": next }),
        };
        states.insert(node.id.clone(), state);
    }

    let mut document = Map::new();
    if let Some(title) = &options.title {
        document.insert("Comment".to_string(), Value::String(title.clone()));
    }
    if let Some(first) = layout.nodes.first() {
        document.insert("StartAt".to_string(), Value::String(first.id.clone()));
    }
    document.insert("States".to_string(), Value::Object(states));
    Value::Object(document)
}

/// Escape special characters for DOT format
fn escape_dot(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}

/// Escape special characters for Mermaid format
fn escape_mermaid(s: &str) -> String {
    s.replace('"', "&quot;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Mermaid node ids must be plain identifiers; step ids contain spaces
fn mermaid_id(index: usize) -> String {
    format!("n{}", index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::ChainBuilder;
    use crate::unit::Registry;

    fn scenario() -> ExecutionPlan {
        let registry = Registry::builder()
            .unit("A", false)
            .unwrap()
            .unit("B", true)
            .unwrap()
            .build();
        ChainBuilder::new("acme")
            .unwrap()
            .build(Step::pass("Start"), &registry)
    }

    #[test]
    fn test_layout_of_mixed_plan() {
        let plan = scenario();
        let layout = Layout::of(&plan).unwrap();

        let ids: Vec<&str> = layout.nodes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["Start", "A", "Check B", "B succeeded?", "Skip B", "B", END]);

        // both branch outcomes converge on the end node
        let into_end: Vec<&str> = layout
            .edges
            .iter()
            .filter(|e| e.to == 6)
            .map(|e| layout.nodes[e.from].id.as_str())
            .collect();
        assert_eq!(into_end, vec!["Skip B", "B"]);
    }

    #[test]
    fn test_dot() {
        let dot = visualize(&scenario(), &VisualizationOptions::dot()).unwrap();

        assert!(dot.contains("digraph G"));
        assert!(dot.contains("\"Start\" -> \"A\";"));
        assert!(dot.contains("\"A\" -> \"Check B\";"));
        assert!(dot.contains("\"B succeeded?\" -> \"Skip B\" [label=\"payload == \\\"true\\\"\", style=dashed];"));
        assert!(dot.contains("\"B succeeded?\" -> \"B\" [label=\"otherwise\", style=dashed];"));
        assert!(dot.contains("shape=diamond"));
    }

    #[test]
    fn test_mermaid() {
        let mermaid = visualize(
            &scenario(),
            &VisualizationOptions::mermaid().with_title("deploy hooks"),
        )
        .unwrap();

        assert!(mermaid.contains("%%{init:"));
        assert!(mermaid.contains("graph TD"));
        assert!(mermaid.contains("deploy hooks"));
        assert!(mermaid.contains("n0((\"Start\"))"));
        assert!(mermaid.contains("n3{\"B succeeded?\"}"));
        assert!(mermaid.contains("-.\"otherwise\".->"));
        assert!(mermaid.contains("#FFE4B5"));
    }

    #[test]
    fn test_ascii() {
        let ascii = visualize(&scenario(), &VisualizationOptions::ascii()).unwrap();

        assert!(ascii.starts_with("Plan (tenant: acme)\n"));
        assert!(ascii.contains("[Start]\n  -> A\n"));
        assert!(ascii.contains("<B succeeded?>\n  [payload == \"true\"] -> Skip B\n  [otherwise] -> B\n"));
        assert!(ascii.trim_end().ends_with("DONE"));
    }

    #[test]
    fn test_ascii_with_details() {
        let ascii = visualize(&scenario(), &VisualizationOptions::ascii().with_details()).unwrap();
        assert!(ascii.contains("[Check B] (check state, tenant: acme)"));
    }

    #[test]
    fn test_state_machine() {
        let doc = to_state_machine(&scenario(), &VisualizationOptions::states().with_title("hooks")).unwrap();

        assert_eq!(doc["Comment"], "hooks");
        assert_eq!(doc["StartAt"], "Start");

        let states = &doc["States"];
        assert_eq!(states["Start"], json!({"Type": "Pass", "Next": "A"}));
        assert_eq!(states["A"]["Type"], "Task");
        assert_eq!(states["A"]["Next"], "Check B");

        let check = &states["Check B"];
        assert_eq!(check["Resource"], "state:getItem");
        assert_eq!(check["Parameters"]["Key"], json!({"unit": "B", "tenant": "acme"}));
        assert_eq!(check["ResultPath"], "$.B");
        assert_eq!(check["Next"], "B succeeded?");

        let choice = &states["B succeeded?"];
        assert_eq!(choice["Type"], "Choice");
        assert_eq!(choice["Choices"][0]["Variable"], "$.B.payload");
        assert_eq!(choice["Choices"][0]["StringEquals"], "true");
        assert_eq!(choice["Choices"][0]["Next"], "Skip B");
        assert_eq!(choice["Default"], "B");

        assert_eq!(states["Skip B"], json!({"Type": "Pass", "Next": "All done"}));
        assert_eq!(states["B"]["Next"], "All done");
        assert_eq!(states["All done"], json!({"Type": "Succeed"}));
    }

    #[test]
    fn test_states_format_is_json() {
        let rendered = visualize(&scenario(), &VisualizationOptions::states()).unwrap();
        let parsed: Value = serde_json::from_str(&rendered).unwrap();
        assert_eq!(parsed["StartAt"], "Start");
        assert!(parsed.get("Comment").is_none());
    }

    #[test]
    fn test_empty_plan_goes_straight_to_end() {
        let plan = ChainBuilder::new("acme")
            .unwrap()
            .build(Step::pass("Start"), &Registry::default());
        let doc = to_state_machine(&plan, &VisualizationOptions::states()).unwrap();

        assert_eq!(doc["States"]["Start"]["Next"], END);
    }

    #[test]
    fn test_colliding_ids_rejected() {
        let registry = Registry::builder().unit("Start", false).unwrap().build();
        let plan = ChainBuilder::new("acme")
            .unwrap()
            .build(Step::pass("Start"), &registry);

        assert!(matches!(
            visualize(&plan, &VisualizationOptions::ascii()),
            Err(PlanError::Validation(_))
        ));
    }

    #[test]
    fn test_unit_named_like_end_renders() {
        let registry = Registry::builder().unit("Done", true).unwrap().build();
        let plan = ChainBuilder::new("acme")
            .unwrap()
            .build(Step::pass("Start"), &registry);

        let doc = to_state_machine(&plan, &VisualizationOptions::states()).unwrap();
        assert_eq!(doc["States"]["Done"]["Type"], "Task");
        assert_eq!(doc["States"]["Done"]["Next"], END);
        assert!(visualize(&plan, &VisualizationOptions::mermaid()).is_ok());
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!("Mermaid".parse::<VisualizationFormat>().unwrap(), VisualizationFormat::Mermaid);
        assert_eq!("states".parse::<VisualizationFormat>().unwrap(), VisualizationFormat::States);
        assert!("svg".parse::<VisualizationFormat>().is_err());
        assert_eq!(VisualizationFormat::Dot.to_string(), "dot");
    }
}
