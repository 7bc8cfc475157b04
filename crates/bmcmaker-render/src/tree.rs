//! Render tree built from a canvas snapshot.

use crate::color::parse_color_or;
use crate::style::{Declaration, Side, StyleRules};
use bmcmaker_core::canvas::{CanvasSnapshot, DEFAULT_CANVAS_COLOR, DEFAULT_TEXT_COLOR, SectionId};
use peniko::Color;

/// Label of the add-card affordance.
pub const ADD_ITEM_LABEL: &str = "Add Item";

const CANVAS_CLASSES: &str =
    "pt-28 grid grid-cols-1 md:grid-cols-5 md:grid-rows-3 gap-4 sm:px-6 px-3 pb-6 rounded-xl";
const TITLE_CLASSES: &str = "absolute top-5 left-6 p-5 text-2xl md:text-3xl lg:text-4xl";
const SECTION_CLASSES: &str = "p-4 space-y-2 rounded-lg";
const HEADER_CLASSES: &str = "text-sm mb-3";
const CARD_CLASSES: &str = "p-3 rounded-lg";
const CARD_IMAGE_CLASSES: &str = "h-20 mb-2 rounded";
const CARD_TITLE_CLASSES: &str = "text-sm mb-2";
const CARD_DESCRIPTION_CLASSES: &str = "text-xs mb-2";
const ADD_CLASSES: &str = "h-10 text-sm rounded-md";

const SECTION_BACKGROUND: Color = Color::from_rgba8(255, 255, 255, 255);
const SECTION_BORDER: Color = Color::from_rgba8(229, 231, 235, 255);
const AFFORDANCE_BORDER: Color = Color::from_rgba8(209, 213, 219, 255);
const AFFORDANCE_TEXT: Color = Color::from_rgba8(55, 65, 81, 255);

/// Grid cell classes of each section, in the classic canvas arrangement.
fn cell_classes(section: SectionId) -> &'static str {
    match section {
        SectionId::KeyPartnerships => {
            "col-span-1 md:col-start-1 md:row-start-1 md:row-span-2 min-h-[250px] md:min-h-[520px]"
        }
        SectionId::KeyActivities => {
            "col-span-1 md:col-start-2 md:row-start-1 min-h-[200px] md:min-h-[250px]"
        }
        SectionId::KeyResources => {
            "col-span-1 md:col-start-2 md:row-start-2 min-h-[200px] md:min-h-[250px]"
        }
        SectionId::ValueProposition => {
            "col-span-1 md:col-start-3 md:row-start-1 md:row-span-2 min-h-[250px] md:min-h-[520px]"
        }
        SectionId::CustomerRelationships => {
            "col-span-1 md:col-start-4 md:row-start-1 min-h-[200px] md:min-h-[250px]"
        }
        SectionId::DistributionChannels => {
            "col-span-1 md:col-start-4 md:row-start-2 min-h-[200px] md:min-h-[250px]"
        }
        SectionId::Customers => {
            "col-span-1 md:col-start-5 md:row-start-1 md:row-span-2 min-h-[250px] md:min-h-[520px]"
        }
        SectionId::BudgetCost => {
            "col-span-1 md:col-span-2 md:col-start-1 md:row-start-3 min-h-[160px] md:min-h-[200px]"
        }
        SectionId::RevenueStreams => {
            "col-span-1 md:col-span-3 md:col-start-3 md:row-start-3 min-h-[160px] md:min-h-[200px]"
        }
    }
}

/// Sections in document order, which is also the single-column order.
const DOCUMENT_ORDER: [SectionId; 9] = [
    SectionId::KeyPartnerships,
    SectionId::KeyActivities,
    SectionId::KeyResources,
    SectionId::ValueProposition,
    SectionId::CustomerRelationships,
    SectionId::DistributionChannels,
    SectionId::Customers,
    SectionId::BudgetCost,
    SectionId::RevenueStreams,
];

/// What a node draws.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Canvas,
    Title(String),
    Section(SectionId),
    SectionHeader(String),
    Card { item_id: String },
    CardImage { src: String },
    CardTitle(String),
    CardDescription(String),
    /// Interactive "add card" button; hidden during export.
    AddAffordance(String),
}

impl NodeKind {
    /// Text content of text-bearing nodes.
    pub fn text(&self) -> Option<&str> {
        match self {
            NodeKind::Title(text)
            | NodeKind::SectionHeader(text)
            | NodeKind::CardTitle(text)
            | NodeKind::CardDescription(text)
            | NodeKind::AddAffordance(text) => Some(text),
            _ => None,
        }
    }
}

/// Border drawn around a node's box.
#[derive(Debug, Clone, Copy)]
pub struct Border {
    pub color: Color,
    pub width: f64,
    pub dashed: bool,
}

/// One node of the render tree.
#[derive(Debug, Clone)]
pub struct RenderNode {
    pub kind: NodeKind,
    pub rules: StyleRules,
    pub background: Option<Color>,
    pub foreground: Color,
    pub border: Option<Border>,
    pub children: Vec<RenderNode>,
}

impl RenderNode {
    pub fn new(kind: NodeKind, classes: &str) -> Self {
        Self {
            kind,
            rules: StyleRules::parse(classes),
            background: None,
            foreground: Color::from_rgba8(0, 0, 0, 255),
            border: None,
            children: Vec::new(),
        }
    }

    pub fn with_background(mut self, color: Color) -> Self {
        self.background = Some(color);
        self
    }

    pub fn with_foreground(mut self, color: Color) -> Self {
        self.foreground = color;
        self
    }

    pub fn with_border(mut self, border: Border) -> Self {
        self.border = Some(border);
        self
    }

    pub fn with_child(mut self, child: RenderNode) -> Self {
        self.children.push(child);
        self
    }

    /// Depth-first visit of this node and its descendants.
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a RenderNode)) {
        visit(self);
        for child in &self.children {
            child.walk(visit);
        }
    }

    /// Number of nodes in this subtree.
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(RenderNode::node_count).sum::<usize>()
    }

    /// Whether any rule in this subtree depends on the viewport width.
    pub fn is_responsive(&self) -> bool {
        self.rules.is_responsive() || self.children.iter().any(RenderNode::is_responsive)
    }

    fn collapsed_to(&self, width: f64) -> RenderNode {
        RenderNode {
            kind: self.kind.clone(),
            rules: self.rules.collapse_to(width),
            background: self.background,
            foreground: self.foreground,
            border: self.border,
            children: self.children.iter().map(|c| c.collapsed_to(width)).collect(),
        }
    }
}

/// Where a tree sits relative to the visible viewport.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Placement {
    InFlow,
    /// Outside the visible viewport, so attaching it causes no flash.
    Offscreen { left: f64, top: f64 },
}

/// A complete tree ready for layout.
#[derive(Debug, Clone)]
pub struct RenderTree {
    pub root: RenderNode,
    pub placement: Placement,
    /// Width the tree is laid out at, overriding the viewport width.
    pub fixed_width: Option<f64>,
}

impl RenderTree {
    pub fn new(root: RenderNode) -> Self {
        Self {
            root,
            placement: Placement::InFlow,
            fixed_width: None,
        }
    }

    /// Background of the root, used to resolve transparency.
    pub fn background(&self) -> Color {
        self.root
            .background
            .unwrap_or_else(|| parse_color_or(DEFAULT_CANVAS_COLOR, Color::WHITE))
    }

    /// Width the tree lays out at inside a viewport of `viewport_width`.
    pub fn layout_width(&self, viewport_width: f64) -> f64 {
        self.fixed_width.unwrap_or(viewport_width)
    }

    /// Distinct image sources referenced by the tree, in document order.
    pub fn image_sources(&self) -> Vec<String> {
        let mut sources: Vec<String> = Vec::new();
        self.root.walk(&mut |node| {
            if let NodeKind::CardImage { src } = &node.kind {
                if !sources.contains(src) {
                    sources.push(src.clone());
                }
            }
        });
        sources
    }

    /// Structurally identical copy fixed to the desktop presentation.
    ///
    /// Every node's rules are collapsed to their resolution at `width`, the
    /// root gets that fixed width plus `bottom_padding`, and the copy is
    /// placed `offscreen_left` pixels to the left of the viewport.
    pub fn desktop_clone(&self, width: f64, bottom_padding: f64, offscreen_left: f64) -> RenderTree {
        let mut root = self.root.collapsed_to(width);
        root.rules.set(Declaration::Width(width));
        root.rules.set(Declaration::Padding(Side::Bottom, bottom_padding));
        RenderTree {
            root,
            placement: Placement::Offscreen {
                left: offscreen_left,
                top: 0.0,
            },
            fixed_width: Some(width),
        }
    }
}

fn build_card(item: &bmcmaker_core::canvas::Item) -> RenderNode {
    let background = parse_color_or(&item.color, Color::WHITE);
    let text = parse_color_or(&item.text_color, parse_color_or(DEFAULT_TEXT_COLOR, Color::BLACK));

    let mut card = RenderNode::new(
        NodeKind::Card {
            item_id: item.id.clone(),
        },
        CARD_CLASSES,
    )
    .with_background(background)
    .with_foreground(text);

    if let Some(src) = &item.image_url {
        card = card.with_child(RenderNode::new(
            NodeKind::CardImage { src: src.clone() },
            CARD_IMAGE_CLASSES,
        ));
    }
    card = card.with_child(
        RenderNode::new(NodeKind::CardTitle(item.title.clone()), CARD_TITLE_CLASSES)
            .with_foreground(text),
    );
    if let Some(description) = item.description.as_deref().filter(|d| !d.is_empty()) {
        card = card.with_child(
            RenderNode::new(
                NodeKind::CardDescription(description.to_string()),
                CARD_DESCRIPTION_CLASSES,
            )
            .with_foreground(text.multiply_alpha(0.8)),
        );
    }
    card
}

/// Build the live render tree for a snapshot.
///
/// Unknown sections in the snapshot are not rendered.
pub fn build_canvas_tree(snapshot: &CanvasSnapshot) -> RenderTree {
    let canvas_color = parse_color_or(&snapshot.canvas_color, parse_color_or(DEFAULT_CANVAS_COLOR, Color::WHITE));
    let title_color = parse_color_or(snapshot.title_color_or_default(), Color::BLACK);
    let header_color = parse_color_or(snapshot.section_title_color_or_default(), Color::BLACK);

    let mut root = RenderNode::new(NodeKind::Canvas, CANVAS_CLASSES).with_background(canvas_color);
    root = root.with_child(
        RenderNode::new(NodeKind::Title(snapshot.title.clone()), TITLE_CLASSES)
            .with_foreground(title_color),
    );

    for section in DOCUMENT_ORDER {
        let classes = format!("{} {}", cell_classes(section), SECTION_CLASSES);
        let mut node = RenderNode::new(NodeKind::Section(section), &classes)
            .with_background(SECTION_BACKGROUND)
            .with_border(Border {
                color: SECTION_BORDER,
                width: 2.0,
                dashed: false,
            })
            .with_child(
                RenderNode::new(
                    NodeKind::SectionHeader(section.label().to_string()),
                    HEADER_CLASSES,
                )
                .with_foreground(header_color),
            );

        for item in snapshot.items(section) {
            node = node.with_child(build_card(item));
        }

        node = node.with_child(
            RenderNode::new(NodeKind::AddAffordance(ADD_ITEM_LABEL.to_string()), ADD_CLASSES)
                .with_foreground(AFFORDANCE_TEXT)
                .with_border(Border {
                    color: AFFORDANCE_BORDER,
                    width: 1.0,
                    dashed: true,
                }),
        );
        root = root.with_child(node);
    }

    RenderTree::new(root)
}
