//! Box layout of a render tree at a given width.
//!
//! Two modes are supported. Block nodes stack their children vertically.
//! Grid nodes place children on columns of equal width; explicit rows share
//! the available height equally (like `1fr` tracks), implicit rows grow to
//! fit their content. Grid items stretch to the height of their area.

use crate::style::{ComputedStyle, Display};
use crate::text::TextMeasurer;
use crate::tree::{Border, NodeKind, RenderNode, RenderTree};
use kurbo::{Point, Rect, Vec2};
use peniko::Color;
use std::collections::HashSet;

/// A laid-out node.
#[derive(Debug, Clone)]
pub struct LayoutBox {
    pub kind: NodeKind,
    /// Border box in tree coordinates.
    pub rect: Rect,
    pub style: ComputedStyle,
    pub background: Option<Color>,
    pub foreground: Color,
    pub border: Option<Border>,
    /// Wrapped text lines, for text-bearing nodes.
    pub lines: Vec<String>,
    pub children: Vec<LayoutBox>,
}

impl LayoutBox {
    /// Content box (border box minus padding).
    pub fn content_rect(&self) -> Rect {
        let p = self.style.padding;
        Rect::new(
            self.rect.x0 + p.left,
            self.rect.y0 + p.top,
            (self.rect.x1 - p.right).max(self.rect.x0 + p.left),
            (self.rect.y1 - p.bottom).max(self.rect.y0 + p.top),
        )
    }

    /// Depth-first visit of this box and its descendants.
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a LayoutBox)) {
        visit(self);
        for child in &self.children {
            child.walk(visit);
        }
    }

    /// First box in depth-first order matching `pred`.
    pub fn find(&self, pred: &impl Fn(&LayoutBox) -> bool) -> Option<&LayoutBox> {
        if pred(self) {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(pred))
    }

    fn translate(&mut self, offset: Vec2) {
        self.rect = self.rect + offset;
        for child in &mut self.children {
            child.translate(offset);
        }
    }
}

/// Lays out render trees.
pub struct LayoutEngine<'m> {
    measurer: &'m mut TextMeasurer,
    /// Width styles are resolved at.
    resolve_width: f64,
    hide_affordances: bool,
}

impl<'m> LayoutEngine<'m> {
    pub fn new(measurer: &'m mut TextMeasurer) -> Self {
        Self {
            measurer,
            resolve_width: 0.0,
            hide_affordances: false,
        }
    }

    /// Skip interactive add affordances.
    pub fn with_hidden_affordances(mut self, hide: bool) -> Self {
        self.hide_affordances = hide;
        self
    }

    /// Lay out `tree` inside a viewport of `viewport_width`.
    ///
    /// The root is placed at the origin.
    pub fn layout(&mut self, tree: &RenderTree, viewport_width: f64) -> LayoutBox {
        let width = tree.layout_width(viewport_width);
        self.resolve_width = width;
        self.layout_node(&tree.root, Point::ORIGIN, width)
    }

    fn is_hidden(&self, node: &RenderNode) -> bool {
        self.hide_affordances && matches!(node.kind, NodeKind::AddAffordance(_))
    }

    fn layout_node(&mut self, node: &RenderNode, origin: Point, available: f64) -> LayoutBox {
        let style = node.rules.resolve(self.resolve_width);
        let width = style.width.unwrap_or(available).max(0.0);
        let padding = style.padding;
        let content_origin = Point::new(origin.x + padding.left, origin.y + padding.top);
        let content_width = (width - padding.horizontal()).max(0.0);

        let mut lines = Vec::new();
        let mut content_height = 0.0;
        if let Some(text) = node.kind.text() {
            lines = self.measurer.wrap(text, style.font.size, content_width);
            if !matches!(node.kind, NodeKind::AddAffordance(_)) {
                content_height = lines.len() as f64 * style.font.line_height;
            }
        }

        let in_flow: Vec<&RenderNode> = node
            .children
            .iter()
            .filter(|c| !self.is_hidden(c) && c.rules.resolve(self.resolve_width).absolute.is_none())
            .collect();
        let mut children = match style.display {
            Display::Grid => {
                let (boxes, height) =
                    self.layout_grid(&style, &in_flow, content_origin, content_width);
                content_height = content_height.max(height);
                boxes
            }
            Display::Block => {
                let (boxes, height) =
                    self.layout_stack(&style, &in_flow, content_origin, content_width);
                content_height += height;
                boxes
            }
        };

        let mut height = style
            .height
            .unwrap_or(content_height + padding.vertical())
            .max(style.min_height);
        if height < 0.0 {
            height = 0.0;
        }

        for child in &node.children {
            if self.is_hidden(child) {
                continue;
            }
            let child_style = child.rules.resolve(self.resolve_width);
            if let Some((top, left)) = child_style.absolute {
                let child_origin = Point::new(origin.x + left, origin.y + top);
                let child_width = (width - left).max(0.0);
                let child_width = child_style.width.unwrap_or(child_width);
                children.push(self.layout_node(child, child_origin, child_width));
            }
        }

        LayoutBox {
            kind: node.kind.clone(),
            rect: Rect::new(origin.x, origin.y, origin.x + width, origin.y + height),
            style,
            background: node.background,
            foreground: node.foreground,
            border: node.border,
            lines,
            children,
        }
    }

    fn layout_stack(
        &mut self,
        style: &ComputedStyle,
        children: &[&RenderNode],
        origin: Point,
        width: f64,
    ) -> (Vec<LayoutBox>, f64) {
        let mut boxes = Vec::with_capacity(children.len());
        let mut y = origin.y;
        for (i, child) in children.iter().enumerate() {
            if i > 0 {
                y += style.gap;
            }
            let child_box = self.layout_node(child, Point::new(origin.x, y), width);
            y = child_box.rect.y1 + child_box.style.margin_bottom;
            boxes.push(child_box);
        }
        (boxes, y - origin.y)
    }

    fn layout_grid(
        &mut self,
        style: &ComputedStyle,
        children: &[&RenderNode],
        origin: Point,
        width: f64,
    ) -> (Vec<LayoutBox>, f64) {
        let columns = style.grid_columns.max(1) as usize;
        let gap = style.gap;
        let column_width = ((width - gap * (columns - 1) as f64) / columns as f64).max(0.0);

        // Place every child on the grid.
        let mut occupied: HashSet<(usize, usize)> = HashSet::new();
        let mut cursor = (0usize, 0usize);
        let mut areas = Vec::with_capacity(children.len());
        for child in children {
            let s = child.rules.resolve(self.resolve_width);
            let col_span = (s.column_span as usize).min(columns);
            let row_span = s.row_span as usize;
            let area = match (s.column_start, s.row_start) {
                (Some(col), Some(row)) => {
                    let col = (col as usize - 1).min(columns - col_span);
                    GridArea::new(row as usize - 1, col, row_span, col_span)
                }
                (col, _) => {
                    let fixed_col = col.map(|c| (c as usize - 1).min(columns - col_span));
                    auto_place(&occupied, &mut cursor, columns, row_span, col_span, fixed_col)
                }
            };
            area.mark(&mut occupied);
            areas.push(area);
        }

        // Natural heights at the area widths, laid out at a zero origin.
        let mut boxes: Vec<LayoutBox> = children
            .iter()
            .zip(&areas)
            .map(|(child, area)| {
                let area_width =
                    column_width * area.col_span as f64 + gap * (area.col_span - 1) as f64;
                self.layout_node(child, Point::ORIGIN, area_width)
            })
            .collect();

        let row_count = areas
            .iter()
            .map(|a| a.row + a.row_span)
            .max()
            .unwrap_or(0)
            .max(style.grid_rows as usize);
        let rows = size_rows(&areas, &boxes, row_count, style.grid_rows as usize, gap);

        let mut row_offsets = Vec::with_capacity(row_count);
        let mut y = 0.0;
        for size in &rows {
            row_offsets.push(y);
            y += size + gap;
        }
        let total_height = if rows.is_empty() {
            0.0
        } else {
            rows.iter().sum::<f64>() + gap * (rows.len() - 1) as f64
        };

        for (child_box, area) in boxes.iter_mut().zip(&areas) {
            let x = origin.x + (column_width + gap) * area.col as f64;
            let y = origin.y + row_offsets[area.row];
            child_box.translate(Vec2::new(x, y));
            let area_height = rows[area.row..area.row + area.row_span].iter().sum::<f64>()
                + gap * (area.row_span - 1) as f64;
            child_box.rect.y1 = child_box.rect.y0 + area_height.max(child_box.rect.height());
        }

        (boxes, total_height)
    }
}

/// Cells covered by one grid item (zero-based).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct GridArea {
    row: usize,
    col: usize,
    row_span: usize,
    col_span: usize,
}

impl GridArea {
    fn new(row: usize, col: usize, row_span: usize, col_span: usize) -> Self {
        Self {
            row,
            col,
            row_span: row_span.max(1),
            col_span: col_span.max(1),
        }
    }

    fn cells(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        (self.row..self.row + self.row_span)
            .flat_map(move |r| (self.col..self.col + self.col_span).map(move |c| (r, c)))
    }

    fn mark(&self, occupied: &mut HashSet<(usize, usize)>) {
        occupied.extend(self.cells());
    }

    fn is_free(&self, occupied: &HashSet<(usize, usize)>) -> bool {
        self.cells().all(|cell| !occupied.contains(&cell))
    }
}

/// Row-major auto placement starting at `cursor`.
///
/// With `fixed_col`, only the row is searched.
fn auto_place(
    occupied: &HashSet<(usize, usize)>,
    cursor: &mut (usize, usize),
    columns: usize,
    row_span: usize,
    col_span: usize,
    fixed_col: Option<usize>,
) -> GridArea {
    if let Some(col) = fixed_col {
        let mut row = if col < cursor.1 { cursor.0 + 1 } else { cursor.0 };
        loop {
            let area = GridArea::new(row, col, row_span, col_span);
            if area.is_free(occupied) {
                *cursor = (row, col + col_span);
                return area;
            }
            row += 1;
        }
    }

    let (mut row, mut col) = *cursor;
    loop {
        if col + col_span > columns {
            row += 1;
            col = 0;
            continue;
        }
        let area = GridArea::new(row, col, row_span, col_span);
        if area.is_free(occupied) {
            *cursor = (row, col + col_span);
            return area;
        }
        col += 1;
    }
}

/// Row heights for a grid.
///
/// The first `explicit` rows are flexible and end up equally tall, large
/// enough for every item inside them. Remaining rows fit their content,
/// with spanning items growing the last row they cover.
fn size_rows(
    areas: &[GridArea],
    boxes: &[LayoutBox],
    row_count: usize,
    explicit: usize,
    gap: f64,
) -> Vec<f64> {
    let mut rows = vec![0.0f64; row_count];
    let within_explicit = |a: &GridArea| a.row + a.row_span <= explicit;

    let mut fraction = 0.0f64;
    for (area, b) in areas.iter().zip(boxes) {
        if within_explicit(area) {
            let needed = b.rect.height() - gap * (area.row_span - 1) as f64;
            fraction = fraction.max(needed / area.row_span as f64);
        }
    }
    for row in rows.iter_mut().take(explicit.min(row_count)) {
        *row = fraction;
    }

    for (area, b) in areas.iter().zip(boxes) {
        if !within_explicit(area) && area.row_span == 1 {
            rows[area.row] = rows[area.row].max(b.rect.height());
        }
    }
    for (area, b) in areas.iter().zip(boxes) {
        if !within_explicit(area) && area.row_span > 1 {
            let end = area.row + area.row_span;
            let current: f64 = rows[area.row..end].iter().sum::<f64>()
                + gap * (area.row_span - 1) as f64;
            let missing = b.rect.height() - current;
            if missing > 0.0 {
                rows[end - 1] += missing;
            }
        }
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::build_canvas_tree;
    use bmcmaker_core::canvas::{CanvasSnapshot, Item, SectionId};

    fn section_box(root: &LayoutBox, id: SectionId) -> &LayoutBox {
        root.find(&|b: &LayoutBox| b.kind == NodeKind::Section(id))
            .unwrap()
    }

    fn layout(snapshot: &CanvasSnapshot, width: f64, hide: bool) -> LayoutBox {
        let tree = build_canvas_tree(snapshot);
        let mut measurer = TextMeasurer::embedded();
        LayoutEngine::new(&mut measurer)
            .with_hidden_affordances(hide)
            .layout(&tree, width)
    }

    #[test]
    fn test_desktop_grid_placement() {
        let root = layout(&CanvasSnapshot::new(), 1200.0, false);
        assert_eq!(root.rect.width(), 1200.0);

        let partners = section_box(&root, SectionId::KeyPartnerships);
        let activities = section_box(&root, SectionId::KeyActivities);
        let resources = section_box(&root, SectionId::KeyResources);
        let value = section_box(&root, SectionId::ValueProposition);
        let customers = section_box(&root, SectionId::Customers);
        let budget = section_box(&root, SectionId::BudgetCost);
        let revenue = section_box(&root, SectionId::RevenueStreams);

        // Content starts below the title band and inside the side padding.
        assert_eq!(partners.rect.x0, 24.0);
        assert_eq!(partners.rect.y0, 112.0);

        // Columns 1..5 left to right.
        assert!(partners.rect.x1 < activities.rect.x0);
        assert!(activities.rect.x1 < value.rect.x0);
        assert_eq!(activities.rect.x0, resources.rect.x0);
        assert!(customers.rect.x1 <= 1200.0 - 24.0 + 1e-9);

        // Tall sections span the first two rows.
        assert!((partners.rect.y1 - resources.rect.y1).abs() < 1e-9);
        assert!(activities.rect.y1 < resources.rect.y0);

        // Bottom row spans columns 1-2 and 3-5.
        assert_eq!(budget.rect.x0, partners.rect.x0);
        assert!((budget.rect.x1 - activities.rect.x1).abs() < 1e-9);
        assert_eq!(revenue.rect.x0, value.rect.x0);
        assert!((revenue.rect.x1 - customers.rect.x1).abs() < 1e-9);
        assert!(budget.rect.y0 > partners.rect.y1);
    }

    #[test]
    fn test_flexible_rows_are_equal() {
        let root = layout(&CanvasSnapshot::new(), 1200.0, false);
        let activities = section_box(&root, SectionId::KeyActivities);
        let resources = section_box(&root, SectionId::KeyResources);
        let budget = section_box(&root, SectionId::BudgetCost);

        assert!((activities.rect.height() - resources.rect.height()).abs() < 1e-9);
        assert!((activities.rect.height() - budget.rect.height()).abs() < 1e-9);
        // A tall section needs 520 px over two rows and one 16 px gap.
        assert!(activities.rect.height() >= 252.0 - 1e-9);
    }

    #[test]
    fn test_mobile_single_column() {
        let root = layout(&CanvasSnapshot::new(), 375.0, false);
        let partners = section_box(&root, SectionId::KeyPartnerships);
        let activities = section_box(&root, SectionId::KeyActivities);

        assert_eq!(partners.rect.x0, 12.0);
        assert_eq!(partners.rect.width(), 375.0 - 24.0);
        assert_eq!(partners.rect.height(), 250.0);
        assert_eq!(activities.rect.y0, partners.rect.y1 + 16.0);
        assert_eq!(activities.rect.height(), 200.0);
    }

    #[test]
    fn test_cards_stack_inside_section() {
        let mut snapshot = CanvasSnapshot::new();
        snapshot.push_item(
            SectionId::Customers,
            Item::new("1", "Makers", "#ffffff").with_image("https://example.com/a.png"),
        );
        snapshot.push_item(SectionId::Customers, Item::new("2", "Shops", "#ffffff"));
        let root = layout(&snapshot, 1200.0, false);
        let section = section_box(&root, SectionId::Customers);

        let cards: Vec<&LayoutBox> = section
            .children
            .iter()
            .filter(|b| matches!(b.kind, NodeKind::Card { .. }))
            .collect();
        assert_eq!(cards.len(), 2);
        // Padding 12 + image 80 + 8 + title line 20 + 8 + padding 12.
        assert_eq!(cards[0].rect.height(), 140.0);
        assert_eq!(cards[1].rect.y0, cards[0].rect.y1 + 8.0);
        assert_eq!(cards[0].rect.x0, section.rect.x0 + 16.0);
    }

    #[test]
    fn test_hidden_affordances_are_skipped() {
        let shown = layout(&CanvasSnapshot::new(), 1200.0, false);
        let hidden = layout(&CanvasSnapshot::new(), 1200.0, true);
        let is_add = |b: &LayoutBox| matches!(b.kind, NodeKind::AddAffordance(_));

        assert!(shown.find(&is_add).is_some());
        assert!(hidden.find(&is_add).is_none());
    }

    #[test]
    fn test_title_is_absolutely_positioned() {
        let mut snapshot = CanvasSnapshot::new();
        snapshot.title = "My Plan".to_string();
        let root = layout(&snapshot, 1200.0, false);
        let title = root
            .find(&|b: &LayoutBox| matches!(b.kind, NodeKind::Title(_)))
            .unwrap();

        assert_eq!(title.rect.origin(), Point::new(24.0, 20.0));
        assert_eq!(title.style.font.size, 36.0);
        assert_eq!(title.lines, vec!["My Plan".to_string()]);
    }

    #[test]
    fn test_auto_place_skips_occupied_cells() {
        let mut occupied = HashSet::new();
        GridArea::new(0, 0, 2, 1).mark(&mut occupied);
        let mut cursor = (0, 0);

        let a = auto_place(&occupied, &mut cursor, 2, 1, 1, None);
        assert_eq!((a.row, a.col), (0, 1));
        a.mark(&mut occupied);
        let b = auto_place(&occupied, &mut cursor, 2, 1, 1, None);
        assert_eq!((b.row, b.col), (1, 1));
    }
}
