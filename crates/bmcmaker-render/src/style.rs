//! Breakpoint-scoped style rules.
//!
//! Nodes carry a list of rules, each a single declaration guarded by a
//! minimum viewport width. Resolving at a width applies, per property, the
//! rule with the largest breakpoint not above that width. Rules are written
//! in a compact utility-class notation (`md:col-start-2 min-h-[250px]`).

use std::fmt;

/// Pixels per spacing unit in utility classes (`p-4` is 16 px).
const SPACING_UNIT: f64 = 4.0;

/// Minimum-width breakpoints, smallest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Breakpoint {
    Base,
    Sm,
    Md,
    Lg,
    Xl,
    Xxl,
}

impl Breakpoint {
    pub const ALL: [Breakpoint; 6] = [
        Breakpoint::Base,
        Breakpoint::Sm,
        Breakpoint::Md,
        Breakpoint::Lg,
        Breakpoint::Xl,
        Breakpoint::Xxl,
    ];

    /// Viewport width at which this breakpoint starts to apply.
    pub fn min_width(self) -> f64 {
        match self {
            Breakpoint::Base => 0.0,
            Breakpoint::Sm => 640.0,
            Breakpoint::Md => 768.0,
            Breakpoint::Lg => 1024.0,
            Breakpoint::Xl => 1280.0,
            Breakpoint::Xxl => 1536.0,
        }
    }

    /// Whether this breakpoint is active at `width`.
    pub fn applies_at(self, width: f64) -> bool {
        width >= self.min_width()
    }

    fn from_prefix(prefix: &str) -> Option<Self> {
        match prefix {
            "sm" => Some(Breakpoint::Sm),
            "md" => Some(Breakpoint::Md),
            "lg" => Some(Breakpoint::Lg),
            "xl" => Some(Breakpoint::Xl),
            "2xl" => Some(Breakpoint::Xxl),
            _ => None,
        }
    }

    fn prefix(self) -> &'static str {
        match self {
            Breakpoint::Base => "",
            Breakpoint::Sm => "sm",
            Breakpoint::Md => "md",
            Breakpoint::Lg => "lg",
            Breakpoint::Xl => "xl",
            Breakpoint::Xxl => "2xl",
        }
    }
}

/// Box side, for per-side padding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Top,
    Right,
    Bottom,
    Left,
}

/// Layout mode of a node's children.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Display {
    /// Children stack vertically.
    #[default]
    Block,
    /// Children are placed on a grid.
    Grid,
}

/// Font size and line height, in pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FontSize {
    pub size: f64,
    pub line_height: f64,
}

impl FontSize {
    pub const XS: FontSize = FontSize { size: 12.0, line_height: 16.0 };
    pub const SM: FontSize = FontSize { size: 14.0, line_height: 20.0 };
    pub const BASE: FontSize = FontSize { size: 16.0, line_height: 24.0 };
    pub const LG: FontSize = FontSize { size: 18.0, line_height: 28.0 };
    pub const XL: FontSize = FontSize { size: 20.0, line_height: 28.0 };
    pub const XL2: FontSize = FontSize { size: 24.0, line_height: 32.0 };
    pub const XL3: FontSize = FontSize { size: 30.0, line_height: 36.0 };
    pub const XL4: FontSize = FontSize { size: 36.0, line_height: 40.0 };
}

impl Default for FontSize {
    fn default() -> Self {
        FontSize::BASE
    }
}

/// A single style declaration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Declaration {
    Display(Display),
    GridColumns(u16),
    GridRows(u16),
    ColumnStart(u16),
    ColumnSpan(u16),
    RowStart(u16),
    RowSpan(u16),
    Gap(f64),
    Padding(Side, f64),
    MarginBottom(f64),
    MinHeight(f64),
    Width(f64),
    Height(f64),
    Font(FontSize),
    /// Taken out of flow and offset from the parent's top-left corner.
    Absolute { top: f64, left: f64 },
    Radius(f64),
}

/// Identity of the property a declaration sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Property {
    Display,
    GridColumns,
    GridRows,
    ColumnStart,
    ColumnSpan,
    RowStart,
    RowSpan,
    Gap,
    Padding(Side),
    MarginBottom,
    MinHeight,
    Width,
    Height,
    Font,
    Position,
    Radius,
}

impl Declaration {
    pub fn property(&self) -> Property {
        match self {
            Declaration::Display(_) => Property::Display,
            Declaration::GridColumns(_) => Property::GridColumns,
            Declaration::GridRows(_) => Property::GridRows,
            Declaration::ColumnStart(_) => Property::ColumnStart,
            Declaration::ColumnSpan(_) => Property::ColumnSpan,
            Declaration::RowStart(_) => Property::RowStart,
            Declaration::RowSpan(_) => Property::RowSpan,
            Declaration::Gap(_) => Property::Gap,
            Declaration::Padding(side, _) => Property::Padding(*side),
            Declaration::MarginBottom(_) => Property::MarginBottom,
            Declaration::MinHeight(_) => Property::MinHeight,
            Declaration::Width(_) => Property::Width,
            Declaration::Height(_) => Property::Height,
            Declaration::Font(_) => Property::Font,
            Declaration::Absolute { .. } => Property::Position,
            Declaration::Radius(_) => Property::Radius,
        }
    }
}

/// A declaration guarded by a breakpoint.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StyleRule {
    pub breakpoint: Breakpoint,
    pub declaration: Declaration,
}

impl StyleRule {
    pub fn new(breakpoint: Breakpoint, declaration: Declaration) -> Self {
        Self {
            breakpoint,
            declaration,
        }
    }
}

/// Padding on all four sides.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Edges {
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
    pub left: f64,
}

impl Edges {
    pub fn horizontal(&self) -> f64 {
        self.left + self.right
    }

    pub fn vertical(&self) -> f64 {
        self.top + self.bottom
    }
}

/// Style values in effect for one node at one width.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ComputedStyle {
    pub display: Display,
    pub grid_columns: u16,
    /// Explicit row count; 0 means rows are created as needed.
    pub grid_rows: u16,
    pub column_start: Option<u16>,
    pub column_span: u16,
    pub row_start: Option<u16>,
    pub row_span: u16,
    pub gap: f64,
    pub padding: Edges,
    pub margin_bottom: f64,
    pub min_height: f64,
    pub width: Option<f64>,
    pub height: Option<f64>,
    pub font: FontSize,
    pub absolute: Option<(f64, f64)>,
    pub radius: f64,
}

impl ComputedStyle {
    fn initial() -> Self {
        Self {
            grid_columns: 1,
            column_span: 1,
            row_span: 1,
            ..Default::default()
        }
    }

    fn apply(&mut self, declaration: Declaration) {
        match declaration {
            Declaration::Display(display) => self.display = display,
            Declaration::GridColumns(n) => self.grid_columns = n.max(1),
            Declaration::GridRows(n) => self.grid_rows = n,
            Declaration::ColumnStart(n) => self.column_start = Some(n.max(1)),
            Declaration::ColumnSpan(n) => self.column_span = n.max(1),
            Declaration::RowStart(n) => self.row_start = Some(n.max(1)),
            Declaration::RowSpan(n) => self.row_span = n.max(1),
            Declaration::Gap(v) => self.gap = v,
            Declaration::Padding(side, v) => match side {
                Side::Top => self.padding.top = v,
                Side::Right => self.padding.right = v,
                Side::Bottom => self.padding.bottom = v,
                Side::Left => self.padding.left = v,
            },
            Declaration::MarginBottom(v) => self.margin_bottom = v,
            Declaration::MinHeight(v) => self.min_height = v,
            Declaration::Width(v) => self.width = Some(v),
            Declaration::Height(v) => self.height = Some(v),
            Declaration::Font(font) => self.font = font,
            Declaration::Absolute { top, left } => self.absolute = Some((top, left)),
            Declaration::Radius(v) => self.radius = v,
        }
    }
}

/// The rules attached to one node.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StyleRules {
    rules: Vec<StyleRule>,
}

impl StyleRules {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse utility classes separated by whitespace.
    ///
    /// Unknown classes are skipped.
    pub fn parse(classes: &str) -> Self {
        let mut rules = Self::new();
        for class in classes.split_whitespace() {
            let (breakpoint, utility) = match class.split_once(':') {
                Some((prefix, utility)) => match Breakpoint::from_prefix(prefix) {
                    Some(bp) => (bp, utility),
                    None => {
                        log::trace!("Unknown breakpoint in class {}", class);
                        continue;
                    }
                },
                None => (Breakpoint::Base, class),
            };
            let declarations = parse_utility(utility);
            if declarations.is_empty() {
                log::trace!("Ignoring utility class {}", class);
            }
            for declaration in declarations {
                rules.push(StyleRule::new(breakpoint, declaration));
            }
        }
        rules
    }

    pub fn push(&mut self, rule: StyleRule) {
        self.rules.push(rule);
    }

    /// Add an unconditional declaration that overrides earlier base rules.
    pub fn set(&mut self, declaration: Declaration) {
        self.push(StyleRule::new(Breakpoint::Base, declaration));
    }

    pub fn rules(&self) -> &[StyleRule] {
        &self.rules
    }

    /// Whether any rule depends on the viewport width.
    pub fn is_responsive(&self) -> bool {
        self.rules.iter().any(|r| r.breakpoint != Breakpoint::Base)
    }

    /// Resolve the style in effect at `width`.
    ///
    /// Rules are applied in breakpoint order, then source order, so a
    /// larger active breakpoint always wins.
    pub fn resolve(&self, width: f64) -> ComputedStyle {
        let mut active: Vec<&StyleRule> = self
            .rules
            .iter()
            .filter(|rule| rule.breakpoint.applies_at(width))
            .collect();
        active.sort_by_key(|rule| rule.breakpoint);

        let mut style = ComputedStyle::initial();
        for rule in active {
            style.apply(rule.declaration);
        }
        style
    }

    /// Collapse to unconditional rules equal to the resolution at `width`.
    ///
    /// For every property only the winning rule at that width is kept, and
    /// it is rebased to [`Breakpoint::Base`]. The result resolves the same
    /// at every width.
    pub fn collapse_to(&self, width: f64) -> StyleRules {
        let mut winners: Vec<StyleRule> = Vec::new();
        let mut active: Vec<&StyleRule> = self
            .rules
            .iter()
            .filter(|rule| rule.breakpoint.applies_at(width))
            .collect();
        active.sort_by_key(|rule| rule.breakpoint);

        for rule in active {
            let property = rule.declaration.property();
            winners.retain(|w| w.declaration.property() != property);
            winners.push(StyleRule::new(Breakpoint::Base, rule.declaration));
        }
        StyleRules { rules: winners }
    }
}

impl fmt::Display for Breakpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Breakpoint::Base => f.write_str("base"),
            other => f.write_str(other.prefix()),
        }
    }
}

fn spacing(value: &str) -> Option<f64> {
    if let Some(px) = arbitrary_px(value) {
        return Some(px);
    }
    value.parse::<f64>().ok().map(|units| units * SPACING_UNIT)
}

/// Parse an arbitrary value such as `[250px]`.
fn arbitrary_px(value: &str) -> Option<f64> {
    value
        .strip_prefix('[')?
        .strip_suffix(']')?
        .strip_suffix("px")?
        .parse()
        .ok()
}

fn parse_utility(utility: &str) -> Vec<Declaration> {
    use Declaration as D;

    let single = |d: Option<Declaration>| d.into_iter().collect::<Vec<_>>();
    let count = |v: &str| v.parse::<u16>().ok();

    match utility {
        "grid" => return vec![D::Display(Display::Grid)],
        "block" | "flex" => return vec![D::Display(Display::Block)],
        "text-xs" => return vec![D::Font(FontSize::XS)],
        "text-sm" => return vec![D::Font(FontSize::SM)],
        "text-base" => return vec![D::Font(FontSize::BASE)],
        "text-lg" => return vec![D::Font(FontSize::LG)],
        "text-xl" => return vec![D::Font(FontSize::XL)],
        "text-2xl" => return vec![D::Font(FontSize::XL2)],
        "text-3xl" => return vec![D::Font(FontSize::XL3)],
        "text-4xl" => return vec![D::Font(FontSize::XL4)],
        "rounded" => return vec![D::Radius(4.0)],
        "rounded-md" => return vec![D::Radius(6.0)],
        "rounded-lg" => return vec![D::Radius(8.0)],
        "rounded-xl" => return vec![D::Radius(12.0)],
        _ => {}
    }

    let Some((name, value)) = utility.rsplit_once('-') else {
        return Vec::new();
    };
    match name {
        "grid-cols" => single(count(value).map(D::GridColumns)),
        "grid-rows" => single(count(value).map(D::GridRows)),
        "col-start" => single(count(value).map(D::ColumnStart)),
        "col-span" => single(count(value).map(D::ColumnSpan)),
        "row-start" => single(count(value).map(D::RowStart)),
        "row-span" => single(count(value).map(D::RowSpan)),
        "gap" | "space-y" => single(spacing(value).map(D::Gap)),
        "p" => spacing(value)
            .map(|v| {
                [Side::Top, Side::Right, Side::Bottom, Side::Left]
                    .into_iter()
                    .map(|side| D::Padding(side, v))
                    .collect()
            })
            .unwrap_or_default(),
        "px" => spacing(value)
            .map(|v| vec![D::Padding(Side::Left, v), D::Padding(Side::Right, v)])
            .unwrap_or_default(),
        "py" => spacing(value)
            .map(|v| vec![D::Padding(Side::Top, v), D::Padding(Side::Bottom, v)])
            .unwrap_or_default(),
        "pt" => single(spacing(value).map(|v| D::Padding(Side::Top, v))),
        "pr" => single(spacing(value).map(|v| D::Padding(Side::Right, v))),
        "pb" => single(spacing(value).map(|v| D::Padding(Side::Bottom, v))),
        "pl" => single(spacing(value).map(|v| D::Padding(Side::Left, v))),
        "mb" => single(spacing(value).map(D::MarginBottom)),
        "min-h" => single(spacing(value).map(D::MinHeight)),
        "h" => single(spacing(value).map(D::Height)),
        "w" => single(spacing(value).map(D::Width)),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_utilities() {
        let rules = StyleRules::parse("pt-28 grid md:grid-cols-5 min-h-[250px] sm:px-6");
        let style = rules.resolve(1200.0);
        assert_eq!(style.display, Display::Grid);
        assert_eq!(style.grid_columns, 5);
        assert_eq!(style.padding.top, 112.0);
        assert_eq!(style.padding.left, 24.0);
        assert_eq!(style.padding.right, 24.0);
        assert_eq!(style.min_height, 250.0);
    }

    #[test]
    fn test_unknown_classes_are_ignored() {
        let rules = StyleRules::parse("md:grid-cols-2a hover:shadow-md cursor-move");
        assert!(rules.rules().is_empty());
    }

    #[test]
    fn test_resolve_picks_largest_active_breakpoint() {
        let rules = StyleRules::parse("lg:text-4xl text-2xl md:text-3xl");
        assert_eq!(rules.resolve(375.0).font, FontSize::XL2);
        assert_eq!(rules.resolve(768.0).font, FontSize::XL3);
        assert_eq!(rules.resolve(1023.0).font, FontSize::XL3);
        assert_eq!(rules.resolve(1024.0).font, FontSize::XL4);
    }

    #[test]
    fn test_collapse_matches_resolution_at_width() {
        let rules = StyleRules::parse(
            "col-span-1 md:col-start-3 md:row-start-1 md:row-span-2 min-h-[250px] md:min-h-[520px] xl:min-h-[600px]",
        );
        let collapsed = rules.collapse_to(1200.0);

        assert!(!collapsed.is_responsive());
        for width in [320.0, 800.0, 1200.0, 2000.0] {
            assert_eq!(collapsed.resolve(width), rules.resolve(1200.0));
        }
        assert_eq!(collapsed.resolve(320.0).min_height, 520.0);
    }

    #[test]
    fn test_set_overrides_base() {
        let mut rules = StyleRules::parse("pb-6");
        rules.set(Declaration::Padding(Side::Bottom, 40.0));
        assert_eq!(rules.resolve(0.0).padding.bottom, 40.0);
    }

    #[test]
    fn test_defaults() {
        let style = StyleRules::new().resolve(1000.0);
        assert_eq!(style.grid_columns, 1);
        assert_eq!(style.column_span, 1);
        assert_eq!(style.row_span, 1);
        assert_eq!(style.font, FontSize::BASE);
    }
}
