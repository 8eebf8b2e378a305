//! Typed view of a WordprocessingML body.
//!
//! Only paragraphs, runs and tables are interpreted. Everything else is kept
//! as an opaque [`Element`] and written back untouched, so the tree
//! round-trips without loss.

use crate::docx::xml::{Attributes, Element, Node};

#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    Paragraph(Paragraph),
    Table(Table),
    /// Section properties, content controls, bookmarks at body level, ...
    Opaque(Element),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Paragraph {
    pub attributes: Attributes,
    /// The paragraph's `pPr` element.
    pub properties: Option<Element>,
    pub content: Vec<Inline>,
    /// The element this paragraph was read from, written back verbatim
    /// (comments, whitespace and `t` attributes included) until `set_text`.
    source: Option<Element>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Inline {
    Run(Run),
    /// Hyperlinks, bookmarks, proofing marks, fields. Their text is not part
    /// of the paragraph text.
    Opaque(Element),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Run {
    pub attributes: Attributes,
    /// The run's `rPr` element: the formatting carried by its text.
    pub properties: Option<Element>,
    pub content: Vec<RunContent>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RunContent {
    Text(String),
    Tab,
    /// A plain line break: `<w:br/>` without attributes, or `<w:cr/>`.
    Break,
    Opaque(Element),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    pub attributes: Attributes,
    pub content: Vec<TableItem>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TableItem {
    Row(Row),
    /// `tblPr`, `tblGrid` and anything else that is not a row.
    Opaque(Element),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Row {
    pub attributes: Attributes,
    pub content: Vec<RowItem>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RowItem {
    Cell(Cell),
    Opaque(Element),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Cell {
    pub attributes: Attributes,
    /// `tcPr` shows up here as `Block::Opaque`.
    pub blocks: Vec<Block>,
}

impl Block {
    pub fn as_paragraph(&self) -> Option<&Paragraph> {
        match self {
            Block::Paragraph(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_table(&self) -> Option<&Table> {
        match self {
            Block::Table(t) => Some(t),
            _ => None,
        }
    }
}

impl Paragraph {
    pub fn runs(&self) -> impl Iterator<Item = &Run> + '_ {
        self.content.iter().filter_map(|inline| match inline {
            Inline::Run(run) => Some(run),
            Inline::Opaque(_) => None,
        })
    }

    /// Concatenated text of the paragraph's direct runs.
    pub fn text(&self) -> String {
        self.runs().map(Run::text).collect()
    }

    /// Replaces the paragraph text.
    ///
    /// The first run carrying text keeps its formatting and receives the
    /// whole new text; other runs lose their text and disappear if nothing
    /// else is left in them. Runs without text (drawings, field characters)
    /// and opaque inline content are not touched.
    pub fn set_text(&mut self, text: &str) {
        self.source = None;
        let mut carrier_seen = false;
        let mut emptied = Vec::new();

        for (index, inline) in self.content.iter_mut().enumerate() {
            let Inline::Run(run) = inline else { continue };
            if !run.has_text() {
                continue;
            }
            if carrier_seen {
                run.content.retain(|c| !c.is_text());
                if run.content.is_empty() {
                    emptied.push(index);
                }
            } else {
                run.replace_text(text);
                carrier_seen = true;
            }
        }

        for index in emptied.into_iter().rev() {
            self.content.remove(index);
        }

        if !carrier_seen {
            self.content.push(Inline::Run(Run::with_text(text)));
        }
    }
}

impl Run {
    pub fn with_text(text: &str) -> Self {
        Self {
            content: text_content(text),
            ..Self::default()
        }
    }

    pub fn text(&self) -> String {
        let mut out = String::new();
        for item in &self.content {
            match item {
                RunContent::Text(s) => out.push_str(s),
                RunContent::Tab => out.push('\t'),
                RunContent::Break => out.push('\n'),
                RunContent::Opaque(_) => {}
            }
        }
        out
    }

    pub fn has_text(&self) -> bool {
        self.content.iter().any(RunContent::is_text)
    }

    fn replace_text(&mut self, text: &str) {
        let position = self
            .content
            .iter()
            .position(RunContent::is_text)
            .unwrap_or(self.content.len());
        self.content.retain(|c| !c.is_text());
        let insert_at = position.min(self.content.len());
        self.content.splice(insert_at..insert_at, text_content(text));
    }
}

impl RunContent {
    pub fn is_text(&self) -> bool {
        !matches!(self, RunContent::Opaque(_))
    }
}

impl Table {
    pub fn rows(&self) -> impl Iterator<Item = &Row> + '_ {
        self.content.iter().filter_map(|item| match item {
            TableItem::Row(row) => Some(row),
            TableItem::Opaque(_) => None,
        })
    }

    pub fn rows_mut(&mut self) -> impl Iterator<Item = &mut Row> + '_ {
        self.content.iter_mut().filter_map(|item| match item {
            TableItem::Row(row) => Some(row),
            TableItem::Opaque(_) => None,
        })
    }
}

impl Row {
    pub fn cells(&self) -> impl Iterator<Item = &Cell> + '_ {
        self.content.iter().filter_map(|item| match item {
            RowItem::Cell(cell) => Some(cell),
            RowItem::Opaque(_) => None,
        })
    }

    pub fn cells_mut(&mut self) -> impl Iterator<Item = &mut Cell> + '_ {
        self.content.iter_mut().filter_map(|item| match item {
            RowItem::Cell(cell) => Some(cell),
            RowItem::Opaque(_) => None,
        })
    }
}

impl Cell {
    /// Paragraphs directly inside the cell. Nested tables are not descended into.
    pub fn paragraphs(&self) -> impl Iterator<Item = &Paragraph> + '_ {
        self.blocks.iter().filter_map(Block::as_paragraph)
    }

    pub fn paragraphs_mut(&mut self) -> impl Iterator<Item = &mut Paragraph> + '_ {
        self.blocks.iter_mut().filter_map(|block| match block {
            Block::Paragraph(p) => Some(p),
            _ => None,
        })
    }
}

/// Splits plain text into run content, mapping `\t` and `\n` to their elements.
fn text_content(text: &str) -> Vec<RunContent> {
    let mut content = Vec::new();
    let mut current = String::new();

    for ch in text.chars() {
        let special = match ch {
            '\t' => RunContent::Tab,
            '\n' => RunContent::Break,
            _ => {
                current.push(ch);
                continue;
            }
        };
        if !current.is_empty() {
            content.push(RunContent::Text(std::mem::take(&mut current)));
        }
        content.push(special);
    }
    if !current.is_empty() || content.is_empty() {
        content.push(RunContent::Text(current));
    }

    content
}

// ────────────────────────────────────────────────────────────────────────────
// Element <-> model conversion
// ────────────────────────────────────────────────────────────────────────────

/// Qualified-name helper for the WordprocessingML main namespace prefix
/// declared by a particular document.
#[derive(Debug, Clone, PartialEq)]
pub struct WordNames {
    prefix: String,
}

impl WordNames {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn qualify(&self, local: &str) -> String {
        if self.prefix.is_empty() {
            local.to_string()
        } else {
            format!("{}:{}", self.prefix, local)
        }
    }

    pub fn is(&self, el: &Element, local: &str) -> bool {
        match el.name.split_once(':') {
            Some((prefix, name)) => prefix == self.prefix && name == local,
            None => self.prefix.is_empty() && el.name == local,
        }
    }

    pub fn blocks_from(&self, children: Vec<Node>) -> Vec<Block> {
        element_children(children)
            .map(|el| self.block_from(el))
            .collect()
    }

    fn block_from(&self, el: Element) -> Block {
        if self.is(&el, "p") {
            Block::Paragraph(self.paragraph_from(el))
        } else if self.is(&el, "tbl") {
            Block::Table(self.table_from(el))
        } else {
            Block::Opaque(el)
        }
    }

    fn paragraph_from(&self, el: Element) -> Paragraph {
        let mut paragraph = Paragraph {
            attributes: el.attributes.clone(),
            source: Some(el.clone()),
            ..Paragraph::default()
        };
        for child in element_children(el.children) {
            if paragraph.properties.is_none() && paragraph.content.is_empty() && self.is(&child, "pPr") {
                paragraph.properties = Some(child);
            } else if self.is(&child, "r") {
                paragraph.content.push(Inline::Run(self.run_from(child)));
            } else {
                paragraph.content.push(Inline::Opaque(child));
            }
        }
        paragraph
    }

    fn run_from(&self, el: Element) -> Run {
        let mut run = Run {
            attributes: el.attributes,
            ..Run::default()
        };
        for child in element_children(el.children) {
            if run.properties.is_none() && run.content.is_empty() && self.is(&child, "rPr") {
                run.properties = Some(child);
            } else if self.is(&child, "t") {
                run.content.push(RunContent::Text(child.text_content()));
            } else if self.is(&child, "tab") && child.attributes.is_empty() {
                run.content.push(RunContent::Tab);
            } else if (self.is(&child, "br") || self.is(&child, "cr")) && child.attributes.is_empty() {
                run.content.push(RunContent::Break);
            } else {
                run.content.push(RunContent::Opaque(child));
            }
        }
        run
    }

    fn table_from(&self, el: Element) -> Table {
        let content = element_children(el.children)
            .map(|child| {
                if self.is(&child, "tr") {
                    TableItem::Row(self.row_from(child))
                } else {
                    TableItem::Opaque(child)
                }
            })
            .collect();
        Table {
            attributes: el.attributes,
            content,
        }
    }

    fn row_from(&self, el: Element) -> Row {
        let content = element_children(el.children)
            .map(|child| {
                if self.is(&child, "tc") {
                    RowItem::Cell(Cell {
                        attributes: child.attributes,
                        blocks: self.blocks_from(child.children),
                    })
                } else {
                    RowItem::Opaque(child)
                }
            })
            .collect();
        Row {
            attributes: el.attributes,
            content,
        }
    }

    pub fn blocks_to_nodes(&self, blocks: &[Block]) -> Vec<Node> {
        blocks
            .iter()
            .map(|block| Node::Element(self.block_to(block)))
            .collect()
    }

    fn block_to(&self, block: &Block) -> Element {
        match block {
            Block::Paragraph(p) => self.paragraph_to(p),
            Block::Table(t) => self.table_to(t),
            Block::Opaque(el) => el.clone(),
        }
    }

    fn paragraph_to(&self, paragraph: &Paragraph) -> Element {
        if let Some(source) = &paragraph.source {
            return source.clone();
        }
        let mut el = Element::with_attributes(self.qualify("p"), paragraph.attributes.clone());
        if let Some(props) = &paragraph.properties {
            el.children.push(Node::Element(props.clone()));
        }
        for inline in &paragraph.content {
            let child = match inline {
                Inline::Run(run) => self.run_to(run),
                Inline::Opaque(other) => other.clone(),
            };
            el.children.push(Node::Element(child));
        }
        el
    }

    fn run_to(&self, run: &Run) -> Element {
        let mut el = Element::with_attributes(self.qualify("r"), run.attributes.clone());
        if let Some(props) = &run.properties {
            el.children.push(Node::Element(props.clone()));
        }
        for item in &run.content {
            let child = match item {
                RunContent::Text(text) => self.text_element(text),
                RunContent::Tab => Element::new(self.qualify("tab")),
                RunContent::Break => Element::new(self.qualify("br")),
                RunContent::Opaque(other) => other.clone(),
            };
            el.children.push(Node::Element(child));
        }
        el
    }

    fn text_element(&self, text: &str) -> Element {
        let mut el = Element::new(self.qualify("t"));
        if text.starts_with(char::is_whitespace) || text.ends_with(char::is_whitespace) {
            el.attributes
                .push(("xml:space".to_string(), "preserve".to_string()));
        }
        if !text.is_empty() {
            el.children.push(Node::Text(text.to_string()));
        }
        el
    }

    fn table_to(&self, table: &Table) -> Element {
        let mut el = Element::with_attributes(self.qualify("tbl"), table.attributes.clone());
        for item in &table.content {
            let child = match item {
                TableItem::Row(row) => self.row_to(row),
                TableItem::Opaque(other) => other.clone(),
            };
            el.children.push(Node::Element(child));
        }
        el
    }

    fn row_to(&self, row: &Row) -> Element {
        let mut el = Element::with_attributes(self.qualify("tr"), row.attributes.clone());
        for item in &row.content {
            let child = match item {
                RowItem::Cell(cell) => {
                    let mut tc = Element::with_attributes(self.qualify("tc"), cell.attributes.clone());
                    tc.children = self.blocks_to_nodes(&cell.blocks);
                    tc
                }
                RowItem::Opaque(other) => other.clone(),
            };
            el.children.push(Node::Element(child));
        }
        el
    }
}

/// Element children only; inter-element whitespace and comments in
/// element-only content carry no meaning for Word.
fn element_children(children: Vec<Node>) -> impl Iterator<Item = Element> {
    children.into_iter().filter_map(|node| match node {
        Node::Element(el) => Some(el),
        _ => None,
    })
}
