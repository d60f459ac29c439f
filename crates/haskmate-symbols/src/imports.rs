//! Import descriptors and the module-header parsing seam
//!
//! The full Haskell parser is an external collaborator; [`ModuleParser`]
//! is the narrow interface the cache consumes, and [`HeaderModuleParser`]
//! is the default implementation covering module and import headers.

use once_cell::sync::Lazy;
use regex::Regex;

use haskmate_backend::{SymbolDescriptor, SymbolKind};

/// One entry of an explicit import/hiding list
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportItem {
    /// A plain name (operators with their parens stripped)
    Name(String),
    /// `Parent(..)`: the parent and every child it owns
    AllChildren(String),
}

/// One `import` line of a module
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportDescriptor {
    pub module: String,
    pub alias: Option<String>,
    pub qualified: bool,
    pub hiding: bool,
    /// Explicit import/hiding list; `None` means everything
    pub list: Option<Vec<ImportItem>>,
}

impl ImportDescriptor {
    /// Plain `import Module`
    pub fn plain(module: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            alias: None,
            qualified: false,
            hiding: false,
            list: None,
        }
    }

    /// The implicit `import Prelude` every module gets unless it names
    /// Prelude itself
    pub fn prelude() -> Self {
        Self::plain("Prelude")
    }

    /// Whether `symbol` is exposed through this import.
    ///
    /// With an explicit list the symbol is visible iff its presence in
    /// the list equals the negation of the hiding flag.
    pub fn visible(&self, symbol: &SymbolDescriptor) -> bool {
        let Some(ref list) = self.list else {
            return !self.hiding;
        };
        let listed = list.iter().any(|item| match item {
            ImportItem::Name(name) => name == &symbol.name,
            ImportItem::AllChildren(parent) => {
                parent == &symbol.name || symbol.parent.as_deref() == Some(parent)
            }
        });
        listed == !self.hiding
    }

    /// Prefix used for the qualified form of this import's symbols
    pub fn qualifier(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.module)
    }
}

/// A buffer's parsed header: its module name and import lines
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedModule {
    pub name: Option<String>,
    pub imports: Vec<ImportDescriptor>,
}

/// External parsing collaborator interface
pub trait ModuleParser: Send + Sync {
    fn parse(&self, text: &str) -> ParsedModule;
}

static MODULE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^module\s+([A-Z][\w.']*)").expect("static regex"));

static IMPORT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?x)^import
          (\s+qualified)?
          \s+([A-Z][\w.']*)
          (?:\s+as\s+([A-Z][\w.']*))?
          (\s+hiding)?
          \s*(?:\(\s*(.*)\s*\))?\s*$",
    )
    .expect("static regex")
});

/// Regex-based header parser, the default [`ModuleParser`]
#[derive(Debug, Default)]
pub struct HeaderModuleParser;

impl ModuleParser for HeaderModuleParser {
    fn parse(&self, text: &str) -> ParsedModule {
        let name = MODULE_RE
            .captures(text)
            .map(|caps| caps[1].to_string());
        let imports = join_continuations(text)
            .iter()
            .filter_map(|line| parse_import_line(line))
            .collect();
        ParsedModule { name, imports }
    }
}

/// Fold indented continuation lines into their `import` line
fn join_continuations(text: &str) -> Vec<String> {
    let mut lines: Vec<String> = Vec::new();
    for raw in text.split('\n') {
        let line = raw.trim_end();
        let continues = line.starts_with(' ') || line.starts_with('\t');
        match lines.last_mut() {
            Some(last) if continues && last.starts_with("import") => {
                last.push(' ');
                last.push_str(line.trim_start());
            }
            _ => lines.push(line.to_string()),
        }
    }
    lines
}

fn parse_import_line(line: &str) -> Option<ImportDescriptor> {
    let caps = IMPORT_RE.captures(line)?;
    Some(ImportDescriptor {
        qualified: caps.get(1).is_some(),
        module: caps[2].to_string(),
        alias: caps.get(3).map(|m| m.as_str().to_string()),
        hiding: caps.get(4).is_some(),
        list: caps.get(5).map(|m| parse_import_list(m.as_str())),
    })
}

/// Split a parenthesized import list on top-level commas and classify
/// each entry
fn parse_import_list(raw: &str) -> Vec<ImportItem> {
    let mut items = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;
    let bytes = raw.as_bytes();
    for (i, &b) in bytes.iter().enumerate() {
        match b {
            b'(' => depth += 1,
            b')' => depth = depth.saturating_sub(1),
            b',' if depth == 0 => {
                items.extend(parse_import_item(&raw[start..i]));
                start = i + 1;
            }
            _ => {}
        }
    }
    items.extend(parse_import_item(&raw[start..]));
    items
}

fn parse_import_item(raw: &str) -> Vec<ImportItem> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Vec::new();
    }
    if let Some((parent, children)) = raw.split_once('(') {
        let parent = parent.trim();
        let children = children.trim_end_matches(')').trim();
        if parent.is_empty() {
            // an operator like (<>)
            return vec![ImportItem::Name(children.to_string())];
        }
        if children == ".." {
            return vec![ImportItem::AllChildren(parent.to_string())];
        }
        let mut items = vec![ImportItem::Name(parent.to_string())];
        items.extend(
            children
                .split(',')
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(|c| ImportItem::Name(strip_parens(c))),
        );
        return items;
    }
    vec![ImportItem::Name(strip_parens(raw))]
}

fn strip_parens(raw: &str) -> String {
    raw.trim()
        .trim_start_matches('(')
        .trim_end_matches(')')
        .trim()
        .to_string()
}

#[cfg(test)]
pub(crate) fn symbol(name: &str, kind: SymbolKind, parent: Option<&str>) -> SymbolDescriptor {
    SymbolDescriptor {
        name: name.to_string(),
        kind,
        signature: None,
        parent: parent.map(str::to_string),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> ParsedModule {
        HeaderModuleParser.parse(text)
    }

    #[test]
    fn test_module_name() {
        let parsed = parse("module Data.Foo.Bar (run) where\n");
        assert_eq!(parsed.name.as_deref(), Some("Data.Foo.Bar"));
    }

    #[test]
    fn test_plain_import() {
        let parsed = parse("module A where\nimport Data.List\n");
        assert_eq!(parsed.imports, vec![ImportDescriptor::plain("Data.List")]);
    }

    #[test]
    fn test_qualified_import_with_alias() {
        let parsed = parse("import qualified Data.Map as M\n");
        let import = &parsed.imports[0];
        assert!(import.qualified);
        assert_eq!(import.module, "Data.Map");
        assert_eq!(import.alias.as_deref(), Some("M"));
        assert_eq!(import.qualifier(), "M");
    }

    #[test]
    fn test_hiding_list() {
        let parsed = parse("import Prelude hiding (head, tail)\n");
        let import = &parsed.imports[0];
        assert!(import.hiding);
        assert_eq!(
            import.list.as_deref(),
            Some(
                [
                    ImportItem::Name("head".to_string()),
                    ImportItem::Name("tail".to_string()),
                ]
                .as_slice()
            )
        );
    }

    #[test]
    fn test_explicit_list_with_children() {
        let parsed = parse("import Data.Tree (Tree(Leaf, Node), drawTree)\n");
        let list = parsed.imports[0].list.as_deref().unwrap();
        assert_eq!(
            list,
            [
                ImportItem::Name("Tree".to_string()),
                ImportItem::Name("Leaf".to_string()),
                ImportItem::Name("Node".to_string()),
                ImportItem::Name("drawTree".to_string()),
            ]
        );
    }

    #[test]
    fn test_all_children_item() {
        let parsed = parse("import Data.Tree (Tree(..))\n");
        assert_eq!(
            parsed.imports[0].list.as_deref(),
            Some([ImportItem::AllChildren("Tree".to_string())].as_slice())
        );
    }

    #[test]
    fn test_operator_import() {
        let parsed = parse("import Data.Monoid ((<>))\n");
        assert_eq!(
            parsed.imports[0].list.as_deref(),
            Some([ImportItem::Name("<>".to_string())].as_slice())
        );
    }

    #[test]
    fn test_multiline_import_list() {
        let parsed = parse("import Data.List\n  ( sort\n  , nub\n  )\n");
        assert_eq!(
            parsed.imports[0].list.as_deref(),
            Some(
                [
                    ImportItem::Name("sort".to_string()),
                    ImportItem::Name("nub".to_string()),
                ]
                .as_slice()
            )
        );
    }

    #[test]
    fn test_visibility_xor_with_hiding() {
        let foo = symbol("foo", SymbolKind::Function, None);
        let bar = symbol("bar", SymbolKind::Function, None);

        let mut import = ImportDescriptor::plain("M");
        import.list = Some(vec![ImportItem::Name("foo".to_string())]);
        assert!(import.visible(&foo));
        assert!(!import.visible(&bar));

        import.hiding = true;
        assert!(!import.visible(&foo));
        assert!(import.visible(&bar));
    }

    #[test]
    fn test_all_children_visibility() {
        let mut import = ImportDescriptor::plain("Data.Tree");
        import.list = Some(vec![ImportItem::AllChildren("Tree".to_string())]);

        let tree = symbol("Tree", SymbolKind::Type, None);
        let node = symbol("Node", SymbolKind::Tag, Some("Tree"));
        let other = symbol("drawTree", SymbolKind::Function, None);
        assert!(import.visible(&tree));
        assert!(import.visible(&node));
        assert!(!import.visible(&other));
    }

    #[test]
    fn test_no_list_visibility() {
        let import = ImportDescriptor::plain("M");
        assert!(import.visible(&symbol("anything", SymbolKind::Function, None)));
    }

    proptest::proptest! {
        /// Flipping `hiding` always flips visibility for any listed or
        /// unlisted name
        #[test]
        fn prop_hiding_flips_visibility(
            listed in "[a-z][a-zA-Z0-9]{0,6}",
            probe in "[a-z][a-zA-Z0-9]{0,6}",
        ) {
            let target = symbol(&probe, SymbolKind::Function, None);
            let mut import = ImportDescriptor::plain("M");
            import.list = Some(vec![ImportItem::Name(listed)]);

            let exposed = import.visible(&target);
            import.hiding = true;
            proptest::prop_assert_eq!(import.visible(&target), !exposed);
        }
    }
}
