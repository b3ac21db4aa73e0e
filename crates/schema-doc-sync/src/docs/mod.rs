//! Documentation corpus index.
//!
//! Reads a .NET XML documentation file once and answers lookups by symbol
//! name prefix (`T:Shop.Order`, `P:Shop.Order.Total`, ...). The index is
//! immutable after construction and can be shared across threads.

use std::io::Read;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{Result, SyncError};

/// Kind discriminator of a documented symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SymbolKind {
    Type,
    Field,
    Method,
    Property,
}

impl SymbolKind {
    /// Prefix character used in symbol names.
    pub fn prefix(self) -> char {
        match self {
            SymbolKind::Type => 'T',
            SymbolKind::Field => 'F',
            SymbolKind::Method => 'M',
            SymbolKind::Property => 'P',
        }
    }
}

/// One documented symbol with its normalized summary text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentationEntry {
    symbol_name: String,
    text: String,
}

impl DocumentationEntry {
    pub fn symbol_name(&self) -> &str {
        &self.symbol_name
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

/// In-memory, read-only index over a documentation corpus.
#[derive(Debug, Clone)]
pub struct DocumentationIndex {
    source: String,
    assembly: Option<String>,
    entries: Vec<DocumentationEntry>,
}

impl DocumentationIndex {
    /// Load the corpus that ships next to the running executable
    /// (`<exe-dir>/<exe-stem>.xml`).
    pub fn embedded() -> Result<Self> {
        let path = default_corpus_path()?;
        Self::load(path)
    }

    /// Load a corpus from an explicit path.
    ///
    /// Fails with [`SyncError::CorpusNotFound`] if the file does not exist.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(SyncError::CorpusNotFound {
                path: path.to_path_buf(),
            });
        }

        let xml = std::fs::read_to_string(path)?;
        Self::parse(&xml, path.display().to_string())
    }

    /// Parse a corpus from any reader.
    pub fn from_reader<R: Read>(mut reader: R) -> Result<Self> {
        let mut xml = String::new();
        reader.read_to_string(&mut xml)?;
        Self::parse(&xml, "<reader>".to_string())
    }

    /// Parse a corpus held in memory.
    pub fn from_xml(xml: &str) -> Result<Self> {
        Self::parse(xml, "<memory>".to_string())
    }

    fn parse(xml: &str, source: String) -> Result<Self> {
        let document = roxmltree::Document::parse(xml)
            .map_err(|e| SyncError::Corpus(format!("{}: {}", source, e)))?;

        let assembly = document
            .descendants()
            .find(|n| n.has_tag_name("assembly"))
            .and_then(|a| a.children().find(|n| n.has_tag_name("name")))
            .map(|n| normalize_whitespace(&inner_text(n)));

        // Members without a <summary> are not indexed, so they never shadow a
        // later entry with the same prefix.
        let entries: Vec<DocumentationEntry> = document
            .descendants()
            .filter(|n| n.has_tag_name("member"))
            .filter_map(|member| {
                let symbol_name = member.attribute("name")?;
                let summary = member.children().find(|n| n.has_tag_name("summary"))?;
                Some(DocumentationEntry {
                    symbol_name: symbol_name.to_string(),
                    text: normalize_whitespace(&inner_text(summary)),
                })
            })
            .collect();

        info!(
            "Loaded {} documented symbols from {}{}",
            entries.len(),
            source,
            assembly
                .as_deref()
                .map(|a| format!(" (assembly {})", a))
                .unwrap_or_default()
        );

        Ok(Self {
            source,
            assembly,
            entries,
        })
    }

    /// Summary of the first entry whose symbol name starts with
    /// `"<prefix>:<symbol_path>"`, or `None` when nothing matches or the
    /// matching summary is empty.
    pub fn lookup(&self, kind: SymbolKind, symbol_path: &str) -> Option<&str> {
        let needle = format!("{}:{}", kind.prefix(), symbol_path);
        let entry = self
            .entries
            .iter()
            .find(|e| e.symbol_name.starts_with(&needle))?;

        debug!("{} -> {}", needle, entry.symbol_name);
        Some(entry.text.as_str()).filter(|text| !text.is_empty())
    }

    /// Where the corpus was read from.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Assembly name declared by the corpus, if any.
    pub fn assembly_name(&self) -> Option<&str> {
        self.assembly.as_deref()
    }

    pub fn entries(&self) -> &[DocumentationEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Collapse every whitespace run to one space and trim both ends.
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Concatenated text of all descendant text nodes.
fn inner_text(node: roxmltree::Node<'_, '_>) -> String {
    node.descendants()
        .filter(|n| n.is_text())
        .filter_map(|n| n.text())
        .collect()
}

fn default_corpus_path() -> Result<PathBuf> {
    let exe = std::env::current_exe()?;
    Ok(exe.with_extension("xml"))
}
