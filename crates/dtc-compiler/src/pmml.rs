//! Owned, namespace-aware element tree for PMML documents.
//!
//! The compiler only needs element names, attributes and nesting, so text
//! content, comments and processing instructions are dropped while parsing.

use std::path::Path;

use quick_xml::NsReader;
use quick_xml::events::{BytesStart, Event};
use quick_xml::name::ResolveResult;
use tracing::{debug, instrument};

use crate::error::CompileError;

/// A single XML element with its resolved namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    name: String,
    namespace: Option<String>,
    attributes: Vec<(String, String)>,
    children: Vec<Element>,
}

impl Element {
    fn open(
        namespace: ResolveResult<'_>,
        start: &BytesStart<'_>,
        offset: u64,
    ) -> Result<Self, CompileError> {
        let namespace = match namespace {
            ResolveResult::Bound(ns) => Some(String::from_utf8_lossy(ns.as_ref()).into_owned()),
            ResolveResult::Unbound => None,
            ResolveResult::Unknown(prefix) => {
                return Err(CompileError::invalid_schema(format!(
                    "element uses undeclared namespace prefix \"{}\"",
                    String::from_utf8_lossy(&prefix)
                )));
            }
        };

        let mut attributes = Vec::new();
        for attr in start.attributes() {
            let attr = attr.map_err(|e| CompileError::MalformedXml {
                offset,
                source: quick_xml::Error::from(e),
            })?;
            if attr.key.as_namespace_binding().is_some() {
                continue;
            }
            let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
            let value = attr
                .unescape_value()
                .map_err(|source| CompileError::MalformedXml { offset, source })?
                .into_owned();
            attributes.push((key, value));
        }

        Ok(Self {
            name: String::from_utf8_lossy(start.local_name().as_ref()).into_owned(),
            namespace,
            attributes,
            children: Vec::new(),
        })
    }

    /// Return the local (unprefixed) element name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Return the namespace URI the element is bound to, if any.
    #[must_use]
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    /// Return the value of an unprefixed attribute.
    #[must_use]
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Return the value of a required attribute.
    ///
    /// # Errors
    ///
    /// Returns [`CompileError::InvalidSchema`] when the attribute is absent.
    pub fn required_attribute(&self, key: &str) -> Result<&str, CompileError> {
        self.attribute(key).ok_or_else(|| {
            CompileError::invalid_schema(format!(
                "<{}> is missing required attribute \"{key}\"",
                self.name
            ))
        })
    }

    /// Iterate over the child elements named `name` in this element's namespace.
    pub fn children_named<'a, 'n>(
        &'a self,
        name: &'n str,
    ) -> impl Iterator<Item = &'a Element> {
        self.children
            .iter()
            .filter(move |c| c.name == name && c.namespace == self.namespace)
    }

    /// Return the first child element named `name` in this element's namespace.
    #[must_use]
    pub fn child(&self, name: &str) -> Option<&Element> {
        self.children
            .iter()
            .find(|c| c.name == name && c.namespace == self.namespace)
    }

    /// Follow a `/`-separated path of child names, e.g. `"MiningModel/Segmentation"`.
    #[must_use]
    pub fn find(&self, path: &str) -> Option<&Element> {
        path.split('/')
            .try_fold(self, |element, segment| element.child(segment))
    }
}

/// A parsed PMML document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    root: Element,
}

impl Document {
    /// Parse a document from XML text.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`CompileError::MalformedXml`] | the text is not well-formed XML |
    /// | [`CompileError::InvalidSchema`] | no root element, several roots, an unclosed element, or an undeclared prefix |
    pub fn parse(text: &str) -> Result<Self, CompileError> {
        let mut reader = NsReader::from_str(text);
        let mut stack: Vec<Element> = Vec::new();
        let mut root: Option<Element> = None;

        loop {
            let offset = reader.buffer_position() as u64;
            let (namespace, event) = reader
                .read_resolved_event()
                .map_err(|source| CompileError::MalformedXml { offset, source })?;
            match event {
                Event::Start(start) => {
                    stack.push(Element::open(namespace, &start, offset)?);
                }
                Event::Empty(start) => {
                    let element = Element::open(namespace, &start, offset)?;
                    attach(&mut stack, &mut root, element)?;
                }
                Event::End(_) => {
                    let element = stack.pop().ok_or_else(|| {
                        CompileError::invalid_schema("closing tag without a matching opening tag")
                    })?;
                    attach(&mut stack, &mut root, element)?;
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if let Some(open) = stack.last() {
            return Err(CompileError::invalid_schema(format!(
                "document ends inside <{}>",
                open.name
            )));
        }
        let root = root.ok_or_else(|| CompileError::invalid_schema("document has no root element"))?;
        Ok(Self { root })
    }

    /// Read and parse a document from a file.
    ///
    /// # Errors
    ///
    /// Returns [`CompileError::ReadDocument`] when the file cannot be read,
    /// otherwise the same errors as [`Document::parse`].
    #[instrument(fields(path = %path.as_ref().display()))]
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, CompileError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| CompileError::ReadDocument {
            path: path.to_path_buf(),
            source: e,
        })?;
        let document = Self::parse(&text)?;
        debug!(
            size_bytes = text.len(),
            root = document.root.name(),
            "document parsed"
        );
        Ok(document)
    }

    /// Return the root element.
    #[must_use]
    pub fn root(&self) -> &Element {
        &self.root
    }
}

fn attach(
    stack: &mut [Element],
    root: &mut Option<Element>,
    element: Element,
) -> Result<(), CompileError> {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(element);
    } else if root.is_none() {
        *root = Some(element);
    } else {
        return Err(CompileError::invalid_schema("document has more than one root element"));
    }
    Ok(())
}
