//! A small owned XML tree with qualified names, read and written with quick-xml.
//!
//! Every element and attribute name is a [`QName`] (namespace URI + local name).
//! Prefixes exist only at the edges: they are resolved away while parsing and
//! chosen again when writing.

use encoding_rs::{Encoding, UTF_8};
use quick_xml::Writer;
use quick_xml::events::{BytesCData, BytesDecl, BytesEnd, BytesPI, BytesStart, BytesText, Event};
use quick_xml::name::{PrefixDeclaration, ResolveResult};
use quick_xml::reader::{NsReader, Reader};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Namespace bound to the reserved `xml` prefix.
pub const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlError {
    pub message: String,
    pub position: Option<u64>,
}

impl XmlError {
    fn new(message: impl fmt::Display, position: Option<u64>) -> Self {
        Self {
            message: message.to_string(),
            position,
        }
    }
}

impl fmt::Display for XmlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.position {
            Some(position) => write!(f, "{} (near byte {})", self.message, position),
            None => f.write_str(&self.message),
        }
    }
}

impl std::error::Error for XmlError {}

/// Namespace-qualified name. An empty namespace means "no namespace".
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QName {
    pub namespace: String,
    pub local: String,
}

impl QName {
    pub fn new(namespace: impl Into<String>, local: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            local: local.into(),
        }
    }

    pub fn unqualified(local: impl Into<String>) -> Self {
        Self::new(String::new(), local)
    }
}

/// Clark notation: `{uri}local`, or just `local` without a namespace.
impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace.is_empty() {
            f.write_str(&self.local)
        } else {
            write!(f, "{{{}}}{}", self.namespace, self.local)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: QName,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    Text(String),
    CData(String),
    Comment(String),
    ProcessingInstruction(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub name: QName,
    pub attributes: Vec<Attribute>,
    pub children: Vec<Node>,
}

impl Element {
    pub fn new(name: QName) -> Self {
        Self {
            name,
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn child_elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|node| match node {
            Node::Element(element) => Some(element),
            _ => None,
        })
    }

    /// First direct child with the given name.
    pub fn child(&self, name: &QName) -> Option<&Element> {
        self.child_elements().find(|child| &child.name == name)
    }

    /// Concatenated direct text and CDATA content.
    pub fn text(&self) -> String {
        let mut out = String::new();
        for node in &self.children {
            match node {
                Node::Text(text) | Node::CData(text) => out.push_str(text),
                _ => {}
            }
        }
        out
    }

    pub fn attribute(&self, name: &QName) -> Option<&str> {
        self.attributes
            .iter()
            .find(|attr| &attr.name == name)
            .map(|attr| attr.value.as_str())
    }

    pub fn child_mut(&mut self, name: &QName) -> Option<&mut Element> {
        self.children.iter_mut().find_map(|node| match node {
            Node::Element(element) if &element.name == name => Some(element),
            _ => None,
        })
    }

    /// Append a child element and return its index in `children`.
    ///
    /// When the existing children are laid out with indentation whitespace,
    /// the new element reuses the indentation of the last element child and
    /// keeps the closing whitespace last.
    pub fn append_element(&mut self, child: Element) -> usize {
        let closing_whitespace = matches!(self.children.last(), Some(Node::Text(t)) if is_blank(t));
        if closing_whitespace && let Some(indent) = self.item_indent() {
            let at = self.children.len() - 1;
            self.children.insert(at, Node::Text(indent));
            self.children.insert(at + 1, Node::Element(child));
            return at + 1;
        }
        self.children.push(Node::Element(child));
        self.children.len() - 1
    }

    fn item_indent(&self) -> Option<String> {
        let last = self
            .children
            .iter()
            .rposition(|node| matches!(node, Node::Element(_)))?;
        match self.children.get(last.checked_sub(1)?) {
            Some(Node::Text(text)) if is_blank(text) => Some(text.clone()),
            _ => None,
        }
    }

    /// Move this element and every descendant element into `namespace`.
    ///
    /// Attributes bound to an element's previous namespace follow it;
    /// unqualified attributes stay unqualified.
    pub fn rewrite_namespace(&mut self, namespace: &str) {
        let previous = std::mem::replace(&mut self.name.namespace, namespace.to_string());
        if !previous.is_empty() {
            for attr in &mut self.attributes {
                if attr.name.namespace == previous {
                    attr.name.namespace = namespace.to_string();
                }
            }
        }
        for node in &mut self.children {
            if let Node::Element(child) = node {
                child.rewrite_namespace(namespace);
            }
        }
    }

    /// Every element and attribute namespace used in this subtree.
    pub fn namespaces(&self) -> UsedNamespaces {
        let mut used = UsedNamespaces::default();
        self.collect_namespaces(&mut used);
        used
    }

    fn collect_namespaces(&self, used: &mut UsedNamespaces) {
        used.elements.insert(self.name.namespace.clone());
        for attr in &self.attributes {
            used.attributes.insert(attr.name.namespace.clone());
        }
        for child in self.child_elements() {
            child.collect_namespaces(used);
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UsedNamespaces {
    pub elements: BTreeSet<String>,
    pub attributes: BTreeSet<String>,
}

fn is_blank(text: &str) -> bool {
    text.chars().all(char::is_whitespace)
}

/// A parsed document: the root element plus what surrounds it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// Comments and processing instructions before the root element.
    pub prolog: Vec<Node>,
    pub root: Element,
    /// Prefixes seen in the source, keyed by namespace URI (first one wins).
    pub prefixes: BTreeMap<String, String>,
}

impl Document {
    /// Parse raw bytes, honouring a byte order mark or the encoding named in
    /// the XML declaration.
    pub fn parse_bytes(bytes: &[u8]) -> Result<Self, XmlError> {
        Self::parse(&decode_document(bytes)?)
    }

    pub fn parse(text: &str) -> Result<Self, XmlError> {
        let mut reader = NsReader::from_str(text);
        let mut prefixes = BTreeMap::new();
        let mut prolog = Vec::new();
        let mut stack: Vec<Element> = Vec::new();
        let mut root: Option<Element> = None;

        loop {
            let position = Some(reader.buffer_position() as u64);
            let (resolved, event) = reader
                .read_resolved_event()
                .map_err(|err| XmlError::new(err, position))?;
            let namespace = resolved_namespace(resolved)
                .map_err(|prefix| unbound_prefix(&prefix, position))?;

            match event {
                Event::Start(start) => {
                    let element = start_element(&reader, &start, namespace, &mut prefixes)
                        .map_err(|msg| XmlError::new(msg, position))?;
                    stack.push(element);
                }
                Event::Empty(start) => {
                    let element = start_element(&reader, &start, namespace, &mut prefixes)
                        .map_err(|msg| XmlError::new(msg, position))?;
                    attach(element, &mut stack, &mut root, position)?;
                }
                Event::End(_) => {
                    let element = stack
                        .pop()
                        .ok_or_else(|| XmlError::new("unexpected closing tag", position))?;
                    attach(element, &mut stack, &mut root, position)?;
                }
                Event::Text(text) => {
                    let value = text
                        .unescape()
                        .map_err(|err| XmlError::new(err, position))?;
                    match stack.last_mut() {
                        Some(parent) if !value.is_empty() => {
                            parent.children.push(Node::Text(value.into_owned()))
                        }
                        Some(_) => {}
                        None if is_blank(&value) => {}
                        None => {
                            return Err(XmlError::new("text outside the root element", position));
                        }
                    }
                }
                Event::CData(data) => match stack.last_mut() {
                    Some(parent) => parent.children.push(Node::CData(lossy(&data))),
                    None => return Err(XmlError::new("CDATA outside the root element", position)),
                },
                Event::Comment(comment) => {
                    push_misc(Node::Comment(lossy(&comment)), &mut stack, &root, &mut prolog)
                }
                Event::PI(pi) => push_misc(
                    Node::ProcessingInstruction(lossy(&pi)),
                    &mut stack,
                    &root,
                    &mut prolog,
                ),
                Event::Eof => break,
                _ => {}
            }
        }

        if let Some(open) = stack.last() {
            return Err(XmlError::new(
                format!("unclosed element <{}>", open.name.local),
                None,
            ));
        }
        let root = root.ok_or_else(|| XmlError::new("document has no root element", None))?;

        Ok(Document {
            prolog,
            root,
            prefixes,
        })
    }

    /// Encode the document as UTF-8 with an XML declaration.
    ///
    /// `default_namespace` is declared on the root and written without a
    /// prefix. Other namespaces reuse the prefix seen while parsing, or get
    /// `nsN` when none is known.
    pub fn to_xml(&self, default_namespace: &str) -> Result<String, XmlError> {
        let bindings = self.bindings(default_namespace);
        let mut writer = Writer::new(Vec::new());

        emit(
            &mut writer,
            Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)),
        )?;
        writer.get_mut().push(b'\n');
        for node in &self.prolog {
            write_node(&mut writer, node, "", &bindings)?;
            writer.get_mut().push(b'\n');
        }

        let mut root_decls = Vec::new();
        if !default_namespace.is_empty() {
            root_decls.push(("xmlns".to_string(), default_namespace.to_string()));
        }
        for (uri, prefix) in &bindings {
            if uri != XML_NAMESPACE {
                root_decls.push((format!("xmlns:{}", prefix), uri.clone()));
            }
        }
        write_element(
            &mut writer,
            &self.root,
            default_namespace,
            &bindings,
            root_decls,
        )?;
        writer.get_mut().push(b'\n');

        String::from_utf8(writer.into_inner()).map_err(|err| XmlError::new(err, None))
    }

    fn bindings(&self, default_namespace: &str) -> BTreeMap<String, String> {
        let used = self.root.namespaces();
        let mut needed: BTreeSet<&String> = used
            .elements
            .iter()
            .filter(|ns| ns.as_str() != default_namespace)
            .collect();
        needed.extend(used.attributes.iter());
        needed.retain(|ns| !ns.is_empty());

        let mut bindings = BTreeMap::new();
        let mut taken: BTreeSet<String> = BTreeSet::new();
        for uri in needed {
            let prefix = if uri == XML_NAMESPACE {
                "xml".to_string()
            } else {
                match self.prefixes.get(uri) {
                    Some(prefix) if !taken.contains(prefix) && prefix != "xml" => prefix.clone(),
                    _ => free_prefix(&taken),
                }
            };
            taken.insert(prefix.clone());
            bindings.insert(uri.clone(), prefix);
        }
        bindings
    }
}

fn free_prefix(taken: &BTreeSet<String>) -> String {
    let mut n = 0usize;
    loop {
        let candidate = format!("ns{}", n);
        if !taken.contains(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

fn lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

fn resolved_namespace(resolved: ResolveResult<'_>) -> Result<String, String> {
    match resolved {
        ResolveResult::Bound(namespace) => Ok(lossy(namespace.0)),
        ResolveResult::Unbound => Ok(String::new()),
        ResolveResult::Unknown(prefix) => Err(lossy(&prefix)),
    }
}

/// Decode a document to UTF-8 text.
///
/// A byte order mark wins over the declaration; without either the bytes must
/// be UTF-8.
pub fn decode_document(bytes: &[u8]) -> Result<String, XmlError> {
    let (encoding, body) = match Encoding::for_bom(bytes) {
        Some((encoding, bom_length)) => (encoding, &bytes[bom_length..]),
        None => (declared_encoding(bytes)?.unwrap_or(UTF_8), bytes),
    };
    encoding
        .decode_without_bom_handling_and_without_replacement(body)
        .map(|text| text.into_owned())
        .ok_or_else(|| XmlError::new(format!("document is not valid {}", encoding.name()), None))
}

fn declared_encoding(bytes: &[u8]) -> Result<Option<&'static Encoding>, XmlError> {
    let mut reader = Reader::from_reader(bytes);
    let mut buf = Vec::new();
    let Ok(Event::Decl(decl)) = reader.read_event_into(&mut buf) else {
        return Ok(None);
    };
    let Some(label) = decl.encoding() else {
        return Ok(None);
    };
    let label = label.map_err(|err| XmlError::new(err, Some(0)))?;
    Encoding::for_label(label.trim_ascii()).map(Some).ok_or_else(|| {
        XmlError::new(
            format!("unknown encoding `{}`", String::from_utf8_lossy(&label)),
            Some(0),
        )
    })
}

fn unbound_prefix(prefix: &str, position: Option<u64>) -> XmlError {
    XmlError::new(format!("unbound namespace prefix `{}`", prefix), position)
}

fn start_element(
    reader: &NsReader<&[u8]>,
    start: &BytesStart<'_>,
    namespace: String,
    prefixes: &mut BTreeMap<String, String>,
) -> Result<Element, String> {
    let mut element = Element::new(QName::new(namespace, lossy(start.local_name().as_ref())));

    for attr in start.attributes() {
        let attr = attr.map_err(|err| err.to_string())?;
        let value = attr
            .decode_and_unescape_value(reader.decoder())
            .map_err(|err| err.to_string())?
            .into_owned();

        match attr.key.as_namespace_binding() {
            Some(PrefixDeclaration::Named(prefix)) => {
                prefixes.entry(value).or_insert_with(|| lossy(prefix));
                continue;
            }
            Some(_) => continue,
            None => {}
        }

        let (resolved, local) = reader.resolve_attribute(attr.key);
        let namespace = resolved_namespace(resolved)
            .map_err(|prefix| format!("unbound namespace prefix `{}`", prefix))?;
        element.attributes.push(Attribute {
            name: QName::new(namespace, lossy(local.as_ref())),
            value,
        });
    }

    Ok(element)
}

fn attach(
    element: Element,
    stack: &mut [Element],
    root: &mut Option<Element>,
    position: Option<u64>,
) -> Result<(), XmlError> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(Node::Element(element)),
        None if root.is_none() => *root = Some(element),
        None => return Err(XmlError::new("more than one root element", position)),
    }
    Ok(())
}

fn push_misc(node: Node, stack: &mut [Element], root: &Option<Element>, prolog: &mut Vec<Node>) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(node),
        None if root.is_none() => prolog.push(node),
        // Trailing comments after the root are not kept.
        None => {}
    }
}

fn emit(writer: &mut Writer<Vec<u8>>, event: Event<'_>) -> Result<(), XmlError> {
    writer
        .write_event(event)
        .map_err(|err| XmlError::new(err, None))
}

fn qualified(name: &QName, bindings: &BTreeMap<String, String>) -> String {
    match bindings.get(&name.namespace) {
        Some(prefix) if !name.namespace.is_empty() => format!("{}:{}", prefix, name.local),
        _ => name.local.clone(),
    }
}

fn write_element(
    writer: &mut Writer<Vec<u8>>,
    element: &Element,
    default_namespace: &str,
    bindings: &BTreeMap<String, String>,
    extra_attributes: Vec<(String, String)>,
) -> Result<(), XmlError> {
    let mut child_default = default_namespace;
    let tag = if element.name.namespace == default_namespace {
        element.name.local.clone()
    } else if !element.name.namespace.is_empty() && bindings.contains_key(&element.name.namespace)
    {
        qualified(&element.name, bindings)
    } else {
        // The element sits in a namespace with no prefix binding (the
        // document default, or none at all): redeclare the default here.
        child_default = element.name.namespace.as_str();
        element.name.local.clone()
    };

    let mut start = BytesStart::new(tag.clone());
    for (key, value) in &extra_attributes {
        start.push_attribute((key.as_str(), value.as_str()));
    }
    if child_default != default_namespace {
        start.push_attribute(("xmlns", child_default));
    }
    for attr in &element.attributes {
        let key = qualified(&attr.name, bindings);
        start.push_attribute((key.as_str(), attr.value.as_str()));
    }

    if element.children.is_empty() {
        return emit(writer, Event::Empty(start));
    }

    emit(writer, Event::Start(start))?;
    for node in &element.children {
        write_node(writer, node, child_default, bindings)?;
    }
    emit(writer, Event::End(BytesEnd::new(tag)))
}

fn write_node(
    writer: &mut Writer<Vec<u8>>,
    node: &Node,
    default_namespace: &str,
    bindings: &BTreeMap<String, String>,
) -> Result<(), XmlError> {
    match node {
        Node::Element(element) => {
            write_element(writer, element, default_namespace, bindings, Vec::new())
        }
        Node::Text(text) => emit(writer, Event::Text(BytesText::new(text))),
        Node::CData(data) => emit(writer, Event::CData(BytesCData::new(data.as_str()))),
        Node::Comment(comment) => {
            emit(writer, Event::Comment(BytesText::from_escaped(comment.as_str())))
        }
        Node::ProcessingInstruction(content) => {
            emit(writer, Event::PI(BytesPI::new(content.as_str())))
        }
    }
}
