//! The build descriptor (`pom.xml`) as a namespace-aware tree.

use crate::error::{DescriptorError, DescriptorResult};
use crate::merge::PluginCoordinates;
use crate::xml::{Document, Element, Node, QName, XmlError};
use camino::{Utf8Path, Utf8PathBuf};
use fs_err as fs;

/// Path of the plugin list below the project root element.
pub const PLUGINS_PATH: &str = "build/plugins";

/// Path of a single plugin declaration below the project root element.
pub const PLUGIN_PATH: &str = "build/plugins/plugin";

#[derive(Debug, Clone)]
pub struct BuildDescriptor {
    origin: Utf8PathBuf,
    namespace: String,
    document: Document,
}

impl BuildDescriptor {
    pub fn load(path: &Utf8Path) -> DescriptorResult<Self> {
        let bytes = fs::read(path).map_err(|source| DescriptorError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse_bytes(&bytes, path)
    }

    /// Parse raw descriptor bytes in whatever encoding they declare.
    pub fn parse_bytes(bytes: &[u8], origin: &Utf8Path) -> DescriptorResult<Self> {
        let document = Document::parse_bytes(bytes).map_err(|err| malformed(origin, err))?;
        Ok(Self::from_document(document, origin))
    }

    pub fn parse_str(text: &str, origin: &Utf8Path) -> DescriptorResult<Self> {
        let document = Document::parse(text).map_err(|err| malformed(origin, err))?;
        Ok(Self::from_document(document, origin))
    }

    fn from_document(document: Document, origin: &Utf8Path) -> Self {
        let namespace = document.root.name.namespace.clone();
        tracing::debug!(path = %origin, namespace = %namespace, "loaded build descriptor");
        Self {
            origin: origin.to_path_buf(),
            namespace,
            document,
        }
    }

    pub fn origin(&self) -> &Utf8Path {
        &self.origin
    }

    /// Namespace URI of the root element; empty when the document has none.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn root(&self) -> &Element {
        &self.document.root
    }

    /// `local` qualified with the descriptor's namespace.
    pub fn qname(&self, local: &str) -> QName {
        QName::new(self.namespace.clone(), local)
    }

    /// Split a slash-separated path into qualified segments.
    pub fn resolve(&self, path: &str) -> Vec<QName> {
        path.split('/')
            .filter(|segment| !segment.is_empty())
            .map(|segment| self.qname(segment))
            .collect()
    }

    pub fn find_first<'a>(
        &'a self,
        path: &str,
        within: Option<&'a Element>,
    ) -> Option<&'a Element> {
        self.find_all(path, within).into_iter().next()
    }

    /// All elements at `path`, searched level by level from the root (or
    /// from `within`), in document order.
    pub fn find_all<'a>(&'a self, path: &str, within: Option<&'a Element>) -> Vec<&'a Element> {
        let mut current = vec![within.unwrap_or(&self.document.root)];
        for segment in self.resolve(path) {
            current = current
                .into_iter()
                .flat_map(|element| {
                    element
                        .child_elements()
                        .filter(|child| child.name == segment)
                        .collect::<Vec<_>>()
                })
                .collect();
            if current.is_empty() {
                break;
            }
        }
        current
    }

    pub fn plugin_elements(&self) -> Vec<&Element> {
        self.find_all(PLUGIN_PATH, None)
    }

    pub fn plugin_coordinates(&self) -> Vec<PluginCoordinates> {
        self.plugin_elements()
            .into_iter()
            .map(PluginCoordinates::of)
            .collect()
    }

    pub fn plugins_container(&self) -> Option<&Element> {
        self.find_first(PLUGINS_PATH, None)
    }

    /// Append `plugin` to the first `<build><plugins>` list, creating either
    /// level when missing.
    pub fn append_plugin(&mut self, plugin: Element) {
        let build = self.qname("build");
        let plugins = self.qname("plugins");
        let root = &mut self.document.root;
        match root.child_mut(&build) {
            Some(section) => match section.child_mut(&plugins) {
                Some(container) => {
                    container.append_element(plugin);
                }
                None => {
                    section.append_element(wrap(plugins, plugin));
                }
            },
            None => {
                root.append_element(wrap(build, wrap(plugins, plugin)));
            }
        }
    }

    /// Consume the descriptor and hand out every element at [`PLUGIN_PATH`],
    /// in document order.
    pub fn into_plugins(mut self) -> Vec<Element> {
        let segments = self.resolve(PLUGIN_PATH);
        let mut out = Vec::new();
        drain_path(&mut self.document.root, &segments, &mut out);
        out
    }

    pub fn to_xml_string(&self) -> DescriptorResult<String> {
        self.document
            .to_xml(&self.namespace)
            .map_err(|err| DescriptorError::Serialize {
                path: self.origin.clone(),
                message: err.to_string(),
            })
    }

    pub fn serialize(&self, path: &Utf8Path) -> DescriptorResult<()> {
        let text = self.to_xml_string()?;
        fs::write(path, text).map_err(|source| DescriptorError::Write {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!(path = %path, "wrote build descriptor");
        Ok(())
    }

    /// Leading comments and processing instructions kept from the source.
    pub fn prolog(&self) -> &[Node] {
        &self.document.prolog
    }
}

fn malformed(origin: &Utf8Path, err: XmlError) -> DescriptorError {
    DescriptorError::MalformedDocument {
        path: origin.to_path_buf(),
        message: err.to_string(),
    }
}

fn wrap(name: QName, child: Element) -> Element {
    let mut element = Element::new(name);
    element.append_element(child);
    element
}

/// Move every element at `segments` below `element` into `out`.
fn drain_path(element: &mut Element, segments: &[QName], out: &mut Vec<Element>) {
    let Some((first, rest)) = segments.split_first() else {
        return;
    };
    if rest.is_empty() {
        for node in std::mem::take(&mut element.children) {
            match node {
                Node::Element(child) if &child.name == first => out.push(child),
                other => element.children.push(other),
            }
        }
        return;
    }
    for node in &mut element.children {
        if let Node::Element(child) = node
            && &child.name == first
        {
            drain_path(child, rest, out);
        }
    }
}
