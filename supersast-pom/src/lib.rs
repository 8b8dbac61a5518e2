//! Build-descriptor model and plugin merge engine for supersast.
//!
//! Responsibilities:
//! - Load a `pom.xml` into a namespace-aware tree and write it back.
//! - Query it with slash-separated paths resolved against its own namespace.
//! - Inject validator plugins without duplicating or overriding declared ones.

pub mod descriptor;
pub mod error;
pub mod merge;
pub mod xml;

pub use descriptor::BuildDescriptor;
pub use error::{DescriptorError, DescriptorResult};
pub use merge::{
    MergeReport, PluginCoordinates, PluginId, PluginVersionConflict, merge_plugins,
    merge_plugins_from,
};
pub use xml::{Element, QName, XmlError};
