//! One-way injection of validator plugins into a project descriptor.

use crate::descriptor::BuildDescriptor;
use crate::error::DescriptorResult;
use crate::xml::{Element, QName};
use camino::Utf8Path;
use std::collections::BTreeMap;
use std::fmt;

/// Identity of a plugin: `(groupId, artifactId)`. Either part may be absent.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PluginId {
    pub group_id: Option<String>,
    pub artifact_id: Option<String>,
}

impl fmt::Display for PluginId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}",
            self.group_id.as_deref().unwrap_or("<none>"),
            self.artifact_id.as_deref().unwrap_or("<none>")
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginCoordinates {
    pub id: PluginId,
    pub version: Option<String>,
}

impl PluginCoordinates {
    /// Read `groupId`, `artifactId` and `version` from the plugin's own namespace.
    pub fn of(plugin: &Element) -> Self {
        let field = |local: &str| {
            plugin
                .child(&QName::new(plugin.name.namespace.clone(), local))
                .map(|e| e.text().trim().to_string())
                .filter(|text| !text.is_empty())
        };
        Self {
            id: PluginId {
                group_id: field("groupId"),
                artifact_id: field("artifactId"),
            },
            version: field("version"),
        }
    }
}

/// The destination already declares a plugin with the same identity but a
/// different version. Nothing was changed for this plugin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginVersionConflict {
    pub id: PluginId,
    pub existing: Option<String>,
    pub requested: Option<String>,
}

impl fmt::Display for PluginVersionConflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "plugin {} is declared with version {} but version {} was requested",
            self.id,
            self.existing.as_deref().unwrap_or("<none>"),
            self.requested.as_deref().unwrap_or("<none>")
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeReport {
    pub inserted: Vec<PluginId>,
    pub already_present: Vec<PluginId>,
    pub conflicts: Vec<PluginVersionConflict>,
}

impl MergeReport {
    pub fn has_conflicts(&self) -> bool {
        !self.conflicts.is_empty()
    }

    pub fn inserted_count(&self) -> usize {
        self.inserted.len()
    }

    pub fn already_present_count(&self) -> usize {
        self.already_present.len()
    }
}

/// Append every source plugin the destination does not declare yet.
///
/// Existing plugins are never touched. A plugin whose identity is already
/// declared with a different version is reported as a conflict and skipped;
/// the remaining plugins are still inserted.
pub fn merge_plugins(destination: &mut BuildDescriptor, source: Vec<Element>) -> MergeReport {
    let mut report = MergeReport::default();
    if source.is_empty() {
        return report;
    }

    let mut known: BTreeMap<PluginId, Option<String>> = BTreeMap::new();
    for coordinates in destination.plugin_coordinates() {
        known.entry(coordinates.id).or_insert(coordinates.version);
    }

    let namespace = destination.namespace().to_string();
    for mut plugin in source {
        let PluginCoordinates { id, version } = PluginCoordinates::of(&plugin);

        match known.get(&id) {
            None => {
                tracing::info!(
                    plugin = %id,
                    version = version.as_deref().unwrap_or(""),
                    "inserting plugin"
                );
                plugin.rewrite_namespace(&namespace);
                destination.append_plugin(plugin);
                known.insert(id.clone(), version);
                report.inserted.push(id);
            }
            Some(existing) if *existing == version => {
                tracing::info!(plugin = %id, "plugin already declared, skipping");
                report.already_present.push(id);
            }
            Some(existing) => {
                let conflict = PluginVersionConflict {
                    id: id.clone(),
                    existing: existing.clone(),
                    requested: version,
                };
                if report.conflicts.iter().any(|c| c.id == id) {
                    continue;
                }
                tracing::warn!("{}", conflict);
                report.conflicts.push(conflict);
            }
        }
    }

    report
}

/// Load the catalog at `catalog` and merge its plugins into `destination`.
pub fn merge_plugins_from(
    destination: &mut BuildDescriptor,
    catalog: &Utf8Path,
) -> DescriptorResult<MergeReport> {
    let source = BuildDescriptor::load(catalog)?;
    tracing::debug!(catalog = %catalog, "merging validator plugins");
    Ok(merge_plugins(destination, source.into_plugins()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn plugin(group: &str, artifact: &str, version: Option<&str>) -> Element {
        let mut text =
            format!("<plugin><groupId>{group}</groupId><artifactId>{artifact}</artifactId>");
        if let Some(version) = version {
            text.push_str(&format!("<version>{version}</version>"));
        }
        text.push_str("</plugin>");
        crate::xml::Document::parse(&text).expect("plugin").root
    }

    fn id(group: &str, artifact: &str) -> PluginId {
        PluginId {
            group_id: Some(group.to_string()),
            artifact_id: Some(artifact.to_string()),
        }
    }

    #[test]
    fn coordinates_trim_and_drop_empty_values() {
        let element = crate::xml::Document::parse(
            "<plugin><groupId> g </groupId><artifactId></artifactId></plugin>",
        )
        .expect("parse")
        .root;
        let coordinates = PluginCoordinates::of(&element);
        assert_eq!(coordinates.id.group_id.as_deref(), Some("g"));
        assert_eq!(coordinates.id.artifact_id, None);
        assert_eq!(coordinates.version, None);
    }

    #[test]
    fn conflict_display_names_both_versions() {
        let conflict = PluginVersionConflict {
            id: id("g", "a"),
            existing: Some("1.0".to_string()),
            requested: None,
        };
        assert_eq!(
            conflict.to_string(),
            "plugin g:a is declared with version 1.0 but version <none> was requested"
        );
    }

    #[test]
    fn missing_version_on_one_side_conflicts() {
        let mut pom = BuildDescriptor::parse_str(
            "<project><build><plugins><plugin><groupId>g</groupId><artifactId>a</artifactId></plugin></plugins></build></project>",
            Utf8Path::new("pom.xml"),
        )
        .expect("parse");
        let report = merge_plugins(&mut pom, vec![plugin("g", "a", Some("1.0"))]);
        assert_eq!(report.conflicts.len(), 1);
        assert_eq!(pom.plugin_elements().len(), 1);
    }

    #[test]
    fn repeated_source_key_is_inserted_once() {
        let mut pom = BuildDescriptor::parse_str("<project/>", Utf8Path::new("pom.xml"))
            .expect("parse");
        let report = merge_plugins(
            &mut pom,
            vec![plugin("g", "a", Some("1")), plugin("g", "a", Some("1"))],
        );
        assert_eq!(report.inserted, vec![id("g", "a")]);
        assert_eq!(report.already_present, vec![id("g", "a")]);
        assert_eq!(pom.plugin_elements().len(), 1);
    }

    #[test]
    fn one_conflict_per_key() {
        let mut pom = BuildDescriptor::parse_str(
            "<project><build><plugins><plugin><groupId>g</groupId><artifactId>a</artifactId><version>1</version></plugin></plugins></build></project>",
            Utf8Path::new("pom.xml"),
        )
        .expect("parse");
        let report = merge_plugins(
            &mut pom,
            vec![plugin("g", "a", Some("2")), plugin("g", "a", Some("3"))],
        );
        assert_eq!(report.conflicts.len(), 1);
        assert_eq!(report.conflicts[0].requested.as_deref(), Some("2"));
    }

    #[test]
    fn empty_source_creates_nothing() {
        let mut pom = BuildDescriptor::parse_str("<project/>", Utf8Path::new("pom.xml"))
            .expect("parse");
        let report = merge_plugins(&mut pom, Vec::new());
        assert_eq!(report, MergeReport::default());
        assert!(pom.plugins_container().is_none());
    }
}
