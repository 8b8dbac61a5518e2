//! Property-based tests for the plugin merge.
//!
//! These tests verify key invariants:
//! - Idempotency: merging the same catalog twice changes nothing the second time
//! - No reordering: existing plugins keep their relative order
//! - Counting: N plugins with new identities grow the list by exactly N
//! - Round trip: the serialized result reloads with the same identities

use camino::Utf8Path;
use proptest::prelude::*;
use supersast_pom::{BuildDescriptor, PluginId, merge_plugins};

const POM_NS: &str = "http://maven.apache.org/POM/4.0.0";

type Coordinate = (String, String, String);

fn arb_coordinate() -> impl Strategy<Value = Coordinate> {
    (
        prop::string::string_regex(r"com\.[a-c]").unwrap(),
        prop::string::string_regex(r"art[a-d]").unwrap(),
        prop::string::string_regex(r"[1-3]\.0").unwrap(),
    )
}

/// Coordinates with unique identities.
fn arb_plugins(max: usize) -> impl Strategy<Value = Vec<Coordinate>> {
    prop::collection::vec(arb_coordinate(), 0..max).prop_map(|mut plugins| {
        let mut seen = std::collections::BTreeSet::new();
        plugins.retain(|(g, a, _)| seen.insert((g.clone(), a.clone())));
        plugins
    })
}

fn pom(namespace: bool, plugins: &[Coordinate]) -> BuildDescriptor {
    let ns = if namespace {
        format!(" xmlns=\"{POM_NS}\"")
    } else {
        String::new()
    };
    let body: String = plugins
        .iter()
        .map(|(g, a, v)| {
            format!(
                "<plugin><groupId>{g}</groupId><artifactId>{a}</artifactId><version>{v}</version></plugin>"
            )
        })
        .collect();
    BuildDescriptor::parse_str(
        &format!("<project{ns}><build><plugins>{body}</plugins></build></project>"),
        Utf8Path::new("pom.xml"),
    )
    .unwrap()
}

fn ids(descriptor: &BuildDescriptor) -> Vec<PluginId> {
    descriptor
        .plugin_coordinates()
        .into_iter()
        .map(|c| c.id)
        .collect()
}

proptest! {
    #[test]
    fn merging_twice_is_idempotent(
        existing in arb_plugins(6),
        catalog in arb_plugins(6),
        ns_dest in any::<bool>(),
        ns_src in any::<bool>(),
    ) {
        let mut destination = pom(ns_dest, &existing);
        merge_plugins(&mut destination, pom(ns_src, &catalog).into_plugins());
        let once = destination.to_xml_string().unwrap();

        let second = merge_plugins(&mut destination, pom(ns_src, &catalog).into_plugins());
        prop_assert!(second.inserted.is_empty());
        prop_assert_eq!(destination.to_xml_string().unwrap(), once);
    }

    #[test]
    fn existing_plugins_keep_their_order(
        existing in arb_plugins(6),
        catalog in arb_plugins(6),
    ) {
        let mut destination = pom(true, &existing);
        let before = ids(&destination);
        merge_plugins(&mut destination, pom(false, &catalog).into_plugins());
        let after = ids(&destination);

        prop_assert!(after.len() >= before.len());
        prop_assert_eq!(&after[..before.len()], &before[..]);
    }

    #[test]
    fn counts_add_up(
        existing in arb_plugins(6),
        catalog in arb_plugins(6),
    ) {
        let mut destination = pom(true, &existing);
        let before = destination.plugin_elements().len();
        let report = merge_plugins(&mut destination, pom(true, &catalog).into_plugins());

        prop_assert_eq!(
            report.inserted.len() + report.already_present.len() + report.conflicts.len(),
            catalog.len()
        );
        prop_assert_eq!(destination.plugin_elements().len(), before + report.inserted.len());
    }

    #[test]
    fn serialized_result_reloads_identically(
        existing in arb_plugins(6),
        catalog in arb_plugins(6),
    ) {
        let mut destination = pom(true, &existing);
        merge_plugins(&mut destination, pom(false, &catalog).into_plugins());
        let text = destination.to_xml_string().unwrap();
        prop_assert!(!text.contains("ns0:"));

        let reloaded = BuildDescriptor::parse_str(&text, Utf8Path::new("pom.xml")).unwrap();
        prop_assert_eq!(reloaded.plugin_coordinates(), destination.plugin_coordinates());
    }
}
