//! Property tests for layout path mapping.
//!
//! For every layout, rendering valid coordinates to a path and parsing that
//! path yields the same coordinates and the same path.

use artifact_depot_backend::formats::maven::MavenCoordinates;
use artifact_depot_backend::formats::npm::NpmCoordinates;
use artifact_depot_backend::formats::nuget::NugetCoordinates;
use artifact_depot_backend::formats::p2::{P2Coordinates, P2Kind};
use artifact_depot_backend::formats::pypi::PypiCoordinates;
use artifact_depot_backend::formats::raw::RawCoordinates;
use artifact_depot_backend::formats::rpm::RpmCoordinates;
use artifact_depot_backend::formats::{ArtifactCoordinates, LayoutRegistry};
use proptest::prelude::*;

fn arb_word() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9]{0,7}"
}

/// Release and snapshot GAVs, optionally timestamped, with or without a
/// classifier, including multi-dot extensions such as `tar.gz`.
fn arb_maven() -> impl Strategy<Value = ArtifactCoordinates> {
    let stamp = prop_oneof![
        Just(None),
        "20[0-9]{6}\\.[0-9]{6}-[1-9][0-9]{0,2}".prop_map(Some),
    ];
    (
        prop::collection::vec(arb_word(), 1..4),
        "[a-z][a-z0-9]{0,7}(-[a-z][a-z0-9]{0,4})?",
        "[1-9][0-9]?\\.[0-9]{1,2}(\\.[0-9]{1,2})?",
        any::<bool>(),
        stamp,
        prop::option::of(arb_word()),
        prop::sample::select(vec!["jar", "pom", "war", "zip", "tar.gz", "tar.bz2"]),
    )
        .prop_map(
            |(group, artifact_id, base, snapshot, stamp, classifier, extension)| {
                let (version, snapshot_version) = if snapshot {
                    (format!("{}-SNAPSHOT", base), stamp)
                } else {
                    (base, None)
                };
                ArtifactCoordinates::Maven(MavenCoordinates {
                    group_id: group.join("."),
                    artifact_id,
                    version,
                    snapshot_version,
                    classifier,
                    extension: extension.to_string(),
                })
            },
        )
}

/// Plain and scoped packages, with prerelease versions.
fn arb_npm() -> impl Strategy<Value = ArtifactCoordinates> {
    (
        prop::option::of("[a-z][a-z0-9-]{0,7}"),
        "[a-z][a-z0-9._-]{0,9}",
        "[0-9]{1,2}\\.[0-9]{1,2}\\.[0-9]{1,2}(-(alpha|beta|rc)\\.[0-9])?",
    )
        .prop_map(|(scope, name, version)| {
            ArtifactCoordinates::Npm(NpmCoordinates {
                scope,
                name,
                version,
            })
        })
}

/// Wheels and sdists, with the distribution name spelled the ways uploads
/// spell it.
fn arb_pypi() -> impl Strategy<Value = ArtifactCoordinates> {
    let wheel_tags = prop::sample::select(vec![
        "py3-none-any",
        "py2.py3-none-any",
        "cp311-cp311-manylinux_2_17_x86_64",
    ]);
    let filename = prop_oneof![
        (
            prop::option::of("[1-9]"),
            wheel_tags,
            any::<bool>()
        )
            .prop_map(|(build, tags, capitalized)| PypiFile::Wheel {
                build,
                tags,
                capitalized
            }),
        (
            prop::sample::select(vec!["-", "_", "."]),
            prop::sample::select(vec!["tar.gz", "zip"]),
            any::<bool>()
        )
            .prop_map(|(separator, extension, capitalized)| PypiFile::Sdist {
                separator,
                extension,
                capitalized
            }),
    ];
    (
        prop::collection::vec("[a-z][a-z0-9]{0,5}", 1..3),
        "[0-9]{1,2}\\.[0-9]{1,2}(\\.[0-9]{1,2})?(rc[0-9])?",
        filename,
    )
        .prop_map(|(words, version, file)| {
            let filename = file.render(&words, &version);
            ArtifactCoordinates::Pypi(PypiCoordinates {
                name: words.join("-"),
                version,
                filename,
            })
        })
}

#[derive(Debug, Clone)]
enum PypiFile {
    Wheel {
        build: Option<String>,
        tags: &'static str,
        capitalized: bool,
    },
    Sdist {
        separator: &'static str,
        extension: &'static str,
        capitalized: bool,
    },
}

impl PypiFile {
    fn render(&self, words: &[String], version: &str) -> String {
        let spell = |separator: &str, capitalized: bool| {
            let name = words.join(separator);
            if capitalized {
                let mut chars = name.chars();
                chars
                    .next()
                    .map(|first| first.to_ascii_uppercase().to_string() + chars.as_str())
                    .unwrap_or_default()
            } else {
                name
            }
        };
        match self {
            Self::Wheel {
                build,
                tags,
                capitalized,
            } => match build {
                Some(build) => format!(
                    "{}-{}-{}-{}.whl",
                    spell("_", *capitalized),
                    version,
                    build,
                    tags
                ),
                None => format!("{}-{}-{}.whl", spell("_", *capitalized), version, tags),
            },
            Self::Sdist {
                separator,
                extension,
                capitalized,
            } => format!(
                "{}-{}.{}",
                spell(separator, *capitalized),
                version,
                extension
            ),
        }
    }
}

fn arb_nuget() -> impl Strategy<Value = ArtifactCoordinates> {
    (
        "[a-z][a-z0-9]{0,7}(\\.[a-z][a-z0-9]{0,7}){0,2}",
        "[0-9]{1,2}\\.[0-9]{1,2}\\.[0-9]{1,2}(-(beta|rc)[0-9]?)?",
    )
        .prop_map(|(id, version)| ArtifactCoordinates::Nuget(NugetCoordinates { id, version }))
}

fn arb_rpm() -> impl Strategy<Value = ArtifactCoordinates> {
    (
        prop::option::of(prop::collection::vec("[A-Za-z][a-z0-9]{0,5}", 1..3)),
        "[a-z][a-z0-9]{0,6}(-[a-z][a-z0-9]{0,5})?",
        "[0-9]{1,2}(\\.[0-9]{1,2}){0,2}",
        "[0-9]{1,2}(\\.[a-z]{2}[0-9]{2})?",
        prop::sample::select(vec!["x86_64", "aarch64", "i686", "noarch"]),
    )
        .prop_map(|(directory, name, version, release, arch)| {
            ArtifactCoordinates::Rpm(RpmCoordinates {
                directory: directory.map(|segments| segments.join("/")),
                name,
                version,
                release,
                arch: arch.to_string(),
            })
        })
}

fn arb_p2() -> impl Strategy<Value = ArtifactCoordinates> {
    (
        prop::sample::select(vec![P2Kind::Plugin, P2Kind::Feature]),
        "[a-z][a-z0-9]{0,6}(\\.[a-z][a-z0-9_]{0,6}){0,3}",
        "[0-9]\\.[0-9]{1,2}\\.[0-9]{1,3}(\\.v[0-9]{8})?",
    )
        .prop_map(|(kind, id, version)| ArtifactCoordinates::P2(P2Coordinates { kind, id, version }))
}

fn arb_raw() -> impl Strategy<Value = ArtifactCoordinates> {
    prop::collection::vec("[A-Za-z0-9_-][A-Za-z0-9._-]{0,11}", 1..5).prop_map(|segments| {
        ArtifactCoordinates::Raw(RawCoordinates {
            path: segments.join("/"),
        })
    })
}

fn arb_coordinates() -> impl Strategy<Value = ArtifactCoordinates> {
    prop_oneof![
        arb_maven(),
        arb_npm(),
        arb_pypi(),
        arb_nuget(),
        arb_rpm(),
        arb_p2(),
        arb_raw(),
    ]
}

proptest! {
    /// Property: parsing the rendered path gives back the coordinates
    #[test]
    fn prop_parse_inverts_to_path(coordinates in arb_coordinates()) {
        let registry = LayoutRegistry::with_core_layouts();
        let provider = registry.require(coordinates.layout_key()).unwrap();
        let path = coordinates.to_path();

        let parsed = provider.parse(&path);
        prop_assert!(parsed.is_ok(), "{} rejected: {:?}", path, parsed);
        let parsed = parsed.unwrap();
        prop_assert_eq!(&parsed, &coordinates, "{} parsed differently", path);
        // Identity can ignore placement (rpm directories); the path cannot
        prop_assert_eq!(parsed.to_path(), path);
    }

    /// Property: a rendered path is never mistaken for a metadata document
    #[test]
    fn prop_rendered_path_is_an_artifact(coordinates in arb_coordinates()) {
        let registry = LayoutRegistry::with_core_layouts();
        let provider = registry.require(coordinates.layout_key()).unwrap();
        prop_assert!(!provider.is_metadata_file(&coordinates.to_path()));
    }
}

#[test]
fn test_timestamped_snapshot_keeps_base_version() {
    let coordinates = MavenCoordinates {
        group_id: "com.acme".to_string(),
        artifact_id: "lib".to_string(),
        version: "1.0-SNAPSHOT".to_string(),
        snapshot_version: Some("20260211.124623-7".to_string()),
        classifier: Some("dist".to_string()),
        extension: "tar.gz".to_string(),
    };
    assert_eq!(
        coordinates.to_path(),
        "com/acme/lib/1.0-SNAPSHOT/lib-1.0-20260211.124623-7-dist.tar.gz"
    );
}
