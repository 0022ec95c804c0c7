//! Descriptor discovery and merge behavior across layered search roots.

use extpoint_core::{
    ExtensionError, ExtensionRegistry, Implementation, PointDescriptor, EXTENSIONS_DIRECTORY,
    SERVICES_DIRECTORY,
};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

trait Robot: Send + Sync {
    fn id(&self) -> &'static str;
}

#[derive(Default)]
struct OptimusPrime;
impl Robot for OptimusPrime {
    fn id(&self) -> &'static str {
        "optimus"
    }
}

#[derive(Default)]
struct Bumblebee;
impl Robot for Bumblebee {
    fn id(&self) -> &'static str {
        "bumblebee"
    }
}

const POINT_NAME: &str = "demo.Robot";

fn write_descriptor(root: &Path, directory: &str, content: &str) {
    let dir = root.join(directory);
    std::fs::create_dir_all(&dir).expect("descriptor directory should be creatable");
    std::fs::write(dir.join(POINT_NAME), content).expect("descriptor file should be writable");
}

fn registry_with_roots(roots: &[&TempDir]) -> ExtensionRegistry {
    let registry = ExtensionRegistry::new(
        roots
            .iter()
            .map(|root| root.path().to_path_buf())
            .collect(),
    );
    registry
        .register_point::<dyn Robot>(PointDescriptor::new(POINT_NAME))
        .expect("point registration");
    registry
        .bind_implementation(Implementation::<dyn Robot>::new::<OptimusPrime, _>(
            "demo::OptimusPrime",
            || Ok(Arc::new(OptimusPrime)),
        ))
        .expect("optimus binding");
    registry
        .bind_implementation(
            Implementation::<dyn Robot>::new::<Bumblebee, _>("demo::Bumblebee", || {
                Ok(Arc::new(Bumblebee))
            })
            .named("bumblebee"),
        )
        .expect("bumblebee binding");
    registry
}

#[test]
fn resolves_named_entries_from_one_root() {
    let root = tempfile::tempdir().expect("tempdir");
    write_descriptor(
        root.path(),
        EXTENSIONS_DIRECTORY,
        "optimus=demo::OptimusPrime # the leader\nbee=demo::Bumblebee\n",
    );

    let registry = registry_with_roots(&[&root]);
    let loader = registry.get_loader::<dyn Robot>().expect("loader");
    assert_eq!(
        loader.supported_extensions().expect("scan"),
        vec!["bee".to_string(), "optimus".to_string()]
    );
    assert_eq!(loader.get_extension("optimus").expect("optimus").id(), "optimus");
}

#[test]
fn merges_both_directory_conventions_and_multiple_roots() {
    let layered_a = tempfile::tempdir().expect("tempdir a");
    let layered_b = tempfile::tempdir().expect("tempdir b");
    write_descriptor(
        layered_a.path(),
        EXTENSIONS_DIRECTORY,
        "optimus=demo::OptimusPrime\n",
    );
    write_descriptor(
        layered_b.path(),
        SERVICES_DIRECTORY,
        "bee=demo::Bumblebee\n",
    );

    let registry = registry_with_roots(&[&layered_a, &layered_b]);
    let loader = registry.get_loader::<dyn Robot>().expect("loader");
    assert_eq!(
        loader.supported_extensions().expect("scan"),
        vec!["bee".to_string(), "optimus".to_string()]
    );
}

#[test]
fn same_mapping_in_two_files_is_tolerated() {
    let layered_a = tempfile::tempdir().expect("tempdir a");
    let layered_b = tempfile::tempdir().expect("tempdir b");
    write_descriptor(
        layered_a.path(),
        EXTENSIONS_DIRECTORY,
        "optimus=demo::OptimusPrime\n",
    );
    write_descriptor(
        layered_b.path(),
        SERVICES_DIRECTORY,
        "optimus=demo::OptimusPrime\n",
    );

    let registry = registry_with_roots(&[&layered_a, &layered_b]);
    let loader = registry.get_loader::<dyn Robot>().expect("loader");
    assert_eq!(
        loader.supported_extensions().expect("scan"),
        vec!["optimus".to_string()]
    );
}

#[test]
fn same_name_for_two_types_is_a_fatal_duplicate() {
    let root = tempfile::tempdir().expect("tempdir");
    write_descriptor(
        root.path(),
        EXTENSIONS_DIRECTORY,
        "optimus=demo::OptimusPrime\noptimus=demo::Bumblebee\n",
    );

    let registry = registry_with_roots(&[&root]);
    let loader = registry.get_loader::<dyn Robot>().expect("loader");
    let err = loader
        .supported_extensions()
        .expect_err("duplicate mapping must fail the load");
    match err {
        ExtensionError::DuplicateExtension { name, .. } => assert_eq!(name, "optimus"),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn unresolved_reference_skips_rest_of_file_but_not_siblings() {
    let layered_a = tempfile::tempdir().expect("tempdir a");
    let layered_b = tempfile::tempdir().expect("tempdir b");
    // `optimus` follows the broken line and must NOT be registered.
    write_descriptor(
        layered_a.path(),
        EXTENSIONS_DIRECTORY,
        "bad=demo::Nonexistent\noptimus=demo::OptimusPrime\n",
    );
    write_descriptor(
        layered_b.path(),
        EXTENSIONS_DIRECTORY,
        "bee=demo::Bumblebee\n",
    );

    let registry = registry_with_roots(&[&layered_a, &layered_b]);
    let loader = registry.get_loader::<dyn Robot>().expect("loader");
    assert_eq!(
        loader.supported_extensions().expect("scan survives bad file"),
        vec!["bee".to_string()]
    );
}

#[test]
fn bare_reference_uses_declared_name_or_reference_fallback() {
    let root = tempfile::tempdir().expect("tempdir");
    // Bumblebee declares "bumblebee"; OptimusPrime declares nothing and
    // falls back to the reference itself as the name.
    write_descriptor(
        root.path(),
        EXTENSIONS_DIRECTORY,
        "demo::Bumblebee\ndemo::OptimusPrime\n",
    );

    let registry = registry_with_roots(&[&root]);
    let loader = registry.get_loader::<dyn Robot>().expect("loader");
    assert_eq!(
        loader.supported_extensions().expect("scan"),
        vec!["bumblebee".to_string(), "demo::OptimusPrime".to_string()]
    );
    assert_eq!(
        loader
            .get_extension("demo::OptimusPrime")
            .expect("fallback name resolves")
            .id(),
        "optimus"
    );
}

#[test]
fn adaptive_and_wrapper_bindings_are_recognized_but_skipped() {
    let root = tempfile::tempdir().expect("tempdir");
    write_descriptor(
        root.path(),
        EXTENSIONS_DIRECTORY,
        "dispatch=demo::AdaptiveRobot\nshell=demo::WrapperRobot\noptimus=demo::OptimusPrime\n",
    );

    let registry = registry_with_roots(&[&root]);
    registry
        .bind_implementation(
            Implementation::<dyn Robot>::new::<OptimusPrime, _>("demo::AdaptiveRobot", || {
                Ok(Arc::new(OptimusPrime))
            })
            .adaptive(),
        )
        .expect("adaptive binding");
    registry
        .bind_implementation(
            Implementation::<dyn Robot>::new::<Bumblebee, _>("demo::WrapperRobot", || {
                Ok(Arc::new(Bumblebee))
            })
            .wrapper(),
        )
        .expect("wrapper binding");

    let loader = registry.get_loader::<dyn Robot>().expect("loader");
    assert_eq!(
        loader.supported_extensions().expect("scan"),
        vec!["optimus".to_string()]
    );
}

#[test]
fn multiple_default_names_fail_the_load() {
    let root = tempfile::tempdir().expect("tempdir");
    write_descriptor(
        root.path(),
        EXTENSIONS_DIRECTORY,
        "optimus=demo::OptimusPrime\n",
    );

    let registry = ExtensionRegistry::new(vec![root.path().to_path_buf()]);
    registry
        .register_point::<dyn Robot>(
            PointDescriptor::new(POINT_NAME).with_default("optimus,bee"),
        )
        .expect("point registration");
    registry
        .bind_implementation(Implementation::<dyn Robot>::new::<OptimusPrime, _>(
            "demo::OptimusPrime",
            || Ok(Arc::new(OptimusPrime)),
        ))
        .expect("binding");

    let loader = registry.get_loader::<dyn Robot>().expect("loader");
    let err = loader
        .supported_extensions()
        .expect_err("comma-list default must fail");
    assert!(matches!(err, ExtensionError::MultipleDefaultNames { .. }));
}

#[test]
fn single_default_name_is_cached_on_the_table() {
    let root = tempfile::tempdir().expect("tempdir");
    write_descriptor(
        root.path(),
        EXTENSIONS_DIRECTORY,
        "optimus=demo::OptimusPrime\n",
    );

    let registry = ExtensionRegistry::new(vec![root.path().to_path_buf()]);
    registry
        .register_point::<dyn Robot>(PointDescriptor::new(POINT_NAME).with_default(" optimus "))
        .expect("point registration");
    registry
        .bind_implementation(Implementation::<dyn Robot>::new::<OptimusPrime, _>(
            "demo::OptimusPrime",
            || Ok(Arc::new(OptimusPrime)),
        ))
        .expect("binding");

    let loader = registry.get_loader::<dyn Robot>().expect("loader");
    assert_eq!(
        loader.default_extension_name().expect("scan"),
        Some("optimus".to_string())
    );
}

#[test]
fn reference_bound_to_another_point_is_incompatible() {
    trait Vehicle: Send + Sync {}
    #[derive(Default)]
    struct Car;
    impl Vehicle for Car {}

    let root = tempfile::tempdir().expect("tempdir");
    write_descriptor(root.path(), EXTENSIONS_DIRECTORY, "car=demo::Car\n");

    let registry = registry_with_roots(&[&root]);
    registry
        .register_point::<dyn Vehicle>(PointDescriptor::new("demo.Vehicle"))
        .expect("vehicle point");
    registry
        .bind_implementation(Implementation::<dyn Vehicle>::new::<Car, _>("demo::Car", || {
            Ok(Arc::new(Car))
        }))
        .expect("car binding");

    let loader = registry.get_loader::<dyn Robot>().expect("robot loader");
    let err = loader
        .supported_extensions()
        .expect_err("cross-point reference must fail the load");
    match err {
        ExtensionError::IncompatibleExtension { reference, .. } => {
            assert_eq!(reference, "demo::Car");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn missing_descriptor_files_yield_an_empty_table() {
    let root = tempfile::tempdir().expect("tempdir");
    let registry = registry_with_roots(&[&root]);
    let loader = registry.get_loader::<dyn Robot>().expect("loader");
    assert!(loader.supported_extensions().expect("scan").is_empty());

    let err = loader
        .get_extension("optimus")
        .map(|_| ())
        .expect_err("nothing discovered, lookup must fail");
    assert!(matches!(err, ExtensionError::UnknownExtension { .. }));
}
