//! # Compile Integration Tests
//!
//! Drive the whole pipeline from source directories on disk: loading, folder tree,
//! policy preparation and ordering, entity builders and document assembly.

use gateway_bundler::bundle::{BundleMode, EntityKind, ROOT_FOLDER_ID, ROOT_FOLDER_NAME};
use gateway_bundler::core::ids::IdGeneration;
use gateway_bundler::document::MappingAction;
use gateway_bundler::{compile_sources, BundleError, CompiledBundle, CompilerConfig};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const POLICY_NS: &str = r#"xmlns:wsp="http://schemas.xmlsoap.org/ws/2002/12/policy" xmlns:L7p="http://www.layer7tech.com/ws/policy""#;

fn write(root: &Path, relative: &str, content: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn policy(body: &str) -> String {
    format!("<wsp:Policy {}><wsp:All>{}</wsp:All></wsp:Policy>", POLICY_NS, body)
}

fn include(path: &str) -> String {
    format!(
        r#"<L7p:Include><L7p:PolicyGuid stringValue="{}"/></L7p:Include>"#,
        path
    )
}

fn config(source: &Path, dependencies: Vec<PathBuf>, mode: BundleMode) -> CompilerConfig {
    CompilerConfig {
        source_dir: source.to_path_buf(),
        output_file: source.join("build/bundle.xml"),
        dependency_dirs: dependencies,
        mode,
        id_generation: IdGeneration {
            seed: "integration".to_string(),
        },
        ..CompilerConfig::default()
    }
}

async fn compile(source: &Path) -> Result<CompiledBundle, BundleError> {
    compile_sources(&config(source, Vec::new(), BundleMode::Deployment)).await
}

fn names_of(compiled: &CompiledBundle, kind: EntityKind) -> Vec<String> {
    compiled
        .document
        .entities()
        .iter()
        .filter(|entity| entity.kind == kind)
        .map(|entity| entity.name.clone())
        .collect()
}

#[tokio::test]
async fn test_service_in_folder() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "policy/a/svc.xml", &policy(""));
    write(
        dir.path(),
        "config/services.yml",
        "a/svc:\n  url: /svc\n  httpMethods: [GET, POST]\n",
    );

    let compiled = compile(dir.path()).await.unwrap();
    let entities = compiled.document.entities();
    assert_eq!(entities.len(), 3);

    let root = &entities[0];
    assert_eq!(root.kind, EntityKind::Folder);
    assert_eq!(root.id, ROOT_FOLDER_ID);
    assert_eq!(root.name, ROOT_FOLDER_NAME);
    assert_eq!(root.mapping_action, MappingAction::NewOrExisting);

    let folder = &entities[1];
    assert_eq!(folder.kind, EntityKind::Folder);
    assert_eq!(folder.name, "a");
    let folder_payload = folder.payload.as_ref().unwrap();
    assert_eq!(folder_payload.attr("folderId"), Some(ROOT_FOLDER_ID));

    let service = &entities[2];
    assert_eq!(service.kind, EntityKind::Service);
    assert_eq!(service.mapping_action, MappingAction::NewOrUpdate);
    assert!(service.mapping_properties.is_empty());
    let detail = service.payload.as_ref().unwrap().child("l7:ServiceDetail").unwrap();
    assert_eq!(detail.attr("folderId"), Some(folder.id.as_str()));
    let verbs: Vec<String> = detail
        .find("l7:Verbs")
        .unwrap()
        .elements()
        .map(|verb| verb.text())
        .collect();
    assert_eq!(verbs, vec!["GET", "POST"]);

    assert!(names_of(&compiled, EntityKind::Policy).is_empty());
    assert!(compiled.external_dependencies.is_empty());
}

#[tokio::test]
async fn test_policies_follow_their_dependencies() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "policy/api/main.xml", &policy(&include("lib/helper")));
    write(
        dir.path(),
        "policy/lib/helper.xml",
        &policy(r#"<L7p:Encapsulated encassPath="auth"/>"#),
    );
    write(dir.path(), "policy/lib/auth.xml", &policy(""));
    write(
        dir.path(),
        "config/encass.yml",
        "auth:\n  policy: lib/auth\n  arguments:\n    - name: user\n      type: string\n",
    );

    let compiled = compile(dir.path()).await.unwrap();
    assert_eq!(
        names_of(&compiled, EntityKind::Policy),
        vec!["lib/auth", "lib/helper", "api/main"]
    );
    assert_eq!(names_of(&compiled, EntityKind::Encass), vec!["auth"]);

    // Folders come first, encasses after every policy
    let kinds: Vec<EntityKind> = compiled.document.entities().iter().map(|e| e.kind).collect();
    let first_policy = kinds.iter().position(|k| *k == EntityKind::Policy).unwrap();
    let encass = kinds.iter().position(|k| *k == EntityKind::Encass).unwrap();
    assert!(kinds[..first_policy].iter().all(|k| *k == EntityKind::Folder));
    assert_eq!(encass, kinds.len() - 1);

    let xml = compiled.to_xml();
    assert!(!xml.contains("encassPath"));
    assert!(xml.contains("EncapsulatedAssertionConfigName"));
}

#[tokio::test]
async fn test_include_cycle_is_reported() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "policy/a.xml", &policy(&include("b")));
    write(dir.path(), "policy/b.xml", &policy(&include("a")));

    match compile(dir.path()).await {
        Err(BundleError::PolicyCycle { cycle }) => {
            assert_eq!(cycle.first(), cycle.last());
            assert_eq!(cycle.len(), 3);
        }
        other => panic!("expected a policy cycle, got {:?}", other),
    }
}

#[tokio::test]
async fn test_dependency_bundle_policies_are_not_emitted() {
    let shared = TempDir::new().unwrap();
    write(shared.path(), "policy/common/log.xml", &policy(""));

    let dir = TempDir::new().unwrap();
    write(dir.path(), "policy/api/main.xml", &policy(&include("common/log")));

    let compiled = compile_sources(&config(
        dir.path(),
        vec![shared.path().to_path_buf()],
        BundleMode::Deployment,
    ))
    .await
    .unwrap();

    assert_eq!(names_of(&compiled, EntityKind::Policy), vec!["api/main"]);
    assert_eq!(compiled.external_dependencies.len(), 1);
    let dependency = compiled.external_dependencies.iter().next().unwrap();
    assert_eq!(dependency.entity_type, EntityKind::Policy);
}

#[tokio::test]
async fn test_references_match_ids_deployed_by_dependency_bundle() {
    let shared = TempDir::new().unwrap();
    write(shared.path(), "policy/common/log.xml", &policy(""));
    write(shared.path(), "policy/common/audit.xml", &policy(""));
    write(shared.path(), "config/encass.yml", "audit:\n  policy: common/audit\n");

    let dir = TempDir::new().unwrap();
    write(
        dir.path(),
        "policy/api/main.xml",
        &policy(&format!(
            r#"{}<L7p:Encapsulated encassPath="audit"/>"#,
            include("common/log")
        )),
    );

    let defaults = |source: &Path, dependency_dirs: Vec<PathBuf>| CompilerConfig {
        source_dir: source.to_path_buf(),
        dependency_dirs,
        ..CompilerConfig::default()
    };
    let deployed = compile_sources(&defaults(shared.path(), Vec::new())).await.unwrap();
    let consumer = compile_sources(&defaults(dir.path(), vec![shared.path().to_path_buf()]))
        .await
        .unwrap();

    let deployed_entity = |kind: EntityKind, name: &str| {
        deployed
            .document
            .entities()
            .iter()
            .find(|entity| entity.kind == kind && entity.name == name)
            .cloned()
            .unwrap()
    };
    let log = deployed_entity(EntityKind::Policy, "common/log");
    let log_guid = log.payload.as_ref().unwrap().attr("guid").unwrap().to_string();
    let audit = deployed_entity(EntityKind::Encass, "audit");

    let xml = consumer.to_xml();
    assert!(xml.contains(&log_guid), "include does not carry guid {}", log_guid);
    let external: Vec<_> = consumer
        .external_dependencies
        .iter()
        .map(|dependency| (dependency.entity_type, dependency.id.clone()))
        .collect();
    assert!(external.contains(&(EntityKind::Policy, log.id.clone())));
    assert!(external.contains(&(EntityKind::Encass, audit.id.clone())));
}

#[tokio::test]
async fn test_encass_in_two_dependency_bundles_is_ambiguous() {
    let mut dependency_dirs = Vec::new();
    let mut keep = Vec::new();
    for _ in 0..2 {
        let shared = TempDir::new().unwrap();
        write(shared.path(), "policy/shared/impl.xml", &policy(""));
        write(shared.path(), "config/encass.yml", "shared:\n  policy: shared/impl\n");
        dependency_dirs.push(shared.path().to_path_buf());
        keep.push(shared);
    }

    let dir = TempDir::new().unwrap();
    write(
        dir.path(),
        "policy/api/main.xml",
        &policy(r#"<L7p:Encapsulated encassPath="shared"/>"#),
    );

    let result = compile_sources(&config(dir.path(), dependency_dirs, BundleMode::Deployment)).await;
    match result {
        Err(BundleError::AmbiguousReference { kind, key, count }) => {
            assert_eq!(kind, "encass");
            assert_eq!(key, "shared");
            assert_eq!(count, 2);
        }
        other => panic!("expected an ambiguous reference, got {:?}", other),
    }
}

#[tokio::test]
async fn test_local_encass_shadows_dependency_bundles() {
    let shared = TempDir::new().unwrap();
    write(shared.path(), "policy/shared/impl.xml", &policy(""));
    write(shared.path(), "config/encass.yml", "shared:\n  policy: shared/impl\n");

    let dir = TempDir::new().unwrap();
    write(dir.path(), "policy/local/impl.xml", &policy(""));
    write(dir.path(), "config/encass.yml", "shared:\n  policy: local/impl\n");
    write(
        dir.path(),
        "policy/api/main.xml",
        &policy(r#"<L7p:Encapsulated encassPath="shared"/>"#),
    );

    let compiled = compile_sources(&config(
        dir.path(),
        vec![shared.path().to_path_buf()],
        BundleMode::Deployment,
    ))
    .await
    .unwrap();
    assert!(compiled.external_dependencies.is_empty());
    assert_eq!(names_of(&compiled, EntityKind::Encass), vec!["shared"]);
}

#[tokio::test]
async fn test_environment_mode_entities() {
    let dir = TempDir::new().unwrap();
    write(
        dir.path(),
        "config/stored-passwords.yml",
        "db-password:\n  password: s3cret\n",
    );
    write(dir.path(), "config/cluster-properties.properties", "io.timeout=30\n");
    write(
        dir.path(),
        "config/listen-ports.yml",
        "custom-http:\n  protocol: http\n  port: 8080\n",
    );

    let environment = compile_sources(&config(dir.path(), Vec::new(), BundleMode::Environment))
        .await
        .unwrap();
    let ports = names_of(&environment, EntityKind::ListenPort);
    assert_eq!(ports.len(), 2);
    assert!(ports.contains(&"custom-http".to_string()));
    assert!(ports.contains(&"Default HTTPS (8443)".to_string()));
    let password = environment
        .document
        .entities()
        .iter()
        .find(|entity| entity.kind == EntityKind::StoredPassword)
        .unwrap();
    assert!(password.payload.is_some());

    let deployment = compile(dir.path()).await.unwrap();
    assert_eq!(names_of(&deployment, EntityKind::ListenPort), vec!["custom-http"]);
    let password = deployment
        .document
        .entities()
        .iter()
        .find(|entity| entity.kind == EntityKind::StoredPassword)
        .unwrap();
    assert!(password.payload.is_none());
    assert_eq!(password.mapping_action, MappingAction::NewOrExisting);
    assert_eq!(names_of(&deployment, EntityKind::ClusterProperty), vec!["io.timeout"]);
}

#[tokio::test]
async fn test_repeated_compiles_give_identical_output() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "policy/a/one.xml", &policy(""));
    write(dir.path(), "policy/a/two.xml", &policy(&include("a/one")));

    let first = compile(dir.path()).await.unwrap();
    let second = compile(dir.path()).await.unwrap();
    assert_eq!(first.to_xml(), second.to_xml());
}

#[tokio::test]
async fn test_bundle_is_written_to_output_file() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "policy/a/one.xml", &policy(""));
    let config = config(dir.path(), Vec::new(), BundleMode::Deployment);

    let compiled = compile_sources(&config).await.unwrap();
    compiled.write_to(&config.output_file).await.unwrap();

    let written = fs::read_to_string(&config.output_file).unwrap();
    assert_eq!(written, compiled.to_xml());
    assert!(written.starts_with("<?xml"));
}
