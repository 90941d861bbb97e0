//! # Bundle Compiler
//!
//! Ties the engine together. For one bundle (with its dependency bundles already
//! attached) a compile run:
//! 1. assigns identifiers to anything that still lacks one (a no-op for loaded bundles)
//! 2. freezes the folder tree
//! 3. prepares the policy graph (reference rewriting, dependency tracking)
//! 4. runs the builder pipeline and assembles the bundle document
//!
//! [`compile_sources`] wraps the whole thing for a [`CompilerConfig`]: it loads the
//! dependency bundles and the main bundle from disk, compiles, and hands back the
//! result for writing.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, instrument};

use crate::builders::{BuildContext, BuilderPipeline};
use crate::bundle::{Bundle, Dependency};
use crate::certs::{CachingCertificateResolver, CertificateResolver, StandardCertificateResolver};
use crate::core::config::CompilerConfig;
use crate::core::error::{BundleError, BundleResult};
use crate::core::ids::IdGenerator;
use crate::document::{assemble, BundleDocument};
use crate::loader::{load_bundle, EntityTypeRegistry};
use crate::policy::prepare_policies;

/// Output of one compile run
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledBundle {
    pub document: BundleDocument,
    /// Policies referenced from this bundle that live in dependency bundles
    pub external_dependencies: BTreeSet<Dependency>,
}

impl CompiledBundle {
    pub fn to_xml(&self) -> String {
        self.document.to_xml()
    }

    /// Write the bundle document, creating missing parent directories
    pub async fn write_to(&self, path: &Path) -> BundleResult<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, self.to_xml()).await?;
        info!(file = %path.display(), "Wrote bundle document");
        Ok(())
    }
}

pub struct BundleCompiler {
    pipeline: BuilderPipeline,
    certificates: Box<dyn CertificateResolver>,
    ids: Arc<dyn IdGenerator>,
}

impl BundleCompiler {
    /// Compiler with every built-in builder and network-capable certificate resolution
    pub fn new(ids: Arc<dyn IdGenerator>) -> Self {
        Self {
            pipeline: BuilderPipeline::standard(),
            certificates: Box::new(CachingCertificateResolver::new(StandardCertificateResolver)),
            ids,
        }
    }

    pub fn with_pipeline(mut self, pipeline: BuilderPipeline) -> Self {
        self.pipeline = pipeline;
        self
    }

    pub fn with_certificates(mut self, certificates: Box<dyn CertificateResolver>) -> Self {
        self.certificates = certificates;
        self
    }

    pub fn pipeline(&self) -> &BuilderPipeline {
        &self.pipeline
    }

    /// Compile `bundle` into a bundle document
    ///
    /// The bundle's folder tree is (re)built here; entity maps are not modified apart
    /// from filling in missing identifiers.
    #[instrument(skip_all)]
    pub fn compile(&self, bundle: &mut Bundle) -> BundleResult<CompiledBundle> {
        bundle.assign_identities(self.ids.as_ref());
        bundle.build_folder_tree()?;

        let bundle: &Bundle = bundle;
        let folder_tree = bundle
            .folder_tree()
            .ok_or_else(|| BundleError::structure("folder tree was not built"))?;

        let policies = prepare_policies(bundle)?;
        info!(
            policies = policies.len(),
            dependency_bundles = bundle.dependencies().len(),
            "Prepared policy graph"
        );

        let context = BuildContext {
            bundle,
            folder_tree,
            policies: &policies,
            certificates: self.certificates.as_ref(),
            ids: self.ids.as_ref(),
        };
        let document = assemble(&self.pipeline, &context)?;

        Ok(CompiledBundle {
            document,
            external_dependencies: policies.external_dependencies(),
        })
    }
}

/// Load the sources named by `config` and compile them
#[instrument(skip_all, fields(source_dir = %config.source_dir.display()))]
pub async fn compile_sources(config: &CompilerConfig) -> BundleResult<CompiledBundle> {
    let registry = EntityTypeRegistry::default();
    let ids: Arc<dyn IdGenerator> = Arc::new(config.id_generation.generator());

    let mut dependencies = Vec::with_capacity(config.dependency_dirs.len());
    for dir in &config.dependency_dirs {
        let dependency = load_bundle(dir, &registry, ids.as_ref(), config.mode).await?;
        dependencies.push(Arc::new(dependency));
    }

    let mut bundle = load_bundle(&config.source_dir, &registry, ids.as_ref(), config.mode).await?;
    for dependency in dependencies {
        bundle.add_dependency(dependency);
    }

    // Certificate retrieval blocks on network I/O
    let compiler = BundleCompiler::new(ids);
    tokio::task::spawn_blocking(move || compiler.compile(&mut bundle))
        .await
        .map_err(|e| BundleError::Io {
            message: format!("compile task failed: {}", e),
        })?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundle::{BundleMode, EntityKind, Folder, Policy, Service};
    use crate::core::ids::NameBasedIdGenerator;

    fn compiler() -> BundleCompiler {
        BundleCompiler::new(Arc::new(NameBasedIdGenerator::new("compiler")))
    }

    fn service_bundle() -> Bundle {
        let ids = NameBasedIdGenerator::new("fixture");
        let mut bundle = Bundle::new();
        let folder_id = bundle.ensure_folder("shop", &ids);

        let mut policy = Policy::new("shop/cart");
        policy.parent_folder = Some(folder_id.clone());
        policy.policy_xml = Some(
            r#"<wsp:Policy xmlns:wsp="http://schemas.xmlsoap.org/ws/2002/12/policy" xmlns:L7p="http://www.layer7tech.com/ws/policy"><wsp:All/></wsp:Policy>"#
                .to_string(),
        );
        bundle.add_policy(policy);
        bundle.services.insert(
            "shop/cart".to_string(),
            Service {
                path: "shop/cart".to_string(),
                parent_folder: Some(folder_id),
                url: "/cart".to_string(),
                http_methods: ["GET".to_string()].into_iter().collect(),
                enabled: true,
                ..Default::default()
            },
        );
        bundle
    }

    #[test]
    fn test_compile_orders_folders_before_services() {
        let mut bundle = service_bundle();
        let compiled = compiler().compile(&mut bundle).unwrap();

        let kinds: Vec<_> = compiled
            .document
            .entities()
            .iter()
            .map(|entity| entity.kind)
            .collect();
        assert_eq!(kinds, vec![EntityKind::Folder, EntityKind::Folder, EntityKind::Service]);
        assert!(compiled.external_dependencies.is_empty());
        assert!(compiled.to_xml().contains("<l7:UrlPattern>/cart</l7:UrlPattern>"));
    }

    #[test]
    fn test_compile_is_repeatable() {
        let mut bundle = service_bundle();
        let compiler = compiler();
        let first = compiler.compile(&mut bundle).unwrap();
        let second = compiler.compile(&mut bundle).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_environment_compile_is_repeatable() {
        let mut bundle = service_bundle().with_mode(BundleMode::Environment);
        let first = compiler().compile(&mut bundle).unwrap();
        let second = compiler().compile(&mut bundle).unwrap();
        assert_eq!(first, second);

        let ports: Vec<_> = first
            .document
            .entities()
            .iter()
            .filter(|entity| entity.kind == EntityKind::ListenPort)
            .collect();
        assert_eq!(ports.len(), 2);
    }

    #[test]
    fn test_compile_rejects_orphan_folder() {
        let mut bundle = Bundle::new();
        bundle.folders.insert(
            "lost".to_string(),
            Folder::new("f1", "lost", Some("does-not-exist".to_string())),
        );
        assert!(matches!(
            compiler().compile(&mut bundle),
            Err(BundleError::Structure { .. })
        ));
    }
}
