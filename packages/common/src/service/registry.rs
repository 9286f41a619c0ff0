use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context as _, bail};
use tracing::info;

use crate::config::{ServiceConfig, StorageConfig};
use crate::signed::TokenSigner;

use super::BlobService;
use super::disk::DiskService;
use super::mirror::MirrorService;
use super::s3::{S3Options, S3Service};

/// Immutable name -> service map, built once at startup.
///
/// Safe for unsynchronized concurrent reads afterwards; there is no way to
/// mutate it during normal operation.
pub struct ServiceRegistry {
    services: HashMap<String, Arc<dyn BlobService>>,
    mirrors: HashMap<String, Arc<MirrorService>>,
    default_name: String,
}

impl ServiceRegistry {
    /// Instantiate every configured service.
    ///
    /// Plain services are built first so mirror entries can resolve their
    /// members by name. Mirrors of mirrors are rejected.
    pub async fn from_config(
        cfg: &StorageConfig,
        signer: Arc<TokenSigner>,
        public_base: &str,
    ) -> anyhow::Result<Self> {
        let timeout = Duration::from_secs(cfg.request_timeout_secs);

        let mut services: HashMap<String, Arc<dyn BlobService>> = HashMap::new();
        for (name, service_cfg) in &cfg.services {
            let service: Arc<dyn BlobService> = match service_cfg {
                ServiceConfig::Disk { root } => Arc::new(
                    DiskService::new(name, root.clone(), public_base, Arc::clone(&signer))
                        .await
                        .with_context(|| format!("disk service '{name}'"))?,
                ),
                ServiceConfig::S3 {
                    bucket,
                    region,
                    endpoint,
                    access_key,
                    secret_key,
                    path_style,
                } => Arc::new(
                    S3Service::new(
                        name,
                        &S3Options {
                            bucket: bucket.clone(),
                            region: region.clone(),
                            endpoint: endpoint.clone(),
                            access_key: access_key.clone(),
                            secret_key: secret_key.clone(),
                            path_style: *path_style,
                            request_timeout: timeout,
                        },
                    )
                    .with_context(|| format!("s3 service '{name}'"))?,
                ),
                ServiceConfig::Mirror { .. } => continue,
            };
            services.insert(name.clone(), service);
        }

        let mut mirrors = HashMap::new();
        for (name, service_cfg) in &cfg.services {
            let ServiceConfig::Mirror { primary, mirrors: members } = service_cfg else {
                continue;
            };

            let resolve = |member: &String| -> anyhow::Result<Arc<dyn BlobService>> {
                match services.get(member) {
                    Some(s) => Ok(Arc::clone(s)),
                    None if cfg.services.contains_key(member) => {
                        bail!("mirror '{name}' references mirror '{member}'; nesting mirrors is not supported")
                    }
                    None => bail!("mirror '{name}' references unknown service '{member}'"),
                }
            };

            let mirror = Arc::new(MirrorService::new(
                name,
                resolve(primary)?,
                members.iter().map(resolve).collect::<anyhow::Result<_>>()?,
                timeout,
            ));
            mirrors.insert(name.clone(), Arc::clone(&mirror));
            services.insert(name.clone(), mirror);
        }

        if !services.contains_key(&cfg.default_service) {
            bail!("default service '{}' is not configured", cfg.default_service);
        }

        info!(
            default = %cfg.default_service,
            count = services.len(),
            "storage services initialized"
        );

        Ok(Self {
            services,
            mirrors,
            default_name: cfg.default_service.clone(),
        })
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn BlobService>> {
        self.services.get(name).cloned()
    }

    /// The mirror view of a service, when it is one.
    pub fn mirror(&self, name: &str) -> Option<Arc<MirrorService>> {
        self.mirrors.get(name).cloned()
    }

    pub fn default_service(&self) -> Arc<dyn BlobService> {
        // Checked at construction.
        Arc::clone(&self.services[&self.default_name])
    }

    pub fn default_name(&self) -> &str {
        &self.default_name
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.services.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checksum::Checksum;

    fn signer() -> Arc<TokenSigner> {
        Arc::new(TokenSigner::new(b"registry-test"))
    }

    fn disk_config(root: &std::path::Path) -> StorageConfig {
        let toml = format!(
            r#"
            default_service = "mirrored"

            [services.local]
            kind = "disk"
            root = "{root}/local"

            [services.replica]
            kind = "disk"
            root = "{root}/replica"

            [services.mirrored]
            kind = "mirror"
            primary = "local"
            mirrors = ["replica"]
            "#,
            root = root.display()
        );
        config::Config::builder()
            .add_source(config::File::from_str(&toml, config::FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[tokio::test]
    async fn builds_services_and_resolves_mirror_members() {
        let dir = tempfile::tempdir().unwrap();
        let registry =
            ServiceRegistry::from_config(&disk_config(dir.path()), signer(), "http://localhost")
                .await
                .unwrap();

        assert_eq!(registry.default_name(), "mirrored");
        assert!(registry.get("local").is_some());
        assert!(registry.mirror("mirrored").is_some());
        assert!(registry.mirror("local").is_none());

        // Writes through the default reach both members.
        let data = b"registry test";
        registry
            .default_service()
            .put("registrykey1", data, &Checksum::compute(data), "text/plain")
            .await
            .unwrap();
        let local = registry.get("local").unwrap();
        let replica = registry.get("replica").unwrap();
        assert!(local.exists("registrykey1").await.unwrap());
        assert!(replica.exists("registrykey1").await.unwrap());
    }

    #[tokio::test]
    async fn unknown_mirror_member_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = disk_config(dir.path());
        cfg.services.insert(
            "broken".into(),
            ServiceConfig::Mirror {
                primary: "nope".into(),
                mirrors: vec![],
            },
        );
        let result = ServiceRegistry::from_config(&cfg, signer(), "http://localhost").await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn missing_default_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = disk_config(dir.path());
        cfg.default_service = "ghost".into();
        let result = ServiceRegistry::from_config(&cfg, signer(), "http://localhost").await;
        assert!(result.is_err());
    }
}
