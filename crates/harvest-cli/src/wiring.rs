//! Builds stores, the organization registry and the engine from configuration.

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use harvest_core::HarvestConfig;
use harvest_db::{
    connect, InMemoryMediaStore, InMemoryProblemStore, MediaStore, PgMediaStore, PgProblemStore,
    ProblemStore,
};
use harvest_engine::{
    EngineSettings, HttpUploadClient, JsonFeedAdapter, OrgEngine, Sha256Hasher,
};
use harvest_orgs::{load_definitions, OrgDefinition, OrgRegistry};

#[derive(Clone)]
pub struct Stores {
    pub media: Arc<dyn MediaStore>,
    pub problems: Arc<dyn ProblemStore>,
}

/// PostgreSQL stores when `DATABASE_URL` is set, in-memory otherwise.
pub async fn open_stores(config: &HarvestConfig) -> Result<Stores> {
    match &config.database_url {
        Some(url) => {
            let pool = connect(url, config.db_max_connections).await?;
            Ok(Stores {
                media: Arc::new(PgMediaStore::new(pool.clone())),
                problems: Arc::new(PgProblemStore::new(pool)),
            })
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory stores; state is lost on exit");
            Ok(Stores {
                media: Arc::new(InMemoryMediaStore::new()),
                problems: Arc::new(InMemoryProblemStore::new()),
            })
        }
    }
}

/// Load the definitions file and build the registry from it.
pub async fn load_organizations(path: &Path) -> Result<(OrgRegistry, Vec<OrgDefinition>)> {
    let definitions = load_definitions(path).await?;
    let registry = OrgRegistry::from_definitions(&definitions)
        .await
        .with_context(|| format!("Invalid organization in {}", path.display()))?;
    Ok((registry, definitions))
}

/// Build the engine with HTTP collaborators. Feed tokens are read through
/// `lookup` from the variable each source names.
pub fn build_engine<F>(
    config: &HarvestConfig,
    registry: OrgRegistry,
    definitions: &[OrgDefinition],
    stores: &Stores,
    lookup: F,
) -> Result<OrgEngine>
where
    F: Fn(&str) -> Option<String>,
{
    let timeout = Duration::from_secs(config.http_timeout_secs);
    let gateway_url = config
        .upload_gateway_url
        .as_deref()
        .context("UPLOAD_GATEWAY_URL must be set to run harvest cycles")?;

    let uploader = HttpUploadClient::new(gateway_url, config.upload_gateway_token.clone(), timeout)?;
    let hasher = Sha256Hasher::new(timeout)?;

    let mut engine = OrgEngine::new(
        registry,
        stores.media.clone(),
        stores.problems.clone(),
        Arc::new(uploader),
        Arc::new(hasher),
        EngineSettings::from_config(config),
    );

    for definition in definitions {
        let Some(source) = &definition.source else {
            tracing::warn!(org_id = %definition.id, "No source configured, cycles will fail");
            continue;
        };
        let token = match &source.token_env {
            Some(var) => {
                let token = lookup(var);
                if token.is_none() {
                    tracing::warn!(org_id = %definition.id, token_env = %var, "Feed token variable not set");
                }
                token
            }
            None => None,
        };
        let adapter = JsonFeedAdapter::new(&source.feed_url, token, timeout)
            .with_context(|| format!("Failed to create feed adapter for {}", definition.id))?;
        engine = engine.with_adapter(definition.id.clone(), Arc::new(adapter));
    }

    Ok(engine)
}

#[cfg(test)]
mod tests {
    use super::*;
    use harvest_orgs::parse_definitions;
    use std::collections::HashMap;
    use std::io::Write;

    const DEFINITIONS: &str = r#"{
        "organizations": [
            {
                "id": "nasa",
                "name": "NASA",
                "source": { "feed_url": "https://feeds.example.org/nasa", "token_env": "NASA_FEED_TOKEN" },
                "policy": { "licence_templates": ["PD-USGov-NASA"] }
            },
            { "id": "esa", "name": "ESA" }
        ]
    }"#;

    fn config(vars: &[(&str, &str)]) -> HarvestConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        HarvestConfig::from_lookup(|key| vars.get(key).cloned()).unwrap()
    }

    fn memory_stores() -> Stores {
        Stores {
            media: Arc::new(InMemoryMediaStore::new()),
            problems: Arc::new(InMemoryProblemStore::new()),
        }
    }

    #[tokio::test]
    async fn loads_registry_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(DEFINITIONS.as_bytes()).unwrap();

        let (registry, definitions) = load_organizations(file.path()).await.unwrap();
        assert_eq!(definitions.len(), 2);
        assert_eq!(registry.ids().await, vec!["esa", "nasa"]);
    }

    #[tokio::test]
    async fn memory_stores_without_database_url() {
        let stores = open_stores(&config(&[])).await.unwrap();
        let key = harvest_core::models::MediaId::new("nasa", "1");
        assert!(stores.media.get(&key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn engine_requires_gateway() {
        let definitions = parse_definitions(DEFINITIONS).unwrap();
        let registry = OrgRegistry::from_definitions(&definitions).await.unwrap();
        let err = build_engine(&config(&[]), registry, &definitions, &memory_stores(), |_| None)
            .err()
            .unwrap();
        assert!(err.to_string().contains("UPLOAD_GATEWAY_URL"));
    }

    #[tokio::test]
    async fn engine_gets_adapters_for_sourced_organizations() {
        let definitions = parse_definitions(DEFINITIONS).unwrap();
        let registry = OrgRegistry::from_definitions(&definitions).await.unwrap();
        let config = config(&[("UPLOAD_GATEWAY_URL", "http://localhost:9000")]);

        let engine = build_engine(&config, registry, &definitions, &memory_stores(), |var| {
            (var == "NASA_FEED_TOKEN").then(|| "secret".to_string())
        })
        .unwrap();

        assert!(engine.registry().contains("nasa").await);
        // esa has no source: its cycle fails instead of silently doing nothing
        let err = engine.update_media("esa", false).await.unwrap_err();
        assert!(err.to_string().contains("No media source adapter"));
    }
}
