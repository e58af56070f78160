use anyhow::{ensure, Result};
use decaying_cache_core::{CacheConfig, GlobalParameterCache, TableDataCache};
use futures::future::join_all;
use serde_json::json;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const LIFETIME: Duration = Duration::from_millis(500);

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "decaying_cache_soak=info,decaying_cache_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = CacheConfig::from_env();
    tracing::info!("🧪 Decaying cache soak run");
    tracing::info!(
        "   Lifetime: {:?}, sweep every {:?}",
        config.lifetime,
        config.sweep_interval
    );

    test_parallel_identity(config.clone()).await?;
    test_source_isolation().await?;
    test_decay().await?;
    test_table_rows().await?;

    tracing::info!("✅ All checks passed!");

    Ok(())
}

/// Many tasks asking for the same parameters must all get the same objects
async fn test_parallel_identity(config: CacheConfig) -> Result<()> {
    tracing::info!("Check: Parallel lookups (1000 tasks over 10 sources)");

    let cache = Arc::new(GlobalParameterCache::<u64>::with_config(config)?);
    let start = Instant::now();

    let futures: Vec<_> = (0..1000)
        .map(|i| {
            let cache = Arc::clone(&cache);
            tokio::spawn(async move {
                let parameter = cache.get_parameter(1, i % 10, 100);
                *parameter.lock() += 1;
                parameter.set_initialized(true);
            })
        })
        .collect();

    for result in join_all(futures).await {
        result?;
    }

    tracing::info!("   1000 lookups in {:?}", start.elapsed());

    let total: u64 = (0..10).map(|minor| cache.get_parameter(1, minor, 100).get()).sum();
    ensure!(total == 1000, "expected 1000 increments, counted {}", total);
    ensure!(cache.source_count() == 10, "expected 10 sources, found {}", cache.source_count());

    tracing::info!("   ✓ Every task shared one parameter per source");
    Ok(())
}

/// Values stored under different identifiers must not mix
async fn test_source_isolation() -> Result<()> {
    tracing::info!("Check: Source isolation");

    let cache = GlobalParameterCache::<i32>::new(LIFETIME)?;
    let ids = [(1, 1, 1), (1, 1, 2), (1, 2, 1), (2, 1, 1), (-1, -1, 1)];

    for (major, minor, param) in ids {
        cache
            .get_parameter(major, minor, param)
            .set(major * 100 + minor * 10 + param);
    }

    let mismatches = ids
        .iter()
        .filter(|&&(major, minor, param)| {
            cache.get_parameter(major, minor, param).get() != major * 100 + minor * 10 + param
        })
        .count();

    ensure!(mismatches == 0, "{} parameters held another parameter's value", mismatches);

    tracing::info!("   ✓ No values mixed between sources");
    Ok(())
}

/// Touched sources stay, idle sources go
async fn test_decay() -> Result<()> {
    tracing::info!("Check: Decay ({:?} lifetime)", LIFETIME);

    let cache = GlobalParameterCache::<bool>::new(LIFETIME)?;
    cache.get_parameter(7, 7, 1).set(true);
    cache.get_parameter(8, 8, 1).set(true);

    // Keep source 7 busy while source 8 sits idle
    for _ in 0..6 {
        tokio::time::sleep(LIFETIME / 3).await;
        ensure!(cache.get_parameter(7, 7, 1).is_initialized(), "busy source decayed");
    }

    ensure!(!cache.get_parameter(8, 8, 1).is_initialized(), "idle source survived");

    tracing::info!("   ✓ Idle source decayed, busy source kept");
    Ok(())
}

/// Table rows written under the lock are visible to later lookups
async fn test_table_rows() -> Result<()> {
    tracing::info!("Check: Table rows");

    let cache = TableDataCache::new()?;
    {
        let table = cache.get_table(3, 4, 2000);
        let mut rows = table.lock();
        for index in 0..50 {
            rows.insert(
                index.to_string(),
                vec![json!(index), json!(format!("row-{}", index)), json!(index as f64 / 2.0)],
            );
        }
        table.set_initialized(true);
    }

    let table = cache.get_table(3, 4, 2000);
    ensure!(table.is_initialized(), "table lost its initialized flag");
    let row_count = table.lock().len();
    ensure!(row_count == 50, "expected 50 rows, found {}", row_count);

    cache.shutdown();

    tracing::info!("   ✓ {} rows read back", row_count);
    Ok(())
}
