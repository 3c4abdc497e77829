use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use log::info;

use crate::error::Result;
use crate::output::ProcessingProgress;

use super::cache::{BuildCache, CachedBuild};
use super::client::DevelocityClient;
use super::consumer::{dispatch_build, BuildConsumer};
use super::types::{Build, BuildModelName};

const DISCOVERY_MAX_BUILDS_PER_REQUEST: usize = 1000;

/// Totals of one processing run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ProcessingSummary {
    pub discovered: usize,
    pub fetched: usize,
    pub processed: usize,
}

/// Streams every build in the window through the registered consumers.
///
/// Builds are discovered newest-first, then delivered in discovery order
/// exactly once each, fully populated with `build_models`. Cached builds are
/// delivered immediately; consecutive cache misses accumulate into a pending
/// batch that is flushed as one multi-build fetch either when it reaches
/// `max_builds_per_request` or when a cache hit interrupts it. Fetched builds
/// are written to the cache before delivery.
///
/// # Errors
///
/// Any cache I/O failure aborts the run; client errors propagate unmodified.
pub async fn process_builds(
    client: &DevelocityClient,
    cache: &BuildCache,
    query: Option<&str>,
    since: DateTime<Utc>,
    max_builds_per_request: usize,
    build_models: &BTreeSet<BuildModelName>,
    consumers: &mut [&mut dyn BuildConsumer],
) -> Result<ProcessingSummary> {
    info!(
        "Discovering builds since {}",
        since.format("%b %-d %Y %H:%M %Z")
    );
    let builds = discover_builds(client, query, since).await?;
    info!("Discovered {} builds", builds.len());

    let mut progress = ProcessingProgress::start(builds.len());
    let mut summary = ProcessingSummary {
        discovered: builds.len(),
        ..ProcessingSummary::default()
    };

    // Cursor the next batch fetch starts from: the most recent build already
    // delivered before the current run of cache misses.
    let mut flush_cursor: Option<String> = None;
    let mut pending = 0usize;
    let mut last_pending_id = String::new();

    for build in &builds {
        progress.observe(summary.processed, summary.fetched);

        let cached = cache.read(&build.id)?;

        if pending == max_builds_per_request || (cached.is_some() && pending > 0) {
            flush_pending(
                client,
                cache,
                query,
                build_models,
                consumers,
                flush_cursor.as_deref(),
                pending,
            )
            .await?;
            flush_cursor = Some(last_pending_id.clone());
            summary.processed += pending;
            summary.fetched += pending;
            pending = 0;
        }

        match cached {
            Some(entry) => {
                if entry.covers(build_models) {
                    dispatch_build(&entry.build, consumers);
                } else {
                    let refreshed = refresh_entry(client, cache, entry, build_models).await?;
                    summary.fetched += 1;
                    dispatch_build(&refreshed, consumers);
                }
                flush_cursor = Some(build.id.clone());
                summary.processed += 1;
            }
            None => {
                last_pending_id = build.id.clone();
                pending += 1;
            }
        }
    }

    if pending > 0 {
        flush_pending(
            client,
            cache,
            query,
            build_models,
            consumers,
            flush_cursor.as_deref(),
            pending,
        )
        .await?;
        summary.processed += pending;
        summary.fetched += pending;
    }

    progress.finish(summary.processed, summary.fetched);
    info!(
        "{} builds fetched from API, {} total builds processed",
        summary.fetched, summary.processed
    );

    for consumer in consumers.iter_mut() {
        consumer.on_finish();
    }

    Ok(summary)
}

/// Pages through the listing newest-first until the window is exhausted.
///
/// Stops on an empty page, or on the first page whose oldest entry precedes
/// `since` (that page is filtered down to entries at or after `since`).
async fn discover_builds(
    client: &DevelocityClient,
    query: Option<&str>,
    since: DateTime<Utc>,
) -> Result<Vec<Build>> {
    let since_millis = since.timestamp_millis();
    let mut builds = Vec::new();
    let mut from_build: Option<String> = None;

    loop {
        let page = client
            .list_builds(
                query,
                DISCOVERY_MAX_BUILDS_PER_REQUEST,
                None,
                from_build.as_deref(),
            )
            .await?;

        let Some(last) = page.last() else {
            return Ok(builds);
        };

        if last.available_at < since_millis {
            builds.extend(page.into_iter().filter(|b| b.available_at >= since_millis));
            return Ok(builds);
        }

        from_build = Some(last.id.clone());
        builds.extend(page);
    }
}

/// One multi-build fetch for the pending run of cache misses.
async fn flush_pending(
    client: &DevelocityClient,
    cache: &BuildCache,
    query: Option<&str>,
    build_models: &BTreeSet<BuildModelName>,
    consumers: &mut [&mut dyn BuildConsumer],
    from_build: Option<&str>,
    count: usize,
) -> Result<()> {
    let fetched = client
        .list_builds(query, count, Some(build_models), from_build)
        .await?;

    for build in fetched {
        let entry = CachedBuild {
            build_models: build_models.clone(),
            build,
        };
        cache.write(&entry.build.id, &entry)?;
        dispatch_build(&entry.build, consumers);
    }

    Ok(())
}

/// Refreshes a cache entry whose stored model set no longer covers the
/// request. The refresh asks for the union of both sets so the entry
/// converges to a superset instead of dropping previously fetched sections.
async fn refresh_entry(
    client: &DevelocityClient,
    cache: &BuildCache,
    stale: CachedBuild,
    requested: &BTreeSet<BuildModelName>,
) -> Result<Build> {
    let union: BTreeSet<BuildModelName> = stale.build_models.union(requested).copied().collect();
    let build = client.get_build(&stale.build.id, &union).await?;

    let entry = CachedBuild {
        build_models: union,
        build,
    };
    cache.write(&entry.build.id, &entry)?;
    Ok(entry.build)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::develocity::consumer::{GradleBuild, MavenBuild};
    use crate::develocity::types::attribute_models;
    use chrono::TimeZone;
    use tempfile::TempDir;

    #[derive(Default)]
    struct RecordingConsumer {
        ids: Vec<String>,
        finished: bool,
    }

    impl BuildConsumer for RecordingConsumer {
        fn on_gradle_build(&mut self, build: &GradleBuild<'_>) {
            self.ids.push(build.build.id.clone());
        }

        fn on_maven_build(&mut self, build: &MavenBuild<'_>) {
            self.ids.push(build.build.id.clone());
        }

        fn on_finish(&mut self) {
            self.finished = true;
        }
    }

    fn build_json(id: &str, available_at: i64) -> String {
        format!(r#"{{"id":"{id}","availableAt":{available_at},"buildToolType":"gradle"}}"#)
    }

    fn since() -> DateTime<Utc> {
        Utc.timestamp_millis_opt(500).unwrap()
    }

    // Exact query strings keep every mock mutually exclusive; parameter order
    // follows the order the client appends them in.
    fn list_mock(
        server: &mut mockito::Server,
        query: &str,
        body: String,
        hits: usize,
    ) -> mockito::Mock {
        server
            .mock("GET", "/api/builds")
            .match_query(query)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(body)
            .expect(hits)
            .create()
    }

    #[tokio::test]
    async fn test_second_run_reuses_cache_without_model_fetches() {
        let mut server = mockito::Server::new_async().await;
        let temp_dir = TempDir::new().unwrap();
        let cache = BuildCache::new(Some(temp_dir.path().join("builds"))).unwrap();

        // Two runs of discovery: a full page, then an empty page.
        let page = format!("[{},{}]", build_json("b2", 2000), build_json("b1", 1000));
        list_mock(&mut server, "maxBuilds=1000&reverse=true", page, 2);
        list_mock(
            &mut server,
            "maxBuilds=1000&reverse=true&fromBuild=b1",
            "[]".to_string(),
            2,
        );

        // Model fetch for the two misses; must be hit exactly once across both runs.
        let models_mock = list_mock(
            &mut server,
            "maxBuilds=2&reverse=true&models=gradle-attributes&models=maven-attributes",
            format!("[{},{}]", build_json("b2", 2000), build_json("b1", 1000)),
            1,
        );

        let client = DevelocityClient::new(&server.url(), None).unwrap();
        let models = attribute_models();

        let mut first = RecordingConsumer::default();
        let summary = process_builds(
            &client,
            &cache,
            None,
            since(),
            100,
            &models,
            &mut [&mut first],
        )
        .await
        .unwrap();

        assert_eq!(summary.discovered, 2);
        assert_eq!(summary.fetched, 2);
        assert_eq!(summary.processed, 2);
        assert_eq!(first.ids, vec!["b2", "b1"]);
        assert!(first.finished);

        let mut second = RecordingConsumer::default();
        let summary = process_builds(
            &client,
            &cache,
            None,
            since(),
            100,
            &models,
            &mut [&mut second],
        )
        .await
        .unwrap();

        models_mock.assert_async().await;
        assert_eq!(summary.fetched, 0);
        assert_eq!(summary.processed, 2);
        assert_eq!(second.ids, first.ids);
    }

    #[tokio::test]
    async fn test_cache_hit_flushes_pending_batch_and_preserves_order() {
        let mut server = mockito::Server::new_async().await;
        let temp_dir = TempDir::new().unwrap();
        let cache = BuildCache::new(Some(temp_dir.path().join("builds"))).unwrap();
        let models = attribute_models();

        // b2 is already cached with the requested models.
        cache
            .write(
                "b2",
                &CachedBuild {
                    build_models: models.clone(),
                    build: serde_json::from_str(&build_json("b2", 2000)).unwrap(),
                },
            )
            .unwrap();

        let page = format!(
            "[{},{},{}]",
            build_json("b3", 3000),
            build_json("b2", 2000),
            build_json("b1", 1000)
        );
        list_mock(&mut server, "maxBuilds=1000&reverse=true", page, 1);
        list_mock(
            &mut server,
            "maxBuilds=1000&reverse=true&fromBuild=b1",
            "[]".to_string(),
            1,
        );

        // Flush triggered by the b2 cache hit: one pending build, no cursor yet.
        let first_flush = list_mock(
            &mut server,
            "maxBuilds=1&reverse=true&models=gradle-attributes&models=maven-attributes",
            format!("[{}]", build_json("b3", 3000)),
            1,
        );

        // Final flush for b1, resuming from the delivered cache hit.
        let second_flush = list_mock(
            &mut server,
            "maxBuilds=1&reverse=true&fromBuild=b2&models=gradle-attributes&models=maven-attributes",
            format!("[{}]", build_json("b1", 1000)),
            1,
        );

        let client = DevelocityClient::new(&server.url(), None).unwrap();
        let mut consumer = RecordingConsumer::default();
        let summary = process_builds(
            &client,
            &cache,
            None,
            since(),
            100,
            &models,
            &mut [&mut consumer],
        )
        .await
        .unwrap();

        first_flush.assert_async().await;
        second_flush.assert_async().await;
        assert_eq!(summary.fetched, 2);
        assert_eq!(summary.processed, 3);
        assert_eq!(consumer.ids, vec!["b3", "b2", "b1"]);
    }

    #[tokio::test]
    async fn test_widened_model_set_refreshes_single_entry_to_superset() {
        let mut server = mockito::Server::new_async().await;
        let temp_dir = TempDir::new().unwrap();
        let cache = BuildCache::new(Some(temp_dir.path().join("builds"))).unwrap();

        // Cached with gradle attributes only; the run asks for maven too.
        cache
            .write(
                "b1",
                &CachedBuild {
                    build_models: BTreeSet::from([BuildModelName::GradleAttributes]),
                    build: serde_json::from_str(&build_json("b1", 1000)).unwrap(),
                },
            )
            .unwrap();

        list_mock(
            &mut server,
            "maxBuilds=1000&reverse=true",
            format!("[{}]", build_json("b1", 1000)),
            1,
        );
        list_mock(
            &mut server,
            "maxBuilds=1000&reverse=true&fromBuild=b1",
            "[]".to_string(),
            1,
        );

        let refresh_mock = server
            .mock("GET", "/api/builds/b1")
            .match_query("models=gradle-attributes&models=maven-attributes")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(build_json("b1", 1000))
            .expect(1)
            .create();

        let client = DevelocityClient::new(&server.url(), None).unwrap();
        let models = attribute_models();
        let mut consumer = RecordingConsumer::default();
        let summary = process_builds(
            &client,
            &cache,
            None,
            since(),
            100,
            &models,
            &mut [&mut consumer],
        )
        .await
        .unwrap();

        refresh_mock.assert_async().await;
        assert_eq!(summary.fetched, 1);
        assert_eq!(consumer.ids, vec!["b1"]);

        let entry = cache.read("b1").unwrap().unwrap();
        assert!(entry.build_models.is_superset(&models));
        assert!(entry
            .build_models
            .contains(&BuildModelName::GradleAttributes));
    }

    #[tokio::test]
    async fn test_discovery_filters_page_straddling_the_window() {
        let mut server = mockito::Server::new_async().await;
        let temp_dir = TempDir::new().unwrap();
        let cache = BuildCache::new(Some(temp_dir.path().join("builds"))).unwrap();

        // Oldest entry of the page precedes the window: discovery must stop
        // after filtering without requesting another page.
        let page = format!("[{},{}]", build_json("b2", 2000), build_json("b0", 100));
        list_mock(&mut server, "maxBuilds=1000&reverse=true", page, 1);

        let models_mock = list_mock(
            &mut server,
            "maxBuilds=1&reverse=true&models=gradle-attributes&models=maven-attributes",
            format!("[{}]", build_json("b2", 2000)),
            1,
        );

        let client = DevelocityClient::new(&server.url(), None).unwrap();
        let mut consumer = RecordingConsumer::default();
        let summary = process_builds(
            &client,
            &cache,
            None,
            since(),
            100,
            &attribute_models(),
            &mut [&mut consumer],
        )
        .await
        .unwrap();

        models_mock.assert_async().await;
        assert_eq!(summary.discovered, 1);
        assert_eq!(consumer.ids, vec!["b2"]);
    }
}
