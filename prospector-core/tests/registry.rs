mod support;

use anyhow::Result;
use chrono::Utc;
use prospector_core::{
    CrawlerError,
    application::CrawlerUnitOfWork,
    database::ports::RunLogRepository,
    registry::RegistrySettings,
    types::{
        CrawlerConfigPatch, CrawlerId, PageRequest, RunOutcome, RunReport,
        SearchParameters, SearchSlot, TenantId,
    },
};
use support::{harness, harness_with, new_crawler};

#[tokio::test]
async fn other_tenants_see_not_found() -> Result<()> {
    let h = harness();
    let config = h.registry.create(h.tenant, h.owner, new_crawler(10, true)).await?;

    let stranger = TenantId::new();
    assert!(matches!(
        h.registry.get(stranger, config.id).await,
        Err(CrawlerError::NotFound(_))
    ));
    assert!(matches!(
        h.registry.toggle(stranger, config.id, Some(false)).await,
        Err(CrawlerError::NotFound(_))
    ));
    assert!(matches!(
        h.registry.delete(stranger, config.id).await,
        Err(CrawlerError::NotFound(_))
    ));
    assert!(h.registry.list(stranger).await?.is_empty());
    assert_eq!(h.registry.list(h.tenant).await?.len(), 1);
    Ok(())
}

#[tokio::test]
async fn create_rejects_malformed_slots() -> Result<()> {
    let h = harness();
    let mut new = new_crawler(10, true);
    new.search = SearchParameters {
        slots: vec![
            SearchSlot {
                name: "north".into(),
                queries: vec!["a".into()],
                enabled: true,
            },
            SearchSlot {
                name: "North".into(),
                queries: vec!["b".into()],
                enabled: true,
            },
        ],
        ..Default::default()
    };

    assert!(matches!(
        h.registry.create(h.tenant, h.owner, new).await,
        Err(CrawlerError::Validation(_))
    ));
    assert!(h.registry.list(h.tenant).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn toggle_leaves_compilation_state_alone() -> Result<()> {
    let h = harness();
    let config = h.registry.create(h.tenant, h.owner, new_crawler(1, true)).await?;

    let run = h.lifecycle.start(config.id).await?;
    h.lifecycle
        .complete(
            run.id,
            RunOutcome::succeeded(RunReport {
                proposals_created: 4,
                ..Default::default()
            }),
        )
        .await?;

    let compiled = h.registry.get(h.tenant, config.id).await?;
    assert!(!compiled.enabled);
    let compiled_at = compiled.compiled_at.expect("compiled");

    let before = Utc::now();
    let enabled = h.registry.toggle(h.tenant, config.id, None).await?;
    assert!(enabled.enabled);
    assert_eq!(enabled.active_proposals, 4);
    assert_eq!(enabled.compiled_at, Some(compiled_at));
    let next = enabled.next_run_at.expect("scheduled");
    assert!(next >= before + chrono::Duration::seconds(config.interval_seconds));

    let disabled = h.registry.toggle(h.tenant, config.id, Some(false)).await?;
    assert!(!disabled.enabled);
    assert!(disabled.next_run_at.is_none());
    assert_eq!(disabled.compiled_at, Some(compiled_at));

    let still_disabled = h.registry.toggle(h.tenant, config.id, Some(false)).await?;
    assert!(!still_disabled.enabled);
    Ok(())
}

#[tokio::test]
async fn update_never_writes_aggregates() -> Result<()> {
    let h = harness();
    let config = h.registry.create(h.tenant, h.owner, new_crawler(100, true)).await?;

    let run = h.lifecycle.start(config.id).await?;
    h.lifecycle
        .complete(
            run.id,
            RunOutcome::succeeded(RunReport {
                proposals_created: 3,
                ..Default::default()
            }),
        )
        .await?;

    let updated = h
        .registry
        .update(
            h.tenant,
            config.id,
            CrawlerConfigPatch {
                name: Some("Architecture firms (AT)".into()),
                interval_seconds: Some(7200),
                ..Default::default()
            },
        )
        .await?;

    assert_eq!(updated.name, "Architecture firms (AT)");
    assert_eq!(updated.interval_seconds, 7200);
    assert_eq!(updated.active_proposals, 3);
    assert_eq!(updated.run_count, 1);
    assert!(updated.enabled);
    Ok(())
}

#[tokio::test]
async fn update_validates_merged_config() -> Result<()> {
    let h = harness();
    let config = h.registry.create(h.tenant, h.owner, new_crawler(10, true)).await?;

    let result = h
        .registry
        .update(
            h.tenant,
            config.id,
            CrawlerConfigPatch {
                concurrent_searches: Some(50),
                ..Default::default()
            },
        )
        .await;
    assert!(matches!(result, Err(CrawlerError::Validation(_))));
    assert_eq!(
        h.registry.get(h.tenant, config.id).await?.concurrent_searches,
        2
    );
    Ok(())
}

#[tokio::test]
async fn delete_with_history_is_refused_without_cascade() -> Result<()> {
    let h = harness();
    let config = h.registry.create(h.tenant, h.owner, new_crawler(10, true)).await?;
    h.lifecycle.start(config.id).await?;

    assert!(matches!(
        h.registry.delete(h.tenant, config.id).await,
        Err(CrawlerError::Conflict(_))
    ));
    assert!(h.registry.get(h.tenant, config.id).await.is_ok());
    Ok(())
}

#[tokio::test]
async fn cascade_delete_removes_history() -> Result<()> {
    let h = harness_with(
        CrawlerUnitOfWork::in_memory(),
        RegistrySettings {
            cascade_delete_runs: true,
        },
    );
    let config = h.registry.create(h.tenant, h.owner, new_crawler(10, true)).await?;
    h.lifecycle.start(config.id).await?;

    h.registry.delete(h.tenant, config.id).await?;
    assert!(matches!(
        h.registry.get(h.tenant, config.id).await,
        Err(CrawlerError::NotFound(_))
    ));
    assert_eq!(h.uow.runs.count_runs(config.id).await?, 0);
    Ok(())
}

#[tokio::test]
async fn runs_are_paged_newest_first() -> Result<()> {
    let h = harness();
    let config = h.registry.create(h.tenant, h.owner, new_crawler(10, false)).await?;
    let mut ids = Vec::new();
    for _ in 0..3 {
        ids.push(h.lifecycle.start(config.id).await?.id);
        tokio::time::sleep(std::time::Duration::from_millis(2)).await;
    }

    let page = h
        .registry
        .runs(h.tenant, config.id, PageRequest::new(Some(1), Some(2)))
        .await?;
    assert_eq!(page.total, 3);
    assert_eq!(page.runs.iter().map(|r| r.id).collect::<Vec<_>>(), [ids[2], ids[1]]);

    assert!(matches!(
        h.registry
            .runs(h.tenant, CrawlerId::new(), PageRequest::default())
            .await,
        Err(CrawlerError::NotFound(_))
    ));
    Ok(())
}
