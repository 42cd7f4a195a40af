//! Evolution Analyzer integration coverage: seeds completed episodes into a
//! real SQLite database and verifies the resulting candidate strategy and
//! evolution log entry, mirroring the teacher's pattern of driving a
//! service's public surface against real repositories rather than fakes.

mod common;

use synthline::domain::models::{StrategyStatus, TimeWindow};
use synthline::domain::ports::EpisodeRepository;

use common::{create_topic_with_default_strategy, setup_harness, MockTools};

fn low_save_rate_episode(topic_id: uuid::Uuid) -> synthline::domain::models::Episode {
    let mut episode = synthline::domain::models::Episode::new(topic_id, 1, "q".to_string(), None);
    episode.sources_returned = 10;
    episode.sources_saved = 1;
    episode.complete(uuid::Uuid::new_v4());
    episode
}

/// Ten episodes at a 10% save rate trip the `saveRate < 0.40` rule,
/// producing a v2 candidate at 20% rollout with shallow depth and a monthly
/// time window, plus a matching evolution log entry (spec §4.7, §4.1).
#[tokio::test]
async fn low_save_rate_window_creates_a_rolled_out_candidate() {
    let harness = setup_harness(10, 5, MockTools::new()).await;
    let topic = create_topic_with_default_strategy(&harness, "low save rate topic").await;

    for _ in 0..10 {
        harness.repos.episodes.insert(&low_save_rate_episode(topic.id)).await.unwrap();
    }

    harness.evolution_analyzer.on_episode_completed(topic.id, uuid::Uuid::new_v4()).await;

    let versions = harness.strategy_store.list_versions(topic.id).await.unwrap();
    assert_eq!(versions.len(), 2, "a candidate v2 must be created alongside the original active v1");

    let candidate = versions.iter().find(|s| s.version == 2).expect("v2 candidate must exist");
    assert_eq!(candidate.status, StrategyStatus::Candidate);
    assert_eq!(candidate.rollout_percentage, 20);
    assert_eq!(candidate.config.search_depth, synthline::domain::models::SearchDepth::Shallow);
    assert_eq!(candidate.config.time_window, TimeWindow::Month);

    let entries = harness.repos.evolution_log.list_for_topic(topic.id).await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].from_version, Some(1));
    assert_eq!(entries[0].to_version, 2);
    assert!(entries[0].changes.get("low_save_rate").is_some());

    let active = harness.strategy_store.get_active(topic.id).await.unwrap().expect("v1 must remain active");
    assert_eq!(active.version, 1);
}

/// Re-running the analysis for the same episode id is a no-op, even though
/// the window still reads as unhealthy (spec §4.7: "idempotent within the
/// same episode id").
#[tokio::test]
async fn re_analyzing_the_same_episode_id_does_not_duplicate_the_candidate() {
    let harness = setup_harness(11, 5, MockTools::new()).await;
    let topic = create_topic_with_default_strategy(&harness, "idempotency topic").await;

    for _ in 0..10 {
        harness.repos.episodes.insert(&low_save_rate_episode(topic.id)).await.unwrap();
    }

    let episode_id = uuid::Uuid::new_v4();
    harness.evolution_analyzer.on_episode_completed(topic.id, episode_id).await;
    harness.evolution_analyzer.on_episode_completed(topic.id, episode_id).await;

    let entries = harness.repos.evolution_log.list_for_topic(topic.id).await.unwrap();
    assert_eq!(entries.len(), 1, "the same episode id must only ever trigger one analysis");
}

/// A window that lands outside every mutation rule's trigger range never
/// mutates the strategy; only the original v1 should exist after analysis
/// (spec §4.7 step 3). Save rate of exactly 0.50 and a 20% senso usage rate
/// both sit on a rule boundary without crossing it (every trigger is a
/// strict `<`/`>` comparison), and zero follow-ups keeps the two
/// follow-up-driven rules clear as well.
#[tokio::test]
async fn balanced_metrics_leave_the_strategy_unchanged() {
    let harness = setup_harness(12, 5, MockTools::new()).await;
    let topic = create_topic_with_default_strategy(&harness, "healthy topic").await;

    for i in 0..10 {
        let mut episode = synthline::domain::models::Episode::new(topic.id, 1, "q".to_string(), None);
        episode.sources_returned = 10;
        episode.sources_saved = 5;
        episode.senso_search_used = i < 2;
        episode.complete(uuid::Uuid::new_v4());
        harness.repos.episodes.insert(&episode).await.unwrap();
    }

    harness.evolution_analyzer.on_episode_completed(topic.id, uuid::Uuid::new_v4()).await;

    let versions = harness.strategy_store.list_versions(topic.id).await.unwrap();
    assert_eq!(versions.len(), 1, "a balanced window must not spawn a candidate");
}
