// tests/roster_e2e.rs
use roster_sync::dashboard::{Dashboard, DashboardSources};
use roster_sync::poll::{FnSource, SnapshotSource};
use roster_sync::roster::{Candidate, MergeOptions, Provenance, RosterSources, ScoreSource};
use roster_sync::stats::RosterStats;
use roster_sync::RosterSyncConfig;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;

#[test]
fn three_sources_merge_into_one_ranked_record() {
    let sources = RosterSources {
        seed: vec![Candidate::new(Provenance::Seed)
            .email("a@x")
            .score(0.0)
            .notes("seed")],
        authoritative: vec![
            Candidate::new(Provenance::Authoritative)
                .email("a@x")
                .score(90.0)
                .firm("F"),
            Candidate::new(Provenance::Authoritative)
                .email("b@x")
                .score(40.0),
        ],
        inferred: vec![Candidate::new(Provenance::Inferred)
            .email("a@x")
            .score(60.0)
            .specialty("S")],
    };
    let view = sources.merge(&MergeOptions::default());

    assert!(view.seed.is_empty());
    assert_eq!(view.records.len(), 2);
    let top = &view.records[0];
    assert_eq!(top.email.as_deref(), Some("a@x"));
    assert_eq!(top.score, 90.0);
    assert_eq!(top.score_source, ScoreSource::Fact);
    assert_eq!(top.display.firm.as_deref(), Some("F"));
    assert_eq!(top.display.specialty.as_deref(), Some("S"));
    assert_eq!(view.highlight[0].email.as_deref(), Some("a@x"));
}

type Shared = Arc<Mutex<Value>>;

fn shared(name: &'static str, v: Shared) -> Box<dyn SnapshotSource<Value>> {
    Box::new(FnSource::new(name, move || {
        let body = v.lock().unwrap().clone();
        async move { Ok::<_, anyhow::Error>(body) }
    }))
}

#[tokio::test(start_paused = true)]
async fn dashboard_view_tracks_backend_changes() {
    let roster: Shared = Arc::new(Mutex::new(json!({
        "lawyers": [{ "lawyer_email": "a@x", "fact_score": 90, "firm_name": "F" }]
    })));
    let inferred: Shared = Arc::new(Mutex::new(json!([
        { "email": "a@x", "match_score": 60, "specialty": "S" }
    ])));

    let mut cfg = RosterSyncConfig::default();
    cfg.roster.base_interval_ms = 1_000;
    cfg.inferred.base_interval_ms = 1_000;
    cfg.seed = vec![Candidate::new(Provenance::Seed).email("demo@x").name("Demo")];
    cfg.merge.excluded = vec!["demo@x".into()];

    let (_vis_tx, vis_rx) = watch::channel(true);
    let mut dash = Dashboard::start_with(
        cfg,
        DashboardSources {
            roster: shared("roster", Arc::clone(&roster)),
            inferred: shared("inferred", Arc::clone(&inferred)),
            stats: Box::new(FnSource::new("stats", || async {
                Ok::<_, anyhow::Error>(RosterStats::default())
            })),
            thread: Box::new(|email: &str| -> anyhow::Result<Box<dyn SnapshotSource<Value>>> {
                anyhow::bail!("threads are not served here: {email}")
            }),
        },
        vis_rx,
    );
    tokio::time::sleep(Duration::from_millis(10)).await;

    let view = dash.roster_view();
    assert_eq!(view.records.len(), 1);
    assert_eq!(view.seed.len(), 1);
    assert_eq!(view.records[0].score, 90.0);

    // backend adds a lawyer; it shows up on the next roster poll
    *roster.lock().unwrap() = json!({
        "lawyers": [
            { "lawyer_email": "a@x", "fact_score": 90, "firm_name": "F" },
            { "lawyer_email": "c@x", "fact_score": 95 }
        ]
    });
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            dash.updated().await;
            if dash.roster_view().records.len() == 2 {
                break;
            }
        }
    })
    .await
    .unwrap();
    let view = dash.roster_view();
    assert_eq!(view.records.len(), 2);
    assert_eq!(view.records[0].email.as_deref(), Some("c@x"));
    assert!(dash.roster_status().error.is_none());

    dash.stop();
}
