// tests/roster_merge.rs
use roster_sync::roster::{
    decode_candidates, merge_sources, Candidate, IdentityKey, MergeOptions, Provenance,
    RosterSources, ScoreSource,
};
use serde_json::json;

fn auth(email: &str) -> Candidate {
    Candidate::new(Provenance::Authoritative).email(email)
}
fn inferred(email: &str) -> Candidate {
    Candidate::new(Provenance::Inferred).email(email)
}
fn seed(email: &str) -> Candidate {
    Candidate::new(Provenance::Seed).email(email)
}

#[test]
fn email_case_and_whitespace_collapse() {
    let view = merge_sources(
        &[vec![auth("A@x.com"), auth(" a@x.com ")]],
        &MergeOptions::default(),
    );
    assert_eq!(view.records.len(), 1);
    assert_eq!(view.records[0].key, IdentityKey::Email("a@x.com".into()));
    assert_eq!(view.records[0].email.as_deref(), Some("a@x.com"));
}

#[test]
fn zero_fact_score_is_treated_as_absent() {
    // documented fallback rule: a fact score of exactly 0 means "not scored yet"
    let view = merge_sources(
        &[vec![auth("a@x.com").score(0.0)], vec![inferred("a@x.com").score(72.0)]],
        &MergeOptions::default(),
    );
    assert_eq!(view.records[0].score, 72.0);
    assert_eq!(view.records[0].score_source, ScoreSource::Inferred);
}

#[test]
fn positive_fact_score_beats_inferred() {
    let view = merge_sources(
        &[vec![inferred("a@x.com").score(40.0)], vec![auth("a@x.com").score(85.0)]],
        &MergeOptions::default(),
    );
    assert_eq!(view.records[0].score, 85.0);
    assert_eq!(view.records[0].score_source, ScoreSource::Fact);
}

#[test]
fn fields_resolve_per_field_not_per_record() {
    let view = merge_sources(
        &[
            vec![seed("a@x.com").name("Seed Name").location("Austin").notes("from seed")],
            vec![auth("a@x.com").firm("Auth Firm")],
            vec![inferred("a@x.com").name("Inferred Name").specialty("Family")],
        ],
        &MergeOptions::default(),
    );
    let r = &view.records[0];
    assert_eq!(r.display.name.as_deref(), Some("Inferred Name"));
    assert_eq!(r.display.firm.as_deref(), Some("Auth Firm"));
    assert_eq!(r.display.specialty.as_deref(), Some("Family"));
    assert_eq!(r.display.location.as_deref(), Some("Austin"));
    assert_eq!(
        r.sources,
        vec![Provenance::Authoritative, Provenance::Inferred, Provenance::Seed]
    );
}

#[test]
fn merge_is_deterministic() {
    let sources = RosterSources {
        seed: vec![seed("s@x.com").score(10.0)],
        authoritative: vec![auth("b@x.com").score(50.0), auth("a@x.com").score(50.0)],
        inferred: vec![inferred("c@x.com").score(50.0), inferred("a@x.com").score(90.0)],
    };
    let opts = MergeOptions::default();
    assert_eq!(sources.merge(&opts), sources.merge(&opts));
}

#[test]
fn ties_keep_encounter_order() {
    let view = merge_sources(
        &[
            vec![inferred("i1@x.com").score(50.0)],
            vec![auth("a2@x.com").score(50.0), auth("a1@x.com").score(50.0)],
        ],
        &MergeOptions::default(),
    );
    let order: Vec<_> = view.records.iter().map(|r| r.email.clone().unwrap()).collect();
    // authoritative first (in its own order), then inferred
    assert_eq!(order, vec!["a2@x.com", "a1@x.com", "i1@x.com"]);
}

#[test]
fn excluded_accounts_go_to_seed_bucket() {
    let opts = MergeOptions::default().exclude(["Demo@Example.com"]);
    let view = merge_sources(
        &[
            vec![seed("demo@example.com").score(99.0)],
            vec![auth("a@x.com").score(10.0)],
        ],
        &opts,
    );
    assert_eq!(view.records.len(), 1);
    assert_eq!(view.seed.len(), 1);
    assert!(view.highlight.iter().all(|r| r.email.as_deref() != Some("demo@example.com")));
    // still addressable
    assert!(view.find("DEMO@example.com").is_some());
}

#[test]
fn highlight_prefers_fact_scores_then_backfills() {
    let view = merge_sources(
        &[
            vec![auth("f1@x.com").score(30.0), auth("f2@x.com").score(20.0)],
            vec![
                inferred("i1@x.com").score(95.0),
                inferred("i2@x.com").score(80.0),
                inferred("i3@x.com").score(70.0),
            ],
        ],
        &MergeOptions::default(),
    );
    // full list is by score
    let full: Vec<_> = view.records.iter().map(|r| r.email.clone().unwrap()).collect();
    assert_eq!(full, vec!["i1@x.com", "i2@x.com", "i3@x.com", "f1@x.com", "f2@x.com"]);

    let top: Vec<_> = view.highlight.iter().map(|r| r.email.clone().unwrap()).collect();
    assert_eq!(top, vec!["f1@x.com", "f2@x.com", "i1@x.com"]);
}

#[test]
fn highlight_is_bounded_by_available_records() {
    let opts = MergeOptions::default().with_highlight_size(5);
    let view = merge_sources(&[vec![auth("a@x.com").score(1.0)]], &opts);
    assert_eq!(view.highlight.len(), 1);
}

#[test]
fn candidates_without_identity_are_dropped() {
    let view = merge_sources(
        &[vec![
            Candidate::new(Provenance::Authoritative).score(90.0),
            Candidate::new(Provenance::Authoritative).email("   "),
            auth("a@x.com"),
        ]],
        &MergeOptions::default(),
    );
    assert_eq!(view.records.len(), 1);
    assert_eq!(view.dropped, 2);
}

#[test]
fn emailless_candidates_keep_a_synthetic_key() {
    let view = merge_sources(
        &[
            vec![Candidate::new(Provenance::Authoritative).name("Jane Roe").firm("Roe LLP")],
            vec![Candidate::new(Provenance::Inferred).name(" jane  roe ").firm("ROE LLP").score(60.0)],
            vec![Candidate::new(Provenance::Inferred).name("Jane Roe").email("jane@roe.com")],
        ],
        &MergeOptions::default(),
    );
    // same name+firm merge with each other, never with an email key
    assert_eq!(view.records.len(), 2);
    let synthetic = view
        .records
        .iter()
        .find(|r| matches!(r.key, IdentityKey::Synthetic(_)))
        .unwrap();
    assert!(synthetic.email.is_none());
    assert_eq!(synthetic.score, 60.0);
    assert_eq!(synthetic.display.name.as_deref(), Some("Jane Roe"));
}

#[test]
fn decode_accepts_backend_shapes() {
    let bare = json!([
        { "lawyer_email": "a@x.com", "lawyer_name": "A", "firm_name": "F", "fact_score": 88 },
        { "email": 42 },
        { "email": "b@x.com", "case_type": "Immigration" }
    ]);
    let list = decode_candidates(&bare, Provenance::Authoritative).unwrap();
    assert_eq!(list.len(), 2);
    assert_eq!(list[0].display.firm.as_deref(), Some("F"));
    assert_eq!(list[0].scores.score, Some(88.0));
    assert_eq!(list[1].display.specialty.as_deref(), Some("Immigration"));
    assert!(list.iter().all(|c| c.provenance == Provenance::Authoritative));

    let wrapped = json!({ "matches": [{ "email": "c@x.com", "match_score": 61.5 }] });
    let list = decode_candidates(&wrapped, Provenance::Inferred).unwrap();
    assert_eq!(list[0].scores.score, Some(61.5));

    assert!(decode_candidates(&json!({ "other": [] }), Provenance::Inferred).is_err());
    assert!(decode_candidates(&json!(null), Provenance::Inferred).is_err());
}
