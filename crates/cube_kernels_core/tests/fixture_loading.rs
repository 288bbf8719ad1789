use cube_kernels_core::{
    Fixture, FixtureError, GatewayError, InMemoryRemoteStore, PlacementEngine, RemoteStore,
    Resource, SeedSummary,
};
use std::io::Write;

const FIXTURE: &str = r#"{
  "cards": [
    {"id": 10, "scryfall_id": "0b9a1a4e-2f33-4d1c-9d0e-2a6f1c0e0a10", "name": "Ponder", "cmc": 1.0, "color_identity": ["U"]},
    {"id": 11, "scryfall_id": "0b9a1a4e-2f33-4d1c-9d0e-2a6f1c0e0a11", "name": "Mind Stone", "cmc": 2.0},
    {"id": 12, "scryfall_id": "0b9a1a4e-2f33-4d1c-9d0e-2a6f1c0e0a12", "name": "Shock", "cmc": 1.0, "color_identity": ["R"]},
    {"id": 13, "scryfall_id": "0b9a1a4e-2f33-4d1c-9d0e-2a6f1c0e0a13", "name": "Izzet Charm", "cmc": 2.0, "color_identity": ["U", "R"]}
  ],
  "kernels": [
    {"name": "Cantrips", "cards": [10]},
    {"name": "Spells", "cards": [12, 13]},
    {"name": "Empty"}
  ]
}"#;

fn write_fixture(body: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(body.as_bytes()).unwrap();
    file
}

#[tokio::test]
async fn fixture_file_seeds_kernels_and_pool() {
    let file = write_fixture(FIXTURE);
    let fixture = Fixture::load(file.path()).unwrap();
    let store = InMemoryRemoteStore::new();

    let summary = fixture.seed(&store).await.unwrap();
    assert_eq!(
        summary,
        SeedSummary {
            cards: 4,
            kernels: 3,
            placed: 3
        }
    );

    let engine = PlacementEngine::new(store);
    engine.refresh().await.unwrap();
    let board = engine.board();
    board.validate().unwrap();

    let layout = board
        .kernels()
        .iter()
        .map(|kernel| (kernel.name.as_str(), kernel.card_ids()))
        .collect::<Vec<_>>();
    assert_eq!(
        layout,
        vec![
            ("Cantrips", vec![10]),
            ("Spells", vec![12, 13]),
            ("Empty", vec![])
        ]
    );
    let pool = board
        .candidates()
        .iter()
        .map(|candidate| candidate.card.id)
        .collect::<Vec<_>>();
    assert_eq!(pool, vec![11]);
}

#[tokio::test]
async fn seeded_cards_carry_derived_sort_fields() {
    let store = InMemoryRemoteStore::new();
    Fixture::parse(FIXTURE).unwrap().seed(&store).await.unwrap();

    let charm = store.get_card(13).await.unwrap();
    assert_eq!(charm.num_colors, Some(2));
    assert_eq!(charm.color_sort_key.as_deref(), Some("UR"));
    assert_eq!(store.card_count().unwrap(), 4);
}

#[test]
fn missing_fixture_file_reports_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.json");

    match Fixture::load(&path) {
        Err(FixtureError::Io { path: reported, .. }) => assert_eq!(reported, path),
        other => panic!("expected io error, got {other:?}"),
    }
}

#[test]
fn malformed_fixture_is_a_parse_error() {
    let file = write_fixture(r#"{"cards": [{"id": 1}]}"#);
    assert!(matches!(
        Fixture::load(file.path()),
        Err(FixtureError::Parse(_))
    ));
}

#[tokio::test]
async fn fixture_referencing_unknown_card_fails_to_seed() {
    let fixture = Fixture::parse(
        r#"{"cards": [], "kernels": [{"name": "Ghosts", "cards": [404]}]}"#,
    )
    .unwrap();
    let store = InMemoryRemoteStore::new();

    match fixture.seed(&store).await {
        Err(FixtureError::Seed(GatewayError::NotFound { resource, id })) => {
            assert_eq!(resource, Resource::Card);
            assert_eq!(id, 404);
        }
        other => panic!("expected seed error, got {other:?}"),
    }
}

#[tokio::test]
async fn fixture_cards_need_positive_ids() {
    let fixture = Fixture::parse(
        r#"{
          "cards": [
            {"id": 1, "scryfall_id": "0b9a1a4e-2f33-4d1c-9d0e-2a6f1c0e0a01", "name": "Opt"},
            {"id": 0, "scryfall_id": "0b9a1a4e-2f33-4d1c-9d0e-2a6f1c0e0a02", "name": "Ponder"}
          ],
          "kernels": [{"name": "Cantrips", "cards": [1]}]
        }"#,
    )
    .unwrap();
    let store = InMemoryRemoteStore::new();

    assert!(matches!(
        fixture.seed(&store).await,
        Err(FixtureError::InvalidCardId(0))
    ));
    assert_eq!(store.card_count().unwrap(), 0);
    assert!(store.list_kernels().await.unwrap().is_empty());
}
