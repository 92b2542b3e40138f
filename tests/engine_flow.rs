use social_graph_engine::codec::{container, decode, encode};
use social_graph_engine::feed::{FeedRanker, Post};
use social_graph_engine::graph::algorithms::Cancellation;
use social_graph_engine::predict::PredictionSource;
use social_graph_engine::{
    CaseSensitivity, Config, Direction, EngineError, GraphStore, SocialEngine, User,
};

fn community() -> SocialEngine {
    let mut engine = SocialEngine::new(Config::default()).unwrap();
    let names = [
        "alan", "albert", "alice", "bob", "carol", "dave", "erin", "frank", "grace", "heidi",
    ];
    for (i, name) in names.iter().enumerate() {
        engine.add_user(User::new(i as u64 + 1, *name)).unwrap();
    }

    // two friend circles joined by 5 -> 6
    let edges = [
        (1, 2),
        (2, 1),
        (1, 3),
        (3, 4),
        (4, 1),
        (2, 4),
        (5, 3),
        (5, 6),
        (6, 7),
        (7, 8),
        (8, 6),
        (9, 7),
        (9, 8),
    ];
    for (a, b) in edges {
        engine.follow(a, b).unwrap();
    }
    engine.add_interests(1, ["music", "chess"]).unwrap();
    engine.add_interests(7, ["music", "chess"]).unwrap();
    engine
}

#[test]
fn separation_is_symmetric_and_zero_on_self() {
    let engine = community();
    for a in 1..=10 {
        assert_eq!(engine.degree_of_separation(a, a).unwrap(), Some(0));
        for b in 1..=10 {
            assert_eq!(
                engine.degree_of_separation(a, b).unwrap(),
                engine.degree_of_separation(b, a).unwrap()
            );
        }
    }
    assert_eq!(engine.degree_of_separation(1, 7).unwrap(), Some(4));
    assert_eq!(engine.degree_of_separation(1, 10).unwrap(), None);
    assert!(matches!(
        engine.degree_of_separation(1, 77),
        Err(EngineError::NotFound(_))
    ));
}

#[test]
fn centrality_is_bounded() {
    let engine = community();
    for id in 1..=10 {
        let c = engine.centrality(id).unwrap();
        assert!((0.0..=1.0).contains(&c));
    }
    assert_eq!(engine.centrality(10).unwrap(), 0.0);
}

#[test]
fn graph_view_carries_closeness_unless_cancelled() {
    let engine = community();
    let cancel = Cancellation::new();
    let view = engine.graph_view_cancellable(Some(1), &cancel).unwrap();
    assert_eq!(view.nodes.len(), 10);
    assert!(view.nodes.iter().all(|n| n.closeness >= 0.0));
    let isolated = view.nodes.iter().find(|n| n.id == 10).unwrap();
    assert_eq!(isolated.closeness, 0.0);

    cancel.cancel();
    assert!(matches!(
        engine.graph_view_cancellable(Some(1), &cancel),
        Err(EngineError::Cancelled)
    ));
}

#[test]
fn adjacency_matrix_agrees_with_edge_sets() {
    let engine = community();
    let store = engine.store();
    let adjacency = store.adjacency_matrix();
    for a in store.user_ids() {
        for b in store.user_ids() {
            let (i, j) = (adjacency.index_of(a).unwrap(), adjacency.index_of(b).unwrap());
            assert_eq!(adjacency.matrix[[i, j]] == 1, store.is_following(a, b));
        }
    }
}

#[test]
fn follow_rejects_self_loops_and_duplicates() {
    let mut engine = community();
    assert!(matches!(engine.follow(3, 3), Err(EngineError::InvalidEdge { .. })));
    assert!(matches!(engine.follow(1, 2), Err(EngineError::InvalidEdge { .. })));
    assert!(matches!(engine.unfollow(1, 9), Err(EngineError::NotFound(_))));

    engine.unfollow(1, 2).unwrap();
    assert!(!engine.store().is_following(1, 2));
    assert!(engine.store().neighbors(2, Direction::Incoming).unwrap().is_empty());
}

#[test]
fn removing_a_user_drops_edges_and_suggestions() {
    let mut engine = community();
    let edges_before = engine.store().edge_count();
    engine.remove_user(1).unwrap();

    assert_eq!(engine.store().edge_count(), edges_before - 4);
    assert_eq!(engine.suggest_usernames("al"), vec!["albert", "alice"]);
    assert!(!engine.store().is_following(4, 1));
    assert!(matches!(engine.remove_user(1), Err(EngineError::NotFound(_))));
}

#[test]
fn autocomplete_respects_case_policy_and_limit() {
    let mut config = Config::default();
    config.autocomplete_limit = 2;
    let mut engine = SocialEngine::new(config).unwrap();
    for (id, name) in [(1, "Alan"), (2, "albert"), (3, "alfred"), (4, "bob")] {
        engine.add_user(User::new(id, name)).unwrap();
    }
    assert_eq!(engine.suggest_usernames("AL"), vec!["Alan", "albert"]);
    assert_eq!(engine.suggest_usernames_limited("al", 10).len(), 3);
    assert!(engine.suggest_usernames("z").is_empty());

    let sensitive = Config::new(1.0, 0.1, 0.6, 5, 10, CaseSensitivity::Sensitive).unwrap();
    let mut engine = SocialEngine::new(sensitive).unwrap();
    engine.add_user(User::new(1, "Alan")).unwrap();
    engine.add_user(User::new(2, "alan")).unwrap();
    assert_eq!(engine.suggest_usernames("a"), vec!["alan"]);
}

#[test]
fn recommendations_exclude_self_and_followed() {
    let mut engine = community();
    assert_eq!(engine.prediction_source().unwrap(), PredictionSource::Knn);

    let recs = engine.recommend(1, 10).unwrap();
    assert!(!recs.is_empty());
    for rec in &recs {
        assert_ne!(rec.candidate, 1);
        assert!(!engine.store().is_following(1, rec.candidate));
        assert!((0.0..=1.0).contains(&rec.probability));
    }

    let similar = engine.similar_users(1).unwrap();
    assert!(similar.iter().all(|c| c.user != 1 && c.user != 2 && c.user != 3));
    // shared interests lift 7 above the unrelated users
    let seven = similar.iter().position(|c| c.user == 7).unwrap();
    let ten = similar.iter().position(|c| c.user == 10).unwrap();
    assert!(seven < ten);
}

#[test]
fn sparse_graph_falls_back_to_hybrid_ranking() {
    let mut engine = SocialEngine::new(Config::default()).unwrap();
    for id in 1..=4 {
        engine.add_user(User::new(id, format!("user{}", id))).unwrap();
    }
    engine.follow(1, 2).unwrap();

    let recs = engine.recommend(3, 5).unwrap();
    assert!(recs.iter().all(|p| p.source == PredictionSource::Fallback));
    let prediction = engine.predict(3, 2).unwrap();
    assert_eq!(prediction.probability, prediction.hybrid_score);
}

#[test]
fn hybrid_score_reflects_new_follows() {
    let mut engine = community();
    // no shared followees, identical interests
    let before = engine.hybrid_score(1, 7).unwrap();
    assert!((before - 0.4).abs() < 1e-12);

    engine.follow(7, 2).unwrap();
    let after = engine.hybrid_score(1, 7).unwrap();
    assert!((after - (0.6 / 3.0 + 0.4)).abs() < 1e-12);
}

#[test]
fn feed_is_stable_for_equal_scores() {
    let store = {
        let mut store = GraphStore::new();
        store.add_user(User::new(1, "reader")).unwrap();
        store.add_user(User::new(2, "writer")).unwrap();
        store.follow(1, 2).unwrap();
        store
    };
    let ranker = FeedRanker::from_config(&Config::default());
    let posts: Vec<Post> = (1..=6).map(|id| Post::new(id, 2, 0)).collect();
    let feed = ranker.feed_for(&store, 1, posts, 7200).unwrap();
    assert_eq!(
        feed.iter().map(|r| r.post.id).collect::<Vec<_>>(),
        vec![1, 2, 3, 4, 5, 6]
    );
}

#[test]
fn codec_edge_cases_round_trip() {
    for input in [&b""[..], &b"a"[..], &b"aaaaaaaa"[..], &b"abracadabra"[..]] {
        let payload = encode(input).unwrap();
        assert_eq!(decode(&payload).unwrap(), input);
        assert_eq!(container::decompress(&container::compress(input).unwrap()).unwrap(), input);
    }

    let mut blob = container::compress(b"hello world").unwrap().to_vec();
    blob.truncate(blob.len() - 1);
    assert!(matches!(
        container::decompress(&blob),
        Err(EngineError::MalformedPayload(_))
    ));
}
