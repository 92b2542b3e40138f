//! Engine facade: keeps the graph, username index, similarity cache and
//! predictor consistent as user and follow events arrive.

use std::collections::{HashMap, HashSet};

use crate::config::Config;
use crate::data::SocialRepository;
use crate::error::{EngineError, Result};
use crate::feed::{FeedRanker, Post, RankedPost};
use crate::graph::algorithms::{influence_scores, Cancellation};
use crate::graph::builder::{BuildReport, GraphBuilder};
use crate::graph::{CompressedGraph, GraphStore, Timestamp, User, UserId};
use crate::predict::{
    Evaluation, FeatureExtractor, LabeledExample, Prediction, PredictionSource, Predictor,
};
use crate::present::{GraphSummary, GraphView};
use crate::search::UsernameTrie;
use crate::similarity::{InteractionIndex, ScoredCandidate, SimilarityEngine};

/// How the current model was trained
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Training {
    /// Bootstrapped at the given (graph generation, interaction revision)
    Bootstrap(u64, u64),

    /// Fitted on caller-supplied history; kept until replaced
    Supplied,
}

/// Single-writer owner of all mutable engine state
pub struct SocialEngine {
    config: Config,
    store: GraphStore,
    trie: UsernameTrie,
    interactions: InteractionIndex,
    similarity: SimilarityEngine,
    predictor: Predictor,
    training: Option<Training>,
}

impl SocialEngine {
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            trie: UsernameTrie::new(config.case_sensitivity),
            similarity: SimilarityEngine::from_config(&config)?,
            predictor: Predictor::from_config(&config),
            store: GraphStore::new(),
            interactions: InteractionIndex::new(),
            training: None,
            config,
        })
    }

    /// Populate an engine from persisted records, skipping rows the live
    /// store would reject
    pub fn from_repository<R: SocialRepository + ?Sized>(
        config: Config,
        repo: &R,
    ) -> anyhow::Result<(Self, BuildReport)> {
        let users = repo.users()?;
        let follows = repo.follows()?;
        let mut engine = Self::new(config)?;

        // Usernames that collide under the case policy are dropped like
        // duplicate ids, so the index and the store hold the same users
        let mut seen = HashSet::with_capacity(users.len());
        let mut rejected = 0;
        let accepted: Vec<User> = users
            .into_iter()
            .filter(|user| {
                if !seen.insert(user.id) {
                    return true;
                }
                match engine.trie.insert(&user.username) {
                    Ok(()) => true,
                    Err(err) => {
                        log::warn!("Skipping user {}: {}", user.id, err);
                        seen.remove(&user.id);
                        rejected += 1;
                        false
                    }
                }
            })
            .collect();

        let mut builder = GraphBuilder::with_capacity(accepted.len(), follows.len());
        builder.extend_users(accepted).extend_edges(follows);
        let (store, mut report) = builder.build();
        report.duplicate_users += rejected;

        for (user, interests) in repo.interests()? {
            if store.contains(user) {
                engine.interactions.add_interests(user, interests);
            }
        }
        engine.store = store;

        log::info!(
            "Engine ready: {} users, {} follows, {} indexed usernames",
            engine.store.user_count(),
            engine.store.edge_count(),
            engine.trie.len()
        );
        Ok((engine, report))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &GraphStore {
        &self.store
    }

    pub fn interactions(&self) -> &InteractionIndex {
        &self.interactions
    }

    pub fn similarity(&self) -> &SimilarityEngine {
        &self.similarity
    }

    pub fn username_index(&self) -> &UsernameTrie {
        &self.trie
    }

    // User and follow events

    pub fn add_user(&mut self, user: User) -> Result<()> {
        self.trie.insert(&user.username)?;
        let username = user.username.clone();
        if let Err(err) = self.store.add_user(user) {
            self.trie.remove(&username)?;
            return Err(err);
        }
        Ok(())
    }

    pub fn remove_user(&mut self, id: UserId) -> Result<User> {
        let user = self.store.remove_user(id)?;
        if self.trie.lookup(&user.username) == Some(user.username.as_str()) {
            self.trie.remove(&user.username)?;
        } else {
            log::warn!("Removed user {} was not indexed", id);
        }
        self.interactions.remove_user(id);
        Ok(user)
    }

    pub fn follow(&mut self, follower: UserId, followee: UserId) -> Result<()> {
        self.store.follow(follower, followee)
    }

    pub fn follow_at(&mut self, follower: UserId, followee: UserId, at: Timestamp) -> Result<()> {
        self.store.follow_at(follower, followee, at)
    }

    pub fn unfollow(&mut self, follower: UserId, followee: UserId) -> Result<()> {
        self.store.unfollow(follower, followee)
    }

    pub fn add_interests<I, S>(&mut self, user: UserId, interests: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        if !self.store.contains(user) {
            return Err(EngineError::user_not_found(user));
        }
        self.interactions.add_interests(user, interests);
        Ok(())
    }

    pub fn record_interaction(&mut self, user: UserId, key: &str, weight: f64) -> Result<()> {
        if !self.store.contains(user) {
            return Err(EngineError::user_not_found(user));
        }
        self.interactions.record(user, key, weight);
        Ok(())
    }

    // Queries

    /// Username lookup under the configured case policy
    pub fn user_by_username(&self, username: &str) -> Option<&User> {
        self.store.user_by_username(username).or_else(|| {
            self.trie
                .lookup(username)
                .and_then(|stored| self.store.user_by_username(stored))
        })
    }

    /// Up to `autocomplete_limit` usernames starting with `prefix`
    pub fn suggest_usernames(&self, prefix: &str) -> Vec<String> {
        self.suggest_usernames_limited(prefix, self.config.autocomplete_limit)
    }

    pub fn suggest_usernames_limited(&self, prefix: &str, limit: usize) -> Vec<String> {
        self.trie
            .autocomplete(prefix, limit)
            .map(str::to_string)
            .collect()
    }

    pub fn degree_of_separation(&self, a: UserId, b: UserId) -> Result<Option<usize>> {
        self.store.degree_of_separation(a, b)
    }

    pub fn centrality(&self, id: UserId) -> Result<f64> {
        self.store.centrality(id)
    }

    pub fn snapshot(&self) -> CompressedGraph {
        self.store.snapshot()
    }

    pub fn summary(&self) -> GraphSummary {
        GraphSummary::from_graph(&self.snapshot())
    }

    pub fn graph_view(&self, viewer: Option<UserId>) -> Result<GraphView> {
        GraphView::build(&self.snapshot(), viewer)
    }

    /// Graph view whose closeness sweep stops once `cancel` is set
    pub fn graph_view_cancellable(
        &self,
        viewer: Option<UserId>,
        cancel: &Cancellation,
    ) -> Result<GraphView> {
        GraphView::build_cancellable(&self.snapshot(), viewer, Some(cancel))
    }

    fn ranker(&self) -> FeedRanker {
        if self.config.influence_weight == 0.0 {
            return FeedRanker::from_config(&self.config);
        }

        let graph = self.snapshot();
        let influence: HashMap<UserId, f64> = influence_scores(&graph)
            .into_iter()
            .enumerate()
            .map(|(node, score)| (graph.id_of(node), score))
            .collect();
        FeedRanker::with_influence(&self.config, influence)
    }

    /// Rank posts by users `viewer` follows
    pub fn feed<I>(&self, viewer: UserId, posts: I, now: Timestamp) -> Result<Vec<RankedPost>>
    where
        I: IntoIterator<Item = Post>,
    {
        self.ranker().feed_for(&self.store, viewer, posts, now)
    }

    pub fn hybrid_score(&self, a: UserId, b: UserId) -> Result<f64> {
        self.similarity
            .cached_hybrid_score(&self.store, &self.interactions, a, b)
    }

    /// Unfollowed users ranked by hybrid similarity alone
    pub fn similar_users(&self, user: UserId) -> Result<Vec<ScoredCandidate>> {
        self.similarity
            .rank_candidates(&self.store, &self.interactions, user)
    }

    // Prediction

    fn stamp(&self) -> (u64, u64) {
        (self.store.generation(), self.interactions.revision())
    }

    /// Re-bootstrap the model if the graph or interactions changed since
    /// the last bootstrap
    fn ensure_trained(&mut self) -> Result<()> {
        let (generation, revision) = self.stamp();
        match self.training {
            Some(Training::Supplied) => return Ok(()),
            Some(Training::Bootstrap(g, r)) if g == generation && r == revision => return Ok(()),
            _ => {}
        }

        let extractor = FeatureExtractor::new(
            &self.store,
            &self.interactions,
            &self.similarity,
            self.config.max_separation,
        );
        self.predictor.train(&extractor)?;
        self.training = Some(Training::Bootstrap(generation, revision));
        Ok(())
    }

    /// Train on caller-supplied labeled history instead of bootstrapping
    pub fn train_on(&mut self, examples: Vec<LabeledExample>) -> Result<PredictionSource> {
        let source = self.predictor.train_on(examples)?;
        self.training = Some(Training::Supplied);
        Ok(source)
    }

    /// Return to bootstrapped training on the next prediction
    pub fn clear_training(&mut self) {
        self.predictor.reset();
        self.training = None;
    }

    pub fn prediction_source(&mut self) -> Result<PredictionSource> {
        self.ensure_trained()?;
        Ok(self.predictor.source())
    }

    pub fn predict(&mut self, user: UserId, candidate: UserId) -> Result<Prediction> {
        self.ensure_trained()?;
        let extractor = FeatureExtractor::new(
            &self.store,
            &self.interactions,
            &self.similarity,
            self.config.max_separation,
        );
        self.predictor.predict(&extractor, user, candidate)
    }

    pub fn recommend(&mut self, user: UserId, limit: usize) -> Result<Vec<Prediction>> {
        self.ensure_trained()?;
        let extractor = FeatureExtractor::new(
            &self.store,
            &self.interactions,
            &self.similarity,
            self.config.max_separation,
        );
        self.predictor.recommend(&extractor, user, limit)
    }

    /// Bootstrap, fit on `1 - ratio` of the examples and score the rest
    pub fn evaluate_holdout(&mut self, ratio: f64) -> Result<Option<Evaluation>> {
        let stamp = self.stamp();
        let extractor = FeatureExtractor::new(
            &self.store,
            &self.interactions,
            &self.similarity,
            self.config.max_separation,
        );
        let evaluation = self.predictor.train_with_holdout(&extractor, ratio)?;
        self.training = Some(Training::Bootstrap(stamp.0, stamp.1));
        Ok(evaluation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CaseSensitivity;
    use crate::data::MemoryRepository;
    use crate::graph::FollowEdge;

    fn engine_with(names: &[&str]) -> SocialEngine {
        let mut engine = SocialEngine::new(Config::default()).unwrap();
        for (i, name) in names.iter().enumerate() {
            engine.add_user(User::new(i as u64 + 1, *name)).unwrap();
        }
        engine
    }

    #[test]
    fn username_index_follows_user_events() {
        let mut engine = engine_with(&["alan", "albert", "bob"]);
        assert_eq!(engine.suggest_usernames("al"), vec!["alan", "albert"]);

        engine.remove_user(1).unwrap();
        assert_eq!(engine.suggest_usernames("al"), vec!["albert"]);

        // case-insensitive collision leaves both structures untouched
        let err = engine.add_user(User::new(9, "BOB")).unwrap_err();
        assert!(matches!(err, EngineError::DuplicateUsername(_)));
        assert!(!engine.store().contains(9));

        // id collision rolls the index back
        assert!(engine.add_user(User::new(2, "carol")).is_err());
        assert!(engine.suggest_usernames("car").is_empty());
    }

    #[test]
    fn recommendations_track_follow_events() {
        let mut engine = engine_with(&["a", "b", "c"]);
        engine.follow(1, 2).unwrap();

        // one edge and two sampled non-edges, fewer than k = 5
        assert_eq!(engine.prediction_source().unwrap(), PredictionSource::Fallback);
        let recs = engine.recommend(1, 5).unwrap();
        assert_eq!(recs.iter().map(|p| p.candidate).collect::<Vec<_>>(), vec![3]);

        engine.follow(1, 3).unwrap();
        assert!(engine.recommend(1, 5).unwrap().is_empty());
    }

    #[test]
    fn from_repository_indexes_users_and_interests() {
        let mut repo = MemoryRepository::new();
        repo.add_user(User::new(1, "Alice"));
        repo.add_user(User::new(2, "alice"));
        repo.add_user(User::new(3, "bob"));
        repo.add_follow(FollowEdge {
            follower: 1,
            followee: 3,
            created_at: 0,
        });
        repo.add_follow(FollowEdge {
            follower: 3,
            followee: 3,
            created_at: 0,
        });
        repo.set_interests(1, vec!["chess".into()]);
        repo.set_interests(3, vec!["chess".into()]);

        let (mut engine, report) =
            SocialEngine::from_repository(Config::default(), &repo).unwrap();
        assert_eq!(report.users, 2);
        assert_eq!(report.duplicate_users, 1);
        assert_eq!(report.self_loops, 1);
        assert!(!engine.store().contains(2));
        assert_eq!(engine.username_index().len(), 2);
        assert!((engine.interactions().cosine(1, 3) - 1.0).abs() < 1e-12);

        // the surviving spelling stays searchable
        assert!(matches!(engine.remove_user(2), Err(EngineError::NotFound(_))));
        assert_eq!(engine.suggest_usernames("al"), vec!["Alice"]);
    }

    #[test]
    fn username_lookup_follows_case_policy() {
        let engine = engine_with(&["Alice", "bob"]);
        assert_eq!(engine.user_by_username("ALICE").map(|u| u.id), Some(1));
        assert_eq!(engine.user_by_username("Bob").map(|u| u.id), Some(2));
        assert!(engine.user_by_username("al").is_none());

        let mut sensitive = Config::default();
        sensitive.case_sensitivity = CaseSensitivity::Sensitive;
        let mut engine = SocialEngine::new(sensitive).unwrap();
        engine.add_user(User::new(1, "Alice")).unwrap();
        assert!(engine.user_by_username("alice").is_none());
    }

    #[test]
    fn feed_ranks_followed_authors() {
        let mut engine = engine_with(&["a", "b", "c"]);
        engine.follow(1, 2).unwrap();
        let posts = vec![
            Post::new(1, 2, 0).with_engagement(1, 0, 0),
            Post::new(2, 2, 0).with_engagement(5, 0, 0),
            Post::new(3, 3, 0).with_engagement(50, 0, 0),
        ];
        let feed = engine.feed(1, posts, 3600).unwrap();
        assert_eq!(feed.iter().map(|r| r.post.id).collect::<Vec<_>>(), vec![2, 1]);
    }
}
