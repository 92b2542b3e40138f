use std::fs;
use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};

use social_graph_engine::codec::{container, huffman};
use social_graph_engine::data::{self, ContentStore, SocialRepository};
use social_graph_engine::graph::algorithms;
use social_graph_engine::graph::unix_now;
use social_graph_engine::predict::Voting;
use social_graph_engine::present::{FeedView, RecommendationView};
use social_graph_engine::storage::{self, ExportBundle};
use social_graph_engine::{CaseSensitivity, Config, Direction, SocialEngine, UserId};

#[derive(Parser, Debug)]
#[clap(
    name = "social-graph-engine",
    about = "Graph analytics, search, feed ranking and follow recommendation over a social graph snapshot"
)]
struct Cli {
    /// Path to input snapshot JSON file
    #[clap(long, global = true)]
    input: Option<PathBuf>,

    /// JSON configuration file; missing keys keep their defaults
    #[clap(long, global = true)]
    config: Option<PathBuf>,

    /// Jaccard share of the hybrid similarity score
    #[clap(long, global = true)]
    alpha: Option<f64>,

    /// Neighbours consulted by the KNN predictor
    #[clap(long, global = true)]
    k: Option<usize>,

    /// Weight KNN votes by inverse distance
    #[clap(long, global = true)]
    weighted: bool,

    /// Match usernames case-sensitively
    #[clap(long, global = true)]
    case_sensitive: bool,

    /// Number of worker threads (0 = use all available cores)
    #[clap(long, default_value = "0", global = true)]
    threads: usize,

    /// Verbose logging
    #[clap(long, short, global = true)]
    verbose: bool,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print graph summary statistics
    Stats,

    /// Degrees of separation between two users (ids or usernames)
    Separation { from: String, to: String },

    /// Shortest follow path from one user to another
    Path {
        from: String,
        to: String,

        /// Walk follows in either direction
        #[clap(long)]
        undirected: bool,
    },

    /// Autocomplete usernames
    Search {
        prefix: String,

        #[clap(long)]
        limit: Option<usize>,
    },

    /// Ranked feed for a user
    Feed {
        user: String,

        /// Ranking time as unix seconds (defaults to now)
        #[clap(long)]
        now: Option<i64>,

        #[clap(long, default_value = "20")]
        limit: usize,

        /// Include decompressed post bodies
        #[clap(long)]
        bodies: bool,
    },

    /// Follow recommendations for a user
    Recommend {
        user: String,

        #[clap(long, default_value = "10")]
        limit: usize,

        /// Report accuracy on this held-out share of the bootstrap data
        #[clap(long)]
        holdout: Option<f64>,
    },

    /// Huffman-compress a file
    Compress { source: PathBuf, output: PathBuf },

    /// Restore a file written by `compress`
    Decompress { source: PathBuf, output: PathBuf },

    /// Write summary, graph view, feed and recommendations as JSON
    Export {
        user: String,

        /// Output directory for results
        #[clap(long, default_value = "results")]
        output_dir: PathBuf,

        /// Number of recommendations to include
        #[clap(long, default_value = "10")]
        limit: usize,
    },
}

fn load_config(args: &Cli) -> Result<Config> {
    let mut config = match &args.config {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            serde_json::from_str(&text).context("parsing config JSON")?
        }
        None => Config::default(),
    };

    if let Some(alpha) = args.alpha {
        config.alpha = alpha;
    }
    if let Some(k) = args.k {
        config.k = k;
    }
    if args.weighted {
        config.voting = Voting::InverseDistance;
    }
    if args.case_sensitive {
        config.case_sensitivity = CaseSensitivity::Sensitive;
    }
    config.validate()?;
    Ok(config)
}

fn load_repository(args: &Cli) -> Result<data::MemoryRepository> {
    let input = args
        .input
        .as_ref()
        .ok_or_else(|| anyhow!("--input <snapshot.json> is required for this command"))?;
    data::load_snapshot(input)
}

/// Accept either a numeric id or a username
fn resolve_user(engine: &SocialEngine, name: &str) -> Result<UserId> {
    if let Some(user) = engine.user_by_username(name) {
        return Ok(user.id);
    }
    let id: UserId = name
        .parse()
        .map_err(|_| anyhow!("unknown user: {}", name))?;
    if !engine.store().contains(id) {
        return Err(anyhow!("unknown user: {}", name));
    }
    Ok(id)
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn main() -> Result<()> {
    // Parse command line arguments
    let args = Cli::parse();

    // Configure logging
    let log_level = if args.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    env_logger::Builder::new()
        .filter_level(log_level)
        .format_timestamp_millis()
        .init();

    // Set number of threads
    let num_threads = if args.threads > 0 {
        args.threads
    } else {
        num_cpus::get()
    };

    log::debug!("Using {} worker threads", num_threads);
    rayon::ThreadPoolBuilder::new()
        .num_threads(num_threads)
        .build_global()?;

    // Codec commands need no snapshot
    match &args.command {
        Command::Compress { source, output } => {
            let content = fs::read(source)?;
            let payload = huffman::encode(&content)?;
            log::debug!("Compression ratio {:.3}", payload.compression_ratio());
            let blob = container::to_blob(&payload);
            fs::write(output, &blob)?;
            log::info!(
                "Compressed {} bytes to {} bytes ({})",
                content.len(),
                blob.len(),
                output.display()
            );
            return Ok(());
        }
        Command::Decompress { source, output } => {
            let blob = fs::read(source)?;
            let content = container::decompress(&blob)?;
            fs::write(output, &content)?;
            log::info!("Restored {} bytes to {}", content.len(), output.display());
            return Ok(());
        }
        _ => {}
    }

    let config = load_config(&args)?;
    let repo = load_repository(&args)?;
    let (mut engine, report) = SocialEngine::from_repository(config, &repo)?;
    if report.skipped() > 0 {
        log::info!("{} snapshot records were skipped", report.skipped());
    }

    match &args.command {
        Command::Stats => print_json(&engine.summary())?,

        Command::Separation { from, to } => {
            let a = resolve_user(&engine, from)?;
            let b = resolve_user(&engine, to)?;
            match engine.degree_of_separation(a, b)? {
                Some(hops) => println!("{}", hops),
                None => println!("unreachable"),
            }
        }

        Command::Path {
            from,
            to,
            undirected,
        } => {
            let a = resolve_user(&engine, from)?;
            let b = resolve_user(&engine, to)?;
            let direction = if *undirected {
                Direction::Both
            } else {
                Direction::Outgoing
            };
            let path = algorithms::shortest_path(&engine.snapshot(), a, b, direction)?;
            if path.is_empty() {
                println!("unreachable");
            } else {
                let names: Vec<String> = path
                    .iter()
                    .map(|id| {
                        engine
                            .store()
                            .user(*id)
                            .map(|u| u.username.clone())
                            .unwrap_or_else(|_| id.to_string())
                    })
                    .collect();
                println!("{}", names.join(" -> "));
            }
        }

        Command::Search { prefix, limit } => {
            let suggestions = match limit {
                Some(limit) => engine.suggest_usernames_limited(prefix, *limit),
                None => engine.suggest_usernames(prefix),
            };
            for username in suggestions {
                println!("{}", username);
            }
        }

        Command::Feed {
            user,
            now,
            limit,
            bodies,
        } => {
            let viewer = resolve_user(&engine, user)?;
            let mut feed = engine.feed(viewer, repo.posts()?, now.unwrap_or_else(unix_now))?;
            feed.truncate(*limit);

            if *bodies {
                let content = ContentStore::new(repo);
                for ranked in &feed {
                    let body = match &ranked.post.content {
                        Some(reference) => content.get_text(reference)?,
                        None => String::new(),
                    };
                    println!("[{:.2}] post {}: {}", ranked.score, ranked.post.id, body);
                }
            } else {
                print_json(&FeedView {
                    viewer,
                    posts: feed,
                })?;
            }
        }

        Command::Recommend {
            user,
            limit,
            holdout,
        } => {
            let id = resolve_user(&engine, user)?;
            if let Some(ratio) = holdout {
                match engine.evaluate_holdout(*ratio)? {
                    Some(report) => log::info!(
                        "Held-out accuracy {:.3} ({} train / {} test)",
                        report.accuracy,
                        report.train_size,
                        report.test_size
                    ),
                    None => log::info!("Not enough data to evaluate the KNN model"),
                }
            }
            let recommendations = engine.recommend(id, *limit)?;
            print_json(&RecommendationView {
                user: id,
                recommendations,
            })?;
        }

        Command::Export {
            user,
            output_dir,
            limit,
        } => {
            let id = resolve_user(&engine, user)?;
            let feed = engine.feed(id, repo.posts()?, unix_now())?;
            let recommendations = engine.recommend(id, *limit)?;
            let bundle = ExportBundle {
                summary: engine.summary(),
                view: engine.graph_view(Some(id))?,
                feed: FeedView {
                    viewer: id,
                    posts: feed,
                },
                recommendations: RecommendationView {
                    user: id,
                    recommendations,
                },
            };
            let written = storage::save_results(&bundle, output_dir)?;
            log::info!("Export complete: {} files in {}", written.len(), output_dir.display());
        }

        Command::Compress { .. } | Command::Decompress { .. } => {}
    }

    Ok(())
}
