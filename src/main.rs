use std::{sync::Arc, time::Duration};

use moviedex::{
    config::Config,
    db,
    flows::{SearchMovieFlow, SearchMovieState, TitleSearchFlow, TitleSearchState},
    omdb::{MovieApi, OmdbClient},
    repo::MovieRepository,
    store::MovieStore,
};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "info,moviedex=debug,sqlx=warn".to_string()),
        )
        .init();

    let config = Config::from_env()?;

    let http = reqwest::Client::builder()
        .user_agent("moviedex/0.1")
        .timeout(Duration::from_secs(30))
        .build()?;

    let database = db::connect_and_migrate(&config.database_url).await?;
    let store = MovieStore::new(database);

    let api: Arc<dyn MovieApi> =
        Arc::new(OmdbClient::new(http, config.omdb_api_key.clone(), config.omdb_base_url.clone()));
    let repo = MovieRepository::new(store.clone(), api);

    // Startup maintenance, same as the app runs on launch.
    let removed = repo.remove_duplicate_movies().await?;
    if removed > 0 {
        info!(removed, "collapsed duplicate titles on startup");
    }

    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.first().map(String::as_str) {
        Some("seed") => {
            repo.add_predefined_movies_if_not_exists().await?;
            info!("seed list loaded");
        }
        Some("list") => {
            for movie in store.all_movies_snapshot().await? {
                println!("{:>4}  {}  ({})", movie.id, movie.title, movie.year);
            }
        }
        Some("fetch") if args.len() > 1 => {
            let title = args[1..].join(" ");
            let flow = SearchMovieFlow::new(repo.clone());
            flow.search(&title).await;
            match flow.state() {
                SearchMovieState::Success(movie) => {
                    println!("{} ({}): {}", movie.title, movie.year, movie.plot);
                    flow.save().await;
                    match flow.state() {
                        SearchMovieState::SaveSuccess(_) => info!(title = %title, "saved to library"),
                        SearchMovieState::Error(msg) => warn!(error = %msg, "save failed"),
                        _ => {}
                    }
                }
                SearchMovieState::Error(msg) => warn!(error = %msg, "fetch failed"),
                _ => {}
            }
        }
        Some("search") if args.len() > 1 => {
            let term = args[1..].join(" ");
            let flow = TitleSearchFlow::new(repo.clone());
            flow.search(&term).await;
            match flow.state() {
                TitleSearchState::Success(items) => {
                    for item in items {
                        println!("{}  {} ({})", item.imdb_id, item.title, item.year);
                    }
                }
                TitleSearchState::Error(msg) => warn!(error = %msg, "search failed"),
                _ => {}
            }
        }
        Some("actors") if args.len() > 1 => {
            let name = args[1..].join(" ");
            let mut live = store.movies_by_actor_name_enhanced(&name);
            for movie in live.next().await? {
                println!("{:>4}  {}  ({})", movie.id, movie.title, movie.year);
            }
        }
        Some("cleanup") => {
            // Already ran above; report it explicitly for the command.
            println!("removed {removed} duplicate movies");
        }
        _ => {
            eprintln!("usage: moviedex <seed|list|fetch TITLE|search TERM|actors NAME|cleanup>");
        }
    }

    Ok(())
}
