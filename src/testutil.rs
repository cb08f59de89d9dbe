//! Shared test fixtures: an in-memory database, minimal records, and a
//! canned remote client.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use sea_orm::{ConnectOptions, ConnectionTrait, Database, Statement};

use crate::{
    db,
    entities::{actor, movie},
    error::{AppError, AppResult},
    omdb::{MovieApi, MovieResponse, SearchResponse},
    store::MovieStore,
};

/// One-connection in-memory SQLite with the real schema applied. A single
/// connection keeps the memory database alive for the whole test.
pub async fn test_store() -> MovieStore {
    let mut opts = ConnectOptions::new("sqlite::memory:");
    opts.max_connections(1).min_connections(1);
    let db = Database::connect(opts).await.unwrap();

    db.execute(Statement::from_string(
        db.get_database_backend(),
        "PRAGMA foreign_keys=ON".to_string(),
    ))
    .await
    .unwrap();

    db::run_migrations(&db).await.unwrap();
    MovieStore::new(db)
}

/// A store whose schema was never applied; every read or write fails with a
/// database error. For exercising storage-failure paths.
pub async fn broken_store() -> MovieStore {
    let mut opts = ConnectOptions::new("sqlite::memory:");
    opts.max_connections(1).min_connections(1);
    let db = Database::connect(opts).await.unwrap();
    MovieStore::new(db)
}

pub fn new_movie(title: &str, actors: &str) -> movie::Model {
    movie::Model {
        id: 0,
        title: title.to_string(),
        year: "2010".to_string(),
        rated: "PG-13".to_string(),
        released: "16 Jul 2010".to_string(),
        runtime: "148 min".to_string(),
        genre: "Drama".to_string(),
        director: "Someone".to_string(),
        writer: "Someone".to_string(),
        actors: actors.to_string(),
        plot: "A plot.".to_string(),
        language: String::new(),
        country: String::new(),
        awards: String::new(),
        poster: String::new(),
        imdb_rating: String::new(),
        imdb_votes: String::new(),
        imdb_id: String::new(),
        media_type: String::new(),
    }
}

pub fn new_actor(name: &str, movie_id: i64) -> actor::Model {
    actor::Model { id: 0, name: name.to_string(), movie_id }
}

/// `MovieApi` that replays canned responses and counts calls, so tests can
/// assert that validation short-circuits before any I/O.
#[derive(Default)]
pub struct StubApi {
    movie: MovieResponse,
    search: SearchResponse,
    fail_message: Option<String>,
    calls: AtomicUsize,
}

impl StubApi {
    pub fn with_movie(movie: MovieResponse) -> Self {
        Self { movie, ..Default::default() }
    }

    pub fn with_search(search: SearchResponse) -> Self {
        Self { search, ..Default::default() }
    }

    /// Every call fails with the given message, standing in for a transport
    /// or decode error.
    pub fn failing(message: &str) -> Self {
        Self { fail_message: Some(message.to_string()), ..Default::default() }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn failure(&self) -> Option<AppError> {
        self.fail_message
            .as_ref()
            .map(|msg| AppError::Db(sea_orm::DbErr::Custom(msg.clone())))
    }
}

#[async_trait]
impl MovieApi for StubApi {
    async fn fetch_by_title(&self, _title: &str) -> AppResult<MovieResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.failure() {
            Some(err) => Err(err),
            None => Ok(self.movie.clone()),
        }
    }

    async fn search(&self, _term: &str, _page: u32) -> AppResult<SearchResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.failure() {
            Some(err) => Err(err),
            None => Ok(self.search.clone()),
        }
    }
}
