//! Per-screen state machines. Each flow owns a `watch` channel of a sealed
//! state enum; actions run one logical task, catch every failure at the
//! boundary, and publish a terminal state. Retry is re-invoking the action.

use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;

use crate::{
    entities::movie,
    omdb::{MovieResponse, SearchItem},
    repo::MovieRepository,
};

/// An error's rendered text, or `fallback` when the error carries none.
fn error_message(msg: String, fallback: &str) -> String {
    if msg.is_empty() { fallback.to_string() } else { msg }
}

// --- detail fetch + save ---

#[derive(Clone, Debug, PartialEq)]
pub enum SearchMovieState {
    Initial,
    Loading,
    Success(MovieResponse),
    SaveSuccess(MovieResponse),
    Error(String),
}

pub struct SearchMovieFlow {
    repo: MovieRepository,
    state: watch::Sender<SearchMovieState>,
}

impl SearchMovieFlow {
    pub fn new(repo: MovieRepository) -> Self {
        let (state, _) = watch::channel(SearchMovieState::Initial);
        Self { repo, state }
    }

    pub fn subscribe(&self) -> watch::Receiver<SearchMovieState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> SearchMovieState {
        self.state.borrow().clone()
    }

    pub async fn search(&self, title: &str) {
        if title.trim().is_empty() {
            self.state.send_replace(SearchMovieState::Error(
                "Please enter a movie title".to_string(),
            ));
            return;
        }

        self.state.send_replace(SearchMovieState::Loading);
        let next = match self.repo.fetch_movie_by_title(title).await {
            Ok(movie) if movie.response == "True" => SearchMovieState::Success(movie),
            Ok(_) => SearchMovieState::Error("Movie not found".to_string()),
            Err(err) => SearchMovieState::Error(error_message(err.to_string(), "Unknown error occurred")),
        };
        self.state.send_replace(next);
    }

    /// Persists the movie currently shown. Only acts from `Success`.
    pub async fn save(&self) {
        let SearchMovieState::Success(movie) = self.state() else {
            return;
        };
        let next = match self.repo.save_movie_from_response(&movie).await {
            Ok(_) => SearchMovieState::SaveSuccess(movie),
            Err(err) => SearchMovieState::Error(error_message(err.to_string(), "Failed to save movie")),
        };
        self.state.send_replace(next);
    }
}

// --- remote search list ---

#[derive(Clone, Debug, PartialEq)]
pub enum TitleSearchState {
    Initial,
    Loading,
    Success(Vec<SearchItem>),
    Error(String),
}

pub struct TitleSearchFlow {
    repo: MovieRepository,
    state: watch::Sender<TitleSearchState>,
}

impl TitleSearchFlow {
    pub fn new(repo: MovieRepository) -> Self {
        let (state, _) = watch::channel(TitleSearchState::Initial);
        Self { repo, state }
    }

    pub fn subscribe(&self) -> watch::Receiver<TitleSearchState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> TitleSearchState {
        self.state.borrow().clone()
    }

    pub async fn search(&self, term: &str) {
        if term.trim().is_empty() {
            self.state
                .send_replace(TitleSearchState::Error("Please enter a search term".to_string()));
            return;
        }

        self.state.send_replace(TitleSearchState::Loading);
        let next = match self.repo.search_movies(term, 1).await {
            Ok(resp) if resp.response == "True" => TitleSearchState::Success(resp.search),
            Ok(_) => TitleSearchState::Error("No movies found with this title".to_string()),
            Err(err) => TitleSearchState::Error(error_message(err.to_string(), "Unknown error occurred")),
        };
        self.state.send_replace(next);
    }
}

// --- local live actor search ---

#[derive(Clone, Debug, PartialEq)]
pub enum ActorSearchState {
    Initial,
    Loading,
    Success(Vec<movie::Model>),
    Error(String),
}

pub struct ActorSearchFlow {
    repo: MovieRepository,
    state: watch::Sender<ActorSearchState>,
    collector: Mutex<Option<JoinHandle<()>>>,
}

impl ActorSearchFlow {
    pub fn new(repo: MovieRepository) -> Self {
        let (state, _) = watch::channel(ActorSearchState::Initial);
        Self { repo, state, collector: Mutex::new(None) }
    }

    pub fn subscribe(&self) -> watch::Receiver<ActorSearchState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> ActorSearchState {
        self.state.borrow().clone()
    }

    /// Starts collecting the live query for `term`, republishing `Success`
    /// on every store change. A new search cancels the previous collector
    /// mid-flight; nothing already written is rolled back.
    pub async fn search(&self, term: &str) {
        if term.trim().is_empty() {
            self.state
                .send_replace(ActorSearchState::Error("Please enter an actor name".to_string()));
            return;
        }

        let mut slot = self.collector.lock().await;
        if let Some(previous) = slot.take() {
            previous.abort();
        }

        self.state.send_replace(ActorSearchState::Loading);
        let mut live = self.repo.movies_by_actor_name(term);
        let state = self.state.clone();
        *slot = Some(tokio::spawn(async move {
            loop {
                match live.next().await {
                    Ok(movies) => {
                        state.send_replace(ActorSearchState::Success(movies));
                    }
                    Err(err) => {
                        state.send_replace(ActorSearchState::Error(error_message(
                            err.to_string(),
                            "Unknown error occurred",
                        )));
                        break;
                    }
                }
            }
        }));
    }
}

impl Drop for ActorSearchFlow {
    fn drop(&mut self) {
        if let Ok(mut slot) = self.collector.try_lock() {
            if let Some(handle) = slot.take() {
                handle.abort();
            }
        }
    }
}

// --- seed loading ---

#[derive(Clone, Debug, PartialEq)]
pub enum AddMoviesState {
    Initial,
    Loading,
    Success,
    Error(String),
}

pub struct AddMoviesFlow {
    repo: MovieRepository,
    state: watch::Sender<AddMoviesState>,
}

impl AddMoviesFlow {
    pub fn new(repo: MovieRepository) -> Self {
        let (state, _) = watch::channel(AddMoviesState::Initial);
        Self { repo, state }
    }

    pub fn subscribe(&self) -> watch::Receiver<AddMoviesState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> AddMoviesState {
        self.state.borrow().clone()
    }

    pub async fn add(&self) {
        self.state.send_replace(AddMoviesState::Loading);
        let next = match self.repo.add_predefined_movies_if_not_exists().await {
            Ok(()) => AddMoviesState::Success,
            Err(err) => AddMoviesState::Error(error_message(err.to_string(), "Unknown error occurred")),
        };
        self.state.send_replace(next);
    }
}
