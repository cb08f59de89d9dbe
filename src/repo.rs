use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use tracing::{debug, info};

use crate::{
    entities::{actor, movie},
    error::AppResult,
    omdb::{MovieApi, MovieResponse, SearchResponse},
    store::{LiveQuery, MovieStore},
};

/// Coordinates the remote client and the local store. Holds no state of its
/// own; clones share the same store handle and client.
#[derive(Clone)]
pub struct MovieRepository {
    store: MovieStore,
    api: Arc<dyn MovieApi>,
}

impl MovieRepository {
    pub fn new(store: MovieStore, api: Arc<dyn MovieApi>) -> Self {
        Self { store, api }
    }

    // --- local pass-throughs ---

    pub async fn insert_movie(&self, movie: &movie::Model) -> AppResult<i64> {
        self.store.insert_movie(movie).await
    }

    pub async fn insert_movies(&self, movies: &[movie::Model]) -> AppResult<()> {
        self.store.insert_movies(movies).await
    }

    pub fn all_movies(&self) -> LiveQuery<Vec<movie::Model>> {
        self.store.all_movies()
    }

    pub fn movies_by_actor_name(&self, pattern: &str) -> LiveQuery<Vec<movie::Model>> {
        self.store.movies_by_actor_name(pattern)
    }

    pub async fn get_movie_by_title(&self, title: &str) -> AppResult<Option<movie::Model>> {
        self.store.get_movie_by_title(title).await
    }

    // --- actor reconciliation ---

    /// Splits `actors_csv` on commas and inserts the names this movie does
    /// not already have, comparing case-insensitively. Blank segments are
    /// dropped. Idempotent for repeated calls with overlapping lists.
    async fn save_actors_for_movie(&self, movie_id: i64, actors_csv: &str) -> AppResult<()> {
        let existing = self.store.get_actors_by_movie_id_sync(movie_id).await?;
        let mut known: HashSet<String> =
            existing.iter().map(|a| a.name.to_lowercase()).collect();

        let mut new_actors = Vec::new();
        for name in actors_csv.split(',') {
            let name = name.trim();
            if name.is_empty() || !known.insert(name.to_lowercase()) {
                continue;
            }
            new_actors.push(actor::Model { id: 0, name: name.to_string(), movie_id });
        }

        if !new_actors.is_empty() {
            debug!(movie_id, count = new_actors.len(), "inserting new actors");
            self.store.insert_actors(&new_actors).await?;
        }
        Ok(())
    }

    /// Upsert keyed on exact title. An existing movie row is never touched;
    /// only its actor list is reconciled. Returns the movie's id either way.
    pub async fn insert_movie_with_actors(&self, movie: &movie::Model) -> AppResult<i64> {
        if let Some(existing) = self.store.get_movie_by_title(&movie.title).await? {
            debug!(title = %movie.title, id = existing.id, "title already stored, reconciling actors");
            self.save_actors_for_movie(existing.id, &movie.actors).await?;
            return Ok(existing.id);
        }

        let movie_id = self.store.insert_movie(movie).await?;
        self.save_actors_for_movie(movie_id, &movie.actors).await?;
        Ok(movie_id)
    }

    // --- remote operations ---

    pub async fn fetch_movie_by_title(&self, title: &str) -> AppResult<MovieResponse> {
        self.api.fetch_by_title(title).await
    }

    /// Free-text search against the remote API; `page` is 1-based.
    pub async fn search_movies(&self, term: &str, page: u32) -> AppResult<SearchResponse> {
        self.api.search(term, page).await
    }

    /// Upsert-by-title for a remote detail response.
    pub async fn save_movie_from_response(&self, response: &MovieResponse) -> AppResult<i64> {
        if let Some(existing) = self.store.get_movie_by_title(&response.title).await? {
            self.save_actors_for_movie(existing.id, &response.actors).await?;
            return Ok(existing.id);
        }

        let movie = map_response_to_entity(response);
        let movie_id = self.store.insert_movie(&movie).await?;
        self.save_actors_for_movie(movie_id, &response.actors).await?;
        Ok(movie_id)
    }

    // --- seed data ---

    /// Probes one sentinel title and loads the seed list only when it is
    /// absent, so repeated calls never duplicate anything.
    pub async fn add_predefined_movies_if_not_exists(&self) -> AppResult<()> {
        if self.store.get_movie_by_title("The Shawshank Redemption").await?.is_none() {
            self.add_predefined_movies().await?;
        }
        Ok(())
    }

    pub async fn add_predefined_movies(&self) -> AppResult<()> {
        for movie in predefined_movies() {
            // Dedup-safe even if a seed title was fetched remotely before.
            self.insert_movie_with_actors(&movie).await?;
        }
        Ok(())
    }

    // --- maintenance ---

    /// Collapses movies sharing an exact title down to the first row the
    /// scan returned, deleting the others and their actor rows. Returns the
    /// number of rows removed; a second run on a clean library removes none.
    pub async fn remove_duplicate_movies(&self) -> AppResult<usize> {
        let all_movies = self.store.all_movies_snapshot().await?;

        let mut by_title: HashMap<String, Vec<movie::Model>> = HashMap::new();
        for movie in all_movies {
            by_title.entry(movie.title.clone()).or_default().push(movie);
        }

        let mut removed = 0;
        for (title, group) in by_title {
            for duplicate in group.into_iter().skip(1) {
                debug!(title = %title, id = duplicate.id, "removing duplicate movie");
                // The FK cascade would cover this, but the explicit delete
                // keeps the pass independent of per-connection PRAGMA state.
                self.store.delete_actors_by_movie_id(duplicate.id).await?;
                self.store.delete_movie(duplicate.id).await?;
                removed += 1;
            }
        }

        info!(removed, "duplicate cleanup finished");
        Ok(removed)
    }
}

/// Field-for-field mapping from a detail response to a local record. All
/// fields are opaque strings; nothing is validated. Ratings and Metascore
/// are not persisted.
pub fn map_response_to_entity(response: &MovieResponse) -> movie::Model {
    movie::Model {
        id: 0,
        title: response.title.clone(),
        year: response.year.clone(),
        rated: response.rated.clone(),
        released: response.released.clone(),
        runtime: response.runtime.clone(),
        genre: response.genre.clone(),
        director: response.director.clone(),
        writer: response.writer.clone(),
        actors: response.actors.clone(),
        plot: response.plot.clone(),
        language: response.language.clone(),
        country: response.country.clone(),
        awards: response.awards.clone(),
        poster: response.poster.clone(),
        imdb_rating: response.imdb_rating.clone(),
        imdb_votes: response.imdb_votes.clone(),
        imdb_id: response.imdb_id.clone(),
        media_type: response.media_type.clone(),
    }
}

/// Thin facade over the store's actor operations, for callers that only work
/// with actors.
#[derive(Clone)]
pub struct ActorRepository {
    store: MovieStore,
}

impl ActorRepository {
    pub fn new(store: MovieStore) -> Self {
        Self { store }
    }

    pub async fn insert_actor(&self, actor: &actor::Model) -> AppResult<i64> {
        self.store.insert_actor(actor).await
    }

    pub async fn insert_actors(&self, actors: &[actor::Model]) -> AppResult<()> {
        self.store.insert_actors(actors).await
    }

    pub fn get_actors_by_movie_id(&self, movie_id: i64) -> LiveQuery<Vec<actor::Model>> {
        self.store.get_actors_by_movie_id(movie_id)
    }

    pub fn get_actors_by_name(&self, pattern: &str) -> LiveQuery<Vec<actor::Model>> {
        self.store.get_actors_by_name(pattern)
    }

    pub async fn delete_actors_by_movie_id(&self, movie_id: i64) -> AppResult<()> {
        self.store.delete_actors_by_movie_id(movie_id).await
    }
}

fn predefined_movies() -> Vec<movie::Model> {
    vec![
        seed_movie(
            "The Shawshank Redemption",
            "1994",
            "R",
            "14 Oct 1994",
            "142 min",
            "Drama",
            "Frank Darabont",
            "Stephen King, Frank Darabont",
            "Tim Robbins, Morgan Freeman, Bob Gunton",
            "Two imprisoned men bond over a number of years, finding solace and eventual redemption through acts of common decency.",
        ),
        seed_movie(
            "The Godfather",
            "1972",
            "R",
            "24 Mar 1972",
            "175 min",
            "Crime, Drama",
            "Francis Ford Coppola",
            "Mario Puzo, Francis Ford Coppola",
            "Marlon Brando, Al Pacino, James Caan",
            "The aging patriarch of an organized crime dynasty transfers control of his clandestine empire to his reluctant son.",
        ),
        seed_movie(
            "The Dark Knight",
            "2008",
            "PG-13",
            "18 Jul 2008",
            "152 min",
            "Action, Crime, Drama",
            "Christopher Nolan",
            "Jonathan Nolan, Christopher Nolan",
            "Christian Bale, Heath Ledger, Aaron Eckhart",
            "When the menace known as the Joker wreaks havoc and chaos on the people of Gotham, Batman must accept one of the greatest psychological and physical tests of his ability to fight injustice.",
        ),
        seed_movie(
            "Pulp Fiction",
            "1994",
            "R",
            "14 Oct 1994",
            "154 min",
            "Crime, Drama",
            "Quentin Tarantino",
            "Quentin Tarantino, Roger Avary",
            "John Travolta, Uma Thurman, Samuel L. Jackson",
            "The lives of two mob hitmen, a boxer, a gangster and his wife, and a pair of diner bandits intertwine in four tales of violence and redemption.",
        ),
        seed_movie(
            "Fight Club",
            "1999",
            "R",
            "15 Oct 1999",
            "139 min",
            "Drama",
            "David Fincher",
            "Chuck Palahniuk, Jim Uhls",
            "Brad Pitt, Edward Norton, Meat Loaf",
            "An insomniac office worker and a devil-may-care soapmaker form an underground fight club that evolves into something much, much more.",
        ),
    ]
}

#[allow(clippy::too_many_arguments)]
fn seed_movie(
    title: &str,
    year: &str,
    rated: &str,
    released: &str,
    runtime: &str,
    genre: &str,
    director: &str,
    writer: &str,
    actors: &str,
    plot: &str,
) -> movie::Model {
    movie::Model {
        id: 0,
        title: title.to_string(),
        year: year.to_string(),
        rated: rated.to_string(),
        released: released.to_string(),
        runtime: runtime.to_string(),
        genre: genre.to_string(),
        director: director.to_string(),
        writer: writer.to_string(),
        actors: actors.to_string(),
        plot: plot.to_string(),
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{StubApi, new_actor, new_movie, test_store};

    async fn test_repo() -> (MovieRepository, MovieStore) {
        let store = test_store().await;
        let repo = MovieRepository::new(store.clone(), Arc::new(StubApi::default()));
        (repo, store)
    }

    #[tokio::test]
    async fn upsert_creates_movie_and_actor_rows() {
        let (repo, store) = test_repo().await;

        let id = repo
            .insert_movie_with_actors(&new_movie(
                "Inception",
                "Leonardo DiCaprio, Joseph Gordon-Levitt",
            ))
            .await
            .unwrap();

        assert_eq!(store.all_movies_snapshot().await.unwrap().len(), 1);
        let actors = store.get_actors_by_movie_id_sync(id).await.unwrap();
        let names: Vec<_> = actors.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, ["Leonardo DiCaprio", "Joseph Gordon-Levitt"]);
    }

    #[tokio::test]
    async fn upsert_reuses_existing_row_and_reconciles_actors() {
        let (repo, store) = test_repo().await;

        let first =
            repo.insert_movie_with_actors(&new_movie("Inception", "Leonardo DiCaprio")).await.unwrap();

        // Same title, overlapping actor list differing only by case.
        let second = repo
            .insert_movie_with_actors(&new_movie("Inception", "leonardo dicaprio, Ellen Page"))
            .await
            .unwrap();

        assert_eq!(second, first);
        assert_eq!(store.all_movies_snapshot().await.unwrap().len(), 1);

        let actors = store.get_actors_by_movie_id_sync(first).await.unwrap();
        let names: Vec<_> = actors.iter().map(|a| a.name.as_str()).collect();
        // Original casing survives; the case-duplicate is rejected.
        assert_eq!(names, ["Leonardo DiCaprio", "Ellen Page"]);
    }

    #[tokio::test]
    async fn blank_csv_segments_are_never_materialized() {
        let (repo, store) = test_repo().await;

        let id = repo
            .insert_movie_with_actors(&new_movie("You've Got Mail", "Tom Hanks, , Meg Ryan"))
            .await
            .unwrap();

        let actors = store.get_actors_by_movie_id_sync(id).await.unwrap();
        let names: Vec<_> = actors.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, ["Tom Hanks", "Meg Ryan"]);
    }

    #[tokio::test]
    async fn repeated_names_in_one_list_insert_once() {
        let (repo, store) = test_repo().await;

        let id = repo
            .insert_movie_with_actors(&new_movie("Cast Away", "Tom Hanks, tom hanks, Tom Hanks"))
            .await
            .unwrap();

        let actors = store.get_actors_by_movie_id_sync(id).await.unwrap();
        assert_eq!(actors.len(), 1);
        assert_eq!(actors[0].name, "Tom Hanks");
    }

    #[tokio::test]
    async fn save_from_response_maps_and_upserts() {
        let (repo, store) = test_repo().await;

        let response = MovieResponse {
            title: "Inception".to_string(),
            year: "2010".to_string(),
            actors: "Leonardo DiCaprio, Joseph Gordon-Levitt".to_string(),
            imdb_id: "tt1375666".to_string(),
            response: "True".to_string(),
            ..Default::default()
        };

        let id = repo.save_movie_from_response(&response).await.unwrap();
        let stored = store.get_movie_by_id(id).await.unwrap().unwrap();
        assert_eq!(stored.title, "Inception");
        assert_eq!(stored.imdb_id, "tt1375666");

        // Saving the same response again reuses the row.
        let again = repo.save_movie_from_response(&response).await.unwrap();
        assert_eq!(again, id);
        assert_eq!(store.all_movies_snapshot().await.unwrap().len(), 1);
        assert_eq!(store.get_actors_by_movie_id_sync(id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn response_mapping_round_trips_through_storage() {
        let (repo, store) = test_repo().await;

        let response = MovieResponse {
            title: "Inception".to_string(),
            year: "2010".to_string(),
            rated: "PG-13".to_string(),
            released: "16 Jul 2010".to_string(),
            runtime: "148 min".to_string(),
            genre: "Action, Adventure, Sci-Fi".to_string(),
            director: "Christopher Nolan".to_string(),
            writer: "Christopher Nolan".to_string(),
            actors: "Leonardo DiCaprio".to_string(),
            plot: "A thief who steals corporate secrets.".to_string(),
            // language/country/awards/poster left absent upstream
            imdb_rating: "8.8".to_string(),
            imdb_votes: "2,400,000".to_string(),
            imdb_id: "tt1375666".to_string(),
            media_type: "movie".to_string(),
            response: "True".to_string(),
            ..Default::default()
        };

        let id = repo.save_movie_from_response(&response).await.unwrap();
        let stored = store.get_movie_by_id(id).await.unwrap().unwrap();

        let mut expected = map_response_to_entity(&response);
        expected.id = id;
        // Byte-for-byte, empty-string defaults included.
        assert_eq!(stored, expected);
        assert_eq!(stored.language, "");
        assert_eq!(stored.poster, "");
    }

    #[tokio::test]
    async fn seed_is_idempotent() {
        let (repo, store) = test_repo().await;

        repo.add_predefined_movies_if_not_exists().await.unwrap();
        assert_eq!(store.all_movies_snapshot().await.unwrap().len(), 5);

        let shawshank = store
            .get_movie_by_title("The Shawshank Redemption")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(store.get_actors_by_movie_id_sync(shawshank.id).await.unwrap().len(), 3);

        repo.add_predefined_movies_if_not_exists().await.unwrap();
        assert_eq!(store.all_movies_snapshot().await.unwrap().len(), 5);
        assert_eq!(store.get_actors_by_movie_id_sync(shawshank.id).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn actor_repository_delegates_to_the_store() {
        let store = test_store().await;
        let actors = ActorRepository::new(store.clone());
        let movie_id = store.insert_movie(&new_movie("Inception", "")).await.unwrap();

        let id = actors.insert_actor(&new_actor("Leonardo DiCaprio", movie_id)).await.unwrap();
        assert!(id > 0);
        actors.insert_actors(&[new_actor("Elliot Page", movie_id)]).await.unwrap();

        let mut by_movie = actors.get_actors_by_movie_id(movie_id);
        assert_eq!(by_movie.next().await.unwrap().len(), 2);

        let mut by_name = actors.get_actors_by_name("page");
        let hits = by_name.next().await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "Elliot Page");

        actors.delete_actors_by_movie_id(movie_id).await.unwrap();
        assert!(store.get_actors_by_movie_id_sync(movie_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn duplicate_cleanup_keeps_one_row_per_title() {
        let (repo, store) = test_repo().await;

        // Two "Dune" rows with differing actor sets, inserted straight into
        // the store to bypass the upsert guard.
        let first = store.insert_movie(&new_movie("Dune", "Timothee Chalamet")).await.unwrap();
        let second = store.insert_movie(&new_movie("Dune", "Kyle MacLachlan")).await.unwrap();
        repo.save_actors_for_movie(first, "Timothee Chalamet").await.unwrap();
        repo.save_actors_for_movie(second, "Kyle MacLachlan").await.unwrap();
        store.insert_movie(&new_movie("Alien", "Sigourney Weaver")).await.unwrap();

        let removed = repo.remove_duplicate_movies().await.unwrap();
        assert_eq!(removed, 1);

        let remaining = store.all_movies_snapshot().await.unwrap();
        assert_eq!(remaining.len(), 2);
        let dunes: Vec<_> = remaining.iter().filter(|m| m.title == "Dune").collect();
        assert_eq!(dunes.len(), 1);

        // Survivor's actors are untouched; the other movie's are gone.
        let survivor = dunes[0].id;
        let other = if survivor == first { second } else { first };
        assert_eq!(store.get_actors_by_movie_id_sync(survivor).await.unwrap().len(), 1);
        assert!(store.get_actors_by_movie_id_sync(other).await.unwrap().is_empty());

        // Idempotent: nothing left to remove.
        assert_eq!(repo.remove_duplicate_movies().await.unwrap(), 0);
    }
}
