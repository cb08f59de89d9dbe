use async_trait::async_trait;
use serde::Deserialize;

use crate::error::AppResult;

/// Remote movie API boundary. `OmdbClient` is the real implementation;
/// tests substitute their own.
#[async_trait]
pub trait MovieApi: Send + Sync {
    /// Detail lookup by exact title. The API's own `Response` flag is passed
    /// through undisturbed; only transport and decode failures are errors.
    async fn fetch_by_title(&self, title: &str) -> AppResult<MovieResponse>;

    /// Free-text search, 1-based page.
    async fn search(&self, term: &str, page: u32) -> AppResult<SearchResponse>;
}

pub struct OmdbClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl OmdbClient {
    pub fn new(client: reqwest::Client, api_key: String, base_url: String) -> Self {
        Self { client, api_key, base_url }
    }
}

#[async_trait]
impl MovieApi for OmdbClient {
    async fn fetch_by_title(&self, title: &str) -> AppResult<MovieResponse> {
        let resp = self
            .client
            .get(&self.base_url)
            .query(&[("t", title), ("apikey", &self.api_key)])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(resp)
    }

    async fn search(&self, term: &str, page: u32) -> AppResult<SearchResponse> {
        let resp = self
            .client
            .get(&self.base_url)
            .query(&[("s", term), ("apikey", &self.api_key)])
            .query(&[("page", page)])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(resp)
    }
}

/// Detail response. Every field is an opaque string; anything the API omits
/// decodes to `""` so downstream mapping never deals with absence.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct MovieResponse {
    #[serde(rename = "Title")]
    pub title: String,
    #[serde(rename = "Year")]
    pub year: String,
    #[serde(rename = "Rated")]
    pub rated: String,
    #[serde(rename = "Released")]
    pub released: String,
    #[serde(rename = "Runtime")]
    pub runtime: String,
    #[serde(rename = "Genre")]
    pub genre: String,
    #[serde(rename = "Director")]
    pub director: String,
    #[serde(rename = "Writer")]
    pub writer: String,
    #[serde(rename = "Actors")]
    pub actors: String,
    #[serde(rename = "Plot")]
    pub plot: String,
    #[serde(rename = "Language")]
    pub language: String,
    #[serde(rename = "Country")]
    pub country: String,
    #[serde(rename = "Awards")]
    pub awards: String,
    #[serde(rename = "Poster")]
    pub poster: String,
    #[serde(rename = "Ratings")]
    pub ratings: Vec<Rating>,
    #[serde(rename = "Metascore")]
    pub metascore: String,
    #[serde(rename = "imdbRating")]
    pub imdb_rating: String,
    #[serde(rename = "imdbVotes")]
    pub imdb_votes: String,
    #[serde(rename = "imdbID")]
    pub imdb_id: String,
    #[serde(rename = "Type")]
    pub media_type: String,
    /// API-level success flag, `"True"` or `"False"`. Independent of
    /// transport success.
    #[serde(rename = "Response")]
    pub response: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Rating {
    #[serde(rename = "Source")]
    pub source: String,
    #[serde(rename = "Value")]
    pub value: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SearchResponse {
    #[serde(rename = "Search")]
    pub search: Vec<SearchItem>,
    #[serde(rename = "totalResults")]
    pub total_results: String,
    #[serde(rename = "Response")]
    pub response: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SearchItem {
    #[serde(rename = "Title")]
    pub title: String,
    #[serde(rename = "Year")]
    pub year: String,
    #[serde(rename = "imdbID")]
    pub imdb_id: String,
    #[serde(rename = "Type")]
    pub media_type: String,
    #[serde(rename = "Poster")]
    pub poster: String,
}
