#[derive(Clone, Debug)]
pub struct Config {
    pub omdb_api_key: String,
    pub omdb_base_url: String,
    pub database_url: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let omdb_api_key =
            std::env::var("OMDB_API_KEY").unwrap_or_else(|_| "2f1654d6".to_string());

        let omdb_base_url = std::env::var("OMDB_BASE_URL")
            .unwrap_or_else(|_| "https://www.omdbapi.com/".to_string());

        let database_url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://moviedex.db?mode=rwc".to_string());

        Ok(Self { omdb_api_key, omdb_base_url, database_url })
    }
}
