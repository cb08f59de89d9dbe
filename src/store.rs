use futures::{FutureExt, future::BoxFuture};
use sea_orm::{
    ActiveValue::{NotSet, Set},
    ColumnTrait, Condition, DatabaseConnection, EntityTrait, JoinType, QueryFilter, QuerySelect,
    RelationTrait,
    sea_query::{Expr, Func, OnConflict},
};
use tokio::sync::broadcast;

use crate::{
    entities::{actor, movie},
    error::AppResult,
};

/// Change-bus tag: which table a committed write touched.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Table {
    Movies,
    Actors,
}

type QueryFn<T> = Box<dyn Fn() -> BoxFuture<'static, AppResult<T>> + Send + Sync>;

/// A live read: the first `next()` yields the current result, and every
/// committed write to one of the query's tables triggers a re-run and a
/// fresh yield. Dropping the query cancels the subscription; stored data is
/// unaffected.
pub struct LiveQuery<T> {
    rx: broadcast::Receiver<Table>,
    tables: &'static [Table],
    run: QueryFn<T>,
    primed: bool,
}

impl<T> LiveQuery<T> {
    pub async fn next(&mut self) -> AppResult<T> {
        if !self.primed {
            self.primed = true;
            return (self.run)().await;
        }
        loop {
            match self.rx.recv().await {
                Ok(table) if self.tables.contains(&table) => return (self.run)().await,
                Ok(_) => continue,
                // Missed notifications collapse into one re-read.
                Err(broadcast::error::RecvError::Lagged(_)) => return (self.run)().await,
                // The query closure owns a store handle, so the sender only
                // closes once this subscription is unreachable anyway.
                Err(broadcast::error::RecvError::Closed) => return (self.run)().await,
            }
        }
    }
}

/// Handle to the local movie/actor tables. Cheap to clone; every write
/// publishes a change tag so live queries re-evaluate.
#[derive(Clone)]
pub struct MovieStore {
    db: DatabaseConnection,
    changes: broadcast::Sender<Table>,
}

impl MovieStore {
    pub fn new(db: DatabaseConnection) -> Self {
        let (changes, _) = broadcast::channel(64);
        Self { db, changes }
    }

    pub fn db(&self) -> &DatabaseConnection {
        &self.db
    }

    fn notify(&self, table: Table) {
        // No receivers is fine.
        let _ = self.changes.send(table);
    }

    fn live<T, F>(&self, tables: &'static [Table], run: F) -> LiveQuery<T>
    where
        F: Fn() -> BoxFuture<'static, AppResult<T>> + Send + Sync + 'static,
    {
        LiveQuery { rx: self.changes.subscribe(), tables, run: Box::new(run), primed: false }
    }

    // --- movies ---

    pub async fn insert_movie(&self, m: &movie::Model) -> AppResult<i64> {
        let id = self.insert_movie_row(m).await?;
        self.notify(Table::Movies);
        Ok(id)
    }

    pub async fn insert_movies(&self, movies: &[movie::Model]) -> AppResult<()> {
        for m in movies {
            self.insert_movie_row(m).await?;
        }
        if !movies.is_empty() {
            self.notify(Table::Movies);
        }
        Ok(())
    }

    async fn insert_movie_row(&self, m: &movie::Model) -> AppResult<i64> {
        if m.id == 0 {
            let res = movie::Entity::insert(movie_active(m)).exec(&self.db).await?;
            Ok(res.last_insert_id)
        } else {
            // REPLACE semantics on an explicit primary key.
            movie::Entity::insert(movie_active(m))
                .on_conflict(
                    OnConflict::column(movie::Column::Id)
                        .update_columns([
                            movie::Column::Title,
                            movie::Column::Year,
                            movie::Column::Rated,
                            movie::Column::Released,
                            movie::Column::Runtime,
                            movie::Column::Genre,
                            movie::Column::Director,
                            movie::Column::Writer,
                            movie::Column::Actors,
                            movie::Column::Plot,
                            movie::Column::Language,
                            movie::Column::Country,
                            movie::Column::Awards,
                            movie::Column::Poster,
                            movie::Column::ImdbRating,
                            movie::Column::ImdbVotes,
                            movie::Column::ImdbId,
                            movie::Column::MediaType,
                        ])
                        .to_owned(),
                )
                .exec(&self.db)
                .await?;
            Ok(m.id)
        }
    }

    pub async fn get_movie_by_id(&self, id: i64) -> AppResult<Option<movie::Model>> {
        Ok(movie::Entity::find_by_id(id).one(&self.db).await?)
    }

    /// Exact, case-sensitive title match. The dedup probe.
    pub async fn get_movie_by_title(&self, title: &str) -> AppResult<Option<movie::Model>> {
        Ok(movie::Entity::find()
            .filter(movie::Column::Title.eq(title))
            .one(&self.db)
            .await?)
    }

    pub async fn all_movies_snapshot(&self) -> AppResult<Vec<movie::Model>> {
        Ok(movie::Entity::find().all(&self.db).await?)
    }

    pub fn all_movies(&self) -> LiveQuery<Vec<movie::Model>> {
        let store = self.clone();
        self.live(&[Table::Movies], move || {
            let store = store.clone();
            async move { store.all_movies_snapshot().await }.boxed()
        })
    }

    /// Substring, case-insensitive match against the denormalized actors
    /// column.
    pub fn movies_by_actor_name(&self, pattern: &str) -> LiveQuery<Vec<movie::Model>> {
        let store = self.clone();
        let pattern = pattern.to_string();
        self.live(&[Table::Movies], move || {
            let store = store.clone();
            let pattern = pattern.clone();
            async move { store.movies_by_actor_name_once(&pattern).await }.boxed()
        })
    }

    async fn movies_by_actor_name_once(&self, pattern: &str) -> AppResult<Vec<movie::Model>> {
        Ok(movie::Entity::find()
            .filter(like_lower((movie::Entity, movie::Column::Actors), pattern))
            .all(&self.db)
            .await?)
    }

    /// Union of the denormalized-column match and the actors-table match,
    /// one row per movie.
    pub fn movies_by_actor_name_enhanced(&self, pattern: &str) -> LiveQuery<Vec<movie::Model>> {
        let store = self.clone();
        let pattern = pattern.to_string();
        self.live(&[Table::Movies, Table::Actors], move || {
            let store = store.clone();
            let pattern = pattern.clone();
            async move { store.movies_by_actor_name_enhanced_once(&pattern).await }.boxed()
        })
    }

    async fn movies_by_actor_name_enhanced_once(
        &self,
        pattern: &str,
    ) -> AppResult<Vec<movie::Model>> {
        Ok(movie::Entity::find()
            .join(JoinType::LeftJoin, movie::Relation::Actor.def())
            .filter(
                Condition::any()
                    .add(like_lower((movie::Entity, movie::Column::Actors), pattern))
                    .add(like_lower((actor::Entity, actor::Column::Name), pattern)),
            )
            .distinct()
            .all(&self.db)
            .await?)
    }

    pub fn movies_by_title_part(&self, pattern: &str) -> LiveQuery<Vec<movie::Model>> {
        let store = self.clone();
        let pattern = pattern.to_string();
        self.live(&[Table::Movies], move || {
            let store = store.clone();
            let pattern = pattern.clone();
            async move {
                Ok(movie::Entity::find()
                    .filter(like_lower((movie::Entity, movie::Column::Title), &pattern))
                    .all(store.db())
                    .await?)
            }
            .boxed()
        })
    }

    /// Deletes the movie row; child actor rows go with it via the FK
    /// cascade.
    pub async fn delete_movie(&self, id: i64) -> AppResult<()> {
        movie::Entity::delete_by_id(id).exec(&self.db).await?;
        self.notify(Table::Movies);
        self.notify(Table::Actors);
        Ok(())
    }

    // --- actors ---

    pub async fn insert_actor(&self, a: &actor::Model) -> AppResult<i64> {
        let id = self.insert_actor_row(a).await?;
        self.notify(Table::Actors);
        Ok(id)
    }

    pub async fn insert_actors(&self, actors: &[actor::Model]) -> AppResult<()> {
        for a in actors {
            self.insert_actor_row(a).await?;
        }
        if !actors.is_empty() {
            self.notify(Table::Actors);
        }
        Ok(())
    }

    async fn insert_actor_row(&self, a: &actor::Model) -> AppResult<i64> {
        if a.id == 0 {
            let res = actor::Entity::insert(actor_active(a)).exec(&self.db).await?;
            Ok(res.last_insert_id)
        } else {
            actor::Entity::insert(actor_active(a))
                .on_conflict(
                    OnConflict::column(actor::Column::Id)
                        .update_columns([actor::Column::Name, actor::Column::MovieId])
                        .to_owned(),
                )
                .exec(&self.db)
                .await?;
            Ok(a.id)
        }
    }

    pub fn get_actors_by_movie_id(&self, movie_id: i64) -> LiveQuery<Vec<actor::Model>> {
        let store = self.clone();
        self.live(&[Table::Actors], move || {
            let store = store.clone();
            async move { store.get_actors_by_movie_id_sync(movie_id).await }.boxed()
        })
    }

    pub async fn get_actors_by_movie_id_sync(&self, movie_id: i64) -> AppResult<Vec<actor::Model>> {
        Ok(actor::Entity::find()
            .filter(actor::Column::MovieId.eq(movie_id))
            .all(&self.db)
            .await?)
    }

    pub fn get_actors_by_name(&self, pattern: &str) -> LiveQuery<Vec<actor::Model>> {
        let store = self.clone();
        let pattern = pattern.to_string();
        self.live(&[Table::Actors], move || {
            let store = store.clone();
            let pattern = pattern.clone();
            async move {
                Ok(actor::Entity::find()
                    .filter(like_lower((actor::Entity, actor::Column::Name), &pattern))
                    .all(store.db())
                    .await?)
            }
            .boxed()
        })
    }

    pub async fn delete_actors_by_movie_id(&self, movie_id: i64) -> AppResult<()> {
        actor::Entity::delete_many()
            .filter(actor::Column::MovieId.eq(movie_id))
            .exec(&self.db)
            .await?;
        self.notify(Table::Actors);
        Ok(())
    }
}

/// `lower(col) LIKE '%lower(pattern)%'`. SQLite's own LIKE is only
/// case-insensitive for ASCII, so both sides are folded explicitly.
fn like_lower<C>(col: C, pattern: &str) -> sea_orm::sea_query::SimpleExpr
where
    C: sea_orm::sea_query::IntoColumnRef,
{
    Expr::expr(Func::lower(Expr::col(col))).like(format!("%{}%", pattern.to_lowercase()))
}

fn movie_active(m: &movie::Model) -> movie::ActiveModel {
    movie::ActiveModel {
        id: if m.id == 0 { NotSet } else { Set(m.id) },
        title: Set(m.title.clone()),
        year: Set(m.year.clone()),
        rated: Set(m.rated.clone()),
        released: Set(m.released.clone()),
        runtime: Set(m.runtime.clone()),
        genre: Set(m.genre.clone()),
        director: Set(m.director.clone()),
        writer: Set(m.writer.clone()),
        actors: Set(m.actors.clone()),
        plot: Set(m.plot.clone()),
        language: Set(m.language.clone()),
        country: Set(m.country.clone()),
        awards: Set(m.awards.clone()),
        poster: Set(m.poster.clone()),
        imdb_rating: Set(m.imdb_rating.clone()),
        imdb_votes: Set(m.imdb_votes.clone()),
        imdb_id: Set(m.imdb_id.clone()),
        media_type: Set(m.media_type.clone()),
    }
}

fn actor_active(a: &actor::Model) -> actor::ActiveModel {
    actor::ActiveModel {
        id: if a.id == 0 { NotSet } else { Set(a.id) },
        name: Set(a.name.clone()),
        movie_id: Set(a.movie_id),
    }
}
