//! Persistence contract for the kitchen catalogue and its MySQL adapter.
//!
//! Handlers only see [`KitchenStore`]. The MySQL implementation keeps the SQL
//! in [`crate::query`] and runs every call on a pooled diesel connection, so
//! callers must invoke it from `web::block`.

use diesel::mysql::MysqlConnection;
use diesel::r2d2::{self, ConnectionManager};

use crate::models::{
    Cook, CookCredentials, CookDetail, Counts, Dish, DishChanges, DishDetail, DishType,
    DishTypeDetail, DishWithType, NewCook, NewDishType,
};
use crate::query;
use crate::search::Prefix;

pub type DbPool = r2d2::Pool<ConnectionManager<MysqlConnection>>;

embed_migrations!("migrations");

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i32 },
    #[error("{entity} with this {field} already exists")]
    Duplicate {
        entity: &'static str,
        field: &'static str,
    },
    #[error("{field} {id} does not exist")]
    MissingReference { field: &'static str, id: i32 },
    #[error("database connection failed: {0}")]
    Connection(String),
    #[error("database query failed: {0}")]
    Query(String),
}

impl From<diesel::result::Error> for StoreError {
    fn from(err: diesel::result::Error) -> Self {
        StoreError::Query(err.to_string())
    }
}

impl From<r2d2::PoolError> for StoreError {
    fn from(err: r2d2::PoolError) -> Self {
        StoreError::Connection(err.to_string())
    }
}

/// Storage operations for dish types, dishes, cooks and the dish/cook
/// assignment relation.
///
/// Lists come back in each entity's default order: dish types by name,
/// dishes by dish type name then name, cooks by id.
pub trait KitchenStore: Send + Sync {
    fn counts(&self) -> Result<Counts, StoreError>;

    fn list_dish_types(&self, filter: Option<&Prefix>) -> Result<Vec<DishType>, StoreError>;
    fn get_dish_type(&self, id: i32) -> Result<DishTypeDetail, StoreError>;
    fn create_dish_type(&self, new: &NewDishType) -> Result<DishType, StoreError>;
    fn update_dish_type(&self, id: i32, changes: &NewDishType) -> Result<DishType, StoreError>;
    /// Also removes every dish of this type.
    fn delete_dish_type(&self, id: i32) -> Result<(), StoreError>;

    fn list_dishes(&self, filter: Option<&Prefix>) -> Result<Vec<DishWithType>, StoreError>;
    fn get_dish(&self, id: i32) -> Result<DishDetail, StoreError>;
    /// Inserts the dish and its cook set atomically.
    fn create_dish(&self, changes: &DishChanges) -> Result<Dish, StoreError>;
    /// Rewrites the dish row and replaces its cook set atomically.
    fn update_dish(&self, id: i32, changes: &DishChanges) -> Result<Dish, StoreError>;
    fn delete_dish(&self, id: i32) -> Result<(), StoreError>;

    fn list_cooks(&self, filter: Option<&Prefix>) -> Result<Vec<Cook>, StoreError>;
    fn get_cook(&self, id: i32) -> Result<CookDetail, StoreError>;
    /// The cook row alone, without its dishes.
    fn find_cook(&self, id: i32) -> Result<Cook, StoreError>;
    fn create_cook(&self, new: &NewCook) -> Result<Cook, StoreError>;
    fn update_cook(&self, id: i32, changes: &NewCook) -> Result<Cook, StoreError>;
    fn delete_cook(&self, id: i32) -> Result<(), StoreError>;
    fn find_credentials(&self, username: &str) -> Result<Option<CookCredentials>, StoreError>;

    /// No-op when the pair is already assigned.
    fn assign_cook(&self, dish_id: i32, cook_id: i32) -> Result<(), StoreError>;
    /// No-op when the pair is not assigned.
    fn unassign_cook(&self, dish_id: i32, cook_id: i32) -> Result<(), StoreError>;
    fn is_assigned(&self, dish_id: i32, cook_id: i32) -> Result<bool, StoreError>;
}

pub fn build_pool(database_url: &str, max_size: u32) -> Result<DbPool, StoreError> {
    let manager = ConnectionManager::<MysqlConnection>::new(database_url);
    Ok(r2d2::Pool::builder().max_size(max_size).build(manager)?)
}

pub fn run_migrations(pool: &DbPool) -> Result<(), StoreError> {
    let conn = pool.get()?;
    embedded_migrations::run(&*conn)
        .map_err(|err| StoreError::Query(format!("migrations failed: {err}")))
}

#[derive(Clone)]
pub struct MysqlStore {
    pool: DbPool,
}

impl MysqlStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

impl KitchenStore for MysqlStore {
    fn counts(&self) -> Result<Counts, StoreError> {
        let conn = self.pool.get()?;
        query::count_all(&conn)
    }

    fn list_dish_types(&self, filter: Option<&Prefix>) -> Result<Vec<DishType>, StoreError> {
        let conn = self.pool.get()?;
        query::find_dish_types(&conn, filter)
    }

    fn get_dish_type(&self, id: i32) -> Result<DishTypeDetail, StoreError> {
        let conn = self.pool.get()?;
        let dish_type = query::find_dish_type(&conn, id)?;
        let dishes = query::find_dishes_of_type(&conn, id)?;
        Ok(DishTypeDetail { dish_type, dishes })
    }

    fn create_dish_type(&self, new: &NewDishType) -> Result<DishType, StoreError> {
        let conn = self.pool.get()?;
        query::insert_dish_type(&conn, new)
    }

    fn update_dish_type(&self, id: i32, changes: &NewDishType) -> Result<DishType, StoreError> {
        let conn = self.pool.get()?;
        query::update_dish_type(&conn, id, changes)
    }

    fn delete_dish_type(&self, id: i32) -> Result<(), StoreError> {
        let conn = self.pool.get()?;
        query::delete_dish_type(&conn, id)
    }

    fn list_dishes(&self, filter: Option<&Prefix>) -> Result<Vec<DishWithType>, StoreError> {
        let conn = self.pool.get()?;
        query::find_dishes(&conn, filter)
    }

    fn get_dish(&self, id: i32) -> Result<DishDetail, StoreError> {
        let conn = self.pool.get()?;
        let (dish, dish_type) = query::find_dish(&conn, id)?;
        let cooks = query::find_cooks_of_dish(&conn, id)?;
        Ok(DishDetail {
            dish,
            dish_type,
            cooks,
        })
    }

    fn create_dish(&self, changes: &DishChanges) -> Result<Dish, StoreError> {
        let conn = self.pool.get()?;
        query::insert_dish(&conn, changes)
    }

    fn update_dish(&self, id: i32, changes: &DishChanges) -> Result<Dish, StoreError> {
        let conn = self.pool.get()?;
        query::update_dish(&conn, id, changes)
    }

    fn delete_dish(&self, id: i32) -> Result<(), StoreError> {
        let conn = self.pool.get()?;
        query::delete_dish(&conn, id)
    }

    fn list_cooks(&self, filter: Option<&Prefix>) -> Result<Vec<Cook>, StoreError> {
        let conn = self.pool.get()?;
        query::find_cooks(&conn, filter)
    }

    fn get_cook(&self, id: i32) -> Result<CookDetail, StoreError> {
        let conn = self.pool.get()?;
        let cook = query::find_cook(&conn, id)?;
        let dishes = query::find_dishes_of_cook(&conn, id)?;
        Ok(CookDetail { cook, dishes })
    }

    fn find_cook(&self, id: i32) -> Result<Cook, StoreError> {
        let conn = self.pool.get()?;
        query::find_cook(&conn, id)
    }

    fn create_cook(&self, new: &NewCook) -> Result<Cook, StoreError> {
        let conn = self.pool.get()?;
        query::insert_cook(&conn, new)
    }

    fn update_cook(&self, id: i32, changes: &NewCook) -> Result<Cook, StoreError> {
        let conn = self.pool.get()?;
        query::update_cook(&conn, id, changes)
    }

    fn delete_cook(&self, id: i32) -> Result<(), StoreError> {
        let conn = self.pool.get()?;
        query::delete_cook(&conn, id)
    }

    fn find_credentials(&self, username: &str) -> Result<Option<CookCredentials>, StoreError> {
        let conn = self.pool.get()?;
        query::find_credentials(&conn, username)
    }

    fn assign_cook(&self, dish_id: i32, cook_id: i32) -> Result<(), StoreError> {
        let conn = self.pool.get()?;
        query::insert_assignment(&conn, dish_id, cook_id)
    }

    fn unassign_cook(&self, dish_id: i32, cook_id: i32) -> Result<(), StoreError> {
        let conn = self.pool.get()?;
        query::delete_assignment(&conn, dish_id, cook_id)
    }

    fn is_assigned(&self, dish_id: i32, cook_id: i32) -> Result<bool, StoreError> {
        let conn = self.pool.get()?;
        query::assignment_exists(&conn, dish_id, cook_id)
    }
}
