use std::collections::BTreeSet;
use std::convert::TryFrom;

use diesel::dsl::exists;
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use diesel::sql_types::{BigInt, Text, Unsigned};

use crate::models::{
    Cook, CookCredentials, Counts, Dish, DishChanges, DishType, DishWithType, NewCook,
    NewDishType,
};
use crate::schema::{cook, dish, dish_cooks, dish_type};
use crate::search::Prefix;
use crate::store::StoreError;

sql_function!(fn lower(x: Text) -> Text);
no_arg_sql_function!(last_insert_id, Unsigned<BigInt>);

type CookColumns = (
    cook::id,
    cook::username,
    cook::first_name,
    cook::last_name,
    cook::years_of_experience,
);

const COOK_COLUMNS: CookColumns = (
    cook::id,
    cook::username,
    cook::first_name,
    cook::last_name,
    cook::years_of_experience,
);

fn inserted_id(conn: &MysqlConnection) -> Result<i32, StoreError> {
    let raw: u64 = diesel::select(last_insert_id).get_result(conn)?;
    i32::try_from(raw).map_err(|err| StoreError::Query(format!("inserted id out of range: {err}")))
}

fn unique_violation(err: DieselError, entity: &'static str, field: &'static str) -> StoreError {
    match err {
        DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
            StoreError::Duplicate { entity, field }
        }
        other => other.into(),
    }
}

fn missing_reference(err: DieselError, field: &'static str, id: i32) -> StoreError {
    match err {
        DieselError::DatabaseError(DatabaseErrorKind::ForeignKeyViolation, _) => {
            StoreError::MissingReference { field, id }
        }
        other => other.into(),
    }
}

fn violation(err: &DieselError) -> Option<&DatabaseErrorKind> {
    match err {
        DieselError::DatabaseError(kind, _) => Some(kind),
        _ => None,
    }
}

fn not_found(entity: &'static str, id: i32) -> StoreError {
    StoreError::NotFound { entity, id }
}

pub(crate) fn count_all(conn: &MysqlConnection) -> Result<Counts, StoreError> {
    Ok(Counts {
        num_dish_types: dish_type::table.count().get_result(conn)?,
        num_dishes: dish::table.count().get_result(conn)?,
        num_cooks: cook::table.count().get_result(conn)?,
    })
}

pub(crate) fn find_dish_types(
    conn: &MysqlConnection,
    filter: Option<&Prefix>,
) -> Result<Vec<DishType>, StoreError> {
    let mut query = dish_type::table.order(dish_type::name.asc()).into_boxed();
    if let Some(prefix) = filter {
        query = query.filter(lower(dish_type::name).like(prefix.like_pattern()));
    }
    Ok(query.load(conn)?)
}

pub(crate) fn find_dish_type(conn: &MysqlConnection, id: i32) -> Result<DishType, StoreError> {
    dish_type::table
        .find(id)
        .first(conn)
        .optional()?
        .ok_or_else(|| not_found("dish type", id))
}

pub(crate) fn find_dishes_of_type(
    conn: &MysqlConnection,
    type_id: i32,
) -> Result<Vec<Dish>, StoreError> {
    Ok(dish::table
        .filter(dish::dish_type_id.eq(type_id))
        .order(dish::name.asc())
        .load(conn)?)
}

pub(crate) fn insert_dish_type(
    conn: &MysqlConnection,
    new: &NewDishType,
) -> Result<DishType, StoreError> {
    conn.transaction::<_, StoreError, _>(|| {
        diesel::insert_into(dish_type::table)
            .values(new)
            .execute(conn)
            .map_err(|err| unique_violation(err, "dish type", "name"))?;
        let id = inserted_id(conn)?;
        find_dish_type(conn, id)
    })
}

pub(crate) fn update_dish_type(
    conn: &MysqlConnection,
    id: i32,
    changes: &NewDishType,
) -> Result<DishType, StoreError> {
    conn.transaction::<_, StoreError, _>(|| {
        find_dish_type(conn, id)?;
        diesel::update(dish_type::table.find(id))
            .set(changes)
            .execute(conn)
            .map_err(|err| unique_violation(err, "dish type", "name"))?;
        find_dish_type(conn, id)
    })
}

// Dishes and their assignments go with the type through ON DELETE CASCADE.
pub(crate) fn delete_dish_type(conn: &MysqlConnection, id: i32) -> Result<(), StoreError> {
    let deleted = diesel::delete(dish_type::table.find(id)).execute(conn)?;
    if deleted == 0 {
        return Err(not_found("dish type", id));
    }
    Ok(())
}

pub(crate) fn find_dishes(
    conn: &MysqlConnection,
    filter: Option<&Prefix>,
) -> Result<Vec<DishWithType>, StoreError> {
    let mut query = dish::table
        .inner_join(dish_type::table)
        .select((dish::all_columns, dish_type::all_columns))
        .order((dish_type::name.asc(), dish::name.asc()))
        .into_boxed();
    if let Some(prefix) = filter {
        query = query.filter(lower(dish::name).like(prefix.like_pattern()));
    }
    let rows = query.load::<(Dish, DishType)>(conn)?;
    Ok(rows
        .into_iter()
        .map(|(dish, dish_type)| DishWithType { dish, dish_type })
        .collect())
}

pub(crate) fn find_dish(conn: &MysqlConnection, id: i32) -> Result<(Dish, DishType), StoreError> {
    dish::table
        .inner_join(dish_type::table)
        .filter(dish::id.eq(id))
        .select((dish::all_columns, dish_type::all_columns))
        .first(conn)
        .optional()?
        .ok_or_else(|| not_found("dish", id))
}

pub(crate) fn find_cooks_of_dish(
    conn: &MysqlConnection,
    dish_id: i32,
) -> Result<Vec<Cook>, StoreError> {
    Ok(dish_cooks::table
        .inner_join(cook::table)
        .filter(dish_cooks::dish_id.eq(dish_id))
        .select(COOK_COLUMNS)
        .order(cook::id.asc())
        .load(conn)?)
}

fn ensure_dish_type_exists(conn: &MysqlConnection, type_id: i32) -> Result<(), StoreError> {
    let found = dish_type::table
        .find(type_id)
        .select(dish_type::id)
        .first::<i32>(conn)
        .optional()?;
    match found {
        Some(_) => Ok(()),
        None => Err(StoreError::MissingReference {
            field: "dish_type",
            id: type_id,
        }),
    }
}

fn missing_cook(conn: &MysqlConnection, wanted: &BTreeSet<i32>) -> Result<Option<i32>, StoreError> {
    let known: BTreeSet<i32> = cook::table
        .filter(cook::id.eq_any(wanted.iter().copied().collect::<Vec<_>>()))
        .select(cook::id)
        .load::<i32>(conn)?
        .into_iter()
        .collect();
    Ok(wanted.difference(&known).next().copied())
}

fn replace_cooks(conn: &MysqlConnection, dish_id: i32, cook_ids: &[i32]) -> Result<(), StoreError> {
    let wanted: BTreeSet<i32> = cook_ids.iter().copied().collect();
    if wanted.is_empty() {
        diesel::delete(dish_cooks::table.filter(dish_cooks::dish_id.eq(dish_id))).execute(conn)?;
        return Ok(());
    }
    if let Some(missing) = missing_cook(conn, &wanted)? {
        return Err(StoreError::MissingReference {
            field: "cooks",
            id: missing,
        });
    }

    diesel::delete(dish_cooks::table.filter(dish_cooks::dish_id.eq(dish_id))).execute(conn)?;
    // One row at a time so a cook deleted since the check is named exactly.
    for cook_id in &wanted {
        diesel::insert_into(dish_cooks::table)
            .values((
                dish_cooks::dish_id.eq(dish_id),
                dish_cooks::cook_id.eq(*cook_id),
            ))
            .execute(conn)
            .map_err(|err| missing_reference(err, "cooks", *cook_id))?;
    }
    Ok(())
}

pub(crate) fn insert_dish(conn: &MysqlConnection, changes: &DishChanges) -> Result<Dish, StoreError> {
    conn.transaction::<_, StoreError, _>(|| {
        let type_id = changes.dish.dish_type_id;
        ensure_dish_type_exists(conn, type_id)?;
        diesel::insert_into(dish::table)
            .values(&changes.dish)
            .execute(conn)
            .map_err(|err| missing_reference(err, "dish_type", type_id))?;
        let id = inserted_id(conn)?;
        replace_cooks(conn, id, &changes.cook_ids)?;
        Ok(find_dish(conn, id)?.0)
    })
}

pub(crate) fn update_dish(
    conn: &MysqlConnection,
    id: i32,
    changes: &DishChanges,
) -> Result<Dish, StoreError> {
    conn.transaction::<_, StoreError, _>(|| {
        find_dish(conn, id)?;
        let type_id = changes.dish.dish_type_id;
        ensure_dish_type_exists(conn, type_id)?;
        diesel::update(dish::table.find(id))
            .set(&changes.dish)
            .execute(conn)
            .map_err(|err| missing_reference(err, "dish_type", type_id))?;
        replace_cooks(conn, id, &changes.cook_ids)?;
        Ok(find_dish(conn, id)?.0)
    })
}

pub(crate) fn delete_dish(conn: &MysqlConnection, id: i32) -> Result<(), StoreError> {
    let deleted = diesel::delete(dish::table.find(id)).execute(conn)?;
    if deleted == 0 {
        return Err(not_found("dish", id));
    }
    Ok(())
}

pub(crate) fn find_cooks(
    conn: &MysqlConnection,
    filter: Option<&Prefix>,
) -> Result<Vec<Cook>, StoreError> {
    let mut query = cook::table
        .select(COOK_COLUMNS)
        .order(cook::id.asc())
        .into_boxed();
    if let Some(prefix) = filter {
        query = query.filter(lower(cook::username).like(prefix.like_pattern()));
    }
    Ok(query.load(conn)?)
}

pub(crate) fn find_cook(conn: &MysqlConnection, id: i32) -> Result<Cook, StoreError> {
    cook::table
        .find(id)
        .select(COOK_COLUMNS)
        .first(conn)
        .optional()?
        .ok_or_else(|| not_found("cook", id))
}

pub(crate) fn find_dishes_of_cook(
    conn: &MysqlConnection,
    cook_id: i32,
) -> Result<Vec<Dish>, StoreError> {
    Ok(dish_cooks::table
        .inner_join(dish::table.inner_join(dish_type::table))
        .filter(dish_cooks::cook_id.eq(cook_id))
        .order((dish_type::name.asc(), dish::name.asc()))
        .select(dish::all_columns)
        .load(conn)?)
}

pub(crate) fn find_credentials(
    conn: &MysqlConnection,
    username: &str,
) -> Result<Option<CookCredentials>, StoreError> {
    Ok(cook::table
        .filter(cook::username.eq(username))
        .select((cook::id, cook::password))
        .first(conn)
        .optional()?)
}

pub(crate) fn insert_cook(conn: &MysqlConnection, new: &NewCook) -> Result<Cook, StoreError> {
    conn.transaction::<_, StoreError, _>(|| {
        diesel::insert_into(cook::table)
            .values(new)
            .execute(conn)
            .map_err(|err| unique_violation(err, "cook", "username"))?;
        let id = inserted_id(conn)?;
        find_cook(conn, id)
    })
}

pub(crate) fn update_cook(
    conn: &MysqlConnection,
    id: i32,
    changes: &NewCook,
) -> Result<Cook, StoreError> {
    conn.transaction::<_, StoreError, _>(|| {
        find_cook(conn, id)?;
        diesel::update(cook::table.find(id))
            .set(changes)
            .execute(conn)
            .map_err(|err| unique_violation(err, "cook", "username"))?;
        find_cook(conn, id)
    })
}

pub(crate) fn delete_cook(conn: &MysqlConnection, id: i32) -> Result<(), StoreError> {
    let deleted = diesel::delete(cook::table.find(id)).execute(conn)?;
    if deleted == 0 {
        return Err(not_found("cook", id));
    }
    Ok(())
}

pub(crate) fn assignment_exists(
    conn: &MysqlConnection,
    dish_id: i32,
    cook_id: i32,
) -> Result<bool, StoreError> {
    find_dish(conn, dish_id)?;
    find_cook(conn, cook_id)?;
    Ok(diesel::select(exists(dish_cooks::table.find((dish_id, cook_id)))).get_result(conn)?)
}

pub(crate) fn insert_assignment(
    conn: &MysqlConnection,
    dish_id: i32,
    cook_id: i32,
) -> Result<(), StoreError> {
    conn.transaction::<_, StoreError, _>(|| {
        if assignment_exists(conn, dish_id, cook_id)? {
            return Ok(());
        }
        let inserted = diesel::insert_into(dish_cooks::table)
            .values((
                dish_cooks::dish_id.eq(dish_id),
                dish_cooks::cook_id.eq(cook_id),
            ))
            .execute(conn);
        match inserted {
            Ok(_) => Ok(()),
            // A concurrent toggle got there first.
            Err(err) if matches!(violation(&err), Some(DatabaseErrorKind::UniqueViolation)) => {
                Ok(())
            }
            // The dish vanished meanwhile. A vanished cook is caught by the
            // login check of the next request.
            Err(err) if matches!(violation(&err), Some(DatabaseErrorKind::ForeignKeyViolation)) => {
                Err(not_found("dish", dish_id))
            }
            Err(err) => Err(err.into()),
        }
    })
}

pub(crate) fn delete_assignment(
    conn: &MysqlConnection,
    dish_id: i32,
    cook_id: i32,
) -> Result<(), StoreError> {
    find_dish(conn, dish_id)?;
    find_cook(conn, cook_id)?;
    diesel::delete(dish_cooks::table.find((dish_id, cook_id))).execute(conn)?;
    Ok(())
}
