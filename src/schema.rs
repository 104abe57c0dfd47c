table! {
    dish_type (id) {
        id -> Integer,
        name -> Varchar,
    }
}

table! {
    cook (id) {
        id -> Integer,
        username -> Varchar,
        first_name -> Varchar,
        last_name -> Varchar,
        password -> Varchar,
        years_of_experience -> Nullable<Integer>,
    }
}

table! {
    dish (id) {
        id -> Integer,
        name -> Varchar,
        description -> Text,
        price -> Numeric,
        dish_type_id -> Integer,
    }
}

table! {
    dish_cooks (dish_id, cook_id) {
        dish_id -> Integer,
        cook_id -> Integer,
    }
}

joinable!(dish -> dish_type (dish_type_id));
joinable!(dish_cooks -> dish (dish_id));
joinable!(dish_cooks -> cook (cook_id));

allow_tables_to_appear_in_same_query!(dish_type, cook, dish, dish_cooks);
