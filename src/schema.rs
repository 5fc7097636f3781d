// Database schema definitions
diesel::table! {
    admins (id) {
        id -> Integer,
        username -> Text,
        password -> Text,
    }
}

diesel::table! {
    users (id) {
        id -> Integer,
        name -> Text,
        email -> Text,
        password -> Text,
        whatsapp -> Nullable<Text>,
        created_at -> Nullable<Timestamp>,
        updated_at -> Nullable<Timestamp>,
    }
}

diesel::table! {
    products (id) {
        id -> Integer,
        name -> Text,
        description -> Nullable<Text>,
        price -> Double,
        category -> Text,
        status -> Text,
        gender -> Nullable<Text>,
        image_url -> Nullable<Text>,
        images -> Nullable<Text>,
        sizes -> Nullable<Text>,
    }
}

diesel::table! {
    user_favourites (id) {
        id -> Integer,
        user_id -> Integer,
        product_id -> Integer,
        created_at -> Timestamp,
    }
}

diesel::table! {
    sessions (id) {
        id -> Integer,
        session_id -> Text,
        username -> Text,
        user_type -> Text,
        user_id -> Nullable<Integer>,
        created_at -> Timestamp,
        expires_at -> Timestamp,
        is_active -> Bool,
    }
}

diesel::table! {
    feedback (id) {
        id -> Integer,
        name -> Text,
        email -> Text,
        message -> Text,
        created_at -> Timestamp,
    }
}

diesel::joinable!(user_favourites -> users (user_id));
diesel::joinable!(user_favourites -> products (product_id));

diesel::allow_tables_to_appear_in_same_query!(
    admins, users, products, user_favourites, sessions, feedback,
);
