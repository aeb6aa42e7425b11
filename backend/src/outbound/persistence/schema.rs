//! Diesel table definitions for the PostgreSQL schema.
//!
//! These definitions must match `backend/migrations` exactly. Regenerate with
//! `diesel print-schema` after changing a migration.

diesel::table! {
    /// Group-scoped tasks.
    ///
    /// `id` and `created_at` are assigned by the database on insert; `seq`
    /// breaks ties between rows stamped within the same transaction.
    tasks (id) {
        /// Primary key: UUID v4 assigned by `gen_random_uuid()`.
        id -> Uuid,
        /// Insertion sequence.
        seq -> Int8,
        /// Trimmed, non-empty title.
        title -> Text,
        /// Completion flag.
        completed -> Bool,
        /// Owning group; the only filter column.
        group_id -> Text,
        /// Server-assigned creation time; the sort key.
        created_at -> Timestamptz,
    }
}

diesel::table! {
    /// Platform user documents keyed by the platform id rendered as text.
    users (id) {
        /// Platform user id as text.
        id -> Text,
        /// Raw JSON document, possibly carrying legacy field names.
        document -> Jsonb,
        /// Last write time.
        updated_at -> Timestamptz,
    }
}
