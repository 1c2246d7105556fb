//! Esquema Diesel (declarado manualmente, reemplazable con `diesel print-schema`).

diesel::table! {
    workflow_events (id) {
        id -> Uuid,
        workflow_id -> Uuid,
        seq -> BigInt,
        event_type -> Text,
        payload -> Jsonb,
        checkpoint_id -> Nullable<Uuid>,
        ts -> Timestamptz,
    }
}

diesel::table! {
    workflow_checkpoints (id) {
        id -> Uuid,
        workflow_id -> Uuid,
        seq -> BigInt,
        state -> Jsonb,
        size_bytes -> BigInt,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    workflow_signals (id) {
        id -> Uuid,
        workflow_id -> Uuid,
        signal_name -> Text,
        payload -> Jsonb,
        received_at -> Timestamptz,
        processed -> Bool,
        processed_at -> Nullable<Timestamptz>,
    }
}

diesel::allow_tables_to_appear_in_same_query!(workflow_events, workflow_checkpoints, workflow_signals,);
