pub const MIGRATIONS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS session_state (
        key TEXT PRIMARY KEY,
        value_json TEXT NOT NULL
    )
    "#,
];
