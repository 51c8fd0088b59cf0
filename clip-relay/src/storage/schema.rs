//! Table definitions. Every statement is idempotent.

use sqlx::SqlitePool;

/// Tables owned by the relay, in deletion-safe order.
pub(crate) const TABLES: [&str; 5] = [
    "sync_history",
    "clipboard_items",
    "device_channels",
    "devices",
    "channels",
];

const STATEMENTS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS channels (
        id TEXT PRIMARY KEY,
        created_at INTEGER NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS devices (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        device_type TEXT NOT NULL,
        last_seen_at INTEGER NOT NULL,
        is_online INTEGER NOT NULL DEFAULT 0,
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS device_channels (
        device_id TEXT NOT NULL,
        channel_id TEXT NOT NULL,
        is_active INTEGER NOT NULL DEFAULT 1,
        joined_at INTEGER NOT NULL,
        last_seen_at INTEGER NOT NULL,
        PRIMARY KEY (device_id, channel_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS clipboard_items (
        id TEXT PRIMARY KEY,
        channel_id TEXT NOT NULL,
        title TEXT,
        content TEXT NOT NULL,
        content_type TEXT NOT NULL,
        device_id TEXT NOT NULL,
        device_type TEXT NOT NULL,
        favorite INTEGER NOT NULL DEFAULT 0,
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS sync_history (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        channel_id TEXT NOT NULL,
        device_id TEXT NOT NULL,
        action TEXT NOT NULL,
        content TEXT NOT NULL,
        created_at INTEGER NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_device_channels_channel ON device_channels(channel_id)",
    "CREATE INDEX IF NOT EXISTS idx_items_channel_created ON clipboard_items(channel_id, created_at)",
    "CREATE INDEX IF NOT EXISTS idx_items_channel_type ON clipboard_items(channel_id, content_type)",
    "CREATE INDEX IF NOT EXISTS idx_items_channel_favorite ON clipboard_items(channel_id, favorite)",
    "CREATE INDEX IF NOT EXISTS idx_history_channel_created ON sync_history(channel_id, created_at)",
];

/// Create tables and indexes.
pub(crate) async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    for statement in STATEMENTS {
        sqlx::query(statement).execute(pool).await?;
    }
    Ok(())
}
