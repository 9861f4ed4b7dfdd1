pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS subscriptions (
    uniq INTEGER PRIMARY KEY AUTOINCREMENT,
    source_id INTEGER NOT NULL,
    feed_url TEXT NOT NULL,
    channel INTEGER NOT NULL,
    server INTEGER NOT NULL,
    user INTEGER NOT NULL,
    name TEXT NOT NULL,
    date TEXT NOT NULL,
    mentions TEXT NOT NULL DEFAULT '[]',
    accessible INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    UNIQUE(channel, feed_url)
);

CREATE INDEX IF NOT EXISTS idx_subscriptions_server ON subscriptions(server);
CREATE INDEX IF NOT EXISTS idx_subscriptions_feed_url ON subscriptions(feed_url);
"#;
