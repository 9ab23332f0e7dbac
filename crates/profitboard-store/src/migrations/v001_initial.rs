//! v001 -- Initial schema creation.
//!
//! Creates `profiles` and `submissions`.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Profiles (one per identity-provider account)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS profiles (
    id         TEXT PRIMARY KEY NOT NULL,     -- identity UUID
    name       TEXT NOT NULL,
    discord    TEXT NOT NULL DEFAULT '',
    avatar_url TEXT,
    role       TEXT NOT NULL DEFAULT 'user' CHECK (role IN ('user', 'admin')),
    created_at TEXT NOT NULL                  -- RFC-3339, UTC, microseconds
);

CREATE INDEX IF NOT EXISTS idx_profiles_created_at ON profiles(created_at DESC);

-- ----------------------------------------------------------------
-- Submissions
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS submissions (
    id                    TEXT PRIMARY KEY NOT NULL,  -- UUID v4
    user_id               TEXT NOT NULL,              -- FK -> profiles(id)
    status                TEXT NOT NULL DEFAULT 'pending'
                          CHECK (status IN ('pending', 'approved', 'rejected')),

    product_name          TEXT,
    product_category      TEXT,
    product_brand         TEXT,
    product_sku           TEXT,
    marketplace           TEXT NOT NULL,
    reporting_period      TEXT NOT NULL,
    currency              TEXT NOT NULL,

    revenue               REAL NOT NULL CHECK (revenue >= 0),
    cost                  REAL NOT NULL CHECK (cost >= 0),
    profit                REAL NOT NULL CHECK (profit >= 0),
    profit_margin         REAL,
    cogs                  REAL,
    amazon_fees           REAL,
    units_sold            INTEGER,
    average_selling_price REAL,
    inventory_value       REAL,

    ppc_spend             REAL,
    ppc_sales             REAL,
    total_clicks          INTEGER,
    total_impressions     INTEGER,
    acos                  REAL,
    tacos                 REAL,

    conversion_rate       REAL,
    sessions              INTEGER,
    page_views            INTEGER,
    bsr                   INTEGER,
    reviews_count         INTEGER NOT NULL DEFAULT 0,
    average_rating        REAL,
    return_rate           REAL,

    date                  TEXT NOT NULL,
    note                  TEXT,
    proof_url             TEXT,
    approved_at           TEXT,
    created_at            TEXT NOT NULL,

    FOREIGN KEY (user_id) REFERENCES profiles(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_submissions_status_created
    ON submissions(status, created_at DESC);
CREATE INDEX IF NOT EXISTS idx_submissions_user_id ON submissions(user_id);
"#;

pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
