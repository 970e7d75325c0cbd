use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id          TEXT PRIMARY KEY,
            email       TEXT NOT NULL UNIQUE,
            name        TEXT NOT NULL,
            password    TEXT NOT NULL,
            couple_id   TEXT REFERENCES couples(id),
            boundaries  TEXT NOT NULL DEFAULT '[]',
            created_at  TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_users_couple
            ON users(couple_id);

        CREATE TABLE IF NOT EXISTS couples (
            id           TEXT PRIMARY KEY,
            user1_id     TEXT NOT NULL REFERENCES users(id),
            user2_id     TEXT NOT NULL REFERENCES users(id),
            pairing_code TEXT NOT NULL,
            created_at   TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS moods (
            id          TEXT PRIMARY KEY,
            couple_id   TEXT NOT NULL REFERENCES couples(id),
            user_id     TEXT NOT NULL REFERENCES users(id),
            mood_type   TEXT NOT NULL,
            intensity   INTEGER NOT NULL,
            expires_at  TEXT NOT NULL,
            created_at  TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_moods_couple_expiry
            ON moods(couple_id, expires_at);

        CREATE TABLE IF NOT EXISTS tasks (
            id               TEXT PRIMARY KEY,
            couple_id        TEXT NOT NULL REFERENCES couples(id),
            creator_id       TEXT NOT NULL REFERENCES users(id),
            receiver_id      TEXT NOT NULL REFERENCES users(id),
            title            TEXT NOT NULL,
            description      TEXT NOT NULL,
            reward           TEXT,
            duration_minutes INTEGER NOT NULL,
            tokens_earned    INTEGER NOT NULL CHECK (tokens_earned >= 0),
            status           TEXT NOT NULL DEFAULT 'pending',
            proof_text       TEXT,
            proof_photo      TEXT,
            approval_message TEXT,
            created_at       TEXT NOT NULL,
            expires_at       TEXT NOT NULL,
            completed_at     TEXT,
            approved_at      TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_tasks_couple
            ON tasks(couple_id, created_at);

        CREATE INDEX IF NOT EXISTS idx_tasks_status_expiry
            ON tasks(status, expires_at);

        CREATE TABLE IF NOT EXISTS user_tokens (
            id              TEXT PRIMARY KEY,
            couple_id       TEXT NOT NULL REFERENCES couples(id),
            user_id         TEXT NOT NULL REFERENCES users(id),
            tokens          INTEGER NOT NULL DEFAULT 0 CHECK (tokens >= 0),
            lifetime_tokens INTEGER NOT NULL DEFAULT 0,
            updated_at      TEXT NOT NULL,
            UNIQUE(user_id, couple_id)
        );

        CREATE TABLE IF NOT EXISTS rewards (
            id          TEXT PRIMARY KEY,
            couple_id   TEXT NOT NULL REFERENCES couples(id),
            creator_id  TEXT NOT NULL REFERENCES users(id),
            title       TEXT NOT NULL,
            description TEXT NOT NULL,
            tokens_cost INTEGER NOT NULL CHECK (tokens_cost > 0),
            redeemed_by TEXT REFERENCES users(id),
            redeemed_at TEXT,
            created_at  TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_rewards_couple
            ON rewards(couple_id, created_at);
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
