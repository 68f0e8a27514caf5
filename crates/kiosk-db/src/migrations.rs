use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id                  TEXT PRIMARY KEY,
            email               TEXT NOT NULL UNIQUE,
            phone               TEXT NOT NULL UNIQUE,
            password            TEXT NOT NULL,
            first_name          TEXT NOT NULL,
            last_name           TEXT NOT NULL,
            pseudo              TEXT NOT NULL,
            birth_date          TEXT NOT NULL,
            email_verified      INTEGER NOT NULL DEFAULT 0,
            email_token         TEXT,
            email_token_expires TEXT,
            identity_verified   INTEGER NOT NULL DEFAULT 0,
            identity_status     TEXT,
            is_admin            INTEGER NOT NULL DEFAULT 0,
            created_at          TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS listings (
            id                  TEXT PRIMARY KEY,
            user_id             TEXT NOT NULL REFERENCES users(id),
            user_name           TEXT NOT NULL,
            title               TEXT NOT NULL,
            description         TEXT NOT NULL,
            price               REAL NOT NULL,
            category            TEXT NOT NULL,
            sub_category        TEXT NOT NULL,
            location            TEXT NOT NULL,
            latitude            REAL,
            longitude           REAL,
            photos              TEXT NOT NULL DEFAULT '[]',
            details             TEXT NOT NULL,
            status              TEXT NOT NULL DEFAULT 'pending',
            rejection_reason    TEXT,
            is_boosted          INTEGER NOT NULL DEFAULT 0,
            boost_until         TEXT,
            views               INTEGER NOT NULL DEFAULT 0,
            has_extra_photos    INTEGER NOT NULL DEFAULT 0,
            created_at          TEXT NOT NULL,
            expires_at          TEXT NOT NULL,
            last_repost_date    TEXT,
            validated_at        TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_listings_search
            ON listings(status, expires_at);
        CREATE INDEX IF NOT EXISTS idx_listings_owner
            ON listings(user_id, created_at);

        -- One conversation per (listing, participant pair). The pair is
        -- stored normalized (low < high) so both send directions hit the
        -- same row and the UNIQUE constraint closes the duplicate window.
        -- listing_id is deliberately not a foreign key: threads outlive a
        -- hard-deleted listing.
        CREATE TABLE IF NOT EXISTS conversations (
            id               TEXT PRIMARY KEY,
            listing_id       TEXT NOT NULL,
            participant_low  TEXT NOT NULL REFERENCES users(id),
            participant_high TEXT NOT NULL REFERENCES users(id),
            created_at       TEXT NOT NULL,
            last_message_at  TEXT NOT NULL,
            UNIQUE(listing_id, participant_low, participant_high)
        );

        CREATE TABLE IF NOT EXISTS messages (
            id              TEXT PRIMARY KEY,
            conversation_id TEXT NOT NULL REFERENCES conversations(id),
            listing_id      TEXT NOT NULL,
            sender_id       TEXT NOT NULL REFERENCES users(id),
            receiver_id     TEXT NOT NULL REFERENCES users(id),
            content         TEXT NOT NULL,
            is_read         INTEGER NOT NULL DEFAULT 0,
            created_at      TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_messages_conversation
            ON messages(conversation_id, created_at);
        CREATE INDEX IF NOT EXISTS idx_messages_unread
            ON messages(receiver_id, is_read);

        CREATE TABLE IF NOT EXISTS favorites (
            id          TEXT PRIMARY KEY,
            user_id     TEXT NOT NULL REFERENCES users(id),
            listing_id  TEXT NOT NULL,
            created_at  TEXT NOT NULL,
            UNIQUE(user_id, listing_id)
        );

        -- Append-only log of simulated transactions; rows are only ever
        -- inserted with status 'completed'.
        CREATE TABLE IF NOT EXISTS payments (
            id            TEXT PRIMARY KEY,
            user_id       TEXT NOT NULL REFERENCES users(id),
            listing_id    TEXT NOT NULL,
            kind          TEXT NOT NULL,
            amount        REAL NOT NULL,
            duration_days INTEGER,
            method        TEXT NOT NULL,
            status        TEXT NOT NULL,
            created_at    TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS reports (
            id            TEXT PRIMARY KEY,
            listing_id    TEXT NOT NULL,
            listing_title TEXT NOT NULL,
            reporter_id   TEXT NOT NULL REFERENCES users(id),
            reporter_name TEXT NOT NULL,
            reason        TEXT NOT NULL,
            details       TEXT,
            status        TEXT NOT NULL DEFAULT 'pending',
            action        TEXT,
            resolved_at   TEXT,
            created_at    TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS verifications (
            id             TEXT PRIMARY KEY,
            user_id        TEXT NOT NULL REFERENCES users(id),
            user_email     TEXT NOT NULL,
            user_name      TEXT NOT NULL,
            id_photo_front TEXT NOT NULL,
            id_photo_back  TEXT NOT NULL,
            selfie_photo   TEXT NOT NULL,
            status         TEXT NOT NULL DEFAULT 'pending',
            created_at     TEXT NOT NULL
        );

        -- Fallback inbox for admin notices when no mail relay is configured.
        CREATE TABLE IF NOT EXISTS notifications (
            id          TEXT PRIMARY KEY,
            kind        TEXT NOT NULL,
            user_id     TEXT,
            body        TEXT NOT NULL,
            is_read     INTEGER NOT NULL DEFAULT 0,
            created_at  TEXT NOT NULL
        );
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
