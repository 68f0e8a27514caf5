use super::OptionalExt;
use crate::Database;
use crate::models::{ConversationRow, ConversationSummaryRow, MessageRow};
use anyhow::Result;
use rusqlite::params;

impl Database {
    /// Append a message, creating its conversation on first contact.
    ///
    /// The participant pair is normalized before lookup so both directions of
    /// the exchange land in the same row; lookup and insert run inside one
    /// transaction under the connection mutex. Returns the conversation id
    /// actually used (`conv_id` only when a new conversation was created).
    pub fn record_message(
        &self,
        conv_id: &str,
        msg_id: &str,
        listing_id: &str,
        sender_id: &str,
        receiver_id: &str,
        content: &str,
        now: &str,
    ) -> Result<String> {
        let (low, high) = if sender_id <= receiver_id {
            (sender_id, receiver_id)
        } else {
            (receiver_id, sender_id)
        };

        self.with_conn(|conn| {
            let tx = conn.unchecked_transaction()?;

            let existing: Option<String> = tx
                .query_row(
                    "SELECT id FROM conversations \
                     WHERE listing_id = ?1 AND participant_low = ?2 AND participant_high = ?3",
                    params![listing_id, low, high],
                    |row| row.get(0),
                )
                .optional()?;

            let conversation_id = match existing {
                Some(id) => {
                    tx.execute(
                        "UPDATE conversations SET last_message_at = ?2 WHERE id = ?1",
                        params![id, now],
                    )?;
                    id
                }
                None => {
                    tx.execute(
                        "INSERT INTO conversations \
                         (id, listing_id, participant_low, participant_high, created_at, last_message_at) \
                         VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
                        params![conv_id, listing_id, low, high, now],
                    )?;
                    conv_id.to_string()
                }
            };

            tx.execute(
                "INSERT INTO messages \
                 (id, conversation_id, listing_id, sender_id, receiver_id, content, is_read, created_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, ?7)",
                params![msg_id, conversation_id, listing_id, sender_id, receiver_id, content, now],
            )?;

            tx.commit()?;
            Ok(conversation_id)
        })
    }

    pub fn get_conversation(&self, id: &str) -> Result<Option<ConversationRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, listing_id, participant_low, participant_high, created_at, \
                 last_message_at FROM conversations WHERE id = ?1",
            )?;
            stmt.query_row([id], |row| {
                Ok(ConversationRow {
                    id: row.get(0)?,
                    listing_id: row.get(1)?,
                    participant_low: row.get(2)?,
                    participant_high: row.get(3)?,
                    created_at: row.get(4)?,
                    last_message_at: row.get(5)?,
                })
            })
            .optional()
        })
    }

    /// Inbox view: one row per conversation with listing context, the other
    /// participant, a preview and the unread count, in a single query.
    pub fn conversation_summaries(&self, user_id: &str) -> Result<Vec<ConversationSummaryRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT c.id, c.listing_id, COALESCE(l.title, 'deleted listing'), \
                        json_extract(l.photos, '$[0]'), COALESCE(l.price, 0), \
                        other.id, other.pseudo, \
                        COALESCE((SELECT m.content FROM messages m \
                                  WHERE m.conversation_id = c.id \
                                  ORDER BY m.created_at DESC LIMIT 1), ''), \
                        COALESCE((SELECT m.created_at FROM messages m \
                                  WHERE m.conversation_id = c.id \
                                  ORDER BY m.created_at DESC LIMIT 1), c.created_at), \
                        (SELECT COUNT(*) FROM messages m \
                         WHERE m.conversation_id = c.id AND m.receiver_id = ?1 AND m.is_read = 0) \
                 FROM conversations c \
                 LEFT JOIN listings l ON l.id = c.listing_id \
                 JOIN users other ON other.id = CASE WHEN c.participant_low = ?1 \
                                                     THEN c.participant_high \
                                                     ELSE c.participant_low END \
                 WHERE c.participant_low = ?1 OR c.participant_high = ?1 \
                 ORDER BY c.last_message_at DESC",
            )?;

            let rows = stmt
                .query_map([user_id], |row| {
                    Ok(ConversationSummaryRow {
                        id: row.get(0)?,
                        listing_id: row.get(1)?,
                        listing_title: row.get(2)?,
                        listing_photo: row.get(3)?,
                        listing_price: row.get(4)?,
                        other_user_id: row.get(5)?,
                        other_user_name: row.get(6)?,
                        last_message: row.get(7)?,
                        last_message_at: row.get(8)?,
                        unread_count: row.get(9)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Oldest first. JOINs fetch the display names in one query.
    pub fn messages_in_conversation(&self, conversation_id: &str) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT m.id, m.conversation_id, m.listing_id, \
                        COALESCE(l.title, 'deleted listing'), \
                        m.sender_id, COALESCE(su.pseudo, 'unknown'), \
                        m.receiver_id, COALESCE(ru.pseudo, 'unknown'), \
                        m.content, m.is_read, m.created_at \
                 FROM messages m \
                 LEFT JOIN listings l ON l.id = m.listing_id \
                 LEFT JOIN users su ON su.id = m.sender_id \
                 LEFT JOIN users ru ON ru.id = m.receiver_id \
                 WHERE m.conversation_id = ?1 \
                 ORDER BY m.created_at ASC",
            )?;

            let rows = stmt
                .query_map([conversation_id], |row| {
                    Ok(MessageRow {
                        id: row.get(0)?,
                        conversation_id: row.get(1)?,
                        listing_id: row.get(2)?,
                        listing_title: row.get(3)?,
                        sender_id: row.get(4)?,
                        sender_name: row.get(5)?,
                        receiver_id: row.get(6)?,
                        receiver_name: row.get(7)?,
                        content: row.get(8)?,
                        is_read: row.get(9)?,
                        created_at: row.get(10)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Reading a conversation is the sole trigger that flips read state.
    pub fn mark_conversation_read(&self, conversation_id: &str, receiver_id: &str) -> Result<usize> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "UPDATE messages SET is_read = 1 \
                 WHERE conversation_id = ?1 AND receiver_id = ?2 AND is_read = 0",
                params![conversation_id, receiver_id],
            )?;
            Ok(n)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::super::testutil;
    use crate::now_ts;

    fn setup() -> crate::Database {
        let db = testutil::db();
        db.create_user(&testutil::user("buyer", "b@example.com", "0600000001"))
            .unwrap();
        db.create_user(&testutil::user("owner", "o@example.com", "0600000002"))
            .unwrap();
        db.insert_listing(&testutil::listing("l1", "owner", "approved"))
            .unwrap();
        db
    }

    #[test]
    fn both_directions_reuse_one_conversation() {
        let db = setup();

        let c1 = db
            .record_message("c1", "m1", "l1", "buyer", "owner", "hello", &now_ts())
            .unwrap();
        let c2 = db
            .record_message("c2", "m2", "l1", "owner", "buyer", "hi there", &now_ts())
            .unwrap();

        assert_eq!(c1, c2);
        assert_eq!(db.messages_in_conversation(&c1).unwrap().len(), 2);
    }

    #[test]
    fn different_listing_gets_its_own_conversation() {
        let db = setup();
        db.insert_listing(&testutil::listing("l2", "owner", "approved"))
            .unwrap();

        let c1 = db
            .record_message("c1", "m1", "l1", "buyer", "owner", "about l1", &now_ts())
            .unwrap();
        let c2 = db
            .record_message("c2", "m2", "l2", "buyer", "owner", "about l2", &now_ts())
            .unwrap();

        assert_ne!(c1, c2);
    }

    #[test]
    fn reading_marks_only_the_receivers_messages() {
        let db = setup();

        let conv = db
            .record_message("c1", "m1", "l1", "buyer", "owner", "one", &now_ts())
            .unwrap();
        db.record_message("c1", "m2", "l1", "buyer", "owner", "two", &now_ts())
            .unwrap();

        let summaries = db.conversation_summaries("owner").unwrap();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].unread_count, 2);
        assert_eq!(summaries[0].last_message, "two");

        // The sender reading the thread changes nothing.
        assert_eq!(db.mark_conversation_read(&conv, "buyer").unwrap(), 0);
        // The receiver reading it clears the counter.
        assert_eq!(db.mark_conversation_read(&conv, "owner").unwrap(), 2);
        assert_eq!(db.conversation_summaries("owner").unwrap()[0].unread_count, 0);
    }

    #[test]
    fn messages_carry_display_names() {
        let db = setup();
        let conv = db
            .record_message("c1", "m1", "l1", "buyer", "owner", "hello", &now_ts())
            .unwrap();

        let messages = db.messages_in_conversation(&conv).unwrap();
        assert_eq!(messages[0].sender_name, "pseudo buyer");
        assert_eq!(messages[0].receiver_name, "pseudo owner");
        assert_eq!(messages[0].listing_title, "Listing l1");
    }
}
