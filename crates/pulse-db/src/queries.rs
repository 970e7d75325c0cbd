use crate::Database;
use crate::models::{CoupleRow, MoodRow, RewardRow, TaskRow, TokenRow, UserRow};
use anyhow::{Result, anyhow};
use rusqlite::Connection;

/// Outcome of a pairing claim.
pub enum LinkOutcome {
    Linked(CoupleRow),
    /// The requester already has a couple_id.
    RequesterPaired,
    /// No unpaired user matches the code, or the claim lost a race.
    NoMatch,
}

/// Outcome of a proof submission.
pub enum ProofOutcome {
    Completed,
    /// The task was still pending but past its deadline; it was flipped to
    /// expired instead, and the proof was discarded.
    Expired,
    /// The task was not pending (already judged, expired or deleted).
    WrongState,
}

/// Outcome of judging a completed task.
pub enum JudgeOutcome {
    Approved { new_balance: i64 },
    Rejected,
    /// The task was not awaiting approval (or a concurrent judge won).
    WrongState,
    NotFound,
}

/// Outcome of a reward redemption.
pub enum RedeemOutcome {
    Redeemed { new_balance: i64 },
    NotFound,
    AlreadyRedeemed,
    InsufficientTokens,
}

impl Database {
    // -- Users --

    /// Returns false when the email is already taken, so a registration that
    /// loses the check-then-insert race still gets the duplicate-email answer
    /// rather than a raw constraint error.
    pub fn create_user(
        &self,
        id: &str,
        email: &str,
        name: &str,
        password_hash: &str,
        now: &str,
    ) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let inserted = conn.execute(
                "INSERT INTO users (id, email, name, password, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
                (id, email, name, password_hash, now),
            );
            match inserted {
                Ok(_) => Ok(true),
                Err(rusqlite::Error::SqliteFailure(e, _))
                    if e.code == rusqlite::ErrorCode::ConstraintViolation =>
                {
                    Ok(false)
                }
                Err(e) => Err(e.into()),
            }
        })
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!("{USER_COLS} WHERE email = ?1"))?;
            let row = stmt.query_row([email], map_user).optional()?;
            Ok(row)
        })
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user_by_id(conn, id))
    }

    /// The other member of a couple.
    pub fn get_partner(&self, couple_id: &str, user_id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare(&format!("{USER_COLS} WHERE couple_id = ?1 AND id <> ?2"))?;
            let row = stmt.query_row((couple_id, user_id), map_user).optional()?;
            Ok(row)
        })
    }

    // -- Pairing --

    /// Atomic "find unpaired + claim" step. A pairing code is the last six
    /// characters of the partner's user id, matched case-insensitively against
    /// the exact tail. The couple insert and both couple_id updates happen in
    /// one transaction; if either user was claimed in the meantime the whole
    /// claim rolls back, so two racing links can only produce one couple.
    pub fn link_partner(
        &self,
        requester_id: &str,
        code: &str,
        couple_id: &str,
        now: &str,
    ) -> Result<LinkOutcome> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let requester_couple: Option<Option<String>> = tx
                .query_row(
                    "SELECT couple_id FROM users WHERE id = ?1",
                    [requester_id],
                    |row| row.get(0),
                )
                .optional()?;
            match requester_couple {
                None => return Err(anyhow!("requester not found: {}", requester_id)),
                Some(Some(_)) => return Ok(LinkOutcome::RequesterPaired),
                Some(None) => {}
            }

            let partner_id: Option<String> = tx
                .query_row(
                    "SELECT id FROM users
                     WHERE couple_id IS NULL
                       AND id <> ?1
                       AND UPPER(SUBSTR(id, -6)) = UPPER(?2)
                     LIMIT 1",
                    (requester_id, code),
                    |row| row.get(0),
                )
                .optional()?;
            let Some(partner_id) = partner_id else {
                return Ok(LinkOutcome::NoMatch);
            };

            let pairing_code = code.to_uppercase();
            tx.execute(
                "INSERT INTO couples (id, user1_id, user2_id, pairing_code, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                (couple_id, requester_id, &partner_id, &pairing_code, now),
            )?;

            let claimed = tx.execute(
                "UPDATE users SET couple_id = ?1
                 WHERE id IN (?2, ?3) AND couple_id IS NULL",
                (couple_id, requester_id, &partner_id),
            )?;
            if claimed != 2 {
                // Someone got claimed between the lookup and the update.
                return Ok(LinkOutcome::NoMatch);
            }

            tx.commit()?;
            Ok(LinkOutcome::Linked(CoupleRow {
                id: couple_id.to_string(),
                user1_id: requester_id.to_string(),
                user2_id: partner_id,
                pairing_code,
                created_at: now.to_string(),
            }))
        })
    }

    // -- Moods --

    pub fn insert_mood(&self, mood: &MoodRow) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO moods (id, couple_id, user_id, mood_type, intensity, expires_at, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                (
                    &mood.id,
                    &mood.couple_id,
                    &mood.user_id,
                    &mood.mood_type,
                    mood.intensity,
                    &mood.expires_at,
                    &mood.created_at,
                ),
            )?;
            Ok(())
        })
    }

    /// Unexpired moods for a couple, newest first.
    pub fn active_moods(&self, couple_id: &str, now: &str, limit: u32) -> Result<Vec<MoodRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, couple_id, user_id, mood_type, intensity, expires_at, created_at
                 FROM moods
                 WHERE couple_id = ?1 AND expires_at > ?2
                 ORDER BY created_at DESC
                 LIMIT ?3",
            )?;
            let rows = stmt
                .query_map((couple_id, now, limit), |row| {
                    Ok(MoodRow {
                        id: row.get(0)?,
                        couple_id: row.get(1)?,
                        user_id: row.get(2)?,
                        mood_type: row.get(3)?,
                        intensity: row.get(4)?,
                        expires_at: row.get(5)?,
                        created_at: row.get(6)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    // -- Tasks --

    pub fn insert_task(&self, task: &TaskRow) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO tasks (id, couple_id, creator_id, receiver_id, title, description,
                                    reward, duration_minutes, tokens_earned, status, created_at, expires_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                (
                    &task.id,
                    &task.couple_id,
                    &task.creator_id,
                    &task.receiver_id,
                    &task.title,
                    &task.description,
                    &task.reward,
                    task.duration_minutes,
                    task.tokens_earned,
                    &task.status,
                    &task.created_at,
                    &task.expires_at,
                ),
            )?;
            Ok(())
        })
    }

    pub fn get_task(&self, id: &str) -> Result<Option<TaskRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!("{TASK_COLS} WHERE id = ?1"))?;
            let row = stmt.query_row([id], map_task).optional()?;
            Ok(row)
        })
    }

    pub fn list_tasks(&self, couple_id: &str, limit: u32) -> Result<Vec<TaskRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "{TASK_COLS} WHERE couple_id = ?1 ORDER BY created_at DESC LIMIT ?2"
            ))?;
            let rows = stmt
                .query_map((couple_id, limit), map_task)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// pending -> completed, conditional on the current status AND the
    /// deadline. A submission against an overdue pending task flips it to
    /// expired instead and discards the proof; a stale submission against a
    /// judged or expired task changes nothing. One transaction, so the status
    /// decision and the write cannot be observed apart.
    pub fn submit_proof(
        &self,
        task_id: &str,
        proof_text: Option<&str>,
        proof_photo: Option<&str>,
        now: &str,
    ) -> Result<ProofOutcome> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let completed = tx.execute(
                "UPDATE tasks
                 SET status = 'completed', proof_text = ?1, proof_photo = ?2, completed_at = ?3
                 WHERE id = ?4 AND status = 'pending' AND expires_at >= ?3",
                (proof_text, proof_photo, now, task_id),
            )?;
            if completed == 1 {
                tx.commit()?;
                return Ok(ProofOutcome::Completed);
            }

            let expired = tx.execute(
                "UPDATE tasks SET status = 'expired'
                 WHERE id = ?1 AND status = 'pending' AND expires_at < ?2",
                (task_id, now),
            )?;
            tx.commit()?;
            if expired == 1 {
                Ok(ProofOutcome::Expired)
            } else {
                Ok(ProofOutcome::WrongState)
            }
        })
    }

    /// completed -> approved|rejected. On approval the receiver's ledger is
    /// credited inside the same transaction as the status flip, so a retried
    /// approve can never double-credit: the second conditional update matches
    /// zero rows and the whole thing reports WrongState.
    pub fn judge_task(
        &self,
        task_id: &str,
        approve: bool,
        message: Option<&str>,
        token_record_id: &str,
        now: &str,
    ) -> Result<JudgeOutcome> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let task: Option<(String, String, i64)> = tx
                .query_row(
                    "SELECT receiver_id, couple_id, tokens_earned FROM tasks WHERE id = ?1",
                    [task_id],
                    |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
                )
                .optional()?;
            let Some((receiver_id, couple_id, tokens_earned)) = task else {
                return Ok(JudgeOutcome::NotFound);
            };

            let status = if approve { "approved" } else { "rejected" };
            let changed = tx.execute(
                "UPDATE tasks SET status = ?1, approved_at = ?2, approval_message = ?3
                 WHERE id = ?4 AND status = 'completed'",
                (status, now, message, task_id),
            )?;
            if changed != 1 {
                return Ok(JudgeOutcome::WrongState);
            }

            if !approve {
                tx.commit()?;
                return Ok(JudgeOutcome::Rejected);
            }

            let new_balance = credit_tokens_tx(
                &tx,
                token_record_id,
                &receiver_id,
                &couple_id,
                tokens_earned,
                now,
            )?;
            tx.commit()?;
            Ok(JudgeOutcome::Approved { new_balance })
        })
    }

    /// Delete, conditional on the task still being judged-or-judgeable.
    /// Terminal tasks stay on the record.
    pub fn delete_task(&self, task_id: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "DELETE FROM tasks WHERE id = ?1 AND status IN ('pending', 'completed')",
                [task_id],
            )?;
            Ok(changed == 1)
        })
    }

    /// Bulk pending -> expired for everything past its deadline. Returns the
    /// swept tasks so the caller can notify each couple. The predicate is
    /// keyed on 'pending', so completed tasks sitting in the approval queue
    /// are untouched.
    pub fn sweep_expired_tasks(&self, now: &str) -> Result<Vec<TaskRow>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let mut swept = {
                let mut stmt = tx.prepare(&format!(
                    "{TASK_COLS} WHERE status = 'pending' AND expires_at < ?1"
                ))?;
                stmt.query_map([now], map_task)?
                    .collect::<std::result::Result<Vec<_>, _>>()?
            };

            tx.execute(
                "UPDATE tasks SET status = 'expired'
                 WHERE status = 'pending' AND expires_at < ?1",
                [now],
            )?;

            tx.commit()?;
            for task in &mut swept {
                task.status = "expired".to_string();
            }
            Ok(swept)
        })
    }

    // -- Token ledger --

    /// Zero when no record exists; never an error.
    pub fn token_balance(&self, user_id: &str, couple_id: &str) -> Result<TokenRow> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT tokens, lifetime_tokens FROM user_tokens
                     WHERE user_id = ?1 AND couple_id = ?2",
                    (user_id, couple_id),
                    |row| {
                        Ok(TokenRow {
                            tokens: row.get(0)?,
                            lifetime_tokens: row.get(1)?,
                        })
                    },
                )
                .optional()?;
            Ok(row.unwrap_or(TokenRow {
                tokens: 0,
                lifetime_tokens: 0,
            }))
        })
    }

    /// Upserting credit. Returns the new balance.
    pub fn credit_tokens(
        &self,
        record_id: &str,
        user_id: &str,
        couple_id: &str,
        amount: i64,
        now: &str,
    ) -> Result<i64> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let balance = credit_tokens_tx(&tx, record_id, user_id, couple_id, amount, now)?;
            tx.commit()?;
            Ok(balance)
        })
    }

    /// Single conditional decrement: the balance check and the write are one
    /// statement, so concurrent debits can never drive the balance negative.
    /// Returns false (no mutation) when the balance is short.
    pub fn debit_tokens(
        &self,
        user_id: &str,
        couple_id: &str,
        amount: i64,
        now: &str,
    ) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "UPDATE user_tokens SET tokens = tokens - ?1, updated_at = ?2
                 WHERE user_id = ?3 AND couple_id = ?4 AND tokens >= ?1",
                (amount, now, user_id, couple_id),
            )?;
            Ok(changed == 1)
        })
    }

    // -- Rewards --

    pub fn insert_reward(&self, reward: &RewardRow) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO rewards (id, couple_id, creator_id, title, description, tokens_cost, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                (
                    &reward.id,
                    &reward.couple_id,
                    &reward.creator_id,
                    &reward.title,
                    &reward.description,
                    reward.tokens_cost,
                    &reward.created_at,
                ),
            )?;
            Ok(())
        })
    }

    pub fn list_rewards(&self, couple_id: &str) -> Result<Vec<RewardRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "{REWARD_COLS} WHERE couple_id = ?1 ORDER BY created_at DESC"
            ))?;
            let rows = stmt
                .query_map([couple_id], map_reward)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Debit and redeemed-mark as one transaction: if the debit fails the mark
    /// must not happen, and vice versa.
    pub fn redeem_reward(
        &self,
        reward_id: &str,
        couple_id: &str,
        user_id: &str,
        now: &str,
    ) -> Result<RedeemOutcome> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let reward: Option<(i64, Option<String>)> = tx
                .query_row(
                    "SELECT tokens_cost, redeemed_by FROM rewards
                     WHERE id = ?1 AND couple_id = ?2",
                    (reward_id, couple_id),
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?;
            let Some((tokens_cost, redeemed_by)) = reward else {
                return Ok(RedeemOutcome::NotFound);
            };
            if redeemed_by.is_some() {
                return Ok(RedeemOutcome::AlreadyRedeemed);
            }

            let debited = tx.execute(
                "UPDATE user_tokens SET tokens = tokens - ?1, updated_at = ?2
                 WHERE user_id = ?3 AND couple_id = ?4 AND tokens >= ?1",
                (tokens_cost, now, user_id, couple_id),
            )?;
            if debited != 1 {
                return Ok(RedeemOutcome::InsufficientTokens);
            }

            let marked = tx.execute(
                "UPDATE rewards SET redeemed_by = ?1, redeemed_at = ?2
                 WHERE id = ?3 AND redeemed_by IS NULL",
                (user_id, now, reward_id),
            )?;
            if marked != 1 {
                // Lost a race; the transaction drop rolls the debit back.
                return Ok(RedeemOutcome::AlreadyRedeemed);
            }

            let new_balance: i64 = tx.query_row(
                "SELECT tokens FROM user_tokens WHERE user_id = ?1 AND couple_id = ?2",
                (user_id, couple_id),
                |row| row.get(0),
            )?;

            tx.commit()?;
            Ok(RedeemOutcome::Redeemed { new_balance })
        })
    }
}

const USER_COLS: &str =
    "SELECT id, email, name, password, couple_id, boundaries, created_at FROM users";

const TASK_COLS: &str = "SELECT id, couple_id, creator_id, receiver_id, title, description, \
     reward, duration_minutes, tokens_earned, status, proof_text, proof_photo, \
     approval_message, created_at, expires_at, completed_at, approved_at FROM tasks";

const REWARD_COLS: &str = "SELECT id, couple_id, creator_id, title, description, tokens_cost, \
     redeemed_by, redeemed_at, created_at FROM rewards";

fn query_user_by_id(conn: &Connection, id: &str) -> Result<Option<UserRow>> {
    let mut stmt = conn.prepare(&format!("{USER_COLS} WHERE id = ?1"))?;
    let row = stmt.query_row([id], map_user).optional()?;
    Ok(row)
}

fn map_user(row: &rusqlite::Row<'_>) -> std::result::Result<UserRow, rusqlite::Error> {
    Ok(UserRow {
        id: row.get(0)?,
        email: row.get(1)?,
        name: row.get(2)?,
        password: row.get(3)?,
        couple_id: row.get(4)?,
        boundaries: row.get(5)?,
        created_at: row.get(6)?,
    })
}

fn map_task(row: &rusqlite::Row<'_>) -> std::result::Result<TaskRow, rusqlite::Error> {
    Ok(TaskRow {
        id: row.get(0)?,
        couple_id: row.get(1)?,
        creator_id: row.get(2)?,
        receiver_id: row.get(3)?,
        title: row.get(4)?,
        description: row.get(5)?,
        reward: row.get(6)?,
        duration_minutes: row.get(7)?,
        tokens_earned: row.get(8)?,
        status: row.get(9)?,
        proof_text: row.get(10)?,
        proof_photo: row.get(11)?,
        approval_message: row.get(12)?,
        created_at: row.get(13)?,
        expires_at: row.get(14)?,
        completed_at: row.get(15)?,
        approved_at: row.get(16)?,
    })
}

fn map_reward(row: &rusqlite::Row<'_>) -> std::result::Result<RewardRow, rusqlite::Error> {
    Ok(RewardRow {
        id: row.get(0)?,
        couple_id: row.get(1)?,
        creator_id: row.get(2)?,
        title: row.get(3)?,
        description: row.get(4)?,
        tokens_cost: row.get(5)?,
        redeemed_by: row.get(6)?,
        redeemed_at: row.get(7)?,
        created_at: row.get(8)?,
    })
}

/// Credit helper shared by `credit_tokens`, `judge_task` and tests; runs
/// inside the caller's transaction.
fn credit_tokens_tx(
    conn: &Connection,
    record_id: &str,
    user_id: &str,
    couple_id: &str,
    amount: i64,
    now: &str,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO user_tokens (id, couple_id, user_id, tokens, lifetime_tokens, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?4, ?5)
         ON CONFLICT(user_id, couple_id) DO UPDATE SET
             tokens = tokens + excluded.tokens,
             lifetime_tokens = lifetime_tokens + excluded.tokens,
             updated_at = excluded.updated_at",
        (record_id, couple_id, user_id, amount, now),
    )?;
    let balance: i64 = conn.query_row(
        "SELECT tokens FROM user_tokens WHERE user_id = ?1 AND couple_id = ?2",
        (user_id, couple_id),
        |row| row.get(0),
    )?;
    Ok(balance)
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timestamp;
    use chrono::{Duration, Utc};
    use uuid::Uuid;

    fn now() -> String {
        timestamp(Utc::now())
    }

    fn in_minutes(m: i64) -> String {
        timestamp(Utc::now() + Duration::minutes(m))
    }

    fn new_user(db: &Database, tail: &str) -> String {
        // Fixed id tails make pairing codes predictable in tests.
        let id = format!("{}{}", &Uuid::new_v4().to_string()[..30], tail);
        db.create_user(&id, &format!("{id}@example.com"), "someone", "hash", &now())
            .unwrap();
        id
    }

    fn new_couple(db: &Database) -> (String, String, String) {
        let a = new_user(db, "aaa111");
        let b = new_user(db, "bbb222");
        let couple_id = Uuid::new_v4().to_string();
        match db.link_partner(&a, "BBB222", &couple_id, &now()).unwrap() {
            LinkOutcome::Linked(_) => {}
            _ => panic!("pairing failed"),
        }
        (couple_id, a, b)
    }

    fn new_task(db: &Database, couple: &str, creator: &str, receiver: &str, expires_at: &str) -> String {
        let id = Uuid::new_v4().to_string();
        db.insert_task(&TaskRow {
            id: id.clone(),
            couple_id: couple.to_string(),
            creator_id: creator.to_string(),
            receiver_id: receiver.to_string(),
            title: "task".into(),
            description: "desc".into(),
            reward: None,
            duration_minutes: 60,
            tokens_earned: 10,
            status: "pending".into(),
            proof_text: None,
            proof_photo: None,
            approval_message: None,
            created_at: now(),
            expires_at: expires_at.to_string(),
            completed_at: None,
            approved_at: None,
        })
        .unwrap();
        id
    }

    #[test]
    fn pairing_links_exactly_once() {
        let db = Database::open_in_memory().unwrap();
        let a = new_user(&db, "abc123");
        let b = new_user(&db, "def456");
        let c = new_user(&db, "ghi789");

        // B links against A's code, lowercased to check case-insensitivity.
        let outcome = db
            .link_partner(&b, "abc123", &Uuid::new_v4().to_string(), &now())
            .unwrap();
        let couple = match outcome {
            LinkOutcome::Linked(c) => c,
            _ => panic!("expected link"),
        };
        assert_eq!(couple.user1_id, b);
        assert_eq!(couple.user2_id, a);
        assert_eq!(couple.pairing_code, "ABC123");

        let a_row = db.get_user_by_id(&a).unwrap().unwrap();
        let b_row = db.get_user_by_id(&b).unwrap().unwrap();
        assert_eq!(a_row.couple_id.as_deref(), Some(couple.id.as_str()));
        assert_eq!(b_row.couple_id.as_deref(), Some(couple.id.as_str()));

        // C tries the same code afterward: A is claimed, no match remains.
        let outcome = db
            .link_partner(&c, "ABC123", &Uuid::new_v4().to_string(), &now())
            .unwrap();
        assert!(matches!(outcome, LinkOutcome::NoMatch));

        // A paired requester is refused outright.
        let outcome = db
            .link_partner(&b, "GHI789", &Uuid::new_v4().to_string(), &now())
            .unwrap();
        assert!(matches!(outcome, LinkOutcome::RequesterPaired));
    }

    #[test]
    fn pairing_requires_exact_tail() {
        let db = Database::open_in_memory().unwrap();
        let a = new_user(&db, "abc123");
        new_user(&db, "bc123x");

        let outcome = db
            .link_partner(&a, "c123", &Uuid::new_v4().to_string(), &now())
            .unwrap();
        assert!(matches!(outcome, LinkOutcome::NoMatch));
    }

    #[test]
    fn duplicate_email_is_reported_not_fatal() {
        let db = Database::open_in_memory().unwrap();
        assert!(
            db.create_user("user-1", "same@example.com", "first", "hash", &now())
                .unwrap()
        );
        // Same email again: refused, not an error, and nothing is written.
        assert!(
            !db.create_user("user-2", "same@example.com", "second", "hash", &now())
                .unwrap()
        );
        assert!(db.get_user_by_id("user-2").unwrap().is_none());
    }

    #[test]
    fn ledger_defaults_to_zero_and_never_goes_negative() {
        let db = Database::open_in_memory().unwrap();
        let (couple, a, _) = new_couple(&db);

        let bal = db.token_balance(&a, &couple).unwrap();
        assert_eq!(bal.tokens, 0);
        assert_eq!(bal.lifetime_tokens, 0);

        // Debit against a missing record mutates nothing.
        assert!(!db.debit_tokens(&a, &couple, 5, &now()).unwrap());

        let new_bal = db
            .credit_tokens(&Uuid::new_v4().to_string(), &a, &couple, 10, &now())
            .unwrap();
        assert_eq!(new_bal, 10);

        // Short balance: refused, untouched.
        assert!(!db.debit_tokens(&a, &couple, 15, &now()).unwrap());
        assert_eq!(db.token_balance(&a, &couple).unwrap().tokens, 10);

        assert!(db.debit_tokens(&a, &couple, 10, &now()).unwrap());
        let bal = db.token_balance(&a, &couple).unwrap();
        assert_eq!(bal.tokens, 0);
        // Lifetime counter only grows.
        assert_eq!(bal.lifetime_tokens, 10);
    }

    #[test]
    fn credit_upserts_on_repeat() {
        let db = Database::open_in_memory().unwrap();
        let (couple, a, _) = new_couple(&db);

        db.credit_tokens(&Uuid::new_v4().to_string(), &a, &couple, 3, &now())
            .unwrap();
        let bal = db
            .credit_tokens(&Uuid::new_v4().to_string(), &a, &couple, 4, &now())
            .unwrap();
        assert_eq!(bal, 7);
        assert_eq!(db.token_balance(&a, &couple).unwrap().lifetime_tokens, 7);
    }

    #[test]
    fn task_moves_forward_only() {
        let db = Database::open_in_memory().unwrap();
        let (couple, a, b) = new_couple(&db);
        let task = new_task(&db, &couple, &a, &b, &in_minutes(60));

        assert!(matches!(
            db.submit_proof(&task, Some("done"), None, &now()).unwrap(),
            ProofOutcome::Completed
        ));
        // Second proof submission hits a non-pending task.
        assert!(matches!(
            db.submit_proof(&task, Some("again"), None, &now()).unwrap(),
            ProofOutcome::WrongState
        ));

        let record = Uuid::new_v4().to_string();
        match db.judge_task(&task, true, Some("nice"), &record, &now()).unwrap() {
            JudgeOutcome::Approved { new_balance } => assert_eq!(new_balance, 10),
            _ => panic!("expected approval"),
        }

        // Retried approve: wrong state, no double credit.
        let record = Uuid::new_v4().to_string();
        assert!(matches!(
            db.judge_task(&task, true, None, &record, &now()).unwrap(),
            JudgeOutcome::WrongState
        ));
        assert_eq!(db.token_balance(&b, &couple).unwrap().tokens, 10);

        let row = db.get_task(&task).unwrap().unwrap();
        assert_eq!(row.status, "approved");
        assert_eq!(row.approval_message.as_deref(), Some("nice"));
        assert!(row.approved_at.is_some());
    }

    #[test]
    fn rejection_credits_nothing() {
        let db = Database::open_in_memory().unwrap();
        let (couple, a, b) = new_couple(&db);
        let task = new_task(&db, &couple, &a, &b, &in_minutes(60));

        db.submit_proof(&task, Some("done"), None, &now()).unwrap();
        let record = Uuid::new_v4().to_string();
        assert!(matches!(
            db.judge_task(&task, false, Some("not quite"), &record, &now()).unwrap(),
            JudgeOutcome::Rejected
        ));
        assert_eq!(db.token_balance(&b, &couple).unwrap().tokens, 0);
        assert_eq!(db.get_task(&task).unwrap().unwrap().status, "rejected");
    }

    #[test]
    fn judge_missing_task() {
        let db = Database::open_in_memory().unwrap();
        new_couple(&db);
        let record = Uuid::new_v4().to_string();
        assert!(matches!(
            db.judge_task("nope", true, None, &record, &now()).unwrap(),
            JudgeOutcome::NotFound
        ));
    }

    #[test]
    fn sweep_expires_pending_only() {
        let db = Database::open_in_memory().unwrap();
        let (couple, a, b) = new_couple(&db);

        let overdue = new_task(&db, &couple, &a, &b, &in_minutes(-1));
        let fresh = new_task(&db, &couple, &a, &b, &in_minutes(60));
        let completed = new_task(&db, &couple, &a, &b, &in_minutes(1));
        db.submit_proof(&completed, Some("in under the wire"), None, &now())
            .unwrap();

        // Sweep from a moment past the completed task's deadline too.
        let swept = db.sweep_expired_tasks(&in_minutes(2)).unwrap();
        assert_eq!(swept.len(), 1);
        assert_eq!(swept[0].id, overdue);
        assert_eq!(swept[0].status, "expired");

        assert_eq!(db.get_task(&fresh).unwrap().unwrap().status, "pending");
        // Proof already in: the task awaits judgment, the sweep leaves it alone.
        assert_eq!(db.get_task(&completed).unwrap().unwrap().status, "completed");
    }

    #[test]
    fn late_proof_expires_without_credit() {
        let db = Database::open_in_memory().unwrap();
        let (couple, a, b) = new_couple(&db);
        let task = new_task(&db, &couple, &a, &b, &in_minutes(-1));

        // Proof arrives past the deadline: the task expires, the proof is gone.
        assert!(matches!(
            db.submit_proof(&task, Some("too late"), None, &now()).unwrap(),
            ProofOutcome::Expired
        ));
        let row = db.get_task(&task).unwrap().unwrap();
        assert_eq!(row.status, "expired");
        assert!(row.proof_text.is_none());
        assert!(row.completed_at.is_none());

        // An expired task cannot be judged, so nothing is ever credited.
        let record = Uuid::new_v4().to_string();
        assert!(matches!(
            db.judge_task(&task, true, None, &record, &now()).unwrap(),
            JudgeOutcome::WrongState
        ));
        assert_eq!(db.token_balance(&b, &couple).unwrap().tokens, 0);

        // A retried submission finds the task already settled.
        assert!(matches!(
            db.submit_proof(&task, Some("again"), None, &now()).unwrap(),
            ProofOutcome::WrongState
        ));
    }

    #[test]
    fn delete_only_non_terminal() {
        let db = Database::open_in_memory().unwrap();
        let (couple, a, b) = new_couple(&db);

        let pending = new_task(&db, &couple, &a, &b, &in_minutes(60));
        assert!(db.delete_task(&pending).unwrap());
        assert!(db.get_task(&pending).unwrap().is_none());

        let expired = new_task(&db, &couple, &a, &b, &in_minutes(-1));
        db.submit_proof(&expired, None, None, &now()).unwrap();
        assert!(!db.delete_task(&expired).unwrap());
        assert!(db.get_task(&expired).unwrap().is_some());
    }

    #[test]
    fn reward_redemption_is_all_or_nothing() {
        let db = Database::open_in_memory().unwrap();
        let (couple, a, b) = new_couple(&db);

        let reward_id = Uuid::new_v4().to_string();
        db.insert_reward(&RewardRow {
            id: reward_id.clone(),
            couple_id: couple.clone(),
            creator_id: b.clone(),
            title: "massage".into(),
            description: "30 minutes".into(),
            tokens_cost: 15,
            redeemed_by: None,
            redeemed_at: None,
            created_at: now(),
        })
        .unwrap();

        db.credit_tokens(&Uuid::new_v4().to_string(), &a, &couple, 10, &now())
            .unwrap();
        assert!(matches!(
            db.redeem_reward(&reward_id, &couple, &a, &now()).unwrap(),
            RedeemOutcome::InsufficientTokens
        ));
        // Failed redemption left the balance alone.
        assert_eq!(db.token_balance(&a, &couple).unwrap().tokens, 10);

        db.credit_tokens(&Uuid::new_v4().to_string(), &a, &couple, 10, &now())
            .unwrap();
        match db.redeem_reward(&reward_id, &couple, &a, &now()).unwrap() {
            RedeemOutcome::Redeemed { new_balance } => assert_eq!(new_balance, 5),
            _ => panic!("expected redemption"),
        }

        // Second redemption: rejected, single debit stands.
        assert!(matches!(
            db.redeem_reward(&reward_id, &couple, &a, &now()).unwrap(),
            RedeemOutcome::AlreadyRedeemed
        ));
        assert_eq!(db.token_balance(&a, &couple).unwrap().tokens, 5);

        let rewards = db.list_rewards(&couple).unwrap();
        assert_eq!(rewards.len(), 1);
        assert_eq!(rewards[0].redeemed_by.as_deref(), Some(a.as_str()));

        // Unknown id, wrong couple: not found.
        assert!(matches!(
            db.redeem_reward("nope", &couple, &a, &now()).unwrap(),
            RedeemOutcome::NotFound
        ));
    }

    #[test]
    fn moods_expire_logically() {
        let db = Database::open_in_memory().unwrap();
        let (couple, a, _) = new_couple(&db);

        for (tail, minutes) in [("m1", 30), ("m2", -5)] {
            db.insert_mood(&MoodRow {
                id: format!("mood-{tail}"),
                couple_id: couple.clone(),
                user_id: a.clone(),
                mood_type: "feeling_spicy".into(),
                intensity: 4,
                expires_at: in_minutes(minutes),
                created_at: now(),
            })
            .unwrap();
        }

        let active = db.active_moods(&couple, &now(), 10).unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, "mood-m1");
    }

    #[test]
    fn partner_lookup() {
        let db = Database::open_in_memory().unwrap();
        let (couple, a, b) = new_couple(&db);

        let partner = db.get_partner(&couple, &a).unwrap().unwrap();
        assert_eq!(partner.id, b);
        let partner = db.get_partner(&couple, &b).unwrap().unwrap();
        assert_eq!(partner.id, a);
    }
}
