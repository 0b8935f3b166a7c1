use async_trait::async_trait;
use sm_core::error::{AppError, Result};
use sm_core::models::{Address, LoginRecord, Role, User};
use sm_core::otp::{OtpChallenge, OtpPurpose, PendingOtp};
use sm_core::traits::UserRepo;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use uuid::Uuid;

use crate::{id_col, is_unique_violation, json_col, parse_col, to_json, ts, ts_col, uuid_to_blob, DbExt, SqliteRepo};

const USER_COLUMNS: &str = "id, name, email, password_hash, role, verified, otp_code, otp_expires_at, \
     otp_purpose, otp_pending_hash, mobile, address, created_at";

fn pending_otp(row: &SqliteRow) -> Result<Option<PendingOtp>> {
    let code: Option<String> = row.try_get("otp_code").db()?;
    let Some(code) = code else {
        return Ok(None);
    };
    let purpose: OtpPurpose = parse_col(row, "otp_purpose")?;
    let pending_hash: Option<String> = row.try_get("otp_pending_hash").db()?;
    let challenge = OtpChallenge::from_parts(purpose, pending_hash)
        .ok_or_else(|| AppError::Internal("password change code without a pending hash".into()))?;
    Ok(Some(PendingOtp {
        code,
        expires_at: ts_col(row, "otp_expires_at")?,
        challenge,
    }))
}

fn user_from_row(row: &SqliteRow) -> Result<User> {
    let address: Option<String> = row.try_get("address").db()?;
    let address: Option<Address> = match address {
        Some(_) => Some(json_col(row, "address")?),
        None => None,
    };
    Ok(User {
        id: id_col(row, "id")?,
        name: row.try_get("name").db()?,
        email: row.try_get("email").db()?,
        password_hash: row.try_get("password_hash").db()?,
        role: parse_col::<Role>(row, "role")?,
        verified: row.try_get("verified").db()?,
        pending_otp: pending_otp(row)?,
        mobile: row.try_get("mobile").db()?,
        address,
        created_at: ts_col(row, "created_at")?,
    })
}

#[async_trait]
impl UserRepo for SqliteRepo {
    async fn create_user(&self, user: &User) -> Result<()> {
        let otp = user.pending_otp.as_ref();
        let address = user.address.as_ref().map(to_json).transpose()?;
        sqlx::query(
            "INSERT INTO users (id, name, email, password_hash, role, verified, otp_code, otp_expires_at, \
             otp_purpose, otp_pending_hash, mobile, address, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(uuid_to_blob(user.id))
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.role.as_str())
        .bind(user.verified)
        .bind(otp.map(|o| o.code.as_str()))
        .bind(otp.map(|o| ts(o.expires_at)))
        .bind(otp.map(|o| o.challenge.purpose().as_str()))
        .bind(otp.and_then(|o| o.challenge.pending_hash()))
        .bind(user.mobile.as_deref())
        .bind(address)
        .bind(ts(user.created_at))
        .execute(&self.pool)
        .await
        .map_err(|err| {
            if is_unique_violation(&err) {
                AppError::Conflict("email already registered".into())
            } else {
                crate::db_error(err)
            }
        })?;
        Ok(())
    }

    async fn get_user(&self, id: Uuid) -> Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?");
        let row = sqlx::query(&sql)
            .bind(uuid_to_blob(id))
            .fetch_optional(&self.pool)
            .await
            .db()?;
        row.as_ref().map(user_from_row).transpose()
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?");
        let row = sqlx::query(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .db()?;
        row.as_ref().map(user_from_row).transpose()
    }

    async fn set_pending_otp(&self, user_id: Uuid, otp: Option<&PendingOtp>) -> Result<()> {
        sqlx::query(
            "UPDATE users SET otp_code = ?, otp_expires_at = ?, otp_purpose = ?, otp_pending_hash = ? \
             WHERE id = ?",
        )
        .bind(otp.map(|o| o.code.as_str()))
        .bind(otp.map(|o| ts(o.expires_at)))
        .bind(otp.map(|o| o.challenge.purpose().as_str()))
        .bind(otp.and_then(|o| o.challenge.pending_hash()))
        .bind(uuid_to_blob(user_id))
        .execute(&self.pool)
        .await
        .db()?;
        Ok(())
    }

    async fn complete_verification(&self, user_id: Uuid, code: &str) -> Result<bool> {
        let done = sqlx::query(
            "UPDATE users SET verified = 1, otp_code = NULL, otp_expires_at = NULL, otp_purpose = NULL, \
             otp_pending_hash = NULL WHERE id = ? AND otp_code = ? AND otp_purpose = ?",
        )
        .bind(uuid_to_blob(user_id))
        .bind(code)
        .bind(OtpPurpose::Register.as_str())
        .execute(&self.pool)
        .await
        .db()?;
        Ok(done.rows_affected() > 0)
    }

    async fn commit_password(
        &self,
        user_id: Uuid,
        code: &str,
        purpose: OtpPurpose,
        password_hash: &str,
    ) -> Result<bool> {
        // The code is consumed by whichever redemption reaches this row first.
        let done = sqlx::query(
            "UPDATE users SET password_hash = ?, otp_code = NULL, otp_expires_at = NULL, otp_purpose = NULL, \
             otp_pending_hash = NULL WHERE id = ? AND otp_code = ? AND otp_purpose = ?",
        )
        .bind(password_hash)
        .bind(uuid_to_blob(user_id))
        .bind(code)
        .bind(purpose.as_str())
        .execute(&self.pool)
        .await
        .db()?;
        Ok(done.rows_affected() > 0)
    }

    async fn update_profile(&self, user_id: Uuid, name: &str, mobile: Option<&str>) -> Result<()> {
        sqlx::query("UPDATE users SET name = ?, mobile = ? WHERE id = ?")
            .bind(name)
            .bind(mobile)
            .bind(uuid_to_blob(user_id))
            .execute(&self.pool)
            .await
            .db()?;
        Ok(())
    }

    async fn update_address(&self, user_id: Uuid, address: &Address) -> Result<()> {
        sqlx::query("UPDATE users SET address = ? WHERE id = ?")
            .bind(to_json(address)?)
            .bind(uuid_to_blob(user_id))
            .execute(&self.pool)
            .await
            .db()?;
        Ok(())
    }

    async fn delete_user(&self, user_id: Uuid) -> Result<bool> {
        // Foreign keys cascade to history, cart, orders and tickets.
        let done = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(uuid_to_blob(user_id))
            .execute(&self.pool)
            .await
            .db()?;
        Ok(done.rows_affected() > 0)
    }

    async fn record_login(&self, record: &LoginRecord) -> Result<()> {
        sqlx::query("INSERT INTO login_history (id, user_id, logged_in_at, origin, client) VALUES (?, ?, ?, ?, ?)")
            .bind(uuid_to_blob(record.id))
            .bind(uuid_to_blob(record.user_id))
            .bind(ts(record.logged_in_at))
            .bind(record.origin.as_deref())
            .bind(record.client.as_deref())
            .execute(&self.pool)
            .await
            .db()?;
        Ok(())
    }

    async fn list_logins(&self, user_id: Uuid, limit: i64) -> Result<Vec<LoginRecord>> {
        sqlx::query(
            "SELECT id, user_id, logged_in_at, origin, client FROM login_history \
             WHERE user_id = ? ORDER BY logged_in_at DESC LIMIT ?",
        )
        .bind(uuid_to_blob(user_id))
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .db()?
        .iter()
        .map(|row| {
            Ok(LoginRecord {
                id: id_col(row, "id")?,
                user_id: id_col(row, "user_id")?,
                logged_in_at: ts_col(row, "logged_in_at")?,
                origin: row.try_get("origin").db()?,
                client: row.try_get("client").db()?,
            })
        })
        .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{memory_repo, seed_user};
    use chrono::{Duration, SubsecRound, Utc};

    #[tokio::test]
    async fn duplicate_emails_conflict() {
        let repo = memory_repo().await;
        let first = seed_user(&repo, "dup@example.com").await;
        let mut second = first.clone();
        second.id = Uuid::now_v7();
        let err = repo.create_user(&second).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn pending_password_change_survives_a_round_trip() {
        let repo = memory_repo().await;
        let user = seed_user(&repo, "otp@example.com").await;
        let pending = PendingOtp {
            code: "123456".into(),
            expires_at: Utc::now() + Duration::minutes(10),
            challenge: OtpChallenge::PasswordChange {
                pending_hash: "$argon2id$next".into(),
            },
        };
        repo.set_pending_otp(user.id, Some(&pending)).await.unwrap();

        let stored = repo.get_user(user.id).await.unwrap().unwrap();
        let stored_otp = stored.pending_otp.unwrap();
        assert_eq!(stored_otp.code, "123456");
        assert_eq!(stored_otp.challenge, pending.challenge);

        let committed = repo
            .commit_password(user.id, "123456", OtpPurpose::ChangePassword, "$argon2id$next")
            .await
            .unwrap();
        assert!(committed);
        let stored = repo.get_user(user.id).await.unwrap().unwrap();
        assert_eq!(stored.password_hash, "$argon2id$next");
        assert!(stored.pending_otp.is_none());
    }

    #[tokio::test]
    async fn a_code_commits_only_once() {
        let repo = memory_repo().await;
        let user = seed_user(&repo, "once@example.com").await;
        let pending = PendingOtp {
            code: "654321".into(),
            expires_at: Utc::now() + Duration::minutes(10),
            challenge: OtpChallenge::PasswordReset,
        };
        repo.set_pending_otp(user.id, Some(&pending)).await.unwrap();

        // Wrong purpose or wrong code leaves the pending code alone.
        assert!(!repo
            .commit_password(user.id, "654321", OtpPurpose::ChangePassword, "$argon2id$a")
            .await
            .unwrap());
        assert!(!repo
            .commit_password(user.id, "000000", OtpPurpose::Reset, "$argon2id$a")
            .await
            .unwrap());
        assert!(!repo.complete_verification(user.id, "654321").await.unwrap());

        assert!(repo
            .commit_password(user.id, "654321", OtpPurpose::Reset, "$argon2id$first")
            .await
            .unwrap());
        assert!(!repo
            .commit_password(user.id, "654321", OtpPurpose::Reset, "$argon2id$second")
            .await
            .unwrap());

        let stored = repo.get_user(user.id).await.unwrap().unwrap();
        assert_eq!(stored.password_hash, "$argon2id$first");
    }

    #[tokio::test]
    async fn login_history_is_newest_first() {
        let repo = memory_repo().await;
        let user = seed_user(&repo, "history@example.com").await;
        let base = Utc::now().trunc_subsecs(6);
        for minutes in [0, 5, 2] {
            repo.record_login(&LoginRecord {
                id: Uuid::now_v7(),
                user_id: user.id,
                logged_in_at: base + Duration::minutes(minutes),
                origin: Some("127.0.0.1".into()),
                client: None,
            })
            .await
            .unwrap();
        }
        let logins = repo.list_logins(user.id, 2).await.unwrap();
        assert_eq!(logins.len(), 2);
        assert_eq!(logins[0].logged_in_at, base + Duration::minutes(5));
        assert_eq!(logins[1].logged_in_at, base + Duration::minutes(2));
    }

    #[tokio::test]
    async fn deleting_a_user_cascades_history() {
        let repo = memory_repo().await;
        let user = seed_user(&repo, "gone@example.com").await;
        repo.record_login(&LoginRecord {
            id: Uuid::now_v7(),
            user_id: user.id,
            logged_in_at: Utc::now(),
            origin: None,
            client: None,
        })
        .await
        .unwrap();

        assert!(repo.delete_user(user.id).await.unwrap());
        assert!(repo.get_user(user.id).await.unwrap().is_none());
        assert!(repo.list_logins(user.id, 10).await.unwrap().is_empty());
        assert!(!repo.delete_user(user.id).await.unwrap());
    }
}
