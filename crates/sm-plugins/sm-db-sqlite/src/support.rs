use async_trait::async_trait;
use sm_core::error::Result;
use sm_core::models::{Faq, SupportTicket, TicketMessage, TicketStatus};
use sm_core::traits::{FaqRepo, TicketRepo};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use uuid::Uuid;

use crate::{id_col, opt_id_col, parse_col, ts, ts_col, uuid_to_blob, DbExt, SqliteRepo};

const TICKET_COLUMNS: &str = "id, user_id, name, email, subject, description, status, created_at";

fn ticket_header(row: &SqliteRow) -> Result<SupportTicket> {
    Ok(SupportTicket {
        id: id_col(row, "id")?,
        user_id: opt_id_col(row, "user_id")?,
        name: row.try_get("name").db()?,
        email: row.try_get("email").db()?,
        subject: row.try_get("subject").db()?,
        description: row.try_get("description").db()?,
        status: parse_col::<TicketStatus>(row, "status")?,
        messages: Vec::new(),
        created_at: ts_col(row, "created_at")?,
    })
}

fn faq_from_row(row: &SqliteRow) -> Result<Faq> {
    Ok(Faq {
        id: id_col(row, "id")?,
        question: row.try_get("question").db()?,
        answer: row.try_get("answer").db()?,
        category: row.try_get("category").db()?,
        created_at: ts_col(row, "created_at")?,
    })
}

impl SqliteRepo {
    async fn with_messages(&self, mut tickets: Vec<SupportTicket>) -> Result<Vec<SupportTicket>> {
        for ticket in &mut tickets {
            let rows = sqlx::query(
                "SELECT sender, body, created_at FROM ticket_messages WHERE ticket_id = ? ORDER BY seq",
            )
            .bind(uuid_to_blob(ticket.id))
            .fetch_all(&self.pool)
            .await
            .db()?;
            ticket.messages = rows
                .iter()
                .map(|row| {
                    Ok(TicketMessage {
                        sender: parse_col(row, "sender")?,
                        body: row.try_get("body").db()?,
                        created_at: ts_col(row, "created_at")?,
                    })
                })
                .collect::<Result<_>>()?;
        }
        Ok(tickets)
    }
}

#[async_trait]
impl TicketRepo for SqliteRepo {
    async fn create_ticket(&self, ticket: &SupportTicket) -> Result<()> {
        sqlx::query(
            "INSERT INTO tickets (id, user_id, name, email, subject, description, status, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(uuid_to_blob(ticket.id))
        .bind(ticket.user_id.map(uuid_to_blob))
        .bind(&ticket.name)
        .bind(&ticket.email)
        .bind(&ticket.subject)
        .bind(&ticket.description)
        .bind(ticket.status.as_str())
        .bind(ts(ticket.created_at))
        .execute(&self.pool)
        .await
        .db()?;
        Ok(())
    }

    async fn get_ticket(&self, id: Uuid) -> Result<Option<SupportTicket>> {
        let sql = format!("SELECT {TICKET_COLUMNS} FROM tickets WHERE id = ?");
        let row = sqlx::query(&sql)
            .bind(uuid_to_blob(id))
            .fetch_optional(&self.pool)
            .await
            .db()?;
        let Some(ticket) = row.as_ref().map(ticket_header).transpose()? else {
            return Ok(None);
        };
        Ok(self.with_messages(vec![ticket]).await?.pop())
    }

    async fn list_tickets(&self, requester: Option<Uuid>) -> Result<Vec<SupportTicket>> {
        let requester = requester.map(uuid_to_blob);
        let sql = format!(
            "SELECT {TICKET_COLUMNS} FROM tickets WHERE (? IS NULL OR user_id = ?) ORDER BY created_at DESC"
        );
        let rows = sqlx::query(&sql)
            .bind(requester.as_deref())
            .bind(requester.as_deref())
            .fetch_all(&self.pool)
            .await
            .db()?;
        let tickets = rows.iter().map(ticket_header).collect::<Result<Vec<_>>>()?;
        self.with_messages(tickets).await
    }

    async fn append_message(&self, ticket_id: Uuid, message: &TicketMessage, allow_closed: bool) -> Result<bool> {
        // The status guard and the insert are one statement.
        let done = sqlx::query(
            "INSERT INTO ticket_messages (ticket_id, sender, body, created_at) \
             SELECT id, ?, ?, ? FROM tickets WHERE id = ? AND (status <> 'closed' OR ?)",
        )
        .bind(message.sender.as_str())
        .bind(&message.body)
        .bind(ts(message.created_at))
        .bind(uuid_to_blob(ticket_id))
        .bind(allow_closed)
        .execute(&self.pool)
        .await
        .db()?;
        Ok(done.rows_affected() > 0)
    }

    async fn transition_ticket(&self, id: Uuid, from: TicketStatus, to: TicketStatus) -> Result<bool> {
        let done = sqlx::query("UPDATE tickets SET status = ? WHERE id = ? AND status = ?")
            .bind(to.as_str())
            .bind(uuid_to_blob(id))
            .bind(from.as_str())
            .execute(&self.pool)
            .await
            .db()?;
        Ok(done.rows_affected() > 0)
    }

    async fn delete_ticket(&self, id: Uuid) -> Result<bool> {
        let done = sqlx::query("DELETE FROM tickets WHERE id = ?")
            .bind(uuid_to_blob(id))
            .execute(&self.pool)
            .await
            .db()?;
        Ok(done.rows_affected() > 0)
    }
}

#[async_trait]
impl FaqRepo for SqliteRepo {
    async fn list_faqs(&self, category: Option<&str>) -> Result<Vec<Faq>> {
        let rows = sqlx::query(
            "SELECT id, question, answer, category, created_at FROM faqs \
             WHERE (? IS NULL OR category = ? COLLATE NOCASE) ORDER BY created_at",
        )
        .bind(category)
        .bind(category)
        .fetch_all(&self.pool)
        .await
        .db()?;
        rows.iter().map(faq_from_row).collect()
    }

    async fn create_faq(&self, faq: &Faq) -> Result<()> {
        sqlx::query("INSERT INTO faqs (id, question, answer, category, created_at) VALUES (?, ?, ?, ?, ?)")
            .bind(uuid_to_blob(faq.id))
            .bind(&faq.question)
            .bind(&faq.answer)
            .bind(&faq.category)
            .bind(ts(faq.created_at))
            .execute(&self.pool)
            .await
            .db()?;
        Ok(())
    }

    async fn delete_faq(&self, id: Uuid) -> Result<bool> {
        let done = sqlx::query("DELETE FROM faqs WHERE id = ?")
            .bind(uuid_to_blob(id))
            .execute(&self.pool)
            .await
            .db()?;
        Ok(done.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{memory_repo, seed_user};
    use chrono::Utc;
    use sm_core::models::Sender;
    use sm_core::traits::UserRepo;

    fn ticket(user_id: Option<Uuid>) -> SupportTicket {
        SupportTicket {
            id: Uuid::now_v7(),
            user_id,
            name: "Asha Rao".into(),
            email: "asha@example.com".into(),
            subject: "Late parcel".into(),
            description: "Order 0003 has not arrived.".into(),
            status: TicketStatus::Open,
            messages: vec![],
            created_at: Utc::now(),
        }
    }

    fn message(sender: Sender, body: &str) -> TicketMessage {
        TicketMessage {
            sender,
            body: body.into(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn messages_keep_their_order() {
        let repo = memory_repo().await;
        let t = ticket(None);
        repo.create_ticket(&t).await.unwrap();
        for (sender, body) in [(Sender::User, "hello"), (Sender::Admin, "on it"), (Sender::User, "thanks")] {
            assert!(repo.append_message(t.id, &message(sender, body), false).await.unwrap());
        }
        let stored = repo.get_ticket(t.id).await.unwrap().unwrap();
        let bodies: Vec<&str> = stored.messages.iter().map(|m| m.body.as_str()).collect();
        assert_eq!(bodies, vec!["hello", "on it", "thanks"]);
        assert_eq!(stored.messages[1].sender, Sender::Admin);
    }

    #[tokio::test]
    async fn closed_tickets_only_take_privileged_messages() {
        let repo = memory_repo().await;
        let t = ticket(None);
        repo.create_ticket(&t).await.unwrap();
        assert!(repo.transition_ticket(t.id, TicketStatus::Open, TicketStatus::Closed).await.unwrap());

        assert!(!repo.append_message(t.id, &message(Sender::User, "hello?"), false).await.unwrap());
        assert!(repo.append_message(t.id, &message(Sender::Admin, "closing note"), true).await.unwrap());
        assert_eq!(repo.get_ticket(t.id).await.unwrap().unwrap().messages.len(), 1);
    }

    #[tokio::test]
    async fn tickets_are_listed_per_requester_and_cascade_with_the_account() {
        let repo = memory_repo().await;
        let user = seed_user(&repo, "asha@example.com").await;
        repo.create_ticket(&ticket(Some(user.id))).await.unwrap();
        repo.create_ticket(&ticket(None)).await.unwrap();

        assert_eq!(repo.list_tickets(Some(user.id)).await.unwrap().len(), 1);
        assert_eq!(repo.list_tickets(None).await.unwrap().len(), 2);

        repo.delete_user(user.id).await.unwrap();
        assert_eq!(repo.list_tickets(None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn faqs_filter_by_category() {
        let repo = memory_repo().await;
        for (question, category) in [("How do I return?", "Returns"), ("Do you ship abroad?", "Shipping")] {
            repo.create_faq(&Faq {
                id: Uuid::now_v7(),
                question: question.into(),
                answer: "Yes.".into(),
                category: category.into(),
                created_at: Utc::now(),
            })
            .await
            .unwrap();
        }
        assert_eq!(repo.list_faqs(None).await.unwrap().len(), 2);
        let returns = repo.list_faqs(Some("returns")).await.unwrap();
        assert_eq!(returns.len(), 1);
        assert!(repo.delete_faq(returns[0].id).await.unwrap());
        assert!(!repo.delete_faq(returns[0].id).await.unwrap());
    }
}
