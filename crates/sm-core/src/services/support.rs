//! Support tickets and FAQs.

use chrono::Utc;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::{Faq, Sender, SupportTicket, TicketMessage, TicketStatus, User};
use crate::services::access;
use crate::traits::ShopRepo;
use crate::validation;

pub struct NewTicket {
    pub name: String,
    pub email: String,
    pub subject: String,
    pub description: String,
}

pub struct NewFaq {
    pub question: String,
    pub answer: String,
    pub category: String,
}

/// Anyone may open a ticket; signed-in requesters own theirs.
pub async fn create_ticket(
    repo: &dyn ShopRepo,
    requester: Option<&User>,
    input: NewTicket,
) -> Result<SupportTicket> {
    let ticket = SupportTicket {
        id: Uuid::now_v7(),
        user_id: requester.map(|u| u.id),
        name: validation::name(&input.name)?,
        email: validation::email(&input.email)?,
        subject: validation::text("subject", &input.subject)?,
        description: validation::text("description", &input.description)?,
        status: TicketStatus::Open,
        messages: Vec::new(),
        created_at: Utc::now(),
    };
    repo.create_ticket(&ticket).await?;
    log::info!("ticket {} opened", ticket.id);
    Ok(ticket)
}

pub async fn list_my_tickets(repo: &dyn ShopRepo, user: &User) -> Result<Vec<SupportTicket>> {
    repo.list_tickets(Some(user.id)).await
}

pub async fn list_all_tickets(repo: &dyn ShopRepo) -> Result<Vec<SupportTicket>> {
    repo.list_tickets(None).await
}

pub async fn get_ticket(repo: &dyn ShopRepo, user: &User, id: Uuid) -> Result<SupportTicket> {
    let ticket = repo
        .get_ticket(id)
        .await?
        .ok_or_else(|| AppError::not_found("Ticket", id))?;
    access::require_owner_or_admin(user, ticket.user_id)?;
    Ok(ticket)
}

/// Admins may always reply; requesters only until the ticket is closed.
pub async fn post_message(repo: &dyn ShopRepo, user: &User, id: Uuid, body: &str) -> Result<SupportTicket> {
    let ticket = get_ticket(repo, user, id).await?;
    let admin = user.is_admin();
    if !admin && ticket.status == TicketStatus::Closed {
        return Err(AppError::TicketClosed);
    }

    let message = TicketMessage {
        sender: if admin { Sender::Admin } else { Sender::User },
        body: validation::text("message", body)?,
        created_at: Utc::now(),
    };
    // The store re-checks the status in the same statement.
    if !repo.append_message(id, &message, admin).await? {
        return Err(AppError::TicketClosed);
    }
    get_ticket(repo, user, id).await
}

pub async fn update_ticket_status(repo: &dyn ShopRepo, id: Uuid, next: TicketStatus) -> Result<SupportTicket> {
    let ticket = repo
        .get_ticket(id)
        .await?
        .ok_or_else(|| AppError::not_found("Ticket", id))?;
    let invalid = |from: TicketStatus| AppError::InvalidTransition {
        entity: "ticket",
        from: from.to_string(),
        to: next.to_string(),
    };
    if !ticket.status.can_transition_to(next) {
        return Err(invalid(ticket.status));
    }
    if !repo.transition_ticket(id, ticket.status, next).await? {
        let current = repo
            .get_ticket(id)
            .await?
            .ok_or_else(|| AppError::not_found("Ticket", id))?;
        return Err(invalid(current.status));
    }
    log::info!("ticket {id} {} -> {next}", ticket.status);
    Ok(SupportTicket { status: next, ..ticket })
}

/// Owner or admin.
pub async fn delete_ticket(repo: &dyn ShopRepo, user: &User, id: Uuid) -> Result<()> {
    get_ticket(repo, user, id).await?;
    repo.delete_ticket(id).await?;
    Ok(())
}

pub async fn list_faqs(repo: &dyn ShopRepo, category: Option<&str>) -> Result<Vec<Faq>> {
    repo.list_faqs(category.map(str::trim).filter(|c| !c.is_empty())).await
}

pub async fn create_faq(repo: &dyn ShopRepo, input: NewFaq) -> Result<Faq> {
    let faq = Faq {
        id: Uuid::now_v7(),
        question: validation::text("question", &input.question)?,
        answer: validation::text("answer", &input.answer)?,
        category: validation::text("category", &input.category)?,
        created_at: Utc::now(),
    };
    repo.create_faq(&faq).await?;
    Ok(faq)
}

pub async fn delete_faq(repo: &dyn ShopRepo, id: Uuid) -> Result<()> {
    if !repo.delete_faq(id).await? {
        return Err(AppError::not_found("FAQ", id));
    }
    Ok(())
}
