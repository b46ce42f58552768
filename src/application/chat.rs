use crate::application::{AccessError, AccessGate, LedgerError, LedgerService};
use crate::domain::{NewTransaction, TransactionKind};
use crate::infrastructure::{AccountRepository, ChatNotifier, RepositoryError, TransactionRepository};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{error, warn};
use uuid::Uuid;

const HELP_TEXT: &str = "Moneybook bot\n\n\
Commands\n\
/saldo - total income, expense and balance\n\
/del <ID> - delete a transaction\n\n\
Recording\n\
+50000 Salary - record income\n\
-20000 Food lunch with team - record an expense with a note";
const UNREGISTERED_TEXT: &str =
    "This chat is not linked to a Moneybook account yet. Ask an administrator to register your chat ID.";
const TRIAL_EXPIRED_TEXT: &str =
    "Your trial has ended. Upload a payment proof in the web app to keep using Moneybook.";
const SUSPENDED_TEXT: &str =
    "Your account is suspended. Upload a payment proof in the web app to reactivate it.";
const FAILURE_TEXT: &str = "Something went wrong, please try again later.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatCommand {
    Help,
    Balance,
    Delete(Uuid),
    Record(NewTransaction),
}

/// Parse a chat message. `Err` carries the hint to send back.
pub fn parse_command(text: &str) -> Result<ChatCommand, String> {
    let text = text.trim();

    match text {
        "/start" | "/help" => return Ok(ChatCommand::Help),
        "/saldo" | "/summary" => return Ok(ChatCommand::Balance),
        t if t.eq_ignore_ascii_case("cek") => return Ok(ChatCommand::Balance),
        _ => {}
    }

    if let Some(rest) = text.strip_prefix("/del") {
        if !rest.is_empty() && !rest.starts_with(char::is_whitespace) {
            return Err(unknown_command());
        }
        return Uuid::parse_str(rest.trim())
            .map(ChatCommand::Delete)
            .map_err(|_| "Usage: /del <ID> with the ID shown when the transaction was saved.".to_string());
    }

    let (kind, sign) = match text.chars().next() {
        Some('+') => (TransactionKind::Income, '+'),
        Some('-') => (TransactionKind::Expense, '-'),
        _ => return Err(unknown_command()),
    };

    let mut parts = text[1..].split_whitespace();
    let amount = parts
        .next()
        .map(|a| a.replace(['.', ','], ""))
        .and_then(|a| a.parse::<i64>().ok())
        .filter(|a| *a > 0)
        .ok_or_else(|| "Amount must be a positive number, e.g. -20000 Food.".to_string())?;

    let category = parts
        .next()
        .ok_or_else(|| format!("Add a category, e.g. {}{} Food.", sign, amount))?
        .to_string();
    let note = parts.collect::<Vec<_>>().join(" ");

    Ok(ChatCommand::Record(NewTransaction {
        kind,
        amount,
        category,
        note: if note.is_empty() { None } else { Some(note) },
    }))
}

fn unknown_command() -> String {
    "Unknown command. Send /help to see what I understand.".to_string()
}

/// `Rp 1.250.000` style amount.
pub fn format_rupiah(amount: i64) -> String {
    let digits = amount.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(c);
    }
    if amount < 0 {
        format!("-Rp {}", grouped)
    } else {
        format!("Rp {}", grouped)
    }
}

/// Chat front end over the ledger, resolved by chat id and gated like the API.
pub struct ChatService<A, T, N>
where
    A: AccountRepository,
    T: TransactionRepository,
    N: ChatNotifier,
{
    accounts: Arc<A>,
    gate: Arc<AccessGate<A>>,
    ledger: Arc<LedgerService<A, T>>,
    notifier: Arc<N>,
}

impl<A, T, N> ChatService<A, T, N>
where
    A: AccountRepository,
    T: TransactionRepository,
    N: ChatNotifier,
{
    pub fn new(
        accounts: Arc<A>,
        gate: Arc<AccessGate<A>>,
        ledger: Arc<LedgerService<A, T>>,
        notifier: Arc<N>,
    ) -> Self {
        Self {
            accounts,
            gate,
            ledger,
            notifier,
        }
    }

    /// Answer one message and send the reply. Delivery failures are logged only.
    pub async fn handle_message(&self, chat_id: i64, text: &str, now: DateTime<Utc>) {
        let reply = self.reply_to(chat_id, text, now).await;
        if let Err(e) = self.notifier.send_message(chat_id, &reply).await {
            warn!(chat_id, error = %e, "Failed to deliver chat reply");
        }
    }

    pub async fn reply_to(&self, chat_id: i64, text: &str, now: DateTime<Utc>) -> String {
        let account = match self.accounts.get_by_telegram_id(chat_id).await {
            Ok(account) => account,
            Err(RepositoryError::NotFound(_)) => return UNREGISTERED_TEXT.to_string(),
            Err(e) => {
                error!(chat_id, error = %e, "Failed to resolve chat account");
                return FAILURE_TEXT.to_string();
            }
        };

        let command = match parse_command(text) {
            Ok(ChatCommand::Help) => return HELP_TEXT.to_string(),
            Ok(command) => command,
            Err(hint) => return hint,
        };

        match self.gate.check(&account.principal(), now).await {
            Ok(_) => {}
            Err(AccessError::TrialExpired) => return TRIAL_EXPIRED_TEXT.to_string(),
            Err(AccessError::Suspended) => return SUSPENDED_TEXT.to_string(),
            Err(AccessError::UnknownAccount) => return UNREGISTERED_TEXT.to_string(),
            Err(AccessError::Repository(e)) => {
                error!(chat_id, error = %e, "Access check failed");
                return FAILURE_TEXT.to_string();
            }
        }

        let result = match command {
            ChatCommand::Help => Ok(HELP_TEXT.to_string()),
            ChatCommand::Balance => self.ledger.summary(account.id).await.map(|s| {
                format!(
                    "Balance: {}\n(In: {}, Out: {})",
                    format_rupiah(s.balance),
                    format_rupiah(s.total_income),
                    format_rupiah(s.total_expense)
                )
            }),
            ChatCommand::Delete(id) => match self.ledger.delete(account.id, id).await {
                Ok(()) => Ok(format!("Transaction {} deleted.", id)),
                Err(LedgerError::NotFound) => Ok("Transaction not found.".to_string()),
                Err(e) => Err(e),
            },
            ChatCommand::Record(new) => match self.ledger.record(account.id, new, now).await {
                Ok(recorded) => {
                    let t = &recorded.transaction;
                    let label = match t.kind {
                        TransactionKind::Income => "Income",
                        TransactionKind::Expense => "Expense",
                    };
                    let mut reply = format!(
                        "Saved!\nID: {}\n{} {}\nCategory: {}",
                        t.id,
                        label,
                        format_rupiah(t.amount),
                        t.category
                    );
                    if let Some(warning) = recorded.warning {
                        reply.push_str("\n\nLimit warning: ");
                        reply.push_str(&warning);
                    }
                    Ok(reply)
                }
                Err(LedgerError::Validation(msg)) => Ok(msg),
                Err(e) => Err(e),
            },
        };

        result.unwrap_or_else(|e| {
            error!(account_id = %account.id, error = %e, "Chat command failed");
            FAILURE_TEXT.to_string()
        })
    }
}
