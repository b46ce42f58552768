//! Integration tests for moneybook
//! Covers the subscription gate, payment evidence handling, the ledger with
//! budget alerts, the chat bot front end and account administration.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use moneybook::{
    application::{
        AccessError, AccessGate, AdminError, AdminService, AuthError, BudgetAlertEvaluator,
        ChatService, CredentialService, LedgerService, PaymentService, PaymentSettings,
    },
    domain::{
        Account, AccountStatus, BudgetSettings, EffectiveStatus, EvidenceUpload, EvidenceVerdict,
        NewTransaction, PaymentLog, PaymentOutcome, ProfileUpdate, SubscriptionChange,
        Transaction, TransactionFilter, TransactionKind, TransactionPage, DEFAULT_ALERT_MESSAGE,
    },
    infrastructure::{
        AccountRepository, ChatNotifier, LocalEvidenceStore, NotifierError, PasswordHasher,
        PaymentLogRepository, PaymentMode, Recognizer, RecognizerError, RepositoryError,
        TokenIssuer, TransactionRepository,
    },
};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

// ============================================================================
// In-memory repositories
// ============================================================================

#[derive(Default)]
struct Tables {
    accounts: HashMap<Uuid, Account>,
    transactions: Vec<Transaction>,
    payment_logs: Vec<PaymentLog>,
    suspend_writes: usize,
}

/// Shared tables behind the three repository views, so account deletion can
/// cascade like the database does.
#[derive(Clone, Default)]
struct MemoryDb {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryDb {
    fn accounts(&self) -> Arc<MemoryAccounts> {
        Arc::new(MemoryAccounts(self.clone()))
    }

    fn transactions(&self) -> Arc<MemoryTransactions> {
        Arc::new(MemoryTransactions(self.clone()))
    }

    fn payment_logs(&self) -> Arc<MemoryPaymentLogs> {
        Arc::new(MemoryPaymentLogs(self.clone()))
    }

    fn insert(&self, account: Account) -> Account {
        let mut tables = self.tables.lock().unwrap();
        tables.accounts.insert(account.id, account.clone());
        account
    }

    fn stored(&self, id: Uuid) -> Option<Account> {
        self.tables.lock().unwrap().accounts.get(&id).cloned()
    }

    fn suspend_writes(&self) -> usize {
        self.tables.lock().unwrap().suspend_writes
    }

    fn transaction_count(&self, account_id: Uuid) -> usize {
        let tables = self.tables.lock().unwrap();
        tables
            .transactions
            .iter()
            .filter(|t| t.account_id == account_id)
            .count()
    }

    fn logs(&self) -> Vec<PaymentLog> {
        self.tables.lock().unwrap().payment_logs.clone()
    }
}

fn not_found(what: &str, id: impl std::fmt::Display) -> RepositoryError {
    RepositoryError::NotFound(format!("{} {}", what, id))
}

struct MemoryAccounts(MemoryDb);

#[async_trait]
impl AccountRepository for MemoryAccounts {
    async fn create(&self, account: &Account) -> Result<(), RepositoryError> {
        let mut tables = self.0.tables.lock().unwrap();
        if tables
            .accounts
            .values()
            .any(|a| a.username == account.username)
        {
            return Err(RepositoryError::Conflict(format!(
                "Username {} already exists",
                account.username
            )));
        }
        tables.accounts.insert(account.id, account.clone());
        Ok(())
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Account, RepositoryError> {
        self.0.stored(id).ok_or_else(|| not_found("Account", id))
    }

    async fn get_by_username(&self, username: &str) -> Result<Account, RepositoryError> {
        let tables = self.0.tables.lock().unwrap();
        tables
            .accounts
            .values()
            .find(|a| a.username == username)
            .cloned()
            .ok_or_else(|| not_found("Account", username))
    }

    async fn get_by_telegram_id(&self, telegram_id: i64) -> Result<Account, RepositoryError> {
        let tables = self.0.tables.lock().unwrap();
        tables
            .accounts
            .values()
            .find(|a| a.telegram_id == Some(telegram_id))
            .cloned()
            .ok_or_else(|| not_found("Telegram chat", telegram_id))
    }

    async fn list(&self) -> Result<Vec<Account>, RepositoryError> {
        let tables = self.0.tables.lock().unwrap();
        let mut accounts: Vec<Account> = tables.accounts.values().cloned().collect();
        accounts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(accounts)
    }

    async fn update_status(&self, id: Uuid, status: AccountStatus) -> Result<(), RepositoryError> {
        let mut tables = self.0.tables.lock().unwrap();
        let account = tables
            .accounts
            .get_mut(&id)
            .ok_or_else(|| not_found("Account", id))?;
        account.status = status;
        Ok(())
    }

    async fn suspend_expired_trial(&self, id: Uuid) -> Result<bool, RepositoryError> {
        let mut tables = self.0.tables.lock().unwrap();
        let changed = match tables.accounts.get_mut(&id) {
            Some(account) if account.status == AccountStatus::Trial => {
                account.status = AccountStatus::Suspended;
                true
            }
            _ => false,
        };
        if changed {
            tables.suspend_writes += 1;
        }
        Ok(changed)
    }

    async fn update_subscription(
        &self,
        id: Uuid,
        status: AccountStatus,
        trial_ends_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let mut tables = self.0.tables.lock().unwrap();
        let account = tables
            .accounts
            .get_mut(&id)
            .ok_or_else(|| not_found("Account", id))?;
        account.status = status;
        account.trial_ends_at = trial_ends_at;
        Ok(())
    }

    async fn update_profile(&self, id: Uuid, update: &ProfileUpdate) -> Result<(), RepositoryError> {
        let mut tables = self.0.tables.lock().unwrap();
        if let Some(name) = &update.username {
            if tables
                .accounts
                .values()
                .any(|a| a.id != id && &a.username == name)
            {
                return Err(RepositoryError::Conflict(format!("Username {} already exists", name)));
            }
        }
        let account = tables
            .accounts
            .get_mut(&id)
            .ok_or_else(|| not_found("Account", id))?;
        if let Some(name) = &update.username {
            account.username = name.clone();
        }
        if let Some(hash) = &update.password_hash {
            account.password_hash = hash.clone();
        }
        if update.unlink_telegram {
            account.telegram_id = None;
        } else if let Some(chat) = update.telegram_id {
            account.telegram_id = Some(chat);
        }
        Ok(())
    }

    async fn update_budget(&self, id: Uuid, settings: &BudgetSettings) -> Result<(), RepositoryError> {
        let mut tables = self.0.tables.lock().unwrap();
        let account = tables
            .accounts
            .get_mut(&id)
            .ok_or_else(|| not_found("Account", id))?;
        account.daily_limit = settings.daily_limit;
        account.alert_message = settings.alert_message.clone();
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<(), RepositoryError> {
        let mut tables = self.0.tables.lock().unwrap();
        if tables.accounts.remove(&id).is_none() {
            return Err(not_found("Account", id));
        }
        tables.transactions.retain(|t| t.account_id != id);
        tables.payment_logs.retain(|l| l.account_id != id);
        Ok(())
    }
}

struct MemoryTransactions(MemoryDb);

#[async_trait]
impl TransactionRepository for MemoryTransactions {
    async fn create(&self, transaction: &Transaction) -> Result<(), RepositoryError> {
        self.0
            .tables
            .lock()
            .unwrap()
            .transactions
            .push(transaction.clone());
        Ok(())
    }

    async fn list_page(
        &self,
        account_id: Uuid,
        filter: &TransactionFilter,
        limit: i64,
        offset: i64,
    ) -> Result<TransactionPage, RepositoryError> {
        let tables = self.0.tables.lock().unwrap();
        let needle = filter.search.as_deref().map(str::to_lowercase);
        let mut matching: Vec<Transaction> = tables
            .transactions
            .iter()
            .filter(|t| t.account_id == account_id)
            .filter(|t| filter.kind.map_or(true, |k| t.kind == k))
            .filter(|t| {
                needle.as_deref().map_or(true, |n| {
                    t.category.to_lowercase().contains(n)
                        || t.note.as_deref().is_some_and(|note| note.to_lowercase().contains(n))
                })
            })
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let total = matching.len() as i64;
        let items = matching
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect();
        Ok(TransactionPage { items, total })
    }

    async fn list_since(
        &self,
        account_id: Uuid,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<Transaction>, RepositoryError> {
        let tables = self.0.tables.lock().unwrap();
        let mut found: Vec<Transaction> = tables
            .transactions
            .iter()
            .filter(|t| t.account_id == account_id)
            .filter(|t| since.map_or(true, |s| t.created_at >= s))
            .cloned()
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(found)
    }

    async fn sum_since(
        &self,
        account_id: Uuid,
        kind: TransactionKind,
        since: DateTime<Utc>,
    ) -> Result<i64, RepositoryError> {
        let tables = self.0.tables.lock().unwrap();
        Ok(tables
            .transactions
            .iter()
            .filter(|t| t.account_id == account_id && t.kind == kind && t.created_at >= since)
            .map(|t| t.amount)
            .sum())
    }

    async fn delete_owned(&self, account_id: Uuid, id: Uuid) -> Result<(), RepositoryError> {
        let mut tables = self.0.tables.lock().unwrap();
        let before = tables.transactions.len();
        tables
            .transactions
            .retain(|t| !(t.id == id && t.account_id == account_id));
        if tables.transactions.len() == before {
            return Err(not_found("Transaction", id));
        }
        Ok(())
    }
}

struct MemoryPaymentLogs(MemoryDb);

#[async_trait]
impl PaymentLogRepository for MemoryPaymentLogs {
    async fn append(&self, entry: &PaymentLog) -> Result<(), RepositoryError> {
        self.0
            .tables
            .lock()
            .unwrap()
            .payment_logs
            .push(entry.clone());
        Ok(())
    }

    async fn get_by_id(&self, id: Uuid) -> Result<PaymentLog, RepositoryError> {
        let tables = self.0.tables.lock().unwrap();
        tables
            .payment_logs
            .iter()
            .find(|l| l.id == id)
            .cloned()
            .ok_or_else(|| not_found("Payment log", id))
    }

    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<PaymentLog>, RepositoryError> {
        let tables = self.0.tables.lock().unwrap();
        let mut logs = tables.payment_logs.clone();
        logs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(logs
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect())
    }

    async fn list_by_account(&self, account_id: Uuid) -> Result<Vec<PaymentLog>, RepositoryError> {
        let tables = self.0.tables.lock().unwrap();
        Ok(tables
            .payment_logs
            .iter()
            .filter(|l| l.account_id == account_id)
            .cloned()
            .collect())
    }

    async fn delete(&self, id: Uuid) -> Result<(), RepositoryError> {
        let mut tables = self.0.tables.lock().unwrap();
        let before = tables.payment_logs.len();
        tables.payment_logs.retain(|l| l.id != id);
        if tables.payment_logs.len() == before {
            return Err(not_found("Payment log", id));
        }
        Ok(())
    }

    async fn delete_all(&self) -> Result<Vec<PaymentLog>, RepositoryError> {
        let mut tables = self.0.tables.lock().unwrap();
        Ok(std::mem::take(&mut tables.payment_logs))
    }
}

// ============================================================================
// Collaborator fakes
// ============================================================================

/// Returns the scripted text, or an outage when none is set.
struct ScriptedRecognizer {
    text: Option<String>,
}

#[async_trait]
impl Recognizer for ScriptedRecognizer {
    async fn recognize(&self, _upload: &EvidenceUpload) -> Result<String, RecognizerError> {
        self.text
            .clone()
            .ok_or_else(|| RecognizerError::Unavailable("connection refused".to_string()))
    }
}

#[derive(Default)]
struct RecordingNotifier {
    sent: Mutex<Vec<(i64, String)>>,
}

#[async_trait]
impl ChatNotifier for RecordingNotifier {
    async fn send_message(&self, chat_id: i64, text: &str) -> Result<(), NotifierError> {
        self.sent.lock().unwrap().push((chat_id, text.to_string()));
        Ok(())
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn evidence_root() -> PathBuf {
    std::env::temp_dir().join(format!("moneybook-it-{}", Uuid::new_v4()))
}

fn receipt() -> EvidenceUpload {
    EvidenceUpload {
        file_name: "receipt.png".to_string(),
        content_type: "image/png".to_string(),
        bytes: vec![0x89, b'P', b'N', b'G', 1, 2, 3],
    }
}

fn trial_account(username: &str, ends_in: Duration, now: DateTime<Utc>) -> Account {
    Account::new_trial(username.to_string(), "hash".to_string(), ends_in, now)
}

fn expense(amount: i64, category: &str) -> NewTransaction {
    NewTransaction {
        kind: TransactionKind::Expense,
        amount,
        category: category.to_string(),
        note: None,
    }
}

fn income(amount: i64, category: &str) -> NewTransaction {
    NewTransaction {
        kind: TransactionKind::Income,
        amount,
        category: category.to_string(),
        note: None,
    }
}

fn ledger_for(
    db: &MemoryDb,
) -> Arc<LedgerService<MemoryAccounts, MemoryTransactions>> {
    let budget = Arc::new(BudgetAlertEvaluator::new(db.accounts(), db.transactions()));
    Arc::new(LedgerService::new(db.transactions(), budget))
}

fn payment_service(
    db: &MemoryDb,
    mode: PaymentMode,
    recognized: Option<&str>,
    root: PathBuf,
) -> PaymentService<MemoryAccounts, MemoryPaymentLogs, LocalEvidenceStore, ScriptedRecognizer> {
    PaymentService::new(
        db.accounts(),
        db.payment_logs(),
        Arc::new(LocalEvidenceStore::new(root)),
        Arc::new(ScriptedRecognizer {
            text: recognized.map(str::to_string),
        }),
        PaymentSettings {
            mode,
            recognizer_timeout: std::time::Duration::from_secs(5),
            max_evidence_bytes: 1024,
        },
    )
}

fn admin_service(
    db: &MemoryDb,
    root: PathBuf,
) -> AdminService<MemoryAccounts, MemoryTransactions, MemoryPaymentLogs, LocalEvidenceStore> {
    AdminService::new(
        db.accounts(),
        db.transactions(),
        db.payment_logs(),
        Arc::new(LocalEvidenceStore::new(root)),
        Arc::new(PasswordHasher::new(4).unwrap()),
        Duration::days(365),
    )
}

// ============================================================================
// Registration and credentials
// ============================================================================

#[tokio::test]
async fn registration_starts_trial_and_login_issues_a_valid_token() {
    let db = MemoryDb::default();
    let service = CredentialService::new(
        db.accounts(),
        Arc::new(PasswordHasher::new(4).unwrap()),
        Arc::new(TokenIssuer::new("integration-test-secret", Duration::hours(1)).unwrap()),
        Duration::hours(24),
        String::new(),
    );
    let now = Utc::now();

    let account = service.register("  budi ", "secret1", now).await.unwrap();
    assert_eq!(account.username, "budi");
    assert_eq!(account.status, AccountStatus::Trial);
    assert_eq!(account.trial_ends_at, now + Duration::hours(24));
    assert_eq!(account.effective_status(now), EffectiveStatus::TrialValid);

    let session = service.login("budi", "secret1").await.unwrap();
    let principal = service.validate_token(&session.token).unwrap();
    assert_eq!(principal.account_id, account.id);
    assert!(!principal.is_admin());

    assert!(matches!(
        service.register("budi", "another1", now).await,
        Err(AuthError::UsernameTaken)
    ));
    assert!(matches!(
        service.login("budi", "wrong-pass").await,
        Err(AuthError::InvalidCredentials)
    ));
    assert!(matches!(
        service.login("nobody", "secret1").await,
        Err(AuthError::InvalidCredentials)
    ));
    assert!(matches!(
        service.setup_owner("owner", "secret1", "", now).await,
        Err(AuthError::SetupDisabled)
    ));
}

#[tokio::test]
async fn owner_setup_requires_the_configured_secret() {
    let db = MemoryDb::default();
    let service = CredentialService::new(
        db.accounts(),
        Arc::new(PasswordHasher::new(4).unwrap()),
        Arc::new(TokenIssuer::new("integration-test-secret", Duration::hours(1)).unwrap()),
        Duration::hours(24),
        "let-me-in".to_string(),
    );
    let now = Utc::now();

    assert!(matches!(
        service.setup_owner("owner", "secret1", "guess", now).await,
        Err(AuthError::InvalidSetupSecret)
    ));

    let owner = service
        .setup_owner("owner", "secret1", "let-me-in", now)
        .await
        .unwrap();
    assert_eq!(owner.effective_status(now), EffectiveStatus::Admin);

    let session = service.login("owner", "secret1").await.unwrap();
    assert!(service.validate_token(&session.token).unwrap().is_admin());
}

// ============================================================================
// Access gate
// ============================================================================

#[tokio::test]
async fn expired_trial_is_rejected_then_persisted_as_suspended_once() {
    let db = MemoryDb::default();
    let now = Utc::now();
    let account = db.insert(trial_account("late", Duration::hours(24), now - Duration::hours(25)));
    let gate = AccessGate::new(db.accounts());

    assert!(matches!(
        gate.check(&account.principal(), now).await,
        Err(AccessError::TrialExpired)
    ));
    assert_eq!(db.stored(account.id).unwrap().status, AccountStatus::Suspended);
    assert_eq!(db.suspend_writes(), 1);

    assert!(matches!(
        gate.check(&account.principal(), now).await,
        Err(AccessError::Suspended)
    ));
    assert_eq!(db.suspend_writes(), 1);
}

#[tokio::test]
async fn valid_trial_active_and_pending_accounts_pass() {
    let db = MemoryDb::default();
    let now = Utc::now();
    let trial = db.insert(trial_account("fresh", Duration::hours(24), now));
    let mut pending = trial_account("waiting", Duration::hours(1), now - Duration::days(3));
    pending.status = AccountStatus::Pending;
    let pending = db.insert(pending);
    let mut active = trial_account("paid", Duration::hours(1), now - Duration::days(30));
    active.status = AccountStatus::Active;
    let active = db.insert(active);

    let gate = AccessGate::new(db.accounts());
    assert_eq!(
        gate.check(&trial.principal(), now).await.unwrap(),
        EffectiveStatus::TrialValid
    );
    assert_eq!(
        gate.check(&pending.principal(), now).await.unwrap(),
        EffectiveStatus::Pending
    );
    assert_eq!(
        gate.check(&active.principal(), now).await.unwrap(),
        EffectiveStatus::Active
    );
    assert_eq!(db.suspend_writes(), 0);
}

#[tokio::test]
async fn admins_pass_without_an_account_lookup() {
    let db = MemoryDb::default();
    let owner = Account::new_owner("owner".to_string(), "hash".to_string(), Utc::now());
    // Never inserted: the check must not need the store.
    let gate = AccessGate::new(db.accounts());

    assert_eq!(
        gate.check(&owner.principal(), Utc::now()).await.unwrap(),
        EffectiveStatus::Admin
    );
}

#[tokio::test]
async fn inspect_reports_expiry_without_rejecting() {
    let db = MemoryDb::default();
    let now = Utc::now();
    let account = db.insert(trial_account("late", Duration::hours(1), now - Duration::hours(2)));
    let gate = AccessGate::new(db.accounts());

    let (seen, effective) = gate.inspect(&account.principal(), now).await.unwrap();
    assert_eq!(effective, EffectiveStatus::TrialExpired);
    assert_eq!(seen.status, AccountStatus::Suspended);
    assert_eq!(seen.trial_hours_remaining(now), 0);
}

#[tokio::test]
async fn deleted_account_is_unknown_to_the_gate() {
    let db = MemoryDb::default();
    let ghost = trial_account("ghost", Duration::hours(24), Utc::now());
    let gate = AccessGate::new(db.accounts());

    assert!(matches!(
        gate.check(&ghost.principal(), Utc::now()).await,
        Err(AccessError::UnknownAccount)
    ));
}

// ============================================================================
// Payment evidence
// ============================================================================

#[tokio::test]
async fn recognized_receipt_reactivates_a_suspended_account() {
    let db = MemoryDb::default();
    let now = Utc::now();
    let mut account = trial_account("budi", Duration::hours(24), now - Duration::days(2));
    account.status = AccountStatus::Suspended;
    let account = db.insert(account);
    let root = evidence_root();
    let service = payment_service(
        &db,
        PaymentMode::Automatic,
        Some("Transfer BERHASIL\nBCA\nRp 50.000"),
        root.clone(),
    );

    let outcome = service.submit(account.id, receipt(), now).await.unwrap();
    assert_eq!(
        outcome,
        PaymentOutcome::Activated {
            bank: Some("BCA".to_string()),
            amount: 50_000,
        }
    );
    assert_eq!(db.stored(account.id).unwrap().status, AccountStatus::Active);

    let logs = db.logs();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].verdict, EvidenceVerdict::Accepted);
    assert_eq!(logs[0].username, "budi");
    assert!(root.join(&logs[0].evidence_path).exists());

    let _ = std::fs::remove_dir_all(root);
}

#[tokio::test]
async fn unrecognized_receipt_is_rejected_and_status_kept() {
    let db = MemoryDb::default();
    let now = Utc::now();
    let mut account = trial_account("budi", Duration::hours(24), now - Duration::days(2));
    account.status = AccountStatus::Suspended;
    let account = db.insert(account);
    let root = evidence_root();
    let service = payment_service(&db, PaymentMode::Automatic, Some("holiday photo"), root.clone());

    let outcome = service.submit(account.id, receipt(), now).await.unwrap();
    assert!(matches!(outcome, PaymentOutcome::Rejected { .. }));
    assert_eq!(db.stored(account.id).unwrap().status, AccountStatus::Suspended);
    assert_eq!(db.logs()[0].verdict, EvidenceVerdict::Rejected);

    let _ = std::fs::remove_dir_all(root);
}

#[tokio::test]
async fn recognizer_outage_queues_the_proof_for_review() {
    let db = MemoryDb::default();
    let now = Utc::now();
    let mut account = trial_account("budi", Duration::hours(24), now - Duration::days(2));
    account.status = AccountStatus::Suspended;
    let account = db.insert(account);
    let root = evidence_root();
    let service = payment_service(&db, PaymentMode::Automatic, None, root.clone());

    let outcome = service.submit(account.id, receipt(), now).await.unwrap();
    assert!(matches!(outcome, PaymentOutcome::PendingReview { .. }));
    assert_eq!(db.stored(account.id).unwrap().status, AccountStatus::Pending);

    // Pending accounts may use the product while they wait.
    let gate = AccessGate::new(db.accounts());
    assert_eq!(
        gate.check(&account.principal(), now).await.unwrap(),
        EffectiveStatus::Pending
    );

    let logs = db.logs();
    assert_eq!(logs[0].verdict, EvidenceVerdict::ManualReview);
    assert!(logs[0].reason.contains("connection refused"));

    let _ = std::fs::remove_dir_all(root);
}

#[tokio::test]
async fn deleting_all_logs_removes_evidence_files() {
    let db = MemoryDb::default();
    let now = Utc::now();
    let account = db.insert(trial_account("budi", Duration::hours(24), now));
    let root = evidence_root();
    let service = payment_service(&db, PaymentMode::Manual, None, root.clone());

    service.submit(account.id, receipt(), now).await.unwrap();
    service.submit(account.id, receipt(), now).await.unwrap();
    let paths: Vec<PathBuf> = db.logs().iter().map(|l| root.join(&l.evidence_path)).collect();
    assert!(paths.iter().all(|p| p.exists()));

    assert_eq!(service.delete_all_logs().await.unwrap(), 2);
    assert!(db.logs().is_empty());
    assert!(paths.iter().all(|p| !p.exists()));

    let _ = std::fs::remove_dir_all(root);
}

// ============================================================================
// Ledger and budget alerts
// ============================================================================

#[tokio::test]
async fn daily_limit_warns_only_once_reached() {
    let db = MemoryDb::default();
    let now = Utc::now();
    let mut account = trial_account("budi", Duration::hours(24), now);
    account.daily_limit = 100_000;
    let account = db.insert(account);
    let ledger = ledger_for(&db);

    let first = ledger
        .record(account.id, expense(99_999, "Food"), now)
        .await
        .unwrap();
    assert_eq!(first.warning, None);

    let income_entry = ledger
        .record(account.id, income(500_000, "Salary"), now)
        .await
        .unwrap();
    assert_eq!(income_entry.warning, None);

    let second = ledger
        .record(account.id, expense(1, "Parking"), now)
        .await
        .unwrap();
    assert_eq!(second.warning.as_deref(), Some(DEFAULT_ALERT_MESSAGE));
}

#[tokio::test]
async fn custom_alert_message_is_used() {
    let db = MemoryDb::default();
    let now = Utc::now();
    let account = db.insert(trial_account("budi", Duration::hours(24), now));
    let budget = BudgetAlertEvaluator::new(db.accounts(), db.transactions());

    let saved = budget
        .update_settings(
            account.id,
            BudgetSettings {
                daily_limit: 50_000,
                alert_message: Some("  Slow down!  ".to_string()),
            },
        )
        .await
        .unwrap();
    assert_eq!(saved.alert_message.as_deref(), Some("Slow down!"));

    let ledger = ledger_for(&db);
    let recorded = ledger
        .record(account.id, expense(50_000, "Rent"), now)
        .await
        .unwrap();
    assert_eq!(recorded.warning.as_deref(), Some("Slow down!"));
}

#[tokio::test]
async fn ledger_lists_filters_and_summarizes_per_account() {
    let db = MemoryDb::default();
    let now = Utc::now();
    let account = db.insert(trial_account("budi", Duration::hours(24), now));
    let other = db.insert(trial_account("sari", Duration::hours(24), now));
    let ledger = ledger_for(&db);

    ledger
        .record(account.id, income(1_000_000, "Salary"), now - Duration::minutes(3))
        .await
        .unwrap();
    ledger
        .record(account.id, expense(25_000, "Food"), now - Duration::minutes(2))
        .await
        .unwrap();
    let coffee = ledger
        .record(
            account.id,
            NewTransaction {
                note: Some("Morning coffee".to_string()),
                ..expense(15_000, "Drinks")
            },
            now - Duration::minutes(1),
        )
        .await
        .unwrap()
        .transaction;
    ledger
        .record(other.id, expense(999, "Food"), now)
        .await
        .unwrap();

    let summary = ledger.summary(account.id).await.unwrap();
    assert_eq!(summary.total_income, 1_000_000);
    assert_eq!(summary.total_expense, 40_000);
    assert_eq!(summary.balance, 960_000);

    let expenses = ledger
        .list(
            account.id,
            &TransactionFilter {
                kind: Some(TransactionKind::Expense),
                search: None,
            },
            1,
            10,
        )
        .await
        .unwrap();
    assert_eq!(expenses.total, 2);
    assert_eq!(expenses.items[0].id, coffee.id);

    let searched = ledger
        .list(
            account.id,
            &TransactionFilter {
                kind: None,
                search: Some("COFFEE".to_string()),
            },
            1,
            10,
        )
        .await
        .unwrap();
    assert_eq!(searched.total, 1);

    let paged = ledger
        .list(account.id, &TransactionFilter::default(), 2, 2)
        .await
        .unwrap();
    assert_eq!(paged.items.len(), 1);
    assert_eq!(paged.total_pages, 2);

    let categories = ledger.categories(account.id).await.unwrap();
    assert_eq!(categories.len(), 3);

    let chart = ledger.daily_chart(account.id, now).await.unwrap();
    assert!(chart.iter().map(|p| p.expense).sum::<i64>() >= 40_000);
}

#[tokio::test]
async fn transactions_of_other_accounts_cannot_be_deleted() {
    let db = MemoryDb::default();
    let now = Utc::now();
    let owner = db.insert(trial_account("budi", Duration::hours(24), now));
    let intruder = db.insert(trial_account("sari", Duration::hours(24), now));
    let ledger = ledger_for(&db);

    let t = ledger
        .record(owner.id, expense(10_000, "Food"), now)
        .await
        .unwrap()
        .transaction;

    assert!(ledger.delete(intruder.id, t.id).await.is_err());
    assert_eq!(db.transaction_count(owner.id), 1);

    ledger.delete(owner.id, t.id).await.unwrap();
    assert_eq!(db.transaction_count(owner.id), 0);
}

// ============================================================================
// Chat bot
// ============================================================================

#[tokio::test]
async fn chat_records_and_reports_for_linked_accounts() {
    let db = MemoryDb::default();
    let now = Utc::now();
    let mut account = trial_account("budi", Duration::hours(24), now);
    account.telegram_id = Some(4242);
    account.daily_limit = 20_000;
    let account = db.insert(account);

    let ledger = ledger_for(&db);
    let notifier = Arc::new(RecordingNotifier::default());
    let chat = ChatService::new(
        db.accounts(),
        Arc::new(AccessGate::new(db.accounts())),
        ledger,
        notifier.clone(),
    );

    let saved = chat.reply_to(4242, "+50.000 Salary", now).await;
    assert!(saved.starts_with("Saved!"));

    let spent = chat.reply_to(4242, "-20000 Food lunch", now).await;
    assert!(spent.contains("Limit warning"));
    assert_eq!(db.transaction_count(account.id), 2);

    chat.handle_message(4242, "/saldo", now).await;
    let sent = notifier.sent.lock().unwrap().clone();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, 4242);
    assert!(sent[0].1.contains("Rp 30.000"));

    let stranger = chat.reply_to(1, "/saldo", now).await;
    assert!(stranger.contains("not linked"));
}

#[tokio::test]
async fn chat_respects_the_gate_but_still_answers_help() {
    let db = MemoryDb::default();
    let now = Utc::now();
    let mut account = trial_account("late", Duration::hours(1), now - Duration::hours(2));
    account.telegram_id = Some(77);
    let account = db.insert(account);

    let chat = ChatService::new(
        db.accounts(),
        Arc::new(AccessGate::new(db.accounts())),
        ledger_for(&db),
        Arc::new(RecordingNotifier::default()),
    );

    let help = chat.reply_to(77, "/help", now).await;
    assert!(help.contains("/saldo"));

    let blocked = chat.reply_to(77, "-5000 Food", now).await;
    assert!(blocked.contains("trial has ended"));
    assert_eq!(db.transaction_count(account.id), 0);
    assert_eq!(db.stored(account.id).unwrap().status, AccountStatus::Suspended);

    let again = chat.reply_to(77, "/saldo", now).await;
    assert!(again.contains("suspended"));
}

// ============================================================================
// Administration
// ============================================================================

#[tokio::test]
async fn admin_created_accounts_are_active_for_a_year() {
    let db = MemoryDb::default();
    let now = Utc::now();
    let admin = admin_service(&db, evidence_root());

    let account = admin
        .create_account("sari", "secret1", Some(99), now)
        .await
        .unwrap();
    assert_eq!(account.status, AccountStatus::Active);
    assert_eq!(account.telegram_id, Some(99));
    assert_eq!(account.trial_ends_at, now + Duration::days(365));

    assert!(matches!(
        admin.create_account("sari", "secret1", None, now).await,
        Err(AdminError::Validation(_))
    ));
}

#[tokio::test]
async fn trial_day_adjustments_follow_the_deadline_rules() {
    let db = MemoryDb::default();
    let now = Utc::now();
    let admin = admin_service(&db, evidence_root());

    let running = db.insert(trial_account("running", Duration::hours(10), now));
    let updated = admin
        .update_subscription(
            running.id,
            SubscriptionChange {
                status: None,
                add_trial_days: 3,
            },
            now,
        )
        .await
        .unwrap();
    assert_eq!(updated.trial_ends_at, running.trial_ends_at + Duration::days(3));
    assert_eq!(updated.status, AccountStatus::Trial);

    let mut lapsed = trial_account("lapsed", Duration::hours(1), now - Duration::days(5));
    lapsed.status = AccountStatus::Suspended;
    let lapsed = db.insert(lapsed);
    let revived = admin
        .update_subscription(
            lapsed.id,
            SubscriptionChange {
                status: None,
                add_trial_days: 2,
            },
            now,
        )
        .await
        .unwrap();
    assert_eq!(revived.trial_ends_at, now + Duration::days(2));
    assert_eq!(revived.status, AccountStatus::Trial);
    assert_eq!(revived.effective_status(now), EffectiveStatus::TrialValid);

    let activated = admin
        .update_subscription(
            lapsed.id,
            SubscriptionChange {
                status: Some(AccountStatus::Active),
                add_trial_days: 0,
            },
            now,
        )
        .await
        .unwrap();
    assert_eq!(activated.status, AccountStatus::Active);

    assert!(matches!(
        admin
            .update_subscription(lapsed.id, SubscriptionChange::default(), now)
            .await,
        Err(AdminError::Validation(_))
    ));
}

#[tokio::test]
async fn deleting_an_account_cascades_and_removes_evidence() {
    let db = MemoryDb::default();
    let now = Utc::now();
    let root = evidence_root();
    let owner = db.insert(Account::new_owner("owner".to_string(), "hash".to_string(), now));
    let account = db.insert(trial_account("budi", Duration::hours(24), now));

    ledger_for(&db)
        .record(account.id, expense(10_000, "Food"), now)
        .await
        .unwrap();
    payment_service(&db, PaymentMode::Manual, None, root.clone())
        .submit(account.id, receipt(), now)
        .await
        .unwrap();
    let artifact = root.join(&db.logs()[0].evidence_path);
    assert!(artifact.exists());

    let admin = admin_service(&db, root.clone());
    assert!(matches!(
        admin.delete_account(&owner.principal(), owner.id).await,
        Err(AdminError::SelfDeletion)
    ));

    admin.delete_account(&owner.principal(), account.id).await.unwrap();
    assert!(db.stored(account.id).is_none());
    assert_eq!(db.transaction_count(account.id), 0);
    assert!(db.logs().is_empty());
    assert!(!artifact.exists());

    assert!(matches!(
        admin.delete_account(&owner.principal(), account.id).await,
        Err(AdminError::NotFound)
    ));

    let _ = std::fs::remove_dir_all(root);
}

#[tokio::test]
async fn monthly_stats_only_count_the_current_month() {
    let db = MemoryDb::default();
    let now = Utc::now();
    let account = db.insert(trial_account("budi", Duration::hours(24), now));
    let ledger = ledger_for(&db);

    ledger
        .record(account.id, income(300_000, "Salary"), now)
        .await
        .unwrap();
    ledger
        .record(account.id, expense(50_000, "Food"), now - Duration::days(400))
        .await
        .unwrap();

    let stats = admin_service(&db, evidence_root())
        .monthly_stats(account.id, now)
        .await
        .unwrap();
    assert_eq!(stats.totals.total_income, 300_000);
    assert_eq!(stats.totals.total_expense, 0);
    assert_eq!(stats.month, now.with_timezone(&chrono::Local).format("%Y-%m").to_string());
}
