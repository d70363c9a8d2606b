use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::wallet::{TransactionKind, Wallet, WalletTransaction};
use crate::state::AppState;

/// One reward point per this many units credited.
const REWARD_POINT_DIVISOR: i64 = 10;

/// The single wallet mutation point. The wallet entry is created lazily and
/// mutated inside one `entry` scope, so concurrent calls against the same
/// wallet serialize and the balance always equals the signed sum of the log.
pub fn add_transaction(
    state: &AppState,
    user: Uuid,
    kind: TransactionKind,
    amount: i64,
    description: String,
    request: Option<Uuid>,
) -> Result<Wallet, AppError> {
    if amount <= 0 {
        return Err(AppError::Validation(
            "transaction amount must be positive".to_string(),
        ));
    }

    let mut wallet = state
        .wallets
        .entry(user)
        .or_insert_with(|| Wallet::new(user));

    match kind {
        TransactionKind::Debit => {
            if wallet.balance < amount {
                return Err(AppError::InsufficientBalance(format!(
                    "debit of {amount} exceeds balance {}",
                    wallet.balance
                )));
            }
            wallet.balance -= amount;
        }
        TransactionKind::Credit => {
            wallet.balance += amount;
            wallet.reward_points += (amount / REWARD_POINT_DIVISOR) as u64;
        }
    }

    wallet.transactions.push(WalletTransaction {
        id: Uuid::new_v4(),
        kind,
        amount,
        description,
        request,
        created_at: Utc::now(),
    });

    Ok(wallet.clone())
}

/// Debit the sender's committed funds when a delivery is approved.
pub fn hold(
    state: &AppState,
    sender: Uuid,
    cost: i64,
    request_id: Uuid,
    tracking_id: &str,
) -> Result<Wallet, AppError> {
    let wallet = add_transaction(
        state,
        sender,
        TransactionKind::Debit,
        cost,
        format!("Hold for delivery {tracking_id}"),
        Some(request_id),
    )?;

    state
        .metrics
        .settlements_total
        .with_label_values(&["hold"])
        .inc();
    info!(user = %sender, amount = cost, request_id = %request_id, "hold placed");

    Ok(wallet)
}

/// Pay the traveler once the delivery lands.
pub fn release(
    state: &AppState,
    traveler: Uuid,
    amount: i64,
    request_id: Uuid,
    tracking_id: &str,
) -> Result<Wallet, AppError> {
    let wallet = add_transaction(
        state,
        traveler,
        TransactionKind::Credit,
        amount,
        format!("Payout for delivery {tracking_id}"),
        Some(request_id),
    )?;

    state
        .metrics
        .settlements_total
        .with_label_values(&["release"])
        .inc();
    info!(user = %traveler, amount, request_id = %request_id, "payout released");

    Ok(wallet)
}

/// Return held funds to the sender on cancellation or fraud resolution.
pub fn refund(
    state: &AppState,
    sender: Uuid,
    cost: i64,
    request_id: Uuid,
    tracking_id: &str,
) -> Result<Wallet, AppError> {
    let wallet = add_transaction(
        state,
        sender,
        TransactionKind::Credit,
        cost,
        format!("Refund for delivery {tracking_id}"),
        Some(request_id),
    )?;

    state
        .metrics
        .settlements_total
        .with_label_values(&["refund"])
        .inc();
    info!(user = %sender, amount = cost, request_id = %request_id, "hold refunded");

    Ok(wallet)
}

pub fn payout_after_fee(cost: i64, fee_bps: u32) -> i64 {
    cost - cost * i64::from(fee_bps) / 10_000
}

/// Balance derived by replaying the transaction log.
pub fn replay_balance(wallet: &Wallet) -> i64 {
    wallet
        .transactions
        .iter()
        .map(|tx| match tx.kind {
            TransactionKind::Credit => tx.amount,
            TransactionKind::Debit => -tx.amount,
        })
        .sum()
}
