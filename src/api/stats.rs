use actix_web::{HttpResponse, Responder, get, web};

use super::models::{AppState, StatsResponse};

/// Consensus parameters and queue sizes.
#[get("/stats/")]
pub async fn get_stats(state: web::Data<AppState>) -> impl Responder {
    let ledger = state.ledger.lock().expect("mutex poisoned");
    HttpResponse::Ok().json(StatsResponse {
        height: ledger.len(),
        difficulty: ledger.difficulty,
        mining_reward: ledger.mining_reward,
        remaining_supply: ledger.remaining_supply,
        next_halving_threshold: ledger.next_halving_threshold,
        target_block_time: ledger.target_block_time,
        reward_adjust_interval: ledger.reward_adjust_interval,
        pending_transactions: ledger.pending_transactions.len(),
    })
}
