mod balance;
mod chain;
mod health;
mod mining;
pub mod models;
mod stats;
mod tx;
mod wallet;

use actix_web::web::{self, ServiceConfig};

pub use models::AppState;

pub fn init_routes(cfg: &mut ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .service(health::health_check)
            .service(chain::get_chain)
            .service(chain::validate_chain)
            .service(stats::get_stats)
            .service(balance::get_balance)
            .service(tx::post_transaction)
            .service(mining::mine)
            .service(wallet::create_wallet)
            .service(wallet::recover_wallet),
    );
}
