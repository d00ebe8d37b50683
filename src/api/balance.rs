use actix_web::{HttpResponse, Responder, get, web};

use super::models::{AppState, BalanceResponse};
use crate::ledger::BalanceIdentity;

/// Balance for a raw public key, an address, or the `mint` sentinel
/// (which reports the remaining unissued supply). Anything else
/// classifies as empty and reports zero.
#[get("/balance/{identity}/")]
pub async fn get_balance(state: web::Data<AppState>, path: web::Path<(String,)>) -> impl Responder {
    let identity = path.into_inner().0;
    let resolved = BalanceIdentity::classify(&identity);

    let balance = {
        let ledger = state.ledger.lock().expect("mutex poisoned");
        ledger.get_balance(&resolved)
    };

    HttpResponse::Ok().json(BalanceResponse { identity, balance })
}
