use actix_web::{HttpResponse, Responder, post, web};
use log::{info, warn};

use super::models::{AppState, NewTxRequest, NewTxResponse};
use crate::transaction::Transaction;
use crate::wallet::Keypair;

/// Build, nonce-stamp, sign and submit a transfer for the supplied
/// private key. Server-side signing is a demo convenience; the engine
/// itself only ever sees the finished transaction.
#[post("/tx/")]
pub async fn post_transaction(
    state: web::Data<AppState>,
    body: web::Json<NewTxRequest>,
) -> impl Responder {
    let keypair = match Keypair::from_secret_hex(&body.from_private_key) {
        Ok(kp) => kp,
        Err(e) => {
            warn!("POST /tx/ rejected: {e}");
            return HttpResponse::BadRequest().body(e.to_string());
        }
    };

    // Match the sender encoding to the recipient's so the pair
    // classifies: raw key endpoints pair with raw keys, addresses with
    // addresses.
    let from = if body.to.len() == keypair.public_key_hex().len() {
        keypair.public_key_hex()
    } else {
        keypair.address()
    };

    let mut tx = match Transaction::new(Some(from), body.to.clone(), body.amount) {
        Ok(tx) => tx,
        Err(e) => {
            warn!("POST /tx/ rejected: {e}");
            return HttpResponse::BadRequest().body(e.to_string());
        }
    };

    // Nonce resolution and admission under one lock so two submissions
    // cannot race the same nonce.
    let mut ledger = state.ledger.lock().expect("mutex poisoned");
    let nonce = ledger.next_nonce(&keypair.address());
    tx.nonce = Some(nonce);
    if let Err(e) = tx.sign(&keypair) {
        warn!("POST /tx/ rejected: {e}");
        return HttpResponse::BadRequest().body(e.to_string());
    }
    let hash = tx.hash.clone();
    if let Err(e) = ledger.add_transaction(tx) {
        warn!("POST /tx/ rejected: {e}");
        return HttpResponse::BadRequest().body(e.to_string());
    }

    info!("POST /tx/ accepted {hash} (nonce {nonce})");
    HttpResponse::Ok().json(NewTxResponse {
        hash,
        nonce,
        pending: ledger.pending_transactions.len(),
    })
}
