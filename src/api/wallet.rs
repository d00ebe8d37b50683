use actix_web::{HttpResponse, Responder, post, web};
use log::warn;

use super::models::{AppState, NewWalletResponse, RecoverRequest, RecoverResponse};
use crate::wallet::Keypair;
use crate::wallet::mnemonic::{decode_mnemonic, encode_mnemonic};

/// Generate a fresh wallet: keypair, derived address and the 24-word
/// mnemonic encoding of the private key.
#[post("/wallet/new/")]
pub async fn create_wallet(state: web::Data<AppState>) -> impl Responder {
    let keypair = Keypair::generate();
    let mnemonic = match encode_mnemonic(&keypair.secret_key_hex(), &state.dictionary) {
        Ok(words) => words,
        Err(e) => {
            warn!("POST /wallet/new/ failed: {e}");
            return HttpResponse::InternalServerError().body(e.to_string());
        }
    };
    HttpResponse::Ok().json(NewWalletResponse {
        private_key: keypair.secret_key_hex(),
        public_key: keypair.public_key_hex(),
        address: keypair.address(),
        mnemonic,
    })
}

/// Recover a wallet from its mnemonic words.
#[post("/wallet/recover/")]
pub async fn recover_wallet(
    state: web::Data<AppState>,
    body: web::Json<RecoverRequest>,
) -> impl Responder {
    let secret_hex = match decode_mnemonic(&body.mnemonic, &state.dictionary) {
        Ok(hex) => hex,
        Err(e) => {
            warn!("POST /wallet/recover/ rejected: {e}");
            return HttpResponse::BadRequest().body(e.to_string());
        }
    };
    let keypair = match Keypair::from_secret_hex(&secret_hex) {
        Ok(kp) => kp,
        Err(e) => {
            warn!("POST /wallet/recover/ rejected: {e}");
            return HttpResponse::BadRequest().body(e.to_string());
        }
    };
    HttpResponse::Ok().json(RecoverResponse {
        private_key: secret_hex,
        public_key: keypair.public_key_hex(),
        address: keypair.address(),
    })
}
