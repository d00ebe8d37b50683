use actix_web::{HttpResponse, Responder, post, web};
use log::{info, warn};

use super::models::{AppState, MineRequest, MineResponse};

const DEFAULT_MAX_STEPS: u64 = 100_000;

/// Drive the mining protocol for up to `max_steps` calls. Each call to
/// the engine is one discrete Proof-of-Work attempt (or one block
/// assembly when the tip is already mined); the loop and its bound live
/// here, in the driver, so callers control pacing and can stop at any
/// point without leaving work in flight.
#[post("/mine/")]
pub async fn mine(state: web::Data<AppState>, req: web::Json<MineRequest>) -> impl Responder {
    let miner_address = req.miner_address.trim();
    if miner_address.is_empty() {
        return HttpResponse::BadRequest().body("miner_address required");
    }
    let max_steps = req.max_steps.unwrap_or(DEFAULT_MAX_STEPS);

    let mut ledger = state.ledger.lock().expect("mutex poisoned");
    let mut sealed = false;
    let mut steps = 0u64;
    while steps < max_steps {
        steps += 1;
        match ledger.commit_mining(miner_address) {
            Ok(true) => {
                sealed = true;
                break;
            }
            Ok(false) => {}
            Err(e) => {
                warn!("POST /mine/ aborted after {steps} steps: {e}");
                return HttpResponse::BadRequest().body(e.to_string());
            }
        }
    }

    if sealed {
        info!(
            "POST /mine/ sealed block #{} after {} steps",
            ledger.len() - 1,
            steps
        );
    }
    HttpResponse::Ok().json(MineResponse {
        sealed,
        steps,
        height: ledger.len(),
        difficulty: ledger.difficulty,
    })
}
