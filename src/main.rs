mod api;
mod ledger;
mod transaction;
mod wallet;

use actix_web::{App, HttpServer, web};
use dotenvy::dotenv;
use std::env;
use std::io;

use api::AppState;
use wallet::mnemonic::Dictionary;

#[actix_web::main]
async fn main() -> io::Result<()> {
    let _ = dotenv();
    env_logger::init();

    let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
    let port: u16 = env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(8080);
    let wordlist_path = env::var("WORDLIST_PATH").unwrap_or_else(|_| "bip39.txt".to_string());

    let dictionary = Dictionary::load(&wordlist_path)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))?;
    log::info!(
        "loaded {} mnemonic words from {}",
        dictionary.len(),
        wordlist_path
    );

    println!("⛓️ Starting ledger API at http://{host}:{port}");

    let state = web::Data::new(AppState::new(dictionary));

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .configure(api::init_routes)
    })
    .bind((host.as_str(), port))?
    .run()
    .await
}
