mod errors;
mod handlers;
mod middleware;
mod models;
mod services;
#[cfg(test)]
mod test_utils;
mod utils;

use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use services::file_store::LocalFileStore;
use services::sheet_cache::SheetCache;
use utils::{config::Config, db::create_schema, db::establish_connection};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load .env file FIRST before anything else
    dotenv::dotenv().ok();

    // Initialize logger with default level if RUST_LOG not set
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    println!("=================================================");
    println!("🎓 Student Hub Backend Server");
    println!("=================================================");

    let config = Config::from_env().map_err(|e| {
        log::error!("❌ Failed to load configuration: {}", e);
        std::io::Error::other(e.to_string())
    })?;
    let host = config.host.clone();
    let port = config.port;

    println!("📝 Configuration loaded:");
    println!(
        "   - Database: {}",
        config.database_url.split('@').last().unwrap_or("***")
    );
    println!("   - Host: {}", host);
    println!("   - Port: {}", port);
    println!(
        "   - Registration: {}",
        if config.allow_registration {
            "ENABLED"
        } else {
            "DISABLED"
        }
    );
    println!("   - Uploads: {}", config.upload_dir);
    println!(
        "   - Log level: {}",
        std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string())
    );

    // Establish database connection
    print!("🔌 Connecting to database... ");
    let db = establish_connection(&config.database_url)
        .await
        .map_err(|e| {
            log::error!("❌ Failed to connect to database: {}", e);
            std::io::Error::other(e.to_string())
        })?;
    println!("✅ Connected!");

    log::info!("Database connection established");

    if config.auto_create_schema {
        log::info!("Creating missing tables");
        create_schema(&db).await.map_err(|e| {
            log::error!("❌ Failed to create schema: {}", e);
            std::io::Error::other(e.to_string())
        })?;
    }

    // Shared across workers: one snapshot cache per process
    let sheet_cache = web::Data::new(SheetCache::new());
    let file_store = web::Data::new(LocalFileStore::new(config.upload_dir.clone()));

    println!("🌐 Starting HTTP server at http://{}:{}", host, port);
    println!("📍 Available endpoints:");
    println!("   - POST http://{}:{}/auth/register", host, port);
    println!("   - POST http://{}:{}/auth/login", host, port);
    println!("   - GET  http://{}:{}/public/portfolios/{{token}}", host, port);
    println!("   - GET  http://{}:{}/public/sheets/{{token}}", host, port);
    println!(
        "   - POST http://{}:{}/webhooks/approval (X-Webhook-Secret required)",
        host, port
    );
    println!(
        "   - GET  http://{}:{}/activities (JWT required)",
        host, port
    );
    println!("   - GET  http://{}:{}/dashboard (JWT required)", host, port);
    println!("   - GET  http://{}:{}/portfolio (JWT required)", host, port);
    println!("   - GET  http://{}:{}/jobs (JWT required)", host, port);
    println!("=================================================");

    log::info!("Server started at http://{}:{}", host, port);

    HttpServer::new(move || {
        // Strict CORS for authenticated API endpoints
        let cors = Cors::default()
            .allowed_origin("http://localhost:5173")
            .allowed_origin("http://localhost:3000")
            .allowed_origin(&config.frontend_url)
            .allowed_methods(vec!["GET", "POST", "PUT", "DELETE", "OPTIONS"])
            .allowed_headers(vec![
                actix_web::http::header::AUTHORIZATION,
                actix_web::http::header::ACCEPT,
                actix_web::http::header::CONTENT_TYPE,
            ])
            .max_age(3600);

        App::new()
            .app_data(web::Data::new(db.clone()))
            .app_data(web::Data::new(config.clone()))
            .app_data(sheet_cache.clone())
            .app_data(file_store.clone())
            .wrap(Logger::default())
            .wrap(cors) // CORS must be wrapped AFTER Logger to ensure headers are added to all responses
            .configure(handlers::configure)
    })
    .bind((host, port))?
    .run()
    .await
}
