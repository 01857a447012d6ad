mod config;
mod db;
mod errors;
mod handlers;
mod middleware;
mod models;
mod storage;
mod utils;

use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use dotenv::dotenv;
use log::info;

use crate::config::Config;
use crate::db::{FileStore, PgFileStore, PgUserStore, UserStore};
use crate::storage::s3::{create_s3_client, S3BlobStore};
use crate::storage::BlobStore;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok();
    env_logger::init();

    let config = Config::init();
    let pool = db::create_pool(&config.database_url).await;

    let s3_client = create_s3_client().await;
    let blob_store: Arc<dyn BlobStore> =
        Arc::new(S3BlobStore::new(s3_client, config.s3_bucket.clone()));
    let user_store: Arc<dyn UserStore> = Arc::new(PgUserStore::new(pool.clone()));
    let file_store: Arc<dyn FileStore> = Arc::new(PgFileStore::new(pool));

    let blob_store = web::Data::from(blob_store);
    let user_store = web::Data::from(user_store);
    let file_store = web::Data::from(file_store);
    let config_data = web::Data::new(config.clone());

    let bind_addr = ("0.0.0.0", config.port);
    info!("Starting server at {}:{}", bind_addr.0, bind_addr.1);

    HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .supports_credentials();

        App::new()
            .wrap(Logger::default())
            .wrap(cors)
            .app_data(config_data.clone())
            .app_data(user_store.clone())
            .app_data(file_store.clone())
            .app_data(blob_store.clone())
            .service(
                web::scope("/users")
                    .service(
                        web::resource("/register").route(web::post().to(handlers::auth::register)),
                    )
                    .service(web::resource("/login").route(web::post().to(handlers::auth::login)))
                    .service(web::resource("/logout").route(web::get().to(handlers::auth::logout)))
                    .service(
                        web::resource("/refreshAccessToken")
                            .route(web::post().to(handlers::auth::refresh_access_token)),
                    )
                    .service(
                        web::resource("/changePassword")
                            .route(web::post().to(handlers::auth::change_password)),
                    )
                    .service(
                        web::resource("/getUserDetails")
                            .route(web::post().to(handlers::auth::get_user_details)),
                    ),
            )
            .service(
                web::scope("/files")
                    .service(
                        web::resource("/register")
                            .route(web::post().to(handlers::file::register_files)),
                    )
                    .service(
                        web::resource("/owned").route(web::get().to(handlers::file::owned_files)),
                    )
                    .service(
                        web::resource("/shared").route(web::get().to(handlers::file::shared_files)),
                    )
                    .service(
                        web::resource("/share/{fileId}")
                            .route(web::post().to(handlers::file::share_with_users)),
                    )
                    .service(
                        web::resource("/shareLink/{id}")
                            .route(web::post().to(handlers::file::create_share_link)),
                    )
                    .service(
                        web::resource("/open/{fileId}/{expiryDate}")
                            .route(web::get().to(handlers::file::open_shared_link)),
                    )
                    .service(
                        web::resource("/shareToken/{id}")
                            .route(web::post().to(handlers::file::create_share_token))
                            .route(web::delete().to(handlers::file::revoke_share_link)),
                    )
                    .service(
                        web::resource("/token/{token}")
                            .route(web::get().to(handlers::file::access_by_share_token)),
                    )
                    .service(
                        web::resource("/signedUrl/{id}")
                            .route(web::get().to(handlers::file::get_signed_url)),
                    )
                    .service(
                        web::resource("/{id}/shared-users")
                            .route(web::delete().to(handlers::file::remove_shared_users)),
                    )
                    .service(web::resource("/{id}").route(web::get().to(handlers::file::get_file))),
            )
    })
    .bind(bind_addr)?
    .run()
    .await
}
