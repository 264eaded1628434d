// src/main.rs

mod access;
mod app_state;
mod attachment;
mod auth;
mod comment;
mod config;
mod context;
mod error;
mod models;
mod project;
mod response;
mod services;
mod store;
mod ticket;
mod uploads;
mod user_management;

use std::io;
use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{http, middleware::Logger, web, App, HttpServer};
use env_logger::Env;
use log::info;

use crate::app_state::AppState;
use crate::attachment::AttachmentStorage;
use crate::auth::{login, me, signup, Authentication};
use crate::comment::{create_comment, delete_comment, list_comments, update_comment};
use crate::config::{Config, StoreBackend};
use crate::error::AppError;
use crate::project::{
    add_user_to_project, change_member_role, create_project, delete_project, get_project,
    list_members, list_projects, remove_user_from_project, update_project,
};
use crate::store::{MemoryStore, MongoStore, Store};
use crate::ticket::{
    create_ticket, delete_ticket, get_ticket, list_project_tickets, list_tickets, update_ticket,
    upload_ticket_photo,
};
use crate::uploads::serve_upload;
use crate::user_management::{delete_user, get_user, list_users, update_user};

/// Extractor settings: body limits sized for photos, and malformed JSON or
/// query input reported through the usual error envelope.
fn extractor_config(max_upload_bytes: usize) -> impl FnOnce(&mut web::ServiceConfig) {
    move |cfg| {
        cfg.app_data(
            web::JsonConfig::default()
                // base64 inflates by 4/3; leave room for the other fields
                .limit(max_upload_bytes / 3 * 4 + 64 * 1024)
                .error_handler(|err, _req| AppError::Validation(err.to_string()).into()),
        )
        .app_data(
            web::QueryConfig::default()
                .error_handler(|err, _req| AppError::Validation(err.to_string()).into()),
        )
        .app_data(web::PayloadConfig::new(max_upload_bytes + 1));
    }
}

/// Route table.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .service(
                web::scope("/auth")
                    .route("/signup", web::post().to(signup))
                    .route("/login", web::post().to(login))
                    .route("/me", web::get().to(me)),
            )
            // USERS
            .service(
                web::scope("/users")
                    .route("", web::get().to(list_users))
                    .route("/{user_id}", web::get().to(get_user))
                    .route("/{user_id}", web::put().to(update_user))
                    .route("/{user_id}", web::delete().to(delete_user)),
            )
            // PROJECTS
            .service(
                web::scope("/projects")
                    .route("", web::get().to(list_projects))
                    .route("", web::post().to(create_project))
                    .route("/{project_id}", web::get().to(get_project))
                    .route("/{project_id}", web::put().to(update_project))
                    .route("/{project_id}", web::delete().to(delete_project))
                    .route("/{project_id}/members", web::get().to(list_members))
                    .route("/{project_id}/members", web::post().to(add_user_to_project))
                    .route("/{project_id}/members/{user_id}", web::put().to(change_member_role))
                    .route(
                        "/{project_id}/members/{user_id}",
                        web::delete().to(remove_user_from_project),
                    )
                    .route("/{project_id}/tickets", web::get().to(list_project_tickets))
                    .route("/{project_id}/tickets", web::post().to(create_ticket)),
            )
            // TICKETS
            .service(
                web::scope("/tickets")
                    .route("", web::get().to(list_tickets))
                    .route("/{ticket_id}", web::get().to(get_ticket))
                    .route("/{ticket_id}", web::put().to(update_ticket))
                    .route("/{ticket_id}", web::delete().to(delete_ticket))
                    .route("/{ticket_id}/photo", web::put().to(upload_ticket_photo))
                    .route("/{ticket_id}/comments", web::get().to(list_comments))
                    .route("/{ticket_id}/comments", web::post().to(create_comment)),
            )
            // COMMENTS
            .service(
                web::scope("/comments")
                    .route("/{comment_id}", web::put().to(update_comment))
                    .route("/{comment_id}", web::delete().to(delete_comment)),
            ),
    )
    .route("/uploads/{file_name}", web::get().to(serve_upload));
}

async fn open_store(config: &Config) -> io::Result<Arc<dyn Store>> {
    match config.store_backend {
        StoreBackend::Memory => {
            info!("Using in-memory store; data is lost on restart");
            Ok(Arc::new(MemoryStore::new()))
        }
        StoreBackend::Mongo => {
            let uri = config
                .mongo_uri
                .as_deref()
                .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "MONGO_URI must be set"))?;
            let store = MongoStore::init(uri, &config.database_name)
                .await
                .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
            Ok(Arc::new(store))
        }
    }
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let config = Config::from_env().map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
    let store = open_store(&config).await?;
    let state = AppState {
        store,
        attachments: AttachmentStorage::new(&config.upload_dir, config.max_upload_bytes),
        config: config.clone(),
    };

    info!("Server running at http://{}", config.bind_address);
    info!("Allowed CORS Origin: {}", config.frontend_origin);

    let bind_address = config.bind_address.clone();
    HttpServer::new(move || {
        let cors = Cors::default()
            .allowed_origin(&config.frontend_origin)
            .allowed_methods(vec!["GET", "POST", "PUT", "DELETE", "OPTIONS"])
            .allowed_headers(vec![
                http::header::CONTENT_TYPE,
                http::header::ACCEPT,
                http::header::AUTHORIZATION,
            ])
            .supports_credentials()
            .max_age(3600);

        App::new()
            .wrap(Authentication::new(config.jwt_secret.clone()))
            .wrap(cors)
            .wrap(Logger::default())
            .app_data(web::Data::new(state.clone()))
            .configure(extractor_config(config.max_upload_bytes))
            .configure(configure)
    })
    .bind(bind_address)?
    .run()
    .await
}
