//! Routers for the two listeners.
//!
//! ## REST application
//! - `/widgets`, `/installations`: model CRUD (find, findOne, count,
//!   create, upsert, by-id get/update/delete, exists)
//! - `/customers`: create, login, logout, change-password, owner-only reads
//! - `/containers`: list/create/bulk-delete containers; per-container
//!   files, multipart upload and streamed download
//! - `/healthz`, `/readyz`
//!
//! ## Remoting server
//! - `/contract/*` and `/simple/*`: fixed remote methods
//! - `/{SimpleClass|ContractClass}/…`: static and instance methods

use crate::{
    context::AppContext,
    handlers::{
        container_handlers, customer_handlers,
        health_handlers::{healthz, readyz},
        model_handlers as model, remoting_handlers as remoting,
    },
    models::{installation::Installation, widget::Widget},
    services::{
        memory_store::{Model, ModelStore},
        remote_methods::SHARED_CLASSES,
    },
};
use axum::{
    Router,
    extract::{DefaultBodyLimit, FromRef},
    http::Request,
    routing::{get, post},
};
use tower_http::trace::{DefaultOnResponse, TraceLayer};
use tracing::Level;

/// CRUD routes for one datastore model, to be nested under its plural path.
fn model_routes<T>() -> Router<AppContext>
where
    T: Model,
    ModelStore<T>: FromRef<AppContext>,
{
    Router::new()
        .route(
            "/",
            get(model::find::<T>)
                .post(model::create::<T>)
                .put(model::upsert::<T>),
        )
        .route("/count", get(model::count::<T>))
        .route("/findOne", get(model::find_one::<T>))
        .route(
            "/{id}",
            get(model::find_by_id::<T>)
                .put(model::update_attributes::<T>)
                .delete(model::delete_by_id::<T>),
        )
        .route("/{id}/exists", get(model::exists::<T>))
}

fn customer_routes() -> Router<AppContext> {
    Router::new()
        .route("/", post(customer_handlers::create_customer))
        .route("/login", post(customer_handlers::login))
        .route("/logout", post(customer_handlers::logout))
        .route("/change-password", post(customer_handlers::change_password))
        .route("/{id}", get(customer_handlers::get_customer))
        .route("/{id}/accessTokens", get(customer_handlers::access_tokens))
}

fn container_routes() -> Router<AppContext> {
    Router::new()
        .route(
            "/",
            get(container_handlers::list_containers)
                .post(container_handlers::create_container)
                .delete(container_handlers::destroy_all_containers),
        )
        .route(
            "/{container}",
            get(container_handlers::get_container).delete(container_handlers::destroy_container),
        )
        .route("/{container}/files", get(container_handlers::list_files))
        .route(
            "/{container}/files/{file}",
            get(container_handlers::get_file).delete(container_handlers::remove_file),
        )
        // Uploads stream to disk, so axum's 2 MiB default does not apply.
        .route(
            "/{container}/upload",
            post(container_handlers::upload).layer(DefaultBodyLimit::disable()),
        )
        .route(
            "/{container}/download/{file}",
            get(container_handlers::download),
        )
}

/// The REST application. State is supplied by the caller.
pub fn rest_routes() -> Router<AppContext> {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .nest("/widgets", model_routes::<Widget>())
        .nest("/installations", model_routes::<Installation>())
        .nest("/customers", customer_routes())
        .nest("/containers", container_routes())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &Request<_>| {
                    tracing::info_span!(
                        "rest",
                        method = %request.method(),
                        uri = %request.uri(),
                    )
                })
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
}

/// The remoting test server; stateless.
pub fn remoting_routes() -> Router {
    let mut router = Router::new()
        .route("/healthz", get(healthz))
        .route("/contract/customizedGetSecret", get(remoting::get_secret))
        .route("/contract/customizedTransform", get(remoting::transform))
        .route("/contract/geopoint", get(remoting::geopoint))
        .route("/contract/list", get(remoting::list))
        .route(
            "/contract/get-auth",
            get(remoting::get_auth).post(remoting::get_auth),
        )
        .route(
            "/contract/binary",
            get(remoting::binary).post(remoting::binary),
        )
        .route(
            "/simple/getSecret",
            get(remoting::get_secret).post(remoting::get_secret),
        )
        .route(
            "/simple/transform",
            get(remoting::transform).post(remoting::transform),
        );

    for class in SHARED_CLASSES {
        router = router
            .route(
                &format!("/{}/getFavoritePerson", class),
                get(remoting::favorite_person).post(remoting::favorite_person),
            )
            .route(
                &format!("/{}/{{name}}/getName", class),
                get(remoting::get_name).post(remoting::get_name),
            )
            .route(
                &format!("/{}/{{name}}/greet", class),
                get(remoting::greet).post(remoting::greet),
            );
    }

    router.layer(
        TraceLayer::new_for_http()
            .make_span_with(|request: &Request<_>| {
                tracing::info_span!(
                    "remoting",
                    method = %request.method(),
                    uri = %request.uri(),
                )
            })
            .on_response(DefaultOnResponse::new().level(Level::INFO)),
    )
}
