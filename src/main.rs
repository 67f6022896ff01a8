#[macro_use]
extern crate rocket;

mod config;
mod db;
mod guards;
mod marketplace;
mod models;
mod routes;
mod services;
mod store;
mod utils;

use dotenvy::dotenv;
use rocket::fairing::{Fairing, Info, Kind};
use rocket::http::Header;
use rocket::{Build, Request, Response, Rocket};
use rocket_okapi::openapi_get_routes;
use rocket_okapi::swagger_ui::{SwaggerUIConfig, make_swagger_ui};

/* ----------------------------- CORS ----------------------------- */

pub struct CORS;

#[rocket::async_trait]
impl Fairing for CORS {
    fn info(&self) -> Info {
        Info {
            name: "CORS",
            kind: Kind::Response,
        }
    }

    async fn on_response<'r>(&self, request: &'r Request<'_>, response: &mut Response<'r>) {
        if let Some(origin) = request.headers().get_one("Origin") {
            response.set_header(Header::new("Access-Control-Allow-Origin", origin));
        }

        response.set_header(Header::new(
            "Access-Control-Allow-Methods",
            "GET, POST, PUT, DELETE, OPTIONS",
        ));

        response.set_header(Header::new(
            "Access-Control-Allow-Headers",
            "Content-Type, Authorization",
        ));

        response.set_header(Header::new("Access-Control-Allow-Credentials", "true"));
    }
}

/* ----------------------------- OPTIONS ----------------------------- */

#[options("/<_..>")]
fn options_handler() {}

/* ----------------------------- ERRORS ----------------------------- */

#[catch(401)]
fn unauthorized() -> rocket::serde::json::Value {
    rocket::serde::json::json!({
        "success": false,
        "message": "Missing or invalid bearer token"
    })
}

#[catch(404)]
fn not_found() -> rocket::serde::json::Value {
    rocket::serde::json::json!({
        "success": false,
        "message": "Resource not found (check /api/v1 prefix)"
    })
}

#[catch(422)]
fn unprocessable() -> rocket::serde::json::Value {
    rocket::serde::json::json!({
        "success": false,
        "message": "Malformed request body"
    })
}

#[catch(500)]
fn internal_error() -> rocket::serde::json::Value {
    rocket::serde::json::json!({
        "success": false,
        "message": "Internal server error"
    })
}

/* ----------------------------- SWAGGER ----------------------------- */

fn swagger_config() -> SwaggerUIConfig {
    SwaggerUIConfig {
        url: "/api/v1/openapi.json".to_string(),
        ..Default::default()
    }
}

/* ----------------------------- LAUNCH ----------------------------- */

/// Routes, fairings and catchers, without the database. The caller manages
/// a `Marketplace`.
fn app() -> Rocket<Build> {
    rocket::build()
        .attach(CORS)
        .mount("/", routes![options_handler])
        .mount(
            "/api/v1",
            openapi_get_routes![
                // Requests
                routes::request::create_request,
                routes::request::list_open_requests,
                routes::request::list_my_requests,
                routes::request::list_assigned_requests,
                routes::request::get_request,
                routes::request::update_request_status,
                routes::request::delete_request,
                // Bids
                routes::bid::submit_bid,
                routes::bid::list_my_bids,
                routes::bid::list_bids,
                routes::bid::accept_bid,
                routes::bid::reject_bid,
                // Reviews
                routes::review::create_review,
                routes::review::get_user_reviews,
                routes::review::get_request_reviews,
                // Ratings
                routes::rating::get_rating,
            ],
        )
        .mount("/api/docs", make_swagger_ui(&swagger_config()))
        .register(
            "/",
            catchers![unauthorized, not_found, unprocessable, internal_error],
        )
}

#[launch]
fn rocket() -> Rocket<Build> {
    dotenv().ok();
    env_logger::init();

    log::info!("🚀 Marketplace API starting");
    log::info!("📚 Swagger UI → http://localhost:8000/api/docs");

    app().attach(db::init())
}
