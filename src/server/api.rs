use crate::assistant::Assistant;
use crate::catalog::{ self, NO_RESULTS_MESSAGE };
use crate::cli::Args;
use crate::contact::{ self, FieldError };
use crate::config::replies::Intent;
use crate::models::catalog::{ Category, Product, ALL_CATEGORIES };
use crate::models::contact::ContactForm;
use std::error::Error;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::Mutex;
use axum::{
    routing::{ get, post },
    Router,
    Json,
    extract::{ State, Query },
    response::IntoResponse,
    http::StatusCode,
};
use serde::{ Deserialize, Serialize };
use tower_http::cors::{ Any, CorsLayer };
use log::{ debug, info, warn, error };

#[derive(Deserialize, Default)]
pub struct ProductQuery {
    pub q: Option<String>,
    pub category: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ProductView<'a> {
    #[serde(flatten)]
    product: &'a Product,
    display_price: String,
    display_original_price: String,
    discount_percent: u32,
}

impl<'a> From<&'a Product> for ProductView<'a> {
    fn from(product: &'a Product) -> Self {
        Self {
            product,
            display_price: product.display_price(),
            display_original_price: product.display_original_price(),
            discount_percent: product.discount_percent(),
        }
    }
}

#[derive(Serialize)]
struct ProductsResponse<'a> {
    products: Vec<ProductView<'a>>,
    count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<&'static str>,
}

#[derive(Deserialize)]
pub struct ReplyRequest {
    #[serde(default)]
    pub message: String,
}

#[derive(Serialize)]
struct ReplyResponse {
    intent: Intent,
    reply: String,
}

#[derive(Serialize)]
struct ContactResponse {
    success: bool,
    message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    errors: Vec<FieldError>,
}

#[derive(Serialize)]
struct ReloadResponse {
    success: bool,
    message: String,
}

#[derive(Clone)]
struct AppState {
    assistant: Arc<Mutex<Assistant>>,
}

pub fn router(assistant: Arc<Mutex<Assistant>>) -> Router {
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

    Router::new()
        .route("/api/products", get(products_handler))
        .route("/api/products/categories", get(categories_handler))
        .route("/api/chat/quick-actions", get(quick_actions_handler))
        .route("/api/chat/reply", post(reply_handler))
        .route("/api/contact", post(contact_handler))
        .route("/api/reload-replies", get(reload_replies_handler))
        .layer(cors)
        .with_state(AppState { assistant })
}

pub async fn start_http_server(
    http_port: u16,
    assistant: Arc<Mutex<Assistant>>,
    args: Args
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let addr = format!("0.0.0.0:{}", http_port).parse::<SocketAddr>()?;
    info!("Starting HTTP API server on: http://{}", addr);

    let app = router(assistant);

    if let Some((cert_path, key_path)) = args.tls_paths() {
        super::install_crypto_provider();
        let tls_config = axum_server::tls_rustls::RustlsConfig
            ::from_pem_file(cert_path, key_path).await?;

        tokio::spawn(async move {
            let result = axum_server
                ::bind_rustls(addr, tls_config)
                .serve(app.into_make_service()).await;

            if let Err(e) = result {
                error!("HTTPS server error: {}", e);
            }
        });

        info!("HTTPS server started with TLS enabled");
    } else {
        tokio::spawn(async move {
            match tokio::net::TcpListener::bind(addr).await {
                Ok(listener) => {
                    if let Err(e) = axum::serve(listener, app.into_make_service()).await {
                        error!("HTTP server error: {}", e);
                    }
                }
                Err(e) => {
                    error!("Failed to bind HTTP server to {}: {}. Try a different port.", addr, e);
                }
            }
        });

        info!("HTTP server started");
    }

    Ok(())
}

async fn products_handler(Query(query): Query<ProductQuery>) -> impl IntoResponse {
    let q = query.q.as_deref().unwrap_or("");
    let category = query.category.as_deref().unwrap_or(ALL_CATEGORIES);
    if category != ALL_CATEGORIES {
        if let Err(e) = category.parse::<Category>() {
            debug!("{}; returning no products", e);
        }
    }
    let matches = catalog::filter(catalog::builtin(), q, category);

    let count = matches.len();
    let response = ProductsResponse {
        products: matches.into_iter().map(ProductView::from).collect(),
        count,
        message: (count == 0).then_some(NO_RESULTS_MESSAGE),
    };
    Json(response).into_response()
}

async fn categories_handler() -> impl IntoResponse {
    Json(catalog::category_labels())
}

async fn quick_actions_handler(State(state): State<AppState>) -> impl IntoResponse {
    let assistant = state.assistant.lock().await;
    Json(assistant.quick_actions().to_vec())
}

async fn reply_handler(
    State(state): State<AppState>,
    Json(req): Json<ReplyRequest>
) -> impl IntoResponse {
    let assistant = state.assistant.lock().await;
    Json(ReplyResponse {
        intent: assistant.classify(&req.message),
        reply: assistant.reply(&req.message).to_string(),
    })
}

async fn contact_handler(Json(form): Json<ContactForm>) -> impl IntoResponse {
    match contact::validate(&form) {
        Ok(request) => {
            info!(
                "Contact form submitted: subject='{}', name='{}', email='{}', phone={:?}, message={:?}",
                request.subject.title(),
                request.name,
                request.email,
                request.phone,
                request.message
            );
            (
                StatusCode::ACCEPTED,
                Json(ContactResponse {
                    success: true,
                    message: "Thank you! Our team will get back to you shortly.".into(),
                    errors: Vec::new(),
                }),
            ).into_response()
        }
        Err(e) => {
            warn!("Rejected contact form: {}", e);
            (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(ContactResponse {
                    success: false,
                    message: e.to_string(),
                    errors: e.0,
                }),
            ).into_response()
        }
    }
}

async fn reload_replies_handler(State(state): State<AppState>) -> impl IntoResponse {
    let mut assistant = match state.assistant.try_lock() {
        Ok(g) => g,
        Err(_) => {
            return (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ReloadResponse {
                    success: false,
                    message: "Assistant busy".into(),
                }),
            ).into_response();
        }
    };

    let (code, success, message) = match assistant.reload_replies_if_changed() {
        Ok(true) => (StatusCode::OK, true, "Replies reloaded".to_string()),
        Ok(false) => (StatusCode::OK, true, "Replies unchanged".to_string()),
        Err(e) => {
            error!("Failed to reload replies: {}", e);
            (StatusCode::BAD_REQUEST, false, format!("Reload error: {}", e))
        }
    };

    (code, Json(ReloadResponse { success, message })).into_response()
}
