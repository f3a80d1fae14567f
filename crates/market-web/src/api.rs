//! API Client
//!
//! The session travels in the `session` cookie, which the browser attaches
//! to every same-origin request.

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Value, json};
use wasm_bindgen::JsCast;

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Me {
    pub email: String,
    pub name: Option<String>,
    pub role: String,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: String,
    pub title: String,
    pub description: String,
    pub price: String,
    pub status: String,
    pub trailer_url: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Analytics {
    pub sales_count: u64,
    pub revenue: String,
    pub views: u64,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SellerProduct {
    #[serde(flatten)]
    pub product: Product,
    pub analytics: Analytics,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderSummary {
    pub id: String,
    pub product_id: String,
    pub status: String,
    pub download_count: u32,
    pub expires_at: Option<String>,
    pub product_title: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Download {
    pub download_url: String,
    pub remaining_downloads: u32,
}

#[derive(Clone, Debug, Deserialize)]
pub struct CoffeeLink {
    pub coffee_link: String,
    pub title: String,
    pub description: String,
    pub creator_name: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Donation {
    #[serde(alias = "payment_reference")]
    pub reference: String,
    pub amount: String,
    pub currency: String,
    pub status: String,
    pub donor_name: Option<String>,
    pub donor_message: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct DonationForm {
    pub amount: String,
    pub currency: String,
    pub email: String,
    pub donor_name: String,
    pub message: String,
    pub coffee_link_id: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct DonationCheckout {
    pub checkout_url: String,
}

pub fn origin() -> String {
    web_sys::window()
        .and_then(|w| w.location().origin().ok())
        .unwrap_or_else(|| "http://localhost:3000".into())
}

fn url(path: &str) -> String {
    format!("{}{path}", origin())
}

async fn read<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, String> {
    if response.status().is_success() {
        response.json().await.map_err(|e| e.to_string())
    } else {
        let data: Value = response.json().await.unwrap_or_default();
        Err(match &data["error"] {
            Value::String(message) => message.clone(),
            Value::Null => "Request failed".into(),
            other => other.to_string(),
        })
    }
}

async fn get<T: DeserializeOwned>(path: &str) -> Result<T, String> {
    let response = reqwest::Client::new()
        .get(url(path))
        .send()
        .await
        .map_err(|e| e.to_string())?;
    read(response).await
}

async fn post<T: DeserializeOwned>(path: &str, body: &impl Serialize) -> Result<T, String> {
    let response = reqwest::Client::new()
        .post(url(path))
        .json(body)
        .send()
        .await
        .map_err(|e| e.to_string())?;
    read(response).await
}

/// Navigate the whole page (used for hosted checkout redirects)
pub fn redirect(to: &str) {
    if let Some(window) = web_sys::window() {
        let _ = window.location().set_href(to);
    }
}

/// Store a session token in the `session` cookie
pub fn set_session(token: &str) {
    let document = web_sys::window()
        .and_then(|w| w.document())
        .and_then(|d| d.dyn_into::<web_sys::HtmlDocument>().ok());
    if let Some(document) = document {
        let _ = document.set_cookie(&format!("session={token}; path=/; SameSite=Lax"));
    }
}

pub async fn me() -> Result<Me, String> {
    get("/api/me").await
}

pub async fn list_products() -> Result<Vec<Product>, String> {
    get("/api/products").await
}

/// Returns the hosted payment URL
pub async fn checkout(product_id: &str) -> Result<String, String> {
    let receipt: Value = post("/api/checkout", &json!({"productId": product_id})).await?;
    receipt["paymentUrl"]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| "No payment URL returned".to_string())
}

/// Signed preview URL for a product trailer
pub async fn trailer(product_id: &str) -> Result<String, String> {
    let data: Value = post(
        "/api/download",
        &json!({"productId": product_id, "type": "trailer"}),
    )
    .await?;
    data["trailerUrl"]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| "No trailer URL returned".to_string())
}

pub async fn list_orders() -> Result<Vec<OrderSummary>, String> {
    get("/api/orders").await
}

pub async fn download(product_id: &str) -> Result<Download, String> {
    get(&format!("/api/download?productId={product_id}")).await
}

pub async fn seller_products() -> Result<Vec<SellerProduct>, String> {
    get("/api/seller/products").await
}

pub async fn create_product(title: &str, price: &str, file_url: &str) -> Result<Product, String> {
    post(
        "/api/products",
        &json!({"title": title, "price": price, "fileUrl": file_url}),
    )
    .await
}

pub async fn publish_product(id: &str) -> Result<Product, String> {
    post(&format!("/api/products/{id}/publish"), &json!({})).await
}

pub async fn pending_products() -> Result<Vec<Product>, String> {
    get("/api/admin/products?status=PENDING").await
}

pub async fn approve_product(id: &str) -> Result<Product, String> {
    post(&format!("/api/admin/products/{id}/approve"), &json!({})).await
}

pub async fn reject_product(id: &str, reason: &str) -> Result<Product, String> {
    post(
        &format!("/api/admin/products/{id}/reject"),
        &json!({"reason": reason}),
    )
    .await
}

pub async fn my_coffee_link() -> Result<CoffeeLink, String> {
    get("/api/coffee/link").await
}

pub async fn generate_coffee_link() -> Result<CoffeeLink, String> {
    post("/api/coffee/link", &json!({})).await
}

pub async fn public_coffee_link(slug: &str) -> Result<CoffeeLink, String> {
    get(&format!("/api/coffee/{slug}")).await
}

pub async fn recent_donations() -> Result<Vec<Donation>, String> {
    get("/api/coffee/payments").await
}

/// Returns the hosted checkout URL
pub async fn donate(form: &DonationForm) -> Result<String, String> {
    // Sent as a string so the server parses it as a decimal
    let amount = Some(form.amount.trim()).filter(|a| !a.is_empty());
    let body = json!({
        "amount": amount,
        "currency": if form.currency.is_empty() { "MWK" } else { form.currency.as_str() },
        "email": form.email,
        "donorName": form.donor_name,
        "message": form.message,
        "coffeeLinkId": form.coffee_link_id,
    });
    let checkout: DonationCheckout = post("/api/create-payment", &body).await?;
    Ok(checkout.checkout_url)
}

pub async fn payment_status(reference: &str) -> Result<Donation, String> {
    get(&format!("/api/payment-status?reference={reference}")).await
}
