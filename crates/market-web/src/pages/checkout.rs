//! Donation Checkout Page

use leptos::prelude::*;
use leptos_router::hooks::use_query_map;

use crate::components::DonateForm;

/// Standalone donation form; `?link=` pre-fills the coffee link
#[component]
pub fn CheckoutPage() -> impl IntoView {
    let query = use_query_map();
    let link = query.with_untracked(|q| q.get("link").unwrap_or_default());

    view! {
        <div class="checkout">
            <h1>"Buy me a coffee"</h1>
            <p class="subtitle">"Payments are processed by PayChangu"</p>
            <DonateForm coffee_link_id=link />
        </div>
    }
}
