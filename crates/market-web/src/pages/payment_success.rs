//! Payment Return Page

use leptos::prelude::*;
use leptos_router::hooks::use_query_map;

use crate::api;

/// Landing page after hosted checkout; the webhook may still be in flight
#[component]
pub fn PaymentSuccessPage() -> impl IntoView {
    let query = use_query_map();
    let reference = query.with_untracked(|q| q.get("reference").unwrap_or_default());
    let (status, set_status) = signal(None::<Result<api::Donation, String>>);
    let (version, set_version) = signal(0u32);

    let lookup = reference.clone();
    Effect::new(move |_| {
        version.track();
        let reference = lookup.clone();
        if reference.is_empty() {
            set_status.set(Some(Err("Payment reference required".into())));
            return;
        }
        leptos::task::spawn_local(async move {
            set_status.set(Some(api::payment_status(&reference).await));
        });
    });

    view! {
        <div class="payment-success">
            <h1>"Thank you!"</h1>
            <p class="reference">"Reference: " {reference}</p>
            {move || match status.get() {
                None => view! { <p class="loading">"Checking payment..."</p> }.into_any(),
                Some(Err(e)) => view! { <p class="error">{e}</p> }.into_any(),
                Some(Ok(donation)) => {
                    let pending = donation.status == "pending";
                    view! {
                        <div class="status">
                            <p>
                                {donation.amount} " " {donation.currency} " - "
                                <strong>{donation.status}</strong>
                            </p>
                            <Show when=move || pending>
                                <p>"Waiting for confirmation from PayChangu"</p>
                                <button class="btn" on:click=move |_| set_version.update(|v| *v += 1)>
                                    "Refresh"
                                </button>
                            </Show>
                        </div>
                    }
                        .into_any()
                }
            }}
            <a href="/" class="btn">"Back to the market"</a>
        </div>
    }
}
