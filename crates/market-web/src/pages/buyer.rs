//! Buyer Dashboard

use leptos::prelude::*;

use crate::api;
use crate::components::{ErrorText, SessionForm};

#[component]
pub fn BuyerDashboard() -> impl IntoView {
    let (orders, set_orders) = signal(None::<Result<Vec<api::OrderSummary>, String>>);

    leptos::task::spawn_local(async move {
        set_orders.set(Some(api::list_orders().await));
    });

    view! {
        <div class="dashboard buyer">
            <h1>"My purchases"</h1>
            {move || match orders.get() {
                None => view! { <p class="loading">"Loading orders..."</p> }.into_any(),
                Some(Err(_)) => view! { <SessionForm /> }.into_any(),
                Some(Ok(list)) if list.is_empty() => {
                    view! { <p class="empty">"No purchases yet"</p> }.into_any()
                }
                Some(Ok(list)) => view! {
                    <table class="orders">
                        <thead>
                            <tr>
                                <th>"Product"</th>
                                <th>"Status"</th>
                                <th>"Downloads"</th>
                                <th>"Expires"</th>
                                <th></th>
                            </tr>
                        </thead>
                        <tbody>
                            {list.into_iter().map(|order| view! { <OrderRow order=order /> }).collect_view()}
                        </tbody>
                    </table>
                }
                    .into_any(),
            }}
        </div>
    }
}

#[component]
fn OrderRow(order: api::OrderSummary) -> impl IntoView {
    let (error, set_error) = signal(None::<String>);
    let (remaining, set_remaining) = signal(None::<u32>);
    let paid = order.status == "PAID";

    let product_id = order.product_id.clone();
    let download = move |_| {
        let id = product_id.clone();
        leptos::task::spawn_local(async move {
            match api::download(&id).await {
                Ok(file) => {
                    set_remaining.set(Some(file.remaining_downloads));
                    api::redirect(&file.download_url);
                }
                Err(e) => set_error.set(Some(e)),
            }
        });
    };

    view! {
        <tr>
            <td>{order.product_title.unwrap_or(order.product_id)}</td>
            <td>{order.status}</td>
            <td>
                {order.download_count}
                {move || remaining.get().map(|r| format!(" ({r} left)"))}
            </td>
            <td>{order.expires_at.unwrap_or_default()}</td>
            <td>
                <Show when=move || paid>
                    <button class="btn btn-primary" on:click=download.clone()>"Download"</button>
                </Show>
                <ErrorText error=error />
            </td>
        </tr>
    }
}
